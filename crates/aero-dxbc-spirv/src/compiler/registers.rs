//! Register file: pointers for every operand kind, plus masked loads and
//! stores on top of them.
//!
//! All D3D registers are `vec4` slots. Temporaries, shader inputs, shader
//! outputs and hull patch constants live in private arrays so relative
//! addressing (`v[r0.x]`, `o[r1.y + 2]`) works uniformly. The entry point
//! copies interface variables in and out of those arrays around the call to
//! the translated body.

use rspirv::spirv::{BuiltIn, StorageClass, Word};

use super::module::{ArrayType, RegisterPointer, RegisterValue, ScalarType, VectorType};
use super::Compiler;
use crate::sm4::ShaderStage;
use crate::sm4_ir::{OperandType, SelectionMode, Sm4Index, Sm4Operand, WriteMask};
use crate::CompileError;

/// Upper bound on `v#`/`o#` registers per stage.
pub(super) const MAX_IO_REGISTERS: u32 = 32;

/// `r#` registers, and the length of one `x#` array.
pub(super) const MAX_TEMPS: u32 = 4096;

/// 32 KiB of thread group shared memory.
const MAX_TGSM_DWORDS: u32 = 8192;

#[derive(Debug, Clone, Copy)]
pub(super) struct IndexableTemp {
    pub var: Word,
    pub length: u32,
}

#[derive(Debug, Clone, Copy)]
pub(super) struct ThreadGroupMemory {
    pub var: Word,
    /// Structure stride in bytes; zero for raw memory.
    pub stride: u32,
    /// Size in dwords.
    pub length: u32,
}

const F32X4: VectorType = VectorType::vec4(ScalarType::F32);

impl Compiler<'_> {
    pub(super) fn declare_temps(&mut self, count: u32) -> Result<(), CompileError> {
        if count > MAX_TEMPS {
            return Err(CompileError::invalid(format!(
                "{count} temp registers requested (limit {MAX_TEMPS})"
            )));
        }
        while (self.temps.len() as u32) < count {
            let reg = self.temps.len();
            let ty = self.module.vector_type(F32X4);
            let var = self.module.new_variable(ty, StorageClass::Private, None);
            self.module.set_debug_name(var, &format!("r{reg}"));
            self.temps.push(var);
        }
        Ok(())
    }

    fn temp(&mut self, reg: u32) -> Result<Word, CompileError> {
        if reg >= MAX_TEMPS {
            return Err(CompileError::invalid(format!(
                "r{reg} is out of range (limit {MAX_TEMPS})"
            )));
        }
        self.declare_temps(reg + 1)?;
        self.temps
            .get(reg as usize)
            .copied()
            .ok_or_else(|| CompileError::invalid(format!("r{reg} was not allocated")))
    }

    pub(super) fn declare_indexable_temp(&mut self, reg: u32, length: u32) -> Result<(), CompileError> {
        if length > MAX_TEMPS {
            return Err(CompileError::invalid(format!(
                "x{reg}[{length}] exceeds {MAX_TEMPS} registers"
            )));
        }
        let length = length.max(1);
        if let Some(existing) = self.indexable_temps.get(&reg) {
            if existing.length != length {
                return Err(CompileError::invalid(format!(
                    "x{reg} redeclared with {length} registers, first declared with {}",
                    existing.length
                )));
            }
            tracing::warn!(reg, "indexable temp redeclared; keeping the first declaration");
            return Ok(());
        }
        let ty = self.module.array_type(ArrayType::new(F32X4, length));
        let var = self.module.new_variable(ty, StorageClass::Private, None);
        self.module.set_debug_name(var, &format!("x{reg}"));
        self.indexable_temps.insert(reg, IndexableTemp { var, length });
        Ok(())
    }

    /// Declares `g#` as a workgroup array of dwords. A repeated declaration
    /// must match the first one and keeps its variable.
    pub(super) fn declare_thread_group_memory(
        &mut self,
        reg: u32,
        stride: u32,
        length: u32,
    ) -> Result<(), CompileError> {
        if length > MAX_TGSM_DWORDS {
            return Err(CompileError::invalid(format!(
                "g{reg} is {length} dwords (limit {MAX_TGSM_DWORDS})"
            )));
        }
        let length = length.max(1);
        if let Some(existing) = self.tgsm.get(&reg) {
            if existing.stride != stride || existing.length != length {
                return Err(CompileError::invalid(format!(
                    "g{reg} redeclared as stride {stride} x {length} dwords, first declared as stride {} x {} dwords",
                    existing.stride, existing.length
                )));
            }
            tracing::warn!(reg, "thread group memory redeclared; keeping the first declaration");
            return Ok(());
        }
        let u32_ty = self.module.scalar_type(ScalarType::U32);
        let ty = self.module.array_of(u32_ty, length);
        let var = self.module.new_variable(ty, StorageClass::Workgroup, None);
        self.module.set_debug_name(var, &format!("g{reg}"));
        self.tgsm.insert(
            reg,
            ThreadGroupMemory {
                var,
                stride,
                length,
            },
        );
        Ok(())
    }

    pub(super) fn thread_group_memory(&self, reg: u32) -> Result<ThreadGroupMemory, CompileError> {
        self.tgsm
            .get(&reg)
            .copied()
            .ok_or_else(|| CompileError::invalid(format!("g{reg} used without a declaration")))
    }

    fn private_io_array(&mut self, name: &str, vertices: u32) -> Word {
        let regs = self
            .module
            .array_type(ArrayType::new(F32X4, MAX_IO_REGISTERS));
        let ty = self.module.array_of(regs, vertices);
        let var = self.module.new_variable(ty, StorageClass::Private, None);
        self.module.set_debug_name(var, name);
        var
    }

    /// Vertices per input primitive for stages with arrayed inputs, else 0.
    pub(super) fn input_vertex_count(&self) -> u32 {
        match self.stage {
            ShaderStage::Geometry | ShaderStage::Hull | ShaderStage::Domain => {
                match self.state.input_vertex_count() {
                    0 => MAX_IO_REGISTERS,
                    n => n,
                }
            }
            _ => 0,
        }
    }

    pub(super) fn v_regs(&mut self) -> Word {
        if let Some(var) = self.v_regs {
            return var;
        }
        let vertices = self.input_vertex_count();
        let var = self.private_io_array("v", vertices);
        self.v_regs = Some(var);
        var
    }

    pub(super) fn o_regs(&mut self) -> Word {
        if let Some(var) = self.o_regs {
            return var;
        }
        let var = self.private_io_array("o", 0);
        self.o_regs = Some(var);
        var
    }

    pub(super) fn patch_regs(&mut self) -> Word {
        if let Some(var) = self.patch_regs {
            return var;
        }
        let var = self.private_io_array("vpc", 0);
        self.patch_regs = Some(var);
        var
    }

    /// `base[indices...]` as a pointer to `ty`.
    pub(super) fn chain(
        &mut self,
        ty: VectorType,
        sclass: StorageClass,
        base: Word,
        indices: &[Word],
    ) -> Result<RegisterPointer, CompileError> {
        if indices.is_empty() {
            return Ok(RegisterPointer {
                ty,
                sclass,
                id: base,
            });
        }
        let pointee = self.module.vector_type(ty);
        let ptr_ty = self.module.pointer_type(pointee, sclass);
        let id = self
            .module
            .access_chain(ptr_ty, None, base, indices.iter().copied())?;
        Ok(RegisterPointer { ty, sclass, id })
    }

    /// Slot `reg` (and `vertex`, for arrayed inputs) of the private input array.
    pub(super) fn input_reg_ptr(
        &mut self,
        vertex: Option<Word>,
        reg: Word,
    ) -> Result<RegisterPointer, CompileError> {
        let var = self.v_regs();
        let indices: Vec<Word> = vertex.into_iter().chain([reg]).collect();
        self.chain(F32X4, StorageClass::Private, var, &indices)
    }

    pub(super) fn output_reg_ptr(&mut self, reg: Word) -> Result<RegisterPointer, CompileError> {
        let var = self.o_regs();
        self.chain(F32X4, StorageClass::Private, var, &[reg])
    }

    pub(super) fn patch_reg_ptr(&mut self, reg: Word) -> Result<RegisterPointer, CompileError> {
        let var = self.patch_regs();
        self.chain(F32X4, StorageClass::Private, var, &[reg])
    }

    /// Evaluates a register index as a `u32` id.
    pub(super) fn index_value(&mut self, index: &Sm4Index) -> Result<Word, CompileError> {
        let Some(relative) = &index.relative else {
            return Ok(self.module.const_u32(index.offset));
        };
        let value = self.emit_load_src(relative, WriteMask::X)?;
        let value = self.bitcast(value, ScalarType::U32)?;
        if index.offset == 0 {
            return Ok(value.id);
        }
        let u32_ty = self.module.scalar_type(ScalarType::U32);
        let offset = self.module.const_u32(index.offset);
        Ok(self.module.i_add(u32_ty, None, value.id, offset)?)
    }

    fn operand_index(&mut self, op: &Sm4Operand, dim: usize) -> Result<Word, CompileError> {
        let index = op
            .indices
            .get(dim)
            .ok_or_else(|| CompileError::invalid(format!("{:?} operand lacks index {dim}", op.ty)))?;
        self.index_value(index)
    }

    fn immediate_index(&self, op: &Sm4Operand, dim: usize) -> Result<u32, CompileError> {
        op.index(dim).ok_or_else(|| {
            CompileError::invalid(format!(
                "{:?} operand needs an immediate index {dim}",
                op.ty
            ))
        })
    }

    /// Resolves `op` to a pointer. Resource-like operands have no pointer form.
    pub(super) fn emit_operand_ptr(&mut self, op: &Sm4Operand) -> Result<RegisterPointer, CompileError> {
        match op.ty {
            OperandType::Temp => {
                let reg = self.immediate_index(op, 0)?;
                let var = self.temp(reg)?;
                self.chain(F32X4, StorageClass::Private, var, &[])
            }
            OperandType::IndexableTemp => {
                let reg = self.immediate_index(op, 0)?;
                let temp = self
                    .indexable_temps
                    .get(&reg)
                    .copied()
                    .ok_or_else(|| CompileError::invalid(format!("x{reg} used without a declaration")))?;
                if let Some(element) = op.index(1) {
                    if element >= temp.length {
                        return Err(CompileError::invalid(format!(
                            "x{reg}[{element}] is past the declared length {}",
                            temp.length
                        )));
                    }
                }
                let element = self.operand_index(op, 1)?;
                self.chain(F32X4, StorageClass::Private, temp.var, &[element])
            }
            OperandType::Input | OperandType::InputControlPoint => {
                if op.indices.len() >= 2 {
                    let vertex = self.operand_index(op, 0)?;
                    let reg = self.operand_index(op, 1)?;
                    self.input_reg_ptr(Some(vertex), reg)
                } else {
                    let reg = self.operand_index(op, 0)?;
                    self.input_reg_ptr(None, reg)
                }
            }
            OperandType::InputPatchConstant => {
                let reg = self.operand_index(op, 0)?;
                self.patch_reg_ptr(reg)
            }
            OperandType::OutputControlPoint => {
                let vertex = self.operand_index(op, 0)?;
                let reg = self.immediate_index(op, 1)?;
                self.control_point_output_ptr(reg, vertex)
            }
            OperandType::Output => self.output_operand_ptr(op),
            OperandType::ConstantBuffer => {
                let slot = self.immediate_index(op, 0)?;
                let element = self.operand_index(op, 1)?;
                self.constant_buffer_ptr(slot, element)
            }
            OperandType::ImmediateConstantBuffer => {
                let var = self
                    .icb
                    .ok_or_else(|| CompileError::invalid("icb used without customdata"))?;
                let element = self.operand_index(op, 0)?;
                self.chain(
                    VectorType::vec4(ScalarType::U32),
                    StorageClass::Private,
                    var,
                    &[element],
                )
            }
            OperandType::InputForkInstanceId | OperandType::InputJoinInstanceId => {
                let var = self.state.phase_instance_id().ok_or_else(|| {
                    CompileError::invalid("phase instance id read outside a fork or join phase")
                })?;
                self.chain(VectorType::scalar(ScalarType::U32), StorageClass::Private, var, &[])
            }
            OperandType::InputPrimitiveId => {
                self.builtin_ptr(BuiltIn::PrimitiveId, StorageClass::Input, None, None)
            }
            OperandType::OutputControlPointId | OperandType::InputGsInstanceId => {
                self.builtin_ptr(BuiltIn::InvocationId, StorageClass::Input, None, None)
            }
            OperandType::InputDomainPoint => {
                self.builtin_ptr(BuiltIn::TessCoord, StorageClass::Input, None, None)
            }
            OperandType::InputThreadId => {
                self.builtin_ptr(BuiltIn::GlobalInvocationId, StorageClass::Input, None, None)
            }
            OperandType::InputThreadGroupId => {
                self.builtin_ptr(BuiltIn::WorkgroupId, StorageClass::Input, None, None)
            }
            OperandType::InputThreadIdInGroup => {
                self.builtin_ptr(BuiltIn::LocalInvocationId, StorageClass::Input, None, None)
            }
            OperandType::InputThreadIdInGroupFlattened => {
                self.builtin_ptr(BuiltIn::LocalInvocationIndex, StorageClass::Input, None, None)
            }
            OperandType::InputCoverageMask => {
                let zero = self.module.const_u32(0);
                self.builtin_ptr(BuiltIn::SampleMask, StorageClass::Input, None, Some(zero))
            }
            OperandType::OutputCoverageMask => {
                let zero = self.module.const_u32(0);
                self.builtin_ptr(BuiltIn::SampleMask, StorageClass::Output, None, Some(zero))
            }
            OperandType::OutputDepth
            | OperandType::OutputDepthGreaterEqual
            | OperandType::OutputDepthLessEqual => {
                self.builtin_ptr(BuiltIn::FragDepth, StorageClass::Output, None, None)
            }
            other => Err(CompileError::invalid(format!(
                "operand type {other:?} cannot be used as a register"
            ))),
        }
    }

    /// `o#` resolves differently per hull phase; elsewhere it is the private
    /// output array.
    fn output_operand_ptr(&mut self, op: &Sm4Operand) -> Result<RegisterPointer, CompileError> {
        if self.stage == ShaderStage::Hull {
            if self.state.in_control_point_phase() {
                let reg = self.immediate_index(op, 0)?;
                let invocation = self.invocation_id()?;
                return self.control_point_output_ptr(reg, invocation);
            }
            let reg = self.operand_index(op, 0)?;
            return self.patch_reg_ptr(reg);
        }
        let reg = self.operand_index(op, 0)?;
        self.output_reg_ptr(reg)
    }

    /// Loads the full contents of `ptr`.
    pub(super) fn load_ptr(&mut self, ptr: RegisterPointer) -> Result<RegisterValue, CompileError> {
        let ty_id = self.module.vector_type(ptr.ty);
        let id = self.module.load(ty_id, None, ptr.id, None, [])?;
        Ok(RegisterValue { ty: ptr.ty, id })
    }

    /// Writes `value` (one component per bit in `mask`) into the masked
    /// components of `ptr`, leaving the others untouched.
    pub(super) fn store_masked(
        &mut self,
        ptr: RegisterPointer,
        value: RegisterValue,
        mask: WriteMask,
    ) -> Result<(), CompileError> {
        if mask.is_empty() {
            return Ok(());
        }
        let value = self.bitcast(value, ptr.ty.ctype)?;
        let value = if value.ty.ccount < mask.count() {
            self.extend(value, mask.count())?
        } else {
            value
        };

        if ptr.ty.ccount == 1 {
            let scalar = self.extract(value, 0)?;
            self.module.store(ptr.id, scalar.id, None, [])?;
            return Ok(());
        }

        if mask.count() == 1 {
            let component = mask.first().unwrap_or(0);
            let index = self.module.const_u32(component);
            let scalar = self.extract(value, 0)?;
            let target = self.chain(VectorType::scalar(ptr.ty.ctype), ptr.sclass, ptr.id, &[index])?;
            self.module.store(target.id, scalar.id, None, [])?;
            return Ok(());
        }

        if mask == WriteMask::first_n(ptr.ty.ccount) && value.ty.ccount == ptr.ty.ccount {
            self.module.store(ptr.id, value.id, None, [])?;
            return Ok(());
        }

        let current = self.load_ptr(ptr)?;
        let mut lanes = Vec::with_capacity(ptr.ty.ccount as usize);
        let mut next = 0;
        for c in 0..ptr.ty.ccount {
            if mask.contains(c) {
                lanes.push(ptr.ty.ccount + next);
                next += 1;
            } else {
                lanes.push(c);
            }
        }
        let ty_id = self.module.vector_type(ptr.ty);
        let merged = self
            .module
            .vector_shuffle(ty_id, None, current.id, value.id, lanes)?;
        self.module.store(ptr.id, merged, None, [])?;
        Ok(())
    }

    /// Reads `op` for a destination written with `mask`: swizzled, cast to the
    /// operand's data type and with source modifiers applied.
    pub(super) fn emit_load_src(
        &mut self,
        op: &Sm4Operand,
        mask: WriteMask,
    ) -> Result<RegisterValue, CompileError> {
        let ctype = ScalarType::from(op.data_type);
        let lanes: Vec<u32> = match op.selection {
            SelectionMode::Mask => mask.components().collect(),
            SelectionMode::Swizzle | SelectionMode::Select1 => {
                mask.components().map(|c| op.swizzle.lane(c)).collect()
            }
        };

        let value = match op.ty {
            OperandType::Imm32 => {
                let bits: Vec<u32> = lanes.iter().map(|&l| op.imm[l as usize & 3]).collect();
                self.const_value(ctype, &bits)
            }
            OperandType::Imm64 => {
                return Err(CompileError::invalid("64-bit immediates are not supported"));
            }
            _ => {
                let ptr = self.emit_operand_ptr(op)?;
                let loaded = self.load_ptr(ptr)?;
                let loaded = if matches!(loaded.ty.ccount, 2 | 3) {
                    self.pad_vec4(loaded)?
                } else {
                    loaded
                };
                let picked = self.swizzle(loaded, &lanes)?;
                self.bitcast(picked, ctype)?
            }
        };
        self.apply_modifier(value, op.modifier)
    }

    /// Writes `value` to the destination operand, honoring its write mask.
    pub(super) fn emit_store_dst(
        &mut self,
        op: &Sm4Operand,
        value: RegisterValue,
        saturate: bool,
    ) -> Result<(), CompileError> {
        if op.is_null() || op.mask.is_empty() {
            return Ok(());
        }
        let value = if saturate { self.saturate(value)? } else { value };
        let ptr = self.emit_operand_ptr(op)?;
        self.store_masked(ptr, value, op.mask)
    }
}
