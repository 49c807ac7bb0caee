//! Stage interface: location variables, built-ins and the copies between
//! them and the private register arrays.

use rspirv::spirv::{BuiltIn, Capability, Decoration, GLOp, StorageClass, Word};

use super::module::{RegisterPointer, RegisterValue, ScalarType, VectorType};
use super::registers::MAX_IO_REGISTERS;
use super::Compiler;
use crate::artifact::{InterfaceRegister, InterfaceSlots};
use crate::signature::{ComponentType, InterpolationMode, Signature, SystemValue, TessLevel};
use crate::sm4::opcode::*;
use crate::sm4::ShaderStage;
use crate::sm4_ir::{OperandType, Sm4Instruction, WriteMask};
use crate::CompileError;

/// First location used by per-patch variables.
pub(super) const PATCH_LOCATION_BASE: u32 = 32;

/// Clamp applied to tessellation factors when no `dcl_hs_max_tessfactor` is given.
pub(super) const MAX_TESS_FACTOR: f32 = 64.0;

#[derive(Debug, Clone, Copy)]
pub(super) struct IoVar {
    pub id: Word,
    /// Element type; arrayed variables hold one per vertex.
    pub ty: VectorType,
    pub vertices: u32,
}

#[derive(Debug, Clone, Default)]
pub(super) struct IoRegister {
    pub mask: WriteMask,
    pub var: Option<IoVar>,
    pub sysvalues: Vec<(WriteMask, SystemValue)>,
}

impl IoRegister {
    fn builtin_mask(&self) -> WriteMask {
        self.sysvalues
            .iter()
            .fold(WriteMask(0), |acc, (mask, _)| acc | *mask)
    }

    /// Components carried by the location variable.
    pub fn user_mask(&self) -> WriteMask {
        WriteMask(self.mask.0 & !self.builtin_mask().0)
    }
}

#[derive(Debug, Clone, Copy)]
pub(super) struct BuiltinVar {
    pub id: Word,
    pub ty: VectorType,
    pub length: u32,
    pub vertices: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IoKind {
    Input,
    Output,
    PatchInput,
    PatchOutput,
}

impl IoKind {
    fn storage_class(self) -> StorageClass {
        match self {
            IoKind::Input | IoKind::PatchInput => StorageClass::Input,
            IoKind::Output | IoKind::PatchOutput => StorageClass::Output,
        }
    }

    fn is_patch(self) -> bool {
        matches!(self, IoKind::PatchInput | IoKind::PatchOutput)
    }
}

const F32X4: VectorType = VectorType::vec4(ScalarType::F32);

fn scalar_for(component: ComponentType) -> ScalarType {
    match component {
        ComponentType::Uint32 => ScalarType::U32,
        ComponentType::Sint32 => ScalarType::I32,
        ComponentType::Float32 | ComponentType::Unknown => ScalarType::F32,
    }
}

impl Compiler<'_> {
    fn signature_for(&self, kind: IoKind) -> &Signature {
        match kind {
            IoKind::Input => self.isgn,
            IoKind::Output => self.osgn,
            IoKind::PatchInput | IoKind::PatchOutput => self.psgn,
        }
    }

    fn io_map(&mut self, kind: IoKind) -> &mut std::collections::BTreeMap<u32, IoRegister> {
        match kind {
            IoKind::Input => &mut self.inputs,
            IoKind::Output => &mut self.outputs,
            IoKind::PatchInput => &mut self.patch_inputs,
            IoKind::PatchOutput => &mut self.patch_outputs,
        }
    }

    /// Whether `sv` on this interface is routed through a built-in.
    fn routes_to_builtin(&self, kind: IoKind, sv: SystemValue) -> bool {
        use SystemValue as Sv;

        if kind.is_patch() {
            return sv.tess_level().is_some();
        }
        match (self.stage, kind) {
            (ShaderStage::Vertex, IoKind::Input) => matches!(sv, Sv::VertexId | Sv::InstanceId),
            (ShaderStage::Pixel, IoKind::Input) => matches!(
                sv,
                Sv::Position
                    | Sv::IsFrontFace
                    | Sv::SampleIndex
                    | Sv::PrimitiveId
                    | Sv::RenderTargetArrayIndex
                    | Sv::ViewportArrayIndex
                    | Sv::ClipDistance
                    | Sv::CullDistance
            ),
            (ShaderStage::Geometry | ShaderStage::Hull, IoKind::Input) => matches!(
                sv,
                Sv::Position | Sv::ClipDistance | Sv::CullDistance | Sv::PrimitiveId
            ),
            (ShaderStage::Vertex | ShaderStage::Domain | ShaderStage::Geometry, IoKind::Output) => {
                matches!(
                    sv,
                    Sv::Position
                        | Sv::ClipDistance
                        | Sv::CullDistance
                        | Sv::RenderTargetArrayIndex
                        | Sv::ViewportArrayIndex
                )
            }
            _ => false,
        }
    }

    pub(super) fn emit_dcl_input(&mut self, inst: &Sm4Instruction) -> Result<(), CompileError> {
        let Some(op) = inst.dst.first() else {
            return Err(CompileError::invalid(format!("{} without a register", inst.name())));
        };
        let sv = match inst.opcode {
            OPCODE_DCL_INPUT_SGV | OPCODE_DCL_INPUT_SIV | OPCODE_DCL_INPUT_PS_SGV
            | OPCODE_DCL_INPUT_PS_SIV => inst.imm.first().map(|&raw| SystemValue::from_raw(raw)),
            _ => None,
        };
        let interpolation = match inst.opcode {
            OPCODE_DCL_INPUT_PS | OPCODE_DCL_INPUT_PS_SGV | OPCODE_DCL_INPUT_PS_SIV => {
                InterpolationMode::from_raw(inst.interpolation())
            }
            _ => InterpolationMode::Undefined,
        };

        match op.ty {
            OperandType::Input | OperandType::InputControlPoint => {
                let reg = op
                    .indices
                    .last()
                    .and_then(|i| i.as_immediate())
                    .ok_or_else(|| CompileError::invalid("input declaration without a register"))?;
                self.declare_io(IoKind::Input, reg, op.mask, sv, interpolation)
            }
            OperandType::InputPatchConstant if self.stage == ShaderStage::Domain => {
                let reg = op
                    .index(0)
                    .ok_or_else(|| CompileError::invalid("patch constant declaration without a register"))?;
                self.declare_io(IoKind::PatchInput, reg, op.mask, sv, interpolation)
            }
            // System operands such as vThreadID resolve to built-ins on use.
            _ => Ok(()),
        }
    }

    pub(super) fn emit_dcl_output(&mut self, inst: &Sm4Instruction) -> Result<(), CompileError> {
        let Some(op) = inst.dst.first() else {
            return Err(CompileError::invalid(format!("{} without a register", inst.name())));
        };
        let sv = match inst.opcode {
            OPCODE_DCL_OUTPUT_SGV | OPCODE_DCL_OUTPUT_SIV => {
                inst.imm.first().map(|&raw| SystemValue::from_raw(raw))
            }
            _ => None,
        };

        match op.ty {
            OperandType::Output => {
                let reg = op
                    .index(0)
                    .ok_or_else(|| CompileError::invalid("output declaration without a register"))?;
                let kind = if self.stage == ShaderStage::Hull && !self.state.in_control_point_phase() {
                    IoKind::PatchOutput
                } else {
                    IoKind::Output
                };
                self.declare_io(kind, reg, op.mask, sv, InterpolationMode::Undefined)
            }
            OperandType::OutputDepth
            | OperandType::OutputDepthGreaterEqual
            | OperandType::OutputDepthLessEqual => {
                self.state.set_depth_mode(op.ty);
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn declare_io(
        &mut self,
        kind: IoKind,
        reg: u32,
        mask: WriteMask,
        sv: Option<SystemValue>,
        interpolation: InterpolationMode,
    ) -> Result<(), CompileError> {
        if reg >= MAX_IO_REGISTERS {
            return Err(CompileError::invalid(format!(
                "interface register {reg} exceeds {MAX_IO_REGISTERS}"
            )));
        }

        let mut sysvalues = Vec::new();
        match sv {
            Some(sv) if sv.is_builtin() => {
                if self.routes_to_builtin(kind, sv) {
                    sysvalues.push((mask, sv));
                }
            }
            _ => {
                for element in self.signature_for(kind).elements_for(reg) {
                    let overlap = WriteMask(element.mask.0 & mask.0);
                    if !overlap.is_empty() && self.routes_to_builtin(kind, element.system_value) {
                        sysvalues.push((overlap, element.system_value));
                    }
                }
            }
        }

        let entry = self.io_map(kind).entry(reg).or_default();
        entry.mask |= mask;
        for pair in sysvalues {
            if !entry.sysvalues.contains(&pair) {
                entry.sysvalues.push(pair);
            }
        }
        let needs_var = entry.var.is_none() && !entry.user_mask().is_empty();

        if needs_var {
            let var = self.create_location_var(kind, reg, interpolation)?;
            if let Some(entry) = self.io_map(kind).get_mut(&reg) {
                entry.var = Some(var);
            }
        }
        Ok(())
    }

    fn create_location_var(
        &mut self,
        kind: IoKind,
        reg: u32,
        decl_interpolation: InterpolationMode,
    ) -> Result<IoVar, CompileError> {
        let signature = self.signature_for(kind);
        let component = signature.register_component_type(reg);
        let element = signature.lookup(reg).cloned();

        let ctype = match (self.stage, kind) {
            (ShaderStage::Vertex, IoKind::Input) | (ShaderStage::Pixel, IoKind::Output) => {
                scalar_for(component)
            }
            _ => ScalarType::F32,
        };
        let vertices = match (self.stage, kind) {
            (ShaderStage::Geometry | ShaderStage::Hull | ShaderStage::Domain, IoKind::Input) => {
                self.input_vertex_count()
            }
            (ShaderStage::Hull, IoKind::Output) => self.state.output_vertex_count(),
            _ => 0,
        };

        let ty = VectorType::vec4(ctype);
        let vec = self.module.vector_type(ty);
        let pointee = self.module.array_of(vec, vertices);
        let id = self.module.new_variable(pointee, kind.storage_class(), None);

        let location = if kind.is_patch() {
            self.module.decorate_flag(id, Decoration::Patch);
            PATCH_LOCATION_BASE + reg
        } else {
            reg
        };
        self.module.decorate_u32(id, Decoration::Location, location);

        if self.stage == ShaderStage::Pixel && kind == IoKind::Input {
            let mode = match element.as_ref().map(|e| e.interpolation) {
                Some(InterpolationMode::Undefined) | None => decl_interpolation,
                Some(mode) => mode,
            };
            let integer = matches!(component, ComponentType::Uint32 | ComponentType::Sint32);
            if mode.is_flat() || integer {
                self.module.decorate_flag(id, Decoration::Flat);
            } else {
                if mode.is_no_perspective() {
                    self.module.decorate_flag(id, Decoration::NoPerspective);
                }
                if mode.is_centroid() {
                    self.module.decorate_flag(id, Decoration::Centroid);
                }
                if mode.is_sample() {
                    self.module.decorate_flag(id, Decoration::Sample);
                    self.module.enable_capability(Capability::SampleRateShading);
                }
            }
        }

        let prefix = match kind {
            IoKind::Input => "in",
            IoKind::Output => "out",
            IoKind::PatchInput => "patch_in",
            IoKind::PatchOutput => "patch_out",
        };
        let name = match &element {
            Some(e) => format!("{prefix}_{}{}", e.semantic_name, e.semantic_index),
            None => format!("{prefix}_{reg}"),
        };
        self.module.set_debug_name(id, &name);

        Ok(IoVar { id, ty, vertices })
    }

    fn builtin_shape(&self, builtin: BuiltIn, sclass: StorageClass) -> (VectorType, u32) {
        let f32_ = VectorType::scalar(ScalarType::F32);
        let i32_ = VectorType::scalar(ScalarType::I32);
        let clip_cull = if sclass == StorageClass::Input {
            self.analysis.clip_cull_in
        } else {
            self.analysis.clip_cull_out
        };
        match builtin {
            BuiltIn::Position | BuiltIn::FragCoord => (F32X4, 0),
            BuiltIn::FrontFacing => (VectorType::scalar(ScalarType::Bool), 0),
            BuiltIn::SampleMask => (i32_, 1),
            BuiltIn::FragDepth => (f32_, 0),
            BuiltIn::GlobalInvocationId | BuiltIn::WorkgroupId | BuiltIn::LocalInvocationId => {
                (VectorType::new(ScalarType::U32, 3), 0)
            }
            BuiltIn::LocalInvocationIndex => (VectorType::scalar(ScalarType::U32), 0),
            BuiltIn::TessCoord => (VectorType::new(ScalarType::F32, 3), 0),
            BuiltIn::TessLevelOuter => (f32_, 4),
            BuiltIn::TessLevelInner => (f32_, 2),
            BuiltIn::ClipDistance => (f32_, clip_cull.clip.max(1)),
            BuiltIn::CullDistance => (f32_, clip_cull.cull.max(1)),
            _ => (i32_, 0),
        }
    }

    pub(super) fn builtin_variable(
        &mut self,
        builtin: BuiltIn,
        sclass: StorageClass,
    ) -> Result<BuiltinVar, CompileError> {
        let key = (builtin as u32, sclass as u32);
        if let Some(&var) = self.builtins.get(&key) {
            return Ok(var);
        }

        let (ty, length) = self.builtin_shape(builtin, sclass);
        let per_vertex = sclass == StorageClass::Input
            && matches!(self.stage, ShaderStage::Geometry | ShaderStage::Hull)
            && matches!(
                builtin,
                BuiltIn::Position | BuiltIn::ClipDistance | BuiltIn::CullDistance
            );
        let vertices = if per_vertex { self.input_vertex_count() } else { 0 };

        let element = self.module.vector_type(ty);
        let array = self.module.array_of(element, length);
        let pointee = self.module.array_of(array, vertices);
        let id = self.module.new_variable(pointee, sclass, None);
        self.module.decorate_builtin(id, builtin);

        if self.stage == ShaderStage::Pixel
            && sclass == StorageClass::Input
            && ty.ctype.is_integer()
        {
            self.module.decorate_flag(id, Decoration::Flat);
        }
        if matches!(builtin, BuiltIn::TessLevelOuter | BuiltIn::TessLevelInner) {
            self.module.decorate_flag(id, Decoration::Patch);
        }
        match builtin {
            BuiltIn::ClipDistance => self.module.enable_capability(Capability::ClipDistance),
            BuiltIn::CullDistance => self.module.enable_capability(Capability::CullDistance),
            BuiltIn::SampleId => self.module.enable_capability(Capability::SampleRateShading),
            _ => {}
        }
        self.module.set_debug_name(id, &format!("{builtin:?}"));

        let var = BuiltinVar {
            id,
            ty,
            length,
            vertices,
        };
        self.builtins.insert(key, var);
        Ok(var)
    }

    /// Pointer to a built-in, optionally indexed by vertex and array element.
    pub(super) fn builtin_ptr(
        &mut self,
        builtin: BuiltIn,
        sclass: StorageClass,
        vertex: Option<Word>,
        element: Option<Word>,
    ) -> Result<RegisterPointer, CompileError> {
        let var = self.builtin_variable(builtin, sclass)?;
        let vertex = vertex.filter(|_| var.vertices > 0);
        let element = element.filter(|_| var.length > 0);
        let indices: Vec<Word> = vertex.into_iter().chain(element).collect();
        self.chain(var.ty, sclass, var.id, &indices)
    }

    fn load_builtin(
        &mut self,
        builtin: BuiltIn,
        vertex: Option<Word>,
        element: Option<Word>,
    ) -> Result<RegisterValue, CompileError> {
        let ptr = self.builtin_ptr(builtin, StorageClass::Input, vertex, element)?;
        self.load_ptr(ptr)
    }

    /// `InvocationId` as a `u32` id.
    pub(super) fn invocation_id(&mut self) -> Result<Word, CompileError> {
        let value = self.load_builtin(BuiltIn::InvocationId, None, None)?;
        Ok(self.bitcast(value, ScalarType::U32)?.id)
    }

    /// `vocp[vertex][reg]`, and `o#` of the control-point phase.
    pub(super) fn control_point_output_ptr(
        &mut self,
        reg: u32,
        vertex: Word,
    ) -> Result<RegisterPointer, CompileError> {
        let var = self
            .outputs
            .get(&reg)
            .and_then(|io| io.var)
            .ok_or_else(|| CompileError::invalid(format!("control point output o{reg} is not declared")))?;
        self.chain(var.ty, StorageClass::Output, var.id, &[vertex])
    }

    /// Stores `value` into `v[reg]` (all vertices for arrayed inputs when
    /// `vertex` is `None`).
    fn write_input_reg(
        &mut self,
        vertex: Option<u32>,
        reg: u32,
        mask: WriteMask,
        value: RegisterValue,
    ) -> Result<(), CompileError> {
        let reg_id = self.module.const_u32(reg);
        let value = self.bitcast(value, ScalarType::F32)?;
        let vertices: Vec<Option<u32>> = match (vertex, self.input_vertex_count()) {
            (Some(v), _) => vec![Some(v)],
            (None, 0) => vec![None],
            (None, n) => (0..n).map(Some).collect(),
        };
        for v in vertices {
            let v = v.map(|v| self.module.const_u32(v));
            let ptr = self.input_reg_ptr(v, reg_id)?;
            self.store_masked(ptr, value, mask)?;
        }
        Ok(())
    }

    /// Copies interface inputs into the private `v#` (and patch) arrays.
    pub(super) fn emit_input_setup(&mut self) -> Result<(), CompileError> {
        let inputs: Vec<(u32, IoRegister)> =
            self.inputs.iter().map(|(&r, io)| (r, io.clone())).collect();

        for (reg, io) in &inputs {
            if let Some(var) = io.var {
                let user = io.user_mask();
                let vertices: Vec<Option<u32>> = if var.vertices == 0 {
                    vec![None]
                } else {
                    (0..var.vertices).map(Some).collect()
                };
                for vertex in vertices {
                    let index = vertex.map(|v| self.module.const_u32(v));
                    let src =
                        self.chain(var.ty, StorageClass::Input, var.id, &index.into_iter().collect::<Vec<_>>())?;
                    let value = self.load_ptr(src)?;
                    let value = self.select_mask(value, user)?;
                    self.write_input_reg(vertex, *reg, user, value)?;
                }
            }
            for &(mask, sv) in &io.sysvalues {
                if !sv.is_clip_cull() {
                    self.emit_sysvalue_input(*reg, mask, sv)?;
                }
            }
        }

        for sv in [SystemValue::ClipDistance, SystemValue::CullDistance] {
            self.emit_clip_cull_input(sv)?;
        }

        let patch_inputs: Vec<(u32, IoRegister)> =
            self.patch_inputs.iter().map(|(&r, io)| (r, io.clone())).collect();
        for (reg, io) in &patch_inputs {
            let reg_id = self.module.const_u32(*reg);
            if let Some(var) = io.var {
                let user = io.user_mask();
                let src = self.chain(var.ty, StorageClass::Input, var.id, &[])?;
                let value = self.load_ptr(src)?;
                let value = self.select_mask(value, user)?;
                let dst = self.patch_reg_ptr(reg_id)?;
                self.store_masked(dst, value, user)?;
            }
            for &(mask, sv) in &io.sysvalues {
                let Some((level, index)) = sv.tess_level() else {
                    continue;
                };
                let builtin = match level {
                    TessLevel::Outer => BuiltIn::TessLevelOuter,
                    TessLevel::Inner => BuiltIn::TessLevelInner,
                };
                let element = self.module.const_u32(index);
                let value = self.load_builtin(builtin, None, Some(element))?;
                let component = WriteMask::component(mask.first().unwrap_or(0));
                let dst = self.patch_reg_ptr(reg_id)?;
                self.store_masked(dst, value, component)?;
            }
        }
        Ok(())
    }

    fn emit_sysvalue_input(
        &mut self,
        reg: u32,
        mask: WriteMask,
        sv: SystemValue,
    ) -> Result<(), CompileError> {
        match sv {
            SystemValue::Position if self.stage == ShaderStage::Pixel => {
                let coord = self.load_builtin(BuiltIn::FragCoord, None, None)?;
                // D3D exposes clip-space w rather than 1/w.
                let f32_ty = self.module.scalar_type(ScalarType::F32);
                let w = self.extract(coord, 3)?;
                let one = self.module.const_f32(1.0);
                let rcp_w = self.module.f_div(f32_ty, None, one, w.id)?;
                let vec_ty = self.module.vector_type(F32X4);
                let fixed = self.module.composite_insert(vec_ty, None, rcp_w, coord.id, [3])?;
                let value = RegisterValue { ty: F32X4, id: fixed };
                let value = self.select_mask(value, mask)?;
                self.write_input_reg(None, reg, mask, value)
            }
            SystemValue::Position => {
                for vertex in 0..self.input_vertex_count().max(1) {
                    let index = self.module.const_u32(vertex);
                    let position = self.load_builtin(BuiltIn::Position, Some(index), None)?;
                    let value = self.select_mask(position, mask)?;
                    let vertex = (self.input_vertex_count() > 0).then_some(vertex);
                    self.write_input_reg(vertex, reg, mask, value)?;
                }
                Ok(())
            }
            SystemValue::VertexId => {
                let index = self.load_builtin(BuiltIn::VertexIndex, None, None)?;
                let value = if self.options.apply_base_vertex {
                    let base = self.load_draw_parameter(BuiltIn::BaseVertex)?;
                    let i32_ty = self.module.scalar_type(ScalarType::I32);
                    let id = self.module.i_sub(i32_ty, None, index.id, base.id)?;
                    RegisterValue { ty: index.ty, id }
                } else {
                    index
                };
                self.write_input_reg(None, reg, mask, value)
            }
            SystemValue::InstanceId => {
                let index = self.load_builtin(BuiltIn::InstanceIndex, None, None)?;
                let base = self.load_draw_parameter(BuiltIn::BaseInstance)?;
                let i32_ty = self.module.scalar_type(ScalarType::I32);
                let id = self.module.i_sub(i32_ty, None, index.id, base.id)?;
                self.write_input_reg(None, reg, mask, RegisterValue { ty: index.ty, id })
            }
            SystemValue::IsFrontFace => {
                let facing = self.load_builtin(BuiltIn::FrontFacing, None, None)?;
                let value = self.bool_to_mask(facing)?;
                self.write_input_reg(None, reg, mask, value)
            }
            SystemValue::SampleIndex => {
                let value = self.load_builtin(BuiltIn::SampleId, None, None)?;
                self.write_input_reg(None, reg, mask, value)
            }
            SystemValue::PrimitiveId => {
                if self.stage == ShaderStage::Pixel {
                    self.module.enable_capability(Capability::Geometry);
                }
                let value = self.load_builtin(BuiltIn::PrimitiveId, None, None)?;
                self.write_input_reg(None, reg, mask, value)
            }
            SystemValue::RenderTargetArrayIndex => {
                self.module.enable_capability(Capability::Geometry);
                let value = self.load_builtin(BuiltIn::Layer, None, None)?;
                self.write_input_reg(None, reg, mask, value)
            }
            SystemValue::ViewportArrayIndex => {
                self.module.enable_capability(Capability::MultiViewport);
                let value = self.load_builtin(BuiltIn::ViewportIndex, None, None)?;
                self.write_input_reg(None, reg, mask, value)
            }
            other => {
                tracing::warn!(reg, sv = ?other, "system value input is not wired; reading zero");
                Ok(())
            }
        }
    }

    fn load_draw_parameter(&mut self, builtin: BuiltIn) -> Result<RegisterValue, CompileError> {
        self.module.enable_capability(Capability::DrawParameters);
        if self.module.version() < (1, 3) {
            self.module.enable_extension("SPV_KHR_shader_draw_parameters");
        }
        self.load_builtin(builtin, None, None)
    }

    fn emit_clip_cull_input(&mut self, sv: SystemValue) -> Result<(), CompileError> {
        let (builtin, count) = match sv {
            SystemValue::ClipDistance => (BuiltIn::ClipDistance, self.analysis.clip_cull_in.clip),
            _ => (BuiltIn::CullDistance, self.analysis.clip_cull_in.cull),
        };
        if count == 0 || !self.routes_to_builtin(IoKind::Input, sv) {
            return Ok(());
        }
        let layout = self.isgn.clip_cull_layout(sv);
        let mut index = 0;
        for (reg, mask) in layout {
            let declared = self.inputs.contains_key(&reg);
            for component in mask.components() {
                if index >= count {
                    break;
                }
                if declared {
                    let element = self.module.const_u32(index);
                    let vertices = self.input_vertex_count();
                    if vertices == 0 {
                        let value = self.load_builtin(builtin, None, Some(element))?;
                        self.write_input_reg(None, reg, WriteMask::component(component), value)?;
                    } else {
                        for vertex in 0..vertices {
                            let v = self.module.const_u32(vertex);
                            let value = self.load_builtin(builtin, Some(v), Some(element))?;
                            self.write_input_reg(Some(vertex), reg, WriteMask::component(component), value)?;
                        }
                    }
                }
                index += 1;
            }
        }
        Ok(())
    }

    /// Copies the private `o#` array into output variables and built-ins.
    pub(super) fn emit_output_setup(&mut self) -> Result<(), CompileError> {
        let outputs: Vec<(u32, IoRegister)> =
            self.outputs.iter().map(|(&r, io)| (r, io.clone())).collect();

        for (reg, io) in &outputs {
            let reg_id = self.module.const_u32(*reg);
            let src = self.output_reg_ptr(reg_id)?;
            let value = self.load_ptr(src)?;

            if let Some(var) = io.var {
                let user = io.user_mask();
                let typed = self.bitcast(value, var.ty.ctype)?;
                let picked = self.select_mask(typed, user)?;
                let dst = self.chain(var.ty, StorageClass::Output, var.id, &[])?;
                self.store_masked(dst, picked, user)?;
            }

            for &(mask, sv) in &io.sysvalues {
                match sv {
                    SystemValue::Position => {
                        let picked = self.select_mask(value, mask)?;
                        let dst = self.builtin_ptr(BuiltIn::Position, StorageClass::Output, None, None)?;
                        self.store_masked(dst, picked, mask)?;
                    }
                    SystemValue::RenderTargetArrayIndex | SystemValue::ViewportArrayIndex => {
                        let builtin = if sv == SystemValue::RenderTargetArrayIndex {
                            BuiltIn::Layer
                        } else {
                            BuiltIn::ViewportIndex
                        };
                        self.enable_layer_output(builtin);
                        let component = self.extract(value, mask.first().unwrap_or(0))?;
                        let dst = self.builtin_ptr(builtin, StorageClass::Output, None, None)?;
                        self.store_masked(dst, component, WriteMask::X)?;
                    }
                    _ => {}
                }
            }
        }

        for sv in [SystemValue::ClipDistance, SystemValue::CullDistance] {
            self.emit_clip_cull_output(sv)?;
        }
        Ok(())
    }

    fn enable_layer_output(&mut self, builtin: BuiltIn) {
        if self.stage == ShaderStage::Geometry {
            let capability = if builtin == BuiltIn::Layer {
                Capability::Geometry
            } else {
                Capability::MultiViewport
            };
            self.module.enable_capability(capability);
        } else {
            self.module
                .enable_capability(Capability::ShaderViewportIndexLayerEXT);
            self.module
                .enable_extension("SPV_EXT_shader_viewport_index_layer");
        }
    }

    fn emit_clip_cull_output(&mut self, sv: SystemValue) -> Result<(), CompileError> {
        let (builtin, count) = match sv {
            SystemValue::ClipDistance => (BuiltIn::ClipDistance, self.analysis.clip_cull_out.clip),
            _ => (BuiltIn::CullDistance, self.analysis.clip_cull_out.cull),
        };
        if count == 0 || !self.routes_to_builtin(IoKind::Output, sv) {
            return Ok(());
        }
        let layout = self.osgn.clip_cull_layout(sv);
        let mut index = 0;
        for (reg, mask) in layout {
            let reg_id = self.module.const_u32(reg);
            let src = self.output_reg_ptr(reg_id)?;
            let value = self.load_ptr(src)?;
            for component in mask.components() {
                if index >= count {
                    break;
                }
                let scalar = self.extract(value, component)?;
                let element = self.module.const_u32(index);
                let dst = self.builtin_ptr(builtin, StorageClass::Output, None, Some(element))?;
                self.store_masked(dst, scalar, WriteMask::X)?;
                index += 1;
            }
        }
        Ok(())
    }

    /// Copies hull patch constants into patch outputs and tessellation levels.
    pub(super) fn emit_patch_output_setup(&mut self, max_tess_factor: f32) -> Result<(), CompileError> {
        let outputs: Vec<(u32, IoRegister)> =
            self.patch_outputs.iter().map(|(&r, io)| (r, io.clone())).collect();

        for (reg, io) in &outputs {
            let reg_id = self.module.const_u32(*reg);
            let src = self.patch_reg_ptr(reg_id)?;
            let value = self.load_ptr(src)?;

            if let Some(var) = io.var {
                let user = io.user_mask();
                let picked = self.select_mask(value, user)?;
                let dst = self.chain(var.ty, StorageClass::Output, var.id, &[])?;
                self.store_masked(dst, picked, user)?;
            }

            for &(mask, sv) in &io.sysvalues {
                let Some((level, index)) = sv.tess_level() else {
                    continue;
                };
                let builtin = match level {
                    TessLevel::Outer => BuiltIn::TessLevelOuter,
                    TessLevel::Inner => BuiltIn::TessLevelInner,
                };
                let factor = self.extract(value, mask.first().unwrap_or(0))?;
                let max = self.module.const_f32(max_tess_factor);
                let clamped = self.glsl(GLOp::NMin, factor.ty, &[factor.id, max])?;
                let element = self.module.const_u32(index);
                let dst = self.builtin_ptr(builtin, StorageClass::Output, None, Some(element))?;
                self.store_masked(dst, clamped, WriteMask::X)?;
            }
        }
        Ok(())
    }

    /// Declares control-point inputs and outputs for every input-signature
    /// register and copies them through unchanged.
    pub(super) fn emit_control_point_passthrough(&mut self) -> Result<(), CompileError> {
        let registers: Vec<(u32, WriteMask)> = {
            let mut regs: Vec<(u32, WriteMask)> = Vec::new();
            for element in self.isgn.iter() {
                match regs.iter_mut().find(|(r, _)| *r == element.register) {
                    Some((_, mask)) => *mask |= element.mask,
                    None => regs.push((element.register, element.mask)),
                }
            }
            regs
        };

        let invocation = self.invocation_id()?;
        for (reg, mask) in registers {
            if reg >= MAX_IO_REGISTERS {
                continue;
            }
            if self.inputs.get(&reg).and_then(|io| io.var).is_none() {
                let var = self.create_location_var(IoKind::Input, reg, InterpolationMode::Undefined)?;
                let entry = self.inputs.entry(reg).or_default();
                entry.mask |= mask;
                entry.var = Some(var);
            }
            if self.outputs.get(&reg).and_then(|io| io.var).is_none() {
                let var = self.create_location_var(IoKind::Output, reg, InterpolationMode::Undefined)?;
                let entry = self.outputs.entry(reg).or_default();
                entry.mask |= mask;
                entry.var = Some(var);
            }
            let (Some(input), Some(output)) = (
                self.inputs.get(&reg).and_then(|io| io.var),
                self.outputs.get(&reg).and_then(|io| io.var),
            ) else {
                continue;
            };
            let src = self.chain(input.ty, StorageClass::Input, input.id, &[invocation])?;
            let value = self.load_ptr(src)?;
            let dst = self.chain(output.ty, StorageClass::Output, output.id, &[invocation])?;
            self.store_masked(dst, value, WriteMask::XYZW)?;
        }
        Ok(())
    }

    /// Interface metadata reported on the artifact.
    pub(super) fn interface_slots(&self) -> InterfaceSlots {
        fn slots(map: &std::collections::BTreeMap<u32, IoRegister>) -> u32 {
            map.iter()
                .filter(|(_, io)| io.var.is_some())
                .fold(0, |acc, (&reg, _)| acc | (1 << reg))
        }
        fn describe(
            map: &std::collections::BTreeMap<u32, IoRegister>,
            signature: &Signature,
        ) -> Vec<InterfaceRegister> {
            map.keys()
                .flat_map(|&reg| signature.elements_for(reg))
                .map(|e| InterfaceRegister {
                    register: e.register,
                    mask: e.mask,
                    semantic_name: e.semantic_name.clone(),
                    semantic_index: e.semantic_index,
                    system_value: e.system_value,
                })
                .collect()
        }

        InterfaceSlots {
            input_slots: slots(&self.inputs),
            output_slots: slots(&self.outputs),
            patch_slots: slots(&self.patch_inputs) | slots(&self.patch_outputs),
            inputs: describe(&self.inputs, self.isgn),
            outputs: describe(&self.outputs, self.osgn),
        }
    }
}
