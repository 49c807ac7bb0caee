//! DXBC → SPIR-V translation.
//!
//! [`Compiler`] consumes decoded instructions one at a time and appends to an
//! [`rspirv`] module. Declarations update compiler state; everything else is
//! emitted into the current body function (one per stage, or one per hull
//! phase). [`Compiler::finalize`] then writes the entry point that copies
//! interface variables around the body and returns the finished artifact.

mod alu;
mod control_flow;
mod hull;
mod interface;
pub(crate) mod module;
mod registers;
mod resources;
mod stages;
mod values;

use std::collections::BTreeMap;

use rspirv::spirv::{FunctionControl, Word};

use self::control_flow::ControlFlowBlock;
use self::interface::{BuiltinVar, IoRegister};
use self::module::SpirvModule;
use self::registers::{IndexableTemp, ThreadGroupMemory};
use self::resources::{ConstantBuffer, ResourceBinding};
use self::stages::StageState;
use crate::analysis::AnalysisInfo;
use crate::artifact::{ResourceSlot, ShaderArtifact};
use crate::options::CompilerOptions;
use crate::signature::Signature;
use crate::sm4::opcode::*;
use crate::sm4::ShaderStage;
use crate::sm4_ir::{Sm4CustomData, Sm4Instruction, Sm4Operand};
use crate::CompileError;

pub(super) fn src(inst: &Sm4Instruction, n: usize) -> Result<&Sm4Operand, CompileError> {
    inst.src.get(n).ok_or_else(|| {
        CompileError::invalid(format!("{} is missing source operand {n}", inst.name()))
    })
}

pub(super) fn dst(inst: &Sm4Instruction, n: usize) -> Result<&Sm4Operand, CompileError> {
    inst.dst.get(n).ok_or_else(|| {
        CompileError::invalid(format!("{} is missing destination operand {n}", inst.name()))
    })
}

/// Translation state for one shader.
pub struct Compiler<'a> {
    module: SpirvModule,
    stage: ShaderStage,
    options: &'a CompilerOptions,
    isgn: &'a Signature,
    osgn: &'a Signature,
    psgn: &'a Signature,
    analysis: &'a AnalysisInfo,

    entry_point: Word,
    state: StageState,
    /// Whether a body function is open for executable instructions.
    in_function: bool,
    control_flow: Vec<ControlFlowBlock>,
    last_opcode: Option<u32>,

    temps: Vec<Word>,
    indexable_temps: BTreeMap<u32, IndexableTemp>,
    tgsm: BTreeMap<u32, ThreadGroupMemory>,
    icb: Option<Word>,
    v_regs: Option<Word>,
    o_regs: Option<Word>,
    patch_regs: Option<Word>,

    inputs: BTreeMap<u32, IoRegister>,
    outputs: BTreeMap<u32, IoRegister>,
    patch_inputs: BTreeMap<u32, IoRegister>,
    patch_outputs: BTreeMap<u32, IoRegister>,
    builtins: BTreeMap<(u32, u32), BuiltinVar>,

    constant_buffers: BTreeMap<u32, ConstantBuffer>,
    samplers: BTreeMap<u32, Word>,
    textures: BTreeMap<u32, ResourceBinding>,
    uavs: BTreeMap<u32, ResourceBinding>,
    /// Artifact binding table, keyed by binding.
    slots: BTreeMap<u32, ResourceSlot>,
}

impl<'a> Compiler<'a> {
    pub fn new(
        stage: ShaderStage,
        options: &'a CompilerOptions,
        isgn: &'a Signature,
        osgn: &'a Signature,
        psgn: &'a Signature,
        analysis: &'a AnalysisInfo,
    ) -> Result<Self, CompileError> {
        let state = StageState::new(stage)?;
        let mut module = SpirvModule::new(options.spirv_version, options.strip_debug_names);
        let entry_point = module.id();

        let mut compiler = Self {
            module,
            stage,
            options,
            isgn,
            osgn,
            psgn,
            analysis,
            entry_point,
            state,
            in_function: false,
            control_flow: Vec::new(),
            last_opcode: None,
            temps: Vec::new(),
            indexable_temps: BTreeMap::new(),
            tgsm: BTreeMap::new(),
            icb: None,
            v_regs: None,
            o_regs: None,
            patch_regs: None,
            inputs: BTreeMap::new(),
            outputs: BTreeMap::new(),
            patch_inputs: BTreeMap::new(),
            patch_outputs: BTreeMap::new(),
            builtins: BTreeMap::new(),
            constant_buffers: BTreeMap::new(),
            samplers: BTreeMap::new(),
            textures: BTreeMap::new(),
            uavs: BTreeMap::new(),
            slots: BTreeMap::new(),
        };

        let name = compiler.options.entry_point_name.clone();
        compiler.module.set_debug_name(entry_point, &name);
        if stage != ShaderStage::Hull {
            let function = compiler.begin_body_function(&format!("{}_main", stage.prefix()))?;
            compiler.state.set_function(function);
        }
        Ok(compiler)
    }

    pub(super) fn unsupported(&self, inst: &Sm4Instruction) -> CompileError {
        CompileError::UnsupportedInstruction {
            opcode: inst.opcode,
            name: inst.name(),
            at_dword: inst.at_dword,
            stage: self.stage,
        }
    }

    /// Opens a `void()` function with an entry block.
    pub(super) fn begin_body_function(&mut self, name: &str) -> Result<Word, CompileError> {
        let void = self.module.void_type();
        let fn_ty = self.module.void_function_type();
        let function = self
            .module
            .begin_function(void, None, FunctionControl::NONE, fn_ty)?;
        self.module.set_debug_name(function, name);
        self.module.begin_block(None)?;
        self.in_function = true;
        Ok(function)
    }

    /// Terminates and closes the open body function, if any.
    pub(super) fn close_body_function(&mut self) -> Result<(), CompileError> {
        if !self.in_function {
            return Ok(());
        }
        if !self.control_flow.is_empty() {
            return Err(CompileError::invalid(format!(
                "{} control-flow blocks left open at the end of a function",
                self.control_flow.len()
            )));
        }
        if self.module.selected_block().is_some() {
            self.module.ret()?;
        }
        self.module.end_function()?;
        self.in_function = false;
        Ok(())
    }

    /// Translates one instruction.
    pub fn process_instruction(&mut self, inst: &Sm4Instruction) -> Result<(), CompileError> {
        tracing::trace!(
            at = inst.at_dword,
            opcode = inst.name(),
            depth = self.control_flow.len(),
            "translating instruction"
        );

        match inst.class {
            InstClass::Declaration => self.emit_declaration(inst)?,
            InstClass::CustomData => self.emit_custom_data(inst)?,
            InstClass::HullShaderPhase => self.emit_hs_phase(inst)?,
            InstClass::Float64 | InstClass::TextureQueryMsPos => return Err(self.unsupported(inst)),
            _ => {
                if !self.in_function {
                    return Err(CompileError::invalid(format!(
                        "{} outside of a shader body",
                        inst.name()
                    )));
                }
                self.emit_executable(inst)?;
            }
        }
        self.last_opcode = Some(inst.opcode);
        Ok(())
    }

    fn emit_executable(&mut self, inst: &Sm4Instruction) -> Result<(), CompileError> {
        match inst.class {
            InstClass::NoOperation => Ok(()),
            InstClass::ControlFlow => self.emit_control_flow(inst),
            InstClass::GeometryEmit => self.emit_geometry_emit(inst),
            InstClass::Atomic => self.emit_atomic(inst),
            InstClass::AtomicCounter => self.emit_atomic_counter(inst),
            InstClass::Barrier => self.emit_sync(inst),
            InstClass::BufferQuery => self.emit_bufinfo(inst),
            InstClass::BufferLoad => self.emit_buffer_load(inst),
            InstClass::BufferStore => self.emit_buffer_store(inst),
            InstClass::Interpolate => self.emit_interpolate(inst),
            InstClass::TextureQuery => self.emit_resinfo(inst),
            InstClass::TextureQueryLod => self.emit_query_lod(inst),
            InstClass::TextureQueryMs => self.emit_sample_info(inst),
            InstClass::TextureFetch => self.emit_fetch(inst),
            InstClass::TextureGather => self.emit_gather(inst),
            InstClass::TextureSample => self.emit_sample(inst),
            InstClass::TypedUavLoad => self.emit_typed_uav_load(inst),
            InstClass::TypedUavStore => self.emit_typed_uav_store(inst),
            InstClass::VectorAlu
            | InstClass::VectorCmov
            | InstClass::VectorCmp
            | InstClass::VectorDeriv
            | InstClass::VectorDot
            | InstClass::VectorIdiv
            | InstClass::VectorImul
            | InstClass::VectorShift
            | InstClass::VectorSinCos
            | InstClass::BitExtract
            | InstClass::BitInsert
            | InstClass::ConvertFloat16 => self.emit_alu(inst),
            _ => Err(self.unsupported(inst)),
        }
    }

    fn emit_declaration(&mut self, inst: &Sm4Instruction) -> Result<(), CompileError> {
        if self.emit_stage_declaration(inst)? {
            return Ok(());
        }
        let imm = |n: usize| inst.imm.get(n).copied().unwrap_or(0);
        match inst.opcode {
            OPCODE_DCL_TEMPS => self.declare_temps(imm(0))?,
            OPCODE_DCL_INDEXABLE_TEMP => self.declare_indexable_temp(imm(0), imm(1))?,
            OPCODE_DCL_TGSM_RAW => {
                let reg = dst(inst, 0)?.index(0).unwrap_or(0);
                self.declare_thread_group_memory(reg, 0, imm(0) / 4)?;
            }
            OPCODE_DCL_TGSM_STRUCTURED => {
                let reg = dst(inst, 0)?.index(0).unwrap_or(0);
                let (stride, count) = (imm(0), imm(1));
                let length = (stride / 4).checked_mul(count).ok_or_else(|| {
                    CompileError::invalid(format!("g{reg} size overflows: stride {stride} x {count}"))
                })?;
                self.declare_thread_group_memory(reg, stride, length)?;
            }
            OPCODE_DCL_INPUT
            | OPCODE_DCL_INPUT_SGV
            | OPCODE_DCL_INPUT_SIV
            | OPCODE_DCL_INPUT_PS
            | OPCODE_DCL_INPUT_PS_SGV
            | OPCODE_DCL_INPUT_PS_SIV => self.emit_dcl_input(inst)?,
            OPCODE_DCL_OUTPUT | OPCODE_DCL_OUTPUT_SGV | OPCODE_DCL_OUTPUT_SIV => {
                self.emit_dcl_output(inst)?
            }
            OPCODE_DCL_CONSTANT_BUFFER => self.emit_dcl_constant_buffer(inst)?,
            OPCODE_DCL_SAMPLER => self.emit_dcl_sampler(inst)?,
            OPCODE_DCL_RESOURCE | OPCODE_DCL_RESOURCE_RAW | OPCODE_DCL_RESOURCE_STRUCTURED => {
                self.emit_dcl_resource(inst)?
            }
            OPCODE_DCL_UAV_TYPED | OPCODE_DCL_UAV_RAW | OPCODE_DCL_UAV_STRUCTURED => {
                self.emit_dcl_uav(inst)?
            }
            // Input and output registers already live in indexable arrays.
            OPCODE_DCL_INDEX_RANGE => {}
            OPCODE_DCL_FUNCTION_BODY | OPCODE_DCL_FUNCTION_TABLE | OPCODE_DCL_INTERFACE => {
                return Err(self.unsupported(inst));
            }
            _ => tracing::warn!(opcode = inst.name(), "declaration ignored"),
        }
        Ok(())
    }

    fn emit_custom_data(&mut self, inst: &Sm4Instruction) -> Result<(), CompileError> {
        match &inst.custom_data {
            Some(Sm4CustomData::ImmediateConstantBuffer(words)) => {
                self.emit_immediate_constant_buffer(words)
            }
            Some(Sm4CustomData::Other { class }) => {
                tracing::debug!(class, "customdata block skipped");
                Ok(())
            }
            None => Ok(()),
        }
    }

    /// Closes the body, writes the entry point and packages the module.
    pub fn finalize(mut self) -> Result<ShaderArtifact, CompileError> {
        if !self.control_flow.is_empty() {
            return Err(CompileError::invalid(format!(
                "{} control-flow blocks left open at the end of the shader",
                self.control_flow.len()
            )));
        }
        self.close_body_function()?;
        self.emit_entry_point()?;

        let interface = self.interface_slots();
        let entry_point = self.options.entry_point_name.clone();
        let slots: Vec<ResourceSlot> = std::mem::take(&mut self.slots).into_values().collect();
        let stage = self.stage;
        let code = self.module.into_words();

        tracing::debug!(
            %stage,
            words = code.len(),
            resources = slots.len(),
            input_slots = interface.input_slots,
            output_slots = interface.output_slots,
            "shader compiled"
        );
        Ok(ShaderArtifact::new(code, slots, interface, stage, entry_point))
    }
}
