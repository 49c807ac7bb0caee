//! Per-stage state, stage-specific declarations and the entry point.

use rspirv::spirv::{
    Capability, ExecutionMode, ExecutionModel, FunctionControl, MemorySemantics, Scope, Word,
};

use super::hull::HsState;
use super::module::ScalarType;
use super::Compiler;
use crate::sm4::opcode::*;
use crate::sm4::ShaderStage;
use crate::sm4_ir::{OperandType, Sm4Instruction};
use crate::CompileError;

/// `dcl_globalFlags` bit enabling early depth/stencil.
const GLOBAL_FLAG_FORCE_EARLY_DEPTH_STENCIL: u32 = 1 << 2;

#[derive(Debug, Clone, Default)]
pub(super) struct VsState {
    pub function: Word,
}

#[derive(Debug, Clone, Default)]
pub(super) struct PsState {
    pub function: Word,
    pub depth_mode: Option<ExecutionMode>,
    pub early_fragment_tests: bool,
}

#[derive(Debug, Clone)]
pub(super) struct CsState {
    pub function: Word,
    pub local_size: [u32; 3],
}

#[derive(Debug, Clone)]
pub(super) struct GsState {
    pub function: Word,
    pub input_vertices: u32,
    pub input_primitive: Option<ExecutionMode>,
    pub output_topology: Option<ExecutionMode>,
    pub max_output_vertices: u32,
    pub instance_count: u32,
}

#[derive(Debug, Clone, Default)]
pub(super) struct DsState {
    pub function: Word,
    pub vertex_count_in: u32,
    pub domain: Option<ExecutionMode>,
}

#[derive(Debug, Clone)]
pub(super) enum StageState {
    Vertex(VsState),
    Pixel(PsState),
    Compute(CsState),
    Geometry(GsState),
    Domain(DsState),
    Hull(HsState),
}

impl StageState {
    pub fn new(stage: ShaderStage) -> Result<Self, CompileError> {
        Ok(match stage {
            ShaderStage::Vertex => StageState::Vertex(VsState::default()),
            ShaderStage::Pixel => StageState::Pixel(PsState::default()),
            ShaderStage::Compute => StageState::Compute(CsState {
                function: 0,
                local_size: [1, 1, 1],
            }),
            ShaderStage::Geometry => StageState::Geometry(GsState {
                function: 0,
                input_vertices: 0,
                input_primitive: None,
                output_topology: None,
                max_output_vertices: 0,
                instance_count: 1,
            }),
            ShaderStage::Domain => StageState::Domain(DsState::default()),
            ShaderStage::Hull => StageState::Hull(HsState::default()),
            ShaderStage::Unknown(_) => return Err(CompileError::UnsupportedStage(stage)),
        })
    }

    /// Body function of single-function stages.
    pub fn function(&self) -> Option<Word> {
        match self {
            StageState::Vertex(s) => Some(s.function),
            StageState::Pixel(s) => Some(s.function),
            StageState::Compute(s) => Some(s.function),
            StageState::Geometry(s) => Some(s.function),
            StageState::Domain(s) => Some(s.function),
            StageState::Hull(_) => None,
        }
    }

    pub fn set_function(&mut self, function: Word) {
        match self {
            StageState::Vertex(s) => s.function = function,
            StageState::Pixel(s) => s.function = function,
            StageState::Compute(s) => s.function = function,
            StageState::Geometry(s) => s.function = function,
            StageState::Domain(s) => s.function = function,
            StageState::Hull(_) => {}
        }
    }

    /// Declared vertices per input primitive or patch; 0 when undeclared.
    pub fn input_vertex_count(&self) -> u32 {
        match self {
            StageState::Geometry(s) => s.input_vertices,
            StageState::Domain(s) => s.vertex_count_in,
            StageState::Hull(s) => s.vertex_count_in,
            _ => 0,
        }
    }

    pub fn output_vertex_count(&self) -> u32 {
        match self {
            StageState::Hull(s) => s.vertex_count_out.max(1),
            _ => 0,
        }
    }

    pub fn phase_instance_id(&self) -> Option<Word> {
        match self {
            StageState::Hull(s) => s.current_instance_id(),
            _ => None,
        }
    }

    pub fn in_control_point_phase(&self) -> bool {
        matches!(self, StageState::Hull(s) if s.in_control_point_phase())
    }

    pub fn set_depth_mode(&mut self, ty: OperandType) {
        if let StageState::Pixel(ps) = self {
            ps.depth_mode = Some(match ty {
                OperandType::OutputDepthGreaterEqual => ExecutionMode::DepthGreater,
                OperandType::OutputDepthLessEqual => ExecutionMode::DepthLess,
                _ => ExecutionMode::DepthReplacing,
            });
        }
    }

    pub fn hull(&self) -> Option<&HsState> {
        match self {
            StageState::Hull(s) => Some(s),
            _ => None,
        }
    }

    pub fn hull_mut(&mut self) -> Option<&mut HsState> {
        match self {
            StageState::Hull(s) => Some(s),
            _ => None,
        }
    }
}

pub(super) fn tess_domain_mode(raw: u32) -> Option<ExecutionMode> {
    match raw {
        1 => Some(ExecutionMode::Isolines),
        2 => Some(ExecutionMode::Triangles),
        3 => Some(ExecutionMode::Quads),
        _ => None,
    }
}

fn gs_input_primitive(raw: u32) -> Option<(ExecutionMode, u32)> {
    match raw {
        1 => Some((ExecutionMode::InputPoints, 1)),
        2 => Some((ExecutionMode::InputLines, 2)),
        3 => Some((ExecutionMode::Triangles, 3)),
        6 => Some((ExecutionMode::InputLinesAdjacency, 4)),
        7 => Some((ExecutionMode::InputTrianglesAdjacency, 6)),
        _ => None,
    }
}

fn gs_output_topology(raw: u32) -> Option<ExecutionMode> {
    match raw {
        1 => Some(ExecutionMode::OutputPoints),
        3 => Some(ExecutionMode::OutputLineStrip),
        5 => Some(ExecutionMode::OutputTriangleStrip),
        _ => None,
    }
}

impl Compiler<'_> {
    /// Stage-wide declarations. Returns `false` for opcodes handled elsewhere.
    pub(super) fn emit_stage_declaration(&mut self, inst: &Sm4Instruction) -> Result<bool, CompileError> {
        let stage_wide = matches!(
            inst.opcode,
            OPCODE_DCL_GLOBAL_FLAGS
                | OPCODE_DCL_THREAD_GROUP
                | OPCODE_DCL_GS_INPUT_PRIMITIVE
                | OPCODE_DCL_GS_OUTPUT_PRIMITIVE_TOPOLOGY
                | OPCODE_DCL_MAX_OUTPUT_VERTEX_COUNT
                | OPCODE_DCL_GS_INSTANCE_COUNT
                | OPCODE_DCL_STREAM
                | OPCODE_DCL_INPUT_CONTROL_POINT_COUNT
                | OPCODE_DCL_OUTPUT_CONTROL_POINT_COUNT
                | OPCODE_DCL_TESS_DOMAIN
                | OPCODE_DCL_TESS_PARTITIONING
                | OPCODE_DCL_TESS_OUTPUT_PRIMITIVE
                | OPCODE_DCL_HS_MAX_TESSFACTOR
                | OPCODE_DCL_HS_FORK_PHASE_INSTANCE_COUNT
                | OPCODE_DCL_HS_JOIN_PHASE_INSTANCE_COUNT
        );
        if !stage_wide {
            return Ok(false);
        }
        if self.stage == ShaderStage::Hull && inst.opcode != OPCODE_DCL_GLOBAL_FLAGS {
            self.emit_hs_declaration(inst)?;
            return Ok(true);
        }
        if inst.opcode == OPCODE_DCL_STREAM && self.stage == ShaderStage::Geometry {
            let stream = inst.dst.first().and_then(|op| op.index(0)).unwrap_or(0);
            if stream != 0 {
                return Err(self.unsupported(inst));
            }
            return Ok(true);
        }
        if inst.opcode == OPCODE_DCL_GS_INPUT_PRIMITIVE && self.stage == ShaderStage::Geometry {
            let raw = inst.gs_input_primitive();
            if gs_input_primitive(raw).is_none() {
                return Err(CompileError::invalid(format!(
                    "unsupported geometry input primitive {raw}"
                )));
            }
        }
        if inst.opcode == OPCODE_DCL_GS_OUTPUT_PRIMITIVE_TOPOLOGY && self.stage == ShaderStage::Geometry {
            let raw = inst.gs_output_topology();
            if gs_output_topology(raw).is_none() {
                return Err(CompileError::invalid(format!(
                    "unsupported geometry output topology {raw}"
                )));
            }
        }

        let first_imm = inst.imm.first().copied().unwrap_or(0);
        let applied = match &mut self.state {
            StageState::Pixel(ps) if inst.opcode == OPCODE_DCL_GLOBAL_FLAGS => {
                ps.early_fragment_tests =
                    inst.global_flags() & GLOBAL_FLAG_FORCE_EARLY_DEPTH_STENCIL != 0;
                true
            }
            _ if inst.opcode == OPCODE_DCL_GLOBAL_FLAGS => true,
            StageState::Compute(cs) if inst.opcode == OPCODE_DCL_THREAD_GROUP => {
                for (size, &value) in cs.local_size.iter_mut().zip(&inst.imm) {
                    *size = value.max(1);
                }
                true
            }
            StageState::Geometry(gs) => match inst.opcode {
                OPCODE_DCL_GS_INPUT_PRIMITIVE => {
                    if let Some((mode, vertices)) = gs_input_primitive(inst.gs_input_primitive()) {
                        gs.input_primitive = Some(mode);
                        gs.input_vertices = vertices;
                    }
                    true
                }
                OPCODE_DCL_GS_OUTPUT_PRIMITIVE_TOPOLOGY => {
                    gs.output_topology = gs_output_topology(inst.gs_output_topology());
                    true
                }
                OPCODE_DCL_MAX_OUTPUT_VERTEX_COUNT => {
                    gs.max_output_vertices = first_imm;
                    true
                }
                OPCODE_DCL_GS_INSTANCE_COUNT => {
                    gs.instance_count = first_imm.max(1);
                    true
                }
                _ => false,
            },
            StageState::Domain(ds) => match inst.opcode {
                OPCODE_DCL_INPUT_CONTROL_POINT_COUNT => {
                    ds.vertex_count_in = inst.control_point_count();
                    true
                }
                OPCODE_DCL_TESS_DOMAIN => {
                    ds.domain = tess_domain_mode(inst.tess_domain());
                    true
                }
                OPCODE_DCL_TESS_PARTITIONING | OPCODE_DCL_TESS_OUTPUT_PRIMITIVE => true,
                _ => false,
            },
            _ => false,
        };

        if !applied {
            tracing::warn!(
                stage = %self.stage,
                opcode = inst.name(),
                "declaration does not apply to this stage; ignored"
            );
        }
        Ok(true)
    }

    /// `emit`, `cut` and their stream forms.
    pub(super) fn emit_geometry_emit(&mut self, inst: &Sm4Instruction) -> Result<(), CompileError> {
        if self.stage != ShaderStage::Geometry {
            return Err(CompileError::invalid(format!(
                "{} outside a geometry shader",
                inst.name()
            )));
        }
        if let Some(stream) = inst.dst.first() {
            if stream.index(0) != Some(0) {
                return Err(self.unsupported(inst));
            }
        }

        let (emit, cut) = match inst.opcode {
            OPCODE_EMIT | OPCODE_EMIT_STREAM => (true, false),
            OPCODE_CUT | OPCODE_CUT_STREAM => (false, true),
            _ => (true, true),
        };
        if emit {
            self.emit_output_setup()?;
            self.module.emit_vertex()?;
        }
        if cut {
            self.module.end_primitive()?;
        }
        Ok(())
    }

    /// Zeroes every `g#` array, then waits for the whole workgroup.
    fn emit_workgroup_zero_init(&mut self) -> Result<(), CompileError> {
        let arrays: Vec<_> = self.tgsm.values().copied().collect();
        if arrays.is_empty() {
            return Ok(());
        }
        let u32_ty = self.module.scalar_type(ScalarType::U32);
        for tgsm in arrays {
            let array_ty = self.module.array_of(u32_ty, tgsm.length);
            let zero = self.module.const_null(array_ty);
            self.module.store(tgsm.var, zero, None, [])?;
        }
        let workgroup = self.module.const_u32(Scope::Workgroup as u32);
        let semantics = self.module.const_u32(
            (MemorySemantics::ACQUIRE_RELEASE | MemorySemantics::WORKGROUP_MEMORY).bits(),
        );
        self.module.control_barrier(workgroup, workgroup, semantics)?;
        Ok(())
    }

    /// Entry function for every stage except hull: input setup, the body,
    /// output setup.
    fn emit_single_function_entry(&mut self, body: Word) -> Result<(), CompileError> {
        let void = self.module.void_type();
        let fn_ty = self.module.void_function_type();
        self.module
            .begin_function(void, Some(self.entry_point), FunctionControl::NONE, fn_ty)?;
        self.module.begin_block(None)?;

        if self.stage == ShaderStage::Compute && self.options.zero_init_workgroup_memory {
            self.emit_workgroup_zero_init()?;
        }
        self.emit_input_setup()?;
        self.module.function_call(void, None, body, [])?;
        if self.stage != ShaderStage::Geometry {
            self.emit_output_setup()?;
        }

        self.module.ret()?;
        self.module.end_function()?;
        Ok(())
    }

    fn execution_model(&self) -> ExecutionModel {
        match self.stage {
            ShaderStage::Vertex => ExecutionModel::Vertex,
            ShaderStage::Pixel => ExecutionModel::Fragment,
            ShaderStage::Geometry => ExecutionModel::Geometry,
            ShaderStage::Hull => ExecutionModel::TessellationControl,
            ShaderStage::Domain => ExecutionModel::TessellationEvaluation,
            ShaderStage::Compute | ShaderStage::Unknown(_) => ExecutionModel::GLCompute,
        }
    }

    fn execution_modes(&mut self) -> Result<Vec<(ExecutionMode, Vec<u32>)>, CompileError> {
        let mut modes = Vec::new();
        match &self.state {
            StageState::Vertex(_) => {}
            StageState::Pixel(ps) => {
                modes.push((ExecutionMode::OriginUpperLeft, vec![]));
                if let Some(depth) = ps.depth_mode {
                    modes.push((ExecutionMode::DepthReplacing, vec![]));
                    if depth != ExecutionMode::DepthReplacing {
                        modes.push((depth, vec![]));
                    }
                }
                if ps.early_fragment_tests {
                    modes.push((ExecutionMode::EarlyFragmentTests, vec![]));
                }
            }
            StageState::Compute(cs) => {
                modes.push((ExecutionMode::LocalSize, cs.local_size.to_vec()));
            }
            StageState::Geometry(gs) => {
                let input = gs
                    .input_primitive
                    .ok_or_else(|| CompileError::invalid("geometry shader without dcl_inputprimitive"))?;
                let output = gs
                    .output_topology
                    .ok_or_else(|| CompileError::invalid("geometry shader without dcl_outputtopology"))?;
                modes.push((ExecutionMode::Invocations, vec![gs.instance_count]));
                modes.push((input, vec![]));
                modes.push((output, vec![]));
                modes.push((ExecutionMode::OutputVertices, vec![gs.max_output_vertices]));
            }
            StageState::Domain(ds) => {
                if let Some(domain) = ds.domain {
                    modes.push((domain, vec![]));
                }
            }
            StageState::Hull(hs) => modes.extend(hs.execution_modes()),
        }
        Ok(modes)
    }

    /// Emits the entry function, `OpEntryPoint` and execution modes.
    pub(super) fn emit_entry_point(&mut self) -> Result<(), CompileError> {
        match self.stage {
            ShaderStage::Hull => self.emit_hull_entry()?,
            _ => {
                let body = self
                    .state
                    .function()
                    .ok_or_else(|| CompileError::invalid("missing body function"))?;
                self.emit_single_function_entry(body)?;
            }
        }

        match self.stage {
            ShaderStage::Geometry => self.module.enable_capability(Capability::Geometry),
            ShaderStage::Hull | ShaderStage::Domain => {
                self.module.enable_capability(Capability::Tessellation)
            }
            _ => {}
        }

        let modes = self.execution_modes()?;
        let model = self.execution_model();
        let interface = self.module.interface_variables();
        let name = self.options.entry_point_name.clone();
        self.module.entry_point(model, self.entry_point, name, interface);
        for (mode, params) in modes {
            self.module.execution_mode(self.entry_point, mode, params);
        }
        Ok(())
    }
}
