//! Hull shader phases.
//!
//! A hull shader is a sequence of phases: declarations, an optional
//! control-point phase, then any number of fork and join phases. Each phase
//! becomes its own function. The entry point runs the control-point phase
//! once per output control point, synchronizes, and then runs the patch
//! constant phases on invocation 0 only.

use rspirv::spirv::{ExecutionMode, FunctionControl, LoopControl, Scope, SelectionControl, StorageClass, Word};

use super::interface::MAX_TESS_FACTOR;
use super::module::ScalarType;
use super::stages::tess_domain_mode;
use super::Compiler;
use crate::sm4::opcode::*;
use crate::sm4_ir::Sm4Instruction;
use crate::CompileError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(super) enum HsPhase {
    #[default]
    None,
    Decls,
    ControlPoint,
    Fork(usize),
    Join(usize),
}

#[derive(Debug, Clone, Copy)]
pub(super) struct HsForkJoinPhase {
    pub function: Word,
    pub instance_count: u32,
    /// Private `u32` read through `vForkInstanceID`/`vJoinInstanceID`.
    pub instance_id: Word,
}

#[derive(Debug, Clone)]
pub(super) struct HsState {
    pub phase: HsPhase,
    pub max_tess_factor: f32,
    pub vertex_count_in: u32,
    pub vertex_count_out: u32,
    pub domain: Option<ExecutionMode>,
    pub partitioning: Option<ExecutionMode>,
    pub output_primitive: Option<ExecutionMode>,
    pub point_mode: bool,
    pub control_point: Option<Word>,
    pub fork: Vec<HsForkJoinPhase>,
    pub join: Vec<HsForkJoinPhase>,
}

impl Default for HsState {
    fn default() -> Self {
        Self {
            phase: HsPhase::None,
            max_tess_factor: MAX_TESS_FACTOR,
            vertex_count_in: 0,
            vertex_count_out: 0,
            domain: None,
            partitioning: None,
            output_primitive: None,
            point_mode: false,
            control_point: None,
            fork: Vec::new(),
            join: Vec::new(),
        }
    }
}

impl HsState {
    pub fn in_control_point_phase(&self) -> bool {
        self.phase == HsPhase::ControlPoint
    }

    fn current_fork_join(&mut self) -> Option<&mut HsForkJoinPhase> {
        match self.phase {
            HsPhase::Fork(i) => self.fork.get_mut(i),
            HsPhase::Join(i) => self.join.get_mut(i),
            _ => None,
        }
    }

    pub fn current_instance_id(&self) -> Option<Word> {
        match self.phase {
            HsPhase::Fork(i) => self.fork.get(i).map(|p| p.instance_id),
            HsPhase::Join(i) => self.join.get(i).map(|p| p.instance_id),
            _ => None,
        }
    }

    pub fn execution_modes(&self) -> Vec<(ExecutionMode, Vec<u32>)> {
        let mut modes = vec![(ExecutionMode::OutputVertices, vec![self.vertex_count_out.max(1)])];
        modes.extend(self.partitioning.map(|m| (m, vec![])));
        if !self.point_mode {
            modes.extend(self.output_primitive.map(|m| (m, vec![])));
        }
        modes.extend(self.domain.map(|m| (m, vec![])));
        if self.point_mode {
            modes.push((ExecutionMode::PointMode, vec![]));
        }
        modes
    }
}

fn partitioning_mode(raw: u32) -> Option<ExecutionMode> {
    match raw {
        1 | 2 => Some(ExecutionMode::SpacingEqual),
        3 => Some(ExecutionMode::SpacingFractionalOdd),
        4 => Some(ExecutionMode::SpacingFractionalEven),
        _ => None,
    }
}

impl Compiler<'_> {
    fn hs_state(&mut self) -> Result<&mut HsState, CompileError> {
        self.state
            .hull_mut()
            .ok_or_else(|| CompileError::invalid("hull shader state requested outside a hull shader"))
    }

    pub(super) fn emit_hs_declaration(&mut self, inst: &Sm4Instruction) -> Result<(), CompileError> {
        let first_imm = inst.imm.first().copied().unwrap_or(0);
        let hs = self.hs_state()?;
        match inst.opcode {
            OPCODE_DCL_INPUT_CONTROL_POINT_COUNT => hs.vertex_count_in = inst.control_point_count(),
            OPCODE_DCL_OUTPUT_CONTROL_POINT_COUNT => hs.vertex_count_out = inst.control_point_count(),
            OPCODE_DCL_TESS_DOMAIN => hs.domain = tess_domain_mode(inst.tess_domain()),
            OPCODE_DCL_TESS_PARTITIONING => hs.partitioning = partitioning_mode(inst.tess_partitioning()),
            OPCODE_DCL_TESS_OUTPUT_PRIMITIVE => match inst.tess_output_primitive() {
                1 => hs.point_mode = true,
                // D3D winding is given in a y-down space.
                3 => hs.output_primitive = Some(ExecutionMode::VertexOrderCcw),
                4 => hs.output_primitive = Some(ExecutionMode::VertexOrderCw),
                _ => {}
            },
            OPCODE_DCL_HS_MAX_TESSFACTOR => {
                hs.max_tess_factor = f32::from_bits(first_imm).clamp(1.0, MAX_TESS_FACTOR);
            }
            OPCODE_DCL_HS_FORK_PHASE_INSTANCE_COUNT | OPCODE_DCL_HS_JOIN_PHASE_INSTANCE_COUNT => {
                match hs.current_fork_join() {
                    Some(phase) => phase.instance_count = first_imm.max(1),
                    None => {
                        return Err(CompileError::invalid(format!(
                            "{} outside a fork or join phase",
                            inst.name()
                        )))
                    }
                }
            }
            _ => {
                tracing::warn!(opcode = inst.name(), "declaration ignored in hull shader");
            }
        }
        Ok(())
    }

    /// `hs_decls`, `hs_control_point_phase`, `hs_fork_phase`, `hs_join_phase`.
    pub(super) fn emit_hs_phase(&mut self, inst: &Sm4Instruction) -> Result<(), CompileError> {
        self.hs_state()?;
        self.close_body_function()?;

        match inst.opcode {
            OPCODE_HS_DECLS => self.hs_state()?.phase = HsPhase::Decls,
            OPCODE_HS_CONTROL_POINT_PHASE => {
                if self.hs_state()?.control_point.is_some() {
                    return Err(CompileError::invalid(
                        "hull shader has more than one control point phase",
                    ));
                }
                let function = self.begin_body_function("hs_control_point")?;
                let hs = self.hs_state()?;
                hs.control_point = Some(function);
                hs.phase = HsPhase::ControlPoint;
            }
            OPCODE_HS_FORK_PHASE | OPCODE_HS_JOIN_PHASE => {
                let join = inst.opcode == OPCODE_HS_JOIN_PHASE;
                let (index, name) = {
                    let hs = self.hs_state()?;
                    if join {
                        (hs.join.len(), "join")
                    } else {
                        (hs.fork.len(), "fork")
                    }
                };

                let u32_ty = self.module.scalar_type(ScalarType::U32);
                let instance_id = self.module.new_variable(u32_ty, StorageClass::Private, None);
                self.module
                    .set_debug_name(instance_id, &format!("hs_{name}_{index}_instance"));
                let function = self.begin_body_function(&format!("hs_{name}_{index}"))?;

                let phase = HsForkJoinPhase {
                    function,
                    instance_count: 1,
                    instance_id,
                };
                let hs = self.hs_state()?;
                if join {
                    hs.join.push(phase);
                    hs.phase = HsPhase::Join(index);
                } else {
                    hs.fork.push(phase);
                    hs.phase = HsPhase::Fork(index);
                }
            }
            _ => return Err(self.unsupported(inst)),
        }
        Ok(())
    }

    /// Runs `phase` once per declared instance, storing the instance index
    /// before each call.
    fn emit_fork_join_call(&mut self, phase: HsForkJoinPhase) -> Result<(), CompileError> {
        let void = self.module.void_type();
        let zero = self.module.const_u32(0);
        self.module.store(phase.instance_id, zero, None, [])?;

        if phase.instance_count <= 1 {
            self.module.function_call(void, None, phase.function, [])?;
            return Ok(());
        }

        let u32_ty = self.module.scalar_type(ScalarType::U32);
        let bool_ty = self.module.scalar_type(ScalarType::Bool);
        let header = self.module.id();
        let check = self.module.id();
        let body = self.module.id();
        let cont = self.module.id();
        let merge = self.module.id();

        self.module.branch(header)?;
        self.module.begin_block(Some(header))?;
        self.module.loop_merge(merge, cont, LoopControl::NONE, [])?;
        self.module.branch(check)?;

        self.module.begin_block(Some(check))?;
        let index = self.module.load(u32_ty, None, phase.instance_id, None, [])?;
        let count = self.module.const_u32(phase.instance_count);
        let in_range = self.module.u_less_than(bool_ty, None, index, count)?;
        self.module.branch_conditional(in_range, body, merge, [])?;

        self.module.begin_block(Some(body))?;
        self.module.function_call(void, None, phase.function, [])?;
        self.module.branch(cont)?;

        self.module.begin_block(Some(cont))?;
        let index = self.module.load(u32_ty, None, phase.instance_id, None, [])?;
        let one = self.module.const_u32(1);
        let next = self.module.i_add(u32_ty, None, index, one)?;
        self.module.store(phase.instance_id, next, None, [])?;
        self.module.branch(header)?;

        self.module.begin_block(Some(merge))?;
        Ok(())
    }

    pub(super) fn emit_hull_entry(&mut self) -> Result<(), CompileError> {
        let hs = self
            .state
            .hull()
            .cloned()
            .ok_or_else(|| CompileError::invalid("hull entry for a non-hull shader"))?;

        let void = self.module.void_type();
        let fn_ty = self.module.void_function_type();
        self.module
            .begin_function(void, Some(self.entry_point), FunctionControl::NONE, fn_ty)?;
        self.module.begin_block(None)?;

        self.emit_input_setup()?;
        match hs.control_point {
            Some(function) => {
                self.module.function_call(void, None, function, [])?;
            }
            None => self.emit_control_point_passthrough()?,
        }

        let workgroup = self.module.const_u32(Scope::Workgroup as u32);
        let invocation = self.module.const_u32(Scope::Invocation as u32);
        let no_semantics = self.module.const_u32(0);
        self.module
            .control_barrier(workgroup, invocation, no_semantics)?;

        let bool_ty = self.module.scalar_type(ScalarType::Bool);
        let invocation_id = self.invocation_id()?;
        let zero = self.module.const_u32(0);
        let first = self.module.i_equal(bool_ty, None, invocation_id, zero)?;
        let then_label = self.module.id();
        let end_label = self.module.id();
        self.module
            .selection_merge(end_label, SelectionControl::NONE)?;
        self.module
            .branch_conditional(first, then_label, end_label, [])?;
        self.module.begin_block(Some(then_label))?;

        for phase in hs.fork.iter().chain(&hs.join) {
            self.emit_fork_join_call(*phase)?;
        }
        self.emit_patch_output_setup(hs.max_tess_factor)?;

        self.module.branch(end_label)?;
        self.module.begin_block(Some(end_label))?;
        self.module.ret()?;
        self.module.end_function()?;
        Ok(())
    }
}
