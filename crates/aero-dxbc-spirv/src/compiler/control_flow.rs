//! Structured control flow.
//!
//! D3D control flow is already structured, so every `if`/`loop`/`switch`
//! maps onto a SPIR-V selection or loop construct. Open constructs live on a
//! stack; any instruction that ends a block early (`break`, `ret`, ...) opens
//! a fresh unreachable block so subsequent instructions always have a home.
//!
//! `switch` is the awkward one: case literals are only known once the whole
//! construct has been seen, so the header block is left unterminated and the
//! `OpSelectionMerge`/`OpSwitch` pair is appended to it at `endswitch`.

use rspirv::dr::Operand;
use rspirv::spirv::{LoopControl, SelectionControl, Word};

use super::module::ScalarType;
use super::{src, Compiler};
use crate::sm4::opcode::*;
use crate::sm4::ShaderStage;
use crate::sm4_ir::{OperandType, Sm4Instruction, WriteMask};
use crate::CompileError;

#[derive(Debug, Clone)]
pub(super) struct SwitchCase {
    pub literal: u32,
    pub label: Word,
}

#[derive(Debug, Clone)]
pub(super) struct SwitchBlock {
    /// Index of the unterminated header block in the current function.
    pub header: usize,
    pub selector: Word,
    pub label_break: Word,
    pub label_default: Option<Word>,
    /// The label opened by the most recent `case`/`default`.
    pub label_current: Option<Word>,
    pub cases: Vec<SwitchCase>,
}

#[derive(Debug, Clone)]
pub(super) enum ControlFlowBlock {
    If {
        label_else: Word,
        label_end: Word,
        had_else: bool,
    },
    Loop {
        label_header: Word,
        label_continue: Word,
        label_break: Word,
    },
    Switch(SwitchBlock),
}

impl Compiler<'_> {
    pub(super) fn emit_control_flow(&mut self, inst: &Sm4Instruction) -> Result<(), CompileError> {
        match inst.opcode {
            OPCODE_IF => self.emit_if(inst),
            OPCODE_ELSE => self.emit_else(),
            OPCODE_ENDIF => self.emit_endif(),
            OPCODE_LOOP => self.emit_loop(),
            OPCODE_ENDLOOP => self.emit_endloop(),
            OPCODE_SWITCH => self.emit_switch(inst),
            OPCODE_CASE => self.emit_case(inst),
            OPCODE_DEFAULT => self.emit_default(),
            OPCODE_ENDSWITCH => self.emit_endswitch(),
            OPCODE_BREAK => {
                let target = self.break_target()?;
                self.jump(target)
            }
            OPCODE_CONTINUE => {
                let target = self.continue_target()?;
                self.jump(target)
            }
            OPCODE_BREAKC => {
                let target = self.break_target()?;
                self.emit_conditional(inst, |c| Ok(c.module.branch(target)?))
            }
            OPCODE_CONTINUEC => {
                let target = self.continue_target()?;
                self.emit_conditional(inst, |c| Ok(c.module.branch(target)?))
            }
            OPCODE_RET => {
                self.module.ret()?;
                self.module.begin_block(None)?;
                Ok(())
            }
            OPCODE_RETC => self.emit_conditional(inst, |c| Ok(c.module.ret()?)),
            OPCODE_DISCARD => {
                if self.stage != ShaderStage::Pixel {
                    return Err(CompileError::invalid("discard outside a pixel shader"));
                }
                self.emit_conditional(inst, |c| Ok(c.module.kill()?))
            }
            _ => Err(self.unsupported(inst)),
        }
    }

    /// Tests `.x` of the first source against zero as the instruction requests.
    fn emit_condition(&mut self, inst: &Sm4Instruction) -> Result<Word, CompileError> {
        let value = self.emit_load_src(src(inst, 0)?, WriteMask::X)?;
        Ok(self.zero_test(value, inst.zero_test())?.id)
    }

    /// Runs `terminate` in a block entered only when the condition holds.
    fn emit_conditional(
        &mut self,
        inst: &Sm4Instruction,
        terminate: impl FnOnce(&mut Self) -> Result<(), CompileError>,
    ) -> Result<(), CompileError> {
        let condition = self.emit_condition(inst)?;
        let taken = self.module.id();
        let merge = self.module.id();
        self.module
            .selection_merge(merge, SelectionControl::NONE)?;
        self.module
            .branch_conditional(condition, taken, merge, [])?;
        self.module.begin_block(Some(taken))?;
        terminate(self)?;
        self.module.begin_block(Some(merge))?;
        Ok(())
    }

    /// Unconditional branch followed by a fresh unreachable block.
    fn jump(&mut self, target: Word) -> Result<(), CompileError> {
        self.module.branch(target)?;
        self.module.begin_block(None)?;
        Ok(())
    }

    fn break_target(&self) -> Result<Word, CompileError> {
        self.control_flow
            .iter()
            .rev()
            .find_map(|block| match block {
                ControlFlowBlock::Loop { label_break, .. } => Some(*label_break),
                ControlFlowBlock::Switch(switch) => Some(switch.label_break),
                ControlFlowBlock::If { .. } => None,
            })
            .ok_or_else(|| CompileError::invalid("break outside a loop or switch"))
    }

    fn continue_target(&self) -> Result<Word, CompileError> {
        self.control_flow
            .iter()
            .rev()
            .find_map(|block| match block {
                ControlFlowBlock::Loop { label_continue, .. } => Some(*label_continue),
                _ => None,
            })
            .ok_or_else(|| CompileError::invalid("continue outside a loop"))
    }

    fn emit_if(&mut self, inst: &Sm4Instruction) -> Result<(), CompileError> {
        let condition = self.emit_condition(inst)?;
        let label_then = self.module.id();
        let label_else = self.module.id();
        let label_end = self.module.id();
        self.module
            .selection_merge(label_end, SelectionControl::NONE)?;
        self.module
            .branch_conditional(condition, label_then, label_else, [])?;
        self.module.begin_block(Some(label_then))?;
        self.control_flow.push(ControlFlowBlock::If {
            label_else,
            label_end,
            had_else: false,
        });
        Ok(())
    }

    fn emit_else(&mut self) -> Result<(), CompileError> {
        let Some(ControlFlowBlock::If {
            label_else,
            label_end,
            had_else,
        }) = self.control_flow.last_mut()
        else {
            return Err(CompileError::invalid("else without a matching if"));
        };
        if *had_else {
            return Err(CompileError::invalid("second else for the same if"));
        }
        *had_else = true;
        let (label_else, label_end) = (*label_else, *label_end);
        self.module.branch(label_end)?;
        self.module.begin_block(Some(label_else))?;
        Ok(())
    }

    fn emit_endif(&mut self) -> Result<(), CompileError> {
        let Some(ControlFlowBlock::If {
            label_else,
            label_end,
            had_else,
        }) = self.control_flow.pop()
        else {
            return Err(CompileError::invalid("endif without a matching if"));
        };
        self.module.branch(label_end)?;
        if !had_else {
            self.module.begin_block(Some(label_else))?;
            self.module.branch(label_end)?;
        }
        self.module.begin_block(Some(label_end))?;
        Ok(())
    }

    fn emit_loop(&mut self) -> Result<(), CompileError> {
        let label_header = self.module.id();
        let label_body = self.module.id();
        let label_continue = self.module.id();
        let label_break = self.module.id();

        self.module.branch(label_header)?;
        self.module.begin_block(Some(label_header))?;
        self.module
            .loop_merge(label_break, label_continue, LoopControl::NONE, [])?;
        self.module.branch(label_body)?;
        self.module.begin_block(Some(label_body))?;

        self.control_flow.push(ControlFlowBlock::Loop {
            label_header,
            label_continue,
            label_break,
        });
        Ok(())
    }

    fn emit_endloop(&mut self) -> Result<(), CompileError> {
        let Some(ControlFlowBlock::Loop {
            label_header,
            label_continue,
            label_break,
        }) = self.control_flow.pop()
        else {
            return Err(CompileError::invalid("endloop without a matching loop"));
        };
        self.module.branch(label_continue)?;
        self.module.begin_block(Some(label_continue))?;
        self.module.branch(label_header)?;
        self.module.begin_block(Some(label_break))?;
        Ok(())
    }

    fn emit_switch(&mut self, inst: &Sm4Instruction) -> Result<(), CompileError> {
        let selector = self.emit_load_src(src(inst, 0)?, WriteMask::X)?;
        let selector = self.bitcast(selector, ScalarType::U32)?;

        let label_header = self.module.id();
        let label_break = self.module.id();
        self.module.branch(label_header)?;
        self.module.begin_block(Some(label_header))?;
        let header = self
            .module
            .selected_block()
            .ok_or_else(|| CompileError::invalid("switch header block was not opened"))?;
        self.module.select_block(None)?;

        self.control_flow.push(ControlFlowBlock::Switch(SwitchBlock {
            header,
            selector: selector.id,
            label_break,
            label_default: None,
            label_current: None,
            cases: Vec::new(),
        }));
        Ok(())
    }

    /// Label for the next `case`/`default`. Adjacent labels share one block;
    /// otherwise a new block is opened, with a fall-through branch from the
    /// previous case if it did not end in `break`.
    fn case_label(&mut self) -> Result<Word, CompileError> {
        let adjacent = matches!(self.last_opcode, Some(OPCODE_CASE | OPCODE_DEFAULT));
        let current = match self.control_flow.last() {
            Some(ControlFlowBlock::Switch(switch)) => switch.label_current,
            _ => return Err(CompileError::invalid("case outside a switch")),
        };
        if let (true, Some(label)) = (adjacent, current) {
            return Ok(label);
        }

        let label = self.module.id();
        self.close_case_block(label)?;
        self.module.begin_block(Some(label))?;
        if let Some(ControlFlowBlock::Switch(switch)) = self.control_flow.last_mut() {
            switch.label_current = Some(label);
        }
        Ok(label)
    }

    /// Ends the block before a case label: a fall-through branch, or
    /// `OpUnreachable` for the dead block opened after a jump.
    fn close_case_block(&mut self, next: Word) -> Result<(), CompileError> {
        if self.module.selected_block().is_none() {
            return Ok(());
        }
        if matches!(
            self.last_opcode,
            Some(OPCODE_BREAK | OPCODE_CONTINUE | OPCODE_RET)
        ) {
            self.module.unreachable()?;
        } else {
            self.module.branch(next)?;
        }
        Ok(())
    }

    fn emit_case(&mut self, inst: &Sm4Instruction) -> Result<(), CompileError> {
        let op = src(inst, 0)?;
        if op.ty != OperandType::Imm32 {
            return Err(CompileError::invalid(format!(
                "case label must be a 32-bit immediate, got {:?}",
                op.ty
            )));
        }
        let literal = op.imm[0];
        let label = self.case_label()?;
        if let Some(ControlFlowBlock::Switch(switch)) = self.control_flow.last_mut() {
            if switch.cases.iter().any(|c| c.literal == literal) {
                tracing::warn!(literal, "duplicate case literal ignored");
            } else {
                switch.cases.push(SwitchCase { literal, label });
            }
        }
        Ok(())
    }

    fn emit_default(&mut self) -> Result<(), CompileError> {
        let label = self.case_label()?;
        if let Some(ControlFlowBlock::Switch(switch)) = self.control_flow.last_mut() {
            switch.label_default = Some(label);
        }
        Ok(())
    }

    fn emit_endswitch(&mut self) -> Result<(), CompileError> {
        let Some(ControlFlowBlock::Switch(switch)) = self.control_flow.pop() else {
            return Err(CompileError::invalid("endswitch without a matching switch"));
        };
        self.close_case_block(switch.label_break)?;

        self.module.select_block(Some(switch.header))?;
        self.module
            .selection_merge(switch.label_break, SelectionControl::NONE)?;
        self.module.switch(
            switch.selector,
            switch.label_default.unwrap_or(switch.label_break),
            switch
                .cases
                .iter()
                .map(|c| (Operand::LiteralBit32(c.literal), c.label)),
        )?;
        self.module.begin_block(Some(switch.label_break))?;
        Ok(())
    }

    /// Depth of the open control-flow construct stack.
    pub fn control_flow_depth(&self) -> usize {
        self.control_flow.len()
    }
}
