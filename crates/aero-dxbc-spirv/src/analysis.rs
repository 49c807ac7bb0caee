//! Pre-pass over the decoded program.
//!
//! Some representation choices have to be made when a resource is declared,
//! before the instructions using it are compiled. This pass collects the facts
//! those choices depend on.

use crate::binding_model::MAX_UAV_SLOTS;
use crate::signature::Signature;
use crate::sm4::opcode::*;
use crate::sm4_ir::{OperandType, Sm4Instruction};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UavAccess {
    pub accessed_via_typed_load: bool,
    pub accessed_via_atomic: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClipCullCounts {
    pub clip: u32,
    pub cull: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisInfo {
    pub uavs: [UavAccess; MAX_UAV_SLOTS as usize],
    pub clip_cull_in: ClipCullCounts,
    pub clip_cull_out: ClipCullCounts,
}

impl Default for AnalysisInfo {
    fn default() -> Self {
        Self {
            uavs: [UavAccess::default(); MAX_UAV_SLOTS as usize],
            clip_cull_in: ClipCullCounts::default(),
            clip_cull_out: ClipCullCounts::default(),
        }
    }
}

impl AnalysisInfo {
    pub fn uav(&self, slot: u32) -> UavAccess {
        self.uavs.get(slot as usize).copied().unwrap_or_default()
    }
}

/// Collects UAV access flags and clip/cull distance counts.
///
/// Callers guarantee at most 8 clip plus cull components per direction; the
/// counts are reported as found.
pub fn analyze(insts: &[Sm4Instruction], isgn: &Signature, osgn: &Signature) -> AnalysisInfo {
    let mut info = AnalysisInfo::default();

    for inst in insts {
        let (typed, atomic) = match inst.class {
            InstClass::TypedUavLoad | InstClass::TypedUavStore => (true, false),
            InstClass::Atomic | InstClass::AtomicCounter => (false, true),
            _ => continue,
        };

        let Some(slot) = uav_operand_slot(inst) else {
            continue;
        };
        let Some(entry) = info.uavs.get_mut(slot as usize) else {
            continue;
        };
        entry.accessed_via_typed_load |= typed;
        entry.accessed_via_atomic |= atomic;
    }

    let (clip, cull) = isgn.clip_cull_components();
    info.clip_cull_in = ClipCullCounts { clip, cull };
    let (clip, cull) = osgn.clip_cull_components();
    info.clip_cull_out = ClipCullCounts { clip, cull };

    tracing::trace!(
        clip_cull_in = ?info.clip_cull_in,
        clip_cull_out = ?info.clip_cull_out,
        "analysis complete"
    );
    info
}

/// The `u#` operand of a UAV-accessing instruction, wherever it sits.
fn uav_operand_slot(inst: &Sm4Instruction) -> Option<u32> {
    inst.dst
        .iter()
        .chain(inst.src.iter())
        .find(|op| op.ty == OperandType::Uav)
        .and_then(|op| op.index(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sm4_ir::*;
    use aero_dxbc::{SignatureChunk, SignatureEntry};
    use pretty_assertions::assert_eq;

    fn operand(ty: OperandType, index: u32) -> Sm4Operand {
        Sm4Operand {
            ty,
            data_type: DataType::Uint32,
            components: ComponentCount::Four,
            selection: SelectionMode::Mask,
            mask: WriteMask::XYZW,
            swizzle: Swizzle::XYZW,
            modifier: OperandModifier::None,
            indices: vec![Sm4Index::immediate(index)],
            imm: [0; 4],
        }
    }

    fn inst(opcode: u32, dst: Vec<Sm4Operand>, src: Vec<Sm4Operand>) -> Sm4Instruction {
        Sm4Instruction {
            opcode,
            class: instruction_format(opcode).unwrap().class,
            at_dword: 0,
            token: opcode,
            sample_offsets: [0; 3],
            ext_resource_dim: None,
            ext_return_type: None,
            dst,
            src,
            imm: Vec::new(),
            custom_data: None,
        }
    }

    fn clip_cull_signature(clip_masks: &[u8], cull_masks: &[u8]) -> Signature {
        let mut entries = Vec::new();
        for (i, &mask) in clip_masks.iter().enumerate() {
            entries.push(SignatureEntry {
                semantic_name: "SV_ClipDistance".into(),
                semantic_index: i as u32,
                register: 1 + i as u32,
                system_value_type: 2,
                component_type: 3,
                mask,
                read_write_mask: mask,
                stream: 0,
            });
        }
        for (i, &mask) in cull_masks.iter().enumerate() {
            entries.push(SignatureEntry {
                semantic_name: "SV_CullDistance".into(),
                semantic_index: i as u32,
                register: 4 + i as u32,
                system_value_type: 3,
                component_type: 3,
                mask,
                read_write_mask: mask,
                stream: 0,
            });
        }
        Signature::from_chunk(&SignatureChunk { entries })
    }

    #[test]
    fn typed_only_access_is_not_atomic() {
        let insts = vec![
            inst(
                OPCODE_LD_UAV_TYPED,
                vec![operand(OperandType::Temp, 0)],
                vec![operand(OperandType::Temp, 1), operand(OperandType::Uav, 2)],
            ),
            inst(
                OPCODE_STORE_UAV_TYPED,
                vec![operand(OperandType::Uav, 3)],
                vec![operand(OperandType::Temp, 1), operand(OperandType::Temp, 0)],
            ),
        ];
        let info = analyze(&insts, &Signature::default(), &Signature::default());
        assert_eq!(
            info.uav(2),
            UavAccess {
                accessed_via_typed_load: true,
                accessed_via_atomic: false
            }
        );
        assert!(info.uav(3).accessed_via_typed_load);
        assert_eq!(info.uav(0), UavAccess::default());
    }

    #[test]
    fn any_atomic_marks_the_slot() {
        let insts = vec![
            inst(
                OPCODE_LD_UAV_TYPED,
                vec![operand(OperandType::Temp, 0)],
                vec![operand(OperandType::Temp, 1), operand(OperandType::Uav, 5)],
            ),
            inst(
                OPCODE_IMM_ATOMIC_IADD,
                vec![operand(OperandType::Temp, 0), operand(OperandType::Uav, 5)],
                vec![operand(OperandType::Temp, 1), operand(OperandType::Temp, 2)],
            ),
            inst(
                OPCODE_IMM_ATOMIC_ALLOC,
                vec![operand(OperandType::Temp, 0)],
                vec![operand(OperandType::Uav, 63)],
            ),
        ];
        let info = analyze(&insts, &Signature::default(), &Signature::default());
        assert!(info.uav(5).accessed_via_atomic);
        assert!(info.uav(5).accessed_via_typed_load);
        assert!(info.uav(63).accessed_via_atomic);
    }

    #[test]
    fn thread_group_memory_atomics_are_ignored() {
        let insts = vec![inst(
            OPCODE_ATOMIC_IADD,
            vec![operand(OperandType::ThreadGroupSharedMemory, 0)],
            vec![operand(OperandType::Temp, 0), operand(OperandType::Temp, 1)],
        )];
        let info = analyze(&insts, &Signature::default(), &Signature::default());
        assert!(info.uavs.iter().all(|u| *u == UavAccess::default()));
    }

    #[test]
    fn clip_cull_counts_per_direction() {
        let osgn = clip_cull_signature(&[0b0111, 0b0011], &[0b0001]);
        let isgn = clip_cull_signature(&[0b0001], &[]);
        let info = analyze(&[], &isgn, &osgn);
        assert_eq!(info.clip_cull_out, ClipCullCounts { clip: 5, cull: 1 });
        assert_eq!(info.clip_cull_in, ClipCullCounts { clip: 1, cull: 0 });
    }
}
