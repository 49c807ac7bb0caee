use crate::binding_model::{ResourceKind, StageMask, ViewDimension};
use crate::signature::SystemValue;
use crate::sm4::ShaderStage;
use crate::sm4_ir::WriteMask;

/// One descriptor the compiled module expects in set 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceSlot {
    /// D3D register number within its class (`t3` → 3).
    pub slot: u32,
    pub kind: ResourceKind,
    pub dimension: ViewDimension,
    /// Structure stride in bytes for structured buffers, else 0.
    pub stride: u32,
    pub stages: StageMask,
    pub binding: u32,
}

/// Semantic carried by one interface register.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceRegister {
    pub register: u32,
    pub mask: WriteMask,
    pub semantic_name: String,
    pub semantic_index: u32,
    pub system_value: SystemValue,
}

/// Which `v#`/`o#` registers are bound to user locations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InterfaceSlots {
    /// Bit `n` set when input location `n` is consumed.
    pub input_slots: u32,
    /// Bit `n` set when output location `n` is produced.
    pub output_slots: u32,
    /// Per-patch locations for hull outputs and domain inputs.
    pub patch_slots: u32,
    pub inputs: Vec<InterfaceRegister>,
    pub outputs: Vec<InterfaceRegister>,
}

/// A compiled shader. Immutable once built.
#[derive(Debug, Clone)]
pub struct ShaderArtifact {
    code: Vec<u32>,
    resource_slots: Vec<ResourceSlot>,
    interface: InterfaceSlots,
    stage: ShaderStage,
    entry_point: String,
    hash: blake3::Hash,
}

impl ShaderArtifact {
    pub(crate) fn new(
        code: Vec<u32>,
        mut resource_slots: Vec<ResourceSlot>,
        interface: InterfaceSlots,
        stage: ShaderStage,
        entry_point: String,
    ) -> Self {
        resource_slots.sort_by_key(|s| s.binding);
        let hash = blake3::hash(&words_to_bytes(&code));
        Self {
            code,
            resource_slots,
            interface,
            stage,
            entry_point,
            hash,
        }
    }

    /// SPIR-V words, header included.
    pub fn code(&self) -> &[u32] {
        &self.code
    }

    /// Little-endian byte form of [`Self::code`], as written to `.spv` files.
    pub fn to_bytes(&self) -> Vec<u8> {
        words_to_bytes(&self.code)
    }

    /// Resource slots ordered by binding.
    pub fn resource_slots(&self) -> &[ResourceSlot] {
        &self.resource_slots
    }

    pub fn interface_slots(&self) -> &InterfaceSlots {
        &self.interface
    }

    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    pub fn entry_point(&self) -> &str {
        &self.entry_point
    }

    /// Content hash of the SPIR-V words.
    pub fn hash(&self) -> blake3::Hash {
        self.hash
    }
}

fn words_to_bytes(words: &[u32]) -> Vec<u8> {
    words.iter().flat_map(|w| w.to_le_bytes()).collect()
}
