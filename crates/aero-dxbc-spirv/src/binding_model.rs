//! Binding model shared between the compiler and the descriptor-layout code
//! that consumes [`crate::ShaderArtifact::resource_slots`].
//!
//! Every resource lives in descriptor set 0. Each shader stage owns a
//! disjoint block of [`STAGE_BINDING_STRIDE`] bindings, and within a block the
//! D3D register spaces are mapped into fixed ranges so `b#`, `s#`, `t#`, `u#`
//! and UAV counters can coexist:
//!
//! - `b#`: `[BINDING_BASE_CBUFFER, BINDING_BASE_SAMPLER)`
//! - `s#`: `[BINDING_BASE_SAMPLER, BINDING_BASE_TEXTURE)`
//! - `t#`: `[BINDING_BASE_TEXTURE, BINDING_BASE_UAV)`
//! - `u#`: `[BINDING_BASE_UAV, BINDING_BASE_UAV_COUNTER)`
//! - UAV counters: `[BINDING_BASE_UAV_COUNTER, STAGE_BINDING_STRIDE)`

use bitflags::bitflags;

use crate::sm4::ShaderStage;
use crate::CompileError;

/// Constant buffer slots per stage (`cb0..cb15`).
pub const MAX_CBUFFER_SLOTS: u32 = 16;
/// Sampler slots per stage (`s0..s15`).
pub const MAX_SAMPLER_SLOTS: u32 = 16;
/// Shader resource view slots per stage (`t0..t127`).
pub const MAX_TEXTURE_SLOTS: u32 = 128;
/// UAV slots (`u0..u63`).
pub const MAX_UAV_SLOTS: u32 = 64;

pub const BINDING_BASE_CBUFFER: u32 = 0;
pub const BINDING_BASE_SAMPLER: u32 = BINDING_BASE_CBUFFER + MAX_CBUFFER_SLOTS;
pub const BINDING_BASE_TEXTURE: u32 = BINDING_BASE_SAMPLER + MAX_SAMPLER_SLOTS;
pub const BINDING_BASE_UAV: u32 = BINDING_BASE_TEXTURE + MAX_TEXTURE_SLOTS;
pub const BINDING_BASE_UAV_COUNTER: u32 = BINDING_BASE_UAV + MAX_UAV_SLOTS;
pub const STAGE_BINDING_STRIDE: u32 = BINDING_BASE_UAV_COUNTER + MAX_UAV_SLOTS;

/// D3D register class a binding is derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingClass {
    ConstantBuffer,
    Sampler,
    ShaderResource,
    UnorderedAccess,
    UavCounter,
}

impl BindingClass {
    pub fn max_slots(self) -> u32 {
        match self {
            BindingClass::ConstantBuffer => MAX_CBUFFER_SLOTS,
            BindingClass::Sampler => MAX_SAMPLER_SLOTS,
            BindingClass::ShaderResource => MAX_TEXTURE_SLOTS,
            BindingClass::UnorderedAccess | BindingClass::UavCounter => MAX_UAV_SLOTS,
        }
    }

    fn base(self) -> u32 {
        match self {
            BindingClass::ConstantBuffer => BINDING_BASE_CBUFFER,
            BindingClass::Sampler => BINDING_BASE_SAMPLER,
            BindingClass::ShaderResource => BINDING_BASE_TEXTURE,
            BindingClass::UnorderedAccess => BINDING_BASE_UAV,
            BindingClass::UavCounter => BINDING_BASE_UAV_COUNTER,
        }
    }

    pub fn register_prefix(self) -> &'static str {
        match self {
            BindingClass::ConstantBuffer => "cb",
            BindingClass::Sampler => "s",
            BindingClass::ShaderResource => "t",
            BindingClass::UnorderedAccess => "u",
            BindingClass::UavCounter => "u#counter",
        }
    }
}

/// Computes the descriptor binding of `slot` in `class` for `stage`.
pub fn compute_binding(stage: ShaderStage, class: BindingClass, slot: u32) -> Result<u32, CompileError> {
    let max = class.max_slots();
    if slot >= max {
        return Err(CompileError::ResourceSlotOutOfRange {
            kind: class.register_prefix(),
            slot,
            max,
        });
    }
    let stage_index = stage.index().ok_or(CompileError::UnsupportedStage(stage))?;
    Ok(stage_index * STAGE_BINDING_STRIDE + class.base() + slot)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    ConstantBuffer,
    Sampler,
    SampledImage,
    UniformTexelBuffer,
    StorageImage,
    StorageTexelBuffer,
    StorageBuffer,
    UavCounter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewDimension {
    None,
    Buffer,
    Texture1D,
    Texture1DArray,
    Texture2D,
    Texture2DArray,
    Texture2DMs,
    Texture2DMsArray,
    Texture3D,
    TextureCube,
    TextureCubeArray,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct StageMask: u32 {
        const VERTEX = 1 << 0;
        const HULL = 1 << 1;
        const DOMAIN = 1 << 2;
        const GEOMETRY = 1 << 3;
        const PIXEL = 1 << 4;
        const COMPUTE = 1 << 5;
    }
}

impl StageMask {
    pub fn from_stage(stage: ShaderStage) -> Self {
        match stage {
            ShaderStage::Vertex => Self::VERTEX,
            ShaderStage::Hull => Self::HULL,
            ShaderStage::Domain => Self::DOMAIN,
            ShaderStage::Geometry => Self::GEOMETRY,
            ShaderStage::Pixel => Self::PIXEL,
            ShaderStage::Compute => Self::COMPUTE,
            ShaderStage::Unknown(_) => Self::empty(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranges_are_disjoint_and_stage_blocks_do_not_overlap() {
        let last_vs = compute_binding(ShaderStage::Vertex, BindingClass::UavCounter, 63).unwrap();
        let first_hs = compute_binding(ShaderStage::Hull, BindingClass::ConstantBuffer, 0).unwrap();
        assert_eq!(last_vs + 1, first_hs);

        assert_eq!(
            compute_binding(ShaderStage::Pixel, BindingClass::ShaderResource, 3).unwrap(),
            4 * STAGE_BINDING_STRIDE + BINDING_BASE_TEXTURE + 3
        );
        assert_eq!(
            compute_binding(ShaderStage::Vertex, BindingClass::Sampler, 15).unwrap() + 1,
            BINDING_BASE_TEXTURE
        );
    }

    #[test]
    fn out_of_range_slots_are_errors() {
        let err = compute_binding(ShaderStage::Compute, BindingClass::ShaderResource, 128).unwrap_err();
        assert!(matches!(
            err,
            CompileError::ResourceSlotOutOfRange {
                kind: "t",
                slot: 128,
                max: 128
            }
        ));
        assert!(compute_binding(ShaderStage::Compute, BindingClass::ConstantBuffer, 16).is_err());
        assert!(compute_binding(ShaderStage::Compute, BindingClass::UnorderedAccess, 63).is_ok());
    }

    #[test]
    fn stage_mask_per_stage() {
        assert_eq!(StageMask::from_stage(ShaderStage::Geometry), StageMask::GEOMETRY);
        assert!(StageMask::from_stage(ShaderStage::Unknown(7)).is_empty());
    }
}
