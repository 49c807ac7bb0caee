//! Indexed view over a parsed signature chunk.
//!
//! [`aero_dxbc::SignatureChunk`] is a flat list of raw entries. The compiler
//! wants typed system values, component types and per-register lookups, so
//! this module builds an immutable model once per direction.

use std::collections::BTreeMap;

use aero_dxbc::{SignatureChunk, SignatureEntry};

use crate::sm4_ir::WriteMask;

/// `D3D_NAME` / `D3D10_SB_NAME` system-value tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SystemValue {
    Undefined,
    Position,
    ClipDistance,
    CullDistance,
    RenderTargetArrayIndex,
    ViewportArrayIndex,
    VertexId,
    PrimitiveId,
    InstanceId,
    IsFrontFace,
    SampleIndex,
    /// `SV_TessFactor` on a quad domain, edge 0..=3.
    QuadEdgeTessFactor(u8),
    /// `SV_InsideTessFactor` on a quad domain, axis 0..=1.
    QuadInsideTessFactor(u8),
    /// `SV_TessFactor` on a triangle domain, edge 0..=2.
    TriEdgeTessFactor(u8),
    TriInsideTessFactor,
    LineDetailTessFactor,
    LineDensityTessFactor,
    Target,
    Depth,
    Coverage,
    DepthGreaterEqual,
    DepthLessEqual,
    StencilRef,
    Unknown(u32),
}

impl SystemValue {
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            0 => Self::Undefined,
            1 => Self::Position,
            2 => Self::ClipDistance,
            3 => Self::CullDistance,
            4 => Self::RenderTargetArrayIndex,
            5 => Self::ViewportArrayIndex,
            6 => Self::VertexId,
            7 => Self::PrimitiveId,
            8 => Self::InstanceId,
            9 => Self::IsFrontFace,
            10 => Self::SampleIndex,
            11..=14 => Self::QuadEdgeTessFactor((raw - 11) as u8),
            15 | 16 => Self::QuadInsideTessFactor((raw - 15) as u8),
            17..=19 => Self::TriEdgeTessFactor((raw - 17) as u8),
            20 => Self::TriInsideTessFactor,
            21 => Self::LineDetailTessFactor,
            22 => Self::LineDensityTessFactor,
            64 => Self::Target,
            65 => Self::Depth,
            66 => Self::Coverage,
            67 => Self::DepthGreaterEqual,
            68 => Self::DepthLessEqual,
            69 => Self::StencilRef,
            other => Self::Unknown(other),
        }
    }

    /// True for tags that are wired to built-ins rather than user locations.
    pub fn is_builtin(self) -> bool {
        !matches!(self, Self::Undefined | Self::Target | Self::Unknown(_))
    }

    pub fn is_clip_cull(self) -> bool {
        matches!(self, Self::ClipDistance | Self::CullDistance)
    }

    /// Tessellation level array and element this factor maps to.
    pub fn tess_level(self) -> Option<(TessLevel, u32)> {
        match self {
            Self::QuadEdgeTessFactor(i) | Self::TriEdgeTessFactor(i) => {
                Some((TessLevel::Outer, u32::from(i)))
            }
            Self::QuadInsideTessFactor(i) => Some((TessLevel::Inner, u32::from(i))),
            Self::TriInsideTessFactor => Some((TessLevel::Inner, 0)),
            Self::LineDetailTessFactor => Some((TessLevel::Outer, 1)),
            Self::LineDensityTessFactor => Some((TessLevel::Outer, 0)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TessLevel {
    Outer,
    Inner,
}

/// `D3D_REGISTER_COMPONENT_TYPE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentType {
    Unknown,
    Uint32,
    Sint32,
    Float32,
}

impl ComponentType {
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            1 => Self::Uint32,
            2 => Self::Sint32,
            3 => Self::Float32,
            _ => Self::Unknown,
        }
    }
}

/// Pixel-shader input interpolation (`D3D10_SB_INTERPOLATION_MODE`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum InterpolationMode {
    #[default]
    Undefined,
    Constant,
    Linear,
    LinearCentroid,
    LinearNoPerspective,
    LinearNoPerspectiveCentroid,
    LinearSample,
    LinearNoPerspectiveSample,
}

impl InterpolationMode {
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            1 => Self::Constant,
            2 => Self::Linear,
            3 => Self::LinearCentroid,
            4 => Self::LinearNoPerspective,
            5 => Self::LinearNoPerspectiveCentroid,
            6 => Self::LinearSample,
            7 => Self::LinearNoPerspectiveSample,
            _ => Self::Undefined,
        }
    }

    pub fn is_flat(self) -> bool {
        self == Self::Constant
    }

    pub fn is_centroid(self) -> bool {
        matches!(
            self,
            Self::LinearCentroid | Self::LinearNoPerspectiveCentroid
        )
    }

    pub fn is_sample(self) -> bool {
        matches!(self, Self::LinearSample | Self::LinearNoPerspectiveSample)
    }

    pub fn is_no_perspective(self) -> bool {
        matches!(
            self,
            Self::LinearNoPerspective
                | Self::LinearNoPerspectiveCentroid
                | Self::LinearNoPerspectiveSample
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureElement {
    pub semantic_name: String,
    pub semantic_index: u32,
    pub register: u32,
    pub mask: WriteMask,
    pub used_mask: WriteMask,
    pub system_value: SystemValue,
    pub component_type: ComponentType,
    pub stream: u32,
    pub interpolation: InterpolationMode,
}

impl SignatureElement {
    fn from_entry(entry: &SignatureEntry) -> Self {
        Self {
            semantic_name: entry.semantic_name.clone(),
            semantic_index: entry.semantic_index,
            register: entry.register,
            mask: WriteMask(entry.mask & 0xf),
            used_mask: WriteMask(entry.read_write_mask & 0xf),
            system_value: SystemValue::from_raw(entry.system_value_type),
            component_type: ComponentType::from_raw(entry.component_type),
            stream: entry.stream,
            interpolation: InterpolationMode::Undefined,
        }
    }

    /// Whether this element names `semantic`+`index`, ignoring case.
    pub fn matches(&self, semantic: &str, index: u32) -> bool {
        self.semantic_index == index && self.semantic_name.eq_ignore_ascii_case(semantic)
    }
}

/// Immutable, register-ordered signature.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Signature {
    elements: Vec<SignatureElement>,
}

impl Signature {
    pub fn from_chunk(chunk: &SignatureChunk) -> Self {
        let mut elements: Vec<_> = chunk.entries.iter().map(SignatureElement::from_entry).collect();
        elements.sort_by_key(|e| (e.register, e.mask.first().unwrap_or(4), e.stream));
        Self { elements }
    }

    /// Records `dcl_input_ps` interpolation modes, keyed by register.
    pub fn with_interpolation(mut self, modes: &BTreeMap<u32, InterpolationMode>) -> Self {
        for element in &mut self.elements {
            if let Some(&mode) = modes.get(&element.register) {
                element.interpolation = mode;
            }
        }
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = &SignatureElement> + '_ {
        self.elements.iter()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// First element on `register`.
    pub fn lookup(&self, register: u32) -> Option<&SignatureElement> {
        self.elements.iter().find(|e| e.register == register)
    }

    /// All elements packed into `register`.
    pub fn elements_for(&self, register: u32) -> impl Iterator<Item = &SignatureElement> + '_ {
        self.elements.iter().filter(move |e| e.register == register)
    }

    /// The element on `register` that covers `component`.
    pub fn lookup_component(&self, register: u32, component: u32) -> Option<&SignatureElement> {
        self.elements_for(register)
            .find(|e| e.mask.contains(component))
    }

    pub fn find_semantic(&self, semantic: &str, index: u32) -> Option<&SignatureElement> {
        self.elements.iter().find(|e| e.matches(semantic, index))
    }

    /// Component type of `register`, defaulting to float when unknown.
    pub fn register_component_type(&self, register: u32) -> ComponentType {
        match self.lookup(register).map(|e| e.component_type) {
            Some(ComponentType::Unknown) | None => ComponentType::Float32,
            Some(ty) => ty,
        }
    }

    /// Number of components tagged with clip and cull distance, in that order.
    pub fn clip_cull_components(&self) -> (u32, u32) {
        self.elements.iter().fold((0, 0), |(clip, cull), e| match e.system_value {
            SystemValue::ClipDistance => (clip + e.mask.count(), cull),
            SystemValue::CullDistance => (clip, cull + e.mask.count()),
            _ => (clip, cull),
        })
    }

    /// `(register, mask)` of every clip or cull element of kind `sv`, in
    /// register then component order.
    pub fn clip_cull_layout(&self, sv: SystemValue) -> Vec<(u32, WriteMask)> {
        self.elements
            .iter()
            .filter(|e| e.system_value == sv)
            .map(|e| (e.register, e.mask))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn entry(name: &str, index: u32, sv: u32, register: u32, mask: u8) -> SignatureEntry {
        SignatureEntry {
            semantic_name: name.to_owned(),
            semantic_index: index,
            register,
            system_value_type: sv,
            component_type: 3,
            mask,
            read_write_mask: mask,
            stream: 0,
        }
    }

    fn sample_chunk() -> SignatureChunk {
        SignatureChunk {
            entries: vec![
                entry("TEXCOORD", 1, 0, 2, 0b1100),
                entry("SV_Position", 0, 1, 0, 0b1111),
                entry("SV_ClipDistance", 0, 2, 1, 0b0111),
                entry("SV_CullDistance", 0, 3, 1, 0b1000),
                entry("TEXCOORD", 0, 0, 2, 0b0011),
            ],
        }
    }

    #[test]
    fn elements_are_ordered_by_register_then_component() {
        let sig = Signature::from_chunk(&sample_chunk());
        let order: Vec<_> = sig
            .iter()
            .map(|e| (e.register, e.semantic_name.as_str(), e.semantic_index))
            .collect();
        assert_eq!(
            order,
            vec![
                (0, "SV_Position", 0),
                (1, "SV_ClipDistance", 0),
                (1, "SV_CullDistance", 0),
                (2, "TEXCOORD", 0),
                (2, "TEXCOORD", 1),
            ]
        );
    }

    #[test]
    fn lookup_and_packed_registers() {
        let sig = Signature::from_chunk(&sample_chunk());
        assert_eq!(sig.lookup(0).unwrap().system_value, SystemValue::Position);
        assert!(sig.lookup(7).is_none());
        assert_eq!(sig.elements_for(2).count(), 2);
        assert_eq!(
            sig.lookup_component(1, 3).unwrap().system_value,
            SystemValue::CullDistance
        );
        assert!(sig.find_semantic("texcoord", 1).is_some());
    }

    #[test]
    fn clip_cull_components_are_counted_per_tag() {
        let sig = Signature::from_chunk(&sample_chunk());
        assert_eq!(sig.clip_cull_components(), (3, 1));
        assert_eq!(
            sig.clip_cull_layout(SystemValue::ClipDistance),
            vec![(1, WriteMask(0b0111))]
        );
    }

    #[test]
    fn interpolation_is_attached_by_register() {
        let modes = BTreeMap::from([(2, InterpolationMode::Constant)]);
        let sig = Signature::from_chunk(&sample_chunk()).with_interpolation(&modes);
        assert!(sig.elements_for(2).all(|e| e.interpolation.is_flat()));
        assert_eq!(sig.lookup(0).unwrap().interpolation, InterpolationMode::Undefined);
    }

    #[test]
    fn tess_factor_tags_map_to_levels() {
        assert_eq!(
            SystemValue::from_raw(13).tess_level(),
            Some((TessLevel::Outer, 2))
        );
        assert_eq!(
            SystemValue::from_raw(20).tess_level(),
            Some((TessLevel::Inner, 0))
        );
        assert_eq!(
            SystemValue::from_raw(22).tess_level(),
            Some((TessLevel::Outer, 0))
        );
        assert_eq!(SystemValue::from_raw(64), SystemValue::Target);
        assert_eq!(SystemValue::from_raw(99), SystemValue::Unknown(99));
    }
}
