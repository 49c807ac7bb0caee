//! Decoded SM4/SM5 instruction model.
//!
//! The decoder keeps instructions close to the token stream: an opcode, its
//! format class, the raw control bits and fully resolved operands. The
//! compiler interprets declaration controls through the accessor methods on
//! [`Sm4Instruction`].

use crate::sm4::opcode::*;

/// Scalar interpretation of an operand, taken from the opcode's format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Float32,
    Uint32,
    Sint32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperandType {
    Temp,
    Input,
    Output,
    IndexableTemp,
    Imm32,
    Imm64,
    Sampler,
    Resource,
    ConstantBuffer,
    ImmediateConstantBuffer,
    Label,
    InputPrimitiveId,
    OutputDepth,
    Null,
    Rasterizer,
    OutputCoverageMask,
    Stream,
    FunctionBody,
    FunctionTable,
    Interface,
    FunctionInput,
    FunctionOutput,
    OutputControlPointId,
    InputForkInstanceId,
    InputJoinInstanceId,
    InputControlPoint,
    OutputControlPoint,
    InputPatchConstant,
    InputDomainPoint,
    ThisPointer,
    Uav,
    ThreadGroupSharedMemory,
    InputThreadId,
    InputThreadGroupId,
    InputThreadIdInGroup,
    InputCoverageMask,
    InputThreadIdInGroupFlattened,
    InputGsInstanceId,
    OutputDepthGreaterEqual,
    OutputDepthLessEqual,
    CycleCounter,
}

impl OperandType {
    pub fn from_raw(raw: u32) -> Option<Self> {
        use OperandType::*;
        const TABLE: [OperandType; 41] = [
            Temp,
            Input,
            Output,
            IndexableTemp,
            Imm32,
            Imm64,
            Sampler,
            Resource,
            ConstantBuffer,
            ImmediateConstantBuffer,
            Label,
            InputPrimitiveId,
            OutputDepth,
            Null,
            Rasterizer,
            OutputCoverageMask,
            Stream,
            FunctionBody,
            FunctionTable,
            Interface,
            FunctionInput,
            FunctionOutput,
            OutputControlPointId,
            InputForkInstanceId,
            InputJoinInstanceId,
            InputControlPoint,
            OutputControlPoint,
            InputPatchConstant,
            InputDomainPoint,
            ThisPointer,
            Uav,
            ThreadGroupSharedMemory,
            InputThreadId,
            InputThreadGroupId,
            InputThreadIdInGroup,
            InputCoverageMask,
            InputThreadIdInGroupFlattened,
            InputGsInstanceId,
            OutputDepthGreaterEqual,
            OutputDepthLessEqual,
            CycleCounter,
        ];
        TABLE.get(raw as usize).copied()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct WriteMask(pub u8);

impl WriteMask {
    pub const XYZW: Self = Self(0b1111);
    pub const X: Self = Self(0b0001);
    pub const Y: Self = Self(0b0010);
    pub const Z: Self = Self(0b0100);
    pub const W: Self = Self(0b1000);

    /// The mask covering the first `count` components.
    pub fn first_n(count: u32) -> Self {
        Self(((1u32 << count.min(4)) - 1) as u8)
    }

    pub fn component(index: u32) -> Self {
        Self(1 << (index & 3))
    }

    pub fn contains(self, component: u32) -> bool {
        component < 4 && self.0 & (1 << component) != 0
    }

    pub fn count(self) -> u32 {
        (self.0 & 0xf).count_ones()
    }

    pub fn is_empty(self) -> bool {
        self.0 & 0xf == 0
    }

    pub fn first(self) -> Option<u32> {
        self.components().next()
    }

    pub fn components(self) -> impl Iterator<Item = u32> {
        (0..4).filter(move |&c| self.contains(c))
    }
}

impl core::ops::BitOr for WriteMask {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl core::ops::BitOrAssign for WriteMask {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// 4-component swizzle. Each lane is 0..=3 for x/y/z/w.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Swizzle(pub [u8; 4]);

impl Swizzle {
    pub const XYZW: Self = Self([0, 1, 2, 3]);
    pub const XXXX: Self = Self([0, 0, 0, 0]);

    pub fn from_bits(bits: u32) -> Self {
        Self([
            (bits & 3) as u8,
            ((bits >> 2) & 3) as u8,
            ((bits >> 4) & 3) as u8,
            ((bits >> 6) & 3) as u8,
        ])
    }

    pub fn lane(self, index: u32) -> u32 {
        u32::from(self.0[(index & 3) as usize])
    }

    /// Compacts the lanes selected by `mask` to the front, the way a source
    /// operand is read for a destination written with `mask`.
    pub fn pick(self, mask: WriteMask) -> Self {
        let mut out = [0u8; 4];
        for (slot, component) in mask.components().enumerate() {
            out[slot] = self.0[component as usize];
        }
        Self(out)
    }

    /// The mask of components this swizzle reads through `mask`.
    pub fn read_mask(self, mask: WriteMask) -> WriteMask {
        mask.components()
            .fold(WriteMask(0), |acc, c| acc | WriteMask::component(self.lane(c)))
    }

    pub fn is_identity(self) -> bool {
        self == Self::XYZW
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentCount {
    Zero,
    One,
    Four,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SelectionMode {
    Mask,
    Swizzle,
    Select1,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OperandModifier {
    #[default]
    None,
    Neg,
    Abs,
    AbsNeg,
}

/// One register index. `relative` holds the register whose value is added to
/// `offset` for dynamically indexed operands such as `x0[r1.x + 2]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sm4Index {
    pub offset: u32,
    pub relative: Option<Box<Sm4Operand>>,
}

impl Sm4Index {
    pub fn immediate(offset: u32) -> Self {
        Self {
            offset,
            relative: None,
        }
    }

    pub fn as_immediate(&self) -> Option<u32> {
        self.relative.is_none().then_some(self.offset)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sm4Operand {
    pub ty: OperandType,
    pub data_type: DataType,
    pub components: ComponentCount,
    pub selection: SelectionMode,
    /// Destination write mask. Swizzled sources report the full mask.
    pub mask: WriteMask,
    /// Source swizzle. Masked destinations report the identity swizzle.
    pub swizzle: Swizzle,
    pub modifier: OperandModifier,
    pub indices: Vec<Sm4Index>,
    /// Immediate payload for `l(...)` operands.
    pub imm: [u32; 4],
}

impl Sm4Operand {
    /// Immediate register index `dim`, if present and not relatively addressed.
    pub fn index(&self, dim: usize) -> Option<u32> {
        self.indices.get(dim).and_then(Sm4Index::as_immediate)
    }

    pub fn is_null(&self) -> bool {
        self.ty == OperandType::Null
    }
}

/// Zero test performed by conditional control-flow instructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZeroTest {
    IfZero,
    IfNonZero,
}

/// `customdata` payloads the compiler consumes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sm4CustomData {
    ImmediateConstantBuffer(Vec<u32>),
    Other { class: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sm4Instruction {
    pub opcode: u32,
    pub class: InstClass,
    /// Dword offset of the opcode token within the program.
    pub at_dword: usize,
    /// The raw opcode token; controls are read through the accessors below.
    pub token: u32,
    /// Immediate texel offsets from the sample-controls extended token (u, v, w).
    pub sample_offsets: [i8; 3],
    pub ext_resource_dim: Option<u32>,
    pub ext_return_type: Option<[u32; 4]>,
    pub dst: Vec<Sm4Operand>,
    pub src: Vec<Sm4Operand>,
    pub imm: Vec<u32>,
    pub custom_data: Option<Sm4CustomData>,
}

impl Sm4Instruction {
    pub fn name(&self) -> &'static str {
        opcode_name(self.opcode)
    }

    pub fn controls(&self) -> u32 {
        (self.token >> OPCODE_CONTROLS_SHIFT) & OPCODE_CONTROLS_MASK
    }

    fn bits(&self, lo: u32, hi: u32) -> u32 {
        (self.token >> lo) & ((1u32 << (hi - lo + 1)) - 1)
    }

    pub fn saturate(&self) -> bool {
        self.token & OPCODE_SATURATE_BIT != 0
    }

    pub fn precise_mask(&self) -> WriteMask {
        WriteMask(((self.token >> OPCODE_PRECISE_SHIFT) & OPCODE_PRECISE_MASK) as u8)
    }

    pub fn zero_test(&self) -> ZeroTest {
        if self.token & OPCODE_TEST_NONZERO_BIT != 0 {
            ZeroTest::IfNonZero
        } else {
            ZeroTest::IfZero
        }
    }

    /// `resinfo` return type: 0 float, 1 rcp-float, 2 uint.
    pub fn resinfo_return_type(&self) -> u32 {
        self.bits(11, 12)
    }

    /// `sync` flags in bits 11..=14.
    pub fn sync_flags(&self) -> u32 {
        self.bits(11, 14)
    }

    /// `dcl_input_ps*` interpolation mode.
    pub fn interpolation(&self) -> u32 {
        self.bits(11, 14)
    }

    /// `dcl_resource` / `dcl_uav_typed` dimension.
    pub fn resource_dim(&self) -> u32 {
        self.bits(11, 15)
    }

    pub fn sample_count(&self) -> u32 {
        self.bits(16, 22)
    }

    /// `dcl_constantbuffer` access pattern: true for dynamically indexed.
    pub fn cb_dynamic_indexed(&self) -> bool {
        self.bits(11, 11) != 0
    }

    /// `dcl_sampler` mode: 0 default, 1 comparison, 2 mono.
    pub fn sampler_mode(&self) -> u32 {
        self.bits(11, 14)
    }

    pub fn global_flags(&self) -> u32 {
        self.bits(11, 18)
    }

    pub fn gs_input_primitive(&self) -> u32 {
        self.bits(11, 16)
    }

    pub fn gs_output_topology(&self) -> u32 {
        self.bits(11, 17)
    }

    pub fn control_point_count(&self) -> u32 {
        self.bits(11, 16)
    }

    pub fn tess_domain(&self) -> u32 {
        self.bits(11, 12)
    }

    pub fn tess_partitioning(&self) -> u32 {
        self.bits(11, 13)
    }

    pub fn tess_output_primitive(&self) -> u32 {
        self.bits(11, 13)
    }

    pub fn uav_globally_coherent(&self) -> bool {
        self.token & OPCODE_UAV_GLOBALLY_COHERENT_BIT != 0
    }

    pub fn uav_has_counter(&self) -> bool {
        self.token & OPCODE_UAV_HAS_COUNTER_BIT != 0
    }
}
