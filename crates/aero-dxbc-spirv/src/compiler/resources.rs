//! Resource declarations and every instruction that touches `t#`, `u#`,
//! `s#`, `cb#` or `g#`: sampling, fetches, queries, raw and structured
//! buffer access, typed UAVs, atomics and barriers.

use rspirv::dr::Operand;
use rspirv::spirv::{
    Capability, Decoration, Dim, GLOp, ImageFormat, ImageOperands, MemorySemantics, Scope,
    StorageClass, Word,
};

use super::module::{ArrayType, ImageType, RegisterPointer, RegisterValue, ScalarType, VectorType};
use super::{dst, src, Compiler};
use crate::artifact::ResourceSlot;
use crate::binding_model::{compute_binding, BindingClass, ResourceKind, StageMask, ViewDimension};
use crate::options::TextureClampMode;
use crate::sm4::opcode::*;
use crate::sm4::ShaderStage;
use crate::sm4_ir::{OperandType, Sm4Instruction, Sm4Operand, WriteMask};
use crate::CompileError;

const SYNC_THREAD_GROUP: u32 = 1 << 0;
const SYNC_THREAD_GROUP_MEMORY: u32 = 1 << 1;
const SYNC_UAV_GROUP: u32 = 1 << 2;
const SYNC_UAV_GLOBAL: u32 = 1 << 3;

/// Largest `cb#` size in `vec4` elements.
const MAX_CONSTANT_BUFFER_ELEMENTS: u32 = 4096;

#[derive(Debug, Clone, Copy)]
pub(super) struct ConstantBuffer {
    pub var: Word,
    pub size: u32,
}

/// A declared `t#` or `u#`.
#[derive(Debug, Clone, Copy)]
pub(super) struct ResourceBinding {
    pub var: Word,
    pub dimension: ViewDimension,
    /// Image type for typed views; raw and structured buffers have none.
    pub image: Option<ImageType>,
    /// Structure stride in bytes, zero for raw buffers.
    pub stride: u32,
    /// Lazily created append/consume counter.
    pub counter: Option<Word>,
}

fn view_dimension(raw: u32) -> Option<(ViewDimension, Dim, bool, bool)> {
    Some(match raw {
        1 => (ViewDimension::Buffer, Dim::DimBuffer, false, false),
        2 => (ViewDimension::Texture1D, Dim::Dim1D, false, false),
        3 => (ViewDimension::Texture2D, Dim::Dim2D, false, false),
        4 => (ViewDimension::Texture2DMs, Dim::Dim2D, false, true),
        5 => (ViewDimension::Texture3D, Dim::Dim3D, false, false),
        6 => (ViewDimension::TextureCube, Dim::DimCube, false, false),
        7 => (ViewDimension::Texture1DArray, Dim::Dim1D, true, false),
        8 => (ViewDimension::Texture2DArray, Dim::Dim2D, true, false),
        9 => (ViewDimension::Texture2DMsArray, Dim::Dim2D, true, true),
        10 => (ViewDimension::TextureCubeArray, Dim::DimCube, true, false),
        _ => return None,
    })
}

/// Component type of the first field of a resource return-type token.
fn return_type(token: u32) -> ScalarType {
    match token & 0xf {
        3 => ScalarType::I32,
        4 => ScalarType::U32,
        _ => ScalarType::F32,
    }
}

fn coord_count(dim: ViewDimension) -> u32 {
    match dim {
        ViewDimension::None | ViewDimension::Buffer | ViewDimension::Texture1D => 1,
        ViewDimension::Texture1DArray | ViewDimension::Texture2D | ViewDimension::Texture2DMs => 2,
        ViewDimension::Texture2DArray
        | ViewDimension::Texture2DMsArray
        | ViewDimension::Texture3D
        | ViewDimension::TextureCube => 3,
        ViewDimension::TextureCubeArray => 4,
    }
}

fn offset_count(dim: ViewDimension) -> u32 {
    match dim {
        ViewDimension::Texture1D | ViewDimension::Texture1DArray => 1,
        ViewDimension::Texture2D
        | ViewDimension::Texture2DArray
        | ViewDimension::Texture2DMs
        | ViewDimension::Texture2DMsArray => 2,
        ViewDimension::Texture3D => 3,
        _ => 0,
    }
}

fn gradient_count(dim: ViewDimension) -> u32 {
    match dim {
        ViewDimension::Texture1D | ViewDimension::Texture1DArray => 1,
        ViewDimension::Texture3D | ViewDimension::TextureCube | ViewDimension::TextureCubeArray => 3,
        _ => 2,
    }
}

/// Components returned by a size query, array layers included.
fn size_count(dim: ViewDimension) -> u32 {
    match dim {
        ViewDimension::None | ViewDimension::Buffer | ViewDimension::Texture1D => 1,
        ViewDimension::Texture1DArray
        | ViewDimension::Texture2D
        | ViewDimension::Texture2DMs
        | ViewDimension::TextureCube => 2,
        _ => 3,
    }
}

/// Optional image operands, emitted in operand-bit order.
#[derive(Debug, Default)]
struct ImageArgs {
    bias: Option<Word>,
    lod: Option<Word>,
    grad: Option<(Word, Word)>,
    const_offset: Option<Word>,
    offset: Option<Word>,
    sample: Option<Word>,
}

impl ImageArgs {
    fn operands(&self) -> (ImageOperands, Vec<Operand>) {
        let mut flags = ImageOperands::NONE;
        let mut params = Vec::new();
        if let Some(bias) = self.bias {
            flags |= ImageOperands::BIAS;
            params.push(Operand::IdRef(bias));
        }
        if let Some(lod) = self.lod {
            flags |= ImageOperands::LOD;
            params.push(Operand::IdRef(lod));
        }
        if let Some((ddx, ddy)) = self.grad {
            flags |= ImageOperands::GRAD;
            params.push(Operand::IdRef(ddx));
            params.push(Operand::IdRef(ddy));
        }
        if let Some(offset) = self.const_offset {
            flags |= ImageOperands::CONST_OFFSET;
            params.push(Operand::IdRef(offset));
        }
        if let Some(offset) = self.offset {
            flags |= ImageOperands::OFFSET;
            params.push(Operand::IdRef(offset));
        }
        if let Some(sample) = self.sample {
            flags |= ImageOperands::SAMPLE;
            params.push(Operand::IdRef(sample));
        }
        (flags, params)
    }

    fn optional(&self) -> (Option<ImageOperands>, Vec<Operand>) {
        let (flags, params) = self.operands();
        ((!flags.is_empty()).then_some(flags), params)
    }

    fn is_explicit(&self) -> bool {
        self.lod.is_some() || self.grad.is_some()
    }
}

impl Compiler<'_> {
    /// Records `slot` in the artifact's binding table and returns its binding.
    fn define_slot(
        &mut self,
        class: BindingClass,
        slot: u32,
        kind: ResourceKind,
        dimension: ViewDimension,
        stride: u32,
    ) -> Result<u32, CompileError> {
        let binding = compute_binding(self.stage, class, slot)?;
        let stages = StageMask::from_stage(self.stage);
        match self.slots.get_mut(&binding) {
            Some(existing) => {
                if existing.kind != kind || existing.dimension != dimension {
                    return Err(CompileError::invalid(format!(
                        "{}{slot} redeclared as {kind:?} {dimension:?}",
                        class.register_prefix()
                    )));
                }
                existing.stages |= stages;
            }
            None => {
                self.slots.insert(
                    binding,
                    ResourceSlot {
                        slot,
                        kind,
                        dimension,
                        stride,
                        stages,
                        binding,
                    },
                );
            }
        }
        Ok(binding)
    }

    fn enable_storage_buffers(&mut self) {
        if self.module.version() < (1, 3) {
            self.module
                .enable_extension("SPV_KHR_storage_buffer_storage_class");
        }
    }

    /// The slot a declaration names, checked against the fixed table size of
    /// its register class.
    fn declared_slot(op: &Sm4Operand, class: BindingClass) -> Result<u32, CompileError> {
        let slot = op
            .index(0)
            .ok_or_else(|| CompileError::invalid(format!("{:?} declaration without a slot", op.ty)))?;
        let max = class.max_slots();
        if slot >= max {
            return Err(CompileError::ResourceSlotOutOfRange {
                kind: class.register_prefix(),
                slot,
                max,
            });
        }
        Ok(slot)
    }

    /// A repeated `t#`/`u#` declaration of the same shape is ignored; one that
    /// changes typed-ness or dimension is fatal.
    fn check_redeclaration(
        prefix: char,
        slot: u32,
        existing: &ResourceBinding,
        inst: &Sm4Instruction,
    ) -> Result<(), CompileError> {
        let typed = matches!(inst.opcode, OPCODE_DCL_RESOURCE | OPCODE_DCL_UAV_TYPED);
        let dimension = if typed {
            view_dimension(inst.resource_dim()).map(|(dimension, ..)| dimension)
        } else {
            Some(ViewDimension::Buffer)
        };
        if typed != existing.image.is_some() || dimension != Some(existing.dimension) {
            return Err(CompileError::invalid(format!(
                "{prefix}{slot} redeclared as {} {:?}, first declared as {:?}",
                inst.name(),
                dimension,
                existing.dimension
            )));
        }
        tracing::warn!(slot, "{prefix}{slot} redeclared; keeping the first declaration");
        Ok(())
    }

    pub(super) fn emit_dcl_constant_buffer(&mut self, inst: &Sm4Instruction) -> Result<(), CompileError> {
        let op = src(inst, 0)?;
        let slot = Self::declared_slot(op, BindingClass::ConstantBuffer)?;
        let size = op
            .index(1)
            .unwrap_or(MAX_CONSTANT_BUFFER_ELEMENTS)
            .clamp(1, MAX_CONSTANT_BUFFER_ELEMENTS);
        if let Some(existing) = self.constant_buffers.get(&slot) {
            if existing.size != size {
                return Err(CompileError::invalid(format!(
                    "cb{slot} redeclared with {size} elements, first declared with {}",
                    existing.size
                )));
            }
            tracing::warn!(slot, "constant buffer redeclared; keeping the first declaration");
            return Ok(());
        }

        let block = self.module.constant_buffer_block(size);
        let var = self.module.new_variable(block, StorageClass::Uniform, None);
        self.module.set_debug_name(var, &format!("cb{slot}"));
        let binding = self.define_slot(
            BindingClass::ConstantBuffer,
            slot,
            ResourceKind::ConstantBuffer,
            ViewDimension::None,
            0,
        )?;
        self.module.decorate_binding(var, binding);
        self.constant_buffers.insert(slot, ConstantBuffer { var, size });
        Ok(())
    }

    /// `cb[slot][element]`.
    pub(super) fn constant_buffer_ptr(
        &mut self,
        slot: u32,
        element: Word,
    ) -> Result<RegisterPointer, CompileError> {
        let cb = self
            .constant_buffers
            .get(&slot)
            .copied()
            .ok_or_else(|| CompileError::invalid(format!("cb{slot} used without a declaration")))?;
        tracing::trace!(slot, size = cb.size, "constant buffer access");
        let zero = self.module.const_u32(0);
        self.chain(
            VectorType::vec4(ScalarType::F32),
            StorageClass::Uniform,
            cb.var,
            &[zero, element],
        )
    }

    pub(super) fn emit_dcl_sampler(&mut self, inst: &Sm4Instruction) -> Result<(), CompileError> {
        let slot = Self::declared_slot(dst(inst, 0)?, BindingClass::Sampler)?;
        if self.samplers.contains_key(&slot) {
            return Ok(());
        }
        let ty = self.module.sampler_type();
        let var = self
            .module
            .new_variable(ty, StorageClass::UniformConstant, None);
        self.module.set_debug_name(var, &format!("s{slot}"));
        let binding = self.define_slot(
            BindingClass::Sampler,
            slot,
            ResourceKind::Sampler,
            ViewDimension::None,
            0,
        )?;
        self.module.decorate_binding(var, binding);
        self.samplers.insert(slot, var);
        Ok(())
    }

    /// `dcl_resource`, `dcl_resource_raw` and `dcl_resource_structured`.
    pub(super) fn emit_dcl_resource(&mut self, inst: &Sm4Instruction) -> Result<(), CompileError> {
        let slot = Self::declared_slot(dst(inst, 0)?, BindingClass::ShaderResource)?;
        if let Some(existing) = self.textures.get(&slot) {
            return Self::check_redeclaration('t', slot, existing, inst);
        }

        let (resource, binding) = match inst.opcode {
            OPCODE_DCL_RESOURCE => {
                let (dimension, dim, arrayed, ms) = view_dimension(inst.resource_dim())
                    .ok_or_else(|| {
                        CompileError::invalid(format!(
                            "t{slot} has invalid resource dimension {}",
                            inst.resource_dim()
                        ))
                    })?;
                let image = ImageType {
                    sampled_type: return_type(inst.imm.first().copied().unwrap_or(5)),
                    dim,
                    arrayed,
                    ms,
                    sampled: 1,
                    format: ImageFormat::Unknown,
                };
                match (dim, arrayed) {
                    (Dim::Dim1D, _) => self.module.enable_capability(Capability::Sampled1D),
                    (Dim::DimBuffer, _) => self.module.enable_capability(Capability::SampledBuffer),
                    (Dim::DimCube, true) => {
                        self.module.enable_capability(Capability::SampledCubeArray)
                    }
                    _ => {}
                }
                let ty = self.module.image_type(image);
                let var = self
                    .module
                    .new_variable(ty, StorageClass::UniformConstant, None);
                let kind = if dim == Dim::DimBuffer {
                    ResourceKind::UniformTexelBuffer
                } else {
                    ResourceKind::SampledImage
                };
                let binding =
                    self.define_slot(BindingClass::ShaderResource, slot, kind, dimension, 0)?;
                let resource = ResourceBinding {
                    var,
                    dimension,
                    image: Some(image),
                    stride: 0,
                    counter: None,
                };
                (resource, binding)
            }
            _ => {
                let stride = if inst.opcode == OPCODE_DCL_RESOURCE_STRUCTURED {
                    inst.imm.first().copied().unwrap_or(0)
                } else {
                    0
                };
                self.enable_storage_buffers();
                let block = self.module.storage_buffer_block();
                let var = self
                    .module
                    .new_variable(block, StorageClass::StorageBuffer, None);
                self.module.decorate_flag(var, Decoration::NonWritable);
                let binding = self.define_slot(
                    BindingClass::ShaderResource,
                    slot,
                    ResourceKind::StorageBuffer,
                    ViewDimension::Buffer,
                    stride,
                )?;
                let resource = ResourceBinding {
                    var,
                    dimension: ViewDimension::Buffer,
                    image: None,
                    stride,
                    counter: None,
                };
                (resource, binding)
            }
        };

        self.module.set_debug_name(resource.var, &format!("t{slot}"));
        self.module.decorate_binding(resource.var, binding);
        self.textures.insert(slot, resource);
        Ok(())
    }

    /// `dcl_uav_typed`, `dcl_uav_raw` and `dcl_uav_structured`.
    pub(super) fn emit_dcl_uav(&mut self, inst: &Sm4Instruction) -> Result<(), CompileError> {
        let slot = Self::declared_slot(dst(inst, 0)?, BindingClass::UnorderedAccess)?;
        if let Some(existing) = self.uavs.get(&slot) {
            return Self::check_redeclaration('u', slot, existing, inst);
        }
        let access = self.analysis.uav(slot);

        let (resource, binding) = match inst.opcode {
            OPCODE_DCL_UAV_TYPED => {
                let (dimension, dim, arrayed, ms) = view_dimension(inst.resource_dim())
                    .filter(|(_, _, _, ms)| !ms)
                    .ok_or_else(|| {
                        CompileError::invalid(format!(
                            "u{slot} has invalid resource dimension {}",
                            inst.resource_dim()
                        ))
                    })?;
                let declared = return_type(inst.imm.first().copied().unwrap_or(5));
                let (sampled_type, format) = if access.accessed_via_atomic {
                    if declared == ScalarType::I32 {
                        (ScalarType::I32, ImageFormat::R32i)
                    } else {
                        (ScalarType::U32, ImageFormat::R32ui)
                    }
                } else {
                    self.module
                        .enable_capability(Capability::StorageImageWriteWithoutFormat);
                    if access.accessed_via_typed_load {
                        self.module
                            .enable_capability(Capability::StorageImageReadWithoutFormat);
                    }
                    (declared, ImageFormat::Unknown)
                };
                match (dim, arrayed) {
                    (Dim::Dim1D, _) => self.module.enable_capability(Capability::Image1D),
                    (Dim::DimBuffer, _) => self.module.enable_capability(Capability::ImageBuffer),
                    (Dim::DimCube, true) => self.module.enable_capability(Capability::ImageCubeArray),
                    _ => {}
                }
                let image = ImageType {
                    sampled_type,
                    dim,
                    arrayed,
                    ms,
                    sampled: 2,
                    format,
                };
                let ty = self.module.image_type(image);
                let var = self
                    .module
                    .new_variable(ty, StorageClass::UniformConstant, None);
                let kind = if dim == Dim::DimBuffer {
                    ResourceKind::StorageTexelBuffer
                } else {
                    ResourceKind::StorageImage
                };
                let binding =
                    self.define_slot(BindingClass::UnorderedAccess, slot, kind, dimension, 0)?;
                let resource = ResourceBinding {
                    var,
                    dimension,
                    image: Some(image),
                    stride: 0,
                    counter: None,
                };
                (resource, binding)
            }
            _ => {
                let stride = if inst.opcode == OPCODE_DCL_UAV_STRUCTURED {
                    inst.imm.first().copied().unwrap_or(0)
                } else {
                    0
                };
                self.enable_storage_buffers();
                let block = self.module.storage_buffer_block();
                let var = self
                    .module
                    .new_variable(block, StorageClass::StorageBuffer, None);
                let binding = self.define_slot(
                    BindingClass::UnorderedAccess,
                    slot,
                    ResourceKind::StorageBuffer,
                    ViewDimension::Buffer,
                    stride,
                )?;
                let resource = ResourceBinding {
                    var,
                    dimension: ViewDimension::Buffer,
                    image: None,
                    stride,
                    counter: None,
                };
                (resource, binding)
            }
        };

        if inst.uav_globally_coherent() {
            self.module.decorate_flag(resource.var, Decoration::Coherent);
        }
        if inst.uav_has_counter() {
            tracing::debug!(slot, "u# declared with a hidden counter");
        }
        self.module.set_debug_name(resource.var, &format!("u{slot}"));
        self.module.decorate_binding(resource.var, binding);
        self.uavs.insert(slot, resource);
        Ok(())
    }

    /// Stores the immediate constant buffer as a private `uvec4` array with a
    /// constant initializer.
    pub(super) fn emit_immediate_constant_buffer(&mut self, words: &[u32]) -> Result<(), CompileError> {
        if self.icb.is_some() {
            tracing::warn!("second immediate constant buffer ignored");
            return Ok(());
        }
        let mut elements: Vec<Word> = words
            .chunks(4)
            .map(|chunk| {
                let mut bits = [0u32; 4];
                bits[..chunk.len()].copy_from_slice(chunk);
                self.module.const_vector(ScalarType::U32, &bits)
            })
            .collect();
        if elements.is_empty() {
            elements.push(self.module.const_vector(ScalarType::U32, &[0; 4]));
        }
        let ty = self.module.array_type(ArrayType::new(
            VectorType::vec4(ScalarType::U32),
            elements.len() as u32,
        ));
        let init = self.module.const_composite(ty, &elements);
        let var = self
            .module
            .new_variable(ty, StorageClass::Private, Some(init));
        self.module.set_debug_name(var, "icb");
        self.icb = Some(var);
        Ok(())
    }

    fn resource(&self, op: &Sm4Operand) -> Result<ResourceBinding, CompileError> {
        let slot = op
            .index(0)
            .ok_or_else(|| CompileError::invalid(format!("{:?} operand without a slot", op.ty)))?;
        let (table, prefix) = match op.ty {
            OperandType::Resource => (&self.textures, "t"),
            OperandType::Uav => (&self.uavs, "u"),
            other => {
                return Err(CompileError::invalid(format!(
                    "{other:?} operand used as a resource"
                )))
            }
        };
        table
            .get(&slot)
            .copied()
            .ok_or_else(|| CompileError::invalid(format!("{prefix}{slot} used without a declaration")))
    }

    fn typed_image(&self, op: &Sm4Operand) -> Result<(ResourceBinding, ImageType), CompileError> {
        let resource = self.resource(op)?;
        let image = resource
            .image
            .ok_or_else(|| CompileError::invalid("typed access to a raw or structured buffer"))?;
        Ok((resource, image))
    }

    fn load_image(&mut self, resource: ResourceBinding, image: ImageType) -> Result<Word, CompileError> {
        let ty = self.module.image_type(image);
        Ok(self.module.load(ty, None, resource.var, None, [])?)
    }

    fn sampled_image(
        &mut self,
        resource: ResourceBinding,
        image: ImageType,
        sampler_op: &Sm4Operand,
    ) -> Result<Word, CompileError> {
        let slot = sampler_op
            .index(0)
            .ok_or_else(|| CompileError::invalid("sampler operand without a slot"))?;
        let sampler_var = self
            .samplers
            .get(&slot)
            .copied()
            .ok_or_else(|| CompileError::invalid(format!("s{slot} used without a declaration")))?;
        let image_ty = self.module.image_type(image);
        let loaded = self
            .module
            .load(image_ty, None, resource.var, None, [])?;
        let sampler_ty = self.module.sampler_type();
        let sampler = self
            .module
            .load(sampler_ty, None, sampler_var, None, [])?;
        let ty = self.module.sampled_image_type(image_ty);
        Ok(self.module.sampled_image(ty, None, loaded, sampler)?)
    }

    fn load_coords(
        &mut self,
        op: &Sm4Operand,
        count: u32,
        ctype: ScalarType,
    ) -> Result<RegisterValue, CompileError> {
        let value = self.emit_load_src(op, WriteMask::first_n(count))?;
        self.bitcast(value, ctype)
    }

    fn load_scalar(&mut self, op: &Sm4Operand, ctype: ScalarType) -> Result<Word, CompileError> {
        let value = self.emit_load_src(op, WriteMask::X)?;
        Ok(self.bitcast(value, ctype)?.id)
    }

    /// `aoffimmi` offsets, if any are non-zero.
    fn immediate_offset(&mut self, inst: &Sm4Instruction, dimension: ViewDimension) -> Option<Word> {
        let count = offset_count(dimension) as usize;
        let offsets = &inst.sample_offsets[..count];
        if count == 0 || offsets.iter().all(|&o| o == 0) {
            return None;
        }
        let bits: Vec<u32> = offsets.iter().map(|&o| i32::from(o) as u32).collect();
        Some(self.module.const_vector(ScalarType::I32, &bits))
    }

    /// Writes a four-component resource result through the resource
    /// operand's swizzle.
    fn store_resource_result(
        &mut self,
        dst_op: &Sm4Operand,
        resource_op: &Sm4Operand,
        value: RegisterValue,
        saturate: bool,
    ) -> Result<(), CompileError> {
        let value = if value.ty.ccount == 1 {
            self.extend(value, 4)?
        } else {
            value
        };
        let lanes: Vec<u32> = dst_op
            .mask
            .components()
            .map(|c| resource_op.swizzle.lane(c))
            .collect();
        let picked = self.swizzle(value, &lanes)?;
        self.emit_store_dst(dst_op, picked, saturate)
    }

    /// Clamps a fetch level to the view's last mip when requested.
    fn clamp_lod(&mut self, image: Word, lod: Word) -> Result<Word, CompileError> {
        if self.options.texture_clamp != TextureClampMode::ClampLod {
            return Ok(lod);
        }
        self.module.enable_capability(Capability::ImageQuery);
        let i32_ty = self.module.scalar_type(ScalarType::I32);
        let levels = self.module.image_query_levels(i32_ty, None, image)?;
        let one = self.module.const_i32(1);
        let last = self.module.i_sub(i32_ty, None, levels, one)?;
        let zero = self.module.const_i32(0);
        let clamped = self.glsl(
            GLOp::SClamp,
            VectorType::scalar(ScalarType::I32),
            &[lod, zero, last],
        )?;
        Ok(clamped.id)
    }

    /// `sample`, `sample_l`, `sample_b`, `sample_d`, `sample_c`, `sample_c_lz`.
    pub(super) fn emit_sample(&mut self, inst: &Sm4Instruction) -> Result<(), CompileError> {
        let dst_op = dst(inst, 0)?;
        let resource_op = src(inst, 1)?;
        let (resource, image) = self.typed_image(resource_op)?;
        let coord = self.load_coords(src(inst, 0)?, coord_count(resource.dimension), ScalarType::F32)?;
        let sampled = self.sampled_image(resource, image, src(inst, 2)?)?;

        let implicit = self.stage == ShaderStage::Pixel;
        let mut args = ImageArgs {
            const_offset: self.immediate_offset(inst, resource.dimension),
            ..ImageArgs::default()
        };
        let mut dref = None;
        match inst.opcode {
            OPCODE_SAMPLE_L => args.lod = Some(self.load_scalar(src(inst, 3)?, ScalarType::F32)?),
            OPCODE_SAMPLE_B => {
                if !implicit {
                    return Err(CompileError::invalid("sample_b outside a pixel shader"));
                }
                args.bias = Some(self.load_scalar(src(inst, 3)?, ScalarType::F32)?);
            }
            OPCODE_SAMPLE_D => {
                let count = gradient_count(resource.dimension);
                let ddx = self.load_coords(src(inst, 3)?, count, ScalarType::F32)?;
                let ddy = self.load_coords(src(inst, 4)?, count, ScalarType::F32)?;
                args.grad = Some((ddx.id, ddy.id));
            }
            OPCODE_SAMPLE_C | OPCODE_SAMPLE_C_LZ => {
                dref = Some(self.load_scalar(src(inst, 3)?, ScalarType::F32)?);
                if inst.opcode == OPCODE_SAMPLE_C_LZ || !implicit {
                    args.lod = Some(self.module.const_f32(0.0));
                }
            }
            _ => {
                if !implicit {
                    args.lod = Some(self.module.const_f32(0.0));
                }
            }
        }

        let result = match dref {
            Some(dref) => {
                let ty = VectorType::scalar(ScalarType::F32);
                let ty_id = self.module.vector_type(ty);
                let id = if args.is_explicit() {
                    let (flags, params) = args.operands();
                    self.module.image_sample_dref_explicit_lod(
                        ty_id, None, sampled, coord.id, dref, flags, params,
                    )?
                } else {
                    let (flags, params) = args.optional();
                    self.module.image_sample_dref_implicit_lod(
                        ty_id, None, sampled, coord.id, dref, flags, params,
                    )?
                };
                RegisterValue { ty, id }
            }
            None => {
                let ty = VectorType::vec4(image.sampled_type);
                let ty_id = self.module.vector_type(ty);
                let id = if args.is_explicit() {
                    let (flags, params) = args.operands();
                    self.module
                        .image_sample_explicit_lod(ty_id, None, sampled, coord.id, flags, params)?
                } else {
                    let (flags, params) = args.optional();
                    self.module
                        .image_sample_implicit_lod(ty_id, None, sampled, coord.id, flags, params)?
                };
                RegisterValue { ty, id }
            }
        };
        self.store_resource_result(dst_op, resource_op, result, inst.saturate())
    }

    /// `gather4`, `gather4_c`, `gather4_po`, `gather4_po_c`.
    pub(super) fn emit_gather(&mut self, inst: &Sm4Instruction) -> Result<(), CompileError> {
        let programmable = matches!(inst.opcode, OPCODE_GATHER4_PO | OPCODE_GATHER4_PO_C);
        let base = usize::from(programmable);
        let dst_op = dst(inst, 0)?;
        let resource_op = src(inst, base + 1)?;
        let sampler_op = src(inst, base + 2)?;
        let (resource, image) = self.typed_image(resource_op)?;
        let coord = self.load_coords(src(inst, 0)?, coord_count(resource.dimension), ScalarType::F32)?;
        let sampled = self.sampled_image(resource, image, sampler_op)?;

        let mut args = ImageArgs::default();
        let offsets = offset_count(resource.dimension);
        if programmable && offsets > 0 {
            let offset = self.load_coords(src(inst, 1)?, offsets, ScalarType::I32)?;
            self.module
                .enable_capability(Capability::ImageGatherExtended);
            args.offset = Some(offset.id);
        } else {
            args.const_offset = self.immediate_offset(inst, resource.dimension);
        }

        let compare = matches!(inst.opcode, OPCODE_GATHER4_C | OPCODE_GATHER4_PO_C);
        let (flags, params) = args.optional();
        let result = if compare {
            let dref = self.load_scalar(src(inst, base + 3)?, ScalarType::F32)?;
            let ty = VectorType::vec4(ScalarType::F32);
            let ty_id = self.module.vector_type(ty);
            let id = self
                .module
                .image_dref_gather(ty_id, None, sampled, coord.id, dref, flags, params)?;
            RegisterValue { ty, id }
        } else {
            let component = self.module.const_u32(sampler_op.swizzle.lane(0));
            let ty = VectorType::vec4(image.sampled_type);
            let ty_id = self.module.vector_type(ty);
            let id = self
                .module
                .image_gather(ty_id, None, sampled, coord.id, component, flags, params)?;
            RegisterValue { ty, id }
        };
        self.store_resource_result(dst_op, resource_op, result, false)
    }

    /// `ld` and `ld_ms`.
    pub(super) fn emit_fetch(&mut self, inst: &Sm4Instruction) -> Result<(), CompileError> {
        let dst_op = dst(inst, 0)?;
        let resource_op = src(inst, 1)?;
        let (resource, image) = self.typed_image(resource_op)?;
        let address = self.emit_load_src(src(inst, 0)?, WriteMask::XYZW)?;
        let address = self.bitcast(address, ScalarType::I32)?;
        let lanes: Vec<u32> = (0..coord_count(resource.dimension)).collect();
        let coord = self.swizzle(address, &lanes)?;
        let loaded = self.load_image(resource, image)?;

        let ty = VectorType::vec4(image.sampled_type);
        let ty_id = self.module.vector_type(ty);
        if image.sampled == 2 {
            let id = self
                .module
                .image_read(ty_id, None, loaded, coord.id, None, [])?;
            return self.store_resource_result(dst_op, resource_op, RegisterValue { ty, id }, false);
        }

        let mut args = ImageArgs::default();
        if inst.opcode == OPCODE_LD_MS {
            args.sample = Some(self.load_scalar(src(inst, 2)?, ScalarType::I32)?);
        } else if resource.dimension != ViewDimension::Buffer && !image.ms {
            let lod = self.extract(address, 3)?;
            args.lod = Some(self.clamp_lod(loaded, lod.id)?);
        }
        if resource.dimension != ViewDimension::Buffer {
            args.const_offset = self.immediate_offset(inst, resource.dimension);
        }
        let (flags, params) = args.optional();
        let id = self
            .module
            .image_fetch(ty_id, None, loaded, coord.id, flags, params)?;
        self.store_resource_result(dst_op, resource_op, RegisterValue { ty, id }, false)
    }

    /// `resinfo`: size, array layers and mip count of a texture.
    pub(super) fn emit_resinfo(&mut self, inst: &Sm4Instruction) -> Result<(), CompileError> {
        let dst_op = dst(inst, 0)?;
        let resource_op = src(inst, 1)?;
        let (resource, image) = self.typed_image(resource_op)?;
        if resource.dimension == ViewDimension::Buffer {
            return Err(CompileError::invalid("resinfo on a buffer"));
        }
        self.module.enable_capability(Capability::ImageQuery);
        let mip = self.load_scalar(src(inst, 0)?, ScalarType::I32)?;
        let loaded = self.load_image(resource, image)?;

        let count = size_count(resource.dimension);
        let size_ty = VectorType::new(ScalarType::I32, count);
        let size_ty_id = self.module.vector_type(size_ty);
        let i32_ty = self.module.scalar_type(ScalarType::I32);
        let (size, levels) = if image.sampled == 1 && !image.ms {
            let lod = self.clamp_lod(loaded, mip)?;
            let size = self
                .module
                .image_query_size_lod(size_ty_id, None, loaded, lod)?;
            let levels = self.module.image_query_levels(i32_ty, None, loaded)?;
            (size, levels)
        } else {
            let size = self.module.image_query_size(size_ty_id, None, loaded)?;
            (size, self.module.const_i32(1))
        };
        let size = RegisterValue {
            ty: size_ty,
            id: size,
        };

        let zero = self.module.const_i32(0);
        let mut parts = Vec::with_capacity(4);
        for c in 0..count {
            parts.push(self.extract(size, c)?.id);
        }
        parts.resize(3, zero);
        parts.push(levels);
        let value = self.compose(ScalarType::I32, &parts)?;

        let value = match inst.resinfo_return_type() {
            2 => self.bitcast(value, ScalarType::U32)?,
            mode => {
                let ty = VectorType::vec4(ScalarType::F32);
                let ty_id = self.module.vector_type(ty);
                let id = self.module.convert_s_to_f(ty_id, None, value.id)?;
                let value = RegisterValue { ty, id };
                if mode == 1 {
                    self.reciprocal_size(value, count)?
                } else {
                    value
                }
            }
        };
        self.store_resource_result(dst_op, resource_op, value, inst.saturate())
    }

    /// `1 / size` for the first `count` components, leaving the rest.
    fn reciprocal_size(&mut self, value: RegisterValue, count: u32) -> Result<RegisterValue, CompileError> {
        let f32_ty = self.module.scalar_type(ScalarType::F32);
        let one = self.module.const_f32(1.0);
        let mut parts = Vec::with_capacity(4);
        for c in 0..4 {
            let component = self.extract(value, c)?.id;
            parts.push(if c < count {
                self.module.f_div(f32_ty, None, one, component)?
            } else {
                component
            });
        }
        self.compose(ScalarType::F32, &parts)
    }

    /// `bufinfo`: element count of a typed buffer, byte size of a raw buffer
    /// or structure count of a structured one.
    pub(super) fn emit_bufinfo(&mut self, inst: &Sm4Instruction) -> Result<(), CompileError> {
        let dst_op = dst(inst, 0)?;
        let resource = self.resource(src(inst, 0)?)?;
        let u32_ty = self.module.scalar_type(ScalarType::U32);
        let id = match resource.image {
            Some(image) => {
                self.module.enable_capability(Capability::ImageQuery);
                let loaded = self.load_image(resource, image)?;
                let i32_ty = self.module.scalar_type(ScalarType::I32);
                let size = self.module.image_query_size(i32_ty, None, loaded)?;
                self.module.bitcast(u32_ty, None, size)?
            }
            None => {
                let dwords = self.module.array_length(u32_ty, None, resource.var, 0)?;
                let four = self.module.const_u32(4);
                let bytes = self.module.i_mul(u32_ty, None, dwords, four)?;
                if resource.stride == 0 {
                    bytes
                } else {
                    let stride = self.module.const_u32(resource.stride);
                    self.module.u_div(u32_ty, None, bytes, stride)?
                }
            }
        };
        let value = RegisterValue {
            ty: VectorType::scalar(ScalarType::U32),
            id,
        };
        self.emit_store_dst(dst_op, value, false)
    }

    /// `sampleinfo`: sample count of a multisampled texture in `.x`.
    pub(super) fn emit_sample_info(&mut self, inst: &Sm4Instruction) -> Result<(), CompileError> {
        let dst_op = dst(inst, 0)?;
        let resource_op = src(inst, 0)?;
        if resource_op.ty == OperandType::Rasterizer {
            return Err(self.unsupported(inst));
        }
        let (resource, image) = self.typed_image(resource_op)?;
        let samples = if image.ms {
            self.module.enable_capability(Capability::ImageQuery);
            let loaded = self.load_image(resource, image)?;
            let i32_ty = self.module.scalar_type(ScalarType::I32);
            self.module.image_query_samples(i32_ty, None, loaded)?
        } else {
            self.module.const_i32(1)
        };
        let zero = self.module.const_i32(0);
        let value = self.compose(ScalarType::I32, &[samples, zero, zero, zero])?;
        let value = if inst.resinfo_return_type() & 1 != 0 {
            self.bitcast(value, ScalarType::U32)?
        } else {
            let ty = VectorType::vec4(ScalarType::F32);
            let ty_id = self.module.vector_type(ty);
            let id = self.module.convert_s_to_f(ty_id, None, value.id)?;
            RegisterValue { ty, id }
        };
        self.store_resource_result(dst_op, resource_op, value, inst.saturate())
    }

    /// `lod`: clamped and unclamped level of detail.
    pub(super) fn emit_query_lod(&mut self, inst: &Sm4Instruction) -> Result<(), CompileError> {
        if self.stage != ShaderStage::Pixel {
            return Err(CompileError::invalid("lod outside a pixel shader"));
        }
        let dst_op = dst(inst, 0)?;
        let resource_op = src(inst, 1)?;
        let (resource, image) = self.typed_image(resource_op)?;
        let coord = self.load_coords(
            src(inst, 0)?,
            gradient_count(resource.dimension),
            ScalarType::F32,
        )?;
        let sampled = self.sampled_image(resource, image, src(inst, 2)?)?;
        self.module.enable_capability(Capability::ImageQuery);
        let ty = VectorType::new(ScalarType::F32, 2);
        let ty_id = self.module.vector_type(ty);
        let id = self.module.image_query_lod(ty_id, None, sampled, coord.id)?;
        let value = self.pad_vec4(RegisterValue { ty, id })?;
        self.store_resource_result(dst_op, resource_op, value, false)
    }

    /// `(var, storage class, stride)` of a raw or structured buffer operand.
    fn buffer_target(&self, op: &Sm4Operand) -> Result<(Word, StorageClass, u32), CompileError> {
        match op.ty {
            OperandType::ThreadGroupSharedMemory => {
                let reg = op
                    .index(0)
                    .ok_or_else(|| CompileError::invalid("g# operand without a register"))?;
                let tgsm = self.thread_group_memory(reg)?;
                Ok((tgsm.var, StorageClass::Workgroup, tgsm.stride))
            }
            _ => {
                let resource = self.resource(op)?;
                if resource.image.is_some() {
                    return Err(CompileError::invalid(
                        "raw or structured access to a typed resource",
                    ));
                }
                Ok((resource.var, StorageClass::StorageBuffer, resource.stride))
            }
        }
    }

    /// Pointer to dword `index` of a buffer or `g#` array.
    fn dword_ptr(&mut self, var: Word, sclass: StorageClass, index: Word) -> Result<Word, CompileError> {
        let u32_ty = self.module.scalar_type(ScalarType::U32);
        let ptr_ty = self.module.pointer_type(u32_ty, sclass);
        let id = if sclass == StorageClass::Workgroup {
            self.module.access_chain(ptr_ty, None, var, [index])?
        } else {
            let zero = self.module.const_u32(0);
            self.module.access_chain(ptr_ty, None, var, [zero, index])?
        };
        Ok(id)
    }

    /// First dword addressed by a raw byte offset, or by a structure index
    /// plus byte offset when `index_op` is given.
    fn buffer_dword_index(
        &mut self,
        stride: u32,
        index_op: Option<&Sm4Operand>,
        offset_op: &Sm4Operand,
    ) -> Result<Word, CompileError> {
        let u32_ty = self.module.scalar_type(ScalarType::U32);
        let mut bytes = self.load_scalar(offset_op, ScalarType::U32)?;
        if let Some(index_op) = index_op {
            let index = self.load_scalar(index_op, ScalarType::U32)?;
            let stride = self.module.const_u32(stride);
            let base = self.module.i_mul(u32_ty, None, index, stride)?;
            bytes = self.module.i_add(u32_ty, None, base, bytes)?;
        }
        let two = self.module.const_u32(2);
        Ok(self.module.shift_right_logical(u32_ty, None, bytes, two)?)
    }

    fn offset_dword(&mut self, base: Word, component: u32) -> Result<Word, CompileError> {
        if component == 0 {
            return Ok(base);
        }
        let u32_ty = self.module.scalar_type(ScalarType::U32);
        let offset = self.module.const_u32(component);
        Ok(self.module.i_add(u32_ty, None, base, offset)?)
    }

    /// `ld_raw` and `ld_structured`.
    pub(super) fn emit_buffer_load(&mut self, inst: &Sm4Instruction) -> Result<(), CompileError> {
        let dst_op = dst(inst, 0)?;
        let (index_op, offset_op, resource_op) = if inst.opcode == OPCODE_LD_STRUCTURED {
            (Some(src(inst, 0)?), src(inst, 1)?, src(inst, 2)?)
        } else {
            (None, src(inst, 0)?, src(inst, 1)?)
        };
        let (var, sclass, stride) = self.buffer_target(resource_op)?;
        let base = self.buffer_dword_index(stride, index_op, offset_op)?;

        let u32_ty = self.module.scalar_type(ScalarType::U32);
        let mut parts = Vec::with_capacity(4);
        for c in dst_op.mask.components() {
            let index = self.offset_dword(base, resource_op.swizzle.lane(c))?;
            let ptr = self.dword_ptr(var, sclass, index)?;
            parts.push(self.module.load(u32_ty, None, ptr, None, [])?);
        }
        if parts.is_empty() {
            return Ok(());
        }
        let value = self.compose(ScalarType::U32, &parts)?;
        self.emit_store_dst(dst_op, value, false)
    }

    /// `store_raw` and `store_structured`.
    pub(super) fn emit_buffer_store(&mut self, inst: &Sm4Instruction) -> Result<(), CompileError> {
        let dst_op = dst(inst, 0)?;
        let (index_op, offset_op, value_op) = if inst.opcode == OPCODE_STORE_STRUCTURED {
            (Some(src(inst, 0)?), src(inst, 1)?, src(inst, 2)?)
        } else {
            (None, src(inst, 0)?, src(inst, 1)?)
        };
        if dst_op.mask.is_empty() {
            return Ok(());
        }
        let (var, sclass, stride) = self.buffer_target(dst_op)?;
        let base = self.buffer_dword_index(stride, index_op, offset_op)?;
        let value = self.emit_load_src(value_op, dst_op.mask)?;
        let value = self.bitcast(value, ScalarType::U32)?;
        for (i, c) in dst_op.mask.components().enumerate() {
            let index = self.offset_dword(base, c)?;
            let ptr = self.dword_ptr(var, sclass, index)?;
            let component = self.extract(value, i as u32)?;
            self.module.store(ptr, component.id, None, [])?;
        }
        Ok(())
    }

    /// `ld_uav_typed`.
    pub(super) fn emit_typed_uav_load(&mut self, inst: &Sm4Instruction) -> Result<(), CompileError> {
        let dst_op = dst(inst, 0)?;
        let resource_op = src(inst, 1)?;
        let (resource, image) = self.typed_image(resource_op)?;
        let coord = self.load_coords(src(inst, 0)?, coord_count(resource.dimension), ScalarType::I32)?;
        let loaded = self.load_image(resource, image)?;
        let ty = VectorType::vec4(image.sampled_type);
        let ty_id = self.module.vector_type(ty);
        let id = self
            .module
            .image_read(ty_id, None, loaded, coord.id, None, [])?;
        self.store_resource_result(dst_op, resource_op, RegisterValue { ty, id }, false)
    }

    /// `store_uav_typed`. All four components are written.
    pub(super) fn emit_typed_uav_store(&mut self, inst: &Sm4Instruction) -> Result<(), CompileError> {
        let (resource, image) = self.typed_image(dst(inst, 0)?)?;
        let coord = self.load_coords(src(inst, 0)?, coord_count(resource.dimension), ScalarType::I32)?;
        let value = self.emit_load_src(src(inst, 1)?, WriteMask::XYZW)?;
        let value = self.bitcast(value, image.sampled_type)?;
        let loaded = self.load_image(resource, image)?;
        self.module
            .image_write(loaded, coord.id, value.id, None, [])?;
        Ok(())
    }

    /// Pointer, pointee type and scope of an atomic's target.
    fn atomic_target(
        &mut self,
        target: &Sm4Operand,
        address: &Sm4Operand,
    ) -> Result<(Word, ScalarType, Scope), CompileError> {
        if target.ty == OperandType::Uav {
            let resource = self.resource(target)?;
            if let Some(image) = resource.image {
                let coord = self.load_coords(address, coord_count(resource.dimension), ScalarType::I32)?;
                let pointee = self.module.scalar_type(image.sampled_type);
                let ptr_ty = self.module.pointer_type(pointee, StorageClass::Image);
                let sample = self.module.const_u32(0);
                let ptr = self
                    .module
                    .image_texel_pointer(ptr_ty, None, resource.var, coord.id, sample)?;
                return Ok((ptr, image.sampled_type, Scope::Device));
            }
        }

        let (var, sclass, stride) = self.buffer_target(target)?;
        let index = if stride == 0 {
            self.buffer_dword_index(0, None, address)?
        } else {
            let u32_ty = self.module.scalar_type(ScalarType::U32);
            let address = self.load_coords(address, 2, ScalarType::U32)?;
            let element = self.extract(address, 0)?;
            let offset = self.extract(address, 1)?;
            let stride = self.module.const_u32(stride);
            let base = self.module.i_mul(u32_ty, None, element.id, stride)?;
            let bytes = self.module.i_add(u32_ty, None, base, offset.id)?;
            let two = self.module.const_u32(2);
            self.module.shift_right_logical(u32_ty, None, bytes, two)?
        };
        let ptr = self.dword_ptr(var, sclass, index)?;
        let scope = if sclass == StorageClass::Workgroup {
            Scope::Workgroup
        } else {
            Scope::Device
        };
        Ok((ptr, ScalarType::U32, scope))
    }

    /// `atomic_*` and `imm_atomic_*` on buffers, images and `g#`.
    pub(super) fn emit_atomic(&mut self, inst: &Sm4Instruction) -> Result<(), CompileError> {
        let returns = inst.dst.len() == 2;
        let (out, target) = if returns {
            (Some(dst(inst, 0)?), dst(inst, 1)?)
        } else {
            (None, dst(inst, 0)?)
        };
        let (ptr, ctype, scope) = self.atomic_target(target, src(inst, 0)?)?;
        let ty = self.module.scalar_type(ctype);
        let scope = self.module.const_u32(scope as u32);
        let semantics = self.module.const_u32(MemorySemantics::NONE.bits());

        let id = match inst.opcode {
            OPCODE_ATOMIC_CMP_STORE | OPCODE_IMM_ATOMIC_CMP_EXCH => {
                let comparator = self.load_scalar(src(inst, 1)?, ctype)?;
                let value = self.load_scalar(src(inst, 2)?, ctype)?;
                self.module.atomic_compare_exchange(
                    ty, None, ptr, scope, semantics, semantics, value, comparator,
                )?
            }
            opcode => {
                let value = self.load_scalar(src(inst, 1)?, ctype)?;
                match opcode {
                    OPCODE_ATOMIC_AND | OPCODE_IMM_ATOMIC_AND => {
                        self.module.atomic_and(ty, None, ptr, scope, semantics, value)?
                    }
                    OPCODE_ATOMIC_OR | OPCODE_IMM_ATOMIC_OR => {
                        self.module.atomic_or(ty, None, ptr, scope, semantics, value)?
                    }
                    OPCODE_ATOMIC_XOR | OPCODE_IMM_ATOMIC_XOR => {
                        self.module.atomic_xor(ty, None, ptr, scope, semantics, value)?
                    }
                    OPCODE_ATOMIC_IADD | OPCODE_IMM_ATOMIC_IADD => {
                        self.module.atomic_i_add(ty, None, ptr, scope, semantics, value)?
                    }
                    OPCODE_ATOMIC_IMAX | OPCODE_IMM_ATOMIC_IMAX => {
                        self.module.atomic_s_max(ty, None, ptr, scope, semantics, value)?
                    }
                    OPCODE_ATOMIC_IMIN | OPCODE_IMM_ATOMIC_IMIN => {
                        self.module.atomic_s_min(ty, None, ptr, scope, semantics, value)?
                    }
                    OPCODE_ATOMIC_UMAX | OPCODE_IMM_ATOMIC_UMAX => {
                        self.module.atomic_u_max(ty, None, ptr, scope, semantics, value)?
                    }
                    OPCODE_ATOMIC_UMIN | OPCODE_IMM_ATOMIC_UMIN => {
                        self.module.atomic_u_min(ty, None, ptr, scope, semantics, value)?
                    }
                    OPCODE_IMM_ATOMIC_EXCH => {
                        self.module.atomic_exchange(ty, None, ptr, scope, semantics, value)?
                    }
                    _ => return Err(self.unsupported(inst)),
                }
            }
        };

        if let Some(out) = out {
            let value = RegisterValue {
                ty: VectorType::scalar(ctype),
                id,
            };
            self.emit_store_dst(out, value, false)?;
        }
        Ok(())
    }

    fn uav_counter(&mut self, slot: u32) -> Result<Word, CompileError> {
        let resource = self
            .uavs
            .get(&slot)
            .copied()
            .ok_or_else(|| CompileError::invalid(format!("u{slot} used without a declaration")))?;
        if let Some(counter) = resource.counter {
            return Ok(counter);
        }
        self.enable_storage_buffers();
        let block = self.module.counter_block();
        let var = self
            .module
            .new_variable(block, StorageClass::StorageBuffer, None);
        self.module.set_debug_name(var, &format!("u{slot}_counter"));
        let binding = self.define_slot(
            BindingClass::UavCounter,
            slot,
            ResourceKind::UavCounter,
            ViewDimension::Buffer,
            0,
        )?;
        self.module.decorate_binding(var, binding);
        if let Some(uav) = self.uavs.get_mut(&slot) {
            uav.counter = Some(var);
        }
        Ok(var)
    }

    /// `imm_atomic_alloc` and `imm_atomic_consume` on a UAV's hidden counter.
    pub(super) fn emit_atomic_counter(&mut self, inst: &Sm4Instruction) -> Result<(), CompileError> {
        let dst_op = dst(inst, 0)?;
        let uav_op = src(inst, 0)?;
        let slot = uav_op
            .index(0)
            .ok_or_else(|| CompileError::invalid("counter operand without a slot"))?;
        let counter = self.uav_counter(slot)?;

        let u32_ty = self.module.scalar_type(ScalarType::U32);
        let zero = self.module.const_u32(0);
        let one = self.module.const_u32(1);
        let ptr_ty = self.module.pointer_type(u32_ty, StorageClass::StorageBuffer);
        let ptr = self.module.access_chain(ptr_ty, None, counter, [zero])?;
        let scope = self.module.const_u32(Scope::Device as u32);
        let semantics = self.module.const_u32(MemorySemantics::NONE.bits());

        let id = if inst.opcode == OPCODE_IMM_ATOMIC_ALLOC {
            self.module
                .atomic_i_add(u32_ty, None, ptr, scope, semantics, one)?
        } else {
            let previous = self
                .module
                .atomic_i_sub(u32_ty, None, ptr, scope, semantics, one)?;
            self.module.i_sub(u32_ty, None, previous, one)?
        };
        let value = RegisterValue {
            ty: VectorType::scalar(ScalarType::U32),
            id,
        };
        self.emit_store_dst(dst_op, value, false)
    }

    /// `sync` with any combination of execution and memory barriers.
    pub(super) fn emit_sync(&mut self, inst: &Sm4Instruction) -> Result<(), CompileError> {
        let flags = inst.sync_flags();
        let mut semantics = MemorySemantics::NONE;
        if flags & SYNC_THREAD_GROUP_MEMORY != 0 {
            semantics |= MemorySemantics::WORKGROUP_MEMORY;
        }
        if flags & (SYNC_UAV_GROUP | SYNC_UAV_GLOBAL) != 0 {
            semantics |= MemorySemantics::UNIFORM_MEMORY | MemorySemantics::IMAGE_MEMORY;
        }
        if !semantics.is_empty() {
            semantics |= MemorySemantics::ACQUIRE_RELEASE;
        }
        let memory_scope = if flags & SYNC_UAV_GLOBAL != 0 {
            Scope::Device
        } else {
            Scope::Workgroup
        };

        let memory = self.module.const_u32(memory_scope as u32);
        let semantics = self.module.const_u32(semantics.bits());
        if flags & SYNC_THREAD_GROUP != 0 {
            let execution = self.module.const_u32(Scope::Workgroup as u32);
            self.module.control_barrier(execution, memory, semantics)?;
        } else if flags & (SYNC_THREAD_GROUP_MEMORY | SYNC_UAV_GROUP | SYNC_UAV_GLOBAL) != 0 {
            self.module.memory_barrier(memory, semantics)?;
        }
        Ok(())
    }

    /// `eval_centroid`, `eval_sample_index` and `eval_snapped`.
    pub(super) fn emit_interpolate(&mut self, inst: &Sm4Instruction) -> Result<(), CompileError> {
        if self.stage != ShaderStage::Pixel {
            return Err(CompileError::invalid(format!(
                "{} outside a pixel shader",
                inst.name()
            )));
        }
        let dst_op = dst(inst, 0)?;
        let input_op = src(inst, 0)?;
        let reg = input_op
            .index(0)
            .filter(|_| input_op.ty == OperandType::Input)
            .ok_or_else(|| CompileError::invalid("interpolation source must be an input register"))?;
        let var = self
            .inputs
            .get(&reg)
            .and_then(|io| io.var)
            .ok_or_else(|| CompileError::invalid(format!("v{reg} has no interpolated variable")))?;
        if var.ty.ctype != ScalarType::F32 {
            return Err(CompileError::invalid(format!("v{reg} is not a float input")));
        }
        self.module
            .enable_capability(Capability::InterpolationFunction);

        let (op, args) = match inst.opcode {
            OPCODE_EVAL_CENTROID => (GLOp::InterpolateAtCentroid, vec![var.id]),
            OPCODE_EVAL_SAMPLE_INDEX => {
                let sample = self.load_scalar(src(inst, 1)?, ScalarType::I32)?;
                (GLOp::InterpolateAtSample, vec![var.id, sample])
            }
            _ => {
                // Offsets are in 1/16 pixel units.
                let offset = self.load_coords(src(inst, 1)?, 2, ScalarType::I32)?;
                let ty = VectorType::new(ScalarType::F32, 2);
                let ty_id = self.module.vector_type(ty);
                let offset = self.module.convert_s_to_f(ty_id, None, offset.id)?;
                let scale = self.const_splat(ScalarType::F32, (1.0f32 / 16.0).to_bits(), 2);
                let offset = self.module.f_mul(ty_id, None, offset, scale.id)?;
                (GLOp::InterpolateAtOffset, vec![var.id, offset])
            }
        };
        let value = self.glsl(op, var.ty, &args)?;
        let value = self.pad_vec4(value)?;
        let lanes: Vec<u32> = dst_op
            .mask
            .components()
            .map(|c| input_op.swizzle.lane(c))
            .collect();
        let value = self.swizzle(value, &lanes)?;
        let value = self.apply_modifier(value, input_op.modifier)?;
        self.emit_store_dst(dst_op, value, inst.saturate())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_dimensions_decode() {
        assert_eq!(
            view_dimension(3).map(|d| d.0),
            Some(ViewDimension::Texture2D)
        );
        assert_eq!(
            view_dimension(9).map(|d| (d.0, d.2, d.3)),
            Some((ViewDimension::Texture2DMsArray, true, true))
        );
        assert!(view_dimension(0).is_none());
        assert!(view_dimension(11).is_none());
    }

    #[test]
    fn coordinate_counts_follow_dimension() {
        assert_eq!(coord_count(ViewDimension::Buffer), 1);
        assert_eq!(coord_count(ViewDimension::Texture2DArray), 3);
        assert_eq!(coord_count(ViewDimension::TextureCubeArray), 4);
        assert_eq!(offset_count(ViewDimension::TextureCube), 0);
        assert_eq!(size_count(ViewDimension::TextureCube), 2);
        assert_eq!(gradient_count(ViewDimension::TextureCube), 3);
    }

    #[test]
    fn return_type_uses_first_component() {
        assert_eq!(return_type(0x5555), ScalarType::F32);
        assert_eq!(return_type(0x4444), ScalarType::U32);
        assert_eq!(return_type(0x3333), ScalarType::I32);
    }

    #[test]
    fn image_operands_follow_bit_order() {
        let args = ImageArgs {
            lod: Some(7),
            const_offset: Some(9),
            bias: Some(5),
            ..ImageArgs::default()
        };
        let (flags, params) = args.operands();
        assert_eq!(
            flags,
            ImageOperands::BIAS | ImageOperands::LOD | ImageOperands::CONST_OFFSET
        );
        assert_eq!(
            params,
            vec![Operand::IdRef(5), Operand::IdRef(7), Operand::IdRef(9)]
        );
        assert_eq!(ImageArgs::default().optional().0, None);
    }
}
