//! [`rspirv::dr::Builder`] wrapper that interns types and constants.
//!
//! `rspirv` already deduplicates plain type declarations, but the compiler also
//! needs decorated block types that must be declared and decorated exactly
//! once. Every lookup goes through a `BTreeMap` keyed by structural identity so
//! ids are handed out in first-use order and output stays byte-identical.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::{Deref, DerefMut};

use rspirv::dr::{Builder, Operand};
use rspirv::spirv::{
    AddressingModel, BuiltIn, Capability, Decoration, Dim, ImageFormat, MemoryModel,
    StorageClass, Word,
};

use crate::sm4_ir::DataType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) enum ScalarType {
    Bool,
    U32,
    I32,
    F32,
}

impl ScalarType {
    pub fn is_integer(self) -> bool {
        matches!(self, ScalarType::U32 | ScalarType::I32)
    }
}

impl From<DataType> for ScalarType {
    fn from(value: DataType) -> Self {
        match value {
            DataType::Float32 => ScalarType::F32,
            DataType::Uint32 => ScalarType::U32,
            DataType::Sint32 => ScalarType::I32,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct VectorType {
    pub ctype: ScalarType,
    pub ccount: u32,
}

impl VectorType {
    pub const fn new(ctype: ScalarType, ccount: u32) -> Self {
        Self { ctype, ccount }
    }

    pub const fn scalar(ctype: ScalarType) -> Self {
        Self::new(ctype, 1)
    }

    pub const fn vec4(ctype: ScalarType) -> Self {
        Self::new(ctype, 4)
    }
}

/// `alength == 0` means "not an array" and collapses to the vector type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct ArrayType {
    pub vtype: VectorType,
    pub alength: u32,
}

impl ArrayType {
    pub const fn new(vtype: VectorType, alength: u32) -> Self {
        Self { vtype, alength }
    }
}

/// A computed value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RegisterValue {
    pub ty: VectorType,
    pub id: Word,
}

/// An addressable location. Reads and writes go through explicit loads and
/// stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RegisterPointer {
    pub ty: VectorType,
    pub sclass: StorageClass,
    pub id: Word,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ImageType {
    pub sampled_type: ScalarType,
    pub dim: Dim,
    pub arrayed: bool,
    pub ms: bool,
    /// 1 for sampled images, 2 for storage images.
    pub sampled: u32,
    pub format: ImageFormat,
}

impl ImageType {
    fn key(&self) -> (ScalarType, u32, bool, bool, u32, u32) {
        (
            self.sampled_type,
            self.dim as u32,
            self.arrayed,
            self.ms,
            self.sampled,
            self.format as u32,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum TypeKey {
    Void,
    Scalar(ScalarType),
    Vector(VectorType),
    Array(Word, u32),
    RuntimeArray(Word),
    Pointer(Word, u32),
    Function(Word, Vec<Word>),
    Struct(Vec<Word>),
    Image((ScalarType, u32, bool, bool, u32, u32)),
    Sampler,
    SampledImage(Word),
    ConstantBufferBlock(u32),
    StorageBufferBlock,
    CounterBlock,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum ConstKey {
    Scalar(ScalarType, u32),
    Composite(Word, Vec<Word>),
    Null(Word),
}

pub(crate) struct SpirvModule {
    builder: Builder,
    types: BTreeMap<TypeKey, Word>,
    constants: BTreeMap<ConstKey, Word>,
    capabilities: BTreeSet<u32>,
    extensions: BTreeSet<&'static str>,
    globals: Vec<(Word, StorageClass)>,
    glsl: Word,
    version: (u8, u8),
    strip_debug_names: bool,
}

impl Deref for SpirvModule {
    type Target = Builder;

    fn deref(&self) -> &Builder {
        &self.builder
    }
}

impl DerefMut for SpirvModule {
    fn deref_mut(&mut self) -> &mut Builder {
        &mut self.builder
    }
}

impl SpirvModule {
    pub fn new(version: (u8, u8), strip_debug_names: bool) -> Self {
        let mut builder = Builder::new();
        builder.set_version(version.0, version.1);
        builder.memory_model(AddressingModel::Logical, MemoryModel::GLSL450);
        let glsl = builder.ext_inst_import("GLSL.std.450");

        let mut module = Self {
            builder,
            types: BTreeMap::new(),
            constants: BTreeMap::new(),
            capabilities: BTreeSet::new(),
            extensions: BTreeSet::new(),
            globals: Vec::new(),
            glsl,
            version,
            strip_debug_names,
        };
        module.enable_capability(Capability::Shader);
        module
    }

    pub fn version(&self) -> (u8, u8) {
        self.version
    }

    /// Id of the `GLSL.std.450` extended instruction set.
    pub fn glsl(&self) -> Word {
        self.glsl
    }

    pub fn enable_capability(&mut self, capability: Capability) {
        if self.capabilities.insert(capability as u32) {
            self.builder.capability(capability);
        }
    }

    pub fn enable_extension(&mut self, name: &'static str) {
        if self.extensions.insert(name) {
            self.builder.extension(name);
        }
    }

    pub fn set_debug_name(&mut self, id: Word, name: &str) {
        if !self.strip_debug_names {
            self.builder.name(id, name);
        }
    }

    fn cached(&mut self, key: TypeKey, create: impl FnOnce(&mut Builder) -> Word) -> Word {
        if let Some(&id) = self.types.get(&key) {
            return id;
        }
        let id = create(&mut self.builder);
        self.types.insert(key, id);
        id
    }

    pub fn void_type(&mut self) -> Word {
        self.cached(TypeKey::Void, |b| b.type_void())
    }

    pub fn scalar_type(&mut self, ctype: ScalarType) -> Word {
        self.cached(TypeKey::Scalar(ctype), |b| match ctype {
            ScalarType::Bool => b.type_bool(),
            ScalarType::U32 => b.type_int(32, 0),
            ScalarType::I32 => b.type_int(32, 1),
            ScalarType::F32 => b.type_float(32),
        })
    }

    pub fn vector_type(&mut self, ty: VectorType) -> Word {
        let scalar = self.scalar_type(ty.ctype);
        if ty.ccount <= 1 {
            return scalar;
        }
        self.cached(TypeKey::Vector(ty), |b| b.type_vector(scalar, ty.ccount))
    }

    pub fn array_type(&mut self, ty: ArrayType) -> Word {
        let element = self.vector_type(ty.vtype);
        self.array_of(element, ty.alength)
    }

    /// `element[length]`, or `element` itself when `length` is zero.
    pub fn array_of(&mut self, element: Word, length: u32) -> Word {
        if length == 0 {
            return element;
        }
        let length_id = self.const_u32(length);
        self.cached(TypeKey::Array(element, length), |b| b.type_array(element, length_id))
    }

    pub fn pointer_type(&mut self, pointee: Word, sclass: StorageClass) -> Word {
        self.cached(TypeKey::Pointer(pointee, sclass as u32), |b| {
            b.type_pointer(None, sclass, pointee)
        })
    }

    pub fn function_type(&mut self, ret: Word, params: &[Word]) -> Word {
        self.cached(TypeKey::Function(ret, params.to_vec()), |b| {
            b.type_function(ret, params.iter().copied())
        })
    }

    pub fn void_function_type(&mut self) -> Word {
        let void = self.void_type();
        self.function_type(void, &[])
    }

    pub fn struct_type(&mut self, members: &[Word]) -> Word {
        self.cached(TypeKey::Struct(members.to_vec()), |b| {
            b.type_struct(members.iter().copied())
        })
    }

    pub fn image_type(&mut self, image: ImageType) -> Word {
        let sampled_type = self.scalar_type(image.sampled_type);
        self.cached(TypeKey::Image(image.key()), |b| {
            b.type_image(
                sampled_type,
                image.dim,
                0,
                u32::from(image.arrayed),
                u32::from(image.ms),
                image.sampled,
                image.format,
                None,
            )
        })
    }

    pub fn sampler_type(&mut self) -> Word {
        self.cached(TypeKey::Sampler, |b| b.type_sampler())
    }

    pub fn sampled_image_type(&mut self, image_type: Word) -> Word {
        self.cached(TypeKey::SampledImage(image_type), |b| {
            b.type_sampled_image(image_type)
        })
    }

    /// `struct { vec4<f32> data[len]; }` laid out as a uniform block.
    pub fn constant_buffer_block(&mut self, len: u32) -> Word {
        if let Some(&id) = self.types.get(&TypeKey::ConstantBufferBlock(len)) {
            return id;
        }
        // Declared with an explicit id so private `vec4[len]` arrays never
        // alias the laid-out type.
        let element = self.vector_type(VectorType::vec4(ScalarType::F32));
        let length = self.const_u32(len.max(1));
        let array_id = self.builder.id();
        let array = self
            .builder
            .type_array_id(Some(array_id), element, length);
        self.decorate_u32(array, Decoration::ArrayStride, 16);
        let block_id = self.builder.id();
        let block = self.builder.type_struct_id(Some(block_id), [array]);
        self.decorate_flag(block, Decoration::Block);
        self.builder
            .member_decorate(block, 0, Decoration::Offset, [Operand::LiteralBit32(0)]);
        self.types.insert(TypeKey::ConstantBufferBlock(len), block);
        block
    }

    /// `struct { u32 data[]; }`, shared by every raw and structured buffer.
    pub fn storage_buffer_block(&mut self) -> Word {
        if let Some(&id) = self.types.get(&TypeKey::StorageBufferBlock) {
            return id;
        }
        let u32_ty = self.scalar_type(ScalarType::U32);
        let array = self.cached(TypeKey::RuntimeArray(u32_ty), |b| b.type_runtime_array(u32_ty));
        self.decorate_u32(array, Decoration::ArrayStride, 4);
        let block_id = self.builder.id();
        let block = self.builder.type_struct_id(Some(block_id), [array]);
        self.decorate_flag(block, Decoration::Block);
        self.builder
            .member_decorate(block, 0, Decoration::Offset, [Operand::LiteralBit32(0)]);
        self.types.insert(TypeKey::StorageBufferBlock, block);
        block
    }

    /// `struct { u32 counter; }` backing a UAV's hidden append/consume counter.
    pub fn counter_block(&mut self) -> Word {
        if let Some(&id) = self.types.get(&TypeKey::CounterBlock) {
            return id;
        }
        let u32_ty = self.scalar_type(ScalarType::U32);
        let block_id = self.builder.id();
        let block = self.builder.type_struct_id(Some(block_id), [u32_ty]);
        self.decorate_flag(block, Decoration::Block);
        self.builder
            .member_decorate(block, 0, Decoration::Offset, [Operand::LiteralBit32(0)]);
        self.types.insert(TypeKey::CounterBlock, block);
        block
    }

    pub fn const_scalar(&mut self, ctype: ScalarType, bits: u32) -> Word {
        let key = ConstKey::Scalar(ctype, bits);
        if let Some(&id) = self.constants.get(&key) {
            return id;
        }
        let ty = self.scalar_type(ctype);
        let id = match ctype {
            ScalarType::Bool if bits != 0 => self.builder.constant_true(ty),
            ScalarType::Bool => self.builder.constant_false(ty),
            _ => self.builder.constant_bit32(ty, bits),
        };
        self.constants.insert(key, id);
        id
    }

    pub fn const_u32(&mut self, value: u32) -> Word {
        self.const_scalar(ScalarType::U32, value)
    }

    pub fn const_i32(&mut self, value: i32) -> Word {
        self.const_scalar(ScalarType::I32, value as u32)
    }

    pub fn const_f32(&mut self, value: f32) -> Word {
        self.const_scalar(ScalarType::F32, value.to_bits())
    }

    pub fn const_composite(&mut self, ty: Word, constituents: &[Word]) -> Word {
        let key = ConstKey::Composite(ty, constituents.to_vec());
        if let Some(&id) = self.constants.get(&key) {
            return id;
        }
        let id = self
            .builder
            .constant_composite(ty, constituents.iter().copied());
        self.constants.insert(key, id);
        id
    }

    /// A constant of `ctype` with one component per entry of `bits`.
    pub fn const_vector(&mut self, ctype: ScalarType, bits: &[u32]) -> Word {
        let components: Vec<Word> = bits.iter().map(|&b| self.const_scalar(ctype, b)).collect();
        if components.len() == 1 {
            return components[0];
        }
        let ty = self.vector_type(VectorType::new(ctype, components.len() as u32));
        self.const_composite(ty, &components)
    }

    pub fn const_null(&mut self, ty: Word) -> Word {
        let key = ConstKey::Null(ty);
        if let Some(&id) = self.constants.get(&key) {
            return id;
        }
        let id = self.builder.constant_null(ty);
        self.constants.insert(key, id);
        id
    }

    /// Declares a module-scope variable of type `pointee`.
    pub fn new_variable(
        &mut self,
        pointee: Word,
        sclass: StorageClass,
        initializer: Option<Word>,
    ) -> Word {
        let ptr = self.pointer_type(pointee, sclass);
        let id = self.builder.variable(ptr, None, sclass, initializer);
        self.globals.push((id, sclass));
        id
    }

    /// Variables listed on `OpEntryPoint`: only inputs and outputs before
    /// SPIR-V 1.4, every module-scope variable from 1.4 on.
    pub fn interface_variables(&self) -> Vec<Word> {
        let all = self.version >= (1, 4);
        self.globals
            .iter()
            .filter(|(_, sclass)| {
                all || matches!(sclass, StorageClass::Input | StorageClass::Output)
            })
            .map(|&(id, _)| id)
            .collect()
    }

    pub fn decorate_flag(&mut self, id: Word, decoration: Decoration) {
        self.builder.decorate(id, decoration, []);
    }

    pub fn decorate_u32(&mut self, id: Word, decoration: Decoration, value: u32) {
        self.builder
            .decorate(id, decoration, [Operand::LiteralBit32(value)]);
    }

    pub fn decorate_builtin(&mut self, id: Word, builtin: BuiltIn) {
        self.builder
            .decorate(id, Decoration::BuiltIn, [Operand::BuiltIn(builtin)]);
    }

    pub fn decorate_binding(&mut self, id: Word, binding: u32) {
        self.decorate_u32(id, Decoration::DescriptorSet, 0);
        self.decorate_u32(id, Decoration::Binding, binding);
    }

    pub fn into_words(self) -> Vec<u32> {
        use rspirv::binary::Assemble;

        self.builder.module().assemble()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn types_and_constants_are_interned() {
        let mut m = SpirvModule::new((1, 3), false);
        let a = m.vector_type(VectorType::vec4(ScalarType::F32));
        let b = m.vector_type(VectorType::vec4(ScalarType::F32));
        assert_eq!(a, b);
        assert_eq!(
            m.vector_type(VectorType::scalar(ScalarType::U32)),
            m.scalar_type(ScalarType::U32)
        );

        let one = m.const_u32(1);
        assert_eq!(m.const_u32(1), one);
        assert_ne!(m.const_i32(1), one);
        assert_eq!(m.const_vector(ScalarType::U32, &[1]), one);

        let arr = m.array_type(ArrayType::new(VectorType::vec4(ScalarType::F32), 0));
        assert_eq!(arr, a);
    }

    #[test]
    fn block_types_are_declared_once() {
        let mut m = SpirvModule::new((1, 3), false);
        let first = m.storage_buffer_block();
        assert_eq!(m.storage_buffer_block(), first);
        let cb = m.constant_buffer_block(4);
        assert_eq!(m.constant_buffer_block(4), cb);
        assert_ne!(m.constant_buffer_block(8), cb);

        let module = m.builder.module_ref();
        let blocks = module
            .annotations
            .iter()
            .filter(|inst| {
                inst.operands.get(1) == Some(&Operand::Decoration(Decoration::Block))
            })
            .count();
        assert_eq!(blocks, 3);
    }

    #[test]
    fn interface_list_depends_on_version() {
        let mut m = SpirvModule::new((1, 3), false);
        let f4 = m.vector_type(VectorType::vec4(ScalarType::F32));
        let input = m.new_variable(f4, StorageClass::Input, None);
        m.new_variable(f4, StorageClass::Private, None);
        assert_eq!(m.interface_variables(), vec![input]);

        let mut m = SpirvModule::new((1, 4), false);
        let f4 = m.vector_type(VectorType::vec4(ScalarType::F32));
        m.new_variable(f4, StorageClass::Input, None);
        m.new_variable(f4, StorageClass::Private, None);
        assert_eq!(m.interface_variables().len(), 2);
    }
}
