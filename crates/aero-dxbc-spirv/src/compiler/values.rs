//! Helpers on computed values: casts, swizzles, modifiers and constants.

use rspirv::dr::Operand;
use rspirv::spirv::{Decoration, GLOp, Word};

use super::module::{RegisterValue, ScalarType, VectorType};
use super::Compiler;
use crate::sm4_ir::{OperandModifier, Sm4Instruction, WriteMask, ZeroTest};
use crate::CompileError;

impl Compiler<'_> {
    pub(super) fn glsl(
        &mut self,
        op: GLOp,
        ty: VectorType,
        args: &[Word],
    ) -> Result<RegisterValue, CompileError> {
        let ty_id = self.module.vector_type(ty);
        let glsl = self.module.glsl();
        let id = self.module.ext_inst(
            ty_id,
            None,
            glsl,
            op as u32,
            args.iter().map(|&a| Operand::IdRef(a)),
        )?;
        Ok(RegisterValue { ty, id })
    }

    /// A constant with one component per entry of `bits`.
    pub(super) fn const_value(&mut self, ctype: ScalarType, bits: &[u32]) -> RegisterValue {
        let id = self.module.const_vector(ctype, bits);
        RegisterValue {
            ty: VectorType::new(ctype, bits.len() as u32),
            id,
        }
    }

    pub(super) fn const_splat(&mut self, ctype: ScalarType, bits: u32, count: u32) -> RegisterValue {
        let bits = vec![bits; count.max(1) as usize];
        self.const_value(ctype, &bits)
    }

    /// Reinterprets `value` as `ctype`. Booleans become all-ones/zero masks.
    pub(super) fn bitcast(
        &mut self,
        value: RegisterValue,
        ctype: ScalarType,
    ) -> Result<RegisterValue, CompileError> {
        if value.ty.ctype == ctype {
            return Ok(value);
        }
        let value = if value.ty.ctype == ScalarType::Bool {
            self.bool_to_mask(value)?
        } else {
            value
        };
        if value.ty.ctype == ctype {
            return Ok(value);
        }
        let ty = VectorType::new(ctype, value.ty.ccount);
        let ty_id = self.module.vector_type(ty);
        let id = self.module.bitcast(ty_id, None, value.id)?;
        Ok(RegisterValue { ty, id })
    }

    pub(super) fn bool_to_mask(&mut self, value: RegisterValue) -> Result<RegisterValue, CompileError> {
        let count = value.ty.ccount;
        let ones = self.const_splat(ScalarType::U32, u32::MAX, count);
        let zero = self.const_splat(ScalarType::U32, 0, count);
        let ty = VectorType::new(ScalarType::U32, count);
        let ty_id = self.module.vector_type(ty);
        let id = self.module.select(ty_id, None, value.id, ones.id, zero.id)?;
        Ok(RegisterValue { ty, id })
    }

    pub(super) fn extract(
        &mut self,
        value: RegisterValue,
        component: u32,
    ) -> Result<RegisterValue, CompileError> {
        if value.ty.ccount == 1 {
            return Ok(value);
        }
        let ty = VectorType::scalar(value.ty.ctype);
        let ty_id = self.module.vector_type(ty);
        let id = self
            .module
            .composite_extract(ty_id, None, value.id, [component])?;
        Ok(RegisterValue { ty, id })
    }

    /// Broadcasts a scalar to `count` components.
    pub(super) fn extend(
        &mut self,
        value: RegisterValue,
        count: u32,
    ) -> Result<RegisterValue, CompileError> {
        if count <= 1 || value.ty.ccount == count {
            return Ok(value);
        }
        let scalar = self.extract(value, 0)?;
        let ty = VectorType::new(value.ty.ctype, count);
        let ty_id = self.module.vector_type(ty);
        let id = self
            .module
            .composite_construct(ty_id, None, vec![scalar.id; count as usize])?;
        Ok(RegisterValue { ty, id })
    }

    /// Widens a 1..=3 component value to four components, filling with zero.
    pub(super) fn pad_vec4(&mut self, value: RegisterValue) -> Result<RegisterValue, CompileError> {
        if value.ty.ccount >= 4 {
            return Ok(value);
        }
        let zero = self.module.const_scalar(value.ty.ctype, 0);
        let mut parts = Vec::with_capacity(4);
        for c in 0..value.ty.ccount {
            parts.push(self.extract(value, c)?.id);
        }
        parts.resize(4, zero);
        let ty = VectorType::vec4(value.ty.ctype);
        let ty_id = self.module.vector_type(ty);
        let id = self.module.composite_construct(ty_id, None, parts)?;
        Ok(RegisterValue { ty, id })
    }

    /// Picks `lanes` out of `value`.
    pub(super) fn swizzle(
        &mut self,
        value: RegisterValue,
        lanes: &[u32],
    ) -> Result<RegisterValue, CompileError> {
        if lanes.is_empty() {
            return Ok(value);
        }
        let value = if lanes.iter().any(|&l| l >= value.ty.ccount) {
            self.pad_vec4(value)?
        } else {
            value
        };
        let identity = lanes.len() as u32 == value.ty.ccount
            && lanes.iter().enumerate().all(|(i, &l)| i as u32 == l);
        if identity {
            return Ok(value);
        }
        if value.ty.ccount == 1 {
            return self.extend(value, lanes.len() as u32);
        }
        if lanes.len() == 1 {
            return self.extract(value, lanes[0]);
        }
        let ty = VectorType::new(value.ty.ctype, lanes.len() as u32);
        let ty_id = self.module.vector_type(ty);
        let id = self
            .module
            .vector_shuffle(ty_id, None, value.id, value.id, lanes.iter().copied())?;
        Ok(RegisterValue { ty, id })
    }

    /// Keeps the components of `value` named by `mask`, compacted.
    pub(super) fn select_mask(
        &mut self,
        value: RegisterValue,
        mask: WriteMask,
    ) -> Result<RegisterValue, CompileError> {
        let lanes: Vec<u32> = mask.components().collect();
        self.swizzle(value, &lanes)
    }

    /// Builds a vector out of scalar parts of the same type.
    pub(super) fn compose(
        &mut self,
        ctype: ScalarType,
        parts: &[Word],
    ) -> Result<RegisterValue, CompileError> {
        let ty = VectorType::new(ctype, parts.len() as u32);
        if parts.len() == 1 {
            return Ok(RegisterValue { ty, id: parts[0] });
        }
        let ty_id = self.module.vector_type(ty);
        let id = self
            .module
            .composite_construct(ty_id, None, parts.iter().copied())?;
        Ok(RegisterValue { ty, id })
    }

    pub(super) fn apply_modifier(
        &mut self,
        value: RegisterValue,
        modifier: OperandModifier,
    ) -> Result<RegisterValue, CompileError> {
        let mut value = value;
        if matches!(modifier, OperandModifier::Abs | OperandModifier::AbsNeg) {
            let op = if value.ty.ctype == ScalarType::F32 {
                GLOp::FAbs
            } else {
                GLOp::SAbs
            };
            value = self.glsl(op, value.ty, &[value.id])?;
        }
        if matches!(modifier, OperandModifier::Neg | OperandModifier::AbsNeg) {
            let ty_id = self.module.vector_type(value.ty);
            let id = if value.ty.ctype == ScalarType::F32 {
                self.module.f_negate(ty_id, None, value.id)?
            } else {
                self.module.s_negate(ty_id, None, value.id)?
            };
            value = RegisterValue { ty: value.ty, id };
        }
        Ok(value)
    }

    /// Clamps float results to `[0, 1]`.
    pub(super) fn saturate(&mut self, value: RegisterValue) -> Result<RegisterValue, CompileError> {
        if value.ty.ctype != ScalarType::F32 {
            return Ok(value);
        }
        let zero = self.const_splat(ScalarType::F32, 0f32.to_bits(), value.ty.ccount);
        let one = self.const_splat(ScalarType::F32, 1f32.to_bits(), value.ty.ccount);
        self.glsl(GLOp::FClamp, value.ty, &[value.id, zero.id, one.id])
    }

    /// Per-component `value != 0` (or `== 0`), as booleans.
    pub(super) fn zero_test(
        &mut self,
        value: RegisterValue,
        test: ZeroTest,
    ) -> Result<RegisterValue, CompileError> {
        let value = self.bitcast(value, ScalarType::U32)?;
        let zero = self.const_splat(ScalarType::U32, 0, value.ty.ccount);
        let ty = VectorType::new(ScalarType::Bool, value.ty.ccount);
        let ty_id = self.module.vector_type(ty);
        let id = match test {
            ZeroTest::IfZero => self.module.i_equal(ty_id, None, value.id, zero.id)?,
            ZeroTest::IfNonZero => self.module.i_not_equal(ty_id, None, value.id, zero.id)?,
        };
        Ok(RegisterValue { ty, id })
    }

    /// Marks float results of `precise` instructions.
    pub(super) fn mark_precise(&mut self, inst: &Sm4Instruction, value: RegisterValue) {
        if value.ty.ctype == ScalarType::F32 && !inst.precise_mask().is_empty() {
            self.module.decorate_flag(value.id, Decoration::NoContraction);
        }
    }
}
