//! Arithmetic, logic, comparison and conversion instructions.

use rspirv::dr::Builder;
use rspirv::spirv::{Capability, GLOp, Word};

use super::module::{RegisterValue, ScalarType, VectorType};
use super::{dst, src, Compiler};
use crate::sm4::opcode::*;
use crate::sm4_ir::{Sm4Instruction, Sm4Operand, WriteMask, ZeroTest};
use crate::CompileError;

type UnaryOp = fn(&mut Builder, Word, Option<Word>, Word) -> Result<Word, rspirv::dr::Error>;
type BinaryOp = fn(&mut Builder, Word, Option<Word>, Word, Word) -> Result<Word, rspirv::dr::Error>;

/// Positions of the components of `sub` inside a value computed for `full`.
fn sub_lanes(full: WriteMask, sub: WriteMask) -> Vec<u32> {
    sub.components()
        .filter_map(|c| full.components().position(|f| f == c))
        .map(|p| p as u32)
        .collect()
}

impl Compiler<'_> {
    fn unary(&mut self, op: UnaryOp, ty: VectorType, a: Word) -> Result<RegisterValue, CompileError> {
        let ty_id = self.module.vector_type(ty);
        let id = op(&mut self.module, ty_id, None, a)?;
        Ok(RegisterValue { ty, id })
    }

    fn binary(
        &mut self,
        op: BinaryOp,
        ty: VectorType,
        a: Word,
        b: Word,
    ) -> Result<RegisterValue, CompileError> {
        let ty_id = self.module.vector_type(ty);
        let id = op(&mut self.module, ty_id, None, a, b)?;
        Ok(RegisterValue { ty, id })
    }

    fn load_sources(
        &mut self,
        inst: &Sm4Instruction,
        first: usize,
        mask: WriteMask,
    ) -> Result<Vec<RegisterValue>, CompileError> {
        inst.src[first.min(inst.src.len())..]
            .iter()
            .map(|op| self.emit_load_src(op, mask))
            .collect()
    }

    /// Applies `f` to each component of the sources and reassembles the
    /// results, for operations SPIR-V only defines on scalars.
    fn per_component(
        &mut self,
        sources: &[RegisterValue],
        ctype: ScalarType,
        mut f: impl FnMut(&mut Self, &[Word]) -> Result<Word, CompileError>,
    ) -> Result<RegisterValue, CompileError> {
        let count = sources.first().map_or(1, |s| s.ty.ccount);
        let mut results = Vec::with_capacity(count as usize);
        for c in 0..count {
            let mut parts = Vec::with_capacity(sources.len());
            for source in sources {
                parts.push(self.extract(*source, c)?.id);
            }
            results.push(f(self, &parts)?);
        }
        self.compose(ctype, &results)
    }

    /// Stores `value`, computed for `full`, into a destination covering a
    /// subset of those components.
    fn store_part(
        &mut self,
        op: &Sm4Operand,
        value: RegisterValue,
        full: WriteMask,
        saturate: bool,
    ) -> Result<(), CompileError> {
        if op.is_null() || op.mask.is_empty() {
            return Ok(());
        }
        let lanes = sub_lanes(full, op.mask);
        let part = self.swizzle(value, &lanes)?;
        self.emit_store_dst(op, part, saturate)
    }

    pub(super) fn emit_alu(&mut self, inst: &Sm4Instruction) -> Result<(), CompileError> {
        match inst.opcode {
            OPCODE_NOP => Ok(()),
            OPCODE_DP2 | OPCODE_DP3 | OPCODE_DP4 => self.emit_dot(inst),
            OPCODE_SINCOS => self.emit_sincos(inst),
            OPCODE_UMUL | OPCODE_IMUL => self.emit_wide_multiply(inst),
            OPCODE_UDIV => self.emit_udiv(inst),
            OPCODE_UADDC | OPCODE_USUBB => self.emit_carry(inst),
            OPCODE_SWAPC => self.emit_swapc(inst),
            _ => self.emit_vector_alu(inst),
        }
    }

    fn emit_vector_alu(&mut self, inst: &Sm4Instruction) -> Result<(), CompileError> {
        let dst_op = dst(inst, 0)?;
        let mask = dst_op.mask;
        if dst_op.is_null() || mask.is_empty() {
            return Ok(());
        }
        let sources = self.load_sources(inst, 0, mask)?;
        let operand = |i: usize| {
            sources
                .get(i)
                .copied()
                .ok_or_else(|| CompileError::invalid(format!("{} is missing source {i}", inst.name())))
        };
        let count = mask.count();
        let f32v = VectorType::new(ScalarType::F32, count);
        let u32v = VectorType::new(ScalarType::U32, count);
        let i32v = VectorType::new(ScalarType::I32, count);
        let boolv = VectorType::new(ScalarType::Bool, count);

        let value = match inst.opcode {
            OPCODE_MOV => operand(0)?,
            OPCODE_MOVC => {
                let condition = self.zero_test(operand(0)?, ZeroTest::IfNonZero)?;
                let (a, b) = (operand(1)?, operand(2)?);
                let b = self.bitcast(b, a.ty.ctype)?;
                let ty_id = self.module.vector_type(a.ty);
                let id = self.module.select(ty_id, None, condition.id, a.id, b.id)?;
                RegisterValue { ty: a.ty, id }
            }

            OPCODE_ADD => self.binary(Builder::f_add, f32v, operand(0)?.id, operand(1)?.id)?,
            OPCODE_MUL => self.binary(Builder::f_mul, f32v, operand(0)?.id, operand(1)?.id)?,
            OPCODE_DIV => self.binary(Builder::f_div, f32v, operand(0)?.id, operand(1)?.id)?,
            OPCODE_MAD => self.glsl(
                GLOp::Fma,
                f32v,
                &[operand(0)?.id, operand(1)?.id, operand(2)?.id],
            )?,
            OPCODE_MIN => self.glsl(GLOp::NMin, f32v, &[operand(0)?.id, operand(1)?.id])?,
            OPCODE_MAX => self.glsl(GLOp::NMax, f32v, &[operand(0)?.id, operand(1)?.id])?,
            OPCODE_FRC => self.glsl(GLOp::Fract, f32v, &[operand(0)?.id])?,
            OPCODE_SQRT => self.glsl(GLOp::Sqrt, f32v, &[operand(0)?.id])?,
            OPCODE_RSQ => self.glsl(GLOp::InverseSqrt, f32v, &[operand(0)?.id])?,
            OPCODE_EXP => self.glsl(GLOp::Exp2, f32v, &[operand(0)?.id])?,
            OPCODE_LOG => self.glsl(GLOp::Log2, f32v, &[operand(0)?.id])?,
            OPCODE_ROUND_NE => self.glsl(GLOp::RoundEven, f32v, &[operand(0)?.id])?,
            OPCODE_ROUND_NI => self.glsl(GLOp::Floor, f32v, &[operand(0)?.id])?,
            OPCODE_ROUND_PI => self.glsl(GLOp::Ceil, f32v, &[operand(0)?.id])?,
            OPCODE_ROUND_Z => self.glsl(GLOp::Trunc, f32v, &[operand(0)?.id])?,
            OPCODE_RCP => {
                let one = self.const_splat(ScalarType::F32, 1f32.to_bits(), count);
                self.binary(Builder::f_div, f32v, one.id, operand(0)?.id)?
            }

            OPCODE_FTOI => {
                // Out-of-range values saturate instead of being undefined.
                let lo = self.const_splat(ScalarType::F32, (-2_147_483_648f32).to_bits(), count);
                let hi = self.const_splat(ScalarType::F32, 2_147_483_520f32.to_bits(), count);
                let clamped = self.glsl(GLOp::FClamp, f32v, &[operand(0)?.id, lo.id, hi.id])?;
                self.unary(Builder::convert_f_to_s, i32v, clamped.id)?
            }
            OPCODE_FTOU => {
                let lo = self.const_splat(ScalarType::F32, 0f32.to_bits(), count);
                let hi = self.const_splat(ScalarType::F32, 4_294_967_040f32.to_bits(), count);
                let clamped = self.glsl(GLOp::FClamp, f32v, &[operand(0)?.id, lo.id, hi.id])?;
                self.unary(Builder::convert_f_to_u, u32v, clamped.id)?
            }
            OPCODE_ITOF => {
                let a = self.bitcast(operand(0)?, ScalarType::I32)?;
                self.unary(Builder::convert_s_to_f, f32v, a.id)?
            }
            OPCODE_UTOF => {
                let a = self.bitcast(operand(0)?, ScalarType::U32)?;
                self.unary(Builder::convert_u_to_f, f32v, a.id)?
            }

            OPCODE_IADD => {
                let a = operand(0)?;
                let b = self.bitcast(operand(1)?, a.ty.ctype)?;
                self.binary(Builder::i_add, a.ty, a.id, b.id)?
            }
            OPCODE_IMAD | OPCODE_UMAD => {
                let a = operand(0)?;
                let b = self.bitcast(operand(1)?, a.ty.ctype)?;
                let c = self.bitcast(operand(2)?, a.ty.ctype)?;
                let product = self.binary(Builder::i_mul, a.ty, a.id, b.id)?;
                self.binary(Builder::i_add, a.ty, product.id, c.id)?
            }
            OPCODE_INEG => {
                let a = self.bitcast(operand(0)?, ScalarType::I32)?;
                self.unary(Builder::s_negate, i32v, a.id)?
            }
            OPCODE_IMAX | OPCODE_IMIN | OPCODE_UMAX | OPCODE_UMIN => {
                let (op, ty) = match inst.opcode {
                    OPCODE_IMAX => (GLOp::SMax, i32v),
                    OPCODE_IMIN => (GLOp::SMin, i32v),
                    OPCODE_UMAX => (GLOp::UMax, u32v),
                    _ => (GLOp::UMin, u32v),
                };
                let a = self.bitcast(operand(0)?, ty.ctype)?;
                let b = self.bitcast(operand(1)?, ty.ctype)?;
                self.glsl(op, ty, &[a.id, b.id])?
            }

            OPCODE_AND | OPCODE_OR | OPCODE_XOR => {
                let a = self.bitcast(operand(0)?, ScalarType::U32)?;
                let b = self.bitcast(operand(1)?, ScalarType::U32)?;
                let op: BinaryOp = match inst.opcode {
                    OPCODE_AND => Builder::bitwise_and,
                    OPCODE_OR => Builder::bitwise_or,
                    _ => Builder::bitwise_xor,
                };
                self.binary(op, u32v, a.id, b.id)?
            }
            OPCODE_NOT => {
                let a = self.bitcast(operand(0)?, ScalarType::U32)?;
                self.unary(Builder::not, u32v, a.id)?
            }
            OPCODE_ISHL | OPCODE_ISHR | OPCODE_USHR => {
                // Shift counts only use their low five bits.
                let a = operand(0)?;
                let count_mask = self.const_splat(ScalarType::U32, 0x1f, count);
                let b = self.bitcast(operand(1)?, ScalarType::U32)?;
                let b = self.binary(Builder::bitwise_and, u32v, b.id, count_mask.id)?;
                let op: BinaryOp = match inst.opcode {
                    OPCODE_ISHL => Builder::shift_left_logical,
                    OPCODE_ISHR => Builder::shift_right_arithmetic,
                    _ => Builder::shift_right_logical,
                };
                self.binary(op, a.ty, a.id, b.id)?
            }

            OPCODE_EQ | OPCODE_NE | OPCODE_LT | OPCODE_GE | OPCODE_IEQ | OPCODE_INE
            | OPCODE_ILT | OPCODE_IGE | OPCODE_ULT | OPCODE_UGE => {
                let a = operand(0)?;
                let b = self.bitcast(operand(1)?, a.ty.ctype)?;
                let op: BinaryOp = match inst.opcode {
                    OPCODE_EQ => Builder::f_ord_equal,
                    OPCODE_NE => Builder::f_unord_not_equal,
                    OPCODE_LT => Builder::f_ord_less_than,
                    OPCODE_GE => Builder::f_ord_greater_than_equal,
                    OPCODE_IEQ => Builder::i_equal,
                    OPCODE_INE => Builder::i_not_equal,
                    OPCODE_ILT => Builder::s_less_than,
                    OPCODE_IGE => Builder::s_greater_than_equal,
                    OPCODE_ULT => Builder::u_less_than,
                    _ => Builder::u_greater_than_equal,
                };
                let result = self.binary(op, boolv, a.id, b.id)?;
                self.bool_to_mask(result)?
            }

            OPCODE_DERIV_RTX | OPCODE_DERIV_RTY | OPCODE_DERIV_RTX_COARSE
            | OPCODE_DERIV_RTX_FINE | OPCODE_DERIV_RTY_COARSE | OPCODE_DERIV_RTY_FINE => {
                let op: UnaryOp = match inst.opcode {
                    OPCODE_DERIV_RTX => Builder::d_pdx,
                    OPCODE_DERIV_RTY => Builder::d_pdy,
                    OPCODE_DERIV_RTX_COARSE => Builder::d_pdx_coarse,
                    OPCODE_DERIV_RTX_FINE => Builder::d_pdx_fine,
                    OPCODE_DERIV_RTY_COARSE => Builder::d_pdy_coarse,
                    _ => Builder::d_pdy_fine,
                };
                if !matches!(inst.opcode, OPCODE_DERIV_RTX | OPCODE_DERIV_RTY) {
                    self.module
                        .enable_capability(Capability::DerivativeControl);
                }
                self.unary(op, f32v, operand(0)?.id)?
            }

            OPCODE_COUNTBITS => {
                let a = self.bitcast(operand(0)?, ScalarType::U32)?;
                self.unary(Builder::bit_count, u32v, a.id)?
            }
            OPCODE_BFREV => {
                let a = self.bitcast(operand(0)?, ScalarType::U32)?;
                self.unary(Builder::bit_reverse, u32v, a.id)?
            }
            OPCODE_FIRSTBIT_LO => {
                let a = self.bitcast(operand(0)?, ScalarType::U32)?;
                self.glsl(GLOp::FindILsb, u32v, &[a.id])?
            }
            OPCODE_FIRSTBIT_HI | OPCODE_FIRSTBIT_SHI => {
                // Bit positions count down from the MSB; "not found" stays ~0.
                let (op, a) = if inst.opcode == OPCODE_FIRSTBIT_HI {
                    (GLOp::FindUMsb, self.bitcast(operand(0)?, ScalarType::U32)?)
                } else {
                    (GLOp::FindSMsb, self.bitcast(operand(0)?, ScalarType::I32)?)
                };
                let msb = self.glsl(op, VectorType::new(a.ty.ctype, count), &[a.id])?;
                let msb = self.bitcast(msb, ScalarType::U32)?;
                let none = self.const_splat(ScalarType::U32, u32::MAX, count);
                let top = self.const_splat(ScalarType::U32, 31, count);
                let flipped = self.binary(Builder::i_sub, u32v, top.id, msb.id)?;
                let missing = self.binary(Builder::i_equal, boolv, msb.id, none.id)?;
                let ty_id = self.module.vector_type(u32v);
                let id = self
                    .module
                    .select(ty_id, None, missing.id, none.id, flipped.id)?;
                RegisterValue { ty: u32v, id }
            }

            OPCODE_UBFE | OPCODE_IBFE => {
                let signed = inst.opcode == OPCODE_IBFE;
                let width = self.bitcast(operand(0)?, ScalarType::U32)?;
                let offset = self.bitcast(operand(1)?, ScalarType::U32)?;
                let ctype = if signed { ScalarType::I32 } else { ScalarType::U32 };
                let value = self.bitcast(operand(2)?, ctype)?;
                self.per_component(&[width, offset, value], ctype, |c, parts| {
                    let (offset, count) = c.bitfield_range(parts[0], parts[1])?;
                    let ty = c.module.scalar_type(ctype);
                    let id = if signed {
                        c.module
                            .bit_field_s_extract(ty, None, parts[2], offset, count)?
                    } else {
                        c.module
                            .bit_field_u_extract(ty, None, parts[2], offset, count)?
                    };
                    Ok(id)
                })?
            }
            OPCODE_BFI => {
                let width = self.bitcast(operand(0)?, ScalarType::U32)?;
                let offset = self.bitcast(operand(1)?, ScalarType::U32)?;
                let insert = self.bitcast(operand(2)?, ScalarType::U32)?;
                let base = self.bitcast(operand(3)?, ScalarType::U32)?;
                self.per_component(&[width, offset, insert, base], ScalarType::U32, |c, parts| {
                    let (offset, count) = c.bitfield_range(parts[0], parts[1])?;
                    let ty = c.module.scalar_type(ScalarType::U32);
                    Ok(c.module
                        .bit_field_insert(ty, None, parts[3], parts[2], offset, count)?)
                })?
            }

            OPCODE_F32TOF16 => {
                let a = operand(0)?;
                self.per_component(&[a], ScalarType::U32, |c, parts| {
                    let zero = c.module.const_f32(0.0);
                    let pair = c.compose(ScalarType::F32, &[parts[0], zero])?;
                    let packed = c.glsl(
                        GLOp::PackHalf2x16,
                        VectorType::scalar(ScalarType::U32),
                        &[pair.id],
                    )?;
                    Ok(packed.id)
                })?
            }
            OPCODE_F16TOF32 => {
                let a = self.bitcast(operand(0)?, ScalarType::U32)?;
                self.per_component(&[a], ScalarType::F32, |c, parts| {
                    let pair = c.glsl(
                        GLOp::UnpackHalf2x16,
                        VectorType::new(ScalarType::F32, 2),
                        &[parts[0]],
                    )?;
                    Ok(c.extract(pair, 0)?.id)
                })?
            }

            _ => return Err(self.unsupported(inst)),
        };

        self.mark_precise(inst, value);
        self.emit_store_dst(dst_op, value, inst.saturate())
    }

    /// Clamps a bitfield `(offset, width)` pair to the low five bits and to
    /// the end of the dword.
    fn bitfield_range(&mut self, width: Word, offset: Word) -> Result<(Word, Word), CompileError> {
        let u32_ty = self.module.scalar_type(ScalarType::U32);
        let five_bits = self.module.const_u32(0x1f);
        let thirty_two = self.module.const_u32(32);
        let width = self.module.bitwise_and(u32_ty, None, width, five_bits)?;
        let offset = self.module.bitwise_and(u32_ty, None, offset, five_bits)?;
        let room = self.module.i_sub(u32_ty, None, thirty_two, offset)?;
        let count = self.glsl(
            GLOp::UMin,
            VectorType::scalar(ScalarType::U32),
            &[width, room],
        )?;
        Ok((offset, count.id))
    }

    fn emit_dot(&mut self, inst: &Sm4Instruction) -> Result<(), CompileError> {
        let dst_op = dst(inst, 0)?;
        let width = match inst.opcode {
            OPCODE_DP2 => 2,
            OPCODE_DP3 => 3,
            _ => 4,
        };
        let mask = WriteMask::first_n(width);
        let a = self.emit_load_src(src(inst, 0)?, mask)?;
        let b = self.emit_load_src(src(inst, 1)?, mask)?;
        let ty = VectorType::scalar(ScalarType::F32);
        let ty_id = self.module.vector_type(ty);
        let id = self.module.dot(ty_id, None, a.id, b.id)?;
        let value = RegisterValue { ty, id };
        self.mark_precise(inst, value);
        self.emit_store_dst(dst_op, value, inst.saturate())
    }

    fn emit_sincos(&mut self, inst: &Sm4Instruction) -> Result<(), CompileError> {
        let input = src(inst, 0)?;
        for (i, op) in [GLOp::Sin, GLOp::Cos].into_iter().enumerate() {
            let out = dst(inst, i)?;
            if out.is_null() || out.mask.is_empty() {
                continue;
            }
            let value = self.emit_load_src(input, out.mask)?;
            let result = self.glsl(op, value.ty, &[value.id])?;
            self.mark_precise(inst, result);
            self.emit_store_dst(out, result, inst.saturate())?;
        }
        Ok(())
    }

    /// `imul`/`umul`: high and low halves of the 64-bit product.
    fn emit_wide_multiply(&mut self, inst: &Sm4Instruction) -> Result<(), CompileError> {
        let (hi, lo) = (dst(inst, 0)?, dst(inst, 1)?);
        let full = hi.mask | lo.mask;
        if full.is_empty() {
            return Ok(());
        }
        let sources = self.load_sources(inst, 0, full)?;
        let [a, b] = sources[..] else {
            return Err(CompileError::invalid(format!("{} needs two sources", inst.name())));
        };
        let ctype = if inst.opcode == OPCODE_IMUL {
            ScalarType::I32
        } else {
            ScalarType::U32
        };
        let a = self.bitcast(a, ctype)?;
        let b = self.bitcast(b, ctype)?;
        let ty = VectorType::new(ctype, full.count());

        if hi.is_null() || hi.mask.is_empty() {
            let product = self.binary(Builder::i_mul, ty, a.id, b.id)?;
            return self.store_part(lo, product, full, false);
        }

        let ty_id = self.module.vector_type(ty);
        let pair = self.module.struct_type(&[ty_id, ty_id]);
        let wide = if ctype == ScalarType::I32 {
            self.module.s_mul_extended(pair, None, a.id, b.id)?
        } else {
            self.module.u_mul_extended(pair, None, a.id, b.id)?
        };
        let low = self.module.composite_extract(ty_id, None, wide, [0])?;
        let high = self.module.composite_extract(ty_id, None, wide, [1])?;
        self.store_part(hi, RegisterValue { ty, id: high }, full, false)?;
        self.store_part(lo, RegisterValue { ty, id: low }, full, false)
    }

    /// `udiv`: quotient and remainder; division by zero yields `0xffffffff`
    /// in both.
    fn emit_udiv(&mut self, inst: &Sm4Instruction) -> Result<(), CompileError> {
        let (quotient, remainder) = (dst(inst, 0)?, dst(inst, 1)?);
        let full = quotient.mask | remainder.mask;
        if full.is_empty() {
            return Ok(());
        }
        let sources = self.load_sources(inst, 0, full)?;
        let [a, b] = sources[..] else {
            return Err(CompileError::invalid("udiv needs two sources"));
        };
        let a = self.bitcast(a, ScalarType::U32)?;
        let b = self.bitcast(b, ScalarType::U32)?;
        let count = full.count();
        let ty = VectorType::new(ScalarType::U32, count);
        let ty_id = self.module.vector_type(ty);
        let zero = self.const_splat(ScalarType::U32, 0, count);
        let all_ones = self.const_splat(ScalarType::U32, u32::MAX, count);
        let by_zero = self.binary(
            Builder::i_equal,
            VectorType::new(ScalarType::Bool, count),
            b.id,
            zero.id,
        )?;

        for (out, op) in [(quotient, Builder::u_div as BinaryOp), (remainder, Builder::u_mod)] {
            if out.is_null() || out.mask.is_empty() {
                continue;
            }
            let result = self.binary(op, ty, a.id, b.id)?;
            let id = self
                .module
                .select(ty_id, None, by_zero.id, all_ones.id, result.id)?;
            self.store_part(out, RegisterValue { ty, id }, full, false)?;
        }
        Ok(())
    }

    /// `uaddc`/`usubb`: result plus carry or borrow.
    fn emit_carry(&mut self, inst: &Sm4Instruction) -> Result<(), CompileError> {
        let (result, carry) = (dst(inst, 0)?, dst(inst, 1)?);
        let full = result.mask | carry.mask;
        if full.is_empty() {
            return Ok(());
        }
        let sources = self.load_sources(inst, 0, full)?;
        let [a, b] = sources[..] else {
            return Err(CompileError::invalid(format!("{} needs two sources", inst.name())));
        };
        let a = self.bitcast(a, ScalarType::U32)?;
        let b = self.bitcast(b, ScalarType::U32)?;
        let ty = VectorType::new(ScalarType::U32, full.count());
        let ty_id = self.module.vector_type(ty);
        let pair = self.module.struct_type(&[ty_id, ty_id]);
        let wide = if inst.opcode == OPCODE_UADDC {
            self.module.i_add_carry(pair, None, a.id, b.id)?
        } else {
            self.module.i_sub_borrow(pair, None, a.id, b.id)?
        };
        let value = self.module.composite_extract(ty_id, None, wide, [0])?;
        let flag = self.module.composite_extract(ty_id, None, wide, [1])?;
        self.store_part(result, RegisterValue { ty, id: value }, full, false)?;
        self.store_part(carry, RegisterValue { ty, id: flag }, full, false)
    }

    /// `swapc`: `dst0 = cond ? src2 : src1`, `dst1 = cond ? src1 : src2`.
    fn emit_swapc(&mut self, inst: &Sm4Instruction) -> Result<(), CompileError> {
        let (first, second) = (dst(inst, 0)?, dst(inst, 1)?);
        let full = first.mask | second.mask;
        if full.is_empty() {
            return Ok(());
        }
        let sources = self.load_sources(inst, 0, full)?;
        let [condition, a, b] = sources[..] else {
            return Err(CompileError::invalid("swapc needs three sources"));
        };
        let condition = self.zero_test(condition, ZeroTest::IfNonZero)?;
        let b = self.bitcast(b, a.ty.ctype)?;
        let ty_id = self.module.vector_type(a.ty);
        let swapped = self.module.select(ty_id, None, condition.id, b.id, a.id)?;
        let kept = self.module.select(ty_id, None, condition.id, a.id, b.id)?;
        self.store_part(first, RegisterValue { ty: a.ty, id: swapped }, full, false)?;
        self.store_part(second, RegisterValue { ty: a.ty, id: kept }, full, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sub_lanes_index_into_the_union() {
        let full = WriteMask(0b1011);
        assert_eq!(sub_lanes(full, WriteMask(0b1000)), vec![2]);
        assert_eq!(sub_lanes(full, WriteMask(0b0011)), vec![0, 1]);
        assert!(sub_lanes(full, WriteMask(0)).is_empty());
    }
}
