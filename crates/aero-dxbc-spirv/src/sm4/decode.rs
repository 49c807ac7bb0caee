use core::iter::FusedIterator;

use crate::sm4_ir::{
    ComponentCount, DataType, OperandModifier, OperandType, SelectionMode, Sm4CustomData,
    Sm4Index, Sm4Instruction, Sm4Operand, Swizzle, WriteMask,
};

use super::opcode::*;
use super::Sm4Program;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("SM4/5 decode error at dword {at_dword}: {kind}")]
pub struct Sm4DecodeError {
    pub at_dword: usize,
    pub kind: Sm4DecodeErrorKind,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Sm4DecodeErrorKind {
    #[error("unexpected end of instruction (wanted {wanted} more dwords)")]
    UnexpectedEof { wanted: usize },
    #[error("instruction length is zero")]
    InstructionLengthZero,
    #[error("instruction with length {len} overruns program ({available} dwords left)")]
    InstructionOutOfBounds { len: usize, available: usize },
    #[error("unknown opcode {opcode}")]
    UnknownOpcode { opcode: u32 },
    #[error("unsupported operand type {ty}")]
    UnsupportedOperandType { ty: u32 },
    #[error("unsupported operand component count encoding {encoding}")]
    UnsupportedComponentCount { encoding: u32 },
    #[error("unsupported component selection mode {mode}")]
    UnsupportedSelectionMode { mode: u32 },
    #[error("unsupported operand index representation {rep}")]
    UnsupportedIndexRepresentation { rep: u32 },
    #[error("unsupported extended operand token type {ty}")]
    UnsupportedExtendedOperand { ty: u32 },
    #[error("unsupported extended opcode token type {ty}")]
    UnsupportedExtendedOpcode { ty: u32 },
    #[error("64-bit register index {value:#x} does not fit in 32 bits")]
    IndexOutOfRange { value: u64 },
    #[error("immediate operand has no components")]
    EmptyImmediate,
    #[error("{count} trailing dwords after the last operand of {name}")]
    TrailingTokens { name: &'static str, count: usize },
    #[error("customdata block length {len} is invalid")]
    InvalidCustomDataLength { len: usize },
}

/// Lazily decodes a program one instruction at a time.
///
/// The decoder yields the first error it hits and then stops.
#[derive(Debug, Clone)]
pub struct Sm4Decoder<'a> {
    toks: &'a [u32],
    pos: usize,
    failed: bool,
}

impl<'a> Sm4Decoder<'a> {
    pub fn new(program: &'a Sm4Program) -> Self {
        let declared = program
            .tokens
            .get(1)
            .map_or(0, |&len| len as usize)
            .min(program.tokens.len());
        Self {
            toks: &program.tokens[..declared],
            pos: 2,
            failed: false,
        }
    }

    /// Dword offset of the next instruction.
    pub fn position(&self) -> usize {
        self.pos
    }
}

impl Iterator for Sm4Decoder<'_> {
    type Item = Result<Sm4Instruction, Sm4DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.pos >= self.toks.len() {
            return None;
        }
        match decode_instruction(self.toks, self.pos) {
            Ok((inst, len)) => {
                self.pos += len;
                Some(Ok(inst))
            }
            Err(err) => {
                self.failed = true;
                Some(Err(err))
            }
        }
    }
}

impl FusedIterator for Sm4Decoder<'_> {}

/// Decodes every instruction of `program`.
pub fn decode_program(program: &Sm4Program) -> Result<Vec<Sm4Instruction>, Sm4DecodeError> {
    Sm4Decoder::new(program).collect()
}

fn decode_instruction(toks: &[u32], at: usize) -> Result<(Sm4Instruction, usize), Sm4DecodeError> {
    let token = toks[at];
    let opcode = token & OPCODE_MASK;
    let available = toks.len() - at;

    if opcode == OPCODE_CUSTOMDATA {
        return decode_custom_data(toks, at, token);
    }

    let len = ((token >> OPCODE_LEN_SHIFT) & OPCODE_LEN_MASK) as usize;
    if len == 0 {
        return Err(Sm4DecodeError {
            at_dword: at,
            kind: Sm4DecodeErrorKind::InstructionLengthZero,
        });
    }
    if len > available {
        return Err(Sm4DecodeError {
            at_dword: at,
            kind: Sm4DecodeErrorKind::InstructionOutOfBounds { len, available },
        });
    }
    let format = instruction_format(opcode).ok_or(Sm4DecodeError {
        at_dword: at,
        kind: Sm4DecodeErrorKind::UnknownOpcode { opcode },
    })?;

    let mut inst = Sm4Instruction {
        opcode,
        class: format.class,
        at_dword: at,
        token,
        sample_offsets: [0; 3],
        ext_resource_dim: None,
        ext_return_type: None,
        dst: Vec::new(),
        src: Vec::new(),
        imm: Vec::new(),
        custom_data: None,
    };

    let mut r = InstrReader::new(&toks[at..at + len], at);
    decode_extended_opcode(&mut r, &mut inst)?;

    for kind in format.operands {
        match *kind {
            OperandKind::Dst(data_type) => inst.dst.push(decode_operand(&mut r, data_type)?),
            OperandKind::Src(data_type) => inst.src.push(decode_operand(&mut r, data_type)?),
            OperandKind::Imm32 => inst.imm.push(r.read_u32()?),
            OperandKind::Rest => {
                while !r.is_eof() {
                    inst.imm.push(r.read_u32()?);
                }
            }
        }
    }

    if !r.is_eof() {
        return Err(Sm4DecodeError {
            at_dword: r.at(),
            kind: Sm4DecodeErrorKind::TrailingTokens {
                name: format.name,
                count: r.remaining(),
            },
        });
    }

    Ok((inst, len))
}

fn decode_custom_data(
    toks: &[u32],
    at: usize,
    token: u32,
) -> Result<(Sm4Instruction, usize), Sm4DecodeError> {
    // customdata carries its class in the controls field and its total length,
    // header included, in the following dword.
    let class = token >> CUSTOMDATA_CLASS_SHIFT;
    let len = toks.get(at + 1).copied().ok_or(Sm4DecodeError {
        at_dword: at,
        kind: Sm4DecodeErrorKind::UnexpectedEof { wanted: 1 },
    })? as usize;
    if len < 2 || len > toks.len() - at {
        return Err(Sm4DecodeError {
            at_dword: at,
            kind: Sm4DecodeErrorKind::InvalidCustomDataLength { len },
        });
    }

    let payload = &toks[at + 2..at + len];
    let custom_data = if class == CUSTOMDATA_CLASS_IMMEDIATE_CONSTANT_BUFFER {
        Sm4CustomData::ImmediateConstantBuffer(payload.to_vec())
    } else {
        Sm4CustomData::Other { class }
    };

    let inst = Sm4Instruction {
        opcode: OPCODE_CUSTOMDATA,
        class: InstClass::CustomData,
        at_dword: at,
        token,
        sample_offsets: [0; 3],
        ext_resource_dim: None,
        ext_return_type: None,
        dst: Vec::new(),
        src: Vec::new(),
        imm: Vec::new(),
        custom_data: Some(custom_data),
    };
    Ok((inst, len))
}

fn decode_extended_opcode(
    r: &mut InstrReader<'_>,
    inst: &mut Sm4Instruction,
) -> Result<(), Sm4DecodeError> {
    let mut extended = inst.token & OPCODE_EXTENDED_BIT != 0;
    while extended {
        let ext = r.read_u32()?;
        extended = ext & OPCODE_EXTENDED_BIT != 0;
        match ext & EXT_OPCODE_TYPE_MASK {
            EXT_OPCODE_EMPTY => {}
            EXT_OPCODE_SAMPLE_CONTROLS => {
                inst.sample_offsets = [
                    sign_extend_4((ext >> 9) & 0xf),
                    sign_extend_4((ext >> 13) & 0xf),
                    sign_extend_4((ext >> 17) & 0xf),
                ];
            }
            EXT_OPCODE_RESOURCE_DIM => inst.ext_resource_dim = Some((ext >> 6) & 0x1f),
            EXT_OPCODE_RESOURCE_RETURN_TYPE => {
                inst.ext_return_type = Some([
                    (ext >> 6) & 0xf,
                    (ext >> 10) & 0xf,
                    (ext >> 14) & 0xf,
                    (ext >> 18) & 0xf,
                ]);
            }
            ty => {
                return Err(Sm4DecodeError {
                    at_dword: r.at() - 1,
                    kind: Sm4DecodeErrorKind::UnsupportedExtendedOpcode { ty },
                })
            }
        }
    }
    Ok(())
}

fn sign_extend_4(v: u32) -> i8 {
    ((v as i8) << 4) >> 4
}

fn decode_operand(
    r: &mut InstrReader<'_>,
    data_type: DataType,
) -> Result<Sm4Operand, Sm4DecodeError> {
    let token_at = r.at();
    let token = r.read_u32()?;
    let err = |kind| Sm4DecodeError {
        at_dword: token_at,
        kind,
    };

    let raw_ty = (token >> OPERAND_TYPE_SHIFT) & OPERAND_TYPE_MASK;
    let ty = OperandType::from_raw(raw_ty)
        .ok_or_else(|| err(Sm4DecodeErrorKind::UnsupportedOperandType { ty: raw_ty }))?;

    let (components, selection, mask, swizzle) = match token & OPERAND_NUM_COMPONENTS_MASK {
        0 => (
            ComponentCount::Zero,
            SelectionMode::Mask,
            WriteMask(0),
            Swizzle::XYZW,
        ),
        1 => (
            ComponentCount::One,
            SelectionMode::Select1,
            WriteMask::X,
            Swizzle::XXXX,
        ),
        2 => {
            let mode = (token >> OPERAND_SELECTION_MODE_SHIFT) & OPERAND_SELECTION_MODE_MASK;
            let sel = token >> OPERAND_COMPONENT_SELECTION_SHIFT;
            match mode {
                OPERAND_SEL_MASK => (
                    ComponentCount::Four,
                    SelectionMode::Mask,
                    WriteMask((sel & 0xf) as u8),
                    Swizzle::XYZW,
                ),
                OPERAND_SEL_SWIZZLE => (
                    ComponentCount::Four,
                    SelectionMode::Swizzle,
                    WriteMask::XYZW,
                    Swizzle::from_bits(sel & 0xff),
                ),
                OPERAND_SEL_SELECT1 => {
                    let c = (sel & 3) as u8;
                    (
                        ComponentCount::Four,
                        SelectionMode::Select1,
                        WriteMask::component(u32::from(c)),
                        Swizzle([c; 4]),
                    )
                }
                mode => return Err(err(Sm4DecodeErrorKind::UnsupportedSelectionMode { mode })),
            }
        }
        encoding => {
            return Err(err(Sm4DecodeErrorKind::UnsupportedComponentCount {
                encoding,
            }))
        }
    };

    let mut modifier = OperandModifier::None;
    let mut extended = token & OPERAND_EXTENDED_BIT != 0;
    while extended {
        let ext_at = r.at();
        let ext = r.read_u32()?;
        extended = ext & OPERAND_EXTENDED_BIT != 0;
        match ext & 0x3f {
            0 => {}
            EXT_OPERAND_MODIFIER => {
                modifier = match (ext >> EXT_OPERAND_MODIFIER_SHIFT) & EXT_OPERAND_MODIFIER_MASK {
                    1 => OperandModifier::Neg,
                    2 => OperandModifier::Abs,
                    3 => OperandModifier::AbsNeg,
                    _ => OperandModifier::None,
                };
            }
            ty => {
                return Err(Sm4DecodeError {
                    at_dword: ext_at,
                    kind: Sm4DecodeErrorKind::UnsupportedExtendedOperand { ty },
                })
            }
        }
    }

    let dim = ((token >> OPERAND_INDEX_DIMENSION_SHIFT) & OPERAND_INDEX_DIMENSION_MASK) as usize;
    let mut indices = Vec::with_capacity(dim);
    for d in 0..dim {
        let shift = OPERAND_INDEX0_REP_SHIFT + OPERAND_INDEX_REP_BITS * d as u32;
        let rep = (token >> shift) & OPERAND_INDEX_REP_MASK;
        let index = match rep {
            OPERAND_INDEX_REP_IMMEDIATE32 => Sm4Index::immediate(r.read_u32()?),
            OPERAND_INDEX_REP_IMMEDIATE64 => Sm4Index::immediate(read_index64(r)?),
            OPERAND_INDEX_REP_RELATIVE => Sm4Index {
                offset: 0,
                relative: Some(Box::new(decode_operand(r, DataType::Sint32)?)),
            },
            OPERAND_INDEX_REP_IMMEDIATE32_PLUS_RELATIVE => {
                let offset = r.read_u32()?;
                Sm4Index {
                    offset,
                    relative: Some(Box::new(decode_operand(r, DataType::Sint32)?)),
                }
            }
            OPERAND_INDEX_REP_IMMEDIATE64_PLUS_RELATIVE => {
                let offset = read_index64(r)?;
                Sm4Index {
                    offset,
                    relative: Some(Box::new(decode_operand(r, DataType::Sint32)?)),
                }
            }
            rep => {
                return Err(err(Sm4DecodeErrorKind::UnsupportedIndexRepresentation {
                    rep,
                }))
            }
        };
        indices.push(index);
    }

    let mut imm = [0u32; 4];
    match (ty, components) {
        (OperandType::Imm32, ComponentCount::One) => imm = [r.read_u32()?; 4],
        (OperandType::Imm32, ComponentCount::Four) => {
            for v in &mut imm {
                *v = r.read_u32()?;
            }
        }
        (OperandType::Imm64, ComponentCount::One) => {
            imm[0] = r.read_u32()?;
            imm[1] = r.read_u32()?;
        }
        (OperandType::Imm64, ComponentCount::Four) => {
            // Only the first two doubles fit the 4-dword payload.
            for slot in 0..8 {
                let v = r.read_u32()?;
                if slot < 4 {
                    imm[slot] = v;
                }
            }
        }
        (OperandType::Imm32 | OperandType::Imm64, ComponentCount::Zero) => {
            return Err(err(Sm4DecodeErrorKind::EmptyImmediate))
        }
        _ => {}
    }

    Ok(Sm4Operand {
        ty,
        data_type,
        components,
        selection,
        mask,
        swizzle,
        modifier,
        indices,
        imm,
    })
}

fn read_index64(r: &mut InstrReader<'_>) -> Result<u32, Sm4DecodeError> {
    let at = r.at();
    let hi = r.read_u32()?;
    let lo = r.read_u32()?;
    let value = (u64::from(hi) << 32) | u64::from(lo);
    u32::try_from(value).map_err(|_| Sm4DecodeError {
        at_dword: at,
        kind: Sm4DecodeErrorKind::IndexOutOfRange { value },
    })
}

// ---- Token reader ----

struct InstrReader<'a> {
    toks: &'a [u32],
    pos: usize,
    base_at: usize,
}

impl<'a> InstrReader<'a> {
    fn new(toks: &'a [u32], base_at: usize) -> Self {
        // Position 0 is the opcode token, which the caller already consumed.
        Self {
            toks,
            pos: 1,
            base_at,
        }
    }

    fn at(&self) -> usize {
        self.base_at + self.pos
    }

    fn remaining(&self) -> usize {
        self.toks.len().saturating_sub(self.pos)
    }

    fn read_u32(&mut self) -> Result<u32, Sm4DecodeError> {
        let v = self
            .toks
            .get(self.pos)
            .copied()
            .ok_or_else(|| Sm4DecodeError {
                at_dword: self.at(),
                kind: Sm4DecodeErrorKind::UnexpectedEof { wanted: 1 },
            })?;
        self.pos += 1;
        Ok(v)
    }

    fn is_eof(&self) -> bool {
        self.pos >= self.toks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sm4::{ShaderModel, ShaderStage};
    use pretty_assertions::assert_eq;

    fn opcode_token(opcode: u32, len_dwords: u32) -> u32 {
        opcode | (len_dwords << OPCODE_LEN_SHIFT)
    }

    fn operand_token(ty: u32, components: u32, mode: u32, sel: u32, index_dim: u32) -> u32 {
        components
            | (mode << OPERAND_SELECTION_MODE_SHIFT)
            | (sel << OPERAND_COMPONENT_SELECTION_SHIFT)
            | (ty << OPERAND_TYPE_SHIFT)
            | (index_dim << OPERAND_INDEX_DIMENSION_SHIFT)
    }

    fn reg_dst(ty: u32, index: u32, mask: u32) -> Vec<u32> {
        vec![operand_token(ty, 2, OPERAND_SEL_MASK, mask, 1), index]
    }

    fn reg_src(ty: u32, index: u32, swizzle: [u8; 4]) -> Vec<u32> {
        let bits = swizzle
            .iter()
            .enumerate()
            .fold(0u32, |acc, (i, &c)| acc | (u32::from(c) << (2 * i)));
        vec![operand_token(ty, 2, OPERAND_SEL_SWIZZLE, bits, 1), index]
    }

    fn program(body: &[u32]) -> Sm4Program {
        let mut tokens = vec![0x0001_0050, (body.len() + 2) as u32];
        tokens.extend_from_slice(body);
        Sm4Program {
            stage: ShaderStage::Vertex,
            model: ShaderModel { major: 5, minor: 0 },
            tokens,
        }
    }

    #[test]
    fn decodes_masked_mov_with_swizzled_source() {
        let mut body = vec![opcode_token(OPCODE_MOV, 5)];
        body.extend(reg_dst(0, 2, 0b0011));
        body.extend(reg_src(1, 0, [3, 2, 1, 0]));
        body.push(opcode_token(OPCODE_RET, 1));

        let insts = decode_program(&program(&body)).unwrap();
        assert_eq!(insts.len(), 2);

        let mov = &insts[0];
        assert_eq!(mov.opcode, OPCODE_MOV);
        assert_eq!(mov.at_dword, 2);
        assert_eq!(mov.dst[0].ty, OperandType::Temp);
        assert_eq!(mov.dst[0].mask, WriteMask(0b0011));
        assert_eq!(mov.dst[0].index(0), Some(2));
        assert_eq!(mov.src[0].ty, OperandType::Input);
        assert_eq!(mov.src[0].swizzle, Swizzle([3, 2, 1, 0]));
        assert_eq!(mov.src[0].data_type, DataType::Float32);
        assert_eq!(insts[1].opcode, OPCODE_RET);
        assert_eq!(insts[1].at_dword, 7);
    }

    #[test]
    fn decodes_immediates_and_modifiers() {
        let neg_input = operand_token(1, 2, OPERAND_SEL_SWIZZLE, 0xe4, 1) | OPERAND_EXTENDED_BIT;
        let neg_ext = EXT_OPERAND_MODIFIER | (1 << EXT_OPERAND_MODIFIER_SHIFT);
        let imm4 = operand_token(4, 2, OPERAND_SEL_SWIZZLE, 0xe4, 0);

        let mut body = vec![opcode_token(OPCODE_ADD, 11)];
        body.extend(reg_dst(0, 0, 0xf));
        body.extend([neg_input, neg_ext, 1]);
        body.extend([imm4, 1.0f32.to_bits(), 2.0f32.to_bits(), 3.0f32.to_bits(), 4.0f32.to_bits()]);

        let insts = decode_program(&program(&body)).unwrap();
        let add = &insts[0];
        assert_eq!(add.src[0].modifier, OperandModifier::Neg);
        assert_eq!(add.src[0].index(0), Some(1));
        assert_eq!(add.src[1].ty, OperandType::Imm32);
        assert_eq!(add.src[1].imm[2], 3.0f32.to_bits());
    }

    #[test]
    fn decodes_relative_index() {
        // mov r0.x, x1[r2.y + 3].x
        let x_src = operand_token(3, 2, OPERAND_SEL_SELECT1, 0, 2)
            | (OPERAND_INDEX_REP_IMMEDIATE32_PLUS_RELATIVE << (OPERAND_INDEX0_REP_SHIFT + 3));
        let rel = operand_token(0, 2, OPERAND_SEL_SELECT1, 1, 1);

        let mut body = vec![opcode_token(OPCODE_MOV, 8)];
        body.extend(reg_dst(0, 0, 0b0001));
        body.extend([x_src, 1, 3, rel, 2]);

        let insts = decode_program(&program(&body)).unwrap();
        let src = &insts[0].src[0];
        assert_eq!(src.ty, OperandType::IndexableTemp);
        assert_eq!(src.index(0), Some(1));
        assert_eq!(src.index(1), None);
        assert_eq!(src.indices[1].offset, 3);
        let rel = src.indices[1].relative.as_deref().unwrap();
        assert_eq!(rel.ty, OperandType::Temp);
        assert_eq!(rel.swizzle, Swizzle([1; 4]));
        assert_eq!(rel.data_type, DataType::Sint32);
    }

    #[test]
    fn decodes_sample_offsets_from_extended_opcode() {
        // u = 1, v = -2
        let ext = EXT_OPCODE_SAMPLE_CONTROLS | (1 << 9) | (0xe << 13);
        let mut body = vec![opcode_token(OPCODE_SAMPLE, 10) | OPCODE_EXTENDED_BIT, ext];
        body.extend(reg_dst(0, 0, 0xf));
        body.extend(reg_src(1, 0, [0, 1, 2, 3]));
        body.extend(reg_src(7, 0, [0, 1, 2, 3]));
        body.extend([operand_token(6, 0, 0, 0, 1), 0]);

        let insts = decode_program(&program(&body)).unwrap();
        assert_eq!(insts[0].sample_offsets, [1, -2, 0]);
        assert_eq!(insts[0].src[1].ty, OperandType::Resource);
        assert_eq!(insts[0].src[2].ty, OperandType::Sampler);
    }

    #[test]
    fn empty_extended_opcode_is_skipped() {
        let body = [
            opcode_token(OPCODE_RET, 2) | OPCODE_EXTENDED_BIT,
            EXT_OPCODE_EMPTY,
            opcode_token(OPCODE_RET, 1),
        ];
        let insts = decode_program(&program(&body)).unwrap();
        assert_eq!(insts.len(), 2);
        assert_eq!(insts[0].sample_offsets, [0, 0, 0]);
        assert_eq!(insts[1].at_dword, 4);

        let body = [opcode_token(OPCODE_RET, 2) | OPCODE_EXTENDED_BIT, 9];
        let err = decode_program(&program(&body)).unwrap_err();
        assert_eq!(err.kind, Sm4DecodeErrorKind::UnsupportedExtendedOpcode { ty: 9 });
        assert_eq!(err.at_dword, 3);
    }

    #[test]
    fn immediate_constant_buffer_customdata() {
        let body = [
            OPCODE_CUSTOMDATA | (CUSTOMDATA_CLASS_IMMEDIATE_CONSTANT_BUFFER << CUSTOMDATA_CLASS_SHIFT),
            6,
            1,
            2,
            3,
            4,
            opcode_token(OPCODE_RET, 1),
        ];
        let insts = decode_program(&program(&body)).unwrap();
        assert_eq!(insts.len(), 2);
        assert_eq!(
            insts[0].custom_data,
            Some(Sm4CustomData::ImmediateConstantBuffer(vec![1, 2, 3, 4]))
        );
        assert_eq!(insts[1].at_dword, 8);
    }

    #[test]
    fn unknown_opcode_reports_position_and_stops() {
        let body = [opcode_token(OPCODE_RET, 1), opcode_token(107, 1), opcode_token(OPCODE_RET, 1)];
        let prog = program(&body);
        let mut decoder = Sm4Decoder::new(&prog);

        assert!(decoder.next().unwrap().is_ok());
        let err = decoder.next().unwrap().unwrap_err();
        assert_eq!(err.at_dword, 3);
        assert_eq!(err.kind, Sm4DecodeErrorKind::UnknownOpcode { opcode: 107 });
        assert!(decoder.next().is_none());
        assert!(decoder.next().is_none());
    }

    #[test]
    fn zero_length_and_overrun_are_rejected() {
        let err = decode_program(&program(&[OPCODE_RET])).unwrap_err();
        assert_eq!(err.kind, Sm4DecodeErrorKind::InstructionLengthZero);

        let err = decode_program(&program(&[opcode_token(OPCODE_MOV, 5), 0])).unwrap_err();
        assert_eq!(
            err.kind,
            Sm4DecodeErrorKind::InstructionOutOfBounds {
                len: 5,
                available: 2
            }
        );
    }

    #[test]
    fn trailing_dwords_are_rejected() {
        let body = [opcode_token(OPCODE_RET, 2), 0];
        let err = decode_program(&program(&body)).unwrap_err();
        assert!(matches!(
            err.kind,
            Sm4DecodeErrorKind::TrailingTokens { name: "ret", count: 1 }
        ));
    }

    #[test]
    fn declaration_controls_are_exposed() {
        // dcl_input_ps linear noperspective v1.xy
        let mut body = vec![opcode_token(OPCODE_DCL_INPUT_PS, 3) | (4 << 11)];
        body.extend(reg_dst(1, 1, 0b0011));
        // dcl_temps 4
        body.extend([opcode_token(OPCODE_DCL_TEMPS, 2), 4]);

        let insts = decode_program(&program(&body)).unwrap();
        assert_eq!(insts[0].interpolation(), 4);
        assert_eq!(insts[0].dst[0].mask, WriteMask(0b0011));
        assert_eq!(insts[1].imm, vec![4]);
    }
}
