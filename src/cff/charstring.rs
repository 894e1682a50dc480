//! Type 2 charstring decoding.
//!
//! Refer to [Technical Note #5177](https://adobe-type-tools.github.io/font-tech-notes/pdfs/5177.Type2.pdf).
//!
//! A charstring is decoded into a flat list of [T2Operator] values, each holding the operands it
//! consumed. Subroutine calls are followed, hint masks are sized from the number of stems seen so
//! far and the advance width is resolved against the Private DICT's `nominalWidthX` and
//! `defaultWidthX`.

use std::convert::TryFrom;
use std::fmt;

use itertools::Itertools;

use crate::binary::read::{ReadCtxt, ReadEof, ReadScope};
use crate::error::MalformedCharstring;
use crate::tables::Fixed;

use super::Index;

mod argstack;

pub use argstack::ArgumentsStack;

// Limits according to the Adobe Technical Note #5177 Appendix B.
pub const STACK_LIMIT: usize = 10;
pub const MAX_ARGUMENTS_STACK_LEN: usize = 48;
pub const TRANSIENT_ARRAY_LEN: usize = 32;

const TWO_BYTE_OPERATOR_MARK: u8 = 12;

/// A Type 2 operand.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Number {
    Integer(i32),
    /// A 16.16 value encoded with the `255` prefix.
    Fixed(Fixed),
    /// The result of an arithmetic operator that is not a whole number.
    Real(f64),
}

/// A glyph's charstring, decoded.
#[derive(Clone, Debug, PartialEq)]
pub struct CharString {
    glyph_name: String,
    width: f64,
    width_delta: Option<Number>,
    hint_count: usize,
    operators: Vec<T2Operator>,
}

/// Accent composition arguments of a four or five operand `endchar`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Seac {
    pub adx: Number,
    pub ady: Number,
    pub bchar: Number,
    pub achar: Number,
}

pub type Pair = (Number, Number);

/// A decoded charstring operator with its operands.
///
/// Operators that can carry the glyph width hold it in `width`; it is only ever present on the
/// first stack clearing operator of a charstring.
#[derive(Clone, Debug, PartialEq)]
pub enum T2Operator {
    HStem {
        width: Option<Number>,
        stems: Vec<Pair>,
    },
    VStem {
        width: Option<Number>,
        stems: Vec<Pair>,
    },
    HStemHm {
        width: Option<Number>,
        stems: Vec<Pair>,
    },
    VStemHm {
        width: Option<Number>,
        stems: Vec<Pair>,
    },
    /// `stems` are the implicit `vstemhm` pairs left on the stack, `mask` the raw mask bytes.
    HintMask {
        width: Option<Number>,
        stems: Vec<Pair>,
        mask: Vec<u8>,
    },
    CntrMask {
        width: Option<Number>,
        stems: Vec<Pair>,
        mask: Vec<u8>,
    },
    RMoveTo {
        width: Option<Number>,
        dx: Number,
        dy: Number,
    },
    HMoveTo {
        width: Option<Number>,
        dx: Number,
    },
    VMoveTo {
        width: Option<Number>,
        dy: Number,
    },
    RLineTo {
        points: Vec<Pair>,
    },
    HLineTo {
        deltas: Vec<Number>,
    },
    VLineTo {
        deltas: Vec<Number>,
    },
    RRCurveTo {
        curves: Vec<[Number; 6]>,
    },
    HHCurveTo {
        dy1: Option<Number>,
        curves: Vec<[Number; 4]>,
    },
    VVCurveTo {
        dx1: Option<Number>,
        curves: Vec<[Number; 4]>,
    },
    HVCurveTo {
        curves: Vec<[Number; 4]>,
        last: Option<Number>,
    },
    VHCurveTo {
        curves: Vec<[Number; 4]>,
        last: Option<Number>,
    },
    RCurveLine {
        curves: Vec<[Number; 6]>,
        line: Pair,
    },
    RLineCurve {
        lines: Vec<Pair>,
        curve: [Number; 6],
    },
    HFlex {
        args: [Number; 7],
    },
    Flex {
        args: [Number; 13],
    },
    HFlex1 {
        args: [Number; 9],
    },
    Flex1 {
        args: [Number; 11],
    },
    EndChar {
        width: Option<Number>,
        seac: Option<Seac>,
    },
    /// `operand` is the biased number from the charstring, `index` the INDEX entry it selected.
    CallSubr {
        operand: Number,
        index: usize,
    },
    CallGSubr {
        operand: Number,
        index: usize,
    },
    Return,
    DotSection,
    Arithmetic {
        op: ArithmeticOp,
        operands: Vec<Number>,
    },
}

/// Arithmetic, storage and conditional operators (two byte operators `12 x`).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ArithmeticOp {
    And,
    Or,
    Not,
    Abs,
    Add,
    Sub,
    Div,
    Neg,
    Eq,
    Drop,
    Put,
    Get,
    IfElse,
    Random,
    Mul,
    Sqrt,
    Dup,
    Exch,
    Index,
    Roll,
}

/// Reasons a charstring fails to decode.
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum CharStringError {
    StackUnderflow,
    StackOverflow,
    /// A reserved or unknown operator. Two byte operators are reported as `12 << 8 | b1`.
    InvalidOperator(u16),
    InvalidOperandCount {
        operator: &'static str,
        count: usize,
    },
    SubroutineRecursionTooDeep,
    InvalidSubroutineIndex(i32),
    NoLocalSubroutines,
    /// Division by zero, square root of a negative number or a transient array index out of
    /// bounds.
    InvalidArithmetic,
    TruncatedCharstring,
    DataAfterEndChar,
    MissingEndChar,
}

/// Decodes charstrings of one font (or one Font DICT of a CID-keyed font).
#[derive(Clone, Copy)]
pub struct Type2Interpreter<'a> {
    global_subr_index: Index<'a>,
    local_subr_index: Option<Index<'a>>,
    nominal_width_x: f64,
    default_width_x: f64,
    random_seed: i32,
}

/// Decoding state for one charstring.
struct Decoder<'d> {
    global_subr_index: Index<'d>,
    local_subr_index: Option<Index<'d>>,
    current: ReadCtxt<'d>,
    callers: Vec<ReadCtxt<'d>>,
    operators: Vec<T2Operator>,
    width_parsed: bool,
    width: Option<Number>,
    stems_len: usize,
    transient: [Option<Number>; TRANSIENT_ARRAY_LEN],
    random_state: u32,
}

impl<'a> Type2Interpreter<'a> {
    pub fn new(
        global_subr_index: Index<'a>,
        local_subr_index: Option<Index<'a>>,
        nominal_width_x: f64,
        default_width_x: f64,
    ) -> Self {
        Type2Interpreter {
            global_subr_index,
            local_subr_index,
            nominal_width_x,
            default_width_x,
            random_seed: 0,
        }
    }

    /// Seed used by the `random` operator, from the Private DICT's `InitialRandomSeed`.
    pub fn with_random_seed(self, random_seed: i32) -> Self {
        Type2Interpreter {
            random_seed,
            ..self
        }
    }

    /// Decode `char_string`, the charstring of the glyph called `glyph_name`.
    ///
    /// Decoding the same bytes twice yields equal results.
    pub fn decode(
        &self,
        glyph_name: &str,
        char_string: &[u8],
    ) -> Result<CharString, MalformedCharstring> {
        let mut data = [Number::Integer(0); MAX_ARGUMENTS_STACK_LEN];
        let mut stack = ArgumentsStack::new(&mut data);
        let mut decoder = Decoder {
            global_subr_index: self.global_subr_index,
            local_subr_index: self.local_subr_index,
            current: ReadScope::new(char_string).ctxt(),
            callers: Vec::new(),
            operators: Vec::new(),
            width_parsed: false,
            width: None,
            stems_len: 0,
            transient: [None; TRANSIENT_ARRAY_LEN],
            // Reinterpret the seed bits, negative seeds are valid.
            random_state: self.random_seed as u32,
        };

        decoder
            .run(&mut stack)
            .map_err(|(offset, reason)| MalformedCharstring {
                glyph_name: glyph_name.to_string(),
                offset,
                reason,
            })?;

        let width = match decoder.width {
            Some(delta) => self.nominal_width_x + delta.to_f64(),
            None => self.default_width_x,
        };
        Ok(CharString {
            glyph_name: glyph_name.to_string(),
            width,
            width_delta: decoder.width,
            hint_count: decoder.stems_len,
            operators: decoder.operators,
        })
    }
}

impl<'d> Decoder<'d> {
    /// Run until `endchar`, reporting errors with the offset of the token that failed.
    fn run(&mut self, stack: &mut ArgumentsStack<'_>) -> Result<(), (usize, CharStringError)> {
        loop {
            if !self.current.bytes_available() {
                // Falling off the end of a subroutine returns to the caller
                match self.callers.pop() {
                    Some(caller) => {
                        self.current = caller;
                        continue;
                    }
                    None => {
                        return Err((self.current.position(), CharStringError::MissingEndChar))
                    }
                }
            }

            let offset = self.current.position();
            let finished = self.step(stack).map_err(|err| (offset, err))?;
            if finished {
                let trailing = self.current.bytes_available()
                    || self.callers.iter().any(|caller| caller.bytes_available());
                if trailing {
                    return Err((self.current.position(), CharStringError::DataAfterEndChar));
                }
                return Ok(());
            }
        }
    }

    /// Decode one token. Returns `true` once `endchar` has been seen.
    fn step(&mut self, stack: &mut ArgumentsStack<'_>) -> Result<bool, CharStringError> {
        let b0 = self.current.read_u8()?;
        match b0 {
            operator::HORIZONTAL_STEM
            | operator::VERTICAL_STEM
            | operator::HORIZONTAL_STEM_HINT_MASK
            | operator::VERTICAL_STEM_HINT_MASK => {
                let op = self.stem(b0, stack)?;
                self.operators.push(op);
            }
            operator::HINT_MASK | operator::COUNTER_MASK => {
                let op = self.hint_mask(b0, stack)?;
                self.operators.push(op);
            }
            operator::MOVE_TO | operator::HORIZONTAL_MOVE_TO | operator::VERTICAL_MOVE_TO => {
                let op = self.move_to(b0, stack)?;
                self.operators.push(op);
            }
            operator::LINE_TO
            | operator::HORIZONTAL_LINE_TO
            | operator::VERTICAL_LINE_TO
            | operator::CURVE_TO
            | operator::CURVE_LINE
            | operator::LINE_CURVE
            | operator::VV_CURVE_TO
            | operator::HH_CURVE_TO
            | operator::VH_CURVE_TO
            | operator::HV_CURVE_TO => {
                let args = stack.pop_all().to_vec();
                let op = path(b0, &args)?;
                self.operators.push(op);
            }
            operator::ENDCHAR => {
                let op = self.endchar(stack)?;
                self.operators.push(op);
                return Ok(true);
            }
            operator::CALL_LOCAL_SUBROUTINE => {
                let subrs = self
                    .local_subr_index
                    .ok_or(CharStringError::NoLocalSubroutines)?;
                let operand = stack.pop()?;
                let (index, char_string) = self.subroutine(&subrs, operand)?;
                self.operators.push(T2Operator::CallSubr { operand, index });
                self.enter(char_string)?;
            }
            operator::CALL_GLOBAL_SUBROUTINE => {
                let subrs = self.global_subr_index;
                let operand = stack.pop()?;
                let (index, char_string) = self.subroutine(&subrs, operand)?;
                self.operators.push(T2Operator::CallGSubr { operand, index });
                self.enter(char_string)?;
            }
            operator::RETURN => {
                let caller = self
                    .callers
                    .pop()
                    .ok_or(CharStringError::InvalidOperator(u16::from(b0)))?;
                self.operators.push(T2Operator::Return);
                self.current = caller;
            }
            TWO_BYTE_OPERATOR_MARK => {
                let b1 = self.current.read_u8()?;
                let op = self.escape(b1, stack)?;
                self.operators.push(op);
            }
            operator::SHORT_INT => {
                let n = self.current.read_i16be()?;
                stack.push(Number::Integer(i32::from(n)))?;
            }
            32..=246 => {
                stack.push(Number::Integer(i32::from(b0) - 139))?;
            }
            247..=250 => {
                let b1 = self.current.read_u8()?;
                let n = (i32::from(b0) - 247) * 256 + i32::from(b1) + 108;
                stack.push(Number::Integer(n))?;
            }
            251..=254 => {
                let b1 = self.current.read_u8()?;
                let n = -(i32::from(b0) - 251) * 256 - i32::from(b1) - 108;
                stack.push(Number::Integer(n))?;
            }
            operator::FIXED_16_16 => {
                let n = self.current.read_i32be()?;
                stack.push(Number::Fixed(Fixed::new(n)))?;
            }
            // Reserved: 0, 2, 9, 13, 15, 16, 17
            _ => return Err(CharStringError::InvalidOperator(u16::from(b0))),
        }

        Ok(false)
    }

    /// Split off the width if this is the first stack clearing operator and it has one.
    fn take_width<'s>(
        &mut self,
        args: &'s [Number],
        has_extra: bool,
    ) -> (Option<Number>, &'s [Number]) {
        if self.width_parsed {
            return (None, args);
        }
        self.width_parsed = true;
        match args.split_first() {
            Some((width, rest)) if has_extra => {
                self.width = Some(*width);
                (Some(*width), rest)
            }
            _ => (None, args),
        }
    }

    fn stem(
        &mut self,
        b0: u8,
        stack: &mut ArgumentsStack<'_>,
    ) -> Result<T2Operator, CharStringError> {
        let all = stack.pop_all().to_vec();
        let (width, args) = self.take_width(&all, all.len() % 2 == 1);
        let mnemonic = operator::mnemonic(b0);
        if args.is_empty() || args.len() % 2 != 0 {
            return Err(invalid_count(mnemonic, args.len()));
        }

        let stems = pairs(args);
        self.stems_len += stems.len();
        let op = match b0 {
            operator::HORIZONTAL_STEM => T2Operator::HStem { width, stems },
            operator::VERTICAL_STEM => T2Operator::VStem { width, stems },
            operator::HORIZONTAL_STEM_HINT_MASK => T2Operator::HStemHm { width, stems },
            _ => T2Operator::VStemHm { width, stems },
        };
        Ok(op)
    }

    fn hint_mask(
        &mut self,
        b0: u8,
        stack: &mut ArgumentsStack<'_>,
    ) -> Result<T2Operator, CharStringError> {
        let all = stack.pop_all().to_vec();
        let (width, args) = self.take_width(&all, all.len() % 2 == 1);
        if args.len() % 2 != 0 {
            return Err(invalid_count(operator::mnemonic(b0), args.len()));
        }

        // Values left on the stack are implicit vstemhm hints
        let stems = pairs(args);
        self.stems_len += stems.len();
        let mask = self.current.read_slice((self.stems_len + 7) >> 3)?.to_vec();
        let op = match b0 {
            operator::HINT_MASK => T2Operator::HintMask { width, stems, mask },
            _ => T2Operator::CntrMask { width, stems, mask },
        };
        Ok(op)
    }

    fn move_to(
        &mut self,
        b0: u8,
        stack: &mut ArgumentsStack<'_>,
    ) -> Result<T2Operator, CharStringError> {
        let all = stack.pop_all().to_vec();
        let required = if b0 == operator::MOVE_TO { 2 } else { 1 };
        let (width, args) = self.take_width(&all, all.len() == required + 1);
        let op = match (b0, args) {
            (operator::MOVE_TO, &[dx, dy]) => T2Operator::RMoveTo { width, dx, dy },
            (operator::HORIZONTAL_MOVE_TO, &[dx]) => T2Operator::HMoveTo { width, dx },
            (operator::VERTICAL_MOVE_TO, &[dy]) => T2Operator::VMoveTo { width, dy },
            _ => return Err(invalid_count(operator::mnemonic(b0), args.len())),
        };
        Ok(op)
    }

    fn endchar(&mut self, stack: &mut ArgumentsStack<'_>) -> Result<T2Operator, CharStringError> {
        let all = stack.pop_all().to_vec();
        let (width, args) = self.take_width(&all, all.len() == 1 || all.len() == 5);
        let seac = match *args {
            [] => None,
            [adx, ady, bchar, achar] => Some(Seac {
                adx,
                ady,
                bchar,
                achar,
            }),
            _ => return Err(invalid_count("endchar", args.len())),
        };
        Ok(T2Operator::EndChar { width, seac })
    }

    fn subroutine(
        &self,
        subrs: &Index<'d>,
        operand: Number,
    ) -> Result<(usize, &'d [u8]), CharStringError> {
        let biased = operand.to_i32();
        let index = conv_subroutine_index(biased, calc_subroutine_bias(subrs.len()))
            .ok_or(CharStringError::InvalidSubroutineIndex(biased))?;
        let char_string = subrs
            .get(index)
            .map_err(|_| CharStringError::InvalidSubroutineIndex(biased))?;
        Ok((index, char_string))
    }

    fn enter(&mut self, char_string: &'d [u8]) -> Result<(), CharStringError> {
        if self.callers.len() == STACK_LIMIT {
            return Err(CharStringError::SubroutineRecursionTooDeep);
        }
        let caller = std::mem::replace(&mut self.current, ReadScope::new(char_string).ctxt());
        self.callers.push(caller);
        Ok(())
    }

    fn escape(
        &mut self,
        b1: u8,
        stack: &mut ArgumentsStack<'_>,
    ) -> Result<T2Operator, CharStringError> {
        let op = match b1 {
            operator::DOTSECTION => {
                stack.clear();
                return Ok(T2Operator::DotSection);
            }
            operator::HFLEX | operator::FLEX | operator::HFLEX1 | operator::FLEX1 => {
                let args = stack.pop_all().to_vec();
                return flex(b1, &args);
            }
            operator::AND => ArithmeticOp::And,
            operator::OR => ArithmeticOp::Or,
            operator::NOT => ArithmeticOp::Not,
            operator::ABS => ArithmeticOp::Abs,
            operator::ADD => ArithmeticOp::Add,
            operator::SUB => ArithmeticOp::Sub,
            operator::DIV => ArithmeticOp::Div,
            operator::NEG => ArithmeticOp::Neg,
            operator::EQ => ArithmeticOp::Eq,
            operator::DROP => ArithmeticOp::Drop,
            operator::PUT => ArithmeticOp::Put,
            operator::GET => ArithmeticOp::Get,
            operator::IFELSE => ArithmeticOp::IfElse,
            operator::RANDOM => ArithmeticOp::Random,
            operator::MUL => ArithmeticOp::Mul,
            operator::SQRT => ArithmeticOp::Sqrt,
            operator::DUP => ArithmeticOp::Dup,
            operator::EXCH => ArithmeticOp::Exch,
            operator::INDEX => ArithmeticOp::Index,
            operator::ROLL => ArithmeticOp::Roll,
            _ => {
                return Err(CharStringError::InvalidOperator(
                    u16::from(TWO_BYTE_OPERATOR_MARK) << 8 | u16::from(b1),
                ))
            }
        };
        let operands = self.arithmetic(op, stack)?;
        Ok(T2Operator::Arithmetic { op, operands })
    }

    /// Apply `op` to the stack, returning the operands it consumed.
    fn arithmetic(
        &mut self,
        op: ArithmeticOp,
        stack: &mut ArgumentsStack<'_>,
    ) -> Result<Vec<Number>, CharStringError> {
        let operands = stack.pop_n(op.arity())?.to_vec();
        let value = |i: usize| operands[i].to_f64();
        let boolean = |cond: bool| Number::Integer(i32::from(cond));

        match op {
            ArithmeticOp::And => stack.push(boolean(value(0) != 0.0 && value(1) != 0.0))?,
            ArithmeticOp::Or => stack.push(boolean(value(0) != 0.0 || value(1) != 0.0))?,
            ArithmeticOp::Not => stack.push(boolean(value(0) == 0.0))?,
            ArithmeticOp::Abs => stack.push(Number::from_f64(value(0).abs()))?,
            ArithmeticOp::Add => stack.push(Number::from_f64(value(0) + value(1)))?,
            ArithmeticOp::Sub => stack.push(Number::from_f64(value(0) - value(1)))?,
            ArithmeticOp::Div => {
                if value(1) == 0.0 {
                    return Err(CharStringError::InvalidArithmetic);
                }
                stack.push(Number::from_f64(value(0) / value(1)))?
            }
            ArithmeticOp::Neg => stack.push(Number::from_f64(-value(0)))?,
            ArithmeticOp::Eq => stack.push(boolean(value(0) == value(1)))?,
            ArithmeticOp::Drop => {}
            ArithmeticOp::Put => {
                let slot = transient_index(operands[1])?;
                self.transient[slot] = Some(operands[0]);
            }
            ArithmeticOp::Get => {
                let slot = transient_index(operands[0])?;
                stack.push(self.transient[slot].unwrap_or(Number::Integer(0)))?
            }
            ArithmeticOp::IfElse => {
                let chosen = if value(2) <= value(3) {
                    operands[0]
                } else {
                    operands[1]
                };
                stack.push(chosen)?
            }
            ArithmeticOp::Random => stack.push(Number::Real(self.next_random()))?,
            ArithmeticOp::Mul => stack.push(Number::from_f64(value(0) * value(1)))?,
            ArithmeticOp::Sqrt => {
                if value(0) < 0.0 {
                    return Err(CharStringError::InvalidArithmetic);
                }
                stack.push(Number::from_f64(value(0).sqrt()))?
            }
            ArithmeticOp::Dup => {
                stack.push(operands[0])?;
                stack.push(operands[0])?
            }
            ArithmeticOp::Exch => {
                stack.push(operands[1])?;
                stack.push(operands[0])?
            }
            ArithmeticOp::Index => {
                // A negative index copies the top element
                let depth = usize::try_from(operands[0].to_i32()).unwrap_or(0);
                let n = stack.peek(depth)?;
                stack.push(n)?
            }
            ArithmeticOp::Roll => {
                let count = usize::try_from(operands[0].to_i32())
                    .map_err(|_| CharStringError::InvalidArithmetic)?;
                let shift = operands[1].to_i32();
                let top = stack.top_mut(count)?;
                if !top.is_empty() {
                    let amount = shift.rem_euclid(count as i32) as usize;
                    top.rotate_right(amount);
                }
            }
        }

        Ok(operands)
    }

    /// Next value of the deterministic generator behind `random`, in (0, 1].
    fn next_random(&mut self) -> f64 {
        self.random_state = self
            .random_state
            .wrapping_mul(1_103_515_245)
            .wrapping_add(12_345);
        let bits = (self.random_state >> 16) & 0x7fff;
        (f64::from(bits) + 1.0) / 32768.0
    }
}

fn path(b0: u8, args: &[Number]) -> Result<T2Operator, CharStringError> {
    let len = args.len();
    let mnemonic = operator::mnemonic(b0);
    let op = match b0 {
        operator::LINE_TO if len >= 2 && len % 2 == 0 => T2Operator::RLineTo {
            points: pairs(args),
        },
        operator::HORIZONTAL_LINE_TO if len >= 1 => T2Operator::HLineTo {
            deltas: args.to_vec(),
        },
        operator::VERTICAL_LINE_TO if len >= 1 => T2Operator::VLineTo {
            deltas: args.to_vec(),
        },
        operator::CURVE_TO if len >= 6 && len % 6 == 0 => T2Operator::RRCurveTo {
            curves: groups(args),
        },
        operator::HH_CURVE_TO if len >= 4 && len % 4 <= 1 => {
            let (dy1, rest) = split_odd_first(args);
            T2Operator::HHCurveTo {
                dy1,
                curves: groups(rest),
            }
        }
        operator::VV_CURVE_TO if len >= 4 && len % 4 <= 1 => {
            let (dx1, rest) = split_odd_first(args);
            T2Operator::VVCurveTo {
                dx1,
                curves: groups(rest),
            }
        }
        operator::HV_CURVE_TO | operator::VH_CURVE_TO
            if len >= 4 && matches!(len % 8, 0 | 1 | 4 | 5) =>
        {
            let (curves, last) = match args.split_last() {
                Some((last, rest)) if len % 2 == 1 => (groups(rest), Some(*last)),
                _ => (groups(args), None),
            };
            if b0 == operator::HV_CURVE_TO {
                T2Operator::HVCurveTo { curves, last }
            } else {
                T2Operator::VHCurveTo { curves, last }
            }
        }
        operator::CURVE_LINE if len >= 8 && (len - 2) % 6 == 0 => {
            let (curves, line) = args.split_at(len - 2);
            T2Operator::RCurveLine {
                curves: groups(curves),
                line: (line[0], line[1]),
            }
        }
        operator::LINE_CURVE if len >= 8 && (len - 6) % 2 == 0 => {
            let (lines, curve) = args.split_at(len - 6);
            let curve = <[Number; 6]>::try_from(curve).map_err(|_| invalid_count(mnemonic, len))?;
            T2Operator::RLineCurve {
                lines: pairs(lines),
                curve,
            }
        }
        _ => return Err(invalid_count(mnemonic, len)),
    };
    Ok(op)
}

fn flex(b1: u8, args: &[Number]) -> Result<T2Operator, CharStringError> {
    let err = || invalid_count(operator::escape_mnemonic(b1), args.len());
    let op = match b1 {
        operator::HFLEX => T2Operator::HFlex {
            args: <[Number; 7]>::try_from(args).map_err(|_| err())?,
        },
        operator::FLEX => T2Operator::Flex {
            args: <[Number; 13]>::try_from(args).map_err(|_| err())?,
        },
        operator::HFLEX1 => T2Operator::HFlex1 {
            args: <[Number; 9]>::try_from(args).map_err(|_| err())?,
        },
        _ => T2Operator::Flex1 {
            args: <[Number; 11]>::try_from(args).map_err(|_| err())?,
        },
    };
    Ok(op)
}

fn pairs(args: &[Number]) -> Vec<Pair> {
    args.chunks_exact(2).map(|pair| (pair[0], pair[1])).collect()
}

fn groups<const N: usize>(args: &[Number]) -> Vec<[Number; N]> {
    args.chunks_exact(N)
        .filter_map(|chunk| <[Number; N]>::try_from(chunk).ok())
        .collect()
}

fn split_odd_first(args: &[Number]) -> (Option<Number>, &[Number]) {
    match args.split_first() {
        Some((first, rest)) if args.len() % 2 == 1 => (Some(*first), rest),
        _ => (None, args),
    }
}

fn invalid_count(operator: &'static str, count: usize) -> CharStringError {
    CharStringError::InvalidOperandCount { operator, count }
}

fn transient_index(n: Number) -> Result<usize, CharStringError> {
    usize::try_from(n.to_i32())
        .ok()
        .filter(|&index| index < TRANSIENT_ARRAY_LEN)
        .ok_or(CharStringError::InvalidArithmetic)
}

/// Convert a biased subroutine number from a charstring to an INDEX position.
pub fn conv_subroutine_index(index: i32, bias: u16) -> Option<usize> {
    let bias = i32::from(bias);

    let index = index.checked_add(bias)?;
    usize::try_from(index).ok()
}

// Adobe Technical Note #5176, Chapter 16 "Local / Global Subrs INDEXes"
pub fn calc_subroutine_bias(len: usize) -> u16 {
    if len < 1240 {
        107
    } else if len < 33900 {
        1131
    } else {
        32768
    }
}

impl Number {
    pub fn to_f64(self) -> f64 {
        match self {
            Number::Integer(n) => f64::from(n),
            Number::Fixed(fixed) => f64::from(fixed),
            Number::Real(n) => n,
        }
    }

    /// The integer part of this number, rounding towards zero.
    pub fn to_i32(self) -> i32 {
        match self {
            Number::Integer(n) => n,
            Number::Fixed(fixed) => fixed.trunc(),
            // `as` saturates, NaN becomes 0
            Number::Real(n) => n.trunc() as i32,
        }
    }

    /// Whole numbers in `i32` range become `Integer`, everything else `Real`.
    pub fn from_f64(value: f64) -> Number {
        if value.fract() == 0.0 && value >= f64::from(i32::MIN) && value <= f64::from(i32::MAX) {
            Number::Integer(value as i32)
        } else {
            Number::Real(value)
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Number::Integer(n) => write!(f, "{}", n),
            Number::Fixed(fixed) => fmt_fixed(f, fixed),
            Number::Real(n) if n == 0.0 => write!(f, "0"),
            Number::Real(n) => write!(f, "{}", n),
        }
    }
}

/// Write the shortest decimal that reads back as the same 16.16 value.
fn fmt_fixed(f: &mut fmt::Formatter<'_>, fixed: Fixed) -> fmt::Result {
    let value = f64::from(fixed);
    for precision in 0..=5 {
        let text = format!("{:.*}", precision, value);
        let round_trips = text
            .parse::<f64>()
            .map(|parsed| (parsed * 65536.0).round() as i64 == i64::from(fixed.raw_value()))
            .unwrap_or(false);
        if round_trips {
            return f.write_str(&text);
        }
    }
    write!(f, "{}", value)
}

impl ArithmeticOp {
    /// Number of operands taken from the stack.
    pub fn arity(self) -> usize {
        match self {
            ArithmeticOp::Random => 0,
            ArithmeticOp::Not
            | ArithmeticOp::Abs
            | ArithmeticOp::Neg
            | ArithmeticOp::Drop
            | ArithmeticOp::Get
            | ArithmeticOp::Sqrt
            | ArithmeticOp::Dup
            | ArithmeticOp::Index => 1,
            ArithmeticOp::And
            | ArithmeticOp::Or
            | ArithmeticOp::Add
            | ArithmeticOp::Sub
            | ArithmeticOp::Div
            | ArithmeticOp::Eq
            | ArithmeticOp::Put
            | ArithmeticOp::Mul
            | ArithmeticOp::Exch
            | ArithmeticOp::Roll => 2,
            ArithmeticOp::IfElse => 4,
        }
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            ArithmeticOp::And => "and",
            ArithmeticOp::Or => "or",
            ArithmeticOp::Not => "not",
            ArithmeticOp::Abs => "abs",
            ArithmeticOp::Add => "add",
            ArithmeticOp::Sub => "sub",
            ArithmeticOp::Div => "div",
            ArithmeticOp::Neg => "neg",
            ArithmeticOp::Eq => "eq",
            ArithmeticOp::Drop => "drop",
            ArithmeticOp::Put => "put",
            ArithmeticOp::Get => "get",
            ArithmeticOp::IfElse => "ifelse",
            ArithmeticOp::Random => "random",
            ArithmeticOp::Mul => "mul",
            ArithmeticOp::Sqrt => "sqrt",
            ArithmeticOp::Dup => "dup",
            ArithmeticOp::Exch => "exch",
            ArithmeticOp::Index => "index",
            ArithmeticOp::Roll => "roll",
        }
    }
}

impl T2Operator {
    pub fn mnemonic(&self) -> &'static str {
        match self {
            T2Operator::HStem { .. } => "hstem",
            T2Operator::VStem { .. } => "vstem",
            T2Operator::HStemHm { .. } => "hstemhm",
            T2Operator::VStemHm { .. } => "vstemhm",
            T2Operator::HintMask { .. } => "hintmask",
            T2Operator::CntrMask { .. } => "cntrmask",
            T2Operator::RMoveTo { .. } => "rmoveto",
            T2Operator::HMoveTo { .. } => "hmoveto",
            T2Operator::VMoveTo { .. } => "vmoveto",
            T2Operator::RLineTo { .. } => "rlineto",
            T2Operator::HLineTo { .. } => "hlineto",
            T2Operator::VLineTo { .. } => "vlineto",
            T2Operator::RRCurveTo { .. } => "rrcurveto",
            T2Operator::HHCurveTo { .. } => "hhcurveto",
            T2Operator::VVCurveTo { .. } => "vvcurveto",
            T2Operator::HVCurveTo { .. } => "hvcurveto",
            T2Operator::VHCurveTo { .. } => "vhcurveto",
            T2Operator::RCurveLine { .. } => "rcurveline",
            T2Operator::RLineCurve { .. } => "rlinecurve",
            T2Operator::HFlex { .. } => "hflex",
            T2Operator::Flex { .. } => "flex",
            T2Operator::HFlex1 { .. } => "hflex1",
            T2Operator::Flex1 { .. } => "flex1",
            T2Operator::EndChar { .. } => "endchar",
            T2Operator::CallSubr { .. } => "callsubr",
            T2Operator::CallGSubr { .. } => "callgsubr",
            T2Operator::Return => "return",
            T2Operator::DotSection => "dotsection",
            T2Operator::Arithmetic { op, .. } => op.mnemonic(),
        }
    }

    /// The operands in the order they appear in the charstring, width first.
    pub fn operands(&self) -> Vec<Number> {
        fn flatten_pairs(width: &Option<Number>, pairs: &[Pair]) -> Vec<Number> {
            width
                .iter()
                .copied()
                .chain(pairs.iter().flat_map(|&(a, b)| [a, b]))
                .collect()
        }

        match self {
            T2Operator::HStem { width, stems }
            | T2Operator::VStem { width, stems }
            | T2Operator::HStemHm { width, stems }
            | T2Operator::VStemHm { width, stems }
            | T2Operator::HintMask { width, stems, .. }
            | T2Operator::CntrMask { width, stems, .. } => flatten_pairs(width, stems),
            T2Operator::RMoveTo { width, dx, dy } => width.iter().copied().chain([*dx, *dy]).collect(),
            T2Operator::HMoveTo { width, dx } => width.iter().copied().chain([*dx]).collect(),
            T2Operator::VMoveTo { width, dy } => width.iter().copied().chain([*dy]).collect(),
            T2Operator::RLineTo { points } => flatten_pairs(&None, points),
            T2Operator::HLineTo { deltas } | T2Operator::VLineTo { deltas } => deltas.clone(),
            T2Operator::RRCurveTo { curves } => curves.concat(),
            T2Operator::HHCurveTo { dy1: first, curves }
            | T2Operator::VVCurveTo { dx1: first, curves } => {
                first.iter().copied().chain(curves.concat()).collect()
            }
            T2Operator::HVCurveTo { curves, last } | T2Operator::VHCurveTo { curves, last } => {
                curves.concat().into_iter().chain(last.iter().copied()).collect()
            }
            T2Operator::RCurveLine { curves, line } => {
                curves.concat().into_iter().chain([line.0, line.1]).collect()
            }
            T2Operator::RLineCurve { lines, curve } => flatten_pairs(&None, lines)
                .into_iter()
                .chain(curve.iter().copied())
                .collect(),
            T2Operator::HFlex { args } => args.to_vec(),
            T2Operator::Flex { args } => args.to_vec(),
            T2Operator::HFlex1 { args } => args.to_vec(),
            T2Operator::Flex1 { args } => args.to_vec(),
            T2Operator::EndChar { width, seac } => width
                .iter()
                .copied()
                .chain(
                    seac.iter()
                        .flat_map(|seac| [seac.adx, seac.ady, seac.bchar, seac.achar]),
                )
                .collect(),
            T2Operator::CallSubr { operand, .. } | T2Operator::CallGSubr { operand, .. } => {
                vec![*operand]
            }
            T2Operator::Return | T2Operator::DotSection => Vec::new(),
            T2Operator::Arithmetic { operands, .. } => operands.clone(),
        }
    }

    /// The width operand, if this operator carried one.
    pub fn width(&self) -> Option<Number> {
        match self {
            T2Operator::HStem { width, .. }
            | T2Operator::VStem { width, .. }
            | T2Operator::HStemHm { width, .. }
            | T2Operator::VStemHm { width, .. }
            | T2Operator::HintMask { width, .. }
            | T2Operator::CntrMask { width, .. }
            | T2Operator::RMoveTo { width, .. }
            | T2Operator::HMoveTo { width, .. }
            | T2Operator::VMoveTo { width, .. }
            | T2Operator::EndChar { width, .. } => *width,
            _ => None,
        }
    }

    /// The mask of a `hintmask` or `cntrmask` as a string of binary digits, most significant
    /// bit first.
    pub fn mask_bits(&self) -> Option<String> {
        match self {
            T2Operator::HintMask { mask, .. } | T2Operator::CntrMask { mask, .. } => {
                Some(mask.iter().map(|byte| format!("{:08b}", byte)).collect())
            }
            _ => None,
        }
    }
}

impl fmt::Display for T2Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let operands = self.operands();
        if operands.is_empty() {
            f.write_str(self.mnemonic())
        } else {
            write!(f, "{} {}", operands.iter().join(" "), self.mnemonic())
        }
    }
}

impl CharString {
    pub fn glyph_name(&self) -> &str {
        &self.glyph_name
    }

    /// Advance width: `nominalWidthX` plus the width operand, or `defaultWidthX` without one.
    pub fn width(&self) -> f64 {
        self.width
    }

    /// The width operand as it appeared in the charstring.
    pub fn width_delta(&self) -> Option<Number> {
        self.width_delta
    }

    /// Total number of stem hints declared, including implicit `vstemhm` hints.
    pub fn hint_count(&self) -> usize {
        self.hint_count
    }

    pub fn operators(&self) -> &[T2Operator] {
        &self.operators
    }

    /// Accent components of a `seac`-style `endchar`, if present.
    pub fn seac(&self) -> Option<Seac> {
        self.operators.iter().find_map(|op| match op {
            T2Operator::EndChar { seac, .. } => *seac,
            _ => None,
        })
    }

    /// Text form of each operator, e.g. `"10 20 rlineto"`.
    pub fn disassemble(&self) -> Vec<String> {
        self.operators.iter().map(ToString::to_string).collect()
    }
}

impl fmt::Display for CharString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.operators.iter().join("\n"))
    }
}

impl From<ReadEof> for CharStringError {
    fn from(_error: ReadEof) -> Self {
        CharStringError::TruncatedCharstring
    }
}

impl fmt::Display for CharStringError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CharStringError::StackUnderflow => write!(f, "operand stack underflow"),
            CharStringError::StackOverflow => write!(f, "arguments stack limit reached"),
            CharStringError::InvalidOperator(op) if op >> 8 == 12 => {
                write!(f, "invalid operator 12 {}", op & 0xFF)
            }
            CharStringError::InvalidOperator(op) => write!(f, "invalid operator {}", op),
            CharStringError::InvalidOperandCount { operator, count } => {
                write!(f, "'{}' can't take {} operands", operator, count)
            }
            CharStringError::SubroutineRecursionTooDeep => {
                write!(f, "subroutines nesting limit reached")
            }
            CharStringError::InvalidSubroutineIndex(index) => {
                write!(f, "invalid subroutine index {}", index)
            }
            CharStringError::NoLocalSubroutines => write!(f, "no local subroutines"),
            CharStringError::InvalidArithmetic => {
                write!(f, "invalid operand to arithmetic operator")
            }
            CharStringError::TruncatedCharstring => write!(f, "charstring ended unexpectedly"),
            CharStringError::DataAfterEndChar => {
                write!(f, "unused data left after 'endchar' operator")
            }
            CharStringError::MissingEndChar => write!(f, "the 'endchar' operator is missing"),
        }
    }
}

impl std::error::Error for CharStringError {}

/// Operators defined in Adobe Technical Note #5177, The Type 2 Charstring Format.
pub mod operator {
    pub const HORIZONTAL_STEM: u8 = 1;
    pub const VERTICAL_STEM: u8 = 3;
    pub const VERTICAL_MOVE_TO: u8 = 4;
    pub const LINE_TO: u8 = 5;
    pub const HORIZONTAL_LINE_TO: u8 = 6;
    pub const VERTICAL_LINE_TO: u8 = 7;
    pub const CURVE_TO: u8 = 8;
    pub const CALL_LOCAL_SUBROUTINE: u8 = 10;
    pub const RETURN: u8 = 11;
    pub const ENDCHAR: u8 = 14;
    pub const HORIZONTAL_STEM_HINT_MASK: u8 = 18;
    pub const HINT_MASK: u8 = 19;
    pub const COUNTER_MASK: u8 = 20;
    pub const MOVE_TO: u8 = 21;
    pub const HORIZONTAL_MOVE_TO: u8 = 22;
    pub const VERTICAL_STEM_HINT_MASK: u8 = 23;
    pub const CURVE_LINE: u8 = 24;
    pub const LINE_CURVE: u8 = 25;
    pub const VV_CURVE_TO: u8 = 26;
    pub const HH_CURVE_TO: u8 = 27;
    pub const SHORT_INT: u8 = 28;
    pub const CALL_GLOBAL_SUBROUTINE: u8 = 29;
    pub const VH_CURVE_TO: u8 = 30;
    pub const HV_CURVE_TO: u8 = 31;
    pub const FIXED_16_16: u8 = 255;

    // Second byte of two byte operators
    pub const DOTSECTION: u8 = 0;
    pub const AND: u8 = 3;
    pub const OR: u8 = 4;
    pub const NOT: u8 = 5;
    pub const ABS: u8 = 9;
    pub const ADD: u8 = 10;
    pub const SUB: u8 = 11;
    pub const DIV: u8 = 12;
    pub const NEG: u8 = 14;
    pub const EQ: u8 = 15;
    pub const DROP: u8 = 18;
    pub const PUT: u8 = 20;
    pub const GET: u8 = 21;
    pub const IFELSE: u8 = 22;
    pub const RANDOM: u8 = 23;
    pub const MUL: u8 = 24;
    pub const SQRT: u8 = 26;
    pub const DUP: u8 = 27;
    pub const EXCH: u8 = 28;
    pub const INDEX: u8 = 29;
    pub const ROLL: u8 = 30;
    pub const HFLEX: u8 = 34;
    pub const FLEX: u8 = 35;
    pub const HFLEX1: u8 = 36;
    pub const FLEX1: u8 = 37;

    pub fn mnemonic(op: u8) -> &'static str {
        match op {
            HORIZONTAL_STEM => "hstem",
            VERTICAL_STEM => "vstem",
            VERTICAL_MOVE_TO => "vmoveto",
            LINE_TO => "rlineto",
            HORIZONTAL_LINE_TO => "hlineto",
            VERTICAL_LINE_TO => "vlineto",
            CURVE_TO => "rrcurveto",
            CALL_LOCAL_SUBROUTINE => "callsubr",
            RETURN => "return",
            ENDCHAR => "endchar",
            HORIZONTAL_STEM_HINT_MASK => "hstemhm",
            HINT_MASK => "hintmask",
            COUNTER_MASK => "cntrmask",
            MOVE_TO => "rmoveto",
            HORIZONTAL_MOVE_TO => "hmoveto",
            VERTICAL_STEM_HINT_MASK => "vstemhm",
            CURVE_LINE => "rcurveline",
            LINE_CURVE => "rlinecurve",
            VV_CURVE_TO => "vvcurveto",
            HH_CURVE_TO => "hhcurveto",
            CALL_GLOBAL_SUBROUTINE => "callgsubr",
            VH_CURVE_TO => "vhcurveto",
            HV_CURVE_TO => "hvcurveto",
            _ => "unknown",
        }
    }

    pub fn escape_mnemonic(op: u8) -> &'static str {
        match op {
            HFLEX => "hflex",
            FLEX => "flex",
            HFLEX1 => "hflex1",
            FLEX1 => "flex1",
            _ => "unknown",
        }
    }
}
