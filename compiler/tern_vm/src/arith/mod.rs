//! Word arithmetic per [`NumKind`].
//!
//! Integer results are computed exactly in `i128` and must fit the kind's
//! width. Floats follow IEEE-754. Conversions have the semantics of Rust's
//! `as`: integers wrap, floats saturate into integers, `f64` rounds into
//! `f32`.

use std::fmt;

use tern_bytecode::{NumKind, Word};

use crate::VmErrorKind;

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Neg,
}

impl fmt::Display for ArithOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ArithOp::Add => "addition",
            ArithOp::Sub => "subtraction",
            ArithOp::Mul => "multiplication",
            ArithOp::Div => "division",
            ArithOp::Neg => "negation",
        })
    }
}

/// `a op b` with both words read as `kind`.
pub fn binary(op: ArithOp, kind: NumKind, a: Word, b: Word) -> Result<Word, VmErrorKind> {
    match kind {
        NumKind::F32 => {
            let (x, y) = (a.as_f32(), b.as_f32());
            Ok(Word::from_f32(float_op(op, x, y)))
        }
        NumKind::F64 => {
            let (x, y) = (a.as_f64(), b.as_f64());
            Ok(Word::from_f64(float_op(op, x, y)))
        }
        _ => {
            let (x, y) = (integer(kind, a), integer(kind, b));
            let exact = match op {
                ArithOp::Add => x.checked_add(y),
                ArithOp::Sub => x.checked_sub(y),
                ArithOp::Mul => x.checked_mul(y),
                ArithOp::Div if y == 0 => return Err(VmErrorKind::DivisionByZero),
                ArithOp::Div => x.checked_div(y),
                ArithOp::Neg => x.checked_neg(),
            };
            checked_word(op, kind, exact)
        }
    }
}

/// `-a` with `a` read as `kind`.
pub fn negate(kind: NumKind, a: Word) -> Result<Word, VmErrorKind> {
    match kind {
        NumKind::F32 => Ok(Word::from_f32(-a.as_f32())),
        NumKind::F64 => Ok(Word::from_f64(-a.as_f64())),
        _ => checked_word(ArithOp::Neg, kind, integer(kind, a).checked_neg()),
    }
}

fn float_op<F>(op: ArithOp, x: F, y: F) -> F
where
    F: std::ops::Add<Output = F>
        + std::ops::Sub<Output = F>
        + std::ops::Mul<Output = F>
        + std::ops::Div<Output = F>
        + std::ops::Neg<Output = F>,
{
    match op {
        ArithOp::Add => x + y,
        ArithOp::Sub => x - y,
        ArithOp::Mul => x * y,
        ArithOp::Div => x / y,
        ArithOp::Neg => -x,
    }
}

fn checked_word(op: ArithOp, kind: NumKind, exact: Option<i128>) -> Result<Word, VmErrorKind> {
    exact
        .filter(|&v| fits(kind, v))
        .map(|v| integer_word(kind, v))
        .ok_or(VmErrorKind::IntegerOverflow { op, kind })
}

/// Exact value of an integer word, truncated to the kind's width first.
#[expect(
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    reason = "narrowing to the kind's width is the point"
)]
fn integer(kind: NumKind, w: Word) -> i128 {
    let bits = w.bits();
    match kind {
        NumKind::I8 => i128::from(bits as i8),
        NumKind::I16 => i128::from(bits as i16),
        NumKind::I32 => i128::from(bits as i32),
        NumKind::I64 => i128::from(bits as i64),
        NumKind::U8 => i128::from(bits as u8),
        NumKind::U16 => i128::from(bits as u16),
        NumKind::U32 => i128::from(bits as u32),
        NumKind::U64 => i128::from(bits),
        NumKind::F32 | NumKind::F64 => unreachable!("integer view of a float kind"),
    }
}

fn fits(kind: NumKind, v: i128) -> bool {
    let bits = kind.bits();
    if kind.is_signed() {
        let half = 1i128 << (bits - 1);
        (-half..half).contains(&v)
    } else {
        (0..1i128 << bits).contains(&v)
    }
}

/// Canonical word of an in-range integer.
#[expect(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    reason = "callers check the range first"
)]
fn integer_word(kind: NumKind, v: i128) -> Word {
    if kind.is_signed() {
        Word::from_i64(v as i64)
    } else {
        Word::from_u64(v as u64)
    }
}

/// A decoded word.
#[derive(Copy, Clone, Debug)]
enum Num {
    Signed(i64),
    Unsigned(u64),
    F32(f32),
    F64(f64),
}

impl Num {
    #[expect(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        reason = "integer kinds read their own width"
    )]
    fn decode(kind: NumKind, w: Word) -> Num {
        match kind {
            NumKind::F32 => Num::F32(w.as_f32()),
            NumKind::F64 => Num::F64(w.as_f64()),
            k if k.is_signed() => Num::Signed(integer(k, w) as i64),
            k => Num::Unsigned(integer(k, w) as u64),
        }
    }
}

macro_rules! cast {
    ($num:expr, $ty:ty) => {
        match $num {
            Num::Signed(v) => v as $ty,
            Num::Unsigned(v) => v as $ty,
            Num::F32(v) => v as $ty,
            Num::F64(v) => v as $ty,
        }
    };
}

/// Reinterpret `w` from `from` to `to` with `as` semantics.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_possible_wrap,
    clippy::cast_precision_loss,
    clippy::cast_lossless,
    clippy::unnecessary_cast,
    reason = "conversions follow `as`"
)]
pub fn convert(from: NumKind, to: NumKind, w: Word) -> Word {
    let num = Num::decode(from, w);
    match to {
        NumKind::I8 => Word::from_i64(i64::from(cast!(num, i8))),
        NumKind::I16 => Word::from_i64(i64::from(cast!(num, i16))),
        NumKind::I32 => Word::from_i64(i64::from(cast!(num, i32))),
        NumKind::I64 => Word::from_i64(cast!(num, i64)),
        NumKind::U8 => Word::from_u64(u64::from(cast!(num, u8))),
        NumKind::U16 => Word::from_u64(u64::from(cast!(num, u16))),
        NumKind::U32 => Word::from_u64(u64::from(cast!(num, u32))),
        NumKind::U64 => Word::from_u64(cast!(num, u64)),
        NumKind::F32 => Word::from_f32(cast!(num, f32)),
        NumKind::F64 => Word::from_f64(cast!(num, f64)),
    }
}
