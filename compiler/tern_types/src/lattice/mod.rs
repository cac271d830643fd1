//! Numeric promotion lattice.
//!
//! All rules are total over [`Type`] and let error sentinels through
//! unchanged, so an error reported once is never reported again downstream.

use tern_ir::PrefixOp;

use crate::Type;

/// Result type of `left op right` for an arithmetic infix operator.
///
/// Symmetric except that the left operand wins when both are errors.
/// Signed combined with unsigned is [`Type::Uncastable`] in both orders.
pub fn promote(left: Type, right: Type) -> Type {
    if left.is_error() {
        return left;
    }
    if right.is_error() {
        return right;
    }
    if !left.is_numeric() || !right.is_numeric() {
        return Type::Uncastable;
    }

    if left.is_float() || right.is_float() {
        return match (left.is_float(), right.is_float()) {
            (true, true) => wider(left, right),
            (true, false) => left,
            _ => right,
        };
    }

    if left.is_signed() || right.is_signed() {
        return match (left, right) {
            (l, r) if l.is_signed() && r.is_signed() => wider(l, r),
            (s, Type::InferredNumber) | (Type::InferredNumber, s) => s,
            _ => Type::Uncastable,
        };
    }

    // Both unsigned, or one side is the generic number literal type.
    match (left, right) {
        (u, Type::InferredNumber) if u.is_unsigned() => u,
        (Type::InferredNumber, u) if u.is_unsigned() => u,
        (l, r) => wider(l, r),
    }
}

fn wider(a: Type, b: Type) -> Type {
    if b.width_rank() > a.width_rank() {
        b
    } else {
        a
    }
}

/// Result type of a sign operator. Unsigned operands become signed of the
/// same width; anything non-numeric is [`Type::Uncastable`].
pub fn prefix_type(_op: PrefixOp, operand: Type) -> Type {
    match operand {
        t if t.is_error() => t,
        Type::InferredNumber | Type::InferredUnsigned => Type::InferredSigned,
        t if t.is_signed() || t.is_float() => t,
        t if t.is_unsigned() => t.to_signed(),
        _ => Type::Uncastable,
    }
}

/// Whether a value of type `src` may be stored into a slot of type `dest`.
///
/// Numeric stores may narrow but never drop a fractional part, and never
/// mix signedness.
pub fn can_assign(dest: Type, src: Type) -> bool {
    if dest.is_error() || src.is_error() || dest == src {
        return true;
    }
    if !dest.is_numeric() || !src.is_numeric() {
        return false;
    }
    if src.is_float() && !dest.is_float() {
        return false;
    }
    promote(dest, src) != Type::Uncastable
}

/// Whether an explicit cast from `from` to `to` exists: between any two
/// numerics, and between `char` and integers.
pub fn can_cast(from: Type, to: Type) -> bool {
    if from.is_error() || to.is_error() || from == to {
        return true;
    }
    match (from, to) {
        (Type::Char, t) | (t, Type::Char) => t.is_integer(),
        (f, t) => f.is_numeric() && t.is_numeric(),
    }
}
