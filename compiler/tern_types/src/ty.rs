//! The type universe.

use std::fmt;

use bitflags::bitflags;

/// Types assigned by inference.
///
/// Besides the concrete builtins there are *relaxed* types, produced by
/// literals before their use fixes a width, and error sentinels, which
/// absorb every rule they flow into.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Type {
    Text,
    Char,
    Float32,
    Float64,
    Int8,
    Int16,
    Int32,
    Int64,
    /// Platform-native signed integer.
    Int,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    /// Platform-native unsigned integer.
    Uint,
    Empty,
    /// Value of a procedure-valued expression.
    Procedure,

    // Relaxed
    /// Decimal integer literal: fits any numeric kind.
    InferredNumber,
    InferredFloat,
    InferredSigned,
    InferredUnsigned,

    // Errors
    /// Not visited yet.
    Uninferred,
    /// Name lookup failed.
    Unresolved,
    /// No valid promotion or conversion exists.
    Uncastable,
}

bitflags! {
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
    pub struct TypeFlags: u8 {
        const NUMERIC = 1 << 0;
        const FLOAT = 1 << 1;
        const SIGNED = 1 << 2;
        const UNSIGNED = 1 << 3;
        const RELAXED = 1 << 4;
        const ERROR = 1 << 5;
    }
}

impl Type {
    /// Every type, for exhaustive tests and property generators.
    pub const ALL: [Type; 23] = [
        Type::Text,
        Type::Char,
        Type::Float32,
        Type::Float64,
        Type::Int8,
        Type::Int16,
        Type::Int32,
        Type::Int64,
        Type::Int,
        Type::Uint8,
        Type::Uint16,
        Type::Uint32,
        Type::Uint64,
        Type::Uint,
        Type::Empty,
        Type::Procedure,
        Type::InferredNumber,
        Type::InferredFloat,
        Type::InferredSigned,
        Type::InferredUnsigned,
        Type::Uninferred,
        Type::Unresolved,
        Type::Uncastable,
    ];

    pub const fn flags(self) -> TypeFlags {
        const INT: TypeFlags = TypeFlags::NUMERIC.union(TypeFlags::SIGNED);
        const UINT: TypeFlags = TypeFlags::NUMERIC.union(TypeFlags::UNSIGNED);
        const FLOAT: TypeFlags = TypeFlags::NUMERIC.union(TypeFlags::FLOAT);
        match self {
            Type::Text | Type::Char | Type::Empty | Type::Procedure => TypeFlags::empty(),
            Type::Float32 | Type::Float64 => FLOAT,
            Type::Int8 | Type::Int16 | Type::Int32 | Type::Int64 | Type::Int => INT,
            Type::Uint8 | Type::Uint16 | Type::Uint32 | Type::Uint64 | Type::Uint => UINT,
            Type::InferredNumber => TypeFlags::NUMERIC.union(TypeFlags::RELAXED),
            Type::InferredFloat => FLOAT.union(TypeFlags::RELAXED),
            Type::InferredSigned => INT.union(TypeFlags::RELAXED),
            Type::InferredUnsigned => UINT.union(TypeFlags::RELAXED),
            Type::Uninferred | Type::Unresolved | Type::Uncastable => TypeFlags::ERROR,
        }
    }

    #[inline]
    pub const fn is_error(self) -> bool {
        self.flags().contains(TypeFlags::ERROR)
    }

    #[inline]
    pub const fn is_numeric(self) -> bool {
        self.flags().contains(TypeFlags::NUMERIC)
    }

    #[inline]
    pub const fn is_float(self) -> bool {
        self.flags().contains(TypeFlags::FLOAT)
    }

    #[inline]
    pub const fn is_signed(self) -> bool {
        self.flags().contains(TypeFlags::SIGNED)
    }

    #[inline]
    pub const fn is_unsigned(self) -> bool {
        self.flags().contains(TypeFlags::UNSIGNED)
    }

    #[inline]
    pub const fn is_relaxed(self) -> bool {
        self.flags().contains(TypeFlags::RELAXED)
    }

    /// Integer of either signedness, relaxed or concrete.
    #[inline]
    pub const fn is_integer(self) -> bool {
        self.is_numeric() && !self.is_float()
    }

    /// Rank in the promotion width order. Only meaningful for numerics.
    pub const fn width_rank(self) -> u8 {
        match self {
            Type::InferredNumber => 0,
            Type::InferredFloat | Type::InferredSigned | Type::InferredUnsigned => 1,
            Type::Int8 | Type::Uint8 => 2,
            Type::Int16 | Type::Uint16 => 3,
            Type::Int32 | Type::Uint32 | Type::Float32 => 4,
            Type::Int64 | Type::Uint64 | Type::Float64 => 5,
            Type::Int | Type::Uint => 6,
            _ => 0,
        }
    }

    /// The signed type of the same width as an unsigned one.
    pub const fn to_signed(self) -> Type {
        match self {
            Type::Uint8 => Type::Int8,
            Type::Uint16 => Type::Int16,
            Type::Uint32 => Type::Int32,
            Type::Uint64 => Type::Int64,
            Type::Uint => Type::Int,
            Type::InferredUnsigned | Type::InferredNumber => Type::InferredSigned,
            other => other,
        }
    }

    /// Builtin type spelled `name` in source.
    pub fn from_name(name: &str) -> Option<Type> {
        Some(match name {
            "text" => Type::Text,
            "char" => Type::Char,
            "float32" => Type::Float32,
            "float64" => Type::Float64,
            "int8" => Type::Int8,
            "int16" => Type::Int16,
            "int32" => Type::Int32,
            "int64" => Type::Int64,
            "int" => Type::Int,
            "uint8" => Type::Uint8,
            "uint16" => Type::Uint16,
            "uint32" => Type::Uint32,
            "uint64" => Type::Uint64,
            "uint" => Type::Uint,
            "empty" => Type::Empty,
            _ => return None,
        })
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Type::Text => "text",
            Type::Char => "char",
            Type::Float32 => "float32",
            Type::Float64 => "float64",
            Type::Int8 => "int8",
            Type::Int16 => "int16",
            Type::Int32 => "int32",
            Type::Int64 => "int64",
            Type::Int => "int",
            Type::Uint8 => "uint8",
            Type::Uint16 => "uint16",
            Type::Uint32 => "uint32",
            Type::Uint64 => "uint64",
            Type::Uint => "uint",
            Type::Empty => "empty",
            Type::Procedure => "procedure",
            Type::InferredNumber => "{number}",
            Type::InferredFloat => "{float}",
            Type::InferredSigned => "{signed}",
            Type::InferredUnsigned => "{unsigned}",
            Type::Uninferred => "<uninferred>",
            Type::Unresolved => "<unresolved>",
            Type::Uncastable => "<uncastable>",
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
