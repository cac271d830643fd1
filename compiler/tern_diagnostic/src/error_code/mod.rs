use std::fmt;

/// Diagnostic codes. The first digit names the phase that reports it:
///
/// - E2xxx: name resolution
/// - E3xxx: type inference and checking
/// - E4xxx: native blocks
/// - E5xxx: resource limits in code generation
/// - E9xxx: reporting limits
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, PartialOrd, Ord)]
pub enum ErrorCode {
    // Resolution (E2xxx)
    /// No visible declaration for an identifier
    E2001,
    /// Unknown type name
    E2002,

    // Types (E3xxx)
    /// Operand or value types cannot be combined
    E3001,
    /// Prefix operator applied to a non-numeric operand
    E3002,
    /// Cast between unrelated types
    E3003,
    /// Declaration with neither a type nor an initializer
    E3004,
    /// Assignment to a constant
    E3005,
    /// Parallel assignment with unequal sides
    E3006,
    /// Call of something that is not a procedure
    E3007,
    /// Malformed or out-of-range numeric literal
    E3008,
    /// Construct that has no lowering
    E3009,
    /// Procedure reads a value owned by another procedure
    E3010,

    // Native blocks (E4xxx)
    /// Native block binding is not a numeric or char value
    E4001,
    /// Native block has more inputs than the calling convention allows
    E4002,

    // Resource limits (E5xxx)
    /// Register space of a procedure exhausted
    E5001,
    /// Procedure, constant or metadata index space exhausted
    E5002,

    // Driver (E9xxx)
    /// Too many errors
    E9002,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::E2001 => "E2001",
            ErrorCode::E2002 => "E2002",
            ErrorCode::E3001 => "E3001",
            ErrorCode::E3002 => "E3002",
            ErrorCode::E3003 => "E3003",
            ErrorCode::E3004 => "E3004",
            ErrorCode::E3005 => "E3005",
            ErrorCode::E3006 => "E3006",
            ErrorCode::E3007 => "E3007",
            ErrorCode::E3008 => "E3008",
            ErrorCode::E3009 => "E3009",
            ErrorCode::E3010 => "E3010",
            ErrorCode::E4001 => "E4001",
            ErrorCode::E4002 => "E4002",
            ErrorCode::E5001 => "E5001",
            ErrorCode::E5002 => "E5002",
            ErrorCode::E9002 => "E9002",
        }
    }

    pub fn is_resolution_error(&self) -> bool {
        matches!(self, ErrorCode::E2001 | ErrorCode::E2002)
    }

    pub fn is_type_error(&self) -> bool {
        matches!(
            self,
            ErrorCode::E3001
                | ErrorCode::E3002
                | ErrorCode::E3003
                | ErrorCode::E3004
                | ErrorCode::E3005
                | ErrorCode::E3006
                | ErrorCode::E3007
                | ErrorCode::E3008
                | ErrorCode::E3009
                | ErrorCode::E3010
        )
    }

    pub fn is_limit_error(&self) -> bool {
        matches!(self, ErrorCode::E5001 | ErrorCode::E5002)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
