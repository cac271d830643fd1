use tern_diagnostic::{Diagnostic, ErrorCode};
use tern_ir::Span;
use thiserror::Error;

/// A resource limit the generator cannot work around. Generation stops at
/// the first one.
#[derive(Clone, Eq, PartialEq, Debug, Error)]
pub enum GenError {
    #[error("procedure `{procedure}` needs more than {limit} registers")]
    RegisterSpaceExhausted {
        procedure: String,
        limit: u16,
        span: Span,
    },
    #[error("program needs more than {} procedures", u16::MAX)]
    ProcedureSpaceExhausted { span: Span },
    #[error("constant pool exceeded {} entries", u32::MAX)]
    ConstantPoolExhausted { span: Span },
    #[error("metadata table exceeded {} entries", u32::MAX)]
    MetadataExhausted { span: Span },
}

impl GenError {
    /// Source location that asked for the missing resource.
    pub fn span(&self) -> Span {
        match self {
            GenError::RegisterSpaceExhausted { span, .. }
            | GenError::ProcedureSpaceExhausted { span }
            | GenError::ConstantPoolExhausted { span }
            | GenError::MetadataExhausted { span } => *span,
        }
    }

    #[cold]
    pub fn to_diagnostic(&self) -> Diagnostic {
        let code = match self {
            GenError::RegisterSpaceExhausted { .. } => ErrorCode::E5001,
            GenError::ProcedureSpaceExhausted { .. }
            | GenError::ConstantPoolExhausted { .. }
            | GenError::MetadataExhausted { .. } => ErrorCode::E5002,
        };
        let mut diag = Diagnostic::error(code)
            .with_message(self.to_string())
            .with_label(self.span(), "while generating this");
        if let GenError::RegisterSpaceExhausted { .. } = self {
            diag = diag.with_note("registers are never reused; split the procedure");
        }
        diag
    }
}
