//! Diagnostics for the Tern middle end.
//!
//! Every pass returns its recoverable problems as [`Diagnostic`] values next
//! to its output instead of aborting. The driver funnels them through a
//! [`DiagnosticQueue`](queue::DiagnosticQueue), which assigns line/column
//! positions, collapses repeats on one line and enforces an error limit.
//!
//! Reaching an [`ErrorGuaranteed`] requires having emitted an error, so a
//! failed compilation can always point at what it reported.

mod diagnostic;
mod error_code;
mod guarantee;
pub mod queue;
pub mod span_utils;

pub use diagnostic::{Diagnostic, Label, Severity};
pub use error_code::ErrorCode;
pub use guarantee::ErrorGuaranteed;
