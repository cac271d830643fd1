//! Semantic passes over an indexed [`Section`](tern_ir::Section).
//!
//! - [`resolve`] binds every identifier to the declaration it names.
//! - [`infer`] assigns a [`Type`] to every node, parsing numeric literals
//!   and checking assignments, casts and calls along the way.
//!
//! Both passes return their findings as diagnostics next to their result;
//! neither aborts on user errors.

mod infer;
mod lattice;
mod resolve;
mod ty;

pub use infer::{infer, LiteralValue, TypeTable};
pub use lattice::{can_assign, can_cast, prefix_type, promote};
pub use resolve::{procedure_target, resolve, Resolution};
pub use ty::{Type, TypeFlags};
