//! Tree model for the Tern toolchain.
//!
//! The parser hands the middle end an [`Ast`]: a flat arena of [`Node`]s
//! addressed by [`NodeId`], with child lists stored as [`NodeRange`] slices
//! into a side list. Parent links are plain indices written by the
//! [`section`] indexer, so the upward relation never owns anything.
//!
//! Downstream passes iterate a [`Section`], the pre-order listing of one
//! subtree, instead of recursing over the arena themselves.

mod ast;
mod interner;
mod name;
mod node_id;
pub mod section;
mod span;

pub use ast::{Ast, AstBuilder, Children, InfixOp, Literal, Node, NodeKind, PrefixOp};
pub use interner::StringInterner;
pub use name::Name;
pub use node_id::{NodeId, NodeRange};
pub use section::{index, Section};
pub use span::Span;
