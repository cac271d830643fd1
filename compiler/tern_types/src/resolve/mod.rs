//! Name resolution.
//!
//! One linear scan over a section's pre-order listing. The scope of each
//! node follows from its parent: a scope-capable parent is the scope,
//! otherwise the parent's own scope. A declaration becomes visible once the
//! scan leaves its subtree, so `x := x + 1` reads an outer `x`; constants
//! bound to procedures are visible immediately so they can recurse.

use rustc_hash::FxHashMap;
use tern_diagnostic::{Diagnostic, ErrorCode};
use tern_ir::{Ast, Name, NodeId, NodeKind, Section};

/// Identifier bindings and the scope table of one section.
#[derive(Debug, Default)]
pub struct Resolution {
    /// Identifier node to declaration node.
    bindings: FxHashMap<NodeId, NodeId>,
    /// `(scope, name)` to the declaration visible in that scope. Includes the
    /// entries of every enclosing section.
    scopes: FxHashMap<(NodeId, Name), NodeId>,
    /// `scopes` entries in the order they were made, with the pre-order
    /// position each became visible at. Inherited entries are at 0.
    declared: Vec<Declared>,
    /// Pre-order position of every scope node of the section.
    scope_positions: FxHashMap<NodeId, usize>,
    diagnostics: Vec<Diagnostic>,
}

impl Resolution {
    /// Declaration an identifier refers to, if it resolved.
    #[inline]
    pub fn declaration(&self, ident: NodeId) -> Option<NodeId> {
        self.bindings.get(&ident).copied()
    }

    /// Declaration of `name` made directly in `scope`.
    pub fn declared_in(&self, scope: NodeId, name: Name) -> Option<NodeId> {
        self.scopes.get(&(scope, name)).copied()
    }

    pub fn binding_count(&self) -> usize {
        self.bindings.len()
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }

    fn declare(&mut self, scope: NodeId, name: Name, decl: NodeId, at: usize) {
        self.scopes.insert((scope, name), decl);
        self.declared.push(Declared {
            scope,
            name,
            decl,
            at,
        });
    }

    /// The entries of `outer` visible where `root` sits in its section.
    /// A root outside that section sees all of them.
    fn inherit(&mut self, outer: &Resolution, root: NodeId) {
        let cutoff = outer.scope_positions.get(&root).copied().unwrap_or(usize::MAX);
        for entry in outer.declared.iter().filter(|d| d.at <= cutoff) {
            self.declare(entry.scope, entry.name, entry.decl, 0);
        }
    }
}

#[derive(Debug)]
struct Declared {
    scope: NodeId,
    name: Name,
    decl: NodeId,
    at: usize,
}

struct Pending {
    end: usize,
    scope: NodeId,
    name: Name,
    decl: NodeId,
}

struct Miss {
    ident: NodeId,
    scope: NodeId,
    name: Name,
}

/// Resolve every identifier in `section`.
///
/// `outer` is the resolution of the enclosing section when `section` is a
/// nested unit indexed with a parent. Its declarations are visible when
/// they precede the nested root in the enclosing section.
///
/// # Panics
/// Panics if the section root is not a scope.
pub fn resolve(ast: &Ast, section: &Section<'_>, outer: Option<&Resolution>) -> Resolution {
    let root = section.root();
    assert!(
        ast.is_scope(root),
        "resolution requires a scope-capable section root, got {:?}",
        ast.kind(root)
    );

    let mut res = Resolution::default();
    if let Some(outer) = outer {
        res.inherit(outer, root);
    }
    let searches_outer = outer.is_some();
    let mut scope_of = vec![NodeId::INVALID; ast.len()];
    let mut pending: Vec<Pending> = Vec::new();
    let mut misses: Vec<Miss> = Vec::new();

    for (pos, &id) in section.nodes().iter().enumerate() {
        while pending.last().is_some_and(|p| p.end <= pos) {
            if let Some(p) = pending.pop() {
                res.declare(p.scope, p.name, p.decl, p.end);
            }
        }
        if ast.is_scope(id) {
            res.scope_positions.insert(id, pos);
        }

        let scope = if id == root {
            root
        } else {
            let parent = ast.parent(id);
            if ast.is_scope(parent) {
                parent
            } else {
                scope_of[parent.index()]
            }
        };
        scope_of[id.index()] = scope;

        match *ast.kind(id) {
            NodeKind::ImmutableDecl { name, definition }
                if matches!(ast.kind(ast.ungroup(definition)), NodeKind::Procedure { .. }) =>
            {
                res.declare(scope, name, id, pos);
            }
            NodeKind::ImmutableDecl { name, .. } | NodeKind::MutableDecl { name, .. } => {
                pending.push(Pending {
                    end: section.subtree_end(pos),
                    scope,
                    name,
                    decl: id,
                });
            }
            NodeKind::Ident(name) => {
                match lookup(ast, &res.scopes, scope, name, root, searches_outer) {
                    Some(decl) => {
                        res.bindings.insert(id, decl);
                    }
                    None => misses.push(Miss {
                        ident: id,
                        scope,
                        name,
                    }),
                }
            }
            _ => {}
        }
    }

    while let Some(p) = pending.pop() {
        res.declare(p.scope, p.name, p.decl, p.end);
    }

    for miss in misses {
        let text = ast.text(miss.name);
        let mut diag = Diagnostic::error(ErrorCode::E2001)
            .with_message(format!("cannot find `{text}` in this scope"))
            .with_label(ast.span(miss.ident), "not found in this scope");
        if let Some(later) = lookup(ast, &res.scopes, miss.scope, miss.name, root, searches_outer) {
            diag = diag
                .with_secondary_label(ast.span(later), format!("`{text}` is declared here"))
                .with_note("names must be declared before they are used");
        }
        res.diagnostics.push(diag);
    }

    tracing::debug!(
        root = root.raw(),
        bindings = res.bindings.len(),
        unresolved = res.diagnostics.len(),
        "resolved section"
    );
    res
}

/// Procedure node a callee expression statically denotes: a procedure
/// literal, or an identifier bound to a declaration initialized with one.
pub fn procedure_target(ast: &Ast, resolution: &Resolution, callee: NodeId) -> Option<NodeId> {
    let expr = ast.ungroup(callee);
    match *ast.kind(expr) {
        NodeKind::Procedure { .. } => Some(expr),
        NodeKind::Ident(_) => {
            let decl = resolution.declaration(expr)?;
            match *ast.kind(decl) {
                NodeKind::ImmutableDecl { definition, .. } => {
                    procedure_target(ast, resolution, definition)
                }
                NodeKind::MutableDecl { init, .. } => {
                    procedure_target(ast, resolution, init.valid()?)
                }
                _ => None,
            }
        }
        _ => None,
    }
}

/// Search `scope` and each enclosing scope, innermost first. The walk stops
/// at the section root unless enclosing sections were supplied.
fn lookup(
    ast: &Ast,
    scopes: &FxHashMap<(NodeId, Name), NodeId>,
    mut scope: NodeId,
    name: Name,
    root: NodeId,
    searches_outer: bool,
) -> Option<NodeId> {
    loop {
        if let Some(&decl) = scopes.get(&(scope, name)) {
            return Some(decl);
        }
        if scope == root && !searches_outer {
            return None;
        }
        scope = ast.enclosing_scope(scope).valid()?;
    }
}
