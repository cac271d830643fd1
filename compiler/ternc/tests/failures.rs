//! Compile-time diagnostics and run-time errors through the driver.

#![allow(clippy::unwrap_used, clippy::expect_used, reason = "Tests can panic")]

use pretty_assertions::assert_eq;
use tern_bytecode::GenOptions;
use tern_diagnostic::queue::DiagnosticConfig;
use tern_diagnostic::ErrorCode;
use tern_ir::{AstBuilder, NodeId, Span};
use tern_vm::{ArithOp, NativeError, UnavailableBackend, VmConfig, VmError, VmErrorKind};
use ternc::{compile, run, CompileFailure, CompilerConfig, RunError};

fn compile_err(
    mut b: AstBuilder,
    items: &[NodeId],
    source: &str,
    config: &CompilerConfig,
) -> CompileFailure {
    let module = b.module(items);
    let mut ast = b.finish();
    compile(&mut ast, module, source, config).unwrap_err()
}

fn codes(failure: &CompileFailure) -> Vec<ErrorCode> {
    failure.diagnostics.iter().map(|d| d.code).collect()
}

fn run_err(mut b: AstBuilder, items: &[NodeId], config: &CompilerConfig) -> VmError {
    let module = b.module(items);
    let mut ast = b.finish();
    match run(&mut ast, module, "", config, UnavailableBackend) {
        Err(RunError::Vm(err)) => err,
        other => panic!("expected a run-time error, got {other:?}"),
    }
}

#[test]
fn undeclared_identifier_points_at_the_identifier() {
    // x := y
    let source = "x := y";
    let mut b = AstBuilder::new();
    let y = b.at(5, 6).ident("y");
    let x = b.at(0, 6).var("x", y);

    let failure = compile_err(b, &[x], source, &CompilerConfig::default());
    assert_eq!(codes(&failure), vec![ErrorCode::E2001]);
    let diag = &failure.diagnostics[0];
    assert_eq!(diag.primary_span(), Some(Span::new(5, 6)));
    assert!(diag.message.contains("`y`"), "{}", diag.message);
    assert_eq!(failure.errors().count(), 1);
}

#[test]
fn use_before_declaration_names_the_later_declaration() {
    // a := b; b := 1
    let source = "a := b; b := 1";
    let mut b = AstBuilder::new();
    let b_ref = b.at(5, 6).ident("b");
    let a = b.at(0, 6).var("a", b_ref);
    let one = b.at(13, 14).number("1");
    let b_decl = b.at(8, 14).var("b", one);

    let failure = compile_err(b, &[a, b_decl], source, &CompilerConfig::default());
    let diag = &failure.diagnostics[0];
    assert_eq!(diag.code, ErrorCode::E2001);
    assert_eq!(diag.labels.len(), 2);
    assert_eq!(diag.notes.len(), 1);
}

#[test]
fn errors_on_one_line_are_collapsed() {
    // p + q
    let source = "p + q";
    let build = || {
        let mut b = AstBuilder::new();
        let p = b.at(0, 1).ident("p");
        let q = b.at(4, 5).ident("q");
        let sum = b.add(p, q);
        let stmt = b.expr_stmt(sum);
        (b, stmt)
    };

    let (b, stmt) = build();
    let deduplicated = compile_err(b, &[stmt], source, &CompilerConfig::default());
    assert_eq!(codes(&deduplicated), vec![ErrorCode::E2001]);

    let (b, stmt) = build();
    let everything = compile_err(b, &[stmt], source, &CompilerConfig::unlimited());
    assert_eq!(codes(&everything), vec![ErrorCode::E2001, ErrorCode::E2001]);
    assert_eq!(everything.diagnostics[0].primary_span(), Some(Span::new(0, 1)));
}

#[test]
fn error_limit_ends_with_a_summary() {
    // a\nb\nc on three lines
    let source = "a\nb\nc";
    let mut b = AstBuilder::new();
    let mut stmts = Vec::new();
    for (name, at) in [("a", 0), ("b", 2), ("c", 4)] {
        let ident = b.at(at, at + 1).ident(name);
        stmts.push(b.expr_stmt(ident));
    }
    let config = CompilerConfig {
        diagnostics: DiagnosticConfig {
            error_limit: 2,
            deduplicate: true,
        },
        ..CompilerConfig::default()
    };

    let failure = compile_err(b, &stmts, source, &config);
    assert_eq!(
        codes(&failure),
        vec![ErrorCode::E2001, ErrorCode::E2001, ErrorCode::E9002]
    );
}

#[test]
fn generation_is_skipped_after_type_errors() {
    // x : uint8 = 1; y := -(1 as int8) + x
    let mut b = AstBuilder::new();
    let ty = b.type_name("uint8");
    let one = b.number("1");
    let x = b.var_typed("x", Some(ty), Some(one));
    let one_again = b.number("1");
    let int8 = b.type_name("int8");
    let cast = b.cast(one_again, int8);
    let neg = b.neg(cast);
    let x_ref = b.ident("x");
    let sum = b.add(neg, x_ref);
    let y = b.var("y", sum);

    let failure = compile_err(b, &[x, y], "", &CompilerConfig::default());
    assert_eq!(codes(&failure), vec![ErrorCode::E3001]);
}

#[test]
fn register_exhaustion_is_reported_as_a_diagnostic() {
    // 1 + 2 + 3 needs five registers.
    let mut b = AstBuilder::new();
    let (one, two, three) = (b.number("1"), b.number("2"), b.number("3"));
    let inner = b.add(one, two);
    let outer = b.add(inner, three);
    let stmt = b.expr_stmt(outer);
    let config = CompilerConfig {
        codegen: GenOptions { register_limit: 3 },
        ..CompilerConfig::default()
    };

    let failure = compile_err(b, &[stmt], "", &config);
    assert_eq!(codes(&failure), vec![ErrorCode::E5001]);
}

#[test]
fn division_by_zero_at_run_time() {
    // 1 / 0
    let mut b = AstBuilder::new();
    let (one, zero) = (b.number("1"), b.number("0"));
    let quotient = b.div(one, zero);
    let stmt = b.expr_stmt(quotient);

    assert_eq!(
        run_err(b, &[stmt], &CompilerConfig::default()).kind,
        VmErrorKind::DivisionByZero
    );
}

#[test]
fn narrow_integers_overflow() {
    // x : int8 = 127; x + 1
    let mut b = AstBuilder::new();
    let ty = b.type_name("int8");
    let max = b.number("127");
    let x = b.var_typed("x", Some(ty), Some(max));
    let x_ref = b.ident("x");
    let one = b.number("1");
    let sum = b.add(x_ref, one);
    let stmt = b.expr_stmt(sum);

    assert_eq!(
        run_err(b, &[x, stmt], &CompilerConfig::default()).kind,
        VmErrorKind::IntegerOverflow {
            op: ArithOp::Add,
            kind: tern_bytecode::NumKind::I8,
        }
    );
}

#[test]
fn runaway_recursion_is_stopped() {
    // f :: proc { f() }; f()
    let mut b = AstBuilder::new();
    let inner_callee = b.ident("f");
    let inner_call = b.call(inner_callee);
    let inner_stmt = b.expr_stmt(inner_call);
    let body = b.block(&[inner_stmt]);
    let proc_expr = b.procedure(None, body);
    let f = b.constant("f", proc_expr);
    let callee = b.ident("f");
    let call = b.call(callee);
    let stmt = b.expr_stmt(call);
    let config = CompilerConfig {
        vm: VmConfig { max_call_depth: 32 },
        ..CompilerConfig::default()
    };

    assert_eq!(
        run_err(b, &[f, stmt], &config).kind,
        VmErrorKind::CallDepthExceeded { limit: 32 }
    );
}

#[test]
fn native_blocks_need_a_backend() {
    // a := 1; native "id" (a)
    let mut b = AstBuilder::new();
    let one = b.at(5, 6).number("1");
    let a = b.at(0, 6).var("a", one);
    let native = b.at(8, 23).native_block("id", &[("a", 0)], None);
    let stmt = b.expr_stmt(native);

    let err = run_err(b, &[a, stmt], &CompilerConfig::default());
    assert_eq!(
        err.kind,
        VmErrorKind::Native(NativeError::Unavailable { code: "id".into() })
    );
    assert_eq!(err.procedure, "start");
    assert_eq!(err.span, Span::new(8, 23));
}

#[test]
fn procedure_variables_cannot_be_reassigned() {
    // g := proc int64 { 1 }; h :: proc int64 { 2 }; g = h
    let source = "g := proc int64 { 1 }; h :: proc int64 { 2 }; g = h";
    let mut b = AstBuilder::new();
    let (g, h) = procedure_pair(&mut b);
    let target = b.at(46, 47).ident("g");
    let value = b.at(50, 51).ident("h");
    let assign = b.at(46, 51).assign(target, value);

    let failure = compile_err(b, &[g, h, assign], source, &CompilerConfig::default());
    assert_eq!(codes(&failure), vec![ErrorCode::E3009]);
    assert_eq!(failure.diagnostics[0].primary_span(), Some(Span::new(46, 47)));
}

#[test]
fn procedure_variables_cannot_be_reassigned_in_parallel() {
    // g := proc int64 { 1 }; h :: proc int64 { 2 }; x := 0; g, x = h, 1
    let mut b = AstBuilder::new();
    let (g, h) = procedure_pair(&mut b);
    let zero = b.number("0");
    let x = b.var("x", zero);
    let (tg, tx) = (b.ident("g"), b.ident("x"));
    let vh = b.ident("h");
    let one = b.number("1");
    let assign = b.parallel_assign(&[tg, tx], &[vh, one]);

    let failure = compile_err(b, &[g, h, x, assign], "", &CompilerConfig::default());
    assert_eq!(codes(&failure), vec![ErrorCode::E3009]);
}

/// `g := proc int64 { 1 }` and `h :: proc int64 { 2 }`.
fn procedure_pair(b: &mut AstBuilder) -> (NodeId, NodeId) {
    fn returning(b: &mut AstBuilder, digit: &str) -> NodeId {
        let ret = b.type_name("int64");
        let value = b.number(digit);
        let stmt = b.expr_stmt(value);
        let body = b.block(&[stmt]);
        b.procedure(Some(ret), body)
    }
    let g_proc = returning(b, "1");
    let g = b.var("g", g_proc);
    let h_proc = returning(b, "2");
    let h = b.constant("h", h_proc);
    (g, h)
}
