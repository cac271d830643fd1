//! End-to-end evaluation: build a tree, compile it, run it.

#![allow(clippy::unwrap_used, clippy::expect_used, reason = "Tests can panic")]

use pretty_assertions::assert_eq;
use tern_bytecode::{NativeCall, Word};
use tern_ir::{AstBuilder, NodeId};
use tern_vm::{NativeBackend, NativeError, NativeFn, UnavailableBackend};
use ternc::{compile, run, CompilerConfig, Execution};

fn execute_with<B: NativeBackend>(mut b: AstBuilder, items: &[NodeId], backend: B) -> Execution {
    ternc::init_tracing();
    let module = b.module(items);
    let mut ast = b.finish();
    run(&mut ast, module, "", &CompilerConfig::default(), backend).unwrap()
}

fn execute(b: AstBuilder, items: &[NodeId]) -> Execution {
    execute_with(b, items, UnavailableBackend)
}

#[test]
fn integer_expression() {
    // 2 * 3 + 4 / 5 - 6
    let mut b = AstBuilder::new();
    let (n2, n3, n4, n5, n6) = (
        b.number("2"),
        b.number("3"),
        b.number("4"),
        b.number("5"),
        b.number("6"),
    );
    let product = b.mul(n2, n3);
    let quotient = b.div(n4, n5);
    let sum = b.add(product, quotient);
    let diff = b.sub(sum, n6);
    let stmt = b.expr_stmt(diff);

    let result = execute(b, &[stmt]);
    assert_eq!(result.output.value.as_i64(), 0);
}

#[test]
fn float_expression() {
    // 2.0 * 4.0 + 8.0 / 16.0 - 32.0
    let mut b = AstBuilder::new();
    let (a, c, d, e, f) = (
        b.number("2.0"),
        b.number("4.0"),
        b.number("8.0"),
        b.number("16.0"),
        b.number("32.0"),
    );
    let product = b.mul(a, c);
    let quotient = b.div(d, e);
    let sum = b.add(product, quotient);
    let diff = b.sub(sum, f);
    let stmt = b.expr_stmt(diff);

    let result = execute(b, &[stmt]);
    assert_eq!(result.output.value.as_f64(), -23.5);
}

#[test]
fn half_keeps_its_bit_pattern() {
    let mut b = AstBuilder::new();
    let half = b.number("0.5");
    let x = b.var("x", half);

    let result = execute(b, &[x]);
    assert_eq!(result.symbol("x"), Some(Word::from_bits(0.5f64.to_bits())));
}

#[test]
fn parallel_assignment_swaps() {
    // a := 1; b := 2; a, b = b, a
    let mut b = AstBuilder::new();
    let one = b.number("1");
    let a = b.var("a", one);
    let two = b.number("2");
    let b_decl = b.var("b", two);
    let (ta, tb) = (b.ident("a"), b.ident("b"));
    let (vb, va) = (b.ident("b"), b.ident("a"));
    let swap = b.parallel_assign(&[ta, tb], &[vb, va]);

    let result = execute(b, &[a, b_decl, swap]);
    assert_eq!(result.symbol("a"), Some(Word::from_i64(2)));
    assert_eq!(result.symbol("b"), Some(Word::from_i64(1)));
}

#[test]
fn inner_declarations_shadow_outer_ones() {
    // x := 1; { x := 2; x + 10 } x + 100
    let mut b = AstBuilder::new();
    let one = b.number("1");
    let outer = b.var("x", one);
    let two = b.number("2");
    let inner = b.var("x", two);
    let x_inner = b.ident("x");
    let ten = b.number("10");
    let inner_sum = b.add(x_inner, ten);
    let inner_stmt = b.expr_stmt(inner_sum);
    let block = b.block(&[inner, inner_stmt]);
    let x_outer = b.ident("x");
    let hundred = b.number("100");
    let outer_sum = b.add(x_outer, hundred);
    let outer_stmt = b.expr_stmt(outer_sum);

    let result = execute(b, &[outer, block, outer_stmt]);
    assert_eq!(result.output.value.as_i64(), 101);
    assert_eq!(result.symbol("x"), Some(Word::from_i64(1)));
}

#[test]
fn assignment_updates_the_variable() {
    // x := 1; x = x + 41
    let mut b = AstBuilder::new();
    let one = b.number("1");
    let x = b.var("x", one);
    let target = b.ident("x");
    let x_ref = b.ident("x");
    let n = b.number("41");
    let sum = b.add(x_ref, n);
    let assign = b.assign(target, sum);

    let result = execute(b, &[x, assign]);
    assert_eq!(result.symbol("x"), Some(Word::from_i64(42)));
}

#[test]
fn procedures_return_their_last_value() {
    // f :: proc int32 { 7 }; y := f() * 6
    let mut b = AstBuilder::new();
    let ret = b.type_name("int32");
    let seven = b.number("7");
    let body_stmt = b.expr_stmt(seven);
    let body = b.block(&[body_stmt]);
    let proc_expr = b.procedure(Some(ret), body);
    let f = b.constant("f", proc_expr);
    let callee = b.ident("f");
    let call = b.call(callee);
    let six = b.number("6");
    let product = b.mul(call, six);
    let y = b.var("y", product);

    let result = execute(b, &[f, y]);
    assert_eq!(result.symbol("y"), Some(Word::from_i64(42)));
}

#[test]
fn negation_and_casts() {
    // x := -(3 as float64) / 2
    let mut b = AstBuilder::new();
    let three = b.number("3");
    let ty = b.type_name("float64");
    let cast = b.cast(three, ty);
    let group = b.group(cast);
    let neg = b.neg(group);
    let two = b.number("2");
    let quotient = b.div(neg, two);
    let x = b.var("x", quotient);

    let result = execute(b, &[x]);
    assert_eq!(result.symbol("x").map(Word::as_f64), Some(-1.5));
}

#[test]
fn most_negative_literals_fit() {
    // x : int64 = -9223372036854775808; y : int8 = -128
    let mut b = AstBuilder::new();
    let int64 = b.type_name("int64");
    let magnitude = b.number("9223372036854775808");
    let min = b.neg(magnitude);
    let x = b.var_typed("x", Some(int64), Some(min));
    let int8 = b.type_name("int8");
    let small = b.number("128");
    let small_min = b.neg(small);
    let y = b.var_typed("y", Some(int8), Some(small_min));

    let result = execute(b, &[x, y]);
    assert_eq!(result.symbol("x").map(Word::as_i64), Some(i64::MIN));
    assert_eq!(result.symbol("y").map(Word::as_i64), Some(-128));
}

fn add(a: u64, b: u64) -> u64 {
    a + b
}

#[derive(Default)]
struct CountingBackend {
    compiles: usize,
}

impl NativeBackend for CountingBackend {
    fn compile(&mut self, call: &NativeCall) -> Result<NativeFn, NativeError> {
        self.compiles += 1;
        match call.source.as_str() {
            "add" => Ok(NativeFn::Ret2(add)),
            other => Err(NativeError::Rejected {
                reason: format!("unknown block `{other}`"),
            }),
        }
    }
}

#[test]
fn native_blocks_run_and_are_compiled_once() {
    // f :: proc { x := 20; y := 22; z := 0; native "add" (x, y) -> z }
    // f(); f()
    let mut b = AstBuilder::new();
    let twenty = b.number("20");
    let x = b.var("x", twenty);
    let twenty_two = b.number("22");
    let y = b.var("y", twenty_two);
    let zero = b.number("0");
    let z = b.var("z", zero);
    let native = b.native_block("add", &[("x", 0), ("y", 8)], Some(("z", 16)));
    let native_stmt = b.expr_stmt(native);
    let body = b.block(&[x, y, z, native_stmt]);
    let proc_expr = b.procedure(None, body);
    let f = b.constant("f", proc_expr);
    let mut calls = Vec::new();
    for _ in 0..2 {
        let callee = b.ident("f");
        let call = b.call(callee);
        calls.push(b.expr_stmt(call));
    }

    let mut backend = CountingBackend::default();
    let result = execute_with(b, &[f, calls[0], calls[1]], &mut backend);
    assert_eq!(result.output.value.as_u64(), 42);
    assert_eq!(result.compiled_natives, 1);
    assert_eq!(backend.compiles, 1);
}

#[test]
fn compilation_is_deterministic() {
    let build = || {
        let mut b = AstBuilder::new();
        let one = b.number("1");
        let x = b.var("x", one);
        let x_ref = b.ident("x");
        let half = b.number("0.5");
        let sum = b.add(x_ref, half);
        let y = b.var("y", sum);
        let module = b.module(&[x, y]);
        let mut ast = b.finish();
        compile(&mut ast, module, "", &CompilerConfig::default())
            .unwrap()
            .program
    };
    let first = build();
    assert_eq!(first, build());
    assert_eq!(first.to_string(), build().to_string());
}
