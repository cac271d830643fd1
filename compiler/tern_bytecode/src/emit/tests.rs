use pretty_assertions::assert_eq;
use tern_ir::{index, Ast, AstBuilder};
use tern_types::{infer, resolve};

use super::*;

/// Wrap `items` in a module and run every pass up to generation.
fn lower_with(mut b: AstBuilder, items: &[NodeId], options: GenOptions) -> Result<Generated, GenError> {
    let module = b.module(items);
    let mut ast = b.finish();
    lower_ast(&mut ast, module, options)
}

fn lower_ast(ast: &mut Ast, module: NodeId, options: GenOptions) -> Result<Generated, GenError> {
    let section = index(ast, module, None);
    let resolution = resolve(ast, &section, None);
    let types = infer(ast, &section, &resolution);
    assert!(!resolution.has_errors(), "{:?}", resolution.diagnostics());
    assert!(!types.has_errors(), "{:?}", types.diagnostics());
    generate(ast, module, &resolution, &types, options)
}

fn lower(b: AstBuilder, items: &[NodeId]) -> Generated {
    let generated = lower_with(b, items, GenOptions::default()).unwrap();
    assert!(!generated.has_errors(), "{:?}", generated.diagnostics);
    generated
}

fn lower_with_errors(b: AstBuilder, items: &[NodeId]) -> Vec<ErrorCode> {
    let generated = lower_with(b, items, GenOptions::default()).unwrap();
    generated.diagnostics.iter().map(|d| d.code).collect()
}

fn listing(program: &Program, name: &str) -> String {
    let procedure = program
        .procedures
        .iter()
        .find(|p| p.name == name)
        .unwrap_or_else(|| panic!("no procedure `{name}`"));
    procedure.to_string()
}

#[test]
fn integer_arithmetic_is_three_address_code() {
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
    let program = lower(b, &[stmt]).program;

    assert_eq!(
        listing(&program, "start"),
        "start:
     0  LOAD_CONST r1, c0
     1  LOAD_CONST r2, c1
     2  MUL.i64 r3, r1, r2
     3  LOAD_CONST r4, c2
     4  LOAD_CONST r5, c3
     5  DIV.i64 r6, r4, r5
     6  ADD.i64 r7, r3, r6
     7  LOAD_CONST r8, c4
     8  SUB.i64 r9, r7, r8
"
    );
    assert_eq!(
        program.constants,
        [2, 3, 4, 5, 6].map(Word::from_u64).to_vec()
    );
    let start = &program.procedures[0];
    assert_eq!(start.last_register, Register::new(9));
    assert_eq!(start.last_type, Type::InferredNumber);
    assert_eq!(start.spans.len(), start.instructions.len());
}

#[test]
fn float_literals_use_float_opcodes() {
    // 2.0 * 4.0 + 8.0
    let mut b = AstBuilder::new();
    let (a, c, d) = (b.number("2.0"), b.number("4.0"), b.number("8.0"));
    let product = b.mul(a, c);
    let sum = b.add(product, d);
    let stmt = b.expr_stmt(sum);
    let program = lower(b, &[stmt]).program;

    let ops: Vec<Opcode> = program.procedures[0]
        .instructions
        .iter()
        .map(|i| i.op)
        .collect();
    assert!(ops.contains(&Opcode::Mul(NumKind::F64)));
    assert!(ops.contains(&Opcode::Add(NumKind::F64)));
    assert_eq!(program.constants[0], Word::from_f64(2.0));
}

#[test]
fn half_is_stored_as_its_bits() {
    let mut b = AstBuilder::new();
    let half = b.number("0.5");
    let stmt = b.expr_stmt(half);
    let program = lower(b, &[stmt]).program;
    assert_eq!(program.constants, vec![Word::from_bits(0.5f64.to_bits())]);
}

#[test]
fn declared_type_inserts_a_conversion() {
    // x : float32 = 1
    let mut b = AstBuilder::new();
    let ty = b.type_name("float32");
    let one = b.number("1");
    let decl = b.var_typed("x", Some(ty), Some(one));
    let program = lower(b, &[decl]).program;

    assert_eq!(
        listing(&program, "start"),
        "start:
     0  LOAD_CONST r1, c0
     1  CONVERT.i64.f32 r2, r1
"
    );
    assert_eq!(program.data_symbol("x"), Some(Register::new(2)));
}

#[test]
fn same_kind_needs_no_conversion() {
    // x : int64 = 1
    let mut b = AstBuilder::new();
    let ty = b.type_name("int64");
    let one = b.number("1");
    let decl = b.var_typed("x", Some(ty), Some(one));
    let program = lower(b, &[decl]).program;
    assert_eq!(program.procedures[0].instructions.len(), 1);
    assert_eq!(program.data_symbol("x"), Some(Register::new(1)));
}

#[test]
fn initializing_from_a_variable_copies() {
    // a := 1; b := a
    let mut b = AstBuilder::new();
    let one = b.number("1");
    let a = b.var("a", one);
    let a_ref = b.ident("a");
    let b_decl = b.var("b", a_ref);
    let program = lower(b, &[a, b_decl]).program;

    assert_eq!(
        listing(&program, "start"),
        "start:
     0  LOAD_CONST r1, c0
     1  COPY_VALUE r2, r1
"
    );
    assert_eq!(program.data_symbol("a"), Some(Register::new(1)));
    assert_eq!(program.data_symbol("b"), Some(Register::new(2)));
}

#[test]
fn parallel_assignment_stages_values_first() {
    // a := 1; b := 2; a, b = b, a
    let mut b = AstBuilder::new();
    let one = b.number("1");
    let a = b.var("a", one);
    let two = b.number("2");
    let b_decl = b.var("b", two);
    let targets = [b.ident("a"), b.ident("b")];
    let values = [b.ident("b"), b.ident("a")];
    let swap = b.parallel_assign(&targets, &values);
    let program = lower(b, &[a, b_decl, swap]).program;

    assert_eq!(
        listing(&program, "start"),
        "start:
     0  LOAD_CONST r1, c0
     1  LOAD_CONST r2, c1
     2  COPY_VALUE r3, r2
     3  COPY_VALUE r4, r1
     4  COPY_VALUE r1, r3
     5  COPY_VALUE r2, r4
"
    );
}

#[test]
fn simple_assignment_converts_then_copies() {
    // x : uint8 = 1; x = 2
    let mut b = AstBuilder::new();
    let ty = b.type_name("uint8");
    let one = b.number("1");
    let decl = b.var_typed("x", Some(ty), Some(one));
    let target = b.ident("x");
    let two = b.number("2");
    let store = b.assign(target, two);
    let program = lower(b, &[decl, store]).program;

    assert_eq!(
        listing(&program, "start"),
        "start:
     0  LOAD_CONST r1, c0
     1  CONVERT.i64.u8 r2, r1
     2  LOAD_CONST r3, c1
     3  CONVERT.i64.u8 r4, r3
     4  COPY_VALUE r2, r4
"
    );
}

#[test]
fn negation_and_unary_plus() {
    // x := 1; -x; +2
    let mut b = AstBuilder::new();
    let one = b.number("1");
    let x = b.var("x", one);
    let x_ref = b.ident("x");
    let neg = b.neg(x_ref);
    let s1 = b.expr_stmt(neg);
    let two = b.number("2");
    let plus = b.prefix(PrefixOp::Plus, two);
    let s2 = b.expr_stmt(plus);
    let program = lower(b, &[x, s1, s2]).program;

    assert_eq!(
        listing(&program, "start"),
        "start:
     0  LOAD_CONST r1, c0
     1  NEG.i64 r2, r1
     2  LOAD_CONST r3, c1
"
    );
}

#[test]
fn negated_integer_literals_are_folded() {
    // -9223372036854775808; -(5); -0.5
    let mut b = AstBuilder::new();
    let min = b.number("9223372036854775808");
    let neg_min = b.neg(min);
    let s1 = b.expr_stmt(neg_min);
    let five = b.number("5");
    let group = b.group(five);
    let neg_five = b.neg(group);
    let s2 = b.expr_stmt(neg_five);
    let half = b.number("0.5");
    let neg_half = b.neg(half);
    let s3 = b.expr_stmt(neg_half);
    let program = lower(b, &[s1, s2, s3]).program;

    assert_eq!(
        listing(&program, "start"),
        "start:
     0  LOAD_CONST r1, c0
     1  LOAD_CONST r2, c1
     2  LOAD_CONST r3, c2
     3  NEG.f64 r4, r3
"
    );
    assert_eq!(program.constants[0], Word::from_i64(i64::MIN));
    assert_eq!(program.constants[1], Word::from_i64(-5));
}

#[test]
fn cast_converts_to_the_target() {
    // 300 as uint8
    let mut b = AstBuilder::new();
    let n = b.number("300");
    let ty = b.type_name("uint8");
    let cast = b.cast(n, ty);
    let stmt = b.expr_stmt(cast);
    let program = lower(b, &[stmt]).program;
    assert_eq!(
        program.procedures[0].instructions[1].op,
        Opcode::Convert {
            from: NumKind::I64,
            to: NumKind::U8
        }
    );
}

#[test]
fn procedures_get_their_own_register_space() {
    // f :: proc int32 { 7 }; y := f()
    let mut b = AstBuilder::new();
    let ret = b.type_name("int32");
    let seven = b.number("7");
    let body_stmt = b.expr_stmt(seven);
    let body = b.block(&[body_stmt]);
    let proc_expr = b.procedure(Some(ret), body);
    let f = b.constant("f", proc_expr);
    let callee = b.ident("f");
    let call = b.call(callee);
    let y = b.var("y", call);
    let program = lower(b, &[f, y]).program;

    assert_eq!(program.text_symbol("f"), Some(ProcIdx::new(1)));
    assert_eq!(
        listing(&program, "f"),
        "f:
     0  LOAD_CONST r1, c0
     1  CONVERT.i64.i32 r2, r1
"
    );
    assert_eq!(
        listing(&program, "start"),
        "start:
     0  CALL r1, p1
"
    );
    assert_eq!(program.data_symbol("y"), Some(Register::new(1)));
    assert_eq!(program.data_symbol("f"), None);
}

#[test]
fn procedures_can_call_themselves() {
    // f :: proc { f() }
    let mut b = AstBuilder::new();
    let callee = b.ident("f");
    let call = b.call(callee);
    let stmt = b.expr_stmt(call);
    let body = b.block(&[stmt]);
    let proc_expr = b.procedure(None, body);
    let f = b.constant("f", proc_expr);
    let program = lower(b, &[f]).program;

    assert_eq!(
        listing(&program, "f"),
        "f:
     0  CALL r1, p1
"
    );
}

#[test]
fn return_converts_to_the_declared_type() {
    // f :: proc int8 { return 1 }
    let mut b = AstBuilder::new();
    let ret_ty = b.type_name("int8");
    let one = b.number("1");
    let ret = b.ret(Some(one));
    let body = b.block(&[ret]);
    let proc_expr = b.procedure(Some(ret_ty), body);
    let f = b.constant("f", proc_expr);
    let program = lower(b, &[f]).program;

    assert_eq!(
        listing(&program, "f"),
        "f:
     0  LOAD_CONST r1, c0
     1  CONVERT.i64.i8 r2, r1
     2  RETURN r_, r2
"
    );
}

#[test]
fn literal_constants_are_reloaded_in_nested_procedures() {
    // k :: 5; f :: proc { k + 1 }
    let mut b = AstBuilder::new();
    let five = b.number("5");
    let k = b.constant("k", five);
    let k_ref = b.ident("k");
    let one = b.number("1");
    let sum = b.add(k_ref, one);
    let stmt = b.expr_stmt(sum);
    let body = b.block(&[stmt]);
    let proc_expr = b.procedure(None, body);
    let f = b.constant("f", proc_expr);
    let program = lower(b, &[k, f]).program;

    assert_eq!(
        listing(&program, "f"),
        "f:
     0  LOAD_CONST r1, c1
     1  LOAD_CONST r2, c2
     2  ADD.i64 r3, r1, r2
"
    );
    assert_eq!(program.constants[1], Word::from_u64(5));
}

#[test]
fn variables_of_enclosing_procedures_are_not_captured() {
    // x := 1; f :: proc { x }
    let mut b = AstBuilder::new();
    let one = b.number("1");
    let x = b.var("x", one);
    let x_ref = b.at(30, 31).ident("x");
    let stmt = b.expr_stmt(x_ref);
    let body = b.block(&[stmt]);
    let proc_expr = b.procedure(None, body);
    let f = b.constant("f", proc_expr);
    let generated = lower_with(b, &[x, f], GenOptions::default()).unwrap();

    assert_eq!(generated.diagnostics.len(), 1);
    let diag = &generated.diagnostics[0];
    assert_eq!(diag.code, ErrorCode::E3010);
    assert_eq!(diag.primary_span(), Some(Span::new(30, 31)));
}

#[test]
fn only_top_level_declarations_are_data_symbols() {
    // x := 1; { y := 2 }
    let mut b = AstBuilder::new();
    let one = b.number("1");
    let x = b.var("x", one);
    let two = b.number("2");
    let y = b.var("y", two);
    let block = b.block(&[y]);
    let program = lower(b, &[x, block]).program;

    assert_eq!(program.data_symbol("x"), Some(Register::new(1)));
    assert_eq!(program.data_symbol("y"), None);
}

#[test]
fn declaration_without_initializer_gets_a_register() {
    // x : int32; y := 1
    let mut b = AstBuilder::new();
    let ty = b.type_name("int32");
    let x = b.var_typed("x", Some(ty), None);
    let one = b.number("1");
    let y = b.var("y", one);
    let program = lower(b, &[x, y]).program;

    assert_eq!(program.data_symbol("x"), Some(Register::new(1)));
    assert_eq!(program.data_symbol("y"), Some(Register::new(2)));
    assert_eq!(program.procedures[0].instructions.len(), 1);
}

#[test]
fn native_block_is_packaged_as_metadata() {
    // a := 1; b : int64; native "mov" (a @ 0) -> (b @ 8)
    let mut b = AstBuilder::new();
    let one = b.number("1");
    let a = b.var("a", one);
    let ty = b.type_name("int64");
    let b_decl = b.var_typed("b", Some(ty), None);
    let native = b.native_block("mov", &[("a", 0)], Some(("b", 8)));
    let stmt = b.expr_stmt(native);
    let program = lower(b, &[a, b_decl, stmt]).program;

    assert_eq!(
        program.metadata,
        vec![Metadata::Native(NativeCall {
            source: "mov".into(),
            inputs: vec![NativeSlot {
                name: "a".into(),
                offset: 0,
                register: Register::new(1),
            }],
            output: Some(NativeSlot {
                name: "b".into(),
                offset: 8,
                register: Register::new(2),
            }),
        })]
    );
    assert_eq!(
        listing(&program, "start"),
        "start:
     0  LOAD_CONST r1, c0
     1  CALL_NATIVE r2, m0
"
    );
}

#[test]
fn native_block_without_output_writes_nothing() {
    let mut b = AstBuilder::new();
    let native = b.native_block("nop", &[], None);
    let stmt = b.expr_stmt(native);
    let program = lower(b, &[stmt]).program;

    let start = &program.procedures[0];
    assert_eq!(start.instructions[0].out, Register::NONE);
    assert_eq!(start.last_register, Register::NONE);
}

#[test]
fn native_block_input_limit() {
    let mut b = AstBuilder::new();
    let mut items = Vec::new();
    let names = ["a", "b", "c", "d", "e", "f", "g"];
    for name in names {
        let one = b.number("1");
        items.push(b.var(name, one));
    }
    let inputs: Vec<(&str, u32)> = names.iter().zip(0..).map(|(&n, i)| (n, i * 8)).collect();
    let native = b.native_block("sum", &inputs, None);
    items.push(b.expr_stmt(native));

    assert_eq!(lower_with_errors(b, &items), vec![ErrorCode::E4002]);
}

#[test]
fn text_values_are_not_lowered() {
    let mut b = AstBuilder::new();
    let text = b.text("hello");
    let t = b.var("t", text);
    assert_eq!(lower_with_errors(b, &[t]), vec![ErrorCode::E3009]);
}

#[test]
fn struct_values_are_not_lowered() {
    // P :: struct { x: int32 }; v := P
    let mut b = AstBuilder::new();
    let field_ty = b.type_name("int32");
    let def = b.struct_def(&[("x", field_ty)]);
    let p = b.constant("P", def);
    let p_ref = b.ident("P");
    let v = b.var("v", p_ref);
    assert_eq!(lower_with_errors(b, &[p, v]), vec![ErrorCode::E3009]);
}

#[test]
fn register_space_exhaustion_is_a_hard_error() {
    // 1 + 2 + 3 needs five registers.
    let mut b = AstBuilder::new();
    let (one, two, three) = (b.number("1"), b.number("2"), b.number("3"));
    let inner = b.add(one, two);
    let outer = b.add(inner, three);
    let stmt = b.expr_stmt(outer);
    let err = lower_with(b, &[stmt], GenOptions { register_limit: 3 }).unwrap_err();

    assert!(matches!(
        &err,
        GenError::RegisterSpaceExhausted { procedure, limit: 3, .. } if procedure == "start"
    ));
    assert_eq!(err.to_diagnostic().code, ErrorCode::E5001);
}

#[test]
fn register_limit_cannot_be_raised() {
    let mut b = AstBuilder::new();
    let one = b.number("1");
    let stmt = b.expr_stmt(one);
    let generated = lower_with(
        b,
        &[stmt],
        GenOptions {
            register_limit: u16::MAX,
        },
    )
    .unwrap();
    assert_eq!(generated.program.procedures[0].next_register, 2);
}

#[test]
fn generation_is_deterministic() {
    let mut b = AstBuilder::new();
    let one = b.number("1");
    let x = b.var("x", one);
    let x_ref = b.ident("x");
    let half = b.number("0.5");
    let ty = b.type_name("float64");
    let cast = b.cast(x_ref, ty);
    let sum = b.add(cast, half);
    let y = b.var("y", sum);
    let seven = b.number("7");
    let body_stmt = b.expr_stmt(seven);
    let body = b.block(&[body_stmt]);
    let proc_expr = b.procedure(None, body);
    let f = b.constant("f", proc_expr);
    let module = b.module(&[x, y, f]);
    let mut ast = b.finish();

    let first = lower_ast(&mut ast, module, GenOptions::default()).unwrap();
    let second = lower_ast(&mut ast, module, GenOptions::default()).unwrap();
    assert_eq!(first.program, second.program);
}
