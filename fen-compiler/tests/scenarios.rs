// End-to-end scenarios: full source programs through the whole pipeline,
// asserting the lines printed by `echo` or the compile error kind.

use fen_compiler::{Compiler, FenError};
use fen_diagnostics::ErrorKind;

fn run(source: &str) -> String {
    let mut compiler = Compiler::new();
    compiler.initialize().expect("prelude failure");
    let mut out = Vec::new();
    compiler
        .run_with_writer(source, &mut out)
        .expect("program failure");
    String::from_utf8(out).expect("utf8")
}

fn compile_error(source: &str) -> ErrorKind {
    let mut compiler = Compiler::new();
    compiler.initialize().expect("prelude failure");
    let mut out = Vec::new();
    match compiler.run_with_writer(source, &mut out) {
        Err(FenError::Compile(e)) => e.kind,
        Err(FenError::Runtime(e)) => panic!("expected compile error, got runtime error: {}", e),
        Ok(()) => panic!("expected compile error, program succeeded"),
    }
}

#[test]
fn primitive_dispatch_via_ops() {
    let out = run("let a = 1 + 2 * 3;\necho(int_to_string(a));");
    assert_eq!(out, "7\n");
}

#[test]
fn parametric_struct_monomorphized() {
    let out = run(
        "struct Box<T> { item: T }\n\
         def unwrap<T>(b: Box<T>) -> T { return b.item; }\n\
         let b = Box { item: 41 };\n\
         let x = unwrap(b) + 1;\n\
         echo(int_to_string(x));",
    );
    assert_eq!(out, "42\n");
}

#[test]
fn trait_method_static_dispatch() {
    let out = run(
        "trait Say { def say() -> String; }\n\
         struct A {}\n\
         impl Say for A { def say() -> String { return \"hello\"; } }\n\
         let a = A {};\n\
         echo(a.say());",
    );
    assert_eq!(out, "hello\n");
}

#[test]
fn overloads_disambiguated_by_expected_return_type() {
    let out = run(
        "trait Into<T> { def into() -> T; }\n\
         impl Into<String> for Int { def into() -> String { return int_to_string(self); } }\n\
         impl Into<Float> for Int { def into() -> Float { return int_to_float(self); } }\n\
         let s: String = (1).into();\n\
         let f: Float = (2).into();\n\
         echo(s);\n\
         echo(float_to_string(f));",
    );
    assert_eq!(out, "1\n2.0\n");
}

#[test]
fn dynamic_dispatch_through_impl_trait_return() {
    let out = run(
        "trait Into<T> { def into() -> T; }\n\
         impl Into<String> for Int { def into() -> String { return int_to_string(self); } }\n\
         impl Into<String> for Float { def into() -> String { return float_to_string(self); } }\n\
         def get(flag: Bool) -> impl Into<String> {\n\
           if flag { return 7; } else { return 3.14; }\n\
         }\n\
         echo(get(true).into());\n\
         echo(get(false).into());",
    );
    assert_eq!(out, "7\n3.14\n");
}

#[test]
fn constraint_violation_rejected() {
    let kind = compile_error(
        "trait Printable { def show() -> String; }\n\
         def writeln<T: Printable>(t: T) -> Unit { echo(t.show()); }\n\
         writeln(42);",
    );
    assert_eq!(kind, ErrorKind::ConstraintViolation);
}

// ---- beyond the six canonical scenarios ----------------------------------

#[test]
fn generic_binding_propagates_through_call_chain() {
    let out = run(
        "def a<T>(x: T) -> T { return x; }\n\
         def b<T>(x: T) -> T { return a(x); }\n\
         def c<T>(x: T) -> T { return b(x); }\n\
         let x = c(1);\n\
         echo(int_to_string(x));",
    );
    assert_eq!(out, "1\n");
}

#[test]
fn prelude_print_boxes_primitives() {
    let out = run("print(42);\nprint(\"hi\");\nprint(2.5);\nprint(true);");
    assert_eq!(out, "42\nhi\n2.5\ntrue\n");
}

#[test]
fn while_loop_with_break_and_continue() {
    let out = run(
        "let i = 0;\n\
         while i < 6 {\n\
           i = i + 1;\n\
           if i == 3 { continue; }\n\
           if i == 5 { break; }\n\
           echo(int_to_string(i));\n\
         }",
    );
    assert_eq!(out, "1\n2\n4\n");
}

#[test]
fn string_concatenation_via_ops() {
    let out = run("let s = \"foo\" + \"bar\";\necho(s);");
    assert_eq!(out, "foobar\n");
}

#[test]
fn comparisons_and_logic_operators() {
    let out = run(
        "if 1 < 2 and 3 >= 3 { echo(\"yes\"); }\n\
         if 1 > 2 or \"a\" == \"a\" { echo(\"also\"); }\n\
         if 1 != 1 { echo(\"never\"); } else { echo(\"else\"); }",
    );
    assert_eq!(out, "yes\nalso\nelse\n");
}

#[test]
fn nested_struct_field_access() {
    let out = run(
        "struct Inner { n: Int }\n\
         struct Outer { inner: Inner }\n\
         let o = Outer { inner: Inner { n: 9 } };\n\
         echo(int_to_string(o.inner.n));",
    );
    assert_eq!(out, "9\n");
}

#[test]
fn distinct_instantiations_get_distinct_specializations() {
    let out = run(
        "struct Box<T> { item: T }\n\
         def unwrap<T>(b: Box<T>) -> T { return b.item; }\n\
         echo(int_to_string(unwrap(Box { item: 1 })));\n\
         echo(unwrap(Box { item: \"two\" }));",
    );
    assert_eq!(out, "1\ntwo\n");
}

#[test]
fn generic_function_returning_parametric_struct() {
    let out = run(
        "struct Box<T> { item: T }\n\
         def rebox<T>(x: T) -> Box<T> { return Box { item: x }; }\n\
         let b = rebox(5);\n\
         echo(int_to_string(b.item));",
    );
    assert_eq!(out, "5\n");
}

#[test]
fn struct_init_inside_generic_body_uses_caller_binding() {
    let out = run(
        "struct Box<T> { item: T }\n\
         def unwrap<T>(b: Box<T>) -> T { return b.item; }\n\
         def wrap_unwrap<T>(x: T) -> T { return unwrap(Box { item: x }); }\n\
         echo(int_to_string(wrap_unwrap(3)));",
    );
    assert_eq!(out, "3\n");
}

#[test]
fn float_arithmetic_formats_trailing_zero() {
    let out = run("let f = 1.5 + 0.5;\necho(float_to_string(f));");
    assert_eq!(out, "2.0\n");
}

#[test]
fn integer_division_truncates() {
    let out = run("echo(int_to_string(7 / 2));");
    assert_eq!(out, "3\n");
}

// ---- error kinds ---------------------------------------------------------

#[test]
fn undefined_symbol() {
    assert_eq!(compile_error("echo(nope);"), ErrorKind::UndefinedSymbol);
}

#[test]
fn type_mismatch_in_let_annotation() {
    assert_eq!(
        compile_error("let x: Int = \"oops\";"),
        ErrorKind::TypeMismatch
    );
}

#[test]
fn ambiguous_call_without_expected_type() {
    let kind = compile_error(
        "trait Into<T> { def into() -> T; }\n\
         impl Into<String> for Int { def into() -> String { return int_to_string(self); } }\n\
         impl Into<Float> for Int { def into() -> Float { return int_to_float(self); } }\n\
         let x = (1).into();",
    );
    assert_eq!(kind, ErrorKind::AmbiguousCall);
}

#[test]
fn unresolved_attribute_on_struct() {
    let kind = compile_error(
        "struct A { n: Int }\n\
         let a = A { n: 1 };\n\
         echo(int_to_string(a.missing));",
    );
    assert_eq!(kind, ErrorKind::UnresolvedAttribute);
}

#[test]
fn arity_mismatch_on_call() {
    assert_eq!(
        compile_error("echo(\"a\", \"b\");"),
        ErrorKind::ArityMismatch
    );
}

#[test]
fn duplicate_definition_in_same_scope() {
    assert_eq!(
        compile_error("let x = 1;\nlet x = 2;"),
        ErrorKind::DuplicateDefinition
    );
}

#[test]
fn duplicate_impl_triple() {
    let kind = compile_error(
        "trait Say { def say() -> String; }\n\
         struct A {}\n\
         impl Say for A { def say() -> String { return \"a\"; } }\n\
         impl Say for A { def say() -> String { return \"b\"; } }",
    );
    assert_eq!(kind, ErrorKind::DuplicateDefinition);
}

#[test]
fn impl_signature_must_match_trait() {
    let kind = compile_error(
        "trait Say { def say() -> String; }\n\
         struct A {}\n\
         impl Say for A { def say() -> Int { return 1; } }",
    );
    assert_eq!(kind, ErrorKind::TypeMismatch);
}

#[test]
fn condition_must_be_bool() {
    assert_eq!(
        compile_error("if 1 { echo(\"no\"); }"),
        ErrorKind::TypeMismatch
    );
}

#[test]
fn return_type_checked_against_declaration() {
    assert_eq!(
        compile_error("def f() -> Int { return \"no\"; }"),
        ErrorKind::TypeMismatch
    );
}

#[test]
fn shadowing_in_nested_scope_is_allowed() {
    let out = run(
        "let x = 1;\n\
         if true {\n\
           let x = 2;\n\
           echo(int_to_string(x));\n\
         }\n\
         echo(int_to_string(x));",
    );
    assert_eq!(out, "2\n1\n");
}
