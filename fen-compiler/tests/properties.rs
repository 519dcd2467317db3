// Pipeline invariants: determinism of emission, monomorphization
// completeness, and the bookkeeping guarantees the later stages rely on.

use fen_compiler::Compiler;
use std::collections::BTreeSet;

const GENERIC_PROGRAM: &str = "struct Box<T> { item: T }\n\
     def unwrap<T>(b: Box<T>) -> T { return b.item; }\n\
     let b = Box { item: 41 };\n\
     let x = unwrap(b) + 1;\n\
     echo(int_to_string(x));";

fn compile(source: &str) -> Compiler {
    let mut compiler = Compiler::new();
    compiler.initialize().expect("prelude failure");
    let mut out = Vec::new();
    compiler
        .run_with_writer(source, &mut out)
        .expect("program failure");
    compiler
}

#[test]
fn emission_is_deterministic_across_sessions() {
    let first = compile(GENERIC_PROGRAM);
    let second = compile(GENERIC_PROGRAM);

    assert_eq!(first.emitted_names(), second.emitted_names());
    // identical bodies, not just identical names
    let render_a = first.assemble(Vec::new()).to_string();
    let render_b = second.assemble(Vec::new()).to_string();
    assert_eq!(render_a, render_b);
}

#[test]
fn monomorphization_is_complete_for_static_call_sites() {
    let compiler = compile(GENERIC_PROGRAM);
    let names: BTreeSet<String> = compiler.emitted_names().into_iter().collect();
    // the generic function under this site's binding
    assert!(names.contains("unwrap___Int"), "names: {:?}", names);
    // the operator method selected by the desugared `+`
    assert!(names.contains("Ops_for_Int___add"), "names: {:?}", names);
}

#[test]
fn dynamic_receivers_share_one_compiled_entry() {
    let compiler = compile(
        "trait Into<T> { def into() -> T; }\n\
         impl Into<String> for Int { def into() -> String { return int_to_string(self); } }\n\
         impl Into<String> for Float { def into() -> String { return float_to_string(self); } }\n\
         def get(flag: Bool) -> impl Into<String> {\n\
           if flag { return 7; } else { return 3.14; }\n\
         }\n\
         echo(get(true).into());\n\
         echo(get(false).into());",
    );
    let names: BTreeSet<String> = compiler.emitted_names().into_iter().collect();
    // one shim per concrete type flowing through the dynamic return
    assert!(names.contains("Into_p_String_q__for_Int___into"));
    assert!(names.contains("Into_p_String_q__for_Float___into"));
}

#[test]
fn emitted_set_is_reachable_monomorphizations_only() {
    // a generic function that is never called produces nothing
    let compiler = compile(
        "def unused<T>(x: T) -> T { return x; }\n\
         echo(\"done\");",
    );
    let names = compiler.emitted_names();
    assert!(
        names.iter().all(|n| !n.starts_with("unused")),
        "names: {:?}",
        names
    );
}

#[test]
fn every_static_generic_call_is_fully_bound() {
    let compiler = compile(GENERIC_PROGRAM);
    for info in compiler.annotations().calls.values() {
        if info.dyn_dispatch {
            continue;
        }
        for param in &info.origin.type_parameters {
            assert!(
                info.binds.contains_key(param),
                "call to `{}` leaves `{}` unbound",
                info.origin.name,
                param.name
            );
        }
    }
}

#[test]
fn typed_nodes_carry_their_scope() {
    let compiler = compile(GENERIC_PROGRAM);
    let ann = compiler.annotations();
    assert!(!ann.expr_types.is_empty());
    for id in ann.expr_types.keys() {
        assert!(
            ann.node_scopes.contains_key(id),
            "typed node without a scope"
        );
    }
}

#[test]
fn separate_sessions_do_not_share_state() {
    // the same name can be defined in two sessions without collision
    compile("let a = 1;\necho(int_to_string(a));");
    compile("let a = 2;\necho(int_to_string(a));");
}
