//! `for(...)` and `array(...)` expression forms: label layout, loop
//! variables, and scope retirement.

use stave_common::ErrorKind;
use stave_emit::AsmArg;

mod common;
use common::Fixture;

#[test]
fn for_loop_layout_and_result() {
    let mut fx = Fixture::new();
    let result = fx.compile("for(int s = 0 if s < 10 do s++ return s)").unwrap();
    assert_eq!(fx.opcodes(), vec!["MVI", "LES", "JMPFL", "PINC", "JMP"]);

    // BEG at the init, IF past it, RET past the back jump.
    assert_eq!(fx.writer.jump_destination("FW00000BEG"), Some(0));
    assert_eq!(fx.writer.jump_destination("FW00000IF"), Some(1));
    assert_eq!(fx.writer.jump_destination("FW00000RET"), Some(5));
    let code = fx.code();
    assert_eq!(code[2].args[1], AsmArg::Jmp("FW00000RET".into()));
    assert_eq!(code[4].args[0], AsmArg::Jmp("FW00000IF".into()));

    // The loop variable is hidden after the construct but remains the
    // result's storage.
    assert!(fx.st.var_search("s", &fx.scope).is_none());
    assert!(result.var_index().is_some());
}

#[test]
fn for_requires_its_keywords_in_order() {
    let mut fx = Fixture::new();
    let err = fx.compile("for(int s = 0 do s++ return s)").unwrap_err();
    assert!(matches!(err.kind, ErrorKind::FlowKeywordSequence { .. }));
    let err = fx.compile("for(int t = 0 if t < 1)").unwrap_err();
    assert!(matches!(err.kind, ErrorKind::FlowKeywordSequence { .. }));
}

#[test]
fn flow_keywords_outside_their_construct_are_errors() {
    let mut fx = Fixture::new();
    fx.declare("x", "int", true);
    let err = fx.compile("x do 1").unwrap_err();
    assert!(matches!(err.kind, ErrorKind::FlowKeywordSequence { .. }));
}

#[test]
fn array_comprehension_builds_a_fresh_array() {
    let mut fx = Fixture::new();
    fx.declare_dyn_array("a", "int", true);
    let result = fx.compile("array(a on x as x * 2)").unwrap();
    assert_eq!(
        fx.opcodes(),
        vec!["AD1DF", "AD1FO", "MUL", "AD1AP", "MVI", "AD1NX"]
    );
    // The walk jumps to END when the source is empty, the advance jumps
    // back to the loop head.
    let code = fx.code();
    assert_eq!(code[1].args[3], AsmArg::Jmp("FW00000END".into()));
    assert_eq!(code[5].args[1], AsmArg::Jmp("FW00000LOP".into()));
    assert!(fx.writer.jump_destination("FW00000LOP").is_some());
    assert!(fx.writer.jump_destination("FW00000END").is_some());

    // Result is a dynamic int array; the element variable is retired.
    let typ = result.typ_index(&fx.st).unwrap();
    assert_eq!(
        fx.st.typ(typ).elem_typ,
        Some(fx.st.sys().int)
    );
    assert!(fx.st.var_search("x", &fx.scope).is_none());
}

#[test]
fn array_with_condition_skips_the_append() {
    let mut fx = Fixture::new();
    fx.declare_dyn_array("a", "int", true);
    fx.compile("array(a on x if x > 0 as x)").unwrap();
    assert_eq!(
        fx.opcodes(),
        vec!["AD1DF", "AD1FO", "GRE", "JMPFL", "AD1AP", "MVI", "AD1NX"]
    );
    let code = fx.code();
    assert_eq!(code[3].args[1], AsmArg::Jmp("FW00000NXT".into()));
}

#[test]
fn array_with_index_variable() {
    let mut fx = Fixture::new();
    fx.declare_dyn_array("a", "int", true);
    fx.compile("array(a on x index i as x)").unwrap();
    let code = fx.code();
    // The walk-open instruction binds both loop variables.
    assert!(matches!(&code[1].args[1], AsmArg::Var { name, .. } if name == "x"));
    assert!(matches!(&code[1].args[2], AsmArg::Var { name, .. } if name == "i"));
}

#[test]
fn array_index_variable_must_be_a_word() {
    let mut fx = Fixture::new();
    fx.declare_dyn_array("a", "int", true);
    fx.declare("i", "int", true);
    let err = fx.compile("array(a on x index i as x)").unwrap_err();
    assert!(matches!(err.kind, ErrorKind::FlowIndexVarInvalid(_)));
}

#[test]
fn array_source_must_be_an_array() {
    let mut fx = Fixture::new();
    fx.declare("n", "int", true);
    let err = fx.compile("array(n on x as x)").unwrap_err();
    assert!(matches!(err.kind, ErrorKind::FlowSourceNotArray(_)));
}

#[test]
fn fixed_sources_use_the_fixed_walk() {
    let mut fx = Fixture::new();
    fx.declare_fix_array("a", "int", &[4], true);
    fx.compile("array(a on x as x)").unwrap();
    let ops = fx.opcodes();
    assert!(ops.contains(&"AF1FO".to_string()));
    assert!(ops.contains(&"AF1NX".to_string()));
}

#[test]
fn for_variables_can_be_redeclared_after_the_loop() {
    let mut fx = Fixture::new();
    fx.compile("for(int s = 0 if s < 3 do s++ return s)").unwrap();
    // `s` was hidden; a fresh declaration reuses the retired entry.
    fx.compile("int s = 7").unwrap();
    assert!(fx.st.var_search("s", &fx.scope).is_some());
}

#[test]
fn for_inside_arithmetic() {
    let mut fx = Fixture::new();
    fx.compile("1 + for(int s = 0 if s < 3 do s++ return s)").unwrap();
    assert_eq!(fx.opcodes().last().unwrap(), "ADD");
}
