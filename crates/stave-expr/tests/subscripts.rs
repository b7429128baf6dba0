//! Array and string subscripts, field access, and use propagation.

use stave_common::ErrorKind;
use stave_emit::AsmArg;

mod common;
use common::Fixture;

#[test]
fn two_dim_fixed_subscript_assignment() {
    let mut fx = Fixture::new();
    let a = fx.declare_fix_array("a", "int", &[3, 4], true);
    let i = fx.declare("i", "int", true);
    let j = fx.declare("j", "int", true);
    let v = fx.declare("v", "int", true);
    fx.compile("a[i][j] = v").unwrap();
    // Indexes promote to the word master, then the reference chain and
    // the element move.
    assert_eq!(
        fx.opcodes(),
        vec!["IN2LO", "IN2LO", "AFIDX", "AFIDX", "AFREF", "MVI"]
    );
    let code = fx.code();
    // The element write goes through the indirection temporary.
    assert!(matches!(&code[5].args[0], AsmArg::Ind { .. }));
    assert!(matches!(&code[5].args[1], AsmArg::Var { index, .. } if *index == v));
    assert!(fx.st.var(a).is_source_used);
    assert!(fx.st.var(v).is_source_used);
    assert!(fx.st.var(i).is_source_used);
    assert!(fx.st.var(j).is_source_used);
}

#[test]
fn one_dim_subscripts_use_the_fast_fetch() {
    let mut fx = Fixture::new();
    fx.declare_fix_array("a", "int", &[5], true);
    fx.compile("a[0L]").unwrap();
    assert_eq!(fx.opcodes(), vec!["AF1RF"]);

    let mut fx = Fixture::new();
    fx.declare_dyn_array("d", "int", true);
    fx.compile("d[0L]").unwrap();
    assert_eq!(fx.opcodes(), vec!["AD1RF"]);
}

#[test]
fn string_subscript_yields_a_char() {
    let mut fx = Fixture::new();
    fx.declare("s", "string", true);
    let result = fx.compile("s[0L]").unwrap();
    assert_eq!(fx.opcodes(), vec!["SINDX"]);
    assert_eq!(result.typ_index(&fx.st), Some(fx.st.sys().chr));
}

#[test]
fn dimension_count_must_match() {
    let mut fx = Fixture::new();
    fx.declare_fix_array("a", "int", &[3, 4], true);
    let err = fx.compile("a[1L]").unwrap_err();
    assert_eq!(
        err.kind,
        ErrorKind::SubscriptDimMismatch {
            expected: 2,
            found: 1
        }
    );
}

#[test]
fn non_indexable_types_are_rejected() {
    let mut fx = Fixture::new();
    fx.declare("n", "int", true);
    let err = fx.compile("n[0L]").unwrap_err();
    assert!(matches!(err.kind, ErrorKind::SubscriptNonIndexable(_)));
}

#[test]
fn field_access_emits_a_reference_with_the_offset() {
    let mut fx = Fixture::new();
    fx.register_class("point", vec![("x", "int", false), ("y", "int", false)]);
    let p = fx.declare_typed(
        "p",
        fx.st.typ_search("point", &fx.scope).unwrap(),
        true,
    );
    let result = fx.compile("p.y").unwrap();
    assert_eq!(fx.opcodes(), vec!["REFOF"]);
    let code = fx.code();
    assert_eq!(code[0].args[2], AsmArg::LitWrd(4), "y sits after x");
    // Use propagates back to `p` through the indirection.
    assert_eq!(result.source_var, Some(p));
}

#[test]
fn field_write_through_the_reference() {
    let mut fx = Fixture::new();
    fx.register_class("point", vec![("x", "int", false), ("y", "int", false)]);
    fx.declare_typed("p", fx.st.typ_search("point", &fx.scope).unwrap(), true);
    fx.compile("p.x = 9").unwrap();
    assert_eq!(fx.opcodes(), vec!["REFOF", "MVI"]);
}

#[test]
fn static_field_rewrites_to_the_module_variable() {
    let mut fx = Fixture::new();
    fx.register_class("counter", vec![("total", "int", true), ("n", "int", false)]);
    fx.declare_typed("c", fx.st.typ_search("counter", &fx.scope).unwrap(), true);
    // Static access emits no reference fetch at all.
    fx.st
        .var_mut(fx.st.var_search("counter.total", &fx.scope).unwrap())
        .is_initialized = true;
    let result = fx.compile("c.total + 1").unwrap();
    assert_eq!(fx.opcodes(), vec!["ADD"]);
    let _ = result;
}

#[test]
fn unknown_field_is_reported_with_the_class() {
    let mut fx = Fixture::new();
    fx.register_class("point", vec![("x", "int", false)]);
    fx.declare_typed("p", fx.st.typ_search("point", &fx.scope).unwrap(), true);
    let err = fx.compile("p.z").unwrap_err();
    assert_eq!(err.to_string(), "class `point` has no field `z`");
}

#[test]
fn member_access_on_non_class_is_rejected() {
    let mut fx = Fixture::new();
    fx.declare("n", "int", true);
    let err = fx.compile("n.x").unwrap_err();
    assert!(matches!(err.kind, ErrorKind::MemberOnNonClass(_)));
}

#[test]
fn subscripted_element_feeds_arithmetic() {
    let mut fx = Fixture::new();
    fx.declare_fix_array("a", "int", &[5], true);
    fx.compile("a[2L] * 2").unwrap();
    assert_eq!(fx.opcodes(), vec!["AF1RF", "MUL"]);
}
