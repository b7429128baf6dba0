//! Surface recognition: operator disambiguation, cast detection,
//! embedded declarations, and the consistency checks.

use stave_common::ErrorKind;
use stave_expr::Lit;

mod common;
use common::Fixture;

#[test]
fn plus_is_unary_or_binary_by_context() {
    let mut fx = Fixture::new();
    fx.declare("a", "int", true);
    // Binary after an operand, unary after an operator.
    let result = fx.compile("a + -2").unwrap();
    assert!(!result.is_lit_value());
    assert_eq!(fx.opcodes(), vec!["ADD"]);
    let code = fx.code();
    assert_eq!(code[0].args[2], stave_emit::AsmArg::LitInt(-2));
}

#[test]
fn increment_is_postfix_after_an_operand() {
    let mut fx = Fixture::new();
    fx.declare("a", "int", true);
    fx.declare("b", "int", true);
    fx.compile("a++ + b").unwrap();
    assert_eq!(fx.opcodes(), vec!["PINC", "ADD"]);

    let mut fx = Fixture::new();
    fx.declare("a", "int", true);
    fx.declare("b", "int", true);
    fx.compile("a + ++b").unwrap();
    assert_eq!(fx.opcodes(), vec!["INC", "ADD"]);
}

#[test]
fn grouping_parens_are_not_casts() {
    let mut fx = Fixture::new();
    fx.declare("a", "int", true);
    let result = fx.compile("(a)").unwrap();
    assert!(fx.code().is_empty());
    assert_eq!(result.var_index(), fx.st.var_search("a", &fx.scope));
}

#[test]
fn undefined_identifier_is_reported() {
    let mut fx = Fixture::new();
    let err = fx.compile("ghost + 1").unwrap_err();
    assert_eq!(err.to_string(), "undefined identifier `ghost`");
}

#[test]
fn duplicate_declaration_in_the_same_scope() {
    let mut fx = Fixture::new();
    fx.compile("int a = 1").unwrap();
    let err = fx.compile("int a = 2").unwrap_err();
    assert_eq!(err.kind, ErrorKind::DuplicateVariable("a".into()));
}

#[test]
fn new_variable_must_not_collide_with_a_member() {
    let mut fx = Fixture::new();
    fx.register_class("point", vec![("x", "int", false)]);
    let err = fx.compile("int x = 1").unwrap_err();
    assert_eq!(
        err.kind,
        ErrorKind::DotCollision {
            name: "x".into(),
            member: "point.x".into()
        }
    );
}

#[test]
fn enum_members_are_literals() {
    let mut fx = Fixture::new();
    let color = fx.register_enum("color", vec![("red", 0), ("green", 1), ("blue", 2)]);
    let result = fx.compile("color.green").unwrap();
    assert_eq!(result.lit_value(), Some(Lit::Enu(1)));
    assert_eq!(result.typ_index(&fx.st), Some(color));
    assert!(fx.code().is_empty());
}

#[test]
fn enum_comparison_folds() {
    let mut fx = Fixture::new();
    fx.register_enum("color", vec![("red", 0), ("green", 1)]);
    let result = fx.compile("color.red == color.green").unwrap();
    assert_eq!(result.lit_value(), Some(Lit::Bol(false)));
}

#[test]
fn casting_to_an_enum_is_rejected() {
    let mut fx = Fixture::new();
    fx.register_enum("color", vec![("red", 0)]);
    let err = fx.compile("(color)1").unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidCastTarget("color".into()));
}

#[test]
fn class_cast_requires_an_initializer() {
    let mut fx = Fixture::new();
    fx.register_class("point", vec![("x", "int", false)]);
    fx.declare("n", "int", true);
    let err = fx.compile("(point)n").unwrap_err();
    assert!(matches!(err.kind, ErrorKind::InvalidCastTarget(_)));
}

#[test]
fn type_name_reflection() {
    let mut fx = Fixture::new();
    fx.register_class("point", vec![("x", "int", false)]);
    let result = fx.compile("point.name").unwrap();
    let adr = match result.lit_value() {
        Some(Lit::Str(adr)) => adr,
        other => panic!("expected a string, got {other:?}"),
    };
    assert_eq!(fx.writer.lit_string_at(adr), Some("point"));
    assert!(result.meta.is_some());
}

#[test]
fn missing_operands_are_caught_before_evaluation() {
    let mut fx = Fixture::new();
    fx.declare("a", "int", true);
    assert!(matches!(
        fx.compile("a +").unwrap_err().kind,
        ErrorKind::MissingOperand { .. }
    ));
    assert!(matches!(
        fx.compile("* a").unwrap_err().kind,
        ErrorKind::MissingOperand { .. }
    ));
}

#[test]
fn unbalanced_delimiters_name_the_character() {
    let mut fx = Fixture::new();
    fx.declare("a", "int", true);
    assert_eq!(
        fx.compile("(a + 1").unwrap_err().kind,
        ErrorKind::UnmatchedOpen('(')
    );
    assert_eq!(
        fx.compile("a + 1)").unwrap_err().kind,
        ErrorKind::UnmatchedClose(')')
    );
}

#[test]
fn stray_colon_at_end_of_sentence() {
    let mut fx = Fixture::new();
    fx.declare("a", "int", true);
    let err = fx.compile("a :").unwrap_err();
    assert_eq!(err.kind, ErrorKind::StrayColon);
}

#[test]
fn empty_expressions_are_rejected() {
    let mut fx = Fixture::new();
    let err = fx.compile("").unwrap_err();
    assert_eq!(err.kind, ErrorKind::EmptyExpression);
}

#[test]
fn parameter_list_commas_are_validated() {
    let mut fx = Fixture::new();
    use stave_symtab::{CallConv, ModIndex};
    fx.register_function(
        "f",
        ModIndex(0),
        vec![("int", false, false), ("int", false, false)],
        Some("int"),
        CallConv::Module,
        false,
    );
    assert_eq!(
        fx.compile("f(1, )").unwrap_err().kind,
        ErrorKind::ParameterListSyntax
    );
    assert_eq!(
        fx.compile("f(, 1)").unwrap_err().kind,
        ErrorKind::ParameterListSyntax
    );
}

#[test]
fn declared_star_variable_is_initialized_at_push() {
    let mut fx = Fixture::new();
    let result = fx.compile("string s * -> s").unwrap();
    // The `*` sigil triggers block initialization before any read.
    assert_eq!(fx.opcodes(), vec!["BIBEG", "BISTR", "BIEND"]);
    let s = result.var_index().unwrap();
    assert!(fx.st.var(s).is_initialized);
}

#[test]
fn undefined_variable_resolves_on_second_mention() {
    let mut fx = Fixture::new();
    let result = fx.compile("var n = 3 -> n + 1").unwrap();
    assert!(result.is_operand());
    let n = fx.st.var_search("n", &fx.scope).unwrap();
    assert_eq!(fx.st.var(n).typ, fx.st.sys().int);
}

#[test]
fn tracker_alias_alone_is_an_error() {
    let mut fx = Fixture::new();
    fx.st.store_module("util", Some("util".to_string()));
    fx.declare("x", "int", true);
    let err = fx.compile("util + x").unwrap_err();
    assert_eq!(err.kind, ErrorKind::BareTracker("util".into()));
}
