//! Operator evaluation: temporaries, promotion, result reuse, and the
//! pre-checks (lvalue, const, initialization).

use stave_common::ErrorKind;
use stave_emit::AsmArg;

mod common;
use common::Fixture;

#[test]
fn chained_arithmetic_reuses_one_temporary() {
    let mut fx = Fixture::new();
    let a = fx.declare("a", "int", true);
    let result = fx.compile("a * a - 1").unwrap();
    assert_eq!(fx.opcodes(), vec!["MUL", "SUB"]);
    assert_eq!(fx.temp_count(), 1, "the subtraction reuses the product's slot");

    // MUL tmp, a, a then SUB tmp, tmp, 1.
    let code = fx.code();
    let tmp = result.var_index().unwrap();
    assert_eq!(
        code[0].args[0],
        AsmArg::Var {
            index: tmp,
            name: fx.st.var(tmp).name.clone()
        }
    );
    assert!(matches!(&code[0].args[1], AsmArg::Var { index, .. } if *index == a));
    assert!(matches!(&code[1].args[1], AsmArg::Var { index, .. } if *index == tmp));
    assert_eq!(code[1].args[2], AsmArg::LitInt(1));
    assert!(fx.st.var(a).is_source_used);
}

#[test]
fn char_operand_promotes_to_string() {
    let mut fx = Fixture::new();
    fx.declare("c", "char", true);
    let result = fx.compile("\"x\" + c").unwrap();
    assert_eq!(fx.opcodes(), vec!["CH2ST", "ADD"]);
    let typ = result.typ_index(&fx.st).unwrap();
    assert_eq!(typ, fx.st.sys().str);
}

#[test]
fn numeric_promotion_emits_a_conversion() {
    let mut fx = Fixture::new();
    fx.declare("n", "int", true);
    fx.declare("f", "float", true);
    fx.compile("n + f").unwrap();
    assert_eq!(fx.opcodes(), vec!["IN2FL", "ADD"]);
}

#[test]
fn assignment_lookahead_writes_straight_into_the_target() {
    let mut fx = Fixture::new();
    let r = fx.declare("r", "int", false);
    fx.declare("x", "int", true);
    fx.declare("y", "int", true);
    let result = fx.compile("r = x + y").unwrap();
    // No move: the addition's output slot is `r` itself and the `=` is
    // consumed in the same step.
    assert_eq!(fx.opcodes(), vec!["ADD"]);
    assert_eq!(result.var_index(), Some(r));
    assert!(fx.st.var(r).is_initialized);
    assert_eq!(fx.temp_count(), 0);
}

#[test]
fn plain_assignment_is_a_typed_move() {
    let mut fx = Fixture::new();
    let r = fx.declare("r", "int", false);
    fx.declare("x", "int", true);
    let result = fx.compile("r = x").unwrap();
    assert_eq!(fx.opcodes(), vec!["MVI"]);
    assert_eq!(result.var_index(), Some(r));
}

#[test]
fn compound_assignment_uses_the_two_operand_form() {
    let mut fx = Fixture::new();
    let x = fx.declare("x", "int", true);
    fx.compile("x += 2").unwrap();
    assert_eq!(fx.opcodes(), vec!["MVAD"]);
    let code = fx.code();
    assert!(matches!(&code[0].args[0], AsmArg::Var { index, .. } if *index == x));
    assert_eq!(code[0].args[1], AsmArg::LitInt(2));
}

#[test]
fn prefix_increment_writes_in_place_postfix_keeps_the_original() {
    let mut fx = Fixture::new();
    let x = fx.declare("x", "int", true);
    let result = fx.compile("++x").unwrap();
    assert_eq!(fx.opcodes(), vec!["INC"]);
    assert_eq!(result.var_index(), Some(x), "prefix result aliases the operand");

    let mut fx = Fixture::new();
    let x = fx.declare("x", "int", true);
    let result = fx.compile("x++").unwrap();
    assert_eq!(fx.opcodes(), vec!["PINC"]);
    assert_ne!(result.var_index(), Some(x), "postfix result is a fresh slot");
}

#[test]
fn sequence_operator_keeps_the_second_value() {
    let mut fx = Fixture::new();
    fx.declare("a", "int", true);
    let b = fx.declare("b", "int", true);
    let result = fx.compile("a -> b").unwrap();
    assert_eq!(result.var_index(), Some(b));
    assert!(fx.code().is_empty());
}

#[test]
fn declaration_with_initialization() {
    let mut fx = Fixture::new();
    let result = fx.compile("int a = 5").unwrap();
    assert_eq!(fx.opcodes(), vec!["MVI"]);
    let a = fx.st.var_search("a", &fx.scope).unwrap();
    assert_eq!(result.var_index(), Some(a));
    assert!(fx.st.var(a).is_initialized);
}

#[test]
fn var_declaration_infers_from_the_source() {
    let mut fx = Fixture::new();
    let result = fx.compile("var total = 2.5").unwrap();
    let total = fx.st.var_search("total", &fx.scope).unwrap();
    assert_eq!(result.var_index(), Some(total));
    assert_eq!(fx.st.var(total).typ, fx.st.sys().flo);
}

#[test]
fn assignment_to_a_constant_is_rejected() {
    let mut fx = Fixture::new();
    fx.declare_const("c", "int");
    assert_eq!(
        fx.compile("c = 1").unwrap_err().kind,
        ErrorKind::ConstModification
    );
    assert_eq!(
        fx.compile("c++").unwrap_err().kind,
        ErrorKind::ConstModification
    );
}

#[test]
fn assignment_to_a_non_lvalue_is_rejected() {
    let mut fx = Fixture::new();
    assert_eq!(
        fx.compile("3 = 1").unwrap_err().kind,
        ErrorKind::AssignNonLValue
    );
    assert_eq!(
        fx.compile("5++").unwrap_err().kind,
        ErrorKind::AssignNonLValue
    );
}

#[test]
fn reads_require_initialization() {
    let mut fx = Fixture::new();
    fx.declare("b", "int", false);
    assert!(matches!(
        fx.compile("b + 1").unwrap_err().kind,
        ErrorKind::UninitializedOperand(_)
    ));
    // Writing first is fine.
    fx.compile("b = 1").unwrap();
    fx.compile("b + 1").unwrap();
}

#[test]
fn operator_type_mismatch_names_the_masters() {
    let mut fx = Fixture::new();
    fx.declare("s", "string", true);
    let err = fx.compile("s * 2").unwrap_err();
    assert_eq!(
        err.to_string(),
        "operator `*` is not defined for `String` and `Integer`"
    );
}

#[test]
fn narrowing_assignment_requires_a_cast() {
    let mut fx = Fixture::new();
    fx.declare("c", "char", false);
    fx.declare("n", "int", true);
    assert!(matches!(
        fx.compile("c = n").unwrap_err().kind,
        ErrorKind::OperatorTypeMismatch { .. }
    ));
    fx.compile("c = (char)n").unwrap();
    assert_eq!(fx.opcodes(), vec!["IN2CH", "MVC"]);
}

#[test]
fn explicit_cast_between_atomics() {
    let mut fx = Fixture::new();
    fx.declare("x", "int", true);
    let result = fx.compile("(long)x").unwrap();
    assert_eq!(fx.opcodes(), vec!["IN2LO"]);
    assert_eq!(result.typ_index(&fx.st), Some(fx.st.sys().lon));
}

#[test]
fn user_operator_overload_wins_over_case_rules() {
    let mut fx = Fixture::new();
    use stave_symtab::{CallConv, FunDef, FunKind, ModIndex, ScopeDef};
    let int = fx.st.sys().int;
    fx.st.store_function(
        FunDef {
            name: "+".into(),
            kind: FunKind::Operator,
            module: ModIndex(0),
            scope: ScopeDef::module(ModIndex(0)),
            is_private: false,
            typ: Some(int),
            parm_low: 0,
            parm_count: 0,
            address: 0,
            conv: CallConv::Module,
            master: None,
            member_of: None,
            is_initializer: false,
            dl_name: None,
            syscall: None,
        },
        vec![
            ("a".into(), int, false, false),
            ("b".into(), int, false, false),
        ],
    );
    fx.declare("x", "int", true);
    fx.declare("y", "int", true);
    fx.compile("x + y").unwrap();
    assert_eq!(fx.opcodes(), vec!["PUSHI", "PUSHI", "CALL"]);
}

#[test]
fn void_result_only_flows_through_the_sequence_operator() {
    let mut fx = Fixture::new();
    use stave_symtab::{CallConv, ModIndex};
    fx.register_function("log", ModIndex(0), vec![], None, CallConv::Module, false);
    fx.declare("x", "int", true);
    // `log() -> x` is fine.
    let result = fx.compile("log() -> x").unwrap();
    assert!(result.is_operand());
    // `log() + 1` is not.
    assert!(matches!(
        fx.compile("log() + 1").unwrap_err().kind,
        ErrorKind::VoidResultUsed(_)
    ));
}
