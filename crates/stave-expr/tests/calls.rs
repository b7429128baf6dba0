//! Function, method, constructor, and master-method calls.

use stave_common::ErrorKind;
use stave_emit::AsmArg;
use stave_symtab::{CallConv, FunKind, MasterType, ModIndex};

mod common;
use common::Fixture;

#[test]
fn module_call_pushes_arguments_then_calls() {
    let mut fx = Fixture::new();
    fx.register_function(
        "max",
        ModIndex(0),
        vec![("int", false, false), ("int", false, false)],
        Some("int"),
        CallConv::Module,
        false,
    );
    let result = fx.compile("max(1, 2)").unwrap();
    assert_eq!(fx.opcodes(), vec!["PUSHI", "PUSHI", "CALL"]);
    assert_eq!(result.typ_index(&fx.st), Some(fx.st.sys().int));
    assert!(result.is_initialized(&fx.st));
}

#[test]
fn local_call_moves_into_parameter_slots() {
    let mut fx = Fixture::new();
    fx.register_function(
        "helper",
        ModIndex(0),
        vec![("long", false, false)],
        Some("long"),
        CallConv::Local,
        false,
    );
    fx.compile("helper(5L)").unwrap();
    assert_eq!(fx.opcodes(), vec!["MVL", "CALLN"]);
    let code = fx.code();
    assert!(matches!(&code[0].args[0], AsmArg::Par { .. }));
}

#[test]
fn dynamic_library_call_pushes_with_flags() {
    let mut fx = Fixture::new();
    let fun = fx.register_function(
        "getenv",
        ModIndex(0),
        vec![("string", false, false)],
        Some("string"),
        CallConv::DynLib,
        false,
    );
    let _ = fun;
    fx.compile("getenv(\"HOME\")").unwrap();
    assert_eq!(fx.opcodes(), vec!["LPUR", "LCALL"]);
    assert_eq!(fx.writer.dl_calls().len(), 1);
}

#[test]
fn arguments_promote_to_the_parameter_type() {
    let mut fx = Fixture::new();
    fx.register_function(
        "scale",
        ModIndex(0),
        vec![("float", false, false)],
        Some("float"),
        CallConv::Module,
        false,
    );
    fx.declare("n", "int", true);
    fx.compile("scale(n)").unwrap();
    assert_eq!(fx.opcodes(), vec!["IN2FL", "PUSHF", "CALL"]);
}

#[test]
fn overloads_resolve_by_argument_types() {
    let mut fx = Fixture::new();
    let f_int = fx.register_function(
        "pick",
        ModIndex(0),
        vec![("int", false, false)],
        Some("int"),
        CallConv::Module,
        false,
    );
    let f_str = fx.register_function(
        "pick",
        ModIndex(0),
        vec![("string", false, false)],
        Some("string"),
        CallConv::Module,
        false,
    );
    let result = fx.compile("pick(\"a\")").unwrap();
    assert_eq!(result.typ_index(&fx.st), Some(fx.st.sys().str));
    let result = fx.compile("pick(3)").unwrap();
    assert_eq!(result.typ_index(&fx.st), Some(fx.st.sys().int));
    let _ = (f_int, f_str);
}

#[test]
fn unknown_overload_reports_the_argument_types() {
    let mut fx = Fixture::new();
    fx.register_function(
        "pick",
        ModIndex(0),
        vec![("int", false, false)],
        Some("int"),
        CallConv::Module,
        false,
    );
    fx.declare("b", "bool", true);
    let err = fx.compile("pick(b)").unwrap_err();
    assert_eq!(err.to_string(), "no matching overload for `pick(bool)`");
}

#[test]
fn private_functions_are_module_local() {
    let mut fx = Fixture::new();
    let util = fx.st.store_module("util", Some("util".to_string()));
    fx.register_function(
        "secret",
        util,
        vec![],
        Some("int"),
        CallConv::Module,
        true,
    );
    let err = fx.compile("util.secret()").unwrap_err();
    assert!(matches!(err.kind, ErrorKind::PrivateFunction { .. }));
}

#[test]
fn tracker_alias_reaches_module_functions() {
    let mut fx = Fixture::new();
    let util = fx.st.store_module("util", Some("util".to_string()));
    fx.register_function("answer", util, vec![], Some("int"), CallConv::Module, false);
    let result = fx.compile("util.answer()").unwrap();
    assert_eq!(fx.opcodes(), vec!["CALL"]);
    assert_eq!(result.typ_index(&fx.st), Some(fx.st.sys().int));
}

#[test]
fn reference_parameters_require_lvalues() {
    let mut fx = Fixture::new();
    fx.register_function(
        "bump",
        ModIndex(0),
        vec![("int", true, false)],
        None,
        CallConv::Module,
        false,
    );
    let err = fx.compile("bump(3)").unwrap_err();
    assert!(matches!(err.kind, ErrorKind::ArgumentNotLValue { .. }));
    // A variable passes, by reference push.
    fx.declare("v", "int", true);
    fx.compile_void("bump(v)").unwrap();
    assert_eq!(fx.opcodes(), vec!["REFPU", "CALL"]);
}

#[test]
fn const_arguments_cannot_bind_mutable_references() {
    let mut fx = Fixture::new();
    fx.register_function(
        "bump",
        ModIndex(0),
        vec![("int", true, false)],
        None,
        CallConv::Module,
        false,
    );
    fx.declare_const("k", "int");
    let err = fx.compile("bump(k)").unwrap_err();
    assert!(matches!(err.kind, ErrorKind::ArgumentConst { .. }));
}

#[test]
fn string_literals_may_pass_by_reference() {
    let mut fx = Fixture::new();
    fx.register_function(
        "read",
        ModIndex(0),
        vec![("string", true, true)],
        Some("int"),
        CallConv::Module,
        false,
    );
    fx.compile("read(\"data\")").unwrap();
    assert_eq!(fx.opcodes(), vec!["REFPU", "CALL"]);
}

#[test]
fn member_functions_dispatch_on_the_class() {
    let mut fx = Fixture::new();
    let point = fx.register_class("point", vec![("x", "int", false), ("y", "int", false)]);
    let int = fx.st.sys().int;
    fx.st.store_function(
        stave_symtab::FunDef {
            name: "norm".into(),
            kind: FunKind::Member,
            module: ModIndex(0),
            scope: stave_symtab::ScopeDef::module(ModIndex(0)),
            is_private: false,
            typ: Some(int),
            parm_low: 0,
            parm_count: 0,
            address: 0,
            conv: CallConv::Module,
            master: None,
            member_of: Some(point),
            is_initializer: false,
            dl_name: None,
            syscall: None,
        },
        vec![],
    );
    fx.declare_typed("p", point, true);
    fx.compile("p.norm()").unwrap();
    // Receiver pushes by reference, then the call.
    assert_eq!(fx.opcodes(), vec!["REFPU", "CALL"]);
}

#[test]
fn member_call_on_uninitialized_receiver_is_rejected() {
    let mut fx = Fixture::new();
    let point = fx.register_class("point", vec![("x", "int", false)]);
    let int = fx.st.sys().int;
    fx.st.store_function(
        stave_symtab::FunDef {
            name: "norm".into(),
            kind: FunKind::Member,
            module: ModIndex(0),
            scope: stave_symtab::ScopeDef::module(ModIndex(0)),
            is_private: false,
            typ: Some(int),
            parm_low: 0,
            parm_count: 0,
            address: 0,
            conv: CallConv::Module,
            master: None,
            member_of: Some(point),
            is_initializer: false,
            dl_name: None,
            syscall: None,
        },
        vec![],
    );
    fx.declare_typed("p", point, false);
    let err = fx.compile("p.norm()").unwrap_err();
    assert!(matches!(err.kind, ErrorKind::UninitializedReceiver(_)));
}

#[test]
fn master_methods_emit_their_dedicated_instruction() {
    let mut fx = Fixture::new();
    fx.declare("s", "string", true);
    let result = fx.compile("s.len()").unwrap();
    assert_eq!(fx.opcodes(), vec!["SLEN"]);
    assert_eq!(result.typ_index(&fx.st), Some(fx.st.sys().lon));

    let mut fx = Fixture::new();
    fx.declare("s", "string", true);
    fx.compile("s.trim().len()").unwrap();
    assert_eq!(fx.opcodes(), vec!["STRIM", "SLEN"]);
}

#[test]
fn conversion_methods_mirror_the_cast_instructions() {
    let mut fx = Fixture::new();
    fx.declare("n", "int", true);
    let result = fx.compile("n.tostr()").unwrap();
    assert_eq!(fx.opcodes(), vec!["IN2ST"]);
    assert_eq!(result.typ_index(&fx.st), Some(fx.st.sys().str));
}

#[test]
fn array_append_binds_the_element_type() {
    let mut fx = Fixture::new();
    fx.declare_dyn_array("a", "int", true);
    fx.declare("v", "int", true);
    fx.compile_void("a.append(v)").unwrap();
    assert_eq!(fx.opcodes(), vec!["AD1AP", "MVI"]);
    // The parameter entry was specialized to the receiver's element type.
    let fun = fx
        .st
        .mmt_search_loose(MasterType::DynArray, "append", 1)
        .unwrap();
    let parm = fx.st.fun_parms(fun)[0];
    assert_eq!(fx.st.parm(parm).typ, fx.st.sys().int);
}

#[test]
fn mutating_master_methods_need_a_writable_receiver() {
    let mut fx = Fixture::new();
    let a = fx.declare_dyn_array("a", "int", true);
    fx.st.var_mut(a).is_const = true;
    fx.declare("v", "int", true);
    let err = fx.compile_void("a.append(v)").unwrap_err();
    assert_eq!(err.kind, ErrorKind::ConstModification);
}

#[test]
fn generic_sizeof_folds_to_the_type_length() {
    let mut fx = Fixture::new();
    fx.declare("n", "int", true);
    let result = fx.compile("n.sizeof()").unwrap();
    assert_eq!(result.lit_value(), Some(stave_expr::Lit::Lon(4)));
    assert!(fx.code().is_empty());
}

#[test]
fn generic_tobytes_and_frombytes() {
    let mut fx = Fixture::new();
    fx.declare("n", "long", true);
    let result = fx.compile("n.tobytes()").unwrap();
    assert_eq!(fx.opcodes(), vec!["TOCA"]);
    let typ = result.typ_index(&fx.st).unwrap();
    assert_eq!(fx.st.typ(typ).elem_typ, Some(fx.st.sys().chr));

    let mut fx = Fixture::new();
    fx.declare("n", "long", false);
    fx.declare_dyn_array("bytes", "char", true);
    fx.compile_void("n.frombytes(bytes)").unwrap();
    assert_eq!(fx.opcodes(), vec!["FRCA"]);
    let n = fx.st.var_search("n", &fx.scope).unwrap();
    assert!(fx.st.var(n).is_initialized);
}

#[test]
fn constructor_builds_and_initializes_the_instance() {
    let mut fx = Fixture::new();
    let point = fx.register_class("point", vec![("x", "int", false), ("y", "int", false)]);
    let int = fx.st.sys().int;
    fx.st.store_function(
        stave_symtab::FunDef {
            name: "point".into(),
            kind: FunKind::Member,
            module: ModIndex(0),
            scope: stave_symtab::ScopeDef::module(ModIndex(0)),
            is_private: false,
            typ: None,
            parm_low: 0,
            parm_count: 0,
            address: 0,
            conv: CallConv::Module,
            master: None,
            member_of: Some(point),
            is_initializer: true,
            dl_name: None,
            syscall: None,
        },
        vec![
            ("x".into(), int, false, false),
            ("y".into(), int, false, false),
        ],
    );
    let result = fx.compile("point(1, 2)").unwrap();
    assert_eq!(fx.opcodes(), vec!["REFPU", "PUSHI", "PUSHI", "CALL"]);
    assert_eq!(result.typ_index(&fx.st), Some(point));
}
