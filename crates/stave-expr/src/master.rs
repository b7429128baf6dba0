//! Master methods: the built-in, table-dispatched methods on master types.
//!
//! [`register_master_methods`] seeds the function table with every
//! built-in signature; dispatch happens here by `(master, name)` and
//! emits the method's dedicated instruction. The generic methods `name`,
//! `type`, `sizeof`, `tobytes` and `frombytes` exist uniformly on every
//! master type and never go through the table.
//!
//! Element-generic methods (`append`, `insert` on arrays) register with a
//! placeholder parameter type; the first call site rewrites the parameter
//! entry to the receiver's element type. This is a compile-time
//! specialization: the table entry stays bound for the rest of the
//! compile.

use stave_common::{CResult, CompileError, ErrorKind, SrcInfo};
use stave_emit::{AsmArg, MetaCase, Opcode};
use stave_symtab::{
    CallConv, FunDef, FunKind, MasterType, ModIndex, ScopeDef, SymbolTable, TempKind, TypIndex,
};

use crate::blocks::copy_operand;
use crate::eval::Evaluator;
use crate::promote::compile_promotion;
use crate::token::{ExprToken, ExprTokenKind, MetaAttr};

/// What a master method returns.
#[derive(Debug, Clone, Copy, PartialEq)]
enum MmRes {
    Master(MasterType),
    /// Same concrete type as the receiver.
    Same,
    /// A fresh `string[]`.
    StrArray,
    /// The dynamic-array equivalent of a fixed receiver.
    DynOfElem,
    Void,
}

/// Formal parameter masters in the registration table. `Elem` registers a
/// placeholder bound at the first call site.
#[derive(Debug, Clone, Copy, PartialEq)]
enum MmParm {
    Master(MasterType),
    Elem,
}

struct MasterMethodSpec {
    master: MasterType,
    name: &'static str,
    parms: &'static [MmParm],
    result: MmRes,
    opcode: Opcode,
    /// Method writes through the receiver; needs a non-const lvalue.
    mutates: bool,
}

use MasterType::{Boolean, Char, DynArray, FixArray, Float, Integer, Long, Short, String as Str};
use MmParm::{Elem, Master as P};
use MmRes::{DynOfElem, Master as R, Same, StrArray, Void};

const LONG: MmParm = P(Long);
const STRP: MmParm = P(Str);

#[rustfmt::skip]
static MASTER_METHODS: &[MasterMethodSpec] = &[
    // ── Strings ────────────────────────────────────────────────────────
    MasterMethodSpec { master: Str, name: "len",        parms: &[],             result: R(Long),    opcode: Opcode::Slen,  mutates: false },
    MasterMethodSpec { master: Str, name: "trim",       parms: &[],             result: R(Str),     opcode: Opcode::Strim, mutates: false },
    MasterMethodSpec { master: Str, name: "upper",      parms: &[],             result: R(Str),     opcode: Opcode::Suppr, mutates: false },
    MasterMethodSpec { master: Str, name: "lower",      parms: &[],             result: R(Str),     opcode: Opcode::Slowr, mutates: false },
    MasterMethodSpec { master: Str, name: "swapcase",   parms: &[],             result: R(Str),     opcode: Opcode::Sswcp, mutates: false },
    MasterMethodSpec { master: Str, name: "isempty",    parms: &[],             result: R(Boolean), opcode: Opcode::Semp,  mutates: false },
    MasterMethodSpec { master: Str, name: "left",       parms: &[LONG],         result: R(Str),     opcode: Opcode::Sleft, mutates: false },
    MasterMethodSpec { master: Str, name: "right",      parms: &[LONG],         result: R(Str),     opcode: Opcode::Srght, mutates: false },
    MasterMethodSpec { master: Str, name: "cutleft",    parms: &[LONG],         result: R(Str),     opcode: Opcode::Scutl, mutates: false },
    MasterMethodSpec { master: Str, name: "cutright",   parms: &[LONG],         result: R(Str),     opcode: Opcode::Scutr, mutates: false },
    MasterMethodSpec { master: Str, name: "mid",        parms: &[LONG, LONG],   result: R(Str),     opcode: Opcode::Smid,  mutates: false },
    MasterMethodSpec { master: Str, name: "sub",        parms: &[LONG, LONG],   result: R(Str),     opcode: Opcode::Ssubs, mutates: false },
    MasterMethodSpec { master: Str, name: "find",       parms: &[STRP],         result: R(Long),    opcode: Opcode::Sfind, mutates: false },
    MasterMethodSpec { master: Str, name: "replace",    parms: &[STRP, STRP],   result: R(Str),     opcode: Opcode::Srepl, mutates: false },
    MasterMethodSpec { master: Str, name: "match",      parms: &[STRP],         result: R(Boolean), opcode: Opcode::Smatc, mutates: false },
    MasterMethodSpec { master: Str, name: "like",       parms: &[STRP],         result: R(Boolean), opcode: Opcode::Slike, mutates: false },
    MasterMethodSpec { master: Str, name: "repeat",     parms: &[LONG],         result: R(Str),     opcode: Opcode::Srepe, mutates: false },
    MasterMethodSpec { master: Str, name: "split",      parms: &[STRP],         result: StrArray,   opcode: Opcode::Sspli, mutates: false },
    MasterMethodSpec { master: Str, name: "startswith", parms: &[STRP],         result: R(Boolean), opcode: Opcode::Sstwi, mutates: false },
    MasterMethodSpec { master: Str, name: "endswith",   parms: &[STRP],         result: R(Boolean), opcode: Opcode::Senwi, mutates: false },
    MasterMethodSpec { master: Str, name: "ljust",      parms: &[LONG],         result: R(Str),     opcode: Opcode::Sljus, mutates: false },
    MasterMethodSpec { master: Str, name: "rjust",      parms: &[LONG],         result: R(Str),     opcode: Opcode::Srjus, mutates: false },
    MasterMethodSpec { master: Str, name: "concat",     parms: &[STRP],         result: R(Str),     opcode: Opcode::Sconc, mutates: false },
    MasterMethodSpec { master: Str, name: "append",     parms: &[STRP],         result: Void,       opcode: Opcode::Sappn, mutates: true },
    MasterMethodSpec { master: Str, name: "tobool",     parms: &[],             result: R(Boolean), opcode: Opcode::St2Bo, mutates: false },
    MasterMethodSpec { master: Str, name: "tochar",     parms: &[],             result: R(Char),    opcode: Opcode::St2Ch, mutates: false },
    MasterMethodSpec { master: Str, name: "toshort",    parms: &[],             result: R(Short),   opcode: Opcode::St2Sh, mutates: false },
    MasterMethodSpec { master: Str, name: "toint",      parms: &[],             result: R(Integer), opcode: Opcode::St2In, mutates: false },
    MasterMethodSpec { master: Str, name: "tolong",     parms: &[],             result: R(Long),    opcode: Opcode::St2Lo, mutates: false },
    MasterMethodSpec { master: Str, name: "tofloat",    parms: &[],             result: R(Float),   opcode: Opcode::St2Fl, mutates: false },
    // ── Numeric conversions ────────────────────────────────────────────
    MasterMethodSpec { master: Char, name: "toshort",   parms: &[], result: R(Short),   opcode: Opcode::Ch2Sh, mutates: false },
    MasterMethodSpec { master: Char, name: "toint",     parms: &[], result: R(Integer), opcode: Opcode::Ch2In, mutates: false },
    MasterMethodSpec { master: Char, name: "tolong",    parms: &[], result: R(Long),    opcode: Opcode::Ch2Lo, mutates: false },
    MasterMethodSpec { master: Char, name: "tofloat",   parms: &[], result: R(Float),   opcode: Opcode::Ch2Fl, mutates: false },
    MasterMethodSpec { master: Char, name: "tostr",     parms: &[], result: R(Str),     opcode: Opcode::Ch2St, mutates: false },
    MasterMethodSpec { master: Short, name: "tochar",   parms: &[], result: R(Char),    opcode: Opcode::Sh2Ch, mutates: false },
    MasterMethodSpec { master: Short, name: "toint",    parms: &[], result: R(Integer), opcode: Opcode::Sh2In, mutates: false },
    MasterMethodSpec { master: Short, name: "tolong",   parms: &[], result: R(Long),    opcode: Opcode::Sh2Lo, mutates: false },
    MasterMethodSpec { master: Short, name: "tofloat",  parms: &[], result: R(Float),   opcode: Opcode::Sh2Fl, mutates: false },
    MasterMethodSpec { master: Short, name: "tostr",    parms: &[], result: R(Str),     opcode: Opcode::Sh2St, mutates: false },
    MasterMethodSpec { master: Integer, name: "tochar",  parms: &[], result: R(Char),   opcode: Opcode::In2Ch, mutates: false },
    MasterMethodSpec { master: Integer, name: "toshort", parms: &[], result: R(Short),  opcode: Opcode::In2Sh, mutates: false },
    MasterMethodSpec { master: Integer, name: "tolong",  parms: &[], result: R(Long),   opcode: Opcode::In2Lo, mutates: false },
    MasterMethodSpec { master: Integer, name: "tofloat", parms: &[], result: R(Float),  opcode: Opcode::In2Fl, mutates: false },
    MasterMethodSpec { master: Integer, name: "tostr",   parms: &[], result: R(Str),    opcode: Opcode::In2St, mutates: false },
    MasterMethodSpec { master: Long, name: "tochar",    parms: &[], result: R(Char),    opcode: Opcode::Lo2Ch, mutates: false },
    MasterMethodSpec { master: Long, name: "toshort",   parms: &[], result: R(Short),   opcode: Opcode::Lo2Sh, mutates: false },
    MasterMethodSpec { master: Long, name: "toint",     parms: &[], result: R(Integer), opcode: Opcode::Lo2In, mutates: false },
    MasterMethodSpec { master: Long, name: "tofloat",   parms: &[], result: R(Float),   opcode: Opcode::Lo2Fl, mutates: false },
    MasterMethodSpec { master: Long, name: "tostr",     parms: &[], result: R(Str),     opcode: Opcode::Lo2St, mutates: false },
    MasterMethodSpec { master: Float, name: "tochar",   parms: &[], result: R(Char),    opcode: Opcode::Fl2Ch, mutates: false },
    MasterMethodSpec { master: Float, name: "toshort",  parms: &[], result: R(Short),   opcode: Opcode::Fl2Sh, mutates: false },
    MasterMethodSpec { master: Float, name: "toint",    parms: &[], result: R(Integer), opcode: Opcode::Fl2In, mutates: false },
    MasterMethodSpec { master: Float, name: "tolong",   parms: &[], result: R(Long),    opcode: Opcode::Fl2Lo, mutates: false },
    MasterMethodSpec { master: Float, name: "tostr",    parms: &[], result: R(Str),     opcode: Opcode::Fl2St, mutates: false },
    MasterMethodSpec { master: Boolean, name: "toint",  parms: &[], result: R(Integer), opcode: Opcode::Bo2In, mutates: false },
    MasterMethodSpec { master: Boolean, name: "tostr",  parms: &[], result: R(Str),     opcode: Opcode::Bo2St, mutates: false },
    // ── Dynamic arrays ─────────────────────────────────────────────────
    MasterMethodSpec { master: DynArray, name: "size",     parms: &[],           result: R(Long),    opcode: Opcode::Adsiz, mutates: false },
    MasterMethodSpec { master: DynArray, name: "empty",    parms: &[],           result: R(Boolean), opcode: Opcode::Ademp, mutates: false },
    MasterMethodSpec { master: DynArray, name: "reset",    parms: &[],           result: Void,       opcode: Opcode::Adrst, mutates: true },
    MasterMethodSpec { master: DynArray, name: "getsize",  parms: &[LONG],       result: R(Long),    opcode: Opcode::Adget, mutates: false },
    MasterMethodSpec { master: DynArray, name: "setsize",  parms: &[LONG],       result: Void,       opcode: Opcode::Adrsz, mutates: true },
    MasterMethodSpec { master: DynArray, name: "append",   parms: &[Elem],       result: Void,       opcode: Opcode::Ad1Ap, mutates: true },
    MasterMethodSpec { master: DynArray, name: "insert",   parms: &[LONG, Elem], result: Void,       opcode: Opcode::Ad1In, mutates: true },
    MasterMethodSpec { master: DynArray, name: "delete",   parms: &[LONG],       result: Void,       opcode: Opcode::Ad1De, mutates: true },
    MasterMethodSpec { master: DynArray, name: "join",     parms: &[STRP],       result: R(Str),     opcode: Opcode::Ad1Sj, mutates: false },
    MasterMethodSpec { master: DynArray, name: "joinchar", parms: &[P(Char)],    result: R(Str),     opcode: Opcode::Ad1Cj, mutates: false },
    MasterMethodSpec { master: DynArray, name: "copy",     parms: &[],           result: Same,       opcode: Opcode::Acopy, mutates: false },
    // ── Fixed arrays ───────────────────────────────────────────────────
    MasterMethodSpec { master: FixArray, name: "join",     parms: &[STRP],       result: R(Str),     opcode: Opcode::Af1Sj, mutates: false },
    MasterMethodSpec { master: FixArray, name: "joinchar", parms: &[P(Char)],    result: R(Str),     opcode: Opcode::Af1Cj, mutates: false },
    MasterMethodSpec { master: FixArray, name: "todyn",    parms: &[],           result: DynOfElem,  opcode: Opcode::Af2D,  mutates: false },
];

/// Register every master-method signature in the function table. Called
/// once per compilation, before the first expression compiles.
pub fn register_master_methods(st: &mut SymbolTable) {
    let scope = ScopeDef::global();
    let placeholder = st.word_typ();
    for (id, spec) in MASTER_METHODS.iter().enumerate() {
        let result_typ = match spec.result {
            R(master) => Some(st.atom_typ(master)),
            StrArray => {
                let str_t = st.sys().str;
                Some(st.dyn_array_of(str_t, 1, scope))
            }
            // Receiver-dependent results register with a placeholder and
            // resolve at the call site.
            Same | DynOfElem => Some(placeholder),
            Void => None,
        };
        let parms: Vec<(std::string::String, TypIndex, bool, bool)> = spec
            .parms
            .iter()
            .enumerate()
            .map(|(k, p)| match p {
                P(master) => (format!("p{k}"), st.atom_typ(*master), false, false),
                Elem => (format!("elem{k}"), placeholder, false, false),
            })
            .collect();
        st.store_function(
            FunDef {
                name: spec.name.to_string(),
                kind: FunKind::MasterMethod,
                module: ModIndex(0),
                scope,
                is_private: false,
                typ: result_typ,
                parm_low: 0,
                parm_count: 0,
                address: 0,
                conv: CallConv::System,
                master: Some(spec.master),
                member_of: None,
                is_initializer: false,
                dl_name: None,
                syscall: Some(id as u16),
            },
            parms,
        );
    }
}

fn find_spec(master: MasterType, name: &str, parm_nr: usize) -> Option<&'static MasterMethodSpec> {
    MASTER_METHODS
        .iter()
        .find(|s| s.master == master && s.name == name && s.parms.len() == parm_nr)
}

impl Evaluator<'_> {
    // ── Table-dispatched master methods ────────────────────────────────

    pub(crate) fn master_method_call(
        &mut self,
        name: &str,
        receiver: ExprToken,
        mut args: Vec<ExprToken>,
        stack: &mut Vec<ExprToken>,
        src: SrcInfo,
    ) -> CResult<()> {
        let typ = receiver.typ_index(self.st).ok_or_else(|| {
            CompileError::new(ErrorKind::MemberOnNonClass(receiver.name(self.st)), src)
        })?;
        let master = self.st.typ_master(typ);
        let spec = find_spec(master, name, args.len()).ok_or_else(|| {
            CompileError::new(
                ErrorKind::UndefinedFunction {
                    name: format!("{}.{name}", master.text()),
                    parms: self
                        .st
                        .parms_text(&self.argument_types(&args, src).unwrap_or_default()),
                },
                src,
            )
        })?;
        let fun = self
            .st
            .mmt_search_loose(master, name, args.len())
            .ok_or_else(|| {
                CompileError::new(
                    ErrorKind::Internal(format!("master method `{name}` not registered")),
                    src,
                )
            })?;

        if !receiver.is_initialized(self.st) {
            return Err(CompileError::new(
                ErrorKind::UninitializedReceiver(receiver.name(self.st)),
                src,
            ));
        }
        if spec.mutates {
            if !receiver.is_lvalue(self.st) {
                return Err(CompileError::new(
                    ErrorKind::ArgumentNotLValue {
                        fun: name.to_string(),
                        pos: 0,
                    },
                    src,
                ));
            }
            if receiver.is_const {
                return Err(CompileError::new(ErrorKind::ConstModification, src));
            }
        }
        receiver.set_source_used(self.st, &self.scope, true);

        self.specialize_element_types(fun, typ);
        // Validate and promote arguments against the (possibly just
        // specialized) parameter entries.
        let parms = self.st.fun_parms(fun);
        for (pos, (parm, arg)) in parms.iter().zip(args.iter_mut()).enumerate() {
            let parm_def = self.st.parm(*parm).clone();
            if !arg.is_initialized(self.st) {
                return Err(CompileError::new(arg.uninitialized_error(self.st), src));
            }
            let arg_typ = arg.typ_index(self.st).expect("argument is an operand");
            if !self.st.promotion_automatic(arg_typ, parm_def.typ) {
                return Err(CompileError::new(
                    ErrorKind::ArgumentTypeMismatch {
                        fun: name.to_string(),
                        pos: pos + 1,
                        expected: self.st.typ(parm_def.typ).name.clone(),
                        found: self.st.typ(arg_typ).name.clone(),
                    },
                    src,
                ));
            }
            if arg_typ != parm_def.typ
                && self.st.typ_master(arg_typ) != self.st.typ_master(parm_def.typ)
            {
                let to_master = self.st.typ_master(parm_def.typ);
                compile_promotion(self.st, self.writer, &self.scope, arg, to_master)?;
            }
            arg.set_source_used(self.st, &self.scope, true);
        }

        // Appends go through a fresh-slot reference plus a copy so the
        // element's inner blocks replicate.
        if master == MasterType::DynArray && name == "append" {
            let elem = self.st.typ(typ).elem_typ.expect("array has element type");
            let slot =
                ExprToken::new_ind(self.st, self.scope, elem, TempKind::Regular, false, src);
            let asm_args = vec![slot.asm(self.st), receiver.asm(self.st)];
            self.writer.asm_write_code(Opcode::Ad1Ap, asm_args);
            if let Some(var) = slot.var_index() {
                self.st.var_mut(var).is_initialized = true;
            }
            copy_operand(self.st, self.writer, &slot, &args[0])?;
            slot.release(self.st);
            self.finish_master(spec, None, receiver, args, stack);
            return Ok(());
        }

        let result = self.master_result(spec, typ, src);
        let mut asm_args = Vec::new();
        if let Some(result) = &result {
            asm_args.push(result.asm(self.st));
        }
        asm_args.push(receiver.asm(self.st));
        for arg in &args {
            asm_args.push(arg.asm(self.st));
        }
        if spec.opcode == Opcode::Af2D {
            let agx = crate::blocks::geometry_of(self.st, self.writer, typ);
            asm_args.push(AsmArg::Agx(agx));
        }
        self.writer.asm_write_code(spec.opcode, asm_args);
        self.finish_master(spec, result, receiver, args, stack);
        Ok(())
    }

    fn master_result(
        &mut self,
        spec: &MasterMethodSpec,
        receiver_typ: TypIndex,
        src: SrcInfo,
    ) -> Option<ExprToken> {
        let typ = match spec.result {
            R(master) => self.st.atom_typ(master),
            Same => receiver_typ,
            StrArray => {
                let str_t = self.st.sys().str;
                self.st.dyn_array_of(str_t, 1, self.scope)
            }
            DynOfElem => {
                let elem = self
                    .st
                    .typ(receiver_typ)
                    .elem_typ
                    .expect("array receiver has an element type");
                let dims = self.st.typ(receiver_typ).dim_nr;
                self.st.dyn_array_of(elem, dims, self.scope)
            }
            Void => return None,
        };
        let (token, _) = ExprToken::new_var(self.st, self.scope, typ, TempKind::Master, src);
        if let Some(var) = token.var_index() {
            self.st.var_mut(var).is_initialized = true;
        }
        Some(token)
    }

    fn finish_master(
        &mut self,
        spec: &MasterMethodSpec,
        result: Option<ExprToken>,
        receiver: ExprToken,
        args: Vec<ExprToken>,
        stack: &mut Vec<ExprToken>,
    ) {
        if spec.mutates {
            if let Some(var) = receiver.var_index() {
                self.st.var_mut(var).is_initialized = true;
            }
        }
        for arg in &args {
            arg.release(self.st);
        }
        receiver.release(self.st);
        match result {
            Some(mut token) => {
                token.is_calculated = true;
                stack.push(token);
            }
            None => {
                let mut void = ExprToken::new(
                    ExprTokenKind::VoidRes(spec.name.to_string()),
                    SrcInfo::synthetic(),
                );
                void.is_calculated = true;
                stack.push(void);
            }
        }
    }

    /// Bind the element-generic parameters of a master method to the
    /// receiver's element type at the first call site.
    fn specialize_element_types(&mut self, fun: stave_symtab::FunIndex, receiver_typ: TypIndex) {
        let elem = match self.st.typ(receiver_typ).elem_typ {
            Some(elem) => elem,
            None => return,
        };
        for parm in self.st.fun_parms(fun) {
            if !self.st.parm(parm).name.starts_with("elem") {
                continue;
            }
            self.specialized.insert(parm.0, elem);
            self.st.parm_mut(parm).typ = elem;
        }
    }

    // ── Generic meta methods ───────────────────────────────────────────

    /// `name`, `type`, `sizeof`, `tobytes`, `frombytes`: defined for
    /// every master type. Returns true when handled.
    pub(crate) fn generic_master_method(
        &mut self,
        name: &str,
        receiver: &ExprToken,
        args: &[ExprToken],
        stack: &mut Vec<ExprToken>,
        src: SrcInfo,
    ) -> CResult<bool> {
        let typ = match receiver.typ_index(self.st) {
            Some(typ) => typ,
            None => return Ok(false),
        };
        match (name, args.len()) {
            ("name", 0) => {
                let text = receiver
                    .var_index()
                    .map(|v| self.st.var(v).name.clone())
                    .unwrap_or_else(|| receiver.name(self.st));
                let adr = self.writer.store_lit_string(&text);
                let mut token = ExprToken::this_str(self.st, adr, src);
                token.meta = Some(MetaAttr {
                    case: MetaCase::VarName,
                    typ: None,
                    var: receiver.var_index(),
                });
                receiver.release(self.st);
                stack.push(token);
                Ok(true)
            }
            ("type", 0) => {
                let text = self.st.typ(typ).name.clone();
                let adr = self.writer.store_lit_string(&text);
                let mut token = ExprToken::this_str(self.st, adr, src);
                token.meta = Some(MetaAttr {
                    case: MetaCase::TypName,
                    typ: Some(typ),
                    var: None,
                });
                receiver.release(self.st);
                stack.push(token);
                Ok(true)
            }
            ("sizeof", 0) => {
                let length = self.st.typ(typ).length;
                receiver.release(self.st);
                stack.push(ExprToken::this_wrd(self.st, length, src));
                Ok(true)
            }
            ("tobytes", 0) => {
                if !receiver.is_initialized(self.st) {
                    return Err(CompileError::new(
                        ErrorKind::UninitializedReceiver(receiver.name(self.st)),
                        src,
                    ));
                }
                receiver.set_source_used(self.st, &self.scope, true);
                let master = self.st.typ_master(typ);
                let opcode = match master {
                    MasterType::String => Opcode::Stoca,
                    _ => Opcode::Toca,
                };
                let chr = self.st.sys().chr;
                let bytes = self.st.dyn_array_of(chr, 1, self.scope);
                let (result, _) =
                    ExprToken::new_var(self.st, self.scope, bytes, TempKind::Master, src);
                if let Some(var) = result.var_index() {
                    self.st.var_mut(var).is_initialized = true;
                }
                let asm_args = vec![result.asm(self.st), receiver.asm(self.st)];
                self.writer.asm_write_code(opcode, asm_args);
                receiver.release(self.st);
                let mut result = result;
                result.is_calculated = true;
                stack.push(result);
                Ok(true)
            }
            ("frombytes", 1) => {
                if !receiver.is_lvalue(self.st) {
                    return Err(CompileError::new(
                        ErrorKind::ArgumentNotLValue {
                            fun: "frombytes".to_string(),
                            pos: 0,
                        },
                        src,
                    ));
                }
                if receiver.is_const {
                    return Err(CompileError::new(ErrorKind::ConstModification, src));
                }
                let arg = &args[0];
                if !arg.is_initialized(self.st) {
                    return Err(CompileError::new(arg.uninitialized_error(self.st), src));
                }
                let arg_typ = arg.typ_index(self.st).expect("argument is an operand");
                let chr = self.st.sys().chr;
                let bytes = self.st.dyn_array_of(chr, 1, self.scope);
                if !self.st.equivalent_arrays(arg_typ, bytes) {
                    return Err(CompileError::new(
                        ErrorKind::ArgumentTypeMismatch {
                            fun: "frombytes".to_string(),
                            pos: 1,
                            expected: self.st.typ(bytes).name.clone(),
                            found: self.st.typ(arg_typ).name.clone(),
                        },
                        src,
                    ));
                }
                arg.set_source_used(self.st, &self.scope, true);
                let master = self.st.typ_master(typ);
                let opcode = match master {
                    MasterType::String => Opcode::Sfrca,
                    MasterType::FixArray | MasterType::DynArray => Opcode::Afrca,
                    _ => Opcode::Frca,
                };
                let asm_args = vec![receiver.asm(self.st), arg.asm(self.st)];
                self.writer.asm_write_code(opcode, asm_args);
                if let Some(var) = receiver.var_index() {
                    self.st.var_mut(var).is_initialized = true;
                }
                arg.release(self.st);
                receiver.release(self.st);
                let mut void = ExprToken::new(
                    ExprTokenKind::VoidRes("frombytes".to_string()),
                    SrcInfo::synthetic(),
                );
                void.is_calculated = true;
                stack.push(void);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
