//! Expression tokens.
//!
//! [`ExprToken`] is the value every pipeline stage exchanges: the tokenizer
//! produces them, the ternary binder and RPN converter reorder them, and
//! the evaluator consumes them. The variant payload lives in
//! [`ExprTokenKind`]; attributes orthogonal to the variant (position,
//! flags, back-references, label seeds) are members of the outer struct.

use serde::Serialize;

use stave_common::cpu::{CpuAdr, CpuBol, CpuChr, CpuFlo, CpuInt, CpuLon, CpuShr};
use stave_common::{ErrorKind, SrcInfo};
use stave_emit::{AsmArg, MetaCase};
use stave_symtab::{
    ArrayIndexes, MasterType, ModIndex, ScopeDef, SymbolTable, TempKind, TypIndex, VarIndex,
};

use crate::oper::{ExprDelimiter, ExprOperator, FlowOpr, LowLevelOpr};

/// How an operand names its storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AdrMode {
    /// Literal inlined in the instruction.
    LitValue,
    /// Direct variable address.
    Address,
    /// Access through a reference slot.
    Indirection,
}

/// A literal payload. Strings live in the emitter's literal table and the
/// token carries the address.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum Lit {
    Bol(CpuBol),
    Chr(CpuChr),
    Shr(CpuShr),
    Int(CpuInt),
    Lon(CpuLon),
    Flo(CpuFlo),
    Str(CpuAdr),
    Enu(CpuInt),
}

/// Payload of an `Operand` token. The addressing mode is structural:
/// literals carry their type and value, variables and indirections carry
/// the backing variable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum OperandData {
    Lit { typ: TypIndex, value: Lit },
    Var { var: VarIndex },
    Ind { var: VarIndex },
}

/// Reflective-constant attribute.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetaAttr {
    pub case: MetaCase,
    pub typ: Option<TypIndex>,
    pub var: Option<VarIndex>,
}

/// The variant of an expression token.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ExprTokenKind {
    /// A value: literal, variable, or indirection.
    Operand(OperandData),
    /// An identifier that resolved to nothing yet (`var x = ...`).
    UndefVar(String),
    /// An expression operator.
    Operator(ExprOperator),
    /// A ternary low-level operator.
    LowLevelOpr(LowLevelOpr),
    /// A `for`/`array` flow operator. `ArrOnvar`/`ArrOxvar`/`ArrIxvar`
    /// carry the name of the variable they introduce.
    FlowOpr { opr: FlowOpr, name: Option<String> },
    /// A field access, pending resolution against the class operand.
    Field(String),
    /// A member-method call with its argument count.
    Method { name: String, parm_nr: usize },
    /// A constructor call on a class type.
    Constructor { typ: TypIndex, parm_nr: usize },
    /// A synthetic array subscript with its dimension count.
    Subscript { dim_nr: usize },
    /// A function call with its module and argument count.
    Function {
        name: String,
        module: ModIndex,
        parm_nr: usize,
    },
    /// A complex `{...}` initializer for `typ`.
    Complex { typ: TypIndex },
    /// A grouping delimiter (only survives until RPN conversion).
    Delimiter(ExprDelimiter),
    /// Result slot of a void call; poisons non-sequence consumers.
    VoidRes(String),
}

/// One expression token: variant payload plus orthogonal attributes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExprToken {
    pub kind: ExprTokenKind,
    pub src: SrcInfo,
    /// Token denotes a constant; writes are rejected.
    pub is_const: bool,
    /// Produced by an operator or call, not a leaf.
    pub is_calculated: bool,
    /// Freshly declared variable with a `*` initializer sigil.
    pub has_initialization: bool,
    /// Variable to receive `is_source_used`, when it is not the backing
    /// variable itself (subscript and field chains).
    pub source_var: Option<VarIndex>,
    /// Cast target, for `Operator(TypeCast)` tokens.
    pub cast_typ: Option<TypIndex>,
    /// Ternary label seed.
    pub label_seed: Option<CpuLon>,
    /// Flow label.
    pub flow_label: Option<CpuLon>,
    /// Reflective-constant attribute.
    pub meta: Option<MetaAttr>,
    /// Dimension sizes, for complex array initializers.
    pub dim_size: Option<(usize, ArrayIndexes)>,
}

impl ExprToken {
    /// Bare token of a kind; attributes start clear.
    pub fn new(kind: ExprTokenKind, src: SrcInfo) -> Self {
        Self {
            kind,
            src,
            is_const: false,
            is_calculated: false,
            has_initialization: false,
            source_var: None,
            cast_typ: None,
            label_seed: None,
            flow_label: None,
            meta: None,
            dim_size: None,
        }
    }

    // ── Literal constructors ───────────────────────────────────────────

    fn lit(typ: TypIndex, value: Lit, src: SrcInfo) -> Self {
        let mut token = Self::new(
            ExprTokenKind::Operand(OperandData::Lit { typ, value }),
            src,
        );
        token.is_const = true;
        token
    }

    pub fn this_bol(st: &SymbolTable, value: CpuBol, src: SrcInfo) -> Self {
        Self::lit(st.sys().bol, Lit::Bol(value), src)
    }

    pub fn this_chr(st: &SymbolTable, value: CpuChr, src: SrcInfo) -> Self {
        Self::lit(st.sys().chr, Lit::Chr(value), src)
    }

    pub fn this_shr(st: &SymbolTable, value: CpuShr, src: SrcInfo) -> Self {
        Self::lit(st.sys().shr, Lit::Shr(value), src)
    }

    pub fn this_int(st: &SymbolTable, value: CpuInt, src: SrcInfo) -> Self {
        Self::lit(st.sys().int, Lit::Int(value), src)
    }

    pub fn this_lon(st: &SymbolTable, value: CpuLon, src: SrcInfo) -> Self {
        Self::lit(st.sys().lon, Lit::Lon(value), src)
    }

    pub fn this_flo(st: &SymbolTable, value: CpuFlo, src: SrcInfo) -> Self {
        Self::lit(st.sys().flo, Lit::Flo(value), src)
    }

    pub fn this_str(st: &SymbolTable, address: CpuAdr, src: SrcInfo) -> Self {
        Self::lit(st.sys().str, Lit::Str(address), src)
    }

    pub fn this_enu(typ: TypIndex, value: CpuInt, src: SrcInfo) -> Self {
        let mut token = Self::new(
            ExprTokenKind::Operand(OperandData::Lit {
                typ,
                value: Lit::Enu(value),
            }),
            src,
        );
        token.is_const = true;
        token
    }

    /// Word literal (subscript indexes, sizes); words are longs.
    pub fn this_wrd(st: &SymbolTable, value: CpuLon, src: SrcInfo) -> Self {
        Self::lit(st.word_typ(), Lit::Lon(value), src)
    }

    // ── Variable constructors ──────────────────────────────────────────

    /// Token for an existing variable (direct address).
    pub fn this_var(st: &SymbolTable, var: VarIndex, src: SrcInfo) -> Self {
        let mut token = Self::new(ExprTokenKind::Operand(OperandData::Var { var }), src);
        token.is_const = st.var(var).is_const;
        token
    }

    /// Token for an existing variable accessed through indirection.
    pub fn this_ind(st: &SymbolTable, var: VarIndex, src: SrcInfo) -> Self {
        let mut token = Self::new(ExprTokenKind::Operand(OperandData::Ind { var }), src);
        token.is_const = st.var(var).is_const;
        token
    }

    /// Allocate a temporary of `typ` and wrap it as a direct operand. The
    /// temporary arrives locked.
    pub fn new_var(
        st: &mut SymbolTable,
        scope: ScopeDef,
        typ: TypIndex,
        kind: TempKind,
        src: SrcInfo,
    ) -> (Self, bool) {
        let (var, reused) = st.temp_var_new(scope, typ, kind);
        let mut token = Self::new(ExprTokenKind::Operand(OperandData::Var { var }), src);
        token.is_calculated = true;
        (token, reused)
    }

    /// Allocate an indirection temporary of `typ`.
    pub fn new_ind(
        st: &mut SymbolTable,
        scope: ScopeDef,
        typ: TypIndex,
        kind: TempKind,
        is_const: bool,
        src: SrcInfo,
    ) -> Self {
        let (var, _) = st.temp_var_new(scope, typ, kind);
        st.var_mut(var).is_reference = true;
        let mut token = Self::new(ExprTokenKind::Operand(OperandData::Ind { var }), src);
        token.is_const = is_const;
        token.is_calculated = true;
        token
    }

    // ── Probes ─────────────────────────────────────────────────────────

    pub fn is_operand(&self) -> bool {
        matches!(self.kind, ExprTokenKind::Operand(_))
    }

    pub fn operand(&self) -> Option<&OperandData> {
        match &self.kind {
            ExprTokenKind::Operand(data) => Some(data),
            _ => None,
        }
    }

    pub fn adr_mode(&self) -> Option<AdrMode> {
        match &self.kind {
            ExprTokenKind::Operand(OperandData::Lit { .. }) => Some(AdrMode::LitValue),
            ExprTokenKind::Operand(OperandData::Var { .. }) => Some(AdrMode::Address),
            ExprTokenKind::Operand(OperandData::Ind { .. }) => Some(AdrMode::Indirection),
            _ => None,
        }
    }

    pub fn is_lit_value(&self) -> bool {
        self.adr_mode() == Some(AdrMode::LitValue)
    }

    /// The literal payload, for literal operands.
    pub fn lit_value(&self) -> Option<Lit> {
        match &self.kind {
            ExprTokenKind::Operand(OperandData::Lit { value, .. }) => Some(*value),
            _ => None,
        }
    }

    /// Backing variable, for address and indirection operands.
    pub fn var_index(&self) -> Option<VarIndex> {
        match &self.kind {
            ExprTokenKind::Operand(OperandData::Var { var })
            | ExprTokenKind::Operand(OperandData::Ind { var }) => Some(*var),
            _ => None,
        }
    }

    /// Type of the operand: the literal type or the backing variable's.
    pub fn typ_index(&self, st: &SymbolTable) -> Option<TypIndex> {
        match &self.kind {
            ExprTokenKind::Operand(OperandData::Lit { typ, .. }) => Some(*typ),
            ExprTokenKind::Operand(OperandData::Var { var })
            | ExprTokenKind::Operand(OperandData::Ind { var }) => Some(st.var(*var).typ),
            _ => None,
        }
    }

    pub fn master(&self, st: &SymbolTable) -> Option<MasterType> {
        self.typ_index(st).map(|t| st.typ_master(t))
    }

    /// A storage location the VM can write: a variable or an indirection,
    /// never a literal or a computed temporary.
    pub fn is_lvalue(&self, st: &SymbolTable) -> bool {
        match &self.kind {
            ExprTokenKind::Operand(OperandData::Lit { .. }) => false,
            ExprTokenKind::Operand(OperandData::Var { var }) => {
                !(self.is_calculated && st.var(*var).is_temp)
            }
            ExprTokenKind::Operand(OperandData::Ind { .. }) => true,
            _ => false,
        }
    }

    /// Initialization state: literals always, variables per their flag,
    /// calculated results always.
    pub fn is_initialized(&self, st: &SymbolTable) -> bool {
        if self.is_calculated {
            return true;
        }
        match &self.kind {
            ExprTokenKind::Operand(OperandData::Lit { .. }) => true,
            ExprTokenKind::Operand(OperandData::Var { var })
            | ExprTokenKind::Operand(OperandData::Ind { var }) => st.var(*var).is_initialized,
            _ => false,
        }
    }

    // ── Temporary lifetime ─────────────────────────────────────────────

    /// Drop this token's live reference to its backing temporary.
    pub fn release(&self, st: &mut SymbolTable) {
        if let Some(var) = self.var_index() {
            st.temp_unlock(var);
        }
    }

    /// Re-take a live reference on the backing temporary.
    pub fn lock(&self, st: &mut SymbolTable) {
        if let Some(var) = self.var_index() {
            st.temp_lock(var);
        }
    }

    /// Propagate use to the source variable (through subscript/field
    /// chains) or to the backing variable itself.
    pub fn set_source_used(&self, st: &mut SymbolTable, scope: &ScopeDef, forced: bool) {
        let target = self.source_var.or_else(|| self.var_index());
        if let Some(var) = target {
            st.set_source_used(var, scope, forced);
        }
    }

    // ── Emission ───────────────────────────────────────────────────────

    /// Instruction argument for this operand.
    pub fn asm(&self, st: &SymbolTable) -> AsmArg {
        if let Some(meta) = &self.meta {
            let index = meta
                .typ
                .map(|t| t.0)
                .or_else(|| meta.var.map(|v| v.0))
                .unwrap_or(0);
            return AsmArg::Mta {
                case: meta.case,
                index,
            };
        }
        match &self.kind {
            ExprTokenKind::Operand(OperandData::Lit { value, .. }) => match value {
                Lit::Bol(v) => AsmArg::LitBol(*v),
                Lit::Chr(v) => AsmArg::LitChr(*v),
                Lit::Shr(v) => AsmArg::LitShr(*v),
                Lit::Int(v) => AsmArg::LitInt(*v),
                Lit::Lon(v) => AsmArg::LitLon(*v),
                Lit::Flo(v) => AsmArg::LitFlo(*v),
                Lit::Str(adr) => AsmArg::LitStr(*adr),
                Lit::Enu(v) => AsmArg::LitInt(*v),
            },
            ExprTokenKind::Operand(OperandData::Var { var }) => AsmArg::Var {
                index: *var,
                name: st.var(*var).name.clone(),
            },
            ExprTokenKind::Operand(OperandData::Ind { var }) => AsmArg::Ind {
                index: *var,
                name: st.var(*var).name.clone(),
            },
            _ => AsmArg::Err,
        }
    }

    /// Printable name for diagnostics.
    pub fn name(&self, st: &SymbolTable) -> String {
        match &self.kind {
            ExprTokenKind::Operand(OperandData::Lit { value, .. }) => match value {
                Lit::Bol(v) => v.to_string(),
                Lit::Chr(v) => format!("'{}'", *v as char),
                Lit::Shr(v) => v.to_string(),
                Lit::Int(v) => v.to_string(),
                Lit::Lon(v) => v.to_string(),
                Lit::Flo(v) => v.to_string(),
                Lit::Str(adr) => format!("str:{adr}"),
                Lit::Enu(v) => v.to_string(),
            },
            ExprTokenKind::Operand(OperandData::Var { var })
            | ExprTokenKind::Operand(OperandData::Ind { var }) => st.var(*var).name.clone(),
            ExprTokenKind::UndefVar(name) => name.clone(),
            ExprTokenKind::Operator(opr) => opr.def().text.to_string(),
            ExprTokenKind::LowLevelOpr(low) => format!("{low:?}"),
            ExprTokenKind::FlowOpr { opr, .. } => format!("{opr:?}"),
            ExprTokenKind::Field(name) => format!(".{name}"),
            ExprTokenKind::Method { name, .. } => format!(".{name}()"),
            ExprTokenKind::Constructor { typ, .. } => format!("{}()", st.typ(*typ).name),
            ExprTokenKind::Subscript { dim_nr } => format!("[{dim_nr}]"),
            ExprTokenKind::Function { name, .. } => format!("{name}()"),
            ExprTokenKind::Complex { typ } => format!("{}{{}}", st.typ(*typ).name),
            ExprTokenKind::Delimiter(delim) => delim.text().to_string(),
            ExprTokenKind::VoidRes(name) => format!("void:{name}"),
        }
    }

    /// Error kind for a use-before-init on this token.
    pub fn uninitialized_error(&self, st: &SymbolTable) -> ErrorKind {
        ErrorKind::UninitializedOperand(self.name(st))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stave_common::span::FileId;
    use stave_symtab::VarAttrs;

    fn src() -> SrcInfo {
        SrcInfo::new(FileId(0), 1, 1)
    }

    #[test]
    fn literal_tokens_are_const_and_initialized() {
        let st = SymbolTable::new("main");
        let token = ExprToken::this_int(&st, 7, src());
        assert!(token.is_const);
        assert!(token.is_initialized(&st));
        assert!(!token.is_lvalue(&st));
        assert_eq!(token.adr_mode(), Some(AdrMode::LitValue));
        assert_eq!(token.master(&st), Some(MasterType::Integer));
    }

    #[test]
    fn variable_tokens_track_their_entry() {
        let mut st = SymbolTable::new("main");
        let int = st.sys().int;
        let (var, _) = st.store_variable("a", int, ScopeDef::global(), VarAttrs::default());
        let token = ExprToken::this_var(&st, var, src());
        assert!(token.is_lvalue(&st));
        assert!(!token.is_initialized(&st));
        st.var_mut(var).is_initialized = true;
        assert!(token.is_initialized(&st));
        assert_eq!(token.typ_index(&st), Some(int));
    }

    #[test]
    fn calculated_temp_is_not_an_lvalue() {
        let mut st = SymbolTable::new("main");
        let int = st.sys().int;
        let (token, _) =
            ExprToken::new_var(&mut st, ScopeDef::global(), int, TempKind::Regular, src());
        assert!(!token.is_lvalue(&st));
        assert!(token.is_initialized(&st));
        // Release then lock round-trips the lock count.
        token.release(&mut st);
        assert!(!st.var(token.var_index().unwrap()).is_locked());
        token.lock(&mut st);
        assert!(st.var(token.var_index().unwrap()).is_locked());
    }

    #[test]
    fn indirection_is_always_lvalue() {
        let mut st = SymbolTable::new("main");
        let int = st.sys().int;
        let token = ExprToken::new_ind(
            &mut st,
            ScopeDef::global(),
            int,
            TempKind::Regular,
            false,
            src(),
        );
        assert!(token.is_lvalue(&st));
        assert_eq!(token.adr_mode(), Some(AdrMode::Indirection));
    }

    #[test]
    fn asm_renders_operands() {
        let mut st = SymbolTable::new("main");
        let int = st.sys().int;
        let lit = ExprToken::this_int(&st, 42, src());
        assert_eq!(lit.asm(&st), AsmArg::LitInt(42));
        let (var, _) = st.store_variable("count", int, ScopeDef::global(), VarAttrs::default());
        let tok = ExprToken::this_var(&st, var, src());
        assert!(matches!(tok.asm(&st), AsmArg::Var { name, .. } if name == "count"));
    }
}
