//! Stage 4: the RPN evaluator.
//!
//! A stack machine over expression tokens. Operands push; operators pop,
//! type-check through the case-rule table, resolve user overloads, drive
//! promotion, allocate temporaries, and emit VM instructions. Literal-only
//! operations short-circuit through the constant folder and emit nothing.
//!
//! Call handling lives in `calls.rs`, ternary and flow state machines in
//! `flow.rs`, master methods in `master.rs`; they all extend [`Evaluator`].

use rustc_hash::FxHashMap;

use stave_common::{CResult, CompileError, Diagnostics, ErrorKind};
use stave_emit::{AsmArg, BinaryWriter, Opcode};
use stave_symtab::{MasterType, ScopeDef, SymbolTable, TempKind, TypIndex, VarAttrs};

use crate::blocks::{self, copy_operand, init_operand, same_operand};
use crate::cases::find_case_rule;
use crate::flow::{FlowContext, TernarySeed};
use crate::fold;
use crate::oper::ExprOperator;
use crate::promote::{self, apply_case_promotions};
use crate::token::{ExprToken, ExprTokenKind};

/// Evaluator state over one expression compile.
pub struct Evaluator<'a> {
    pub st: &'a mut SymbolTable,
    pub writer: &'a mut BinaryWriter,
    pub diag: &'a mut Diagnostics,
    pub scope: ScopeDef,
    pub(crate) ternary: Vec<TernarySeed>,
    pub(crate) flow: Vec<FlowContext>,
    /// Parameter entries already specialized to an element type.
    pub(crate) specialized: FxHashMap<usize, TypIndex>,
}

impl<'a> Evaluator<'a> {
    pub fn new(
        st: &'a mut SymbolTable,
        writer: &'a mut BinaryWriter,
        diag: &'a mut Diagnostics,
        scope: ScopeDef,
    ) -> Self {
        Self {
            st,
            writer,
            diag,
            scope,
            ternary: Vec::new(),
            flow: Vec::new(),
            specialized: FxHashMap::default(),
        }
    }

    /// Evaluate an RPN sequence. Returns the result token (still holding
    /// its temporary lock) or `None` for a void expression.
    pub fn eval(&mut self, rpn: Vec<ExprToken>) -> CResult<Option<ExprToken>> {
        let mut stack: Vec<ExprToken> = Vec::new();
        let mut i = 0usize;
        while i < rpn.len() {
            let token = &rpn[i];
            match &token.kind {
                ExprTokenKind::Operand(_) => {
                    let mut token = token.clone();
                    if token.has_initialization {
                        init_operand(self.st, self.writer, &token)?;
                        token.has_initialization = false;
                    }
                    token.lock(self.st);
                    stack.push(token);
                }
                ExprTokenKind::UndefVar(name) => {
                    // A sibling flow operator may have defined it by now.
                    if let Some(var) = self.st.var_search(name, &self.scope) {
                        let mut resolved = ExprToken::this_var(self.st, var, token.src);
                        resolved.source_var = Some(var);
                        stack.push(resolved);
                    } else {
                        stack.push(token.clone());
                    }
                }
                ExprTokenKind::VoidRes(_) => stack.push(token.clone()),
                ExprTokenKind::Operator(opr) => {
                    let next = rpn.get(i + 1);
                    let consumed_assign =
                        self.operator_call(token, *opr, &mut stack, next)?;
                    if consumed_assign {
                        i += 1;
                    }
                }
                ExprTokenKind::LowLevelOpr(low) => {
                    self.low_level_operator_call(token, *low, &mut stack)?;
                }
                ExprTokenKind::FlowOpr { opr, name } => {
                    let name = name.clone();
                    self.flow_operator_call(token, *opr, name, &mut stack)?;
                }
                ExprTokenKind::Field(name) => {
                    let name = name.clone();
                    self.field_call(token, &name, &mut stack)?;
                }
                ExprTokenKind::Subscript { dim_nr } => {
                    self.subscript_call(token, *dim_nr, &mut stack)?;
                }
                ExprTokenKind::Function { .. }
                | ExprTokenKind::Method { .. }
                | ExprTokenKind::Constructor { .. } => {
                    self.function_method_call(token, &mut stack)?;
                }
                ExprTokenKind::Complex { typ } => {
                    self.complex_value_call(token, *typ, &mut stack)?;
                }
                ExprTokenKind::Delimiter(_) => {
                    return Err(CompileError::new(
                        ErrorKind::Internal("delimiter token survived RPN conversion".into()),
                        token.src,
                    ));
                }
            }
            i += 1;
        }
        match stack.len() {
            0 => Ok(None),
            1 => {
                let result = stack.pop().unwrap();
                if matches!(result.kind, ExprTokenKind::VoidRes(_)) {
                    return Ok(None);
                }
                if matches!(result.kind, ExprTokenKind::UndefVar(_)) {
                    return Err(CompileError::new(
                        ErrorKind::UndefinedIdentifier(result.name(self.st)),
                        result.src,
                    ));
                }
                Ok(Some(result))
            }
            _ => Err(CompileError::new(
                ErrorKind::Internal("operand stack size wrong at end of expression".into()),
                stack[0].src,
            )),
        }
    }

    pub(crate) fn pop_operand(
        &self,
        stack: &mut Vec<ExprToken>,
        src: stave_common::SrcInfo,
    ) -> CResult<ExprToken> {
        stack.pop().ok_or_else(|| {
            CompileError::new(
                ErrorKind::Internal("operand stack size wrong for operator".into()),
                src,
            )
        })
    }

    // ── Operators ──────────────────────────────────────────────────────

    /// Process one operator token. Returns true when the following
    /// `Assign` token was consumed by the result-reuse optimization.
    fn operator_call(
        &mut self,
        opr_token: &ExprToken,
        opr: ExprOperator,
        stack: &mut Vec<ExprToken>,
        next: Option<&ExprToken>,
    ) -> CResult<bool> {
        let def = opr.def();
        let src = opr_token.src;
        let mut opnd2 = if def.arity == 2 {
            Some(self.pop_operand(stack, src)?)
        } else {
            None
        };
        let mut opnd1 = self.pop_operand(stack, src)?;

        // The sequence operator discards its first operand; void results
        // may flow through it and nothing else.
        if opr == ExprOperator::SeqOper {
            let opnd2 = opnd2.take().expect("sequence operator is binary");
            opnd1.release(self.st);
            opnd1.set_source_used(self.st, &self.scope, true);
            if !matches!(opnd2.kind, ExprTokenKind::VoidRes(_))
                && !opnd2.is_initialized(self.st)
            {
                return Err(CompileError::new(opnd2.uninitialized_error(self.st), src));
            }
            stack.push(opnd2);
            return Ok(false);
        }
        for operand in std::iter::once(&opnd1).chain(opnd2.iter()) {
            if let ExprTokenKind::VoidRes(name) = &operand.kind {
                return Err(CompileError::new(
                    ErrorKind::VoidResultUsed(name.clone()),
                    src,
                ));
            }
        }

        // `Initialize` consuming a still-undefined variable defines it
        // with the source operand's type.
        let undef_name = match &opnd1.kind {
            ExprTokenKind::UndefVar(name) => Some(name.clone()),
            _ => None,
        };
        if let Some(name) = undef_name {
            if opr != ExprOperator::Initialize {
                return Err(CompileError::new(
                    ErrorKind::UndefinedIdentifier(name),
                    opnd1.src,
                ));
            }
            let opnd2_ref = opnd2.as_ref().expect("initialization is binary");
            let typ = opnd2_ref.typ_index(self.st).ok_or_else(|| {
                CompileError::new(ErrorKind::UndefinedIdentifier(name.clone()), src)
            })?;
            let flow_label = self.flow.last().map(|f| f.label);
            let (var, _) = self.st.store_variable(
                name,
                typ,
                self.scope,
                VarAttrs {
                    flow_label,
                    ..VarAttrs::default()
                },
            );
            let mut defined = ExprToken::this_var(self.st, var, opnd1.src);
            defined.source_var = Some(var);
            opnd1 = defined;
        }
        if let Some(o2) = &opnd2 {
            if let ExprTokenKind::UndefVar(name) = &o2.kind {
                return Err(CompileError::new(
                    ErrorKind::UndefinedIdentifier(name.clone()),
                    o2.src,
                ));
            }
        }

        // Lvalue, const, and initialization pre-checks.
        if def.must_lvalue[0] && !opnd1.is_lvalue(self.st) {
            return Err(CompileError::new(ErrorKind::AssignNonLValue, src));
        }
        if def.must_lvalue[0] && opnd1.is_const {
            return Err(CompileError::new(ErrorKind::ConstModification, src));
        }
        if def.must_init[0] && !opnd1.is_initialized(self.st) {
            return Err(CompileError::new(opnd1.uninitialized_error(self.st), src));
        }
        if let Some(o2) = &opnd2 {
            if def.must_init[1] && !o2.is_initialized(self.st) {
                return Err(CompileError::new(o2.uninitialized_error(self.st), src));
            }
        }

        if opr == ExprOperator::TypeCast {
            self.type_cast(opr_token, opnd1, stack)?;
            return Ok(false);
        }

        let m1 = opnd1.master(self.st).ok_or_else(|| {
            CompileError::new(
                ErrorKind::Internal("operator over a non-operand".into()),
                src,
            )
        })?;
        let m2 = opnd2.as_ref().and_then(|o| o.master(self.st));

        // User operator overloads run before the case-rule machinery.
        if def.overloadable && def.arity == 2 {
            let t1 = opnd1.typ_index(self.st).unwrap();
            let t2 = opnd2.as_ref().unwrap().typ_index(self.st).unwrap();
            if let Some(fun) = self.st.opr_search(def.text, t1, t2) {
                let opnd2 = opnd2.take().unwrap();
                self.operator_overload_call(fun, opr_token, opnd1, opnd2, stack)?;
                return Ok(false);
            }
        }

        let rule = find_case_rule(opr, m1, m2).ok_or_else(|| {
            let kind = match m2 {
                Some(m2) => ErrorKind::OperatorTypeMismatch {
                    opr: def.text.to_string(),
                    left: m1.text().to_string(),
                    right: m2.text().to_string(),
                },
                None => ErrorKind::UnaryTypeMismatch {
                    opr: def.text.to_string(),
                    operand: m1.text().to_string(),
                },
            };
            CompileError::new(kind, src)
        })?;

        // Literal-only operations fold; no instruction is produced.
        if fold::computable_operator(opr)
            && opnd1.is_lit_value()
            && opnd2.as_ref().map_or(true, |o| o.is_lit_value())
        {
            let result =
                fold::compute_operation(self.st, self.writer, opr, rule, opnd1, opnd2)?;
            stack.push(result);
            return Ok(false);
        }

        // Reads mark their source variables as used; write-only targets
        // go through the scope criteria instead.
        if def.must_init[0] {
            opnd1.set_source_used(self.st, &self.scope, true);
        } else if def.must_lvalue[0] {
            opnd1.set_source_used(self.st, &self.scope, false);
        }
        if let Some(o2) = &opnd2 {
            o2.set_source_used(self.st, &self.scope, true);
        }

        apply_case_promotions(
            self.st,
            self.writer,
            &self.scope,
            rule,
            &mut opnd1,
            opnd2.as_mut(),
        )?;
        let m1 = opnd1.master(self.st).unwrap();
        let m2 = opnd2.as_ref().and_then(|o| o.master(self.st));
        let result_master = rule.result_master(m1, m2);

        // Operands release before the result allocates, so a chain of
        // operators keeps reusing one temporary.
        opnd1.release(self.st);
        if let Some(o2) = &opnd2 {
            o2.release(self.st);
        }

        // Result selection: aliasing first, then the assign-lookahead
        // reuse, then a fresh temporary. When both aliasing and lookahead
        // would apply, aliasing wins.
        let mut consumed_assign = false;
        let mut result = if def.is_result_first {
            let mut r = opnd1.clone();
            r.is_calculated = true;
            r.lock(self.st);
            r
        } else {
            let reuse = match next {
                Some(n)
                    if matches!(
                        n.kind,
                        ExprTokenKind::Operator(ExprOperator::Assign)
                    ) =>
                {
                    let result_typ = self.result_typ(result_master, &opnd1, opnd2.as_ref());
                    match stack.last() {
                        Some(lhs)
                            if lhs.is_lvalue(self.st)
                                && !lhs.is_const
                                && lhs.typ_index(self.st) == Some(result_typ)
                                && !same_operand(lhs, &opnd1)
                                && opnd2
                                    .as_ref()
                                    .map_or(true, |o| !same_operand(lhs, o)) =>
                        {
                            true
                        }
                        _ => false,
                    }
                }
                _ => false,
            };
            if reuse {
                consumed_assign = true;
                let mut lhs = stack.pop().unwrap();
                lhs.is_calculated = true;
                lhs
            } else {
                let result_typ = self.result_typ(result_master, &opnd1, opnd2.as_ref());
                let (token, _) = ExprToken::new_var(
                    self.st,
                    self.scope,
                    result_typ,
                    TempKind::Regular,
                    src,
                );
                token
            }
        };

        self.emit_operator(opr, &result, &opnd1, opnd2.as_ref())?;

        if let Some(var) = result.var_index() {
            self.st.var_mut(var).is_initialized = true;
        }
        result.is_calculated = true;
        stack.push(result);
        Ok(consumed_assign)
    }

    /// Concrete result type for an operator's result master.
    fn result_typ(
        &self,
        master: MasterType,
        opnd1: &ExprToken,
        opnd2: Option<&ExprToken>,
    ) -> TypIndex {
        if master.is_atomic() {
            return self.st.atom_typ(master);
        }
        // Composite results keep the operand's concrete type.
        opnd1
            .typ_index(self.st)
            .filter(|&t| self.st.typ_master(t) == master)
            .or_else(|| opnd2.and_then(|o| o.typ_index(self.st)))
            .unwrap_or_else(|| self.st.atom_typ(MasterType::Long))
    }

    /// Instruction selection and emission for one operator.
    fn emit_operator(
        &mut self,
        opr: ExprOperator,
        result: &ExprToken,
        opnd1: &ExprToken,
        opnd2: Option<&ExprToken>,
    ) -> CResult<()> {
        use ExprOperator::*;
        match opr {
            Assign | Initialize => {
                copy_operand(
                    self.st,
                    self.writer,
                    opnd1,
                    opnd2.expect("assignment is binary"),
                )?;
            }
            UnaryPlus => {} // result aliases the operand
            PrefixInc => {
                let args = vec![opnd1.asm(self.st)];
                self.writer.asm_write_code(Opcode::Inc, args);
            }
            PrefixDec => {
                let args = vec![opnd1.asm(self.st)];
                self.writer.asm_write_code(Opcode::Dec, args);
            }
            PostfixInc | PostfixDec => {
                let opcode = if opr == PostfixInc {
                    Opcode::Pinc
                } else {
                    Opcode::Pdec
                };
                let args = vec![result.asm(self.st), opnd1.asm(self.st)];
                self.writer.asm_write_code(opcode, args);
            }
            UnaryMinus | LogicalNot | BitwiseNot => {
                let opcode = match opr {
                    UnaryMinus => Opcode::Neg,
                    LogicalNot => Opcode::Lnot,
                    _ => Opcode::Bnot,
                };
                let args = vec![result.asm(self.st), opnd1.asm(self.st)];
                self.writer.asm_write_code(opcode, args);
            }
            TypeCast | SeqOper => unreachable!("handled before emission"),
            _ => {
                let opnd2 = opnd2.expect("binary operator");
                let opcode = match opr {
                    Multiplication => Opcode::Mul,
                    Division => Opcode::Div,
                    Modulus => Opcode::Mod,
                    Addition => Opcode::Add,
                    Subtraction => Opcode::Sub,
                    ShiftLeft => Opcode::Shl,
                    ShiftRight => Opcode::Shr,
                    Less => Opcode::Les,
                    LessEqual => Opcode::Leq,
                    Greater => Opcode::Gre,
                    GreaterEqual => Opcode::Geq,
                    Equal => Opcode::Equ,
                    Distinct => Opcode::Dis,
                    BitwiseAnd => Opcode::Band,
                    BitwiseXor => Opcode::Bxor,
                    BitwiseOr => Opcode::Bor,
                    LogicalAnd => Opcode::Land,
                    LogicalOr => Opcode::Lor,
                    AddAssign => Opcode::Mvad,
                    SubAssign => Opcode::Mvsu,
                    MulAssign => Opcode::Mvmu,
                    DivAssign => Opcode::Mvdi,
                    ModAssign => Opcode::Mvmo,
                    ShlAssign => Opcode::Mvsl,
                    ShrAssign => Opcode::Mvsr,
                    AndAssign => Opcode::Mvan,
                    XorAssign => Opcode::Mvxo,
                    OrAssign => Opcode::Mvor,
                    _ => {
                        return Err(CompileError::new(
                            ErrorKind::Internal(format!("no emission for {opr:?}")),
                            opnd1.src,
                        ))
                    }
                };
                let args = if opr.is_compound_assignment() {
                    vec![opnd1.asm(self.st), opnd2.asm(self.st)]
                } else {
                    vec![
                        result.asm(self.st),
                        opnd1.asm(self.st),
                        opnd2.asm(self.st),
                    ]
                };
                self.writer.asm_write_code(opcode, args);
            }
        }
        Ok(())
    }

    // ── Type casts ─────────────────────────────────────────────────────

    fn type_cast(
        &mut self,
        opr_token: &ExprToken,
        mut opnd: ExprToken,
        stack: &mut Vec<ExprToken>,
    ) -> CResult<()> {
        let src = opr_token.src;
        let to_typ = opr_token.cast_typ.ok_or_else(|| {
            CompileError::new(ErrorKind::Internal("cast without target type".into()), src)
        })?;
        let from_typ = opnd.typ_index(self.st).ok_or_else(|| {
            CompileError::new(ErrorKind::Internal("cast of a non-operand".into()), src)
        })?;
        if from_typ == to_typ {
            stack.push(opnd);
            return Ok(());
        }
        let from_m = self.st.typ_master(from_typ);
        let to_m = self.st.typ_master(to_typ);
        opnd.set_source_used(self.st, &self.scope, true);

        // Identical master: the result is the operand itself.
        if from_m == to_m {
            match from_m {
                MasterType::DynArray | MasterType::FixArray => {
                    if !self.st.equivalent_arrays(from_typ, to_typ) {
                        return Err(CompileError::new(
                            ErrorKind::InvalidCastTarget(self.st.typ(to_typ).name.clone()),
                            src,
                        ));
                    }
                }
                MasterType::Class | MasterType::Enum => {
                    return Err(CompileError::new(
                        ErrorKind::InvalidCastTarget(self.st.typ(to_typ).name.clone()),
                        src,
                    ));
                }
                _ => {}
            }
            stack.push(opnd);
            return Ok(());
        }

        // Literal casts fold.
        if opnd.is_lit_value() && fold::cast_literal(self.st, self.writer, &mut opnd, to_typ)? {
            stack.push(opnd);
            return Ok(());
        }

        // Array-shape casts attach geometry.
        match (from_m, to_m) {
            (MasterType::FixArray, MasterType::DynArray) => {
                let agx = blocks::geometry_of(self.st, self.writer, from_typ);
                let result = self.cast_result(to_typ, src);
                self.writer.asm_write_code(
                    Opcode::Af2D,
                    vec![result.asm(self.st), opnd.asm(self.st), AsmArg::Agx(agx)],
                );
                opnd.release(self.st);
                stack.push(result);
                return Ok(());
            }
            (MasterType::DynArray, MasterType::FixArray) => {
                let agx = blocks::geometry_of(self.st, self.writer, to_typ);
                let result = self.cast_result(to_typ, src);
                self.writer.asm_write_code(
                    Opcode::Af2F,
                    vec![result.asm(self.st), opnd.asm(self.st), AsmArg::Agx(agx)],
                );
                opnd.release(self.st);
                stack.push(result);
                return Ok(());
            }
            (MasterType::Enum, MasterType::Integer) => {
                let result = self.cast_result(to_typ, src);
                self.writer.asm_write_code(
                    Opcode::Mvi,
                    vec![result.asm(self.st), opnd.asm(self.st)],
                );
                opnd.release(self.st);
                stack.push(result);
                return Ok(());
            }
            _ => {}
        }

        let opcode = promote::convert_opcode(from_m, to_m).ok_or_else(|| {
            CompileError::new(
                ErrorKind::InvalidCastTarget(self.st.typ(to_typ).name.clone()),
                src,
            )
        })?;
        let result = self.cast_result(to_typ, src);
        self.writer
            .asm_write_code(opcode, vec![result.asm(self.st), opnd.asm(self.st)]);
        opnd.release(self.st);
        stack.push(result);
        Ok(())
    }

    fn cast_result(&mut self, typ: TypIndex, src: stave_common::SrcInfo) -> ExprToken {
        let (token, _) =
            ExprToken::new_var(self.st, self.scope, typ, TempKind::Regular, src);
        if let Some(var) = token.var_index() {
            self.st.var_mut(var).is_initialized = true;
        }
        token
    }

    // ── Fields ─────────────────────────────────────────────────────────

    pub(crate) fn field_call(
        &mut self,
        token: &ExprToken,
        name: &str,
        stack: &mut Vec<ExprToken>,
    ) -> CResult<()> {
        let src = token.src;
        let opnd = self.pop_operand(stack, src)?;
        let typ = opnd.typ_index(self.st).ok_or_else(|| {
            CompileError::new(
                ErrorKind::MemberOnNonClass(opnd.name(self.st)),
                src,
            )
        })?;
        if self.st.typ_master(typ) != MasterType::Class {
            return Err(CompileError::new(
                ErrorKind::MemberOnNonClass(self.st.typ_master(typ).text().to_string()),
                src,
            ));
        }
        let fld = self.st.fld_search(typ, name).ok_or_else(|| {
            CompileError::new(
                ErrorKind::UnknownField {
                    class: self.st.typ(typ).name.clone(),
                    field: name.to_string(),
                },
                src,
            )
        })?;
        if !self.st.is_member_visible(&self.scope, fld) {
            return Err(CompileError::new(
                ErrorKind::HiddenMember {
                    name: name.to_string(),
                    class: self.st.typ(typ).name.clone(),
                },
                src,
            ));
        }
        opnd.set_source_used(self.st, &self.scope, true);
        let field = self.st.fld(fld).clone();

        // Static fields rewrite to their module-level variable.
        if field.is_static {
            let var = field.static_var.expect("static field has a backing variable");
            let result = ExprToken::this_var(self.st, var, src);
            opnd.release(self.st);
            stack.push(result);
            return Ok(());
        }

        let mut result = ExprToken::new_ind(
            self.st,
            self.scope,
            field.typ,
            TempKind::Regular,
            opnd.is_const,
            src,
        );
        result.source_var = opnd.source_var.or_else(|| opnd.var_index());
        self.writer.asm_write_code(
            Opcode::Refof,
            vec![
                result.asm(self.st),
                opnd.asm(self.st),
                AsmArg::LitWrd(field.offset),
            ],
        );
        if let Some(var) = result.var_index() {
            self.st.var_mut(var).is_initialized = opnd.is_initialized(self.st);
        }
        opnd.release(self.st);
        stack.push(result);
        Ok(())
    }

    // ── Subscripts ─────────────────────────────────────────────────────

    pub(crate) fn subscript_call(
        &mut self,
        token: &ExprToken,
        dim_nr: usize,
        stack: &mut Vec<ExprToken>,
    ) -> CResult<()> {
        let src = token.src;
        let mut indexes: Vec<ExprToken> = Vec::with_capacity(dim_nr);
        for _ in 0..dim_nr {
            indexes.push(self.pop_operand(stack, src)?);
        }
        indexes.reverse();
        let base = self.pop_operand(stack, src)?;
        let typ = base.typ_index(self.st).ok_or_else(|| {
            CompileError::new(
                ErrorKind::SubscriptNonIndexable(base.name(self.st)),
                src,
            )
        })?;
        let master = self.st.typ_master(typ);
        let (elem_typ, declared_dims) = match master {
            MasterType::String => (self.st.sys().chr, 1),
            MasterType::FixArray | MasterType::DynArray => (
                self.st.typ(typ).elem_typ.expect("array has element type"),
                self.st.typ(typ).dim_nr,
            ),
            other => {
                return Err(CompileError::new(
                    ErrorKind::SubscriptNonIndexable(other.text().to_string()),
                    src,
                ))
            }
        };
        if dim_nr != declared_dims {
            return Err(CompileError::new(
                ErrorKind::SubscriptDimMismatch {
                    expected: declared_dims,
                    found: dim_nr,
                },
                src,
            ));
        }
        if matches!(master, MasterType::String | MasterType::DynArray)
            && !base.is_initialized(self.st)
        {
            return Err(CompileError::new(base.uninitialized_error(self.st), src));
        }
        // Indexes must be initialized integers; all promote to the word
        // master.
        for index in indexes.iter_mut() {
            if !index.is_initialized(self.st) {
                return Err(CompileError::new(index.uninitialized_error(self.st), src));
            }
            let im = index.master(self.st).ok_or_else(|| {
                CompileError::new(
                    ErrorKind::SubscriptNonIndexable(index.name(self.st)),
                    src,
                )
            })?;
            if !matches!(
                im,
                MasterType::Char | MasterType::Short | MasterType::Integer | MasterType::Long
            ) {
                return Err(CompileError::new(
                    ErrorKind::OperatorTypeMismatch {
                        opr: "[]".to_string(),
                        left: master.text().to_string(),
                        right: im.text().to_string(),
                    },
                    src,
                ));
            }
            if im != stave_symtab::WORD_MASTER {
                promote::compile_promotion(
                    self.st,
                    self.writer,
                    &self.scope,
                    index,
                    stave_symtab::WORD_MASTER,
                )?;
            }
            index.set_source_used(self.st, &self.scope, true);
        }
        base.set_source_used(self.st, &self.scope, true);

        let mut result = ExprToken::new_ind(
            self.st,
            self.scope,
            elem_typ,
            TempKind::Regular,
            base.is_const,
            src,
        );
        result.source_var = base.source_var.or_else(|| base.var_index());

        match master {
            MasterType::String => {
                self.writer.asm_write_code(
                    Opcode::Sindx,
                    vec![
                        result.asm(self.st),
                        base.asm(self.st),
                        indexes[0].asm(self.st),
                    ],
                );
            }
            MasterType::FixArray if dim_nr == 1 => {
                self.writer.asm_write_code(
                    Opcode::Af1Rf,
                    vec![
                        result.asm(self.st),
                        base.asm(self.st),
                        indexes[0].asm(self.st),
                    ],
                );
            }
            MasterType::DynArray if dim_nr == 1 => {
                self.writer.asm_write_code(
                    Opcode::Ad1Rf,
                    vec![
                        result.asm(self.st),
                        base.asm(self.st),
                        indexes[0].asm(self.st),
                    ],
                );
            }
            MasterType::FixArray => {
                let agx = blocks::geometry_of(self.st, self.writer, typ);
                for (k, index) in indexes.iter().enumerate() {
                    self.writer.asm_write_code(
                        Opcode::Afidx,
                        vec![
                            AsmArg::Agx(agx),
                            AsmArg::LitWrd(k as i64),
                            index.asm(self.st),
                        ],
                    );
                }
                self.writer.asm_write_code(
                    Opcode::Afref,
                    vec![result.asm(self.st), base.asm(self.st)],
                );
            }
            _ => {
                for (k, index) in indexes.iter().enumerate() {
                    self.writer.asm_write_code(
                        Opcode::Adidx,
                        vec![
                            base.asm(self.st),
                            AsmArg::LitWrd(k as i64),
                            index.asm(self.st),
                        ],
                    );
                }
                self.writer.asm_write_code(
                    Opcode::Adref,
                    vec![result.asm(self.st), base.asm(self.st)],
                );
            }
        }
        if let Some(var) = result.var_index() {
            self.st.var_mut(var).is_initialized = true;
        }
        base.release(self.st);
        for index in &indexes {
            index.release(self.st);
        }
        stack.push(result);
        Ok(())
    }
}
