//! Function, method, constructor, operator-overload, and complex-value
//! calls.
//!
//! Overload search runs through module-qualified free functions, class
//! member functions, and master methods of the receiver type, in that
//! order. Argument passing follows the callee's calling convention:
//! same-body callees receive moves into their parameter slots,
//! module-scope callees go through the parameter stack, dynamic-library
//! callees push with reference/const flags. Empty-class arguments push
//! nothing at all.

use stave_common::{CResult, CompileError, ErrorKind, SrcInfo};
use stave_emit::{AsmArg, Opcode};
use stave_symtab::{CallConv, FldIndex, FunIndex, MasterType, ParmIndex, TempKind, TypIndex};

use crate::blocks::{copy_operand, init_operand};
use crate::eval::Evaluator;
use crate::promote::compile_promotion;
use crate::token::{ExprToken, ExprTokenKind};

fn push_opcode(master: MasterType) -> Opcode {
    match master {
        MasterType::Boolean => Opcode::Pushb,
        MasterType::Char => Opcode::Pushc,
        MasterType::Short => Opcode::Pushs,
        MasterType::Integer | MasterType::Enum => Opcode::Pushi,
        MasterType::Long => Opcode::Pushl,
        MasterType::Float => Opcode::Pushf,
        _ => Opcode::Pushr,
    }
}

fn lib_push_opcode(master: MasterType, by_reference: bool) -> Opcode {
    if by_reference {
        match master {
            MasterType::Boolean => Opcode::Lrpub,
            MasterType::Char => Opcode::Lrpuc,
            MasterType::Short => Opcode::Lrpus,
            MasterType::Integer | MasterType::Enum => Opcode::Lrpui,
            MasterType::Long => Opcode::Lrpul,
            MasterType::Float => Opcode::Lrpuf,
            _ => Opcode::Lrpur,
        }
    } else {
        match master {
            MasterType::Boolean => Opcode::Lpub,
            MasterType::Char => Opcode::Lpuc,
            MasterType::Short => Opcode::Lpus,
            MasterType::Integer | MasterType::Enum => Opcode::Lpui,
            MasterType::Long => Opcode::Lpul,
            MasterType::Float => Opcode::Lpuf,
            _ => Opcode::Lpur,
        }
    }
}

fn local_move_opcode(master: MasterType, by_reference: bool) -> Opcode {
    if by_reference {
        return Opcode::Mvr;
    }
    match master {
        MasterType::Boolean => Opcode::Mvb,
        MasterType::Char => Opcode::Mvc,
        MasterType::Short => Opcode::Mvs,
        MasterType::Integer | MasterType::Enum => Opcode::Mvi,
        MasterType::Long => Opcode::Mvl,
        MasterType::Float => Opcode::Mvf,
        _ => Opcode::Mvr,
    }
}

impl Evaluator<'_> {
    // ── Entry point for call-shaped tokens ─────────────────────────────

    pub(crate) fn function_method_call(
        &mut self,
        token: &ExprToken,
        stack: &mut Vec<ExprToken>,
    ) -> CResult<()> {
        let src = token.src;
        match &token.kind {
            ExprTokenKind::Function {
                name,
                module,
                parm_nr,
            } => {
                let name = name.clone();
                let module = *module;
                let args = self.pop_arguments(stack, *parm_nr, src)?;
                let arg_typs = self.argument_types(&args, src)?;
                let fun = match self.st.fun_search(&name, module, &arg_typs) {
                    Some(fun) => fun,
                    None => return Err(self.call_not_found(&name, &arg_typs, src)),
                };
                if self.st.fun(fun).is_private && self.st.fun(fun).module != self.scope.module {
                    return Err(CompileError::new(
                        ErrorKind::PrivateFunction {
                            name,
                            module: self.st.module(self.st.fun(fun).module).name.clone(),
                        },
                        src,
                    ));
                }
                self.call_function(fun, None, args, src, stack)
            }
            ExprTokenKind::Method { name, parm_nr } => {
                let name = name.clone();
                let args = self.pop_arguments(stack, *parm_nr, src)?;
                let receiver = self.pop_operand(stack, src)?;
                // The generic meta methods exist on every master type and
                // never need an initialized receiver.
                if self.generic_master_method(&name, &receiver, &args, stack, src)? {
                    return Ok(());
                }
                let typ = receiver.typ_index(self.st).ok_or_else(|| {
                    CompileError::new(
                        ErrorKind::MemberOnNonClass(receiver.name(self.st)),
                        src,
                    )
                })?;
                let arg_typs = self.argument_types(&args, src)?;
                if self.st.typ_master(typ) == MasterType::Class {
                    if let Some(fun) = self.st.fmb_search(typ, &name, &arg_typs) {
                        if !self.st.fun(fun).is_initializer
                            && !receiver.is_initialized(self.st)
                        {
                            return Err(CompileError::new(
                                ErrorKind::UninitializedReceiver(receiver.name(self.st)),
                                src,
                            ));
                        }
                        return self.call_function(fun, Some(receiver), args, src, stack);
                    }
                }
                self.master_method_call(&name, receiver, args, stack, src)
            }
            ExprTokenKind::Constructor { typ, parm_nr } => {
                let typ = *typ;
                let args = self.pop_arguments(stack, *parm_nr, src)?;
                self.constructor_call(typ, args, src, stack)
            }
            _ => Err(CompileError::new(
                ErrorKind::Internal("call on a non-call token".into()),
                src,
            )),
        }
    }

    fn pop_arguments(
        &mut self,
        stack: &mut Vec<ExprToken>,
        parm_nr: usize,
        src: SrcInfo,
    ) -> CResult<Vec<ExprToken>> {
        let mut args = Vec::with_capacity(parm_nr);
        for _ in 0..parm_nr {
            args.push(self.pop_operand(stack, src)?);
        }
        args.reverse();
        Ok(args)
    }

    pub(crate) fn argument_types(
        &self,
        args: &[ExprToken],
        src: SrcInfo,
    ) -> CResult<Vec<TypIndex>> {
        args.iter()
            .map(|a| {
                if let ExprTokenKind::VoidRes(name) = &a.kind {
                    return Err(CompileError::new(
                        ErrorKind::VoidResultUsed(name.clone()),
                        src,
                    ));
                }
                a.typ_index(self.st).ok_or_else(|| {
                    CompileError::new(
                        ErrorKind::UndefinedIdentifier(a.name(self.st)),
                        a.src,
                    )
                })
            })
            .collect()
    }

    fn call_not_found(
        &mut self,
        name: &str,
        arg_typs: &[TypIndex],
        src: SrcInfo,
    ) -> CompileError {
        // Queue one note per known overload so the caller sees why none
        // matched.
        let candidates: Vec<FunIndex> = self.st.fun_candidates(name).to_vec();
        for fun in candidates {
            let parms: Vec<TypIndex> = self
                .st
                .fun_parms(fun)
                .iter()
                .map(|&p| self.st.parm(p).typ)
                .collect();
            let text = self.st.parms_text(&parms);
            self.diag.delay(
                ErrorKind::UndefinedFunction {
                    name: name.to_string(),
                    parms: text,
                },
                src,
            );
        }
        CompileError::new(
            ErrorKind::UndefinedFunction {
                name: name.to_string(),
                parms: self.st.parms_text(arg_typs),
            },
            src,
        )
    }

    // ── Argument validation and passing ────────────────────────────────

    /// Validate one argument against its formal parameter and promote it
    /// when automatic promotion applies.
    fn check_argument(
        &mut self,
        fun_name: &str,
        pos: usize,
        parm: ParmIndex,
        arg: &mut ExprToken,
        src: SrcInfo,
    ) -> CResult<()> {
        let parm_def = self.st.parm(parm).clone();
        if !arg.is_initialized(self.st) {
            return Err(CompileError::new(arg.uninitialized_error(self.st), src));
        }
        let arg_typ = arg.typ_index(self.st).expect("argument is an operand");
        if !self.st.promotion_automatic(arg_typ, parm_def.typ) {
            return Err(CompileError::new(
                ErrorKind::ArgumentTypeMismatch {
                    fun: fun_name.to_string(),
                    pos: pos + 1,
                    expected: self.st.typ(parm_def.typ).name.clone(),
                    found: self.st.typ(arg_typ).name.clone(),
                },
                src,
            ));
        }
        if parm_def.is_reference {
            let parm_master = self.st.typ_master(parm_def.typ);
            if arg.is_lit_value() {
                // Literals pass by reference only where the runtime can
                // wrap them in a block: strings and dynamic arrays.
                if !matches!(parm_master, MasterType::String | MasterType::DynArray) {
                    return Err(CompileError::new(
                        ErrorKind::ArgumentNotLValue {
                            fun: fun_name.to_string(),
                            pos: pos + 1,
                        },
                        src,
                    ));
                }
            } else if !arg.is_lvalue(self.st) {
                return Err(CompileError::new(
                    ErrorKind::ArgumentNotLValue {
                        fun: fun_name.to_string(),
                        pos: pos + 1,
                    },
                    src,
                ));
            }
            if arg.is_const && !parm_def.is_const {
                return Err(CompileError::new(
                    ErrorKind::ArgumentConst {
                        fun: fun_name.to_string(),
                        pos: pos + 1,
                    },
                    src,
                ));
            }
        }
        if arg_typ != parm_def.typ && !parm_def.is_reference {
            let to_master = self.st.typ_master(parm_def.typ);
            compile_promotion(self.st, self.writer, &self.scope, arg, to_master)?;
        }
        // Writable reference arguments come back initialized.
        if parm_def.is_reference && !parm_def.is_const {
            if let Some(var) = arg.var_index() {
                self.st.var_mut(var).is_initialized = true;
            }
            arg.set_source_used(self.st, &self.scope, false);
        } else {
            arg.set_source_used(self.st, &self.scope, true);
        }
        Ok(())
    }

    /// Emit argument passing and the call itself, then push the result.
    pub(crate) fn call_function(
        &mut self,
        fun: FunIndex,
        receiver: Option<ExprToken>,
        mut args: Vec<ExprToken>,
        src: SrcInfo,
        stack: &mut Vec<ExprToken>,
    ) -> CResult<()> {
        let def = self.st.fun(fun).clone();
        let parms = self.st.fun_parms(fun);
        if parms.len() != args.len() {
            return Err(CompileError::new(
                ErrorKind::Internal("overload arity mismatch after search".into()),
                src,
            ));
        }
        for (pos, (parm, arg)) in parms.iter().zip(args.iter_mut()).enumerate() {
            self.check_argument(&def.name, pos, *parm, arg, src)?;
        }
        if let Some(receiver) = &receiver {
            receiver.set_source_used(self.st, &self.scope, true);
        }

        match def.conv {
            CallConv::Local => {
                if let Some(receiver) = &receiver {
                    let args = vec![
                        AsmArg::Fun {
                            index: fun,
                            name: def.name.clone(),
                        },
                        receiver.asm(self.st),
                    ];
                    self.writer.asm_write_code(Opcode::Mvr, args);
                }
                for (parm, arg) in parms.iter().zip(args.iter()) {
                    let parm_def = self.st.parm(*parm).clone();
                    if self
                        .st
                        .is_empty_class(arg.typ_index(self.st).expect("checked operand"))
                    {
                        continue;
                    }
                    let master = self.st.typ_master(parm_def.typ);
                    let opcode = local_move_opcode(master, parm_def.is_reference);
                    let asm_args = vec![
                        AsmArg::Par {
                            index: *parm,
                            name: parm_def.name.clone(),
                        },
                        arg.asm(self.st),
                    ];
                    self.writer.asm_write_code(opcode, asm_args);
                }
                let call_args = self.call_result_args(fun, &def.name, def.typ, src);
                self.writer.asm_write_code(Opcode::Calln, call_args.0);
                self.finish_call(def.name, def.typ, call_args.1, receiver, args, stack);
            }
            CallConv::Module => {
                if let Some(receiver) = &receiver {
                    let asm_args = vec![receiver.asm(self.st)];
                    self.writer.asm_write_code(Opcode::Refpu, asm_args);
                }
                for (parm, arg) in parms.iter().zip(args.iter()) {
                    let parm_def = self.st.parm(*parm).clone();
                    if self
                        .st
                        .is_empty_class(arg.typ_index(self.st).expect("checked operand"))
                    {
                        continue;
                    }
                    let asm_args = vec![arg.asm(self.st)];
                    if parm_def.is_reference {
                        self.writer.asm_write_code(Opcode::Refpu, asm_args);
                    } else {
                        let master = self.st.typ_master(parm_def.typ);
                        self.writer.asm_write_code(push_opcode(master), asm_args);
                    }
                }
                let call_args = self.call_result_args(fun, &def.name, def.typ, src);
                self.writer.asm_write_code(Opcode::Call, call_args.0);
                self.finish_call(def.name, def.typ, call_args.1, receiver, args, stack);
            }
            CallConv::DynLib => {
                for (parm, arg) in parms.iter().zip(args.iter()) {
                    let parm_def = self.st.parm(*parm).clone();
                    if self
                        .st
                        .is_empty_class(arg.typ_index(self.st).expect("checked operand"))
                    {
                        continue;
                    }
                    let master = self.st.typ_master(parm_def.typ);
                    let opcode = lib_push_opcode(master, parm_def.is_reference);
                    let asm_args = vec![arg.asm(self.st), AsmArg::LitBol(parm_def.is_const)];
                    self.writer.asm_write_code(opcode, asm_args);
                }
                let (lib, entry) = def
                    .dl_name
                    .clone()
                    .unwrap_or_else(|| (String::new(), def.name.clone()));
                let id = self.writer.store_dl_call(&lib, &entry);
                let result = self.alloc_call_result(def.typ, src);
                let mut asm_args = vec![AsmArg::LitInt(id as i32)];
                if let Some(result) = &result {
                    asm_args.push(result.asm(self.st));
                }
                self.writer.asm_write_code(Opcode::Lcall, asm_args);
                self.finish_call(def.name, def.typ, result, receiver, args, stack);
            }
            CallConv::System => {
                return Err(CompileError::new(
                    ErrorKind::Internal("system callee outside master-method dispatch".into()),
                    src,
                ));
            }
        }
        Ok(())
    }

    /// Build the `CALL`-form arguments and the optional result operand.
    fn call_result_args(
        &mut self,
        fun: FunIndex,
        name: &str,
        result_typ: Option<TypIndex>,
        src: SrcInfo,
    ) -> (Vec<AsmArg>, Option<ExprToken>) {
        let result = self.alloc_call_result(result_typ, src);
        let mut args = vec![AsmArg::Fun {
            index: fun,
            name: name.to_string(),
        }];
        if let Some(result) = &result {
            args.push(result.asm(self.st));
        }
        (args, result)
    }

    fn alloc_call_result(
        &mut self,
        result_typ: Option<TypIndex>,
        src: SrcInfo,
    ) -> Option<ExprToken> {
        result_typ.map(|typ| {
            let (token, _) =
                ExprToken::new_var(self.st, self.scope, typ, TempKind::Regular, src);
            if let Some(var) = token.var_index() {
                self.st.var_mut(var).is_initialized = true;
            }
            token
        })
    }

    fn finish_call(
        &mut self,
        name: String,
        result_typ: Option<TypIndex>,
        result: Option<ExprToken>,
        receiver: Option<ExprToken>,
        args: Vec<ExprToken>,
        stack: &mut Vec<ExprToken>,
    ) {
        for arg in &args {
            arg.release(self.st);
        }
        if let Some(receiver) = &receiver {
            receiver.release(self.st);
        }
        match (result_typ, result) {
            (Some(_), Some(mut token)) => {
                token.is_calculated = true;
                stack.push(token);
            }
            _ => {
                let mut void = ExprToken::new(
                    ExprTokenKind::VoidRes(name),
                    SrcInfo::synthetic(),
                );
                void.is_calculated = true;
                stack.push(void);
            }
        }
    }

    /// User `operator()` overload: called like any other function.
    pub(crate) fn operator_overload_call(
        &mut self,
        fun: FunIndex,
        opr_token: &ExprToken,
        opnd1: ExprToken,
        opnd2: ExprToken,
        stack: &mut Vec<ExprToken>,
    ) -> CResult<()> {
        self.call_function(fun, None, vec![opnd1, opnd2], opr_token.src, stack)
    }

    // ── Constructors ───────────────────────────────────────────────────

    /// `Type(args)`: allocate the instance, initialize its blocks, and
    /// run the member initializer on it.
    fn constructor_call(
        &mut self,
        typ: TypIndex,
        args: Vec<ExprToken>,
        src: SrcInfo,
        stack: &mut Vec<ExprToken>,
    ) -> CResult<()> {
        let arg_typs = self.argument_types(&args, src)?;
        let name = self.st.typ(typ).name.clone();
        let fun = self.st.fmb_search(typ, &name, &arg_typs).ok_or_else(|| {
            CompileError::new(
                ErrorKind::UndefinedFunction {
                    name: name.clone(),
                    parms: self.st.parms_text(&arg_typs),
                },
                src,
            )
        })?;
        let (instance, _) =
            ExprToken::new_var(self.st, self.scope, typ, TempKind::Regular, src);
        init_operand(self.st, self.writer, &instance)?;
        instance.lock(self.st);
        self.call_function(fun, Some(instance.clone()), args, src, stack)?;
        // A void initializer leaves the instance as the expression value.
        if matches!(stack.last().map(|t| &t.kind), Some(ExprTokenKind::VoidRes(_))) {
            stack.pop();
            let mut result = instance;
            result.is_calculated = true;
            stack.push(result);
        } else {
            instance.release(self.st);
        }
        Ok(())
    }

    // ── Complex values ─────────────────────────────────────────────────

    /// `{...}` construction after a class or array cast: pop one operand
    /// per field or element and write them through a moving reference.
    pub(crate) fn complex_value_call(
        &mut self,
        token: &ExprToken,
        typ: TypIndex,
        stack: &mut Vec<ExprToken>,
    ) -> CResult<()> {
        let src = token.src;
        match self.st.typ_master(typ) {
            MasterType::Class => self.complex_class(token, typ, stack),
            MasterType::FixArray | MasterType::DynArray => {
                self.complex_array(token, typ, stack)
            }
            _ => Err(CompileError::new(ErrorKind::ComplexCastMissing, src)),
        }
    }

    fn complex_class(
        &mut self,
        token: &ExprToken,
        typ: TypIndex,
        stack: &mut Vec<ExprToken>,
    ) -> CResult<()> {
        let src = token.src;
        let def = self.st.typ(typ).clone();
        let mut values = self.pop_arguments(stack, def.field_count, src)?;
        let (result, _) =
            ExprToken::new_var(self.st, self.scope, typ, TempKind::Regular, src);
        init_operand(self.st, self.writer, &result)?;

        // One moving reference walks the instance; static fields write to
        // their module-level variable instead.
        let mut reference: Option<ExprToken> = None;
        let mut last_offset = 0;
        for (k, f) in def.field_range().enumerate() {
            let field = self.st.fld(FldIndex(f)).clone();
            let value = &mut values[k];
            if !value.is_initialized(self.st) {
                return Err(CompileError::new(value.uninitialized_error(self.st), src));
            }
            let val_typ = value.typ_index(self.st).expect("field value is an operand");
            if !self.st.promotion_automatic(val_typ, field.typ) {
                return Err(CompileError::new(
                    ErrorKind::ArgumentTypeMismatch {
                        fun: def.name.clone(),
                        pos: k + 1,
                        expected: self.st.typ(field.typ).name.clone(),
                        found: self.st.typ(val_typ).name.clone(),
                    },
                    src,
                ));
            }
            if val_typ != field.typ {
                let to_master = self.st.typ_master(field.typ);
                compile_promotion(self.st, self.writer, &self.scope, value, to_master)?;
            }
            value.set_source_used(self.st, &self.scope, true);
            if field.is_static {
                let static_var = field.static_var.expect("static field backing variable");
                let target = ExprToken::this_var(self.st, static_var, src);
                copy_operand(self.st, self.writer, &target, value)?;
                continue;
            }
            let target = if let Some(ind) = reference.clone() {
                // Advance the same reference slot and retype it for the
                // next field.
                let var = ind.var_index().expect("reference has a variable");
                self.st.var_mut(var).typ = field.typ;
                let args = vec![
                    ind.asm(self.st),
                    AsmArg::LitWrd(field.offset - last_offset),
                ];
                self.writer.asm_write_code(Opcode::Refad, args);
                last_offset = field.offset;
                ind
            } else {
                let ind = ExprToken::new_ind(
                    self.st,
                    self.scope,
                    field.typ,
                    TempKind::Regular,
                    false,
                    src,
                );
                let args = vec![
                    ind.asm(self.st),
                    result.asm(self.st),
                    AsmArg::LitWrd(field.offset),
                ];
                self.writer.asm_write_code(Opcode::Refof, args);
                if let Some(var) = ind.var_index() {
                    self.st.var_mut(var).is_initialized = true;
                }
                reference = Some(ind.clone());
                last_offset = field.offset;
                ind
            };
            copy_operand(self.st, self.writer, &target, value)?;
        }
        if let Some(reference) = reference {
            reference.release(self.st);
        }
        for value in &values {
            value.release(self.st);
        }
        let mut result = result;
        result.is_calculated = true;
        stack.push(result);
        Ok(())
    }

    fn complex_array(
        &mut self,
        token: &ExprToken,
        typ: TypIndex,
        stack: &mut Vec<ExprToken>,
    ) -> CResult<()> {
        let src = token.src;
        let def = self.st.typ(typ).clone();
        let elem = def.elem_typ.expect("array type has an element type");
        let (dim_nr, sizes) = token.dim_size.unwrap_or((def.dim_nr, [0; 4]));
        let count: i64 = sizes[..dim_nr].iter().product::<i64>().max(0);
        let mut values = self.pop_arguments(stack, count as usize, src)?;
        let (result, _) =
            ExprToken::new_var(self.st, self.scope, typ, TempKind::Regular, src);
        init_operand(self.st, self.writer, &result)?;

        let is_dynamic = def.master == MasterType::DynArray;
        if is_dynamic {
            let mut args = vec![result.asm(self.st), AsmArg::LitWrd(dim_nr as i64)];
            for k in 0..dim_nr {
                args.push(AsmArg::LitWrd(sizes[k]));
            }
            self.writer.asm_write_code(Opcode::Addef, args.clone());
            self.writer.asm_write_code(Opcode::Adset, args);
        }

        let elem_len = self.st.typ(elem).length;
        let elem_master = self.st.typ_master(elem);
        let mut reference: Option<ExprToken> = None;
        for (k, value) in values.iter_mut().enumerate() {
            if !value.is_initialized(self.st) {
                return Err(CompileError::new(value.uninitialized_error(self.st), src));
            }
            let val_typ = value.typ_index(self.st).expect("element is an operand");
            if !self.st.promotion_automatic(val_typ, elem) {
                return Err(CompileError::new(
                    ErrorKind::ArgumentTypeMismatch {
                        fun: def.name.clone(),
                        pos: k + 1,
                        expected: self.st.typ(elem).name.clone(),
                        found: self.st.typ(val_typ).name.clone(),
                    },
                    src,
                ));
            }
            if self.st.typ_master(val_typ) != elem_master {
                compile_promotion(self.st, self.writer, &self.scope, value, elem_master)?;
            }
            value.set_source_used(self.st, &self.scope, true);
            let target = if is_dynamic {
                // Linear one-dimensional fetch into the fresh array.
                let ind = ExprToken::new_ind(
                    self.st,
                    self.scope,
                    elem,
                    TempKind::Regular,
                    false,
                    src,
                );
                let args = vec![
                    ind.asm(self.st),
                    result.asm(self.st),
                    AsmArg::LitWrd(k as i64),
                ];
                self.writer.asm_write_code(Opcode::Ad1Rf, args);
                if let Some(var) = ind.var_index() {
                    self.st.var_mut(var).is_initialized = true;
                }
                ind
            } else if let Some(ind) = reference.clone() {
                let args = vec![ind.asm(self.st), AsmArg::LitWrd(elem_len)];
                self.writer.asm_write_code(Opcode::Refad, args);
                ind
            } else {
                let ind = ExprToken::new_ind(
                    self.st,
                    self.scope,
                    elem,
                    TempKind::Regular,
                    false,
                    src,
                );
                let args = vec![
                    ind.asm(self.st),
                    result.asm(self.st),
                    AsmArg::LitWrd(0),
                ];
                self.writer.asm_write_code(Opcode::Refof, args);
                if let Some(var) = ind.var_index() {
                    self.st.var_mut(var).is_initialized = true;
                }
                reference = Some(ind.clone());
                ind
            };
            copy_operand(self.st, self.writer, &target, value)?;
            if is_dynamic {
                target.release(self.st);
            }
        }
        if let Some(reference) = reference {
            reference.release(self.st);
        }
        for value in &values {
            value.release(self.st);
        }
        let mut result = result;
        result.is_calculated = true;
        stack.push(result);
        Ok(())
    }
}
