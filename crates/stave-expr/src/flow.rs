//! Ternary low-level operators and `for`/`array` flow operators.
//!
//! Ternaries thread a label seed through `?`, `:` and the synthetic end
//! token; the two branches share one result temporary. Flow operators
//! sequence loop code inside an expression: `for(...)` builds a
//! condition/step/result loop, `array(...)` walks a source array building
//! a fresh one-dimensional result array element by element.

use stave_common::cpu::CpuLon;
use stave_common::{CResult, CompileError, ErrorKind};
use stave_emit::{cn_label, fw_label, AsmArg, Opcode};
use stave_symtab::{MasterType, TempKind, VarAttrs, VarIndex, WORD_MASTER};

use crate::blocks::copy_operand;
use crate::eval::Evaluator;
use crate::oper::{FlowOpr, LowLevelOpr};
use crate::promote::compile_promotion;
use crate::token::ExprToken;

/// One armed ternary: its label seed and, once the true branch has been
/// captured, the shared result temporary.
#[derive(Debug, Clone)]
pub struct TernarySeed {
    pub seed: CpuLon,
    pub var: Option<VarIndex>,
    pub reused: bool,
}

/// Which flow construct a context belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowKind {
    For,
    Array,
}

/// One active flow construct.
#[derive(Debug, Clone)]
pub struct FlowContext {
    pub kind: FlowKind,
    pub label: CpuLon,
    /// Operand-stack depth at entry; inner sequence values drain back to
    /// this depth.
    pub depth: usize,
    /// Element variable of `array(...)`.
    pub on_var: Option<VarIndex>,
    /// Index variable of `array(...)`.
    pub ix_var: Option<VarIndex>,
    /// The source array operand.
    pub orig: Option<ExprToken>,
    /// The result array being built.
    pub res: Option<ExprToken>,
}

impl FlowContext {
    fn new(kind: FlowKind, label: CpuLon, depth: usize) -> Self {
        Self {
            kind,
            label,
            depth,
            on_var: None,
            ix_var: None,
            orig: None,
            res: None,
        }
    }
}

impl Evaluator<'_> {
    fn stamp(&mut self, label: String) {
        let address = self.writer.current_code_address();
        self.writer
            .store_jump_destination(label, self.scope.depth(), address);
    }

    fn pop_boolean(
        &mut self,
        stack: &mut Vec<ExprToken>,
        src: stave_common::SrcInfo,
        opr: &str,
    ) -> CResult<ExprToken> {
        let cond = self.pop_operand(stack, src)?;
        if cond.master(self.st) != Some(MasterType::Boolean) {
            return Err(CompileError::new(
                ErrorKind::UnaryTypeMismatch {
                    opr: opr.to_string(),
                    operand: cond
                        .master(self.st)
                        .map(|m| m.text().to_string())
                        .unwrap_or_else(|| cond.name(self.st)),
                },
                src,
            ));
        }
        if !cond.is_initialized(self.st) {
            return Err(CompileError::new(cond.uninitialized_error(self.st), src));
        }
        cond.set_source_used(self.st, &self.scope, true);
        Ok(cond)
    }

    // ── Ternary ────────────────────────────────────────────────────────

    pub(crate) fn low_level_operator_call(
        &mut self,
        token: &ExprToken,
        low: LowLevelOpr,
        stack: &mut Vec<ExprToken>,
    ) -> CResult<()> {
        let src = token.src;
        let seed = token.label_seed.ok_or_else(|| {
            CompileError::new(
                ErrorKind::Internal("ternary token without a label seed".into()),
                src,
            )
        })?;
        match low {
            LowLevelOpr::TernaryCond => {
                let cond = self.pop_boolean(stack, src, "?")?;
                if cond.is_lit_value() {
                    self.diag.warn(ErrorKind::UnreachableBranch, src);
                }
                let args = vec![cond.asm(self.st), AsmArg::Jmp(cn_label(seed, "FAL"))];
                self.writer.asm_write_code(Opcode::Jmpfl, args);
                cond.release(self.st);
                self.ternary.push(TernarySeed {
                    seed,
                    var: None,
                    reused: false,
                });
            }
            LowLevelOpr::TernaryMid => {
                let value = self.pop_operand(stack, src)?;
                if !value.is_initialized(self.st) {
                    return Err(CompileError::new(value.uninitialized_error(self.st), src));
                }
                value.set_source_used(self.st, &self.scope, true);
                let entry_idx = self
                    .ternary
                    .iter()
                    .rposition(|t| t.seed == seed && t.var.is_none())
                    .ok_or_else(|| {
                        CompileError::new(
                            ErrorKind::Internal("seed not found for ternary mid".into()),
                            src,
                        )
                    })?;
                let typ = value.typ_index(self.st).ok_or_else(|| {
                    CompileError::new(
                        ErrorKind::Internal("ternary branch without a type".into()),
                        src,
                    )
                })?;
                // Releasing first lets the branch's own temporary become
                // the shared result slot; the copy then collapses away.
                value.release(self.st);
                let (result, reused) =
                    ExprToken::new_var(self.st, self.scope, typ, TempKind::Regular, src);
                copy_operand(self.st, self.writer, &result, &value)?;
                self.writer
                    .asm_write_code(Opcode::Jmp, vec![AsmArg::Jmp(cn_label(seed, "END"))]);
                self.stamp(cn_label(seed, "FAL"));
                let entry = &mut self.ternary[entry_idx];
                entry.var = result.var_index();
                entry.reused = reused;
            }
            LowLevelOpr::TernaryEnd => {
                let mut value = self.pop_operand(stack, src)?;
                if !value.is_initialized(self.st) {
                    return Err(CompileError::new(value.uninitialized_error(self.st), src));
                }
                value.set_source_used(self.st, &self.scope, true);
                let entry_idx = self
                    .ternary
                    .iter()
                    .rposition(|t| t.seed == seed)
                    .ok_or_else(|| {
                        CompileError::new(
                            ErrorKind::Internal("seed not found for ternary end".into()),
                            src,
                        )
                    })?;
                let entry = self.ternary.remove(entry_idx);
                let var = entry.var.ok_or_else(|| {
                    CompileError::new(
                        ErrorKind::Internal("ternary end before its mid".into()),
                        src,
                    )
                })?;
                let mut result = ExprToken::this_var(self.st, var, src);
                result.is_calculated = true;
                // The false branch promotes to the true branch's type.
                let res_typ = self.st.var(var).typ;
                let val_typ = value.typ_index(self.st).unwrap();
                if val_typ != res_typ {
                    if !self.st.promotion_automatic(val_typ, res_typ) {
                        return Err(CompileError::new(
                            ErrorKind::TernaryBranchMismatch {
                                left: self.st.typ(res_typ).name.clone(),
                                right: self.st.typ(val_typ).name.clone(),
                            },
                            src,
                        ));
                    }
                    let to_master = self.st.typ_master(res_typ);
                    compile_promotion(self.st, self.writer, &self.scope, &mut value, to_master)?;
                }
                copy_operand(self.st, self.writer, &result, &value)?;
                value.release(self.st);
                self.stamp(cn_label(seed, "END"));
                stack.push(result);
            }
        }
        Ok(())
    }

    // ── Flow operators ─────────────────────────────────────────────────

    pub(crate) fn flow_operator_call(
        &mut self,
        token: &ExprToken,
        opr: FlowOpr,
        name: Option<String>,
        stack: &mut Vec<ExprToken>,
    ) -> CResult<()> {
        let src = token.src;
        let label = token.flow_label.ok_or_else(|| {
            CompileError::new(
                ErrorKind::Internal("flow token without a label".into()),
                src,
            )
        })?;
        match opr {
            FlowOpr::ForBeg => {
                self.stamp(fw_label(label, "BEG"));
                self.flow
                    .push(FlowContext::new(FlowKind::For, label, stack.len()));
            }
            FlowOpr::ForIf => {
                // The initialization expression's value is discarded.
                self.drain_to_flow_depth(label, stack);
                self.stamp(fw_label(label, "IF"));
            }
            FlowOpr::ForDo => {
                let cond = self.pop_boolean(stack, src, "for if")?;
                let args = vec![cond.asm(self.st), AsmArg::Jmp(fw_label(label, "RET"))];
                self.writer.asm_write_code(Opcode::Jmpfl, args);
                cond.release(self.st);
            }
            FlowOpr::ForRet => {
                // The step expression's value is discarded.
                self.drain_to_flow_depth(label, stack);
                self.writer
                    .asm_write_code(Opcode::Jmp, vec![AsmArg::Jmp(fw_label(label, "IF"))]);
                self.stamp(fw_label(label, "RET"));
            }
            FlowOpr::ForEnd => {
                let ctx = self.flow.pop().ok_or_else(|| flow_stack_empty(src))?;
                debug_assert_eq!(ctx.kind, FlowKind::For);
                self.st.hide_local_variables(&self.scope, Some(label));
                if let Some(top) = stack.last_mut() {
                    top.is_calculated = true;
                }
            }
            FlowOpr::ArrBeg => {
                self.flow
                    .push(FlowContext::new(FlowKind::Array, label, stack.len()));
            }
            FlowOpr::ArrOnvar | FlowOpr::ArrOxvar => {
                let source = stack.last().cloned().ok_or_else(|| flow_stack_empty(src))?;
                let elem = self.flow_source_elem(&source, src)?;
                let name = name.ok_or_else(|| flow_stack_empty(src))?;
                if let Some(existing) = self.st.var_search(&name, &self.scope) {
                    if self.st.var(existing).scope == self.scope {
                        return Err(CompileError::new(
                            ErrorKind::DuplicateVariable(name),
                            src,
                        ));
                    }
                }
                let (var, _) = self.st.store_variable(
                    name,
                    elem,
                    self.scope,
                    VarAttrs {
                        flow_label: Some(label),
                        ..VarAttrs::default()
                    },
                );
                // The walk writes the element variable each iteration.
                self.st.var_mut(var).is_initialized = true;
                let ctx = self.flow.last_mut().ok_or_else(|| flow_stack_empty(src))?;
                ctx.on_var = Some(var);
            }
            FlowOpr::ArrIxvar => {
                let name = name.ok_or_else(|| flow_stack_empty(src))?;
                let var = match self.st.var_search(&name, &self.scope) {
                    Some(existing) if self.st.var(existing).scope == self.scope => {
                        let def = self.st.var(existing);
                        if self.st.typ_master(def.typ) != WORD_MASTER
                            || def.is_const
                            || def.is_temp
                        {
                            return Err(CompileError::new(
                                ErrorKind::FlowIndexVarInvalid(name),
                                src,
                            ));
                        }
                        existing
                    }
                    _ => {
                        let word = self.st.word_typ();
                        let (var, _) = self.st.store_variable(
                            name,
                            word,
                            self.scope,
                            VarAttrs {
                                flow_label: Some(label),
                                ..VarAttrs::default()
                            },
                        );
                        var
                    }
                };
                self.st.var_mut(var).is_initialized = true;
                let ctx = self.flow.last_mut().ok_or_else(|| flow_stack_empty(src))?;
                ctx.ix_var = Some(var);
            }
            FlowOpr::ArrInit => {
                let source = self.pop_operand(stack, src)?;
                let elem = self.flow_source_elem(&source, src)?;
                source.set_source_used(self.st, &self.scope, true);
                let res_typ = self.st.dyn_array_of(elem, 1, self.scope);
                let (res, _) =
                    ExprToken::new_var(self.st, self.scope, res_typ, TempKind::Regular, src);
                if let Some(var) = res.var_index() {
                    self.st.var_mut(var).is_initialized = true;
                }
                self.writer
                    .asm_write_code(Opcode::Ad1Df, vec![res.asm(self.st)]);
                let ctx = self.flow.last().ok_or_else(|| flow_stack_empty(src))?;
                let on_var = ctx.on_var.ok_or_else(|| flow_stack_empty(src))?;
                let ix_arg = match ctx.ix_var {
                    Some(ix) => AsmArg::Var {
                        index: ix,
                        name: self.st.var(ix).name.clone(),
                    },
                    None => AsmArg::Nva,
                };
                let walk_open = match source.master(self.st) {
                    Some(MasterType::FixArray) => Opcode::Af1Fo,
                    _ => Opcode::Ad1Fo,
                };
                let args = vec![
                    source.asm(self.st),
                    AsmArg::Var {
                        index: on_var,
                        name: self.st.var(on_var).name.clone(),
                    },
                    ix_arg,
                    AsmArg::Jmp(fw_label(label, "END")),
                ];
                self.writer.asm_write_code(walk_open, args);
                self.stamp(fw_label(label, "LOP"));
                let ctx = self.flow.last_mut().expect("flow context exists");
                ctx.orig = Some(source);
                ctx.res = Some(res);
            }
            FlowOpr::ArrAsif => {
                let cond = self.pop_boolean(stack, src, "array if")?;
                let args = vec![cond.asm(self.st), AsmArg::Jmp(fw_label(label, "NXT"))];
                self.writer.asm_write_code(Opcode::Jmpfl, args);
                cond.release(self.st);
            }
            FlowOpr::ArrEnd => {
                let ctx = self.flow.pop().ok_or_else(|| flow_stack_empty(src))?;
                if ctx.kind != FlowKind::Array {
                    return Err(flow_stack_empty(src));
                }
                let mut value = self.pop_operand(stack, src)?;
                if !value.is_initialized(self.st) {
                    return Err(CompileError::new(value.uninitialized_error(self.st), src));
                }
                value.set_source_used(self.st, &self.scope, true);
                let res = ctx.res.ok_or_else(|| flow_stack_empty(src))?;
                let orig = ctx.orig.ok_or_else(|| flow_stack_empty(src))?;
                let res_typ = res.typ_index(self.st).unwrap();
                let elem = self.st.typ(res_typ).elem_typ.expect("result array has elements");
                let val_typ = value.typ_index(self.st).unwrap();
                if val_typ != elem {
                    if !self.st.promotion_automatic(val_typ, elem) {
                        return Err(CompileError::new(
                            ErrorKind::ArgumentTypeMismatch {
                                fun: "array(...)".into(),
                                pos: 1,
                                expected: self.st.typ(elem).name.clone(),
                                found: self.st.typ(val_typ).name.clone(),
                            },
                            src,
                        ));
                    }
                    let to_master = self.st.typ_master(elem);
                    compile_promotion(self.st, self.writer, &self.scope, &mut value, to_master)?;
                }
                // Append slot, element copy, advance, exit.
                let slot = ExprToken::new_ind(
                    self.st,
                    self.scope,
                    elem,
                    TempKind::Regular,
                    false,
                    src,
                );
                let args = vec![slot.asm(self.st), res.asm(self.st)];
                self.writer.asm_write_code(Opcode::Ad1Ap, args);
                if let Some(var) = slot.var_index() {
                    self.st.var_mut(var).is_initialized = true;
                }
                copy_operand(self.st, self.writer, &slot, &value)?;
                self.stamp(fw_label(label, "NXT"));
                let advance = match orig.master(self.st) {
                    Some(MasterType::FixArray) => Opcode::Af1Nx,
                    _ => Opcode::Ad1Nx,
                };
                let args = vec![orig.asm(self.st), AsmArg::Jmp(fw_label(label, "LOP"))];
                self.writer.asm_write_code(advance, args);
                self.stamp(fw_label(label, "END"));
                self.st.hide_local_variables(&self.scope, Some(label));
                slot.release(self.st);
                value.release(self.st);
                orig.release(self.st);
                let mut res = res;
                res.is_calculated = true;
                stack.push(res);
            }
        }
        Ok(())
    }

    /// Pop and release everything above the flow construct's entry
    /// depth.
    fn drain_to_flow_depth(&mut self, label: CpuLon, stack: &mut Vec<ExprToken>) {
        let depth = self
            .flow
            .iter()
            .rfind(|c| c.label == label)
            .map(|c| c.depth)
            .unwrap_or(0);
        while stack.len() > depth {
            if let Some(token) = stack.pop() {
                token.release(self.st);
                token.set_source_used(self.st, &self.scope, true);
            }
        }
    }

    /// Element type of an `array(...)` source; the source must be an
    /// initialized array.
    fn flow_source_elem(
        &mut self,
        source: &ExprToken,
        src: stave_common::SrcInfo,
    ) -> CResult<stave_symtab::TypIndex> {
        let typ = source.typ_index(self.st).ok_or_else(|| {
            CompileError::new(
                ErrorKind::FlowSourceNotArray(source.name(self.st)),
                src,
            )
        })?;
        let master = self.st.typ_master(typ);
        if !matches!(master, MasterType::FixArray | MasterType::DynArray) {
            return Err(CompileError::new(
                ErrorKind::FlowSourceNotArray(master.text().to_string()),
                src,
            ));
        }
        if master == MasterType::DynArray && !source.is_initialized(self.st) {
            return Err(CompileError::new(source.uninitialized_error(self.st), src));
        }
        Ok(self.st.typ(typ).elem_typ.expect("array has an element type"))
    }
}

fn flow_stack_empty(src: stave_common::SrcInfo) -> CompileError {
    CompileError::new(
        ErrorKind::Internal("flow-label stack empty at flow operator".into()),
        src,
    )
}
