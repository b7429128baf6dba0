//! Implicit type promotion, shared by the compile and compute paths.
//!
//! Promotion of a literal operand folds in place (see [`crate::fold`]);
//! promotion of a non-literal operand emits a conversion instruction into
//! a fresh `Promotion`-kind temporary. Both paths agree on targets because
//! both resolve them through the same case rule.

use stave_common::{CResult, CompileError, ErrorKind};
use stave_emit::{BinaryWriter, Opcode};
use stave_symtab::{MasterType, ScopeDef, SymbolTable, TempKind};

use crate::cases::{CaseRule, PromMode};
use crate::fold;
use crate::token::ExprToken;

/// Conversion opcode between two atomic masters, when the VM has one.
pub fn convert_opcode(from: MasterType, to: MasterType) -> Option<Opcode> {
    use MasterType::*;
    let op = match (from, to) {
        (Char, Short) => Opcode::Ch2Sh,
        (Char, Integer) => Opcode::Ch2In,
        (Char, Long) => Opcode::Ch2Lo,
        (Char, Float) => Opcode::Ch2Fl,
        (Char, String) => Opcode::Ch2St,
        (Short, Char) => Opcode::Sh2Ch,
        (Short, Integer) => Opcode::Sh2In,
        (Short, Long) => Opcode::Sh2Lo,
        (Short, Float) => Opcode::Sh2Fl,
        (Short, String) => Opcode::Sh2St,
        (Integer, Char) => Opcode::In2Ch,
        (Integer, Short) => Opcode::In2Sh,
        (Integer, Long) => Opcode::In2Lo,
        (Integer, Float) => Opcode::In2Fl,
        (Integer, String) => Opcode::In2St,
        (Long, Char) => Opcode::Lo2Ch,
        (Long, Short) => Opcode::Lo2Sh,
        (Long, Integer) => Opcode::Lo2In,
        (Long, Float) => Opcode::Lo2Fl,
        (Long, String) => Opcode::Lo2St,
        (Float, Char) => Opcode::Fl2Ch,
        (Float, Short) => Opcode::Fl2Sh,
        (Float, Integer) => Opcode::Fl2In,
        (Float, Long) => Opcode::Fl2Lo,
        (Float, String) => Opcode::Fl2St,
        (String, Boolean) => Opcode::St2Bo,
        (String, Char) => Opcode::St2Ch,
        (String, Short) => Opcode::St2Sh,
        (String, Integer) => Opcode::St2In,
        (String, Long) => Opcode::St2Lo,
        (String, Float) => Opcode::St2Fl,
        (Boolean, Integer) => Opcode::Bo2In,
        (Boolean, String) => Opcode::Bo2St,
        _ => return None,
    };
    Some(op)
}

/// Promotion target for one operand position under a case rule.
pub fn promotion_target(
    rule: &CaseRule,
    m1: MasterType,
    m2: Option<MasterType>,
) -> MasterType {
    match rule.mode {
        PromMode::ToResult => rule.result,
        PromMode::ToMaximum => rule.result_master(m1, m2),
        PromMode::ToOther => rule.prom_master.unwrap_or(rule.result),
    }
}

/// Promote `opnd` to `to_master` in place: fold a literal, or emit a
/// conversion into a promotion temporary.
pub fn compile_promotion(
    st: &mut SymbolTable,
    writer: &mut BinaryWriter,
    scope: &ScopeDef,
    opnd: &mut ExprToken,
    to_master: MasterType,
) -> CResult<()> {
    let from = match opnd.master(st) {
        Some(m) => m,
        None => {
            return Err(CompileError::new(
                ErrorKind::Internal("promotion of a non-operand token".into()),
                opnd.src,
            ))
        }
    };
    if from == to_master {
        return Ok(());
    }
    if opnd.is_lit_value() {
        return fold::promote_literal(st, writer, opnd, to_master);
    }
    let opcode = convert_opcode(from, to_master).ok_or_else(|| {
        CompileError::new(
            ErrorKind::Internal(format!(
                "no conversion from {} to {}",
                from.text(),
                to_master.text()
            )),
            opnd.src,
        )
    })?;
    let to_typ = st.atom_typ(to_master);
    let (mut result, _) = ExprToken::new_var(st, *scope, to_typ, TempKind::Promotion, opnd.src);
    let var = result.var_index().expect("promotion temp has a variable");
    writer.asm_write_code(opcode, vec![result.asm(st), opnd.asm(st)]);
    st.var_mut(var).is_initialized = true;
    // Use propagation keeps pointing at the original variable.
    result.source_var = opnd.source_var.or_else(|| opnd.var_index());
    opnd.release(st);
    *opnd = result;
    Ok(())
}

/// Apply a case rule's promotions to both operands of an operator.
pub fn apply_case_promotions(
    st: &mut SymbolTable,
    writer: &mut BinaryWriter,
    scope: &ScopeDef,
    rule: &CaseRule,
    opnd1: &mut ExprToken,
    opnd2: Option<&mut ExprToken>,
) -> CResult<()> {
    let m1 = opnd1.master(st).expect("operand 1 has a master");
    let m2 = match &opnd2 {
        Some(o) => o.master(st),
        None => None,
    };
    let target = promotion_target(rule, m1, m2);
    if rule.promote[0] && m1 != target {
        compile_promotion(st, writer, scope, opnd1, target)?;
    }
    if let Some(opnd2) = opnd2 {
        let m2 = m2.expect("operand 2 has a master");
        if rule.promote[1] && m2 != target {
            compile_promotion(st, writer, scope, opnd2, target)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use stave_common::span::{FileId, SrcInfo};
    use stave_symtab::VarAttrs;

    fn src() -> SrcInfo {
        SrcInfo::new(FileId(0), 1, 1)
    }

    #[test]
    fn conversion_matrix_covers_the_numeric_lattice() {
        use MasterType::*;
        for from in [Char, Short, Integer, Long, Float] {
            for to in [Char, Short, Integer, Long, Float, String] {
                if from == to {
                    continue;
                }
                assert!(
                    convert_opcode(from, to).is_some(),
                    "missing {from:?} -> {to:?}"
                );
            }
        }
        assert!(convert_opcode(MasterType::Boolean, MasterType::Float).is_none());
    }

    #[test]
    fn literal_promotion_folds_in_place() {
        let mut st = SymbolTable::new("main");
        let mut writer = BinaryWriter::new();
        let scope = ScopeDef::global();
        let mut tok = ExprToken::this_int(&st, 7, src());
        compile_promotion(&mut st, &mut writer, &scope, &mut tok, MasterType::Long).unwrap();
        assert_eq!(tok.master(&st), Some(MasterType::Long));
        assert!(writer.code().is_empty(), "literal promotion emits no code");
    }

    #[test]
    fn variable_promotion_emits_a_conversion() {
        let mut st = SymbolTable::new("main");
        let mut writer = BinaryWriter::new();
        let scope = ScopeDef::global();
        let chr = st.sys().chr;
        let (var, _) = st.store_variable(
            "c",
            chr,
            scope,
            VarAttrs {
                is_initialized: true,
                ..VarAttrs::default()
            },
        );
        let mut tok = ExprToken::this_var(&st, var, src());
        compile_promotion(&mut st, &mut writer, &scope, &mut tok, MasterType::Integer).unwrap();
        assert_eq!(writer.code().len(), 1);
        assert_eq!(writer.code()[0].opcode, Opcode::Ch2In);
        assert_eq!(tok.master(&st), Some(MasterType::Integer));
        // The original variable is untouched; the result is a temporary.
        let result_var = tok.var_index().unwrap();
        assert_ne!(result_var, var);
        assert!(st.var(result_var).is_temp);
        assert_eq!(st.var(result_var).temp_kind, TempKind::Promotion);
    }
}
