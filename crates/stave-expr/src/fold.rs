//! Stage 5: the constant folder.
//!
//! Structured like the main evaluator but it pushes only literal operands
//! and refuses non-foldable operators. The compile path calls
//! [`compute_operation`] per operator when every operand is literal, so a
//! folded expression emits no code; the `compute` entry point runs the
//! whole RPN through [`compute_rpn`] and errors on anything not foldable.
//!
//! Overflow detection is explicit: checked integer operations per result
//! master, and finite-in/non-finite-out predicates for floats. Overflows,
//! division by zero, and float exceptions are compile errors, never silent
//! wraps.

use stave_common::cpu::{CpuFlo, CpuLon};
use stave_common::{CResult, CompileError, ErrorKind};
use stave_emit::BinaryWriter;
use stave_symtab::{MasterType, SymbolTable, TypIndex};

use crate::cases::{find_case_rule, CaseRule};
use crate::oper::ExprOperator;
use crate::promote::promotion_target;
use crate::token::{ExprToken, ExprTokenKind, Lit, OperandData};

/// Operators the folder can evaluate. Assignments, increments, and the
/// sequence operator need storage; casts fold separately.
pub fn computable_operator(opr: ExprOperator) -> bool {
    use ExprOperator::*;
    matches!(
        opr,
        UnaryPlus
            | UnaryMinus
            | LogicalNot
            | BitwiseNot
            | Multiplication
            | Division
            | Modulus
            | Addition
            | Subtraction
            | ShiftLeft
            | ShiftRight
            | Less
            | LessEqual
            | Greater
            | GreaterEqual
            | Equal
            | Distinct
            | BitwiseAnd
            | BitwiseXor
            | BitwiseOr
            | LogicalAnd
            | LogicalOr
    )
}

fn lit_of(tok: &ExprToken) -> Option<Lit> {
    tok.lit_value()
}

fn retag(tok: &mut ExprToken, typ: TypIndex, value: Lit) {
    tok.kind = ExprTokenKind::Operand(OperandData::Lit { typ, value });
    tok.is_const = true;
    tok.is_calculated = true;
}

fn overflow(op: &str, master: MasterType, src: stave_common::SrcInfo) -> CompileError {
    CompileError::new(
        ErrorKind::FoldOverflow {
            operation: op.to_string(),
            master: master.text().to_string(),
        },
        src,
    )
}

// ── Literal promotion ──────────────────────────────────────────────────

/// Fold a literal promotion in place. Widening always succeeds; the only
/// narrowing promotion (`ToOther` shift counts, long to integer) range
/// checks.
pub fn promote_literal(
    st: &SymbolTable,
    writer: &mut BinaryWriter,
    tok: &mut ExprToken,
    to_master: MasterType,
) -> CResult<()> {
    let value = lit_of(tok).ok_or_else(|| {
        CompileError::new(
            ErrorKind::Internal("literal promotion of a non-literal".into()),
            tok.src,
        )
    })?;
    let src = tok.src;
    let out_of_range = |text: String| {
        CompileError::new(
            ErrorKind::PromotionOutOfRange {
                value: text,
                to: to_master.text().to_string(),
            },
            src,
        )
    };
    let as_int: Option<CpuLon> = match value {
        Lit::Chr(v) => Some(v as CpuLon),
        Lit::Shr(v) => Some(v as CpuLon),
        Lit::Int(v) => Some(v as CpuLon),
        Lit::Lon(v) => Some(v),
        _ => None,
    };
    let new = match to_master {
        MasterType::Short => {
            let v = as_int.ok_or_else(|| out_of_range(format!("{value:?}")))?;
            let narrowed =
                i16::try_from(v).map_err(|_| out_of_range(v.to_string()))?;
            Lit::Shr(narrowed)
        }
        MasterType::Integer => {
            let v = as_int.ok_or_else(|| out_of_range(format!("{value:?}")))?;
            let narrowed =
                i32::try_from(v).map_err(|_| out_of_range(v.to_string()))?;
            Lit::Int(narrowed)
        }
        MasterType::Long => {
            let v = as_int.ok_or_else(|| out_of_range(format!("{value:?}")))?;
            Lit::Lon(v)
        }
        MasterType::Float => match value {
            Lit::Flo(v) => Lit::Flo(v),
            _ => {
                let v = as_int.ok_or_else(|| out_of_range(format!("{value:?}")))?;
                Lit::Flo(v as CpuFlo)
            }
        },
        MasterType::String => {
            let text = match value {
                Lit::Chr(v) => (v as char).to_string(),
                Lit::Shr(v) => v.to_string(),
                Lit::Int(v) => v.to_string(),
                Lit::Lon(v) => v.to_string(),
                Lit::Flo(v) => v.to_string(),
                Lit::Bol(v) => v.to_string(),
                _ => return Err(out_of_range(format!("{value:?}"))),
            };
            Lit::Str(writer.store_lit_string(&text))
        }
        MasterType::Char => {
            let v = as_int.ok_or_else(|| out_of_range(format!("{value:?}")))?;
            let narrowed = u8::try_from(v).map_err(|_| out_of_range(v.to_string()))?;
            Lit::Chr(narrowed)
        }
        other => {
            return Err(CompileError::new(
                ErrorKind::Internal(format!("literal promotion to {}", other.text())),
                src,
            ))
        }
    };
    retag(tok, st.atom_typ(to_master), new);
    Ok(())
}

/// Fold an explicit cast of a literal. Returns false when the cast is not
/// foldable (string sources parse at runtime). Explicit casts truncate.
pub fn cast_literal(
    st: &SymbolTable,
    writer: &mut BinaryWriter,
    tok: &mut ExprToken,
    to_typ: TypIndex,
) -> CResult<bool> {
    let to_master = st.typ_master(to_typ);
    let value = match lit_of(tok) {
        Some(v) => v,
        None => return Ok(false),
    };
    let as_int: Option<CpuLon> = match value {
        Lit::Bol(v) => Some(v as CpuLon),
        Lit::Chr(v) => Some(v as CpuLon),
        Lit::Shr(v) => Some(v as CpuLon),
        Lit::Int(v) => Some(v as CpuLon),
        Lit::Lon(v) => Some(v),
        Lit::Enu(v) => Some(v as CpuLon),
        Lit::Flo(_) | Lit::Str(_) => None,
    };
    let new = match (value, to_master) {
        (Lit::Str(_), _) => return Ok(false),
        (_, MasterType::Char) => {
            let v = as_int.map(|v| v as u8).or(match value {
                Lit::Flo(f) => Some(f as u8),
                _ => None,
            });
            match v {
                Some(v) => Lit::Chr(v),
                None => return Ok(false),
            }
        }
        (_, MasterType::Short) => match (as_int, value) {
            (Some(v), _) => Lit::Shr(v as i16),
            (None, Lit::Flo(f)) => Lit::Shr(f as i16),
            _ => return Ok(false),
        },
        (_, MasterType::Integer) => match (as_int, value) {
            (Some(v), _) => Lit::Int(v as i32),
            (None, Lit::Flo(f)) => Lit::Int(f as i32),
            _ => return Ok(false),
        },
        (_, MasterType::Long) => match (as_int, value) {
            (Some(v), _) => Lit::Lon(v),
            (None, Lit::Flo(f)) => Lit::Lon(f as CpuLon),
            _ => return Ok(false),
        },
        (_, MasterType::Float) => match (as_int, value) {
            (Some(v), _) => Lit::Flo(v as CpuFlo),
            (None, Lit::Flo(f)) => Lit::Flo(f),
            _ => return Ok(false),
        },
        (_, MasterType::String) => {
            let text = match value {
                Lit::Bol(v) => v.to_string(),
                Lit::Chr(v) => (v as char).to_string(),
                Lit::Shr(v) => v.to_string(),
                Lit::Int(v) => v.to_string(),
                Lit::Lon(v) => v.to_string(),
                Lit::Flo(v) => v.to_string(),
                _ => return Ok(false),
            };
            Lit::Str(writer.store_lit_string(&text))
        }
        _ => return Ok(false),
    };
    retag(tok, to_typ, new);
    Ok(true)
}

// ── Operation folding ──────────────────────────────────────────────────

macro_rules! checked {
    ($a:expr, $b:expr, $method:ident, $verb:literal, $opr:literal, $master:expr, $src:expr) => {
        $a.$method($b).ok_or_else(|| {
            overflow(
                &format!(concat!($verb, " {} ", $opr, " {}"), $a, $b),
                $master,
                $src,
            )
        })
    };
}

fn fold_int_binary(
    opr: ExprOperator,
    a: CpuLon,
    b: CpuLon,
    master: MasterType,
    src: stave_common::SrcInfo,
) -> CResult<CpuLon> {
    // Compute at the result master's width so overflow detection matches
    // the VM cell that would have held the runtime value.
    macro_rules! at_width {
        ($ty:ty) => {{
            let (a, b) = (a as $ty, b as $ty);
            let out: $ty = match opr {
                ExprOperator::Addition => checked!(a, b, checked_add, "adding", "+", master, src)?,
                ExprOperator::Subtraction => {
                    checked!(a, b, checked_sub, "subtracting", "-", master, src)?
                }
                ExprOperator::Multiplication => {
                    checked!(a, b, checked_mul, "multiplying", "*", master, src)?
                }
                ExprOperator::Division => {
                    if b == 0 {
                        return Err(CompileError::new(ErrorKind::DivisionByZero, src));
                    }
                    checked!(a, b, checked_div, "dividing", "/", master, src)?
                }
                ExprOperator::Modulus => {
                    if b == 0 {
                        return Err(CompileError::new(ErrorKind::ModuloByZero, src));
                    }
                    checked!(a, b, checked_rem, "taking remainder of", "%", master, src)?
                }
                ExprOperator::BitwiseAnd => a & b,
                ExprOperator::BitwiseXor => a ^ b,
                ExprOperator::BitwiseOr => a | b,
                ExprOperator::ShiftLeft | ExprOperator::ShiftRight => {
                    let count = u32::try_from(b).map_err(|_| {
                        overflow(
                            &format!("shifting {a} by {b}"),
                            master,
                            src,
                        )
                    })?;
                    let shifted = if opr == ExprOperator::ShiftLeft {
                        a.checked_shl(count)
                    } else {
                        a.checked_shr(count)
                    };
                    shifted.ok_or_else(|| {
                        overflow(&format!("shifting {a} by {b}"), master, src)
                    })?
                }
                _ => {
                    return Err(CompileError::new(
                        ErrorKind::Internal(format!("fold of {opr:?} as integer")),
                        src,
                    ))
                }
            };
            out as CpuLon
        }};
    }
    Ok(match master {
        MasterType::Char => at_width!(u8),
        MasterType::Short => at_width!(i16),
        MasterType::Integer => at_width!(i32),
        MasterType::Long => at_width!(i64),
        _ => {
            return Err(CompileError::new(
                ErrorKind::Internal(format!("integer fold at {}", master.text())),
                src,
            ))
        }
    })
}

fn int_lit(master: MasterType, v: CpuLon) -> Lit {
    match master {
        MasterType::Char => Lit::Chr(v as u8),
        MasterType::Short => Lit::Shr(v as i16),
        MasterType::Integer => Lit::Int(v as i32),
        _ => Lit::Lon(v),
    }
}

fn int_value(lit: Lit) -> Option<CpuLon> {
    match lit {
        Lit::Chr(v) => Some(v as CpuLon),
        Lit::Shr(v) => Some(v as CpuLon),
        Lit::Int(v) => Some(v as CpuLon),
        Lit::Lon(v) => Some(v),
        _ => None,
    }
}

/// Fold one operator over literal operands. Both operands must already
/// satisfy the case rule; promotion happens here through the same
/// targets the compile path uses.
pub fn compute_operation(
    st: &mut SymbolTable,
    writer: &mut BinaryWriter,
    opr: ExprOperator,
    rule: &CaseRule,
    mut opnd1: ExprToken,
    mut opnd2: Option<ExprToken>,
) -> CResult<ExprToken> {
    let src = opnd1.src;
    let m1 = opnd1.master(st).expect("operand 1 has a master");
    let m2 = opnd2.as_ref().and_then(|o| o.master(st));
    let target = promotion_target(rule, m1, m2);
    if rule.promote[0] && m1 != target {
        promote_literal(st, writer, &mut opnd1, target)?;
    }
    if let Some(opnd2) = opnd2.as_mut() {
        if rule.promote[1] && m2 != Some(target) {
            promote_literal(st, writer, opnd2, target)?;
        }
    }
    let a = opnd1.lit_value().expect("folding a literal");
    let b = opnd2.as_ref().map(|o| o.lit_value().expect("folding a literal"));
    let result_master = rule.result_master(
        opnd1.master(st).unwrap(),
        opnd2.as_ref().and_then(|o| o.master(st)),
    );

    let mut out = opnd1.clone();
    use ExprOperator::*;
    match (a, b) {
        // ── Boolean logic ──────────────────────────────────────────────
        (Lit::Bol(x), None) if opr == LogicalNot => {
            retag(&mut out, st.sys().bol, Lit::Bol(!x));
        }
        (Lit::Bol(x), Some(Lit::Bol(y))) => {
            let v = match opr {
                LogicalAnd => x && y,
                LogicalOr => x || y,
                Equal => x == y,
                Distinct => x != y,
                _ => {
                    return Err(CompileError::new(
                        ErrorKind::Internal(format!("boolean fold of {opr:?}")),
                        src,
                    ))
                }
            };
            retag(&mut out, st.sys().bol, Lit::Bol(v));
        }
        // ── Floats ─────────────────────────────────────────────────────
        (Lit::Flo(x), None) => {
            let v = match opr {
                UnaryPlus => x,
                UnaryMinus => -x,
                _ => {
                    return Err(CompileError::new(
                        ErrorKind::Internal(format!("float fold of {opr:?}")),
                        src,
                    ))
                }
            };
            retag(&mut out, st.sys().flo, Lit::Flo(v));
        }
        (Lit::Flo(x), Some(Lit::Flo(y))) => match opr {
            Less | LessEqual | Greater | GreaterEqual | Equal | Distinct => {
                let v = match opr {
                    Less => x < y,
                    LessEqual => x <= y,
                    Greater => x > y,
                    GreaterEqual => x >= y,
                    Equal => x == y,
                    _ => x != y,
                };
                retag(&mut out, st.sys().bol, Lit::Bol(v));
            }
            Addition | Subtraction | Multiplication | Division => {
                let describe = |sym: &str, verb: &str| format!("{verb} {x} {sym} {y}");
                let (v, what) = match opr {
                    Addition => (x + y, describe("+", "adding")),
                    Subtraction => (x - y, describe("-", "subtracting")),
                    Multiplication => (x * y, describe("*", "multiplying")),
                    _ => (x / y, describe("/", "dividing")),
                };
                if !v.is_finite() {
                    return Err(CompileError::new(ErrorKind::FloatException(what), src));
                }
                retag(&mut out, st.sys().flo, Lit::Flo(v));
            }
            _ => {
                return Err(CompileError::new(
                    ErrorKind::Internal(format!("float fold of {opr:?}")),
                    src,
                ))
            }
        },
        // ── Strings ────────────────────────────────────────────────────
        (Lit::Str(xa), Some(Lit::Str(ya))) => {
            let x = writer.lit_string_at(xa).unwrap_or_default().to_string();
            let y = writer.lit_string_at(ya).unwrap_or_default().to_string();
            match opr {
                Addition => {
                    let adr = writer.store_lit_string(&format!("{x}{y}"));
                    retag(&mut out, st.sys().str, Lit::Str(adr));
                }
                Less | LessEqual | Greater | GreaterEqual | Equal | Distinct => {
                    let v = match opr {
                        Less => x < y,
                        LessEqual => x <= y,
                        Greater => x > y,
                        GreaterEqual => x >= y,
                        Equal => x == y,
                        _ => x != y,
                    };
                    retag(&mut out, st.sys().bol, Lit::Bol(v));
                }
                _ => {
                    return Err(CompileError::new(
                        ErrorKind::Internal(format!("string fold of {opr:?}")),
                        src,
                    ))
                }
            }
        }
        // ── Enums ──────────────────────────────────────────────────────
        (Lit::Enu(x), Some(Lit::Enu(y))) => {
            let v = match opr {
                Equal => x == y,
                Distinct => x != y,
                _ => {
                    return Err(CompileError::new(
                        ErrorKind::Internal(format!("enum fold of {opr:?}")),
                        src,
                    ))
                }
            };
            retag(&mut out, st.sys().bol, Lit::Bol(v));
        }
        // ── Integers ───────────────────────────────────────────────────
        _ => {
            let master = opnd1.master(st).unwrap();
            let x = int_value(a).ok_or_else(|| {
                CompileError::new(
                    ErrorKind::Internal(format!("fold of {opr:?} over {a:?}")),
                    src,
                )
            })?;
            match opr {
                UnaryPlus => {
                    retag(&mut out, opnd1.typ_index(st).unwrap(), int_lit(master, x));
                }
                UnaryMinus => {
                    let v = x.checked_neg().and_then(|v| width_check(master, v)).ok_or_else(
                        || overflow(&format!("negating {x}"), master, src),
                    )?;
                    retag(&mut out, opnd1.typ_index(st).unwrap(), int_lit(master, v));
                }
                BitwiseNot => {
                    let v = width_trunc(master, !x);
                    retag(&mut out, opnd1.typ_index(st).unwrap(), int_lit(master, v));
                }
                Less | LessEqual | Greater | GreaterEqual | Equal | Distinct => {
                    let y = b.and_then(int_value).ok_or_else(|| {
                        CompileError::new(
                            ErrorKind::Internal("integer comparison without operand".into()),
                            src,
                        )
                    })?;
                    let v = match opr {
                        Less => x < y,
                        LessEqual => x <= y,
                        Greater => x > y,
                        GreaterEqual => x >= y,
                        Equal => x == y,
                        _ => x != y,
                    };
                    retag(&mut out, st.sys().bol, Lit::Bol(v));
                }
                _ => {
                    let y = b.and_then(int_value).ok_or_else(|| {
                        CompileError::new(
                            ErrorKind::Internal("integer fold without operand".into()),
                            src,
                        )
                    })?;
                    let v = fold_int_binary(opr, x, y, result_master, src)?;
                    retag(&mut out, st.atom_typ(result_master), int_lit(result_master, v));
                }
            }
        }
    }
    out.is_calculated = true;
    Ok(out)
}

fn width_check(master: MasterType, v: CpuLon) -> Option<CpuLon> {
    match master {
        MasterType::Char => u8::try_from(v).ok().map(|x| x as CpuLon),
        MasterType::Short => i16::try_from(v).ok().map(|x| x as CpuLon),
        MasterType::Integer => i32::try_from(v).ok().map(|x| x as CpuLon),
        _ => Some(v),
    }
}

fn width_trunc(master: MasterType, v: CpuLon) -> CpuLon {
    match master {
        MasterType::Char => (v as u8) as CpuLon,
        MasterType::Short => (v as i16) as CpuLon,
        MasterType::Integer => (v as i32) as CpuLon,
        _ => v,
    }
}

// ── Whole-RPN computation (the `compute` entry point) ──────────────────

/// Evaluate an RPN sequence entirely at compile time. Refuses anything
/// not foldable.
pub fn compute_rpn(
    st: &mut SymbolTable,
    writer: &mut BinaryWriter,
    rpn: Vec<ExprToken>,
) -> CResult<ExprToken> {
    let mut stack: Vec<ExprToken> = Vec::new();
    for token in rpn {
        match &token.kind {
            ExprTokenKind::Operand(OperandData::Lit { .. }) => stack.push(token),
            ExprTokenKind::Operator(opr) => {
                let opr = *opr;
                if opr == ExprOperator::TypeCast {
                    let mut value = stack
                        .pop()
                        .ok_or_else(|| internal_stack(token.src))?;
                    let to_typ = token
                        .cast_typ
                        .ok_or_else(|| internal_stack(token.src))?;
                    if !cast_literal(st, writer, &mut value, to_typ)? {
                        return Err(CompileError::new(ErrorKind::NotComputable, token.src));
                    }
                    stack.push(value);
                    continue;
                }
                if !computable_operator(opr) {
                    return Err(CompileError::new(ErrorKind::NotComputable, token.src));
                }
                let arity = opr.def().arity;
                let opnd2 = if arity == 2 {
                    Some(stack.pop().ok_or_else(|| internal_stack(token.src))?)
                } else {
                    None
                };
                let opnd1 = stack.pop().ok_or_else(|| internal_stack(token.src))?;
                let m1 = opnd1.master(st).unwrap();
                let m2 = opnd2.as_ref().and_then(|o| o.master(st));
                let rule = find_case_rule(opr, m1, m2).ok_or_else(|| {
                    type_mismatch(opr, m1, m2, token.src)
                })?;
                let result = compute_operation(st, writer, opr, rule, opnd1, opnd2)?;
                stack.push(result);
            }
            _ => return Err(CompileError::new(ErrorKind::NotComputable, token.src)),
        }
    }
    match stack.len() {
        1 => Ok(stack.pop().unwrap()),
        0 => Err(CompileError::new(
            ErrorKind::NotComputable,
            stave_common::SrcInfo::synthetic(),
        )),
        _ => Err(internal_stack(stack[0].src)),
    }
}

fn internal_stack(src: stave_common::SrcInfo) -> CompileError {
    CompileError::new(
        ErrorKind::Internal("operand stack size wrong for operator".into()),
        src,
    )
}

fn type_mismatch(
    opr: ExprOperator,
    m1: MasterType,
    m2: Option<MasterType>,
    src: stave_common::SrcInfo,
) -> CompileError {
    let kind = match m2 {
        Some(m2) => ErrorKind::OperatorTypeMismatch {
            opr: opr.def().text.to_string(),
            left: m1.text().to_string(),
            right: m2.text().to_string(),
        },
        None => ErrorKind::UnaryTypeMismatch {
            opr: opr.def().text.to_string(),
            operand: m1.text().to_string(),
        },
    };
    CompileError::new(kind, src)
}
