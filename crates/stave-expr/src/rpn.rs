//! Stage 3: infix to RPN.
//!
//! Classical Shunting-Yard with the extensions the expression language
//! needs: call-shaped tokens (`Function`/`Method`/`Constructor`/`Complex`)
//! push unconditionally and pop after their closing delimiter; `[` acts as
//! a left-associative operator one level above postfix and produces a
//! synthetic `Subscript` token carrying the dimension count; ternary and
//! flow operators flush the operator stack and go straight to the output
//! so the evaluator sees them in program order.

use stave_common::{CResult, CompileError, ErrorKind};

use crate::oper::{ExprDelimiter, ExprOperator};
use crate::token::{ExprToken, ExprTokenKind};

/// Precedence of the subscript pseudo-operator: binds above postfix.
const SUBSCRIPT_PREC: u8 = 14;

/// What sits on the operator stack.
enum StackItem {
    Operator(ExprToken),
    /// `[` with its running comma count.
    Bracket { token: ExprToken, commas: usize },
    Paren(ExprToken),
    Curly(ExprToken),
    /// Function / Method / Constructor waiting for its `)`.
    Call(ExprToken),
    /// Complex initializer waiting for its `}`.
    Complex(ExprToken),
}

fn prec_of(token: &ExprToken) -> u8 {
    match &token.kind {
        ExprTokenKind::Operator(opr) => opr.def().prec,
        _ => 0,
    }
}

/// Convert an infix token list to RPN.
pub fn infix_to_rpn(tokens: Vec<ExprToken>) -> CResult<Vec<ExprToken>> {
    let mut output: Vec<ExprToken> = Vec::with_capacity(tokens.len());
    let mut stack: Vec<StackItem> = Vec::new();

    for token in tokens {
        match &token.kind {
            ExprTokenKind::Operand(_)
            | ExprTokenKind::UndefVar(_)
            | ExprTokenKind::VoidRes(_)
            | ExprTokenKind::Field(_) => output.push(token),

            ExprTokenKind::Operator(opr) => {
                let prec = opr.def().prec;
                let left = opr.def().assoc == crate::oper::Assoc::Left;
                while let Some(StackItem::Operator(top)) = stack.last() {
                    let top_prec = prec_of(top);
                    let pop = if left {
                        top_prec >= prec
                    } else {
                        top_prec > prec
                    };
                    if !pop {
                        break;
                    }
                    if let Some(StackItem::Operator(t)) = stack.pop() {
                        output.push(t);
                    }
                }
                stack.push(StackItem::Operator(token));
            }

            // Ternary and flow operators: flush pending operators, then
            // emit directly so the evaluator sees them in program order.
            ExprTokenKind::LowLevelOpr(_) | ExprTokenKind::FlowOpr { .. } => {
                while let Some(StackItem::Operator(_)) = stack.last() {
                    if let Some(StackItem::Operator(t)) = stack.pop() {
                        output.push(t);
                    }
                }
                output.push(token);
            }

            ExprTokenKind::Function { .. }
            | ExprTokenKind::Method { .. }
            | ExprTokenKind::Constructor { .. } => {
                stack.push(StackItem::Call(token));
            }

            ExprTokenKind::Complex { .. } => {
                stack.push(StackItem::Complex(token));
            }

            ExprTokenKind::Subscript { .. } => {
                return Err(CompileError::new(
                    ErrorKind::Internal("subscript token before RPN conversion".into()),
                    token.src,
                ));
            }

            ExprTokenKind::Delimiter(delim) => match delim {
                ExprDelimiter::BegParen => stack.push(StackItem::Paren(token)),
                ExprDelimiter::BegCurly => stack.push(StackItem::Curly(token)),
                ExprDelimiter::BegBracket => {
                    // Flush anything binding at least as tight, then push.
                    while let Some(StackItem::Operator(top)) = stack.last() {
                        if prec_of(top) < SUBSCRIPT_PREC {
                            break;
                        }
                        if let Some(StackItem::Operator(t)) = stack.pop() {
                            output.push(t);
                        }
                    }
                    stack.push(StackItem::Bracket { token, commas: 0 });
                }
                ExprDelimiter::EndParen => {
                    loop {
                        match stack.pop() {
                            Some(StackItem::Operator(t)) => output.push(t),
                            Some(StackItem::Paren(_)) => break,
                            Some(_) | None => {
                                return Err(CompileError::new(
                                    ErrorKind::UnmatchedClose(')'),
                                    token.src,
                                ))
                            }
                        }
                    }
                    // A call beneath the paren completes now.
                    if matches!(stack.last(), Some(StackItem::Call(_))) {
                        if let Some(StackItem::Call(call)) = stack.pop() {
                            output.push(call);
                        }
                    }
                }
                ExprDelimiter::EndBracket => {
                    let mut dims = None;
                    loop {
                        match stack.pop() {
                            Some(StackItem::Operator(t)) => output.push(t),
                            Some(StackItem::Bracket { token: _, commas }) => {
                                dims = Some(commas + 1);
                                break;
                            }
                            Some(_) | None => {
                                return Err(CompileError::new(
                                    ErrorKind::UnmatchedClose(']'),
                                    token.src,
                                ))
                            }
                        }
                    }
                    let mut subscript = ExprToken::new(
                        ExprTokenKind::Subscript {
                            dim_nr: dims.unwrap_or(1),
                        },
                        token.src,
                    );
                    subscript.is_calculated = true;
                    output.push(subscript);
                }
                ExprDelimiter::EndCurly => {
                    loop {
                        match stack.pop() {
                            Some(StackItem::Operator(t)) => output.push(t),
                            Some(StackItem::Curly(_)) => break,
                            Some(_) | None => {
                                return Err(CompileError::new(
                                    ErrorKind::UnmatchedClose('}'),
                                    token.src,
                                ))
                            }
                        }
                    }
                    match stack.pop() {
                        Some(StackItem::Complex(complex)) => output.push(complex),
                        _ => {
                            return Err(CompileError::new(
                                ErrorKind::Internal(
                                    "complex token missing beneath `{`".into(),
                                ),
                                token.src,
                            ))
                        }
                    }
                }
                ExprDelimiter::Comma => {
                    // Pop to the nearest opening delimiter without
                    // removing it; brackets count their commas.
                    loop {
                        match stack.last_mut() {
                            Some(StackItem::Operator(_)) => {
                                if let Some(StackItem::Operator(t)) = stack.pop() {
                                    output.push(t);
                                }
                            }
                            Some(StackItem::Bracket { commas, .. }) => {
                                *commas += 1;
                                break;
                            }
                            Some(StackItem::Paren(_)) | Some(StackItem::Curly(_)) => break,
                            Some(StackItem::Call(_))
                            | Some(StackItem::Complex(_))
                            | None => {
                                return Err(CompileError::new(
                                    ErrorKind::UnmatchedClose(','),
                                    token.src,
                                ))
                            }
                        }
                    }
                }
            },
        }
    }

    // Drain the stack; any remaining delimiter is unbalanced.
    while let Some(item) = stack.pop() {
        match item {
            StackItem::Operator(t) => output.push(t),
            StackItem::Paren(t) | StackItem::Call(t) => {
                return Err(CompileError::new(ErrorKind::UnmatchedOpen('('), t.src))
            }
            StackItem::Bracket { token, .. } => {
                return Err(CompileError::new(ErrorKind::UnmatchedOpen('['), token.src))
            }
            StackItem::Curly(t) | StackItem::Complex(t) => {
                return Err(CompileError::new(ErrorKind::UnmatchedOpen('{'), t.src))
            }
        }
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use stave_common::span::{FileId, SrcInfo};
    use stave_symtab::SymbolTable;

    fn src() -> SrcInfo {
        SrcInfo::new(FileId(0), 1, 1)
    }

    fn int(st: &SymbolTable, v: i32) -> ExprToken {
        ExprToken::this_int(st, v, src())
    }

    fn op(opr: ExprOperator) -> ExprToken {
        ExprToken::new(ExprTokenKind::Operator(opr), src())
    }

    fn delim(d: ExprDelimiter) -> ExprToken {
        ExprToken::new(ExprTokenKind::Delimiter(d), src())
    }

    fn shape(tokens: &[ExprToken]) -> Vec<String> {
        tokens
            .iter()
            .map(|t| match &t.kind {
                ExprTokenKind::Operand(crate::token::OperandData::Lit { value, .. }) => {
                    format!("{value:?}")
                }
                ExprTokenKind::Operator(o) => o.def().text.to_string(),
                ExprTokenKind::Subscript { dim_nr } => format!("sub{dim_nr}"),
                other => format!("{other:?}"),
            })
            .collect()
    }

    #[test]
    fn precedence_orders_mul_before_add() {
        let st = SymbolTable::new("main");
        // 1 + 2 * 3 -> 1 2 3 * +
        let rpn = infix_to_rpn(vec![
            int(&st, 1),
            op(ExprOperator::Addition),
            int(&st, 2),
            op(ExprOperator::Multiplication),
            int(&st, 3),
        ])
        .unwrap();
        assert_eq!(
            shape(&rpn),
            vec!["Int(1)", "Int(2)", "Int(3)", "*", "+"]
        );
    }

    #[test]
    fn parens_group() {
        let st = SymbolTable::new("main");
        // (1 + 2) * 3 -> 1 2 + 3 *
        let rpn = infix_to_rpn(vec![
            delim(ExprDelimiter::BegParen),
            int(&st, 1),
            op(ExprOperator::Addition),
            int(&st, 2),
            delim(ExprDelimiter::EndParen),
            op(ExprOperator::Multiplication),
            int(&st, 3),
        ])
        .unwrap();
        assert_eq!(
            shape(&rpn),
            vec!["Int(1)", "Int(2)", "+", "Int(3)", "*"]
        );
    }

    #[test]
    fn right_assoc_assignment_chains() {
        let st = SymbolTable::new("main");
        // 1 = 2 = 3 -> 1 2 3 = =  (stand-in literals; shape only)
        let rpn = infix_to_rpn(vec![
            int(&st, 1),
            op(ExprOperator::Assign),
            int(&st, 2),
            op(ExprOperator::Assign),
            int(&st, 3),
        ])
        .unwrap();
        assert_eq!(
            shape(&rpn),
            vec!["Int(1)", "Int(2)", "Int(3)", "=", "="]
        );
    }

    #[test]
    fn subscript_counts_dimensions() {
        let st = SymbolTable::new("main");
        // a[1, 2] -> a 1 2 sub2 (operand stands in for `a`)
        let rpn = infix_to_rpn(vec![
            int(&st, 9),
            delim(ExprDelimiter::BegBracket),
            int(&st, 1),
            delim(ExprDelimiter::Comma),
            int(&st, 2),
            delim(ExprDelimiter::EndBracket),
        ])
        .unwrap();
        assert_eq!(
            shape(&rpn),
            vec!["Int(9)", "Int(1)", "Int(2)", "sub2"]
        );
    }

    #[test]
    fn unary_minus_binds_tighter_than_binary() {
        let st = SymbolTable::new("main");
        // -1 + 2 -> 1 neg 2 +
        let rpn = infix_to_rpn(vec![
            op(ExprOperator::UnaryMinus),
            int(&st, 1),
            op(ExprOperator::Addition),
            int(&st, 2),
        ])
        .unwrap();
        assert_eq!(shape(&rpn), vec!["Int(1)", "-", "Int(2)", "+"]);
    }

    #[test]
    fn unbalanced_delimiters_are_reported() {
        let st = SymbolTable::new("main");
        let err = infix_to_rpn(vec![delim(ExprDelimiter::BegParen), int(&st, 1)]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnmatchedOpen('('));
        let err = infix_to_rpn(vec![int(&st, 1), delim(ExprDelimiter::EndBracket)]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnmatchedClose(']'));
    }
}
