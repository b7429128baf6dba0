//! Stage 2: ternary binding.
//!
//! Walks the infix token list repeatedly: the first unlabeled `?` inside
//! parentheses gets a fresh label seed, the matching `:` at the same
//! nesting levels gets the same seed, and a synthetic `TernaryEnd` token
//! is inserted just before the enclosing `)`. The loop ends when no
//! unlabeled `?` remains.

use stave_common::{CResult, CompileError, ErrorKind};
use stave_symtab::SymbolTable;

use crate::oper::{ExprDelimiter, LowLevelOpr};
use crate::token::{ExprToken, ExprTokenKind};

/// Nesting levels at one token position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct Levels {
    par: i32,
    bra: i32,
    cly: i32,
}

fn step(levels: &mut Levels, token: &ExprToken) {
    if let ExprTokenKind::Delimiter(d) = &token.kind {
        match d {
            ExprDelimiter::BegParen => levels.par += 1,
            ExprDelimiter::EndParen => levels.par -= 1,
            ExprDelimiter::BegBracket => levels.bra += 1,
            ExprDelimiter::EndBracket => levels.bra -= 1,
            ExprDelimiter::BegCurly => levels.cly += 1,
            ExprDelimiter::EndCurly => levels.cly -= 1,
            ExprDelimiter::Comma => {}
        }
    }
}

/// Assign label seeds to every `?`/`:` pair and insert the synthetic
/// `TernaryEnd` tokens.
pub fn ternary_label(st: &mut SymbolTable, tokens: &mut Vec<ExprToken>) -> CResult<()> {
    loop {
        // First unlabeled `?`.
        let mut levels = Levels::default();
        let mut cond = None;
        for (i, token) in tokens.iter().enumerate() {
            step(&mut levels, token);
            if matches!(token.kind, ExprTokenKind::LowLevelOpr(LowLevelOpr::TernaryCond))
                && token.label_seed.is_none()
            {
                cond = Some((i, levels));
                break;
            }
        }
        let (cond_idx, cond_levels) = match cond {
            Some(found) => found,
            None => return Ok(()),
        };
        if cond_levels.par <= 0 {
            return Err(CompileError::new(
                ErrorKind::UnexpectedToken("`?` outside parentheses".into()),
                tokens[cond_idx].src,
            ));
        }
        let seed = st.label_generator();
        st.increase_label_generator();
        tokens[cond_idx].label_seed = Some(seed);

        // The matching `:` at the same nesting levels.
        let mut levels = cond_levels;
        let mut mid_idx = None;
        for i in cond_idx + 1..tokens.len() {
            step(&mut levels, &tokens[i]);
            if levels.par < cond_levels.par {
                break;
            }
            if levels == cond_levels
                && matches!(
                    tokens[i].kind,
                    ExprTokenKind::LowLevelOpr(LowLevelOpr::TernaryMid)
                )
                && tokens[i].label_seed.is_none()
            {
                mid_idx = Some(i);
                break;
            }
        }
        let mid_idx = mid_idx.ok_or_else(|| {
            CompileError::new(ErrorKind::TernaryMissingColon, tokens[cond_idx].src)
        })?;
        tokens[mid_idx].label_seed = Some(seed);

        // The enclosing `)`: insert TernaryEnd just before it.
        let mut levels = cond_levels;
        let mut end_idx = None;
        for i in mid_idx + 1..tokens.len() {
            step(&mut levels, &tokens[i]);
            if levels.par < cond_levels.par {
                end_idx = Some(i);
                break;
            }
        }
        let end_idx = end_idx.ok_or_else(|| {
            CompileError::new(ErrorKind::UnmatchedOpen('('), tokens[cond_idx].src)
        })?;
        let mut end = ExprToken::new(
            ExprTokenKind::LowLevelOpr(LowLevelOpr::TernaryEnd),
            tokens[end_idx].src,
        );
        end.label_seed = Some(seed);
        tokens.insert(end_idx, end);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stave_common::span::{FileId, SrcInfo};

    fn src() -> SrcInfo {
        SrcInfo::new(FileId(0), 1, 1)
    }

    fn tok(kind: ExprTokenKind) -> ExprToken {
        ExprToken::new(kind, src())
    }

    fn delim(d: ExprDelimiter) -> ExprToken {
        tok(ExprTokenKind::Delimiter(d))
    }

    fn low(l: LowLevelOpr) -> ExprToken {
        tok(ExprTokenKind::LowLevelOpr(l))
    }

    fn operand(st: &SymbolTable, v: i32) -> ExprToken {
        ExprToken::this_int(st, v, src())
    }

    #[test]
    fn labels_one_ternary_and_inserts_end() {
        let mut st = SymbolTable::new("main");
        // ( 1 ? 2 : 3 )
        let mut tokens = vec![
            delim(ExprDelimiter::BegParen),
            operand(&st, 1),
            low(LowLevelOpr::TernaryCond),
            operand(&st, 2),
            low(LowLevelOpr::TernaryMid),
            operand(&st, 3),
            delim(ExprDelimiter::EndParen),
        ];
        ternary_label(&mut st, &mut tokens).unwrap();
        assert_eq!(tokens.len(), 8);
        assert_eq!(tokens[2].label_seed, Some(0));
        assert_eq!(tokens[4].label_seed, Some(0));
        assert!(matches!(
            tokens[6].kind,
            ExprTokenKind::LowLevelOpr(LowLevelOpr::TernaryEnd)
        ));
        assert_eq!(tokens[6].label_seed, Some(0));
    }

    #[test]
    fn nested_ternaries_get_distinct_seeds() {
        let mut st = SymbolTable::new("main");
        // ( 1 ? ( 2 ? 3 : 4 ) : 5 )
        let mut tokens = vec![
            delim(ExprDelimiter::BegParen),
            operand(&st, 1),
            low(LowLevelOpr::TernaryCond),
            delim(ExprDelimiter::BegParen),
            operand(&st, 2),
            low(LowLevelOpr::TernaryCond),
            operand(&st, 3),
            low(LowLevelOpr::TernaryMid),
            operand(&st, 4),
            delim(ExprDelimiter::EndParen),
            low(LowLevelOpr::TernaryMid),
            operand(&st, 5),
            delim(ExprDelimiter::EndParen),
        ];
        ternary_label(&mut st, &mut tokens).unwrap();
        // Two TernaryEnd tokens inserted.
        let ends: Vec<_> = tokens
            .iter()
            .filter(|t| {
                matches!(
                    t.kind,
                    ExprTokenKind::LowLevelOpr(LowLevelOpr::TernaryEnd)
                )
            })
            .collect();
        assert_eq!(ends.len(), 2);
        // Outer `?` got seed 0, inner got seed 1; the outer `:` (at the
        // outer levels) carries seed 0.
        assert_eq!(tokens[2].label_seed, Some(0));
        let inner_cond = tokens
            .iter()
            .position(|t| {
                matches!(t.kind, ExprTokenKind::LowLevelOpr(LowLevelOpr::TernaryCond))
                    && t.label_seed == Some(1)
            })
            .unwrap();
        assert!(inner_cond > 2);
    }

    #[test]
    fn missing_colon_is_an_error() {
        let mut st = SymbolTable::new("main");
        let mut tokens = vec![
            delim(ExprDelimiter::BegParen),
            operand(&st, 1),
            low(LowLevelOpr::TernaryCond),
            operand(&st, 2),
            delim(ExprDelimiter::EndParen),
        ];
        let err = ternary_label(&mut st, &mut tokens).unwrap_err();
        assert_eq!(err.kind, ErrorKind::TernaryMissingColon);
    }

    #[test]
    fn unparenthesized_ternary_is_rejected() {
        let mut st = SymbolTable::new("main");
        let mut tokens = vec![
            operand(&st, 1),
            low(LowLevelOpr::TernaryCond),
            operand(&st, 2),
            low(LowLevelOpr::TernaryMid),
            operand(&st, 3),
        ];
        assert!(ternary_label(&mut st, &mut tokens).is_err());
    }
}
