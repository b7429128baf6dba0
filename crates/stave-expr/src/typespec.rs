//! Type specification reader.
//!
//! Parses a full type specification from the parser-token stream: a type
//! name optionally followed by one bracket group declaring fixed geometry
//! (`int[3,4]`, literal sizes) or a dynamic array shape (`int[]`,
//! `int[,]`). Used by type casts, embedded declarations, and constructor
//! argument positions.

use stave_common::cpu::CpuWrd;
use stave_common::{CResult, CompileError, ErrorKind, PrPunctuator, PrTokenKind, Sentence};
use stave_symtab::{ArrayIndexes, ScopeDef, SymbolTable, TypIndex, MAX_DIMS};

/// Parse a type specification starting at token `pos`. Returns the type
/// and the position just past the specification.
///
/// Fixed geometry creates (or reuses) the array type and its dimension
/// entry; a bare bracket group creates the dynamic array type.
pub fn read_type_spec(
    st: &mut SymbolTable,
    scope: &ScopeDef,
    stn: &Sentence,
    pos: usize,
) -> CResult<(TypIndex, usize)> {
    let src = stn.src(pos);
    let name = match stn.kind(pos) {
        Some(PrTokenKind::TypeName(name)) => name.clone(),
        Some(other) => {
            return Err(CompileError::new(
                ErrorKind::UnexpectedToken(format!("{other:?}")),
                src,
            ))
        }
        None => return Err(CompileError::new(ErrorKind::EmptyExpression, src)),
    };
    let base = st
        .typ_search(&name, scope)
        .ok_or_else(|| CompileError::new(ErrorKind::UndefinedType(name.clone()), src))?;

    let mut next = pos + 1;
    if !stn.is_punctuator(next, PrPunctuator::BegBracket) {
        return Ok((base, next));
    }
    next += 1;

    // Empty brackets or bare commas declare a dynamic array.
    let mut dyn_dims = 1usize;
    let mut is_dynamic = false;
    if stn.is_punctuator(next, PrPunctuator::EndBracket) {
        is_dynamic = true;
    } else if stn.is_punctuator(next, PrPunctuator::Comma) {
        is_dynamic = true;
        while stn.is_punctuator(next, PrPunctuator::Comma) {
            dyn_dims += 1;
            next += 1;
        }
        if !stn.is_punctuator(next, PrPunctuator::EndBracket) {
            return Err(CompileError::new(ErrorKind::UnmatchedOpen('['), stn.src(next)));
        }
    }
    if is_dynamic {
        if dyn_dims > MAX_DIMS {
            return Err(CompileError::new(
                ErrorKind::UnexpectedToken(format!("array of {dyn_dims} dimensions")),
                src,
            ));
        }
        let typ = st.dyn_array_of(base, dyn_dims, *scope);
        return Ok((typ, next + 1));
    }

    // Fixed geometry: literal sizes separated by commas.
    let mut sizes: ArrayIndexes = [0; MAX_DIMS];
    let mut dim_nr = 0usize;
    loop {
        let size: CpuWrd = match stn.kind(next) {
            Some(PrTokenKind::LitInt(v)) => *v as CpuWrd,
            Some(PrTokenKind::LitLon(v)) => *v,
            Some(PrTokenKind::LitShr(v)) => *v as CpuWrd,
            _ => {
                return Err(CompileError::new(
                    ErrorKind::UnexpectedToken("array size must be an integer literal".into()),
                    stn.src(next),
                ))
            }
        };
        if size < 1 {
            return Err(CompileError::new(
                ErrorKind::UnexpectedToken(format!("array size {size} must be at least 1")),
                stn.src(next),
            ));
        }
        if dim_nr >= MAX_DIMS {
            return Err(CompileError::new(
                ErrorKind::UnexpectedToken(format!(
                    "array of more than {MAX_DIMS} dimensions"
                )),
                stn.src(next),
            ));
        }
        sizes[dim_nr] = size;
        dim_nr += 1;
        next += 1;
        if stn.is_punctuator(next, PrPunctuator::Comma) {
            next += 1;
            continue;
        }
        break;
    }
    if !stn.is_punctuator(next, PrPunctuator::EndBracket) {
        return Err(CompileError::new(ErrorKind::UnmatchedOpen('['), stn.src(next)));
    }
    let typ = st.fix_array_of(base, dim_nr, sizes, *scope);
    Ok((typ, next + 1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use stave_common::span::{FileId, SrcInfo};
    use stave_common::PrToken;
    use stave_symtab::MasterType;

    fn stn(kinds: Vec<PrTokenKind>) -> Sentence {
        Sentence::new(
            kinds
                .into_iter()
                .map(|k| PrToken::new(k, SrcInfo::new(FileId(0), 1, 1)))
                .collect(),
        )
    }

    #[test]
    fn plain_type_name() {
        let mut st = SymbolTable::new("main");
        let scope = ScopeDef::global();
        let s = stn(vec![PrTokenKind::TypeName("int".into())]);
        let (typ, next) = read_type_spec(&mut st, &scope, &s, 0).unwrap();
        assert_eq!(typ, st.sys().int);
        assert_eq!(next, 1);
    }

    #[test]
    fn fixed_geometry() {
        let mut st = SymbolTable::new("main");
        let scope = ScopeDef::global();
        let s = stn(vec![
            PrTokenKind::TypeName("int".into()),
            PrTokenKind::Punctuator(PrPunctuator::BegBracket),
            PrTokenKind::LitInt(3),
            PrTokenKind::Punctuator(PrPunctuator::Comma),
            PrTokenKind::LitInt(4),
            PrTokenKind::Punctuator(PrPunctuator::EndBracket),
        ]);
        let (typ, next) = read_type_spec(&mut st, &scope, &s, 0).unwrap();
        assert_eq!(next, 6);
        let def = st.typ(typ);
        assert_eq!(def.master, MasterType::FixArray);
        assert_eq!(def.dim_nr, 2);
        assert_eq!(def.length, 4 * 12);
        let dim = st.dim(def.dim_index.unwrap());
        assert_eq!(&dim.sizes[..2], &[3, 4]);
    }

    #[test]
    fn dynamic_shapes() {
        let mut st = SymbolTable::new("main");
        let scope = ScopeDef::global();
        let one = stn(vec![
            PrTokenKind::TypeName("string".into()),
            PrTokenKind::Punctuator(PrPunctuator::BegBracket),
            PrTokenKind::Punctuator(PrPunctuator::EndBracket),
        ]);
        let (typ, _) = read_type_spec(&mut st, &scope, &one, 0).unwrap();
        assert_eq!(st.typ(typ).master, MasterType::DynArray);
        assert_eq!(st.typ(typ).dim_nr, 1);

        let two = stn(vec![
            PrTokenKind::TypeName("int".into()),
            PrTokenKind::Punctuator(PrPunctuator::BegBracket),
            PrTokenKind::Punctuator(PrPunctuator::Comma),
            PrTokenKind::Punctuator(PrPunctuator::EndBracket),
        ]);
        let (typ2, _) = read_type_spec(&mut st, &scope, &two, 0).unwrap();
        assert_eq!(st.typ(typ2).dim_nr, 2);
    }

    #[test]
    fn rejects_unknown_type_and_bad_sizes() {
        let mut st = SymbolTable::new("main");
        let scope = ScopeDef::global();
        let bad = stn(vec![PrTokenKind::TypeName("vector".into())]);
        assert!(matches!(
            read_type_spec(&mut st, &scope, &bad, 0).unwrap_err().kind,
            ErrorKind::UndefinedType(_)
        ));
        let zero = stn(vec![
            PrTokenKind::TypeName("int".into()),
            PrTokenKind::Punctuator(PrPunctuator::BegBracket),
            PrTokenKind::LitInt(0),
            PrTokenKind::Punctuator(PrPunctuator::EndBracket),
        ]);
        assert!(read_type_spec(&mut st, &scope, &zero, 0).is_err());
    }
}
