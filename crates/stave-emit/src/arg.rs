//! Instruction arguments.
//!
//! Every instruction operand is an [`AsmArg`]: a literal inlined in the
//! instruction, a variable address, an indirection slot, a parameter slot,
//! a function, a jump label, or one of the table references (geometry,
//! meta constants). Arguments carry the entity name alongside the index so
//! the listing stream stays readable without back-references.

use std::fmt;

use serde::Serialize;

use stave_common::cpu::{CpuAdr, CpuBol, CpuChr, CpuFlo, CpuInt, CpuLon, CpuShr, CpuWrd};
use stave_symtab::{FunIndex, ParmIndex, VarIndex};

/// Index of a fixed-array geometry entry in the binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct AgxIndex(pub usize);

/// Which reflective table a meta argument references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MetaCase {
    /// Field-names table of a type.
    FldNames,
    /// Field-types table of a type.
    FldTypes,
    /// Name of a type.
    TypName,
    /// Name of a variable.
    VarName,
}

/// One instruction operand.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum AsmArg {
    /// Boolean literal.
    LitBol(CpuBol),
    /// Char literal.
    LitChr(CpuChr),
    /// Short literal.
    LitShr(CpuShr),
    /// Integer literal.
    LitInt(CpuInt),
    /// Long literal.
    LitLon(CpuLon),
    /// Float literal.
    LitFlo(CpuFlo),
    /// String literal: address into the literal-string table.
    LitStr(CpuAdr),
    /// Word literal (sizes, offsets, dimension counts).
    LitWrd(CpuWrd),
    /// Direct variable access.
    Var { index: VarIndex, name: String },
    /// Access through an indirection slot.
    Ind { index: VarIndex, name: String },
    /// Parameter slot of a callee.
    Par { index: ParmIndex, name: String },
    /// Callee.
    Fun { index: FunIndex, name: String },
    /// Fixed-array geometry reference.
    Agx(AgxIndex),
    /// Raw variable address (reference seeding).
    Vad(CpuAdr),
    /// Jump label, resolved by the jump-destination table.
    Jmp(String),
    /// Meta-constant reference.
    Mta { case: MetaCase, index: usize },
    /// Placeholder emitted after an error; never survives a successful
    /// compile.
    Err,
    /// Empty argument slot.
    Nva,
}

impl fmt::Display for AsmArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LitBol(v) => write!(f, "{}", if *v { "true" } else { "false" }),
            Self::LitChr(v) => write!(f, "'{}'", *v as char),
            Self::LitShr(v) => write!(f, "{v}S"),
            Self::LitInt(v) => write!(f, "{v}"),
            Self::LitLon(v) => write!(f, "{v}L"),
            Self::LitFlo(v) => write!(f, "{v}F"),
            Self::LitStr(adr) => write!(f, "str:{adr}"),
            Self::LitWrd(v) => write!(f, "{v}W"),
            Self::Var { name, .. } => write!(f, "{name}"),
            Self::Ind { name, .. } => write!(f, "[{name}]"),
            Self::Par { name, .. } => write!(f, "par:{name}"),
            Self::Fun { name, .. } => write!(f, "fun:{name}"),
            Self::Agx(agx) => write!(f, "agx:{}", agx.0),
            Self::Vad(adr) => write!(f, "vad:{adr}"),
            Self::Jmp(label) => write!(f, "{label}"),
            Self::Mta { case, index } => {
                let tag = match case {
                    MetaCase::FldNames => "fldnames",
                    MetaCase::FldTypes => "fldtypes",
                    MetaCase::TypName => "typname",
                    MetaCase::VarName => "varname",
                };
                write!(f, "mta:{tag}:{index}")
            }
            Self::Err => write!(f, "<err>"),
            Self::Nva => write!(f, "_"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_forms() {
        assert_eq!(AsmArg::LitInt(7).to_string(), "7");
        assert_eq!(AsmArg::LitLon(7).to_string(), "7L");
        assert_eq!(AsmArg::LitBol(true).to_string(), "true");
        assert_eq!(
            AsmArg::Var {
                index: VarIndex(3),
                name: "count".into()
            }
            .to_string(),
            "count"
        );
        assert_eq!(
            AsmArg::Ind {
                index: VarIndex(3),
                name: "$t003".into()
            }
            .to_string(),
            "[$t003]"
        );
        assert_eq!(AsmArg::Jmp("CN00001FAL".into()).to_string(), "CN00001FAL");
        assert_eq!(
            AsmArg::Mta {
                case: MetaCase::TypName,
                index: 4
            }
            .to_string(),
            "mta:typname:4"
        );
    }
}
