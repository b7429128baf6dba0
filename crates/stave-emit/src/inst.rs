//! The virtual machine instruction set.
//!
//! One variant per opcode; the variant name uppercased is the assembler
//! mnemonic. Operand types travel in [`crate::arg::AsmArg`] values, so the
//! opcode itself is a bare tag. The expression compiler emits a subset of
//! this list; the full set is declared here because the emitter is the
//! single owner of mnemonics.

use serde::Serialize;

/// VM opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Opcode {
    // ── Moves (typed) ──────────────────────────────────────────────────
    Mvb,
    Mvc,
    Mvs,
    Mvi,
    Mvl,
    Mvf,
    Mvw,
    Mvr,
    // ── Compound assignment ────────────────────────────────────────────
    Mvad,
    Mvsu,
    Mvmu,
    Mvdi,
    Mvmo,
    Mvsl,
    Mvsr,
    Mvan,
    Mvxo,
    Mvor,
    // ── Arithmetic ─────────────────────────────────────────────────────
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Neg,
    Inc,
    Dec,
    Pinc,
    Pdec,
    Bnot,
    Band,
    Bxor,
    Bor,
    Shl,
    Shr,
    // ── Comparison ─────────────────────────────────────────────────────
    Les,
    Leq,
    Gre,
    Geq,
    Equ,
    Dis,
    // ── Logical and jumps ──────────────────────────────────────────────
    Land,
    Lor,
    Lnot,
    Jmpfl,
    Jmp,
    // ── Conversions ────────────────────────────────────────────────────
    Ch2Sh,
    Ch2In,
    Ch2Lo,
    Ch2Fl,
    Ch2St,
    Sh2Ch,
    Sh2In,
    Sh2Lo,
    Sh2Fl,
    Sh2St,
    In2Ch,
    In2Sh,
    In2Lo,
    In2Fl,
    In2St,
    Lo2Ch,
    Lo2Sh,
    Lo2In,
    Lo2Fl,
    Lo2St,
    Fl2Ch,
    Fl2Sh,
    Fl2In,
    Fl2Lo,
    Fl2St,
    St2Bo,
    St2Ch,
    St2Sh,
    St2In,
    St2Lo,
    St2Fl,
    Bo2In,
    Bo2St,
    // ── Strings ────────────────────────────────────────────────────────
    Slen,
    Smid,
    Sleft,
    Srght,
    Scutl,
    Scutr,
    Sconc,
    Sappn,
    Sfind,
    Ssubs,
    Srepl,
    Strim,
    Suppr,
    Slowr,
    Sljus,
    Srjus,
    Smatc,
    Slike,
    Srepe,
    Sspli,
    Sstwi,
    Senwi,
    Semp,
    Sswcp,
    Smvrc,
    Sindx,
    // ── Fixed-array geometry ───────────────────────────────────────────
    Afdef,
    Afssz,
    Afidx,
    Afref,
    Af1Rf,
    Af1Fo,
    Af1Nx,
    Af1Rw,
    Af2F,
    Af2D,
    Af1Sj,
    Af1Cj,
    // ── Dynamic arrays ─────────────────────────────────────────────────
    Addef,
    Adset,
    Adrsz,
    Adidx,
    Adref,
    Ad1Rf,
    Ad1Fo,
    Ad1Nx,
    Ad1Rw,
    Ad1Ap,
    Ad1Em,
    Ad1Df,
    Ad1In,
    Ad1De,
    Ad1Sj,
    Ad1Cj,
    Adsiz,
    Adget,
    Ademp,
    Adrst,
    Acopy,
    Atoca,
    // ── References, parameter passing, calls ───────────────────────────
    Refer,
    Refof,
    Refad,
    Refpu,
    Pushb,
    Pushc,
    Pushs,
    Pushi,
    Pushl,
    Pushf,
    Pushw,
    Pushr,
    Lpub,
    Lpuc,
    Lpus,
    Lpui,
    Lpul,
    Lpuf,
    Lpur,
    Lrpub,
    Lrpuc,
    Lrpus,
    Lrpui,
    Lrpul,
    Lrpuf,
    Lrpur,
    Lpab,
    Lpac,
    Lpas,
    Lpai,
    Lpal,
    Lpaf,
    Lcall,
    Scall,
    Call,
    Calln,
    // ── Block management ───────────────────────────────────────────────
    Copy,
    Rpbeg,
    Rpstr,
    Rparr,
    Rplof,
    Rplod,
    Rpend,
    Bibeg,
    Bistr,
    Biarr,
    Bilof,
    Biend,
    Toca,
    Stoca,
    Frca,
    Sfrca,
    Afrca,
}

impl Opcode {
    /// Assembler mnemonic: the variant name uppercased.
    pub fn mnemonic(self) -> String {
        format!("{self:?}").to_uppercase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mnemonics_match_wire_names() {
        assert_eq!(Opcode::Mvad.mnemonic(), "MVAD");
        assert_eq!(Opcode::Ch2St.mnemonic(), "CH2ST");
        assert_eq!(Opcode::Af1Nx.mnemonic(), "AF1NX");
        assert_eq!(Opcode::Ad1Ap.mnemonic(), "AD1AP");
        assert_eq!(Opcode::Jmpfl.mnemonic(), "JMPFL");
        assert_eq!(Opcode::Refof.mnemonic(), "REFOF");
        assert_eq!(Opcode::Lrpub.mnemonic(), "LRPUB");
        assert_eq!(Opcode::Rplof.mnemonic(), "RPLOF");
    }
}
