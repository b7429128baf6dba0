//! The inner-block walker: value construction for composite values.
//!
//! [`copy_operand`] and [`init_operand`] are the single entry points for
//! copying and initializing values. Composite types whose graph contains
//! heap-owning blocks (string buffers, dynamic-array headers) get a raw
//! byte copy followed by a two-pass recursive walk: pass 1 replicates or
//! initializes every leaf block at its offset, pass 2 opens a loop per
//! embedded array whose elements themselves carry blocks. Together the
//! passes touch every owning block exactly once before any containing
//! loop runs. Static class fields live at module level and the walker
//! skips them.

use stave_common::cpu::CpuWrd;
use stave_common::{CResult, CompileError, ErrorKind};
use stave_emit::{AsmArg, BinaryWriter, Opcode};
use stave_symtab::{FldIndex, MasterType, SymbolTable, TypIndex};

use crate::token::{ExprToken, OperandData};

/// Conservative same-storage test: only direct-address operands compare,
/// by variable index. Indirections never compare equal even if they alias
/// at runtime.
pub fn same_operand(a: &ExprToken, b: &ExprToken) -> bool {
    matches!(
        (a.operand(), b.operand()),
        (Some(OperandData::Var { var: va }), Some(OperandData::Var { var: vb })) if va == vb
    )
}

fn move_opcode(master: MasterType) -> Option<Opcode> {
    match master {
        MasterType::Boolean => Some(Opcode::Mvb),
        MasterType::Char => Some(Opcode::Mvc),
        MasterType::Short => Some(Opcode::Mvs),
        MasterType::Integer => Some(Opcode::Mvi),
        MasterType::Long => Some(Opcode::Mvl),
        MasterType::Float => Some(Opcode::Mvf),
        MasterType::Enum => Some(Opcode::Mvi),
        _ => None,
    }
}

/// Copy `src` into `dst`. Selects the move form by the destination's
/// master type: typed moves for atomics, string move-with-recopy, deep
/// array copy, and raw copy plus block replication for classes and fixed
/// arrays that own blocks.
pub fn copy_operand(
    st: &mut SymbolTable,
    writer: &mut BinaryWriter,
    dst: &ExprToken,
    src: &ExprToken,
) -> CResult<()> {
    if same_operand(dst, src) {
        mark_initialized(st, dst);
        return Ok(());
    }
    let typ = dst.typ_index(st).ok_or_else(|| non_operand(dst))?;
    let master = st.typ_master(typ);
    match master {
        MasterType::String => {
            writer.asm_write_code(Opcode::Smvrc, vec![dst.asm(st), src.asm(st)]);
        }
        MasterType::DynArray => {
            let src_typ = src.typ_index(st).ok_or_else(|| non_operand(src))?;
            if st.typ_master(src_typ) == MasterType::FixArray {
                let agx = geometry_of(st, writer, src_typ);
                writer.asm_write_code(
                    Opcode::Atoca,
                    vec![dst.asm(st), src.asm(st), AsmArg::Agx(agx)],
                );
            } else {
                writer.asm_write_code(Opcode::Acopy, vec![dst.asm(st), src.asm(st)]);
            }
        }
        MasterType::Class | MasterType::FixArray => {
            let length = st.typ(typ).length;
            writer.asm_write_code(
                Opcode::Copy,
                vec![dst.asm(st), src.asm(st), AsmArg::LitWrd(length)],
            );
            if st.has_inner_blocks(typ) {
                writer.asm_write_code(Opcode::Rpbeg, vec![dst.asm(st), src.asm(st)]);
                walk(st, writer, WalkMode::Replicate, 1, 0, typ);
                walk(st, writer, WalkMode::Replicate, 2, 0, typ);
                writer.asm_write_code(Opcode::Rpend, vec![]);
            }
        }
        _ => {
            let opcode = move_opcode(master).ok_or_else(|| non_operand(dst))?;
            writer.asm_write_code(opcode, vec![dst.asm(st), src.asm(st)]);
        }
    }
    mark_initialized(st, dst);
    Ok(())
}

/// Initialize `dst` to its type's empty value. Emits code only for types
/// that own blocks; returns whether any instruction was produced.
pub fn init_operand(
    st: &mut SymbolTable,
    writer: &mut BinaryWriter,
    dst: &ExprToken,
) -> CResult<bool> {
    let typ = dst.typ_index(st).ok_or_else(|| non_operand(dst))?;
    if !st.has_inner_blocks(typ) {
        mark_initialized(st, dst);
        return Ok(false);
    }
    writer.asm_write_code(Opcode::Bibeg, vec![dst.asm(st)]);
    match st.typ_master(typ) {
        MasterType::String => {
            writer.asm_write_code(Opcode::Bistr, vec![AsmArg::LitWrd(0)]);
        }
        MasterType::DynArray => {
            writer.asm_write_code(Opcode::Biarr, vec![AsmArg::LitWrd(0)]);
        }
        _ => {
            walk(st, writer, WalkMode::Init, 1, 0, typ);
            walk(st, writer, WalkMode::Init, 2, 0, typ);
        }
    }
    writer.asm_write_code(Opcode::Biend, vec![]);
    mark_initialized(st, dst);
    Ok(true)
}

/// Static fields of a class, in declaration order. They are initialized
/// at module level; the instance walker never visits them.
pub fn static_fields(st: &SymbolTable, typ: TypIndex) -> Vec<FldIndex> {
    st.typ(typ)
        .field_range()
        .filter(|&f| st.fld(FldIndex(f)).is_static)
        .map(FldIndex)
        .collect()
}

#[derive(Clone, Copy, PartialEq)]
enum WalkMode {
    Replicate,
    Init,
}

/// One walker pass over the type graph at `cumul_offset`.
///
/// Pass 1 emits a leaf instruction per string/dynamic-array offset and
/// recurses into class fields. Pass 2 opens a loop per embedded array
/// whose element type owns blocks, runs both passes on the element type,
/// and closes the loop.
fn walk(
    st: &SymbolTable,
    writer: &mut BinaryWriter,
    mode: WalkMode,
    phase: u8,
    cumul_offset: CpuWrd,
    typ: TypIndex,
) {
    let def = st.typ(typ);
    match def.master {
        MasterType::String if phase == 1 => {
            let opcode = if mode == WalkMode::Replicate {
                Opcode::Rpstr
            } else {
                Opcode::Bistr
            };
            writer.asm_write_code(opcode, vec![AsmArg::LitWrd(cumul_offset)]);
        }
        MasterType::DynArray if phase == 1 => {
            let opcode = if mode == WalkMode::Replicate {
                Opcode::Rparr
            } else {
                Opcode::Biarr
            };
            writer.asm_write_code(opcode, vec![AsmArg::LitWrd(cumul_offset)]);
        }
        MasterType::Class => {
            for f in def.field_range() {
                let field = st.fld(FldIndex(f));
                if field.is_static {
                    continue;
                }
                walk(st, writer, mode, phase, cumul_offset + field.offset, field.typ);
            }
        }
        MasterType::FixArray if phase == 2 => {
            let elem = def.elem_typ.expect("fixed array has an element type");
            if !st.has_inner_blocks(elem) {
                return;
            }
            let dim = st.dim(def.dim_index.expect("fixed array has geometry"));
            let opcode = if mode == WalkMode::Replicate {
                Opcode::Rplof
            } else {
                Opcode::Bilof
            };
            writer.asm_write_code(
                opcode,
                vec![
                    AsmArg::LitWrd(cumul_offset),
                    AsmArg::LitWrd(dim.cell_count()),
                    AsmArg::LitWrd(st.typ(elem).length),
                ],
            );
            walk(st, writer, mode, 1, 0, elem);
            walk(st, writer, mode, 2, 0, elem);
            let end = if mode == WalkMode::Replicate {
                Opcode::Rpend
            } else {
                Opcode::Biend
            };
            writer.asm_write_code(end, vec![]);
        }
        MasterType::DynArray if phase == 2 && mode == WalkMode::Replicate => {
            let elem = def.elem_typ.expect("dynamic array has an element type");
            if !st.has_inner_blocks(elem) {
                return;
            }
            writer.asm_write_code(Opcode::Rplod, vec![AsmArg::LitWrd(cumul_offset)]);
            walk(st, writer, WalkMode::Replicate, 1, 0, elem);
            walk(st, writer, WalkMode::Replicate, 2, 0, elem);
            writer.asm_write_code(Opcode::Rpend, vec![]);
        }
        _ => {}
    }
}

/// Geometry entry for a fixed-array type.
pub fn geometry_of(
    st: &SymbolTable,
    writer: &mut BinaryWriter,
    typ: TypIndex,
) -> stave_emit::AgxIndex {
    let def = st.typ(typ);
    let dim = st.dim(def.dim_index.expect("fixed array has geometry"));
    let elem_len = def
        .elem_typ
        .map(|e| st.typ(e).length)
        .unwrap_or(1);
    writer.store_arr_fix_def(dim.dim_nr, dim.sizes, elem_len)
}

fn mark_initialized(st: &mut SymbolTable, dst: &ExprToken) {
    if let Some(var) = dst.var_index() {
        st.var_mut(var).is_initialized = true;
    }
}

fn non_operand(tok: &ExprToken) -> CompileError {
    CompileError::new(
        ErrorKind::Internal("copy/init of a non-operand token".into()),
        tok.src,
    )
}
