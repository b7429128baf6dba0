//! The binary writer.
//!
//! Owns the append-only instruction stream, the jump-destination table, the
//! literal-string table, the fixed-array geometry table, the
//! dynamic-library call table, and the assembler listing stream. The
//! expression compiler is the writer's only producer during expression
//! compiles; everything here is sequential and synchronous.

use rustc_hash::FxHashMap;

use stave_common::cpu::{CpuAdr, CpuWrd};
use stave_symtab::{ArrayIndexes, MAX_DIMS};

use crate::arg::{AgxIndex, AsmArg};
use crate::inst::Opcode;

/// One emitted instruction: opcode plus arguments. The instruction's
/// address is its position in the code stream.
#[derive(Debug, Clone, PartialEq)]
pub struct Inst {
    pub opcode: Opcode,
    pub args: Vec<AsmArg>,
}

/// A resolved or forward jump destination.
#[derive(Debug, Clone, PartialEq)]
pub struct JumpDest {
    pub label: String,
    pub scope_depth: u32,
    pub address: CpuAdr,
}

/// One fixed-array geometry entry in the binary.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrFixDef {
    pub dim_nr: usize,
    pub sizes: ArrayIndexes,
    pub cell_size: CpuWrd,
}

/// One dynamic-library call site.
#[derive(Debug, Clone, PartialEq)]
pub struct DlCall {
    pub lib: String,
    pub fun: String,
}

/// The binary emitter.
#[derive(Debug, Default)]
pub struct BinaryWriter {
    code: Vec<Inst>,
    jump_dests: Vec<JumpDest>,
    lit_strings: Vec<String>,
    lit_string_index: FxHashMap<String, CpuAdr>,
    /// Bump pointer over the global data block (string bodies and other
    /// literal blocks land here).
    glob_pointer: CpuAdr,
    geometry: Vec<ArrFixDef>,
    geometry_index: FxHashMap<(usize, ArrayIndexes, CpuWrd), AgxIndex>,
    dl_calls: Vec<DlCall>,
    dl_call_index: FxHashMap<(String, String), usize>,
    listing: Vec<String>,
}

impl BinaryWriter {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Code stream ────────────────────────────────────────────────────

    /// Address of the next instruction to be emitted. Labels stamped here
    /// resolve to the next instruction.
    pub fn current_code_address(&self) -> CpuAdr {
        self.code.len() as CpuAdr
    }

    /// Append one instruction and its listing line.
    pub fn asm_write_code(&mut self, opcode: Opcode, args: Vec<AsmArg>) {
        let rendered: Vec<String> = args.iter().map(|a| a.to_string()).collect();
        self.listing.push(format!(
            "{:05}  {:<6} {}",
            self.code.len(),
            opcode.mnemonic(),
            rendered.join(",")
        ));
        self.code.push(Inst { opcode, args });
    }

    pub fn code(&self) -> &[Inst] {
        &self.code
    }

    /// Instructions emitted from `from` (inclusive) onward.
    pub fn code_since(&self, from: CpuAdr) -> &[Inst] {
        &self.code[from as usize..]
    }

    // ── Jump destinations ──────────────────────────────────────────────

    /// Record that `label` resolves to `address`. Forward references are
    /// legal: the jump may be emitted before its destination is stored.
    pub fn store_jump_destination(&mut self, label: impl Into<String>, scope_depth: u32, address: CpuAdr) {
        self.jump_dests.push(JumpDest {
            label: label.into(),
            scope_depth,
            address,
        });
    }

    pub fn jump_destination(&self, label: &str) -> Option<CpuAdr> {
        self.jump_dests
            .iter()
            .find(|d| d.label == label)
            .map(|d| d.address)
    }

    pub fn jump_destinations(&self) -> &[JumpDest] {
        &self.jump_dests
    }

    // ── Literal strings and global data ────────────────────────────────

    /// Intern a literal string; identical strings share one address.
    pub fn store_lit_string(&mut self, value: &str) -> CpuAdr {
        if let Some(&adr) = self.lit_string_index.get(value) {
            return adr;
        }
        let adr = self.glob_pointer;
        self.glob_pointer += value.len() as CpuAdr + 1;
        self.lit_strings.push(value.to_string());
        self.lit_string_index.insert(value.to_string(), adr);
        adr
    }

    /// The literal string stored at `adr`, when one is.
    pub fn lit_string_at(&self, adr: CpuAdr) -> Option<&str> {
        self.lit_string_index
            .iter()
            .find(|(_, &a)| a == adr)
            .map(|(s, _)| s.as_str())
    }

    /// Current end of the global data block.
    pub fn glob_value_pointer(&self) -> CpuAdr {
        self.glob_pointer
    }

    /// Reserve `length` bytes of global data.
    pub fn alloc_glob_block(&mut self, length: CpuWrd) -> CpuAdr {
        let adr = self.glob_pointer;
        self.glob_pointer += length.max(1) as CpuAdr;
        adr
    }

    // ── Geometry and dynamic-library tables ────────────────────────────

    /// Append a fixed-array geometry entry; identical geometry shares one
    /// entry.
    pub fn store_arr_fix_def(
        &mut self,
        dim_nr: usize,
        sizes: ArrayIndexes,
        cell_size: CpuWrd,
    ) -> AgxIndex {
        debug_assert!(dim_nr >= 1 && dim_nr <= MAX_DIMS);
        if let Some(&agx) = self.geometry_index.get(&(dim_nr, sizes, cell_size)) {
            return agx;
        }
        self.geometry.push(ArrFixDef {
            dim_nr,
            sizes,
            cell_size,
        });
        let agx = AgxIndex(self.geometry.len() - 1);
        self.geometry_index.insert((dim_nr, sizes, cell_size), agx);
        agx
    }

    pub fn geometry(&self, agx: AgxIndex) -> &ArrFixDef {
        &self.geometry[agx.0]
    }

    /// Refresh the dimension sizes recorded for a geometry entry, used
    /// when a linker symbol's geometry is only known after its first use.
    pub fn update_lnk_sym_dimension(&mut self, agx: AgxIndex, sizes: ArrayIndexes) {
        self.geometry[agx.0].sizes = sizes;
    }

    /// Intern a dynamic-library call site.
    pub fn store_dl_call(&mut self, lib: &str, fun: &str) -> usize {
        let key = (lib.to_string(), fun.to_string());
        if let Some(&id) = self.dl_call_index.get(&key) {
            return id;
        }
        let id = self.dl_calls.len();
        self.dl_calls.push(DlCall {
            lib: lib.to_string(),
            fun: fun.to_string(),
        });
        self.dl_call_index.insert(key, id);
        id
    }

    pub fn dl_calls(&self) -> &[DlCall] {
        &self.dl_calls
    }

    // ── Listing stream ─────────────────────────────────────────────────

    pub fn asm_out_line(&mut self, line: impl Into<String>) {
        self.listing.push(line.into());
    }

    pub fn asm_out_comment_line(&mut self, text: &str) {
        self.listing.push(format!("; {text}"));
    }

    pub fn asm_out_var_decl(&mut self, name: &str, typ_name: &str, address: CpuAdr) {
        self.listing
            .push(format!("; var {name}: {typ_name} @ {address}"));
    }

    pub fn asm_out_new_line(&mut self) {
        self.listing.push(String::new());
    }

    pub fn listing(&self) -> &[String] {
        &self.listing
    }
}

/// Format a ternary label: `CN` + zero-padded seed + suffix.
pub fn cn_label(seed: i64, suffix: &str) -> String {
    format!("CN{seed:05}{suffix}")
}

/// Format a flow label: `FW` + zero-padded seed + suffix.
pub fn fw_label(seed: i64, suffix: &str) -> String {
    format!("FW{seed:05}{suffix}")
}
