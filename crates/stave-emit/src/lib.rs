//! Binary emitter for the Stave compiler.
//!
//! - [`inst`]: the VM opcode set
//! - [`arg`]: instruction arguments and their listing forms
//! - [`writer`]: the append-only code stream plus the side tables (jump
//!   destinations, literal strings, array geometry, dynamic-library calls)
//!   and the assembler listing

pub mod arg;
pub mod inst;
pub mod writer;

pub use arg::{AgxIndex, AsmArg, MetaCase};
pub use inst::Opcode;
pub use writer::{cn_label, fw_label, ArrFixDef, BinaryWriter, DlCall, Inst, JumpDest};
