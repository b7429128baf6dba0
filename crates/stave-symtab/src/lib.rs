//! Symbol tables for the Stave compiler.
//!
//! Types, variables, fields, functions, parameters, dimensions, and modules
//! live in append-only vectors indexed by small newtypes; cross-references
//! are indices, never pointers. The [`SymbolTable`] facade owns the entry
//! vectors, the name indexes, the temporary-variable free lists, and the
//! ternary/flow label-seed counters.

pub mod funcs;
pub mod scope;
pub mod table;
pub mod types;
pub mod vars;

pub use funcs::{CallConv, FunDef, FunIndex, FunKind, ParmDef, ParmIndex};
pub use scope::{ScopeDef, ScopeKind};
pub use table::{SymbolTable, SysTypes, VarAttrs};
pub use types::{
    ArrayIndexes, DimDef, DimIndex, FieldDef, FldIndex, MasterType, ModIndex, ModuleDef,
    TypIndex, TypeDef, MAX_DIMS, WORD_MASTER,
};
pub use vars::{TempKind, VarDef, VarIndex};
