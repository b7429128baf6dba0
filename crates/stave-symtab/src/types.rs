//! Type entries: master types, type definitions, fields, and array geometry.
//!
//! All entries live in append-only vectors owned by [`crate::SymbolTable`]
//! and cross-reference each other by index, never by pointer.

use serde::Serialize;

use stave_common::cpu::{CpuInt, CpuWrd};

use crate::scope::ScopeDef;

/// Maximum number of dimensions a fixed or dynamic array can declare.
pub const MAX_DIMS: usize = 4;

/// Dimension sizes of an array. Unused trailing slots are zero.
pub type ArrayIndexes = [CpuWrd; MAX_DIMS];

/// Index of a type entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct TypIndex(pub usize);

/// Index of a field entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct FldIndex(pub usize);

/// Index of a dimension-geometry entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct DimIndex(pub usize);

/// Index of a module entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ModIndex(pub usize);

/// The coarse kind tag of every Stave type.
///
/// The first seven are atomic; `Enum`, `Class`, `FixArray` and `DynArray`
/// are composite. `String` and `DynArray` own heap blocks at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[repr(u8)]
pub enum MasterType {
    Boolean = 0,
    Char,
    Short,
    Integer,
    Long,
    Float,
    String,
    Enum,
    Class,
    FixArray,
    DynArray,
}

/// The master type backing machine words (array indexes, sizes, offsets).
pub const WORD_MASTER: MasterType = MasterType::Long;

impl MasterType {
    /// Bit for this master in a case-rule operand mask.
    pub fn mask(self) -> u16 {
        1u16 << (self as u8)
    }

    /// Human-readable name, used in diagnostics.
    pub fn text(self) -> &'static str {
        match self {
            Self::Boolean => "Boolean",
            Self::Char => "Char",
            Self::Short => "Short",
            Self::Integer => "Integer",
            Self::Long => "Long",
            Self::Float => "Float",
            Self::String => "String",
            Self::Enum => "Enum",
            Self::Class => "Class",
            Self::FixArray => "FixArray",
            Self::DynArray => "DynArray",
        }
    }

    /// Atomic masters fit in a single VM cell and have no internal
    /// structure the compiler needs to walk.
    pub fn is_atomic(self) -> bool {
        matches!(
            self,
            Self::Boolean
                | Self::Char
                | Self::Short
                | Self::Integer
                | Self::Long
                | Self::Float
                | Self::String
        )
    }

    /// Masters that order under the numeric promotion lattice.
    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            Self::Char | Self::Short | Self::Integer | Self::Long | Self::Float
        )
    }

    /// Rank in the promotion lattice; higher rank wins `ToMaximum`.
    /// Non-numeric masters never participate in `ToMaximum`.
    pub fn promotion_rank(self) -> u8 {
        match self {
            Self::Boolean => 0,
            Self::Char => 1,
            Self::Short => 2,
            Self::Integer => 3,
            Self::Long => 4,
            Self::Float => 5,
            Self::String => 6,
            Self::Enum | Self::Class | Self::FixArray | Self::DynArray => 0,
        }
    }

    /// Byte length of one cell of this master. Composite lengths depend on
    /// the concrete type and are computed by the symbol table.
    pub fn atom_len(self) -> Option<CpuWrd> {
        match self {
            Self::Boolean | Self::Char => Some(1),
            Self::Short => Some(2),
            Self::Integer | Self::Enum => Some(4),
            Self::Long | Self::Float => Some(8),
            // Strings and dynamic arrays are 8-byte heap handles.
            Self::String | Self::DynArray => Some(8),
            Self::Class | Self::FixArray => None,
        }
    }
}

/// A declared type.
#[derive(Debug, Clone, Serialize)]
pub struct TypeDef {
    /// Declared name (`int`, `point`, `int[3,4]`, ...).
    pub name: String,
    /// Coarse kind.
    pub master: MasterType,
    /// Declaring scope.
    pub scope: ScopeDef,
    /// Element type, for arrays.
    pub elem_typ: Option<TypIndex>,
    /// Dimension count, for arrays.
    pub dim_nr: usize,
    /// Geometry entry, for fixed arrays only.
    pub dim_index: Option<DimIndex>,
    /// Field range start and count, for classes and enums.
    pub field_low: usize,
    pub field_count: usize,
    /// Byte length of one value of this type.
    pub length: CpuWrd,
    /// True for the compiler-registered system types.
    pub is_system_def: bool,
}

impl TypeDef {
    /// Range of field indexes for classes and enums.
    pub fn field_range(&self) -> std::ops::Range<usize> {
        self.field_low..self.field_low + self.field_count
    }
}

/// A field of a class, or a member of an enum.
#[derive(Debug, Clone, Serialize)]
pub struct FieldDef {
    pub name: String,
    /// The class or enum that declares this field.
    pub owner_typ: TypIndex,
    /// Field type. Enum members use the owner type itself.
    pub typ: TypIndex,
    /// Byte offset inside the class instance. Zero for statics and enums.
    pub offset: CpuWrd,
    /// Static fields live at module level, not inside instances.
    pub is_static: bool,
    /// Private fields are visible only inside the declaring module.
    pub is_private: bool,
    /// Member value, for enum members.
    pub enum_value: Option<CpuInt>,
    /// Backing module-level variable, for static fields.
    pub static_var: Option<crate::vars::VarIndex>,
}

/// Fixed-array geometry: dimension count and sizes.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct DimDef {
    pub dim_nr: usize,
    pub sizes: ArrayIndexes,
}

impl DimDef {
    /// Total element count of the geometry.
    pub fn cell_count(&self) -> CpuWrd {
        self.sizes[..self.dim_nr].iter().product()
    }
}

/// A module known to the compiler.
#[derive(Debug, Clone, Serialize)]
pub struct ModuleDef {
    pub name: String,
    /// Tracker alias used to qualify names (`alias.ident`), if any.
    pub tracker: Option<String>,
}
