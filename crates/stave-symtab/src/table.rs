//! The symbol table facade.
//!
//! One [`SymbolTable`] owns every append-only entry vector (modules, types,
//! fields, dimensions, variables, functions, parameters) plus the name
//! indexes, the temporary-variable free lists, and the two label-seed
//! counters. The expression compiler reads and extends it through the
//! methods here; entries are addressed by index everywhere.

use rustc_hash::FxHashMap;

use stave_common::cpu::{CpuAdr, CpuInt, CpuLon, CpuWrd};

use crate::funcs::{CallConv, FunDef, FunIndex, FunKind, ParmDef, ParmIndex};
use crate::scope::{ScopeDef, ScopeKind};
use crate::types::{
    ArrayIndexes, DimDef, DimIndex, FieldDef, FldIndex, MasterType, ModIndex, ModuleDef, TypIndex,
    TypeDef, MAX_DIMS,
};
use crate::vars::{TempKind, VarDef, VarIndex};

/// Handles of the compiler-registered system types.
#[derive(Debug, Clone, Copy)]
pub struct SysTypes {
    pub bol: TypIndex,
    pub chr: TypIndex,
    pub shr: TypIndex,
    pub int: TypIndex,
    pub lon: TypIndex,
    pub flo: TypIndex,
    pub str: TypIndex,
}

/// The master tables of one compilation.
#[derive(Debug)]
pub struct SymbolTable {
    modules: Vec<ModuleDef>,
    types: Vec<TypeDef>,
    fields: Vec<FieldDef>,
    dims: Vec<DimDef>,
    vars: Vec<VarDef>,
    funs: Vec<FunDef>,
    parms: Vec<ParmDef>,

    types_by_name: FxHashMap<String, Vec<TypIndex>>,
    vars_by_name: FxHashMap<String, Vec<VarIndex>>,
    funs_by_name: FxHashMap<String, Vec<FunIndex>>,
    trackers: FxHashMap<String, ModIndex>,

    /// Bump pointers for storage addresses, one per scope.
    value_pointers: FxHashMap<ScopeDef, CpuAdr>,

    /// Ternary label seed.
    label_seed: CpuLon,
    /// Flow label seed.
    flow_label_seed: CpuLon,

    sys: SysTypes,
}

impl SymbolTable {
    /// Create a table with one module and the seven system types
    /// registered in global scope.
    pub fn new(module_name: impl Into<String>) -> Self {
        let mut table = Self {
            modules: Vec::new(),
            types: Vec::new(),
            fields: Vec::new(),
            dims: Vec::new(),
            vars: Vec::new(),
            funs: Vec::new(),
            parms: Vec::new(),
            types_by_name: FxHashMap::default(),
            vars_by_name: FxHashMap::default(),
            funs_by_name: FxHashMap::default(),
            trackers: FxHashMap::default(),
            value_pointers: FxHashMap::default(),
            label_seed: 0,
            flow_label_seed: 0,
            sys: SysTypes {
                bol: TypIndex(0),
                chr: TypIndex(0),
                shr: TypIndex(0),
                int: TypIndex(0),
                lon: TypIndex(0),
                flo: TypIndex(0),
                str: TypIndex(0),
            },
        };
        table.modules.push(ModuleDef {
            name: module_name.into(),
            tracker: None,
        });
        table.register_system_types();
        table
    }

    fn register_system_types(&mut self) {
        let glob = ScopeDef::global();
        self.sys = SysTypes {
            bol: self.store_system_type("bool", MasterType::Boolean, glob),
            chr: self.store_system_type("char", MasterType::Char, glob),
            shr: self.store_system_type("short", MasterType::Short, glob),
            int: self.store_system_type("int", MasterType::Integer, glob),
            lon: self.store_system_type("long", MasterType::Long, glob),
            flo: self.store_system_type("float", MasterType::Float, glob),
            str: self.store_system_type("string", MasterType::String, glob),
        };
    }

    fn store_system_type(&mut self, name: &str, master: MasterType, scope: ScopeDef) -> TypIndex {
        self.store_type(TypeDef {
            name: name.to_string(),
            master,
            scope,
            elem_typ: None,
            dim_nr: 0,
            dim_index: None,
            field_low: 0,
            field_count: 0,
            length: master.atom_len().unwrap_or(0),
            is_system_def: true,
        })
    }

    // ── Entry access ───────────────────────────────────────────────────

    pub fn sys(&self) -> SysTypes {
        self.sys
    }

    /// The system type backing one atomic master.
    pub fn atom_typ(&self, master: MasterType) -> TypIndex {
        match master {
            MasterType::Boolean => self.sys.bol,
            MasterType::Char => self.sys.chr,
            MasterType::Short => self.sys.shr,
            MasterType::Integer => self.sys.int,
            MasterType::Long => self.sys.lon,
            MasterType::Float => self.sys.flo,
            MasterType::String => self.sys.str,
            _ => panic!("atom_typ on composite master {master:?}"),
        }
    }

    /// The type backing machine words (subscript indexes, sizes).
    pub fn word_typ(&self) -> TypIndex {
        self.sys.lon
    }

    pub fn typ(&self, i: TypIndex) -> &TypeDef {
        &self.types[i.0]
    }

    pub fn typ_master(&self, i: TypIndex) -> MasterType {
        self.types[i.0].master
    }

    pub fn var(&self, i: VarIndex) -> &VarDef {
        &self.vars[i.0]
    }

    pub fn var_mut(&mut self, i: VarIndex) -> &mut VarDef {
        &mut self.vars[i.0]
    }

    pub fn fld(&self, i: FldIndex) -> &FieldDef {
        &self.fields[i.0]
    }

    pub fn dim(&self, i: DimIndex) -> &DimDef {
        &self.dims[i.0]
    }

    pub fn fun(&self, i: FunIndex) -> &FunDef {
        &self.funs[i.0]
    }

    pub fn parm(&self, i: ParmIndex) -> &ParmDef {
        &self.parms[i.0]
    }

    pub fn parm_mut(&mut self, i: ParmIndex) -> &mut ParmDef {
        &mut self.parms[i.0]
    }

    pub fn module(&self, i: ModIndex) -> &ModuleDef {
        &self.modules[i.0]
    }

    pub fn var_count(&self) -> usize {
        self.vars.len()
    }

    pub fn typ_count(&self) -> usize {
        self.types.len()
    }

    /// Parameters of a function, in declaration order.
    pub fn fun_parms(&self, i: FunIndex) -> Vec<ParmIndex> {
        self.funs[i.0].parm_range().map(ParmIndex).collect()
    }

    // ── Modules and trackers ───────────────────────────────────────────

    pub fn store_module(
        &mut self,
        name: impl Into<String>,
        tracker: Option<String>,
    ) -> ModIndex {
        let index = ModIndex(self.modules.len());
        if let Some(alias) = &tracker {
            self.trackers.insert(alias.clone(), index);
        }
        self.modules.push(ModuleDef {
            name: name.into(),
            tracker,
        });
        index
    }

    /// Resolve a module tracker alias.
    pub fn trk_search(&self, alias: &str) -> Option<ModIndex> {
        self.trackers.get(alias).copied()
    }

    // ── Types ──────────────────────────────────────────────────────────

    pub fn store_type(&mut self, def: TypeDef) -> TypIndex {
        let index = TypIndex(self.types.len());
        self.types_by_name
            .entry(def.name.clone())
            .or_default()
            .push(index);
        self.types.push(def);
        index
    }

    /// Find a type by name visible from `scope`. Innermost declaration
    /// wins when shadowed.
    pub fn typ_search(&self, name: &str, scope: &ScopeDef) -> Option<TypIndex> {
        let candidates = self.types_by_name.get(name)?;
        candidates
            .iter()
            .rev()
            .copied()
            .find(|t| self.types[t.0].scope.visible_from(scope))
    }

    pub fn store_dimension(&mut self, dim_nr: usize, sizes: ArrayIndexes) -> DimIndex {
        let index = DimIndex(self.dims.len());
        self.dims.push(DimDef { dim_nr, sizes });
        index
    }

    /// Find or create the dynamic array type `elem[dims]`.
    pub fn dyn_array_of(&mut self, elem: TypIndex, dim_nr: usize, scope: ScopeDef) -> TypIndex {
        debug_assert!(dim_nr >= 1 && dim_nr <= MAX_DIMS);
        let name = format!(
            "{}[{}]",
            self.types[elem.0].name,
            ",".repeat(dim_nr.saturating_sub(1))
        );
        if let Some(existing) = self.typ_search(&name, &scope) {
            return existing;
        }
        self.store_type(TypeDef {
            name,
            master: MasterType::DynArray,
            scope,
            elem_typ: Some(elem),
            dim_nr,
            dim_index: None,
            field_low: 0,
            field_count: 0,
            length: MasterType::DynArray.atom_len().unwrap(),
            is_system_def: false,
        })
    }

    /// Find or create the fixed array type `elem[s1,s2,...]`.
    pub fn fix_array_of(
        &mut self,
        elem: TypIndex,
        dim_nr: usize,
        sizes: ArrayIndexes,
        scope: ScopeDef,
    ) -> TypIndex {
        debug_assert!(dim_nr >= 1 && dim_nr <= MAX_DIMS);
        let dims_text: Vec<String> = sizes[..dim_nr].iter().map(|s| s.to_string()).collect();
        let name = format!("{}[{}]", self.types[elem.0].name, dims_text.join(","));
        if let Some(existing) = self.typ_search(&name, &scope) {
            return existing;
        }
        let dim_index = self.store_dimension(dim_nr, sizes);
        let cell_count: CpuWrd = sizes[..dim_nr].iter().product();
        let length = self.types[elem.0].length * cell_count;
        self.store_type(TypeDef {
            name,
            master: MasterType::FixArray,
            scope,
            elem_typ: Some(elem),
            dim_nr,
            dim_index: Some(dim_index),
            field_low: 0,
            field_count: 0,
            length,
            is_system_def: false,
        })
    }

    /// Register a class with its fields. Offsets and the instance length
    /// are computed here; static fields get a backing module variable and
    /// do not contribute to the instance layout.
    pub fn store_class(
        &mut self,
        name: impl Into<String>,
        scope: ScopeDef,
        fields: Vec<(String, TypIndex, bool, bool)>, // (name, typ, is_static, is_private)
    ) -> TypIndex {
        let name = name.into();
        let field_low = self.fields.len();
        let field_count = fields.len();
        let typ_index = TypIndex(self.types.len());
        let mut offset: CpuWrd = 0;
        for (fld_name, fld_typ, is_static, is_private) in fields {
            let static_var = if is_static {
                let module_scope = ScopeDef::module(scope.module);
                let (var, _) = self.store_variable(
                    format!("{name}.{fld_name}"),
                    fld_typ,
                    module_scope,
                    VarAttrs {
                        is_static: true,
                        ..VarAttrs::default()
                    },
                );
                Some(var)
            } else {
                None
            };
            let fld_offset = if is_static { 0 } else { offset };
            if !is_static {
                offset += self.types[fld_typ.0].length;
            }
            self.fields.push(FieldDef {
                name: fld_name,
                owner_typ: typ_index,
                typ: fld_typ,
                offset: fld_offset,
                is_static,
                is_private,
                enum_value: None,
                static_var,
            });
        }
        self.store_type(TypeDef {
            name,
            master: MasterType::Class,
            scope,
            elem_typ: None,
            dim_nr: 0,
            dim_index: None,
            field_low,
            field_count,
            length: offset,
            is_system_def: false,
        })
    }

    /// Register an enum with its members.
    pub fn store_enum(
        &mut self,
        name: impl Into<String>,
        scope: ScopeDef,
        members: Vec<(String, CpuInt)>,
    ) -> TypIndex {
        let field_low = self.fields.len();
        let field_count = members.len();
        let typ_index = TypIndex(self.types.len());
        for (member_name, value) in members {
            self.fields.push(FieldDef {
                name: member_name,
                owner_typ: typ_index,
                typ: typ_index,
                offset: 0,
                is_static: false,
                is_private: false,
                enum_value: Some(value),
                static_var: None,
            });
        }
        self.store_type(TypeDef {
            name: name.into(),
            master: MasterType::Enum,
            scope,
            elem_typ: None,
            dim_nr: 0,
            dim_index: None,
            field_low,
            field_count,
            length: MasterType::Enum.atom_len().unwrap(),
            is_system_def: false,
        })
    }

    /// Find a field of a class or enum by name.
    pub fn fld_search(&self, typ: TypIndex, name: &str) -> Option<FldIndex> {
        self.types[typ.0]
            .field_range()
            .find(|&f| self.fields[f].name == name)
            .map(FldIndex)
    }

    // ── Variables ──────────────────────────────────────────────────────

    /// Store a variable, or unhide and reuse a hidden entry of the same
    /// name and type in the same scope. Returns the index and whether an
    /// entry was reused.
    pub fn store_variable(
        &mut self,
        name: impl Into<String>,
        typ: TypIndex,
        scope: ScopeDef,
        attrs: VarAttrs,
    ) -> (VarIndex, bool) {
        let name = name.into();
        if let Some(existing) = self.hidden_variable(&name, typ, &scope) {
            let var = &mut self.vars[existing.0];
            var.is_hidden = false;
            var.is_initialized = false;
            var.is_source_used = false;
            var.flow_label = attrs.flow_label;
            var.is_const = attrs.is_const;
            return (existing, true);
        }
        let length = self.types[typ.0].length;
        let address = self.alloc_address(scope, length);
        let index = VarIndex(self.vars.len());
        self.vars_by_name
            .entry(name.clone())
            .or_default()
            .push(index);
        self.vars.push(VarDef {
            name,
            typ,
            scope,
            address,
            is_temp: attrs.is_temp,
            temp_kind: attrs.temp_kind,
            lock_count: 0,
            is_reference: attrs.is_reference,
            is_const: attrs.is_const,
            is_parameter: attrs.is_parameter,
            is_initialized: attrs.is_initialized,
            is_source_used: false,
            is_computed: false,
            is_static: attrs.is_static,
            is_hidden: false,
            flow_label: attrs.flow_label,
        });
        (index, false)
    }

    fn hidden_variable(&self, name: &str, typ: TypIndex, scope: &ScopeDef) -> Option<VarIndex> {
        let candidates = self.vars_by_name.get(name)?;
        candidates.iter().rev().copied().find(|&v| {
            let var = &self.vars[v.0];
            var.is_hidden && var.typ == typ && var.scope == *scope && !var.is_temp
        })
    }

    /// Find a variable by name visible from `scope`, skipping hidden
    /// entries. Innermost declaration wins.
    pub fn var_search(&self, name: &str, scope: &ScopeDef) -> Option<VarIndex> {
        let candidates = self.vars_by_name.get(name)?;
        candidates.iter().rev().copied().find(|&v| {
            let var = &self.vars[v.0];
            !var.is_hidden && var.scope.visible_from(scope)
        })
    }

    /// Bump-allocate storage inside a scope's value space.
    pub fn alloc_address(&mut self, scope: ScopeDef, length: CpuWrd) -> CpuAdr {
        // Module and global variables share the global value space.
        let key = match scope.kind {
            ScopeKind::Local => scope,
            _ => ScopeDef::global(),
        };
        let ptr = self.value_pointers.entry(key).or_insert(0);
        let address = *ptr;
        *ptr += length.max(1) as CpuAdr;
        address
    }

    /// Mark a variable's value as reaching an observable operation.
    ///
    /// A variable counts as source-used when it is a non-const reference
    /// parameter, when it belongs to a different scope than the consuming
    /// one, or when the caller forces it (function-result propagation).
    pub fn set_source_used(&mut self, var: VarIndex, scope: &ScopeDef, forced: bool) {
        let v = &mut self.vars[var.0];
        if forced
            || (v.is_parameter && v.is_reference && !v.is_const)
            || v.scope != *scope
        {
            v.is_source_used = true;
        }
    }

    /// Hide local variables of `scope` tagged with `flow_label` (or every
    /// unhidden non-parameter local when `flow_label` is `None`).
    pub fn hide_local_variables(&mut self, scope: &ScopeDef, flow_label: Option<CpuLon>) {
        for var in &mut self.vars {
            if var.scope != *scope || var.is_hidden || var.is_parameter {
                continue;
            }
            let matches = match flow_label {
                Some(label) => var.flow_label == Some(label),
                None => true,
            };
            if matches {
                var.is_hidden = true;
            }
        }
    }

    /// Drop hidden non-temporary locals of `scope` from the name index.
    /// Entries stay in the arena; only name lookup forgets them.
    pub fn clean_hidden(&mut self, scope: &ScopeDef) {
        let vars = &self.vars;
        for list in self.vars_by_name.values_mut() {
            list.retain(|&v| {
                let var = &vars[v.0];
                !(var.is_hidden && !var.is_temp && var.scope == *scope)
            });
        }
    }

    // ── Temporaries ────────────────────────────────────────────────────

    /// Allocate a temporary of `typ` and `kind` in `scope`, reusing an
    /// unlocked temporary of the same type and kind when one exists. The
    /// returned temporary is locked.
    pub fn temp_var_new(
        &mut self,
        scope: ScopeDef,
        typ: TypIndex,
        kind: TempKind,
    ) -> (VarIndex, bool) {
        let free = self.vars.iter().position(|v| {
            v.is_temp
                && !v.is_locked()
                && !v.is_hidden
                && v.typ == typ
                && v.temp_kind == kind
                && v.scope == scope
        });
        if let Some(pos) = free {
            let index = VarIndex(pos);
            self.vars[pos].lock_count = 1;
            return (index, true);
        }
        let name = format!("$t{:03}", self.vars.len());
        let (index, _) = self.store_variable(
            name,
            typ,
            scope,
            VarAttrs {
                is_temp: true,
                temp_kind: kind,
                ..VarAttrs::default()
            },
        );
        self.vars[index.0].lock_count = 1;
        (index, false)
    }

    /// Add one live reference to a temporary. No-op for non-temporaries.
    pub fn temp_lock(&mut self, var: VarIndex) {
        let v = &mut self.vars[var.0];
        if v.is_temp {
            v.lock_count += 1;
        }
    }

    /// Drop one live reference from a temporary. No-op for
    /// non-temporaries; saturates at zero.
    pub fn temp_unlock(&mut self, var: VarIndex) {
        let v = &mut self.vars[var.0];
        if v.is_temp {
            v.lock_count = v.lock_count.saturating_sub(1);
        }
    }

    // ── Functions ──────────────────────────────────────────────────────

    /// Register a callable and its parameters.
    pub fn store_function(
        &mut self,
        mut def: FunDef,
        parms: Vec<(String, TypIndex, bool, bool)>, // (name, typ, is_reference, is_const)
    ) -> FunIndex {
        let index = FunIndex(self.funs.len());
        def.parm_low = self.parms.len();
        def.parm_count = parms.len();
        for (name, typ, is_reference, is_const) in parms {
            self.parms.push(ParmDef {
                name,
                typ,
                fun: index,
                is_reference,
                is_const,
                var: None,
            });
        }
        self.funs_by_name
            .entry(def.name.clone())
            .or_default()
            .push(index);
        self.funs.push(def);
        index
    }

    /// Canonical parameter-type string used for overload diagnostics.
    pub fn parms_text(&self, args: &[TypIndex]) -> String {
        args.iter()
            .map(|t| self.types[t.0].name.clone())
            .collect::<Vec<_>>()
            .join(",")
    }

    /// True when a value of `from` passes where `to` is expected without
    /// an explicit cast.
    pub fn promotion_automatic(&self, from: TypIndex, to: TypIndex) -> bool {
        if from == to {
            return true;
        }
        let fm = self.typ_master(from);
        let tm = self.typ_master(to);
        if fm == MasterType::Char && tm == MasterType::String {
            return true;
        }
        if fm.is_numeric() && tm.is_numeric() {
            return fm.promotion_rank() <= tm.promotion_rank();
        }
        if fm == MasterType::DynArray && tm == MasterType::DynArray {
            return self.equivalent_arrays(from, to);
        }
        false
    }

    fn overload_matches(&self, fun: FunIndex, args: &[TypIndex], exact: bool) -> bool {
        let def = &self.funs[fun.0];
        if def.parm_count != args.len() {
            return false;
        }
        def.parm_range().zip(args.iter()).all(|(p, &arg)| {
            let parm = &self.parms[p];
            if exact {
                parm.typ == arg
            } else {
                self.promotion_automatic(arg, parm.typ)
            }
        })
    }

    fn overload_search<F: Fn(&FunDef) -> bool>(
        &self,
        name: &str,
        args: &[TypIndex],
        filter: F,
    ) -> Option<FunIndex> {
        let candidates = self.funs_by_name.get(name)?;
        // Exact signature wins over a promotable one.
        for &exact in &[true, false] {
            let found = candidates
                .iter()
                .copied()
                .find(|&f| filter(&self.funs[f.0]) && self.overload_matches(f, args, exact));
            if found.is_some() {
                return found;
            }
        }
        None
    }

    /// Free-function overload search within a module.
    pub fn fun_search(&self, name: &str, module: ModIndex, args: &[TypIndex]) -> Option<FunIndex> {
        self.overload_search(name, args, |f| {
            f.kind == FunKind::Function && f.module == module
        })
    }

    /// Member-function overload search on a class.
    pub fn fmb_search(&self, class: TypIndex, name: &str, args: &[TypIndex]) -> Option<FunIndex> {
        self.overload_search(name, args, |f| {
            f.kind == FunKind::Member && f.member_of == Some(class)
        })
    }

    /// Master-method overload search on a master type.
    pub fn mmt_search(&self, master: MasterType, name: &str, args: &[TypIndex]) -> Option<FunIndex> {
        self.overload_search(name, args, |f| {
            f.kind == FunKind::MasterMethod && f.master == Some(master)
        })
    }

    /// Master-method search by name and argument count only; used by the
    /// element-generic methods whose parameter types bind at the call site.
    pub fn mmt_search_loose(
        &self,
        master: MasterType,
        name: &str,
        parm_count: usize,
    ) -> Option<FunIndex> {
        let candidates = self.funs_by_name.get(name)?;
        candidates.iter().copied().find(|&f| {
            let def = &self.funs[f.0];
            def.kind == FunKind::MasterMethod
                && def.master == Some(master)
                && def.parm_count == parm_count
        })
    }

    /// User operator-overload search by operator text and operand types.
    pub fn opr_search(&self, opr: &str, left: TypIndex, right: TypIndex) -> Option<FunIndex> {
        self.overload_search(opr, &[left, right], |f| f.kind == FunKind::Operator)
    }

    /// All registered overloads of a name, regardless of visibility; used
    /// for better not-found diagnostics.
    pub fn fun_candidates(&self, name: &str) -> &[FunIndex] {
        self.funs_by_name
            .get(name)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    // ── Predicates ─────────────────────────────────────────────────────

    pub fn is_master_atomic(&self, typ: TypIndex) -> bool {
        self.typ_master(typ).is_atomic()
    }

    /// The empty class: zero fields, zero length. Used as a sentinel; its
    /// arguments push nothing.
    pub fn is_empty_class(&self, typ: TypIndex) -> bool {
        let def = &self.types[typ.0];
        def.master == MasterType::Class && def.field_count == 0
    }

    /// A class whose fields are all static has no instance storage.
    pub fn is_static_class(&self, typ: TypIndex) -> bool {
        let def = &self.types[typ.0];
        def.master == MasterType::Class
            && def.field_count > 0
            && def.field_range().all(|f| self.fields[f].is_static)
    }

    /// True when a value of `typ` owns or transitively contains a heap
    /// block (a string buffer or a dynamic-array header).
    pub fn has_inner_blocks(&self, typ: TypIndex) -> bool {
        let def = &self.types[typ.0];
        match def.master {
            MasterType::String | MasterType::DynArray => true,
            MasterType::FixArray => def
                .elem_typ
                .map(|e| self.has_inner_blocks(e))
                .unwrap_or(false),
            MasterType::Class => def
                .field_range()
                .any(|f| !self.fields[f].is_static && self.has_inner_blocks(self.fields[f].typ)),
            _ => false,
        }
    }

    /// Arrays are equivalent when master, element type, dimension count,
    /// and (for fixed arrays) geometry all agree.
    pub fn equivalent_arrays(&self, a: TypIndex, b: TypIndex) -> bool {
        if a == b {
            return true;
        }
        let (da, db) = (&self.types[a.0], &self.types[b.0]);
        if da.master != db.master || da.dim_nr != db.dim_nr {
            return false;
        }
        let elems_equal = match (da.elem_typ, db.elem_typ) {
            (Some(ea), Some(eb)) => {
                ea == eb
                    || (self.types[ea.0].master == self.types[eb.0].master
                        && self.types[ea.0].master.is_atomic())
            }
            _ => false,
        };
        if !elems_equal {
            return false;
        }
        match da.master {
            MasterType::DynArray => true,
            MasterType::FixArray => match (da.dim_index, db.dim_index) {
                (Some(ia), Some(ib)) => {
                    let (ga, gb) = (&self.dims[ia.0], &self.dims[ib.0]);
                    ga.dim_nr == gb.dim_nr && ga.sizes[..ga.dim_nr] == gb.sizes[..gb.dim_nr]
                }
                _ => false,
            },
            _ => false,
        }
    }

    /// Private members are visible only inside their declaring module.
    pub fn is_member_visible(&self, scope: &ScopeDef, fld: FldIndex) -> bool {
        let field = &self.fields[fld.0];
        !field.is_private || self.types[field.owner_typ.0].scope.module == scope.module
    }

    pub fn are_all_fields_visible(&self, scope: &ScopeDef, typ: TypIndex) -> bool {
        self.types[typ.0]
            .field_range()
            .all(|f| self.is_member_visible(scope, FldIndex(f)))
    }

    /// Check whether a new variable name collides with a member name
    /// reachable by unqualified access from `scope`. Returns the
    /// qualified member name on collision.
    pub fn dot_collision_check(&self, scope: &ScopeDef, name: &str) -> Option<String> {
        for (t, typ) in self.types.iter().enumerate() {
            if !matches!(typ.master, MasterType::Class | MasterType::Enum) {
                continue;
            }
            if !typ.scope.visible_from(scope) {
                continue;
            }
            for f in self.types[t].field_range() {
                if self.fields[f].name == name {
                    return Some(format!("{}.{}", typ.name, self.fields[f].name));
                }
            }
        }
        None
    }

    // ── Label generators ───────────────────────────────────────────────

    /// Current ternary label seed.
    pub fn label_generator(&self) -> CpuLon {
        self.label_seed
    }

    pub fn increase_label_generator(&mut self) {
        self.label_seed += 1;
    }

    /// Current flow label seed.
    pub fn flow_label_generator(&self) -> CpuLon {
        self.flow_label_seed
    }

    pub fn increase_flow_label_generator(&mut self) {
        self.flow_label_seed += 1;
    }
}

/// Optional attributes for [`SymbolTable::store_variable`].
#[derive(Debug, Clone, Copy, Default)]
pub struct VarAttrs {
    pub is_temp: bool,
    pub temp_kind: TempKind,
    pub is_reference: bool,
    pub is_const: bool,
    pub is_parameter: bool,
    pub is_initialized: bool,
    pub is_static: bool,
    pub flow_label: Option<CpuLon>,
}
