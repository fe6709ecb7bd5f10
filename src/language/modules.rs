use crate::language::types::{Type, VariantType};
use std::collections::HashMap;

/// One symbol a module makes available to importers. Function exports carry a
/// full signature; type exports carry whatever shape information the exporting
/// file's resolver produced.
#[derive(Clone, Debug)]
pub enum ExportedSymbol {
    Function {
        name: String,
        params: Vec<Type>,
        ret: Type,
    },
    Struct {
        name: String,
    },
    Enum {
        name: String,
        variants: Vec<VariantType>,
    },
}

impl ExportedSymbol {
    pub fn name(&self) -> &str {
        match self {
            ExportedSymbol::Function { name, .. }
            | ExportedSymbol::Struct { name }
            | ExportedSymbol::Enum { name, .. } => name,
        }
    }
}

/// Module path → exported symbols, computed by the module-resolution
/// collaborator before any file's resolver runs. Every pipeline stage only
/// reads it, so a batch of files can share one table without locking.
#[derive(Clone, Debug, Default)]
pub struct ModuleTable {
    exports: HashMap<String, Vec<ExportedSymbol>>,
}

impl ModuleTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_module(&mut self, path: impl Into<String>, symbols: Vec<ExportedSymbol>) {
        self.exports.insert(path.into(), symbols);
    }

    pub fn lookup(&self, path: &str) -> Option<&[ExportedSymbol]> {
        self.exports.get(path).map(Vec::as_slice)
    }

    pub fn lookup_symbol(&self, path: &str, name: &str) -> Option<&ExportedSymbol> {
        self.lookup(path)?.iter().find(|s| s.name() == name)
    }
}
