//! Module definitions consumed by the engine
//!
//! A [`ModuleDefinition`] is the output of the decoding/validation front end:
//! every guest function has already been translated into the structured
//! operation list described in [`crate::ir`]. Host modules carry a
//! [`HostFunction`] per function instead.

use crate::ir::Operation;
use crate::runtime::host::HostFunction;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Identity of a module definition, used as the code cache key
///
/// Embedders usually derive this from a digest of the module binary.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(pub [u8; 32]);

impl ModuleId {
    pub fn new(bytes: [u8; 32]) -> Self {
        ModuleId(bytes)
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "ModuleId({})", &hex::encode(self.0)[..12])
    }
}

#[derive(PartialEq, Eq, Hash, Clone, Copy, Debug)]
pub enum ValueType {
    I32,
    I64,
    F32,
    F64,
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            ValueType::I32 => "i32",
            ValueType::I64 => "i64",
            ValueType::F32 => "f32",
            ValueType::F64 => "f64",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct FunctionType {
    pub params: Vec<ValueType>,
    pub results: Vec<ValueType>,
}

impl FunctionType {
    pub fn new(params: Vec<ValueType>, results: Vec<ValueType>) -> Self {
        FunctionType { params, results }
    }
}

impl fmt::Display for FunctionType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let join = |types: &[ValueType]| types.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ");
        write!(
            f,
            "({}) -> {}",
            join(&self.params),
            if self.results.is_empty() {
                "nil".to_string()
            } else if self.results.len() > 1 {
                format!("({})", join(&self.results))
            } else {
                join(&self.results)
            }
        )
    }
}

/// Limits of a linear memory, in pages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryDefinition {
    pub min: u32,
    /// Capacity to reserve up front; ignored for shared memories
    pub cap: u32,
    pub max: u32,
    pub shared: bool,
}

impl MemoryDefinition {
    pub fn new(min: u32, max: u32) -> Self {
        MemoryDefinition { min, cap: min, max, shared: false }
    }

    pub fn shared(min: u32, max: u32) -> Self {
        MemoryDefinition { min, cap: max, max, shared: true }
    }

    pub fn with_cap(mut self, cap: u32) -> Self {
        self.cap = cap;
        self
    }
}

/// A module-level global and its initial bit pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlobalDefinition {
    pub ty: ValueType,
    pub mutable: bool,
    pub init: u64,
}

impl GlobalDefinition {
    pub fn new(ty: ValueType, mutable: bool, init: u64) -> Self {
        GlobalDefinition { ty, mutable, init }
    }
}

/// The body of one function in a module definition
#[derive(Clone)]
pub enum FunctionBody {
    /// Structured operations produced by the front end
    Operations(Vec<Operation>),
    /// Implemented by the embedder
    Host(Arc<dyn HostFunction>),
}

impl fmt::Debug for FunctionBody {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FunctionBody::Operations(ops) => write!(f, "Operations({} ops)", ops.len()),
            FunctionBody::Host(_) => f.write_str("Host"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FunctionDefinition {
    /// Index into [`ModuleDefinition::types`]
    pub type_index: u32,
    /// Name used in backtraces and listener callbacks
    pub debug_name: String,
    pub body: FunctionBody,
}

impl FunctionDefinition {
    pub fn wasm(debug_name: impl Into<String>, type_index: u32, operations: Vec<Operation>) -> Self {
        FunctionDefinition {
            type_index,
            debug_name: debug_name.into(),
            body: FunctionBody::Operations(operations),
        }
    }

    pub fn host(debug_name: impl Into<String>, type_index: u32, func: Arc<dyn HostFunction>) -> Self {
        FunctionDefinition {
            type_index,
            debug_name: debug_name.into(),
            body: FunctionBody::Host(func),
        }
    }

    pub fn is_host(&self) -> bool {
        matches!(self.body, FunctionBody::Host(_))
    }
}

/// A decoded and validated module, ready for compilation
#[derive(Debug, Clone)]
pub struct ModuleDefinition {
    pub id: ModuleId,
    pub types: Vec<FunctionType>,
    /// Functions defined by this module, excluding imports
    pub functions: Vec<FunctionDefinition>,
    /// Number of imported functions; they occupy the first indices of the function index space
    pub imported_functions: u32,
    pub memory: Option<MemoryDefinition>,
    pub globals: Vec<GlobalDefinition>,
    /// Size of the function table, in elements
    pub table_size: Option<u32>,
    /// Table slot to function index, applied at instantiation
    pub elements: BTreeMap<u32, u32>,
}

impl ModuleDefinition {
    pub fn new(id: ModuleId) -> Self {
        ModuleDefinition {
            id,
            types: Vec::new(),
            functions: Vec::new(),
            imported_functions: 0,
            memory: None,
            globals: Vec::new(),
            table_size: None,
            elements: BTreeMap::new(),
        }
    }

    /// Register a function type, returning its index; identical types share an index
    pub fn add_type(&mut self, ty: FunctionType) -> u32 {
        if let Some(idx) = self.types.iter().position(|t| *t == ty) {
            return idx as u32;
        }
        self.types.push(ty);
        (self.types.len() - 1) as u32
    }

    pub fn add_function(&mut self, function: FunctionDefinition) -> u32 {
        self.functions.push(function);
        (self.functions.len() - 1) as u32
    }

    pub fn with_memory(mut self, memory: MemoryDefinition) -> Self {
        self.memory = Some(memory);
        self
    }

    pub fn with_imported_functions(mut self, count: u32) -> Self {
        self.imported_functions = count;
        self
    }

    pub fn with_global(mut self, global: GlobalDefinition) -> Self {
        self.globals.push(global);
        self
    }

    pub fn with_table(mut self, size: u32, elements: impl IntoIterator<Item = (u32, u32)>) -> Self {
        self.table_size = Some(size);
        self.elements = elements.into_iter().collect();
        self
    }

    /// True when every function is implemented by the embedder
    pub fn is_host_module(&self) -> bool {
        !self.functions.is_empty() && self.functions.iter().all(FunctionDefinition::is_host)
    }

    pub fn function_type(&self, function: &FunctionDefinition) -> Option<&FunctionType> {
        self.types.get(function.type_index as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn function_type_display() {
        let ty = FunctionType::new(vec![ValueType::I32, ValueType::I64], vec![ValueType::F32]);
        assert_eq!(ty.to_string(), "(i32, i64) -> f32");

        let ty = FunctionType::new(vec![], vec![]);
        assert_eq!(ty.to_string(), "() -> nil");

        let ty = FunctionType::new(vec![ValueType::F64], vec![ValueType::I32, ValueType::I32]);
        assert_eq!(ty.to_string(), "(f64) -> (i32, i32)");
    }

    #[test]
    fn add_type_deduplicates() {
        let mut module = ModuleDefinition::new(ModuleId::new([0; 32]));
        let a = module.add_type(FunctionType::new(vec![ValueType::I32], vec![]));
        let b = module.add_type(FunctionType::new(vec![ValueType::I64], vec![]));
        let c = module.add_type(FunctionType::new(vec![ValueType::I32], vec![]));
        assert_eq!((a, b, c), (0, 1, 0));
    }

    #[test]
    fn module_id_display_is_hex() {
        let mut bytes = [0u8; 32];
        bytes[0] = 0xab;
        bytes[31] = 0x01;
        let id = ModuleId::new(bytes);
        let s = id.to_string();
        assert_eq!(s.len(), 64);
        assert!(s.starts_with("ab00"));
        assert!(s.ends_with("01"));
    }

    #[test]
    fn host_module_detection() {
        let mut module = ModuleDefinition::new(ModuleId::new([1; 32]));
        assert!(!module.is_host_module());
        module.add_function(FunctionDefinition::wasm("f", 0, vec![]));
        assert!(!module.is_host_module());
    }
}
