//! Instantiated modules and the objects they own

use super::{MemoryInstance, ModuleEngine, RuntimeError, TableInstance};
use crate::module::{FunctionType, GlobalDefinition, ValueType};
use crate::runtime::host::HostFunction;
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

/// Process-unique identity of a function signature
///
/// Two functions have the same id iff their types are structurally equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FunctionTypeId(pub u32);

/// Interns function types so indirect calls compare an integer
#[derive(Debug, Default)]
pub struct TypeRegistry {
    ids: Mutex<HashMap<FunctionType, FunctionTypeId>>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&self, ty: &FunctionType) -> FunctionTypeId {
        let mut ids = self.ids.lock();
        if let Some(id) = ids.get(ty) {
            return *id;
        }
        let id = FunctionTypeId(ids.len() as u32);
        ids.insert(ty.clone(), id);
        id
    }
}

/// A global variable cell
#[derive(Debug)]
pub struct GlobalInstance {
    pub ty: ValueType,
    pub mutable: bool,
    value: AtomicU64,
}

impl GlobalInstance {
    pub fn new(definition: &GlobalDefinition) -> Self {
        GlobalInstance {
            ty: definition.ty,
            mutable: definition.mutable,
            value: AtomicU64::new(definition.init),
        }
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Acquire)
    }

    pub fn set(&self, value: u64) {
        self.value.store(value, Ordering::Release);
    }
}

/// One function of one module instance
pub struct FunctionInstance {
    pub debug_name: String,
    pub ty: FunctionType,
    pub type_id: FunctionTypeId,
    /// Position in the defining module's function index space
    pub index: u32,
    pub(crate) host: Option<Arc<dyn HostFunction>>,
    pub(crate) module: Weak<ModuleInstance>,
}

impl FunctionInstance {
    pub fn is_host(&self) -> bool {
        self.host.is_some()
    }

    /// The defining module, while it is alive
    pub fn module(&self) -> Option<Arc<ModuleInstance>> {
        self.module.upgrade()
    }
}

impl fmt::Debug for FunctionInstance {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("FunctionInstance")
            .field("debug_name", &self.debug_name)
            .field("ty", &self.ty)
            .field("index", &self.index)
            .field("host", &self.is_host())
            .finish()
    }
}

const CLOSED: u64 = 1;

/// Runtime state of one instantiation of a module definition
pub struct ModuleInstance {
    name: String,
    memory: Option<Arc<MemoryInstance>>,
    globals: Vec<GlobalInstance>,
    table: Option<Arc<TableInstance>>,
    /// Interned ids of the definition's types, by type index
    type_ids: Vec<FunctionTypeId>,
    /// Imported functions first, then the module's own
    functions: Vec<Arc<FunctionInstance>>,
    imported_functions: usize,
    engine: OnceCell<Arc<ModuleEngine>>,
    /// Exit code in the high 32 bits, closed flag in bit 0
    closed: AtomicU64,
}

/// Everything needed to construct a [`ModuleInstance`] except its own functions
pub(crate) struct InstanceParts {
    pub name: String,
    pub memory: Option<Arc<MemoryInstance>>,
    pub globals: Vec<GlobalInstance>,
    pub table: Option<Arc<TableInstance>>,
    pub type_ids: Vec<FunctionTypeId>,
    pub imports: Vec<Arc<FunctionInstance>>,
}

/// A function owned by the instance under construction
pub(crate) struct OwnFunction {
    pub debug_name: String,
    pub ty: FunctionType,
    pub type_id: FunctionTypeId,
    pub host: Option<Arc<dyn HostFunction>>,
}

impl ModuleInstance {
    pub(crate) fn new(parts: InstanceParts, own: Vec<OwnFunction>) -> Arc<Self> {
        Arc::new_cyclic(|module| {
            let imported_functions = parts.imports.len();
            let mut functions = parts.imports;
            functions.extend(own.into_iter().enumerate().map(|(i, f)| {
                Arc::new(FunctionInstance {
                    debug_name: f.debug_name,
                    ty: f.ty,
                    type_id: f.type_id,
                    index: (imported_functions + i) as u32,
                    host: f.host,
                    module: Weak::clone(module),
                })
            }));
            ModuleInstance {
                name: parts.name,
                memory: parts.memory,
                globals: parts.globals,
                table: parts.table,
                type_ids: parts.type_ids,
                functions,
                imported_functions,
                engine: OnceCell::new(),
                closed: AtomicU64::new(0),
            }
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn memory(&self) -> Option<&Arc<MemoryInstance>> {
        self.memory.as_ref()
    }

    pub fn global(&self, index: u32) -> Option<&GlobalInstance> {
        self.globals.get(index as usize)
    }

    pub fn table(&self) -> Option<&Arc<TableInstance>> {
        self.table.as_ref()
    }

    pub fn type_id(&self, type_index: u32) -> Option<FunctionTypeId> {
        self.type_ids.get(type_index as usize).copied()
    }

    /// Function by index in this module's function index space
    pub fn function(&self, index: u32) -> Option<&Arc<FunctionInstance>> {
        self.functions.get(index as usize)
    }

    /// Function by name; the module's own functions shadow imports of the same name
    pub fn function_by_name(&self, name: &str) -> Option<&Arc<FunctionInstance>> {
        let named = |f: &&Arc<FunctionInstance>| f.debug_name == name;
        self.own_functions()
            .iter()
            .find(named)
            .or_else(|| self.imported_functions().iter().find(named))
    }

    pub fn imported_functions(&self) -> &[Arc<FunctionInstance>] {
        &self.functions[..self.imported_functions]
    }

    pub fn own_functions(&self) -> &[Arc<FunctionInstance>] {
        &self.functions[self.imported_functions..]
    }

    pub fn engine(&self) -> Option<&Arc<ModuleEngine>> {
        self.engine.get()
    }

    pub(crate) fn set_engine(&self, engine: Arc<ModuleEngine>) {
        // bound exactly once, during instantiation
        let _ = self.engine.set(engine);
    }

    /// Mark the module closed and release its memory
    ///
    /// Returns false if it was already closed; the first exit code wins.
    pub fn close(&self, exit_code: u32) -> bool {
        let state = (u64::from(exit_code) << 32) | CLOSED;
        if self.closed.compare_exchange(0, state, Ordering::AcqRel, Ordering::Acquire).is_err() {
            return false;
        }
        tracing::debug!(module = %self.name, exit_code, "module closed");
        if let Some(memory) = &self.memory {
            memory.close();
        }
        true
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire) & CLOSED != 0
    }

    pub fn fail_if_closed(&self) -> Result<(), RuntimeError> {
        let state = self.closed.load(Ordering::Acquire);
        if state & CLOSED == 0 {
            return Ok(());
        }
        Err(RuntimeError::ModuleClosed {
            name: self.name.clone(),
            exit_code: (state >> 32) as u32,
        })
    }

    /// Invoke the function named `name` with `params`
    pub fn call(self: &Arc<Self>, name: &str, params: &[u64]) -> Result<Vec<u64>, RuntimeError> {
        let function = self.function_by_name(name).ok_or_else(|| RuntimeError::FunctionNotFound {
            module: self.name.clone(),
            name: name.to_string(),
        })?;
        let engine = self
            .engine()
            .ok_or_else(|| RuntimeError::NotCompiled(self.name.clone()))?;
        engine.call(&super::CallContext::new(Arc::clone(self)), function, params)
    }
}

impl fmt::Debug for ModuleInstance {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ModuleInstance")
            .field("name", &self.name)
            .field("functions", &self.functions.len())
            .field("memory", &self.memory.as_ref().map(|m| m.pages()))
            .field("closed", &self.is_closed())
            .finish()
    }
}
