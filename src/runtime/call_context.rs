//! Per-call view of the module being executed

use super::{MemoryInstance, ModuleInstance, RuntimeError, Trap};
use std::sync::Arc;

/// The module an invocation runs against, plus the memory host functions see
///
/// A host function imported by another module sees the caller's memory, not
/// the memory of the module that defines it.
#[derive(Debug, Clone)]
pub struct CallContext {
    module: Arc<ModuleInstance>,
    memory: Option<Arc<MemoryInstance>>,
}

impl CallContext {
    pub fn new(module: Arc<ModuleInstance>) -> Self {
        let memory = module.memory().cloned();
        CallContext { module, memory }
    }

    pub fn with_memory(&self, memory: Option<Arc<MemoryInstance>>) -> Self {
        CallContext {
            module: Arc::clone(&self.module),
            memory,
        }
    }

    pub fn module(&self) -> &Arc<ModuleInstance> {
        &self.module
    }

    pub fn memory(&self) -> Option<&MemoryInstance> {
        self.memory.as_deref()
    }

    /// Close the module with `exit_code` and return the trap that unwinds the call
    pub fn exit(&self, exit_code: u32) -> Trap {
        self.module.close(exit_code);
        Trap::ModuleClosed
    }

    pub fn fail_if_closed(&self) -> Result<(), RuntimeError> {
        self.module.fail_if_closed()
    }
}
