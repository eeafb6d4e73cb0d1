//! WebAssembly runtime implementation
//!
//! This module provides the interpreter: lowering of structured operations
//! into flat instructions, the per-module code cache, binding of module
//! instances, the stack machine, and linear memory.

pub mod call_context;
mod call_engine;
pub mod engine;
pub mod error;
mod frame;
pub mod host;
pub mod instance;
pub mod instruction;
pub mod listener;
pub mod memory;
pub mod module_engine;
pub mod ops;
pub mod stack;
pub mod table;
#[cfg(test)]
pub(crate) mod test_utils;
pub mod translator;

pub use call_context::CallContext;
pub use engine::{Code, Engine};
pub use error::{CompilationError, ConversionFailure, FrameInfo, RuntimeError, Trap, WasmError};
pub use host::{host_fn, HostFunction};
pub use instance::{FunctionInstance, FunctionTypeId, GlobalInstance, ModuleInstance, TypeRegistry};
pub use listener::FunctionListener;
pub use memory::{MemoryInstance, WaitOutcome};
pub use module_engine::{Function, ModuleEngine};
pub use table::TableInstance;
