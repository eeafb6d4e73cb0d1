//! Bound functions of one module instance, and the invocation entry point

use super::call_engine::CallEngine;
use super::error::{FrameInfo, WasmError};
use super::host::HostFunction;
use super::instruction::Instruction;
use super::listener::FunctionListener;
use super::{CallContext, FunctionInstance, RuntimeError, Trap};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// How a bound function runs
#[derive(Clone)]
pub(crate) enum Callable {
    Wasm(Arc<[Instruction]>),
    Host(Arc<dyn HostFunction>),
}

/// A function instance paired with its executable form
pub struct Function {
    pub(crate) source: Arc<FunctionInstance>,
    pub(crate) callable: Callable,
}

impl Function {
    pub fn source(&self) -> &Arc<FunctionInstance> {
        &self.source
    }

    pub fn is_host(&self) -> bool {
        matches!(self.callable, Callable::Host(_))
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Function")
            .field("name", &self.source.debug_name)
            .field("host", &self.is_host())
            .finish()
    }
}

/// Callable form of a module instance
pub struct ModuleEngine {
    name: String,
    /// Function index space: imports first
    pub(crate) functions: Vec<Arc<Function>>,
    imported_functions: usize,
    pub(crate) listeners: Arc<[Arc<dyn FunctionListener>]>,
    pub(crate) call_stack_ceiling: usize,
}

impl ModuleEngine {
    pub(crate) fn new(
        name: String,
        functions: Vec<Arc<Function>>,
        imported_functions: usize,
        listeners: Arc<[Arc<dyn FunctionListener>]>,
        call_stack_ceiling: usize,
    ) -> Self {
        ModuleEngine {
            name,
            functions,
            imported_functions,
            listeners,
            call_stack_ceiling,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn imported_function_count(&self) -> usize {
        self.imported_functions
    }

    /// Bound function by index in this module's function index space
    pub fn function(&self, index: u32) -> Option<&Arc<Function>> {
        self.functions.get(index as usize)
    }

    /// The bound form of `f`, which may be defined by another module
    ///
    /// Imports resolve through their defining module's binding, so every
    /// importer shares the same [`Function`].
    pub(crate) fn resolve(&self, f: &FunctionInstance) -> Option<Arc<Function>> {
        if let Some(bound) = self.function(f.index) {
            if std::ptr::eq(Arc::as_ptr(&bound.source), f) {
                return Some(Arc::clone(bound));
            }
        }
        let origin = f.module()?;
        let engine = origin.engine()?;
        engine.function(f.index).cloned()
    }

    /// Invoke `f` with `params`
    ///
    /// Each call runs on a fresh operand stack and frame stack. Traps and
    /// panics are caught here and returned with the frames that were active.
    pub fn call(&self, ctx: &CallContext, f: &FunctionInstance, params: &[u64]) -> Result<Vec<u64>, RuntimeError> {
        ctx.fail_if_closed()?;
        let function = self.resolve(f).ok_or_else(|| RuntimeError::UnboundImport {
            name: f.debug_name.clone(),
        })?;

        let expected = f.ty.params.len();
        if expected != params.len() {
            return Err(RuntimeError::ParamCountMismatch {
                expected,
                actual: params.len(),
            });
        }

        tracing::trace!(module = %self.name, function = %f.debug_name, "call");
        let mut ce = CallEngine::new(Arc::clone(&self.listeners), self.call_stack_ceiling);
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| ce.call(ctx, &function, params)));
        let cause = match outcome {
            Ok(Ok(results)) => {
                ctx.fail_if_closed()?;
                return Ok(results);
            }
            Ok(Err(trap)) => trap,
            Err(payload) => Trap::from_panic(payload),
        };

        // An exit requested during the call takes precedence over the trap it raised.
        ctx.fail_if_closed()?;

        let frames: Vec<FrameInfo> = ce
            .frames()
            .iter()
            .rev()
            .map(|frame| {
                let source = &frame.function.source;
                FrameInfo::new(&source.debug_name, &source.ty)
            })
            .collect();
        tracing::debug!(module = %self.name, function = %f.debug_name, %cause, depth = frames.len(), "call trapped");
        Err(WasmError::new(cause, frames).into())
    }
}

impl fmt::Debug for ModuleEngine {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ModuleEngine")
            .field("name", &self.name)
            .field("functions", &self.functions.len())
            .field("imported_functions", &self.imported_functions)
            .finish()
    }
}
