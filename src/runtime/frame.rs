//! Call frames of one invocation

use super::instruction::Instruction;
use super::module_engine::Function;
use super::{ModuleEngine, ModuleInstance};
use std::sync::Arc;

/// What a guest frame executes against
#[derive(Debug, Clone)]
pub(crate) struct Activation {
    pub body: Arc<[Instruction]>,
    /// Defining module: memory, globals and table
    pub module: Arc<ModuleInstance>,
    /// Binding of the defining module: call targets
    pub engine: Arc<ModuleEngine>,
}

/// One active (not yet returned) call
#[derive(Debug)]
pub(crate) struct CallFrame {
    /// Saved program counter while a callee runs
    pub pc: usize,
    pub function: Arc<Function>,
    /// `None` for host functions
    pub activation: Option<Activation>,
}

impl CallFrame {
    pub fn guest(function: Arc<Function>, activation: Activation) -> Self {
        CallFrame {
            pc: 0,
            function,
            activation: Some(activation),
        }
    }

    pub fn host(function: Arc<Function>) -> Self {
        CallFrame {
            pc: 0,
            function,
            activation: None,
        }
    }
}
