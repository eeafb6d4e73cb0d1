//! Test utilities for runtime testing
//!
//! [`ExecutorTest`] compiles a single function from structured operations,
//! instantiates it and runs it through the full call path.

use crate::config::{EngineConfig, Features};
use crate::ir::{BranchTarget, Operation};
use crate::module::{FunctionDefinition, FunctionType, MemoryDefinition, ModuleDefinition, ModuleId, ValueType};
use crate::runtime::{Engine, ModuleInstance, RuntimeError, Trap};
use std::sync::Arc;

/// Test builder for creating executor tests fluently
pub struct ExecutorTest {
    operations: Vec<Operation>,
    params: Vec<ValueType>,
    args: Vec<u64>,
    results: Vec<ValueType>,
    memory: Option<MemoryDefinition>,
    config: EngineConfig,
}

impl ExecutorTest {
    pub fn new() -> Self {
        ExecutorTest {
            operations: Vec::new(),
            params: Vec::new(),
            args: Vec::new(),
            results: Vec::new(),
            memory: None,
            config: EngineConfig::default(),
        }
    }

    /// One page of memory, growable to two
    pub fn with_memory(mut self) -> Self {
        self.memory = Some(MemoryDefinition::new(1, 2));
        self
    }

    pub fn with_features(mut self, features: Features) -> Self {
        self.config = self.config.with_features(features);
        self
    }

    pub fn with_call_stack_ceiling(mut self, ceiling: usize) -> Self {
        self.config = self.config.with_call_stack_ceiling(ceiling);
        self
    }

    pub fn op(mut self, op: Operation) -> Self {
        self.operations.push(op);
        self
    }

    pub fn ops(mut self, ops: impl IntoIterator<Item = Operation>) -> Self {
        self.operations.extend(ops);
        self
    }

    pub fn param(mut self, ty: ValueType, arg: u64) -> Self {
        self.params.push(ty);
        self.args.push(arg);
        self
    }

    pub fn returns(mut self, types: Vec<ValueType>) -> Self {
        self.results = types;
        self
    }

    pub fn instantiate(mut self) -> Result<(Arc<ModuleInstance>, Vec<u64>), RuntimeError> {
        self.operations.push(Operation::Br { target: BranchTarget::Return });
        let mut module = ModuleDefinition::new(ModuleId::new([0; 32]));
        let ty = module.add_type(FunctionType::new(self.params, self.results));
        module.add_function(FunctionDefinition::wasm("test", ty, self.operations));
        module.memory = self.memory;

        let engine = Engine::new(self.config);
        engine.compile(&module)?;
        Ok((engine.instantiate("test", &module, vec![])?, self.args))
    }

    pub fn run(self) -> Result<Vec<u64>, RuntimeError> {
        let (instance, args) = self.instantiate()?;
        instance.call("test", &args)
    }

    pub fn expect_stack(self, expected: Vec<u64>) {
        assert_eq!(self.run().unwrap(), expected);
    }

    pub fn expect_trap(self, expected: Trap) {
        match self.run() {
            Err(err) => assert_eq!(err.trap(), Some(&expected), "unexpected error: {err}"),
            Ok(results) => panic!("expected trap {expected}, got {results:?}"),
        }
    }

    pub fn expect_error(self, error_contains: &str) {
        match self.run() {
            Err(err) => {
                let message = err.to_string();
                assert!(
                    message.contains(error_contains),
                    "expected error containing '{error_contains}', got '{message}'"
                );
            }
            Ok(results) => panic!("expected error containing '{error_contains}', got {results:?}"),
        }
    }
}
