//! Common test utilities shared between integration tests

#![allow(dead_code)]

use flatwasm::ir::{BranchTarget, Operation};
use flatwasm::module::{FunctionDefinition, FunctionType, ModuleDefinition, ModuleId, ValueType};
use flatwasm::runtime::{Engine, FunctionListener, ModuleInstance};
use std::sync::{Arc, Mutex, Once};
use tracing_subscriber::EnvFilter;

static TRACING: Once = Once::new();

/// Route engine logs to the test harness; filter with `RUST_LOG`
pub fn init_tracing() {
    TRACING.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .init();
    });
}

pub fn id(n: u8) -> ModuleId {
    ModuleId::new([n; 32])
}

pub fn ret() -> Operation {
    Operation::Br { target: BranchTarget::Return }
}

pub fn i32_to_i32() -> FunctionType {
    FunctionType::new(vec![ValueType::I32], vec![ValueType::I32])
}

pub fn i32s(params: usize, results: usize) -> FunctionType {
    FunctionType::new(vec![ValueType::I32; params], vec![ValueType::I32; results])
}

/// A module with one guest function named `name`
pub fn single(n: u8, name: &str, ty: FunctionType, ops: Vec<Operation>) -> ModuleDefinition {
    let mut module = ModuleDefinition::new(id(n));
    let ty = module.add_type(ty);
    module.add_function(FunctionDefinition::wasm(name, ty, ops));
    module
}

pub fn compile_and_instantiate(engine: &Engine, name: &str, module: &ModuleDefinition) -> Arc<ModuleInstance> {
    engine.compile(module).unwrap();
    engine.instantiate(name, module, vec![]).unwrap()
}

/// Listener recording `>name` on entry and `<name` on exit
#[derive(Default)]
pub struct CallRecorder(pub Mutex<Vec<String>>);

impl CallRecorder {
    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.0.lock().unwrap())
    }
}

impl FunctionListener for CallRecorder {
    fn before(&self, name: &str, _: &FunctionType) {
        self.0.lock().unwrap().push(format!(">{name}"));
    }

    fn after(&self, name: &str, _: &FunctionType) {
        self.0.lock().unwrap().push(format!("<{name}"));
    }
}
