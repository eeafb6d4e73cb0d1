//! An interpreting execution engine for validated WebAssembly modules.
//!
//! flatwasm takes functions that a front end has already decoded, validated
//! and translated into a label-addressed operation list, lowers them once into
//! flat instruction arrays, and runs them on a stack machine against a
//! bounds-checked linear memory.
//!
//! # Modules
//!
//! - [`config`] -- Engine configuration and the enabled feature set.
//! - [`module`] -- Module definitions: types, functions, memory, globals, table.
//! - [`ir`] -- The structured operation set consumed by lowering.
//! - [`runtime`] -- Lowering, the code cache, module binding, the interpreter and memory.
//!
//! # Example
//!
//! Compile and call a function computing `a + b`:
//!
//! ```
//! use flatwasm::ir::{BranchTarget, InclusiveRange, Operation, UnsignedType};
//! use flatwasm::module::{FunctionDefinition, FunctionType, ModuleDefinition, ModuleId, ValueType};
//! use flatwasm::runtime::Engine;
//!
//! let mut module = ModuleDefinition::new(ModuleId::new([7; 32]));
//! let ty = module.add_type(FunctionType::new(vec![ValueType::I32, ValueType::I32], vec![ValueType::I32]));
//! module.add_function(FunctionDefinition::wasm("add", ty, vec![
//!     Operation::Pick { depth: 1 },
//!     Operation::Pick { depth: 1 },
//!     Operation::Add(UnsignedType::I32),
//!     Operation::Drop { depth: Some(InclusiveRange::new(1, 2)) },
//!     Operation::Br { target: BranchTarget::Return },
//! ]));
//!
//! let engine = Engine::default();
//! engine.compile(&module).unwrap();
//! let instance = engine.instantiate("math", &module, vec![]).unwrap();
//! assert_eq!(instance.call("add", &[2, 3]).unwrap(), vec![5]);
//! ```

pub mod config;
pub mod ir;
pub mod module;
pub mod runtime;
