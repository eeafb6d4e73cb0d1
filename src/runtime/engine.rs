//! Code cache and module binding
//!
//! An [`Engine`] lowers every function of a module definition once and
//! caches the result by [`ModuleId`]. Every instantiation of that definition
//! shares the cached bodies. Lookups take a read lock; compile and evict take
//! the write lock only to publish or remove an entry.

use super::instance::{InstanceParts, OwnFunction, TypeRegistry};
use super::instruction::Instruction;
use super::listener::FunctionListener;
use super::module_engine::{Callable, Function, ModuleEngine};
use super::translator;
use super::{
    CompilationError, FunctionInstance, GlobalInstance, MemoryInstance, ModuleInstance, RuntimeError, TableInstance,
};
use crate::config::{EngineConfig, Features};
use crate::module::{FunctionBody, ModuleDefinition, ModuleId};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

/// Compiled form of one function of a definition
#[derive(Debug, Clone)]
pub enum Code {
    Wasm(Arc<[Instruction]>),
    /// Implemented by the embedder; bound to its [`HostFunction`](super::HostFunction) at instantiation
    Host,
}

static SHARED: Lazy<Engine> = Lazy::new(|| Engine::new(EngineConfig::default()));

/// Compiles module definitions and instantiates them
///
/// One engine owns a code cache and the listeners handed to every module it
/// binds. Instances created by different engines can link to
/// each other: imports are resolved through the defining module's binding,
/// not through the importing engine's cache.
pub struct Engine {
    config: EngineConfig,
    /// Lowered bodies by definition, in function index order, imports excluded
    codes: RwLock<HashMap<ModuleId, Arc<[Code]>>>,
    listeners: Arc<[Arc<dyn FunctionListener>]>,
    types: TypeRegistry,
}

impl Engine {
    /// An engine with an empty code cache and no listeners
    pub fn new(config: EngineConfig) -> Self {
        Engine {
            config,
            codes: RwLock::new(HashMap::new()),
            listeners: Arc::from(Vec::new()),
            types: TypeRegistry::new(),
        }
    }

    /// Process-wide engine with the default configuration
    pub fn shared() -> &'static Engine {
        &SHARED
    }

    /// Add a listener notified around every call made through modules bound after this point
    pub fn with_listener(mut self, listener: Arc<dyn FunctionListener>) -> Self {
        let mut listeners = self.listeners.to_vec();
        listeners.push(listener);
        self.listeners = Arc::from(listeners);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Registry interning the function types of every module this engine instantiated
    pub fn type_registry(&self) -> &TypeRegistry {
        &self.types
    }

    /// Lower every function of `module` and cache the result
    ///
    /// Compiling an already cached definition is a no-op. Nothing is cached
    /// if any function fails to lower.
    pub fn compile(&self, module: &ModuleDefinition) -> Result<(), CompilationError> {
        if self.codes.read().contains_key(&module.id) {
            tracing::trace!(module = ?module.id, "compile cache hit");
            return Ok(());
        }

        let features = self.config.features;
        let last = module.functions.len().saturating_sub(1);
        let mut codes = Vec::with_capacity(module.functions.len());
        for (index, function) in module.functions.iter().enumerate() {
            let code = self.compile_function(module, function.type_index, &function.body, features).map_err(|source| {
                CompilationError::Function {
                    index,
                    last,
                    source: Box::new(source),
                }
            })?;
            codes.push(code);
        }

        tracing::debug!(module = ?module.id, functions = codes.len(), "compiled");
        self.codes.write().entry(module.id).or_insert_with(|| Arc::from(codes));
        Ok(())
    }

    /// Lower one body after checking its type against the enabled features
    ///
    /// Host functions have nothing to lower and compile to [`Code::Host`].
    fn compile_function(
        &self,
        module: &ModuleDefinition,
        type_index: u32,
        body: &FunctionBody,
        features: Features,
    ) -> Result<Code, CompilationError> {
        let ty = module
            .types
            .get(type_index as usize)
            .ok_or(CompilationError::InvalidTypeIndex(type_index))?;
        if ty.results.len() > 1 && !features.contains(Features::MULTI_VALUE) {
            return Err(CompilationError::FeatureDisabled {
                construct: format!("multiple results {ty}"),
                feature: Features::MULTI_VALUE.feature_name(),
            });
        }
        match body {
            FunctionBody::Host(_) => Ok(Code::Host),
            FunctionBody::Operations(ops) => Ok(Code::Wasm(Arc::from(translator::lower(ops, features)?))),
        }
    }

    /// Cached bodies for `id`
    pub fn lookup(&self, id: &ModuleId) -> Option<Arc<[Code]>> {
        self.codes.read().get(id).cloned()
    }

    /// Drop the cached bodies for `id`; instances already bound keep theirs
    pub fn evict(&self, id: &ModuleId) {
        if self.codes.write().remove(id).is_some() {
            tracing::debug!(module = ?id, "evicted compiled module");
        }
    }

    /// Number of definitions currently in the cache
    pub fn compiled_module_count(&self) -> usize {
        self.codes.read().len()
    }

    /// Wire functions of one module instance into a callable [`ModuleEngine`]
    ///
    /// Imports resolve through their defining module's binding. Table slots in
    /// `table_init` (slot to function index) receive direct references to the
    /// bound functions.
    pub fn bind(
        &self,
        name: &str,
        module: &ModuleDefinition,
        imported: &[Arc<FunctionInstance>],
        own: &[Arc<FunctionInstance>],
        table: Option<&TableInstance>,
        table_init: &BTreeMap<u32, u32>,
    ) -> Result<Arc<ModuleEngine>, RuntimeError> {
        let codes = self
            .lookup(&module.id)
            .ok_or_else(|| RuntimeError::NotCompiled(name.to_string()))?;

        let mut functions = Vec::with_capacity(imported.len() + own.len());
        for import in imported {
            let bound = import
                .module()
                .and_then(|origin| origin.engine().and_then(|e| e.function(import.index).cloned()))
                .ok_or_else(|| RuntimeError::UnboundImport {
                    name: import.debug_name.clone(),
                })?;
            functions.push(bound);
        }

        for (i, source) in own.iter().enumerate() {
            let code = codes.get(i).ok_or_else(|| RuntimeError::FunctionIndexOutOfBounds {
                module: name.to_string(),
                index: (imported.len() + i) as u32,
            })?;
            let callable = match code {
                Code::Wasm(body) => Callable::Wasm(Arc::clone(body)),
                Code::Host => {
                    let host = source.host.clone().ok_or_else(|| RuntimeError::MissingHostFunction {
                        name: source.debug_name.clone(),
                    })?;
                    Callable::Host(host)
                }
            };
            functions.push(Arc::new(Function {
                source: Arc::clone(source),
                callable,
            }));
        }

        if let Some(table) = table {
            for (&slot, &function_index) in table_init {
                let function = functions
                    .get(function_index as usize)
                    .ok_or_else(|| RuntimeError::FunctionIndexOutOfBounds {
                        module: name.to_string(),
                        index: function_index,
                    })?;
                if !table.set(slot, Arc::clone(function)) {
                    return Err(RuntimeError::TableIndexOutOfBounds {
                        module: name.to_string(),
                        index: slot,
                    });
                }
            }
        }

        tracing::debug!(module = name, functions = functions.len(), imported = imported.len(), "bound");
        Ok(Arc::new(ModuleEngine::new(
            name.to_string(),
            functions,
            imported.len(),
            Arc::clone(&self.listeners),
            self.config.call_stack_ceiling,
        )))
    }

    /// Create and bind an instance of a compiled definition
    ///
    /// `imports` are function instances of other modules, in import order.
    pub fn instantiate(
        &self,
        name: &str,
        module: &ModuleDefinition,
        imports: Vec<Arc<FunctionInstance>>,
    ) -> Result<Arc<ModuleInstance>, RuntimeError> {
        if self.lookup(&module.id).is_none() {
            return Err(RuntimeError::NotCompiled(name.to_string()));
        }
        if imports.len() != module.imported_functions as usize {
            return Err(RuntimeError::ImportCountMismatch {
                module: name.to_string(),
                expected: module.imported_functions,
                actual: imports.len(),
            });
        }

        let type_ids = module.types.iter().map(|ty| self.types.intern(ty)).collect::<Vec<_>>();
        let memory = module
            .memory
            .as_ref()
            .map(MemoryInstance::new)
            .transpose()?
            .map(Arc::new);
        let globals = module.globals.iter().map(GlobalInstance::new).collect();
        let table = module.table_size.map(|size| Arc::new(TableInstance::new(size)));

        let mut own = Vec::with_capacity(module.functions.len());
        for (i, function) in module.functions.iter().enumerate() {
            let ty = module
                .function_type(function)
                .ok_or(CompilationError::InvalidTypeIndex(function.type_index))?;
            own.push(OwnFunction {
                debug_name: function.debug_name.clone(),
                ty: ty.clone(),
                type_id: type_ids[function.type_index as usize],
                host: match &function.body {
                    FunctionBody::Host(host) => Some(Arc::clone(host)),
                    FunctionBody::Operations(_) => None,
                },
            });
            tracing::trace!(module = name, index = i, function = %function.debug_name, ty = %ty, "function");
        }

        let instance = ModuleInstance::new(
            InstanceParts {
                name: name.to_string(),
                memory,
                globals,
                table,
                type_ids,
                imports,
            },
            own,
        );
        let engine = self.bind(
            name,
            module,
            instance.imported_functions(),
            instance.own_functions(),
            instance.table().map(Arc::as_ref),
            &module.elements,
        )?;
        instance.set_engine(engine);
        Ok(instance)
    }
}

impl Default for Engine {
    fn default() -> Self {
        Engine::new(EngineConfig::default())
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("compiled_modules", &self.compiled_module_count())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
