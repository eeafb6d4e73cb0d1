mod common;

use common::*;
use flatwasm::config::{EngineConfig, Features};
use flatwasm::ir::{Float, Operation as Op, SignedInt, SignedType, UnsignedType};
use flatwasm::module::{FunctionDefinition, FunctionType, GlobalDefinition, ModuleDefinition, ValueType};
use flatwasm::runtime::{host_fn, ConversionFailure, Engine, RuntimeError, Trap};
use rstest::rstest;
use std::sync::Arc;

#[test]
fn add_two_numbers() {
    init_tracing();
    let engine = Engine::default();
    let module = single(
        1,
        "add",
        i32s(2, 1),
        vec![Op::Pick { depth: 1 }, Op::Pick { depth: 1 }, Op::Add(UnsignedType::I32), ret()],
    );
    let m = compile_and_instantiate(&engine, "math", &module);
    assert_eq!(m.call("add", &[2, 3]).unwrap(), vec![5]);
    assert_eq!(m.call("add", &[u64::from(u32::MAX), 1]).unwrap(), vec![0]);
}

#[test]
fn param_count_is_checked() {
    let engine = Engine::default();
    let module = single(2, "add", i32s(2, 1), vec![Op::Add(UnsignedType::I32), ret()]);
    let m = compile_and_instantiate(&engine, "math", &module);
    let err = m.call("add", &[1]).unwrap_err();
    assert_eq!(err, RuntimeError::ParamCountMismatch { expected: 2, actual: 1 });
    assert_eq!(err.to_string(), "expected 2 params, but passed 1");
}

#[test]
fn unknown_function_name() {
    let engine = Engine::default();
    let m = compile_and_instantiate(&engine, "math", &single(3, "f", i32s(0, 0), vec![]));
    assert_eq!(
        m.call("g", &[]).unwrap_err().to_string(),
        "function g not found in module math"
    );
}

#[rstest]
#[case(SignedType::Int32, 1, 0, Err(Trap::IntegerDivideByZero))]
#[case(SignedType::Uint32, 1, 0, Err(Trap::IntegerDivideByZero))]
#[case(SignedType::Int32, i32::MIN as u32, -1i32 as u32, Err(Trap::IntegerOverflow))]
#[case(SignedType::Uint32, i32::MIN as u32, -1i32 as u32, Ok(0))]
#[case(SignedType::Int32, -7i32 as u32, 2, Ok(-3i32 as u32))]
#[case(SignedType::Uint32, 7, 2, Ok(3))]
fn i32_division(#[case] ty: SignedType, #[case] a: u32, #[case] b: u32, #[case] expected: Result<u32, Trap>) {
    let engine = Engine::default();
    let module = single(4, "div", i32s(2, 1), vec![Op::Div(ty), ret()]);
    let m = compile_and_instantiate(&engine, "div", &module);
    let result = m.call("div", &[u64::from(a), u64::from(b)]);
    match expected {
        Ok(q) => assert_eq!(result.unwrap(), vec![u64::from(q)]),
        Err(trap) => assert_eq!(result.unwrap_err().trap(), Some(&trap)),
    }
}

#[test]
fn signed_remainder_of_min_by_minus_one_is_zero() {
    let engine = Engine::default();
    let module = single(5, "rem", i32s(2, 1), vec![Op::Rem(SignedInt::Int32), ret()]);
    let m = compile_and_instantiate(&engine, "rem", &module);
    assert_eq!(m.call("rem", &[u64::from(i32::MIN as u32), u64::from(u32::MAX)]).unwrap(), vec![0]);
}

#[rstest]
#[case(f32::NAN, Err(Trap::InvalidConversion(ConversionFailure::NotANumber)))]
#[case(3e9, Err(Trap::InvalidConversion(ConversionFailure::OutOfRange)))]
#[case(-2147483648.0, Ok(i32::MIN as u32))]
#[case(-1.9, Ok(-1i32 as u32))]
fn f32_to_i32_truncation(#[case] input: f32, #[case] expected: Result<u32, Trap>) {
    let engine = Engine::default();
    let module = single(
        6,
        "trunc",
        FunctionType::new(vec![ValueType::F32], vec![ValueType::I32]),
        vec![
            Op::ITruncFromF {
                input: Float::F32,
                output: SignedInt::Int32,
            },
            ret(),
        ],
    );
    let m = compile_and_instantiate(&engine, "trunc", &module);
    let result = m.call("trunc", &[u64::from(input.to_bits())]);
    match expected {
        Ok(v) => assert_eq!(result.unwrap(), vec![u64::from(v)]),
        Err(trap) => assert_eq!(result.unwrap_err().trap(), Some(&trap)),
    }
}

#[test]
fn sign_extension_enabled_by_default() {
    let engine = Engine::default();
    let module = single(7, "ext", i32s(1, 1), vec![Op::SignExtend32From8, ret()]);
    let m = compile_and_instantiate(&engine, "ext", &module);
    assert_eq!(m.call("ext", &[0x80]).unwrap(), vec![0xffff_ff80]);
    assert_eq!(m.call("ext", &[0x7f]).unwrap(), vec![0x7f]);
}

#[test]
fn multiple_results_come_back_in_order() {
    let module = single(
        14,
        "pair",
        i32s(1, 2),
        vec![Op::Pick { depth: 0 }, Op::ConstI32(1), Op::Add(UnsignedType::I32), ret()],
    );
    let m = compile_and_instantiate(&Engine::default(), "pairs", &module);
    assert_eq!(m.call("pair", &[41]).unwrap(), vec![41, 42]);

    let single_value = Engine::new(EngineConfig::default().with_features(Features::SIGN_EXTENSION_OPS));
    let err = single_value.compile(&module).unwrap_err();
    assert_eq!(
        err.to_string(),
        "function[0/0] failed to lower operations: multiple results (i32) -> (i32, i32) invalid as feature \"multi-value\" is disabled"
    );
    assert!(single_value.lookup(&module.id).is_none());
}

#[test]
fn features_from_config() {
    let config = EngineConfig::from_json(r#"{"features": "MULTI_VALUE", "call_stack_ceiling": 10}"#).unwrap();
    assert_eq!(config.features, Features::MULTI_VALUE);
    let engine = Engine::new(config);
    let module = single(8, "ext", i32s(1, 1), vec![Op::SignExtend32From8, ret()]);
    let err = engine.compile(&module).unwrap_err();
    assert_eq!(
        err.to_string(),
        "function[0/0] failed to lower operations: i32.extend8_s invalid as feature \"sign-extension-ops\" is disabled"
    );
}

#[test]
fn globals_persist_between_calls() {
    let engine = Engine::default();
    let module = single(
        9,
        "bump",
        FunctionType::new(vec![], vec![ValueType::I64]),
        vec![
            Op::GlobalGet { index: 0 },
            Op::ConstI64(1),
            Op::Add(UnsignedType::I64),
            Op::GlobalSet { index: 0 },
            Op::GlobalGet { index: 0 },
            ret(),
        ],
    )
    .with_global(GlobalDefinition::new(ValueType::I64, true, 7));
    let m = compile_and_instantiate(&engine, "counter", &module);
    assert_eq!(m.call("bump", &[]).unwrap(), vec![8]);
    assert_eq!(m.call("bump", &[]).unwrap(), vec![9]);
    assert_eq!(m.global(0).unwrap().get(), 9);

    // a second instance of the same definition has its own globals
    let other = engine.instantiate("counter2", &module, vec![]).unwrap();
    assert_eq!(other.call("bump", &[]).unwrap(), vec![8]);
}

/// `env` exports `inc` (guest) and `add100` (host); `app` imports both
fn linked(engine: &Engine) -> (Arc<flatwasm::runtime::ModuleInstance>, Arc<flatwasm::runtime::ModuleInstance>) {
    let mut env = ModuleDefinition::new(id(20));
    let ty = env.add_type(i32_to_i32());
    env.add_function(FunctionDefinition::wasm(
        "inc",
        ty,
        vec![Op::ConstI32(1), Op::Add(UnsignedType::I32), ret()],
    ));
    env.add_function(FunctionDefinition::host(
        "add100",
        ty,
        host_fn(|_, params| Ok(vec![params[0] + 100])),
    ));
    let env = compile_and_instantiate(engine, "env", &env);

    let mut app = ModuleDefinition::new(id(21)).with_imported_functions(2);
    let ty = app.add_type(i32_to_i32());
    app.add_function(FunctionDefinition::wasm(
        "run",
        ty,
        vec![Op::Call { function_index: 0 }, Op::Call { function_index: 1 }, ret()],
    ));
    engine.compile(&app).unwrap();
    let imports = vec![
        Arc::clone(env.function_by_name("inc").unwrap()),
        Arc::clone(env.function_by_name("add100").unwrap()),
    ];
    let app = engine.instantiate("app", &app, imports).unwrap();
    (env, app)
}

#[test]
fn imports_call_into_defining_module() {
    init_tracing();
    let engine = Engine::default();
    let (env, app) = linked(&engine);
    assert_eq!(app.call("run", &[1]).unwrap(), vec![102]);

    let app_engine = app.engine().unwrap();
    let env_engine = env.engine().unwrap();
    assert_eq!(app_engine.imported_function_count(), 2);
    assert!(Arc::ptr_eq(app_engine.function(0).unwrap(), env_engine.function(0).unwrap()));
    assert!(Arc::ptr_eq(app_engine.function(1).unwrap(), env_engine.function(1).unwrap()));
    assert!(app_engine.function(1).unwrap().is_host());
}

#[test]
fn imported_function_traces_through_both_modules() {
    let engine = Engine::default();
    let mut env = ModuleDefinition::new(id(22));
    let ty = env.add_type(i32_to_i32());
    env.add_function(FunctionDefinition::wasm("crash", ty, vec![Op::Unreachable]));
    let env = compile_and_instantiate(&engine, "env", &env);

    let mut app = ModuleDefinition::new(id(23)).with_imported_functions(1);
    let ty = app.add_type(i32_to_i32());
    app.add_function(FunctionDefinition::wasm("main", ty, vec![Op::Call { function_index: 0 }, ret()]));
    engine.compile(&app).unwrap();
    let app = engine
        .instantiate("app", &app, vec![Arc::clone(env.function(0).unwrap())])
        .unwrap();

    assert_eq!(
        app.call("main", &[0]).unwrap_err().to_string(),
        "wasm error: unreachable\nwasm stack trace:\n\tcrash(i32) i32\n\tmain(i32) i32"
    );
}

#[test]
fn import_count_must_match() {
    let engine = Engine::default();
    let module = single(24, "f", i32s(0, 0), vec![]).with_imported_functions(1);
    engine.compile(&module).unwrap();
    assert_eq!(
        engine.instantiate("m", &module, vec![]).unwrap_err().to_string(),
        "module m expects 1 imported functions, but 0 were provided"
    );
}

/// Table slots: 0 is `inc`, 1 is `wide` (another type), 2 is empty, 3 is a host function
fn table_module(engine: &Engine) -> Arc<flatwasm::runtime::ModuleInstance> {
    let mut module = ModuleDefinition::new(id(30)).with_table(4, [(0, 1), (1, 2), (3, 3)]);
    let narrow = module.add_type(i32_to_i32());
    let wide = module.add_type(FunctionType::new(vec![ValueType::I64], vec![ValueType::I64]));
    module.add_function(FunctionDefinition::wasm(
        "dispatch",
        narrow,
        vec![
            Op::ConstI32(7),
            Op::Swap { depth: 1 },
            Op::CallIndirect {
                type_index: narrow,
                table_index: 0,
            },
            ret(),
        ],
    ));
    module.add_function(FunctionDefinition::wasm(
        "inc",
        narrow,
        vec![Op::ConstI32(1), Op::Add(UnsignedType::I32), ret()],
    ));
    module.add_function(FunctionDefinition::wasm("wide", wide, vec![ret()]));
    module.add_function(FunctionDefinition::host(
        "host_inc",
        narrow,
        host_fn(|_, params| Ok(vec![params[0] + 100])),
    ));
    compile_and_instantiate(engine, "table", &module)
}

#[rstest]
#[case(0, Ok(8))]
#[case(1, Err(Trap::IndirectCallTypeMismatch))]
#[case(2, Err(Trap::InvalidTableAccess))]
#[case(3, Ok(107))]
#[case(4, Err(Trap::InvalidTableAccess))]
#[case(u32::MAX, Err(Trap::InvalidTableAccess))]
fn call_indirect(#[case] slot: u32, #[case] expected: Result<u64, Trap>) {
    let engine = Engine::default();
    let m = table_module(&engine);
    let result = m.call("dispatch", &[u64::from(slot)]);
    match expected {
        Ok(v) => assert_eq!(result.unwrap(), vec![v]),
        Err(trap) => assert_eq!(result.unwrap_err().trap(), Some(&trap)),
    }
}

#[test]
fn table_holds_bound_functions() {
    let engine = Engine::default();
    let m = table_module(&engine);
    let table = m.table().unwrap();
    assert_eq!(table.len(), 4);
    let slot0 = table.get(0).unwrap();
    assert!(Arc::ptr_eq(&slot0, m.engine().unwrap().function(1).unwrap()));
    assert_eq!(slot0.source().debug_name, "inc");
}

#[test]
fn element_past_table_end_fails_instantiation() {
    let engine = Engine::default();
    let module = single(31, "f", i32s(0, 0), vec![]).with_table(1, [(5, 0)]);
    engine.compile(&module).unwrap();
    assert_eq!(
        engine.instantiate("m", &module, vec![]).unwrap_err(),
        RuntimeError::TableIndexOutOfBounds {
            module: "m".to_string(),
            index: 5
        }
    );
}

/// `exit` is a host function closing the module; `run` calls it then traps
fn exiting_module(engine: &Engine) -> Arc<flatwasm::runtime::ModuleInstance> {
    let mut module =
        ModuleDefinition::new(id(40)).with_memory(flatwasm::module::MemoryDefinition::new(1, 1));
    let exit_ty = module.add_type(i32s(1, 0));
    let run_ty = module.add_type(i32s(0, 0));
    module.add_function(FunctionDefinition::host(
        "exit",
        exit_ty,
        host_fn(|ctx, params| Err(ctx.exit(params[0] as u32))),
    ));
    module.add_function(FunctionDefinition::wasm(
        "run",
        run_ty,
        vec![Op::ConstI32(3), Op::Call { function_index: 0 }, Op::Unreachable],
    ));
    compile_and_instantiate(engine, "app", &module)
}

#[test]
fn exit_closes_module() {
    init_tracing();
    let engine = Engine::default();
    let m = exiting_module(&engine);
    let closed = RuntimeError::ModuleClosed {
        name: "app".to_string(),
        exit_code: 3,
    };
    assert_eq!(m.call("run", &[]).unwrap_err(), closed);
    assert_eq!(closed.to_string(), "module \"app\" closed with exit_code(3)");
    assert!(m.is_closed());
    assert!(m.memory().unwrap().is_closed());

    // closed modules refuse further calls and keep the first exit code
    assert!(!m.close(9));
    assert_eq!(m.call("run", &[]).unwrap_err(), closed);
}

#[test]
fn close_from_embedder() {
    let engine = Engine::default();
    let module = single(41, "f", i32s(0, 1), vec![Op::ConstI32(1), ret()]);
    let m = compile_and_instantiate(&engine, "m", &module);
    assert_eq!(m.call("f", &[]).unwrap(), vec![1]);
    assert!(m.close(0));
    assert_eq!(
        m.call("f", &[]).unwrap_err(),
        RuntimeError::ModuleClosed {
            name: "m".to_string(),
            exit_code: 0
        }
    );
}

#[test]
fn listeners_see_imported_calls() {
    let recorder = Arc::new(CallRecorder::default());
    let engine = Engine::default().with_listener(recorder.clone());
    let (_env, app) = linked(&engine);
    app.call("run", &[1]).unwrap();
    assert_eq!(recorder.take(), vec![">run", ">inc", "<inc", ">add100", "<add100", "<run"]);

    // after is skipped for frames unwound by a trap
    let module = single(42, "boom", i32s(0, 0), vec![Op::Unreachable]);
    let m = compile_and_instantiate(&engine, "boom", &module);
    m.call("boom", &[]).unwrap_err();
    assert_eq!(recorder.take(), vec![">boom"]);
}

#[test]
fn evicted_code_keeps_running_instances() {
    let engine = Engine::default();
    let module = single(50, "one", i32s(0, 1), vec![Op::ConstI32(1), ret()]);
    let m = compile_and_instantiate(&engine, "one", &module);
    engine.evict(&module.id);
    assert_eq!(engine.compiled_module_count(), 0);
    assert_eq!(m.call("one", &[]).unwrap(), vec![1]);

    assert!(matches!(
        engine.instantiate("again", &module, vec![]),
        Err(RuntimeError::NotCompiled(_))
    ));
    engine.compile(&module).unwrap();
    let again = engine.instantiate("again", &module, vec![]).unwrap();
    assert_eq!(again.call("one", &[]).unwrap(), vec![1]);
}

#[test]
fn deep_recursion_traps_instead_of_crashing() {
    let engine = Engine::default();
    let module = single(51, "forever", i32s(0, 0), vec![Op::Call { function_index: 0 }, ret()]);
    let m = compile_and_instantiate(&engine, "loop", &module);
    let err = m.call("forever", &[]).unwrap_err();
    assert_eq!(err.trap(), Some(&Trap::StackOverflow));
    assert!(err.to_string().starts_with("wasm error: stack overflow\nwasm stack trace:\n\tforever()\n"));
}
