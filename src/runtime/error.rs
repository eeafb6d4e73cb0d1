//! Error types for compilation, traps, and invocation

use crate::module::{FunctionType, ValueType};
use std::fmt;

/// Why a float-to-integer truncation failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ConversionFailure {
    #[error("invalid conversion to integer")]
    NotANumber,
    #[error("integer overflow")]
    OutOfRange,
}

/// Abnormal termination of one invocation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Trap {
    #[error("unreachable")]
    Unreachable,
    #[error("stack overflow")]
    StackOverflow,
    #[error("integer divide by zero")]
    IntegerDivideByZero,
    #[error("integer overflow")]
    IntegerOverflow,
    #[error("{0}")]
    InvalidConversion(ConversionFailure),
    #[error("out of bounds memory access")]
    OutOfBoundsMemoryAccess,
    #[error("invalid table access")]
    InvalidTableAccess,
    #[error("indirect call type mismatch")]
    IndirectCallTypeMismatch,
    #[error("expected shared memory")]
    ExpectedSharedMemory,
    #[error("unaligned atomic")]
    UnalignedAtomic,
    #[error("too many waiters")]
    TooManyWaiters,
    /// The operand stack ran dry; lowering produced an invalid body
    #[error("operand stack underflow")]
    StackUnderflow,
    /// A function, global or type index with nothing behind it
    #[error("invalid {space} index {index}")]
    InvalidIndex { space: &'static str, index: u32 },
    #[error("module closed")]
    ModuleClosed,
    /// A host function reported failure
    #[error("{0}")]
    Host(String),
    /// A host function returned a different number of results than its type declares
    #[error("host function returned {actual} results, but its type declares {expected}")]
    HostResultCount { expected: usize, actual: usize },
    /// A panic caught at the call boundary
    #[error("{0}")]
    Panic(String),
}

impl Trap {
    /// Traps defined by WebAssembly itself, as opposed to host failures
    pub fn is_wasm_trap(&self) -> bool {
        !matches!(self, Trap::Host(_) | Trap::HostResultCount { .. } | Trap::Panic(_))
    }

    pub(crate) fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Trap {
        if let Some(trap) = payload.downcast_ref::<Trap>() {
            return trap.clone();
        }
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "panic with non-string payload".to_string()
        };
        Trap::Panic(message)
    }
}

/// Failure to lower a function body
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompilationError {
    /// Branches name labels that never appear in the body
    #[error("labels are not defined: {0}")]
    UndefinedLabels(String),
    #[error("{construct} invalid as feature \"{feature}\" is disabled")]
    FeatureDisabled { construct: String, feature: &'static str },
    #[error("invalid type index {0}")]
    InvalidTypeIndex(u32),
    #[error("function[{index}/{last}] failed to lower operations: {source}")]
    Function {
        index: usize,
        last: usize,
        #[source]
        source: Box<CompilationError>,
    },
}

/// One frame of a backtrace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameInfo {
    pub name: String,
    pub params: Vec<ValueType>,
    pub results: Vec<ValueType>,
}

impl FrameInfo {
    pub fn new(name: &str, ty: &FunctionType) -> Self {
        FrameInfo {
            name: name.to_string(),
            params: ty.params.clone(),
            results: ty.results.clone(),
        }
    }
}

impl fmt::Display for FrameInfo {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let join = |types: &[ValueType]| types.iter().map(ToString::to_string).collect::<Vec<_>>().join(",");
        write!(f, "{}({})", self.name, join(&self.params))?;
        match self.results.len() {
            0 => Ok(()),
            1 => write!(f, " {}", self.results[0]),
            _ => write!(f, " ({})", join(&self.results)),
        }
    }
}

/// A trap together with the frames that were active when it happened
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WasmError {
    pub cause: Trap,
    /// Innermost first
    pub frames: Vec<FrameInfo>,
}

impl WasmError {
    pub fn new(cause: Trap, frames: Vec<FrameInfo>) -> Self {
        WasmError { cause, frames }
    }
}

impl fmt::Display for WasmError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.cause.is_wasm_trap() {
            write!(f, "wasm error: {}", self.cause)?;
        } else {
            write!(f, "{} (recovered by flatwasm)", self.cause)?;
        }
        f.write_str("\nwasm stack trace:")?;
        for frame in &self.frames {
            write!(f, "\n\t{frame}")?;
        }
        Ok(())
    }
}

impl std::error::Error for WasmError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.cause)
    }
}

/// Errors reported to the embedder
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuntimeError {
    #[error("expected {expected} params, but passed {actual}")]
    ParamCountMismatch { expected: usize, actual: usize },
    #[error("module \"{name}\" closed with exit_code({exit_code})")]
    ModuleClosed { name: String, exit_code: u32 },
    #[error("source module for {0} must be compiled before instantiation")]
    NotCompiled(String),
    #[error("imported function {name} is not bound to an engine")]
    UnboundImport { name: String },
    #[error("host function {name} has no implementation")]
    MissingHostFunction { name: String },
    #[error("invalid memory definition: {0}")]
    InvalidMemory(String),
    #[error("function index {index} out of bounds in module {module}")]
    FunctionIndexOutOfBounds { module: String, index: u32 },
    #[error("table index {index} out of bounds in module {module}")]
    TableIndexOutOfBounds { module: String, index: u32 },
    #[error("module {module} expects {expected} imported functions, but {actual} were provided")]
    ImportCountMismatch { module: String, expected: u32, actual: usize },
    #[error("function {name} not found in module {module}")]
    FunctionNotFound { module: String, name: String },
    #[error(transparent)]
    Trap(#[from] WasmError),
    #[error(transparent)]
    Compilation(#[from] CompilationError),
}

impl RuntimeError {
    /// The trap cause, when this error came from executing code
    pub fn trap(&self) -> Option<&Trap> {
        match self {
            RuntimeError::Trap(err) => Some(&err.cause),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_info_display() {
        let ty = FunctionType::new(vec![ValueType::I32, ValueType::I64], vec![ValueType::F32]);
        assert_eq!(FrameInfo::new("add", &ty).to_string(), "add(i32,i64) f32");

        let ty = FunctionType::new(vec![], vec![]);
        assert_eq!(FrameInfo::new("start", &ty).to_string(), "start()");

        let ty = FunctionType::new(vec![ValueType::F64], vec![ValueType::I32, ValueType::I64]);
        assert_eq!(FrameInfo::new("pair", &ty).to_string(), "pair(f64) (i32,i64)");
    }

    #[test]
    fn wasm_error_display() {
        let ty = FunctionType::new(vec![], vec![]);
        let err = WasmError::new(
            Trap::Unreachable,
            vec![FrameInfo::new("inner", &ty), FrameInfo::new("outer", &ty)],
        );
        assert_eq!(
            err.to_string(),
            "wasm error: unreachable\nwasm stack trace:\n\tinner()\n\touter()"
        );
    }

    #[test]
    fn host_error_display() {
        let err = WasmError::new(Trap::Host("boom".to_string()), vec![]);
        assert_eq!(err.to_string(), "boom (recovered by flatwasm)\nwasm stack trace:");
    }

    #[test]
    fn host_result_count_is_a_host_failure() {
        let trap = Trap::HostResultCount { expected: 1, actual: 2 };
        assert!(!trap.is_wasm_trap());
        assert_eq!(
            WasmError::new(trap, vec![]).to_string(),
            "host function returned 2 results, but its type declares 1 (recovered by flatwasm)\nwasm stack trace:"
        );
    }

    #[test]
    fn conversion_messages() {
        assert_eq!(
            Trap::InvalidConversion(ConversionFailure::NotANumber).to_string(),
            "invalid conversion to integer"
        );
        assert_eq!(
            Trap::InvalidConversion(ConversionFailure::OutOfRange).to_string(),
            "integer overflow"
        );
    }

    #[test]
    fn panic_payloads() {
        assert_eq!(Trap::from_panic(Box::new("oops")), Trap::Panic("oops".to_string()));
        assert_eq!(Trap::from_panic(Box::new(String::from("bad"))), Trap::Panic("bad".to_string()));
        assert_eq!(Trap::from_panic(Box::new(Trap::StackOverflow)), Trap::StackOverflow);
        assert_eq!(
            Trap::from_panic(Box::new(42u8)),
            Trap::Panic("panic with non-string payload".to_string())
        );
    }
}
