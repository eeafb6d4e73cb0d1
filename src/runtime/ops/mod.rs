//! Instruction semantics, organized by category as in the WebAssembly
//! core document (section 4.4).
//!
//! Each function pops its operands from the [`Stack`], pushes its result and
//! reports a [`Trap`] when the instruction traps. The type tag carried by the
//! instruction selects the width and signedness.

pub mod bitwise;
pub mod comparison;
pub mod conversion;
pub mod memory;
pub mod numeric;
pub mod parametric;

pub(crate) use crate::runtime::memory::MemoryInstance;
pub(crate) use crate::runtime::stack::Stack;
pub(crate) use crate::runtime::Trap;
