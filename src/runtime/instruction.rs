//! Flat instruction set executed by the call engine
//!
//! Position in a function body is the program counter. Branch targets are
//! absolute indices into the body; [`RETURN_ADDRESS`] means "leave the
//! function". Constants of every type are stored as their 64-bit pattern.

use crate::ir::{Float, InclusiveRange, MemoryArg, SignedInt, SignedType, UnsignedInt, UnsignedType};

/// Branch address meaning "return from the current function"
pub const RETURN_ADDRESS: usize = usize::MAX;

/// A resolved branch: slots to discard, then where to continue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Jump {
    pub address: usize,
    pub drop: Option<InclusiveRange>,
}

impl Jump {
    pub fn new(address: usize, drop: Option<InclusiveRange>) -> Self {
        Jump { address, drop }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    Unreachable,
    Br { address: usize },
    BrIf { then: Jump, else_: Jump },
    BrTable { default: Jump, targets: Box<[Jump]> },
    /// Index into the module's function index space, imports first
    Call { function_index: u32 },
    CallIndirect { type_index: u32, table_index: u32 },
    Drop { range: Option<InclusiveRange> },
    Select,
    Pick { depth: u32 },
    Swap { depth: u32 },
    GlobalGet { index: u32 },
    GlobalSet { index: u32 },

    Load { ty: UnsignedType, arg: MemoryArg },
    Load8 { ty: SignedInt, arg: MemoryArg },
    Load16 { ty: SignedInt, arg: MemoryArg },
    Load32 { signed: bool, arg: MemoryArg },
    Store { ty: UnsignedType, arg: MemoryArg },
    Store8 { arg: MemoryArg },
    Store16 { arg: MemoryArg },
    Store32 { arg: MemoryArg },
    MemorySize,
    MemoryGrow,
    MemoryAtomicWait { ty: UnsignedInt, arg: MemoryArg },
    MemoryAtomicNotify { arg: MemoryArg },

    Const(u64),

    Eq(UnsignedType),
    Ne(UnsignedType),
    Eqz(UnsignedInt),
    Lt(SignedType),
    Gt(SignedType),
    Le(SignedType),
    Ge(SignedType),

    Add(UnsignedType),
    Sub(UnsignedType),
    Mul(UnsignedType),
    Clz(UnsignedInt),
    Ctz(UnsignedInt),
    Popcnt(UnsignedInt),
    Div(SignedType),
    Rem(SignedInt),
    And(UnsignedInt),
    Or(UnsignedInt),
    Xor(UnsignedInt),
    Shl(UnsignedInt),
    Shr(SignedInt),
    Rotl(UnsignedInt),
    Rotr(UnsignedInt),

    Abs(Float),
    Neg(Float),
    Ceil(Float),
    Floor(Float),
    Trunc(Float),
    Nearest(Float),
    Sqrt(Float),
    Min(Float),
    Max(Float),
    Copysign(Float),

    I32WrapFromI64,
    ITruncFromF { input: Float, output: SignedInt },
    FConvertFromI { input: SignedInt, output: Float },
    F32DemoteFromF64,
    F64PromoteFromF32,
    Extend { signed: bool },
    SignExtend32From8,
    SignExtend32From16,
    SignExtend64From8,
    SignExtend64From16,
    SignExtend64From32,
}
