//! Operation set of the structured IR

use std::fmt;

/// Integer and float types where signedness is irrelevant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnsignedType {
    I32,
    I64,
    F32,
    F64,
}

/// Types where comparisons and division depend on signedness
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignedType {
    Int32,
    Uint32,
    Int64,
    Uint64,
    Float32,
    Float64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignedInt {
    Int32,
    Int64,
    Uint32,
    Uint64,
}

impl SignedInt {
    pub fn is_signed(self) -> bool {
        matches!(self, SignedInt::Int32 | SignedInt::Int64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnsignedInt {
    I32,
    I64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Float {
    F32,
    F64,
}

/// Static immediate of a load or store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MemoryArg {
    /// Alignment hint as a power of two
    pub alignment: u32,
    pub offset: u32,
}

impl MemoryArg {
    pub fn new(alignment: u32, offset: u32) -> Self {
        MemoryArg { alignment, offset }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LabelKind {
    /// Start of a block body; loops branch here
    Header,
    /// Start of the else arm of an if
    Else,
    /// Instruction following the end of a block
    Continuation,
}

/// A branch target, unique within one function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Label {
    pub frame_id: u32,
    pub kind: LabelKind,
}

impl Label {
    pub fn new(frame_id: u32, kind: LabelKind) -> Self {
        Label { frame_id, kind }
    }

    pub fn header(frame_id: u32) -> Self {
        Label::new(frame_id, LabelKind::Header)
    }

    pub fn else_(frame_id: u32) -> Self {
        Label::new(frame_id, LabelKind::Else)
    }

    pub fn continuation(frame_id: u32) -> Self {
        Label::new(frame_id, LabelKind::Continuation)
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.kind {
            LabelKind::Header => write!(f, ".L{}", self.frame_id),
            LabelKind::Else => write!(f, ".L{}_else", self.frame_id),
            LabelKind::Continuation => write!(f, ".L{}_cont", self.frame_id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BranchTarget {
    Label(Label),
    /// Leave the function
    Return,
}

impl fmt::Display for BranchTarget {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            BranchTarget::Label(label) => label.fmt(f),
            BranchTarget::Return => f.write_str(".return"),
        }
    }
}

/// A span of stack slots counted from the top (0 is the top), both ends inclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InclusiveRange {
    pub start: u32,
    pub end: u32,
}

impl InclusiveRange {
    pub fn new(start: u32, end: u32) -> Self {
        InclusiveRange { start, end }
    }
}

/// Branch target plus the stack slots to discard before jumping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BranchTargetDrop {
    pub target: BranchTarget,
    pub to_drop: Option<InclusiveRange>,
}

impl BranchTargetDrop {
    pub fn new(target: BranchTarget, to_drop: Option<InclusiveRange>) -> Self {
        BranchTargetDrop { target, to_drop }
    }

    pub fn label(label: Label) -> Self {
        BranchTargetDrop::new(BranchTarget::Label(label), None)
    }

    pub fn ret() -> Self {
        BranchTargetDrop::new(BranchTarget::Return, None)
    }

    pub fn with_drop(mut self, range: InclusiveRange) -> Self {
        self.to_drop = Some(range);
        self
    }
}

/// One structured operation
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Unreachable,
    Label(Label),
    Br { target: BranchTarget },
    BrIf { then: BranchTargetDrop, else_: BranchTargetDrop },
    BrTable { targets: Vec<BranchTargetDrop>, default: BranchTargetDrop },
    Call { function_index: u32 },
    CallIndirect { type_index: u32, table_index: u32 },
    Drop { depth: Option<InclusiveRange> },
    Select,
    /// Duplicate the value `depth` slots below the top
    Pick { depth: u32 },
    /// Exchange the top with the value `depth` slots below it
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
    /// `memory.atomic.wait32` / `memory.atomic.wait64`
    MemoryAtomicWait { ty: UnsignedInt, arg: MemoryArg },
    MemoryAtomicNotify { arg: MemoryArg },

    ConstI32(u32),
    ConstI64(u64),
    ConstF32(f32),
    ConstF64(f64),

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
    I32ReinterpretFromF32,
    I64ReinterpretFromF64,
    F32ReinterpretFromI32,
    F64ReinterpretFromI64,
    /// `i64.extend_i32_s` / `i64.extend_i32_u`
    Extend { signed: bool },
    SignExtend32From8,
    SignExtend32From16,
    SignExtend64From8,
    SignExtend64From16,
    SignExtend64From32,
}

impl Operation {
    /// Text-format style name, used in diagnostics
    pub fn name(&self) -> &'static str {
        use Operation::*;
        match self {
            Unreachable => "unreachable",
            Label(_) => "label",
            Br { .. } => "br",
            BrIf { .. } => "br_if",
            BrTable { .. } => "br_table",
            Call { .. } => "call",
            CallIndirect { .. } => "call_indirect",
            Drop { .. } => "drop",
            Select => "select",
            Pick { .. } => "pick",
            Swap { .. } => "swap",
            GlobalGet { .. } => "global.get",
            GlobalSet { .. } => "global.set",
            Load { .. } => "load",
            Load8 { .. } => "load8",
            Load16 { .. } => "load16",
            Load32 { .. } => "load32",
            Store { .. } => "store",
            Store8 { .. } => "store8",
            Store16 { .. } => "store16",
            Store32 { .. } => "store32",
            MemorySize => "memory.size",
            MemoryGrow => "memory.grow",
            MemoryAtomicWait { ty: UnsignedInt::I32, .. } => "memory.atomic.wait32",
            MemoryAtomicWait { ty: UnsignedInt::I64, .. } => "memory.atomic.wait64",
            MemoryAtomicNotify { .. } => "memory.atomic.notify",
            ConstI32(_) => "i32.const",
            ConstI64(_) => "i64.const",
            ConstF32(_) => "f32.const",
            ConstF64(_) => "f64.const",
            Eq(_) => "eq",
            Ne(_) => "ne",
            Eqz(_) => "eqz",
            Lt(_) => "lt",
            Gt(_) => "gt",
            Le(_) => "le",
            Ge(_) => "ge",
            Add(_) => "add",
            Sub(_) => "sub",
            Mul(_) => "mul",
            Clz(_) => "clz",
            Ctz(_) => "ctz",
            Popcnt(_) => "popcnt",
            Div(_) => "div",
            Rem(_) => "rem",
            And(_) => "and",
            Or(_) => "or",
            Xor(_) => "xor",
            Shl(_) => "shl",
            Shr(_) => "shr",
            Rotl(_) => "rotl",
            Rotr(_) => "rotr",
            Abs(_) => "abs",
            Neg(_) => "neg",
            Ceil(_) => "ceil",
            Floor(_) => "floor",
            Trunc(_) => "trunc",
            Nearest(_) => "nearest",
            Sqrt(_) => "sqrt",
            Min(_) => "min",
            Max(_) => "max",
            Copysign(_) => "copysign",
            I32WrapFromI64 => "i32.wrap_i64",
            ITruncFromF { .. } => "trunc_from_f",
            FConvertFromI { .. } => "convert_from_i",
            F32DemoteFromF64 => "f32.demote_f64",
            F64PromoteFromF32 => "f64.promote_f32",
            I32ReinterpretFromF32 => "i32.reinterpret_f32",
            I64ReinterpretFromF64 => "i64.reinterpret_f64",
            F32ReinterpretFromI32 => "f32.reinterpret_i32",
            F64ReinterpretFromI64 => "f64.reinterpret_i64",
            Extend { signed: true } => "i64.extend_i32_s",
            Extend { signed: false } => "i64.extend_i32_u",
            SignExtend32From8 => "i32.extend8_s",
            SignExtend32From16 => "i32.extend16_s",
            SignExtend64From8 => "i64.extend8_s",
            SignExtend64From16 => "i64.extend16_s",
            SignExtend64From32 => "i64.extend32_s",
        }
    }
}
