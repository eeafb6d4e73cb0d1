//! Lowering from structured operations to flat instructions
//!
//! Labels emit nothing; each records the current body length as its address.
//! A branch to a label that has not been seen yet is emitted with a
//! placeholder address and queued as a patch against that label, applied
//! once the label appears. Anything still queued at the end of the body is a
//! compilation error.

use super::instruction::{Instruction, Jump, RETURN_ADDRESS};
use super::CompilationError;
use crate::config::Features;
use crate::ir::{BranchTarget, BranchTargetDrop, Label, Operation};
use std::collections::HashMap;

/// Which address inside an instruction a pending patch fills
///
/// `BrIf`: 0 is then, 1 is else. `BrTable`: 0 is the default, `n` is target `n - 1`.
#[derive(Debug, Clone, Copy)]
struct Patch {
    at: usize,
    slot: usize,
}

#[derive(Default)]
struct Lowering {
    body: Vec<Instruction>,
    addresses: HashMap<Label, usize>,
    pending: HashMap<Label, Vec<Patch>>,
}

impl Lowering {
    /// Address of `target` for slot `slot` of the instruction about to be emitted
    fn address(&mut self, target: BranchTarget, slot: usize) -> usize {
        let label = match target {
            BranchTarget::Return => return RETURN_ADDRESS,
            BranchTarget::Label(label) => label,
        };
        if let Some(&address) = self.addresses.get(&label) {
            return address;
        }
        let at = self.body.len();
        self.pending.entry(label).or_default().push(Patch { at, slot });
        0
    }

    fn jump(&mut self, target: &BranchTargetDrop, slot: usize) -> Jump {
        Jump::new(self.address(target.target, slot), target.to_drop)
    }

    fn define(&mut self, label: Label) {
        let address = self.body.len();
        self.addresses.insert(label, address);
        for Patch { at, slot } in self.pending.remove(&label).unwrap_or_default() {
            if let Some(instruction) = self.body.get_mut(at) {
                patch(instruction, slot, address);
            }
        }
    }

    fn finish(self) -> Result<Vec<Instruction>, CompilationError> {
        if !self.pending.is_empty() {
            let mut labels: Vec<_> = self.pending.keys().copied().collect();
            labels.sort();
            let names: Vec<_> = labels.iter().map(ToString::to_string).collect();
            return Err(CompilationError::UndefinedLabels(names.join(",")));
        }
        Ok(self.body)
    }
}

fn patch(instruction: &mut Instruction, slot: usize, address: usize) {
    match instruction {
        Instruction::Br { address: a } => *a = address,
        Instruction::BrIf { then, else_ } => {
            if slot == 0 {
                then.address = address;
            } else {
                else_.address = address;
            }
        }
        Instruction::BrTable { default, targets } => match slot {
            0 => default.address = address,
            n => {
                if let Some(jump) = targets.get_mut(n - 1) {
                    jump.address = address;
                }
            }
        },
        _ => {}
    }
}

fn require(features: Features, feature: Features, op: &Operation) -> Result<(), CompilationError> {
    if features.contains(feature) {
        return Ok(());
    }
    Err(CompilationError::FeatureDisabled {
        construct: op.name().to_string(),
        feature: feature.feature_name(),
    })
}

/// Lower one function body
pub fn lower(operations: &[Operation], features: Features) -> Result<Vec<Instruction>, CompilationError> {
    use Operation as Op;

    let mut lowering = Lowering::default();
    lowering.body.reserve(operations.len());

    for op in operations {
        let instruction = match *op {
            Op::Label(label) => {
                lowering.define(label);
                continue;
            }
            // Values are untyped words, so reinterpretation is a no-op.
            Op::I32ReinterpretFromF32
            | Op::I64ReinterpretFromF64
            | Op::F32ReinterpretFromI32
            | Op::F64ReinterpretFromI64 => continue,

            Op::Unreachable => Instruction::Unreachable,
            Op::Br { target } => Instruction::Br {
                address: lowering.address(target, 0),
            },
            Op::BrIf { ref then, ref else_ } => Instruction::BrIf {
                then: lowering.jump(then, 0),
                else_: lowering.jump(else_, 1),
            },
            Op::BrTable { ref targets, ref default } => {
                let default = lowering.jump(default, 0);
                let targets = targets
                    .iter()
                    .enumerate()
                    .map(|(i, target)| lowering.jump(target, i + 1))
                    .collect();
                Instruction::BrTable { default, targets }
            }
            Op::Call { function_index } => Instruction::Call { function_index },
            Op::CallIndirect { type_index, table_index } => Instruction::CallIndirect { type_index, table_index },
            Op::Drop { depth } => Instruction::Drop { range: depth },
            Op::Select => Instruction::Select,
            Op::Pick { depth } => Instruction::Pick { depth },
            Op::Swap { depth } => Instruction::Swap { depth },
            Op::GlobalGet { index } => Instruction::GlobalGet { index },
            Op::GlobalSet { index } => Instruction::GlobalSet { index },

            Op::Load { ty, arg } => Instruction::Load { ty, arg },
            Op::Load8 { ty, arg } => Instruction::Load8 { ty, arg },
            Op::Load16 { ty, arg } => Instruction::Load16 { ty, arg },
            Op::Load32 { signed, arg } => Instruction::Load32 { signed, arg },
            Op::Store { ty, arg } => Instruction::Store { ty, arg },
            Op::Store8 { arg } => Instruction::Store8 { arg },
            Op::Store16 { arg } => Instruction::Store16 { arg },
            Op::Store32 { arg } => Instruction::Store32 { arg },
            Op::MemorySize => Instruction::MemorySize,
            Op::MemoryGrow => Instruction::MemoryGrow,
            Op::MemoryAtomicWait { ty, arg } => {
                require(features, Features::THREADS, op)?;
                Instruction::MemoryAtomicWait { ty, arg }
            }
            Op::MemoryAtomicNotify { arg } => {
                require(features, Features::THREADS, op)?;
                Instruction::MemoryAtomicNotify { arg }
            }

            Op::ConstI32(v) => Instruction::Const(u64::from(v)),
            Op::ConstI64(v) => Instruction::Const(v),
            Op::ConstF32(v) => Instruction::Const(u64::from(v.to_bits())),
            Op::ConstF64(v) => Instruction::Const(v.to_bits()),

            Op::Eq(t) => Instruction::Eq(t),
            Op::Ne(t) => Instruction::Ne(t),
            Op::Eqz(t) => Instruction::Eqz(t),
            Op::Lt(t) => Instruction::Lt(t),
            Op::Gt(t) => Instruction::Gt(t),
            Op::Le(t) => Instruction::Le(t),
            Op::Ge(t) => Instruction::Ge(t),

            Op::Add(t) => Instruction::Add(t),
            Op::Sub(t) => Instruction::Sub(t),
            Op::Mul(t) => Instruction::Mul(t),
            Op::Clz(t) => Instruction::Clz(t),
            Op::Ctz(t) => Instruction::Ctz(t),
            Op::Popcnt(t) => Instruction::Popcnt(t),
            Op::Div(t) => Instruction::Div(t),
            Op::Rem(t) => Instruction::Rem(t),
            Op::And(t) => Instruction::And(t),
            Op::Or(t) => Instruction::Or(t),
            Op::Xor(t) => Instruction::Xor(t),
            Op::Shl(t) => Instruction::Shl(t),
            Op::Shr(t) => Instruction::Shr(t),
            Op::Rotl(t) => Instruction::Rotl(t),
            Op::Rotr(t) => Instruction::Rotr(t),

            Op::Abs(t) => Instruction::Abs(t),
            Op::Neg(t) => Instruction::Neg(t),
            Op::Ceil(t) => Instruction::Ceil(t),
            Op::Floor(t) => Instruction::Floor(t),
            Op::Trunc(t) => Instruction::Trunc(t),
            Op::Nearest(t) => Instruction::Nearest(t),
            Op::Sqrt(t) => Instruction::Sqrt(t),
            Op::Min(t) => Instruction::Min(t),
            Op::Max(t) => Instruction::Max(t),
            Op::Copysign(t) => Instruction::Copysign(t),

            Op::I32WrapFromI64 => Instruction::I32WrapFromI64,
            Op::ITruncFromF { input, output } => Instruction::ITruncFromF { input, output },
            Op::FConvertFromI { input, output } => Instruction::FConvertFromI { input, output },
            Op::F32DemoteFromF64 => Instruction::F32DemoteFromF64,
            Op::F64PromoteFromF32 => Instruction::F64PromoteFromF32,
            Op::Extend { signed } => Instruction::Extend { signed },
            Op::SignExtend32From8
            | Op::SignExtend32From16
            | Op::SignExtend64From8
            | Op::SignExtend64From16
            | Op::SignExtend64From32 => {
                require(features, Features::SIGN_EXTENSION_OPS, op)?;
                match op {
                    Op::SignExtend32From8 => Instruction::SignExtend32From8,
                    Op::SignExtend32From16 => Instruction::SignExtend32From16,
                    Op::SignExtend64From8 => Instruction::SignExtend64From8,
                    Op::SignExtend64From16 => Instruction::SignExtend64From16,
                    _ => Instruction::SignExtend64From32,
                }
            }
        };
        lowering.body.push(instruction);
    }

    lowering.finish()
}
