//! Memory operations (section 4.4.7)
//!
//! The effective address is the i32 operand plus the static offset,
//! computed without wrapping; anything past the current size traps.

use super::{MemoryInstance, Stack, Trap};
use crate::ir::{MemoryArg, SignedInt, UnsignedInt, UnsignedType};
use crate::runtime::memory::WaitOutcome;

/// Pop the base address and add the static offset
fn effective_address(stack: &mut Stack, arg: MemoryArg) -> Result<u32, Trap> {
    let base = u64::from(stack.pop_u32()?);
    u32::try_from(base + u64::from(arg.offset)).map_err(|_| Trap::OutOfBoundsMemoryAccess)
}

fn loaded<T>(value: Option<T>) -> Result<T, Trap> {
    value.ok_or(Trap::OutOfBoundsMemoryAccess)
}

fn stored(ok: bool) -> Result<(), Trap> {
    if ok {
        Ok(())
    } else {
        Err(Trap::OutOfBoundsMemoryAccess)
    }
}

/// t.load
pub fn load(stack: &mut Stack, memory: &MemoryInstance, ty: UnsignedType, arg: MemoryArg) -> Result<(), Trap> {
    let ea = effective_address(stack, arg)?;
    match ty {
        UnsignedType::I32 | UnsignedType::F32 => {
            let v = loaded(memory.read_u32_le(ea))?;
            stack.push_u32(v);
        }
        UnsignedType::I64 | UnsignedType::F64 => {
            let v = loaded(memory.read_u64_le(ea))?;
            stack.push(v);
        }
    }
    Ok(())
}

/// t.load8_s / t.load8_u
pub fn load8(stack: &mut Stack, memory: &MemoryInstance, ty: SignedInt, arg: MemoryArg) -> Result<(), Trap> {
    let ea = effective_address(stack, arg)?;
    let v = loaded(memory.read_byte(ea))?;
    stack.push(match ty {
        SignedInt::Int32 => u64::from(v as i8 as i32 as u32),
        SignedInt::Int64 => v as i8 as i64 as u64,
        SignedInt::Uint32 | SignedInt::Uint64 => u64::from(v),
    });
    Ok(())
}

/// t.load16_s / t.load16_u
pub fn load16(stack: &mut Stack, memory: &MemoryInstance, ty: SignedInt, arg: MemoryArg) -> Result<(), Trap> {
    let ea = effective_address(stack, arg)?;
    let v = loaded(memory.read_u16_le(ea))?;
    stack.push(match ty {
        SignedInt::Int32 => u64::from(v as i16 as i32 as u32),
        SignedInt::Int64 => v as i16 as i64 as u64,
        SignedInt::Uint32 | SignedInt::Uint64 => u64::from(v),
    });
    Ok(())
}

/// i64.load32_s / i64.load32_u
pub fn load32(stack: &mut Stack, memory: &MemoryInstance, signed: bool, arg: MemoryArg) -> Result<(), Trap> {
    let ea = effective_address(stack, arg)?;
    let v = loaded(memory.read_u32_le(ea))?;
    stack.push(if signed { v as i32 as i64 as u64 } else { u64::from(v) });
    Ok(())
}

/// t.store: the value is on top, the address beneath it
pub fn store(stack: &mut Stack, memory: &MemoryInstance, ty: UnsignedType, arg: MemoryArg) -> Result<(), Trap> {
    let v = stack.pop()?;
    let ea = effective_address(stack, arg)?;
    stored(match ty {
        UnsignedType::I32 | UnsignedType::F32 => memory.write_u32_le(ea, v as u32),
        UnsignedType::I64 | UnsignedType::F64 => memory.write_u64_le(ea, v),
    })
}

pub fn store8(stack: &mut Stack, memory: &MemoryInstance, arg: MemoryArg) -> Result<(), Trap> {
    let v = stack.pop()?;
    let ea = effective_address(stack, arg)?;
    stored(memory.write_byte(ea, v as u8))
}

pub fn store16(stack: &mut Stack, memory: &MemoryInstance, arg: MemoryArg) -> Result<(), Trap> {
    let v = stack.pop()?;
    let ea = effective_address(stack, arg)?;
    stored(memory.write_u16_le(ea, v as u16))
}

pub fn store32(stack: &mut Stack, memory: &MemoryInstance, arg: MemoryArg) -> Result<(), Trap> {
    let v = stack.pop()?;
    let ea = effective_address(stack, arg)?;
    stored(memory.write_u32_le(ea, v as u32))
}

/// memory.size, in pages
pub fn size(stack: &mut Stack, memory: &MemoryInstance) -> Result<(), Trap> {
    stack.push_u32(memory.pages());
    Ok(())
}

/// memory.grow: push the previous size in pages, or -1 if the memory cannot grow
pub fn grow(stack: &mut Stack, memory: &MemoryInstance) -> Result<(), Trap> {
    let delta = stack.pop_u32()?;
    stack.push_u32(memory.grow(delta).unwrap_or(u32::MAX));
    Ok(())
}

fn atomic_address(stack: &mut Stack, memory: &MemoryInstance, arg: MemoryArg, width: u32) -> Result<u32, Trap> {
    let ea = effective_address(stack, arg)?;
    if ea % width != 0 {
        return Err(Trap::UnalignedAtomic);
    }
    if !memory.has_size(ea, u64::from(width)) {
        return Err(Trap::OutOfBoundsMemoryAccess);
    }
    Ok(ea)
}

/// memory.atomic.wait32 / memory.atomic.wait64
///
/// Operands are address, expected value and timeout in nanoseconds (negative
/// waits forever). Pushes 0 when woken, 1 when the value did not match and 2
/// on timeout.
pub fn atomic_wait(stack: &mut Stack, memory: &MemoryInstance, ty: UnsignedInt, arg: MemoryArg) -> Result<(), Trap> {
    let timeout = stack.pop()? as i64;
    let outcome = match ty {
        UnsignedInt::I32 => {
            let expected = stack.pop_u32()?;
            let ea = atomic_address(stack, memory, arg, 4)?;
            if !memory.is_shared() {
                return Err(Trap::ExpectedSharedMemory);
            }
            memory.wait32(ea, expected, timeout)
        }
        UnsignedInt::I64 => {
            let expected = stack.pop()?;
            let ea = atomic_address(stack, memory, arg, 8)?;
            if !memory.is_shared() {
                return Err(Trap::ExpectedSharedMemory);
            }
            memory.wait64(ea, expected, timeout)
        }
    };
    stack.push_u32(match outcome {
        WaitOutcome::Woken => 0,
        WaitOutcome::NotEqual => 1,
        WaitOutcome::TimedOut => 2,
        WaitOutcome::TooManyWaiters => return Err(Trap::TooManyWaiters),
    });
    Ok(())
}

/// memory.atomic.notify: push the number of waiters woken
///
/// A non-shared memory can have no waiters, so it always wakes 0.
pub fn atomic_notify(stack: &mut Stack, memory: &MemoryInstance, arg: MemoryArg) -> Result<(), Trap> {
    let count = stack.pop_u32()?;
    let ea = atomic_address(stack, memory, arg, 4)?;
    let woken = if memory.is_shared() { memory.notify(ea, count) } else { 0 };
    stack.push_u32(woken);
    Ok(())
}
