//! Bitwise operations (section 4.4.1.3)
//!
//! Shift and rotate counts are taken modulo the bit width.

use super::{Stack, Trap};
use crate::ir::{SignedInt, UnsignedInt};

fn int_binop(stack: &mut Stack, ty: UnsignedInt, op32: fn(u32, u32) -> u32, op64: fn(u64, u64) -> u64) -> Result<(), Trap> {
    match ty {
        UnsignedInt::I32 => {
            let c2 = stack.pop_u32()?;
            let c1 = stack.pop_u32()?;
            stack.push_u32(op32(c1, c2));
        }
        UnsignedInt::I64 => {
            let c2 = stack.pop()?;
            let c1 = stack.pop()?;
            stack.push(op64(c1, c2));
        }
    }
    Ok(())
}

pub fn and(stack: &mut Stack, ty: UnsignedInt) -> Result<(), Trap> {
    int_binop(stack, ty, |a, b| a & b, |a, b| a & b)
}

pub fn or(stack: &mut Stack, ty: UnsignedInt) -> Result<(), Trap> {
    int_binop(stack, ty, |a, b| a | b, |a, b| a | b)
}

pub fn xor(stack: &mut Stack, ty: UnsignedInt) -> Result<(), Trap> {
    int_binop(stack, ty, |a, b| a ^ b, |a, b| a ^ b)
}

/// t.shl
pub fn shl(stack: &mut Stack, ty: UnsignedInt) -> Result<(), Trap> {
    int_binop(stack, ty, |a, k| a.wrapping_shl(k), |a, k| a.wrapping_shl(k as u32))
}

/// t.shr_s / t.shr_u
pub fn shr(stack: &mut Stack, ty: SignedInt) -> Result<(), Trap> {
    match ty {
        SignedInt::Int32 => {
            let k = stack.pop_u32()?;
            let a = stack.pop_u32()? as i32;
            stack.push_u32(a.wrapping_shr(k) as u32);
        }
        SignedInt::Uint32 => {
            let k = stack.pop_u32()?;
            let a = stack.pop_u32()?;
            stack.push_u32(a.wrapping_shr(k));
        }
        SignedInt::Int64 => {
            let k = stack.pop()? as u32;
            let a = stack.pop()? as i64;
            stack.push(a.wrapping_shr(k) as u64);
        }
        SignedInt::Uint64 => {
            let k = stack.pop()? as u32;
            let a = stack.pop()?;
            stack.push(a.wrapping_shr(k));
        }
    }
    Ok(())
}

/// t.rotl
pub fn rotl(stack: &mut Stack, ty: UnsignedInt) -> Result<(), Trap> {
    int_binop(stack, ty, |a, k| a.rotate_left(k % 32), |a, k| a.rotate_left((k % 64) as u32))
}

/// t.rotr
pub fn rotr(stack: &mut Stack, ty: UnsignedInt) -> Result<(), Trap> {
    int_binop(stack, ty, |a, k| a.rotate_right(k % 32), |a, k| a.rotate_right((k % 64) as u32))
}
