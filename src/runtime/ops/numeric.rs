//! Numeric operations (section 4.4.1)
//!
//! - Integer binary operations: add, sub, mul, div, rem
//! - Integer unary operations: clz, ctz, popcnt
//! - Float unary operations: abs, neg, ceil, floor, trunc, nearest, sqrt
//! - Float binary operations: min, max, copysign
//!
//! Integer arithmetic wraps modulo 2^N. Float arithmetic follows IEEE 754
//! with round-to-nearest; NaN payloads are not canonicalized.

use super::{Stack, Trap};
use crate::ir::{Float, SignedInt, SignedType, UnsignedInt, UnsignedType};

const F32_SIGN: u32 = 0x8000_0000;
const F64_SIGN: u64 = 0x8000_0000_0000_0000;

macro_rules! binop {
    ($stack:expr, $ty:expr, $int32:expr, $int64:expr, $f32:expr, $f64:expr) => {{
        match $ty {
            UnsignedType::I32 => {
                let c2 = $stack.pop_u32()?;
                let c1 = $stack.pop_u32()?;
                $stack.push_u32($int32(c1, c2));
            }
            UnsignedType::I64 => {
                let c2 = $stack.pop()?;
                let c1 = $stack.pop()?;
                $stack.push($int64(c1, c2));
            }
            UnsignedType::F32 => {
                let c2 = $stack.pop_f32()?;
                let c1 = $stack.pop_f32()?;
                $stack.push_f32($f32(c1, c2));
            }
            UnsignedType::F64 => {
                let c2 = $stack.pop_f64()?;
                let c1 = $stack.pop_f64()?;
                $stack.push_f64($f64(c1, c2));
            }
        }
        Ok(())
    }};
}

/// t.add
pub fn add(stack: &mut Stack, ty: UnsignedType) -> Result<(), Trap> {
    binop!(stack, ty, u32::wrapping_add, u64::wrapping_add, |a: f32, b| a + b, |a: f64, b| a + b)
}

/// t.sub
pub fn sub(stack: &mut Stack, ty: UnsignedType) -> Result<(), Trap> {
    binop!(stack, ty, u32::wrapping_sub, u64::wrapping_sub, |a: f32, b| a - b, |a: f64, b| a - b)
}

/// t.mul
pub fn mul(stack: &mut Stack, ty: UnsignedType) -> Result<(), Trap> {
    binop!(stack, ty, u32::wrapping_mul, u64::wrapping_mul, |a: f32, b| a * b, |a: f64, b| a * b)
}

/// i32.clz / i64.clz
pub fn clz(stack: &mut Stack, ty: UnsignedInt) -> Result<(), Trap> {
    match ty {
        UnsignedInt::I32 => {
            let v = stack.pop_u32()?;
            stack.push_u32(v.leading_zeros());
        }
        UnsignedInt::I64 => {
            let v = stack.pop()?;
            stack.push(u64::from(v.leading_zeros()));
        }
    }
    Ok(())
}

/// i32.ctz / i64.ctz
pub fn ctz(stack: &mut Stack, ty: UnsignedInt) -> Result<(), Trap> {
    match ty {
        UnsignedInt::I32 => {
            let v = stack.pop_u32()?;
            stack.push_u32(v.trailing_zeros());
        }
        UnsignedInt::I64 => {
            let v = stack.pop()?;
            stack.push(u64::from(v.trailing_zeros()));
        }
    }
    Ok(())
}

/// i32.popcnt / i64.popcnt
pub fn popcnt(stack: &mut Stack, ty: UnsignedInt) -> Result<(), Trap> {
    match ty {
        UnsignedInt::I32 => {
            let v = stack.pop_u32()?;
            stack.push_u32(v.count_ones());
        }
        UnsignedInt::I64 => {
            let v = stack.pop()?;
            stack.push(u64::from(v.count_ones()));
        }
    }
    Ok(())
}

/// t.div_s / t.div_u / f.div
///
/// 1. Pop c2, then c1
/// 2. Integer division traps if c2 is 0
/// 3. Signed division traps if c1 is MIN and c2 is -1 (the quotient is unrepresentable)
/// 4. Push c1 / c2, truncated toward zero for integers
pub fn div(stack: &mut Stack, ty: SignedType) -> Result<(), Trap> {
    match ty {
        SignedType::Int32 => {
            let c2 = stack.pop_u32()? as i32;
            let c1 = stack.pop_u32()? as i32;
            if c2 == 0 {
                return Err(Trap::IntegerDivideByZero);
            }
            if c1 == i32::MIN && c2 == -1 {
                return Err(Trap::IntegerOverflow);
            }
            stack.push_u32((c1 / c2) as u32);
        }
        SignedType::Uint32 => {
            let c2 = stack.pop_u32()?;
            let c1 = stack.pop_u32()?;
            if c2 == 0 {
                return Err(Trap::IntegerDivideByZero);
            }
            stack.push_u32(c1 / c2);
        }
        SignedType::Int64 => {
            let c2 = stack.pop()? as i64;
            let c1 = stack.pop()? as i64;
            if c2 == 0 {
                return Err(Trap::IntegerDivideByZero);
            }
            if c1 == i64::MIN && c2 == -1 {
                return Err(Trap::IntegerOverflow);
            }
            stack.push((c1 / c2) as u64);
        }
        SignedType::Uint64 => {
            let c2 = stack.pop()?;
            let c1 = stack.pop()?;
            if c2 == 0 {
                return Err(Trap::IntegerDivideByZero);
            }
            stack.push(c1 / c2);
        }
        SignedType::Float32 => {
            let c2 = stack.pop_f32()?;
            let c1 = stack.pop_f32()?;
            stack.push_f32(c1 / c2);
        }
        SignedType::Float64 => {
            let c2 = stack.pop_f64()?;
            let c1 = stack.pop_f64()?;
            stack.push_f64(c1 / c2);
        }
    }
    Ok(())
}

/// t.rem_s / t.rem_u
///
/// Traps if c2 is 0. MIN rem -1 is 0 rather than a trap.
pub fn rem(stack: &mut Stack, ty: SignedInt) -> Result<(), Trap> {
    match ty {
        SignedInt::Int32 => {
            let c2 = stack.pop_u32()? as i32;
            let c1 = stack.pop_u32()? as i32;
            if c2 == 0 {
                return Err(Trap::IntegerDivideByZero);
            }
            stack.push_u32(c1.wrapping_rem(c2) as u32);
        }
        SignedInt::Uint32 => {
            let c2 = stack.pop_u32()?;
            let c1 = stack.pop_u32()?;
            if c2 == 0 {
                return Err(Trap::IntegerDivideByZero);
            }
            stack.push_u32(c1 % c2);
        }
        SignedInt::Int64 => {
            let c2 = stack.pop()? as i64;
            let c1 = stack.pop()? as i64;
            if c2 == 0 {
                return Err(Trap::IntegerDivideByZero);
            }
            stack.push(c1.wrapping_rem(c2) as u64);
        }
        SignedInt::Uint64 => {
            let c2 = stack.pop()?;
            let c1 = stack.pop()?;
            if c2 == 0 {
                return Err(Trap::IntegerDivideByZero);
            }
            stack.push(c1 % c2);
        }
    }
    Ok(())
}

fn unop(stack: &mut Stack, ty: Float, f32_op: fn(f32) -> f32, f64_op: fn(f64) -> f64) -> Result<(), Trap> {
    match ty {
        Float::F32 => {
            let v = stack.pop_f32()?;
            stack.push_f32(f32_op(v));
        }
        Float::F64 => {
            let v = stack.pop_f64()?;
            stack.push_f64(f64_op(v));
        }
    }
    Ok(())
}

/// f.abs clears the sign bit, leaving NaN payloads intact
pub fn abs(stack: &mut Stack, ty: Float) -> Result<(), Trap> {
    match ty {
        Float::F32 => {
            let bits = stack.pop_u32()?;
            stack.push_u32(bits & !F32_SIGN);
        }
        Float::F64 => {
            let bits = stack.pop()?;
            stack.push(bits & !F64_SIGN);
        }
    }
    Ok(())
}

/// f.neg flips the sign bit
pub fn neg(stack: &mut Stack, ty: Float) -> Result<(), Trap> {
    match ty {
        Float::F32 => {
            let bits = stack.pop_u32()?;
            stack.push_u32(bits ^ F32_SIGN);
        }
        Float::F64 => {
            let bits = stack.pop()?;
            stack.push(bits ^ F64_SIGN);
        }
    }
    Ok(())
}

pub fn ceil(stack: &mut Stack, ty: Float) -> Result<(), Trap> {
    unop(stack, ty, f32::ceil, f64::ceil)
}

pub fn floor(stack: &mut Stack, ty: Float) -> Result<(), Trap> {
    unop(stack, ty, f32::floor, f64::floor)
}

pub fn trunc(stack: &mut Stack, ty: Float) -> Result<(), Trap> {
    unop(stack, ty, f32::trunc, f64::trunc)
}

/// f.nearest rounds half to even
pub fn nearest(stack: &mut Stack, ty: Float) -> Result<(), Trap> {
    unop(stack, ty, f32::round_ties_even, f64::round_ties_even)
}

pub fn sqrt(stack: &mut Stack, ty: Float) -> Result<(), Trap> {
    unop(stack, ty, f32::sqrt, f64::sqrt)
}

macro_rules! wasm_min_max {
    ($min:ident, $max:ident, $t:ty) => {
        /// NaN if either operand is NaN; -0.0 is less than +0.0
        fn $min(a: $t, b: $t) -> $t {
            if a.is_nan() || b.is_nan() {
                <$t>::NAN
            } else if a == b {
                // equal values can only differ in the sign of zero
                if a.is_sign_negative() {
                    a
                } else {
                    b
                }
            } else if a < b {
                a
            } else {
                b
            }
        }

        fn $max(a: $t, b: $t) -> $t {
            if a.is_nan() || b.is_nan() {
                <$t>::NAN
            } else if a == b {
                if a.is_sign_positive() {
                    a
                } else {
                    b
                }
            } else if a > b {
                a
            } else {
                b
            }
        }
    };
}

wasm_min_max!(min_f32, max_f32, f32);
wasm_min_max!(min_f64, max_f64, f64);

fn float_binop(stack: &mut Stack, ty: Float, f32_op: fn(f32, f32) -> f32, f64_op: fn(f64, f64) -> f64) -> Result<(), Trap> {
    match ty {
        Float::F32 => {
            let c2 = stack.pop_f32()?;
            let c1 = stack.pop_f32()?;
            stack.push_f32(f32_op(c1, c2));
        }
        Float::F64 => {
            let c2 = stack.pop_f64()?;
            let c1 = stack.pop_f64()?;
            stack.push_f64(f64_op(c1, c2));
        }
    }
    Ok(())
}

pub fn min(stack: &mut Stack, ty: Float) -> Result<(), Trap> {
    float_binop(stack, ty, min_f32, min_f64)
}

pub fn max(stack: &mut Stack, ty: Float) -> Result<(), Trap> {
    float_binop(stack, ty, max_f32, max_f64)
}

/// f.copysign: magnitude of c1 with the sign of c2
pub fn copysign(stack: &mut Stack, ty: Float) -> Result<(), Trap> {
    match ty {
        Float::F32 => {
            let c2 = stack.pop_u32()?;
            let c1 = stack.pop_u32()?;
            stack.push_u32((c1 & !F32_SIGN) | (c2 & F32_SIGN));
        }
        Float::F64 => {
            let c2 = stack.pop()?;
            let c1 = stack.pop()?;
            stack.push((c1 & !F64_SIGN) | (c2 & F64_SIGN));
        }
    }
    Ok(())
}
