//! Conversion operations (section 4.4.1.6)
//!
//! Reinterpretations never reach here; lowering elides them since values are
//! already untyped words.

use super::{Stack, Trap};
use crate::ir::{Float, SignedInt};
use crate::runtime::ConversionFailure;

/// i32.wrap_i64
pub fn i32_wrap_i64(stack: &mut Stack) -> Result<(), Trap> {
    let v = stack.pop()?;
    stack.push_u32(v as u32);
    Ok(())
}

/// i64.extend_i32_s / i64.extend_i32_u
pub fn i64_extend_i32(stack: &mut Stack, signed: bool) -> Result<(), Trap> {
    let v = stack.pop_u32()?;
    if signed {
        stack.push(v as i32 as i64 as u64);
    } else {
        stack.push(u64::from(v));
    }
    Ok(())
}

/// t.trunc_f: float to integer, truncating toward zero
///
/// 1. Pop a float and widen it to f64 (exact for f32)
/// 2. NaN traps as an invalid conversion
/// 3. A truncated value outside the target range traps as integer overflow
/// 4. Push the truncated integer
pub fn trunc_from_float(stack: &mut Stack, input: Float, output: SignedInt) -> Result<(), Trap> {
    let v = match input {
        Float::F32 => f64::from(stack.pop_f32()?),
        Float::F64 => stack.pop_f64()?,
    };
    if v.is_nan() {
        return Err(Trap::InvalidConversion(ConversionFailure::NotANumber));
    }

    let t = v.trunc();
    // Upper bounds for the 64-bit targets are exclusive: 2^63 and 2^64 are exact doubles.
    let out_of_range = match output {
        SignedInt::Int32 => t < -2147483648.0 || t > 2147483647.0,
        SignedInt::Uint32 => t < 0.0 || t > 4294967295.0,
        SignedInt::Int64 => t < -9223372036854775808.0 || t >= 9223372036854775808.0,
        SignedInt::Uint64 => t < 0.0 || t >= 18446744073709551616.0,
    };
    if out_of_range {
        return Err(Trap::InvalidConversion(ConversionFailure::OutOfRange));
    }

    match output {
        SignedInt::Int32 => stack.push_u32(t as i32 as u32),
        SignedInt::Uint32 => stack.push_u32(t as u32),
        SignedInt::Int64 => stack.push(t as i64 as u64),
        SignedInt::Uint64 => stack.push(t as u64),
    }
    Ok(())
}

/// f.convert_i: integer to float, rounding to nearest
pub fn convert_from_int(stack: &mut Stack, input: SignedInt, output: Float) -> Result<(), Trap> {
    macro_rules! convert {
        ($v:expr) => {{
            let v = $v;
            match output {
                Float::F32 => stack.push_f32(v as f32),
                Float::F64 => stack.push_f64(v as f64),
            }
        }};
    }
    match input {
        SignedInt::Int32 => convert!(stack.pop_u32()? as i32),
        SignedInt::Uint32 => convert!(stack.pop_u32()?),
        SignedInt::Int64 => convert!(stack.pop()? as i64),
        SignedInt::Uint64 => convert!(stack.pop()?),
    }
    Ok(())
}

/// f32.demote_f64
pub fn f32_demote_f64(stack: &mut Stack) -> Result<(), Trap> {
    let v = stack.pop_f64()?;
    stack.push_f32(v as f32);
    Ok(())
}

/// f64.promote_f32
pub fn f64_promote_f32(stack: &mut Stack) -> Result<(), Trap> {
    let v = stack.pop_f32()?;
    stack.push_f64(f64::from(v));
    Ok(())
}

pub fn i32_extend8_s(stack: &mut Stack) -> Result<(), Trap> {
    let v = stack.pop_u32()?;
    stack.push_u32(v as i8 as i32 as u32);
    Ok(())
}

pub fn i32_extend16_s(stack: &mut Stack) -> Result<(), Trap> {
    let v = stack.pop_u32()?;
    stack.push_u32(v as i16 as i32 as u32);
    Ok(())
}

pub fn i64_extend8_s(stack: &mut Stack) -> Result<(), Trap> {
    let v = stack.pop()?;
    stack.push(v as i8 as i64 as u64);
    Ok(())
}

pub fn i64_extend16_s(stack: &mut Stack) -> Result<(), Trap> {
    let v = stack.pop()?;
    stack.push(v as i16 as i64 as u64);
    Ok(())
}

pub fn i64_extend32_s(stack: &mut Stack) -> Result<(), Trap> {
    let v = stack.pop()?;
    stack.push(v as i32 as i64 as u64);
    Ok(())
}
