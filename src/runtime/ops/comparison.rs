//! Comparison and test operations (section 4.4.1.4, 4.4.1.5)
//!
//! Every comparison pushes an i32: 1 if true, 0 if false. Any comparison
//! involving NaN is false except `ne`.

use super::{Stack, Trap};
use crate::ir::{SignedType, UnsignedInt, UnsignedType};
use std::cmp::Ordering;

pub fn eq(stack: &mut Stack, ty: UnsignedType) -> Result<(), Trap> {
    let result = match ty {
        UnsignedType::I32 => stack.pop_u32()? == stack.pop_u32()?,
        UnsignedType::I64 => stack.pop()? == stack.pop()?,
        UnsignedType::F32 => stack.pop_f32()? == stack.pop_f32()?,
        UnsignedType::F64 => stack.pop_f64()? == stack.pop_f64()?,
    };
    stack.push_bool(result);
    Ok(())
}

pub fn ne(stack: &mut Stack, ty: UnsignedType) -> Result<(), Trap> {
    let result = match ty {
        UnsignedType::I32 => stack.pop_u32()? != stack.pop_u32()?,
        UnsignedType::I64 => stack.pop()? != stack.pop()?,
        UnsignedType::F32 => stack.pop_f32()? != stack.pop_f32()?,
        UnsignedType::F64 => stack.pop_f64()? != stack.pop_f64()?,
    };
    stack.push_bool(result);
    Ok(())
}

/// i32.eqz / i64.eqz
pub fn eqz(stack: &mut Stack, ty: UnsignedInt) -> Result<(), Trap> {
    let result = match ty {
        UnsignedInt::I32 => stack.pop_u32()? == 0,
        UnsignedInt::I64 => stack.pop()? == 0,
    };
    stack.push_bool(result);
    Ok(())
}

/// Pop c2 then c1 and order c1 relative to c2; `None` when either is NaN
fn compare(stack: &mut Stack, ty: SignedType) -> Result<Option<Ordering>, Trap> {
    Ok(match ty {
        SignedType::Int32 => {
            let c2 = stack.pop_u32()? as i32;
            let c1 = stack.pop_u32()? as i32;
            Some(c1.cmp(&c2))
        }
        SignedType::Uint32 => {
            let c2 = stack.pop_u32()?;
            let c1 = stack.pop_u32()?;
            Some(c1.cmp(&c2))
        }
        SignedType::Int64 => {
            let c2 = stack.pop()? as i64;
            let c1 = stack.pop()? as i64;
            Some(c1.cmp(&c2))
        }
        SignedType::Uint64 => {
            let c2 = stack.pop()?;
            let c1 = stack.pop()?;
            Some(c1.cmp(&c2))
        }
        SignedType::Float32 => {
            let c2 = stack.pop_f32()?;
            let c1 = stack.pop_f32()?;
            c1.partial_cmp(&c2)
        }
        SignedType::Float64 => {
            let c2 = stack.pop_f64()?;
            let c1 = stack.pop_f64()?;
            c1.partial_cmp(&c2)
        }
    })
}

pub fn lt(stack: &mut Stack, ty: SignedType) -> Result<(), Trap> {
    let ordering = compare(stack, ty)?;
    stack.push_bool(ordering == Some(Ordering::Less));
    Ok(())
}

pub fn gt(stack: &mut Stack, ty: SignedType) -> Result<(), Trap> {
    let ordering = compare(stack, ty)?;
    stack.push_bool(ordering == Some(Ordering::Greater));
    Ok(())
}

pub fn le(stack: &mut Stack, ty: SignedType) -> Result<(), Trap> {
    let ordering = compare(stack, ty)?;
    stack.push_bool(matches!(ordering, Some(Ordering::Less | Ordering::Equal)));
    Ok(())
}

pub fn ge(stack: &mut Stack, ty: SignedType) -> Result<(), Trap> {
    let ordering = compare(stack, ty)?;
    stack.push_bool(matches!(ordering, Some(Ordering::Greater | Ordering::Equal)));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(values: &[u64], f: impl FnOnce(&mut Stack) -> Result<(), Trap>) -> u64 {
        let mut stack = Stack::new();
        stack.push_all(values.iter().copied());
        f(&mut stack).unwrap();
        stack.pop().unwrap()
    }

    #[test]
    fn signed_and_unsigned_ordering() {
        let minus_one = u64::from(u32::MAX);
        assert_eq!(run(&[minus_one, 1], |s| lt(s, SignedType::Int32)), 1);
        assert_eq!(run(&[minus_one, 1], |s| lt(s, SignedType::Uint32)), 0);
        assert_eq!(run(&[u64::MAX, 0], |s| gt(s, SignedType::Int64)), 0);
        assert_eq!(run(&[u64::MAX, 0], |s| gt(s, SignedType::Uint64)), 1);
        assert_eq!(run(&[5, 5], |s| le(s, SignedType::Int32)), 1);
        assert_eq!(run(&[5, 5], |s| ge(s, SignedType::Uint64)), 1);
    }

    #[test]
    fn nan_is_unordered() {
        let nan = f64::NAN.to_bits();
        let one = 1.0f64.to_bits();
        assert_eq!(run(&[nan, nan], |s| eq(s, UnsignedType::F64)), 0);
        assert_eq!(run(&[nan, nan], |s| ne(s, UnsignedType::F64)), 1);
        assert_eq!(run(&[nan, one], |s| lt(s, SignedType::Float64)), 0);
        assert_eq!(run(&[nan, one], |s| ge(s, SignedType::Float64)), 0);

        let nan = u64::from(f32::NAN.to_bits());
        assert_eq!(run(&[nan, nan], |s| eq(s, UnsignedType::F32)), 0);
    }

    #[test]
    fn zero_signs_compare_equal() {
        let pos = 0.0f32.to_bits() as u64;
        let neg = (-0.0f32).to_bits() as u64;
        assert_eq!(run(&[pos, neg], |s| eq(s, UnsignedType::F32)), 1);
        assert_eq!(run(&[pos, neg], |s| eq(s, UnsignedType::I32)), 0);
    }

    #[test]
    fn i32_ignores_high_bits() {
        assert_eq!(run(&[0xFFFF_0000_0000_0000], |s| eqz(s, UnsignedInt::I32)), 1);
        assert_eq!(run(&[0xFFFF_0000_0000_0000], |s| eqz(s, UnsignedInt::I64)), 0);
        assert_eq!(run(&[0x1_0000_0007, 7], |s| eq(s, UnsignedType::I32)), 1);
    }
}
