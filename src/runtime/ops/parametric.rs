//! Parametric operations (section 4.4.4)

use super::{Stack, Trap};
use crate::ir::InclusiveRange;

/// drop, generalized to a span of slots below the top
pub fn drop(stack: &mut Stack, range: Option<InclusiveRange>) -> Result<(), Trap> {
    stack.drop_range(range)
}

/// select
/// 1. Pop the i32 condition c
/// 2. Pop val2, then val1
/// 3. Push val1 if c is non-zero, otherwise val2
pub fn select(stack: &mut Stack) -> Result<(), Trap> {
    let c = stack.pop_u32()?;
    let val2 = stack.pop()?;
    if c == 0 {
        stack.pop()?;
        stack.push(val2);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_picks_by_condition() {
        let mut stack = Stack::new();
        stack.push_all([10, 20, 1]);
        select(&mut stack).unwrap();
        assert_eq!(stack.as_slice(), &[10]);

        let mut stack = Stack::new();
        stack.push_all([10, 20, 0]);
        select(&mut stack).unwrap();
        assert_eq!(stack.as_slice(), &[20]);
    }

    #[test]
    fn select_condition_is_i32() {
        let mut stack = Stack::new();
        stack.push_all([10, 20, 0x1_0000_0000]);
        select(&mut stack).unwrap();
        assert_eq!(stack.as_slice(), &[20]);
    }

    #[test]
    fn drop_single() {
        let mut stack = Stack::new();
        stack.push_all([1, 2]);
        drop(&mut stack, Some(InclusiveRange::new(0, 0))).unwrap();
        assert_eq!(stack.as_slice(), &[1]);
    }
}
