//! Operand stack shared by every frame of one invocation
//!
//! Values are untyped 64-bit words holding the bit pattern of the
//! WebAssembly value. An i32 occupies the low 32 bits, zero-extended.

use super::Trap;
use crate::ir::InclusiveRange;

#[derive(Debug, Default)]
pub struct Stack {
    values: Vec<u64>,
}

impl Stack {
    pub fn new() -> Self {
        Stack { values: Vec::new() }
    }

    #[inline]
    pub fn push(&mut self, value: u64) {
        self.values.push(value);
    }

    pub fn push_all(&mut self, values: impl IntoIterator<Item = u64>) {
        self.values.extend(values);
    }

    #[inline]
    pub fn push_u32(&mut self, value: u32) {
        self.values.push(u64::from(value));
    }

    #[inline]
    pub fn push_bool(&mut self, value: bool) {
        self.values.push(u64::from(value));
    }

    #[inline]
    pub fn push_f32(&mut self, value: f32) {
        self.push_u32(value.to_bits());
    }

    #[inline]
    pub fn push_f64(&mut self, value: f64) {
        self.values.push(value.to_bits());
    }

    #[inline]
    pub fn pop(&mut self) -> Result<u64, Trap> {
        self.values.pop().ok_or(Trap::StackUnderflow)
    }

    /// Pop the low 32 bits of the top word
    #[inline]
    pub fn pop_u32(&mut self) -> Result<u32, Trap> {
        self.pop().map(|v| v as u32)
    }

    #[inline]
    pub fn pop_f32(&mut self) -> Result<f32, Trap> {
        self.pop_u32().map(f32::from_bits)
    }

    #[inline]
    pub fn pop_f64(&mut self) -> Result<f64, Trap> {
        self.pop().map(f64::from_bits)
    }

    /// Pop `count` values, returned in push order
    pub fn pop_n(&mut self, count: usize) -> Result<Vec<u64>, Trap> {
        let at = self.values.len().checked_sub(count).ok_or(Trap::StackUnderflow)?;
        Ok(self.values.split_off(at))
    }

    /// Remove the slots `range.start..=range.end` counted from the top
    ///
    /// Values above the range stay in place.
    pub fn drop_range(&mut self, range: Option<InclusiveRange>) -> Result<(), Trap> {
        let Some(InclusiveRange { start, end }) = range else {
            return Ok(());
        };
        let (start, end) = (start as usize, end as usize);
        let len = self.values.len();
        let keep = len.checked_sub(end + 1).ok_or(Trap::StackUnderflow)?;
        if start == 0 {
            self.values.truncate(keep);
        } else {
            self.values.drain(keep..len - start);
        }
        Ok(())
    }

    /// Duplicate the value `depth` slots below the top
    pub fn pick(&mut self, depth: u32) -> Result<(), Trap> {
        let index = self.index_from_top(depth)?;
        self.values.push(self.values[index]);
        Ok(())
    }

    /// Exchange the top with the value `depth` slots below it
    pub fn swap(&mut self, depth: u32) -> Result<(), Trap> {
        let index = self.index_from_top(depth)?;
        let top = self.values.len() - 1;
        self.values.swap(top, index);
        Ok(())
    }

    fn index_from_top(&self, depth: u32) -> Result<usize, Trap> {
        self.values
            .len()
            .checked_sub(1 + depth as usize)
            .ok_or(Trap::StackUnderflow)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn as_slice(&self) -> &[u64] {
        &self.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stack(values: &[u64]) -> Stack {
        let mut s = Stack::new();
        s.push_all(values.iter().copied());
        s
    }

    #[test]
    fn test_push_pop() {
        let mut s = Stack::new();
        s.push(1);
        s.push_u32(u32::MAX);
        s.push_f32(-0.0);
        assert_eq!(s.pop_u32().unwrap(), 0x8000_0000);
        assert_eq!(s.pop().unwrap(), 0xFFFF_FFFF);
        assert_eq!(s.pop().unwrap(), 1);
        assert_eq!(s.pop(), Err(Trap::StackUnderflow));
    }

    #[test]
    fn test_float_round_trip_keeps_nan_bits() {
        let mut s = Stack::new();
        let nan = f64::from_bits(0x7FF8_0000_0000_00AB);
        s.push_f64(nan);
        assert_eq!(s.pop_f64().unwrap().to_bits(), 0x7FF8_0000_0000_00AB);
    }

    #[test]
    fn test_pop_n_keeps_order() {
        let mut s = stack(&[1, 2, 3, 4]);
        assert_eq!(s.pop_n(3).unwrap(), vec![2, 3, 4]);
        assert_eq!(s.as_slice(), &[1]);
        assert_eq!(s.pop_n(2), Err(Trap::StackUnderflow));
        assert_eq!(s.pop_n(0).unwrap(), Vec::<u64>::new());
    }

    #[test]
    fn test_drop_range_from_top() {
        let mut s = stack(&[1, 2, 3, 4]);
        s.drop_range(Some(InclusiveRange::new(0, 1))).unwrap();
        assert_eq!(s.as_slice(), &[1, 2]);
    }

    #[test]
    fn test_drop_range_below_live_values() {
        // keep the top value, discard the two beneath it
        let mut s = stack(&[1, 2, 3, 4]);
        s.drop_range(Some(InclusiveRange::new(1, 2))).unwrap();
        assert_eq!(s.as_slice(), &[1, 4]);

        let mut s = stack(&[1, 2, 3, 4, 5]);
        s.drop_range(Some(InclusiveRange::new(2, 3))).unwrap();
        assert_eq!(s.as_slice(), &[1, 4, 5]);
    }

    #[test]
    fn test_drop_none_is_noop() {
        let mut s = stack(&[1, 2]);
        s.drop_range(None).unwrap();
        assert_eq!(s.as_slice(), &[1, 2]);
    }

    #[test]
    fn test_drop_range_underflow() {
        let mut s = stack(&[1]);
        assert_eq!(s.drop_range(Some(InclusiveRange::new(0, 1))), Err(Trap::StackUnderflow));
    }

    #[test]
    fn test_pick_and_swap() {
        let mut s = stack(&[10, 20, 30]);
        s.pick(2).unwrap();
        assert_eq!(s.as_slice(), &[10, 20, 30, 10]);
        s.swap(2).unwrap();
        assert_eq!(s.as_slice(), &[10, 10, 30, 20]);
        assert_eq!(s.pick(4), Err(Trap::StackUnderflow));
    }
}
