//! Function table used by `call_indirect`

use super::module_engine::Function;
use super::Trap;
use parking_lot::RwLock;
use std::sync::Arc;

/// Slots hold direct references to bound functions
#[derive(Debug)]
pub struct TableInstance {
    elements: RwLock<Vec<Option<Arc<Function>>>>,
}

impl TableInstance {
    pub fn new(size: u32) -> Self {
        TableInstance {
            elements: RwLock::new(vec![None; size as usize]),
        }
    }

    pub fn len(&self) -> usize {
        self.elements.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The function in slot `index`; out of range and empty slots trap
    pub fn get(&self, index: u32) -> Result<Arc<Function>, Trap> {
        self.elements
            .read()
            .get(index as usize)
            .and_then(Option::clone)
            .ok_or(Trap::InvalidTableAccess)
    }

    /// Returns false if `index` is past the end of the table
    #[must_use]
    pub fn set(&self, index: u32, function: Arc<Function>) -> bool {
        match self.elements.write().get_mut(index as usize) {
            Some(slot) => {
                *slot = Some(function);
                true
            }
            None => false,
        }
    }
}
