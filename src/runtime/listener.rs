//! Observers of function entry and exit

use crate::module::FunctionType;

/// Called around every guest and host function invocation
///
/// `after` is only called when the function returns normally.
pub trait FunctionListener: Send + Sync {
    fn before(&self, name: &str, ty: &FunctionType);

    fn after(&self, name: &str, ty: &FunctionType);
}
