//! Functions implemented by the embedder

use super::{CallContext, Trap};
use std::sync::Arc;

/// A host function callable from guest code
///
/// Parameters and results are the 64-bit patterns of the declared types, in
/// signature order. Returning `Err` terminates the invocation with that trap.
pub trait HostFunction: Send + Sync {
    fn call(&self, ctx: &CallContext, params: &[u64]) -> Result<Vec<u64>, Trap>;
}

impl<F> HostFunction for F
where
    F: Fn(&CallContext, &[u64]) -> Result<Vec<u64>, Trap> + Send + Sync,
{
    fn call(&self, ctx: &CallContext, params: &[u64]) -> Result<Vec<u64>, Trap> {
        self(ctx, params)
    }
}

/// Wrap a closure as a shareable [`HostFunction`]
pub fn host_fn<F>(f: F) -> Arc<dyn HostFunction>
where
    F: Fn(&CallContext, &[u64]) -> Result<Vec<u64>, Trap> + Send + Sync + 'static,
{
    Arc::new(f)
}
