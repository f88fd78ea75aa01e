/*!
 * Backing Functions
 * Host callables behind closures and the capability table that names them
 */

use super::dispatch::CallContext;
use super::types::BackingId;
use ahash::RandomState;
use dashmap::DashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Host function invoked on every successful closure call
///
/// Receives the raw argument bytes, a result buffer of exactly the declared
/// result width, and the closure's user payload through [`CallContext`].
/// Implementations must fill the whole result buffer.
pub trait BackingFunction: Send + Sync {
    fn call(&self, ctx: &mut CallContext<'_>) -> anyhow::Result<()>;
}

impl<F> BackingFunction for F
where
    F: Fn(&mut CallContext<'_>) -> anyhow::Result<()> + Send + Sync,
{
    #[inline]
    fn call(&self, ctx: &mut CallContext<'_>) -> anyhow::Result<()> {
        self(ctx)
    }
}

/// Capability pairing a backing id with its callable
#[derive(Clone)]
pub struct BackingRef {
    id: BackingId,
    function: Arc<dyn BackingFunction>,
}

impl BackingRef {
    pub fn new(id: BackingId, function: Arc<dyn BackingFunction>) -> Self {
        Self { id, function }
    }

    /// Wrap a plain closure
    pub fn from_fn<F>(id: BackingId, f: F) -> Self
    where
        F: Fn(&mut CallContext<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self::new(id, Arc::new(f))
    }

    #[inline]
    pub fn id(&self) -> BackingId {
        self.id
    }

    #[inline]
    pub(super) fn call(&self, ctx: &mut CallContext<'_>) -> anyhow::Result<()> {
        self.function.call(ctx)
    }
}

impl fmt::Debug for BackingRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("BackingRef").field(&self.id).finish()
    }
}

/// Registry of host backing functions, addressed by id
///
/// Guests can only name functions the host registered here; an id is never
/// turned into a callable any other way.
#[derive(Clone, Default)]
pub struct FunctionTable {
    functions: Arc<DashMap<BackingId, Arc<dyn BackingFunction>, RandomState>>,
}

impl FunctionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callable, replacing any previous one under the same id
    pub fn register(&self, id: BackingId, function: Arc<dyn BackingFunction>) -> bool {
        let replaced = self.functions.insert(id, function).is_some();
        info!(backing_id = %id, replaced, "Registered backing function");
        replaced
    }

    pub fn register_fn<F>(&self, id: BackingId, f: F) -> bool
    where
        F: Fn(&mut CallContext<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.register(id, Arc::new(f))
    }

    /// Remove a callable; closures already prepared against it keep their copy
    pub fn unregister(&self, id: BackingId) -> bool {
        let removed = self.functions.remove(&id).is_some();
        debug!(backing_id = %id, removed, "Unregistered backing function");
        removed
    }

    /// Resolve an id into a capability
    pub fn resolve(&self, id: BackingId) -> Option<BackingRef> {
        self.functions
            .get(&id)
            .map(|entry| BackingRef::new(id, Arc::clone(entry.value())))
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}
