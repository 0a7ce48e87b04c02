use crate::core::{CollectionError, CollectionScope, Result};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// The part of an execution context that is threaded unchanged through
/// every stage of an operation.
#[derive(Debug, Clone)]
pub struct IoContext {
    scope: Arc<CollectionScope>,
    cancel: CancellationToken,
}

impl IoContext {
    pub fn new(scope: Arc<CollectionScope>, cancel: CancellationToken) -> Self {
        Self { scope, cancel }
    }

    pub fn scope(&self) -> &CollectionScope {
        &self.scope
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Fails with `Cancelled` once the operation's token has fired. Checked
    /// before every suspension point that reaches the store.
    pub fn ensure_active(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(CollectionError::Cancelled);
        }
        Ok(())
    }
}

/// Input of a stage: the shared context plus the current payload.
#[derive(Debug, Clone)]
pub struct CollectionIoEvent<T> {
    context: IoContext,
    payload: T,
}

impl<T> CollectionIoEvent<T> {
    pub fn new(context: IoContext, payload: T) -> Self {
        Self { context, payload }
    }

    pub fn context(&self) -> &IoContext {
        &self.context
    }

    pub fn scope(&self) -> &CollectionScope {
        self.context.scope()
    }

    pub fn payload(&self) -> &T {
        &self.payload
    }

    pub fn into_payload(self) -> T {
        self.payload
    }

    pub fn into_parts(self) -> (IoContext, T) {
        (self.context, self.payload)
    }

    pub fn ensure_active(&self) -> Result<()> {
        self.context.ensure_active()
    }
}
