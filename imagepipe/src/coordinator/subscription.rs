//! Subscriber handle returned by `AssetCoordinator::fetch`.

use super::outcome::{FetchError, Outcome};
use crate::key::ResourceKey;
use crate::pipeline::{FailureKind, StageError};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::oneshot;

/// Removes a subscriber from the registry it was registered in.
pub(crate) trait Unsubscribe: Send + Sync {
    fn unsubscribe(&self, key: &ResourceKey, id: u64);
}

/// A pending outcome for one key.
///
/// Resolves exactly once. Dropping the subscription before it resolves (or
/// calling [`cancel`](Self::cancel)) deregisters it; the execution it was
/// waiting on keeps running and simply has one fewer recipient.
pub struct Subscription<A> {
    key: ResourceKey,
    id: u64,
    receiver: oneshot::Receiver<Outcome<A>>,
    registry: Arc<dyn Unsubscribe>,
    resolved: bool,
}

impl<A> Subscription<A> {
    pub(crate) fn new(
        key: ResourceKey,
        id: u64,
        receiver: oneshot::Receiver<Outcome<A>>,
        registry: Arc<dyn Unsubscribe>,
    ) -> Self {
        Self {
            key,
            id,
            receiver,
            registry,
            resolved: false,
        }
    }

    pub fn key(&self) -> &ResourceKey {
        &self.key
    }

    /// Identifier unique within the issuing coordinator.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Stop waiting for the outcome.
    pub fn cancel(self) {
        drop(self)
    }
}

impl<A> Future for Subscription<A> {
    type Output = Outcome<A>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Outcome<A>> {
        let this = &mut *self;
        match Pin::new(&mut this.receiver).poll(cx) {
            Poll::Ready(Ok(outcome)) => {
                this.resolved = true;
                Poll::Ready(outcome)
            }
            // Sender dropped without delivering: the execution task died.
            Poll::Ready(Err(_)) => {
                this.resolved = true;
                Poll::Ready(Outcome::Failed(FetchError::new(
                    this.key.clone(),
                    0,
                    StageError::permanent(
                        FailureKind::Internal,
                        "execution ended without delivering an outcome",
                    ),
                )))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<A> Drop for Subscription<A> {
    fn drop(&mut self) {
        if !self.resolved {
            self.registry.unsubscribe(&self.key, self.id);
        }
    }
}

impl<A> std::fmt::Debug for Subscription<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("key", &self.key)
            .field("id", &self.id)
            .field("resolved", &self.resolved)
            .finish()
    }
}
