//! Subscriber handlers.
//!
//! A handler receives each matching [`Activity`] and is awaited before the
//! cycle moves on to the next item, so dispatch order equals fetch order. A
//! slow handler stalls its cycle; handlers that need long work should spawn
//! it and return.

use std::future::Future;

use async_trait::async_trait;
use colab::Activity;

/// Error type handlers may return. Any error is accepted.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Receives activity surfaced by the poll engine.
#[async_trait]
pub trait ActivityHandler: Send + Sync {
    async fn handle(&self, activity: Activity) -> Result<(), HandlerError>;
}

/// Adapts an async closure into an [`ActivityHandler`].
///
/// ```ignore
/// let handler = watcher::from_fn(|activity| async move {
///     match activity {
///         Activity::NewItem(item) => println!("new: {}", item.title),
///     }
///     Ok(())
/// });
/// ```
pub fn from_fn<F, Fut>(f: F) -> FnHandler<F>
where
    F: Fn(Activity) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), HandlerError>> + Send,
{
    FnHandler(f)
}

/// Handler produced by [`from_fn`].
pub struct FnHandler<F>(F);

#[async_trait]
impl<F, Fut> ActivityHandler for FnHandler<F>
where
    F: Fn(Activity) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), HandlerError>> + Send,
{
    async fn handle(&self, activity: Activity) -> Result<(), HandlerError> {
        (self.0)(activity).await
    }
}
