//! The LIFO cleanup stack a context's API module pushes release hooks onto.
//!
//! The runner guarantees these run on both success and failure (spec §4.3);
//! a hook that errors is logged and does not interrupt the remaining hooks.

use tracing::warn;

type Hook = Box<dyn FnOnce() -> futures::future::BoxFuture<'static, Result<(), String>> + Send>;

/// A LIFO stack of async cleanup hooks, drained in reverse registration
/// order once an execution finishes.
#[derive(Default)]
pub struct CleanupStack {
    hooks: Vec<Hook>,
}

impl CleanupStack {
    /// An empty stack.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a cleanup hook. Hooks run last-registered-first.
    pub fn push<F, Fut>(&mut self, hook: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: std::future::Future<Output = Result<(), String>> + Send + 'static,
    {
        self.hooks.push(Box::new(move || Box::pin(hook())));
    }

    /// Number of hooks currently registered.
    #[must_use]
    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    /// True if no hooks are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Drain every hook in reverse order, logging (not propagating) failures.
    pub async fn drain(&mut self) {
        while let Some(hook) = self.hooks.pop() {
            if let Err(error) = hook().await {
                warn!(%error, "cleanup hook failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn drains_in_reverse_order() {
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut stack = CleanupStack::new();

        let o1 = order.clone();
        stack.push(move || async move {
            o1.lock().unwrap().push(1);
            Ok(())
        });
        let o2 = order.clone();
        stack.push(move || async move {
            o2.lock().unwrap().push(2);
            Ok(())
        });

        stack.drain().await;
        assert_eq!(*order.lock().unwrap(), vec![2, 1]);
        assert!(stack.is_empty());
    }

    #[tokio::test]
    async fn failing_hook_does_not_stop_remaining_hooks() {
        let ran = Arc::new(AtomicUsize::new(0));
        let mut stack = CleanupStack::new();
        stack.push(|| async { Err("boom".to_string()) });
        let r = ran.clone();
        stack.push(move || async move {
            r.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        stack.drain().await;
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }
}
