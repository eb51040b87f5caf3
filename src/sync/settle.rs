use crate::core::Result;
use futures::stream::{FuturesUnordered, StreamExt};
use std::future::Future;
use tracing::{Level, event};

/// Drives `operations` concurrently and settles once.
///
/// Resolves with every value when all operations succeed, or with the first failure as soon
/// as it is observed. Operations still in flight at that point are handed to a background
/// task on the current tokio runtime, so no transport write is abandoned half way; their
/// outcomes are only logged.
pub async fn settle_all<I, F, T>(operations: I) -> Result<Vec<T>>
where
    I: IntoIterator<Item = F>,
    F: Future<Output = Result<T>> + Send + 'static,
    T: Send + 'static,
{
    let mut pending: FuturesUnordered<F> = operations.into_iter().collect();
    let mut settled = Vec::with_capacity(pending.len());

    while let Some(outcome) = pending.next().await {
        match outcome {
            Ok(value) => settled.push(value),
            Err(err) => {
                event!(Level::WARN, error = %err, remaining = pending.len(), "cascade member failed");
                finish_in_background(pending);
                return Err(err);
            }
        }
    }

    Ok(settled)
}

fn finish_in_background<F, T>(mut pending: FuturesUnordered<F>)
where
    F: Future<Output = Result<T>> + Send + 'static,
    T: Send + 'static,
{
    if pending.is_empty() {
        return;
    }
    match tokio::runtime::Handle::try_current() {
        Ok(runtime) => {
            runtime.spawn(async move {
                while let Some(outcome) = pending.next().await {
                    match outcome {
                        Ok(_) => event!(Level::DEBUG, "cascade member completed after the cascade failed"),
                        Err(err) => {
                            event!(Level::DEBUG, error = %err, "cascade member failure ignored, cascade already failed")
                        }
                    }
                }
            });
        }
        Err(_) => {
            event!(Level::WARN, remaining = pending.len(), "no tokio runtime, unfinished cascade members dropped");
        }
    }
}
