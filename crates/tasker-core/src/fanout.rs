//! Bounded concurrent fetches with first-error cancellation.

use crate::error::{Result, TaskerError};
use crate::gateway::guarded;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Concurrent wiki/tracker reads allowed per batch.
pub const FETCH_CONCURRENCY: usize = 10;

/// Run `fetch` for every input with at most `limit` in flight.
///
/// Results come back in input order. The first failure cancels the rest of
/// the batch and is returned; cancelling `cancel` aborts the whole batch.
pub async fn fan_out<I, T, F, Fut>(
    inputs: Vec<I>,
    limit: usize,
    cancel: &CancellationToken,
    fetch: F,
) -> Result<Vec<T>>
where
    I: Send + 'static,
    T: Send + 'static,
    F: Fn(I) -> Fut,
    Fut: Future<Output = Result<T>> + Send + 'static,
{
    let total = inputs.len();
    let batch = cancel.child_token();
    let permits = Arc::new(Semaphore::new(limit.max(1)));
    let results: Arc<Mutex<Vec<(usize, T)>>> = Arc::new(Mutex::new(Vec::with_capacity(total)));
    let mut set = JoinSet::new();

    for (index, input) in inputs.into_iter().enumerate() {
        let permits = Arc::clone(&permits);
        let results = Arc::clone(&results);
        let token = batch.clone();
        let work = fetch(input);
        set.spawn(async move {
            let acquire = permits.acquire_owned();
            let _permit = guarded(&token, async move {
                acquire.await.map_err(|_| TaskerError::Aborted)
            })
            .await?;
            let value = guarded(&token, work).await?;
            results.lock().await.push((index, value));
            Ok::<(), TaskerError>(())
        });
    }

    let mut first_error = None;
    while let Some(joined) = set.join_next().await {
        let outcome = match joined {
            Ok(outcome) => outcome,
            Err(e) if e.is_cancelled() => continue,
            Err(e) => Err(TaskerError::Worker(e.to_string())),
        };
        if let Err(e) = outcome {
            if first_error.is_none() {
                tracing::debug!(error = %e, "fan-out failed, cancelling batch");
                batch.cancel();
                set.abort_all();
                first_error = Some(e);
            }
        }
    }
    if let Some(e) = first_error {
        return Err(e);
    }

    let mut collected = std::mem::take(&mut *results.lock().await);
    collected.sort_by_key(|(index, _)| *index);
    Ok(collected.into_iter().map(|(_, value)| value).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn keeps_input_order() {
        let token = CancellationToken::new();
        let out = fan_out(vec![30u64, 10, 20], 3, &token, |ms| async move {
            tokio::time::sleep(Duration::from_millis(ms)).await;
            Ok(ms)
        })
        .await
        .unwrap();
        assert_eq!(out, vec![30, 10, 20]);
    }

    #[tokio::test]
    async fn never_exceeds_limit() {
        let token = CancellationToken::new();
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let inputs: Vec<usize> = (0..25).collect();

        let out = fan_out(inputs, 4, &token, |i| {
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            async move {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                running.fetch_sub(1, Ordering::SeqCst);
                Ok(i)
            }
        })
        .await
        .unwrap();

        assert_eq!(out.len(), 25);
        assert!(peak.load(Ordering::SeqCst) <= 4);
    }

    #[tokio::test]
    async fn first_error_is_returned() {
        let token = CancellationToken::new();
        let err = fan_out(vec![1, 2, 3], 2, &token, |i| async move {
            if i == 2 {
                Err(TaskerError::gateway("page 2 unavailable"))
            } else {
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok(i)
            }
        })
        .await
        .unwrap_err();
        assert!(err.to_string().contains("page 2 unavailable"));
        assert!(!token.is_cancelled());
    }

    #[tokio::test]
    async fn cancelled_token_aborts() {
        let token = CancellationToken::new();
        token.cancel();
        let err = fan_out(vec![1], 1, &token, |i| async move { Ok(i) })
            .await
            .unwrap_err();
        assert!(matches!(err, TaskerError::Aborted));
    }
}
