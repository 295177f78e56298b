//! Bounded-parallelism combinator
//!
//! Runs independent futures in sequential batches no larger than a ceiling. Tasks
//! within a batch run concurrently; results come back in submission order.

use std::fmt::Display;
use std::future::Future;

use futures::future::join_all;

/// What to do when a task fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Log the failure and drop it; batch-mates and later batches still run
    #[default]
    Skip,
    /// Stop after the batch holding the first failure and return it
    FailFast,
}

/// Run `tasks` at most `limit` at a time
///
/// A `limit` of zero is treated as one. Under [`FailurePolicy::Skip`] the result is
/// always `Ok` and holds the successful outputs, in submission order among survivors.
pub async fn run_bounded<I, F, T, E>(tasks: I, limit: usize, policy: FailurePolicy) -> Result<Vec<T>, E>
where
    I: IntoIterator<Item = F>,
    F: Future<Output = Result<T, E>>,
    E: Display,
{
    let limit = limit.max(1);
    let mut tasks = tasks.into_iter();
    let mut results = Vec::new();
    let mut submitted = 0usize;

    loop {
        let batch: Vec<F> = tasks.by_ref().take(limit).collect();
        if batch.is_empty() {
            break;
        }

        let first_index = submitted;
        submitted += batch.len();

        let mut first_error = None;
        for (offset, outcome) in join_all(batch).await.into_iter().enumerate() {
            match outcome {
                Ok(value) => results.push(value),
                Err(e) => {
                    tracing::warn!(task = first_index + offset, error = %e, "Task failed");
                    if policy == FailurePolicy::FailFast && first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }

        if let Some(e) = first_error {
            return Err(e);
        }
    }

    Ok(results)
}

/// Run `tasks` at most `limit` at a time, keeping only the successes
pub async fn limit_concurrency<I, F, T, E>(tasks: I, limit: usize) -> Vec<T>
where
    I: IntoIterator<Item = F>,
    F: Future<Output = Result<T, E>>,
    E: Display,
{
    run_bounded(tasks, limit, FailurePolicy::Skip)
        .await
        .unwrap_or_default()
}
