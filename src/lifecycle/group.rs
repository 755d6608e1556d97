//! First-error-wins task group.
//!
//! # Responsibilities
//! - Run lifecycle tasks concurrently under one lifetime token
//! - Trigger the token as soon as any task fails
//! - Report the first failure, in completion order
//!
//! # Design Decisions
//! - `Error::Cancelled` is the normal way for a task to end and is never recorded
//! - A panicking task counts as a failure
//! - The token always ends up triggered once `wait` returns

use std::future::Future;

use tokio::task::JoinSet;
use tracing::Instrument;

use crate::error::Error;
use crate::lifecycle::shutdown::Shutdown;

/// Structured-concurrency group sharing one lifetime token.
pub struct TaskGroup {
    tasks: JoinSet<Result<(), Error>>,
    lifetime: Shutdown,
}

impl TaskGroup {
    pub fn new(lifetime: Shutdown) -> Self {
        Self {
            tasks: JoinSet::new(),
            lifetime,
        }
    }

    /// The token shared by every task in the group.
    pub fn lifetime(&self) -> &Shutdown {
        &self.lifetime
    }

    /// Spawn a task recorded under the current span.
    pub fn spawn<F>(&mut self, task: F)
    where
        F: Future<Output = Result<(), Error>> + Send + 'static,
    {
        self.tasks.spawn(task.in_current_span());
    }

    /// Join every task and return the first non-cancellation error.
    pub async fn wait(mut self) -> Result<(), Error> {
        let mut first: Option<Error> = None;

        while let Some(joined) = self.tasks.join_next().await {
            let err = match joined {
                Ok(Ok(())) => continue,
                Ok(Err(err)) if err.is_cancelled() => continue,
                Ok(Err(err)) => err,
                Err(join_err) => Error::from(join_err),
            };

            if first.is_none() {
                tracing::debug!(error = %err, fatal = err.is_fatal(), "Task failed, cancelling lifetime");
                self.lifetime.trigger();
                first = Some(err);
            } else {
                tracing::debug!(error = %err, "Discarding error after first failure");
            }
        }

        self.lifetime.trigger();
        match first {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
