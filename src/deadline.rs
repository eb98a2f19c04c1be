//! Overall request deadline, threaded through every browser step

use crate::error::RenderError;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// Absolute end-to-end deadline for one request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    at: Instant,
}

impl Deadline {
    /// Deadline `budget` from now
    pub fn after(budget: Duration) -> Self {
        Self {
            at: Instant::now() + budget,
        }
    }

    pub fn instant(&self) -> Instant {
        self.at
    }

    pub fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.at
    }

    /// The earlier of `now + step` and the overall deadline
    pub fn bound(&self, step: Duration) -> Instant {
        (Instant::now() + step).min(self.at)
    }

    /// Run one step under `min(step, remaining)`. Elapsing either yields
    /// `RenderError::Timeout` naming the step.
    pub async fn run<T, E, F>(&self, what: &str, step: Duration, fut: F) -> Result<T, RenderError>
    where
        F: Future<Output = Result<T, E>>,
        E: Into<RenderError>,
    {
        match tokio::time::timeout_at(self.bound(step), fut).await {
            Ok(result) => result.map_err(Into::into),
            Err(_) => Err(RenderError::Timeout(what.to_string())),
        }
    }
}
