//! Bounded polling for a resource created after a purchase.
//!
//! A payment can succeed before the backend has materialized what was bought.
//! The poller lists resources at a fixed interval until one carries the
//! purchase's correlation key. Running out of attempts yields
//! [`AuthError::PollTimeout`], which means the result is still pending, never
//! that the payment failed.

use crate::rpc::{ListResourcesRpc, Resource};
use crate::{AuthError, AuthResult};
use session_config_and_utils::PollerSettings;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Polling bounds.
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Total list calls before giving up.
    pub max_attempts: u32,
    /// Wait between attempts. There is no wait before the first.
    pub interval: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            max_attempts: 15,
            interval: Duration::from_millis(2000),
        }
    }
}

impl From<&PollerSettings> for PollConfig {
    fn from(settings: &PollerSettings) -> Self {
        Self {
            max_attempts: settings.max_attempts,
            interval: Duration::from_millis(settings.interval_ms),
        }
    }
}

/// Progress of one polling run.
#[derive(Debug)]
struct PollState {
    attempt: u32,
    max_attempts: u32,
}

impl PollState {
    fn new(max_attempts: u32) -> Self {
        Self {
            attempt: 0,
            max_attempts,
        }
    }

    /// Advance to the next attempt number, or `None` once exhausted.
    fn next_attempt(&mut self) -> Option<u32> {
        if self.attempt >= self.max_attempts {
            return None;
        }
        self.attempt += 1;
        Some(self.attempt)
    }
}

/// Waits for a purchased resource to appear.
pub struct PaymentCompletionPoller {
    api: Arc<dyn ListResourcesRpc>,
    config: PollConfig,
}

impl PaymentCompletionPoller {
    pub fn new(api: Arc<dyn ListResourcesRpc>) -> Self {
        Self::with_config(api, PollConfig::default())
    }

    pub fn with_config(api: Arc<dyn ListResourcesRpc>, config: PollConfig) -> Self {
        Self { api, config }
    }

    /// Poll until a resource with `correlation_key` exists.
    ///
    /// Individual list failures count as "not yet" and do not stop the loop.
    /// When several resources match, the most recently created one wins.
    pub async fn await_resource(&self, correlation_key: &str) -> AuthResult<Resource> {
        let started = Instant::now();
        let mut state = PollState::new(self.config.max_attempts);

        while let Some(attempt) = state.next_attempt() {
            if attempt > 1 {
                tokio::time::sleep(self.config.interval).await;
            }

            match self.api.list_resources().await {
                Ok(resources) => {
                    if let Some(resource) = latest_match(resources, correlation_key) {
                        info!(
                            correlation_key,
                            attempt,
                            resource_id = %resource.id,
                            "Purchased resource is ready"
                        );
                        return Ok(resource);
                    }
                    debug!(correlation_key, attempt, "Purchased resource not ready yet");
                }
                Err(e) => {
                    warn!(correlation_key, attempt, error = %e, "Listing resources failed, will retry");
                }
            }
        }

        warn!(
            correlation_key,
            attempts = state.max_attempts,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Gave up waiting for purchased resource; payment is pending"
        );
        Err(AuthError::PollTimeout {
            attempts: state.max_attempts,
        })
    }
}

/// The most recently created resource with `correlation_key`.
pub fn latest_match(resources: Vec<Resource>, correlation_key: &str) -> Option<Resource> {
    resources
        .into_iter()
        .filter(|resource| resource.correlation_key == correlation_key)
        .max_by_key(|resource| resource.created_at)
}

/// Whether the consumer of a poll result still wants it.
///
/// Polling is not cancellable. A screen that goes away flips its liveness and
/// drops whatever the poll later delivers.
#[derive(Debug, Clone)]
pub struct Liveness(Arc<AtomicBool>);

impl Default for Liveness {
    fn default() -> Self {
        Self::new()
    }
}

impl Liveness {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    pub fn is_alive(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub fn mark_gone(&self) {
        self.0.store(false, Ordering::Release);
    }

    /// Hand `value` through only if the consumer is still alive.
    pub fn deliver<T>(&self, value: T) -> Option<T> {
        self.is_alive().then_some(value)
    }
}
