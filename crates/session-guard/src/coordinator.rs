//! Session-loss coordination.
//!
//! Many independent call sites can discover that the session is gone at the
//! same moment: concurrent requests all getting 401, a refresh failing, an
//! interceptor seeing `INVALID_TOKEN`. The coordinator collapses those into a
//! single episode (clear credentials, clear app state, navigate to login) and
//! keeps an intentional logout from being mistaken for an expiration.
//!
//! Timing:
//! - triggers within the debounce window of a handled one are dropped
//! - an expiration episode stays open for the reset delay, even across a logout
//! - `LoggingOut` returns to `Idle` after the safety valve if nobody ends it

use crate::rpc::SessionHooks;
use crate::scheduler::DelayedTask;
use crate::session_fsm::{
    ExpirationMachine, ExpirationMachineInput, ExpirationMachineState, LogoutMachine,
    LogoutMachineInput, LogoutMachineState, SessionPhase,
};
use crate::token_manager::TokenLifecycleManager;
use parking_lot::Mutex;
use session_config_and_utils::SessionTimings;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Coordinator timing.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Triggers arriving this soon after a handled one are dropped.
    pub debounce: Duration,
    /// How long an expiration episode blocks further triggers.
    pub expiration_reset: Duration,
    /// Upper bound on how long a logout can suppress expiration handling.
    pub logout_safety_valve: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(500),
            expiration_reset: Duration::from_millis(2000),
            logout_safety_valve: Duration::from_millis(10_000),
        }
    }
}

impl From<&SessionTimings> for CoordinatorConfig {
    fn from(timings: &SessionTimings) -> Self {
        Self {
            debounce: Duration::from_millis(timings.expiration_debounce_ms),
            expiration_reset: Duration::from_millis(timings.expiration_reset_ms),
            logout_safety_valve: Duration::from_millis(timings.logout_safety_valve_ms),
        }
    }
}

/// Where a session-loss signal came from. Used for logging only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpirationTrigger {
    SessionExpired,
    InvalidToken,
    RefreshFailure,
    Unauthorized,
}

impl ExpirationTrigger {
    fn as_str(self) -> &'static str {
        match self {
            Self::SessionExpired => "session_expired",
            Self::InvalidToken => "invalid_token",
            Self::RefreshFailure => "refresh_failure",
            Self::Unauthorized => "unauthorized",
        }
    }
}

/// What happened to an expiration trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpirationOutcome {
    /// This call ran the episode: credentials cleared, user sent to login.
    Handled,
    /// Ignored because an intentional logout is running.
    SuppressedByLogout,
    /// Ignored because another call is already handling the episode.
    AlreadyHandling,
    /// Ignored because a trigger was handled moments ago.
    Debounced,
}

struct CoordinatorState {
    logout: LogoutMachine,
    expiration: ExpirationMachine,
    debounce_until: Option<Instant>,
    expiration_generation: u64,
    logout_generation: u64,
    safety_valve: Option<DelayedTask>,
}

impl CoordinatorState {
    fn phase(&self) -> SessionPhase {
        SessionPhase::of(self.logout.state(), self.expiration.state())
    }

    fn logging_out(&self) -> bool {
        *self.logout.state() == LogoutMachineState::LoggingOut
    }

    fn episode_open(&self) -> bool {
        *self.expiration.state() == ExpirationMachineState::HandlingExpiration
    }

    fn transition_logout(&mut self, input: LogoutMachineInput) -> bool {
        let from = self.phase();
        let accepted = self.logout.consume(&input).is_ok();
        self.log_transition(from, accepted);
        accepted
    }

    fn transition_expiration(&mut self, input: ExpirationMachineInput) -> bool {
        let from = self.phase();
        let accepted = self.expiration.consume(&input).is_ok();
        self.log_transition(from, accepted);
        accepted
    }

    fn log_transition(&self, from: SessionPhase, accepted: bool) {
        if accepted {
            debug!(from = ?from, to = ?self.phase(), "Session phase transition");
        } else {
            debug!(phase = ?from, "Ignoring session input in this phase");
        }
    }
}

struct CoordinatorInner {
    tokens: TokenLifecycleManager,
    hooks: Arc<dyn SessionHooks>,
    config: CoordinatorConfig,
    state: Mutex<CoordinatorState>,
}

/// Single authority for reacting to session loss.
///
/// Cheap to clone; clones share the same state. Timers are tokio tasks, so
/// methods that start one must run inside a tokio runtime.
#[derive(Clone)]
pub struct SessionCoordinator {
    inner: Arc<CoordinatorInner>,
}

impl SessionCoordinator {
    /// Create a coordinator with default timing.
    pub fn new(tokens: TokenLifecycleManager, hooks: Arc<dyn SessionHooks>) -> Self {
        Self::with_config(tokens, hooks, CoordinatorConfig::default())
    }

    /// Create a coordinator with custom timing.
    pub fn with_config(
        tokens: TokenLifecycleManager,
        hooks: Arc<dyn SessionHooks>,
        config: CoordinatorConfig,
    ) -> Self {
        Self {
            inner: Arc::new(CoordinatorInner {
                tokens,
                hooks,
                config,
                state: Mutex::new(CoordinatorState {
                    logout: LogoutMachine::new(),
                    expiration: ExpirationMachine::new(),
                    debounce_until: None,
                    expiration_generation: 0,
                    logout_generation: 0,
                    safety_valve: None,
                }),
            }),
        }
    }

    /// Current phase.
    pub fn phase(&self) -> SessionPhase {
        self.inner.state.lock().phase()
    }

    pub fn is_logging_out(&self) -> bool {
        self.inner.state.lock().logging_out()
    }

    /// Whether an expiration episode is open. Stays true through a logout
    /// that starts and ends inside the episode.
    pub fn is_handling_expiration(&self) -> bool {
        self.inner.state.lock().episode_open()
    }

    /// Whether a recently handled trigger is still suppressing new ones.
    pub fn is_debounce_active(&self) -> bool {
        self.inner
            .state
            .lock()
            .debounce_until
            .map(|until| Instant::now() < until)
            .unwrap_or(false)
    }

    /// React to a session-loss signal.
    ///
    /// At most one call per episode returns [`ExpirationOutcome::Handled`]. A
    /// failure while clearing never prevents navigation to login.
    pub async fn handle_session_expiration(&self) -> ExpirationOutcome {
        self.handle_trigger(ExpirationTrigger::SessionExpired).await
    }

    /// Same as [`Self::handle_session_expiration`].
    pub async fn handle_invalid_token(&self) -> ExpirationOutcome {
        self.handle_trigger(ExpirationTrigger::InvalidToken).await
    }

    /// Same as [`Self::handle_session_expiration`].
    pub async fn handle_token_refresh_failure(&self) -> ExpirationOutcome {
        self.handle_trigger(ExpirationTrigger::RefreshFailure).await
    }

    /// Same as [`Self::handle_session_expiration`].
    pub async fn handle_unauthorized(&self) -> ExpirationOutcome {
        self.handle_trigger(ExpirationTrigger::Unauthorized).await
    }

    /// Mark the start or end of an intentional logout.
    ///
    /// Starting arms a safety valve that re-enables expiration handling if the
    /// logout never reports completion. Ending cancels it. Neither touches an
    /// open expiration episode.
    pub fn set_logging_out(&self, logging_out: bool) {
        let mut state = self.inner.state.lock();

        if let Some(valve) = state.safety_valve.take() {
            valve.cancel();
        }

        if logging_out {
            state.transition_logout(LogoutMachineInput::LogoutStarted);
            state.logout_generation += 1;
            let generation = state.logout_generation;
            let weak = Arc::downgrade(&self.inner);
            state.safety_valve = Some(DelayedTask::schedule(
                self.inner.config.logout_safety_valve,
                move || release_stuck_logout(&weak, generation),
            ));
            info!("Logout started, expiration handling suspended");
        } else if state.logging_out() {
            state.transition_logout(LogoutMachineInput::LogoutFinished);
            info!("Logout finished");
        }
    }

    /// Run an intentional logout: clear credentials and app state, navigate to login.
    pub async fn logout(&self) {
        self.set_logging_out(true);
        self.inner.clear_session().await;
        self.inner.hooks.navigate_to_login().await;
        self.set_logging_out(false);
    }

    async fn handle_trigger(&self, trigger: ExpirationTrigger) -> ExpirationOutcome {
        {
            let mut state = self.inner.state.lock();
            if state.logging_out() {
                debug!(trigger = trigger.as_str(), "Ignoring expiration during logout");
                return ExpirationOutcome::SuppressedByLogout;
            }
            if state.episode_open() {
                debug!(trigger = trigger.as_str(), "Expiration already being handled");
                return ExpirationOutcome::AlreadyHandling;
            }

            let now = Instant::now();
            if state.debounce_until.is_some_and(|until| now < until) {
                debug!(trigger = trigger.as_str(), "Expiration trigger debounced");
                return ExpirationOutcome::Debounced;
            }

            if !state.transition_expiration(ExpirationMachineInput::ExpirationDetected) {
                return ExpirationOutcome::AlreadyHandling;
            }
            state.debounce_until = Some(now + self.inner.config.debounce);
            state.expiration_generation += 1;

            let generation = state.expiration_generation;
            let weak = Arc::downgrade(&self.inner);
            // The reset is never cancelled; a stale one is rejected by generation
            let _ = DelayedTask::schedule(self.inner.config.expiration_reset, move || {
                settle_expiration(&weak, generation)
            });
        }

        info!(trigger = trigger.as_str(), "Session expired, clearing auth data");
        self.inner.clear_session().await;
        self.inner.hooks.navigate_to_login().await;
        ExpirationOutcome::Handled
    }
}

impl CoordinatorInner {
    async fn clear_session(&self) {
        self.tokens.clear_all_tokens();
        if let Err(e) = self.hooks.clear_application_state().await {
            warn!(error = %e, "Failed to clear application auth state");
        }
    }
}

fn settle_expiration(inner: &Weak<CoordinatorInner>, generation: u64) {
    let Some(inner) = inner.upgrade() else {
        return;
    };
    let mut state = inner.state.lock();
    if state.expiration_generation == generation && state.episode_open() {
        state.transition_expiration(ExpirationMachineInput::ExpirationSettled);
    }
}

fn release_stuck_logout(inner: &Weak<CoordinatorInner>, generation: u64) {
    let Some(inner) = inner.upgrade() else {
        return;
    };
    let mut state = inner.state.lock();
    if state.logout_generation == generation && state.logging_out() {
        state.safety_valve = None;
        state.transition_logout(LogoutMachineInput::SafetyValveElapsed);
        warn!(
            after_ms = inner.config.logout_safety_valve.as_millis() as u64,
            "Logout never finished, re-enabling expiration handling"
        );
    }
}
