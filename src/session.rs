//! Generation Sessions
//!
//! One session per generation attempt: isolated, single-use, torn down
//! exactly once on every exit path. The session carries the protocol state,
//! the whitelist snapshot, and an ordered call log for audit.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::GenerationError;
use crate::model::WhitelistSnapshot;

/// Protocol state for one attempt. Transitions are monotonic; `Failed`
/// absorbs from any non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Init,
    PrereqsFetched,
    FooterDecided,
    Synthesized,
    Validated,
    Done,
    Failed,
}

impl SessionState {
    fn rank(self) -> u8 {
        match self {
            SessionState::Init => 0,
            SessionState::PrereqsFetched => 1,
            SessionState::FooterDecided => 2,
            SessionState::Synthesized => 3,
            SessionState::Validated => 4,
            SessionState::Done => 5,
            SessionState::Failed => 6,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Done | SessionState::Failed)
    }
}

/// Result of one provider call, as recorded in the session call log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallOutcome {
    Ok,
    Err(String),
}

/// One entry in the per-session audit log.
#[derive(Debug, Clone, Serialize)]
pub struct CallRecord {
    pub provider: &'static str,
    pub outcome: CallOutcome,
    pub at: DateTime<Utc>,
}

/// Shared counters so teardown is observable from the manager.
#[derive(Debug, Default)]
struct SessionGauge {
    active: AtomicUsize,
    opened: AtomicUsize,
    closed: AtomicUsize,
}

/// Isolated execution context for one generation attempt.
///
/// Teardown runs exactly once: either through an explicit [`close`] or, if
/// the owning future is dropped mid-flight (cancellation), through `Drop`.
///
/// [`close`]: GenerationSession::close
#[derive(Debug)]
pub struct GenerationSession {
    id: Uuid,
    state: SessionState,
    call_log: Vec<CallRecord>,
    call_counts: HashMap<&'static str, usize>,
    whitelist: Option<WhitelistSnapshot>,
    footer_appended: bool,
    closed: bool,
    gauge: Arc<SessionGauge>,
}

impl GenerationSession {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn call_log(&self) -> &[CallRecord] {
        &self.call_log
    }

    /// How many times the named provider was called in this session.
    pub fn calls_to(&self, provider: &str) -> usize {
        self.call_counts.get(provider).copied().unwrap_or(0)
    }

    pub fn whitelist(&self) -> Option<&WhitelistSnapshot> {
        self.whitelist.as_ref()
    }

    pub fn set_whitelist(&mut self, snapshot: WhitelistSnapshot) {
        self.whitelist = Some(snapshot);
    }

    /// Advance to the next protocol state. Rejects revisiting or leaving a
    /// terminal state; `Failed` is reachable from any non-terminal state.
    pub fn advance(&mut self, next: SessionState) -> Result<(), GenerationError> {
        if self.state.is_terminal() {
            return Err(GenerationError::Protocol(format!(
                "session {} already terminal in state {:?}",
                self.id, self.state
            )));
        }
        if next != SessionState::Failed && next.rank() <= self.state.rank() {
            return Err(GenerationError::Protocol(format!(
                "illegal transition {:?} -> {:?}",
                self.state, next
            )));
        }
        debug!(session_id = %self.id, from = ?self.state, to = ?next, "session transition");
        self.state = next;
        Ok(())
    }

    /// Move to the absorbing `Failed` state. Safe on any non-terminal state.
    pub fn fail(&mut self) {
        if !self.state.is_terminal() {
            self.state = SessionState::Failed;
        }
    }

    /// Record a provider call in the audit log, enforcing the at-most-once
    /// rule for every provider within a session.
    pub fn record_call(
        &mut self,
        provider: &'static str,
        outcome: CallOutcome,
    ) -> Result<(), GenerationError> {
        let count = self.call_counts.entry(provider).or_insert(0);
        *count += 1;
        self.call_log.push(CallRecord {
            provider,
            outcome,
            at: Utc::now(),
        });
        if *count > 1 {
            return Err(if provider == crate::engine::FOOTER_PROVIDER {
                GenerationError::FooterInvariantBroken(format!(
                    "footer fetched {count} times in session {}",
                    self.id
                ))
            } else {
                GenerationError::Protocol(format!(
                    "provider '{provider}' called {count} times in session {}",
                    self.id
                ))
            });
        }
        Ok(())
    }

    /// Mark the deterministic footer append. A second append in the same
    /// session breaks the footer invariant.
    pub fn mark_footer_appended(&mut self) -> Result<(), GenerationError> {
        if self.footer_appended {
            return Err(GenerationError::FooterInvariantBroken(format!(
                "footer appended twice in session {}",
                self.id
            )));
        }
        self.footer_appended = true;
        Ok(())
    }

    pub fn footer_appended(&self) -> bool {
        self.footer_appended
    }

    /// Release all session-scoped state. Idempotent; the first call wins.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.gauge.active.fetch_sub(1, Ordering::SeqCst);
        self.gauge.closed.fetch_add(1, Ordering::SeqCst);
        self.call_log.shrink_to_fit();
        self.whitelist = None;
        info!(session_id = %self.id, state = ?self.state, "session closed");
    }
}

impl Drop for GenerationSession {
    fn drop(&mut self) {
        if !self.closed {
            // Reached when the generate future is cancelled mid-flight.
            warn!(session_id = %self.id, state = ?self.state, "session dropped before close; tearing down");
            self.close();
        }
    }
}

/// Owns session lifecycles. Sessions share no mutable state; the manager only
/// keeps aggregate gauges so callers and tests can observe teardown.
#[derive(Debug, Clone, Default)]
pub struct SessionManager {
    gauge: Arc<SessionGauge>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a fresh, isolated session for one attempt.
    pub fn open(&self) -> GenerationSession {
        let id = Uuid::new_v4();
        self.gauge.opened.fetch_add(1, Ordering::SeqCst);
        self.gauge.active.fetch_add(1, Ordering::SeqCst);
        info!(session_id = %id, "session opened");
        GenerationSession {
            id,
            state: SessionState::Init,
            call_log: Vec::new(),
            call_counts: HashMap::new(),
            whitelist: None,
            footer_appended: false,
            closed: false,
            gauge: Arc::clone(&self.gauge),
        }
    }

    /// Sessions currently open.
    pub fn active_sessions(&self) -> usize {
        self.gauge.active.load(Ordering::SeqCst)
    }

    /// Sessions opened since construction.
    pub fn sessions_opened(&self) -> usize {
        self.gauge.opened.load(Ordering::SeqCst)
    }

    /// Sessions torn down since construction.
    pub fn sessions_closed(&self) -> usize {
        self.gauge.closed.load(Ordering::SeqCst)
    }
}
