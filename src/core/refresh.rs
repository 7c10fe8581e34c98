//! Refresh lifecycle of the quote list.
//!
//! All transitions go through [`update`], which consumes the current state and a
//! [`Msg`] and returns the next state plus the [`Effect`]s the owner must run.

use crate::core::{CurrencyPair, DisplayRecord, ErrorInfo, FetchError};
use chrono::{DateTime, Utc};
use std::time::Duration;
use tracing::debug;

/// Delay between a user asking for a retry and the fetch being re-issued.
pub const RETRY_DELAY: Duration = Duration::from_millis(500);

/// Identifies one fetch attempt; only the latest issued ticket may commit.
pub type Ticket = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    InitialLoading,
    Idle { has_data: bool },
    Refreshing,
    ErrorShown { has_data: bool },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Msg {
    InitialLoadRequested,
    ManualRefreshRequested,
    RetryRequested,
    RetryDelayElapsed,
    FetchResolved {
        ticket: Ticket,
        outcome: Result<Vec<DisplayRecord>, FetchError>,
        at: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Fetch {
        ticket: Ticket,
        pairs: Vec<CurrencyPair>,
    },
    ScheduleRetry {
        delay: Duration,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct RefreshState {
    pairs: Vec<CurrencyPair>,
    records: Vec<DisplayRecord>,
    phase: Phase,
    error: Option<ErrorInfo>,
    last_successful_fetch_at: Option<DateTime<Utc>>,
    latest_ticket: Option<Ticket>,
    next_ticket: Ticket,
    retry_pending: bool,
}

/// Snapshot handed to the presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub struct QuoteView {
    pub records: Vec<DisplayRecord>,
    pub phase: Phase,
    pub is_initial_loading: bool,
    pub is_refreshing: bool,
    pub error: Option<ErrorInfo>,
    /// True when the error replaces the list entirely.
    pub is_blocking_error: bool,
    pub last_successful_fetch_at: Option<DateTime<Utc>>,
}

impl RefreshState {
    pub fn new(pairs: Vec<CurrencyPair>) -> Self {
        RefreshState {
            pairs,
            records: Vec::new(),
            phase: Phase::InitialLoading,
            error: None,
            last_successful_fetch_at: None,
            latest_ticket: None,
            next_ticket: 1,
            retry_pending: false,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn records(&self) -> &[DisplayRecord] {
        &self.records
    }

    pub fn error(&self) -> Option<&ErrorInfo> {
        self.error.as_ref()
    }

    pub fn pairs(&self) -> &[CurrencyPair] {
        &self.pairs
    }

    pub fn has_data(&self) -> bool {
        !self.records.is_empty()
    }

    pub fn view(&self) -> QuoteView {
        QuoteView {
            records: self.records.clone(),
            phase: self.phase,
            is_initial_loading: self.phase == Phase::InitialLoading,
            is_refreshing: self.phase == Phase::Refreshing,
            error: self.error.clone(),
            is_blocking_error: matches!(self.phase, Phase::ErrorShown { has_data: false }),
            last_successful_fetch_at: self.last_successful_fetch_at,
        }
    }

    /// Clears the error and issues a fresh ticket, superseding any fetch in flight.
    fn begin_fetch(&mut self) -> Effect {
        let ticket = self.next_ticket;
        self.next_ticket += 1;
        if let Some(stale) = self.latest_ticket.replace(ticket) {
            debug!(stale, ticket, "Superseding fetch still in flight");
        }
        self.error = None;
        self.retry_pending = false;
        Effect::Fetch {
            ticket,
            pairs: self.pairs.clone(),
        }
    }

    fn resolve(&mut self, outcome: Result<Vec<DisplayRecord>, FetchError>, at: DateTime<Utc>) {
        self.latest_ticket = None;
        match outcome {
            Ok(records) => {
                debug!(count = records.len(), "Quotes refreshed");
                self.records = records;
                self.last_successful_fetch_at = Some(at);
                self.error = None;
                self.phase = Phase::Idle {
                    has_data: self.has_data(),
                };
            }
            Err(err) => {
                debug!(error = %err, has_data = self.has_data(), "Quote fetch failed");
                self.error = Some(ErrorInfo::from(&err));
                self.phase = if self.has_data() {
                    Phase::Idle { has_data: true }
                } else {
                    Phase::ErrorShown { has_data: false }
                };
            }
        }
    }
}

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: RefreshState, msg: Msg) -> (RefreshState, Vec<Effect>) {
    let effects = match msg {
        Msg::InitialLoadRequested => {
            if state.phase == Phase::InitialLoading {
                vec![state.begin_fetch()]
            } else {
                Vec::new()
            }
        }
        Msg::ManualRefreshRequested => match state.phase {
            Phase::Idle { .. } | Phase::Refreshing => {
                state.phase = Phase::Refreshing;
                vec![state.begin_fetch()]
            }
            Phase::InitialLoading | Phase::ErrorShown { .. } => Vec::new(),
        },
        Msg::RetryRequested => {
            if matches!(state.phase, Phase::ErrorShown { .. }) && !state.retry_pending {
                state.retry_pending = true;
                vec![Effect::ScheduleRetry { delay: RETRY_DELAY }]
            } else {
                Vec::new()
            }
        }
        Msg::RetryDelayElapsed => {
            if state.retry_pending && matches!(state.phase, Phase::ErrorShown { .. }) {
                state.phase = Phase::Refreshing;
                vec![state.begin_fetch()]
            } else {
                state.retry_pending = false;
                Vec::new()
            }
        }
        Msg::FetchResolved {
            ticket,
            outcome,
            at,
        } => {
            if state.latest_ticket == Some(ticket) {
                state.resolve(outcome, at);
            } else {
                debug!(ticket, latest = ?state.latest_ticket, "Discarding stale fetch result");
            }
            Vec::new()
        }
    };

    (state, effects)
}
