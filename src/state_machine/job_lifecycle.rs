// Copyright (c) 2025 - Cowboy AI, Inc.
//! Invalidation Job Lifecycle
//!
//! ```text
//!            Disabled ───────────────────────────────► Completed(CANCEL)
//!            ServiceUnavailable ─────────────────────► Completed(FAILED)
//! Received ──ClientResolved──► Resolved
//!            NoInput ────────────────────────────────► Completed(CANCEL)
//! Resolved ──PathsLoaded─────► Loaded
//!            UnknownMode ────────────────────────────► Completed(FAILED)
//!            NothingToPurge ─────────────────────────► Completed(CANCEL)
//! Loaded ────Dispatched──────► Dispatched
//! Dispatched ─PurgeFinished(true)────────────────────► Completed(OK)
//!             PurgeFinished(false) ──────────────────► Completed(FAILED)
//! (any non-terminal) ─Fault──────────────────────────► Completed(FAILED)
//! ```
//!
//! Every transition into `Completed` outputs the job's outcome; all other
//! transitions output `None`.

use std::fmt;

use super::{StateMachine, TransitionError, TransitionResult};
use crate::jobs::JobOutcome;

/// Where a job invocation currently stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    /// Job handed over by the job manager
    Received,
    /// CDN client handle obtained
    Resolved,
    /// Non-empty path batch read from the job
    Loaded,
    /// Purge request handed to the CDN client
    Dispatched,
    /// Terminal disposition reached
    Completed(JobOutcome),
}

impl JobState {
    /// Outcome once completed
    pub fn outcome(&self) -> Option<JobOutcome> {
        match self {
            JobState::Completed(outcome) => Some(*outcome),
            _ => None,
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobState::Received => write!(f, "RECEIVED"),
            JobState::Resolved => write!(f, "RESOLVED"),
            JobState::Loaded => write!(f, "LOADED"),
            JobState::Dispatched => write!(f, "DISPATCHED"),
            JobState::Completed(outcome) => write!(f, "COMPLETED({})", outcome),
        }
    }
}

/// Observation fed into the lifecycle by the job consumer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobSignal {
    Disabled,
    ServiceUnavailable,
    ClientResolved,
    NoInput,
    PathsLoaded,
    UnknownMode,
    NothingToPurge,
    Dispatched,
    PurgeFinished(bool),
    /// Unexpected error or panic
    Fault,
}

impl StateMachine for JobState {
    type Input = JobSignal;
    type Output = Option<JobOutcome>;

    fn transition(&self, input: &Self::Input) -> TransitionResult<(Self, Self::Output)> {
        use JobOutcome::{Cancel, Failed, Ok as Accepted};

        let next = match (self, input) {
            (JobState::Completed(_), _) => {
                return Err(TransitionError::Terminal(self.to_string()));
            }
            (_, JobSignal::Fault) => JobState::Completed(Failed),

            (JobState::Received, JobSignal::Disabled) => JobState::Completed(Cancel),
            (JobState::Received, JobSignal::ServiceUnavailable) => JobState::Completed(Failed),
            (JobState::Received, JobSignal::ClientResolved) => JobState::Resolved,

            (JobState::Resolved, JobSignal::NoInput) => JobState::Completed(Cancel),
            (JobState::Resolved, JobSignal::PathsLoaded) => JobState::Loaded,

            (JobState::Loaded, JobSignal::UnknownMode) => JobState::Completed(Failed),
            (JobState::Loaded, JobSignal::NothingToPurge) => JobState::Completed(Cancel),
            (JobState::Loaded, JobSignal::Dispatched) => JobState::Dispatched,

            (JobState::Dispatched, JobSignal::PurgeFinished(true)) => JobState::Completed(Accepted),
            (JobState::Dispatched, JobSignal::PurgeFinished(false)) => JobState::Completed(Failed),

            (state, signal) => {
                return Err(TransitionError::InvalidTransition {
                    from: state.to_string(),
                    input: format!("{:?}", signal),
                });
            }
        };

        Ok((next, next.outcome()))
    }

    fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed(_))
    }
}
