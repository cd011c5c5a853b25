// Copyright (c) 2025 - Cowboy AI, Inc.
//! Finite State Machine Abstractions
//!
//! Generic state machine types used to model the job lifecycle. Transitions
//! are deterministic functions with no side effects; the caller performs the
//! I/O and feeds the observed result back in as the next input.
//!
//! # Mealy Machine
//!
//! Output depends on both current state and input:
//! ```text
//! (State, Input) → (State, Output)
//! ```
//!
//! # Example
//!
//! ```rust
//! use cdn_invalidator::state_machine::{StateMachine, StateMachineWithHistory};
//! use cdn_invalidator::state_machine::job_lifecycle::{JobSignal, JobState};
//! use cdn_invalidator::jobs::JobOutcome;
//! use chrono::Utc;
//!
//! let mut job = StateMachineWithHistory::new(JobState::Received);
//! let outcome = job.transition_with_history(JobSignal::Disabled, Utc::now()).unwrap();
//! assert_eq!(outcome, Some(JobOutcome::Cancel));
//! ```

pub mod job_lifecycle;

use chrono::{DateTime, Utc};

/// Result of a state transition
pub type TransitionResult<S> = Result<S, TransitionError>;

/// Errors that can occur during state transitions
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    /// Input is not accepted in the current state
    #[error("Invalid transition from {from} on {input}")]
    InvalidTransition { from: String, input: String },

    /// State is terminal and accepts no further input
    #[error("State {0} is terminal")]
    Terminal(String),
}

/// Trait for finite state machines
///
/// Implement this trait to define a state machine with typed states,
/// inputs, and outputs.
pub trait StateMachine: Sized + Clone {
    /// Input type that triggers transitions
    type Input;

    /// Output type produced by transitions (use () if none)
    type Output;

    /// Attempt to transition to a new state given an input
    ///
    /// # Returns
    /// - Ok((new_state, output)) if transition is valid
    /// - Err(TransitionError) if transition is invalid
    fn transition(&self, input: &Self::Input) -> TransitionResult<(Self, Self::Output)>;

    /// Check if a transition is valid without performing it
    fn can_transition(&self, input: &Self::Input) -> bool {
        self.transition(input).is_ok()
    }

    /// Whether no input is accepted any more
    fn is_terminal(&self) -> bool;
}

/// Transition metadata
///
/// Records information about a state transition for auditing.
#[derive(Debug, Clone)]
pub struct Transition<S, I> {
    /// State before transition
    pub from: S,

    /// State after transition
    pub to: S,

    /// Input that triggered transition
    pub input: I,

    /// Timestamp of transition
    pub timestamp: DateTime<Utc>,
}

impl<S, I> Transition<S, I> {
    /// Create a new transition record
    pub fn new(from: S, to: S, input: I, timestamp: DateTime<Utc>) -> Self {
        Self {
            from,
            to,
            input,
            timestamp,
        }
    }
}

/// State machine with history
///
/// Wraps a state machine and tracks transition history.
#[derive(Debug, Clone)]
pub struct StateMachineWithHistory<FSM: StateMachine> {
    /// Current state
    pub current: FSM,

    /// When tracking started
    pub started_at: DateTime<Utc>,

    /// Transition history
    pub history: Vec<Transition<FSM, FSM::Input>>,
}

impl<FSM: StateMachine> StateMachineWithHistory<FSM> {
    /// Create a new state machine with history tracking
    pub fn new(initial: FSM) -> Self {
        Self {
            current: initial,
            started_at: Utc::now(),
            history: Vec::new(),
        }
    }

    /// Transition with history recording
    pub fn transition_with_history(
        &mut self,
        input: FSM::Input,
        timestamp: DateTime<Utc>,
    ) -> TransitionResult<FSM::Output>
    where
        FSM::Input: Clone,
    {
        let from = self.current.clone();
        let (to, output) = self.current.transition(&input)?;

        self.history
            .push(Transition::new(from, to.clone(), input, timestamp));

        self.current = to;
        Ok(output)
    }

    /// Get transition history
    pub fn get_history(&self) -> &[Transition<FSM, FSM::Input>] {
        &self.history
    }

    /// Get current state
    pub fn current_state(&self) -> &FSM {
        &self.current
    }

    /// Milliseconds between tracking start and the latest transition
    pub fn elapsed_ms(&self) -> i64 {
        self.history
            .last()
            .map(|t| (t.timestamp - self.started_at).num_milliseconds())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    // Simple test FSM: a one-shot fuse
    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Fuse {
        Armed,
        Blown,
    }

    #[derive(Debug, Clone)]
    enum Surge {
        Spike,
    }

    impl StateMachine for Fuse {
        type Input = Surge;
        type Output = ();

        fn transition(&self, input: &Self::Input) -> TransitionResult<(Self, Self::Output)> {
            match (self, input) {
                (Fuse::Armed, Surge::Spike) => Ok((Fuse::Blown, ())),
                (Fuse::Blown, _) => Err(TransitionError::Terminal("Blown".to_string())),
            }
        }

        fn is_terminal(&self) -> bool {
            matches!(self, Fuse::Blown)
        }
    }

    #[test]
    fn test_simple_transition() {
        let (new_state, _) = Fuse::Armed.transition(&Surge::Spike).unwrap();
        assert_eq!(new_state, Fuse::Blown);
        assert!(new_state.is_terminal());
        assert!(!new_state.can_transition(&Surge::Spike));
    }

    #[test]
    fn test_state_machine_with_history() {
        let mut fsm = StateMachineWithHistory::new(Fuse::Armed);
        let later = fsm.started_at + Duration::milliseconds(40);

        fsm.transition_with_history(Surge::Spike, later).unwrap();
        assert_eq!(*fsm.current_state(), Fuse::Blown);
        assert_eq!(fsm.get_history().len(), 1);
        assert_eq!(fsm.elapsed_ms(), 40);

        assert!(fsm.transition_with_history(Surge::Spike, later).is_err());
        assert_eq!(fsm.get_history().len(), 1);
    }
}
