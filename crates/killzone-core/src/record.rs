//! Match records, the match driver and replay.
//!
//! A `MatchRecord` holds everything needed to reproduce a match: the
//! battlefield, the starting roster, the initiative rolls and the ordered
//! log of actions (with `None` for a pass). Because every random choice is
//! made by decision providers before an action reaches the state machine,
//! re-applying the log always reaches the same final state.

use crate::actions::{Action, MatchEvent};
use crate::battlefield::{Battlefield, Side};
use crate::game::{Initiative, MatchError, MatchState};
use crate::operative::OperativeState;
use crate::policy::DecisionProvider;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Complete, replayable log of a match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub battlefield: Arc<Battlefield>,
    pub initial_roster: Vec<OperativeState>,
    pub initiative: Initiative,
    /// Applied actions in order; `None` is a pass
    pub actions: Vec<Option<Action>>,
    pub attacker_score: u32,
    pub defender_score: u32,
}

impl MatchRecord {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// The state the match started from
    pub fn initial_state(&self) -> Result<MatchState, MatchError> {
        MatchState::new(
            Arc::clone(&self.battlefield),
            self.initial_roster.clone(),
            self.initiative,
        )
    }

    /// Re-apply the whole log and check the final scores against the record
    pub fn replay(&self) -> Result<MatchState, MatchError> {
        let mut replay = MatchReplay::new(self)?;
        while replay.step()?.is_some() {}

        let state = replay.into_state();
        let actual = (state.attacker_score(), state.defender_score());
        let expected = (self.attacker_score, self.defender_score);
        if actual != expected {
            return Err(MatchError::ReplayDiverged { expected, actual });
        }
        Ok(state)
    }

    pub fn winner(&self) -> Option<Side> {
        match self.attacker_score.cmp(&self.defender_score) {
            std::cmp::Ordering::Greater => Some(Side::Attacker),
            std::cmp::Ordering::Less => Some(Side::Defender),
            std::cmp::Ordering::Equal => None,
        }
    }
}

/// A match being played while its actions are logged
#[derive(Debug, Clone)]
pub struct MatchRecorder {
    state: MatchState,
    initial_roster: Vec<OperativeState>,
    actions: Vec<Option<Action>>,
}

impl MatchRecorder {
    /// Start recording from `state`, which should be a freshly created match
    pub fn new(state: MatchState) -> Self {
        Self {
            initial_roster: state.operatives().to_vec(),
            state,
            actions: Vec::new(),
        }
    }

    pub fn state(&self) -> &MatchState {
        &self.state
    }

    pub fn actions(&self) -> &[Option<Action>] {
        &self.actions
    }

    /// Apply an action and log it; rejected actions are not logged
    pub fn apply(&mut self, action: Option<Action>) -> Result<Vec<MatchEvent>, MatchError> {
        let events = self.state.apply_action(action)?;
        self.actions.push(action);
        Ok(events)
    }

    /// Snapshot of the log so far, scored with the current totals
    pub fn record(&self) -> MatchRecord {
        MatchRecord {
            battlefield: Arc::clone(self.state.battlefield_arc()),
            initial_roster: self.initial_roster.clone(),
            initiative: *self.state.initiative(),
            actions: self.actions.clone(),
            attacker_score: self.state.attacker_score(),
            defender_score: self.state.defender_score(),
        }
    }

    pub fn into_parts(self) -> (MatchState, MatchRecord) {
        let record = self.record();
        (self.state, record)
    }
}

/// Play a match to completion, asking each side's provider for its actions.
///
/// An action a provider returns that fails validation is propagated as
/// `MatchError::IllegalAction`.
pub fn play_match(
    state: MatchState,
    attacker: &mut dyn DecisionProvider,
    defender: &mut dyn DecisionProvider,
    max_steps: usize,
) -> Result<(MatchState, MatchRecord), MatchError> {
    let mut recorder = MatchRecorder::new(state);

    for step in 0..max_steps {
        if recorder.state().is_finished() {
            return Ok(recorder.into_parts());
        }

        let side = recorder.state().current_turn();
        let action = match side {
            Side::Attacker => attacker.decide(recorder.state()),
            Side::Defender => defender.decide(recorder.state()),
        };

        match &action {
            Some(action) => debug!(step, %side, %action, "applying action"),
            None => debug!(step, %side, "passing"),
        }
        recorder.apply(action)?;
    }

    if recorder.state().is_finished() {
        Ok(recorder.into_parts())
    } else {
        Err(MatchError::StepLimitExceeded(max_steps))
    }
}

/// Steps through a record one action at a time
#[derive(Debug, Clone)]
pub struct MatchReplay<'a> {
    record: &'a MatchRecord,
    state: MatchState,
    cursor: usize,
}

impl<'a> MatchReplay<'a> {
    pub fn new(record: &'a MatchRecord) -> Result<Self, MatchError> {
        Ok(Self {
            record,
            state: record.initial_state()?,
            cursor: 0,
        })
    }

    /// Apply the next logged action, returning its events, or `None` once
    /// the log is exhausted
    pub fn step(&mut self) -> Result<Option<Vec<MatchEvent>>, MatchError> {
        let Some(action) = self.record.actions.get(self.cursor) else {
            return Ok(None);
        };
        let events = self.state.apply_action(*action)?;
        self.cursor += 1;
        Ok(Some(events))
    }

    pub fn state(&self) -> &MatchState {
        &self.state
    }

    /// Number of actions applied so far
    pub fn position(&self) -> usize {
        self.cursor
    }

    pub fn is_done(&self) -> bool {
        self.cursor >= self.record.actions.len()
    }

    pub fn into_state(self) -> MatchState {
        self.state
    }
}
