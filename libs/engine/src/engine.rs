//! The journaled actor engine.
//!
//! One `ActorEngine` is one activation of one actor. It owns the actor's
//! journal handle and in-memory state for the lifetime of the activation and
//! runs every command through the same protocol:
//!
//! 1. refuse the command if another is still in flight
//! 2. decode and validate the arguments; a rejection changes nothing
//! 3. append a freshly minted event to the journal
//! 4. advance the event id counter
//! 5. apply the event to state and advance the applied cursor
//!
//! Replay at activation runs only step 5, over events already in the journal.
//! Any failure once step 3 has happened, and any failure during replay,
//! flags the engine `Resetting`: it refuses further commands, asks to be
//! deactivated, and skips the final snapshot so the next activation rebuilds
//! from the journal alone.
//!
//! ```text
//!   Inactive -> Activating -> Replaying -> Ready -> Deactivating -> Inactive
//!                   |             |           |          ^
//!                   |             +-----------+--> Resetting
//!                   +------------------------------------^
//! ```

use std::fmt;
use std::sync::Arc;

use chronicle_events::Event;
use chronicle_id::{Address, EventId};
use chronicle_journal::{
    never_cancelled, CancelSignal, Journal, JournalExt, JournalProvider, Snapshot, SnapshotStore,
};
use serde_json::Value;
use tracing::{debug, error, info, instrument, warn};

use crate::dispatch::canonical_name;
use crate::{ActorKind, CommandContext, DispatchRegistry, EngineError};

/// Lifecycle phase of an activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    /// Not running.
    #[default]
    Inactive,
    /// Opening the journal and reading the snapshot.
    Activating,
    /// Re-applying journaled events past the snapshot cursor.
    Replaying,
    /// Accepting commands.
    Ready,
    /// State is suspect; waiting to be deactivated without a snapshot.
    Resetting,
    /// Persisting the final snapshot and releasing the journal.
    Deactivating,
}

impl Phase {
    /// Check if a transition to `next` is valid.
    pub fn can_transition_to(&self, next: Phase) -> bool {
        matches!(
            (self, next),
            (Phase::Inactive, Phase::Activating)
                | (Phase::Activating, Phase::Replaying)
                | (Phase::Activating, Phase::Resetting)
                | (Phase::Replaying, Phase::Ready)
                | (Phase::Replaying, Phase::Resetting)
                | (Phase::Ready, Phase::Resetting)
                | (Phase::Ready, Phase::Deactivating)
                | (Phase::Resetting, Phase::Deactivating)
                | (Phase::Deactivating, Phase::Inactive)
        )
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Inactive => "inactive",
            Phase::Activating => "activating",
            Phase::Replaying => "replaying",
            Phase::Ready => "ready",
            Phase::Resetting => "resetting",
            Phase::Deactivating => "deactivating",
        };
        f.write_str(name)
    }
}

/// A single activation of a journaled actor of kind `A`.
pub struct ActorEngine<A: ActorKind> {
    address: Address,
    journal: Arc<dyn Journal>,
    snapshots: Arc<dyn SnapshotStore>,
    registry: &'static DispatchRegistry<A::State>,
    state: A::State,
    /// Id of the last event folded into `state`.
    last_applied: EventId,
    next_event_id: EventId,
    phase: Phase,
    /// Set while a command is between validation and apply.
    evaluating: bool,
    deactivation_requested: bool,
}

impl<A: ActorKind> fmt::Debug for ActorEngine<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActorEngine")
            .field("address", &self.address)
            .field("phase", &self.phase)
            .field("last_applied", &self.last_applied)
            .field("next_event_id", &self.next_event_id)
            .field("evaluating", &self.evaluating)
            .finish_non_exhaustive()
    }
}

impl<A: ActorKind> ActorEngine<A> {
    /// Activates the actor at `address`.
    ///
    /// Opens its journal, loads the snapshot cursor, and replays every later
    /// event. A snapshot that no longer decodes is ignored and the state is
    /// rebuilt from the whole journal. A failed or cancelled replay returns
    /// the error and writes nothing, so the next activation starts again from
    /// the same snapshot.
    #[instrument(skip_all, fields(address = %address))]
    pub async fn activate(
        address: Address,
        journals: &dyn JournalProvider,
        snapshots: Arc<dyn SnapshotStore>,
        cancel: &CancelSignal,
    ) -> Result<Self, EngineError> {
        if address.kind() != A::KIND {
            return Err(EngineError::WrongKind {
                address,
                expected: A::KIND,
            });
        }

        let journal = journals.open(&address).await?;
        // Ids up to a discarded snapshot's cursor are already taken.
        let mut floor = EventId::ZERO;
        let (state, cursor) = match snapshots.read(&address).await? {
            Some(snapshot) => match serde_json::from_value(snapshot.state) {
                Ok(state) => (state, snapshot.last_applied_event_id),
                Err(err) => {
                    warn!(
                        error = %err,
                        cursor = %snapshot.last_applied_event_id,
                        "snapshot does not decode; rebuilding from the journal"
                    );
                    floor = snapshot.last_applied_event_id;
                    (A::State::default(), EventId::ZERO)
                }
            },
            None => (A::State::default(), EventId::ZERO),
        };
        debug!(cursor = %cursor, "loaded snapshot cursor");

        let mut engine = Self {
            address,
            journal,
            snapshots,
            registry: A::registry(),
            state,
            last_applied: cursor,
            next_event_id: cursor.next(),
            phase: Phase::Activating,
            evaluating: false,
            deactivation_requested: false,
        };

        engine.transition(Phase::Replaying);
        match engine.replay(cancel).await {
            Ok(applied) => {
                engine.last_applied = engine.last_applied.max(floor);
                engine.next_event_id = engine.last_applied.next();
                engine.transition(Phase::Ready);
                info!(
                    applied,
                    cursor = %engine.last_applied,
                    "actor activated"
                );
                Ok(engine)
            }
            Err(err) => {
                engine.flag_reset();
                error!(
                    error = %err,
                    cursor = %engine.last_applied,
                    "replay failed; snapshot left untouched"
                );
                Err(err)
            }
        }
    }

    /// Re-applies every journaled event past the cursor. Returns the number
    /// of events applied.
    async fn replay(&mut self, cancel: &CancelSignal) -> Result<u64, EngineError> {
        let journal = self.journal.clone();
        let registry = self.registry;
        let after = self.last_applied;
        let address = &self.address;
        let state = &mut self.state;
        let cursor = &mut self.last_applied;
        let mut applied = 0u64;

        journal
            .read_from::<EngineError, _>(
                after,
                |event| {
                    if event.id <= *cursor {
                        return Err(EngineError::consistency(
                            address,
                            format!("journal returned event {} after {}", event.id, cursor),
                        ));
                    }
                    registry.replay(state, &event)?;
                    *cursor = event.id;
                    applied += 1;
                    Ok(())
                },
                cancel,
            )
            .await?;

        Ok(applied)
    }

    /// Runs one command against the actor.
    ///
    /// Journaled events go through validate, write and apply, and return the
    /// apply handler's result. Queries run directly against state.
    #[instrument(skip(self, ctx, args), fields(address = %self.address, event_type = %event_type))]
    pub async fn execute(
        &mut self,
        ctx: &CommandContext,
        event_type: &str,
        args: Vec<Value>,
    ) -> Result<Value, EngineError> {
        self.ensure_accepting()?;

        if self.evaluating {
            error!("previous command never completed; resetting");
            self.flag_reset();
            return Err(EngineError::Reentrancy {
                address: self.address.clone(),
            });
        }

        if !self.registry.is_journaled(event_type)? {
            return Ok(self.registry.query(&self.state, event_type, &args)?);
        }

        self.evaluating = true;
        let result = self.evaluate(ctx, event_type, args).await;
        self.evaluating = false;
        result
    }

    async fn evaluate(
        &mut self,
        ctx: &CommandContext,
        event_type: &str,
        args: Vec<Value>,
    ) -> Result<Value, EngineError> {
        let args = self.registry.normalize_args(event_type, &args)?;
        if let Err(err) = self.registry.validate(&self.state, event_type, &args) {
            debug!(error = %err, "command rejected");
            return Err(err.into());
        }

        let minted = self.next_event_id;
        let mut builder = Event::builder()
            .to(self.address.clone())
            .id(minted)
            .event_type(canonical_name(event_type))
            .args(args)
            .correlation_id(ctx.correlation_id.unwrap_or_default())
            .extras(ctx.extras.clone());
        if let Some(user_id) = ctx.user_id {
            builder = builder.user_id(user_id);
        }
        let event = builder.build()?;

        if let Err(err) = self.journal.append(&event).await {
            if err.is_conflict() {
                error!(event_id = %minted, "journal holds another event under this id; resetting");
                self.flag_reset();
            }
            return Err(err.into());
        }
        self.advance_counter(minted)?;

        match self
            .registry
            .apply(&mut self.state, &event.event_type, &event.args)
        {
            Ok(result) => {
                self.last_applied = minted;
                debug!(event_id = %minted, "event applied");
                Ok(result)
            }
            Err(err) => {
                error!(event_id = %minted, error = %err, "apply failed after write; resetting");
                self.flag_reset();
                Err(EngineError::consistency(
                    &self.address,
                    format!("event {minted} was journaled but could not be applied: {err}"),
                ))
            }
        }
    }

    fn advance_counter(&mut self, minted: EventId) -> Result<(), EngineError> {
        self.next_event_id = self.next_event_id.next();
        if self.next_event_id != minted.next() {
            error!(event_id = %minted, next = %self.next_event_id, "event id counter out of step; resetting");
            self.flag_reset();
            return Err(EngineError::consistency(
                &self.address,
                format!("event id counter did not advance past {minted}"),
            ));
        }
        Ok(())
    }

    /// Reads journaled events with `id > after`, at most `max_results` when
    /// positive, with arguments converted to their declared types.
    #[instrument(skip(self), fields(address = %self.address))]
    pub async fn history(
        &self,
        after: EventId,
        max_results: i64,
    ) -> Result<Vec<Event>, EngineError> {
        let registry = self.registry;
        let mut events = Vec::new();
        self.journal
            .batch_read_from::<EngineError, _>(
                after,
                |batch| {
                    for mut event in batch {
                        event.args = registry.normalize_args(&event.event_type, &event.args)?;
                        events.push(event);
                    }
                    Ok(())
                },
                &never_cancelled(),
                max_results,
            )
            .await?;
        Ok(events)
    }

    /// Administrative reset: returns state to its default, records that as
    /// the snapshot at the applied cursor, then clears the journal up to it.
    ///
    /// The cursor stays in the snapshot, so ids are never reused even if the
    /// activation ends without a final snapshot.
    #[instrument(skip(self), fields(address = %self.address))]
    pub async fn clear(&mut self) -> Result<(), EngineError> {
        self.ensure_accepting()?;
        let cleared = A::State::default();
        let encoded = serde_json::to_value(&cleared).map_err(|source| EngineError::State {
            address: self.address.clone(),
            source,
        })?;
        self.snapshots
            .write(&self.address, &Snapshot::new(self.last_applied, encoded))
            .await?;
        self.state = cleared;
        self.journal.clear(self.last_applied).await?;
        info!(cleared_through = %self.last_applied, "actor state cleared");
        Ok(())
    }

    /// Ends the activation.
    ///
    /// Writes the final snapshot unless the engine is resetting or a command
    /// was abandoned mid-flight. The journal handle is released either way.
    #[instrument(skip(self), fields(address = %self.address))]
    pub async fn deactivate(mut self) -> Result<(), EngineError> {
        let suspect = self.phase == Phase::Resetting || self.evaluating;
        self.transition(Phase::Deactivating);

        let result = if suspect {
            warn!(
                cursor = %self.last_applied,
                "skipping snapshot; next activation rebuilds from the journal"
            );
            Ok(())
        } else {
            self.write_snapshot().await
        };

        self.transition(Phase::Inactive);
        debug!("actor deactivated");
        result
    }

    async fn write_snapshot(&self) -> Result<(), EngineError> {
        let state = serde_json::to_value(&self.state).map_err(|source| EngineError::State {
            address: self.address.clone(),
            source,
        })?;
        let snapshot = Snapshot::new(self.last_applied, state);
        self.snapshots.write(&self.address, &snapshot).await?;
        debug!(last_applied = %self.last_applied, "snapshot written");
        Ok(())
    }

    fn ensure_accepting(&self) -> Result<(), EngineError> {
        match self.phase {
            Phase::Ready => Ok(()),
            Phase::Resetting => Err(EngineError::Resetting {
                address: self.address.clone(),
            }),
            phase => Err(EngineError::NotReady {
                address: self.address.clone(),
                phase,
            }),
        }
    }

    fn flag_reset(&mut self) {
        if self.phase != Phase::Resetting {
            self.transition(Phase::Resetting);
        }
        self.deactivation_requested = true;
    }

    fn transition(&mut self, next: Phase) {
        debug_assert!(
            self.phase.can_transition_to(next),
            "invalid phase transition {} -> {}",
            self.phase,
            next
        );
        self.phase = next;
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn state(&self) -> &A::State {
        &self.state
    }

    /// Id of the last event folded into state.
    pub fn last_applied_event_id(&self) -> EventId {
        self.last_applied
    }

    /// Id the next journaled event will get.
    pub fn next_event_id(&self) -> EventId {
        self.next_event_id
    }

    /// Id of the last event minted by or replayed into this activation.
    pub fn last_event_id(&self) -> EventId {
        self.next_event_id.prev()
    }

    /// Returns true once the engine has asked its host to deactivate it.
    pub fn deactivation_requested(&self) -> bool {
        self.deactivation_requested
    }

    /// Returns true if a command was dropped between validation and apply.
    pub fn has_abandoned_command(&self) -> bool {
        self.evaluating
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Phase::Inactive, Phase::Activating, true)]
    #[case(Phase::Activating, Phase::Replaying, true)]
    #[case(Phase::Replaying, Phase::Ready, true)]
    #[case(Phase::Replaying, Phase::Resetting, true)]
    #[case(Phase::Ready, Phase::Resetting, true)]
    #[case(Phase::Resetting, Phase::Deactivating, true)]
    #[case(Phase::Deactivating, Phase::Inactive, true)]
    #[case(Phase::Inactive, Phase::Ready, false)]
    #[case(Phase::Resetting, Phase::Ready, false)]
    #[case(Phase::Ready, Phase::Replaying, false)]
    #[case(Phase::Deactivating, Phase::Ready, false)]
    fn test_phase_transitions(#[case] from: Phase, #[case] to: Phase, #[case] valid: bool) {
        assert_eq!(from.can_transition_to(to), valid);
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(Phase::Resetting.to_string(), "resetting");
        assert_eq!(Phase::default(), Phase::Inactive);
    }
}
