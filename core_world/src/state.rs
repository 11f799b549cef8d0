use std::sync::{Arc, Mutex};

use bevy::prelude::*;
use crossbeam_channel::{unbounded, Receiver, Sender};
use thiserror::Error;

use world_proto::{Atmosphere, Era, Landmark, StatePatch, TraitKind, WorldState};

/// Notifications pushed to in-process observers.
#[derive(Debug, Clone)]
pub enum WorldEvent {
    /// Some mutation landed. Carries a full snapshot so observers never have
    /// to reconstruct state from deltas.
    StateChanged(WorldState),
    /// An inbound line parsed far enough to expose its routing tag. Fires
    /// before validation, so rejected commands still announce themselves.
    CommandReceived { kind: String, raw: String },
    /// Controller attached to or detached from the command channel.
    ConnectionChanged(bool),
}

/// Clonable fan-out bus. Subscribers get their own unbounded channel;
/// receivers that have been dropped are pruned on the next publish.
#[derive(Clone, Default)]
pub struct EventBus {
    subscribers: Arc<Mutex<Vec<Sender<WorldEvent>>>>,
}

impl EventBus {
    pub fn subscribe(&self) -> Receiver<WorldEvent> {
        let (tx, rx) = unbounded();
        self.subscribers
            .lock()
            .expect("event bus mutex poisoned")
            .push(tx);
        rx
    }

    pub fn publish(&self, event: &WorldEvent) {
        self.subscribers
            .lock()
            .expect("event bus mutex poisoned")
            .retain(|subscriber| subscriber.send(event.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .expect("event bus mutex poisoned")
            .len()
    }
}

/// Rejection for a spawn that reuses an already-registered landmark id.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("landmark id `{id}` already spawned")]
pub struct DuplicateLandmark {
    pub id: String,
}

/// Sole owner of the staged world. All writes go through methods here, on the
/// state-owning context only, and each successful mutation publishes one
/// [`WorldEvent::StateChanged`].
#[derive(Resource)]
pub struct WorldStateStore {
    state: WorldState,
    events: EventBus,
}

impl WorldStateStore {
    pub fn new(events: EventBus) -> Self {
        Self {
            state: WorldState::default(),
            events,
        }
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn snapshot(&self) -> WorldState {
        self.state.clone()
    }

    /// Swap in a whole new aggregate, e.g. a host-side reset.
    pub fn replace(&mut self, state: WorldState) {
        self.state = state;
        self.notify();
    }

    pub fn trait_value(&self, kind: TraitKind) -> f32 {
        self.state.trait_value(kind)
    }

    pub fn set_trait(&mut self, kind: TraitKind, value: f32) {
        self.state.set_trait(kind, value);
        self.notify();
    }

    pub fn era(&self) -> &Era {
        &self.state.era
    }

    pub fn set_era(&mut self, era: Era) {
        self.state.era = era;
        self.notify();
    }

    pub fn atmosphere(&self) -> Atmosphere {
        self.state.atmosphere
    }

    pub fn set_atmosphere(&mut self, atmosphere: Atmosphere) {
        self.state.atmosphere = atmosphere;
        self.notify();
    }

    /// Merge a partial sync payload as one atomic write: absent sections stay
    /// untouched, era fields overlay individually, trait values still clamp.
    /// Publishes a single notification for the whole merge.
    pub fn apply_patch(&mut self, patch: &StatePatch) {
        if let Some(era) = &patch.era {
            if let Some(id) = &era.id {
                self.state.era.id = id.clone();
            }
            if let Some(name) = &era.name {
                self.state.era.name = name.clone();
            }
            if let Some(period) = &era.period {
                self.state.era.period = period.clone();
            }
            if let Some(description) = &era.description {
                self.state.era.description = description.clone();
            }
        }
        if let Some(traits) = &patch.traits {
            for (kind, value) in traits.entries() {
                self.state.set_trait(kind, value);
            }
        }
        if let Some(atmosphere) = patch.atmosphere {
            self.state.atmosphere = atmosphere;
        }
        self.notify();
    }

    pub fn landmarks(&self) -> &[Landmark] {
        &self.state.landmarks
    }

    pub fn contains_landmark(&self, id: &str) -> bool {
        self.state.landmarks.iter().any(|landmark| landmark.id == id)
    }

    /// Append a landmark record, keeping insertion order. Duplicate ids are
    /// rejected with no effect and no notification.
    pub fn add_landmark(&mut self, landmark: Landmark) -> Result<(), DuplicateLandmark> {
        if self.contains_landmark(&landmark.id) {
            return Err(DuplicateLandmark { id: landmark.id });
        }
        self.state.landmarks.push(landmark);
        self.notify();
        Ok(())
    }

    /// Remove one landmark by id. Only an actual removal publishes.
    pub fn remove_landmark(&mut self, id: &str) -> bool {
        let before = self.state.landmarks.len();
        self.state.landmarks.retain(|landmark| landmark.id != id);
        let removed = self.state.landmarks.len() != before;
        if removed {
            self.notify();
        }
        removed
    }

    /// Drop every landmark record. Publishes unconditionally, even when the
    /// list was already empty.
    pub fn clear_landmarks(&mut self) {
        self.state.landmarks.clear();
        self.notify();
    }

    fn notify(&self) {
        self.events
            .publish(&WorldEvent::StateChanged(self.state.clone()));
    }
}
