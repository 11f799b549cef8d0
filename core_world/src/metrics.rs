use bevy::prelude::*;

/// Counters over the command channel since startup (or the last reset).
/// Written only by the dispatcher; hosts read them for overlays or logs.
#[derive(Resource, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommandMetrics {
    pub commands_applied: u64,
    pub decode_failures: u64,
    pub validation_failures: u64,
    pub unrecognized: u64,
    pub duplicates_rejected: u64,
    pub landmarks_spawned: u64,
    pub placements_degraded: u64,
    pub acks_sent: u64,
    pub connections: u64,
    pub disconnections: u64,
}

impl CommandMetrics {
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
