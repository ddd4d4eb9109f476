//! Manual-override gate
//!
//! A manual update pauses the simulation for one drone for a cooldown so the
//! next ticks do not immediately overwrite what the operator just wrote.
//! Uses `tokio::time::Instant` so tests can drive the clock.

use dashmap::DashMap;
use drone_core::DroneId;
use std::time::Duration;
use tokio::time::Instant;

/// Per-drone pause deadlines
#[derive(Debug)]
pub struct OverrideGate {
    cooldown: Duration,
    pauses: DashMap<DroneId, Instant>,
}

impl OverrideGate {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            pauses: DashMap::new(),
        }
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Pause `id` until now + cooldown. A later pause extends an earlier one.
    pub fn pause(&self, id: &DroneId) {
        self.pauses.insert(id.clone(), Instant::now() + self.cooldown);
    }

    /// Whether `id` is still paused. An expired entry is removed on the
    /// first check after its deadline.
    pub fn is_paused(&self, id: &DroneId) -> bool {
        let now = Instant::now();
        if self
            .pauses
            .remove_if(id, |_, until| now >= *until)
            .is_some()
        {
            return false;
        }
        self.pauses.contains_key(id)
    }

    /// Time left on the pause of `id`, if paused
    pub fn remaining(&self, id: &DroneId) -> Option<Duration> {
        let now = Instant::now();
        self.pauses
            .get(id)
            .and_then(|until| until.checked_duration_since(now))
            .filter(|left| !left.is_zero())
    }

    /// Pauses that have not expired yet
    pub fn active_count(&self) -> usize {
        let now = Instant::now();
        self.pauses.iter().filter(|entry| now < *entry.value()).count()
    }

    pub fn clear(&self) {
        self.pauses.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_pause_expires_after_cooldown() {
        let gate = OverrideGate::new(Duration::from_secs(10));
        let id = DroneId::new("DRN-001");

        assert!(!gate.is_paused(&id));
        gate.pause(&id);
        assert!(gate.is_paused(&id));
        assert_eq!(gate.active_count(), 1);

        tokio::time::advance(Duration::from_secs(9)).await;
        assert!(gate.is_paused(&id));
        assert_eq!(gate.remaining(&id), Some(Duration::from_secs(1)));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(gate.active_count(), 0);
        assert!(!gate.is_paused(&id));
        assert!(gate.remaining(&id).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeat_pause_extends() {
        let gate = OverrideGate::new(Duration::from_secs(10));
        let id = DroneId::new("DRN-001");

        gate.pause(&id);
        tokio::time::advance(Duration::from_secs(8)).await;
        gate.pause(&id);
        tokio::time::advance(Duration::from_secs(8)).await;

        assert!(gate.is_paused(&id));
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear() {
        let gate = OverrideGate::new(Duration::from_secs(10));
        gate.pause(&DroneId::new("A"));
        gate.pause(&DroneId::new("B"));
        gate.clear();

        assert_eq!(gate.active_count(), 0);
        assert!(!gate.is_paused(&DroneId::new("A")));
    }
}
