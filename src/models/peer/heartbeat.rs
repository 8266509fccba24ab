use std::cmp::Ordering;
use std::time::SystemTime;

use serde::Deserialize;
use serde::Serialize;

/// Freshness metadata of a peer record.
///
/// `generation_time` is the instant the peer process started and
/// `elapsed_heartbeats` the number of seconds it has been alive, as last
/// reported by the peer itself.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct HeartbeatState {
    generation_time: SystemTime,
    elapsed_heartbeats: u64,
}

impl HeartbeatState {
    pub fn new(generation_time: SystemTime, elapsed_heartbeats: u64) -> Self {
        Self {
            generation_time,
            elapsed_heartbeats,
        }
    }

    /// A fresh heartbeat for a process starting [now](SystemTime::now).
    pub fn now() -> Self {
        Self::new(SystemTime::now(), 0)
    }

    pub fn generation_time(&self) -> SystemTime {
        self.generation_time
    }

    /// Seconds since generation. A heartbeat that was never refreshed reports
    /// the time elapsed until now.
    pub fn elapsed_heartbeats(&self) -> u64 {
        if self.elapsed_heartbeats == 0 {
            Self::seconds_between(self.generation_time, SystemTime::now())
        } else {
            self.elapsed_heartbeats
        }
    }

    /// Update the elapsed heartbeats to the time passed until `now`. Never
    /// moves backwards, even if the wall clock does.
    pub(crate) fn refresh(&mut self, now: SystemTime) {
        let elapsed = Self::seconds_between(self.generation_time, now);
        self.elapsed_heartbeats = self.elapsed_heartbeats.max(elapsed);
    }

    /// Decide which of two copies of a peer's state is authoritative.
    ///
    /// A later generation wins. Within the same generation the copy with more
    /// elapsed heartbeats wins. Equal states are never more recent than each
    /// other. Only the stored counters take part, so the outcome does not
    /// depend on when the comparison runs.
    pub fn more_recent_than(&self, other: &HeartbeatState) -> bool {
        match self.generation_time.cmp(&other.generation_time) {
            Ordering::Greater => true,
            Ordering::Less => false,
            Ordering::Equal => self.elapsed_heartbeats > other.elapsed_heartbeats,
        }
    }

    fn seconds_between(from: SystemTime, to: SystemTime) -> u64 {
        to.duration_since(from)
            .map(|elapsed| elapsed.as_secs())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;
    use std::time::UNIX_EPOCH;

    use test_strategy::proptest;

    use super::*;

    fn at(generation_secs: u64, elapsed: u64) -> HeartbeatState {
        HeartbeatState::new(UNIX_EPOCH + Duration::from_secs(generation_secs), elapsed)
    }

    #[test]
    fn later_generation_wins() {
        let old = at(100, 5000);
        let restarted = at(200, 1);
        assert!(restarted.more_recent_than(&old));
        assert!(!old.more_recent_than(&restarted));
    }

    #[test]
    fn more_heartbeats_win_within_a_generation() {
        let stale = at(100, 1000);
        let fresh = at(100, 1200);
        assert!(fresh.more_recent_than(&stale));
        assert!(!stale.more_recent_than(&fresh));
    }

    #[test]
    fn refresh_is_monotonic() {
        let generation = UNIX_EPOCH + Duration::from_secs(1_000);
        let mut heartbeat = HeartbeatState::new(generation, 0);

        heartbeat.refresh(generation + Duration::from_secs(30));
        assert_eq!(30, heartbeat.elapsed_heartbeats());

        // clock jumps backwards
        heartbeat.refresh(generation + Duration::from_secs(10));
        assert_eq!(30, heartbeat.elapsed_heartbeats());

        heartbeat.refresh(generation + Duration::from_secs(31));
        assert_eq!(31, heartbeat.elapsed_heartbeats());
    }

    #[test]
    fn unrefreshed_heartbeat_reports_time_since_generation() {
        let generation = SystemTime::now() - Duration::from_secs(120);
        let heartbeat = HeartbeatState::new(generation, 0);
        assert!(heartbeat.elapsed_heartbeats() >= 120);
    }

    #[proptest]
    fn ties_are_never_more_recent(generation: u32, elapsed: u64) {
        let a = at(generation.into(), elapsed);
        let b = at(generation.into(), elapsed);
        assert!(!a.more_recent_than(&b));
        assert!(!b.more_recent_than(&a));
    }

    #[proptest]
    fn more_recent_is_antisymmetric(
        generation_a: u32,
        elapsed_a: u64,
        generation_b: u32,
        elapsed_b: u64,
    ) {
        let a = at(generation_a.into(), elapsed_a);
        let b = at(generation_b.into(), elapsed_b);
        assert!(!(a.more_recent_than(&b) && b.more_recent_than(&a)));
        if a != b {
            assert!(a.more_recent_than(&b) || b.more_recent_than(&a));
        }
    }
}
