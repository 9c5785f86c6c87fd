use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::{conversation, user};

#[derive(Clone, Copy, Debug)]
pub struct Config {
    ttl: Duration,
    sweep: Duration,
}

impl Config {
    pub const fn new(ttl: Duration, sweep: Duration) -> Self {
        Self { ttl, sweep }
    }

    /// How long an indicator stays visible without a fresh `typing:start`.
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    pub const fn sweep(&self) -> Duration {
        self.sweep
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(Duration::from_millis(5000), Duration::from_millis(1000))
    }
}

/// Typing indicators a single session currently shows, keyed by room.
pub struct TypingTracker {
    ttl: Duration,
    seen: HashMap<conversation::Id, HashMap<user::Id, Instant>>,
}

impl TypingTracker {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            seen: HashMap::new(),
        }
    }

    /// Records a start or a re-assertion. Returns `true` if the indicator was
    /// not shown before.
    pub fn observe_start(&mut self, c: &conversation::Id, u: &user::Id, now: Instant) -> bool {
        self.seen.entry(*c).or_default().insert(*u, now).is_none()
    }

    /// Returns `true` if the indicator was shown, i.e. a stop has to be relayed.
    pub fn observe_stop(&mut self, c: &conversation::Id, u: &user::Id) -> bool {
        let Some(users) = self.seen.get_mut(c) else {
            return false;
        };

        let removed = users.remove(u).is_some();
        if users.is_empty() {
            self.seen.remove(c);
        }
        removed
    }

    /// Drops every indicator not re-asserted within the ttl.
    pub fn expire(&mut self, now: Instant) -> Vec<(conversation::Id, user::Id)> {
        let ttl = self.ttl;
        let mut expired = vec![];

        self.seen.retain(|c, users| {
            users.retain(|u, at| {
                let alive = now.saturating_duration_since(*at) < ttl;
                if !alive {
                    expired.push((*c, *u));
                }
                alive
            });
            !users.is_empty()
        });

        expired
    }

    pub fn forget(&mut self, c: &conversation::Id) -> Vec<user::Id> {
        self.seen
            .remove(c)
            .map(|users| users.into_keys().collect())
            .unwrap_or_default()
    }

    pub fn is_typing(&self, c: &conversation::Id, u: &user::Id) -> bool {
        self.seen.get(c).is_some_and(|users| users.contains_key(u))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const TTL: Duration = Duration::from_secs(5);

    #[test]
    fn should_report_first_start_only() {
        let mut tracker = TypingTracker::new(TTL);
        let c = conversation::Id::random();
        let u = user::Id::random();
        let now = Instant::now();

        assert!(tracker.observe_start(&c, &u, now));
        assert!(!tracker.observe_start(&c, &u, now + Duration::from_secs(3)));
        assert!(tracker.is_typing(&c, &u));
    }

    #[test]
    fn should_expire_without_reassertion() {
        let mut tracker = TypingTracker::new(TTL);
        let c = conversation::Id::random();
        let u = user::Id::random();
        let start = Instant::now();
        tracker.observe_start(&c, &u, start);

        assert!(tracker.expire(start + Duration::from_secs(4)).is_empty());
        assert_eq!(tracker.expire(start + TTL), vec![(c, u)]);
        assert!(!tracker.is_typing(&c, &u));
    }

    #[test]
    fn should_keep_indicator_alive_on_reassertion() {
        let mut tracker = TypingTracker::new(TTL);
        let c = conversation::Id::random();
        let u = user::Id::random();
        let start = Instant::now();

        tracker.observe_start(&c, &u, start);
        tracker.observe_start(&c, &u, start + Duration::from_secs(3));
        tracker.observe_start(&c, &u, start + Duration::from_secs(6));

        assert!(tracker.expire(start + Duration::from_secs(10)).is_empty());
        assert!(tracker.is_typing(&c, &u));
    }

    #[test]
    fn should_not_relay_stop_after_expiry() {
        let mut tracker = TypingTracker::new(TTL);
        let c = conversation::Id::random();
        let u = user::Id::random();
        let start = Instant::now();
        tracker.observe_start(&c, &u, start);
        tracker.expire(start + TTL);

        assert!(!tracker.observe_stop(&c, &u));
    }

    #[test]
    fn should_forget_room() {
        let mut tracker = TypingTracker::new(TTL);
        let c = conversation::Id::random();
        let u = user::Id::random();
        tracker.observe_start(&c, &u, Instant::now());

        assert_eq!(tracker.forget(&c), vec![u]);
        assert!(tracker.forget(&c).is_empty());
    }
}
