//! Feeding schedule computation.
//!
//! Everything here is pure: callers read the Device State, compute the next
//! feeding timestamp, and write it back themselves.
//!
//! Two policies exist and are never mixed:
//!
//! - [`FeedingPolicy::Reset`] anchors on the moment food was actually dispensed
//!   (manual feed or device confirmation): `next = now + interval`.
//! - [`FeedingPolicy::Drift`] keeps the existing rhythm when only the settings
//!   change: `next = current_next (or now) + interval`.

use chrono::{DateTime, Duration, Utc};

/// Interval used when the stored specification is absent or unparseable.
pub const DEFAULT_INTERVAL_SECONDS: i64 = 4 * 60 * 60;

/// A parsed feeding interval.
///
/// Specifications are a leading integer followed by an optional unit:
/// `s` seconds, `m` minutes, `h` hours. No unit means hours, so `"5"` is five
/// hours. Anything after the first unit letter is ignored (`"12 Hours"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedingInterval(Duration);

impl FeedingInterval {
    /// Parse a specification, returning `None` when it cannot be understood.
    ///
    /// Zero-length intervals and unknown units are rejected.
    #[must_use]
    pub fn try_parse(spec: &str) -> Option<Self> {
        let spec = spec.trim();
        let digits_end = spec
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(spec.len());
        let amount: i64 = spec[..digits_end].parse().ok()?;
        if amount == 0 {
            return None;
        }

        let unit_seconds = match spec[digits_end..].trim_start().chars().next() {
            None => 3600,
            Some(c) => match c.to_ascii_lowercase() {
                'h' => 3600,
                'm' => 60,
                's' => 1,
                _ => return None,
            },
        };

        let seconds = amount.checked_mul(unit_seconds)?;
        Duration::try_seconds(seconds).map(Self)
    }

    /// Parse a specification, falling back to four hours.
    #[must_use]
    pub fn parse_or_default(spec: Option<&str>) -> Self {
        spec.and_then(Self::try_parse).unwrap_or_default()
    }

    /// The interval as a duration.
    #[must_use]
    pub const fn duration(self) -> Duration {
        self.0
    }
}

impl Default for FeedingInterval {
    fn default() -> Self {
        Self(Duration::seconds(DEFAULT_INTERVAL_SECONDS))
    }
}

/// How the next feeding is anchored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedingPolicy {
    /// Continue from the currently scheduled feeding.
    Drift,
    /// Restart the cycle from now.
    Reset,
}

/// Compute the next feeding timestamp.
///
/// `current_next` is only consulted by [`FeedingPolicy::Drift`]. The result is
/// never earlier than `now`: when a drifted anchor lies so far in the past
/// that one interval is not enough, whole intervals are added until it is
/// in the future again, which keeps the original phase.
#[must_use]
pub fn next_feeding_at(
    interval: FeedingInterval,
    current_next: Option<DateTime<Utc>>,
    policy: FeedingPolicy,
    now: DateTime<Utc>,
) -> DateTime<Utc> {
    let step = interval.duration();
    let anchor = match policy {
        FeedingPolicy::Reset => now,
        FeedingPolicy::Drift => current_next.unwrap_or(now),
    };

    let next = add_saturating(anchor, step);
    if next >= now {
        return next;
    }

    // Catch up by whole intervals.
    let behind = (now - next).num_microseconds();
    let step_micros = step.num_microseconds();
    match (behind, step_micros) {
        (Some(behind), Some(step_micros)) if step_micros > 0 => {
            let steps = behind.div_euclid(step_micros) + i64::from(behind.rem_euclid(step_micros) != 0);
            let catch_up = step_micros
                .checked_mul(steps)
                .map(Duration::microseconds)
                .unwrap_or(step);
            let caught_up = add_saturating(next, catch_up);
            if caught_up >= now {
                caught_up
            } else {
                add_saturating(now, step)
            }
        }
        _ => add_saturating(now, step),
    }
}

fn add_saturating(at: DateTime<Utc>, delta: Duration) -> DateTime<Utc> {
    at.checked_add_signed(delta).unwrap_or(DateTime::<Utc>::MAX_UTC)
}
