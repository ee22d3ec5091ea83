//! Nudge rate limiting.
//!
//! There is no counter table: the nudge notifications already written for an
//! item are the limiter's state. The policy only looks at their timestamps.

use chrono::{DateTime, Duration, NaiveTime, Utc};

pub const NUDGE_COOLDOWN_MINUTES: i64 = 30;
pub const NUDGE_DAILY_CAP: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NudgeDenial {
    /// The previous nudge is younger than the cooldown.
    CoolingDown { remaining_minutes: i64 },
    /// The daily cap for the current UTC day is used up.
    DailyCapReached,
}

#[derive(Debug, Clone, Copy)]
pub struct NudgePolicy {
    pub cooldown: Duration,
    pub daily_cap: usize,
}

impl Default for NudgePolicy {
    fn default() -> Self {
        Self {
            cooldown: Duration::minutes(NUDGE_COOLDOWN_MINUTES),
            daily_cap: NUDGE_DAILY_CAP,
        }
    }
}

impl NudgePolicy {
    /// Decide whether one more nudge may go out at `now`, given the creation
    /// times of the earlier nudges for the same item (any order).
    ///
    /// The cooldown is checked first. A nudge exactly `cooldown` after the
    /// previous one is allowed. The daily cap counts nudges created at or
    /// after the start of `now`'s UTC day.
    pub fn evaluate(&self, now: DateTime<Utc>, history: &[DateTime<Utc>]) -> Result<(), NudgeDenial> {
        if let Some(last) = history.iter().max() {
            let elapsed = now - *last;
            if elapsed < self.cooldown {
                return Err(NudgeDenial::CoolingDown {
                    remaining_minutes: self.cooldown.num_minutes() - elapsed.num_minutes(),
                });
            }
        }

        let day_start = start_of_utc_day(now);
        let today = history.iter().filter(|t| **t >= day_start).count();
        if today >= self.daily_cap {
            return Err(NudgeDenial::DailyCapReached);
        }

        Ok(())
    }
}

pub fn start_of_utc_day(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive().and_time(NaiveTime::MIN).and_utc()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::at;

    #[test]
    fn first_nudge_is_allowed() {
        assert_eq!(NudgePolicy::default().evaluate(at(2026, 6, 1, 12, 0), &[]), Ok(()));
    }

    #[test]
    fn cooldown_reports_remaining_minutes() {
        let policy = NudgePolicy::default();
        let t = at(2026, 6, 1, 12, 0);

        assert_eq!(
            policy.evaluate(t + Duration::minutes(29), &[t]),
            Err(NudgeDenial::CoolingDown { remaining_minutes: 1 })
        );
        assert_eq!(
            policy.evaluate(t, &[t]),
            Err(NudgeDenial::CoolingDown { remaining_minutes: 30 })
        );
        // 29m59s elapsed still counts as 29 whole minutes
        assert_eq!(
            policy.evaluate(t + Duration::seconds(29 * 60 + 59), &[t]),
            Err(NudgeDenial::CoolingDown { remaining_minutes: 1 })
        );
    }

    #[test]
    fn cooldown_boundary_is_inclusive() {
        let policy = NudgePolicy::default();
        let t = at(2026, 6, 1, 12, 0);
        assert_eq!(policy.evaluate(t + Duration::minutes(30), &[t]), Ok(()));
    }

    #[test]
    fn cooldown_uses_the_latest_nudge() {
        let policy = NudgePolicy::default();
        let older = at(2026, 6, 1, 9, 0);
        let latest = at(2026, 6, 1, 11, 50);
        assert_eq!(
            policy.evaluate(at(2026, 6, 1, 12, 0), &[latest, older]),
            Err(NudgeDenial::CoolingDown { remaining_minutes: 20 })
        );
    }

    #[test]
    fn daily_cap_blocks_the_fourth() {
        let policy = NudgePolicy::default();
        let history = [at(2026, 6, 1, 8, 0), at(2026, 6, 1, 9, 0), at(2026, 6, 1, 10, 0)];
        assert_eq!(
            policy.evaluate(at(2026, 6, 1, 23, 0), &history),
            Err(NudgeDenial::DailyCapReached)
        );
        assert_eq!(policy.evaluate(at(2026, 6, 1, 23, 0), &history[..2]), Ok(()));
    }

    #[test]
    fn yesterday_does_not_count_after_midnight() {
        let policy = NudgePolicy::default();
        let history = [at(2026, 6, 1, 21, 0), at(2026, 6, 1, 22, 0), at(2026, 6, 1, 23, 0)];
        assert_eq!(policy.evaluate(at(2026, 6, 2, 0, 1), &history), Ok(()));
    }

    #[test]
    fn cooldown_spans_midnight() {
        let policy = NudgePolicy::default();
        let history = [at(2026, 6, 1, 23, 50)];
        assert_eq!(
            policy.evaluate(at(2026, 6, 2, 0, 5), &history),
            Err(NudgeDenial::CoolingDown { remaining_minutes: 15 })
        );
    }

    #[test]
    fn day_starts_at_utc_midnight() {
        let noon = at(2026, 6, 1, 12, 34);
        assert_eq!(start_of_utc_day(noon), at(2026, 6, 1, 0, 0));
    }
}
