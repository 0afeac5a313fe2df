// =============================================================================
// Rate Gate — daily cap + cooldown between emitted signals
// =============================================================================
//
// Rules, checked once per scan pass:
//   1. Day roll   — when the calendar date (in the configured fixed UTC
//                   offset) differs from `day_marker`, the daily counter is
//                   reset to zero and the new state is persisted.
//   2. Daily cap  — deny once `signals_emitted_today >= max_signals_per_day`.
//   3. Cooldown   — deny while `now - last_signal_time < cooldown`.
//
// `commit()` is only called after the notification was delivered.  Every
// mutation is persisted synchronously with an atomic tmp + rename write, so a
// crash loses at most the decision that was in flight.
//
// A missing or corrupt state file is never fatal: the gate starts from a fresh
// zero state dated today.
// =============================================================================

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::config::BotConfig;
use crate::error::BotError;

// ---------------------------------------------------------------------------
// Persisted state
// ---------------------------------------------------------------------------

/// The only state that survives a restart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateState {
    /// Seconds since the UNIX epoch of the last delivered signal.
    pub last_signal_time: i64,
    pub signals_emitted_today: u32,
    /// Calendar date the counter belongs to (ISO `YYYY-MM-DD` on disk).
    pub day_marker: NaiveDate,
}

impl GateState {
    /// Zero state for `today`: nothing emitted, no previous signal.
    pub fn fresh(today: NaiveDate) -> Self {
        Self {
            last_signal_time: 0,
            signals_emitted_today: 0,
            day_marker: today,
        }
    }
}

/// JSON file holding a [`GateState`].
#[derive(Debug, Clone)]
pub struct GateStore {
    path: PathBuf,
}

impl GateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<GateState, BotError> {
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read gate state from {}", self.path.display()))
            .map_err(|source| self.persistence_error(source))?;

        serde_json::from_str(&content)
            .with_context(|| format!("failed to parse gate state from {}", self.path.display()))
            .map_err(|source| self.persistence_error(source))
    }

    /// Persist `state` using an atomic write (write to `.tmp`, fsync, then
    /// rename over the real file).
    pub fn save(&self, state: &GateState) -> Result<(), BotError> {
        self.write_atomic(state)
            .map_err(|source| self.persistence_error(source))
    }

    fn write_atomic(&self, state: &GateState) -> anyhow::Result<()> {
        let content =
            serde_json::to_string(state).context("failed to serialise gate state to JSON")?;

        let tmp_path = self.path.with_extension("json.tmp");

        let mut file = File::create(&tmp_path)
            .with_context(|| format!("failed to create {}", tmp_path.display()))?;
        file.write_all(content.as_bytes())
            .with_context(|| format!("failed to write {}", tmp_path.display()))?;
        file.sync_all()
            .with_context(|| format!("failed to sync {}", tmp_path.display()))?;

        std::fs::rename(&tmp_path, &self.path)
            .with_context(|| format!("failed to rename tmp state to {}", self.path.display()))?;

        Ok(())
    }

    fn persistence_error(&self, source: anyhow::Error) -> BotError {
        BotError::Persistence {
            path: self.path.clone(),
            source,
        }
    }
}

// ---------------------------------------------------------------------------
// Verdict
// ---------------------------------------------------------------------------

/// Outcome of [`RateGate::allow`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateVerdict {
    Allowed,
    DailyCapReached { emitted: u32, max: u32 },
    CoolingDown { remaining_secs: i64 },
}

impl GateVerdict {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }
}

impl std::fmt::Display for GateVerdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Allowed => write!(f, "Allowed"),
            Self::DailyCapReached { emitted, max } => {
                write!(f, "DailyCapReached({emitted}/{max})")
            }
            Self::CoolingDown { remaining_secs } => {
                write!(f, "CoolingDown({remaining_secs}s left)")
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Rate Gate
// ---------------------------------------------------------------------------

pub struct RateGate {
    state: GateState,
    store: GateStore,
    max_signals_per_day: u32,
    cooldown: Duration,
    /// Offset that defines where one calendar day ends.
    offset: FixedOffset,
}

impl RateGate {
    pub fn new(
        store: GateStore,
        state: GateState,
        max_signals_per_day: u32,
        cooldown: Duration,
        offset: FixedOffset,
    ) -> Self {
        Self {
            state,
            store,
            max_signals_per_day,
            cooldown,
            offset,
        }
    }

    /// Load the persisted state, falling back to a fresh state dated today
    /// when the file is missing or unreadable.
    pub fn load(
        store: GateStore,
        max_signals_per_day: u32,
        cooldown: Duration,
        offset: FixedOffset,
        now: DateTime<Utc>,
    ) -> Self {
        let state = match store.load() {
            Ok(state) => {
                info!(
                    path = %store.path().display(),
                    signals_emitted_today = state.signals_emitted_today,
                    day_marker = %state.day_marker,
                    "gate state loaded"
                );
                state
            }
            Err(e) => {
                warn!(error = %e.chain(), "using fresh gate state");
                GateState::fresh(now.with_timezone(&offset).date_naive())
            }
        };

        // A last signal before the epoch or in the future cannot be trusted.
        let state = if (0..=now.timestamp()).contains(&state.last_signal_time) {
            state
        } else {
            warn!(
                path = %store.path().display(),
                last_signal_time = state.last_signal_time,
                "gate state out of range, using fresh gate state"
            );
            GateState::fresh(now.with_timezone(&offset).date_naive())
        };

        info!(
            max_signals_per_day,
            cooldown_minutes = cooldown.num_minutes(),
            utc_offset = %offset,
            "RateGate initialised"
        );

        Self::new(store, state, max_signals_per_day, cooldown, offset)
    }

    pub fn from_config(config: &BotConfig, now: DateTime<Utc>) -> Self {
        Self::load(
            GateStore::new(&config.state_path),
            config.max_signals_per_day,
            config.cooldown(),
            config.utc_offset(),
            now,
        )
    }

    pub fn state(&self) -> &GateState {
        &self.state
    }

    // -------------------------------------------------------------------------
    // Pre-signal gate
    // -------------------------------------------------------------------------

    /// Check whether a signal may be emitted at `now`.
    pub fn allow(&mut self, now: DateTime<Utc>) -> GateVerdict {
        self.maybe_reset_daily(now);

        if self.state.signals_emitted_today >= self.max_signals_per_day {
            return GateVerdict::DailyCapReached {
                emitted: self.state.signals_emitted_today,
                max: self.max_signals_per_day,
            };
        }

        let elapsed = now.timestamp().saturating_sub(self.state.last_signal_time);
        let cooldown_secs = self.cooldown.num_seconds();
        if elapsed < cooldown_secs {
            return GateVerdict::CoolingDown {
                remaining_secs: cooldown_secs.saturating_sub(elapsed),
            };
        }

        GateVerdict::Allowed
    }

    /// Record a delivered signal at `now` and persist.
    ///
    /// The in-memory state is updated even when the write fails; the error is
    /// returned so the caller can surface it.
    pub fn commit(&mut self, now: DateTime<Utc>) -> Result<(), BotError> {
        self.maybe_reset_daily(now);

        self.state.last_signal_time = now.timestamp();
        self.state.signals_emitted_today += 1;

        debug!(
            signals_emitted_today = self.state.signals_emitted_today,
            last_signal_time = self.state.last_signal_time,
            "signal committed to rate gate"
        );

        self.store.save(&self.state)
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    fn today(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.offset).date_naive()
    }

    /// If the calendar date has changed since the last check, reset the daily
    /// counter and persist the new day.
    fn maybe_reset_daily(&mut self, now: DateTime<Utc>) {
        let today = self.today(now);
        if self.state.day_marker == today {
            return;
        }

        info!(
            old_date = %self.state.day_marker,
            new_date = %today,
            "date rolled — resetting daily signal counter"
        );
        self.state.day_marker = today;
        self.state.signals_emitted_today = 0;

        if let Err(e) = self.store.save(&self.state) {
            error!(error = %e.chain(), "failed to persist daily reset");
        }
    }
}

impl std::fmt::Debug for RateGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateGate")
            .field("state", &self.state)
            .field("path", &self.store.path())
            .field("max_signals_per_day", &self.max_signals_per_day)
            .field("cooldown", &self.cooldown)
            .field("offset", &self.offset)
            .finish()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ist() -> FixedOffset {
        FixedOffset::east_opt(330 * 60).unwrap()
    }

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, h, m, 0).unwrap()
    }

    fn gate_in(dir: &tempfile::TempDir, max: u32, cooldown_minutes: i64) -> RateGate {
        let store = GateStore::new(dir.path().join("state.json"));
        RateGate::load(store, max, Duration::minutes(cooldown_minutes), ist(), at(4, 0))
    }

    #[test]
    fn fresh_gate_allows() {
        let dir = tempfile::tempdir().unwrap();
        let mut gate = gate_in(&dir, 2, 20);
        assert_eq!(gate.state().signals_emitted_today, 0);
        assert_eq!(gate.state().last_signal_time, 0);
        assert!(gate.allow(at(4, 0)).is_allowed());
    }

    #[test]
    fn cooldown_then_allow_within_daily_cap() {
        let dir = tempfile::tempdir().unwrap();
        let mut gate = gate_in(&dir, 2, 20);

        assert!(gate.allow(at(4, 0)).is_allowed());
        gate.commit(at(4, 0)).unwrap();

        assert_eq!(
            gate.allow(at(4, 5)),
            GateVerdict::CoolingDown { remaining_secs: 15 * 60 }
        );
        assert!(gate.allow(at(4, 20)).is_allowed());
        gate.commit(at(4, 20)).unwrap();
        assert_eq!(gate.state().signals_emitted_today, 2);
    }

    #[test]
    fn daily_cap_blocks_regardless_of_cooldown() {
        let dir = tempfile::tempdir().unwrap();
        let mut gate = gate_in(&dir, 2, 20);
        gate.commit(at(4, 0)).unwrap();
        gate.commit(at(5, 0)).unwrap();

        // 10 hours later, still 2026-03-10 in IST (18:00 UTC = 23:30 IST).
        assert_eq!(
            gate.allow(at(18, 0)),
            GateVerdict::DailyCapReached { emitted: 2, max: 2 }
        );
    }

    #[test]
    fn day_roll_resets_counter_in_fixed_offset() {
        let dir = tempfile::tempdir().unwrap();
        let mut gate = gate_in(&dir, 2, 20);
        gate.commit(at(4, 0)).unwrap();
        gate.commit(at(5, 0)).unwrap();

        // 18:29 UTC is 23:59 IST — same day.
        assert!(!gate.allow(at(18, 29)).is_allowed());
        assert_eq!(gate.state().day_marker, NaiveDate::from_ymd_opt(2026, 3, 10).unwrap());

        // 18:30 UTC is midnight IST — new day, even though the UTC date is unchanged.
        assert!(gate.allow(at(18, 30)).is_allowed());
        assert_eq!(gate.state().signals_emitted_today, 0);
        assert_eq!(gate.state().day_marker, NaiveDate::from_ymd_opt(2026, 3, 11).unwrap());

        // The reset is on disk without any further commit.
        let on_disk = GateStore::new(dir.path().join("state.json")).load().unwrap();
        assert_eq!(on_disk.signals_emitted_today, 0);
        assert_eq!(on_disk.day_marker, NaiveDate::from_ymd_opt(2026, 3, 11).unwrap());
        assert_eq!(on_disk.last_signal_time, at(5, 0).timestamp());
    }

    #[test]
    fn cooldown_still_applies_after_day_roll() {
        let dir = tempfile::tempdir().unwrap();
        let mut gate = gate_in(&dir, 2, 20);
        gate.commit(at(18, 25)).unwrap(); // 23:55 IST

        let verdict = gate.allow(at(18, 35)); // 00:05 IST next day
        assert_eq!(gate.state().signals_emitted_today, 0);
        assert_eq!(verdict, GateVerdict::CoolingDown { remaining_secs: 10 * 60 });
    }

    #[test]
    fn commit_persists_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let mut gate = gate_in(&dir, 3, 20);
        gate.commit(at(4, 0)).unwrap();
        let expected = gate.state().clone();

        let reloaded = gate_in(&dir, 3, 20);
        assert_eq!(reloaded.state(), &expected);
        assert_eq!(reloaded.state().last_signal_time, at(4, 0).timestamp());
    }

    #[test]
    fn state_round_trip_is_exact() {
        let dir = tempfile::tempdir().unwrap();
        let store = GateStore::new(dir.path().join("state.json"));
        let state = GateState {
            last_signal_time: 1_773_115_200,
            signals_emitted_today: 7,
            day_marker: NaiveDate::from_ymd_opt(2026, 3, 10).unwrap(),
        };
        store.save(&state).unwrap();
        assert_eq!(store.load().unwrap(), state);
    }

    #[test]
    fn state_file_uses_documented_field_names() {
        let state = GateState::fresh(NaiveDate::from_ymd_opt(2026, 3, 10).unwrap());
        let json: serde_json::Value = serde_json::to_value(&state).unwrap();
        assert_eq!(json["day_marker"], "2026-03-10");
        assert_eq!(json["signals_emitted_today"], 0);
        assert_eq!(json["last_signal_time"], 0);
    }

    #[test]
    fn corrupt_state_falls_back_to_fresh() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("state.json"), "{ not json").unwrap();

        let gate = gate_in(&dir, 2, 20);
        assert_eq!(
            gate.state(),
            &GateState::fresh(NaiveDate::from_ymd_opt(2026, 3, 10).unwrap())
        );
    }

    #[test]
    fn out_of_range_last_signal_time_falls_back_to_fresh() {
        let fresh = GateState::fresh(NaiveDate::from_ymd_opt(2026, 3, 10).unwrap());
        for last_signal_time in [i64::MIN, -1, at(4, 1).timestamp(), i64::MAX] {
            let dir = tempfile::tempdir().unwrap();
            let stored = GateState {
                last_signal_time,
                signals_emitted_today: 1,
                day_marker: NaiveDate::from_ymd_opt(2026, 3, 10).unwrap(),
            };
            GateStore::new(dir.path().join("state.json")).save(&stored).unwrap();

            let mut gate = gate_in(&dir, 2, 20);
            assert_eq!(gate.state(), &fresh, "kept {last_signal_time}");
            assert!(gate.allow(at(4, 0)).is_allowed());
        }
    }

    #[test]
    fn extreme_last_signal_time_does_not_overflow() {
        let dir = tempfile::tempdir().unwrap();
        let state = GateState {
            last_signal_time: i64::MIN,
            signals_emitted_today: 0,
            day_marker: NaiveDate::from_ymd_opt(2026, 3, 10).unwrap(),
        };
        let store = GateStore::new(dir.path().join("state.json"));
        let mut gate = RateGate::new(store, state, 2, Duration::minutes(20), ist());
        assert!(gate.allow(at(4, 0)).is_allowed());

        gate.state.last_signal_time = i64::MAX;
        assert!(matches!(
            gate.allow(at(4, 0)),
            GateVerdict::CoolingDown { remaining_secs } if remaining_secs > 0
        ));
    }

    #[test]
    fn missing_state_file_is_a_persistence_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = GateStore::new(dir.path().join("missing.json"));
        assert!(matches!(store.load(), Err(BotError::Persistence { .. })));
    }

    #[test]
    fn failed_save_keeps_in_memory_commit() {
        let dir = tempfile::tempdir().unwrap();
        let store = GateStore::new(dir.path().join("no_such_dir").join("state.json"));
        let mut gate = RateGate::load(store, 2, Duration::minutes(20), ist(), at(4, 0));

        assert!(gate.commit(at(4, 0)).is_err());
        assert_eq!(gate.state().signals_emitted_today, 1);
        assert!(!gate.allow(at(4, 1)).is_allowed());
    }

    #[test]
    fn no_tmp_file_left_after_save() {
        let dir = tempfile::tempdir().unwrap();
        let mut gate = gate_in(&dir, 2, 20);
        gate.commit(at(4, 0)).unwrap();
        assert!(dir.path().join("state.json").exists());
        assert!(!dir.path().join("state.json.tmp").exists());
    }
}
