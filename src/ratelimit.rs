//! Failed-attempt rate limiting, persisted in `<vault>/vault.lock` (spec
//! §4.5). `unlock` consults this file before attempting key derivation; a
//! successful unlock deletes it.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::paths;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct LockState {
    pub failed_attempts: u32,
    pub last_attempt: Option<DateTime<Utc>>,
    pub cooldown_until: Option<DateTime<Utc>>,
    pub lockout_count: u32,
}

impl LockState {
    /// Remaining cooldown in whole seconds, if a cooldown is currently active.
    pub fn remaining_cooldown(&self, now: DateTime<Utc>) -> Option<u64> {
        let until = self.cooldown_until?;
        if until > now {
            Some((until - now).num_seconds().max(0) as u64)
        } else {
            None
        }
    }
}

pub struct RateLimiter {
    path: PathBuf,
}

impl RateLimiter {
    pub fn new(root: &Path) -> Self {
        Self {
            path: paths::VaultPaths::new(root).lock_state(),
        }
    }

    pub fn load(&self) -> Result<LockState> {
        if !self.path.exists() {
            return Ok(LockState::default());
        }
        let data = fs::read(&self.path)?;
        match serde_json::from_slice(&data) {
            Ok(state) => Ok(state),
            // A corrupted lock-state file must never brick unlock; treat it
            // as "no prior failures" rather than surfacing vault-corrupted.
            Err(_) => Ok(LockState::default()),
        }
    }

    fn save(&self, state: &LockState) -> Result<()> {
        let data = serde_json::to_vec_pretty(state)?;
        fs::write(&self.path, data)?;
        paths::set_mode(&self.path, 0o600)?;
        Ok(())
    }

    /// Records a failed unlock attempt, applying the cooldown schedule:
    /// the 5th cumulative failure sets a 30s cooldown, the 10th sets 5 min,
    /// and the 20th sets 30 min, each overwriting any previous cooldown.
    pub fn record_failure(&self, now: DateTime<Utc>) -> Result<LockState> {
        let mut state = self.load()?;
        state.failed_attempts += 1;
        state.last_attempt = Some(now);

        if let Some(duration_secs) = cooldown_for(state.failed_attempts) {
            state.cooldown_until = Some(now + chrono::Duration::seconds(duration_secs as i64));
            state.lockout_count += 1;
        }

        self.save(&state)?;
        Ok(state)
    }

    /// Clears all rate-limiter state after a successful unlock.
    pub fn clear(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path)?;
        }
        Ok(())
    }
}

/// Cooldown duration in seconds for the given cumulative failure count, or
/// `None` if this count doesn't cross a threshold.
fn cooldown_for(failed_attempts: u32) -> Option<u64> {
    match failed_attempts {
        5 => Some(30),
        10 => Some(5 * 60),
        20 => Some(30 * 60),
        _ => None,
    }
}
