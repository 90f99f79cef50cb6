//! Non-Occupancy List (NOL): quarantine bookkeeping for radar-hit
//! channels.
//!
//! Entries are keyed by channel frequency in an ordered map. A channel is
//! "in NOL" from insertion until its timeout elapses; expiry is evaluated
//! lazily against the caller-supplied clock, and an explicit sweep
//! removes dead entries and reports them so the owner can emit
//! NOL-finished telemetry and persist the new aggregate state.
//!
//! Insertions arrive in batches, one batch per radar event. The batch
//! inserts every valid DFS candidate and silently skips the rest; it
//! fails only when the entire candidate list was invalid, in which case
//! there is nothing to quarantine.
//!
//! ## Example
//!
//! ```
//! use dfs_core::nol::NolStore;
//!
//! let mut nol = NolStore::new();
//! nol.add_channel(5500, 1_800_000, 0);
//! assert!(nol.is_channel_in_nol(5500, 1_799_999));
//! assert!(!nol.is_channel_in_nol(5500, 1_800_000));
//! ```

use crate::error::{DfsError, DfsResult};
use std::collections::BTreeMap;

/// One quarantined sub-channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NolEntry {
    /// Channel center frequency (MHz).
    pub freq_mhz: u16,
    /// Insertion timestamp (ms).
    pub start_ms: u64,
    /// Quarantine duration (ms).
    pub timeout_ms: u64,
}

impl NolEntry {
    /// Absolute expiry timestamp.
    pub fn expires_ms(&self) -> u64 {
        self.start_ms.saturating_add(self.timeout_ms)
    }
}

/// Time-keyed set of quarantined channels.
#[derive(Debug, Default)]
pub struct NolStore {
    entries: BTreeMap<u16, NolEntry>,
}

impl NolStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or refreshes a quarantine entry.
    ///
    /// Re-insertion restarts the clock but never shortens an existing
    /// quarantine: the effective expiry is the later of the old and new
    /// deadlines. Returns true when the channel was newly quarantined.
    pub fn add_channel(&mut self, freq_mhz: u16, timeout_ms: u64, now_ms: u64) -> bool {
        match self.entries.get_mut(&freq_mhz) {
            Some(entry) if now_ms < entry.expires_ms() => {
                let old_expiry = entry.expires_ms();
                entry.start_ms = now_ms;
                entry.timeout_ms = timeout_ms.max(old_expiry - now_ms);
                false
            }
            _ => {
                self.entries.insert(
                    freq_mhz,
                    NolEntry {
                        freq_mhz,
                        start_ms: now_ms,
                        timeout_ms,
                    },
                );
                true
            }
        }
    }

    /// Batch insert for one radar event.
    ///
    /// `timeout_for` supplies the per-channel quarantine duration and
    /// `is_dfs` decides whether a candidate qualifies at all. Valid
    /// candidates are inserted, invalid ones skipped; the call fails only
    /// when no candidate qualified. Returns the list of frequencies that
    /// were inserted or refreshed, in candidate order.
    pub fn add_channels(
        &mut self,
        candidates: &[u16],
        now_ms: u64,
        timeout_for: impl Fn(u16) -> u64,
        is_dfs: impl Fn(u16) -> bool,
    ) -> DfsResult<Vec<u16>> {
        let mut inserted = Vec::with_capacity(candidates.len());
        for &freq in candidates {
            if !is_dfs(freq) {
                tracing::debug!(freq_mhz = freq, "skipping non-DFS NOL candidate");
                continue;
            }
            self.add_channel(freq, timeout_for(freq), now_ms);
            if !inserted.contains(&freq) {
                inserted.push(freq);
            }
        }
        if inserted.is_empty() {
            return Err(DfsError::NoDfsSubchannels(candidates.to_vec()));
        }
        Ok(inserted)
    }

    /// True while `freq_mhz` is quarantined. Expired entries are ignored
    /// even before the sweep removes them.
    pub fn is_channel_in_nol(&self, freq_mhz: u16, now_ms: u64) -> bool {
        self.entries
            .get(&freq_mhz)
            .map(|e| now_ms < e.expires_ms())
            .unwrap_or(false)
    }

    /// Removes expired entries and returns their frequencies, ascending.
    pub fn sweep(&mut self, now_ms: u64) -> Vec<u16> {
        let expired: Vec<u16> = self
            .entries
            .values()
            .filter(|e| now_ms >= e.expires_ms())
            .map(|e| e.freq_mhz)
            .collect();
        for freq in &expired {
            self.entries.remove(freq);
        }
        expired
    }

    /// Explicitly removes one entry (ETSI pre-CAC radar handling moves
    /// the channel into its own quarantine mechanism instead).
    pub fn remove_channel(&mut self, freq_mhz: u16) -> Option<NolEntry> {
        self.entries.remove(&freq_mhz)
    }

    /// Snapshot of all live entries, ordered by frequency.
    pub fn entries(&self) -> Vec<NolEntry> {
        self.entries.values().copied().collect()
    }

    /// Frequencies of all live (non-expired) entries.
    pub fn channels(&self, now_ms: u64) -> Vec<u16> {
        self.entries
            .values()
            .filter(|e| now_ms < e.expires_ms())
            .map(|e| e.freq_mhz)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
