//! Pre-CAC bookkeeping: the per-channel record of completed Channel
//! Availability Checks.
//!
//! A channel is either still *required* to run CAC or *done*; never both.
//! The ETSI variant gives "done" entries a fixed 24 hour lifetime,
//! checked lazily at query time with a strict less-than comparison (an
//! entry exactly 24 hours old is already expired). Radar on a channel
//! removes it from both sides, forcing a fresh CAC.

use crate::config::ETSI_PRECAC_DONE_LIFETIME_MS;
use std::collections::{BTreeMap, BTreeSet};

/// Required/done lists for one DFS context.
///
/// Keys are IEEE channel numbers of 20 MHz sub-channels. Construct with
/// [`PrecacList::standard`] for domains without a done-entry lifetime, or
/// [`PrecacList::etsi`] for the 24 hour ETSI variant.
#[derive(Debug, Default)]
pub struct PrecacList {
    required: BTreeSet<u8>,
    done: BTreeMap<u8, u64>,
    done_lifetime_ms: Option<u64>,
}

impl PrecacList {
    /// List whose "done" entries never expire.
    pub fn standard() -> Self {
        Self::default()
    }

    /// ETSI list: done entries live for 24 hours.
    pub fn etsi() -> Self {
        Self {
            done_lifetime_ms: Some(ETSI_PRECAC_DONE_LIFETIME_MS),
            ..Self::default()
        }
    }

    /// Seeds the required list from the channel list at attach time.
    /// Channels already marked done stay done.
    pub fn init_required<I: IntoIterator<Item = u8>>(&mut self, channels: I) {
        for ieee in channels {
            if !self.done.contains_key(&ieee) {
                self.required.insert(ieee);
            }
        }
    }

    /// Migrates a channel from required to done at `now_ms`.
    pub fn mark_cac_done(&mut self, ieee: u8, now_ms: u64) {
        self.required.remove(&ieee);
        self.done.insert(ieee, now_ms);
    }

    /// True while the channel's CAC completion is still valid.
    pub fn is_done(&self, ieee: u8, now_ms: u64) -> bool {
        match (self.done.get(&ieee), self.done_lifetime_ms) {
            (Some(&inserted), Some(lifetime)) => now_ms.saturating_sub(inserted) < lifetime,
            (Some(_), None) => true,
            (None, _) => false,
        }
    }

    /// True when the channel still needs a CAC.
    pub fn is_required(&self, ieee: u8) -> bool {
        self.required.contains(&ieee)
    }

    /// Radar revokes any clearance: the channel leaves both lists and is
    /// re-inserted as required. Returns true if it was on either list.
    pub fn mark_radar(&mut self, ieee: u8) -> bool {
        let was_listed = self.required.remove(&ieee) | self.done.remove(&ieee).is_some();
        self.required.insert(ieee);
        was_listed
    }

    /// Moves expired done entries back to required. Lazy counterpart of
    /// the 24 hour ETSI lifetime; a no-op for standard lists.
    pub fn purge_expired(&mut self, now_ms: u64) -> Vec<u8> {
        let Some(lifetime) = self.done_lifetime_ms else {
            return Vec::new();
        };
        let expired: Vec<u8> = self
            .done
            .iter()
            .filter(|(_, &inserted)| now_ms.saturating_sub(inserted) >= lifetime)
            .map(|(&ieee, _)| ieee)
            .collect();
        for ieee in &expired {
            self.done.remove(ieee);
            self.required.insert(*ieee);
        }
        expired
    }

    /// Drops all state (context detach).
    pub fn clear(&mut self) {
        self.required.clear();
        self.done.clear();
    }

    /// Channels currently on the required list.
    pub fn required_channels(&self) -> Vec<u8> {
        self.required.iter().copied().collect()
    }

    /// Channels currently on the done list, regardless of lifetime.
    pub fn done_channels(&self) -> Vec<u8> {
        self.done.keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded(etsi: bool) -> PrecacList {
        let mut list = if etsi {
            PrecacList::etsi()
        } else {
            PrecacList::standard()
        };
        list.init_required([52, 56, 60, 64]);
        list
    }

    // ------------------------------------------------------------------
    // 1. Required/done migration and disjointness
    // ------------------------------------------------------------------

    #[test]
    fn test_init_marks_required() {
        let list = seeded(false);
        assert!(list.is_required(52));
        assert!(!list.is_done(52, 0));
    }

    #[test]
    fn test_cac_done_migrates() {
        let mut list = seeded(false);
        list.mark_cac_done(52, 1000);
        assert!(!list.is_required(52));
        assert!(list.is_done(52, 1000));
        // standard list: done never expires
        assert!(list.is_done(52, u64::MAX));
    }

    #[test]
    fn test_lists_stay_disjoint() {
        let mut list = seeded(true);
        list.mark_cac_done(52, 0);
        list.mark_cac_done(56, 0);
        list.mark_radar(56);
        list.purge_expired(ETSI_PRECAC_DONE_LIFETIME_MS + 1);
        for ieee in [52u8, 56, 60, 64] {
            let required = list.required_channels().contains(&ieee);
            let done = list.done_channels().contains(&ieee);
            assert!(!(required && done), "channel {} on both lists", ieee);
        }
    }

    // ------------------------------------------------------------------
    // 2. ETSI 24 hour lifetime
    // ------------------------------------------------------------------

    #[test]
    fn test_etsi_done_expires_at_exactly_24h() {
        let mut list = seeded(true);
        list.mark_cac_done(52, 0);
        assert!(list.is_done(52, ETSI_PRECAC_DONE_LIFETIME_MS - 1));
        // strict less-than: exactly 86,400,000 ms old is NOT done
        assert!(!list.is_done(52, ETSI_PRECAC_DONE_LIFETIME_MS));
    }

    #[test]
    fn test_purge_moves_expired_back_to_required() {
        let mut list = seeded(true);
        list.mark_cac_done(52, 0);
        list.mark_cac_done(56, 10_000);
        let expired = list.purge_expired(ETSI_PRECAC_DONE_LIFETIME_MS);
        assert_eq!(expired, vec![52]);
        assert!(list.is_required(52));
        assert!(list.is_done(56, ETSI_PRECAC_DONE_LIFETIME_MS));
    }

    // ------------------------------------------------------------------
    // 3. Radar revocation
    // ------------------------------------------------------------------

    #[test]
    fn test_radar_revokes_from_either_list() {
        let mut list = seeded(true);
        list.mark_cac_done(52, 0);
        assert!(list.mark_radar(52)); // was done
        assert!(list.is_required(52));
        assert!(!list.is_done(52, 0));

        assert!(list.mark_radar(56)); // was required
        assert!(list.is_required(56));

        // unknown channel: nothing revoked, but now requires CAC
        assert!(!list.mark_radar(132));
        assert!(list.is_required(132));
    }

    #[test]
    fn test_clear_drops_everything() {
        let mut list = seeded(true);
        list.mark_cac_done(52, 0);
        list.clear();
        assert!(list.required_channels().is_empty());
        assert!(list.done_channels().is_empty());
    }
}
