//! MLME/regulatory collaborator interface.
//!
//! The radar indication processor never talks to hardware, user space or
//! the regulatory database directly; everything crosses this trait.
//! Offload firmware and direct-attach hardware are two implementations
//! of the same interface instead of compile-time variants. The hardware
//! hook methods default to no-ops because offload platforms have nothing
//! to do there.
//!
//! All methods are synchronous and assumed non-blocking from this
//! subsystem's point of view. Failures inside a collaborator must be
//! handled by the collaborator; the processor treats every call as
//! fire-and-forget except where a return value is documented.

use crate::nol::NolEntry;
use crate::nol_ie::NolIe;
use crate::types::{DfsChannel, DfsEvent, RadarFoundInfo};

/// Capability set consumed by the DFS core.
pub trait DfsMlme: Send + Sync {
    /// True when this radar event should be ignored outright
    /// (self-test/injection modes owned by the regulatory layer).
    fn radar_event_ignored(&self, _radar: &RadarFoundInfo) -> bool {
        false
    }

    /// Propagates a Radar/Channel-Switch-Announcement, carrying the NOL
    /// information element when sub-channel marking is enabled. Returns
    /// true when the caller should wait for an externally driven channel
    /// switch instead of acting immediately.
    fn start_rcsa(&self, nol_ie: Option<&NolIe>) -> bool;

    /// Marks the operating channel DFS-hit (ieee/freq/cfreq2/flags travel
    /// inside the channel struct).
    fn mark_dfs(&self, chan: &DfsChannel);

    /// Regulatory CAC timeout in seconds for this channel.
    fn cac_timeout_secs(&self, chan: &DfsChannel) -> u32;

    /// Clean CAC completion for `chan`.
    fn cac_complete(&self, chan: &DfsChannel);

    /// Generic telemetry delivery, keyed by frequency and event type.
    fn deliver_event(&self, freq_mhz: u16, event: DfsEvent);

    /// Requests a channel change (also used for the CSA loop-back onto
    /// the current channel in radar-injection mode).
    fn request_channel_change(&self, chan: &DfsChannel);

    /// Pushes the updated NOL channel set to the regulatory database.
    fn reg_update_nol(&self, freqs: &[u16], in_nol: bool);

    /// Persistence hook: save the aggregate NOL so it survives a reboot.
    fn save_nol(&self, entries: &[NolEntry]);

    /// Direct-attach only: quiesce the primary radar detector and flush
    /// in-flight pulses ahead of a channel change.
    fn disable_radar_detection(&self) {}

    /// Direct-attach only: re-arm the primary radar detector once the
    /// radio settles back on a channel.
    fn enable_radar_detection(&self) {}

    /// Direct-attach only: quiesce the second-segment detector.
    fn disable_second_segment_radar(&self) {}
}

/// MLME implementation for offload platforms.
///
/// Firmware owns RCSA propagation and detector state on these targets,
/// so the core only needs telemetry to go somewhere visible; everything
/// lands in the tracing log. Useful as-is for simulation and as the
/// template for a real driver binding.
#[derive(Debug, Clone)]
pub struct OffloadMlme {
    /// CAC timeout handed back for every channel (seconds).
    pub cac_timeout_secs: u32,
}

impl Default for OffloadMlme {
    fn default() -> Self {
        // ETSI baseline CAC
        Self {
            cac_timeout_secs: 60,
        }
    }
}

impl DfsMlme for OffloadMlme {
    fn start_rcsa(&self, nol_ie: Option<&NolIe>) -> bool {
        tracing::info!(?nol_ie, "RCSA requested");
        false
    }

    fn mark_dfs(&self, chan: &DfsChannel) {
        tracing::info!(
            ieee = chan.ieee,
            freq_mhz = chan.freq_mhz,
            cfreq2_mhz = chan.seg1_center_mhz,
            "channel marked DFS-hit"
        );
    }

    fn cac_timeout_secs(&self, _chan: &DfsChannel) -> u32 {
        self.cac_timeout_secs
    }

    fn cac_complete(&self, chan: &DfsChannel) {
        tracing::info!(ieee = chan.ieee, "CAC complete");
    }

    fn deliver_event(&self, freq_mhz: u16, event: DfsEvent) {
        tracing::debug!(freq_mhz, ?event, "DFS event");
    }

    fn request_channel_change(&self, chan: &DfsChannel) {
        tracing::info!(ieee = chan.ieee, "channel change requested");
    }

    fn reg_update_nol(&self, freqs: &[u16], in_nol: bool) {
        tracing::debug!(?freqs, in_nol, "regulatory NOL update");
    }

    fn save_nol(&self, entries: &[NolEntry]) {
        tracing::debug!(count = entries.len(), "NOL persisted");
    }
}
