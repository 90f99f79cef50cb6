//! Core channel and radar-event types shared across the DFS subsystem.
//!
//! Frequencies are carried as whole MHz (`u16`), IEEE channel numbers as
//! `u8`, and radar frequency offsets in 100 kHz units (`i32`) as reported
//! by the detection hardware. The usual 5 GHz mapping applies:
//! `freq_mhz = 5000 + 5 * ieee`.

use serde::{Deserialize, Serialize};

/// Width of a 20 MHz sub-channel, the minimum marking unit for NOL and
/// RCSA bitmap purposes.
pub const SUBCHANNEL_BANDWIDTH_MHZ: u16 = 20;

/// Operating channel width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelWidth {
    /// 20 MHz single channel.
    Mhz20,
    /// 40 MHz bonded pair.
    Mhz40,
    /// 80 MHz bonded quad.
    Mhz80,
    /// Contiguous 160 MHz.
    Mhz160,
    /// Non-contiguous 80+80 MHz (two independent 80 MHz segments).
    Mhz80Plus80,
    /// Contiguous 320 MHz (11be).
    Mhz320,
}

impl ChannelWidth {
    /// Number of constituent 20 MHz sub-channels for this width.
    pub fn subchannel_count(self) -> usize {
        match self {
            ChannelWidth::Mhz20 => 1,
            ChannelWidth::Mhz40 => 2,
            ChannelWidth::Mhz80 => 4,
            ChannelWidth::Mhz160 | ChannelWidth::Mhz80Plus80 => 8,
            ChannelWidth::Mhz320 => 16,
        }
    }
}

/// Frequency segment within a bonded channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentId {
    /// Segment 0, containing the primary channel.
    Primary,
    /// Segment 1 (second 80 MHz block of 80+80, or the wide-band half
    /// reported by detectors on 160/320 MHz channels).
    Secondary,
}

/// Which radar detector produced an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectorId {
    /// Detector tied to the operating channel.
    Normal,
    /// Independently tunable agile detector used for pre-CAC on channels
    /// other than the operating channel.
    Agile,
}

/// One operating channel configuration.
///
/// Supplied by the channel-list manager at the moment a radar event or a
/// CAC decision is processed; this subsystem never owns the channel list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DfsChannel {
    /// Primary 20 MHz IEEE channel number.
    pub ieee: u8,
    /// Primary 20 MHz channel center frequency (MHz).
    pub freq_mhz: u16,
    /// Segment 0 center frequency (MHz). Equals `freq_mhz` for 20 MHz;
    /// the band center for 40/80 MHz.
    pub seg0_center_mhz: u16,
    /// Segment 1 center frequency (MHz): the second 80 MHz center for
    /// 80+80, the wide-band center for 160/320 MHz, 0 when absent.
    /// Zero while a pre-CAC run borrows the secondary segment.
    pub seg1_center_mhz: u16,
    /// Channel width.
    pub width: ChannelWidth,
    /// Segment 0 requires DFS.
    pub dfs_seg0: bool,
    /// Segment 1 requires DFS.
    pub dfs_seg1: bool,
}

impl DfsChannel {
    /// True if any segment of this channel is DFS-applicable.
    pub fn is_dfs(&self) -> bool {
        self.dfs_seg0 || self.dfs_seg1
    }
}

/// IEEE channel number for a 5 GHz center frequency.
pub fn ieee_for_freq(freq_mhz: u16) -> u8 {
    ((freq_mhz.saturating_sub(5000)) / 5) as u8
}

/// Center frequency for a 5 GHz IEEE channel number.
pub fn freq_for_ieee(ieee: u8) -> u16 {
    5000 + 5 * ieee as u16
}

/// One radar detection event as delivered by firmware or the HAL.
///
/// Consumed synchronously by the radar indication processor, except while
/// a hardware mode switch is in progress, when it is moved into the
/// deferred-event slot and replayed after the switch completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RadarFoundInfo {
    /// Segment the detector was watching.
    pub segment: SegmentId,
    /// Which detector fired.
    pub detector: DetectorId,
    /// Signed offset from the segment center, in 100 kHz units.
    pub freq_offset: i32,
    /// Pulse was classified as a chirp by the firmware.
    pub is_chirp: bool,
    /// Absolute detection frequency (MHz) when the firmware supplies one
    /// directly; 0 when the offset/segment form must be resolved.
    pub freq_mhz: u16,
}

/// Telemetry events delivered to the external event collaborator, keyed
/// by the frequency they concern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DfsEvent {
    /// Radar confirmed on a channel.
    RadarDetected,
    /// A channel entered the non-occupancy list.
    NolStarted,
    /// A channel left the non-occupancy list.
    NolFinished,
    /// A channel availability check started.
    CacStarted,
    /// A channel availability check completed without radar.
    CacCompleted,
    /// The interface may come up after a clean CAC.
    UpAfterCac,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subchannel_counts() {
        assert_eq!(ChannelWidth::Mhz20.subchannel_count(), 1);
        assert_eq!(ChannelWidth::Mhz40.subchannel_count(), 2);
        assert_eq!(ChannelWidth::Mhz80.subchannel_count(), 4);
        assert_eq!(ChannelWidth::Mhz160.subchannel_count(), 8);
        assert_eq!(ChannelWidth::Mhz80Plus80.subchannel_count(), 8);
        assert_eq!(ChannelWidth::Mhz320.subchannel_count(), 16);
    }

    #[test]
    fn test_ieee_freq_mapping() {
        assert_eq!(freq_for_ieee(36), 5180);
        assert_eq!(freq_for_ieee(100), 5500);
        assert_eq!(ieee_for_freq(5180), 36);
        assert_eq!(ieee_for_freq(5500), 100);
        assert_eq!(ieee_for_freq(freq_for_ieee(149)), 149);
    }

    #[test]
    fn test_is_dfs() {
        let mut chan = DfsChannel {
            ieee: 100,
            freq_mhz: 5500,
            seg0_center_mhz: 5530,
            seg1_center_mhz: 0,
            width: ChannelWidth::Mhz80,
            dfs_seg0: true,
            dfs_seg1: false,
        };
        assert!(chan.is_dfs());
        chan.dfs_seg0 = false;
        assert!(!chan.is_dfs());
    }
}
