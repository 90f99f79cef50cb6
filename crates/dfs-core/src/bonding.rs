//! Channel/bonding model: enumerates the 20 MHz sub-channels composing
//! a wider operating channel.
//!
//! Sub-channel centers sit symmetrically around the (sub-)segment center
//! at 20 MHz spacing: ±10 for 40 MHz, ±10/±30 for 80 MHz, out to ±150
//! for 320 MHz. Three situations change where the center comes from:
//!
//! - **Agile detector**: the set is derived around the agile pre-CAC
//!   frequency, not the operating channel.
//! - **165 MHz-restricted 80+80**: the agile center shifts by the fixed
//!   asymmetric −35/+45 MHz segment offsets before the 80 MHz set is
//!   derived.
//! - **Pre-CAC on the secondary segment**: the channel struct's secondary
//!   center reads zero while pre-CAC borrows that segment, so the
//!   separate pre-CAC secondary frequency is used instead.
//!
//! ## Example
//!
//! ```
//! use dfs_core::bonding::{bonding_channels, DetectorContext};
//! use dfs_core::types::{ChannelWidth, DetectorId, DfsChannel, SegmentId};
//!
//! let chan = DfsChannel {
//!     ieee: 100,
//!     freq_mhz: 5500,
//!     seg0_center_mhz: 5530,
//!     seg1_center_mhz: 0,
//!     width: ChannelWidth::Mhz80,
//!     dfs_seg0: true,
//!     dfs_seg1: false,
//! };
//! let subs = bonding_channels(
//!     &chan,
//!     SegmentId::Primary,
//!     DetectorId::Normal,
//!     &DetectorContext::default(),
//! )
//! .unwrap();
//! assert_eq!(subs, vec![5500, 5520, 5540, 5560]);
//! ```

use crate::error::{DfsError, DfsResult};
use crate::types::{ChannelWidth, DetectorId, DfsChannel, SegmentId};

/// Asymmetric segment-center shifts for the 165 MHz-restricted 80+80
/// hybrid (MHz): the two 80 MHz segments sit unevenly around the agile
/// center.
pub const RESTRICTED_80P80_LEFT_SHIFT_MHZ: i32 = -35;
pub const RESTRICTED_80P80_RIGHT_SHIFT_MHZ: i32 = 45;

/// Detector-side state consulted when the sub-channel set cannot be read
/// straight off the operating channel.
#[derive(Debug, Clone, Copy, Default)]
pub struct DetectorContext {
    /// Center frequency the agile detector is parked on (MHz).
    pub agile_center_mhz: Option<u16>,
    /// Width of the agile pre-CAC run; defaults to 80 MHz when unset.
    pub agile_width: Option<ChannelWidth>,
    /// Secondary-segment center while a pre-CAC timer runs there (MHz).
    pub precac_secondary_mhz: Option<u16>,
    /// Operating in the 165 MHz-restricted 80+80 configuration.
    pub restricted_80p80: bool,
}

/// Sub-channel centers spread symmetrically around `center` at 20 MHz
/// spacing. `count == 1` yields the center itself.
fn spread(center_mhz: u16, count: usize) -> Vec<u16> {
    if count == 1 {
        return vec![center_mhz];
    }
    let first = center_mhz as i32 - (count as i32 * 10 - 10);
    (0..count).map(|i| (first + 20 * i as i32) as u16).collect()
}

/// Enumerates the 20 MHz sub-channel centers for one segment of a
/// channel, honoring the agile and pre-CAC special cases.
///
/// Guarantees: the returned set is sorted, duplicate-free, and its length
/// matches the width's sub-channel count for the covered segment(s).
pub fn bonding_channels(
    chan: &DfsChannel,
    segment: SegmentId,
    detector: DetectorId,
    dctx: &DetectorContext,
) -> DfsResult<Vec<u16>> {
    if detector == DetectorId::Agile {
        return agile_bonding_channels(segment, dctx);
    }

    match chan.width {
        ChannelWidth::Mhz20 | ChannelWidth::Mhz40 | ChannelWidth::Mhz80 => {
            if segment != SegmentId::Primary {
                return Err(DfsError::UnsupportedWidthForSegment(segment));
            }
            Ok(spread(chan.seg0_center_mhz, chan.width.subchannel_count()))
        }
        ChannelWidth::Mhz80Plus80 => {
            let center = match segment {
                SegmentId::Primary => chan.seg0_center_mhz,
                SegmentId::Secondary => secondary_center(chan, dctx)?,
            };
            Ok(spread(center, 4))
        }
        ChannelWidth::Mhz160 | ChannelWidth::Mhz320 => {
            // The wide-band center lives in the secondary-segment field;
            // the full set covers both reported segments.
            let center = secondary_center(chan, dctx)?;
            Ok(spread(center, chan.width.subchannel_count()))
        }
    }
}

/// Secondary-segment (or wide-band) center, falling back to the pre-CAC
/// secondary frequency while the channel field reads zero.
fn secondary_center(chan: &DfsChannel, dctx: &DetectorContext) -> DfsResult<u16> {
    if chan.seg1_center_mhz != 0 {
        Ok(chan.seg1_center_mhz)
    } else if let Some(freq) = dctx.precac_secondary_mhz {
        Ok(freq)
    } else {
        Err(DfsError::UnsupportedWidthForSegment(SegmentId::Secondary))
    }
}

fn agile_bonding_channels(segment: SegmentId, dctx: &DetectorContext) -> DfsResult<Vec<u16>> {
    let center = dctx.agile_center_mhz.ok_or(DfsError::NoAgileFrequency)?;
    if dctx.restricted_80p80 {
        let shift = match segment {
            SegmentId::Primary => RESTRICTED_80P80_LEFT_SHIFT_MHZ,
            SegmentId::Secondary => RESTRICTED_80P80_RIGHT_SHIFT_MHZ,
        };
        return Ok(spread((center as i32 + shift) as u16, 4));
    }
    let width = dctx.agile_width.unwrap_or(ChannelWidth::Mhz80);
    Ok(spread(center, width.subchannel_count()))
}

/// Full sub-channel set of the operating channel across all segments,
/// sorted ascending.
pub fn subchannels_of(chan: &DfsChannel, dctx: &DetectorContext) -> DfsResult<Vec<u16>> {
    match chan.width {
        ChannelWidth::Mhz80Plus80 => {
            let mut subs =
                bonding_channels(chan, SegmentId::Primary, DetectorId::Normal, dctx)?;
            subs.extend(bonding_channels(
                chan,
                SegmentId::Secondary,
                DetectorId::Normal,
                dctx,
            )?);
            subs.sort_unstable();
            subs.dedup();
            Ok(subs)
        }
        _ => bonding_channels(chan, SegmentId::Primary, DetectorId::Normal, dctx),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chan(width: ChannelWidth, seg0: u16, seg1: u16) -> DfsChannel {
        DfsChannel {
            ieee: 100,
            freq_mhz: 5500,
            seg0_center_mhz: seg0,
            seg1_center_mhz: seg1,
            width,
            dfs_seg0: true,
            dfs_seg1: seg1 != 0,
        }
    }

    fn normal(chan: &DfsChannel, segment: SegmentId) -> Vec<u16> {
        bonding_channels(chan, segment, DetectorId::Normal, &DetectorContext::default())
            .unwrap()
    }

    // ------------------------------------------------------------------
    // 1. Per-width sub-channel sets
    // ------------------------------------------------------------------

    #[test]
    fn test_20mhz_single_channel() {
        let c = chan(ChannelWidth::Mhz20, 5500, 0);
        assert_eq!(normal(&c, SegmentId::Primary), vec![5500]);
    }

    #[test]
    fn test_40mhz_pair() {
        let c = chan(ChannelWidth::Mhz40, 5510, 0);
        assert_eq!(normal(&c, SegmentId::Primary), vec![5500, 5520]);
    }

    #[test]
    fn test_80mhz_quad() {
        let c = chan(ChannelWidth::Mhz80, 5530, 0);
        assert_eq!(normal(&c, SegmentId::Primary), vec![5500, 5520, 5540, 5560]);
    }

    #[test]
    fn test_160mhz_eight() {
        let c = chan(ChannelWidth::Mhz160, 5530, 5570);
        let subs = normal(&c, SegmentId::Primary);
        assert_eq!(
            subs,
            vec![5500, 5520, 5540, 5560, 5580, 5600, 5620, 5640]
        );
    }

    #[test]
    fn test_80p80_two_independent_sets() {
        let c = chan(ChannelWidth::Mhz80Plus80, 5210, 5775);
        assert_eq!(normal(&c, SegmentId::Primary), vec![5180, 5200, 5220, 5240]);
        assert_eq!(normal(&c, SegmentId::Secondary), vec![5745, 5765, 5785, 5805]);
    }

    #[test]
    fn test_320mhz_sixteen() {
        let c = chan(ChannelWidth::Mhz320, 5530, 5650);
        let subs = normal(&c, SegmentId::Primary);
        assert_eq!(subs.len(), 16);
        assert_eq!(subs[0], 5500);
        assert_eq!(subs[15], 5800);
        // symmetric around the wide-band center
        assert_eq!(subs[7] + subs[8], 2 * 5650);
    }

    #[test]
    fn test_counts_match_width_for_all_widths() {
        let cases = [
            (ChannelWidth::Mhz20, 5500u16, 0u16),
            (ChannelWidth::Mhz40, 5510, 0),
            (ChannelWidth::Mhz80, 5530, 0),
            (ChannelWidth::Mhz160, 5530, 5570),
            (ChannelWidth::Mhz320, 5530, 5650),
        ];
        for (width, seg0, seg1) in cases {
            let c = chan(width, seg0, seg1);
            let subs = normal(&c, SegmentId::Primary);
            assert_eq!(subs.len(), width.subchannel_count(), "{:?}", width);
            let mut dedup = subs.clone();
            dedup.dedup();
            assert_eq!(dedup.len(), subs.len(), "duplicates for {:?}", width);
        }
    }

    // ------------------------------------------------------------------
    // 2. Error paths
    // ------------------------------------------------------------------

    #[test]
    fn test_secondary_segment_rejected_below_80p80() {
        let c = chan(ChannelWidth::Mhz80, 5530, 0);
        let err = bonding_channels(
            &c,
            SegmentId::Secondary,
            DetectorId::Normal,
            &DetectorContext::default(),
        )
        .unwrap_err();
        assert_eq!(err, DfsError::UnsupportedWidthForSegment(SegmentId::Secondary));
    }

    #[test]
    fn test_agile_without_frequency_is_an_error() {
        let c = chan(ChannelWidth::Mhz80, 5530, 0);
        let err = bonding_channels(
            &c,
            SegmentId::Primary,
            DetectorId::Agile,
            &DetectorContext::default(),
        )
        .unwrap_err();
        assert_eq!(err, DfsError::NoAgileFrequency);
    }

    // ------------------------------------------------------------------
    // 3. Agile and pre-CAC special cases
    // ------------------------------------------------------------------

    #[test]
    fn test_agile_uses_precac_frequency() {
        let c = chan(ChannelWidth::Mhz80, 5210, 0);
        let dctx = DetectorContext {
            agile_center_mhz: Some(5530),
            ..DetectorContext::default()
        };
        let subs = bonding_channels(&c, SegmentId::Primary, DetectorId::Agile, &dctx).unwrap();
        assert_eq!(subs, vec![5500, 5520, 5540, 5560]);
    }

    #[test]
    fn test_agile_restricted_80p80_asymmetric_shift() {
        let c = chan(ChannelWidth::Mhz80Plus80, 5210, 0);
        let dctx = DetectorContext {
            agile_center_mhz: Some(5530),
            restricted_80p80: true,
            ..DetectorContext::default()
        };
        let left =
            bonding_channels(&c, SegmentId::Primary, DetectorId::Agile, &dctx).unwrap();
        let right =
            bonding_channels(&c, SegmentId::Secondary, DetectorId::Agile, &dctx).unwrap();
        // left 80 MHz set around 5530-35=5495, right around 5530+45=5575
        assert_eq!(left, vec![5465, 5485, 5505, 5525]);
        assert_eq!(right, vec![5545, 5565, 5585, 5605]);
    }

    #[test]
    fn test_precac_secondary_fallback_when_seg1_is_zero() {
        // During pre-CAC the channel struct's secondary field reads zero
        let c = chan(ChannelWidth::Mhz80Plus80, 5210, 0);
        let dctx = DetectorContext {
            precac_secondary_mhz: Some(5775),
            ..DetectorContext::default()
        };
        let subs =
            bonding_channels(&c, SegmentId::Secondary, DetectorId::Normal, &dctx).unwrap();
        assert_eq!(subs, vec![5745, 5765, 5785, 5805]);
    }

    // ------------------------------------------------------------------
    // 4. Whole-channel enumeration
    // ------------------------------------------------------------------

    #[test]
    fn test_subchannels_of_80p80_concatenates_segments() {
        let c = chan(ChannelWidth::Mhz80Plus80, 5210, 5775);
        let subs = subchannels_of(&c, &DetectorContext::default()).unwrap();
        assert_eq!(
            subs,
            vec![5180, 5200, 5220, 5240, 5745, 5765, 5785, 5805]
        );
    }

    #[test]
    fn test_subchannels_of_160_covers_both_segments() {
        let c = chan(ChannelWidth::Mhz160, 5530, 5570);
        let subs = subchannels_of(&c, &DetectorContext::default()).unwrap();
        assert_eq!(subs.len(), 8);
    }
}
