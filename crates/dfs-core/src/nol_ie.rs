//! RCSA NOL information element.
//!
//! When sub-channel marking is enabled, a radar hit is relayed to an
//! uplink/backhaul AP as a compact payload: the marking unit (fixed at
//! the 20 MHz sub-channel width), the start frequency of the lowest
//! bonded sub-channel, and a bitmap with bit `i` set when sub-channel
//! `i` (counting up from the lowest frequency) is radar-affected. With
//! marking disabled the legacy whole-channel behavior applies and no IE
//! is sent.

use crate::bonding::{subchannels_of, DetectorContext};
use crate::error::DfsResult;
use crate::types::{DfsChannel, SUBCHANNEL_BANDWIDTH_MHZ};

/// NOL information element carried in an RCSA.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NolIe {
    /// Marking unit bandwidth (MHz); always the 20 MHz sub-channel width.
    pub bandwidth_mhz: u16,
    /// Center frequency of the lowest bonded sub-channel (MHz).
    pub start_freq_mhz: u16,
    /// Bit `i` set when the `i`-th lowest sub-channel is radar-affected.
    pub bitmap: u16,
}

/// Builds the IE for the current operating channel and one radar event's
/// affected sub-channel list. Affected frequencies outside the bonded
/// set are ignored.
pub fn build_nol_ie(
    chan: &DfsChannel,
    affected: &[u16],
    dctx: &DetectorContext,
) -> DfsResult<NolIe> {
    let bonded = subchannels_of(chan, dctx)?;
    let mut bitmap = 0u16;
    for (i, freq) in bonded.iter().enumerate() {
        if affected.contains(freq) {
            bitmap |= 1 << i;
        }
    }
    Ok(NolIe {
        bandwidth_mhz: SUBCHANNEL_BANDWIDTH_MHZ,
        start_freq_mhz: bonded[0],
        bitmap,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChannelWidth;

    fn chan80() -> DfsChannel {
        DfsChannel {
            ieee: 100,
            freq_mhz: 5500,
            seg0_center_mhz: 5530,
            seg1_center_mhz: 0,
            width: ChannelWidth::Mhz80,
            dfs_seg0: true,
            dfs_seg1: false,
        }
    }

    #[test]
    fn test_bitmap_counts_from_lowest_subchannel() {
        // bonded: {5500, 5520, 5540, 5560}
        let ie = build_nol_ie(&chan80(), &[5520, 5560], &DetectorContext::default()).unwrap();
        assert_eq!(ie.bandwidth_mhz, 20);
        assert_eq!(ie.start_freq_mhz, 5500);
        assert_eq!(ie.bitmap, 0b1010);
    }

    #[test]
    fn test_empty_affected_yields_zero_bitmap() {
        let ie = build_nol_ie(&chan80(), &[], &DetectorContext::default()).unwrap();
        assert_eq!(ie.bitmap, 0);
    }

    #[test]
    fn test_spurious_frequencies_ignored() {
        let ie = build_nol_ie(&chan80(), &[5500, 4900], &DetectorContext::default()).unwrap();
        assert_eq!(ie.bitmap, 0b0001);
    }

    #[test]
    fn test_320mhz_uses_all_sixteen_bits() {
        let chan = DfsChannel {
            ieee: 100,
            freq_mhz: 5500,
            seg0_center_mhz: 5530,
            seg1_center_mhz: 5650,
            width: ChannelWidth::Mhz320,
            dfs_seg0: true,
            dfs_seg1: true,
        };
        let bonded = subchannels_of(&chan, &DetectorContext::default()).unwrap();
        let ie = build_nol_ie(&chan, &bonded, &DetectorContext::default()).unwrap();
        assert_eq!(ie.bitmap, 0xffff);
        assert_eq!(ie.start_freq_mhz, bonded[0]);
    }
}
