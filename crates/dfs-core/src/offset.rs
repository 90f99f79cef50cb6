//! Frequency-offset resolver: maps one radar detection onto the 20 MHz
//! sub-channel(s) it implicates.
//!
//! A detection carries a signed offset from the segment center in 100 kHz
//! units. The resolver:
//!
//! 1. Picks the event's center frequency (direct firmware frequency,
//!    agile pre-CAC frequency, or segment center).
//! 2. Discretizes the offset into a symbol index,
//!    `sidx = round(32 * offset / 10)`; a sidx on a multiple of 32 means
//!    the pulse sat exactly on a sub-channel boundary.
//! 3. Keeps three offset slots (center/left/right). A chirp, or a
//!    boundary sidx on anything wider than 20 MHz, widens the left/right
//!    slots by the fixed ±10 (100 kHz) constant. The constant is
//!    width-independent for every width up to 320 MHz; that matches the
//!    deployed detector behavior and is covered by a test rather than
//!    scaled per width.
//! 4. Maps each slot through the width's breakpoint table and intersects
//!    the candidates with the real bonded sub-channel set, preserving
//!    order and dropping duplicates.
//!
//! An unrecognized width/segment pairing resolves to an error; the radar
//! indication processor then falls back to marking the full bonded set,
//! so a detection is never dropped.

use crate::bonding::{
    bonding_channels, DetectorContext, RESTRICTED_80P80_LEFT_SHIFT_MHZ,
    RESTRICTED_80P80_RIGHT_SHIFT_MHZ,
};
use crate::error::{DfsError, DfsResult};
use crate::types::{ChannelWidth, DetectorId, DfsChannel, RadarFoundInfo, SegmentId};

/// A sidx divisible by this lands exactly on a sub-channel boundary.
pub const BOUNDARY_SIDX: i32 = 32;

/// Left/right slot widening for chirp or boundary pulses, in 100 kHz
/// units. Width-independent by observation.
pub const CHIRP_WIDENING_100KHZ: i32 = 10;

/// Agile center adjustment for 160 MHz-class pre-CAC segment selection
/// (MHz).
pub const AGILE_160_SEGMENT_SHIFT_MHZ: i32 = 40;

const SLOT_CENTER: usize = 0;
const SLOT_LEFT: usize = 1;
const SLOT_RIGHT: usize = 2;

/// Discretized symbol index for a 100 kHz-unit frequency offset.
pub fn freq_offset_to_sidx(offset_100khz: i32) -> i32 {
    (32.0 * offset_100khz as f64 / 10.0).round() as i32
}

/// Center frequency the radar offset is measured against.
///
/// Priority: direct firmware frequency, then the agile pre-CAC frequency
/// (with the 160-class ±40 MHz or restricted-80+80 segment adjustment),
/// then the segment center of the operating channel (the pre-CAC
/// secondary frequency standing in while that field reads zero).
pub fn radar_freq_center(
    chan: &DfsChannel,
    radar: &RadarFoundInfo,
    dctx: &DetectorContext,
) -> DfsResult<u16> {
    if radar.freq_mhz != 0 {
        return Ok(radar.freq_mhz);
    }

    if radar.detector == DetectorId::Agile {
        let agile = dctx.agile_center_mhz.ok_or(DfsError::NoAgileFrequency)? as i32;
        let shift = if dctx.restricted_80p80 {
            match radar.segment {
                SegmentId::Primary => RESTRICTED_80P80_LEFT_SHIFT_MHZ,
                SegmentId::Secondary => RESTRICTED_80P80_RIGHT_SHIFT_MHZ,
            }
        } else if dctx.agile_width == Some(ChannelWidth::Mhz160) {
            match radar.segment {
                SegmentId::Primary => -AGILE_160_SEGMENT_SHIFT_MHZ,
                SegmentId::Secondary => AGILE_160_SEGMENT_SHIFT_MHZ,
            }
        } else {
            0
        };
        return Ok((agile + shift) as u16);
    }

    match radar.segment {
        SegmentId::Primary => Ok(chan.seg0_center_mhz),
        SegmentId::Secondary => match chan.width {
            ChannelWidth::Mhz80Plus80 => {
                if chan.seg1_center_mhz != 0 {
                    Ok(chan.seg1_center_mhz)
                } else if let Some(freq) = dctx.precac_secondary_mhz {
                    Ok(freq)
                } else {
                    Err(DfsError::UnsupportedWidthForSegment(SegmentId::Secondary))
                }
            }
            ChannelWidth::Mhz160 | ChannelWidth::Mhz320 => {
                // seg1 holds the wide-band center; mirror seg0 across it
                // to get the secondary half's center.
                if chan.seg1_center_mhz != 0 {
                    Ok((2 * chan.seg1_center_mhz as i32 - chan.seg0_center_mhz as i32) as u16)
                } else if let Some(freq) = dctx.precac_secondary_mhz {
                    Ok(freq)
                } else {
                    Err(DfsError::UnsupportedWidthForSegment(SegmentId::Secondary))
                }
            }
            _ => Err(DfsError::UnsupportedWidthForSegment(SegmentId::Secondary)),
        },
    }
}

/// 20 MHz table: the pulse either stays on the channel or falls off onto
/// an adjacent one. Boundaries are inclusive toward the adjacent channel.
fn resolve_20(center_mhz: u16, offset_100khz: i32) -> u16 {
    let c = center_mhz as i32;
    let f = if offset_100khz <= -10 {
        c - 20
    } else if offset_100khz >= 10 {
        c + 20
    } else {
        c
    };
    f as u16
}

/// Shared 40/80 MHz-class table: symmetric breakpoints at ±20/±40 select
/// among five candidates spanning three sub-channel slots around the
/// segment center.
fn resolve_wide(center_mhz: u16, offset_100khz: i32) -> u16 {
    let c = center_mhz as i32;
    let f = if offset_100khz <= -40 {
        c - 30
    } else if offset_100khz <= -20 {
        c - 10
    } else if offset_100khz < 20 {
        c
    } else if offset_100khz < 40 {
        c + 10
    } else {
        c + 30
    };
    f as u16
}

/// Resolves one radar event to the final affected sub-channel list:
/// the three candidate frequencies intersected against the bonded set
/// for this channel/segment/detector. The result has 0 to 3 entries and
/// no duplicates.
pub fn find_radar_affected_subchans(
    chan: &DfsChannel,
    radar: &RadarFoundInfo,
    dctx: &DetectorContext,
) -> DfsResult<Vec<u16>> {
    let center = radar_freq_center(chan, radar, dctx)?;

    // Agile detections resolve against the agile pre-CAC width, not the
    // operating channel's.
    let table_width = if radar.detector == DetectorId::Agile {
        dctx.agile_width.unwrap_or(ChannelWidth::Mhz80)
    } else {
        chan.width
    };

    let mut offsets = [radar.freq_offset; 3];
    let sidx = freq_offset_to_sidx(radar.freq_offset);
    let on_boundary = sidx % BOUNDARY_SIDX == 0;
    if radar.is_chirp || (on_boundary && table_width != ChannelWidth::Mhz20) {
        offsets[SLOT_LEFT] -= CHIRP_WIDENING_100KHZ;
        offsets[SLOT_RIGHT] += CHIRP_WIDENING_100KHZ;
    }

    let candidates = offsets.map(|off| match table_width {
        ChannelWidth::Mhz20 => resolve_20(center, off),
        _ => resolve_wide(center, off),
    });

    let bonded = bonding_channels(chan, radar.segment, radar.detector, dctx)?;

    let mut affected = Vec::with_capacity(3);
    for freq in candidates {
        if bonded.contains(&freq) && !affected.contains(&freq) {
            affected.push(freq);
        }
    }
    Ok(affected)
}
