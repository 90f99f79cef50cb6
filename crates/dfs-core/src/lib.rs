//! # 802.11 DFS Radar Processing Core
//!
//! This crate implements the Dynamic Frequency Selection (DFS) state
//! machine an 802.11 radio needs on radar-sensitive 5 GHz channels:
//! radar-found event processing, Non-Occupancy List (NOL) management,
//! Channel Availability Check (CAC) timing, and ETSI pre-CAC
//! bookkeeping.
//!
//! ## Overview
//!
//! A radar detector (on-channel or agile/off-channel) reports a pulse as
//! a segment, a signed 100 kHz frequency offset, and a chirp flag. This
//! library turns that report into regulatory action:
//!
//! - **Bonding model**: enumerate the 20 MHz sub-channels of a 20 to
//!   320 MHz operating channel, including 80+80 and the 165 MHz
//!   restricted hybrid
//! - **Offset resolution**: map the detection onto the one to three
//!   sub-channels it actually implicates
//! - **NOL**: quarantine affected sub-channels for the regulatory
//!   non-occupancy period and release them on expiry
//! - **CAC / pre-CAC**: track availability checks per channel, with the
//!   ETSI 24 hour pre-CAC clearance lifetime
//! - **MLME boundary**: all hardware, user-space and regulatory side
//!   effects cross the [`mlme::DfsMlme`] trait
//!
//! ## Event Flow
//!
//! ```text
//! detector -> RadarFoundInfo -> DfsContext::process_radar_ind
//!          -> affected sub-channels -> NOL + pre-CAC revocation
//!          -> RCSA / channel change via DfsMlme
//! ```
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use dfs_core::prelude::*;
//!
//! let ctx = DfsContext::new(
//!     DfsConfig::default(),
//!     Arc::new(OffloadMlme::default()),
//!     Arc::new(SystemTimeSource::new()),
//! );
//! ctx.set_current_channel(Some(DfsChannel {
//!     ieee: 100,
//!     freq_mhz: 5500,
//!     seg0_center_mhz: 5530,
//!     seg1_center_mhz: 0,
//!     width: ChannelWidth::Mhz80,
//!     dfs_seg0: true,
//!     dfs_seg1: false,
//! }));
//!
//! let radar = RadarFoundInfo {
//!     segment: SegmentId::Primary,
//!     detector: DetectorId::Normal,
//!     freq_offset: 25,
//!     is_chirp: false,
//!     freq_mhz: 0,
//! };
//! ctx.process_radar_ind(radar).unwrap();
//! assert!(ctx.is_channel_in_nol(5540));
//! ```

pub mod bonding;
pub mod cac;
pub mod config;
pub mod error;
pub mod mlme;
pub mod nol;
pub mod nol_ie;
pub mod offset;
pub mod precac;
pub mod processor;
pub mod time;
pub mod types;

// Re-export main types
pub use cac::{CacController, CacRequirement, CacState};
pub use config::{DfsConfig, RegDomain};
pub use error::{DfsError, DfsResult};
pub use mlme::{DfsMlme, OffloadMlme};
pub use nol::{NolEntry, NolStore};
pub use nol_ie::NolIe;
pub use precac::PrecacList;
pub use processor::DfsContext;
pub use time::{ManualTimeSource, SystemTimeSource, TimeSource};
pub use types::{
    ChannelWidth, DetectorId, DfsChannel, DfsEvent, RadarFoundInfo, SegmentId,
};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{DfsConfig, RegDomain};
    pub use crate::error::{DfsError, DfsResult};
    pub use crate::mlme::{DfsMlme, OffloadMlme};
    pub use crate::processor::DfsContext;
    pub use crate::time::{ManualTimeSource, SystemTimeSource, TimeSource};
    pub use crate::types::{
        ChannelWidth, DetectorId, DfsChannel, DfsEvent, RadarFoundInfo, SegmentId,
    };
}
