//! DFS error types

use crate::types::SegmentId;
use thiserror::Error;

/// Result type for DFS operations
pub type DfsResult<T> = Result<T, DfsError>;

/// Errors reported by the DFS subsystem.
///
/// These are status codes for the firmware/interrupt layer, never panics:
/// the worst case for the radio is a radar event that is logged but not
/// acted upon, which tests must catch as a compliance bug.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DfsError {
    /// No current operating channel was supplied by the channel-list manager
    #[error("no current operating channel")]
    NoCurrentChannel,

    /// The radar event applies to a channel that is not DFS-applicable
    #[error("channel {0} MHz is not DFS-applicable")]
    NotDfsChannel(u16),

    /// The offset resolver does not understand this width/segment pairing
    #[error("unsupported channel width for segment {0:?}")]
    UnsupportedWidthForSegment(SegmentId),

    /// Batch NOL insert found no DFS channel among the candidates
    #[error("no DFS sub-channel among candidates {0:?}")]
    NoDfsSubchannels(Vec<u16>),

    /// The single deferred-radar slot is already occupied
    #[error("deferred radar slot already occupied")]
    DeferredSlotFull,

    /// The agile detector fired but no agile pre-CAC frequency is set
    #[error("agile detector event without an agile pre-CAC frequency")]
    NoAgileFrequency,
}

impl DfsError {
    /// True for failures that indicate bad input rather than internal state.
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            DfsError::NoCurrentChannel | DfsError::NotDfsChannel(_)
        )
    }
}
