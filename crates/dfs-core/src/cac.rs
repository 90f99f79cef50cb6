//! Channel Availability Check (CAC) timer state machine.
//!
//! One CAC is logically active per DFS context:
//!
//! ```text
//! IDLE -> RUNNING -> EXPIRED without radar -> CAC_VALID (bounded) -> IDLE
//!                 \-> ABORTED (radar or explicit stop) -> IDLE
//! ```
//!
//! The timer is a deadline checked lazily by [`CacController::poll_expiry`];
//! nothing here spawns threads. Subset logic lets multiple virtual
//! interfaces share one in-flight CAC: a new channel whose sub-channel
//! set is contained in the running CAC's set continues that run, a wider
//! channel cancels it, and a channel covered by the *previously
//! completed* run (not aborted) skips CAC entirely, which covers the
//! bandwidth-reduction re-use case.

use crate::bonding::{subchannels_of, DetectorContext};
use crate::config::DfsConfig;
use crate::types::DfsChannel;

/// CAC state for one DFS context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacState {
    /// No CAC active or pending.
    #[default]
    Idle,
    /// A CAC timer is running.
    Running,
    /// A CAC completed cleanly and its grace period is active.
    CacValid,
    /// The last CAC run was interrupted before completion.
    Aborted,
}

/// Outcome of a CAC-requirement check for a candidate channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacRequirement {
    /// The channel may be used without (another) CAC.
    NotRequired,
    /// A CAC covering this channel is already running; keep waiting on it.
    ContinueCurrent,
    /// A fresh CAC must be started.
    Start,
}

/// What the processor must do after a CAC deadline fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacCompletion {
    /// Channel the CAC ran on.
    pub chan: DfsChannel,
    /// Radar raced the timer: the channel stays dirty and must be marked
    /// DFS-hit instead of being declared clear.
    pub radar_during_cac: bool,
    /// A channel change was deferred until this CAC finished.
    pub deferred_change: Option<DfsChannel>,
}

/// True when every sub-channel of `inner` is also a sub-channel of
/// `outer`. Unresolvable channels never count as subsets.
pub fn is_channel_subset(
    inner: &DfsChannel,
    outer: &DfsChannel,
    dctx: &DetectorContext,
) -> bool {
    let (Ok(inner_subs), Ok(outer_subs)) =
        (subchannels_of(inner, dctx), subchannels_of(outer, dctx))
    else {
        tracing::warn!("subset check on unresolvable channel");
        return false;
    };
    inner_subs.iter().all(|f| outer_subs.contains(f))
}

/// Per-context CAC timer and completion history.
#[derive(Debug, Default)]
pub struct CacController {
    state: CacState,
    started_chan: Option<DfsChannel>,
    completed_chan: Option<DfsChannel>,
    aborted: bool,
    radar_during_cac: bool,
    deadline_ms: u64,
    valid_until_ms: u64,
    pending_change: Option<DfsChannel>,
    timer_start_count: u32,
}

impl CacController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> CacState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state() == CacState::Running
    }

    /// Channel the in-flight (or last) CAC was started on.
    pub fn started_chan(&self) -> Option<&DfsChannel> {
        self.started_chan.as_ref()
    }

    /// Number of times the timer was (re)armed. Repeated subset checks
    /// against a running CAC must not grow this.
    pub fn timer_start_count(&self) -> u32 {
        self.timer_start_count
    }

    /// Decides whether `chan` needs a CAC right now.
    pub fn check_for_cac_start(
        &mut self,
        chan: &DfsChannel,
        cfg: &DfsConfig,
        precac_done: bool,
        now_ms: u64,
        dctx: &DetectorContext,
    ) -> CacRequirement {
        if cfg.ignore_dfs || cfg.ignore_cac || !chan.is_dfs() {
            return CacRequirement::NotRequired;
        }

        if self.state() == CacState::CacValid {
            if now_ms < self.valid_until_ms {
                return CacRequirement::NotRequired;
            }
            self.state = CacState::Idle;
        }

        if precac_done {
            return CacRequirement::NotRequired;
        }

        if self.is_running() {
            if let Some(running_on) = self.started_chan {
                if is_channel_subset(chan, &running_on, dctx) {
                    return CacRequirement::ContinueCurrent;
                }
            }
            // The new channel needs sub-channels the running CAC never
            // listened on; that run is worthless for it.
            self.cac_stop();
            return CacRequirement::Start;
        }

        if let Some(completed) = &self.completed_chan {
            if !self.aborted && is_channel_subset(chan, completed, dctx) {
                return CacRequirement::NotRequired;
            }
        }

        CacRequirement::Start
    }

    /// Arms the CAC timer on `chan` for `timeout_secs` (the regulatory
    /// timeout supplied by the MLME collaborator).
    pub fn start_cac_timer(&mut self, chan: &DfsChannel, timeout_secs: u32, now_ms: u64) {
        self.state = CacState::Running;
        self.started_chan = Some(*chan);
        self.aborted = false;
        self.radar_during_cac = false;
        self.deadline_ms = now_ms + timeout_secs as u64 * 1000;
        self.timer_start_count += 1;
    }

    /// Stops the timer. Idempotent; marks the run aborted only when it
    /// actually interrupted a live CAC.
    pub fn cac_stop(&mut self) {
        if self.is_running() {
            self.state = CacState::Aborted;
            self.aborted = true;
        }
    }

    /// Records that radar hit the running CAC's channel; the eventual
    /// expiry then reports a dirty completion.
    pub fn note_radar(&mut self) {
        if self.is_running() {
            self.radar_during_cac = true;
        }
    }

    /// Defers a channel change until the running CAC completes
    /// (pre-CAC driven channel switch).
    pub fn defer_channel_change(&mut self, chan: DfsChannel) {
        self.pending_change = Some(chan);
    }

    /// Lazy timer tick. Returns the completion record once the deadline
    /// has passed; the caller performs the MLME/pre-CAC side effects.
    pub fn poll_expiry(&mut self, now_ms: u64, cac_valid_ms: u64) -> Option<CacCompletion> {
        if !self.is_running() || now_ms < self.deadline_ms {
            return None;
        }
        let Some(chan) = self.started_chan else {
            self.state = CacState::Idle;
            return None;
        };
        let completion = CacCompletion {
            chan,
            radar_during_cac: self.radar_during_cac,
            deferred_change: self.pending_change.take(),
        };
        if self.radar_during_cac {
            self.state = CacState::Idle;
            self.completed_chan = None;
        } else {
            self.completed_chan = Some(chan);
            if cac_valid_ms > 0 {
                self.state = CacState::CacValid;
                self.valid_until_ms = now_ms + cac_valid_ms;
            } else {
                self.state = CacState::Idle;
            }
        }
        self.radar_during_cac = false;
        Some(completion)
    }

    /// Drops all CAC history (context detach).
    pub fn reset(&mut self) {
        *self = Self::default();
    }
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

    fn chan40_low() -> DfsChannel {
        // 40 MHz pair {5500, 5520}: a subset of chan80's sub-channels
        DfsChannel {
            ieee: 100,
            freq_mhz: 5500,
            seg0_center_mhz: 5510,
            seg1_center_mhz: 0,
            width: ChannelWidth::Mhz40,
            dfs_seg0: true,
            dfs_seg1: false,
        }
    }

    fn chan40_outside() -> DfsChannel {
        // 40 MHz pair {5580, 5600}: disjoint from chan80
        DfsChannel {
            ieee: 116,
            freq_mhz: 5580,
            seg0_center_mhz: 5590,
            seg1_center_mhz: 0,
            width: ChannelWidth::Mhz40,
            dfs_seg0: true,
            dfs_seg1: false,
        }
    }

    fn dctx() -> DetectorContext {
        DetectorContext::default()
    }

    // ------------------------------------------------------------------
    // 1. Subset predicate
    // ------------------------------------------------------------------

    #[test]
    fn test_subset_relation() {
        assert!(is_channel_subset(&chan40_low(), &chan80(), &dctx()));
        assert!(!is_channel_subset(&chan80(), &chan40_low(), &dctx()));
        assert!(!is_channel_subset(&chan40_outside(), &chan80(), &dctx()));
        assert!(is_channel_subset(&chan80(), &chan80(), &dctx()));
    }

    // ------------------------------------------------------------------
    // 2. check_for_cac_start
    // ------------------------------------------------------------------

    #[test]
    fn test_flags_skip_cac() {
        let mut cac = CacController::new();
        let mut cfg = DfsConfig::default();
        cfg.ignore_cac = true;
        assert_eq!(
            cac.check_for_cac_start(&chan80(), &cfg, false, 0, &dctx()),
            CacRequirement::NotRequired
        );
        cfg.ignore_cac = false;
        cfg.ignore_dfs = true;
        assert_eq!(
            cac.check_for_cac_start(&chan80(), &cfg, false, 0, &dctx()),
            CacRequirement::NotRequired
        );
    }

    #[test]
    fn test_non_dfs_channel_needs_no_cac() {
        let mut cac = CacController::new();
        let mut chan = chan80();
        chan.dfs_seg0 = false;
        assert_eq!(
            cac.check_for_cac_start(&chan, &DfsConfig::default(), false, 0, &dctx()),
            CacRequirement::NotRequired
        );
    }

    #[test]
    fn test_precac_done_skips_cac() {
        let mut cac = CacController::new();
        assert_eq!(
            cac.check_for_cac_start(&chan80(), &DfsConfig::default(), true, 0, &dctx()),
            CacRequirement::NotRequired
        );
    }

    #[test]
    fn test_fresh_channel_starts_cac() {
        let mut cac = CacController::new();
        assert_eq!(
            cac.check_for_cac_start(&chan80(), &DfsConfig::default(), false, 0, &dctx()),
            CacRequirement::Start
        );
    }

    #[test]
    fn test_subset_continues_running_cac_without_restart() {
        let mut cac = CacController::new();
        let cfg = DfsConfig::default();
        cac.start_cac_timer(&chan80(), 60, 0);
        assert_eq!(cac.timer_start_count(), 1);
        // repeated subset checks never re-arm the timer
        for _ in 0..10 {
            assert_eq!(
                cac.check_for_cac_start(&chan40_low(), &cfg, false, 1000, &dctx()),
                CacRequirement::ContinueCurrent
            );
        }
        assert_eq!(cac.timer_start_count(), 1);
        assert!(cac.is_running());
    }

    #[test]
    fn test_non_subset_cancels_running_cac() {
        let mut cac = CacController::new();
        let cfg = DfsConfig::default();
        cac.start_cac_timer(&chan80(), 60, 0);
        assert_eq!(
            cac.check_for_cac_start(&chan40_outside(), &cfg, false, 1000, &dctx()),
            CacRequirement::Start
        );
        assert!(!cac.is_running());
        assert_eq!(cac.state(), CacState::Aborted);
    }

    #[test]
    fn test_completed_superset_skips_cac_unless_aborted() {
        let mut cac = CacController::new();
        let cfg = DfsConfig::default();
        cac.start_cac_timer(&chan80(), 60, 0);
        assert!(cac.poll_expiry(60_000, 0).is_some());
        // bandwidth reduction onto a covered 40 MHz channel: no re-CAC
        assert_eq!(
            cac.check_for_cac_start(&chan40_low(), &cfg, false, 61_000, &dctx()),
            CacRequirement::NotRequired
        );
        // an aborted later run poisons the completed-subset shortcut
        cac.start_cac_timer(&chan40_outside(), 60, 62_000);
        cac.cac_stop();
        assert_eq!(
            cac.check_for_cac_start(&chan40_low(), &cfg, false, 63_000, &dctx()),
            CacRequirement::Start
        );
    }

    // ------------------------------------------------------------------
    // 3. Expiry
    // ------------------------------------------------------------------

    #[test]
    fn test_poll_before_deadline_is_noop() {
        let mut cac = CacController::new();
        cac.start_cac_timer(&chan80(), 60, 0);
        assert!(cac.poll_expiry(59_999, 0).is_none());
        assert!(cac.is_running());
    }

    #[test]
    fn test_clean_expiry_records_completion() {
        let mut cac = CacController::new();
        cac.start_cac_timer(&chan80(), 60, 0);
        let done = cac.poll_expiry(60_000, 0).unwrap();
        assert_eq!(done.chan, chan80());
        assert!(!done.radar_during_cac);
        assert_eq!(cac.state(), CacState::Idle);
        // second poll does nothing
        assert!(cac.poll_expiry(61_000, 0).is_none());
    }

    #[test]
    fn test_radar_race_reports_dirty_completion() {
        let mut cac = CacController::new();
        cac.start_cac_timer(&chan80(), 60, 0);
        cac.note_radar();
        let done = cac.poll_expiry(60_000, 0).unwrap();
        assert!(done.radar_during_cac);
        // a dirty run leaves no completed channel behind
        assert_eq!(
            cac.check_for_cac_start(&chan80(), &DfsConfig::default(), false, 61_000, &dctx()),
            CacRequirement::Start
        );
    }

    #[test]
    fn test_cac_valid_grace_window() {
        let mut cac = CacController::new();
        let cfg = DfsConfig {
            cac_valid_ms: 5000,
            ..DfsConfig::default()
        };
        cac.start_cac_timer(&chan80(), 60, 0);
        assert!(cac.poll_expiry(60_000, cfg.cac_valid_ms).is_some());
        assert_eq!(cac.state(), CacState::CacValid);
        assert_eq!(
            cac.check_for_cac_start(&chan40_outside(), &cfg, false, 64_999, &dctx()),
            CacRequirement::NotRequired
        );
        // grace over: even a covered channel re-enters the normal flow
        assert_eq!(
            cac.check_for_cac_start(&chan40_outside(), &cfg, false, 65_000, &dctx()),
            CacRequirement::Start
        );
    }

    #[test]
    fn test_deferred_change_returned_on_completion() {
        let mut cac = CacController::new();
        cac.start_cac_timer(&chan80(), 60, 0);
        cac.defer_channel_change(chan40_low());
        let done = cac.poll_expiry(60_000, 0).unwrap();
        assert_eq!(done.deferred_change, Some(chan40_low()));
    }

    // ------------------------------------------------------------------
    // 4. cac_stop
    // ------------------------------------------------------------------

    #[test]
    fn test_cac_stop_is_idempotent() {
        let mut cac = CacController::new();
        cac.cac_stop(); // stopping an idle controller is a no-op
        assert_eq!(cac.state(), CacState::Idle);
        cac.start_cac_timer(&chan80(), 60, 0);
        cac.cac_stop();
        assert_eq!(cac.state(), CacState::Aborted);
        cac.cac_stop();
        assert_eq!(cac.state(), CacState::Aborted);
        // an aborted run never completes
        assert!(cac.poll_expiry(120_000, 0).is_none());
    }
}
