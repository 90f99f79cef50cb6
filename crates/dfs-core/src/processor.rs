//! Radar indication processor, the per-radio DFS controller.
//!
//! [`DfsContext`] owns the NOL store, the pre-CAC lists and the CAC
//! timer for one radio instance and drives one radar event end-to-end:
//! resolve the affected sub-channels, quarantine them, revoke pre-CAC
//! clearance, and hand the channel-change decision to the MLME
//! collaborator. The guiding policy is best-effort forward progress:
//! collaborator hiccups are logged, and the only path that aborts
//! without quarantining is a batch with no DFS channel in it, because
//! there is nothing to quarantine.
//!
//! Two locks serialize the shared state. The mode-switch lock makes
//! radar processing and hardware mode switches mutually exclusive and
//! guards the single deferred-radar slot; the list lock covers the
//! NOL/pre-CAC/CAC state shared between radar, timer-poll and
//! configuration contexts. Lock order is mode-switch before lists on
//! every path.
//!
//! Nothing here runs its own thread. Timer behavior comes from calling
//! [`DfsContext::poll`] against the injected time source; eviction and
//! CAC expiry are lazy, which is also what keeps tests deterministic.

use crate::bonding::{bonding_channels, subchannels_of, DetectorContext};
use crate::cac::{CacController, CacRequirement};
use crate::config::DfsConfig;
use crate::error::{DfsError, DfsResult};
use crate::mlme::DfsMlme;
use crate::nol::NolStore;
use crate::nol_ie::build_nol_ie;
use crate::offset::{find_radar_affected_subchans, radar_freq_center};
use crate::precac::PrecacList;
use crate::time::TimeSource;
use crate::types::{
    ieee_for_freq, ChannelWidth, DetectorId, DfsChannel, DfsEvent, RadarFoundInfo, SegmentId,
};
use std::sync::{Arc, Mutex};

/// Mode-switch coordination and the deferred-radar slot.
#[derive(Debug, Default)]
struct ModeSwitchState {
    in_progress: bool,
    deferred_radar: Option<Box<RadarFoundInfo>>,
    deferred_cac_completed: bool,
}

/// Channel-keyed state shared between execution contexts.
struct ChannelState {
    cur_chan: Option<DfsChannel>,
    nol: NolStore,
    precac: PrecacList,
    etsi_precac: Option<PrecacList>,
    cac: CacController,
    agile_center_mhz: Option<u16>,
    agile_width: Option<ChannelWidth>,
    precac_secondary_mhz: Option<u16>,
    bang_radar: bool,
    bang_radar_all_subchans: bool,
}

/// Per-radio DFS controller.
///
/// One context per physical or virtual radio; lifecycle owned by
/// whatever manages the radio. All methods take `&self` and may be
/// called from any thread.
pub struct DfsContext {
    cfg: DfsConfig,
    mlme: Arc<dyn DfsMlme>,
    time: Arc<dyn TimeSource>,
    mode_switch: Mutex<ModeSwitchState>,
    lists: Mutex<ChannelState>,
}

impl DfsContext {
    pub fn new(cfg: DfsConfig, mlme: Arc<dyn DfsMlme>, time: Arc<dyn TimeSource>) -> Self {
        let etsi_precac = cfg.etsi_precac().then(PrecacList::etsi);
        Self {
            cfg,
            mlme,
            time,
            mode_switch: Mutex::new(ModeSwitchState::default()),
            lists: Mutex::new(ChannelState {
                cur_chan: None,
                nol: NolStore::new(),
                precac: PrecacList::standard(),
                etsi_precac,
                cac: CacController::new(),
                agile_center_mhz: None,
                agile_width: None,
                precac_secondary_mhz: None,
                bang_radar: false,
                bang_radar_all_subchans: false,
            }),
        }
    }

    pub fn config(&self) -> &DfsConfig {
        &self.cfg
    }

    // -----------------------------------------------------------------------
    // Channel-list and detector configuration
    // -----------------------------------------------------------------------

    /// Installs the current operating channel.
    pub fn set_current_channel(&self, chan: Option<DfsChannel>) {
        self.lists.lock().unwrap().cur_chan = chan;
    }

    pub fn current_channel(&self) -> Option<DfsChannel> {
        self.lists.lock().unwrap().cur_chan
    }

    /// Seeds the pre-CAC required lists from the radio's channel list.
    pub fn attach_channel_list(&self, channels: &[DfsChannel]) {
        let mut st = self.lists.lock().unwrap();
        let dctx = Self::detector_context(&self.cfg, &st);
        for chan in channels.iter().filter(|c| c.is_dfs()) {
            let Ok(subs) = subchannels_of(chan, &dctx) else {
                tracing::warn!(ieee = chan.ieee, "skipping unresolvable channel at attach");
                continue;
            };
            let ieees = subs.iter().map(|&f| ieee_for_freq(f));
            st.precac.init_required(ieees.clone());
            if let Some(etsi) = &mut st.etsi_precac {
                etsi.init_required(ieees);
            }
        }
    }

    /// Parks the agile detector on a pre-CAC frequency.
    pub fn set_agile_precac(&self, center_mhz: Option<u16>, width: Option<ChannelWidth>) {
        let mut st = self.lists.lock().unwrap();
        st.agile_center_mhz = center_mhz;
        st.agile_width = width;
    }

    /// Marks a legacy pre-CAC run on the secondary segment (the channel
    /// struct's secondary field reads zero for its duration).
    pub fn set_precac_secondary(&self, center_mhz: Option<u16>) {
        self.lists.lock().unwrap().precac_secondary_mhz = center_mhz;
    }

    /// Test injection: treat the next radar event as hitting every
    /// bonded sub-channel.
    pub fn set_bang_radar_all_subchans(&self, enable: bool) {
        self.lists.lock().unwrap().bang_radar_all_subchans = enable;
    }

    /// Test injection: legacy whole-channel bang-radar mode, which
    /// bypasses sub-channel marking.
    pub fn set_bang_radar(&self, enable: bool) {
        self.lists.lock().unwrap().bang_radar = enable;
    }

    // -----------------------------------------------------------------------
    // Mode-switch coordination
    // -----------------------------------------------------------------------

    /// Marks a hardware mode switch as started/finished. While one is in
    /// progress radar events are parked in the deferred slot.
    pub fn set_mode_switch_in_progress(&self, in_progress: bool) {
        self.mode_switch.lock().unwrap().in_progress = in_progress;
    }

    /// Hands the deferred radar event to the replay path. The mode-switch
    /// completion code must call this and feed any event back through
    /// [`DfsContext::process_radar_ind`]; dropping it loses the
    /// detection.
    pub fn take_deferred_radar(&self) -> Option<RadarFoundInfo> {
        self.mode_switch
            .lock()
            .unwrap()
            .deferred_radar
            .take()
            .map(|b| *b)
    }

    pub fn deferred_radar_pending(&self) -> bool {
        self.mode_switch.lock().unwrap().deferred_radar.is_some()
    }

    /// True once a CAC completed while a mode switch was in progress;
    /// reading clears the flag.
    pub fn take_deferred_cac_completed(&self) -> bool {
        let mut ms = self.mode_switch.lock().unwrap();
        std::mem::take(&mut ms.deferred_cac_completed)
    }

    // -----------------------------------------------------------------------
    // NOL queries
    // -----------------------------------------------------------------------

    pub fn is_channel_in_nol(&self, freq_mhz: u16) -> bool {
        let st = self.lists.lock().unwrap();
        st.nol.is_channel_in_nol(freq_mhz, self.time.now_ms())
    }

    pub fn nol_channels(&self) -> Vec<u16> {
        let st = self.lists.lock().unwrap();
        st.nol.channels(self.time.now_ms())
    }

    // -----------------------------------------------------------------------
    // CAC operations
    // -----------------------------------------------------------------------

    /// Decides whether `chan` needs a CAC, continuing or cancelling any
    /// in-flight run per the subset rules.
    pub fn check_for_cac_start(&self, chan: &DfsChannel) -> CacRequirement {
        let mut st = self.lists.lock().unwrap();
        let now = self.time.now_ms();
        let dctx = Self::detector_context(&self.cfg, &st);
        let precac_done = Self::precac_done_for(&st, chan, &dctx, now);
        st.cac
            .check_for_cac_start(chan, &self.cfg, precac_done, now, &dctx)
    }

    /// Arms the CAC timer on `chan` with the regulatory timeout supplied
    /// by the MLME collaborator.
    pub fn start_cac_timer(&self, chan: &DfsChannel) {
        let timeout_secs = self.mlme.cac_timeout_secs(chan);
        let mut st = self.lists.lock().unwrap();
        st.cac.start_cac_timer(chan, timeout_secs, self.time.now_ms());
        self.mlme.deliver_event(chan.freq_mhz, DfsEvent::CacStarted);
    }

    /// Stops any running CAC; a genuinely interrupted run is recorded as
    /// aborted so it is never mistaken for a completed one.
    pub fn cac_stop(&self) {
        self.lists.lock().unwrap().cac.cac_stop();
    }

    pub fn cac_timer_start_count(&self) -> u32 {
        self.lists.lock().unwrap().cac.timer_start_count()
    }

    /// Defers a channel change until the running CAC completes cleanly;
    /// [`DfsContext::poll`] issues the change on expiry.
    pub fn defer_channel_change(&self, chan: DfsChannel) {
        self.lists.lock().unwrap().cac.defer_channel_change(chan);
    }

    /// True while the channel's pre-CAC clearance (standard or ETSI) is
    /// valid for every sub-channel.
    pub fn is_precac_done(&self, chan: &DfsChannel) -> bool {
        let st = self.lists.lock().unwrap();
        let dctx = Self::detector_context(&self.cfg, &st);
        Self::precac_done_for(&st, chan, &dctx, self.time.now_ms())
    }

    /// ETSI pre-CAC done query for a single sub-channel.
    pub fn is_etsi_precac_done(&self, ieee: u8) -> bool {
        let st = self.lists.lock().unwrap();
        st.etsi_precac
            .as_ref()
            .map(|l| l.is_done(ieee, self.time.now_ms()))
            .unwrap_or(false)
    }

    // -----------------------------------------------------------------------
    // Timer tick
    // -----------------------------------------------------------------------

    /// Lazy timer tick: evicts expired NOL entries, expires ETSI pre-CAC
    /// clearances, and completes a due CAC run (with its MLME side
    /// effects). Call from the owner's periodic work context.
    pub fn poll(&self) {
        let mut ms = self.mode_switch.lock().unwrap();
        let mut st = self.lists.lock().unwrap();
        let now = self.time.now_ms();

        let freed = st.nol.sweep(now);
        if !freed.is_empty() {
            for &freq in &freed {
                self.mlme.deliver_event(freq, DfsEvent::NolFinished);
            }
            self.mlme.reg_update_nol(&freed, false);
            self.mlme.save_nol(&st.nol.entries());
        }

        if let Some(etsi) = &mut st.etsi_precac {
            let lapsed = etsi.purge_expired(now);
            if !lapsed.is_empty() {
                tracing::debug!(?lapsed, "ETSI pre-CAC clearance lapsed");
            }
        }

        if let Some(done) = st.cac.poll_expiry(now, self.cfg.cac_valid_ms) {
            if done.radar_during_cac {
                // Radar raced the timer: the channel is dirty, not clear.
                self.mlme.mark_dfs(&done.chan);
            } else {
                if ms.in_progress {
                    ms.deferred_cac_completed = true;
                }
                self.mlme.cac_complete(&done.chan);
                self.mlme
                    .deliver_event(done.chan.freq_mhz, DfsEvent::CacCompleted);
                self.mlme
                    .deliver_event(done.chan.freq_mhz, DfsEvent::UpAfterCac);
                let dctx = Self::detector_context(&self.cfg, &st);
                match subchannels_of(&done.chan, &dctx) {
                    Ok(subs) => {
                        for ieee in subs.iter().map(|&f| ieee_for_freq(f)) {
                            st.precac.mark_cac_done(ieee, now);
                            if let Some(etsi) = &mut st.etsi_precac {
                                etsi.mark_cac_done(ieee, now);
                            }
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "CAC completion on unresolvable channel")
                    }
                }
                if let Some(next) = done.deferred_change {
                    self.mlme.request_channel_change(&next);
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Radar indication processing
    // -----------------------------------------------------------------------

    /// Processes one radar-found event end-to-end.
    pub fn process_radar_ind(&self, radar: RadarFoundInfo) -> DfsResult<()> {
        // Radar processing and mode switches are mutually exclusive.
        let mut ms = self.mode_switch.lock().unwrap();

        if self.mlme.radar_event_ignored(&radar) {
            tracing::debug!(?radar, "radar event ignored by regulatory layer");
            return Ok(());
        }

        if ms.in_progress {
            let mut st = self.lists.lock().unwrap();
            st.cac.cac_stop();
            ms.deferred_cac_completed = false;
            if ms.deferred_radar.is_some() {
                tracing::warn!("deferred radar slot occupied, dropping event");
                return Err(DfsError::DeferredSlotFull);
            }
            ms.deferred_radar = Some(Box::new(radar));
            tracing::info!("radar deferred across hardware mode switch");
            return Ok(());
        }

        let mut st = self.lists.lock().unwrap();
        let now = self.time.now_ms();

        let legacy_secondary_precac = self.cfg.legacy_precac
            && radar.segment == SegmentId::Secondary
            && st.precac_secondary_mhz.is_some();
        if radar.detector == DetectorId::Agile || legacy_secondary_precac {
            return self.process_precac_radar(&mut st, &radar, now);
        }

        self.process_home_radar(&mut st, &radar, now)
    }

    /// Radar on a channel under pre-CAC (agile detector, or legacy
    /// secondary-segment pre-CAC). Quarantines the pre-CAC channel and
    /// revokes its clearance without touching the operating channel.
    fn process_precac_radar(
        &self,
        st: &mut ChannelState,
        radar: &RadarFoundInfo,
        now: u64,
    ) -> DfsResult<()> {
        let chan = st.cur_chan.ok_or(DfsError::NoCurrentChannel)?;
        let dctx = Self::detector_context(&self.cfg, st);

        let affected = match find_radar_affected_subchans(&chan, radar, &dctx) {
            Ok(v) if !v.is_empty() => v,
            _ => bonding_channels(&chan, radar.segment, radar.detector, &dctx)?,
        };
        let radar_freq = Self::radar_found_freq(&chan, radar, &dctx);
        self.mlme.deliver_event(radar_freq, DfsEvent::RadarDetected);

        // Pre-CAC channels are DFS by construction.
        let inserted = st.nol.add_channels(
            &affected,
            now,
            |f| self.cfg.nol_timeout_for(f),
            |_| true,
        )?;
        self.publish_nol_insert(st, &inserted, now);
        self.revoke_precac(st, &inserted);
        Self::note_radar_on_overlap(st, &inserted, &dctx);

        // The interrupted pre-CAC run is void.
        st.precac_secondary_mhz = None;
        Ok(())
    }

    /// Radar on the operating channel itself.
    fn process_home_radar(
        &self,
        st: &mut ChannelState,
        radar: &RadarFoundInfo,
        now: u64,
    ) -> DfsResult<()> {
        let chan = st.cur_chan.ok_or(DfsError::NoCurrentChannel)?;
        let segment_is_dfs = match radar.segment {
            SegmentId::Primary => chan.dfs_seg0,
            SegmentId::Secondary => chan.dfs_seg1 || st.precac_secondary_mhz.is_some(),
        };
        if !segment_is_dfs {
            return Err(DfsError::NotDfsChannel(chan.freq_mhz));
        }

        let dctx = Self::detector_context(&self.cfg, st);
        let radar_freq = Self::radar_found_freq(&chan, radar, &dctx);

        // Delivered even when NOL processing is skipped below.
        self.mlme.deliver_event(radar_freq, DfsEvent::RadarDetected);

        if self.cfg.disable_nol {
            // Radar-injection bring-up: no quarantine, CSA back onto the
            // current channel with detection re-armed for the next pulse.
            if !self.cfg.offload {
                self.mlme.disable_radar_detection();
            }
            st.bang_radar = false;
            self.mlme.request_channel_change(&chan);
            if !self.cfg.offload {
                self.mlme.enable_radar_detection();
            }
            return Ok(());
        }

        let full_set = bonding_channels(&chan, radar.segment, radar.detector, &dctx)?;
        let affected = if st.bang_radar_all_subchans {
            full_set.clone()
        } else if self.cfg.subchannel_marking && !st.bang_radar {
            match find_radar_affected_subchans(&chan, radar, &dctx) {
                Ok(v) if !v.is_empty() => v,
                Ok(_) => {
                    tracing::warn!(?radar, "no sub-channel resolved, marking full set");
                    full_set.clone()
                }
                Err(e) => {
                    tracing::warn!(error = %e, "offset resolution failed, marking full set");
                    full_set.clone()
                }
            }
        } else {
            full_set.clone()
        };
        st.bang_radar = false;
        st.bang_radar_all_subchans = false;

        let dfs_freqs = Self::dfs_subchannels(&chan, st.precac_secondary_mhz.is_some(), &dctx);
        let inserted = st.nol.add_channels(
            &affected,
            now,
            |f| self.cfg.nol_timeout_for(f),
            |f| dfs_freqs.contains(&f),
        )?;
        self.publish_nol_insert(st, &inserted, now);
        self.revoke_precac(st, &inserted);
        Self::note_radar_on_overlap(st, &inserted, &dctx);

        let nol_ie = if self.cfg.subchannel_marking {
            build_nol_ie(&chan, &inserted, &dctx).ok()
        } else {
            None
        };
        let wait_for_csa = self.mlme.start_rcsa(nol_ie.as_ref());

        if !self.cfg.offload && radar.segment == SegmentId::Secondary {
            self.mlme.disable_second_segment_radar();
            if st.precac_secondary_mhz.take().is_some() {
                // The operating channel itself was not hit.
                return Ok(());
            }
        }

        if wait_for_csa {
            return Ok(());
        }

        if !self.cfg.offload {
            // Quiesce detectors so the impending channel change does not
            // re-trigger on stale pulses.
            self.mlme.disable_radar_detection();
            self.mlme.disable_second_segment_radar();
        }
        self.mlme.mark_dfs(&chan);
        Ok(())
    }

    /// Drops all list state and any deferred event (context teardown).
    pub fn detach(&self) {
        let mut ms = self.mode_switch.lock().unwrap();
        let mut st = self.lists.lock().unwrap();
        if ms.deferred_radar.take().is_some() {
            tracing::warn!("dropping deferred radar event at detach");
        }
        ms.in_progress = false;
        ms.deferred_cac_completed = false;
        st.cac.reset();
        st.precac.clear();
        if let Some(etsi) = &mut st.etsi_precac {
            etsi.clear();
        }
        st.cur_chan = None;
        st.precac_secondary_mhz = None;
        st.agile_center_mhz = None;
        st.agile_width = None;
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn detector_context(cfg: &DfsConfig, st: &ChannelState) -> DetectorContext {
        DetectorContext {
            agile_center_mhz: st.agile_center_mhz,
            agile_width: st.agile_width,
            precac_secondary_mhz: st.precac_secondary_mhz,
            restricted_80p80: cfg.restricted_80p80,
        }
    }

    /// Pre-CAC clearance covers `chan` when every 20 MHz sub-channel is
    /// done on the standard list or every one is done on the ETSI list.
    fn precac_done_for(
        st: &ChannelState,
        chan: &DfsChannel,
        dctx: &DetectorContext,
        now: u64,
    ) -> bool {
        let Ok(subs) = subchannels_of(chan, dctx) else {
            return false;
        };
        let ieees: Vec<u8> = subs.iter().map(|&f| ieee_for_freq(f)).collect();
        if ieees.iter().all(|&i| st.precac.is_done(i, now)) {
            return true;
        }
        st.etsi_precac
            .as_ref()
            .map(|list| ieees.iter().all(|&i| list.is_done(i, now)))
            .unwrap_or(false)
    }

    /// Absolute radar-found frequency: event center plus offset, with the
    /// primary channel frequency as a last resort.
    fn radar_found_freq(chan: &DfsChannel, radar: &RadarFoundInfo, dctx: &DetectorContext) -> u16 {
        match radar_freq_center(chan, radar, dctx) {
            Ok(center) => (center as i32 + radar.freq_offset / 10) as u16,
            Err(_) => chan.freq_mhz,
        }
    }

    /// Sub-channel frequencies that are DFS-applicable on this channel,
    /// per-segment flags honored.
    fn dfs_subchannels(
        chan: &DfsChannel,
        precac_secondary: bool,
        dctx: &DetectorContext,
    ) -> Vec<u16> {
        let mut freqs = Vec::new();
        match chan.width {
            ChannelWidth::Mhz80Plus80 => {
                if chan.dfs_seg0 {
                    if let Ok(subs) =
                        bonding_channels(chan, SegmentId::Primary, DetectorId::Normal, dctx)
                    {
                        freqs.extend(subs);
                    }
                }
                if chan.dfs_seg1 || precac_secondary {
                    if let Ok(subs) =
                        bonding_channels(chan, SegmentId::Secondary, DetectorId::Normal, dctx)
                    {
                        freqs.extend(subs);
                    }
                }
            }
            _ => {
                if chan.is_dfs() {
                    if let Ok(subs) = subchannels_of(chan, dctx) {
                        freqs.extend(subs);
                    }
                }
            }
        }
        freqs
    }

    /// A running CAC is dirty only when the quarantined frequencies
    /// overlap its sub-channel set; a hit on a disjoint block leaves it
    /// clean.
    fn note_radar_on_overlap(st: &mut ChannelState, inserted: &[u16], dctx: &DetectorContext) {
        if let Some(run_chan) = st.cac.started_chan().copied() {
            if let Ok(run_subs) = subchannels_of(&run_chan, dctx) {
                if inserted.iter().any(|f| run_subs.contains(f)) {
                    st.cac.note_radar();
                }
            }
        }
    }

    /// Telemetry and persistence after a successful batch insert.
    fn publish_nol_insert(&self, st: &ChannelState, inserted: &[u16], now: u64) {
        for &freq in inserted {
            self.mlme.deliver_event(freq, DfsEvent::NolStarted);
        }
        self.mlme.reg_update_nol(&st.nol.channels(now), true);
        self.mlme.save_nol(&st.nol.entries());
    }

    /// Radar revokes pre-CAC clearance on both lists, whichever segment
    /// was hit.
    fn revoke_precac(&self, st: &mut ChannelState, freqs: &[u16]) {
        for ieee in freqs.iter().map(|&f| ieee_for_freq(f)) {
            st.precac.mark_radar(ieee);
            if let Some(etsi) = &mut st.etsi_precac {
                etsi.mark_radar(ieee);
            }
        }
    }
}
