//! `StationState` (spec §3): every field scoped to the currently-confirmed
//! PI, plus the deep reset triggered by a confirmed PI change.

use std::collections::{HashMap, VecDeque};

use crate::af::AfEngine;
use crate::analyzer::Analyzer;
use crate::assemblers::ptyn_lps::{LONG_PS_LEN, PTYN_LEN};
use crate::assemblers::rt::RT_LEN;
use crate::ber::BerEstimator;
use crate::clock::ClockTime;
use crate::ecc::PinTime;
use crate::eon::EonEngine;
use crate::history::{PsHistoryEntry, RtHistoryEntry};
use crate::oda::{OdaRegistry, RtPlusTag};
use crate::pi::PiTracker;
use crate::tmc::{TmcMessage, TmcServiceInfo};

use std::time::Instant;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiFlags {
    pub stereo: bool,
    pub artificial_head: bool,
    pub compressed: bool,
    pub dynamic_pty: bool,
}

/// All per-station decoder state. Cleared wholesale on a confirmed PI
/// change (see [`StationState::deep_reset`]).
#[derive(Debug, Clone)]
pub struct StationState {
    pub pi: Option<u16>,

    pub ps_buf: [char; 8],
    pub ps_mask: [bool; 8],

    pub rt_buf: [[char; RT_LEN]; 2],
    pub rt_mask: [[bool; RT_LEN]; 2],
    pub rt_ab_flag: Option<bool>,

    pub lps_buf: [char; LONG_PS_LEN],
    pub lps_mask: [bool; LONG_PS_LEN],

    pub ptyn_buf: [char; PTYN_LEN],
    pub ptyn_mask: [bool; PTYN_LEN],
    pub ptyn_ab_flag: Option<bool>,

    pub af: AfEngine,

    pub tp: bool,
    pub ta: bool,
    pub ms: bool,
    pub di: DiFlags,

    pub pty: u8,
    pub pin: Option<PinTime>,
    pub ecc: Option<u8>,
    pub lic: Option<u8>,

    pub clock: Option<ClockTime>,

    pub rt_plus_tags: HashMap<u8, RtPlusTag>,
    pub rt_plus_item_running: bool,
    pub rt_plus_item_toggle: bool,
    pub oda: OdaRegistry,

    pub eon: EonEngine,

    pub tmc_service_info: Option<TmcServiceInfo>,
    pub tmc_messages: VecDeque<TmcMessage>,
    pub tmc_active: bool,
    pub tmc_paused: bool,

    pub analyzer: Analyzer,
    pub analyzer_active: bool,

    pub pi_tracker: PiTracker,

    pub ps_candidate_string: String,
    pub ps_stable_since: Option<Instant>,

    pub rt_candidate: String,
    pub rt_stable_since: Option<Instant>,

    pub ps_history: VecDeque<PsHistoryEntry>,
    pub rt_history: VecDeque<RtHistoryEntry>,

    pub ber: BerEstimator,
}

impl Default for StationState {
    fn default() -> Self {
        Self {
            pi: None,
            ps_buf: [' '; 8],
            ps_mask: [false; 8],
            rt_buf: [['\0'; RT_LEN]; 2],
            rt_mask: [[false; RT_LEN]; 2],
            rt_ab_flag: None,
            lps_buf: [' '; LONG_PS_LEN],
            lps_mask: [false; LONG_PS_LEN],
            ptyn_buf: [' '; PTYN_LEN],
            ptyn_mask: [false; PTYN_LEN],
            ptyn_ab_flag: None,
            af: AfEngine::default(),
            tp: false,
            ta: false,
            ms: false,
            di: DiFlags::default(),
            pty: 0,
            pin: None,
            ecc: None,
            lic: None,
            clock: None,
            rt_plus_tags: HashMap::new(),
            rt_plus_item_running: false,
            rt_plus_item_toggle: false,
            oda: OdaRegistry::default(),
            eon: EonEngine::default(),
            tmc_service_info: None,
            tmc_messages: VecDeque::new(),
            tmc_active: true,
            tmc_paused: false,
            analyzer: Analyzer::default(),
            analyzer_active: true,
            pi_tracker: PiTracker::default(),
            ps_candidate_string: String::new(),
            ps_stable_since: None,
            rt_candidate: String::new(),
            rt_stable_since: None,
            ps_history: VecDeque::new(),
            rt_history: VecDeque::new(),
            ber: BerEstimator::new(),
        }
    }
}

impl StationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear every per-station field to its initial value (spec §3), on a
    /// confirmed PI change. Histories are cleared too. The caller is
    /// responsible for re-applying the triggering group's tp/pty and
    /// type-specific writes immediately afterward, preserving the
    /// "atomic" testable property (§8.2).
    pub fn deep_reset(&mut self, new_pi: u16) {
        let pi_tracker = self.pi_tracker.clone();
        let analyzer_active = self.analyzer_active;
        let tmc_active = self.tmc_active;
        let ber = self.ber.clone();
        *self = Self::default();
        self.pi = Some(new_pi);
        self.pi_tracker = pi_tracker;
        self.analyzer_active = analyzer_active;
        self.tmc_active = tmc_active;
        self.ber = ber;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deep_reset_clears_fields_but_keeps_new_pi() {
        let mut st = StationState::new();
        st.ps_buf = ['X'; 8];
        st.tp = true;
        st.ps_history.push_front(PsHistoryEntry {
            time: chrono::Utc::now(),
            pi: "ABCD".into(),
            ps: "OLD".into(),
            pty: 1,
        });

        st.deep_reset(0xD318);

        assert_eq!(st.pi, Some(0xD318));
        assert_eq!(st.ps_buf, [' '; 8]);
        assert!(!st.tp);
        assert!(st.ps_history.is_empty());
    }

    #[test]
    fn deep_reset_preserves_pi_tracker_and_ber_continuity() {
        let mut st = StationState::new();
        st.pi_tracker.observe(0xD318);
        for _ in 0..10 {
            st.ber.record(true);
        }
        assert!(!st.ber.in_grace());

        st.deep_reset(0xD318);
        assert!(!st.ber.in_grace());
        assert_eq!(st.pi_tracker.confirmed, Some(0xD318));
    }
}
