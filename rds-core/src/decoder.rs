//! Top-level `Decoder` (spec §4.3): wires the frame ingester, PI tracker,
//! per-group-type handlers, history logger, BER estimator and snapshot
//! publisher into one cooperative, single-threaded pipeline.

use std::time::Instant;

use chrono::{DateTime, Utc};
use tracing::trace;

use crate::assemblers::{ps, ptyn_lps, rt};
use crate::ecc;
use crate::eon;
use crate::frame::{FrameIngester, IngestEvent};
use crate::group::{Group, RawGroup, Version};
use crate::history;
use crate::oda;
use crate::pi::PiOutcome;
use crate::snapshot::{Snapshot, SnapshotPublisher};
use crate::station::StationState;
use crate::tmc::{self, TmcGroupResult};

/// Owns one station's decode state and the ingest pipeline feeding it.
#[derive(Debug)]
pub struct Decoder {
    pub station: StationState,
    ingester: FrameIngester,
    publisher: SnapshotPublisher,
}

impl Default for Decoder {
    fn default() -> Self {
        Self {
            station: StationState::new(),
            ingester: FrameIngester::new(),
            publisher: SnapshotPublisher::new(),
        }
    }
}

impl Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk of already-decoded text. Drains every complete frame
    /// found, mutating station state and BER in place.
    pub fn ingest(&mut self, chunk: &str) {
        let events = self.ingester.push(chunk);
        for event in events {
            self.handle_event(event);
        }
    }

    fn handle_event(&mut self, event: IngestEvent) {
        match event {
            IngestEvent::Group(raw) => {
                self.station.ber.record(true);
                self.process_group(raw);
                self.publisher.mark_dirty();
            }
            IngestEvent::Corruption => {
                self.station.ber.record(false);
                if self.station.analyzer_active {
                    self.station.analyzer.record("--");
                }
                self.publisher.mark_dirty();
            }
            IngestEvent::Watchdog => {
                self.station.ber.record(false);
            }
        }
    }

    fn process_group(&mut self, raw: RawGroup) {
        let now = Instant::now();
        let wall_now = Utc::now();
        let group = Group::classify(raw);

        if let PiOutcome::Confirmed(new_pi) = self.station.pi_tracker.observe(group.b1()) {
            if self.station.pi != Some(new_pi) {
                self.station.deep_reset(new_pi);
            }
        }

        // Unconditional per group dispatcher (spec §4.3), re-applied after
        // any deep reset so the triggering group's own fields still land.
        self.station.tp = group.tp();
        self.station.pty = group.pty();

        if self.station.analyzer_active {
            self.station.analyzer.record(&group.name());
        }

        self.publisher.record_group(&group, wall_now);
        self.dispatch_type_handler(&group, wall_now);
        self.dispatch_rt_plus_payload(&group, now);
        self.update_stability_and_history(now, wall_now);
    }

    fn dispatch_type_handler(&mut self, group: &Group, wall_now: DateTime<Utc>) {
        let (b2, b3, b4) = (group.b2(), group.b3(), group.b4());
        let st = &mut self.station;

        match (group.group_type, group.version) {
            (0, _) => {
                let update = ps::apply(b2, b4, &mut st.ps_buf, &mut st.ps_mask);
                st.ta = update.ta;
                st.ms = update.ms;
                match update.di_slot {
                    ps::DiSlot::DynamicPty => st.di.dynamic_pty = update.di_bit,
                    ps::DiSlot::Compressed => st.di.compressed = update.di_bit,
                    ps::DiSlot::ArtificialHead => st.di.artificial_head = update.di_bit,
                    ps::DiSlot::Stereo => st.di.stereo = update.di_bit,
                }
                if group.version == Version::A {
                    st.af.update_from_0a(b3);
                }
            }
            (1, _) => {
                let update = ecc::decode(b3, b4);
                if let Some(ecc) = update.ecc {
                    st.ecc = Some(ecc);
                }
                if let Some(lic) = update.lic {
                    st.lic = Some(lic);
                }
                if let Some(pin) = update.pin {
                    st.pin = Some(pin);
                }
            }
            (2, Version::A) => {
                let write = rt::apply_2a(b2, b3, b4, &mut st.rt_ab_flag, &mut st.rt_buf, &mut st.rt_mask);
                if write.flipped {
                    for tag in st.rt_plus_tags.values_mut() {
                        tag.is_cached = true;
                    }
                }
            }
            (2, Version::B) => {
                let write = rt::apply_2b(b2, b4, &mut st.rt_ab_flag, &mut st.rt_buf, &mut st.rt_mask);
                if write.flipped {
                    for tag in st.rt_plus_tags.values_mut() {
                        tag.is_cached = true;
                    }
                }
            }
            (3, Version::A) => {
                st.oda.handle_3a(b2, b3, b4);
            }
            (4, Version::A) => {
                st.clock = crate::clock::decode(b2, b3, b4);
            }
            (8, Version::A) => {
                if st.tmc_active && !st.tmc_paused {
                    let cc = (st.pi.unwrap_or(0) >> 12) as u8;
                    if let Some(result) = tmc::decode(b2, b3, b4, cc, wall_now) {
                        match result {
                            TmcGroupResult::ServiceInfo(info) => st.tmc_service_info = Some(info),
                            TmcGroupResult::UserMessage(msg) => tmc::merge(&mut st.tmc_messages, msg),
                        }
                    }
                }
            }
            (10, Version::A) => {
                ptyn_lps::apply_ptyn(b2, b3, b4, &mut st.ptyn_ab_flag, &mut st.ptyn_buf, &mut st.ptyn_mask);
            }
            (14, Version::A) => {
                st.eon.handle_14a(b2, b3, b4, wall_now.timestamp_millis() as u64);
            }
            (15, Version::A) => {
                ptyn_lps::apply_long_ps_a(b2, b3, b4, &mut st.lps_buf, &mut st.lps_mask);
            }
            (15, Version::B) => {
                ptyn_lps::apply_long_ps_b(b2, b4, &mut st.lps_buf, &mut st.lps_mask);
            }
            _ => {
                trace!(name = %group.name(), "no handler registered for group type");
            }
        }
    }

    /// RT+ payload extraction runs independently of the structural dispatch
    /// above: any group whose `group_index` matches the bound ODA group (or
    /// the canonical 11A/12A) carries tag slots regardless of its type.
    fn dispatch_rt_plus_payload(&mut self, group: &Group, now: Instant) {
        let index = group.group_index();
        if !self.station.oda.carries_rt_plus(index) {
            return;
        }

        let (flags, requests) = oda::decode_payload(group.b2(), group.b3(), group.b4());
        self.station.rt_plus_item_running = flags.item_running;
        self.station.rt_plus_item_toggle = flags.item_toggle;

        let active = if self.station.rt_ab_flag == Some(true) { 1 } else { 0 };
        let active_buf = self.station.rt_buf[active];
        for req in requests {
            if let Some(tag) = oda::slice_tag(&active_buf, req, now) {
                oda::upsert_tag(&mut self.station.rt_plus_tags, tag);
            }
        }
    }

    fn update_stability_and_history(&mut self, now: Instant, wall_now: DateTime<Utc>) {
        let st = &mut self.station;

        let ps_current: String = st.ps_buf.iter().collect();
        if st.ps_candidate_string != ps_current {
            st.ps_candidate_string = ps_current;
            st.ps_stable_since = Some(now);
        } else if st.ps_stable_since.is_none() {
            st.ps_stable_since = Some(now);
        }

        let active = if st.rt_ab_flag == Some(true) { 1 } else { 0 };
        let rt_current = rt::render(&st.rt_buf[active]);
        if st.rt_candidate != rt_current {
            st.rt_candidate = rt_current;
            st.rt_stable_since = Some(now);
        } else if st.rt_stable_since.is_none() {
            st.rt_stable_since = Some(now);
        }

        let pi_confirmed = st.pi.is_some();
        let pi_hex = st.pi.map(|p| format!("{p:04X}")).unwrap_or_else(|| "UNKNOWN".to_string());
        history::try_append_ps(
            &mut st.ps_history,
            pi_confirmed,
            st.pi_tracker.established_at,
            st.ps_stable_since,
            now,
            wall_now,
            &pi_hex,
            &st.ps_candidate_string,
            st.pty,
        );

        let rt_complete = rt::is_complete(&st.rt_buf[active], &st.rt_mask[active]);
        history::try_append_rt(&mut st.rt_history, rt_complete, st.rt_stable_since, now, wall_now, &st.rt_candidate);
    }

    /// Compose and return a snapshot if anything changed since the last
    /// call. Intended to be driven by a host scheduler tick.
    pub fn tick(&mut self) -> Option<Snapshot> {
        self.publisher.publish(&self.station)
    }

    pub fn set_tmc_active(&mut self, active: bool) {
        self.station.tmc_active = active;
        if !active {
            self.station.tmc_paused = false;
        }
    }

    pub fn set_tmc_paused(&mut self, paused: bool) {
        self.station.tmc_paused = paused;
    }

    pub fn set_analyzer_active(&mut self, active: bool) {
        self.station.analyzer_active = active;
    }

    pub fn reset_analyzer(&mut self) {
        self.station.analyzer.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hex_group(b1: u16, b2: u16, b3: u16, b4: u16) -> String {
        format!("{b1:04X} {b2:04X} {b3:04X} {b4:04X}\n")
    }

    #[test]
    fn first_group_confirms_pi_from_unknown() {
        let mut dec = Decoder::new();
        dec.ingest(&hex_group(0xD318, 0, 0, 0));
        assert_eq!(dec.station.pi, Some(0xD318));
    }

    #[test]
    fn ps_assembles_across_four_0a_groups() {
        let mut dec = Decoder::new();
        let writes: [(u16, &str); 4] = [(0, "BF"), (1, "M "), (2, "RO"), (3, "CK")];
        for (address, pair) in writes {
            let bytes: Vec<u8> = pair.bytes().collect();
            let b4 = ((bytes[0] as u16) << 8) | bytes[1] as u16;
            dec.ingest(&hex_group(0xD318, address, 0, b4));
        }
        let ps: String = dec.station.ps_buf.iter().collect();
        assert_eq!(ps, "BFM ROCK");
    }

    #[test]
    fn pi_change_after_four_repeats_deep_resets_station() {
        let mut dec = Decoder::new();
        dec.ingest(&hex_group(0xD318, 0, 0, 0x4142));
        for _ in 0..4 {
            dec.ingest(&hex_group(0x9999, 0, 0, 0x5758));
        }
        assert_eq!(dec.station.pi, Some(0x9999));
        // the triggering group's own B4 write (address 0, "WX") still lands
        // immediately after the reset.
        assert_eq!(dec.station.ps_buf[0], 'W');
        assert_eq!(dec.station.ps_buf[1], 'X');
    }

    #[test]
    fn corruption_marker_feeds_ber_without_touching_pi() {
        let mut dec = Decoder::new();
        dec.ingest("D318:0000:--:5678\n");
        assert_eq!(dec.station.pi, None);
        assert!(dec.station.analyzer.group_counts.contains_key("--"));
    }

    #[test]
    fn tick_emits_snapshot_only_when_dirty() {
        let mut dec = Decoder::new();
        assert!(dec.tick().is_none());
        dec.ingest(&hex_group(0xD318, 0, 0, 0));
        let snap = dec.tick().expect("dirty after ingest");
        assert_eq!(snap.pi, "D318");
        assert!(dec.tick().is_none());
    }

    #[test]
    fn tmc_active_false_clears_paused_flag() {
        let mut dec = Decoder::new();
        dec.set_tmc_paused(true);
        dec.set_tmc_active(false);
        assert!(!dec.station.tmc_paused);
    }
}
