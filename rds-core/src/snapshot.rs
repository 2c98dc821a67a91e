//! Snapshot publisher (spec §4.16) and the observable output shape (§6):
//! every station field named in spec §3, plus BER, analyzer totals, and
//! the raw-group backlog since the previous publish.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::af::AfType;
use crate::ecc::PinTime;
use crate::group::Group;
use crate::history::{PsHistoryEntry, RtHistoryEntry};
use crate::station::StationState;
use crate::tmc::TmcMessage;

/// One raw group observed since the previous published snapshot.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentGroup {
    #[serde(rename = "type")]
    pub group_type: String,
    pub blocks: [u16; 4],
    pub time: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AfBEntrySnapshot {
    pub transmitter: String,
    pub expected: u8,
    pub afs: Vec<String>,
    pub match_count: u32,
    pub pair_count: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RtPlusTagSnapshot {
    pub content_type: u8,
    pub label: String,
    pub text: String,
    pub start: u8,
    pub length: u8,
    pub is_cached: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EonNetworkSnapshot {
    pub pi: String,
    pub ps: String,
    pub tp: bool,
    pub ta: bool,
    pub pty: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pin: Option<PinTime>,
    pub af_list: Vec<String>,
    pub mapped_freqs: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub linkage_info: Option<u16>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub pi: String,

    pub ps: String,
    pub ps_mask: [bool; 8],

    pub rt: String,
    pub rt_mask: Vec<bool>,

    pub ptyn: String,
    pub long_ps: String,

    pub af_set: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub af_list_head: Option<String>,
    pub af_type: AfType,
    pub af_b_map: Vec<AfBEntrySnapshot>,

    pub tp: bool,
    pub ta: bool,
    pub ms: bool,
    pub di_dynamic_pty: bool,
    pub di_compressed: bool,
    pub di_artificial_head: bool,
    pub di_stereo: bool,

    pub pty: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pin: Option<PinTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ecc: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lic: Option<u8>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub utc_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_time: Option<String>,

    pub rt_plus_tags: Vec<RtPlusTagSnapshot>,
    pub rt_plus_item_running: bool,
    pub rt_plus_item_toggle: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rt_plus_oda_group: Option<u8>,

    pub eon_networks: Vec<EonNetworkSnapshot>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tmc_service_info: Option<crate::tmc::TmcServiceInfo>,
    pub tmc_messages: Vec<TmcMessage>,
    pub tmc_active: bool,
    pub tmc_paused: bool,

    pub group_total: u64,
    pub group_counts: std::collections::HashMap<String, u64>,
    pub ber: f32,

    pub ps_history: Vec<PsHistoryEntry>,
    pub rt_history: Vec<RtHistoryEntry>,

    pub recent_groups: Vec<RecentGroup>,
}

/// Coalesces dirty station state into an immutable [`Snapshot`] at most
/// once per publish call.
#[derive(Debug, Default)]
pub struct SnapshotPublisher {
    dirty: bool,
    recent_groups: VecDeque<RecentGroup>,
}

impl SnapshotPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Record one raw group into the since-last-publish backlog.
    pub fn record_group(&mut self, group: &Group, wall_now: DateTime<Utc>) {
        self.recent_groups.push_back(RecentGroup {
            group_type: group.name(),
            blocks: [group.b1(), group.b2(), group.b3(), group.b4()],
            time: wall_now.format("%H:%M:%S").to_string(),
        });
    }

    /// Compose a snapshot if dirty, clearing the dirty flag and backlog.
    /// Returns `None` when nothing changed since the last publish.
    pub fn publish(&mut self, station: &StationState) -> Option<Snapshot> {
        if !self.dirty {
            return None;
        }
        self.dirty = false;

        let recent_groups: Vec<RecentGroup> = self.recent_groups.drain(..).collect();

        let pi = station
            .pi
            .map(|p| format!("{p:04X}"))
            .unwrap_or_else(|| "UNKNOWN".to_string());

        let ps: String = station.ps_buf.iter().collect();
        let active_rt = if station.rt_ab_flag == Some(true) { 1 } else { 0 };
        let rt = crate::assemblers::rt::render(&station.rt_buf[active_rt]);
        let ptyn: String = station.ptyn_buf.iter().collect();
        let long_ps: String = station.lps_buf.iter().collect();

        let af_b_map = station
            .af
            .af_b_map
            .iter()
            .map(|(freq, entry)| AfBEntrySnapshot {
                transmitter: freq.to_string(),
                expected: entry.expected,
                afs: entry.afs.iter().map(|f| f.to_string()).collect(),
                match_count: entry.match_count,
                pair_count: entry.pair_count,
            })
            .collect();

        let mut rt_plus_tags: Vec<RtPlusTagSnapshot> = station
            .rt_plus_tags
            .values()
            .map(|tag| RtPlusTagSnapshot {
                content_type: tag.content_type,
                label: tag.label.clone(),
                text: tag.text.clone(),
                start: tag.start,
                length: tag.length,
                is_cached: tag.is_cached,
            })
            .collect();
        rt_plus_tags.sort_by_key(|t| t.content_type);

        let eon_networks: Vec<EonNetworkSnapshot> = station
            .eon
            .networks
            .values()
            .map(|net| EonNetworkSnapshot {
                pi: format!("{:04X}", net.pi),
                ps: net.ps_buf.iter().collect(),
                tp: net.tp,
                ta: net.ta,
                pty: net.pty,
                pin: net.pin,
                af_list: net.af_list.iter().map(|f| f.to_string()).collect(),
                mapped_freqs: net.mapped_freqs.iter().cloned().collect(),
                linkage_info: net.linkage_info,
            })
            .collect();

        Some(Snapshot {
            pi,
            ps,
            ps_mask: station.ps_mask,
            rt,
            rt_mask: station.rt_mask[active_rt].to_vec(),
            ptyn,
            long_ps,
            af_set: station.af.af_set.iter().map(|f| f.to_string()).collect(),
            af_list_head: station.af.af_list_head.map(|f| f.to_string()),
            af_type: station.af.af_type,
            af_b_map,
            tp: station.tp,
            ta: station.ta,
            ms: station.ms,
            di_dynamic_pty: station.di.dynamic_pty,
            di_compressed: station.di.compressed,
            di_artificial_head: station.di.artificial_head,
            di_stereo: station.di.stereo,
            pty: station.pty,
            pin: station.pin,
            ecc: station.ecc,
            lic: station.lic,
            utc_time: station.clock.as_ref().map(|c| c.utc.clone()),
            local_time: station.clock.as_ref().map(|c| c.local.clone()),
            rt_plus_tags,
            rt_plus_item_running: station.rt_plus_item_running,
            rt_plus_item_toggle: station.rt_plus_item_toggle,
            rt_plus_oda_group: station.oda.rt_plus_oda_group,
            eon_networks,
            tmc_service_info: station.tmc_service_info,
            tmc_messages: station.tmc_messages.iter().cloned().collect(),
            tmc_active: station.tmc_active,
            tmc_paused: station.tmc_paused,
            group_total: station.analyzer.group_total,
            group_counts: station.analyzer.group_counts.clone(),
            ber: station.ber.ber(),
            ps_history: station.ps_history.iter().cloned().collect(),
            rt_history: station.rt_history.iter().cloned().collect(),
            recent_groups,
        })
    }
}
