//! TMC engine (spec §4.11): group 8A service-info capture and user-message
//! assembly with dedup/merge.
//!
//! The single-group message bit layout (B2 bits 2..0 = duration code, B3
//! carrying diversion/direction/extent/event-code, B4 = location code) and
//! the `cc`/`nature`/`urgency` derivations are a documented simplification:
//! the full ISO 14819-2 event-code book is not embedded, so `nature` and
//! `urgency` are derived heuristically rather than looked up (see
//! DESIGN.md).

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::VecDeque;

pub const TMC_MESSAGE_CAP: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TmcServiceInfo {
    pub ltn: u8,
    pub sid: u8,
    pub afi: bool,
    pub mode: bool,
}

/// Duration code -> human label, per spec §4.11.
pub fn duration_label(code: u8) -> &'static str {
    match code {
        0 => "No duration",
        1 => "15 minutes",
        2 => "30 minutes",
        3 => "1 hour",
        4 => "2 hours",
        5 => "3 hours",
        6 => "4 hours",
        7 => "Longer Lasting",
        _ => "Unknown",
    }
}

fn duration_minutes(code: u8) -> i64 {
    match code {
        0 => 0,
        1 => 15,
        2 => 30,
        3 => 60,
        4 => 120,
        5 => 180,
        6 => 240,
        7 => 480,
        _ => 0,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TmcMessage {
    pub id: String,
    pub received_time: DateTime<Utc>,
    pub expires_time: DateTime<Utc>,
    pub cc: u8,
    pub event_code: u16,
    pub location_code: u16,
    pub extent: u8,
    pub direction: bool,
    pub diversion: bool,
    pub duration_code: u8,
    pub duration_label: String,
    pub urgency: String,
    pub nature: String,
    pub update_count: u32,
}

/// The dedup key per spec §3.
pub type DedupKey = (u16, u16, bool, u8);

impl TmcMessage {
    pub fn dedup_key(&self) -> DedupKey {
        (self.location_code, self.event_code, self.direction, self.extent)
    }
}

/// Decode an 8A group. `tuning_flag = bit4(B2)`.
pub enum TmcGroupResult {
    ServiceInfo(TmcServiceInfo),
    UserMessage(TmcMessage),
}

pub fn decode(b2: u16, b3: u16, b4: u16, cc: u8, now: DateTime<Utc>) -> Option<TmcGroupResult> {
    let tuning_flag = (b2 >> 4) & 0x1 == 1;

    if tuning_flag {
        let ltn = ((b3 >> 10) & 0x3F) as u8;
        let afi = (b3 >> 9) & 0x1 == 1;
        let mode = (b3 >> 8) & 0x1 == 1;
        let sid = ((b3 >> 2) & 0x3F) as u8;
        if ltn > 0 || sid > 0 {
            return Some(TmcGroupResult::ServiceInfo(TmcServiceInfo {
                ltn,
                sid,
                afi,
                mode,
            }));
        }
        return None;
    }

    let duration_code = (b2 & 0x7) as u8;
    let diversion = (b3 >> 15) & 0x1 == 1;
    let direction = (b3 >> 14) & 0x1 == 1;
    let extent = ((b3 >> 11) & 0x7) as u8;
    let event_code = b3 & 0x7FF;
    let location_code = b4;

    let nature = if event_code == 0 {
        "Cleared".to_string()
    } else {
        "Active".to_string()
    };
    let urgency = if diversion {
        "Urgent".to_string()
    } else {
        "Normal".to_string()
    };

    let expires_time = now + Duration::minutes(duration_minutes(duration_code));

    Some(TmcGroupResult::UserMessage(TmcMessage {
        id: format!("{location_code:04X}-{event_code:03X}-{}", now.timestamp_millis()),
        received_time: now,
        expires_time,
        cc,
        event_code,
        location_code,
        extent,
        direction,
        diversion,
        duration_code,
        duration_label: duration_label(duration_code).to_string(),
        urgency,
        nature,
        update_count: 1,
    }))
}

/// Merge a freshly-decoded message into the bounded, newest-first buffer:
/// update in place on dedup-key match, else prepend and cap at 100.
pub fn merge(messages: &mut VecDeque<TmcMessage>, incoming: TmcMessage) {
    if let Some(existing) = messages
        .iter_mut()
        .find(|m| m.dedup_key() == incoming.dedup_key())
    {
        existing.received_time = incoming.received_time;
        existing.expires_time = incoming.expires_time;
        existing.update_count += 1;
        return;
    }
    messages.push_front(incoming);
    while messages.len() > TMC_MESSAGE_CAP {
        messages.pop_back();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_info_published_only_when_ltn_or_sid_positive() {
        let now = Utc::now();
        let b2 = 1 << 4; // tuning flag
        let b3 = (0u16 << 10) | (0 << 2); // ltn=0, sid=0
        assert!(decode(b2, b3, 0, 1, now).is_none());

        let b3 = (5u16 << 10) | (0 << 2); // ltn=5
        match decode(b2, b3, 0, 1, now) {
            Some(TmcGroupResult::ServiceInfo(info)) => assert_eq!(info.ltn, 5),
            _ => panic!("expected service info"),
        }
    }

    /// S3 — two 8A user messages sharing the dedup key merge into one entry
    /// with update_count == 2 and the later receive time.
    #[test]
    fn s3_tmc_dedup_scenario() {
        let mut messages = VecDeque::new();
        let t1 = Utc::now();
        let t2 = t1 + Duration::seconds(30);

        let location_code = 12345u16;
        let event_code = 101u16;
        let extent = 2u8;
        let direction = false;

        let b3 = ((extent as u16) << 11) | event_code;
        let b2 = 0u16; // not tuning, duration_code=0
        let b4 = location_code;

        let m1 = match decode(b2, b3, b4, 1, t1) {
            Some(TmcGroupResult::UserMessage(m)) => m,
            _ => panic!(),
        };
        let m2 = match decode(b2, b3, b4, 1, t2) {
            Some(TmcGroupResult::UserMessage(m)) => m,
            _ => panic!(),
        };
        assert_eq!(m1.direction, direction);

        merge(&mut messages, m1);
        merge(&mut messages, m2);

        assert_eq!(messages.len(), 1);
        let only = &messages[0];
        assert_eq!(only.update_count, 2);
        assert_eq!(only.received_time, t2);
    }

    #[test]
    fn cap_at_100_drops_oldest() {
        let mut messages = VecDeque::new();
        let now = Utc::now();
        for i in 0..110u16 {
            let msg = TmcMessage {
                id: i.to_string(),
                received_time: now,
                expires_time: now,
                cc: 1,
                event_code: i,
                location_code: i,
                extent: 0,
                direction: false,
                diversion: false,
                duration_code: 0,
                duration_label: duration_label(0).to_string(),
                urgency: "Normal".into(),
                nature: "Active".into(),
                update_count: 1,
            };
            merge(&mut messages, msg);
        }
        assert_eq!(messages.len(), TMC_MESSAGE_CAP);
    }
}
