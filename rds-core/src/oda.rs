//! ODA registry and RT+ extractor (spec §4.8): group 3A AID binding and the
//! tag-slicing logic that reads content out of the active RT buffer.

use std::collections::HashMap;
use std::time::Instant;

/// AID advertised for RT+ (RadioText Plus) applications.
const RT_PLUS_AID: u16 = 0x4BD7;
/// Bounded history of recently-updated RT+ tags (spec §5 resource bound).
const RT_PLUS_TAG_CAP: usize = 6;

#[derive(Debug, Clone)]
pub struct RtPlusTag {
    pub content_type: u8,
    pub label: String,
    pub text: String,
    pub start: u8,
    pub length: u8,
    pub timestamp: Instant,
    /// Set true on the RT A/B flip that stales this tag's source buffer.
    pub is_cached: bool,
}

/// Human-readable label for an RT+ content type code. Unknown codes fall
/// back to a generic placeholder rather than failing.
fn content_type_label(code: u8) -> &'static str {
    match code {
        1 => "ITEM.TITLE",
        2 => "ITEM.ALBUM",
        3 => "ITEM.TRACKNUMBER",
        4 => "ITEM.ARTIST",
        5 => "ITEM.COMPOSITION",
        6 => "ITEM.MOVEMENT",
        7 => "ITEM.CONDUCTOR",
        8 => "ITEM.COMPOSER",
        9 => "ITEM.BAND",
        10 => "ITEM.COMMENT",
        11 => "ITEM.GENRE",
        12 => "INFO.NEWS",
        13 => "INFO.NEWS.LOCAL",
        14 => "INFO.STOCKMARKET",
        15 => "INFO.SPORT",
        16 => "INFO.LOTTERY",
        17 => "INFO.HOROSCOPE",
        18 => "INFO.DAILY_DIVERSION",
        19 => "INFO.HEALTH",
        20 => "INFO.EVENT",
        21 => "INFO.SCENE",
        22 => "INFO.CINEMA",
        23 => "INFO.TV",
        24 => "INFO.DATE_TIME",
        25 => "INFO.WEATHER",
        26 => "INFO.TRAFFIC",
        27 => "INFO.ALARM",
        28 => "INFO.ADVERTISEMENT",
        29 => "INFO.URL",
        30 => "INFO.OTHER",
        31 => "STATIONNAME.SHORT",
        32 => "STATIONNAME.LONG",
        33 => "PROGRAMME.NOW",
        34 => "PROGRAMME.NEXT",
        35 => "PROGRAMME.PART",
        36 => "PROGRAMME.HOST",
        37 => "PROGRAMME.EDITORIAL_STAFF",
        38 => "PROGRAMME.FREQUENCY",
        39 => "PROGRAMME.HOMEPAGE",
        40 => "PROGRAMME.SUBCHANNEL",
        41 => "PHONE.HOTLINE",
        42 => "PHONE.STUDIO",
        43 => "PHONE.OTHER",
        44 => "SMS.STUDIO",
        45 => "SMS.OTHER",
        46 => "EMAIL.HOTLINE",
        47 => "EMAIL.STUDIO",
        48 => "EMAIL.OTHER",
        49 => "MMS.OTHER",
        50 => "CHAT",
        51 => "CHAT.CENTER",
        52 => "VOTE.QUESTION",
        53 => "VOTE.CENTRE",
        59 => "PLACE",
        60 => "APPOINTMENT",
        61 => "IDENTIFIER",
        62 => "PURCHASE",
        63 => "GET_DATA",
        _ => "UNKNOWN",
    }
}

/// Per-station ODA bindings: which group type/version carries RT+, plus a
/// generic `raw-group -> AID` table for any other bound applications.
#[derive(Debug, Clone, Default)]
pub struct OdaRegistry {
    /// `B2 & 0x1F` value (type<<1 | version) bound to RT+ via 3A AID 0x4BD7.
    pub rt_plus_oda_group: Option<u8>,
    pub bindings: HashMap<u8, u16>,
}

impl OdaRegistry {
    /// Handle a 3A group: bind RT+ if either data block equals the RT+ AID,
    /// and record a generic group->AID binding regardless.
    ///
    /// `group_index = B2 & 0x1F` (spec §4.8) is the target group's
    /// `(type << 1) | version` designator, carried in B2's low 5 bits of the
    /// 3A group itself (whose own type/version sit in the top 5 bits).
    pub fn handle_3a(&mut self, b2: u16, b3: u16, b4: u16) {
        let group_index = (b2 & 0x1F) as u8;
        if b3 == RT_PLUS_AID || b4 == RT_PLUS_AID {
            self.rt_plus_oda_group = Some(group_index);
        }
        self.bindings.insert(group_index, b4);
    }

    /// Whether an incoming group (identified by its raw `B2 & 0x1F` value)
    /// carries RT+ payloads: either the bound ODA group, or the canonical
    /// 11A/12A group-index values.
    pub fn carries_rt_plus(&self, raw_group_index: u8) -> bool {
        const CANONICAL_11A: u8 = (11 << 1) | 0;
        const CANONICAL_12A: u8 = (12 << 1) | 0;
        raw_group_index == CANONICAL_11A
            || raw_group_index == CANONICAL_12A
            || self.rt_plus_oda_group == Some(raw_group_index)
    }
}

/// One decoded RT+ tag slot, ready to slice against the active RT buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagRequest {
    pub content_type: u8,
    pub start: usize,
    pub length: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RtPlusFlags {
    pub item_running: bool,
    pub item_toggle: bool,
}

/// Decode an RT+ payload group's flags and the two tag slots.
pub fn decode_payload(b2: u16, b3: u16, b4: u16) -> (RtPlusFlags, [TagRequest; 2]) {
    let item_running = (b2 >> 4) & 0x1 == 1;
    let item_toggle = (b2 >> 3) & 0x1 == 1;

    let type1 = ((b3 >> 13) & 0x7) as u8;
    let start1 = ((b3 >> 7) & 0x3F) as usize;
    let len1 = ((b3 >> 1) & 0x3F) as usize;

    let type2 = ((b4 >> 11) & 0x1F) as u8;
    let start2 = ((b4 >> 5) & 0x3F) as usize;
    let len2 = (b4 & 0x1F) as usize;

    (
        RtPlusFlags {
            item_running,
            item_toggle,
        },
        [
            TagRequest {
                content_type: type1,
                start: start1,
                length: len1,
            },
            TagRequest {
                content_type: type2,
                start: start2,
                length: len2,
            },
        ],
    )
}

/// Slice `[start, start+length]` (inclusive, per spec) out of the active RT
/// buffer, strip control characters, trim, and build a tag if non-empty.
pub fn slice_tag(active_rt_buf: &[char], req: TagRequest, now: Instant) -> Option<RtPlusTag> {
    if req.content_type == 0 {
        return None;
    }
    let end = (req.start + req.length + 1).min(active_rt_buf.len());
    if req.start >= active_rt_buf.len() || req.start >= end {
        return None;
    }
    let text: String = active_rt_buf[req.start..end]
        .iter()
        .filter(|c| !c.is_control())
        .collect::<String>()
        .trim()
        .to_string();
    if text.is_empty() {
        return None;
    }
    Some(RtPlusTag {
        content_type: req.content_type,
        label: content_type_label(req.content_type).to_string(),
        text,
        start: req.start as u8,
        length: req.length as u8,
        timestamp: now,
        is_cached: false,
    })
}

/// Insert/update a tag, then trim to the 6 most recently updated by
/// timestamp, discarding the oldest.
pub fn upsert_tag(tags: &mut HashMap<u8, RtPlusTag>, tag: RtPlusTag) {
    tags.insert(tag.content_type, tag);
    if tags.len() > RT_PLUS_TAG_CAP {
        if let Some(oldest_key) = tags
            .iter()
            .min_by_key(|(_, t)| t.timestamp)
            .map(|(k, _)| *k)
        {
            tags.remove(&oldest_key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binds_rt_plus_on_3a_with_aid_in_b4() {
        let mut reg = OdaRegistry::default();
        // type=3, version=A (bits 15..11 = 00110), designator = (11<<1)|1 = 23
        // in the low 5 bits.
        let b2 = (3u16 << 12) | 23;
        reg.handle_3a(b2, 0x0000, RT_PLUS_AID);
        assert_eq!(reg.rt_plus_oda_group, Some(23));
        assert!(reg.carries_rt_plus(23));
    }

    #[test]
    fn canonical_11a_12a_always_carry_rt_plus() {
        let reg = OdaRegistry::default();
        assert!(reg.carries_rt_plus((11 << 1) | 0));
        assert!(reg.carries_rt_plus((12 << 1) | 0));
        assert!(!reg.carries_rt_plus((13 << 1) | 0));
    }

    #[test]
    fn slices_tag_from_active_buffer() {
        let mut buf = [' '; 64];
        for (i, c) in "Artist Name".chars().enumerate() {
            buf[i] = c;
        }
        let req = TagRequest {
            content_type: 4,
            start: 0,
            length: 10, // inclusive: chars[0..=10] -> 11 chars "Artist Name"
        };
        let tag = slice_tag(&buf, req, Instant::now()).unwrap();
        assert_eq!(tag.text, "Artist Name");
        assert_eq!(tag.label, "ITEM.ARTIST");
    }

    #[test]
    fn zero_type_tag_is_skipped() {
        let buf = [' '; 64];
        let req = TagRequest {
            content_type: 0,
            start: 0,
            length: 5,
        };
        assert!(slice_tag(&buf, req, Instant::now()).is_none());
    }

    #[test]
    fn tag_cap_keeps_six_most_recent() {
        let mut tags = HashMap::new();
        for i in 1..=7u8 {
            let tag = RtPlusTag {
                content_type: i,
                label: "X".into(),
                text: "x".into(),
                start: 0,
                length: 1,
                timestamp: Instant::now(),
                is_cached: false,
            };
            upsert_tag(&mut tags, tag);
            std::thread::sleep(std::time::Duration::from_millis(1));
        }
        assert_eq!(tags.len(), 6);
        assert!(!tags.contains_key(&1)); // oldest evicted
    }
}
