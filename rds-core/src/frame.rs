//! Frame ingester (spec §4.1): turns a continuous byte feed into `Group`
//! events or `Corruption` markers, tolerating noise via a buffer watchdog.

use regex::Regex;
use std::sync::OnceLock;
use tracing::{debug, warn};

use crate::group::RawGroup;

/// Prefix length beyond which we give up looking for a frame boundary and
/// drop the head of the buffer, per spec §4.1.
const WATCHDOG_LIMIT: usize = 500;
const WATCHDOG_DROP: usize = 250;

/// One parsed unit from the incoming stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestEvent {
    Group(RawGroup),
    Corruption,
    /// Buffer watchdog fired: counts as a BER failure but is not itself a
    /// group or corruption marker (so it never touches `group_sequence`).
    Watchdog,
}

fn hex_tuple_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        // Four tokens, each either 4 hex digits or a 2-4 dash corruption
        // marker, separated by any non-empty run of whitespace/:/,/-.
        Regex::new(
            r"(?i)([0-9a-f]{4}|-{2,4})[ \t:,-]+([0-9a-f]{4}|-{2,4})[ \t:,-]+([0-9a-f]{4}|-{2,4})[ \t:,-]+([0-9a-f]{4}|-{2,4})",
        )
        .expect("static hex-tuple regex is valid")
    })
}

/// Accumulates raw bytes (already Windows-1252-decoded to UTF-8-safe text
/// by the transport) and extracts JSON-record or hex-tuple frames.
#[derive(Debug, Default)]
pub struct FrameIngester {
    buf: String,
}

impl FrameIngester {
    pub fn new() -> Self {
        Self { buf: String::new() }
    }

    /// Feed a chunk of already-decoded text and drain every frame it can
    /// find. May emit more than one event per call.
    pub fn push(&mut self, chunk: &str) -> Vec<IngestEvent> {
        self.buf.push_str(chunk);
        let mut events = Vec::new();

        loop {
            if self.buf.len() > WATCHDOG_LIMIT && self.try_extract_one().is_none() {
                let drop = WATCHDOG_DROP.min(self.buf.len());
                self.buf.drain(..drop);
                warn!("frame ingester watchdog: dropped {drop} bytes of unparsed noise");
                events.push(IngestEvent::Watchdog);
                continue;
            }
            match self.try_extract_one() {
                Some(ev) => events.push(ev),
                None => break,
            }
        }

        events
    }

    /// Find and consume the earliest frame (JSON record or hex tuple) in
    /// the buffer, if any. Returns `None` if no complete frame is present
    /// yet — the remainder is left buffered for the next chunk.
    fn try_extract_one(&mut self) -> Option<IngestEvent> {
        let json_span = find_json_record(&self.buf);
        let hex_match = hex_tuple_re().find(&self.buf);

        let json_start = json_span.map(|(s, _)| s);
        let hex_start = hex_match.as_ref().map(|m| m.start());

        match (json_start, hex_start) {
            (None, None) => None,
            (Some(_), None) => {
                let (start, end) = json_span.unwrap();
                let text = self.buf[start..end].to_string();
                self.buf.drain(..end);
                parse_json_record(&text)
            }
            (None, Some(_)) => {
                let m = hex_match.unwrap();
                let (start, end) = (m.start(), m.end());
                let caps = hex_tuple_re().captures(&self.buf[start..end])?;
                let event = parse_hex_tuple(&caps);
                self.buf.drain(..end);
                Some(event)
            }
            (Some(j), Some(h)) => {
                if j <= h {
                    let (start, end) = json_span.unwrap();
                    let text = self.buf[start..end].to_string();
                    self.buf.drain(..end);
                    parse_json_record(&text)
                } else {
                    let m = hex_match.unwrap();
                    let (start, end) = (m.start(), m.end());
                    let caps = hex_tuple_re().captures(&self.buf[start..end])?;
                    let event = parse_hex_tuple(&caps);
                    self.buf.drain(..end);
                    Some(event)
                }
            }
        }
    }
}

/// Find the first balanced `{…}` pair: first `{`, then first `}` strictly
/// after it. Returns the byte span `[start, end)` including both braces.
fn find_json_record(buf: &str) -> Option<(usize, usize)> {
    let start = buf.find('{')?;
    let end_rel = buf[start + 1..].find('}')?;
    Some((start, start + 1 + end_rel + 1))
}

fn parse_json_record(text: &str) -> Option<IngestEvent> {
    let value: serde_json::Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(e) => {
            debug!("frame ingester: unparseable JSON record {text:?}: {e}");
            return None;
        }
    };
    let g1 = value.get("g1")?.as_u64()?;
    let g2 = value.get("g2")?.as_u64()?;
    let g3 = value.get("g3")?.as_u64()?;
    let g4 = value.get("g4")?.as_u64()?;
    Some(IngestEvent::Group(RawGroup {
        b1: g1 as u16,
        b2: g2 as u16,
        b3: g3 as u16,
        b4: g4 as u16,
    }))
}

fn parse_hex_tuple(caps: &regex::Captures) -> IngestEvent {
    let tokens: Vec<&str> = (1..=4).map(|i| caps.get(i).unwrap().as_str()).collect();
    if tokens.iter().any(|t| t.starts_with('-')) {
        return IngestEvent::Corruption;
    }
    let parsed: Vec<u16> = tokens
        .iter()
        .map(|t| u16::from_str_radix(t, 16).unwrap_or(0))
        .collect();
    IngestEvent::Group(RawGroup {
        b1: parsed[0],
        b2: parsed[1],
        b3: parsed[2],
        b4: parsed[3],
    })
}
