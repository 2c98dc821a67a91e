//! Alternative-Frequency engine (spec §4.5): AF accumulation and the
//! Method-A/Method-B disambiguation heuristic.

use std::collections::HashSet;

use serde::Serialize;

/// Method-B "plausibly full" threshold: `size >= ratio * expected`.
pub const AF_PLAUSIBLE_FULL_RATIO: f64 = 0.75;
/// Method-B pairing-match threshold: `match_count / pair_count > ratio`.
pub const AF_METHOD_B_MATCH_RATIO: f64 = 0.35;

/// An AF frequency in tenths of a MHz (e.g. 96.3 MHz is `Freq(963)`), so it
/// can live in a `HashSet`/`HashMap` key without float-equality pitfalls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Freq(pub u16);

impl Freq {
    /// Decode one AF byte as `87.5 + 0.1*n` MHz for `n in 1..=204`.
    pub fn decode(n: u8) -> Option<Freq> {
        if (1..=204).contains(&n) {
            Some(Freq(875 + n as u16))
        } else {
            None
        }
    }

    pub fn mhz(&self) -> f64 {
        self.0 as f64 / 10.0
    }
}

impl std::fmt::Display for Freq {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.1}", self.mhz())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum AfType {
    #[default]
    Unknown,
    MethodA,
    MethodB,
}

#[derive(Debug, Clone, Default)]
pub struct AfBEntry {
    pub expected: u8,
    pub afs: HashSet<Freq>,
    pub match_count: u32,
    pub pair_count: u32,
}

impl AfBEntry {
    fn is_plausibly_full(&self) -> bool {
        let size = self.afs.len();
        let expected = self.expected as usize;
        if expected == 0 {
            return false;
        }
        (size as f64) >= AF_PLAUSIBLE_FULL_RATIO * expected as f64
            || (expected <= 2 && size == expected)
            || (expected > 5 && size > 4)
    }
}

/// Per-station AF accumulation state. Embedded in `StationState`.
#[derive(Debug, Clone, Default)]
pub struct AfEngine {
    pub af_set: Vec<Freq>,
    pub af_list_head: Option<Freq>,
    pub af_b_map: std::collections::HashMap<Freq, AfBEntry>,
    pub af_type: AfType,
    /// Memo of the last-seen 0A B3 value, to skip repeats.
    last_0a_b3: Option<u16>,
    current_method_b_group: Option<Freq>,
}

impl AfEngine {
    fn insert_unique(&mut self, freq: Freq) {
        if !self.af_set.contains(&freq) {
            self.af_set.push(freq);
        }
    }

    fn promote_to_front(&mut self, freq: Freq) {
        self.af_set.retain(|f| *f != freq);
        self.af_set.insert(0, freq);
    }

    /// Feed one 0A group's B3 (`af1, af2 = hi(B3), lo(B3)`). Runs only when
    /// the pair differs from the previous 0A group's B3.
    pub fn update_from_0a(&mut self, b3: u16) {
        if self.last_0a_b3 == Some(b3) {
            return;
        }
        self.last_0a_b3 = Some(b3);

        let af1 = (b3 >> 8) as u8;
        let af2 = (b3 & 0xFF) as u8;

        if (225..=249).contains(&af1) {
            // Header: af1 declares the transmitter's AF-list length; af2 is
            // the transmitter's own frequency.
            if let Some(h) = Freq::decode(af2) {
                self.promote_to_front(h);
                self.af_list_head = Some(h);
                let entry = self.af_b_map.entry(h).or_default();
                entry.expected = af1 - 224;
                self.current_method_b_group = Some(h);
            }
            self.recompute_type();
            return;
        }

        let d1 = Freq::decode(af1);
        let d2 = Freq::decode(af2);
        if let Some(f) = d1 {
            self.insert_unique(f);
        }
        if let Some(f) = d2 {
            self.insert_unique(f);
        }

        if let (Some(f1), Some(f2)) = (d1, d2) {
            if let Some(h) = self.current_method_b_group {
                let entry = self.af_b_map.entry(h).or_default();
                entry.afs.insert(f1);
                entry.afs.insert(f2);
                entry.pair_count += 1;
                if f1 == h || f2 == h {
                    entry.match_count += 1;
                }
            }
        }

        self.recompute_type();
    }

    fn recompute_type(&mut self) {
        let plausible: Vec<&Freq> = self
            .af_b_map
            .iter()
            .filter(|(_, e)| e.is_plausibly_full())
            .map(|(f, _)| f)
            .collect();

        self.af_type = if plausible.len() > 1 {
            AfType::MethodB
        } else if plausible.len() == 1 {
            let entry = &self.af_b_map[plausible[0]];
            if entry.pair_count > 0
                && (entry.match_count as f64 / entry.pair_count as f64) > AF_METHOD_B_MATCH_RATIO
            {
                AfType::MethodB
            } else {
                AfType::MethodA
            }
        } else {
            AfType::MethodA
        };
    }
}
