//! History logger (spec §4.15): stability-gated, append-only, newest-first
//! ring buffers for PS and RadioText.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;

pub const HISTORY_CAP: usize = 200;

const PI_ESTABLISHED_GRACE: Duration = Duration::from_millis(3000);
const PS_STABILITY_GRACE: Duration = Duration::from_millis(1000);
const RT_STABILITY_GRACE: Duration = Duration::from_millis(2000);

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PsHistoryEntry {
    pub time: DateTime<Utc>,
    pub pi: String,
    pub ps: String,
    pub pty: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RtHistoryEntry {
    pub time: DateTime<Utc>,
    pub text: String,
}

fn prepend_capped<T>(history: &mut VecDeque<T>, entry: T) {
    history.push_front(entry);
    while history.len() > HISTORY_CAP {
        history.pop_back();
    }
}

/// Evaluate the PS-history append test (spec §4.15) and append if it
/// passes. Returns `true` if an entry was appended.
#[allow(clippy::too_many_arguments)]
pub fn try_append_ps(
    history: &mut VecDeque<PsHistoryEntry>,
    pi_confirmed: bool,
    pi_established_at: Option<Instant>,
    ps_stable_since: Option<Instant>,
    now: Instant,
    wall_now: DateTime<Utc>,
    pi_hex: &str,
    ps_candidate: &str,
    pty: u8,
) -> bool {
    if !pi_confirmed {
        return false;
    }
    let Some(established) = pi_established_at else {
        return false;
    };
    if now.duration_since(established) <= PI_ESTABLISHED_GRACE {
        return false;
    }
    let Some(stable_since) = ps_stable_since else {
        return false;
    };
    if now.duration_since(stable_since) < PS_STABILITY_GRACE {
        return false;
    }
    if ps_candidate.is_empty() {
        return false;
    }
    if history.front().map(|h| h.ps.as_str()) == Some(ps_candidate) {
        return false;
    }
    prepend_capped(
        history,
        PsHistoryEntry {
            time: wall_now,
            pi: pi_hex.to_string(),
            ps: ps_candidate.to_string(),
            pty,
        },
    );
    true
}

/// Evaluate the RT-history append test and append if it passes.
pub fn try_append_rt(
    history: &mut VecDeque<RtHistoryEntry>,
    rt_complete: bool,
    rt_stable_since: Option<Instant>,
    now: Instant,
    wall_now: DateTime<Utc>,
    text: &str,
) -> bool {
    if !rt_complete {
        return false;
    }
    let Some(stable_since) = rt_stable_since else {
        return false;
    };
    if now.duration_since(stable_since) < RT_STABILITY_GRACE {
        return false;
    }
    if text.is_empty() {
        return false;
    }
    if history.front().map(|h| h.text.as_str()) == Some(text) {
        return false;
    }
    prepend_capped(
        history,
        RtHistoryEntry {
            time: wall_now,
            text: text.to_string(),
        },
    );
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn ps_history_requires_all_gates() {
        let mut history = VecDeque::new();
        let estab = Instant::now() - Duration::from_millis(4000);
        let stable = Instant::now() - Duration::from_millis(1500);
        let appended = try_append_ps(
            &mut history,
            true,
            Some(estab),
            Some(stable),
            Instant::now(),
            Utc::now(),
            "D318",
            "BFM ROCK",
            5,
        );
        assert!(appended);
        assert_eq!(history.front().unwrap().ps, "BFM ROCK");
    }

    #[test]
    fn ps_history_rejects_duplicate_head() {
        let mut history = VecDeque::new();
        history.push_front(PsHistoryEntry {
            time: Utc::now(),
            pi: "D318".into(),
            ps: "BFM ROCK".into(),
            pty: 5,
        });
        let estab = Instant::now() - Duration::from_millis(4000);
        let stable = Instant::now() - Duration::from_millis(1500);
        let appended = try_append_ps(
            &mut history,
            true,
            Some(estab),
            Some(stable),
            Instant::now(),
            Utc::now(),
            "D318",
            "BFM ROCK",
            5,
        );
        assert!(!appended);
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn ps_history_rejects_before_stability_grace() {
        let mut history = VecDeque::new();
        let estab = Instant::now() - Duration::from_millis(4000);
        let stable = Instant::now(); // not yet 1s stable
        let appended = try_append_ps(
            &mut history,
            true,
            Some(estab),
            Some(stable),
            Instant::now(),
            Utc::now(),
            "D318",
            "BFM ROCK",
            5,
        );
        assert!(!appended);
        sleep(Duration::from_millis(1));
    }

    #[test]
    fn rt_history_requires_completion_and_stability() {
        let mut history = VecDeque::new();
        let stable = Instant::now() - Duration::from_millis(2500);
        let appended = try_append_rt(&mut history, true, Some(stable), Instant::now(), Utc::now(), "Now Playing");
        assert!(appended);
    }
}
