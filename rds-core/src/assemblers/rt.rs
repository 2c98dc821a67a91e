//! RadioText assembler (spec §4.6): groups 2A/2B write into one of two
//! 64-character buffers selected by the A/B flag, with clear-on-flip.

use crate::charset::decode_byte;

pub const RT_LEN: usize = 64;

#[derive(Debug, Clone, Copy)]
pub struct RtWrite {
    /// `true` if the A/B flag flipped relative to the previously stored
    /// value, meaning the newly-active buffer was just cleared.
    pub flipped: bool,
    /// Index (0 or 1) of the buffer that is now active.
    pub active: usize,
}

fn apply_flip(b2: u16, ab_flag: &mut Option<bool>, rt_buf: &mut [[char; RT_LEN]; 2], rt_mask: &mut [[bool; RT_LEN]; 2]) -> RtWrite {
    let new_ab = (b2 >> 4) & 0x1 == 1;
    let flipped = *ab_flag != Some(new_ab);
    let active = if new_ab { 1 } else { 0 };
    if flipped {
        rt_buf[active] = ['\0'; RT_LEN];
        rt_mask[active] = [false; RT_LEN];
    }
    *ab_flag = Some(new_ab);
    RtWrite { flipped, active }
}

/// Apply a 2A group: 4 characters from B3+B4 at `address = B2 & 0xF`.
pub fn apply_2a(
    b2: u16,
    b3: u16,
    b4: u16,
    ab_flag: &mut Option<bool>,
    rt_buf: &mut [[char; RT_LEN]; 2],
    rt_mask: &mut [[bool; RT_LEN]; 2],
) -> RtWrite {
    let write = apply_flip(b2, ab_flag, rt_buf, rt_mask);
    let address = (b2 & 0xF) as usize;
    let base = 4 * address;
    let bytes = [(b3 >> 8) as u8, (b3 & 0xFF) as u8, (b4 >> 8) as u8, (b4 & 0xFF) as u8];
    for (i, byte) in bytes.iter().enumerate() {
        let pos = base + i;
        if pos < RT_LEN {
            rt_buf[write.active][pos] = decode_byte(*byte);
            rt_mask[write.active][pos] = true;
        }
    }
    write
}

/// Apply a 2B group: 2 characters from B4 only at `address = B2 & 0xF`.
pub fn apply_2b(
    b2: u16,
    b4: u16,
    ab_flag: &mut Option<bool>,
    rt_buf: &mut [[char; RT_LEN]; 2],
    rt_mask: &mut [[bool; RT_LEN]; 2],
) -> RtWrite {
    let write = apply_flip(b2, ab_flag, rt_buf, rt_mask);
    let address = (b2 & 0xF) as usize;
    let base = 2 * address;
    let bytes = [(b4 >> 8) as u8, (b4 & 0xFF) as u8];
    for (i, byte) in bytes.iter().enumerate() {
        let pos = base + i;
        if pos < RT_LEN {
            rt_buf[write.active][pos] = decode_byte(*byte);
            rt_mask[write.active][pos] = true;
        }
    }
    write
}

/// `true` once every position up to (not including) the terminator is
/// filled. The terminator is the index of the first `\r`, or 63 if absent.
pub fn is_complete(rt_buf: &[char; RT_LEN], rt_mask: &[bool; RT_LEN]) -> bool {
    let terminator = rt_buf.iter().position(|&c| c == '\r').unwrap_or(63);
    rt_mask[0..terminator].iter().all(|&m| m)
}

/// Render the active buffer up to the terminator, trimming trailing space.
pub fn render(rt_buf: &[char; RT_LEN]) -> String {
    let terminator = rt_buf.iter().position(|&c| c == '\r').unwrap_or(RT_LEN);
    rt_buf[0..terminator]
        .iter()
        .collect::<String>()
        .trim_end()
        .to_string()
}
