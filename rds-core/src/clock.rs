//! CT — Clock Time decoder (spec §4.9): group 4A Modified Julian Day to
//! Gregorian, plus the UTC/local offset pair.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClockTime {
    pub utc: String,
    pub local: String,
}

/// Decode a 4A group's `B2, B3, B4` into UTC + local time strings, each
/// formatted `DD/MM/YYYY HH:MM`. Returns `None` if the encoded date is out
/// of range (decoder-bounds guard — never fatal).
pub fn decode(b2: u16, b3: u16, b4: u16) -> Option<ClockTime> {
    let mjd = (((b2 & 0x3) as u32) << 15) | (((b3 & 0xFFFE) as u32) >> 1);

    let yp = ((mjd as f64 - 15078.2) / 365.25).floor();
    let mp = ((mjd as f64 - 14956.1 - (yp * 365.25).floor()) / 30.6001).floor();
    let day = mjd as f64 - 14956.0 - (yp * 365.25).floor() - (mp * 30.6001).floor();
    let k = if mp == 14.0 || mp == 15.0 { 1.0 } else { 0.0 };
    let year = 1900.0 + yp + k;
    let month = mp - 1.0 - 12.0 * k;

    if year < i32::MIN as f64 || year > i32::MAX as f64 || month < 1.0 || month > 12.0 || day < 1.0 {
        return None;
    }

    let minute_counter = (((b3 & 1) as u32) << 15) | ((b4 as u32) >> 1);
    let hour = (minute_counter >> 11) & 0x1F;
    let minute = (minute_counter >> 5) & 0x3F;

    let sign_negative = (b4 >> 4) & 0x1 == 1;
    let half_hours = (b4 & 0xF) as i64;

    let date = NaiveDate::from_ymd_opt(year as i32, month as u32, day as u32)?;
    let time = NaiveTime::from_hms_opt(hour, minute, 0)?;
    let utc_dt = NaiveDateTime::new(date, time);

    // Spec: "local = UTC ± half_hours·30 min, modulo 1440" — the offset wraps
    // the time-of-day within the same calendar day rather than rolling the
    // date over, so only the minute-of-day component is shifted mod 1440.
    let offset_minutes = half_hours * 30;
    let utc_minute_of_day = (hour as i64) * 60 + minute as i64;
    let shifted = if sign_negative {
        utc_minute_of_day - offset_minutes
    } else {
        utc_minute_of_day + offset_minutes
    };
    let local_minute_of_day = shifted.rem_euclid(1440);
    let local_time = NaiveTime::from_hms_opt((local_minute_of_day / 60) as u32, (local_minute_of_day % 60) as u32, 0)?;
    let local_dt = NaiveDateTime::new(date, local_time);

    Some(ClockTime {
        utc: utc_dt.format("%d/%m/%Y %H:%M").to_string(),
        local: local_dt.format("%d/%m/%Y %H:%M").to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// S5 — Feed a 4A with mjd=59500, hour=14, minute=30, sign=0 (positive),
    /// half_hours=4 (UTC+2h). Decoded UTC = 03/10/2021 14:30, local =
    /// 03/10/2021 16:30.
    #[test]
    fn s5_clock_scenario() {
        let mjd: u32 = 59500;
        let hour: u16 = 14;
        let minute: u16 = 30;
        let sign: u16 = 0;
        let half_hours: u16 = 4;

        let b2 = ((mjd >> 15) & 0x3) as u16;
        let b3_top_bits = (mjd & 0x7FFF) as u16;
        let b3_bit0 = (hour >> 4) & 0x1;
        let b3 = (b3_top_bits << 1) | b3_bit0;

        let h_low4 = hour & 0xF;
        let b4 = (h_low4 << 12) | (minute << 6) | (sign << 4) | half_hours;

        let ct = decode(b2, b3, b4).expect("valid CT group decodes");
        assert_eq!(ct.utc, "03/10/2021 14:30");
        assert_eq!(ct.local, "03/10/2021 16:30");
    }

    #[test]
    fn negative_offset_subtracts() {
        let mjd: u32 = 59500;
        let hour: u16 = 14;
        let minute: u16 = 0;
        let sign: u16 = 1; // negative
        let half_hours: u16 = 2; // 1 hour

        let b2 = ((mjd >> 15) & 0x3) as u16;
        let b3_top_bits = (mjd & 0x7FFF) as u16;
        let b3_bit0 = (hour >> 4) & 0x1;
        let b3 = (b3_top_bits << 1) | b3_bit0;
        let h_low4 = hour & 0xF;
        let b4 = (h_low4 << 12) | (minute << 6) | (sign << 4) | half_hours;

        let ct = decode(b2, b3, b4).unwrap();
        assert_eq!(ct.utc, "03/10/2021 14:00");
        assert_eq!(ct.local, "03/10/2021 13:00");
    }

    /// Offset pushes the local time past midnight — it wraps within the
    /// same calendar day (mod 1440) rather than rolling the date forward.
    #[test]
    fn local_time_wraps_at_midnight_same_day() {
        let mjd: u32 = 59500;
        let hour: u16 = 23;
        let minute: u16 = 30;
        let sign: u16 = 0; // positive
        let half_hours: u16 = 2; // +1h -> 00:30, same date

        let b2 = ((mjd >> 15) & 0x3) as u16;
        let b3_top_bits = (mjd & 0x7FFF) as u16;
        let b3_bit0 = (hour >> 4) & 0x1;
        let b3 = (b3_top_bits << 1) | b3_bit0;
        let h_low4 = hour & 0xF;
        let b4 = (h_low4 << 12) | (minute << 6) | (sign << 4) | half_hours;

        let ct = decode(b2, b3, b4).unwrap();
        assert_eq!(ct.utc, "03/10/2021 23:30");
        assert_eq!(ct.local, "03/10/2021 00:30");
    }

    /// Negative offset pulling the local time before midnight wraps forward
    /// to the end of the same day instead of rolling the date back.
    #[test]
    fn local_time_wraps_before_midnight_same_day() {
        let mjd: u32 = 59500;
        let hour: u16 = 0;
        let minute: u16 = 15;
        let sign: u16 = 1; // negative
        let half_hours: u16 = 2; // -1h -> 23:15, same date

        let b2 = ((mjd >> 15) & 0x3) as u16;
        let b3_top_bits = (mjd & 0x7FFF) as u16;
        let b3_bit0 = (hour >> 4) & 0x1;
        let b3 = (b3_top_bits << 1) | b3_bit0;
        let h_low4 = hour & 0xF;
        let b4 = (h_low4 << 12) | (minute << 6) | (sign << 4) | half_hours;

        let ct = decode(b2, b3, b4).unwrap();
        assert_eq!(ct.utc, "03/10/2021 00:15");
        assert_eq!(ct.local, "03/10/2021 23:15");
    }
}
