//! ECC / LIC / PIN decoding (spec §4.10): group 1A/1B variant-addressed
//! sub-fields.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PinTime {
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Group1Update {
    pub ecc: Option<u8>,
    pub lic: Option<u8>,
    pub pin: Option<PinTime>,
}

/// Decode a 1A/1B group's `B3, B4` into whichever sub-fields the variant
/// addresses. `B4`'s PIN is only published when `day != 0`.
pub fn decode(b3: u16, b4: u16) -> Group1Update {
    let variant = ((b3 >> 12) & 0x7) as u8;
    let mut update = Group1Update::default();

    match variant {
        0 => update.ecc = Some((b3 & 0xFF) as u8),
        3 => update.lic = Some((b3 & 0xFF) as u8),
        _ => {}
    }

    let day = ((b4 >> 11) & 0x1F) as u8;
    if day != 0 {
        update.pin = Some(PinTime {
            day,
            hour: ((b4 >> 6) & 0x1F) as u8,
            minute: (b4 & 0x3F) as u8,
        });
    }

    update
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variant_0_decodes_ecc() {
        let b3 = 0xE5; // variant 0, value 0xE5
        let u = decode(b3, 0);
        assert_eq!(u.ecc, Some(0xE5));
        assert_eq!(u.lic, None);
    }

    #[test]
    fn variant_3_decodes_lic() {
        let b3 = (3u16 << 12) | 0x09;
        let u = decode(b3, 0);
        assert_eq!(u.lic, Some(0x09));
        assert_eq!(u.ecc, None);
    }

    #[test]
    fn pin_only_published_when_day_nonzero() {
        let b4_zero_day = 0u16;
        assert_eq!(decode(0, b4_zero_day).pin, None);

        let day = 5u16;
        let hour = 14u16;
        let minute = 37u16;
        let b4 = (day << 11) | (hour << 6) | minute;
        let u = decode(0, b4);
        assert_eq!(
            u.pin,
            Some(PinTime {
                day: 5,
                hour: 14,
                minute: 37
            })
        );
    }
}
