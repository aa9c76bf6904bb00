//! MIDI short-message and System Exclusive constants.

/// Status nibble (high nibble of byte0, channel masked off) for each short
/// message type the synthesizer understands.
pub const NOTE_OFF: u8 = 0x8;
pub const NOTE_ON: u8 = 0x9;
pub const KEY_PRESSURE: u8 = 0xA;
pub const CONTROL_CHANGE: u8 = 0xB;
pub const PROGRAM_CHANGE: u8 = 0xC;
pub const CHANNEL_PRESSURE: u8 = 0xD;
pub const PITCH_BEND: u8 = 0xE;

pub const CC_BANK_SELECT_MSB: u8 = 0;
pub const CC_BANK_SELECT_LSB: u8 = 32;

/// One packed 32-bit little-endian MIDI short message: `byte0 =
/// status|channel`, `byte1 = data1`, `byte2 = data2`, `byte3` unused.
#[derive(Debug, Clone, Copy)]
pub struct ShortMessage {
    pub status: u8,
    pub channel: u8,
    pub data1: u8,
    pub data2: u8,
}

impl ShortMessage {
    pub fn unpack(packed: u32) -> Self {
        let bytes = packed.to_le_bytes();
        ShortMessage {
            status: bytes[0] >> 4,
            channel: bytes[0] & 0x0F,
            data1: bytes[1],
            data2: bytes[2],
        }
    }
}

/// The reset patterns `process_sys_ex` recognizes, with the device-ID byte
/// (index 2) wildcarded at match time.
pub const GM_SYSTEM_ON: &[u8] = &[0xF0, 0x7E, 0x7F, 0x09, 0x01, 0xF7];
pub const GM_SYSTEM_OFF: &[u8] = &[0xF0, 0x7E, 0x7F, 0x09, 0x02, 0xF7];
pub const GS_RESET: &[u8] = &[0xF0, 0x41, 0x7F, 0x42, 0x12, 0x40, 0x00, 0x7F, 0x00, 0x41, 0xF7];
pub const GS_SYSTEM_MODE_SET_A: &[u8] =
    &[0xF0, 0x41, 0x7F, 0x42, 0x12, 0x00, 0x00, 0x7F, 0x00, 0x01, 0xF7];
pub const GS_SYSTEM_MODE_SET_B: &[u8] =
    &[0xF0, 0x41, 0x7F, 0x42, 0x12, 0x00, 0x00, 0x7F, 0x01, 0x00, 0xF7];
pub const XG_SYSTEM_ON: &[u8] = &[0xF0, 0x43, 0x7F, 0x4C, 0x00, 0x00, 0x7E, 0x00, 0xF7];

/// Compare `bytes` against `pattern`, ignoring the device-ID byte at index 2.
pub fn matches_sysex_pattern(bytes: &[u8], pattern: &[u8]) -> bool {
    if bytes.len() != pattern.len() {
        return false;
    }
    bytes
        .iter()
        .zip(pattern.iter())
        .enumerate()
        .all(|(i, (b, p))| i == 2 || b == p)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unpack_splits_status_channel_and_data() {
        let packed = u32::from_le_bytes([0x93, 60, 100, 0]);
        let msg = ShortMessage::unpack(packed);
        assert_eq!(msg.status, NOTE_ON);
        assert_eq!(msg.channel, 3);
        assert_eq!(msg.data1, 60);
        assert_eq!(msg.data2, 100);
    }

    #[test]
    fn sysex_pattern_ignores_device_id() {
        let mut bytes = GS_RESET.to_vec();
        bytes[2] = 0x00;
        assert!(matches_sysex_pattern(&bytes, GS_RESET));
        bytes[3] = 0xFF;
        assert!(!matches_sysex_pattern(&bytes, GS_RESET));
    }
}
