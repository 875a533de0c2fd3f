//! Decoding of the text commands accepted on the write characteristic.

/// Command scratch buffer size, terminator included. Payloads longer than
/// `CMD_BUF_LEN - 1` bytes are truncated before matching.
pub const CMD_BUF_LEN: usize = 32;

/// One decoded client command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    LightOn,
    LightOff,
    FanOn,
    FanOff,
    Unknown,
}

/// Decode one write payload into a [`Command`].
///
/// The payload is copied into a fixed 32-byte buffer, truncated to 31 bytes
/// if longer. Matching is exact and case-sensitive; bytes after the first
/// NUL are ignored, so clients that send C strings still match.
pub fn parse(data: &[u8]) -> Command {
    let mut buf = [0u8; CMD_BUF_LEN];
    let len = data.len().min(CMD_BUF_LEN - 1);
    buf[..len].copy_from_slice(&data[..len]);

    let end = buf.iter().position(|&b| b == 0).unwrap_or(len);
    match &buf[..end] {
        b"LIGHT ON" => Command::LightOn,
        b"LIGHT OFF" => Command::LightOff,
        b"FAN ON" => Command::FanOn,
        b"FAN OFF" => Command::FanOff,
        _ => Command::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_commands_match_exactly() {
        assert_eq!(parse(b"LIGHT ON"), Command::LightOn);
        assert_eq!(parse(b"LIGHT OFF"), Command::LightOff);
        assert_eq!(parse(b"FAN ON"), Command::FanOn);
        assert_eq!(parse(b"FAN OFF"), Command::FanOff);
    }

    #[test]
    fn matching_is_case_sensitive() {
        assert_eq!(parse(b"light on"), Command::Unknown);
        assert_eq!(parse(b"Light On"), Command::Unknown);
    }

    #[test]
    fn empty_input_is_unknown() {
        assert_eq!(parse(b""), Command::Unknown);
    }

    #[test]
    fn trailing_bytes_defeat_the_match() {
        assert_eq!(parse(b"LIGHT ON "), Command::Unknown);
        assert_eq!(parse(b"FAN ONX"), Command::Unknown);
    }

    #[test]
    fn bytes_after_nul_are_ignored() {
        // C-string clients write the terminator and whatever stale bytes
        // follow it in their buffer.
        assert_eq!(parse(b"LIGHT OFF\0junk"), Command::LightOff);
        assert_eq!(parse(b"\0LIGHT ON"), Command::Unknown);
    }

    #[test]
    fn oversized_input_is_truncated_not_overflowed() {
        let garbage = [b'X'; 33];
        assert_eq!(parse(&garbage), Command::Unknown);

        // 31 usable bytes exactly, no room for more.
        let mut long = [b'A'; CMD_BUF_LEN - 1];
        long[..8].copy_from_slice(b"LIGHT ON");
        assert_eq!(parse(&long), Command::Unknown);
    }

    #[test]
    fn parse_is_deterministic() {
        let payload = b"FAN OFF";
        assert_eq!(parse(payload), parse(payload));
    }
}
