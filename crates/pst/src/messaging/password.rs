//! ## Password Protection
//!
//! A message store may carry a CRC-32 of its password at `PidTagPstPassword` (`0x67FF`). The
//! file never stores the password itself, only a checksum, so this gate can confirm a match but
//! cannot recover a lost password.

use crate::crc::compute_crc;

/// `PidTagPstPassword`: the message-store property holding the password's stored CRC.
pub const PID_TAG_PST_PASSWORD: u16 = 0x67FF;

/// Outcome of comparing a stored password CRC against a caller-supplied password.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PasswordGate {
    /// No password is set, or the supplied password matched the stored CRC.
    Unlocked,
    /// A password is set but none was supplied.
    Required,
    /// A password is set and the supplied password did not match.
    Incorrect,
}

/// Evaluates the password gate for a message store.
///
/// `stored_crc` is the raw `0x67FF` property value, if present; `None` or `Some(0)` both mean the
/// store carries no password.
pub fn check_password(stored_crc: Option<u32>, password: Option<&str>) -> PasswordGate {
    let stored_crc = match stored_crc {
        None | Some(0) => return PasswordGate::Unlocked,
        Some(crc) => crc,
    };

    match password {
        Some(password) if password_matches(stored_crc, password) => PasswordGate::Unlocked,
        Some(_) => PasswordGate::Incorrect,
        None => PasswordGate::Required,
    }
}

/// The fixed grid of encodings tried against a stored CRC: UTF-16LE, UTF-8, and ASCII, each with
/// and without a trailing NUL terminator.
fn candidate_encodings(password: &str) -> [Vec<u8>; 6] {
    let utf16: Vec<u8> = password.encode_utf16().flat_map(u16::to_le_bytes).collect();
    let mut utf16_nul = utf16.clone();
    utf16_nul.extend_from_slice(&[0, 0]);

    let utf8 = password.as_bytes().to_vec();
    let mut utf8_nul = utf8.clone();
    utf8_nul.push(0);

    let ascii: Vec<u8> = password.chars().map(|ch| ch as u32 as u8).collect();
    let mut ascii_nul = ascii.clone();
    ascii_nul.push(0);

    [utf16, utf16_nul, utf8, utf8_nul, ascii, ascii_nul]
}

fn password_matches(stored_crc: u32, password: &str) -> bool {
    let upper = password.to_uppercase();

    let mut matches = candidate_encodings(password)
        .into_iter()
        .any(|buffer| compute_crc(0, &buffer) == stored_crc);

    if !matches && upper != password {
        matches = candidate_encodings(&upper)
            .into_iter()
            .any(|buffer| compute_crc(0, &buffer) == stored_crc);
    }

    matches
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stored_crc_for(password: &str) -> u32 {
        let mut utf16: Vec<u8> = password.encode_utf16().flat_map(u16::to_le_bytes).collect();
        utf16.extend_from_slice(&[0, 0]);
        compute_crc(0, &utf16)
    }

    #[test]
    fn no_password_set_is_unlocked() {
        assert_eq!(check_password(None, None), PasswordGate::Unlocked);
        assert_eq!(check_password(Some(0), Some("anything")), PasswordGate::Unlocked);
    }

    #[test]
    fn missing_password_is_required() {
        let stored = stored_crc_for("secret");
        assert_eq!(check_password(Some(stored), None), PasswordGate::Required);
    }

    #[test]
    fn matching_password_unlocks() {
        let stored = stored_crc_for("secret");
        assert_eq!(
            check_password(Some(stored), Some("secret")),
            PasswordGate::Unlocked
        );
    }

    #[test]
    fn mismatched_case_is_incorrect() {
        let stored = stored_crc_for("secret");
        assert_eq!(
            check_password(Some(stored), Some("Secret")),
            PasswordGate::Incorrect
        );
    }

    #[test]
    fn wrong_password_is_incorrect() {
        let stored = stored_crc_for("secret");
        assert_eq!(
            check_password(Some(stored), Some("wrong")),
            PasswordGate::Incorrect
        );
    }

    #[test]
    fn uppercase_fallback_unlocks_when_stored_is_uppercase() {
        let stored = stored_crc_for("SECRET");
        assert_eq!(
            check_password(Some(stored), Some("secret")),
            PasswordGate::Unlocked
        );
    }

    #[test]
    fn utf8_encoding_without_nul_matches() {
        let stored = compute_crc(0, "secret".as_bytes());
        assert_eq!(
            check_password(Some(stored), Some("secret")),
            PasswordGate::Unlocked
        );
    }
}
