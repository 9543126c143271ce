//! Mojibake repair for upstream text fields.
//!
//! The upstream occasionally delivers text whose UTF-8 bytes were decoded as
//! Latin-1, turning e.g. "你好" into "ä½ å¥½". Re-encoding the characters as
//! Latin-1 bytes and decoding those as UTF-8 reverses the damage. Best-effort
//! only: if any character falls outside Latin-1, or the bytes are not valid
//! UTF-8, the input is returned unchanged.

/// Attempt to undo UTF-8-decoded-as-Latin-1 corruption.
pub fn fix_encoding(text: &str) -> String {
    let mut bytes = Vec::with_capacity(text.len());
    for ch in text.chars() {
        match u8::try_from(u32::from(ch)) {
            Ok(b) => bytes.push(b),
            // Not representable in Latin-1: the text was never mis-decoded.
            Err(_) => return text.to_string(),
        }
    }

    match String::from_utf8(bytes) {
        Ok(fixed) => fixed,
        Err(_) => text.to_string(),
    }
}
