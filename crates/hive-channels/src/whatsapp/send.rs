//! Message sending helpers.

use hive_core::error::HiveError;
use wacore_binary::jid::Jid;

/// WhatsApp's per-message text limit.
pub(super) const MAX_TEXT_LEN: usize = 4096;

/// Parse a fully-qualified address (`digits@s.whatsapp.net`).
pub(super) fn parse_jid(address: &str) -> Result<Jid, HiveError> {
    address
        .parse()
        .map_err(|e| HiveError::Provider(format!("invalid whatsapp JID '{address}': {e}")))
}

/// Split a long message into chunks that respect WhatsApp's 4096-char limit.
///
/// Prefers breaking after a newline; never splits inside a UTF-8 character.
pub(super) fn split_message(text: &str, max_len: usize) -> Vec<&str> {
    if text.len() <= max_len {
        return vec![text];
    }

    let mut chunks = Vec::new();
    let mut start = 0;

    while start < text.len() {
        let mut end = (start + max_len).min(text.len());
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        let break_at = if end < text.len() {
            text[start..end]
                .rfind('\n')
                .map(|i| start + i + 1)
                .unwrap_or(end)
        } else {
            end
        };
        chunks.push(&text[start..break_at]);
        start = break_at;
    }

    chunks
}
