use super::send::{parse_jid, split_message, MAX_TEXT_LEN};
use super::{WhatsAppProvider, USER_SERVER};
use hive_core::traits::ConnectionProvider;

#[test]
fn test_split_short_message() {
    let chunks = split_message("hello", MAX_TEXT_LEN);
    assert_eq!(chunks, vec!["hello"]);
}

#[test]
fn test_split_long_message_prefers_newlines() {
    let text = "a\n".repeat(3000);
    let chunks = split_message(&text, MAX_TEXT_LEN);
    assert!(chunks.len() >= 2);
    for chunk in &chunks {
        assert!(chunk.len() <= MAX_TEXT_LEN);
        assert!(chunk.ends_with('\n'));
    }
    assert_eq!(chunks.concat(), text);
}

#[test]
fn test_split_respects_char_boundaries() {
    let text = "é".repeat(10);
    let chunks = split_message(&text, 5);
    assert_eq!(chunks.concat(), text);
    for chunk in &chunks {
        assert!(chunk.len() <= 5);
    }
}

#[test]
fn test_parse_personal_jid() {
    let jid = parse_jid("15550100@s.whatsapp.net").unwrap();
    assert_eq!(jid.user, "15550100");
}

#[test]
fn test_provider_identity() {
    let provider = WhatsAppProvider::default();
    assert_eq!(provider.name(), "whatsapp");
    assert_eq!(provider.address_suffix(), USER_SERVER);
    assert_eq!(USER_SERVER, "s.whatsapp.net");
}
