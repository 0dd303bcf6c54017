//! Translation of `whatsapp-rust` events into connection lifecycle events.

use hive_core::message::ConnectionEvent;
use tracing::{debug, info, warn};
use wacore::types::events::Event;

/// Map a bot event to the lifecycle event it represents, if any.
pub(super) fn translate(session_id: &str, event: Event) -> Option<ConnectionEvent> {
    match event {
        Event::PairingQrCode { code, .. } => {
            info!("whatsapp[{session_id}] QR code generated (scan to pair)");
            debug!("QR data: {code}");
            Some(ConnectionEvent::QrIssued(code))
        }
        Event::PairSuccess(_) => {
            info!("whatsapp[{session_id}] pairing successful");
            None
        }
        Event::Connected(_) => {
            info!("whatsapp[{session_id}] connected");
            Some(ConnectionEvent::Opened)
        }
        Event::Disconnected(_) => {
            warn!("whatsapp[{session_id}] disconnected");
            Some(ConnectionEvent::Closed {
                reason: Some("disconnected".to_string()),
            })
        }
        Event::LoggedOut(_) => {
            warn!("whatsapp[{session_id}] logged out, session invalidated");
            Some(ConnectionEvent::LoggedOut)
        }
        _ => None,
    }
}
