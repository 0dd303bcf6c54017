//! WhatsApp Web connection provider, in pure Rust via `whatsapp-rust`.
//!
//! Uses the WhatsApp Web protocol (Noise handshake + Signal encryption).
//! Pairing is done by scanning a QR code, like WhatsApp Web. Key material
//! lives in the session's credential state (see [`crate::whatsapp_store`]).

mod connection;
mod events;
mod send;

#[cfg(test)]
mod tests;

pub use connection::WhatsAppConnection;

use crate::whatsapp_store::CredentialBackend;
use async_trait::async_trait;
use events::translate;
use hive_core::{
    error::HiveError,
    message::{CredentialState, EventSink},
    traits::{Connection, ConnectionProvider},
};
use std::sync::Arc;
use tracing::{debug, info};
use whatsapp_rust::bot::Bot;
use whatsapp_rust_tokio_transport::TokioWebSocketTransportFactory;
use whatsapp_rust_ureq_http_client::UreqHttpClient;

/// Server part of personal WhatsApp addresses.
pub const USER_SERVER: &str = "s.whatsapp.net";

/// Opens one `whatsapp-rust` bot per session attempt.
pub struct WhatsAppProvider {
    /// Device name shown in the phone's "Linked devices" list.
    device_name: String,
}

impl WhatsAppProvider {
    pub fn new(device_name: impl Into<String>) -> Self {
        Self {
            device_name: device_name.into(),
        }
    }
}

impl Default for WhatsAppProvider {
    fn default() -> Self {
        Self::new("HIVE")
    }
}

#[async_trait]
impl ConnectionProvider for WhatsAppProvider {
    fn name(&self) -> &str {
        "whatsapp"
    }

    fn address_suffix(&self) -> &str {
        USER_SERVER
    }

    async fn open(
        &self,
        session_id: &str,
        credentials: CredentialState,
        events: EventSink,
    ) -> Result<Arc<dyn Connection>, HiveError> {
        info!(
            "whatsapp[{session_id}] building bot (generation {}, {} stored keys)",
            events.generation(),
            credentials.len()
        );

        let backend = Arc::new(CredentialBackend::new(credentials, events.clone()));
        let sink = events.clone();
        let sid = session_id.to_string();

        let mut bot = Bot::builder()
            .with_backend(backend)
            .with_transport_factory(TokioWebSocketTransportFactory::new())
            .with_http_client(UreqHttpClient::new())
            .with_device_props(
                Some(self.device_name.clone()),
                None,
                Some(waproto::whatsapp::device_props::PlatformType::Desktop),
            )
            .on_event(move |event, _client| {
                let sink = sink.clone();
                let sid = sid.clone();
                async move {
                    let Some(translated) = translate(&sid, event) else {
                        return;
                    };
                    if !sink.emit(translated).await {
                        debug!("whatsapp[{sid}] event dropped: session gone");
                    }
                }
            })
            .build()
            .await
            .map_err(|e| HiveError::Provider(format!("whatsapp bot build failed: {e}")))?;

        let client = bot.client();

        // Run bot in background.
        let handle = bot
            .run()
            .await
            .map_err(|e| HiveError::Provider(format!("whatsapp bot run failed: {e}")))?;

        info!("whatsapp[{session_id}] bot started");
        Ok(Arc::new(WhatsAppConnection::new(
            session_id,
            client,
            handle.abort_handle(),
        )))
    }
}
