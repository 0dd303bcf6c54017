use crate::{
    error::HiveError,
    message::{CredentialState, EventSink, OutgoingImage},
};
use async_trait::async_trait;
use std::sync::Arc;

/// Connection provider trait: the transport.
///
/// A provider knows how to turn persisted credentials into a live
/// connection. Everything it observes afterwards (QR codes, open/close,
/// credential changes) is reported through the [`EventSink`] it was given,
/// which tags each event with the attempt's generation.
#[async_trait]
pub trait ConnectionProvider: Send + Sync {
    /// Human-readable provider name.
    fn name(&self) -> &str;

    /// Server part appended to normalized destinations (e.g. `s.whatsapp.net`).
    fn address_suffix(&self) -> &str;

    /// Open a connection for `session_id` using `credentials`.
    ///
    /// Returns once the connection is running in the background; readiness
    /// is signalled later through `events`.
    async fn open(
        &self,
        session_id: &str,
        credentials: CredentialState,
        events: EventSink,
    ) -> Result<Arc<dyn Connection>, HiveError>;
}

/// A live connection owned by exactly one session attempt.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Send a text message to a fully-qualified address.
    async fn send_text(&self, destination: &str, text: &str) -> Result<(), HiveError>;

    /// Send an image file with an optional caption.
    async fn send_image(&self, destination: &str, image: &OutgoingImage) -> Result<(), HiveError>;

    /// Tear the connection down. Must be safe to call more than once.
    async fn close(&self);
}
