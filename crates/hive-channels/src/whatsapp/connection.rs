//! A running `whatsapp-rust` bot seen as a [`Connection`].

use super::send::{parse_jid, split_message, MAX_TEXT_LEN};
use async_trait::async_trait;
use hive_core::{error::HiveError, message::OutgoingImage, traits::Connection};
use std::sync::Arc;
use tokio::task::AbortHandle;
use tracing::{debug, info};
use whatsapp_rust::client::Client;

/// Live WhatsApp connection for one session attempt.
pub struct WhatsAppConnection {
    session_id: String,
    client: Arc<Client>,
    task: AbortHandle,
}

impl WhatsAppConnection {
    pub(super) fn new(session_id: &str, client: Arc<Client>, task: AbortHandle) -> Self {
        Self {
            session_id: session_id.to_string(),
            client,
            task,
        }
    }
}

#[async_trait]
impl Connection for WhatsAppConnection {
    async fn send_text(&self, destination: &str, text: &str) -> Result<(), HiveError> {
        let jid = parse_jid(destination)?;

        for chunk in split_message(text, MAX_TEXT_LEN) {
            let msg = waproto::whatsapp::Message {
                conversation: Some(chunk.to_string()),
                ..Default::default()
            };
            let msg_id = self
                .client
                .send_message(jid.clone(), msg)
                .await
                .map_err(|e| HiveError::Provider(format!("whatsapp send failed: {e}")))?;
            debug!("whatsapp[{}] sent {msg_id} to {destination}", self.session_id);
        }

        Ok(())
    }

    async fn send_image(&self, destination: &str, image: &OutgoingImage) -> Result<(), HiveError> {
        let jid = parse_jid(destination)?;
        let bytes = tokio::fs::read(&image.path).await?;

        let upload = self
            .client
            .upload(bytes, whatsapp_rust::download::MediaType::Image)
            .await
            .map_err(|e| HiveError::Provider(format!("whatsapp image upload failed: {e}")))?;

        let msg = waproto::whatsapp::Message {
            image_message: Some(Box::new(waproto::whatsapp::message::ImageMessage {
                mimetype: Some(image.mime_type.clone()),
                caption: Some(image.caption.clone().unwrap_or_default()),
                url: Some(upload.url),
                direct_path: Some(upload.direct_path),
                media_key: Some(upload.media_key),
                file_enc_sha256: Some(upload.file_enc_sha256),
                file_sha256: Some(upload.file_sha256),
                file_length: Some(upload.file_length),
                ..Default::default()
            })),
            ..Default::default()
        };

        let msg_id = self
            .client
            .send_message(jid, msg)
            .await
            .map_err(|e| HiveError::Provider(format!("whatsapp send failed: {e}")))?;
        debug!(
            "whatsapp[{}] sent image {msg_id} to {destination}",
            self.session_id
        );
        Ok(())
    }

    async fn close(&self) {
        if !self.task.is_finished() {
            info!("whatsapp[{}] closing connection", self.session_id);
        }
        self.task.abort();
    }
}
