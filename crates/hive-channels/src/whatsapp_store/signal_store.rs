//! SignalStore: identities, sessions, prekeys, signed prekeys, and sender keys.

use async_trait::async_trait;
use wacore::store::traits::SignalStore;

use super::{keys, CredentialBackend};

type Result<T> = wacore::store::error::Result<T>;

#[async_trait]
impl SignalStore for CredentialBackend {
    async fn put_identity(&self, address: &str, key: [u8; 32]) -> Result<()> {
        self.write(|s| s.insert(format!("{}{address}", keys::IDENTITY), key.to_vec()))
            .await;
        Ok(())
    }

    async fn load_identity(&self, address: &str) -> Result<Option<Vec<u8>>> {
        Ok(self
            .read(|s| s.get(&format!("{}{address}", keys::IDENTITY)).map(<[u8]>::to_vec))
            .await)
    }

    async fn delete_identity(&self, address: &str) -> Result<()> {
        self.write(|s| s.remove(&format!("{}{address}", keys::IDENTITY)))
            .await;
        Ok(())
    }

    async fn get_session(&self, address: &str) -> Result<Option<Vec<u8>>> {
        Ok(self
            .read(|s| s.get(&format!("{}{address}", keys::SESSION)).map(<[u8]>::to_vec))
            .await)
    }

    async fn put_session(&self, address: &str, session: &[u8]) -> Result<()> {
        self.write(|s| s.insert(format!("{}{address}", keys::SESSION), session.to_vec()))
            .await;
        Ok(())
    }

    async fn delete_session(&self, address: &str) -> Result<()> {
        self.write(|s| s.remove(&format!("{}{address}", keys::SESSION)))
            .await;
        Ok(())
    }

    async fn store_prekey(&self, id: u32, record: &[u8], _uploaded: bool) -> Result<()> {
        self.write(|s| s.insert(format!("{}{id}", keys::PREKEY), record.to_vec()))
            .await;
        Ok(())
    }

    async fn load_prekey(&self, id: u32) -> Result<Option<Vec<u8>>> {
        Ok(self
            .read(|s| s.get(&format!("{}{id}", keys::PREKEY)).map(<[u8]>::to_vec))
            .await)
    }

    async fn remove_prekey(&self, id: u32) -> Result<()> {
        self.write(|s| s.remove(&format!("{}{id}", keys::PREKEY)))
            .await;
        Ok(())
    }

    async fn store_signed_prekey(&self, id: u32, record: &[u8]) -> Result<()> {
        self.write(|s| s.insert(format!("{}{id}", keys::SIGNED_PREKEY), record.to_vec()))
            .await;
        Ok(())
    }

    async fn load_signed_prekey(&self, id: u32) -> Result<Option<Vec<u8>>> {
        Ok(self
            .read(|s| {
                s.get(&format!("{}{id}", keys::SIGNED_PREKEY))
                    .map(<[u8]>::to_vec)
            })
            .await)
    }

    async fn load_all_signed_prekeys(&self) -> Result<Vec<(u32, Vec<u8>)>> {
        Ok(self
            .read(|s| {
                s.scan(keys::SIGNED_PREKEY)
                    .filter_map(|(id, record)| id.parse().ok().map(|id| (id, record.to_vec())))
                    .collect()
            })
            .await)
    }

    async fn remove_signed_prekey(&self, id: u32) -> Result<()> {
        self.write(|s| s.remove(&format!("{}{id}", keys::SIGNED_PREKEY)))
            .await;
        Ok(())
    }

    async fn put_sender_key(&self, address: &str, record: &[u8]) -> Result<()> {
        self.write(|s| s.insert(format!("{}{address}", keys::SENDER_KEY), record.to_vec()))
            .await;
        Ok(())
    }

    async fn get_sender_key(&self, address: &str) -> Result<Option<Vec<u8>>> {
        Ok(self
            .read(|s| {
                s.get(&format!("{}{address}", keys::SENDER_KEY))
                    .map(<[u8]>::to_vec)
            })
            .await)
    }

    async fn delete_sender_key(&self, address: &str) -> Result<()> {
        self.write(|s| s.remove(&format!("{}{address}", keys::SENDER_KEY)))
            .await;
        Ok(())
    }
}
