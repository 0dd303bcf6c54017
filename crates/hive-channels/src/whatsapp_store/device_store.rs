//! DeviceStore: the paired device identity.

use async_trait::async_trait;
use wacore::store::error::StoreError;
use wacore::store::traits::DeviceStore;
use wacore::store::Device;

use super::{keys, CredentialBackend};

type Result<T> = wacore::store::error::Result<T>;

#[async_trait]
impl DeviceStore for CredentialBackend {
    async fn save(&self, device: &Device) -> Result<()> {
        // Device uses custom serde (key_pair_serde, BigArray) that needs a binary format.
        let data =
            bincode::serialize(device).map_err(|e| StoreError::Serialization(e.to_string()))?;
        self.write(|s| s.insert(keys::DEVICE, data)).await;
        Ok(())
    }

    async fn load(&self) -> Result<Option<Device>> {
        let raw = self
            .read(|s| s.get(keys::DEVICE).map(<[u8]>::to_vec))
            .await;

        match raw {
            Some(data) => {
                let device = bincode::deserialize(&data)
                    .map_err(|e| StoreError::Serialization(e.to_string()))?;
                Ok(Some(device))
            }
            None => Ok(None),
        }
    }

    async fn exists(&self) -> Result<bool> {
        Ok(self.read(|s| s.get(keys::DEVICE).is_some()).await)
    }

    async fn create(&self) -> Result<i32> {
        // One device per session; its data arrives later through save().
        Ok(1)
    }
}
