//! AppSyncStore: app state sync keys, collection versions, and mutation MACs.

use async_trait::async_trait;
use wacore::appstate::hash::HashState;
use wacore::appstate::processor::AppStateMutationMAC;
use wacore::store::error::StoreError;
use wacore::store::traits::{AppStateSyncKey, AppSyncStore};

use super::{hex, keys, CredentialBackend};

type Result<T> = wacore::store::error::Result<T>;

/// `(key_data, timestamp, fingerprint)` as stored under `sync-key/`.
type StoredSyncKey = (Vec<u8>, i64, Vec<u8>);

fn mac_key(name: &str, index_mac: &[u8]) -> String {
    format!("{}{name}/{}", keys::MUTATION_MAC, hex(index_mac))
}

#[async_trait]
impl AppSyncStore for CredentialBackend {
    async fn get_sync_key(&self, key_id: &[u8]) -> Result<Option<AppStateSyncKey>> {
        let raw = self
            .read(|s| {
                s.get(&format!("{}{}", keys::SYNC_KEY, hex(key_id)))
                    .map(<[u8]>::to_vec)
            })
            .await;

        let Some(raw) = raw else {
            return Ok(None);
        };
        let (key_data, timestamp, fingerprint): StoredSyncKey = bincode::deserialize(&raw)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        Ok(Some(AppStateSyncKey {
            key_data,
            timestamp,
            fingerprint,
        }))
    }

    async fn set_sync_key(&self, key_id: &[u8], key: AppStateSyncKey) -> Result<()> {
        let stored: StoredSyncKey = (key.key_data, key.timestamp, key.fingerprint);
        let data =
            bincode::serialize(&stored).map_err(|e| StoreError::Serialization(e.to_string()))?;
        self.write(|s| s.insert(format!("{}{}", keys::SYNC_KEY, hex(key_id)), data))
            .await;
        Ok(())
    }

    async fn get_version(&self, name: &str) -> Result<HashState> {
        let raw = self
            .read(|s| {
                s.get(&format!("{}{name}", keys::APP_VERSION))
                    .map(<[u8]>::to_vec)
            })
            .await;

        match raw {
            Some(data) => {
                serde_json::from_slice(&data).map_err(|e| StoreError::Serialization(e.to_string()))
            }
            None => Ok(HashState::default()),
        }
    }

    async fn set_version(&self, name: &str, state: HashState) -> Result<()> {
        let data =
            serde_json::to_vec(&state).map_err(|e| StoreError::Serialization(e.to_string()))?;
        self.write(|s| s.insert(format!("{}{name}", keys::APP_VERSION), data))
            .await;
        Ok(())
    }

    async fn put_mutation_macs(
        &self,
        name: &str,
        _version: u64,
        mutations: &[AppStateMutationMAC],
    ) -> Result<()> {
        self.write(|s| {
            for m in mutations {
                s.insert(mac_key(name, &m.index_mac), m.value_mac.clone());
            }
        })
        .await;
        Ok(())
    }

    async fn get_mutation_mac(&self, name: &str, index_mac: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self
            .read(|s| s.get(&mac_key(name, index_mac)).map(<[u8]>::to_vec))
            .await)
    }

    async fn delete_mutation_macs(&self, name: &str, index_macs: &[Vec<u8>]) -> Result<()> {
        self.write(|s| {
            for mac in index_macs {
                s.remove(&mac_key(name, mac));
            }
        })
        .await;
        Ok(())
    }
}
