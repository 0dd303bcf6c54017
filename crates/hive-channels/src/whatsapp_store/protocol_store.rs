//! ProtocolStore: SKDM recipients, LID/PN mappings, base keys, device lists,
//! and forget-sender-key marks.

use async_trait::async_trait;
use wacore::store::error::StoreError;
use wacore::store::traits::{DeviceListRecord, LidPnMappingEntry, ProtocolStore};

use super::{keys, CredentialBackend};

type Result<T> = wacore::store::error::Result<T>;

/// `(phone_number, created_at, updated_at, learning_source)` as stored under `lid/`.
type StoredMapping = (String, i64, i64, String);

fn decode_mapping(lid: &str, raw: &[u8]) -> Result<LidPnMappingEntry> {
    let (phone_number, created_at, updated_at, learning_source): StoredMapping =
        bincode::deserialize(raw).map_err(|e| StoreError::Serialization(e.to_string()))?;
    Ok(LidPnMappingEntry {
        lid: lid.to_string(),
        phone_number,
        created_at,
        updated_at,
        learning_source,
    })
}

fn all_mappings(raw: Vec<(String, Vec<u8>)>) -> Result<Vec<LidPnMappingEntry>> {
    raw.iter()
        .map(|(lid, data)| decode_mapping(lid, data))
        .collect()
}

#[async_trait]
impl ProtocolStore for CredentialBackend {
    async fn get_skdm_recipients(&self, group_jid: &str) -> Result<Vec<String>> {
        let prefix = format!("{}{group_jid}/", keys::SKDM);
        Ok(self
            .read(|s| s.scan(&prefix).map(|(device, _)| device.to_string()).collect())
            .await)
    }

    async fn add_skdm_recipients(&self, group_jid: &str, device_jids: &[String]) -> Result<()> {
        self.write(|s| {
            for device in device_jids {
                s.insert(format!("{}{group_jid}/{device}", keys::SKDM), Vec::new());
            }
        })
        .await;
        Ok(())
    }

    async fn clear_skdm_recipients(&self, group_jid: &str) -> Result<()> {
        let prefix = format!("{}{group_jid}/", keys::SKDM);
        self.write(|s| s.remove_prefix(&prefix)).await;
        Ok(())
    }

    async fn get_lid_mapping(&self, lid: &str) -> Result<Option<LidPnMappingEntry>> {
        let raw = self
            .read(|s| s.get(&format!("{}{lid}", keys::LID)).map(<[u8]>::to_vec))
            .await;
        raw.map(|data| decode_mapping(lid, &data)).transpose()
    }

    async fn get_pn_mapping(&self, phone: &str) -> Result<Option<LidPnMappingEntry>> {
        let raw = self.read(collect_mappings).await;
        Ok(all_mappings(raw)?
            .into_iter()
            .find(|entry| entry.phone_number == phone))
    }

    async fn put_lid_mapping(&self, entry: &LidPnMappingEntry) -> Result<()> {
        let stored: StoredMapping = (
            entry.phone_number.clone(),
            entry.created_at,
            entry.updated_at,
            entry.learning_source.clone(),
        );
        let data =
            bincode::serialize(&stored).map_err(|e| StoreError::Serialization(e.to_string()))?;
        self.write(|s| s.insert(format!("{}{}", keys::LID, entry.lid), data))
            .await;
        Ok(())
    }

    async fn get_all_lid_mappings(&self) -> Result<Vec<LidPnMappingEntry>> {
        let raw = self.read(collect_mappings).await;
        all_mappings(raw)
    }

    async fn save_base_key(&self, address: &str, message_id: &str, base_key: &[u8]) -> Result<()> {
        self.write(|s| {
            s.insert(
                format!("{}{address}/{message_id}", keys::BASE_KEY),
                base_key.to_vec(),
            )
        })
        .await;
        Ok(())
    }

    async fn has_same_base_key(
        &self,
        address: &str,
        message_id: &str,
        current_base_key: &[u8],
    ) -> Result<bool> {
        Ok(self
            .read(|s| {
                s.get(&format!("{}{address}/{message_id}", keys::BASE_KEY))
                    .is_some_and(|k| k == current_base_key)
            })
            .await)
    }

    async fn delete_base_key(&self, address: &str, message_id: &str) -> Result<()> {
        self.write(|s| s.remove(&format!("{}{address}/{message_id}", keys::BASE_KEY)))
            .await;
        Ok(())
    }

    async fn update_device_list(&self, record: DeviceListRecord) -> Result<()> {
        let data =
            serde_json::to_vec(&record).map_err(|e| StoreError::Serialization(e.to_string()))?;
        self.write(|s| s.insert(format!("{}{}", keys::DEVICE_LIST, record.user), data))
            .await;
        Ok(())
    }

    async fn get_devices(&self, user: &str) -> Result<Option<DeviceListRecord>> {
        let raw = self
            .read(|s| {
                s.get(&format!("{}{user}", keys::DEVICE_LIST))
                    .map(<[u8]>::to_vec)
            })
            .await;

        match raw {
            Some(data) => {
                let record = serde_json::from_slice(&data)
                    .map_err(|e| StoreError::Serialization(e.to_string()))?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    async fn mark_forget_sender_key(&self, group_jid: &str, participant: &str) -> Result<()> {
        self.write(|s| {
            s.insert(
                format!("{}{group_jid}/{participant}", keys::FORGET),
                Vec::new(),
            )
        })
        .await;
        Ok(())
    }

    async fn consume_forget_marks(&self, group_jid: &str) -> Result<Vec<String>> {
        let prefix = format!("{}{group_jid}/", keys::FORGET);
        Ok(self
            .write(|s| {
                let participants: Vec<String> =
                    s.scan(&prefix).map(|(p, _)| p.to_string()).collect();
                s.remove_prefix(&prefix);
                participants
            })
            .await)
    }
}

fn collect_mappings(state: &hive_core::message::CredentialState) -> Vec<(String, Vec<u8>)> {
    state
        .scan(keys::LID)
        .map(|(lid, data)| (lid.to_string(), data.to_vec()))
        .collect()
}
