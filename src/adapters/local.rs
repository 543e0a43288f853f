use crate::core::batch::{chunk_count, chunk_ranges, effective_chunk_size};
use crate::core::identity::{prepare_new, touch, IdStrategy, TimestampFormat};
use crate::core::{query, seed};
use crate::domain::model::{BatchResult, DeletePolicy, ListQuery, Page, Record, Table};
use crate::domain::ports::{KeyValueSubstrate, Store};
use crate::utils::error::{Result, StoreError};
use async_trait::async_trait;
use tokio::sync::Mutex;

pub const DEFAULT_KEY_PREFIX: &str = "cocokaranavi_";
pub const LOCAL_MAX_CHUNK_SIZE: usize = 100;

const HEALTH_CHECK_KEY: &str = "health_check";

/// 以鍵值儲存保存整張表（JSON 陣列）的本機後端
///
/// 每次寫入都是「讀整張表、修改、寫回」。`write_lock` 讓同一個 store
/// 的寫入依序進行，不會互相覆蓋掉其他紀錄；同一筆紀錄的並行更新仍是
/// 後寫者勝。
pub struct LocalStore<K: KeyValueSubstrate> {
    substrate: K,
    key_prefix: String,
    delete_policy: DeletePolicy,
    ids: IdStrategy,
    timestamps: TimestampFormat,
    write_lock: Mutex<()>,
}

impl<K: KeyValueSubstrate> LocalStore<K> {
    pub fn new(substrate: K) -> Self {
        Self {
            substrate,
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            delete_policy: DeletePolicy::Hard,
            ids: IdStrategy::Prefixed,
            timestamps: TimestampFormat::Millis,
            write_lock: Mutex::new(()),
        }
    }

    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    pub fn with_delete_policy(mut self, policy: DeletePolicy) -> Self {
        self.delete_policy = policy;
        self
    }

    pub fn substrate(&self) -> &K {
        &self.substrate
    }

    fn key(&self, table: Table) -> String {
        format!("{}{}", self.key_prefix, table)
    }

    async fn load(&self, table: Table) -> Result<Vec<Record>> {
        match self.substrate.read(&self.key(table)).await? {
            Some(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                StoreError::backend(format!("Corrupted data for table {}: {}", table, e))
            }),
            None => Ok(Vec::new()),
        }
    }

    async fn save(&self, table: Table, records: &[Record]) -> Result<()> {
        let bytes = serde_json::to_vec(records)?;
        self.substrate.write(&self.key(table), &bytes).await
    }

    /// 只補上尚不存在的表，已存在的資料不動
    pub async fn seed_defaults(&self) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let now = self.timestamps.now();

        for table in Table::ALL {
            if self.substrate.read(&self.key(table)).await?.is_some() {
                continue;
            }
            let mut records = seed::sample_records(table)?;
            for record in &mut records {
                record.insert("created_at", now.clone());
            }
            self.save(table, &records).await?;
            tracing::info!("🌱 Seeded {} with {} records", table, records.len());
        }
        Ok(())
    }

    /// 刪除所有帶前綴的 key 後重新寫入範例資料
    pub async fn clear_all(&self) -> Result<()> {
        {
            let _guard = self.write_lock.lock().await;
            for key in self.substrate.keys().await? {
                if key.starts_with(&self.key_prefix) {
                    self.substrate.remove(&key).await?;
                }
            }
        }
        tracing::warn!("🧹 Cleared all local tables");
        self.seed_defaults().await
    }

    fn position(records: &[Record], table: Table, id: &str) -> Result<usize> {
        records
            .iter()
            .position(|r| r.id().as_deref() == Some(id))
            .ok_or_else(|| StoreError::not_found(table.as_str(), id))
    }
}

#[async_trait]
impl<K: KeyValueSubstrate> Store for LocalStore<K> {
    fn name(&self) -> &'static str {
        "local"
    }

    fn delete_policy(&self) -> DeletePolicy {
        self.delete_policy
    }

    fn max_chunk_size(&self) -> usize {
        LOCAL_MAX_CHUNK_SIZE
    }

    async fn get(&self, table: Table, id: &str) -> Result<Record> {
        let records = self.load(table).await?;
        let index = Self::position(&records, table, id)?;
        Ok(records[index].clone())
    }

    async fn list(&self, table: Table, query: &ListQuery) -> Result<Page> {
        let records = self.load(table).await?;
        Ok(query::apply(records, query))
    }

    async fn all(&self, table: Table) -> Result<Vec<Record>> {
        self.load(table).await
    }

    async fn create(&self, table: Table, mut record: Record) -> Result<Record> {
        let _guard = self.write_lock.lock().await;
        let mut records = self.load(table).await?;

        prepare_new(&mut record, table.as_str(), self.ids, &self.timestamps.now());
        let id = record.id().unwrap_or_default();
        if records.iter().any(|r| r.id().as_deref() == Some(id.as_str())) {
            return Err(StoreError::Conflict {
                message: format!("{}/{} already exists", table, id),
            });
        }

        records.push(record.clone());
        self.save(table, &records).await?;
        tracing::debug!("➕ {}: created {}", table, id);
        Ok(record)
    }

    async fn replace(&self, table: Table, id: &str, mut record: Record) -> Result<Record> {
        let _guard = self.write_lock.lock().await;
        let mut records = self.load(table).await?;
        let index = Self::position(&records, table, id)?;

        record.set_id(id);
        match records[index].get("created_at").cloned() {
            Some(created_at) => record.insert("created_at", created_at),
            None => record.remove("created_at"),
        };
        touch(&mut record, &self.timestamps.now());

        records[index] = record.clone();
        self.save(table, &records).await?;
        Ok(record)
    }

    async fn merge(&self, table: Table, id: &str, patch: Record) -> Result<Record> {
        let _guard = self.write_lock.lock().await;
        let mut records = self.load(table).await?;
        let index = Self::position(&records, table, id)?;

        let merged = &mut records[index];
        merged.merge(patch);
        merged.set_id(id);
        touch(merged, &self.timestamps.now());
        let merged = merged.clone();

        self.save(table, &records).await?;
        Ok(merged)
    }

    async fn delete(&self, table: Table, id: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut records = self.load(table).await?;
        let index = Self::position(&records, table, id)?;

        match self.delete_policy {
            DeletePolicy::Hard => {
                records.remove(index);
            }
            DeletePolicy::Soft => {
                let record = &mut records[index];
                record.insert("deleted", true);
                touch(record, &self.timestamps.now());
            }
        }

        self.save(table, &records).await?;
        tracing::debug!("🗑️ {}: deleted {} ({:?})", table, id, self.delete_policy);
        Ok(())
    }

    async fn batch_create(
        &self,
        table: Table,
        records: Vec<Record>,
        chunk_size: usize,
    ) -> BatchResult {
        let chunk_size = effective_chunk_size(chunk_size, self.max_chunk_size());
        let total_chunks = chunk_count(records.len(), chunk_size);
        let mut result = BatchResult {
            chunks: total_chunks,
            ..Default::default()
        };

        tracing::info!(
            "🚀 {}: batch create {} records in {} chunks",
            table,
            records.len(),
            total_chunks
        );

        let mut pending = records.into_iter();
        for (chunk_index, range) in chunk_ranges(pending.len(), chunk_size).enumerate() {
            let chunk: Vec<Record> = pending.by_ref().take(range.len()).collect();
            let _guard = self.write_lock.lock().await;

            let mut stored = match self.load(table).await {
                Ok(stored) => stored,
                Err(e) => {
                    tracing::error!("❌ {}: chunk {} load failed: {}", table, chunk_index + 1, e);
                    result.chunk_failed(range.start, range.end, e);
                    continue;
                }
            };

            // 每筆獨立判斷，單筆失敗不影響同一批的其他紀錄
            let now = self.timestamps.now();
            let mut staged = Vec::new();
            for (offset, mut record) in chunk.into_iter().enumerate() {
                let index = range.start + offset;
                prepare_new(&mut record, table.as_str(), self.ids, &now);
                let id = record.id();
                if stored.iter().any(|r| r.id() == id) {
                    let message = format!("{} already exists", id.as_deref().unwrap_or_default());
                    result.record_failed(index, id, message);
                    continue;
                }
                stored.push(record);
                staged.push((index, id));
            }

            match self.save(table, &stored).await {
                Ok(()) => result.success_count += staged.len(),
                Err(e) => {
                    tracing::error!("❌ {}: chunk {} save failed: {}", table, chunk_index + 1, e);
                    for (index, id) in staged {
                        result.record_failed(index, id, &e);
                    }
                }
            }

            tracing::debug!(
                "{}: chunk {}/{} done (success {}, failed {})",
                table,
                chunk_index + 1,
                total_chunks,
                result.success_count,
                result.failed_count
            );
        }

        tracing::info!(
            "✅ {}: batch create finished, success {}, failed {}",
            table,
            result.success_count,
            result.failed_count
        );
        result
    }

    async fn replace_table(&self, table: Table, mut records: Vec<Record>) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        for record in &mut records {
            if record.id().is_none() {
                record.set_id(self.ids.generate(table.as_str()));
            }
        }
        self.save(table, &records).await?;
        tracing::info!("♻️ {}: replaced with {} records", table, records.len());
        Ok(())
    }

    async fn health_check(&self) -> Result<()> {
        let key = format!("{}{}", self.key_prefix, HEALTH_CHECK_KEY);
        let probe = serde_json::to_vec(&self.timestamps.now())?;

        self.substrate.write(&key, &probe).await?;
        let read_back = self.substrate.read(&key).await?;
        self.substrate.remove(&key).await?;

        if read_back.as_deref() == Some(probe.as_slice()) {
            Ok(())
        } else {
            Err(StoreError::backend("Local storage probe could not be read back"))
        }
    }
}
