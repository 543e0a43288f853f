use crate::domain::model::{BatchResult, DeletePolicy, ListQuery, Page, Record, Table};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// 本機 store 底下的原始儲存：以名稱為 key 的不透明位元組
pub trait KeyValueSubstrate: Send + Sync {
    fn read(&self, key: &str)
        -> impl std::future::Future<Output = Result<Option<Vec<u8>>>> + Send;
    fn write(&self, key: &str, data: &[u8])
        -> impl std::future::Future<Output = Result<()>> + Send;
    fn remove(&self, key: &str) -> impl std::future::Future<Output = Result<()>> + Send;
    fn keys(&self) -> impl std::future::Future<Output = Result<Vec<String>>> + Send;
}

/// 所有後端共同實作的儲存介面
///
/// 失敗以 [`StoreError`](crate::utils::error::StoreError) 回傳，由請求路由轉成回應信封。
/// `batch_create` 例外：永遠回傳彙總結果，不會回傳錯誤。
#[async_trait]
pub trait Store: Send + Sync {
    fn name(&self) -> &'static str;

    fn delete_policy(&self) -> DeletePolicy;

    /// 單一 batch chunk 的筆數上限
    fn max_chunk_size(&self) -> usize;

    async fn get(&self, table: Table, id: &str) -> Result<Record>;

    async fn list(&self, table: Table, query: &ListQuery) -> Result<Page>;

    async fn all(&self, table: Table) -> Result<Vec<Record>>;

    async fn create(&self, table: Table, record: Record) -> Result<Record>;

    /// 整筆取代；原紀錄只保留 `id` 與 `created_at`
    async fn replace(&self, table: Table, id: &str, record: Record) -> Result<Record>;

    /// 把 `patch` 淺層合併進原紀錄
    async fn merge(&self, table: Table, id: &str, patch: Record) -> Result<Record>;

    async fn delete(&self, table: Table, id: &str) -> Result<()>;

    async fn batch_create(&self, table: Table, records: Vec<Record>, chunk_size: usize)
        -> BatchResult;

    async fn replace_table(&self, table: Table, records: Vec<Record>) -> Result<()>;

    async fn health_check(&self) -> Result<()>;
}

#[async_trait]
impl<S: Store + ?Sized> Store for Arc<S> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn delete_policy(&self) -> DeletePolicy {
        (**self).delete_policy()
    }

    fn max_chunk_size(&self) -> usize {
        (**self).max_chunk_size()
    }

    async fn get(&self, table: Table, id: &str) -> Result<Record> {
        (**self).get(table, id).await
    }

    async fn list(&self, table: Table, query: &ListQuery) -> Result<Page> {
        (**self).list(table, query).await
    }

    async fn all(&self, table: Table) -> Result<Vec<Record>> {
        (**self).all(table).await
    }

    async fn create(&self, table: Table, record: Record) -> Result<Record> {
        (**self).create(table, record).await
    }

    async fn replace(&self, table: Table, id: &str, record: Record) -> Result<Record> {
        (**self).replace(table, id, record).await
    }

    async fn merge(&self, table: Table, id: &str, patch: Record) -> Result<Record> {
        (**self).merge(table, id, patch).await
    }

    async fn delete(&self, table: Table, id: &str) -> Result<()> {
        (**self).delete(table, id).await
    }

    async fn batch_create(
        &self,
        table: Table,
        records: Vec<Record>,
        chunk_size: usize,
    ) -> BatchResult {
        (**self).batch_create(table, records, chunk_size).await
    }

    async fn replace_table(&self, table: Table, records: Vec<Record>) -> Result<()> {
        (**self).replace_table(table, records).await
    }

    async fn health_check(&self) -> Result<()> {
        (**self).health_check().await
    }
}
