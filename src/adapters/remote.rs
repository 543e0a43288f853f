use crate::core::batch::{chunk_count, chunk_ranges, effective_chunk_size};
use crate::core::identity::{prepare_new, IdStrategy, TimestampFormat};
use crate::core::query;
use crate::domain::model::{BatchResult, DeletePolicy, ListQuery, Page, Record, Table};
use crate::domain::ports::Store;
use crate::utils::error::{Result, StoreError};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_RANGE, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder, StatusCode};
use std::time::Duration;

pub const REMOTE_MAX_CHUNK_SIZE: usize = 500;

const PREFER: &str = "Prefer";
const RETURN_REPRESENTATION: &str = "return=representation";

/// 透過 PostgREST 風格 REST API 存取的託管資料庫
///
/// 每張表對應 `<endpoint>/rest/v1/<table>`，以 `?id=eq.<id>` 指定單筆。
pub struct RemoteStore {
    client: Client,
    endpoint: String,
    delete_policy: DeletePolicy,
    ids: IdStrategy,
    timestamps: TimestampFormat,
}

impl RemoteStore {
    pub fn new(endpoint: &str, api_key: &str, timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let mut key = HeaderValue::from_str(api_key).map_err(|e| {
            StoreError::InvalidConfigValueError {
                field: "remote.api_key".to_string(),
                value: "<redacted>".to_string(),
                reason: e.to_string(),
            }
        })?;
        key.set_sensitive(true);
        let mut bearer = HeaderValue::from_str(&format!("Bearer {}", api_key)).map_err(|e| {
            StoreError::ConfigError {
                message: format!("Invalid API key: {}", e),
            }
        })?;
        bearer.set_sensitive(true);

        headers.insert("apikey", key);
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            delete_policy: DeletePolicy::Soft,
            ids: IdStrategy::Uuid,
            timestamps: TimestampFormat::Iso8601,
        })
    }

    pub fn with_delete_policy(mut self, policy: DeletePolicy) -> Self {
        self.delete_policy = policy;
        self
    }

    fn table_url(&self, table: Table) -> String {
        format!("{}/rest/v1/{}", self.endpoint, table)
    }

    fn by_id(&self, builder: RequestBuilder, id: &str) -> RequestBuilder {
        builder.query(&[("id", format!("eq.{}", filter_literal(id)))])
    }

    /// 非 2xx 狀態轉成對應的錯誤
    async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        tracing::debug!("📡 remote responded {}: {}", status, body);
        let message = format!("{}: {}", status, body);
        Err(match status {
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
                StoreError::bad_request(message)
            }
            StatusCode::CONFLICT => StoreError::Conflict { message },
            _ => StoreError::backend(message),
        })
    }

    async fn send_for_records(builder: RequestBuilder) -> Result<Vec<Record>> {
        let response = Self::check(builder.send().await?).await?;
        Ok(response.json().await?)
    }

    fn first_or_not_found(records: Vec<Record>, table: Table, id: &str) -> Result<Record> {
        records
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::not_found(table.as_str(), id))
    }

    async fn insert_many(&self, table: Table, records: &[Record]) -> Result<Vec<Record>> {
        let request = self
            .client
            .post(self.table_url(table))
            .header(PREFER, RETURN_REPRESENTATION)
            .json(records);
        Self::send_for_records(request).await
    }
}

#[async_trait]
impl Store for RemoteStore {
    fn name(&self) -> &'static str {
        "remote"
    }

    fn delete_policy(&self) -> DeletePolicy {
        self.delete_policy
    }

    fn max_chunk_size(&self) -> usize {
        REMOTE_MAX_CHUNK_SIZE
    }

    async fn get(&self, table: Table, id: &str) -> Result<Record> {
        let request = self
            .by_id(self.client.get(self.table_url(table)), id)
            .query(&[("select", "*")]);
        let records = Self::send_for_records(request).await?;
        Self::first_or_not_found(records, table, id)
    }

    async fn list(&self, table: Table, query: &ListQuery) -> Result<Page> {
        // 伺服器端沒有跨欄位的模糊搜尋，改為全部取回後在本地篩選
        if query.search.is_some() {
            let records = self.all(table).await?;
            return Ok(query::apply(records, query));
        }

        let mut request = self
            .client
            .get(self.table_url(table))
            .header(PREFER, "count=exact")
            .query(&[("select", "*")])
            .query(&[("limit", query.limit), ("offset", query.offset())]);
        if let Some(sort) = &query.sort {
            let direction = if sort.descending { "desc" } else { "asc" };
            request = request.query(&[("order", format!("{}.{}", sort.field, direction))]);
        }

        let response = Self::check(request.send().await?).await?;
        let total = response
            .headers()
            .get(CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_range_total);
        let data: Vec<Record> = response.json().await?;

        Ok(Page {
            total: total.unwrap_or(query.offset() + data.len()),
            data,
            page: query.page,
            limit: query.limit,
        })
    }

    async fn all(&self, table: Table) -> Result<Vec<Record>> {
        let request = self
            .client
            .get(self.table_url(table))
            .query(&[("select", "*")]);
        Self::send_for_records(request).await
    }

    async fn create(&self, table: Table, mut record: Record) -> Result<Record> {
        prepare_new(&mut record, table.as_str(), self.ids, &self.timestamps.now());
        let created = self.insert_many(table, std::slice::from_ref(&record)).await?;
        Ok(created.into_iter().next().unwrap_or(record))
    }

    async fn replace(&self, table: Table, id: &str, mut record: Record) -> Result<Record> {
        let existing = self.get(table, id).await?;

        record.set_id(id);
        match existing.get("created_at").cloned() {
            Some(created_at) => record.insert("created_at", created_at),
            None => record.remove("created_at"),
        };
        record.insert("updated_at", self.timestamps.now());

        let request = self
            .by_id(self.client.put(self.table_url(table)), id)
            .header(PREFER, RETURN_REPRESENTATION)
            .json(&record);
        let replaced = Self::send_for_records(request).await?;
        Self::first_or_not_found(replaced, table, id)
    }

    async fn merge(&self, table: Table, id: &str, mut patch: Record) -> Result<Record> {
        patch.remove("id");
        patch.insert("updated_at", self.timestamps.now());

        let request = self
            .by_id(self.client.patch(self.table_url(table)), id)
            .header(PREFER, RETURN_REPRESENTATION)
            .json(&patch);
        let merged = Self::send_for_records(request).await?;
        Self::first_or_not_found(merged, table, id)
    }

    async fn delete(&self, table: Table, id: &str) -> Result<()> {
        let request = match self.delete_policy {
            DeletePolicy::Hard => self.by_id(self.client.delete(self.table_url(table)), id),
            DeletePolicy::Soft => {
                let mut flag = Record::new();
                flag.insert("deleted", true);
                flag.insert("updated_at", self.timestamps.now());
                self.by_id(self.client.patch(self.table_url(table)), id)
                    .json(&flag)
            }
        };

        let affected = Self::send_for_records(request.header(PREFER, RETURN_REPRESENTATION)).await?;
        Self::first_or_not_found(affected, table, id)?;
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

        let now = self.timestamps.now();
        let mut pending = records.into_iter();
        for (chunk_index, range) in chunk_ranges(pending.len(), chunk_size).enumerate() {
            let mut chunk: Vec<Record> = pending.by_ref().take(range.len()).collect();
            for record in &mut chunk {
                prepare_new(record, table.as_str(), self.ids, &now);
            }

            // 一個 chunk 是一次請求，整批成功或整批失敗
            match self.insert_many(table, &chunk).await {
                Ok(_) => result.success_count += chunk.len(),
                Err(e) => {
                    tracing::error!(
                        "❌ {}: chunk {}/{} rejected: {}",
                        table,
                        chunk_index + 1,
                        total_chunks,
                        e
                    );
                    result.chunk_failed(range.start, range.end, e);
                }
            }
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
        let request = self
            .client
            .delete(self.table_url(table))
            .query(&[("id", "not.is.null")]);
        Self::check(request.send().await?).await?;

        for record in &mut records {
            if record.id().is_none() {
                record.set_id(self.ids.generate(table.as_str()));
            }
        }
        for range in chunk_ranges(records.len(), self.max_chunk_size()) {
            self.insert_many(table, &records[range]).await?;
        }

        tracing::info!("♻️ {}: replaced with {} records", table, records.len());
        Ok(())
    }

    async fn health_check(&self) -> Result<()> {
        let request = self
            .client
            .get(self.table_url(Table::Students))
            .query(&[("select", "id"), ("limit", "1")]);
        Self::check(request.send().await?).await?;
        Ok(())
    }
}

/// PostgREST 保留字元（`,.:()` 與引號、空白）出現時以雙引號包住，內部的 `"` 與 `\` 加上跳脫
fn filter_literal(value: &str) -> String {
    let reserved =
        |c: char| matches!(c, ',' | '.' | ':' | '(' | ')' | '"' | '\\') || c.is_whitespace();
    if !value.contains(reserved) {
        return value.to_string();
    }
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{}\"", escaped)
}

/// `0-9/42` 取出 42；`*` 或格式不符時回傳 None
fn parse_content_range_total(header: &str) -> Option<usize> {
    header.split_once('/')?.1.trim().parse().ok()
}
