use crate::core::batch::effective_chunk_size;
use crate::core::query::parse_list_query;
use crate::core::response::Response;
use crate::domain::model::{BatchResult, Record, Table, DEFAULT_PAGE_LIMIT};
use crate::domain::ports::Store;
use crate::utils::error::{Result, StoreError};
use percent_encoding::percent_decode_str;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl FromStr for Method {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "PATCH" => Ok(Method::Patch),
            "DELETE" => Ok(Method::Delete),
            _ => Err(StoreError::UnsupportedMethod {
                method: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        };
        f.write_str(name)
    }
}

/// `tables/<table>[/<id>][?query]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourcePath {
    pub table: Table,
    pub id: Option<String>,
    pub query: Option<String>,
}

impl ResourcePath {
    pub fn parse(path: &str) -> Result<Self> {
        let invalid = || StoreError::InvalidPath {
            path: path.to_string(),
        };

        let (raw_path, query) = match path.split_once('?') {
            Some((p, q)) => (p, Some(q.to_string()).filter(|q| !q.is_empty())),
            None => (path, None),
        };

        let segments: Vec<&str> = raw_path.split('/').filter(|s| !s.is_empty()).collect();
        match segments.as_slice() {
            ["tables", table] => Ok(Self {
                table: table.parse()?,
                id: None,
                query,
            }),
            ["tables", table, id] => {
                // id 段落是 percent-encoded；解碼後不是 UTF-8 或為空時視為非法路徑
                let id = percent_decode_str(id)
                    .decode_utf8()
                    .map_err(|_| invalid())?
                    .into_owned();
                if id.is_empty() {
                    return Err(invalid());
                }
                Ok(Self {
                    table: table.parse()?,
                    id: Some(id),
                    query,
                })
            }
            _ => Err(invalid()),
        }
    }
}

/// 後端無關的請求入口
///
/// 路徑或動詞不合法時直接回傳 `Err`（尚未做任何 I/O）；其餘失敗都包成
/// 失敗的 [`Response`]。
pub struct Adapter<S: Store> {
    store: S,
    default_limit: usize,
}

impl<S: Store> Adapter<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            default_limit: DEFAULT_PAGE_LIMIT,
        }
    }

    pub fn with_default_limit(mut self, limit: usize) -> Self {
        self.default_limit = limit.max(1);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn fetch(&self, path: &str, method: &str, body: Option<&str>) -> Result<Response> {
        let method: Method = method.parse()?;
        let resource = ResourcePath::parse(path)?;

        tracing::debug!(
            "✅ [{}] {} tables/{}{}",
            self.store.name(),
            method,
            resource.table,
            resource
                .id
                .as_deref()
                .map(|id| format!("/{}", id))
                .unwrap_or_default()
        );

        let outcome = match method {
            Method::Get => self.handle_get(&resource).await,
            Method::Post => self.handle_post(&resource, body).await,
            Method::Put => self.handle_update(&resource, body, false).await,
            Method::Patch => self.handle_update(&resource, body, true).await,
            Method::Delete => self.handle_delete(&resource).await,
        };

        Ok(outcome.unwrap_or_else(|e| {
            if e.status_code() >= 500 {
                tracing::error!("❌ {} {} failed: {}", method, path, e);
            } else {
                tracing::debug!("{} {} rejected: {}", method, path, e);
            }
            Response::from_error(&e)
        }))
    }

    /// 呼叫端自行限制時間；逾時後底層操作仍可能完成
    pub async fn fetch_with_timeout(
        &self,
        path: &str,
        method: &str,
        body: Option<&str>,
        timeout: Duration,
    ) -> Result<Response> {
        match tokio::time::timeout(timeout, self.fetch(path, method, body)).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::backend(format!(
                "request {} {} timed out after {:?}",
                method, path, timeout
            ))),
        }
    }

    /// 要求的 chunk 大小先限制在後端上限內再交給 store
    pub async fn batch_create(
        &self,
        table: Table,
        records: Vec<Record>,
        chunk_size: usize,
    ) -> BatchResult {
        let max = self.store.max_chunk_size();
        let effective = effective_chunk_size(chunk_size, max);
        if effective != chunk_size {
            tracing::debug!(
                "📦 [{}] chunk size {} adjusted to {} (max {})",
                self.store.name(),
                chunk_size,
                effective,
                max
            );
        }
        self.store.batch_create(table, records, effective).await
    }

    async fn handle_get(&self, resource: &ResourcePath) -> Result<Response> {
        match &resource.id {
            Some(id) => {
                let record = self.store.get(resource.table, id).await?;
                Response::success(&record, 200)
            }
            None => {
                let query = parse_list_query(resource.query.as_deref(), self.default_limit);
                let page = self.store.list(resource.table, &query).await?;
                tracing::debug!(
                    "🔍 {}: {} of {} records (page {}, limit {})",
                    resource.table,
                    page.data.len(),
                    page.total,
                    page.page,
                    page.limit
                );
                Response::success(&page, 200)
            }
        }
    }

    async fn handle_post(&self, resource: &ResourcePath, body: Option<&str>) -> Result<Response> {
        if resource.id.is_some() {
            return Err(StoreError::bad_request(
                "POST targets a table, not a record id",
            ));
        }
        let record = Record::from_json_str(require_body(body)?)?;
        let created = self.store.create(resource.table, record).await?;
        Response::success(&created, 201)
    }

    async fn handle_update(
        &self,
        resource: &ResourcePath,
        body: Option<&str>,
        partial: bool,
    ) -> Result<Response> {
        let id = require_id(resource)?;
        let record = Record::from_json_str(require_body(body)?)?;
        let updated = if partial {
            self.store.merge(resource.table, id, record).await?
        } else {
            self.store.replace(resource.table, id, record).await?
        };
        Response::success(&updated, 200)
    }

    async fn handle_delete(&self, resource: &ResourcePath) -> Result<Response> {
        let id = require_id(resource)?;
        self.store.delete(resource.table, id).await?;
        Ok(Response::no_content())
    }
}

fn require_id(resource: &ResourcePath) -> Result<&str> {
    resource
        .id
        .as_deref()
        .ok_or_else(|| StoreError::bad_request("A record id is required"))
}

fn require_body(body: Option<&str>) -> Result<&str> {
    body.filter(|b| !b.trim().is_empty())
        .ok_or_else(|| StoreError::bad_request("A JSON body is required"))
}
