use crate::utils::error::{Result, StoreError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// 未指定 `limit` 時的預設筆數，所有後端共用
pub const DEFAULT_PAGE_LIMIT: usize = 10_000;

/// 單一資料列，欄位名稱對應到任意 JSON 值
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    pub data: Map<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// 解析請求 body；非 JSON 物件一律視為 400
    pub fn from_json_str(body: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(body)
            .map_err(|e| StoreError::bad_request(format!("Invalid JSON body: {}", e)))?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(data) => Ok(Self { data }),
            other => Err(StoreError::bad_request(format!(
                "Record body must be a JSON object, got {}",
                json_type_name(&other)
            ))),
        }
    }

    pub fn from_entity<T: Serialize>(entity: &T) -> Result<Self> {
        Self::from_value(serde_json::to_value(entity)?)
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.data)
    }

    /// 空字串與 null 視為沒有 id
    pub fn id(&self) -> Option<String> {
        match self.data.get("id")? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        self.data.insert("id".to_string(), Value::String(id.into()));
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.data.get(field)
    }

    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.data.get(field).and_then(Value::as_str)
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.data.insert(field.into(), value.into())
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.data.remove(field)
    }

    pub fn is_deleted(&self) -> bool {
        matches!(self.data.get("deleted"), Some(Value::Bool(true)))
    }

    /// 淺層合併：patch 的欄位覆蓋原值，其餘保留
    pub fn merge(&mut self, patch: Record) {
        for (field, value) in patch.data {
            self.data.insert(field, value);
        }
    }

    /// `needle` 必須已轉成小寫；只比對字串欄位
    pub fn matches_search(&self, needle: &str) -> bool {
        self.data.values().any(|value| match value {
            Value::String(s) => s.to_lowercase().contains(needle),
            _ => false,
        })
    }
}

impl From<Map<String, Value>> for Record {
    fn from(data: Map<String, Value>) -> Self {
        Self { data }
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Students,
    Teachers,
    HealthRecords,
    Consultations,
}

impl Table {
    pub const ALL: [Table; 4] = [
        Table::Students,
        Table::Teachers,
        Table::HealthRecords,
        Table::Consultations,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Table::Students => "students",
            Table::Teachers => "teachers",
            Table::HealthRecords => "health_records",
            Table::Consultations => "consultations",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Table {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        Table::ALL
            .into_iter()
            .find(|table| table.as_str() == s)
            .ok_or_else(|| StoreError::UnknownTable {
                name: s.to_string(),
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeletePolicy {
    /// 直接移除資料列
    #[default]
    Hard,
    /// 設定 `deleted = true`，資料列仍可查詢
    Soft,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub field: String,
    pub descending: bool,
}

impl SortKey {
    /// `-created_at` 代表遞減
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        let (field, descending) = match raw.strip_prefix('-') {
            Some(rest) => (rest, true),
            None => (raw, false),
        };
        if field.is_empty() {
            return None;
        }
        Some(Self {
            field: field.to_string(),
            descending,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    pub limit: usize,
    pub page: usize,
    pub search: Option<String>,
    pub sort: Option<SortKey>,
}

impl ListQuery {
    pub fn offset(&self) -> usize {
        self.page.saturating_sub(1).saturating_mul(self.limit)
    }
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            limit: DEFAULT_PAGE_LIMIT,
            page: 1,
            search: None,
            sort: None,
        }
    }
}

/// 集合查詢的回應信封
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub data: Vec<Record>,
    pub total: usize,
    pub page: usize,
    pub limit: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum FailureScope {
    Record { index: usize, id: Option<String> },
    Chunk { start: usize, end: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchFailure {
    #[serde(flatten)]
    pub scope: FailureScope,
    pub error: String,
}

/// 批次匯入的彙總結果，失敗不會往外拋
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResult {
    pub success_count: usize,
    pub failed_count: usize,
    pub chunks: usize,
    pub errors: Vec<BatchFailure>,
}

impl BatchResult {
    pub fn record_failed(&mut self, index: usize, id: Option<String>, error: impl fmt::Display) {
        self.failed_count += 1;
        self.errors.push(BatchFailure {
            scope: FailureScope::Record { index, id },
            error: error.to_string(),
        });
    }

    pub fn chunk_failed(&mut self, start: usize, end: usize, error: impl fmt::Display) {
        self.failed_count += end - start;
        self.errors.push(BatchFailure {
            scope: FailureScope::Chunk { start, end },
            error: error.to_string(),
        });
    }

    pub fn total(&self) -> usize {
        self.success_count + self.failed_count
    }

    pub fn is_complete_success(&self) -> bool {
        self.failed_count == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        Record::from_value(value).unwrap()
    }

    #[test]
    fn test_from_json_str_rejects_non_objects() {
        assert!(Record::from_json_str(r#"{"name":"山田"}"#).is_ok());
        assert!(matches!(
            Record::from_json_str("[1,2]"),
            Err(StoreError::BadRequest { .. })
        ));
        assert!(matches!(
            Record::from_json_str("{not json"),
            Err(StoreError::BadRequest { .. })
        ));
    }

    #[test]
    fn test_id_handles_numbers_and_empty_strings() {
        assert_eq!(record(json!({"id": "student_001"})).id().as_deref(), Some("student_001"));
        assert_eq!(record(json!({"id": 42})).id().as_deref(), Some("42"));
        assert_eq!(record(json!({"id": ""})).id(), None);
        assert_eq!(record(json!({"name": "x"})).id(), None);
    }

    #[test]
    fn test_merge_keeps_untouched_fields() {
        let mut base = record(json!({"id": "c1", "status": "新規", "teacher_id": "t1"}));
        base.merge(record(json!({"status": "対応中", "teacher_response": "了解"})));

        assert_eq!(base.get_str("status"), Some("対応中"));
        assert_eq!(base.get_str("teacher_id"), Some("t1"));
        assert_eq!(base.get_str("teacher_response"), Some("了解"));
    }

    #[test]
    fn test_search_only_matches_string_fields() {
        let r = record(json!({
            "name": "Yamada Taro",
            "grade": 1,
            "symptoms": ["headache"],
            "active": true
        }));

        assert!(r.matches_search("yamada"));
        assert!(r.matches_search("taro"));
        assert!(!r.matches_search("1"));
        assert!(!r.matches_search("headache"));
        assert!(!r.matches_search("true"));
    }

    #[test]
    fn test_table_round_trips_through_names() {
        for table in Table::ALL {
            assert_eq!(table.as_str().parse::<Table>().unwrap(), table);
        }
        assert!(matches!(
            "users".parse::<Table>(),
            Err(StoreError::UnknownTable { .. })
        ));
    }

    #[test]
    fn test_sort_key_parse() {
        assert_eq!(
            SortKey::parse("-created_at"),
            Some(SortKey {
                field: "created_at".to_string(),
                descending: true
            })
        );
        assert_eq!(SortKey::parse("name").map(|k| k.descending), Some(false));
        assert_eq!(SortKey::parse("-"), None);
    }

    #[test]
    fn test_batch_result_serializes_camel_case() {
        let mut result = BatchResult {
            success_count: 3,
            ..Default::default()
        };
        result.chunk_failed(3, 5, "commit rejected");

        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["successCount"], 3);
        assert_eq!(value["failedCount"], 2);
        assert_eq!(value["errors"][0]["scope"], "chunk");
        assert_eq!(value["errors"][0]["start"], 3);
        assert_eq!(result.total(), 5);
    }
}
