use crate::domain::model::Record;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// 新紀錄的 id 產生方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdStrategy {
    /// `<table>_<base36 時間>_<base36 亂數>`
    #[default]
    Prefixed,
    /// UUID v4
    Uuid,
}

impl IdStrategy {
    pub fn generate(&self, table: &str) -> String {
        match self {
            IdStrategy::Prefixed => {
                let millis = Utc::now().timestamp_millis().max(0) as u128;
                // 只取低 64 位元
                let random = Uuid::new_v4().as_u128() & u128::from(u64::MAX);
                format!("{}_{}_{}", table, to_base36(millis), to_base36(random))
            }
            IdStrategy::Uuid => Uuid::new_v4().to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimestampFormat {
    /// Unix epoch 毫秒
    #[default]
    Millis,
    Iso8601,
}

impl TimestampFormat {
    pub fn now(&self) -> Value {
        let now = Utc::now();
        match self {
            TimestampFormat::Millis => Value::from(now.timestamp_millis()),
            TimestampFormat::Iso8601 => {
                Value::String(now.to_rfc3339_opts(SecondsFormat::Millis, true))
            }
        }
    }
}

/// 補上缺少的 id，並寫入兩個時間戳
pub fn prepare_new(record: &mut Record, table: &str, ids: IdStrategy, now: &Value) {
    if record.id().is_none() {
        record.set_id(ids.generate(table));
    }
    record.insert("created_at", now.clone());
    record.insert("updated_at", now.clone());
}

pub fn touch(record: &mut Record, now: &Value) {
    record.insert("updated_at", now.clone());
}

fn to_base36(mut n: u128) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_prefixed_ids_are_unique_and_prefixed() {
        let ids: HashSet<String> = (0..1000)
            .map(|_| IdStrategy::Prefixed.generate("students"))
            .collect();

        assert_eq!(ids.len(), 1000);
        assert!(ids.iter().all(|id| id.starts_with("students_")));
        assert!(ids.iter().all(|id| id.split('_').count() == 3));
    }

    #[test]
    fn test_uuid_ids_are_v4_shaped() {
        let id = IdStrategy::Uuid.generate("students");
        let parsed = Uuid::parse_str(&id).unwrap();
        assert_eq!(parsed.get_version_num(), 4);
    }

    #[test]
    fn test_prepare_new_keeps_explicit_id() {
        let mut record = Record::new();
        record.set_id("student_001");
        prepare_new(&mut record, "students", IdStrategy::Prefixed, &Value::from(1));

        assert_eq!(record.id().as_deref(), Some("student_001"));
        assert_eq!(record.get("created_at"), Some(&Value::from(1)));
        assert_eq!(record.get("updated_at"), Some(&Value::from(1)));
    }

    #[test]
    fn test_timestamp_formats() {
        assert!(TimestampFormat::Millis.now().is_i64());
        let iso = TimestampFormat::Iso8601.now();
        assert!(chrono::DateTime::parse_from_rfc3339(iso.as_str().unwrap()).is_ok());
    }

    #[test]
    fn test_to_base36() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
    }
}
