use crate::core::identity::TimestampFormat;
use crate::core::seed;
use crate::domain::model::{Record, Table};
use crate::domain::ports::Store;
use crate::utils::error::{Result, StoreError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 全部資料表的 JSON 備份
///
/// 還原時只處理快照中存在的表，缺少的表保持原狀。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub teachers: Option<Vec<Record>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub students: Option<Vec<Record>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health_records: Option<Vec<Record>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consultations: Option<Vec<Record>>,
    #[serde(default)]
    pub exported_at: Option<String>,
}

impl Snapshot {
    pub fn from_json_str(text: &str) -> Result<Self> {
        serde_json::from_str(text)
            .map_err(|e| StoreError::bad_request(format!("Invalid snapshot: {}", e)))
    }

    pub fn table(&self, table: Table) -> Option<&Vec<Record>> {
        match table {
            Table::Teachers => self.teachers.as_ref(),
            Table::Students => self.students.as_ref(),
            Table::HealthRecords => self.health_records.as_ref(),
            Table::Consultations => self.consultations.as_ref(),
        }
    }

    fn take_table(&mut self, table: Table) -> Option<Vec<Record>> {
        match table {
            Table::Teachers => self.teachers.take(),
            Table::Students => self.students.take(),
            Table::HealthRecords => self.health_records.take(),
            Table::Consultations => self.consultations.take(),
        }
    }

    fn set_table(&mut self, table: Table, records: Vec<Record>) {
        let slot = match table {
            Table::Teachers => &mut self.teachers,
            Table::Students => &mut self.students,
            Table::HealthRecords => &mut self.health_records,
            Table::Consultations => &mut self.consultations,
        };
        *slot = Some(records);
    }
}

pub async fn export_snapshot<S: Store + ?Sized>(store: &S) -> Result<Snapshot> {
    let mut snapshot = Snapshot::default();
    for table in Table::ALL {
        snapshot.set_table(table, store.all(table).await?);
    }
    snapshot.exported_at = TimestampFormat::Iso8601.now().as_str().map(str::to_string);

    tracing::info!("📦 exported snapshot from {} store", store.name());
    Ok(snapshot)
}

/// 回傳實際還原的表與筆數
pub async fn restore_snapshot<S: Store + ?Sized>(
    store: &S,
    mut snapshot: Snapshot,
) -> Result<Vec<(Table, usize)>> {
    let mut restored = Vec::new();
    for table in Table::ALL {
        let Some(records) = snapshot.take_table(table) else {
            tracing::debug!("{}: not in snapshot, left as is", table);
            continue;
        };
        let count = records.len();
        store.replace_table(table, records).await?;
        restored.push((table, count));
    }

    tracing::info!("📥 restored {} tables into {} store", restored.len(), store.name());
    Ok(restored)
}

/// 把所有表換回範例資料
pub async fn reset_store<S: Store + ?Sized>(store: &S) -> Result<()> {
    for table in Table::ALL {
        store.replace_table(table, seed::sample_records(table)?).await?;
    }
    tracing::warn!("🧹 {} store reset to sample data", store.name());
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
pub enum TableOutcome {
    Migrated(usize),
    Failed(String),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MigrationReport {
    pub tables: Vec<(Table, TableOutcome)>,
}

impl MigrationReport {
    pub fn total_migrated(&self) -> usize {
        self.tables
            .iter()
            .map(|(_, outcome)| match outcome {
                TableOutcome::Migrated(count) => *count,
                TableOutcome::Failed(_) => 0,
            })
            .sum()
    }

    pub fn is_complete(&self) -> bool {
        self.tables
            .iter()
            .all(|(_, outcome)| matches!(outcome, TableOutcome::Migrated(_)))
    }

    /// `{ "students": 2, "teachers": -1, ... }`，失敗的表記為 -1
    pub fn counts(&self) -> Value {
        let counts: Map<String, Value> = self
            .tables
            .iter()
            .map(|(table, outcome)| {
                let count = match outcome {
                    TableOutcome::Migrated(count) => Value::from(*count),
                    TableOutcome::Failed(_) => Value::from(-1),
                };
                (table.to_string(), count)
            })
            .collect();
        Value::Object(counts)
    }
}

/// 逐表複製，保留 id 與時間戳並加上 `migrated_at`
///
/// 各表互不影響；某張表失敗時其他表照常搬移。目的端的表整張被取代。
pub async fn migrate<F, T>(from: &F, to: &T) -> MigrationReport
where
    F: Store + ?Sized,
    T: Store + ?Sized,
{
    let mut report = MigrationReport::default();
    tracing::info!("🚚 migrating {} store into {} store", from.name(), to.name());

    for table in Table::ALL {
        let outcome = match migrate_table(from, to, table).await {
            Ok(count) => {
                tracing::info!("✅ {}: migrated {} records", table, count);
                TableOutcome::Migrated(count)
            }
            Err(e) => {
                tracing::error!("❌ {}: migration failed: {}", table, e);
                TableOutcome::Failed(e.to_string())
            }
        };
        report.tables.push((table, outcome));
    }

    tracing::info!("🏁 migration finished, {} records", report.total_migrated());
    report
}

async fn migrate_table<F, T>(from: &F, to: &T, table: Table) -> Result<usize>
where
    F: Store + ?Sized,
    T: Store + ?Sized,
{
    let migrated_at = TimestampFormat::Millis.now();
    let records: Vec<Record> = from
        .all(table)
        .await?
        .into_iter()
        .map(|mut record| {
            record.insert("migrated_at", migrated_at.clone());
            record
        })
        .collect();

    let count = records.len();
    to.replace_table(table, records).await?;
    Ok(count)
}
