use crate::domain::entities::{Student, Teacher};
use crate::domain::model::{BatchResult, Record, Table};
use crate::domain::ports::Store;
use crate::utils::error::{Result, StoreError};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Excel 以 UTF-8 開啟時需要
pub const BOM: &str = "\u{FEFF}";

pub const STUDENT_HEADERS: [&str; 4] = ["学籍番号", "氏名", "学年", "クラス"];

pub const TEACHER_HEADERS: [&str; 9] = [
    "教員名",
    "担当学年",
    "担当クラス",
    "担当教科",
    "役職",
    "メールアドレス",
    "電話番号",
    "備考",
    "登録日",
];

pub const CONSULTATION_REPORT_HEADERS: [&str; 11] = [
    "日時",
    "児童名",
    "学年",
    "クラス",
    "相談先教員",
    "相談内容",
    "ステータス",
    "教員からの返答",
    "気分",
    "ストレスレベル",
    "症状",
];

const UNKNOWN: &str = "不明";
const DEFAULT_SUBJECT: &str = "担当教科未設定";
const JST_OFFSET_SECONDS: i32 = 9 * 3600;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum ExportKind {
    Students,
    Teachers,
    Consultations,
}

impl fmt::Display for ExportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExportKind::Students => "students",
            ExportKind::Teachers => "teachers",
            ExportKind::Consultations => "consultations",
        };
        f.write_str(name)
    }
}

impl FromStr for ExportKind {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "students" => Ok(ExportKind::Students),
            "teachers" => Ok(ExportKind::Teachers),
            "consultations" => Ok(ExportKind::Consultations),
            other => Err(StoreError::bad_request(format!(
                "Unknown export kind: {}",
                other
            ))),
        }
    }
}

/// 解析後可匯入的紀錄，以及因欄位不足而略過的列數
#[derive(Debug, Clone, Default)]
pub struct CsvImport {
    pub records: Vec<Record>,
    pub skipped: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportSummary {
    #[serde(flatten)]
    pub batch: BatchResult,
    pub skipped: usize,
}

// ---------------------------------------------------------------------------
// 讀寫
// ---------------------------------------------------------------------------

/// 寫出含 BOM 的 CSV，只有含逗號、引號或換行的欄位才加引號
pub fn write_csv<I>(headers: &[&str], rows: I) -> Result<String>
where
    I: IntoIterator<Item = Vec<String>>,
{
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .quote_style(csv::QuoteStyle::Necessary)
        .from_writer(Vec::new());

    writer.write_record(headers)?;
    for row in rows {
        writer.write_record(&row)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| StoreError::IoError(e.into_error()))?;
    let body = String::from_utf8(bytes)
        .map_err(|e| StoreError::bad_request(format!("CSV output is not UTF-8: {}", e)))?;
    Ok(format!("{}{}", BOM, body))
}

/// 讀取資料列（不含標題列）；空白列略過，各欄去除前後空白
pub fn read_rows(text: &str) -> Result<Vec<Vec<String>>> {
    let text = text.strip_prefix(BOM).unwrap_or(text);
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let mut rows = Vec::new();
    for result in reader.records() {
        let row = result?;
        if row.iter().all(str::is_empty) {
            continue;
        }
        rows.push(row.iter().map(str::to_string).collect());
    }
    Ok(rows)
}

// ---------------------------------------------------------------------------
// 匯入
// ---------------------------------------------------------------------------

/// `学籍番号,氏名,学年,クラス`
pub fn parse_students_csv(text: &str) -> Result<CsvImport> {
    let mut import = CsvImport::default();

    for (index, row) in read_rows(text)?.into_iter().enumerate() {
        // 標題列是第 1 行
        let line = index + 2;
        if row.len() < STUDENT_HEADERS.len() {
            tracing::warn!("⚠️ students.csv line {}: only {} columns, skipped", line, row.len());
            import.skipped += 1;
            continue;
        }
        let Some(grade) = parse_leading_int(&row[2]) else {
            tracing::warn!("⚠️ students.csv line {}: invalid grade {:?}, skipped", line, row[2]);
            import.skipped += 1;
            continue;
        };

        let student = Student {
            id: Some(row[0].clone()).filter(|id| !id.is_empty()),
            name: row[1].clone(),
            grade,
            class: row[3].clone(),
            active: true,
            created_at: None,
        };
        import.records.push(Record::from_entity(&student)?);
    }

    tracing::info!(
        "📄 students.csv: {} rows parsed, {} skipped",
        import.records.len(),
        import.skipped
    );
    Ok(import)
}

/// `教員名,担当学年,担当クラス,担当教科,役職,メールアドレス,電話番号,備考`
pub fn parse_teachers_csv(text: &str) -> Result<CsvImport> {
    let mut import = CsvImport::default();

    for (index, row) in read_rows(text)?.into_iter().enumerate() {
        let column = |i: usize| row.get(i).cloned().unwrap_or_default();
        let name = column(0);
        if name.is_empty() {
            tracing::warn!("⚠️ teachers.csv line {}: missing name, skipped", index + 2);
            import.skipped += 1;
            continue;
        }

        let subject = Some(column(3))
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_SUBJECT.to_string());
        let teacher = Teacher {
            id: None,
            name,
            subject,
            grade: Some(column(1)),
            class: Some(column(2)),
            position: Some(column(4)),
            email: Some(column(5)),
            phone: Some(column(6)),
            notes: Some(column(7)),
            active: true,
            created_at: None,
        };
        import.records.push(Record::from_entity(&teacher)?);
    }

    tracing::info!(
        "📄 teachers.csv: {} rows parsed, {} skipped",
        import.records.len(),
        import.skipped
    );
    Ok(import)
}

/// 解析 CSV 後經由 `batch_create` 寫入；只支援 students 與 teachers
pub async fn import_csv<S: Store + ?Sized>(
    store: &S,
    table: Table,
    text: &str,
    chunk_size: usize,
) -> Result<ImportSummary> {
    let import = match table {
        Table::Students => parse_students_csv(text)?,
        Table::Teachers => parse_teachers_csv(text)?,
        other => {
            return Err(StoreError::bad_request(format!(
                "CSV import is not available for {}",
                other
            )))
        }
    };

    let batch = store.batch_create(table, import.records, chunk_size).await;
    Ok(ImportSummary {
        batch,
        skipped: import.skipped,
    })
}

// ---------------------------------------------------------------------------
// 匯出
// ---------------------------------------------------------------------------

/// 只輸出在籍學生，依學年再依班級排序
pub fn students_to_csv(students: &[Record]) -> Result<String> {
    let mut active: Vec<&Record> = students
        .iter()
        .filter(|s| !s.is_deleted() && is_active(s))
        .collect();
    active.sort_by(|a, b| {
        grade_of(a)
            .cmp(&grade_of(b))
            .then_with(|| field_text(a, "class").cmp(&field_text(b, "class")))
    });

    write_csv(
        &STUDENT_HEADERS,
        active.into_iter().map(|s| {
            vec![
                field_text(s, "id"),
                field_text(s, "name"),
                field_text(s, "grade"),
                field_text(s, "class"),
            ]
        }),
    )
}

pub fn teachers_to_csv(teachers: &[Record]) -> Result<String> {
    write_csv(
        &TEACHER_HEADERS,
        teachers.iter().filter(|t| !t.is_deleted()).map(|t| {
            vec![
                field_text(t, "name"),
                field_text(t, "grade"),
                field_text(t, "class"),
                field_text(t, "subject"),
                field_text(t, "position"),
                field_text(t, "email"),
                field_text(t, "phone"),
                field_text(t, "notes"),
                t.get("created_at")
                    .and_then(parse_timestamp)
                    .map(|ts| format_jst(ts, "%Y/%-m/%-d"))
                    .unwrap_or_default(),
            ]
        }),
    )
}

/// 每筆諮詢一列，併入學生、教師與同一天的健康紀錄
pub fn consultation_report_csv(
    consultations: &[Record],
    students: &[Record],
    teachers: &[Record],
    health_records: &[Record],
) -> Result<String> {
    let students = index_by_id(students);
    let teachers = index_by_id(teachers);

    let rows = consultations
        .iter()
        .filter(|c| !c.is_deleted())
        .map(|consultation| {
            let student_id = field_text(consultation, "student_id");
            let student = students.get(student_id.as_str());
            let teacher = teachers.get(field_text(consultation, "teacher_id").as_str());

            let date = consultation.get("date").and_then(parse_timestamp);
            let health = date.and_then(|date| {
                health_records.iter().find(|hr| {
                    field_text(hr, "student_id") == student_id
                        && hr
                            .get("date")
                            .and_then(parse_timestamp)
                            .is_some_and(|d| d.date_naive() == date.date_naive())
                })
            });

            vec![
                date.map(|d| format_jst(d, "%Y/%-m/%-d %-H:%M:%S"))
                    .unwrap_or_else(|| field_text(consultation, "date")),
                student
                    .map(|s| field_text(s, "name"))
                    .unwrap_or_else(|| UNKNOWN.to_string()),
                student
                    .map(|s| format!("{}年生", field_text(s, "grade")))
                    .unwrap_or_default(),
                student.map(|s| field_text(s, "class")).unwrap_or_default(),
                teacher
                    .map(|t| field_text(t, "name"))
                    .unwrap_or_else(|| UNKNOWN.to_string()),
                field_text(consultation, "consultation_content"),
                field_text(consultation, "status"),
                field_text(consultation, "teacher_response"),
                health.map(|h| field_text(h, "mood")).unwrap_or_default(),
                health
                    .map(|h| field_text(h, "stress_level"))
                    .unwrap_or_default(),
                health.map(symptoms_text).unwrap_or_default(),
            ]
        });

    write_csv(&CONSULTATION_REPORT_HEADERS, rows)
}

pub async fn export_csv<S: Store + ?Sized>(store: &S, kind: ExportKind) -> Result<String> {
    let csv = match kind {
        ExportKind::Students => students_to_csv(&store.all(Table::Students).await?)?,
        ExportKind::Teachers => teachers_to_csv(&store.all(Table::Teachers).await?)?,
        ExportKind::Consultations => consultation_report_csv(
            &store.all(Table::Consultations).await?,
            &store.all(Table::Students).await?,
            &store.all(Table::Teachers).await?,
            &store.all(Table::HealthRecords).await?,
        )?,
    };
    tracing::info!("📤 exported {} CSV ({} bytes)", kind, csv.len());
    Ok(csv)
}

// ---------------------------------------------------------------------------
// 欄位轉換
// ---------------------------------------------------------------------------

fn field_text(record: &Record, field: &str) -> String {
    match record.get(field) {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn symptoms_text(record: &Record) -> String {
    match record.get("symptoms") {
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join(", "),
        _ => field_text(record, "symptoms"),
    }
}

/// 沒有 `active` 欄位時視為在籍
fn is_active(record: &Record) -> bool {
    !matches!(record.get("active"), Some(Value::Bool(false)))
}

/// 無法判讀的學年排在最後
fn grade_of(record: &Record) -> i64 {
    match record.get("grade") {
        Some(Value::Number(n)) => n.as_i64().unwrap_or(i64::MAX),
        Some(Value::String(s)) => parse_leading_int(s).unwrap_or(i64::MAX),
        _ => i64::MAX,
    }
}

fn index_by_id(records: &[Record]) -> HashMap<String, &Record> {
    records
        .iter()
        .filter_map(|r| r.id().map(|id| (id, r)))
        .collect()
}

/// `"1年"` 取出 1；開頭不是數字時回傳 None
fn parse_leading_int(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    let sign_len = usize::from(raw.starts_with(|c| c == '-' || c == '+'));
    let digits = raw[sign_len..]
        .chars()
        .take_while(char::is_ascii_digit)
        .count();
    if digits == 0 {
        return None;
    }
    raw[..sign_len + digits].parse().ok()
}

/// 接受 RFC 3339、`YYYY-MM-DD`、無時區的日期時間（視為 UTC）以及 epoch 毫秒
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => Utc.timestamp_millis_opt(n.as_i64()?).single(),
        Value::String(s) => {
            let s = s.trim();
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Some(dt.with_timezone(&Utc));
            }
            if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
                return Some(Utc.from_utc_datetime(&naive));
            }
            let date = NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()?;
            Some(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?))
        }
        _ => None,
    }
}

fn format_jst(ts: DateTime<Utc>, pattern: &str) -> String {
    match FixedOffset::east_opt(JST_OFFSET_SECONDS) {
        Some(jst) => ts.with_timezone(&jst).format(pattern).to_string(),
        None => ts.format(pattern).to_string(),
    }
}
