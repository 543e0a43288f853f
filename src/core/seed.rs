use crate::domain::entities::{Student, Teacher};
use crate::domain::model::{Record, Table};
use crate::utils::error::Result;

/// 初次啟動時寫入的範例資料；`health_records` 與 `consultations` 為空表
pub fn sample_records(table: Table) -> Result<Vec<Record>> {
    match table {
        Table::Teachers => [
            sample_teacher("teacher_001", "田中先生", "1年", "A組"),
            sample_teacher("teacher_002", "佐藤先生", "2年", "B組"),
        ]
        .iter()
        .map(Record::from_entity)
        .collect(),
        Table::Students => [
            sample_student("student_001", "山田太郎"),
            sample_student("student_002", "鈴木花子"),
        ]
        .iter()
        .map(Record::from_entity)
        .collect(),
        Table::HealthRecords | Table::Consultations => Ok(Vec::new()),
    }
}

fn sample_teacher(id: &str, name: &str, grade: &str, class: &str) -> Teacher {
    Teacher {
        id: Some(id.to_string()),
        name: name.to_string(),
        subject: format!("{}担任", grade),
        grade: Some(grade.to_string()),
        class: Some(class.to_string()),
        position: Some("担任".to_string()),
        email: None,
        phone: None,
        notes: None,
        active: true,
        created_at: None,
    }
}

fn sample_student(id: &str, name: &str) -> Student {
    Student {
        id: Some(id.to_string()),
        name: name.to_string(),
        grade: 1,
        class: "A組".to_string(),
        active: true,
        created_at: None,
    }
}
