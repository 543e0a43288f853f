use anyhow::Result;
use health_store::adapters::substrate::MemorySubstrate;
use health_store::core::snapshot::{
    export_snapshot, migrate, reset_store, restore_snapshot, Snapshot, TableOutcome,
};
use health_store::{LocalStore, Record, RemoteStore, Store, Table};
use httpmock::prelude::*;
use serde_json::json;
use std::time::Duration;

fn health_record() -> Result<Record> {
    Ok(Record::from_value(json!({
        "student_id": "student_001",
        "date": "2026-06-01",
        "mood": "good",
        "stress_level": 1,
        "symptoms": []
    }))?)
}

#[tokio::test]
async fn test_export_then_restore_into_empty_store() -> Result<()> {
    let source = LocalStore::new(MemorySubstrate::new());
    source.seed_defaults().await?;
    source.create(Table::HealthRecords, health_record()?).await?;

    let snapshot = export_snapshot(&source).await?;
    assert!(snapshot.exported_at.is_some());
    assert_eq!(snapshot.table(Table::Students).map(Vec::len), Some(2));

    let text = serde_json::to_string(&snapshot)?;
    let target = LocalStore::new(MemorySubstrate::new());
    let restored = restore_snapshot(&target, Snapshot::from_json_str(&text)?).await?;

    assert_eq!(restored.len(), 4);
    for table in Table::ALL {
        assert_eq!(target.all(table).await?, source.all(table).await?);
    }
    Ok(())
}

#[tokio::test]
async fn test_restore_leaves_absent_tables_untouched() -> Result<()> {
    let store = LocalStore::new(MemorySubstrate::new());
    store.seed_defaults().await?;

    let snapshot = Snapshot::from_json_str(
        r#"{"students": [{"id": "S900", "name": "転入生", "grade": 4, "class": "D組"}]}"#,
    )?;
    let restored = restore_snapshot(&store, snapshot).await?;

    assert_eq!(restored, vec![(Table::Students, 1)]);
    let students = store.all(Table::Students).await?;
    assert_eq!(students.len(), 1);
    assert_eq!(students[0].id().as_deref(), Some("S900"));
    assert_eq!(store.all(Table::Teachers).await?.len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_reset_store_restores_sample_data() -> Result<()> {
    let store = LocalStore::new(MemorySubstrate::new());
    store
        .create(Table::Students, Record::from_value(json!({"name": "temp"}))?)
        .await?;

    reset_store(&store).await?;

    let students = store.all(Table::Students).await?;
    assert_eq!(students.len(), 2);
    assert!(store.get(Table::Teachers, "teacher_002").await.is_ok());
    assert!(store.all(Table::Consultations).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_migrate_between_local_stores_keeps_ids() -> Result<()> {
    let source = LocalStore::new(MemorySubstrate::new());
    source.seed_defaults().await?;
    let target = LocalStore::new(MemorySubstrate::new()).with_key_prefix("migrated_");

    let report = migrate(&source, &target).await;

    assert!(report.is_complete());
    assert_eq!(report.total_migrated(), 4);
    assert_eq!(
        report.counts(),
        json!({"students": 2, "teachers": 2, "health_records": 0, "consultations": 0})
    );

    let copied = target.get(Table::Students, "student_001").await?;
    assert!(copied.get("migrated_at").is_some());
    assert_eq!(
        copied.get("created_at"),
        source.get(Table::Students, "student_001").await?.get("created_at")
    );
    Ok(())
}

#[tokio::test]
async fn test_migrate_to_remote_reports_failed_tables() -> Result<()> {
    let server = MockServer::start_async().await;
    let cleared = server
        .mock_async(|when, then| {
            when.method(DELETE).query_param("id", "not.is.null");
            then.status(204);
        })
        .await;
    let teachers = server
        .mock_async(|when, then| {
            when.method(POST).path("/rest/v1/teachers");
            then.status(503).body("maintenance");
        })
        .await;
    let others = server
        .mock_async(|when, then| {
            when.method(POST).path("/rest/v1/students");
            then.status(201).json_body(json!([]));
        })
        .await;

    let source = LocalStore::new(MemorySubstrate::new());
    source.seed_defaults().await?;
    let target = RemoteStore::new(&server.base_url(), "key", Duration::from_secs(5))?;

    let report = migrate(&source, &target).await;

    assert_eq!(cleared.hits_async().await, 4);
    assert_eq!(teachers.hits_async().await, 1);
    assert_eq!(others.hits_async().await, 1);
    assert!(!report.is_complete());
    assert_eq!(report.total_migrated(), 2);
    assert!(matches!(
        report.tables.iter().find(|(t, _)| *t == Table::Teachers),
        Some((_, TableOutcome::Failed(_)))
    ));
    assert_eq!(report.counts()["teachers"], -1);
    Ok(())
}
