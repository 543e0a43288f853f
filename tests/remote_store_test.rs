use anyhow::Result;
use health_store::domain::model::FailureScope;
use health_store::{Adapter, DeletePolicy, ListQuery, Record, RemoteStore, Store, Table};
use httpmock::prelude::*;
use httpmock::Method::PATCH;
use serde_json::json;
use std::time::Duration;

const API_KEY: &str = "test-anon-key";
const BEARER: &str = "Bearer test-anon-key";

fn remote_store(server: &MockServer) -> Result<RemoteStore> {
    Ok(RemoteStore::new(&server.base_url(), API_KEY, Duration::from_secs(5))?)
}

#[tokio::test]
async fn test_create_posts_with_auth_headers() -> Result<()> {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/rest/v1/students")
                .header("apikey", API_KEY)
                .header("Authorization", BEARER)
                .header("Prefer", "return=representation")
                .body_contains(r#""name":"Yamada""#);
            then.status(201).json_body(json!([{
                "id": "0b6f6c1e-4c1a-4b7e-9d2a-111111111111",
                "name": "Yamada",
                "grade": 1,
                "class": "A"
            }]));
        })
        .await;

    let adapter = Adapter::new(remote_store(&server)?);
    let response = adapter
        .fetch(
            "tables/students",
            "POST",
            Some(r#"{"name":"Yamada","grade":1,"class":"A"}"#),
        )
        .await?;

    mock.assert_async().await;
    assert_eq!(response.status, 201);
    assert_eq!(
        response.json().await?["id"],
        "0b6f6c1e-4c1a-4b7e-9d2a-111111111111"
    );
    Ok(())
}

#[tokio::test]
async fn test_get_missing_record_is_404() -> Result<()> {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/rest/v1/students")
                .query_param("id", "eq.missing");
            then.status(200).json_body(json!([]));
        })
        .await;

    let adapter = Adapter::new(remote_store(&server)?);
    let response = adapter.fetch("tables/students/missing", "GET", None).await?;

    assert_eq!(response.status, 404);
    assert!(!response.ok);
    Ok(())
}

#[tokio::test]
async fn test_list_reads_total_from_content_range() -> Result<()> {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/rest/v1/teachers")
                .query_param("limit", "2")
                .query_param("offset", "2")
                .query_param("order", "name.desc")
                .header("Prefer", "count=exact");
            then.status(200)
                .header("Content-Range", "2-3/5")
                .json_body(json!([
                    {"id": "t3", "name": "佐藤先生"},
                    {"id": "t4", "name": "田中先生"}
                ]));
        })
        .await;

    let adapter = Adapter::new(remote_store(&server)?);
    let body = adapter
        .fetch("tables/teachers?page=2&limit=2&sort=-name", "GET", None)
        .await?
        .json()
        .await?;

    mock.assert_async().await;
    assert_eq!(body["total"], 5);
    assert_eq!(body["page"], 2);
    assert_eq!(body["data"].as_array().map(Vec::len), Some(2));
    Ok(())
}

#[tokio::test]
async fn test_search_filters_locally() -> Result<()> {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/rest/v1/students")
                .query_param("select", "*");
            then.status(200).json_body(json!([
                {"id": "s1", "name": "Yamada Taro", "grade": 1},
                {"id": "s2", "name": "Suzuki Hanako", "grade": 1}
            ]));
        })
        .await;

    let store = remote_store(&server)?;
    let query = ListQuery {
        search: Some("hanako".to_string()),
        ..Default::default()
    };
    let page = store.list(Table::Students, &query).await?;

    assert_eq!(page.total, 1);
    assert_eq!(page.data[0].id().as_deref(), Some("s2"));
    Ok(())
}

#[tokio::test]
async fn test_put_replaces_and_keeps_created_at() -> Result<()> {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/rest/v1/consultations")
                .query_param("id", "eq.c1");
            then.status(200).json_body(json!([{
                "id": "c1",
                "status": "新規",
                "consultation_content": "友だちのこと",
                "created_at": "2026-04-01T00:00:00.000Z"
            }]));
        })
        .await;
    let put = server
        .mock_async(|when, then| {
            when.method(PUT)
                .path("/rest/v1/consultations")
                .query_param("id", "eq.c1")
                .header("Prefer", "return=representation")
                .body_contains(r#""created_at":"2026-04-01T00:00:00.000Z""#)
                .body_contains(r#""id":"c1""#)
                .body_contains(r#""status":"解決済み""#);
            then.status(200).json_body(json!([{
                "id": "c1",
                "status": "解決済み",
                "created_at": "2026-04-01T00:00:00.000Z",
                "updated_at": "2026-04-02T00:00:00.000Z"
            }]));
        })
        .await;

    let adapter = Adapter::new(remote_store(&server)?);
    let response = adapter
        .fetch("tables/consultations/c1", "PUT", Some(r#"{"status":"解決済み"}"#))
        .await?;

    put.assert_async().await;
    assert_eq!(response.status, 200);
    let body = response.json().await?;
    assert_eq!(body["created_at"], "2026-04-01T00:00:00.000Z");
    assert!(body.get("consultation_content").is_none());
    Ok(())
}

#[tokio::test]
async fn test_put_of_missing_record_is_404_without_writing() -> Result<()> {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/rest/v1/students")
                .query_param("id", "eq.nope");
            then.status(200).json_body(json!([]));
        })
        .await;
    let put = server
        .mock_async(|when, then| {
            when.method(PUT).path("/rest/v1/students");
            then.status(200).json_body(json!([]));
        })
        .await;

    let adapter = Adapter::new(remote_store(&server)?);
    let response = adapter
        .fetch("tables/students/nope", "PUT", Some(r#"{"name":"x"}"#))
        .await?;

    assert_eq!(response.status, 404);
    assert_eq!(put.hits_async().await, 0);
    Ok(())
}

#[tokio::test]
async fn test_patch_merges_through_id_filter() -> Result<()> {
    let server = MockServer::start_async().await;
    let patch = server
        .mock_async(|when, then| {
            when.method(PATCH)
                .path("/rest/v1/consultations")
                .query_param("id", "eq.c1")
                .header("Prefer", "return=representation")
                .body_contains(r#""status":"対応中""#)
                .body_contains(r#""updated_at":"#);
            then.status(200).json_body(json!([{
                "id": "c1",
                "status": "対応中",
                "consultation_content": "友だちのこと",
                "created_at": "2026-04-01T00:00:00.000Z"
            }]));
        })
        .await;

    let adapter = Adapter::new(remote_store(&server)?);
    let body = adapter
        .fetch("tables/consultations/c1", "PATCH", Some(r#"{"status":"対応中"}"#))
        .await?
        .json()
        .await?;

    patch.assert_async().await;
    assert_eq!(body["status"], "対応中");
    assert_eq!(body["consultation_content"], "友だちのこと");
    assert_eq!(body["created_at"], "2026-04-01T00:00:00.000Z");
    Ok(())
}

#[tokio::test]
async fn test_reserved_characters_in_id_are_quoted() -> Result<()> {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/rest/v1/students")
                .query_param("id", r#"eq."a,b(c)""#);
            then.status(200)
                .json_body(json!([{"id": "a,b(c)", "name": "Yamada"}]));
        })
        .await;

    let adapter = Adapter::new(remote_store(&server)?);
    let response = adapter
        .fetch("tables/students/a%2Cb%28c%29", "GET", None)
        .await?;

    mock.assert_async().await;
    assert_eq!(response.status, 200);
    assert_eq!(response.json().await?["id"], "a,b(c)");
    Ok(())
}

#[tokio::test]
async fn test_soft_delete_patches_flag() -> Result<()> {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(PATCH)
                .path("/rest/v1/consultations")
                .query_param("id", "eq.c1")
                .body_contains(r#""deleted":true"#);
            then.status(200)
                .json_body(json!([{"id": "c1", "deleted": true}]));
        })
        .await;

    let adapter = Adapter::new(remote_store(&server)?);
    assert_eq!(adapter.store().delete_policy(), DeletePolicy::Soft);

    let response = adapter
        .fetch("tables/consultations/c1", "DELETE", None)
        .await?;

    mock.assert_async().await;
    assert_eq!(response.status, 204);
    Ok(())
}

#[tokio::test]
async fn test_hard_delete_of_missing_record_is_404() -> Result<()> {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(DELETE)
                .path("/rest/v1/students")
                .query_param("id", "eq.ghost");
            then.status(200).json_body(json!([]));
        })
        .await;

    let adapter =
        Adapter::new(remote_store(&server)?.with_delete_policy(DeletePolicy::Hard));
    let response = adapter.fetch("tables/students/ghost", "DELETE", None).await?;

    assert_eq!(response.status, 404);
    Ok(())
}

#[tokio::test]
async fn test_conflict_and_outage_map_to_500() -> Result<()> {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/rest/v1/students");
            then.status(409)
                .json_body(json!({"message": "duplicate key value violates unique constraint"}));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/rest/v1/teachers");
            then.status(503);
        })
        .await;

    let adapter = Adapter::new(remote_store(&server)?);

    let conflict = adapter
        .fetch("tables/students", "POST", Some(r#"{"id":"s1","name":"dup"}"#))
        .await?;
    assert_eq!(conflict.status, 500);
    assert_eq!(conflict.json().await?["error"], "backend error");

    let outage = adapter.fetch("tables/teachers", "GET", None).await?;
    assert_eq!(outage.status, 500);
    assert!(!outage.ok);
    Ok(())
}

#[tokio::test]
async fn test_batch_create_fails_whole_chunk() -> Result<()> {
    let server = MockServer::start_async().await;
    let accepted = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/rest/v1/students")
                .body_contains("ok-");
            then.status(201).json_body(json!([]));
        })
        .await;
    let rejected = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/rest/v1/students")
                .body_contains("bad-");
            then.status(500).body("commit failed");
        })
        .await;

    let names = ["ok-0", "ok-1", "bad-2", "bad-3", "ok-4"];
    let records: Vec<Record> = names
        .iter()
        .map(|name| Record::from_value(json!({ "name": name })))
        .collect::<health_store::Result<_>>()?;

    let store = remote_store(&server)?;
    let result = store.batch_create(Table::Students, records, 2).await;

    assert_eq!(accepted.hits_async().await, 2);
    assert_eq!(rejected.hits_async().await, 1);
    assert_eq!(result.chunks, 3);
    assert_eq!(result.success_count, 3);
    assert_eq!(result.failed_count, 2);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].scope, FailureScope::Chunk { start: 2, end: 4 });
    Ok(())
}

#[tokio::test]
async fn test_health_check() -> Result<()> {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/rest/v1/students")
                .query_param("select", "id")
                .query_param("limit", "1");
            then.status(200).json_body(json!([]));
        })
        .await;

    remote_store(&server)?.health_check().await?;
    mock.assert_async().await;
    Ok(())
}
