use std::sync::Arc;

use anyhow::Result;
use serde_json::{json, Value};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

use sena_geo::app::ports::{AccountPort, DatabasePort, StoragePort};
use sena_geo::config::Config;
use sena_geo::domain::FileUpload;
use sena_geo::infra::AppwriteBackend;
use sena_geo::{GatewayError, RemoteGateway};

const SESSION_COOKIE: &str = "a_session_local=abc123";

fn config_for(server: &MockServer) -> Config {
    let mut config = Config::default();
    config.backend.endpoint = format!("{}/v1", server.uri());
    config.backend.project_id = "local-project".to_string();
    config.collections.database_id = "db".to_string();
    config.collections.restaurant_collection_id = "restaurants".to_string();
    config
}

fn header_of<'a>(request: &'a Request, name: &str) -> Option<&'a str> {
    request.headers.get(name).and_then(|v| v.to_str().ok())
}

fn query_values(request: &Request, key: &str) -> Vec<Value> {
    request
        .url
        .query_pairs()
        .filter(|(k, _)| k == key)
        .map(|(_, v)| serde_json::from_str(&v).unwrap())
        .collect()
}

fn restaurant_json(id: &str) -> Value {
    json!({
        "$id": id,
        "$collectionId": "restaurants",
        "$databaseId": "db",
        "$createdAt": "2024-09-10T12:00:00.000+00:00",
        "$updatedAt": "2024-09-10T12:00:00.000+00:00",
        "$permissions": [],
        "restaurantId": id,
        "name": "El Faro",
        "direction": "Paseo Maritimo 1",
        "menu": "Seafood",
        "type": "Mediterranean",
        "image": null,
        "creator": "user-1"
    })
}

#[tokio::test]
async fn test_large_upload_is_sent_in_chunks() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/storage/buckets/bucket-1/files"))
        .and(header("x-appwrite-project", "local-project"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "$id": "file-1",
            "bucketId": "bucket-1",
            "name": "menu.png",
            "mimeType": "image/png",
            "sizeOriginal": 10
        })))
        .expect(3)
        .mount(&server)
        .await;

    let backend = AppwriteBackend::new(&config_for(&server))?.with_chunk_size(4);
    let file = FileUpload::new("menu.png", "image/png", (0u8..10).collect());
    let stored = backend.create_file("bucket-1", "file-1", file).await?;
    assert_eq!(stored.id, "file-1");
    assert_eq!(stored.size_original, 10);

    let requests = server.received_requests().await.unwrap();
    let ranges: Vec<&str> = requests
        .iter()
        .filter_map(|r| header_of(r, "content-range"))
        .collect();
    assert_eq!(ranges, vec!["bytes 0-3/10", "bytes 4-7/10", "bytes 8-9/10"]);

    let ids: Vec<Option<&str>> = requests.iter().map(|r| header_of(r, "x-appwrite-id")).collect();
    assert_eq!(ids, vec![None, Some("file-1"), Some("file-1")]);
    Ok(())
}

#[tokio::test]
async fn test_small_upload_is_a_single_request() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/storage/buckets/bucket-1/files"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "$id": "file-2",
            "bucketId": "bucket-1",
            "name": "logo.svg",
            "mimeType": "image/svg+xml"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let backend = AppwriteBackend::new(&config_for(&server))?;
    let file = FileUpload::new("logo.svg", "image/svg+xml", b"<svg/>".to_vec());
    backend.create_file("bucket-1", "file-2", file).await?;

    let requests = server.received_requests().await.unwrap();
    assert!(header_of(&requests[0], "content-range").is_none());
    let body = String::from_utf8_lossy(&requests[0].body);
    assert!(body.contains("name=\"fileId\""));
    assert!(body.contains("image/svg+xml"));
    Ok(())
}

#[tokio::test]
async fn test_session_cookie_is_replayed_until_sign_out() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/account/sessions/email"))
        .respond_with(
            ResponseTemplate::new(201)
                .insert_header("X-Fallback-Cookies", SESSION_COOKIE)
                .set_body_json(json!({ "$id": "session-1", "userId": "acc-1", "current": true })),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/account"))
        .and(header("x-fallback-cookies", SESSION_COOKIE))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "$id": "acc-1",
            "email": "lucia@example.com",
            "name": "Lucia"
        })))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/v1/account/sessions/current"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let backend = AppwriteBackend::new(&config_for(&server))?;
    let session = backend.create_email_session("lucia@example.com", "s3cretpass").await?;
    assert!(session.current);

    let account = backend.get_account().await?;
    assert_eq!(account.id, "acc-1");

    backend.delete_session("current").await?;
    assert!(matches!(backend.get_account().await, Err(GatewayError::NotFound(_))));

    let requests = server.received_requests().await.unwrap();
    let last = requests.last().unwrap();
    assert_eq!(last.url.path(), "/v1/account");
    assert!(header_of(last, "x-fallback-cookies").is_none());
    Ok(())
}

#[tokio::test]
async fn test_list_sends_each_query_as_its_own_parameter() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/databases/db/collections/restaurants/documents"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "total": 1,
            "documents": [restaurant_json("r1")]
        })))
        .mount(&server)
        .await;

    let config = config_for(&server);
    let backend = Arc::new(AppwriteBackend::new(&config)?);
    let gateway = RemoteGateway::from_backend(backend, config.collections.clone());

    let latest = gateway.get_latest_restaurants().await?;
    assert_eq!(latest.len(), 1);
    assert_eq!(latest[0].data.kind, "Mediterranean");

    let requests = server.received_requests().await.unwrap();
    let queries = query_values(&requests[0], "queries[]");
    assert_eq!(
        queries,
        vec![
            json!({ "method": "orderDesc", "attribute": "$createdAt" }),
            json!({ "method": "limit", "values": [7] }),
        ]
    );
    Ok(())
}

#[tokio::test]
async fn test_error_responses_keep_their_kind_and_message() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/databases/db/collections/restaurants/documents/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "message": "Document with the requested ID could not be found.",
            "code": 404,
            "type": "document_not_found"
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/account/sessions/email"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "message": "Invalid credentials. Please check the email and password.",
            "code": 401,
            "type": "user_invalid_credentials"
        })))
        .mount(&server)
        .await;

    let backend = AppwriteBackend::new(&config_for(&server))?;

    match backend.get_document("restaurants", "missing").await {
        Err(GatewayError::NotFound(message)) => {
            assert_eq!(message, "Document with the requested ID could not be found.")
        }
        other => panic!("unexpected result: {:?}", other),
    }
    match backend.create_email_session("lucia@example.com", "wrong").await {
        Err(GatewayError::AuthFailure(message)) => assert!(message.starts_with("Invalid credentials")),
        other => panic!("unexpected result: {:?}", other),
    }
    Ok(())
}
