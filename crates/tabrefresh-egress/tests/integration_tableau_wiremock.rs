//! Integration tests for the Tableau connector using wiremock
//!
//! These tests mock the Tableau REST API to verify the connector's HTTP behavior.

use tabrefresh_core::{
    Error, SiteApi,
    types::{PatCredentials, Session},
};
use tabrefresh_egress::tableau::{TableauConfig, TableauConnector};
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_json, header, method, path, query_param},
};

fn connector() -> TableauConnector {
    TableauConnector::new(TableauConfig::default()).unwrap()
}

fn session(server: &MockServer) -> Session {
    Session::new(&server.uri(), "site-123", "auth-token")
}

fn workbook(id: &str, name: &str) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "name": name,
        "project": {"id": "p1", "name": "Finance"},
        "owner": {"id": "u1", "name": "analyst"},
        "createdAt": "2024-01-01T00:00:00Z",
        "updatedAt": "2024-03-01T00:00:00Z"
    })
}

fn page(items: Vec<serde_json::Value>, page_number: u32, total: u64) -> serde_json::Value {
    serde_json::json!({
        "pagination": {
            "pageNumber": page_number.to_string(),
            "pageSize": "100",
            "totalAvailable": total.to_string()
        },
        "workbooks": {"workbook": items}
    })
}

#[tokio::test]
async fn test_sign_in_success() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/3.17/auth/signin"))
        .and(body_json(serde_json::json!({
            "credentials": {
                "personalAccessTokenName": "my-pat",
                "personalAccessTokenSecret": "s3cret",
                "site": {"contentUrl": "finance"}
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "credentials": {
                "site": {"id": "site-abc", "contentUrl": "finance"},
                "user": {"id": "user-1"},
                "token": "session-token"
            }
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let credentials = PatCredentials::new("my-pat", "s3cret", "finance");
    // Trailing slash must not produce "//api"
    let server_url = format!("{}/", mock_server.uri());
    let outcome = connector().sign_in(&server_url, &credentials).await.unwrap();

    assert_eq!(outcome.token, "session-token");
    assert_eq!(outcome.site_id, "site-abc");
}

#[tokio::test]
async fn test_sign_in_upstream_failure() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/3.17/auth/signin"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Signin Error"))
        .mount(&mock_server)
        .await;

    let credentials = PatCredentials::new("my-pat", "wrong", "");
    let err = connector()
        .sign_in(&mock_server.uri(), &credentials)
        .await
        .unwrap_err();

    match err {
        Error::Upstream { status, body } => {
            assert_eq!(status, 401);
            assert_eq!(body, "Signin Error");
        }
        other => panic!("expected upstream error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_sign_in_missing_token_is_protocol_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/3.17/auth/signin"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"credentials": {}})),
        )
        .mount(&mock_server)
        .await;

    let credentials = PatCredentials::new("pat", "secret", "");
    let err = connector()
        .sign_in(&mock_server.uri(), &credentials)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Protocol(_)));
}

#[tokio::test]
async fn test_sign_in_connection_refused() {
    let credentials = PatCredentials::new("pat", "secret", "");
    let err = connector()
        .sign_in("http://127.0.0.1:1", &credentials)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Connection(_)));
    assert_eq!(err.status_code(), 500);
    assert!(!err.to_string().contains("secret"));
}

#[tokio::test]
async fn test_list_workbooks_follows_pagination() {
    let mock_server = MockServer::start().await;
    let first: Vec<_> = (0..100).map(|i| workbook(&format!("a{}", i), &format!("wb {}", i))).collect();
    let second: Vec<_> = (100..150).map(|i| workbook(&format!("a{}", i), &format!("wb {}", i))).collect();

    Mock::given(method("GET"))
        .and(path("/api/3.17/sites/site-123/workbooks"))
        .and(header("X-Tableau-Auth", "auth-token"))
        .and(query_param("pageSize", "100"))
        .and(query_param("pageNumber", "1"))
        .and(query_param("fields", "id,name,createdAt,updatedAt,project,owner"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(first, 1, 150)))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/3.17/sites/site-123/workbooks"))
        .and(query_param("pageNumber", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(second, 2, 150)))
        .expect(1)
        .mount(&mock_server)
        .await;

    // Count reached the total: no third request
    Mock::given(method("GET"))
        .and(path("/api/3.17/sites/site-123/workbooks"))
        .and(query_param("pageNumber", "3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(vec![], 3, 150)))
        .expect(0)
        .mount(&mock_server)
        .await;

    let listing = connector().list_workbooks(&session(&mock_server)).await.unwrap();

    assert_eq!(listing.workbooks.len(), 150);
    assert_eq!(listing.total_available, 150);
    assert!(listing.complete);
    assert_eq!(listing.workbooks[0].id, "a0");
    assert_eq!(listing.workbooks[149].id, "a149");
    assert_eq!(listing.workbooks[0].project, "Finance");
}

#[tokio::test]
async fn test_list_workbooks_stops_on_empty_page() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/3.17/sites/site-123/workbooks"))
        .and(query_param("pageNumber", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(
            vec![workbook("1", "one"), workbook("2", "two")],
            1,
            5,
        )))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/3.17/sites/site-123/workbooks"))
        .and(query_param("pageNumber", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(vec![], 2, 5)))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/3.17/sites/site-123/workbooks"))
        .and(query_param("pageNumber", "3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(vec![], 3, 5)))
        .expect(0)
        .mount(&mock_server)
        .await;

    let listing = connector().list_workbooks(&session(&mock_server)).await.unwrap();

    assert_eq!(listing.workbooks.len(), 2);
    assert!(!listing.complete);
    assert!(listing.warning().is_some());
}

#[tokio::test]
async fn test_list_workbooks_empty_site() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/3.17/sites/site-123/workbooks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "pagination": {"pageNumber": "1", "pageSize": "100", "totalAvailable": "0"},
            "workbooks": {}
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let listing = connector().list_workbooks(&session(&mock_server)).await.unwrap();
    assert!(listing.workbooks.is_empty());
    assert!(listing.complete);
}

#[tokio::test]
async fn test_list_workbooks_page_failure_aborts() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/3.17/sites/site-123/workbooks"))
        .and(query_param("pageNumber", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(vec![workbook("1", "one")], 1, 2)))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/3.17/sites/site-123/workbooks"))
        .and(query_param("pageNumber", "2"))
        .respond_with(ResponseTemplate::new(401).set_body_string("expired"))
        .mount(&mock_server)
        .await;

    let err = connector()
        .list_workbooks(&session(&mock_server))
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 401);
}

#[tokio::test]
async fn test_list_workbooks_invalid_json() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/3.17/sites/site-123/workbooks"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&mock_server)
        .await;

    let err = connector()
        .list_workbooks(&session(&mock_server))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Protocol(_)));
    assert_eq!(err.status_code(), 502);
}

#[tokio::test]
async fn test_trigger_refresh_with_job() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/3.17/sites/site-123/workbooks/wb-1/refresh"))
        .and(header("X-Tableau-Auth", "auth-token"))
        .and(body_json(serde_json::json!({
            "task": {"extractRefresh": {"type": "FullRefresh"}}
        })))
        .respond_with(ResponseTemplate::new(202).set_body_json(serde_json::json!({
            "job": {"id": "job-77", "mode": "Asynchronous", "type": "RefreshExtract"}
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let accepted = connector()
        .trigger_refresh(&session(&mock_server), "wb-1")
        .await
        .unwrap();
    assert_eq!(accepted.job_id.as_deref(), Some("job-77"));
    assert_eq!(accepted.message, "Refresh job started successfully");
}

#[tokio::test]
async fn test_trigger_refresh_without_parseable_body() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/3.17/sites/site-123/workbooks/wb-1/refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_string("accepted"))
        .mount(&mock_server)
        .await;

    let result = connector()
        .refresh_workbook(&session(&mock_server), "wb-1")
        .await;
    assert!(result.success);
    assert!(result.job_id.is_none());
    assert_eq!(result.message.as_deref(), Some("Refresh initiated successfully"));
}

#[tokio::test]
async fn test_trigger_refresh_failure_uses_summary() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/3.17/sites/site-123/workbooks/wb-1/refresh"))
        .respond_with(ResponseTemplate::new(409).set_body_json(serde_json::json!({
            "error": {"summary": "Resource Conflict", "detail": "Refresh already queued", "code": "409093"}
        })))
        .mount(&mock_server)
        .await;

    let result = connector()
        .refresh_workbook(&session(&mock_server), "wb-1")
        .await;
    assert!(!result.success);
    assert_eq!(result.workbook_id, "wb-1");
    assert_eq!(result.error.as_deref(), Some("Resource Conflict"));
}

#[tokio::test]
async fn test_trigger_refresh_timeout() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/3.17/sites/site-123/workbooks/slow/refresh"))
        .respond_with(
            ResponseTemplate::new(202)
                .set_delay(std::time::Duration::from_secs(5))
                .set_body_json(serde_json::json!({"job": {"id": "late"}})),
        )
        .mount(&mock_server)
        .await;

    let connector =
        TableauConnector::new(TableauConfig::default().with_refresh_timeout_secs(1)).unwrap();
    let session = session(&mock_server);

    let err = connector.trigger_refresh(&session, "slow").await.unwrap_err();
    assert!(matches!(err, Error::Timeout(_)));

    let result = connector.refresh_workbook(&session, "slow").await;
    assert!(!result.success);
    assert_eq!(
        result.error.as_deref(),
        Some("Request timeout - refresh may still be processing")
    );
}

#[tokio::test]
async fn test_job_status_passthrough() {
    let mock_server = MockServer::start().await;
    let job = serde_json::json!({
        "job": {"id": "job-77", "progress": "100", "finishCode": "0", "type": "RefreshExtract"}
    });

    Mock::given(method("GET"))
        .and(path("/api/3.17/sites/site-123/jobs/job-77"))
        .and(header("X-Tableau-Auth", "auth-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(job.clone()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let status = connector()
        .job_status(&session(&mock_server), "job-77")
        .await
        .unwrap();
    assert_eq!(status, job);
}

#[tokio::test]
async fn test_job_status_not_found() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/3.17/sites/site-123/jobs/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_string("Job not found"))
        .mount(&mock_server)
        .await;

    let err = connector()
        .job_status(&session(&mock_server), "missing")
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 404);
}

#[tokio::test]
async fn test_custom_api_version() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/3.22/sites/site-123/jobs/j1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"job": {}})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let connector =
        TableauConnector::new(TableauConfig::default().with_api_version("3.22")).unwrap();
    assert!(connector.job_status(&session(&mock_server), "j1").await.is_ok());
}
