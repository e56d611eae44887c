//! The connection suite over real HTTP against a mockito server.

mod common;

use mockito::Matcher;
use serde_json::json;
use std::sync::Arc;

use esp32_tester::config::Pacing;
use esp32_tester::{ReqwestAdapter, Runner, Suite, TesterConfig};

fn config_for(server: &mockito::ServerGuard) -> TesterConfig {
    TesterConfig::new(server.url(), common::API_KEY)
        .with_zone_id("zone-1")
        .with_pacing(Pacing::none())
}

#[tokio::test]
async fn test_connection_suite_against_mock_backend() {
    let mut server = mockito::Server::new_async().await;
    let bearer = format!("Bearer {}", common::API_KEY);

    let register = server
        .mock("POST", "/functions/v1/device-management")
        .match_header("apikey", common::API_KEY)
        .match_header("authorization", bearer.as_str())
        .match_body(Matcher::PartialJson(json!({
            "device_id": "esp32_test_device",
            "device_type": "esp32",
            "apiKey": common::API_KEY
        })))
        .with_status(201)
        .with_body(r#"{"success": true}"#)
        .create_async()
        .await;
    let readings = server
        .mock("POST", "/functions/v1/esp32-data")
        .match_body(Matcher::PartialJson(json!({"zone_id": "zone-1"})))
        .with_status(200)
        .with_body(r#"{"success": true, "irrigation_needed": false}"#)
        .expect(4)
        .create_async()
        .await;
    let polling = server
        .mock("GET", "/functions/v1/esp32-commands")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("device_id".into(), "esp32_test_device".into()),
            Matcher::UrlEncoded("apiKey".into(), common::API_KEY.into()),
        ]))
        .with_status(200)
        .with_body(r#"{"commands": [{"id": 1, "command_type": "WATER_ON"}]}"#)
        .create_async()
        .await;
    let heartbeat = server
        .mock("PUT", "/functions/v1/device-management")
        .match_body(Matcher::Json(json!({
            "device_id": "esp32_test_device",
            "status": "online",
            "apiKey": common::API_KEY
        })))
        .with_status(200)
        .with_body(r#"{"success": true}"#)
        .create_async()
        .await;

    let config = config_for(&server);
    let suite = Suite::connection(&config);
    let client = Arc::new(ReqwestAdapter::from_config(&config).unwrap());
    let report = Runner::new(client, config)
        .with_session(suite.session)
        .quiet()
        .run(suite.steps)
        .await;

    register.assert_async().await;
    readings.assert_async().await;
    polling.assert_async().await;
    heartbeat.assert_async().await;

    let summary = report.summary();
    assert_eq!(summary.total, 7);
    assert_eq!(summary.passed, 7, "failures: {:?}", report.failures().collect::<Vec<_>>());
    assert_eq!(summary.success_rate, 1.0);
}

#[tokio::test]
async fn test_non_json_error_body_is_reported() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", Matcher::Any)
        .with_status(502)
        .with_body("<html>Bad Gateway</html>")
        .create_async()
        .await;
    server
        .mock("PUT", Matcher::Any)
        .with_status(502)
        .with_body("<html>Bad Gateway</html>")
        .create_async()
        .await;
    server
        .mock("GET", Matcher::Any)
        .with_status(502)
        .with_body("<html>Bad Gateway</html>")
        .create_async()
        .await;

    let config = config_for(&server);
    let suite = Suite::connection(&config);
    let client = Arc::new(ReqwestAdapter::from_config(&config).unwrap());
    let report = Runner::new(client, config)
        .with_session(suite.session)
        .quiet()
        .run(suite.steps)
        .await;

    assert_eq!(report.summary().failed, 7);
    let heartbeat = report.result("Heartbeat").unwrap();
    assert_eq!(heartbeat.message, "Status update failed: HTTP 502");
    assert_eq!(heartbeat.details, Some(json!("<html>Bad Gateway</html>")));
}
