//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::json;
use std::sync::{Arc, Mutex};

use esp32_tester::config::Pacing;
use esp32_tester::{ApiRequest, ApiResponse, HttpAdapter, TesterConfig, TransportError};

/// An access key long enough to pass validation.
pub const API_KEY: &str = "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9.test-anon-key-for-esp32-tester";

type Responder = dyn Fn(&ApiRequest) -> Result<ApiResponse, TransportError> + Send + Sync;

/// In-memory backend answering through a closure and recording every request.
pub struct ScriptedBackend {
    respond: Box<Responder>,
    requests: Mutex<Vec<ApiRequest>>,
}

impl ScriptedBackend {
    pub fn new(
        respond: impl Fn(&ApiRequest) -> Result<ApiResponse, TransportError> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            respond: Box::new(respond),
            requests: Mutex::new(Vec::new()),
        })
    }

    /// A backend where every call succeeds.
    pub fn healthy() -> Arc<Self> {
        Self::new(healthy_response)
    }

    /// A backend answering every call with `status`.
    pub fn always(status: u16) -> Arc<Self> {
        Self::new(move |_| Ok(ApiResponse::from_text(status, "Internal Server Error")))
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpAdapter for ScriptedBackend {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        let response = (self.respond)(&request);
        self.requests.lock().unwrap().push(request);
        response
    }
}

/// What a correctly deployed backend answers.
pub fn healthy_response(request: &ApiRequest) -> Result<ApiResponse, TransportError> {
    let response = match (request.method.as_str(), request.path.as_str()) {
        ("OPTIONS", _) => ApiResponse::from_text(200, "ok"),
        ("POST", "/functions/v1/device-management") => {
            ApiResponse::json(201, json!({"success": true, "device": {"id": "dev-row"}}))
        },
        ("PUT", "/functions/v1/device-management") => {
            ApiResponse::json(200, json!({"success": true}))
        },
        ("POST", "/functions/v1/esp32-data") => {
            ApiResponse::json(200, json!({"success": true, "message": "Data stored"}))
        },
        ("POST", "/functions/v1/esp32-commands") => {
            ApiResponse::json(200, json!({"success": true, "command": {"id": "cmd-1"}}))
        },
        ("GET", "/functions/v1/esp32-commands") => ApiResponse::json(
            200,
            json!({"commands": [{"id": "cmd-1", "command_type": "GET_STATUS"}]}),
        ),
        ("GET", "/rest/v1/realtime_cache") => {
            ApiResponse::json(200, json!([{"sensor_type": "moisture", "value": 65.5}]))
        },
        ("GET", "/rest/v1/devices") => {
            ApiResponse::json(200, json!([{"id": "device-uuid", "name": "Garden Monitor"}]))
        },
        ("GET", "/rest/v1/zones") => {
            ApiResponse::json(200, json!([{"id": "zone-uuid", "name": "Vegetable Bed"}]))
        },
        _ => ApiResponse::from_text(404, "Not Found"),
    };
    Ok(response)
}

/// A valid configuration with pacing disabled.
pub fn config() -> TesterConfig {
    TesterConfig::new("https://abc123.supabase.co", API_KEY)
        .with_zone_id("zone-1")
        .with_pacing(Pacing::none())
}
