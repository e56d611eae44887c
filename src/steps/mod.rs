//! The remote checks.
//!
//! [`connection`] holds the firmware-side calls (registration, readings,
//! polling, heartbeat). [`integration`] holds the dashboard-side checks that
//! discover or create the resources those calls rely on.

pub mod connection;
pub mod integration;

use serde_json::Value;

use crate::client::{ApiRequest, ApiResponse};
use crate::error::TransportError;
use crate::report::StepOutcome;
use crate::runner::StepContext;

/// Send `request`, turning a transport failure into a failed outcome.
pub(crate) async fn send(
    ctx: &StepContext,
    action: &str,
    request: ApiRequest,
) -> Result<ApiResponse, StepOutcome> {
    ctx.send(request)
        .await
        .map_err(|err| network_error(action, &err))
}

pub(crate) fn network_error(action: &str, err: &TransportError) -> StepOutcome {
    StepOutcome::fail(format!("Network error during {action}: {err}"))
}

/// Outcome for a response the server answered with an unexpected status.
pub(crate) fn rejected(action: &str, response: &ApiResponse) -> StepOutcome {
    StepOutcome::fail(format!("{action} failed: HTTP {}", response.status))
        .with_details(response.text_preview())
}

/// Render a backend identifier, which may be a UUID string or a numeric key.
pub(crate) fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// First row of a REST response: the first array element, or the object itself.
pub(crate) fn first_row(body: Option<&Value>) -> Option<&Value> {
    let body = body?;
    match body {
        Value::Array(rows) => rows.first(),
        Value::Object(_) => Some(body),
        _ => None,
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    use crate::client::{ApiRequest, ApiResponse, HttpAdapter};
    use crate::config::TesterConfig;
    use crate::error::TransportError;
    use crate::runner::{Session, StepContext};

    type Responder = dyn Fn(&ApiRequest) -> Result<ApiResponse, TransportError> + Send + Sync;

    /// Adapter answering every request through a closure and recording it.
    pub(crate) struct Canned {
        respond: Box<Responder>,
        pub(crate) seen: Mutex<Vec<ApiRequest>>,
    }

    impl Canned {
        pub(crate) fn new(
            respond: impl Fn(&ApiRequest) -> Result<ApiResponse, TransportError> + Send + Sync + 'static,
        ) -> Arc<Self> {
            Arc::new(Self {
                respond: Box::new(respond),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl HttpAdapter for Canned {
        async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
            let response = (self.respond)(&request);
            self.seen.lock().unwrap().push(request);
            response
        }
    }

    pub(crate) fn context(adapter: Arc<Canned>, session: Session) -> StepContext {
        StepContext {
            config: TesterConfig::new("https://abc.supabase.co", "anon-key").with_zone_id("zone-1"),
            client: adapter,
            session,
        }
    }
}
