//! Serves the functions host's custom handler protocol: the host
//! posts each trigger invocation to `/<function name>` and reads the
//! outcome from the response.

use crate::app::App;
use crate::client::Provisioner;
use crate::error::{DecodeError, HandlerError};
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{error, info};

/// The function the host invokes, as declared in its `function.json`.
pub const FUNCTION_NAME: &str = "motomap_mapupload";

/// The trigger binding holding the event stream messages.
pub const BINDING_NAME: &str = "azeventhub";

/// Environment variable holding the port the host expects the
/// handler on.
pub const PORT_VAR: &str = "FUNCTIONS_CUSTOMHANDLER_PORT";

/// Port used when the host doesn't provide one.
pub const DEFAULT_PORT: u16 = 3000;

/// An invocation as posted by the host. Trigger metadata is ignored.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InvokeRequest {
    #[serde(default)]
    pub data: Map<String, Value>,
}

/// The outcome of an invocation, as read by the host. The trigger has
/// no output bindings.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct InvokeResponse {
    pub outputs: Map<String, Value>,
    pub logs: Vec<String>,
    pub return_value: Option<Value>,
}

impl InvokeResponse {
    fn with_logs(logs: Vec<String>) -> Self {
        InvokeResponse {
            outputs: Map::new(),
            logs,
            return_value: None,
        }
    }
}

#[derive(Clone)]
struct HostState {
    app: &'static App,
    provisioner: Arc<dyn Provisioner>,
}

/// Build the router serving invocations of the trigger.
pub fn router(app: &'static App, provisioner: Arc<dyn Provisioner>) -> Router {
    Router::new()
        .route(&format!("/{}", FUNCTION_NAME), post(invoke))
        .with_state(HostState { app, provisioner })
}

async fn invoke(
    State(state): State<HostState>,
    Json(request): Json<InvokeRequest>,
) -> (StatusCode, Json<InvokeResponse>) {
    match handle_invocation(&state, &request).await {
        Ok(logs) => (StatusCode::OK, Json(InvokeResponse::with_logs(logs))),
        Err(e) => {
            let message = format!("{:#}", anyhow::Error::from(e));
            error!("Failed to handle invocation: {}", message);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(InvokeResponse::with_logs(vec![message])),
            )
        }
    }
}

async fn handle_invocation(
    state: &HostState,
    request: &InvokeRequest,
) -> Result<Vec<String>, HandlerError> {
    let payload = request.data.get(BINDING_NAME).ok_or_else(|| {
        DecodeError::Shape(format!("invocation has no {:?} binding", BINDING_NAME))
    })?;
    let report = state.app.handle(payload, state.provisioner.as_ref()).await?;
    info!(
        records = report.records,
        skipped_operation = report.skipped_operation,
        skipped_malformed = report.skipped_malformed,
        skipped_extension = report.skipped_extension,
        accepted = report.accepted.len(),
        "Handled batch"
    );
    let mut logs = vec![format!(
        "{} record(s), {} container group(s) submitted",
        report.records,
        report.accepted.len()
    )];
    if !report.accepted.is_empty() {
        logs.push(format!(
            "Submitted: {}",
            report.accepted.iter().map(|accepted| &accepted.name).join(", ")
        ));
    }
    Ok(logs)
}
