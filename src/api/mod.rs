use crate::config::Settings;
use crate::runner::availability::{compute_availability, constraints_by_collection, AvailabilityResult};
use crate::runner::cache::CachedCatalog;
use crate::runner::constraints::{build_rule_constraints, forced_values};
use crate::runner::engine::{evaluate_rules, evaluate_rules_with_trace, process_rules, EvaluationMode};
use crate::runner::error::RuleError;
use crate::runner::model::{Configuration, OptionId, RuleConstraints, RuleEvaluationResult};
use crate::runner::trace::RuleSetTrace;
use crate::runner::validator::{load_product_line, validate_current_selections, ValidationResult};
use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error};

#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<CachedCatalog>,
    pub settings: Arc<Settings>,
}

impl AppState {
    pub fn new(catalog: CachedCatalog, settings: Settings) -> Self {
        AppState {
            catalog: Arc::new(catalog),
            settings: Arc::new(settings),
        }
    }
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/rules/evaluate", post(handle_evaluate))
        .route("/rules/constraints", post(handle_constraints))
        .route("/availability", post(handle_availability))
        .route("/validate", post(handle_validate))
        .route("/cache/invalidate", post(handle_invalidate))
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

pub struct ApiError(RuleError);

impl From<RuleError> for ApiError {
    fn from(error: RuleError) -> Self {
        ApiError(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            RuleError::RequiredTableMissing(_) => StatusCode::SERVICE_UNAVAILABLE,
            fatal if fatal.is_fatal() => StatusCode::INTERNAL_SERVER_ERROR,
            RuleError::Collaborator(_) => StatusCode::BAD_GATEWAY,
            RuleError::IoError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        };
        if status.is_server_error() {
            error!(error = %self.0, "Request failed");
        }
        let body = ErrorResponse {
            error: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "configurator",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

#[derive(Debug, Deserialize)]
struct EvaluateRequest {
    #[serde(default)]
    configuration: Configuration,
    #[serde(default)]
    mode: EvaluationMode,
    #[serde(default)]
    trace: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EvaluateResponse {
    #[serde(flatten)]
    result: RuleEvaluationResult,
    /// Resolved configuration, sequential mode only.
    #[serde(skip_serializing_if = "Option::is_none")]
    configuration: Option<Configuration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    trace: Option<RuleSetTrace>,
}

async fn handle_evaluate(
    State(state): State<AppState>,
    Json(request): Json<EvaluateRequest>,
) -> Json<EvaluateResponse> {
    let rule_set = state.catalog.rules().await;
    debug!(rules = rule_set.len(), mode = ?request.mode, trace = request.trace, "Evaluating rules");

    let sequential = request.mode == EvaluationMode::Sequential;
    let response = if request.trace {
        let (outcome, trace) = evaluate_rules_with_trace(&rule_set, &request.configuration, request.mode);
        EvaluateResponse {
            result: outcome.result,
            configuration: sequential.then_some(outcome.configuration),
            trace: Some(trace),
        }
    } else if sequential {
        let outcome = process_rules(&rule_set, &request.configuration);
        EvaluateResponse {
            result: outcome.result,
            configuration: Some(outcome.configuration),
            trace: None,
        }
    } else {
        EvaluateResponse {
            result: evaluate_rules(&rule_set, &request.configuration),
            configuration: None,
            trace: None,
        }
    };
    Json(response)
}

#[derive(Debug, Deserialize)]
struct ConstraintsRequest {
    #[serde(default)]
    configuration: Configuration,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ConstraintsResponse {
    constraints: RuleConstraints,
    forced_values: BTreeMap<String, OptionId>,
}

async fn handle_constraints(
    State(state): State<AppState>,
    Json(request): Json<ConstraintsRequest>,
) -> Json<ConstraintsResponse> {
    let rule_set = state.catalog.rules().await;
    let constraints = build_rule_constraints(&rule_set, &request.configuration);
    let forced = forced_values(&constraints_by_collection(&constraints, &state.settings.fields));
    Json(ConstraintsResponse {
        constraints,
        forced_values: forced,
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AvailabilityRequest {
    product_line_id: OptionId,
    #[serde(default)]
    configuration: Configuration,
}

async fn handle_availability(
    State(state): State<AppState>,
    Json(request): Json<AvailabilityRequest>,
) -> Result<Json<AvailabilityResult>, ApiError> {
    let result = compute_availability(
        request.product_line_id,
        &request.configuration,
        &state.catalog,
        &state.settings.fields,
        &state.settings.required_collections,
    )
    .await?;
    Ok(Json(result))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ValidateRequest {
    product_line_id: OptionId,
    #[serde(default)]
    configuration: Configuration,
    /// Omitted: validate against the line's current unavailable options.
    #[serde(default)]
    disabled_option_ids: Option<BTreeMap<String, Vec<OptionId>>>,
}

async fn handle_validate(
    State(state): State<AppState>,
    Json(request): Json<ValidateRequest>,
) -> Result<Json<ValidationResult>, ApiError> {
    let schema = &state.settings.fields;
    let disabled = match request.disabled_option_ids {
        Some(disabled) => disabled,
        None => {
            compute_availability(
                request.product_line_id,
                &request.configuration,
                &state.catalog,
                schema,
                &state.settings.required_collections,
            )
            .await?
            .unavailable_options
        }
    };

    let product_line =
        load_product_line(request.product_line_id, &request.configuration, &state.catalog, schema).await;
    Ok(Json(validate_current_selections(
        &request.configuration,
        schema,
        &product_line,
        &disabled,
    )))
}

async fn handle_invalidate(State(state): State<AppState>) -> StatusCode {
    state.catalog.invalidate();
    StatusCode::NO_CONTENT
}
