use std::sync::Arc;
use std::time::Instant;

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use kube::core::admission::{
    AdmissionRequest, AdmissionResponse, AdmissionReview, META_API_VERSION_V1, META_KIND,
};
use kube::core::{DynamicObject, TypeMeta};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::engine::{self, Evaluation, EvaluationError, Validator};
use crate::metrics::{RequestLabels, ResponseLabels, RuleLabels, ValidatorMetrics};

pub const INVALID_REQUEST_MESSAGE: &str = "Invalid request";

pub struct AppState {
    pub validator: Validator,
    pub metrics: ValidatorMetrics,
}

pub type SharedState = Arc<AppState>;

#[derive(Clone, Copy)]
enum Outcome {
    Allowed,
    Skipped,
    Denied,
    Invalid,
    Error,
}

impl Outcome {
    fn as_str(self) -> &'static str {
        match self {
            Outcome::Allowed => "allowed",
            Outcome::Skipped => "skipped",
            Outcome::Denied => "denied",
            Outcome::Invalid => "invalid",
            Outcome::Error => "error",
        }
    }
}

/// `POST /validate`. The body is read raw so that malformed input still
/// gets an `AdmissionReview` answer instead of an extractor rejection.
pub async fn handle_validate(
    State(state): State<SharedState>,
    body: Bytes,
) -> Json<AdmissionReview<DynamicObject>> {
    let start = Instant::now();
    let response = review_body(&state, &body);
    state
        .metrics
        .admission_request_duration_seconds
        .observe(start.elapsed().as_secs_f64());
    Json(response.into_review())
}

fn review_body(state: &AppState, body: &[u8]) -> AdmissionResponse {
    let raw: Value = match serde_json::from_slice(body) {
        Ok(v) => v,
        Err(e) => {
            warn!("request body is not JSON: {e}");
            return respond(state, invalid_response(""), Outcome::Invalid);
        }
    };

    let uid = match raw.get("request") {
        Some(Value::Object(request)) => request
            .get("uid")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        _ => {
            warn!("AdmissionReview missing request field");
            return respond(state, invalid_response(""), Outcome::Invalid);
        }
    };

    let review: AdmissionReview<DynamicObject> = match serde_json::from_value(raw) {
        Ok(r) => r,
        Err(e) => {
            warn!(%uid, "failed to deserialize AdmissionReview: {e}");
            let mut resp = invalid_response(&uid);
            resp.result.message = format!("Validation error: {e}");
            return respond(state, resp, Outcome::Error);
        }
    };

    let request: AdmissionRequest<DynamicObject> = match review.try_into() {
        Ok(r) => r,
        Err(e) => {
            warn!(%uid, "{e}");
            return respond(state, invalid_response(&uid), Outcome::Invalid);
        }
    };

    record_request_metrics(state, &request);
    validate_request(state, &request, |req| state.validator.evaluate(req))
}

/// Runs `evaluate` and maps its result, error or panic to a response. Any
/// failure denies the request.
fn validate_request<F>(
    state: &AppState,
    request: &AdmissionRequest<DynamicObject>,
    evaluate: F,
) -> AdmissionResponse
where
    F: FnOnce(&AdmissionRequest<DynamicObject>) -> Result<Evaluation, EvaluationError>,
{
    let namespace = engine::request_namespace(request).unwrap_or_default();
    debug!(
        uid = %request.uid,
        operation = ?request.operation,
        kind = %request.kind.kind,
        %namespace,
        name = %request.name,
        "validating admission request"
    );

    let evaluation =
        std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| evaluate(request)));

    match evaluation {
        Ok(Ok(evaluation)) => {
            for violation in evaluation.violations() {
                state
                    .metrics
                    .rule_violations_total
                    .get_or_create(&RuleLabels {
                        rule: violation.rule.as_str(),
                    })
                    .inc();
            }

            let response = engine::decide(request, &evaluation);
            let outcome = match evaluation {
                Evaluation::Skipped { .. } => {
                    info!(uid = %request.uid, %namespace, "skipped validation for own namespace");
                    Outcome::Skipped
                }
                _ if !response.allowed => {
                    warn!(
                        uid = %request.uid,
                        %namespace,
                        name = %request.name,
                        "pod validation failed: {}",
                        response.result.message
                    );
                    Outcome::Denied
                }
                _ => {
                    info!(
                        uid = %request.uid,
                        %namespace,
                        name = %request.name,
                        "pod validation passed"
                    );
                    Outcome::Allowed
                }
            };
            respond(state, response, outcome)
        }
        Ok(Err(e)) => {
            warn!(uid = %request.uid, %namespace, "validation error: {e}");
            let response = AdmissionResponse::from(request).deny(format!("Validation error: {e}"));
            respond(state, response, Outcome::Error)
        }
        Err(_) => {
            error!(uid = %request.uid, "validation panicked, failing closed");
            let response = AdmissionResponse::from(request)
                .deny("Validation error: internal error during validation");
            respond(state, response, Outcome::Error)
        }
    }
}

/// Denial for requests that cannot be read as an admission request. The uid
/// is echoed when one could be recovered from the raw body.
fn invalid_response(uid: &str) -> AdmissionResponse {
    let mut resp = AdmissionResponse::invalid(INVALID_REQUEST_MESSAGE);
    resp.types = TypeMeta {
        api_version: META_API_VERSION_V1.to_string(),
        kind: META_KIND.to_string(),
    };
    resp.uid = uid.to_string();
    resp
}

fn respond(state: &AppState, response: AdmissionResponse, outcome: Outcome) -> AdmissionResponse {
    state
        .metrics
        .admission_responses_total
        .get_or_create(&ResponseLabels {
            allowed: if response.allowed { "true" } else { "false" },
            outcome: outcome.as_str(),
        })
        .inc();
    response
}

fn record_request_metrics(state: &AppState, request: &AdmissionRequest<DynamicObject>) {
    let operation = format!("{:?}", request.operation).to_uppercase();
    let resource = request.resource.resource.clone();

    state
        .metrics
        .admission_requests_total
        .get_or_create(&RequestLabels { operation, resource })
        .inc();
}
