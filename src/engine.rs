use kube::core::admission::{AdmissionRequest, AdmissionResponse, Operation};
use kube::core::DynamicObject;
use serde::Deserialize;
use thiserror::Error;

use crate::config::RulesConfig;
use crate::pod::{self, PodSpec};
use crate::rules::{self, Violation};

pub const ALLOWED_MESSAGE: &str = "All validations passed";

#[derive(Debug, Error)]
pub enum EvaluationError {
    #[error("{operation} request has no object to validate")]
    MissingObject { operation: String },
    #[error("unsupported kind '{0}'")]
    UnsupportedKind(String),
    #[error("{kind} has no pod spec")]
    MissingPodSpec { kind: String },
    #[error("invalid pod spec: {0}")]
    InvalidPodSpec(#[from] serde_json::Error),
}

#[derive(Debug, PartialEq, Eq)]
pub enum Evaluation {
    /// The request targets the validator's own namespace.
    Skipped { namespace: String },
    /// DELETE and CONNECT carry no object to check.
    Unchecked,
    Checked { violations: Vec<Violation> },
}

impl Evaluation {
    pub fn violations(&self) -> &[Violation] {
        match self {
            Evaluation::Checked { violations } => violations,
            _ => &[],
        }
    }
}

/// Stateless pod validator. Built once from configuration and shared
/// read-only across requests.
pub struct Validator {
    rules: RulesConfig,
    self_namespace: String,
}

impl Validator {
    pub fn new(rules: RulesConfig, self_namespace: impl Into<String>) -> Self {
        Self {
            rules,
            self_namespace: self_namespace.into(),
        }
    }

    pub fn evaluate(
        &self,
        request: &AdmissionRequest<DynamicObject>,
    ) -> Result<Evaluation, EvaluationError> {
        if let Some(namespace) =
            request_namespace(request).filter(|ns| *ns == self.self_namespace)
        {
            return Ok(Evaluation::Skipped {
                namespace: namespace.to_string(),
            });
        }

        if matches!(request.operation, Operation::Delete | Operation::Connect) {
            return Ok(Evaluation::Unchecked);
        }

        let object = request
            .object
            .as_ref()
            .ok_or_else(|| EvaluationError::MissingObject {
                operation: format!("{:?}", request.operation).to_uppercase(),
            })?;

        let kind = request.kind.kind.as_str();
        if !pod::is_supported_kind(kind) {
            return Err(EvaluationError::UnsupportedKind(kind.to_string()));
        }

        let raw_spec = pod::locate_pod_spec(&object.data, kind).ok_or_else(|| {
            EvaluationError::MissingPodSpec {
                kind: kind.to_string(),
            }
        })?;
        let pod_spec = PodSpec::deserialize(raw_spec)?;

        let violations = pod_spec
            .all_containers()
            .flat_map(|container| rules::check_container(&self.rules, container))
            .collect();

        Ok(Evaluation::Checked { violations })
    }
}

/// The namespace of the request, falling back to the object's metadata for
/// requests that omit it.
pub fn request_namespace(request: &AdmissionRequest<DynamicObject>) -> Option<&str> {
    request.namespace.as_deref().filter(|ns| !ns.is_empty()).or_else(|| {
        request
            .object
            .as_ref()
            .and_then(|o| o.metadata.namespace.as_deref())
    })
}

/// Turns an evaluation into the admission response for `request`. All
/// violations are reported together, joined with `" | "`.
pub fn decide(
    request: &AdmissionRequest<DynamicObject>,
    evaluation: &Evaluation,
) -> AdmissionResponse {
    let mut response = AdmissionResponse::from(request);

    match evaluation {
        Evaluation::Skipped { namespace } => {
            response.result.message = format!("Skipped validation in {namespace} namespace");
        }
        Evaluation::Unchecked => {
            response.result.message = "No pod object to validate".to_string();
        }
        Evaluation::Checked { violations } if !violations.is_empty() => {
            let message = violations
                .iter()
                .map(|v| v.message.as_str())
                .collect::<Vec<_>>()
                .join(" | ");
            response = response.deny(message);
        }
        Evaluation::Checked { .. } => {
            response.result.message = ALLOWED_MESSAGE.to_string();
        }
    }

    response
}
