//! The subset of the core/v1 pod schema the rules consult.
//!
//! Fields are decoded once at the admission boundary; anything not listed
//! here is ignored.

use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodSpec {
    #[serde(default)]
    pub containers: Vec<Container>,
    #[serde(default)]
    pub init_containers: Vec<Container>,
}

impl PodSpec {
    /// Regular containers followed by init containers.
    pub fn all_containers(&self) -> impl Iterator<Item = &Container> {
        self.containers.iter().chain(self.init_containers.iter())
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Container {
    pub name: Option<String>,
    pub image: Option<String>,
    pub resources: Option<ResourceRequirements>,
    pub security_context: Option<SecurityContext>,
}

impl Container {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("unknown")
    }

    pub fn image(&self) -> &str {
        self.image.as_deref().unwrap_or("")
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ResourceRequirements {
    pub limits: Option<ResourceList>,
    pub requests: Option<ResourceList>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ResourceList {
    pub cpu: Option<Quantity>,
    pub memory: Option<Quantity>,
}

/// A resource quantity as it appears on the wire: `"500m"`, `"128Mi"`, or a
/// bare number such as `1`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Quantity {
    Text(String),
    Number(serde_json::Number),
}

impl Quantity {
    pub fn is_set(&self) -> bool {
        match self {
            Quantity::Text(s) => !s.is_empty(),
            Quantity::Number(n) => n.as_f64().is_some_and(|v| v != 0.0),
        }
    }
}

pub fn quantity_set(quantity: Option<&Quantity>) -> bool {
    quantity.is_some_and(Quantity::is_set)
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityContext {
    pub run_as_non_root: Option<bool>,
    pub allow_privilege_escalation: Option<bool>,
    pub read_only_root_filesystem: Option<bool>,
}

/// Locates the pod spec inside an object of the given kind. Workload kinds
/// carry it in their pod template.
pub fn locate_pod_spec<'a>(data: &'a Value, kind: &str) -> Option<&'a Value> {
    match kind {
        "Pod" => data.get("spec"),
        "Deployment" | "ReplicaSet" | "StatefulSet" | "DaemonSet" | "Job" => {
            data.get("spec")?.get("template")?.get("spec")
        }
        "CronJob" => data
            .get("spec")?
            .get("jobTemplate")?
            .get("spec")?
            .get("template")?
            .get("spec"),
        _ => None,
    }
}

pub fn is_supported_kind(kind: &str) -> bool {
    matches!(
        kind,
        "Pod" | "Deployment" | "ReplicaSet" | "StatefulSet" | "DaemonSet" | "Job" | "CronJob"
    )
}
