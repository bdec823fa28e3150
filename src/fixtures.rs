//! AdmissionReview payloads shaped like the ones kube-apiserver sends.

use kube::core::admission::{AdmissionRequest, AdmissionReview};
use kube::core::DynamicObject;
use serde_json::{Value, json};

pub const UID: &str = "705ab4f5-6393-11e8-b7cc-42010a800002";

pub fn review(kind: &str, namespace: &str, operation: &str, object: Value) -> Value {
    json!({
        "apiVersion": "admission.k8s.io/v1",
        "kind": "AdmissionReview",
        "request": {
            "uid": UID,
            "kind": {"group": "", "version": "v1", "kind": kind},
            "resource": {
                "group": "",
                "version": "v1",
                "resource": format!("{}s", kind.to_lowercase())
            },
            "name": "test-pod",
            "namespace": namespace,
            "operation": operation,
            "userInfo": {
                "username": "kubernetes-admin",
                "groups": ["system:masters", "system:authenticated"]
            },
            "object": object,
            "oldObject": null,
            "dryRun": false
        }
    })
}

pub fn pod_review(namespace: &str, spec: Value) -> Value {
    review(
        "Pod",
        namespace,
        "CREATE",
        json!({
            "apiVersion": "v1",
            "kind": "Pod",
            "metadata": {"name": "test-pod", "namespace": namespace},
            "spec": spec
        }),
    )
}

pub fn request(review: Value) -> AdmissionRequest<DynamicObject> {
    serde_json::from_value::<AdmissionReview<DynamicObject>>(review)
        .unwrap()
        .try_into()
        .unwrap()
}

/// A container that satisfies every rule under the default configuration.
pub fn container(name: &str, image: &str) -> Value {
    json!({
        "name": name,
        "image": image,
        "resources": {
            "limits": {"cpu": "500m", "memory": "128Mi"},
            "requests": {"cpu": "250m", "memory": "64Mi"}
        },
        "securityContext": {
            "runAsNonRoot": true,
            "allowPrivilegeEscalation": false,
            "readOnlyRootFilesystem": true
        }
    })
}
