use crate::pod::{ResourceRequirements, quantity_set};

/// Requires cpu and memory on both limits and requests. Reports the missing
/// subset in one message.
pub fn check(resources: Option<&ResourceRequirements>) -> Option<String> {
    let limits = resources.and_then(|r| r.limits.as_ref());
    let requests = resources.and_then(|r| r.requests.as_ref());

    let present = [
        ("CPU limits", limits.and_then(|l| l.cpu.as_ref())),
        ("memory limits", limits.and_then(|l| l.memory.as_ref())),
        ("CPU requests", requests.and_then(|r| r.cpu.as_ref())),
        ("memory requests", requests.and_then(|r| r.memory.as_ref())),
    ];

    let missing: Vec<&str> = present
        .into_iter()
        .filter(|(_, quantity)| !quantity_set(*quantity))
        .map(|(label, _)| label)
        .collect();

    if missing.is_empty() {
        None
    } else {
        Some(format!("Missing {}", missing.join(", ")))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn resources(value: serde_json::Value) -> ResourceRequirements {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_absent_resources_lists_all_four() {
        assert_eq!(
            check(None).as_deref(),
            Some("Missing CPU limits, memory limits, CPU requests, memory requests")
        );
        assert_eq!(
            check(Some(&resources(json!({})))).as_deref(),
            Some("Missing CPU limits, memory limits, CPU requests, memory requests")
        );
    }

    #[test]
    fn test_complete_resources_pass() {
        let r = resources(json!({
            "limits": {"cpu": 1, "memory": "256Mi"},
            "requests": {"cpu": "250m", "memory": "128Mi"}
        }));
        assert_eq!(check(Some(&r)), None);
    }

    #[test]
    fn test_names_only_missing_fields() {
        let r = resources(json!({
            "limits": {"cpu": "500m"},
            "requests": {"memory": "64Mi"}
        }));
        assert_eq!(check(Some(&r)).as_deref(), Some("Missing memory limits, CPU requests"));

        let r = resources(json!({
            "limits": {"cpu": "500m", "memory": "128Mi"}
        }));
        assert_eq!(check(Some(&r)).as_deref(), Some("Missing CPU requests, memory requests"));
    }

    #[test]
    fn test_empty_quantity_counts_as_missing() {
        let r = resources(json!({
            "limits": {"cpu": "", "memory": "128Mi"},
            "requests": {"cpu": 0, "memory": "64Mi"}
        }));
        assert_eq!(check(Some(&r)).as_deref(), Some("Missing CPU limits, CPU requests"));
    }
}
