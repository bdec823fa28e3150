use crate::config::RulesConfig;

/// Checks the registry host of `image` against the approved list.
///
/// Only a first path segment that looks like a host (contains `.` or `:`)
/// is treated as a registry. Short Docker Hub names such as `nginx:1.25`
/// or `bitnami/redis` carry no host and always pass.
pub fn check_registry(config: &RulesConfig, image: &str) -> Option<String> {
    if image.is_empty() {
        return Some("Image is required".to_string());
    }

    let registry = explicit_registry(image)?;
    if config.is_registry_approved(registry) {
        return None;
    }

    let approved = config
        .approved_registries
        .iter()
        .map(|r| format!("'{r}'"))
        .collect::<Vec<_>>()
        .join(", ");
    Some(format!(
        "Registry '{registry}' not in approved list: [{approved}]"
    ))
}

/// Rejects images whose effective tag is blocked. An image without any `:`
/// resolves to `latest`.
pub fn check_tag(config: &RulesConfig, image: &str) -> Option<String> {
    // Empty images are reported by the registry rule.
    if image.is_empty() {
        return None;
    }

    let tag = effective_tag(image);
    config
        .is_tag_blocked(tag)
        .then(|| format!("Tag '{tag}' is blocked. Use specific version tags."))
}

fn explicit_registry(image: &str) -> Option<&str> {
    let (first, _) = image.split_once('/')?;
    (first.contains('.') || first.contains(':')).then_some(first)
}

fn effective_tag(image: &str) -> &str {
    match image.rfind(':') {
        Some(pos) => &image[pos + 1..],
        None => "latest",
    }
}
