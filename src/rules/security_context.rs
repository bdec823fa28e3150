use crate::pod::SecurityContext;

/// Requires `runAsNonRoot: true`, `allowPrivilegeEscalation: false` and
/// `readOnlyRootFilesystem: true`.
///
/// Kubernetes defaults `allowPrivilegeEscalation` to true, so leaving it out
/// is a violation just like leaving out the other two.
pub fn check(security_context: Option<&SecurityContext>) -> Option<String> {
    let sc = security_context.cloned().unwrap_or_default();
    let mut required = Vec::new();

    if !sc.run_as_non_root.unwrap_or(false) {
        required.push("runAsNonRoot=true");
    }
    if sc.allow_privilege_escalation.unwrap_or(true) {
        required.push("allowPrivilegeEscalation=false");
    }
    if !sc.read_only_root_filesystem.unwrap_or(false) {
        required.push("readOnlyRootFilesystem=true");
    }

    if required.is_empty() {
        None
    } else {
        Some(format!("Required {}", required.join(", ")))
    }
}
