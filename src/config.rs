use figment::{Figment, providers::{Env, Format, Yaml}};
use serde::{Deserialize, Serialize};

fn default_listen_addr() -> String {
    "0.0.0.0:8443".to_string()
}

fn default_tls_cert_path() -> String {
    "/certs/tls.crt".to_string()
}

fn default_tls_key_path() -> String {
    "/certs/tls.key".to_string()
}

fn default_metrics_addr() -> String {
    "0.0.0.0:9090".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_self_namespace() -> String {
    "image-validator-demo".to_string()
}

fn default_max_body_bytes() -> usize {
    2 * 1024 * 1024
}

fn default_approved_registries() -> Vec<String> {
    [
        "docker.io",
        "gcr.io",
        "k8s.gcr.io",
        "quay.io",
        "registry.k8s.io",
        "ghcr.io",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_blocked_tags() -> Vec<String> {
    vec!["latest".to_string()]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidatorConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    #[serde(default = "default_tls_cert_path")]
    pub tls_cert_path: String,
    #[serde(default = "default_tls_key_path")]
    pub tls_key_path: String,
    #[serde(default = "default_metrics_addr")]
    pub metrics_addr: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Namespace the validator itself runs in. Pods created there skip all
    /// checks so the validator can always redeploy itself. This is an
    /// operational escape hatch and provides no tenant isolation.
    #[serde(default = "default_self_namespace")]
    pub self_namespace: String,
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    #[serde(default)]
    pub rules: RulesConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RulesConfig {
    #[serde(default = "default_approved_registries")]
    pub approved_registries: Vec<String>,
    #[serde(default = "default_blocked_tags")]
    pub blocked_tags: Vec<String>,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            approved_registries: default_approved_registries(),
            blocked_tags: default_blocked_tags(),
        }
    }
}

impl RulesConfig {
    pub fn is_registry_approved(&self, registry: &str) -> bool {
        self.approved_registries.iter().any(|r| r == registry)
    }

    pub fn is_tag_blocked(&self, tag: &str) -> bool {
        self.blocked_tags.iter().any(|t| t == tag)
    }
}

impl ValidatorConfig {
    /// Layers `VALIDATOR_*` environment variables over the YAML file at
    /// `path`. A missing file leaves every field at its default.
    pub fn load(path: &str) -> Result<Self, Box<figment::Error>> {
        Figment::new()
            .merge(Yaml::file(path))
            .merge(Env::prefixed("VALIDATOR_").split("__"))
            .extract()
            .map_err(Box::new)
    }
}

#[cfg(test)]
mod tests {
    use figment::Jail;

    use super::*;

    fn load(path: &str) -> figment::error::Result<ValidatorConfig> {
        ValidatorConfig::load(path).map_err(|e| *e)
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        Jail::expect_with(|_jail| {
            let config = load("image-validator.yaml")?;
            assert_eq!(config.listen_addr, "0.0.0.0:8443");
            assert_eq!(config.self_namespace, "image-validator-demo");
            assert_eq!(config.max_body_bytes, 2 * 1024 * 1024);
            assert_eq!(config.rules.blocked_tags, vec!["latest"]);
            assert_eq!(config.rules.approved_registries.len(), 6);
            assert!(config.rules.is_registry_approved("registry.k8s.io"));
            Ok(())
        });
    }

    #[test]
    fn test_yaml_overrides_rules() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "config.yaml",
                r#"
self_namespace: platform
rules:
  approved_registries: [registry.internal:5000]
  blocked_tags: [latest, dev]
"#,
            )?;
            let config = load("config.yaml")?;

            assert_eq!(config.self_namespace, "platform");
            assert!(config.rules.is_registry_approved("registry.internal:5000"));
            assert!(!config.rules.is_registry_approved("docker.io"));
            assert!(config.rules.is_tag_blocked("dev"));
            assert!(!config.rules.is_tag_blocked("1.25"));
            assert_eq!(config.tls_cert_path, "/certs/tls.crt");
            Ok(())
        });
    }

    #[test]
    fn test_partial_rules_keep_other_default() {
        Jail::expect_with(|jail| {
            jail.create_file("config.yaml", "rules:\n  blocked_tags: []\n")?;
            let config = load("config.yaml")?;

            assert!(config.rules.blocked_tags.is_empty());
            assert!(config.rules.is_registry_approved("ghcr.io"));
            Ok(())
        });
    }

    #[test]
    fn test_env_overrides_yaml() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "config.yaml",
                r#"
self_namespace: from-file
log_level: debug
rules:
  blocked_tags: [latest]
"#,
            )?;
            jail.set_env("VALIDATOR_SELF_NAMESPACE", "from-env");
            jail.set_env("VALIDATOR_RULES__BLOCKED_TAGS", r#"["latest","dev"]"#);
            // Read by the CLI; the config layer sees it as an unknown `config` key.
            jail.set_env("VALIDATOR_CONFIG", "config.yaml");

            let config = load("config.yaml")?;

            assert_eq!(config.self_namespace, "from-env");
            assert_eq!(config.rules.blocked_tags, vec!["latest", "dev"]);
            assert_eq!(config.log_level, "debug");
            assert!(config.rules.is_registry_approved("quay.io"));
            Ok(())
        });
    }
}
