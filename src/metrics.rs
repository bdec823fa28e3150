use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::histogram::Histogram;
use prometheus_client::registry::Registry;

use crate::rules::RuleName;

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct RequestLabels {
    pub operation: String,
    pub resource: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ResponseLabels {
    pub allowed: &'static str,
    pub outcome: &'static str,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct RuleLabels {
    pub rule: &'static str,
}

pub struct ValidatorMetrics {
    pub admission_requests_total: Family<RequestLabels, Counter>,
    pub admission_responses_total: Family<ResponseLabels, Counter>,
    pub rule_violations_total: Family<RuleLabels, Counter>,
    pub admission_request_duration_seconds: Histogram,
}

const DURATION_BUCKETS: [f64; 14] = [
    0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

impl ValidatorMetrics {
    pub fn new(registry: &mut Registry) -> Self {
        let admission_requests_total = Family::<RequestLabels, Counter>::default();
        registry.register(
            "image_validator_admission_requests",
            "Total number of admission requests received",
            admission_requests_total.clone(),
        );

        let admission_responses_total = Family::<ResponseLabels, Counter>::default();
        registry.register(
            "image_validator_admission_responses",
            "Total number of admission responses sent",
            admission_responses_total.clone(),
        );

        let rule_violations_total = Family::<RuleLabels, Counter>::default();
        registry.register(
            "image_validator_rule_violations",
            "Total number of container rule violations",
            rule_violations_total.clone(),
        );

        // Pre-create every rule series so dashboards see zeros.
        for rule in RuleName::ALL {
            rule_violations_total.get_or_create(&RuleLabels {
                rule: rule.as_str(),
            });
        }

        let admission_request_duration_seconds = Histogram::new(DURATION_BUCKETS.iter().copied());
        registry.register(
            "image_validator_admission_request_duration_seconds",
            "Duration of admission request processing in seconds",
            admission_request_duration_seconds.clone(),
        );

        Self {
            admission_requests_total,
            admission_responses_total,
            rule_violations_total,
            admission_request_duration_seconds,
        }
    }
}

#[cfg(test)]
mod tests {
    use prometheus_client::encoding::text::encode;

    use super::*;

    #[test]
    fn test_registered_metric_names() {
        let mut registry = Registry::default();
        let metrics = ValidatorMetrics::new(&mut registry);
        metrics
            .rule_violations_total
            .get_or_create(&RuleLabels { rule: "image_tag" })
            .inc();

        let mut out = String::new();
        encode(&mut out, &registry).unwrap();

        assert!(out.contains("# TYPE image_validator_admission_requests counter"));
        assert!(out.contains("image_validator_rule_violations_total{rule=\"image_tag\"} 1"));
        assert!(out.contains("image_validator_rule_violations_total{rule=\"resources\"} 0"));
        assert!(out.contains("image_validator_admission_request_duration_seconds_bucket"));
    }
}
