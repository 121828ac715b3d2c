// Condition-based model routing

use crate::error::{Result, SluiceError};
use crate::features::Record;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Default target when no rule matches
pub const DEFAULT_MODEL: &str = "UNK";

/// Routing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig {
    /// When false every record goes to `default_model`
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Target for records no rule matches
    #[serde(default = "default_model")]
    pub default_model: String,
    /// Ordered rules; the first match wins
    #[serde(default)]
    pub rules: Vec<ConditionRule>,
}

fn default_enabled() -> bool {
    true
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            default_model: default_model(),
            rules: Vec::new(),
        }
    }
}

impl RoutingConfig {
    /// Validates the rule set
    pub fn validate(&self) -> Result<()> {
        if self.default_model.trim().is_empty() {
            return Err(SluiceError::InvalidConfig {
                field: "routing.default_model".to_string(),
                reason: "Default model must not be empty".to_string(),
            });
        }

        for (i, rule) in self.rules.iter().enumerate() {
            if rule.target_model.trim().is_empty() {
                return Err(SluiceError::InvalidConfig {
                    field: format!("routing.rules[{}].target_model", i),
                    reason: format!("Rule {} has no target model", rule.name),
                });
            }
        }

        Ok(())
    }
}

/// One routing rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionRule {
    /// Rule name, used in logs
    #[serde(default)]
    pub name: String,
    /// Model version selected on match
    pub target_model: String,
    /// Conjunction of field equalities
    #[serde(default)]
    pub conditions: Vec<Condition>,
    /// Disabled rules never match
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl ConditionRule {
    /// Creates an enabled rule with no conditions
    pub fn new(name: &str, target_model: &str) -> Self {
        Self {
            name: name.to_string(),
            target_model: target_model.to_string(),
            conditions: Vec::new(),
            enabled: true,
        }
    }

    /// Adds an equality condition
    pub fn when(mut self, field: &str, value: &str) -> Self {
        self.conditions.push(Condition {
            field: field.to_string(),
            value: value.to_string(),
        });
        self
    }

    /// Sets the enabled flag
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Whether the record satisfies every condition
    pub fn matches(&self, record: &Record) -> bool {
        self.enabled && self.conditions.iter().all(|c| c.matches(record))
    }
}

/// Exact string equality on one record field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    pub field: String,
    pub value: String,
}

impl Condition {
    /// A missing field never matches
    pub fn matches(&self, record: &Record) -> bool {
        record.get(&self.field).map_or(false, |v| *v == self.value)
    }
}

/// Records routed to one version, tagged with their original positions
#[derive(Debug, Clone)]
pub struct RouteGroup<'a> {
    /// Target model version
    pub version: String,
    /// `(original_index, record)` pairs in input order
    pub entries: Vec<(usize, &'a Record)>,
}

impl<'a> RouteGroup<'a> {
    /// Records without their indices
    pub fn records(&self) -> Vec<&'a Record> {
        self.entries.iter().map(|(_, r)| *r).collect()
    }

    /// Number of records in the group
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the group is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Selects a model version per record
#[derive(Debug, Clone)]
pub struct ConditionRouter {
    config: RoutingConfig,
}

impl ConditionRouter {
    /// Creates a router from configuration
    pub fn new(config: RoutingConfig) -> Self {
        Self { config }
    }

    /// Router config
    pub fn config(&self) -> &RoutingConfig {
        &self.config
    }

    /// Target version for one record
    pub fn route(&self, record: &Record) -> &str {
        if !self.config.enabled {
            return &self.config.default_model;
        }

        match self.config.rules.iter().find(|rule| rule.matches(record)) {
            Some(rule) => {
                debug!(rule = %rule.name, target = %rule.target_model, "Routing rule matched");
                &rule.target_model
            }
            None => &self.config.default_model,
        }
    }

    /// Partitions a batch into per-version groups.
    ///
    /// Groups appear in order of their first record; every input index lands
    /// in exactly one group. Identical records are never merged.
    pub fn group<'a>(&self, records: &'a [Record]) -> Vec<RouteGroup<'a>> {
        let mut groups: Vec<RouteGroup<'a>> = Vec::new();

        for (index, record) in records.iter().enumerate() {
            let version = self.route(record);
            match groups.iter_mut().find(|g| g.version == version) {
                Some(group) => group.entries.push((index, record)),
                None => groups.push(RouteGroup {
                    version: version.to_string(),
                    entries: vec![(index, record)],
                }),
            }
        }

        debug!(
            records = records.len(),
            groups = groups.len(),
            "Batch routed"
        );
        groups
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(pairs: &[(&str, &str)]) -> Record {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn router() -> ConditionRouter {
        ConditionRouter::new(RoutingConfig {
            enabled: true,
            default_model: "ctr_v1".to_string(),
            rules: vec![
                ConditionRule::new("us-mobile", "ctr_v2")
                    .when("country", "US")
                    .when("device", "mobile"),
                ConditionRule::new("us", "ctr_v3").when("country", "US"),
            ],
        })
    }

    #[test]
    fn test_first_match_wins() {
        let router = router();
        assert_eq!(router.route(&record(&[("country", "US"), ("device", "mobile")])), "ctr_v2");
        assert_eq!(router.route(&record(&[("country", "US"), ("device", "desktop")])), "ctr_v3");
    }

    #[test]
    fn test_default_when_nothing_matches() {
        let router = router();
        assert_eq!(router.route(&record(&[("country", "DE")])), "ctr_v1");
        assert_eq!(router.route(&Record::new()), "ctr_v1");
    }

    #[test]
    fn test_equality_is_exact() {
        let router = router();
        assert_eq!(router.route(&record(&[("country", "us")])), "ctr_v1");
        assert_eq!(router.route(&record(&[("country", "US ")])), "ctr_v1");
    }

    #[test]
    fn test_disabled_rule_skipped() {
        let router = ConditionRouter::new(RoutingConfig {
            enabled: true,
            default_model: "ctr_v1".to_string(),
            rules: vec![
                ConditionRule::new("off", "ctr_v2").when("country", "US").with_enabled(false),
                ConditionRule::new("catch-all", "ctr_v3"),
            ],
        });
        assert_eq!(router.route(&record(&[("country", "US")])), "ctr_v3");
    }

    #[test]
    fn test_routing_disabled_uses_default() {
        let mut config = router().config().clone();
        config.enabled = false;
        let router = ConditionRouter::new(config);
        assert_eq!(router.route(&record(&[("country", "US"), ("device", "mobile")])), "ctr_v1");
    }

    #[test]
    fn test_group_preserves_indices_and_first_appearance() {
        let records = vec![
            record(&[("country", "DE")]),
            record(&[("country", "US")]),
            record(&[("country", "DE")]),
            record(&[("country", "US"), ("device", "mobile")]),
        ];
        let groups = router().group(&records);

        let versions: Vec<&str> = groups.iter().map(|g| g.version.as_str()).collect();
        assert_eq!(versions, vec!["ctr_v1", "ctr_v3", "ctr_v2"]);

        let indices: Vec<Vec<usize>> = groups
            .iter()
            .map(|g| g.entries.iter().map(|(i, _)| *i).collect())
            .collect();
        assert_eq!(indices, vec![vec![0, 2], vec![1], vec![3]]);

        let total: usize = groups.iter().map(RouteGroup::len).sum();
        assert_eq!(total, records.len());
    }

    #[test]
    fn test_group_keeps_identical_records_separate() {
        let records = vec![record(&[("country", "DE")]); 3];
        let groups = router().group(&records);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].len(), 3);
    }

    #[test]
    fn test_validate() {
        assert!(router().config().validate().is_ok());

        let mut config = RoutingConfig::default();
        config.default_model = " ".to_string();
        assert!(config.validate().is_err());

        let config = RoutingConfig {
            rules: vec![ConditionRule::new("broken", "")],
            ..RoutingConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(SluiceError::InvalidConfig { field, .. }) if field == "routing.rules[0].target_model"
        ));
    }

    #[test]
    fn test_config_deserialize_defaults() {
        let config: RoutingConfig = serde_json::from_str(
            r#"{"rules": [{"target_model": "ctr_v2", "conditions": [{"field": "country", "value": "US"}]}]}"#,
        )
        .unwrap();
        assert!(config.enabled);
        assert_eq!(config.default_model, DEFAULT_MODEL);
        assert!(config.rules[0].enabled);
    }
}
