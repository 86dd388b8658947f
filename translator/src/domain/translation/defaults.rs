//! Built-in translation rules
//!
//! Converts host metrics from OpenTelemetry naming into the vendor's
//! conventional names and rollups (`cpu.utilization`, `memory.utilization`,
//! `disk_ops.total`, `network.total`, ...). Parsed on demand and handed to
//! `MetricTranslator::new` explicitly.

use super::error::TranslationError;
use super::rules::Rule;

/// Embedded default rule table (compile-time)
const DEFAULT_TRANSLATION_RULES_JSON: &str =
    include_str!("../../../data/default_translation_rules.json");

/// Parse and validate the built-in rule table
pub fn default_translation_rules() -> Result<Vec<Rule>, TranslationError> {
    parse_rules(DEFAULT_TRANSLATION_RULES_JSON)
}

/// Parse a JSON rule list and validate every rule
pub fn parse_rules(json: &str) -> Result<Vec<Rule>, TranslationError> {
    let rules: Vec<Rule> =
        serde_json::from_str(json).map_err(|e| TranslationError::ParseError(e.to_string()))?;
    for rule in &rules {
        rule.validate()?;
    }
    Ok(rules)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_rules_parse_and_validate() {
        let rules = default_translation_rules().unwrap();
        assert!(!rules.is_empty());
        assert_eq!(rules[0].action(), "rename_dimension_keys");
        assert_eq!(rules.last().unwrap().action(), "drop_metrics");
    }

    #[test]
    fn test_default_rules_include_stateful_rules() {
        let rules = default_translation_rules().unwrap();
        assert!(rules.iter().any(Rule::is_stateful));
    }

    #[test]
    fn test_parse_rules_rejects_malformed_json() {
        let err = parse_rules(r#"[{"action": "rename_metrics"}]"#).unwrap_err();
        assert!(matches!(err, TranslationError::ParseError(_)));
    }

    #[test]
    fn test_parse_rules_rejects_invalid_rule() {
        let err = parse_rules(r#"[{"action": "drop_metrics", "metric_names": []}]"#).unwrap_err();
        assert!(matches!(
            err,
            TranslationError::InvalidRule {
                action: "drop_metrics",
                ..
            }
        ));
    }
}
