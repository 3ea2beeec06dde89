use crate::config::{Condition, DisplayRule};

impl DisplayRule {
    pub fn matches(&self, latency_ms: f64) -> bool {
        if !self.enabled {
            return false;
        }

        match self.condition {
            Condition::Less => latency_ms < self.threshold,
            Condition::Greater => latency_ms > self.threshold,
        }
    }
}

/// Labels of every enabled rule matching `latency_ms`, in rule order
pub fn classify(latency_ms: f64, rules: &[DisplayRule]) -> Vec<String> {
    rules
        .iter()
        .filter(|rule| rule.matches(latency_ms))
        .map(|rule| rule.label.clone())
        .collect()
}
