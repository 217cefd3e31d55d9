//! Precedence-based deduplication of anomaly candidates.

use std::collections::{HashMap, HashSet};

use crate::core::Anomaly;

/// A candidate anomaly tagged with the evaluation order of its rule.
#[derive(Debug, Clone)]
pub struct Candidate {
    /// Position of the producing rule in evaluation order
    pub rule_order: usize,
    pub anomaly: Anomaly,
}

/// Result of deduplicating a run's candidates.
#[derive(Debug, Clone, Default)]
pub struct DedupOutcome {
    /// Surviving anomalies in report order
    pub retained: Vec<Anomaly>,
    /// Number of candidates removed
    pub suppressed: usize,
    /// Surviving anomalies that lost some of their units to an earlier claim
    pub narrowed: usize,
    /// Surviving anomalies per rule id
    pub retained_by_rule: HashMap<String, usize>,
}

/// Reports every unit in at most one anomaly.
///
/// Candidates must arrive in rule order, each rule's output in emission order.
/// They are visited by precedence, then rule order, then emission; each one
/// claims its primary and affected units. A candidate whose units are all
/// claimed already is suppressed. One with only some units claimed keeps the
/// rest and picks a new primary unit from them. Survivors are sorted by
/// precedence, priority, rule order, location and unit id.
pub fn deduplicate(mut candidates: Vec<Candidate>) -> DedupOutcome {
    candidates.sort_by_key(|c| (c.anomaly.precedence, c.rule_order));

    let mut claimed: HashSet<String> = HashSet::new();
    let mut survivors: Vec<Candidate> = Vec::with_capacity(candidates.len());
    let mut suppressed = 0;
    let mut narrowed = 0;

    for mut candidate in candidates {
        let units = candidate.anomaly.claimed_units();
        let total = units.len();
        let open: Vec<String> = units
            .into_iter()
            .filter(|unit| !claimed.contains(*unit))
            .map(str::to_string)
            .collect();

        if open.is_empty() {
            suppressed += 1;
            continue;
        }
        if open.len() < total {
            candidate.anomaly.narrow(open.clone());
            narrowed += 1;
        }
        claimed.extend(open);
        survivors.push(candidate);
    }

    survivors.sort_by(|a, b| {
        a.anomaly
            .precedence
            .cmp(&b.anomaly.precedence)
            .then_with(|| a.anomaly.priority.cmp(&b.anomaly.priority))
            .then_with(|| a.rule_order.cmp(&b.rule_order))
            .then_with(|| a.anomaly.location.cmp(&b.anomaly.location))
            .then_with(|| a.anomaly.unit_id.cmp(&b.anomaly.unit_id))
    });

    let mut retained_by_rule: HashMap<String, usize> = HashMap::new();
    for survivor in &survivors {
        *retained_by_rule
            .entry(survivor.anomaly.rule_id.clone())
            .or_default() += 1;
    }

    DedupOutcome {
        retained: survivors.into_iter().map(|c| c.anomaly).collect(),
        suppressed,
        narrowed,
        retained_by_rule,
    }
}
