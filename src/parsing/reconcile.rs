use std::collections::HashMap;

use super::models::{ReconciledBatch, SubmarineEta, MAX_BATCH_SIZE};

/// Collapse one capture's candidates to the authoritative record per name.
///
/// The smallest countdown wins for a repeated name; ties between names are broken
/// by name so the output does not depend on input order.
pub fn reconcile(candidates: Vec<SubmarineEta>) -> ReconciledBatch {
    let mut best: HashMap<String, SubmarineEta> = HashMap::new();

    for candidate in candidates {
        match best.get(&candidate.name) {
            Some(existing) if existing.remaining_minutes <= candidate.remaining_minutes => {}
            _ => {
                best.insert(candidate.name.clone(), candidate);
            }
        }
    }

    let mut records: Vec<SubmarineEta> = best.into_values().collect();
    records.sort_by(|a, b| {
        a.remaining_minutes
            .cmp(&b.remaining_minutes)
            .then_with(|| a.name.cmp(&b.name))
    });
    records.truncate(MAX_BATCH_SIZE);

    ReconciledBatch::from_sorted(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn eta(name: &str, minutes: u32) -> SubmarineEta {
        SubmarineEta::new(name, minutes, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
    }

    #[test]
    fn keeps_shortest_per_name() {
        let batch = reconcile(vec![eta("A", 65), eta("B", 30), eta("A", 40), eta("A", 90)]);
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.get("A").map(|r| r.remaining_minutes), Some(40));
        assert_eq!(batch.get("A").map(|r| r.eta), Some(eta("A", 40).eta));
    }

    #[test]
    fn caps_at_four_soonest() {
        let batch = reconcile(vec![
            eta("F", 600),
            eta("A", 10),
            eta("E", 500),
            eta("C", 30),
            eta("B", 20),
            eta("D", 40),
        ]);
        let names: Vec<&str> = batch.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B", "C", "D"]);
    }

    #[test]
    fn equal_countdowns_order_by_name() {
        let batch = reconcile(vec![eta("Z", 5), eta("M", 5)]);
        let names: Vec<&str> = batch.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["M", "Z"]);
    }

    #[test]
    fn empty_input_gives_empty_batch() {
        assert!(reconcile(Vec::new()).is_empty());
    }
}
