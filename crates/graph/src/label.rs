//! Label disambiguation for duplicated steps.

use std::collections::HashSet;

/// Pick a label based on `label` that is not yet in `labels`, and record it.
///
/// A label ending in digits has that number incremented until it is free
/// (`"Map 9"` → `"Map 10"`).  Any other label gets `" 2"` appended first
/// and is then incremented the same way.
pub fn unique_label(label: &str, labels: &mut HashSet<String>) -> String {
    let mut candidate = label.to_owned();
    while labels.contains(&candidate) {
        candidate = next_label(&candidate);
    }
    labels.insert(candidate.clone());
    candidate
}

fn next_label(label: &str) -> String {
    let stem = label.trim_end_matches(|c: char| c.is_ascii_digit());
    let digits = &label[stem.len()..];

    match digits.parse::<u64>().ok().and_then(|n| n.checked_add(1)) {
        Some(n) if !digits.is_empty() => format!("{stem}{n}"),
        _ => format!("{label} 2"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(labels: &[&str]) -> HashSet<String> {
        labels.iter().map(|l| l.to_string()).collect()
    }

    #[test]
    fn free_label_is_kept() {
        let mut labels = set(&["other"]);
        assert_eq!(unique_label("Step", &mut labels), "Step");
        assert!(labels.contains("Step"));
    }

    #[test]
    fn taken_label_gets_suffix_then_increments() {
        let mut labels = set(&["Step"]);
        assert_eq!(unique_label("Step", &mut labels), "Step 2");
        assert_eq!(unique_label("Step", &mut labels), "Step 3");
    }

    #[test]
    fn numeric_suffix_is_incremented() {
        let mut labels = set(&["Map 9", "Map 10"]);
        assert_eq!(unique_label("Map 9", &mut labels), "Map 11");

        let mut labels = set(&["filter1"]);
        assert_eq!(unique_label("filter1", &mut labels), "filter2");
    }

    #[test]
    fn batch_never_repeats_a_label() {
        let mut labels = set(&["Filter"]);
        let chosen: Vec<_> = (0..4).map(|_| unique_label("Filter", &mut labels)).collect();
        assert_eq!(chosen, vec!["Filter 2", "Filter 3", "Filter 4", "Filter 5"]);
    }

    #[test]
    fn overflowing_suffix_falls_back_to_append() {
        let huge = "x99999999999999999999999";
        let mut labels = set(&[huge]);
        assert_eq!(unique_label(huge, &mut labels), format!("{huge} 2"));
    }
}
