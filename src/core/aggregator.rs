use std::collections::HashMap;
use tracing::{debug, warn};

use crate::constants::OTHER_GROUP;
use crate::core::classifier::{ClassificationRun, ReferenceEntry};
use crate::core::labeler::LabelSet;
use crate::core::patterns::FieldKind;
use crate::core::record::{Record, Row};

/// Key to domain group for one chunk.
#[derive(Debug, Default, Clone)]
pub struct Assignment {
    groups: HashMap<String, String>,
    contested_keys: usize,
    failed_scans: usize,
}

impl Assignment {
    pub fn group_of(&self, key: &str) -> &str {
        self.groups.get(key).map(String::as_str).unwrap_or(OTHER_GROUP)
    }

    pub fn matched_keys(&self) -> usize {
        self.groups.len()
    }

    /// Keys claimed by more than one reference entry.
    pub fn contested_keys(&self) -> usize {
        self.contested_keys
    }

    pub fn failed_scans(&self) -> usize {
        self.failed_scans
    }
}

/// Rows headed for one sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkBatch {
    pub group: String,
    pub rows: Vec<Row>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PartitionStats {
    pub matched_rows: usize,
    pub other_rows: usize,
    pub keyless_rows: usize,
}

pub struct Aggregator {
    groups: Vec<String>,
    retain_keyless: bool,
    /// Owner of every key matched so far in the run. A key keeps its first owner across chunks.
    claims: HashMap<String, String>,
}

impl Aggregator {
    pub fn new(entries: &[ReferenceEntry], retain_keyless: bool) -> Self {
        Self {
            groups: entries.iter().map(|entry| entry.group.clone()).collect(),
            retain_keyless,
            claims: HashMap::new(),
        }
    }

    /// Every sink name: reference groups in catalog order, then `other`.
    pub fn sink_groups(&self) -> Vec<String> {
        let mut groups = self.groups.clone();
        groups.push(OTHER_GROUP.to_string());
        groups
    }

    /// Fold scan results in arrival order. The first entry to claim a key keeps it, and later
    /// chunks of the same run reuse that decision.
    pub fn fold(&mut self, run: ClassificationRun) -> Assignment {
        let mut assignment = Assignment {
            failed_scans: run.failures.len(),
            ..Default::default()
        };

        for result in run.results {
            for key in result.keys {
                let owner = self
                    .claims
                    .entry(key.clone())
                    .or_insert_with(|| result.group.clone());
                if *owner != result.group {
                    assignment.contested_keys += 1;
                    warn!(
                        "Key {} matches both {} and {}; keeping {} (claimed first)",
                        key, owner, result.group, owner
                    );
                }
                assignment.groups.insert(key, owner.clone());
            }
        }

        debug!(
            "Assigned {} keys to reference groups ({} contested)",
            assignment.groups.len(),
            assignment.contested_keys
        );
        assignment
    }

    /// Split a label set into one batch per sink, in sink order. Every keyed row lands in
    /// exactly one batch; empty batches are left out.
    pub fn partition(&self, set: &LabelSet, assignment: &Assignment) -> (Vec<SinkBatch>, PartitionStats) {
        let sink_groups = self.sink_groups();
        let slots: HashMap<&str, usize> = sink_groups
            .iter()
            .enumerate()
            .map(|(slot, group)| (group.as_str(), slot))
            .collect();
        let other_slot = sink_groups.len() - 1;

        let mut buckets: Vec<Vec<Row>> = vec![Vec::new(); sink_groups.len()];
        let mut stats = PartitionStats::default();

        for row in set.rows() {
            let group = assignment.group_of(row.key());
            let slot = slots.get(group).copied().unwrap_or(other_slot);
            if slot == other_slot {
                stats.other_rows += 1;
            } else {
                stats.matched_rows += 1;
            }
            buckets[slot].push(tag_row(row, &sink_groups[slot]));
        }

        if self.retain_keyless {
            for tokens in set.keyless_lines() {
                let mut record = Record::default();
                for token in tokens {
                    record.push_attribute(FieldKind::Other, token);
                }
                buckets[other_slot].push(Row::Labeled(record));
                stats.keyless_rows += 1;
            }
        }

        let batches = sink_groups
            .into_iter()
            .zip(buckets)
            .filter(|(_, rows)| !rows.is_empty())
            .map(|(group, rows)| SinkBatch { group, rows })
            .collect();

        (batches, stats)
    }
}

fn tag_row(row: &Row, group: &str) -> Row {
    match row {
        Row::Labeled(record) => {
            let mut record = record.clone();
            record.domain_group = group.to_string();
            Row::Labeled(record)
        }
        Row::Raw(tokens) => Row::Raw(tokens.clone()),
    }
}
