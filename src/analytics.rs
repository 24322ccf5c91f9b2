use std::collections::BTreeMap;

use crate::{
    record::StudentRecord,
    review::{StudentCard, overview},
};

const MOST_ACTIVE: usize = 5;

/// Class-wide progress numbers for the reviewer dashboard.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassAnalytics {
    pub total: usize,
    pub completed: usize,
    pub in_progress: usize,
    pub not_started: usize,
    pub average_completion: u8,
    pub most_active: Vec<StudentCard>,
    pub per_class: BTreeMap<String, usize>,
}

impl ClassAnalytics {
    pub fn from_records(records: &[StudentRecord]) -> Self {
        let total = records.len();
        let count = |f: fn(u8) -> bool| {
            records
                .iter()
                .filter(|r| f(r.completion_percentage))
                .count()
        };
        let sum: usize = records.iter().map(|r| r.completion_percentage as usize).sum();
        let average_completion = if total == 0 {
            0
        } else {
            ((2 * sum + total) / (2 * total)) as u8
        };
        let mut per_class = BTreeMap::new();
        for record in records {
            *per_class.entry(record.class_code.clone()).or_insert(0) += 1;
        }
        let mut most_active = overview(records);
        most_active.truncate(MOST_ACTIVE);
        Self {
            total,
            completed: count(|p| p == 100),
            in_progress: count(|p| p > 0 && p < 100),
            not_started: count(|p| p == 0),
            average_completion,
            most_active,
            per_class,
        }
    }

    /// Share of students in a bucket, as a percentage.
    pub fn share(&self, bucket: usize) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            bucket as f64 * 100.0 / self.total as f64
        }
    }
}
