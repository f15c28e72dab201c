use std::{collections::BTreeMap, time::Duration};

use serde::{Deserialize, Serialize};

use crate::task::{Outcome, TaskResult};

/// Running counters over a set of [`TaskResult`]s.
///
/// A `Tally` keeps only what is needed to derive the final statistics later
/// (counts, latency sum over successes, failures per kind); the derived numbers
/// themselves live in [`crate::summary::ExecutionSummary`].
///
/// `merge` is associative and commutative, so tallies built over disjoint slices of
/// a run can be combined in any order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Tally {
    pub count: usize,
    pub success_count: usize,
    /// Sum of durations of *successful* invocations only.
    pub success_latency: Duration,
    /// Failure count per error kind.
    pub errors: BTreeMap<String, usize>,
}

impl Tally {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume every result of a slice.
    pub fn aggregate<T>(&mut self, results: &[TaskResult<T>]) {
        results.iter().for_each(|r| self.consume(r));
    }

    pub fn consume<T>(&mut self, result: &TaskResult<T>) {
        self.count += 1;
        match &result.outcome {
            Outcome::Success(_) => {
                self.success_count += 1;
                self.success_latency += result.duration;
            }
            Outcome::Failure(err) => {
                *self.errors.entry(err.kind.clone()).or_default() += 1;
            }
        }
    }

    pub fn merge(&mut self, other: Self) {
        self.count += other.count;
        self.success_count += other.success_count;
        self.success_latency += other.success_latency;
        for (kind, n) in other.errors {
            *self.errors.entry(kind).or_default() += n;
        }
    }

    pub fn failure_count(&self) -> usize {
        self.count - self.success_count
    }

    /// Mean duration over successful invocations, zero when there are none.
    pub fn average_latency(&self) -> Duration {
        if self.success_count == 0 {
            return Duration::ZERO;
        }
        self.success_latency.div_f64(self.success_count as f64)
    }

    /// Percentage of successful invocations in `[0, 100]`, zero when empty.
    pub fn success_rate(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        self.success_count as f64 / self.count as f64 * 100.0
    }
}

impl<T> FromIterator<TaskResult<T>> for Tally {
    fn from_iter<I: IntoIterator<Item = TaskResult<T>>>(iter: I) -> Self {
        let mut tally = Tally::new();
        iter.into_iter().for_each(|r| tally.consume(&r));
        tally
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::ErrorDescriptor;
    use chrono::Utc;

    fn ok(id: u64, millis: u64) -> TaskResult<()> {
        TaskResult {
            sequence_id: id,
            outcome: Outcome::Success(()),
            duration: Duration::from_millis(millis),
            completed_at: Utc::now(),
        }
    }

    fn failed(id: u64, kind: &str, millis: u64) -> TaskResult<()> {
        TaskResult {
            sequence_id: id,
            outcome: Outcome::Failure(ErrorDescriptor::new(kind, "nope")),
            duration: Duration::from_millis(millis),
            completed_at: Utc::now(),
        }
    }

    #[test]
    fn failures_do_not_count_towards_latency() {
        let mut tally = Tally::new();
        tally.aggregate(&[ok(1, 100), ok(2, 300), failed(3, "Timeout", 5_000)]);

        assert_eq!(tally.count, 3);
        assert_eq!(tally.success_count, 2);
        assert_eq!(tally.failure_count(), 1);
        assert_eq!(tally.average_latency(), Duration::from_millis(200));
    }

    #[test]
    fn empty_tally_is_all_zero() {
        let tally = Tally::new();
        assert_eq!(tally.average_latency(), Duration::ZERO);
        assert_eq!(tally.success_rate(), 0.0);
        assert_eq!(tally.failure_count(), 0);
    }

    #[test]
    fn errors_grouped_by_kind() {
        let tally: Tally = vec![
            failed(1, "Timeout", 1),
            failed(2, "Refused", 1),
            failed(3, "Timeout", 1),
            ok(4, 1),
        ]
        .into_iter()
        .collect();

        assert_eq!(tally.errors.get("Timeout"), Some(&2));
        assert_eq!(tally.errors.get("Refused"), Some(&1));
        assert_eq!(tally.success_rate(), 25.0);
    }

    #[test]
    fn merge_matches_single_pass() {
        let results = vec![
            ok(1, 10),
            failed(2, "Timeout", 20),
            ok(3, 30),
            failed(4, "Refused", 40),
            ok(5, 50),
        ];
        let mut whole = Tally::new();
        whole.aggregate(&results);

        let mut left = Tally::new();
        left.aggregate(&results[..2]);
        let mut right = Tally::new();
        right.aggregate(&results[2..]);

        let mut ab = left.clone();
        ab.merge(right.clone());
        let mut ba = right;
        ba.merge(left);

        assert_eq!(ab, whole);
        assert_eq!(ba, whole);
    }
}
