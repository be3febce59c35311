//! Rolling percentile rank with average-rank tie handling.
//!
//! For a trailing window of `n` values ending at the current one, with `less`
//! values strictly below the current value and `equal` values equal to it
//! (itself included), the rank is `(less + (equal + 1) / 2) / n`. The window
//! grows from 1 at the start of the series up to `window`.

use std::cmp::Ordering;

/// 30 days of 5-minute bars.
pub const RANK_WINDOW: usize = 8640;

/// Percentile rank of every element against its trailing window.
///
/// A `window` of 0 is treated as 1.
pub fn rolling_pct_rank(values: &[f64], window: usize) -> Vec<f64> {
    let window = window.max(1);
    let keys = sorted_keys(values);
    let slots: Vec<usize> = values.iter().map(|&v| slot_of(&keys, v)).collect();

    let mut counts = Fenwick::new(keys.len());
    let mut ranks = Vec::with_capacity(values.len());

    for (i, &slot) in slots.iter().enumerate() {
        counts.add(slot, 1);
        if i >= window {
            counts.add(slots[i - window], -1);
        }
        let n = (i + 1).min(window) as f64;
        let less = counts.prefix(slot) as f64;
        let equal = counts.prefix(slot + 1) as f64 - less;
        ranks.push((less + (equal + 1.0) / 2.0) / n);
    }

    ranks
}

/// Percentile rank of `current` within `window` (which must contain it).
pub fn percentile_rank(window: &[f64], current: f64) -> f64 {
    if window.is_empty() {
        return 0.0;
    }
    let current = normalize(current);
    let mut less = 0usize;
    let mut equal = 0usize;
    for &v in window {
        match normalize(v).total_cmp(&current) {
            Ordering::Less => less += 1,
            Ordering::Equal => equal += 1,
            Ordering::Greater => {}
        }
    }
    (less as f64 + (equal as f64 + 1.0) / 2.0) / window.len() as f64
}

// -0.0 and 0.0 must compare equal under total_cmp
fn normalize(v: f64) -> f64 {
    v + 0.0
}

fn sorted_keys(values: &[f64]) -> Vec<f64> {
    let mut keys: Vec<f64> = values.iter().map(|&v| normalize(v)).collect();
    keys.sort_by(f64::total_cmp);
    keys.dedup_by(|a, b| a.total_cmp(b) == Ordering::Equal);
    keys
}

fn slot_of(keys: &[f64], value: f64) -> usize {
    let value = normalize(value);
    keys.partition_point(|k| k.total_cmp(&value) == Ordering::Less)
}

/// Binary indexed tree of counts over value slots.
struct Fenwick {
    tree: Vec<i64>,
}

impl Fenwick {
    fn new(len: usize) -> Self {
        Self {
            tree: vec![0; len + 1],
        }
    }

    fn add(&mut self, slot: usize, delta: i64) {
        let mut i = slot + 1;
        while i < self.tree.len() {
            self.tree[i] += delta;
            i += i & i.wrapping_neg();
        }
    }

    /// Sum of counts in slots `[0, end)`.
    fn prefix(&self, end: usize) -> i64 {
        let mut i = end;
        let mut sum = 0;
        while i > 0 {
            sum += self.tree[i];
            i -= i & i.wrapping_neg();
        }
        sum
    }
}
