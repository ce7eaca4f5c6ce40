//! Descriptive statistics over confidence values
//!
//! Empty inputs yield 0.0 everywhere so callers never divide by zero.

use std::cmp::Ordering;

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population variance
pub fn variance(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64
}

pub fn std_dev(values: &[f64]) -> f64 {
    variance(values).sqrt()
}

pub fn sorted(values: &[f64]) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    sorted
}

/// Linear-interpolated quantile, `q` in [0, 1]
pub fn quantile(values: &[f64], q: f64) -> f64 {
    let sorted = sorted(values);
    if sorted.is_empty() {
        return 0.0;
    }
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    let frac = pos - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * frac
}

pub fn median(values: &[f64]) -> f64 {
    quantile(values, 0.5)
}

/// Most frequent value after rounding to two decimals; ties pick the
/// smallest value
pub fn mode(values: &[f64]) -> f64 {
    let mut buckets: Vec<(i64, usize)> = Vec::new();
    for v in values {
        let key = (v * 100.0).round() as i64;
        match buckets.iter_mut().find(|(k, _)| *k == key) {
            Some((_, count)) => *count += 1,
            None => buckets.push((key, 1)),
        }
    }
    buckets
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(&a.0)))
        .map_or(0.0, |(k, _)| k as f64 / 100.0)
}

/// Shannon entropy of a count distribution, normalized to [0, 1]
pub fn normalized_entropy(counts: &[usize]) -> f64 {
    let total: usize = counts.iter().sum();
    let present = counts.iter().filter(|&&c| c > 0).count();
    if total == 0 || present < 2 {
        return 0.0;
    }
    let entropy: f64 = counts
        .iter()
        .filter(|&&c| c > 0)
        .map(|&c| {
            let p = c as f64 / total as f64;
            -p * p.ln()
        })
        .sum();
    entropy / (present as f64).ln()
}

/// Reorder neighbours whose scores lie within `epsilon` by `tie_break`
///
/// `items` must already be sorted by score, descending. An item moves ahead
/// of its predecessor only while both scores stay within `epsilon` and
/// `tie_break` puts it first, so the pass is deterministic.
pub fn settle_near_ties<T, S, B>(items: &mut [T], epsilon: f64, score: S, tie_break: B)
where
    S: Fn(&T) -> f64,
    B: Fn(&T, &T) -> Ordering,
{
    for i in 1..items.len() {
        let mut j = i;
        while j > 0
            && (score(&items[j - 1]) - score(&items[j])).abs() <= epsilon
            && tie_break(&items[j], &items[j - 1]) == Ordering::Less
        {
            items.swap(j - 1, j);
            j -= 1;
        }
    }
}

/// Descending comparison of two scores
pub fn desc(a: f64, b: f64) -> Ordering {
    b.total_cmp(&a)
}
