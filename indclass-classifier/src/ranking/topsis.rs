//! TOPSIS multi-criteria scoring
//!
//! 1. Normalize each criterion column by its Euclidean norm
//! 2. Multiply by the criterion weight
//! 3. Ideal = column maximum, negative ideal = column minimum
//! 4. Score = d⁻ / (d⁺ + d⁻), 0.5 when both distances are zero
//!
//! All criteria are benefit criteria (higher is better).

/// Closeness of each row to the ideal solution, each in [0, 1]
///
/// Rows shorter than `weights` are treated as zero on the missing columns.
pub fn topsis_scores(rows: &[Vec<f64>], weights: &[f64]) -> Vec<f64> {
    if rows.is_empty() {
        return Vec::new();
    }
    let columns = weights.len();
    let value = |row: &Vec<f64>, j: usize| row.get(j).copied().unwrap_or(0.0);

    let norms: Vec<f64> = (0..columns)
        .map(|j| rows.iter().map(|r| value(r, j).powi(2)).sum::<f64>().sqrt())
        .collect();

    let weighted: Vec<Vec<f64>> = rows
        .iter()
        .map(|row| {
            (0..columns)
                .map(|j| {
                    if norms[j] > 0.0 {
                        value(row, j) / norms[j] * weights[j]
                    } else {
                        0.0
                    }
                })
                .collect()
        })
        .collect();

    let ideal: Vec<f64> = (0..columns)
        .map(|j| weighted.iter().map(|r| r[j]).fold(f64::NEG_INFINITY, f64::max))
        .collect();
    let negative_ideal: Vec<f64> = (0..columns)
        .map(|j| weighted.iter().map(|r| r[j]).fold(f64::INFINITY, f64::min))
        .collect();

    weighted
        .iter()
        .map(|row| {
            let to_ideal = distance(row, &ideal);
            let to_negative = distance(row, &negative_ideal);
            let total = to_ideal + to_negative;
            if total <= f64::EPSILON {
                0.5
            } else {
                (to_negative / total).clamp(0.0, 1.0)
            }
        })
        .collect()
}

fn distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f64>()
        .sqrt()
}
