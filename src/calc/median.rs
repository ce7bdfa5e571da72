//! Median of a series of monthly expenditures

/// Median of `values`. Empty input yields 0.
///
/// Works on a sorted copy; the caller's slice is left untouched.
pub fn median(values: &[f64]) -> f64 {
    match values.len() {
        0 => 0.0,
        1 => values[0],
        n => {
            let mut sorted = values.to_vec();
            sorted.sort_by(|a, b| a.total_cmp(b));
            let mid = n / 2;
            if n % 2 == 1 {
                sorted[mid]
            } else {
                (sorted[mid - 1] + sorted[mid]) / 2.0
            }
        }
    }
}
