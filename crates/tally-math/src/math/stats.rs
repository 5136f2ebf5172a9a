//! Descriptive statistics over short numeric series.

/// Arithmetic mean; `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Population standard deviation (divides by n, not n - 1).
pub fn population_std(values: &[f64]) -> Option<f64> {
    let m = mean(values)?;
    let ss: f64 = values.iter().map(|v| (v - m) * (v - m)).sum();
    Some((ss / values.len() as f64).sqrt())
}

/// Coefficient of variation in percent: `100 · std / mean`.
///
/// Zero mean gives 0 rather than a division by zero.
pub fn coefficient_of_variation_pct(values: &[f64]) -> Option<f64> {
    let m = mean(values)?;
    let sd = population_std(values)?;
    if m == 0.0 {
        return Some(0.0);
    }
    Some(100.0 * sd / m)
}

/// Ordinary least-squares slope of `ys` against the indices `0..n`.
///
/// `(nΣxy − ΣxΣy) / (nΣx² − (Σx)²)`; a zero denominator (fewer than two
/// points) yields 0.
pub fn ols_slope(ys: &[f64]) -> f64 {
    let n = ys.len() as f64;
    let (mut sx, mut sy, mut sxy, mut sxx) = (0.0, 0.0, 0.0, 0.0);
    for (i, y) in ys.iter().enumerate() {
        let x = i as f64;
        sx += x;
        sy += y;
        sxy += x * y;
        sxx += x * x;
    }
    let denom = n * sxx - sx * sx;
    if denom == 0.0 {
        return 0.0;
    }
    (n * sxy - sx * sy) / denom
}
