//! Small sequence and numeric helpers.

/// Whether two floats are equal up to `precision` decimal places.
pub fn almost_equal(v1: f64, v2: f64, precision: i32) -> bool {
    (v1 - v2).abs() < 10f64.powi(-precision)
}

/// Every `len / total`-th item of `values`, starting with the first.
///
/// The step is at least 1, so asking for more items than available returns
/// all of them.
pub fn sampling<T: Clone>(values: &[T], total: usize) -> Vec<T> {
    let step = (values.len() / total.max(1)).max(1);
    values.iter().step_by(step).cloned().collect()
}

/// Unique values, first-seen order preserved.
pub fn uniquify<T: PartialEq + Clone>(values: &[T]) -> Vec<T> {
    let mut unique: Vec<T> = Vec::with_capacity(values.len());
    for value in values {
        if !unique.contains(value) {
            unique.push(value.clone());
        }
    }
    unique
}
