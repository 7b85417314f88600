//! Assertions shared by progress-reporting tests.

/// Panic unless `values` never decrease and end at exactly `1.0`.
///
/// # Panics
///
/// Panics when the sequence is empty, decreases, or leaves `[0, 1]`.
pub fn assert_progress_complete(values: &[f64]) {
    assert!(!values.is_empty(), "no progress was reported");
    for pair in values.windows(2) {
        assert!(pair[0] <= pair[1], "progress went backwards: {values:?}");
    }
    assert!(
        values.iter().all(|value| (0.0..=1.0).contains(value)),
        "progress out of range: {values:?}"
    );
    let last = values[values.len() - 1];
    assert!((last - 1.0).abs() < f64::EPSILON, "final progress was {last}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_monotonic_sequence() {
        assert_progress_complete(&[0.25, 0.5, 0.5, 1.0]);
    }

    #[test]
    #[should_panic(expected = "backwards")]
    fn rejects_regression() {
        assert_progress_complete(&[0.5, 0.25, 1.0]);
    }
}
