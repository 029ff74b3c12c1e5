//! Assertions over floating-point slices, shared by the test suites of the workspace crates.

use assert_float_eq::*;

/// Asserts that two slices are of equal length and that every pair of elements is within
/// `distance` ULPs of each other.
pub fn assert_slice_f64_near(expected: &[f64], actual: &[f64], distance: u32) {
    assert_eq!(
        expected.len(),
        actual.len(),
        "lengths do not match: {} ≠ {}",
        expected.len(),
        actual.len()
    );
    for (index, &expected) in expected.iter().enumerate() {
        let actual = actual[index];
        if actual != expected {
            assert_f64_near!(expected, actual, distance);
        }
    }
}

/// Asserts that two slices are of equal length and that every pair of elements agrees to within
/// a relative `epsilon`.
pub fn assert_slice_f64_relative(expected: &[f64], actual: &[f64], epsilon: f64) {
    assert_eq!(
        expected.len(),
        actual.len(),
        "lengths do not match: {} ≠ {}",
        expected.len(),
        actual.len()
    );
    for (index, &expected) in expected.iter().enumerate() {
        let actual = actual[index];
        if actual != expected {
            assert_float_relative_eq!(expected, actual, epsilon);
        }
    }
}

/// Asserts that two slices are of equal length and that every pair of elements agrees to within
/// an absolute `epsilon`.
pub fn assert_slice_f64_absolute(expected: &[f64], actual: &[f64], epsilon: f64) {
    assert_eq!(
        expected.len(),
        actual.len(),
        "lengths do not match: {} ≠ {}",
        expected.len(),
        actual.len()
    );
    for (index, &expected) in expected.iter().enumerate() {
        assert_float_absolute_eq!(expected, actual[index], epsilon);
    }
}

/// Draws a uniformly distributed value from `[range.start(), range.end()]` for fuzzing numeric
/// properties.
pub fn uniform(rand: &mut impl tinyrand::Rand, range: std::ops::RangeInclusive<f64>) -> f64 {
    let unit = rand.next_u64() as f64 / u64::MAX as f64;
    range.start() + unit * (range.end() - range.start())
}
