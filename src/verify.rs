//! Equivalence checking between a reference and an accelerated result.

use core::fmt;

use crate::backend::ExecutionResult;

/// Outcome of comparing two outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict<T> {
    /// Every element agrees.
    Equal,
    /// First disagreeing element.
    Mismatch {
        /// Flat index of the element.
        index: usize,
        /// Reference value.
        expected: T,
        /// Accelerated value.
        actual: T,
    },
    /// The outputs do not even have the same length.
    LengthMismatch {
        /// Reference length.
        expected: usize,
        /// Accelerated length.
        actual: usize,
    },
}

impl<T> Verdict<T> {
    /// True for [`Verdict::Equal`].
    #[must_use]
    pub const fn is_equal(&self) -> bool {
        matches!(self, Self::Equal)
    }
}

impl<T: fmt::Display> fmt::Display for Verdict<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Equal => f.write_str("Equal"),
            Self::Mismatch {
                index,
                expected,
                actual,
            } => write!(
                f,
                "Not equal at index {index}: expected {expected}, got {actual}"
            ),
            Self::LengthMismatch { expected, actual } => write!(
                f,
                "Not equal: expected {expected} elements, got {actual}"
            ),
        }
    }
}

/// Compares `actual` against `expected` element by element, stopping at the
/// first difference.
#[must_use]
pub fn compare<T: Copy + PartialEq>(expected: &[T], actual: &[T]) -> Verdict<T> {
    if expected.len() != actual.len() {
        return Verdict::LengthMismatch {
            expected: expected.len(),
            actual: actual.len(),
        };
    }
    expected
        .iter()
        .zip(actual)
        .position(|(e, a)| e != a)
        .map_or(Verdict::Equal, |index| Verdict::Mismatch {
            index,
            expected: expected[index],
            actual: actual[index],
        })
}

/// [`compare`] over the outputs of two executions.
#[must_use]
pub fn check<T: Copy + PartialEq>(
    reference: &ExecutionResult<T>,
    accelerated: &ExecutionResult<T>,
) -> Verdict<T> {
    compare(&reference.output, &accelerated.output)
}
