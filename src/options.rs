//! Layered execution options.
//!
//! Option structs keep every field optional. Several of them can be stacked on
//! top of each other: a field set in a later layer overwrites the same field
//! from an earlier one, and a field left unset keeps whatever the earlier
//! layers chose (last write wins).

use std::time::Duration;

/// An options struct that can be stacked on top of another one.
pub trait Layered: Sized {
    /// Returns `self` with every field set in `over` replaced by `over`'s value.
    fn layer(self, over: Self) -> Self;
}

/// Folds `layers` left to right on top of `base`.
pub fn merge_options<O, I>(base: O, layers: I) -> O
where
    O: Layered,
    I: IntoIterator<Item = O>,
{
    layers.into_iter().fold(base, Layered::layer)
}

/// Retry behavior requested from the engine for a unit of work.
///
/// Interpreted by the engine only. A `None` field means "engine default".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetryPolicy {
    /// Delay before the first retry.
    pub initial_interval: Option<Duration>,
    /// Multiplier applied to the delay after every attempt.
    pub backoff_coefficient: Option<f64>,
    /// Upper bound for the delay between attempts.
    pub maximum_interval: Option<Duration>,
    /// Total attempts including the first one. `0` means unlimited.
    pub maximum_attempts: Option<u32>,
    /// Application failure messages that must never be retried.
    ///
    /// Compared verbatim against the `message` of [`crate::Error::Application`];
    /// other failure kinds are not matched.
    pub non_retryable_errors: Vec<String>,
}

impl RetryPolicy {
    /// Policy allowing at most `attempts` total attempts.
    pub fn with_maximum_attempts(attempts: u32) -> Self {
        Self {
            maximum_attempts: Some(attempts),
            ..Self::default()
        }
    }

    /// Sets the initial retry delay.
    pub fn with_initial_interval(mut self, interval: Duration) -> Self {
        self.initial_interval = Some(interval);
        self
    }

    /// Sets the backoff coefficient.
    pub fn with_backoff_coefficient(mut self, coefficient: f64) -> Self {
        self.backoff_coefficient = Some(coefficient);
        self
    }
}

/// Overwrites `base` with `over` when `over` is set.
pub(crate) fn pick<T>(base: Option<T>, over: Option<T>) -> Option<T> {
    over.or(base)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default, PartialEq)]
    struct Knobs {
        x: Option<u32>,
        y: Option<&'static str>,
    }

    impl Layered for Knobs {
        fn layer(self, over: Self) -> Self {
            Self {
                x: pick(self.x, over.x),
                y: pick(self.y, over.y),
            }
        }
    }

    #[test]
    fn later_layers_win() {
        let a = Knobs {
            x: Some(1),
            ..Knobs::default()
        };
        let b = Knobs {
            x: Some(2),
            ..Knobs::default()
        };
        assert_eq!(merge_options(Knobs::default(), [a, b]).x, Some(2));

        let a = Knobs {
            x: Some(1),
            ..Knobs::default()
        };
        let b = Knobs {
            x: Some(2),
            ..Knobs::default()
        };
        assert_eq!(merge_options(Knobs::default(), [b, a]).x, Some(1));
    }

    #[test]
    fn unset_fields_keep_earlier_values() {
        let base = Knobs {
            x: Some(1),
            y: Some("base"),
        };
        let over = Knobs {
            y: Some("over"),
            ..Knobs::default()
        };
        assert_eq!(
            merge_options(base, [over]),
            Knobs {
                x: Some(1),
                y: Some("over")
            }
        );
    }

    #[test]
    fn no_layers_is_identity() {
        let base = Knobs {
            x: Some(3),
            y: None,
        };
        assert_eq!(
            merge_options(base, std::iter::empty()),
            Knobs {
                x: Some(3),
                y: None
            }
        );
    }
}
