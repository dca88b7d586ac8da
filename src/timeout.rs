//! Per-call timeout classification.

use std::time::Duration;

/// Caller-supplied timeout, before classification.
///
/// Numeric values are seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TimeoutValue {
    Integer(i64),
    Real(f64),
    Duration(Duration),
}

impl From<i64> for TimeoutValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for TimeoutValue {
    fn from(value: f64) -> Self {
        Self::Real(value)
    }
}

impl From<Duration> for TimeoutValue {
    fn from(value: Duration) -> Self {
        Self::Duration(value)
    }
}

/// What a would-block result turns into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Timeout {
    /// Suspend with no deadline.
    #[default]
    Forever,
    /// Suspend, asking the scheduler to resume the task after at most this long.
    Deadline(Duration),
    /// Never suspend: would-block is returned to the caller as is.
    Never,
}

impl Timeout {
    /// Classify an optional caller timeout.
    ///
    /// Absent means [`Timeout::Forever`]. Zero, whether integer or floating
    /// point, means [`Timeout::Never`]. Negative and NaN values still suspend,
    /// with a deadline that has already passed. Positive infinity means no
    /// deadline.
    pub fn classify(value: Option<TimeoutValue>) -> Self {
        let value = match value {
            Some(value) => value,
            None => return Self::Forever,
        };

        match value {
            TimeoutValue::Integer(0) => Self::Never,
            TimeoutValue::Integer(secs) if secs < 0 => Self::Deadline(Duration::ZERO),
            TimeoutValue::Integer(secs) => Self::Deadline(Duration::from_secs(secs as u64)),
            // -0.0 compares equal to zero.
            TimeoutValue::Real(secs) if secs == 0.0 => Self::Never,
            TimeoutValue::Real(secs) if secs.is_nan() || secs < 0.0 => Self::Deadline(Duration::ZERO),
            TimeoutValue::Real(secs) => match Duration::try_from_secs_f64(secs) {
                Ok(duration) => Self::Deadline(duration),
                // +inf or beyond Duration::MAX
                Err(_) => Self::Forever,
            },
            TimeoutValue::Duration(duration) if duration.is_zero() => Self::Never,
            TimeoutValue::Duration(duration) => Self::Deadline(duration),
        }
    }

    /// Returns true if a would-block result may be handed to the scheduler.
    pub fn may_suspend(&self) -> bool {
        !matches!(self, Self::Never)
    }

    /// The deadline a suspension carries, `None` meaning no deadline.
    ///
    /// Returns `None` for [`Timeout::Never`] as well; check
    /// [`may_suspend`](Self::may_suspend) first.
    pub fn deadline(&self) -> Option<Duration> {
        match self {
            Self::Deadline(duration) => Some(*duration),
            _ => None,
        }
    }
}

impl<T: Into<TimeoutValue>> From<Option<T>> for Timeout {
    fn from(value: Option<T>) -> Self {
        Self::classify(value.map(Into::into))
    }
}

impl From<Duration> for Timeout {
    fn from(value: Duration) -> Self {
        Self::classify(Some(value.into()))
    }
}
