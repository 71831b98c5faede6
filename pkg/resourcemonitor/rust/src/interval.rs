// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use crate::errors::{Error, Result};
use serde::Deserialize;
use std::fmt;
use std::time::Duration;

const MIN_INTERVAL: Duration = Duration::from_secs(1);
pub const MAX_INTERVAL: Duration = Duration::from_secs(365 * 24 * 3600);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    Milliseconds,
    #[default]
    Seconds,
    Minutes,
    Hours,
}

impl TimeUnit {
    fn duration(self, amount: u64) -> Duration {
        match self {
            TimeUnit::Milliseconds => Duration::from_millis(amount),
            TimeUnit::Seconds => Duration::from_secs(amount),
            TimeUnit::Minutes => Duration::from_secs(amount.saturating_mul(60)),
            TimeUnit::Hours => Duration::from_secs(amount.saturating_mul(3600)),
        }
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeUnit::Milliseconds => write!(f, "milliseconds"),
            TimeUnit::Seconds => write!(f, "seconds"),
            TimeUnit::Minutes => write!(f, "minutes"),
            TimeUnit::Hours => write!(f, "hours"),
        }
    }
}

/// Sampling cadence of a measurement type. Between one second and one year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Interval {
    amount: u64,
    unit: TimeUnit,
}

impl Interval {
    pub fn new(amount: u64, unit: TimeUnit) -> Result<Self> {
        let duration = unit.duration(amount);
        if !(MIN_INTERVAL..=MAX_INTERVAL).contains(&duration) {
            return Err(Error::InvalidInterval {
                amount,
                unit: unit.to_string(),
            });
        }
        Ok(Self { amount, unit })
    }

    pub fn seconds(amount: u64) -> Result<Self> {
        Self::new(amount, TimeUnit::Seconds)
    }

    pub fn amount(&self) -> u64 {
        self.amount
    }

    pub fn unit(&self) -> TimeUnit {
        self.unit
    }

    pub fn as_duration(&self) -> Duration {
        self.unit.duration(self.amount)
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount, self.unit)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_units() {
        assert_eq!(
            Interval::seconds(5).unwrap().as_duration(),
            Duration::from_secs(5)
        );
        assert_eq!(
            Interval::new(2, TimeUnit::Minutes).unwrap().as_duration(),
            Duration::from_secs(120)
        );
        assert_eq!(
            Interval::new(1500, TimeUnit::Milliseconds)
                .unwrap()
                .as_duration(),
            Duration::from_millis(1500)
        );
    }

    #[test]
    fn test_interval_below_one_second_rejected() {
        assert!(Interval::seconds(0).is_err());
        let err = Interval::new(999, TimeUnit::Milliseconds).unwrap_err();
        assert!(matches!(err, Error::InvalidInterval { amount: 999, .. }));
        assert!(Interval::new(1000, TimeUnit::Milliseconds).is_ok());
    }

    #[test]
    fn test_interval_above_one_year_rejected() {
        assert!(Interval::new(24 * 365, TimeUnit::Hours).is_ok());
        assert!(Interval::new(24 * 365 + 1, TimeUnit::Hours).is_err());
        let err = Interval::new(u64::MAX, TimeUnit::Hours).unwrap_err();
        assert!(matches!(err, Error::InvalidInterval { amount: u64::MAX, .. }));
        assert!(Interval::seconds(u64::MAX).is_err());
    }

    #[test]
    fn test_display() {
        let interval = Interval::new(30, TimeUnit::Seconds).unwrap();
        assert_eq!(interval.to_string(), "30 seconds");
    }
}
