//! Location request parameters and their mapping to provider criteria.
//!
//! A [`LocationRequest`] is built with chained setters, each of which
//! validates its argument immediately. Adapters never see an invalid
//! request. [`Criteria`] is the backend-agnostic power/accuracy intent
//! both adapter flavours derive from a request's priority.

use std::fmt;
use std::time::Duration;

use crate::error::HubError;

/// Power/accuracy tier of a location request.
///
/// The numeric codes match the ones used by the proprietary service, so
/// they can be passed through unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Priority {
    /// Best accuracy possible with zero additional power consumption.
    NoPower,
    /// "City" level accuracy (about 10km).
    LowPower,
    /// "Block" level accuracy (about 100m).
    BalancedPowerAccuracy,
    /// Most accurate locations available.
    HighAccuracy,
}

impl Priority {
    pub const ALL: [Priority; 4] = [
        Priority::HighAccuracy,
        Priority::BalancedPowerAccuracy,
        Priority::LowPower,
        Priority::NoPower,
    ];

    /// Wire code for this tier.
    pub fn code(self) -> i32 {
        match self {
            Priority::HighAccuracy => 100,
            Priority::BalancedPowerAccuracy => 102,
            Priority::LowPower => 104,
            Priority::NoPower => 105,
        }
    }
}

impl TryFrom<i32> for Priority {
    type Error = HubError;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        Priority::ALL
            .into_iter()
            .find(|p| p.code() == code)
            .ok_or_else(|| {
                HubError::InvalidArgument(format!("priority of {code} is not an accepted value"))
            })
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Priority::NoPower => "no-power",
            Priority::LowPower => "low-power",
            Priority::BalancedPowerAccuracy => "balanced-power-accuracy",
            Priority::HighAccuracy => "high-accuracy",
        };
        f.write_str(name)
    }
}

/// Parameters for a location update subscription.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocationRequest {
    priority: Option<Priority>,
    interval_ms: i64,
    fastest_interval_ms: i64,
    smallest_displacement: f32,
}

impl LocationRequest {
    /// Request with no priority, zero intervals and no displacement
    /// filter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Priority tier, or `None` if never set.
    pub fn priority(&self) -> Option<Priority> {
        self.priority
    }

    /// Set the priority tier. Infallible, so it chains without `?`.
    pub fn set_priority(&mut self, priority: Priority) -> &mut Self {
        self.priority = Some(priority);
        self
    }

    /// Set the priority from its numeric code.
    ///
    /// Only the four tier codes are accepted; anything else fails with
    /// [`HubError::InvalidArgument`] and leaves the request untouched.
    pub fn set_priority_code(&mut self, code: i32) -> Result<&mut Self, HubError> {
        self.priority = Some(Priority::try_from(code)?);
        Ok(self)
    }

    /// Desired interval for active updates, in milliseconds. Inexact.
    pub fn interval(&self) -> i64 {
        self.interval_ms
    }

    /// Set the active update interval.
    ///
    /// Negative values fail with [`HubError::InvalidArgument`] and leave
    /// the request untouched.
    pub fn set_interval(&mut self, millis: i64) -> Result<&mut Self, HubError> {
        if millis < 0 {
            return Err(HubError::InvalidArgument(
                "interval cannot be less than 0".into(),
            ));
        }
        self.interval_ms = millis;
        Ok(self)
    }

    /// Fastest interval for updates, in milliseconds. Exact.
    pub fn fastest_interval(&self) -> i64 {
        self.fastest_interval_ms
    }

    /// Set the fastest interval. Rejects negative values.
    pub fn set_fastest_interval(&mut self, millis: i64) -> Result<&mut Self, HubError> {
        if millis < 0 {
            return Err(HubError::InvalidArgument(
                "fastest interval cannot be less than 0".into(),
            ));
        }
        self.fastest_interval_ms = millis;
        Ok(self)
    }

    /// Minimum displacement between updates, in meters.
    pub fn smallest_displacement(&self) -> f32 {
        self.smallest_displacement
    }

    /// Set the displacement filter. Negative and NaN distances are
    /// rejected.
    pub fn set_smallest_displacement(&mut self, meters: f32) -> Result<&mut Self, HubError> {
        if meters.is_nan() || meters < 0.0 {
            return Err(HubError::InvalidArgument(
                "smallest displacement cannot be less than 0".into(),
            ));
        }
        self.smallest_displacement = meters;
        Ok(self)
    }

    /// Effective minimum delivery period: `max(fastest_interval, interval)`.
    pub fn effective_fastest_interval(&self) -> Duration {
        millis(self.fastest_interval_ms.max(self.interval_ms))
    }

    /// Backend-agnostic criteria derived from the priority.
    pub fn criteria(&self) -> Criteria {
        Criteria::from_priority(self.priority)
    }
}

/// Convert a validated (non-negative) millisecond count.
pub(crate) fn millis(ms: i64) -> Duration {
    Duration::from_millis(u64::try_from(ms).unwrap_or(0))
}

/// Power requirement of a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum PowerRequirement {
    #[default]
    NoRequirement,
    Low,
    Medium,
    High,
}

/// Accuracy requirement of a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AccuracyRequirement {
    #[default]
    NoRequirement,
    Coarse,
    Fine,
}

/// Power/accuracy intent both backends normalize against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Criteria {
    pub power: PowerRequirement,
    pub accuracy: AccuracyRequirement,
}

impl Criteria {
    /// Map a request priority to criteria.
    ///
    /// | priority | power | accuracy |
    /// |---|---|---|
    /// | NoPower | Low | Coarse |
    /// | LowPower | Low | - |
    /// | BalancedPowerAccuracy | Medium | - |
    /// | HighAccuracy | High | Fine |
    pub fn from_priority(priority: Option<Priority>) -> Self {
        let (power, accuracy) = match priority {
            Some(Priority::NoPower) => (PowerRequirement::Low, AccuracyRequirement::Coarse),
            Some(Priority::LowPower) => (PowerRequirement::Low, AccuracyRequirement::NoRequirement),
            Some(Priority::BalancedPowerAccuracy) => {
                (PowerRequirement::Medium, AccuracyRequirement::NoRequirement)
            }
            Some(Priority::HighAccuracy) => (PowerRequirement::High, AccuracyRequirement::Fine),
            None => (
                PowerRequirement::NoRequirement,
                AccuracyRequirement::NoRequirement,
            ),
        };
        Self { power, accuracy }
    }

    /// Cheapest criteria, used for on-demand last-location refreshes.
    pub fn low_power() -> Self {
        Self {
            power: PowerRequirement::Low,
            accuracy: AccuracyRequirement::Coarse,
        }
    }
}
