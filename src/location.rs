//! Location fix value type.

use std::fmt;
use std::time::SystemTime;

/// Provider name reserved for the synthetic mock provider.
///
/// No real backend provider may use this name.
pub const MOCK_PROVIDER: &str = "mockProvider";

/// A single location fix.
#[derive(Debug, Clone, PartialEq)]
pub struct Location {
    /// Name of the provider that produced this fix.
    pub provider: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Altitude above the WGS84 ellipsoid, in meters.
    pub altitude: Option<f64>,
    /// Horizontal accuracy radius, in meters.
    pub accuracy: Option<f32>,
    pub time: SystemTime,
}

impl Location {
    /// Create a fix stamped with the current time.
    pub fn new(provider: impl Into<String>, latitude: f64, longitude: f64) -> Self {
        Self {
            provider: provider.into(),
            latitude,
            longitude,
            altitude: None,
            accuracy: None,
            time: SystemTime::now(),
        }
    }

    /// Create a fix tagged with [`MOCK_PROVIDER`].
    pub fn mock(latitude: f64, longitude: f64) -> Self {
        Self::new(MOCK_PROVIDER, latitude, longitude)
    }

    pub fn with_altitude(mut self, altitude: f64) -> Self {
        self.altitude = Some(altitude);
        self
    }

    pub fn with_accuracy(mut self, meters: f32) -> Self {
        self.accuracy = Some(meters);
        self
    }

    /// Whether this fix came from the synthetic mock provider.
    pub fn is_mock(&self) -> bool {
        self.provider == MOCK_PROVIDER
    }

    /// Great-circle distance to `other`, in meters (haversine).
    pub fn distance_to(&self, other: &Location) -> f64 {
        const EARTH_RADIUS_M: f64 = 6_371_008.8;

        let (lat1, lat2) = (self.latitude.to_radians(), other.latitude.to_radians());
        let dlat = lat2 - lat1;
        let dlon = (other.longitude - self.longitude).to_radians();

        let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_M * a.sqrt().asin()
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Location[{} {:.6},{:.6}",
            self.provider, self.latitude, self.longitude
        )?;
        if let Some(alt) = self.altitude {
            write!(f, " alt={alt:.1}")?;
        }
        if let Some(acc) = self.accuracy {
            write!(f, " acc={acc:.0}")?;
        }
        f.write_str("]")
    }
}
