use crate::domain::model::Coordinates;
use crate::domain::ports::LocationProvider;
use crate::utils::error::{Result, SqmError};
use async_trait::async_trait;

/// Standard position-error codes reported by device location APIs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum GeolocationErrorCode {
    PermissionDenied = 1,
    PositionUnavailable = 2,
    Timeout = 3,
}

impl GeolocationErrorCode {
    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            1 => Some(Self::PermissionDenied),
            2 => Some(Self::PositionUnavailable),
            3 => Some(Self::Timeout),
            _ => None,
        }
    }

    pub fn code(&self) -> u16 {
        *self as u16
    }

    pub fn message(&self) -> &'static str {
        match self {
            Self::PermissionDenied => {
                "Location access was denied. Allow location access to see nearby vendors."
            }
            Self::PositionUnavailable => "Location information is unavailable.",
            Self::Timeout => "The request to get your location timed out.",
        }
    }
}

impl From<GeolocationErrorCode> for SqmError {
    fn from(code: GeolocationErrorCode) -> Self {
        SqmError::Geolocation { code: code.code() }
    }
}

pub fn message_for_code(code: u16) -> &'static str {
    GeolocationErrorCode::from_code(code)
        .map(|c| c.message())
        .unwrap_or("An unknown error occurred while getting your location.")
}

/// A provider that always reports the same position.
#[derive(Debug, Clone)]
pub struct FixedLocation {
    position: Option<Coordinates>,
}

impl FixedLocation {
    pub fn new(position: Coordinates) -> Self {
        Self {
            position: Some(position),
        }
    }

    /// A provider with no position, as when the device has no fix.
    pub fn unavailable() -> Self {
        Self { position: None }
    }
}

#[async_trait]
impl LocationProvider for FixedLocation {
    async fn current_position(&self) -> Result<Coordinates> {
        match self.position {
            Some(position) if position.is_valid() => Ok(position),
            Some(position) => Err(SqmError::InvalidCoordinates {
                latitude: position.latitude,
                longitude: position.longitude,
            }),
            None => Err(GeolocationErrorCode::PositionUnavailable.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_codes_map_to_fixed_messages() {
        assert_eq!(
            GeolocationErrorCode::from_code(1),
            Some(GeolocationErrorCode::PermissionDenied)
        );
        assert!(message_for_code(1).contains("denied"));
        assert!(message_for_code(3).contains("timed out"));
        assert!(message_for_code(42).contains("unknown"));
    }

    #[test]
    fn test_fixed_location() {
        let here = Coordinates {
            latitude: 21.0285,
            longitude: 105.8542,
        };
        let provider = FixedLocation::new(here);
        assert_eq!(
            tokio_test::block_on(provider.current_position()).unwrap(),
            here
        );

        let err = tokio_test::block_on(FixedLocation::unavailable().current_position()).unwrap_err();
        assert!(matches!(err, SqmError::Geolocation { code: 2 }));
    }
}
