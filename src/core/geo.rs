//! Great-circle distance and walking-time estimates.
//!
//! All functions here are pure. [`calculate_distance`] does not validate its
//! input; callers guard with [`is_valid_coordinates`] first.

use crate::domain::model::Coordinates;
use crate::utils::error::{Result, SqmError};

pub const EARTH_RADIUS_KM: f64 = 6371.0;
pub const WALKING_SPEED_KMH: f64 = 5.0;

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self> {
        if !is_valid_coordinates(latitude, longitude) {
            return Err(SqmError::InvalidCoordinates {
                latitude,
                longitude,
            });
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }

    pub fn is_valid(&self) -> bool {
        is_valid_coordinates(self.latitude, self.longitude)
    }

    pub fn distance_to(&self, other: &Coordinates) -> f64 {
        calculate_distance(self, other)
    }
}

/// Haversine distance in kilometers.
///
/// Precision degrades for exactly antipodal points.
pub fn calculate_distance(from: &Coordinates, to: &Coordinates) -> f64 {
    let lat1 = from.latitude.to_radians();
    let lat2 = to.latitude.to_radians();
    let d_lat = (to.latitude - from.latitude).to_radians();
    let d_lon = (to.longitude - from.longitude).to_radians();

    let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}

pub fn is_valid_coordinates(latitude: f64, longitude: f64) -> bool {
    latitude.is_finite()
        && longitude.is_finite()
        && (-90.0..=90.0).contains(&latitude)
        && (-180.0..=180.0).contains(&longitude)
}

/// `"850 m"` below one kilometer, `"1.2 km"` otherwise.
pub fn format_distance(distance_km: f64) -> String {
    if distance_km < 1.0 {
        format!("{} m", (distance_km * 1000.0).round() as i64)
    } else {
        format!("{:.1} km", distance_km)
    }
}

/// Walking time in whole minutes at [`WALKING_SPEED_KMH`].
pub fn calculate_eta(distance_km: f64) -> u32 {
    let minutes = distance_km / WALKING_SPEED_KMH * 60.0;
    minutes.max(0.0).round() as u32
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ranked<T> {
    pub item: T,
    pub distance_km: f64,
    pub eta_minutes: u32,
}

impl<T> Ranked<T> {
    pub fn formatted_distance(&self) -> String {
        format_distance(self.distance_km)
    }
}

/// Sorts `items` nearest-first from `origin`.
///
/// Items whose location is invalid are dropped. Equal distances keep their
/// input order.
pub fn rank_by_distance<T, F>(origin: &Coordinates, items: Vec<T>, location_of: F) -> Vec<Ranked<T>>
where
    F: Fn(&T) -> Coordinates,
{
    let mut ranked: Vec<Ranked<T>> = items
        .into_iter()
        .filter_map(|item| {
            let location = location_of(&item);
            if !location.is_valid() {
                tracing::debug!(
                    "Skipping item with invalid location ({}, {})",
                    location.latitude,
                    location.longitude
                );
                return None;
            }
            let distance_km = calculate_distance(origin, &location);
            Some(Ranked {
                item,
                distance_km,
                eta_minutes: calculate_eta(distance_km),
            })
        })
        .collect();

    ranked.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));
    ranked
}

pub fn within_radius<T, F>(
    origin: &Coordinates,
    items: Vec<T>,
    location_of: F,
    radius_km: f64,
) -> Vec<Ranked<T>>
where
    F: Fn(&T) -> Coordinates,
{
    rank_by_distance(origin, items, location_of)
        .into_iter()
        .take_while(|ranked| ranked.distance_km <= radius_km)
        .collect()
}
