pub mod geo;
pub mod geolocation;
pub mod hub_connection;
pub mod hub_protocol;
pub mod realtime;

pub use crate::domain::model::Coordinates;
pub use crate::domain::ports::{HubTransport, LocationProvider, SessionStore};
pub use crate::utils::error::Result;
