pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use adapters::{
    api_client::ApiClient,
    long_polling::LongPollingTransport,
    session_store::{FileSessionStore, MemorySessionStore},
};
pub use config::ClientConfig;
pub use crate::core::{
    geo::{calculate_distance, calculate_eta, format_distance, is_valid_coordinates},
    hub_connection::{ConnectionState, HubConnection},
    realtime::{OrderUpdates, OrderUpdatesService},
};
pub use domain::model::{Coordinates, Session};
pub use utils::error::{Result, SqmError};
