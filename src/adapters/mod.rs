// Adapters layer: concrete implementations for external systems (REST API, hub transport, session storage).

pub mod api_client;
pub mod http;
pub mod long_polling;
pub mod session_store;
