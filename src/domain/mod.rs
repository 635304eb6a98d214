// Domain layer: API shapes, hub event payloads and ports. No I/O here.

pub mod events;
pub mod model;
pub mod ports;
