// Adapters layer: concrete flag clients (remote evaluation service, in-memory table).

pub mod http_client;
pub mod memory_client;
