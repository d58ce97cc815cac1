// Domain layer: user/flag models and the flag-client port.

pub mod model;
pub mod ports;
