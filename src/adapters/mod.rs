// Adapters layer: concrete implementations for external systems (transport, dust map, light-curve files).

pub mod dust_map;
pub mod light_curve;
pub mod rpc;
