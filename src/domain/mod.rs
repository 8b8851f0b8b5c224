// Domain layer: core models and ports (interfaces). No transport or file-format code here.

pub mod model;
pub mod ports;
