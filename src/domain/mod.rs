// Domain layer: core models and ports (interfaces) toward the scanner,
// the nutrition service and the UI.

pub mod model;
pub mod ports;
