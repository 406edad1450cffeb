// Adapters layer: concrete scanner and UI implementations for a terminal.

pub mod terminal;
pub mod wedge;
