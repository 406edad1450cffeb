pub mod app;
pub mod lookup;
pub mod presenter;
pub mod session;

pub use crate::domain::model::{LookupOutcome, NutritionRecord, ScanResult, Symbology};
pub use crate::domain::ports::{LookupService, Prompt, Scanner, View};
pub use crate::utils::error::Result;
