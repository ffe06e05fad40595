//! Style domain: the persisted config record, prompt → config generation,
//! and config → restyled-document application.

pub mod applier;
pub mod generator;
pub mod model;

pub use applier::StyleApplier;
pub use generator::StyleGenerator;
pub use model::StyleConfig;
