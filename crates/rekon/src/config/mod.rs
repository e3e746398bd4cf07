pub mod context;
pub mod properties;

pub use context::{ReconciliationContext, ReconciliationMode};
pub use properties::{Configuration, PropertyKind, PropertySpec};
