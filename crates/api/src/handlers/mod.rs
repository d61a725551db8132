//! Request handlers, one module per resource.

pub mod analysis;
pub mod clips;
pub mod events;
pub mod mappings;
pub mod matches;
pub mod metrics;
pub mod reviews;
