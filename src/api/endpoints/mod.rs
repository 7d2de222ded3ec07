//! Endpoint handlers, one module per resource.

pub mod assess;
pub mod health;
pub mod history;
pub mod normalize;
