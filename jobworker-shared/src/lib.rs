//! Cross-cutting infrastructure shared by the worker runtime and task
//! catalog: logging (C1), the error model (C2), schema validation (C3),
//! cache-through reads (C4), the template registry (C8), and the response
//! builder (C9).

pub mod cache;
pub mod error;
pub mod logger;
pub mod response_builder;
pub mod schema;
pub mod template_registry;

pub use error::{ErrorKind, ErrorRecord};
pub use logger::{Field, Logger};
