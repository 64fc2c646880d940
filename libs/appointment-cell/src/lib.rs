pub mod error;
pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

// Re-export models and services for external use
pub use error::{AppointmentError, ErrorKind};
pub use models::*;
pub use services::*;
