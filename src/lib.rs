pub mod errors;
pub mod handlers;
pub mod models;
pub mod services;
pub mod state;
pub mod telemetry;
pub mod utils;

// Re-export commonly used types
pub use errors::{NotifierError, NotifierResult};
pub use services::dispatch_service::{DispatchOutcome, DispatchReport, Dispatcher};
