pub mod auth;
pub mod configuration;
pub mod domain;
pub mod error;
pub mod service;
pub mod store;
pub mod telemetry;

pub use domain::{SessionToken, TokenState, UserRecord};
pub use error::{AuthError, StoreError};
pub use service::AuthenticationService;
