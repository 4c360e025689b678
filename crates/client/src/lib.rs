//! # CCR Client
//!
//! Everything that talks to the outside world on behalf of the coding
//! review client:
//! - [`config`]: environment-provided configuration
//! - [`auth`]: the identity-provider seam and token broker
//! - [`gateway`]: authorized HTTP calls against the backend REST surface
//! - [`workflow`]: the episode workflow controller
//!
//! Pure domain models live in `ccr-core`; this crate layers transport,
//! sessions, and workflow execution on top of them.

pub mod auth;
pub mod config;
pub mod gateway;
pub mod workflow;

pub use auth::{AccessToken, Account, AuthError, EnvIdentityProvider, IdentityProvider, TokenBroker};
pub use config::ClientConfig;
pub use gateway::{ApiClient, ClientError};
pub use workflow::{WorkflowController, WorkflowError};
