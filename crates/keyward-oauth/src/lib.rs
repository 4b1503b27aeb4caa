//! OAuth 2.0 authorization code flow for Keyward.
//!
//! # Components
//!
//! - [`flow`] - the `OAuthFlow` state machine, from authorization redirect to cached identity
//! - [`request`] - authorization request and URL building
//! - [`callback`] - inbound redirect parameters
//! - [`token`] - code-for-token exchange
//! - [`pkce`] - PKCE challenge and `state` generation
//! - [`listener`] - one-shot loopback server that receives the redirect

pub mod callback;
pub mod error;
pub mod flow;
pub mod listener;
pub mod pkce;
pub mod request;
pub mod token;

pub use callback::CallbackParams;
pub use error::{FailureReason, OAuthError, Result};
pub use flow::{FlowState, OAuthFlow};
pub use listener::{CallbackListener, PendingCallback};
pub use pkce::{PkceChallenge, generate_state};
pub use request::AuthorizationRequest;
pub use token::TokenResponse;
