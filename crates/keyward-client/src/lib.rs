//! Authenticated HTTP access for Keyward.
//!
//! Every call to a protected endpoint goes through [`AuthGateway`], which
//! attaches the session's bearer credential and, when the server answers
//! `401`, clears the session and sends the user back to re-authentication.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use keyward_client::{AuthGateway, AuthGuard, NullNavigator};
//! use keyward_session::SessionStore;
//!
//! # async fn example() -> keyward_client::Result<()> {
//! let session = Arc::new(SessionStore::in_memory());
//! let gateway = AuthGateway::builder()
//!     .base_url("http://localhost:8080")
//!     .session(session.clone())
//!     .navigator(Arc::new(NullNavigator))
//!     .build()?;
//!
//! gateway.auth().login("ada@example.com", "hunter22").await?;
//!
//! let guard = AuthGuard::new(gateway.clone());
//! let me = guard.ensure().await?;
//! println!("Signed in as {}", me.display_name());
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod error;
pub mod gateway;
pub mod guard;
pub mod navigation;
pub mod types;

pub use api::{AuthApi, HealthApi};
pub use error::{Error, Result};
pub use gateway::{AuthGateway, GatewayBuilder};
pub use guard::AuthGuard;
pub use navigation::{
    NavigationTarget, Navigator, NullNavigator, RecordingNavigator, SharedNavigator,
};
pub use types::*;

pub use keyward_session::Identity;
