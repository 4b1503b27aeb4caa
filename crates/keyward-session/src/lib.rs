//! Process-local session store for Keyward.
//!
//! Holds the single answer to "am I authenticated, and as whom": the bearer
//! credential issued by login or the OAuth flow, plus the identity record
//! resolved for it.
//!
//! # Components
//!
//! - [`store`] - [`SessionStore`], the serialized owner of session state
//! - [`medium`] - where the session is persisted ([`FileMedium`], [`MemoryMedium`])
//! - [`identity`] - the cached user record
//!
//! # Example
//!
//! ```rust,ignore
//! use keyward_session::{FileMedium, SessionStore};
//!
//! let store = SessionStore::open(FileMedium::new("/tmp/keyward/session.json"))?;
//! store.set_credential("eyJhbGciOi...")?;
//! assert!(store.is_authenticated());
//! ```

pub mod error;
pub mod identity;
pub mod medium;
pub mod store;

pub use error::{Error, Result};
pub use identity::Identity;
pub use medium::{Change, FileMedium, MemoryMedium, SessionMedium};
pub use store::{Credential, Session, SessionStore, SharedSessionStore};
