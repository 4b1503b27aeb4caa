//! Configuration system for the Keyward OAuth client.
//!
//! Provides TOML-based configuration with:
//! - The server base URL (`[server]`)
//! - The static client registration used by the OAuth flow (`[client]`)
//! - OAuth flow options (`[oauth]`) and session storage location (`[session]`)
//! - Config file layering (user config + project-local overrides)
//! - Environment variable overrides (`KEYWARD_SERVER_URL`, `KEYWARD_CLIENT_ID`, ...)

pub mod discovery;
pub mod error;
pub mod registration;
pub mod types;

pub use discovery::{
    LoadedConfig, load_config, load_config_file, load_config_with_options, save_config,
    xdg_config_dir, xdg_config_path,
};
pub use error::{ConfigError, Result};
pub use registration::ClientRegistration;
pub use types::*;
