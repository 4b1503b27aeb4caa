//! CLI command handlers.

pub mod account;
pub mod config;
pub mod oauth;
pub mod status;

use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use serde::Serialize;

use keyward_client::{AuthGateway, SharedNavigator};
use keyward_config::{KeywardConfig, LoadedConfig};
use keyward_session::{FileMedium, SessionStore, SharedSessionStore};

use crate::navigator::CliNavigator;

/// Shared context for all commands.
#[derive(Debug)]
pub struct Context {
    /// Resolved configuration, all layers applied.
    pub loaded: LoadedConfig,
    /// Server URL to connect to.
    pub server_url: String,
    /// Output as JSON for scripting.
    pub json_output: bool,
    /// Verbose output enabled.
    pub verbose: bool,
}

impl Context {
    /// Load configuration and apply CLI overrides.
    pub fn load(server: Option<String>, json_output: bool, verbose: bool) -> Result<Self> {
        let loaded = keyward_config::load_config(None)?;
        let server_url = server.unwrap_or_else(|| loaded.config.server().base_url);
        tracing::debug!(server = %server_url, sources = ?loaded.loaded_from(), "Configuration loaded");
        Ok(Self {
            loaded,
            server_url,
            json_output,
            verbose,
        })
    }

    pub fn config(&self) -> &KeywardConfig {
        &self.loaded.config
    }

    pub fn session_path(&self) -> Result<PathBuf> {
        self.config()
            .session_path()
            .context("Could not determine where to store the session")
    }

    /// Open the persisted session.
    pub fn session(&self) -> Result<SharedSessionStore> {
        let path = self.session_path()?;
        let store = SessionStore::open(FileMedium::new(&path))
            .with_context(|| format!("Failed to open session at {}", path.display()))?;
        Ok(Arc::new(store))
    }

    /// Gateway over the persisted session.
    pub fn gateway(&self, open_browser: bool) -> Result<AuthGateway> {
        let navigator: SharedNavigator = Arc::new(CliNavigator::new(open_browser));
        let gateway = AuthGateway::builder()
            .base_url(&self.server_url)
            .timeout(self.config().server().timeout())
            .session(self.session()?)
            .navigator(navigator)
            .build()?;
        Ok(gateway)
    }
}

/// Print a value as pretty JSON.
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Read one trimmed line from stdin.
pub fn read_line(prompt: Option<&str>) -> Result<String> {
    if let Some(prompt) = prompt {
        eprint!("{}", prompt);
        std::io::stderr().flush()?;
    }
    let mut input = String::new();
    std::io::stdin().lock().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

/// Read a password from stdin or a hidden prompt.
pub fn read_password(from_stdin: bool) -> Result<String> {
    let password = if from_stdin {
        read_line(None)?
    } else {
        rpassword::prompt_password("Password: ")?
    };
    if password.is_empty() {
        anyhow::bail!("No password provided");
    }
    Ok(password)
}
