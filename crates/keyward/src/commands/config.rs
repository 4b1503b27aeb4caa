//! Config command - configuration inspection.

use anyhow::Result;
use clap::{Args, Subcommand};

use super::{Context, print_json};

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show the resolved configuration and where it came from
    Show,

    /// Show configuration and session file paths
    Path,
}

pub fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    match args.command {
        ConfigCommand::Show => cmd_show(ctx),
        ConfigCommand::Path => cmd_path(ctx),
    }
}

fn cmd_show(ctx: &Context) -> Result<()> {
    let config = ctx.config();
    let server = config.server();
    let oauth = config.oauth();

    if ctx.json_output {
        return print_json(&serde_json::json!({
            "sources": ctx.loaded.loaded_from(),
            "server": { "base_url": ctx.server_url, "timeout_secs": server.timeout_secs },
            "client": config.client.as_ref().map(|c| serde_json::json!({
                "client_id": c.client_id,
                "redirect_uri": c.redirect_uri,
                "display_name": c.display_name,
                "scope": c.scope,
            })),
            "oauth": { "use_pkce": oauth.use_pkce, "callback_timeout_secs": oauth.callback_timeout_secs },
            "session_path": config.session_path(),
        }));
    }

    println!("# Keyward Configuration\n");

    let sources = ctx.loaded.loaded_from();
    if sources.is_empty() {
        println!("No config files loaded (using defaults)\n");
    } else {
        println!("Loaded from:");
        for path in sources {
            println!("  {}", path.display());
        }
        println!();
    }
    for warning in &ctx.loaded.warnings {
        println!("warning: {}", warning);
    }

    println!("[server]");
    println!("  base_url     = {}", ctx.server_url);
    println!("  timeout_secs = {}", server.timeout_secs);
    println!();

    println!("[client]");
    match &config.client {
        Some(client) => {
            println!("  client_id     = {}", client.client_id);
            println!("  client_secret = ********");
            println!("  redirect_uri  = {}", client.redirect_uri);
            println!("  display_name  = {}", client.display_name);
            if let Some(scope) = &client.scope {
                println!("  scope         = {}", scope);
            }
        }
        None => println!("  (not configured; required for `keyward oauth`)"),
    }
    println!();

    println!("[oauth]");
    println!("  use_pkce              = {}", oauth.use_pkce);
    println!("  callback_timeout_secs = {}", oauth.callback_timeout_secs);
    println!();

    println!("[session]");
    match config.session_path() {
        Some(path) => println!("  path = {}", path.display()),
        None => println!("  path = (unavailable)"),
    }

    Ok(())
}

fn cmd_path(ctx: &Context) -> Result<()> {
    let config_path = keyward_config::xdg_config_path();
    let session_path = ctx.config().session_path();

    if ctx.json_output {
        return print_json(&serde_json::json!({
            "config": config_path,
            "session": session_path,
        }));
    }

    match config_path {
        Some(path) => println!("config:  {}", path.display()),
        None => println!("config:  (could not determine config directory)"),
    }
    match session_path {
        Some(path) => println!("session: {}", path.display()),
        None => println!("session: (could not determine config directory)"),
    }
    Ok(())
}
