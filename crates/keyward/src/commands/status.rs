//! Status command - server health and local session state.

use anyhow::Result;
use chrono::Utc;
use console::{Style, style};
use serde::Serialize;

use super::Context;

/// Status for JSON output.
#[derive(Debug, Serialize)]
struct StatusOutput {
    server_url: String,
    reachable: bool,
    signed_in: bool,
    expired: bool,
    email: Option<String>,
    expires_at: Option<String>,
    session_path: String,
}

pub async fn run(ctx: &Context) -> Result<()> {
    let gateway = ctx.gateway(false)?;
    let health = gateway.health().check().await;
    let session = gateway.session().snapshot();

    let expires_at = session.credential.as_ref().and_then(|c| c.expires_at);
    let expired = session
        .credential
        .as_ref()
        .is_some_and(|c| c.is_expired_at(Utc::now()));

    if ctx.json_output {
        let output = StatusOutput {
            server_url: ctx.server_url.clone(),
            reachable: health.as_ref().is_ok_and(|h| h.status == "healthy"),
            signed_in: session.credential.is_some() && !expired,
            expired,
            email: session.identity.as_ref().map(|i| i.email.clone()),
            expires_at: expires_at.map(|at| at.to_rfc3339()),
            session_path: ctx.session_path()?.display().to_string(),
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    let green = Style::new().green();
    let red = Style::new().red();
    let yellow = Style::new().yellow();
    let dim = Style::new().dim();

    println!();
    println!("{}", style("Keyward Status").bold());
    println!("{}", dim.apply_to("─".repeat(40)));
    println!();

    match &health {
        Ok(h) if h.status == "healthy" => println!(
            "  {} {}",
            dim.apply_to("Server: "),
            green.apply_to("● healthy")
        ),
        Ok(h) => println!(
            "  {} {}",
            dim.apply_to("Server: "),
            yellow.apply_to(format!("● {}", h.status))
        ),
        Err(_) => println!(
            "  {} {}",
            dim.apply_to("Server: "),
            red.apply_to("● unreachable")
        ),
    }
    println!("  {} {}", dim.apply_to("URL:    "), ctx.server_url);

    match (&session.credential, &session.identity) {
        (None, _) => println!("  {} not signed in", dim.apply_to("Session:")),
        (Some(_), _) if expired => println!(
            "  {} {}",
            dim.apply_to("Session:"),
            yellow.apply_to("expired")
        ),
        (Some(_), Some(identity)) => println!(
            "  {} signed in as {}",
            dim.apply_to("Session:"),
            identity.email
        ),
        (Some(_), None) => println!(
            "  {} signed in (identity not fetched yet)",
            dim.apply_to("Session:")
        ),
    }
    if let Some(at) = expires_at {
        println!("  {} {}", dim.apply_to("Expires:"), at.to_rfc3339());
    }

    if ctx.verbose {
        if let Err(e) = &health {
            println!();
            println!("  {} {}", dim.apply_to("Error:  "), e);
        }
        println!(
            "  {} {}",
            dim.apply_to("Stored: "),
            ctx.session_path()?.display()
        );
    }
    println!();

    Ok(())
}
