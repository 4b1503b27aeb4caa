//! Account commands: register, login, logout, whoami.

use anyhow::Result;
use clap::Args;
use console::{Style, style};

use keyward_client::{AuthGuard, Error as ClientError, Identity, RegisterRequest};

use super::{Context, print_json, read_password};

#[derive(Args, Debug)]
pub struct RegisterArgs {
    /// Email address for the new account
    #[arg(long)]
    pub email: String,

    /// Display name
    #[arg(long)]
    pub name: Option<String>,

    /// Read the password from stdin instead of prompting
    #[arg(long)]
    pub password_stdin: bool,
}

#[derive(Args, Debug)]
pub struct LoginArgs {
    /// Account email address
    #[arg(long)]
    pub email: String,

    /// Read the password from stdin instead of prompting
    #[arg(long)]
    pub password_stdin: bool,
}

pub async fn register(args: RegisterArgs, ctx: &Context) -> Result<()> {
    let password = read_password(args.password_stdin)?;
    let mut request = RegisterRequest::new(args.email, password);
    if let Some(name) = args.name {
        request = request.with_name(name);
    }

    let identity = ctx.gateway(false)?.auth().register(&request).await?;
    if ctx.json_output {
        return print_json(&identity);
    }

    println!(
        "{} Account created for {}",
        style("✓").green(),
        identity.email
    );
    println!("Sign in with: keyward login --email {}", identity.email);
    Ok(())
}

pub async fn login(args: LoginArgs, ctx: &Context) -> Result<()> {
    let password = read_password(args.password_stdin)?;
    let gateway = ctx.gateway(false)?;

    match gateway.auth().login(&args.email, &password).await {
        Ok(identity) => {
            if ctx.json_output {
                return print_json(&identity);
            }
            println!(
                "{} Signed in as {}",
                style("✓").green(),
                style(identity.display_name()).bold()
            );
            Ok(())
        }
        Err(ClientError::Unauthenticated(reason)) => {
            anyhow::bail!("Login failed: {}", reason)
        }
        Err(e) => Err(e.into()),
    }
}

pub fn logout(ctx: &Context) -> Result<()> {
    let gateway = ctx.gateway(false)?;
    let was_signed_in = gateway.session().is_authenticated();

    if was_signed_in {
        gateway.auth().logout()?;
    }

    if ctx.json_output {
        return print_json(&serde_json::json!({ "signed_out": was_signed_in }));
    }
    if was_signed_in {
        println!("Signed out.");
    } else {
        println!("No active session.");
    }
    Ok(())
}

pub async fn whoami(ctx: &Context) -> Result<()> {
    let guard = AuthGuard::new(ctx.gateway(false)?);
    let identity = match guard.ensure().await {
        Ok(identity) => identity,
        Err(e) if e.is_auth_error() => anyhow::bail!("Not signed in"),
        Err(e) => return Err(e.into()),
    };

    if ctx.json_output {
        return print_json(&identity);
    }
    print_identity(&identity);
    Ok(())
}

pub(crate) fn print_identity(identity: &Identity) {
    let dim = Style::new().dim();
    println!();
    println!("  {} {}", dim.apply_to("Name:   "), identity.display_name());
    println!("  {} {}", dim.apply_to("Email:  "), identity.email);
    println!("  {} {}", dim.apply_to("User ID:"), identity.id);
    println!(
        "  {} {}",
        dim.apply_to("Since:  "),
        identity.created_at.format("%Y-%m-%d")
    );
    println!();
}
