//! OAuth command - authorization code flow from the terminal.

use std::time::Duration;

use anyhow::{Context as _, Result};
use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use keyward_oauth::{CallbackListener, CallbackParams, OAuthError, OAuthFlow};

use super::account::print_identity;
use super::{Context, print_json, read_line};

#[derive(Args, Debug)]
pub struct OauthArgs {
    /// Paste the redirect URL instead of listening for it
    #[arg(long)]
    pub manual: bool,

    /// Print the authorization URL without opening a browser
    #[arg(long)]
    pub no_browser: bool,
}

pub async fn run(args: OauthArgs, ctx: &Context) -> Result<()> {
    let registration = ctx.config().client_registration()?.clone();
    let settings = ctx.config().oauth();
    let gateway = ctx.gateway(!args.no_browser)?;

    let mut flow = OAuthFlow::new(gateway, registration.clone()).with_pkce(settings.use_pkce);

    if !ctx.json_output {
        println!(
            "{} as {}",
            style("OAuth authorization").bold(),
            style(&registration.display_name).cyan()
        );
    }

    let params = if args.manual {
        flow.start()?;
        let input = read_line(Some("Paste the URL you were redirected to: "))?;
        CallbackParams::parse(&input)
    } else {
        let redirect = registration.redirect_url()?;
        let pending = CallbackListener::from_redirect_uri(&redirect)?
            .start()
            .await
            .context("Could not listen for the authorization callback; try --manual")?;
        flow.start()?;

        let spinner = spinner("Waiting for authorization in the browser...");
        let received = pending.wait(settings.callback_timeout()).await;
        spinner.finish_and_clear();
        received?
    };

    let spinner = spinner("Exchanging authorization code...");
    let outcome = flow.handle_callback(&params).await;
    spinner.finish_and_clear();

    let identity = match outcome {
        Ok(identity) => identity,
        Err(OAuthError::Flow(reason)) => {
            anyhow::bail!("Authorization failed [{}]: {}", reason.code(), reason)
        }
        Err(e) => return Err(e.into()),
    };

    if ctx.json_output {
        return print_json(&identity);
    }
    println!(
        "{} Signed in as {}",
        style("✓").green(),
        style(identity.display_name()).bold()
    );
    if ctx.verbose {
        print_identity(&identity);
    }
    Ok(())
}

fn spinner(message: &'static str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(message);
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}
