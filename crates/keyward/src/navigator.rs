//! Terminal navigator: opens the browser or tells the user where to go.

use console::style;

use keyward_client::{NavigationTarget, Navigator};

/// Carries out navigations for a terminal session.
#[derive(Debug, Clone, Copy)]
pub struct CliNavigator {
    open_browser: bool,
}

impl CliNavigator {
    pub fn new(open_browser: bool) -> Self {
        Self { open_browser }
    }
}

impl Navigator for CliNavigator {
    fn navigate(&self, target: NavigationTarget) {
        match target {
            NavigationTarget::Reauthenticate => {
                eprintln!(
                    "{} Session ended. Run `keyward login` or `keyward oauth` to sign in again.",
                    style("!").yellow().bold()
                );
            }
            NavigationTarget::Authorize(url) => {
                eprintln!();
                eprintln!("Open this URL in your browser to authorize:");
                eprintln!();
                eprintln!("  {}", style(url.as_str()).cyan());
                eprintln!();
                if self.open_browser && open_url(url.as_str()).is_err() {
                    eprintln!("(Could not open browser automatically)");
                    eprintln!();
                }
            }
        }
    }
}

fn open_url(url: &str) -> std::io::Result<()> {
    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("open").arg(url).status()?;
    }
    #[cfg(target_os = "linux")]
    {
        std::process::Command::new("xdg-open").arg(url).status()?;
    }
    #[cfg(target_os = "windows")]
    {
        std::process::Command::new("cmd")
            .args(["/C", "start", url])
            .status()?;
    }
    Ok(())
}
