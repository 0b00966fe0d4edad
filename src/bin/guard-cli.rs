use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use http_guard::config::{load_config, GatewayConfig};
use http_guard::security::redirect::RedirectDecision;
use http_guard::security::{CspHeaders, PolicySet};

#[derive(Parser)]
#[command(name = "guard-cli")]
#[command(about = "Inspect and exercise http-guard security policies offline", long_about = None)]
struct Cli {
    /// Gateway configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the rendered Content-Security-Policy headers
    Csp,
    /// Sign or encrypt a cookie value the way the gateway would
    Protect { name: String, value: String },
    /// Verify or decrypt a protected cookie value
    Unprotect { name: String, value: String },
    /// Show what the redirect guard does with a Location value
    CheckRedirect {
        target: String,
        /// Host the original request was sent to.
        #[arg(long)]
        host: Option<String>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => GatewayConfig::default(),
    };
    let policies = PolicySet::from_config(&config.security)?;

    match cli.command {
        Commands::Csp => {
            let Some(policy) = policies.csp.as_deref() else {
                return Err("CSP is not enabled".into());
            };
            let headers = CspHeaders::new(policy);
            if headers.is_empty() {
                println!("(no directives configured)");
            }
            for (name, value) in headers.iter() {
                println!("{}: {}", name, value.to_str()?);
            }
        }
        Commands::Protect { name, value } => {
            let protector = policies.cookies.ok_or("cookie protection is not enabled")?;
            println!("{}", protector.protect(&name, &value)?);
        }
        Commands::Unprotect { name, value } => {
            let protector = policies.cookies.ok_or("cookie protection is not enabled")?;
            println!("{}", protector.unprotect(&name, &value)?);
        }
        Commands::CheckRedirect { target, host } => {
            let guard = policies.redirects.ok_or("external redirect guard is not enabled")?;
            match guard.check(host.as_deref(), &target) {
                Ok(RedirectDecision::Allow) => println!("allow"),
                Ok(RedirectDecision::Rewrite(location)) => println!("rewrite {}", location),
                Err(e) => println!("abort: {}", e),
            }
        }
    }
    Ok(())
}
