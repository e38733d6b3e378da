//! Gatekeeper CLI - administrative access checks from the command line

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use gatekeeper_auth::realm::StoredCredential;
use gatekeeper_auth::trust::TrustStoreEntry;
use gatekeeper_auth::{
    AuthHeaders, AuthRequest, ONE_TIME_TOKEN_HEADER, TrustedIdentity, identity_from_der,
};
use tracing_subscriber::EnvFilter;

mod config;
mod interfaces;
mod keyfile;
mod local_secret;
mod truststore;
mod wiring;

use config::Config;

/// Gatekeeper - administrative access decisions
#[derive(Parser)]
#[command(name = "gatekeeper", version, about)]
struct Cli {
    /// Config file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate one request and print the granted access level
    Check {
        /// User name (empty selects the default admin user)
        #[arg(long, default_value = "")]
        user: String,

        /// Password or shared secret
        #[arg(long, default_value = "", conflicts_with = "local")]
        secret: String,

        /// Present the local secret instead of a password
        #[arg(long)]
        local: bool,

        /// Realm name (defaults to the admin realm)
        #[arg(long)]
        realm: Option<String>,

        /// Host the request came from (omit for a local request)
        #[arg(long)]
        origin: Option<String>,

        /// Request header (NAME=VALUE)
        #[arg(long = "header", value_name = "NAME=VALUE")]
        headers: Vec<String>,

        /// Client certificate established by the transport (PEM or DER)
        #[arg(long)]
        cert: Option<PathBuf>,

        /// Attach a freshly issued one-time token
        #[arg(long)]
        with_token: bool,

        /// Print the decision as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print a keyfile credential for a password read from stdin
    HashPassword {
        /// Print a full keyfile line for this user
        #[arg(long)]
        user: Option<String>,

        /// Groups for the keyfile line (comma separated)
        #[arg(long, value_delimiter = ',', requires = "user")]
        groups: Vec<String>,
    },

    /// Load the config and build the engine
    Validate,

    /// Authenticate a management connector credential tuple
    Management {
        /// user [secret [host]]
        #[arg(num_args = 0..=3)]
        credentials: Vec<String>,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(2)
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    match cli.command {
        Commands::HashPassword { user, groups } => {
            hash_password(user.as_deref(), &groups)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Validate => {
            let config = load_config(cli.config.as_deref())?;
            let runtime = wiring::build(&config)?;
            println!(
                "ok: admin realm '{}', management realm '{}', local secret {}",
                runtime.engine.admin_realm_name(),
                runtime.management.realm(),
                runtime.local_secret.path().display()
            );
            Ok(ExitCode::SUCCESS)
        }
        Commands::Check {
            user,
            secret,
            local,
            realm,
            origin,
            headers,
            cert,
            with_token,
            json,
        } => {
            let config = load_config(cli.config.as_deref())?;
            let runtime = wiring::build(&config)?;

            let secret = if local {
                runtime.local_secret.value().to_string()
            } else {
                secret
            };
            let mut headers = parse_headers(&headers)?;
            if with_token {
                headers.insert(ONE_TIME_TOKEN_HEADER, runtime.tokens.issue()?);
            }
            let mut builder = AuthRequest::builder()
                .user(user)
                .secret(secret)
                .realm(realm.unwrap_or_else(|| config.admin.realm.clone()))
                .headers(headers);
            if let Some(origin) = origin {
                builder = builder.origin_host(origin);
            }
            if let Some(path) = cert {
                builder = builder.identity(read_identity(&path)?);
            }

            let decision = runtime.engine.decide(&builder.build())?;
            if json {
                println!("{}", serde_json::to_string(&decision)?);
            } else {
                println!("{}", decision.access);
            }

            Ok(if decision.access.is_granted() {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(1)
            })
        }
        Commands::Management { credentials } => {
            let config = load_config(cli.config.as_deref())?;
            let runtime = wiring::build(&config)?;
            let credentials: Vec<&str> = credentials.iter().map(String::as_str).collect();

            match runtime.management.authenticate(&credentials) {
                Ok(session) => {
                    println!("{} {}", session.user, session.access);
                    Ok(ExitCode::SUCCESS)
                }
                Err(denied) => {
                    println!("{denied}");
                    Ok(ExitCode::from(1))
                }
            }
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => Config::default_path()?,
    };
    Config::load(&path)
}

fn hash_password(user: Option<&str>, groups: &[String]) -> Result<()> {
    let mut password = String::new();
    io::stdin()
        .lock()
        .read_line(&mut password)
        .context("Failed to read password from stdin")?;
    let password = password.trim_end_matches(['\r', '\n']);

    let credential = StoredCredential::generate(password);
    let mut stdout = io::stdout().lock();
    match user {
        Some(user) => writeln!(stdout, "{}", keyfile::format_line(user, &credential, groups))?,
        None => writeln!(stdout, "{credential}")?,
    }
    Ok(())
}

fn parse_headers(raw: &[String]) -> Result<AuthHeaders> {
    let mut headers = AuthHeaders::new();
    for header in raw {
        let Some((name, value)) = header.split_once('=') else {
            bail!("Invalid header '{header}', expected NAME=VALUE");
        };
        let name = name.trim();
        if name.is_empty() {
            bail!("Invalid header '{header}', empty name");
        }
        headers.insert(name, value);
    }
    Ok(headers)
}

fn read_identity(path: &Path) -> Result<TrustedIdentity> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read certificate at {}", path.display()))?;
    let der = match truststore::decode_entry(&bytes) {
        Ok(TrustStoreEntry::Certificate(der)) => der,
        Ok(_) => bail!("{} does not hold a certificate", path.display()),
        Err(reason) => bail!("Invalid certificate at {}: {reason}", path.display()),
    };
    identity_from_der(&der).with_context(|| format!("Invalid certificate at {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatekeeper_auth::ADMIN_INDICATOR_HEADER;

    #[test]
    fn test_parse_headers() {
        let headers = parse_headers(&[
            "X-Admin-Indicator=peer=marker".to_string(),
            "x-admin-auth-token=abc".to_string(),
        ])
        .unwrap();
        assert_eq!(headers.get(ADMIN_INDICATOR_HEADER), Some("peer=marker"));
        assert_eq!(headers.get(ONE_TIME_TOKEN_HEADER), Some("abc"));

        assert!(parse_headers(&["novalue".to_string()]).is_err());
        assert!(parse_headers(&["=value".to_string()]).is_err());
    }

    #[test]
    fn test_read_identity_from_pem() {
        let dir = tempfile::tempdir().unwrap();
        let key = rcgen::KeyPair::generate().unwrap();
        let mut params = rcgen::CertificateParams::new(Vec::<String>::new()).unwrap();
        let mut name = rcgen::DistinguishedName::new();
        name.push(rcgen::DnType::CommonName, "instance");
        params.distinguished_name = name;
        let cert = params.self_signed(&key).unwrap();

        let path = dir.path().join("client.pem");
        std::fs::write(&path, cert.pem()).unwrap();
        assert_eq!(read_identity(&path).unwrap(), TrustedIdentity::new("CN=instance"));

        let key_path = dir.path().join("key.pem");
        std::fs::write(&key_path, key.serialize_pem()).unwrap();
        assert!(read_identity(&key_path).is_err());
    }

    #[test]
    fn test_cli_parses() {
        use clap::CommandFactory;
        Cli::command().debug_assert();

        let cli = Cli::try_parse_from(["gatekeeper", "management", "admin", "s3cret", "10.0.0.7"]).unwrap();
        assert!(matches!(cli.command, Commands::Management { ref credentials } if credentials.len() == 3));

        assert!(Cli::try_parse_from(["gatekeeper", "check", "--local", "--secret", "x"]).is_err());
    }
}
