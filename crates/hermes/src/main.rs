//! Hermes gateway entry point.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use hermes_config::{ConfigLoader, HermesConfig};
use hermes_core::TokenCipher;

const DEFAULT_CONFIG_PATH: &str = "hermes.toml";

/// What the binary was asked to do.
enum Command {
    Serve,
    EncryptToken(String),
}

/// Command-line arguments.
struct Args {
    /// Path to configuration file.
    config: PathBuf,
    command: Command,
}

impl Args {
    fn parse() -> Self {
        let mut args = std::env::args().skip(1);
        let mut config = PathBuf::from(DEFAULT_CONFIG_PATH);
        let mut command = Command::Serve;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--config" | "-c" => {
                    let Some(path) = args.next() else {
                        eprintln!("--config requires a path");
                        std::process::exit(1);
                    };
                    config = PathBuf::from(path);
                }
                "--help" | "-h" => {
                    print_help();
                    std::process::exit(0);
                }
                "--version" | "-v" => {
                    println!("hermes {}", hermes::VERSION);
                    std::process::exit(0);
                }
                "encrypt-token" => {
                    let Some(token) = args.next() else {
                        eprintln!("encrypt-token requires a token");
                        std::process::exit(1);
                    };
                    command = Command::EncryptToken(token);
                }
                other => {
                    eprintln!("Unknown argument: {other}");
                    eprintln!("Use --help for usage information");
                    std::process::exit(1);
                }
            }
        }

        Self { config, command }
    }
}

fn print_help() {
    println!(
        r"Hermes - WhatsApp Graph API gateway

USAGE:
    hermes [OPTIONS]
    hermes [OPTIONS] encrypt-token <TOKEN>

OPTIONS:
    -c, --config <PATH>    Configuration file, TOML or JSON (default: hermes.toml, optional)
    -h, --help             Print help information
    -v, --version          Print version information

COMMANDS:
    encrypt-token <TOKEN>  Print TOKEN encrypted with the configured key

ENVIRONMENT VARIABLES:
    API_KEY                         Shared secret for /system routes
    ENCRYPTION_KEY                  32-byte key for caller access tokens
    WHATSAPP_SYS_USER_ACCESS_TOKEN  System-user token for merchant signup
    PORT                            Listen port (default: 8080)
    HERMES__<SECTION>__<KEY>        Any configuration key, e.g. HERMES__AUTH__JWT_SECRET

EXAMPLES:
    # Run with a configuration file
    hermes --config /etc/hermes/hermes.toml

    # Encrypt a provider token for a caller
    ENCRYPTION_KEY=0123456789abcdef0123456789abcdef hermes encrypt-token EAAG...
"
    );
}

fn loader(path: &Path) -> anyhow::Result<ConfigLoader> {
    Ok(ConfigLoader::new()
        .with_defaults()
        .with_optional_file(path)
        .with_context(|| format!("failed to read {}", path.display()))?
        .with_dotenv()?
        .with_env_prefix("HERMES"))
}

fn encrypt_token(config: &HermesConfig, token: &str) -> anyhow::Result<String> {
    let Some(key) = config.crypto.encryption_key.as_deref() else {
        bail!("crypto.encryption_key (or ENCRYPTION_KEY) must be set");
    };
    let cipher = TokenCipher::new(key.as_bytes())?;
    Ok(cipher.encrypt(token)?)
}

fn install_panic_hook() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let location = info
            .location()
            .map(|l| format!("{}:{}", l.file(), l.line()))
            .unwrap_or_default();
        tracing::error!(panic = %info, location = %location, "task panicked");
        default_hook(info);
    }));
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if let Command::EncryptToken(token) = &args.command {
        let config = loader(&args.config)?.resolve()?;
        println!("{}", encrypt_token(&config, token)?);
        return Ok(());
    }

    let config = loader(&args.config)?
        .load()
        .context("invalid configuration")?;

    hermes_telemetry::init_telemetry(&config.to_telemetry_config())?;
    install_panic_hook();

    tracing::info!(
        version = hermes::VERSION,
        config = %args.config.display(),
        "configuration loaded"
    );

    if let Err(error) = hermes::run(config).await {
        tracing::error!(%error, "gateway stopped with error");
        return Err(error.into());
    }
    Ok(())
}
