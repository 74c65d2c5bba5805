use clap::{Arg, Command};
use contact_relay::server::{self, AppState};
use contact_relay::{Config, ContactProcessor, SmtpMailer};
use log::LevelFilter;
use std::process;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    let matches = Command::new("contact-relay")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Contact form relay with honeypot spam filtering")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value("/etc/contact-relay.yaml"),
        )
        .arg(
            Arg::new("generate-config")
                .long("generate-config")
                .value_name("FILE")
                .help("Generate a default configuration file")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("test-config")
                .long("test-config")
                .help("Test configuration validity and exit")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("issue-token")
                .long("issue-token")
                .help("Print honeypot field names and a fresh proof token as JSON, then exit")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("bind")
                .short('b')
                .long("bind")
                .value_name("ADDR")
                .help("Override the listen address from the configuration")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose logging")
                .action(clap::ArgAction::SetTrue),
        )
        .get_matches();

    let log_level = if matches.get_flag("verbose") {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    let config_path = matches
        .get_one::<String>("config")
        .map(String::as_str)
        .unwrap_or("/etc/contact-relay.yaml");

    if let Some(generate_path) = matches.get_one::<String>("generate-config") {
        generate_default_config(generate_path);
        return;
    }

    let mut config = match load_config(config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            process::exit(1);
        }
    };

    if let Some(bind) = matches.get_one::<String>("bind") {
        config.server.bind_address = bind.clone();
    }

    if let Err(e) = config.validate() {
        eprintln!("Invalid configuration: {e}");
        process::exit(1);
    }

    if matches.get_flag("test-config") {
        println!("Configuration OK");
        println!("  listen address: {}", config.server.bind_address);
        println!(
            "  SMTP relay:     {}:{} ({:?})",
            config.mail.host, config.mail.port, config.mail.security
        );
        println!("  recipient:      {}", config.mail.to);
        println!(
            "  honeypot:       bait={} token={}",
            config.honeypot.bait_field_name, config.honeypot.token_field_name
        );
        println!("  form logging:   {:?}", config.logging.form_data);
        return;
    }

    if matches.get_flag("issue-token") {
        let inputs = contact_relay::Honeypot::new(&config.honeypot).inputs();
        match serde_json::to_string_pretty(&inputs) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("Error encoding token: {e}");
                process::exit(1);
            }
        }
        return;
    }

    if let Err(e) = run(config).await {
        log::error!("Contact relay error: {e:#}");
        process::exit(1);
    }
}

async fn run(config: Config) -> anyhow::Result<()> {
    use anyhow::Context;

    let mailer = SmtpMailer::new(&config.mail).context("Failed to set up SMTP transport")?;
    let processor = Arc::new(ContactProcessor::new(&config, Arc::new(mailer)));
    let router = server::build_router(AppState { processor }, config.server.max_body_bytes);

    let listener = tokio::net::TcpListener::bind(&config.server.bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind_address))?;

    server::serve(listener, router, shutdown_signal()).await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::warn!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    log::info!("Received shutdown signal, draining in-flight requests...");
}

fn load_config(path: &str) -> anyhow::Result<Config> {
    let mut config = if std::path::Path::new(path).exists() {
        Config::from_file(path)?
    } else {
        log::warn!("Configuration file '{path}' not found, using defaults and environment");
        Config::default()
    };
    config.apply_env()?;
    Ok(config)
}

fn generate_default_config(path: &str) {
    let config = Config::default();
    match config.to_file(path) {
        Ok(()) => {
            println!("Default configuration written to: {path}");
            println!("Set honeypot.seed and the mail settings before starting the relay.");
        }
        Err(e) => {
            eprintln!("Error writing configuration file: {e}");
            process::exit(1);
        }
    }
}
