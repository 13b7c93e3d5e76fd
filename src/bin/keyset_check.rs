//! keyset-check
//!
//! Validates configuration values against their `check/<kind>` metadata

use anyhow::{bail, Context};
use clap::Parser;
use keyset_rs::{CommitStatus, Key, StoreConfig, ValidatorRegistry};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "keyset-check")]
#[command(about = "Validate configuration keys against their check/* metadata")]
struct Args {
    /// Keys to validate, as NAME=VALUE (e.g. user/net/gateway=192.168.1.1)
    #[arg(required = true, value_parser = parse_assignment)]
    keys: Vec<(String, String)>,

    /// Metadata attached to every key, as NAME=VALUE (e.g. check/ipaddr=ipv4)
    #[arg(short = 'm', long = "meta", value_parser = parse_assignment)]
    meta: Vec<(String, String)>,

    /// TOML store configuration
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Key receiving error information on rejection
    #[arg(short = 'p', long, default_value = "user/tests/keyset-check")]
    parent: String,
}

/// Parse NAME=VALUE from a CLI argument
fn parse_assignment(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((name, value)) if !name.is_empty() => Ok((name.to_string(), value.to_string())),
        _ => Err(format!("Invalid assignment '{}'. Expected NAME=VALUE", s)),
    }
}

fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => StoreConfig::load(path)
            .with_context(|| format!("loading configuration from {:?}", path))?,
        None => StoreConfig::default(),
    };
    info!("Validators enabled: {:?}", config.validators);

    let mut registry = ValidatorRegistry::from_config(&config)?;
    let parent = Key::new(&args.parent).context("invalid parent key")?;

    let mut ks = config.new_keyset();
    for (name, value) in &args.keys {
        let mut builder = Key::builder(name).string(value);
        for (meta_name, meta_value) in &args.meta {
            builder = builder.meta(meta_name, meta_value);
        }
        let key = builder
            .build()
            .with_context(|| format!("invalid key '{}'", name))?;
        ks.append_key(key);
    }

    let status = registry.commit(&ks, &parent);
    println!("{:?} ({})", status, status.code());

    if status == CommitStatus::Rejected {
        for meta_name in parent.meta_names() {
            if let Some(value) = parent.meta_string(&meta_name) {
                println!("  {} = {}", meta_name, value);
            }
        }
        bail!("validation rejected");
    }

    Ok(())
}
