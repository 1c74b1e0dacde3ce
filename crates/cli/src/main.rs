//! persondir command-line inspection tool.
//!
//! Loads a resolver configuration with a static backing collection and
//! provides subcommands for looking people up, searching by attribute,
//! listing attribute names, computing cache keys, and generating /
//! validating configuration files.

mod output;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use persondir_core::attributes::{add_value, Seed};
use persondir_core::config::{ResolverConfig, EXAMPLE_CONFIG};
use persondir_core::{AttributeSource, CachableOperation, CallArguments, KeyComparison};

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// persondir command-line inspection tool.
#[derive(Parser, Debug)]
#[command(
    name = "persondir",
    version,
    about = "Resolve person attributes and inspect cache keys"
)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, global = true, default_value = "./persondir.toml")]
    config: PathBuf,

    /// Print results as JSON.
    #[arg(long, global = true)]
    json: bool,

    /// Enable debug logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Resolve one person by identity.
    Lookup {
        /// Identity (uid) to resolve.
        uid: String,
    },

    /// Resolve everyone matching a seed. Values may contain `*`.
    Search {
        /// Seed attribute as name=value; repeat to add values.
        #[arg(short = 'a', long = "attribute", value_parser = parse_pair, required = true)]
        attributes: Vec<(String, String)>,
    },

    /// List possible and queryable attribute names.
    Attributes,

    /// Compute the cache key of a resolution call.
    CacheKey {
        /// Operation tag, e.g. "get_person(uid)".
        operation: String,

        /// Identity argument for uid operations.
        #[arg(long, conflicts_with = "attributes")]
        uid: Option<String>,

        /// Seed attribute as name=value for seed operations.
        #[arg(short = 'a', long = "attribute", value_parser = parse_pair)]
        attributes: Vec<(String, String)>,
    },

    /// Validate a configuration file.
    Validate,

    /// Generate an example configuration file.
    Init {
        /// Output path for the generated config file.
        #[arg(short, long, default_value = "./persondir.toml")]
        output: PathBuf,
    },
}

fn parse_pair(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((name, value)) if !name.is_empty() => Ok((name.to_string(), value.to_string())),
        _ => Err(format!("expected name=value, got '{raw}'")),
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Init { output } => cmd_init(&output),
        Commands::Validate => cmd_validate(&cli.config),
        command => {
            let config = load_config(&cli.config)?;
            match command {
                Commands::Lookup { uid } => cmd_lookup(&config, &uid, cli.json),
                Commands::Search { attributes } => cmd_search(&config, attributes, cli.json),
                Commands::Attributes => cmd_attributes(&config, cli.json),
                Commands::CacheKey {
                    operation,
                    uid,
                    attributes,
                } => cmd_cache_key(&config, &operation, uid, attributes, cli.json),
                Commands::Init { .. } | Commands::Validate => Ok(()),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Config helpers
// ---------------------------------------------------------------------------

fn load_config(path: &Path) -> Result<ResolverConfig> {
    ResolverConfig::load_and_validate(path).context("failed to load configuration file")
}

fn seed_from_pairs(pairs: Vec<(String, String)>, comparison: KeyComparison) -> Seed {
    let mut seed = Seed::new(comparison);
    for (name, value) in pairs {
        add_value(&mut seed, &name, value.into());
    }
    seed
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

fn cmd_lookup(config: &ResolverConfig, uid: &str, json: bool) -> Result<()> {
    let source = config.stub_source();
    let person = source
        .person(uid)
        .with_context(|| format!("failed to resolve '{uid}'"))?;

    match person {
        Some(person) => output::print_person(&person, json),
        None => {
            output::print_not_found(&format!("no attributes found for '{uid}'"), json);
            Ok(())
        }
    }
}

fn cmd_search(config: &ResolverConfig, attributes: Vec<(String, String)>, json: bool) -> Result<()> {
    let seed = seed_from_pairs(attributes, config.identity.comparison);
    debug!(attributes = seed.len(), "searching static collection");

    let people = config
        .stub_source()
        .people(&seed)
        .context("failed to resolve seed")?;

    match people {
        Some(people) => output::print_people(&people, json),
        None => {
            output::print_not_found("no people matched the seed", json);
            Ok(())
        }
    }
}

fn cmd_attributes(config: &ResolverConfig, json: bool) -> Result<()> {
    let source = config.stub_source();
    output::print_attribute_names(
        source.possible_attribute_names().unwrap_or_default(),
        source.available_query_attributes().unwrap_or_default(),
        json,
    )
}

fn cmd_cache_key(
    config: &ResolverConfig,
    operation: &str,
    uid: Option<String>,
    attributes: Vec<(String, String)>,
    json: bool,
) -> Result<()> {
    let arguments = match uid {
        Some(uid) => CallArguments::Identity(uid),
        None if !attributes.is_empty() => {
            CallArguments::Seed(seed_from_pairs(attributes, config.identity.comparison))
        }
        None => CallArguments::None,
    };

    let key = config
        .cache_key_generator()
        .generate_key(operation, &arguments)
        .with_context(|| {
            let tags: Vec<&str> = CachableOperation::ALL.iter().map(|op| op.tag()).collect();
            format!("cannot compute cache key (known operations: {})", tags.join(", "))
        })?;

    output::print_cache_key(operation, key, json)
}

fn cmd_init(output: &Path) -> Result<()> {
    if output.exists() {
        anyhow::bail!(
            "file already exists: {}. Use a different path or remove the existing file.",
            output.display()
        );
    }

    std::fs::write(output, EXAMPLE_CONFIG).context("failed to write config file")?;

    println!("Example configuration written to {}", output.display());
    println!();
    println!("Next steps:");
    println!("  1. Edit the mappings and the [stub.people] backing collection");
    println!(
        "  2. Validate with: persondir validate --config {}",
        output.display()
    );
    println!(
        "  3. Try a lookup: persondir lookup awp9 --config {}",
        output.display()
    );

    Ok(())
}

fn cmd_validate(config_path: &Path) -> Result<()> {
    println!("Validating configuration: {}", config_path.display());
    println!();

    let config =
        ResolverConfig::load_from_file(config_path).context("failed to parse configuration")?;
    println!("  [OK] TOML structure is valid");

    match config.validate() {
        Ok(()) => println!("  [OK] Mappings and column settings are valid"),
        Err(e) => {
            println!("  [FAIL] Validation error: {}", e);
            anyhow::bail!("configuration validation failed");
        }
    }

    println!();
    println!("Configuration summary:");
    println!(
        "  Identity attribute: {}{}",
        config.identity_resolver().attribute(),
        if config.identity.attribute.is_some() {
            ""
        } else {
            " (default)"
        }
    );
    println!("  Query mappings    : {}", config.query.mapping.len());
    println!(
        "  Result mappings   : {} (+{} pass-through)",
        config.result.mapping.len(),
        config.result.passthrough.len()
    );
    println!("  Row layout        : {:?}", config.rows.layout);
    println!(
        "  Cache key default : {}",
        config.cache_key.default_attribute_name
    );
    println!("  Stub people       : {}", config.stub.people.len());
    println!();
    println!("Configuration is valid.");

    Ok(())
}
