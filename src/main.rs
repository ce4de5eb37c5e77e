use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use saleyard::log::init_logging;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

impl From<Commands> for saleyard::AppCommand {
    fn from(cmd: Commands) -> saleyard::AppCommand {
        match cmd {
            Commands::Generate => saleyard::AppCommand::Generate,
            Commands::Price {
                species,
                category,
                breed,
                state,
                saleyard,
            } => saleyard::AppCommand::Price(saleyard::PriceArgs {
                species,
                category,
                breed,
                state,
                saleyard,
            }),
            Commands::Match {
                species,
                sex,
                castrated,
                age_months,
                weight_kg,
                breeding_status,
                breed,
            } => saleyard::AppCommand::Match(saleyard::MatchArgs {
                species,
                sex,
                castrated,
                age_months,
                weight_kg,
                breeding_status,
                breed,
            }),
            Commands::Watch { every_secs } => saleyard::AppCommand::Watch { every_secs },
            Commands::Purge => saleyard::AppCommand::Purge,
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Run one batch price-generation cycle now
    Generate,
    /// Resolve the best available price for a category
    Price {
        /// Species: cattle, sheep, goat or pig
        #[arg(long)]
        species: String,
        /// Market category, e.g. "Yearling Steer"
        #[arg(long)]
        category: String,
        #[arg(long)]
        breed: Option<String>,
        #[arg(long)]
        state: Option<String>,
        #[arg(long)]
        saleyard: Option<String>,
    },
    /// Map an animal description to its market category
    Match {
        #[arg(long)]
        species: String,
        /// Sex: male or female
        #[arg(long)]
        sex: String,
        #[arg(long)]
        castrated: bool,
        #[arg(long)]
        age_months: u32,
        #[arg(long)]
        weight_kg: f64,
        /// Breeding status: not_breeding, joined, pregnant or lactating
        #[arg(long)]
        breeding_status: Option<String>,
        #[arg(long)]
        breed: Option<String>,
    },
    /// Run the batch scheduler until interrupted
    Watch {
        /// Seconds between cycles (default: daily)
        #[arg(long)]
        every_secs: Option<u64>,
    },
    /// Delete expired price rows now
    Purge,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => setup(),
        Some(cmd) => saleyard::run_command(cmd.into(), cli.config_path.as_deref()).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}

fn setup() -> anyhow::Result<()> {
    use anyhow::Context;

    let path = saleyard::config::AppConfig::default_config_path()?;

    if path.exists() {
        anyhow::bail!("Configuration file already exists at {}", path.display());
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    let default_config = r#"---
provider:
  base_url: "https://statistics.mla.com.au"

# Indicator codes fetched each batch cycle
indicators:
  - "EYCI"
  - "ETLI"
  - "NMI"

# Mapping rules: lower priority wins; leave out a condition to not
# constrain on it. Omit this section to use the built-in rule set.
rules:
  - name: "Yearling Steer"
    conditions:
      species: cattle
      sex: male
      castrated: true
      min_age_months: 12
      max_age_months: 24
    category: "Yearling Steer"
    indicator: "EYCI"
    priority: 20

premiums:
  - species: cattle
    breed: "Angus"
    category: "Yearling Steer"
    premium_pct: 5.0
    confidence: 0.9
    source: "saleyard_reports"

locations:
  - state: "NSW"
    saleyard: "Wagga Wagga Livestock Marketing Centre"
  - state: "NSW"

# Scaling applied to raw indicator values for states without local data
regional_multipliers:
  WA: 0.96

ttl_hours: 24
"#;

    std::fs::write(&path, default_config)
        .with_context(|| format!("Failed to write config file to {}", path.display()))?;

    tracing::info!("Created default configuration at {}", path.display());
    Ok(())
}
