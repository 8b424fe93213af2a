use std::env;
use std::io::{self, Write};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use verdant_agents::EcoAgent;
use verdant_core::{ChatInput, ClimateZone, HousingType, LocationType, UtilityReading};
use verdant_insights::InsightsCache;
use verdant_ml::VerdantMlStack;
use verdant_observability::{init_tracing, AppMetrics};
use verdant_storage::{Store, UserProfile};

#[derive(Debug, Parser)]
#[command(name = "verdant")]
#[command(about = "Verdant household sustainability tracker CLI")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Interactive chat with the eco assistant.
    Chat {
        #[arg(long)]
        user: Option<String>,
    },
    /// Register or update a household profile.
    Register {
        #[arg(long)]
        user: String,
        #[arg(long)]
        username: Option<String>,
        #[arg(long, default_value = "")]
        location: String,
        #[arg(long, default_value_t = 1)]
        household_size: u32,
        #[arg(long, default_value = "")]
        housing: String,
        #[arg(long, default_value = "")]
        area: String,
        #[arg(long, default_value = "")]
        climate: String,
        /// Comma-separated energy feature names.
        #[arg(long, default_value = "")]
        features: String,
    },
    /// Submit one day of utility readings for assessment and scoring.
    Submit {
        #[arg(long)]
        user: String,
        #[arg(long)]
        water: f64,
        #[arg(long)]
        electricity: f64,
        #[arg(long)]
        gas: f64,
    },
    /// Show the community leaderboard.
    Leaderboard {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Show aggregated community insights.
    Insights,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("verdant_cli");
    let cli = Cli::parse();

    let agent = build_agent().await?;

    match cli.command {
        Command::Chat { user } => run_chat(agent, user).await?,
        Command::Register {
            user,
            username,
            location,
            household_size,
            housing,
            area,
            climate,
            features,
        } => {
            let mut profile =
                UserProfile::minimal(&user, username.as_deref().unwrap_or(user.as_str()));
            profile.location = location;
            profile.household_size = household_size.max(1);
            profile.adults = profile.household_size;
            profile.housing_type = HousingType::parse(&housing);
            profile.location_type = LocationType::parse(&area);
            profile.climate_zone = ClimateZone::parse(&climate);
            profile.energy_features = features
                .split(',')
                .map(str::trim)
                .filter(|feature| !feature.is_empty())
                .map(str::to_lowercase)
                .collect();

            agent.register_user(&profile).await?;
            println!("registered profile for {}", profile.username);
        }
        Command::Submit {
            user,
            water,
            electricity,
            gas,
        } => {
            let reading = UtilityReading::new(water, electricity, gas);
            let outcome = agent
                .submit_reading(&user, reading)
                .await
                .context("submission failed")?;

            println!("{}", serde_json::to_string_pretty(&outcome)?);
            if !outcome.saved {
                println!("daily submission limit reached; reading was not saved");
            }
        }
        Command::Leaderboard { limit } => {
            let rankings = agent.leaderboard(limit).await?;
            println!("{}", serde_json::to_string_pretty(&rankings)?);
        }
        Command::Insights => {
            let insights = agent.community_insights().await?;
            println!("{}", serde_json::to_string_pretty(&insights)?);
        }
    }

    Ok(())
}

async fn run_chat(agent: EcoAgent<Store>, user: Option<String>) -> Result<()> {
    let mut session_id: Option<String> = None;

    println!("Verdant chat mode. type 'exit' to quit.");

    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut line = String::new();
        if io::stdin().read_line(&mut line)? == 0 {
            break;
        }

        let message = line.trim();
        if message.eq_ignore_ascii_case("exit") || message.eq_ignore_ascii_case("quit") {
            break;
        }

        if message.is_empty() {
            continue;
        }

        let reply = agent
            .handle_chat(ChatInput {
                session_id: session_id.clone(),
                text: message.to_string(),
                user_id: user.clone(),
            })
            .await?;

        session_id = Some(reply.session_id.clone());
        println!("\n{}\n", reply.reply_text);
    }

    Ok(())
}

async fn build_agent() -> Result<EcoAgent<Store>> {
    let metrics = AppMetrics::shared();
    let ml_stack = VerdantMlStack::load_default();

    let store = if let Ok(database_url) = env::var("VERDANT_DATABASE_URL") {
        Store::sqlite(&database_url).await?
    } else {
        Store::memory()
    };

    let agent = EcoAgent::new(
        Arc::new(store),
        ml_stack,
        Arc::new(InsightsCache::with_default_ttl()),
        metrics,
    );
    agent.purge_expired_sessions().await?;

    Ok(agent)
}
