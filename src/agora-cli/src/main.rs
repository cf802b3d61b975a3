//! Agora CLI - Multi-agent conversation runner
//!
//! Loads a scenario, builds its agents and prints the conversation as it
//! unfolds.

use agora_core::{
    ApiSettings, Backends, Embedder, HashingEmbedder, OpenAIChatModel, OpenAIEmbedder,
    ScenarioConfig, SimulationCallback, SimulationEvent, StopReason, available_strategies,
    build_simulation, default_config,
};
use clap::Parser;
use colored::Colorize;
use std::env;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(
    name = "agora",
    version,
    about = "Agora - Watch LLM agents hold a conversation",
    long_about = "A CLI tool for running scripted multi-agent conversations using OpenAI-compatible APIs."
)]
struct Cli {
    /// Scenario file (TOML). The built-in talk-show panel is used when omitted.
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override the scenario topic
    #[arg(short, long, value_name = "TOPIC")]
    topic: Option<String>,

    /// Override the speaker selection strategy
    #[arg(short, long, value_name = "STRATEGY")]
    strategy: Option<String>,

    /// Maximum number of turns
    #[arg(short = 'n', long, value_name = "TURNS")]
    max_iters: Option<usize>,

    /// Seed for tie-breaks and stop draws
    #[arg(long, value_name = "SEED")]
    seed: Option<u64>,

    /// Override the chat model
    #[arg(short, long, value_name = "MODEL")]
    model: Option<String>,

    /// Embed documents locally instead of calling the embeddings endpoint
    #[arg(long)]
    local_embeddings: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file if present
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    // Get API configuration from environment
    let api_base = env::var("OPENAI_API_BASE")
        .or_else(|_| env::var("OPENAI_BASE_URL"))
        .unwrap_or_else(|_| "https://api.openai.com/v1".to_string());

    let api_key = env::var("OPENAI_API_KEY").unwrap_or_else(|_| {
        eprintln!(
            "{}",
            "Warning: OPENAI_API_KEY not set. API calls may fail.".yellow()
        );
        String::new()
    });

    let mut config = match &cli.config {
        Some(path) => ScenarioConfig::load(path)?,
        None => default_config(),
    };
    apply_overrides(&mut config, &cli);

    if let Err(e) = config.validate() {
        eprintln!("{} {}", "Error:".red().bold(), e);
        eprintln!("Available strategies: {}", available_strategies().join(", "));
        std::process::exit(1);
    }

    let settings = ApiSettings::new(api_base, api_key);
    let chat = OpenAIChatModel::new(&settings, &config.model.name)?
        .with_temperature(config.model.temperature);
    let creative = OpenAIChatModel::new(&settings, &config.model.name)?
        .with_temperature(config.model.creative_temperature);
    let embedder: Arc<dyn Embedder> = if cli.local_embeddings {
        Arc::new(HashingEmbedder::default())
    } else {
        Arc::new(OpenAIEmbedder::new(
            settings.clone(),
            &config.model.embedding_model,
        ))
    };
    let backends = Backends {
        chat: Arc::new(chat),
        creative: Arc::new(creative),
        embedder,
    };

    println!();
    println!("{}", "Preparing participants...".dimmed());
    let mut simulation = build_simulation(&config, &backends)
        .await?
        .with_callback(create_console_callback());

    // Print header
    println!();
    println!("{}", "═".repeat(70).bright_blue());
    println!(
        "{}",
        format!("  {} - {} strategy", "Agora".bold(), config.strategy)
            .bright_blue()
            .bold()
    );
    println!("{}", "═".repeat(70).bright_blue());
    println!();
    println!("{} {}", "Topic:".bold(), config.topic.bright_white());
    println!();
    println!("{}", "Participants:".bold());
    for (i, persona) in simulation.personas.iter().enumerate() {
        println!(
            "  {}. {} - using {}",
            i + 1,
            persona.display_name_with_role().bright_cyan(),
            config.model.name.dimmed()
        );
        if !persona.description.is_empty() {
            for line in textwrap(&persona.description, 62).lines() {
                println!("     {}", line.dimmed());
            }
        }
    }
    println!();
    println!("{}", "─".repeat(70).dimmed());

    let reason = simulation.run().await?;

    let closing = match reason {
        StopReason::IterationCap => "  Conversation concluded.",
        StopReason::DirectorStopped => "  The director closed the conversation.",
    };
    println!();
    println!("{}", "═".repeat(70).bright_blue());
    println!("{}", closing.bright_green().bold());
    println!("{}", "═".repeat(70).bright_blue());
    println!();

    Ok(())
}

/// Fold command-line overrides into the loaded scenario.
fn apply_overrides(config: &mut ScenarioConfig, cli: &Cli) {
    if let Some(topic) = &cli.topic {
        config.topic = topic.clone();
    }
    if let Some(strategy) = &cli.strategy {
        config.strategy = strategy.to_lowercase();
        // Only the director strategy runs with a director, and it must be first.
        let directed = config.strategy == "director";
        for (i, agent) in config.agents.iter_mut().enumerate() {
            agent.director = directed && i == 0;
        }
    }
    if let Some(max_iters) = cli.max_iters {
        config.max_iters = max_iters;
    }
    if cli.seed.is_some() {
        config.seed = cli.seed;
    }
    if let Some(model) = &cli.model {
        config.model.name = model.clone();
    }
}

/// Create a callback that prints simulation events to the console.
fn create_console_callback() -> SimulationCallback {
    Box::new(move |event| match event {
        SimulationEvent::Seeded { speaker, text } => {
            println!();
            println!(
                "{}",
                format!("  {}:", speaker.to_uppercase()).bright_magenta().bold()
            );
            for line in textwrap(&text, 66).lines() {
                println!("  {}", line.bright_magenta());
            }
            println!();
        }
        SimulationEvent::Bids { bids, selected } => {
            let summary: Vec<String> = bids
                .iter()
                .map(|(name, bid)| format!("{} {}", name, bid))
                .collect();
            println!(
                "{} {} {}",
                "bids:".dimmed(),
                summary.join(", ").dimmed(),
                format!("-> {}", selected).yellow()
            );
        }
        SimulationEvent::Spoke {
            step,
            speaker,
            text,
        } => {
            println!(
                "{} {} {}",
                "▶".bright_cyan(),
                speaker.bright_cyan().bold(),
                format!("(turn {})", step + 1).yellow()
            );
            // Word wrap and indent the content
            let wrapped = textwrap(&text, 66);
            for line in wrapped.lines() {
                println!("  {}", line);
            }
            println!();
        }
        SimulationEvent::Stopped { .. } => {
            // Handled in main
        }
    })
}

/// Simple text wrapping function.
fn textwrap(text: &str, width: usize) -> String {
    let mut result = String::new();
    let mut current_line_len = 0;

    for word in text.split_whitespace() {
        if current_line_len + word.len() + 1 > width && current_line_len > 0 {
            result.push('\n');
            current_line_len = 0;
        }
        if current_line_len > 0 {
            result.push(' ');
            current_line_len += 1;
        }
        result.push_str(word);
        current_line_len += word.len();
    }

    result
}
