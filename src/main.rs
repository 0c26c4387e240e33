use anyhow::{Context, Result};
use sentence_skeleton::analysis::SentenceAnalysis;
use sentence_skeleton::bank::QuestionBank;
use sentence_skeleton::cli::{Args, BankCommands, Commands, ConfigDiscovery};
use sentence_skeleton::{SkeletonSystem, SystemStatus, env};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let default_filter = if args.verbose {
        "sentence_skeleton=debug"
    } else {
        env::DEFAULT_LOG_FILTER
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let Some(command) = args.command.as_ref() else {
        anyhow::bail!("No command specified. Use 'sentence-skeleton --help' to see available commands.");
    };

    match command {
        Commands::ShowConfig => {
            ConfigDiscovery::show_discovery_info();
            return Ok(());
        }
        Commands::InitConfig => {
            let path = ConfigDiscovery::create_default_user_config()?;
            println!("Configuration file: {}", path.display());
            return Ok(());
        }
        _ => {}
    }

    let mut config = ConfigDiscovery::load(args.config.as_deref())?;
    config.apply_env_overrides();
    let system = SkeletonSystem::new(config).context("Failed to initialize providers")?;

    match command {
        Commands::Generate { .. } => {
            if let Some((level, request)) = args.generation_request() {
                info!("Generating {} exercise", level);
                let analysis = system
                    .service()
                    .generate_sentence_analysis(level, &request)
                    .await?;
                print_analysis(&analysis)?;
            }
        }
        Commands::Analyze {
            sentence,
            level,
            routing,
        } => {
            let analysis = system
                .service()
                .analyze_custom_sentence(sentence, *level, &routing.service_options())
                .await?;
            print_analysis(&analysis)?;
        }
        Commands::Status => {
            let status = system.status().await;
            print_status(&status);
        }
        Commands::Bank { action } => {
            let bank = system.bank();
            match action {
                BankCommands::Random { level, exclude } => {
                    match bank.get_random(*level, exclude.as_deref()).await? {
                        Some(analysis) => print_analysis(&analysis)?,
                        None => println!("No matching exercises in {:?}", bank.path()),
                    }
                }
                BankCommands::Size { level } => {
                    let size = bank.size(*level).await?;
                    match level {
                        Some(level) => println!("{} {} exercise(s)", size, level),
                        None => println!("{} exercise(s)", size),
                    }
                }
            }
        }
        Commands::ShowConfig | Commands::InitConfig => {}
    }

    Ok(())
}

fn print_analysis(analysis: &SentenceAnalysis) -> Result<()> {
    let json =
        serde_json::to_string_pretty(analysis).context("Failed to serialize sentence analysis")?;
    println!("{}", json);
    Ok(())
}

fn print_status(status: &SystemStatus) {
    println!(
        "System: {}",
        if status.is_healthy {
            "✓ healthy"
        } else {
            "✗ no provider available"
        }
    );
    println!(
        "Fallback: {} (retries: {}, delay: {}ms)",
        if status.fallback.enabled { "on" } else { "off" },
        status.fallback.retry_count,
        status.fallback.retry_delay_ms
    );
    println!();
    println!("{:<12} {:<10} {:<28} LAST ERROR", "PROVIDER", "AVAILABLE", "MODEL");
    for provider in &status.providers {
        println!(
            "{:<12} {:<10} {:<28} {}",
            provider.name,
            if provider.available { "yes" } else { "no" },
            provider.model.as_deref().unwrap_or("-"),
            provider.last_error.as_deref().unwrap_or("-")
        );
    }
    println!();
    match status.bank_size {
        Some(size) => println!("Question bank: {} exercise(s)", size),
        None => println!("Question bank: unreadable"),
    }
}
