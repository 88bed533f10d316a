mod cli;

use std::process;

use anyhow::Context;
use clap::{CommandFactory, Parser};
use cli::commands::{Cli, Commands};
use cli::reporter::CliReporter;
use colored::*;
use dotenv::dotenv;
use tracing::{error, info};
use vision_descr::{config, stats, AppConfig, DescribeEngine};

fn main() {
    dotenv().ok();

    let args = Cli::parse();

    let Some(command) = args.command else {
        let _ = Cli::command().print_long_help();
        return;
    };

    let config = match config::load_configuration(args.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{} {}", "Error loading configuration:".red(), err);
            process::exit(1);
        }
    };

    let guard = cli::logging::init_logger(&config.paths.log_file);

    let outcome = match command {
        Commands::DescribeAll => run_describe(&config),
        Commands::ResumeStats => run_resume_stats(&config),
        Commands::PrintConfig => run_print_config(&config),
    };

    if let Err(err) = outcome {
        error!("Error: {:#}", err);
        drop(guard);
        process::exit(1);
    }
}

fn run_describe(config: &AppConfig) -> anyhow::Result<()> {
    info!("Starting describe-all with model {}", config.openai.model);
    let engine = DescribeEngine::new(config.clone());
    let reporter = CliReporter::new();
    let result = engine.run(&reporter)?;

    info!(
        "Done: {} described, {} skipped, {} words (≈{} tokens) in {}",
        format!("{}", result.processed).green(),
        format!("{}", result.skipped).cyan(),
        result.total_words,
        result.total_tokens,
        format!("{:.2}s", result.duration.as_secs_f64()).green(),
    );
    if result.missing + result.failed > 0 {
        info!(
            "{} rows left pending ({} missing images, {} without a description)",
            format!("{}", result.missing + result.failed).red(),
            result.missing,
            result.failed,
        );
    }
    Ok(())
}

fn run_resume_stats(config: &AppConfig) -> anyhow::Result<()> {
    let stats = stats::load_stats(&config.paths.output_csv)?;
    let name = config
        .paths
        .output_csv
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    println!("Summary of {}", name.bold());
    println!("Total rows: {}", stats.total_rows);
    println!("With description: {}", stats.with_description);
    println!("Total words: {}", stats.words_total);
    println!("Estimated tokens: {}", stats.tokens_total);
    println!("Average words/image: {}", stats.avg_words);
    println!("Average tokens/image: {}", stats.avg_tokens);
    Ok(())
}

fn run_print_config(config: &AppConfig) -> anyhow::Result<()> {
    let rendered = toml::to_string_pretty(config).context("rendering configuration")?;
    println!("{}", rendered);
    Ok(())
}
