use std::{env, fs, process};

use suspicion_map::{AnalysisConfig, SuspicionAnalyzer, error::Result, report::JsonReport};

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    if let Err(err) = run().await {
        eprintln!("Error: {err}");
        process::exit(1);
    }
}

async fn run() -> Result<()> {
    let args = env::args().collect::<Vec<_>>();

    if args.len() < 2 {
        println!("Usage: {} <image_path> [config.json]", args[0]);
        println!();
        println!("Prints a block-level suspicion report as JSON.");
        return Ok(());
    }

    let config = match args.get(2) {
        Some(path) => AnalysisConfig::from_json(&fs::read_to_string(path)?)?,
        None => AnalysisConfig::default(),
    };

    let analyzer = SuspicionAnalyzer::open(&args[1])?.with_config(config);
    let report = analyzer.analyze().await?;

    println!("{}", JsonReport::from(&report).to_json()?);

    Ok(())
}
