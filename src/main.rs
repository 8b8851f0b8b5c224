use anyhow::Context;
use clap::Parser;
use lc_classify::adapters::light_curve::read_light_curves_from_file;
use lc_classify::core::LightCurve;
use lc_classify::utils::logger;
use lc_classify::{
    ClassifierConfig, CliConfig, ConnectionCache, T2Classifier, TcpConnectionFactory,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    if cli.json_logs {
        logger::init_json_logger();
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    tracing::info!("Starting lc-classify");
    tracing::debug!("CLI config: {:?}", cli);

    let mut config = ClassifierConfig::from_file(&cli.config)
        .with_context(|| format!("failed to load config file '{}'", cli.config))?;

    if let Some(address) = &cli.address {
        tracing::info!("Service address overridden to {}", address);
        config.classify.default = address.clone();
    }

    let run_config = match &cli.run_config {
        Some(raw) => serde_json::from_str(raw).context("--run-config is not valid JSON")?,
        None => serde_json::Value::Null,
    };

    let cache = ConnectionCache::new(
        TcpConnectionFactory::new(config.call_timeout())
            .with_connect_timeout(config.connect_timeout()),
    );
    let unit = match T2Classifier::new(&config, &cache) {
        Ok(unit) => unit,
        Err(e) => {
            tracing::error!("❌ Classifier could not be constructed: {}", e);
            eprintln!("❌ {}", e.user_friendly_message());
            std::process::exit(1);
        }
    };

    let light_curves = read_light_curves_from_file(&cli.input)
        .with_context(|| format!("failed to read observations from '{}'", cli.input))?;
    tracing::info!("Classifying {} light curves", light_curves.len());

    let mut failed = 0usize;
    for light_curve in &light_curves {
        let result = unit.run(light_curve, &run_config).await;
        if let Some(state) = result.status() {
            tracing::warn!("{} finished with {}", light_curve.id(), state);
            failed += 1;
        }
        println!(
            "{}",
            serde_json::json!({"object_id": light_curve.id(), "result": result})
        );
    }

    tracing::info!(
        "✅ Done: {} classified, {} failed",
        light_curves.len() - failed,
        failed
    );

    if failed > 0 {
        std::process::exit(2);
    }

    Ok(())
}
