// src/main.rs

use anyhow::{Context, Result};
use libras_bridge::{
    inference::load_classifier,
    landmarks::OnnxHandLandmarker,
    pipeline::{FramePipeline, PipelineConfig, PipelineMetrics},
    server::{self, AppState},
    types::Config,
};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

const CONFIG_ENV: &str = "LIBRAS_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config.yaml";

#[tokio::main]
async fn main() -> Result<()> {
    let config_path =
        std::env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let config = Config::load_or_default(&config_path)?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "libras_bridge={level},ort=warn,tower_http=info",
                level = config.logging.level
            ))
        }))
        .init();

    info!("🤟 Libras Bridge starting");
    info!("✓ Configuration loaded ({})", config_path);
    info!(
        "Recognition: clip_size={}, confirm={}, min_new_frames={}, frame_skip={}",
        config.recognition.clip_size,
        config.recognition.confirmation_threshold,
        config.recognition.min_new_frames,
        config.performance.frame_skip
    );

    let extractor = OnnxHandLandmarker::new(&config.landmarks)
        .context("Hand landmark model is required")?;
    info!("✓ Hand landmarker ready");

    let classifier = load_classifier(&config.classifier, config.classifier_input_len());

    let pipeline = FramePipeline::new(
        Arc::new(extractor),
        classifier,
        PipelineConfig::from_config(&config),
        PipelineMetrics::new(),
    );

    server::serve(AppState::new(config, pipeline)).await?;

    info!("👋 Libras Bridge stopped");
    Ok(())
}
