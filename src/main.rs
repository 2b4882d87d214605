// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::{Context, Result};
use clap::Parser;
use std::{net::SocketAddr, sync::Arc, time::Duration};
use toy_transformer::{
    api::{start_server, AppState},
    cli::ServerArgs,
    config::AppConfig,
    detection::DetectorClient,
    diffusion::PromptImageClient,
    logging,
    pipeline::{Backends, ImageProcessor},
    prompts::PromptManager,
    segmentation::SegmenterClient,
    storage::StorageGovernor,
    version,
    vision::VlmClient,
};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let args = ServerArgs::parse();

    let mut config = AppConfig::load(args.config.as_deref())?;
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    logging::init_tracing(&config.logging)?;
    info!("{}", version::get_version_string());

    let model = VlmClient::new(
        &config.models.endpoint,
        &config.models.model,
        Duration::from_secs(config.models.timeout_secs),
    )?
    .with_api_key(config.models.api_key.clone());
    let detector = DetectorClient::new(
        &config.detector.endpoint,
        Duration::from_secs(config.detector.timeout_secs),
    )?;
    let segmenter = SegmenterClient::new(
        &config.segmenter.endpoint,
        Duration::from_secs(config.segmenter.timeout_secs),
    )?;
    let synthesizer = PromptImageClient::new(
        &config.image_generation.base_url,
        config.image_generation.image_size()?,
        Duration::from_secs(config.image_generation.timeout_secs),
    )?;

    if !model.health_check().await {
        warn!("Vision-language model at {} is not reachable yet", config.models.endpoint);
    }
    if !detector.health_check().await {
        warn!(
            "Detector at {} is not reachable, requests will use keyword fallback",
            config.detector.endpoint
        );
    }
    if !segmenter.health_check().await {
        warn!("Segmenter at {} is not reachable yet", config.segmenter.endpoint);
    }

    let prompts = match &config.prompts.catalog {
        Some(path) => PromptManager::from_file(path, config.prompts.assets_dir.clone())
            .await
            .with_context(|| format!("failed to load prompt catalog {}", path.display()))?,
        None => PromptManager::builtin()?,
    };

    let uploads = Arc::new(
        StorageGovernor::new(config.storage.upload_dir.clone(), config.storage.max_uploads).await?,
    );
    let outputs = Arc::new(
        StorageGovernor::new(config.storage.output_dir.clone(), config.storage.max_outputs).await?,
    );

    info!(
        "Upload staging: {} (keep {}), output archive: {} (keep {})",
        uploads.dir().display(),
        uploads.capacity(),
        outputs.dir().display(),
        outputs.capacity()
    );

    if let Some(dir) = &config.storage.workspace_dir {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("failed to create workspace dir {}", dir.display()))?;
    }

    let settings = config.pipeline_settings();
    let processor = ImageProcessor::new(
        Backends {
            model: Arc::new(model),
            detector: Arc::new(detector),
            segmenter: Arc::new(segmenter),
            synthesizer: Arc::new(synthesizer),
            prompts: Arc::new(prompts),
        },
        &settings,
        outputs,
    )?;

    let state = AppState {
        processor: Arc::new(processor),
        uploads,
        max_upload_bytes: settings.max_upload_bytes,
    };

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .with_context(|| {
            format!(
                "invalid bind address {}:{}",
                config.server.host, config.server.port
            )
        })?;

    start_server(Arc::new(state), addr).await
}
