//! # News Podcast
//!
//! Turns news search results into two-host podcast episodes.
//!
//! ## Pipeline
//!
//! For every active keyword, highest priority first:
//! 1. **Search**: newest results from the news portal
//! 2. **Dedup**: skip links that already have an episode
//! 3. **Extract**: tiered article-body extraction with cleaning and validation
//! 4. **Script**: generate and validate a two-host dialogue
//! 5. **Audio**: per-turn speech synthesis, then frame-level MP3 stitching
//! 6. **Publish**: store the artifact and record the episode
//!
//! ## Usage
//!
//! ```sh
//! news_podcast run
//! news_podcast serve --port 5000
//! ```

use clap::Parser;
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod alert;
mod audio;
mod cli;
mod config;
mod error;
mod extract;
mod fetch;
mod models;
mod pipeline;
mod publish;
mod script;
mod search;
mod server;
mod store;
mod utils;

use alert::{Alerter, KakaoAlerter, LogAlerter};
use audio::assemble::{EpisodeAssembler, load_jingle};
use audio::mp3::{Mp3Clip, StreamFormat};
use audio::synth::Synthesizer;
use audio::tts::GoogleTts;
use cli::{Cli, Command};
use config::PipelineConfig;
use error::ConfigError;
use fetch::HttpFetcher;
use pipeline::PipelineContext;
use publish::{DirectoryStorage, Publisher};
use script::{GeminiClient, ScriptGenerator};
use store::EpisodeStore;
use store::mysql::MySqlStore;
use utils::ensure_writable_dir;

fn build_alerter(args: &Cli, cooldown: Duration) -> Arc<dyn Alerter> {
    match &args.kakao_access_token {
        Some(token) => match KakaoAlerter::new(token.clone(), cooldown) {
            Ok(alerter) => Arc::new(alerter),
            Err(e) => {
                warn!(error = %e, "Cannot build alert client; alerts go to the log");
                Arc::new(LogAlerter)
            }
        },
        None => Arc::new(LogAlerter),
    }
}

fn build_context(
    args: &Cli,
    config: PipelineConfig,
    jingle: Option<Mp3Clip>,
    alerter: Arc<dyn Alerter>,
) -> Result<PipelineContext, ConfigError> {
    if args.gemini_api_key.is_none() {
        warn!("GEMINI_API_KEY not set; script generation will fail");
    }
    if args.google_tts_api_key.is_none() {
        warn!("GOOGLE_TTS_API_KEY not set; speech synthesis will fail");
    }

    let store: Arc<dyn EpisodeStore> = Arc::new(MySqlStore::connect_lazy(&args.db_settings()));
    let gemini = GeminiClient::new(args.gemini_api_key.clone(), &config.generation)?;
    let tts = GoogleTts::new(args.google_tts_api_key.clone(), config.speech.clone())?;
    let storage = DirectoryStorage::new(args.storage_dir.clone());

    Ok(PipelineContext {
        fetcher: Arc::new(HttpFetcher::new(config.fetch_timeout())?),
        store: store.clone(),
        generator: ScriptGenerator::new(Box::new(gemini), config.generation.clone()),
        synthesizer: Synthesizer::new(Arc::new(tts)),
        assembler: EpisodeAssembler::new(config.assembly.clone(), jingle),
        publisher: Publisher::new(Arc::new(storage), store),
        alerter,
        config,
    })
}

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!(version = env!("CARGO_PKG_VERSION"), "news_podcast starting up");

    let args = Cli::parse();

    // ---- Configuration: the only fatal error class ----
    let config = match PipelineConfig::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            build_alerter(&args, Duration::ZERO)
                .alert("설정 오류", &e.to_string())
                .await;
            return Err(e.into());
        }
    };
    let alerter = build_alerter(&args, Duration::from_secs(config.alert_cooldown_secs));

    let output_dir = config.assembly.output_dir.to_string_lossy().into_owned();
    if let Err(e) = ensure_writable_dir(&output_dir).await {
        error!(
            path = %output_dir,
            error = %e,
            "Output directory is not writable (fix perms or choose a different path)"
        );
        alerter.alert("설정 오류", &format!("{output_dir}: {e}")).await;
        return Err(e);
    }

    // speech comes back mono at the configured rate; the jingle must match
    let speech_format = StreamFormat {
        sample_rate: config.speech.sample_rate_hertz,
        channels: 1,
    };
    let jingle = match load_jingle(&config.assembly, speech_format).await {
        Ok(jingle) => jingle,
        Err(e) => {
            error!(error = %e, "Opening jingle cannot be used");
            alerter.alert("설정 오류", &e.to_string()).await;
            return Err(e.into());
        }
    };

    let ctx = match build_context(&args, config, jingle, alerter.clone()) {
        Ok(ctx) => Arc::new(ctx),
        Err(e) => {
            error!(error = %e, "Cannot build pipeline");
            alerter.alert("설정 오류", &e.to_string()).await;
            return Err(e.into());
        }
    };

    // ---- Shutdown: finish the in-flight article, then stop ----
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Received Ctrl+C; stopping after the current article");
                cancel.cancel();
            }
        });
    }

    match args.command {
        Command::Serve { port } => {
            server::serve(server::AppState::new(ctx, cancel), port).await?;
        }
        Command::Run => {
            if let Err(e) = ctx.store.bootstrap().await {
                warn!(error = %e, "Schema bootstrap failed; running anyway");
            }
            let stats = ctx.run_once(&cancel).await?;
            info!(
                %stats,
                elapsed_secs = start_time.elapsed().as_secs(),
                "news_podcast finished"
            );
            if stats.failed > 0 && stats.success == 0 {
                return Err(format!("batch produced no episode ({stats})").into());
            }
        }
    }

    Ok(())
}
