mod analysis;
mod blob;
mod config;
mod convert;
mod errors;
mod llm_client;
mod models;
mod review;
mod routes;
mod session;
mod state;
mod store;
mod upload;

use anyhow::{Context, Result};
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use bytes::Bytes;
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::analysis::{AnalysisQueue, FeedbackAnalyzer, LlmAnalyzer, QueuedAnalyzer};
use crate::blob::{BlobStore, S3BlobStore, UploadFile};
use crate::config::{AnalysisMode, Config};
use crate::convert::PdftoppmRenderer;
use crate::llm_client::LlmClient;
use crate::models::resume::{JobDetails, ResumeStatus};
use crate::review::{PollPolicy, ReviewSession};
use crate::routes::build_router;
use crate::session::SessionStatus;
use crate::state::AppState;
use crate::store::{RedisKvStore, ResumeStore};
use crate::upload::{UploadPipeline, UploadRequest};

#[derive(Parser)]
#[command(name = "resumind", version, about = "AI résumé analyzer")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP API (default)
    Serve,
    /// Watch one résumé until its analysis settles
    Review {
        /// Record id returned by an upload
        id: String,
    },
    /// Upload a PDF and review the result
    Upload {
        pdf: PathBuf,
        #[arg(long)]
        company: Option<String>,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
    /// Drain the analysis queue
    Worker,
}

/// Clients shared by every subcommand.
struct Services {
    config: Config,
    redis: redis::Client,
    store: ResumeStore,
    blobs: Arc<dyn BlobStore>,
    llm: LlmClient,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!("Starting Resumind v{}", env!("CARGO_PKG_VERSION"));

    let services = connect(config).await?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(services).await,
        Command::Review { id } => review(&services, id).await,
        Command::Upload {
            pdf,
            company,
            title,
            description,
        } => {
            let job = JobDetails {
                company_name: company,
                job_title: title,
                job_description: description,
            };
            upload(&services, &pdf, job).await
        }
        Command::Worker => worker(services).await,
    }
}

async fn connect(config: Config) -> Result<Services> {
    // Initialize Redis
    let redis = redis::Client::open(config.redis_url.clone())?;
    let kv = RedisKvStore::connect(&redis)
        .await
        .context("Failed to connect to Redis")?;
    info!("Redis client initialized");

    // Initialize S3 / MinIO
    let s3 = build_s3_client(&config).await;
    let blobs: Arc<dyn BlobStore> = Arc::new(S3BlobStore::new(s3, config.s3_bucket.clone()));
    info!("S3 client initialized (bucket: {})", config.s3_bucket);

    // Initialize LLM client
    let llm = LlmClient::new(config.anthropic_api_key.clone())?;
    info!("LLM client initialized (model: {})", llm_client::MODEL);

    Ok(Services {
        config,
        redis,
        store: ResumeStore::new(Arc::new(kv)),
        blobs,
        llm,
    })
}

async fn build_pipeline(services: &Services) -> Result<UploadPipeline> {
    let analyzer: Arc<dyn FeedbackAnalyzer> = match services.config.analysis_mode {
        AnalysisMode::Inline => Arc::new(LlmAnalyzer::new(
            services.llm.clone(),
            Arc::clone(&services.blobs),
        )),
        AnalysisMode::Queued => {
            let queue = AnalysisQueue::connect(&services.redis).await?;
            Arc::new(QueuedAnalyzer::new(queue))
        }
    };
    info!("Analysis mode: {:?}", services.config.analysis_mode);

    Ok(UploadPipeline::new(
        services.store.clone(),
        Arc::clone(&services.blobs),
        Arc::new(PdftoppmRenderer::new(services.config.pdftoppm_bin.clone())),
        analyzer,
    ))
}

async fn serve(services: Services) -> Result<()> {
    let pipeline = build_pipeline(&services).await?;
    let port = services.config.port;

    // Build app state
    let state = AppState {
        store: services.store,
        blobs: services.blobs,
        pipeline,
        api_token: Arc::from(services.config.api_token.as_str()),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{port}").parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    Ok(())
}

async fn review(services: &Services, id: String) -> Result<()> {
    let session = ReviewSession::mount(
        id,
        services.store.clone(),
        Arc::clone(&services.blobs),
        PollPolicy::default(),
    );
    let last = review::console::run(session).await?;
    match last.message() {
        Some(message) if last.status() == ResumeStatus::Error => anyhow::bail!("{message}"),
        _ => Ok(()),
    }
}

async fn upload(services: &Services, pdf: &Path, job: JobDetails) -> Result<()> {
    let bytes = tokio::fs::read(pdf)
        .await
        .with_context(|| format!("Failed to read {}", pdf.display()))?;
    let name = pdf
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "resume.pdf".to_string());

    let request = UploadRequest {
        job,
        file: Some(UploadFile {
            name,
            content_type: "application/pdf".to_string(),
            bytes: Bytes::from(bytes),
        }),
    };

    let pipeline = build_pipeline(services).await?;
    let outcome = pipeline.run(request, SessionStatus::local()).await?;
    info!("Uploaded {} -> {}", pdf.display(), outcome.review_path());

    review(services, outcome.id).await
}

async fn worker(services: Services) -> Result<()> {
    let queue = AnalysisQueue::connect(&services.redis).await?;
    let analyzer = Arc::new(LlmAnalyzer::new(services.llm, Arc::clone(&services.blobs)));

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        info!("Shutdown requested");
        signal.cancel();
    });

    analysis::worker::run(queue, services.store, analyzer, shutdown).await;
    Ok(())
}

/// Constructs an S3 client configured for MinIO (local) or AWS (production).
async fn build_s3_client(config: &Config) -> aws_sdk_s3::Client {
    let credentials = Credentials::new(
        &config.aws_access_key_id,
        &config.aws_secret_access_key,
        None,
        None,
        "resumind-static",
    );

    let s3_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .credentials_provider(credentials)
        .endpoint_url(&config.s3_endpoint)
        .load()
        .await;

    aws_sdk_s3::Client::new(&s3_config)
}
