use anyhow::{Context, Result};
use clap::Parser;
use loqa_assist::{
    create_router, AgentSet, AppState, AssistantServer, AudioPublisher, Config, HttpSynthesizer,
    HttpTranscriber, NatsTransport, Orchestrator, SentenceDispatcher, Transport,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "loqa-assist", about = "Voice assistant server for pub/sub connected devices")]
struct Cli {
    /// Configuration file, without extension
    #[arg(long, default_value = "config/loqa-assist")]
    config: String,

    /// Override nats.url
    #[arg(long)]
    nats_url: Option<String>,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,

    /// Do not start the HTTP status API
    #[arg(long)]
    no_http: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if cli.log_json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let mut cfg = Config::load(&cli.config)?;
    if let Some(url) = cli.nats_url {
        cfg.nats.url = url;
    }
    if cli.no_http {
        cfg.http.enabled = false;
    }

    info!("Loqa Assist v{}", env!("CARGO_PKG_VERSION"));
    info!("Loaded config: {}", cfg.service.name);

    let nats = NatsTransport::connect(&cfg.nats).await?;
    let inbound = nats.subscribe_devices(cfg.nats.inbound_capacity).await?;
    let nats = Arc::new(nats);
    let transport: Arc<dyn Transport> = nats.clone();

    let synthesizer = Arc::new(HttpSynthesizer::new(&cfg.speech).context("Failed to build TTS client")?);
    let transcriber = Arc::new(HttpTranscriber::new(&cfg.speech));
    let agents = AgentSet::openai(&cfg.llm).context("Failed to build LLM clients")?;
    let orchestrator = Arc::new(Orchestrator::new(agents, cfg.orchestrator.clone()));

    let publisher = AudioPublisher::new(Arc::clone(&transport), &cfg.dispatch);
    let (dispatcher, _dispatcher_task) =
        SentenceDispatcher::spawn(synthesizer, publisher, cfg.dispatch.queue_capacity);

    let server = Arc::new(AssistantServer::new(
        &cfg,
        Arc::clone(&transport),
        transcriber,
        orchestrator,
        dispatcher,
    ));
    let _sweepers = server.spawn_sweepers(&cfg);

    if let Err(e) = server.announce("online").await {
        error!("Failed to announce server online: {}", e);
    }

    if cfg.http.enabled {
        let addr = format!("{}:{}", cfg.http.bind, cfg.http.port);
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Failed to bind HTTP server to {}", addr))?;
        let app = create_router(AppState::new(Arc::clone(&server)));

        info!("HTTP server listening on {}", addr);
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                error!("HTTP server error: {}", e);
            }
        });
    }

    let inbound_loop = tokio::spawn(Arc::clone(&server).run(inbound));

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.context("Failed to listen for Ctrl+C")?;
            info!("Shutting down");
        }
        _ = inbound_loop => {
            error!("Inbound subscription ended");
        }
    }

    // Last-will equivalent
    if let Err(e) = server.announce("offline").await {
        error!("Failed to announce server offline: {}", e);
    }
    nats.flush().await?;

    Ok(())
}
