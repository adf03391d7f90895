//! CLI for ClipForge - prompt-to-video generation.

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use clipforge::{AppConfig, GenerationRequest, InputImage, Orchestrator, ProviderKind};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "clipforge")]
#[command(about = "Generate videos via Veo (Kie.ai) or Sora and store them in a bucket")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server
    Serve,

    /// Generate a single video and print its public URL
    Generate(GenerateArgs),

    /// List available providers
    Providers,
}

#[derive(Args)]
struct GenerateArgs {
    /// The text prompt describing the video
    prompt: String,

    /// Provider to use
    #[arg(short, long, value_enum, default_value = "kie")]
    provider: ProviderArg,

    /// Reference image (path to image file)
    #[arg(short, long)]
    image: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
enum ProviderArg {
    Kie,
    Sora,
}

impl From<ProviderArg> for ProviderKind {
    fn from(arg: ProviderArg) -> Self {
        match arg {
            ProviderArg::Kie => ProviderKind::Kie,
            ProviderArg::Sora => ProviderKind::Sora,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Serve => {
            serve().await?;
        }
        Commands::Generate(args) => {
            generate(args, cli.json).await?;
        }
        Commands::Providers => {
            list_providers(cli.json)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| {
            if verbose {
                EnvFilter::try_new("clipforge=debug,info")
            } else {
                EnvFilter::try_new("clipforge=info,warn")
            }
        })
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn serve() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;
    let orchestrator = Orchestrator::from_config(&config)?;
    let app = clipforge::server::router(Arc::new(orchestrator));

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    tracing::info!(addr = %config.bind_addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("failed to listen for ctrl-c: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

async fn generate(args: GenerateArgs, json_output: bool) -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;
    let orchestrator = Orchestrator::from_config(&config)?;

    let mut request = GenerationRequest::new(&args.prompt);
    if let Some(path) = &args.image {
        request = request.with_image(read_image(path).await?);
    }

    let kind = ProviderKind::from(args.provider);
    let result = orchestrator.generate(kind, &request).await?;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("Generated video: {} via {}", result.video_id, kind);
        println!("Download URL: {}", result.download_url);
        println!(
            "Model: {} ({}, {}s)",
            result.model, result.size, result.duration_seconds
        );
    }

    Ok(())
}

async fn read_image(path: &Path) -> anyhow::Result<InputImage> {
    let data = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".to_string());

    let mut image = InputImage::new(data, filename);
    let content_type = match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("png") => Some("image/png"),
        Some(ext) if ext.eq_ignore_ascii_case("jpg") || ext.eq_ignore_ascii_case("jpeg") => {
            Some("image/jpeg")
        }
        Some(ext) if ext.eq_ignore_ascii_case("webp") => Some("image/webp"),
        _ => None,
    };
    if let Some(ct) = content_type {
        image = image.with_content_type(ct);
    }
    Ok(image)
}

fn list_providers(json_output: bool) -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    #[derive(serde::Serialize)]
    struct ProviderInfo {
        name: &'static str,
        kind: &'static str,
        env_var: &'static str,
        configured: bool,
        image_input: bool,
    }

    let providers: Vec<ProviderInfo> = ProviderKind::ALL
        .iter()
        .map(|kind| {
            let (name, env_var, image_input) = match kind {
                ProviderKind::Kie => ("Veo (Kie.ai)", "KIE_API_KEY", true),
                ProviderKind::Sora => ("Sora", "SORA_API_KEY", false),
            };
            ProviderInfo {
                name,
                kind: kind.as_str(),
                env_var,
                configured: std::env::var(env_var).is_ok_and(|v| !v.trim().is_empty()),
                image_input,
            }
        })
        .collect();

    if json_output {
        println!("{}", serde_json::to_string_pretty(&providers)?);
    } else {
        println!("Available providers:\n");
        for p in &providers {
            let status = if p.configured { "✓" } else { "✗" };
            println!("  {} {} ({})", status, p.name, p.kind);
            println!("    API key: {}", p.env_var);
            if !p.image_input {
                println!("    Reference images are stored but not sent to this provider");
            }
        }
    }

    Ok(())
}
