use anyhow::{bail, Context, Result};
use ansscraper::{
    config::Config,
    fetch::{self, HttpListingClient},
    report,
};
use reqwest::Client;
use tokio::time::Instant;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};
use url::Url;

#[tokio::main]
async fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,ansscraper=info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .init();
    info!("startup");

    std::panic::set_hook(Box::new(|info| {
        eprintln!("panic: {:?}", info);
    }));

    // ─── 2) config & workspace ───────────────────────────────────────
    let cfg = Config::load()?;
    cfg.workspace.prepare()?;
    let client = Client::new();
    let base = Url::parse(&cfg.base_url).with_context(|| format!("base url {}", cfg.base_url))?;
    let start = Instant::now();

    // ─── 3) pick the newest quarters ─────────────────────────────────
    let listing = HttpListingClient::new(client.clone(), &cfg.http);
    let archives = fetch::resolve(&listing, &base, cfg.quarters).await?;
    if archives.is_empty() {
        bail!("no quarterly archives found under {}", base);
    }
    info!(
        "{} quarters selected: {:?}",
        archives.len(),
        archives.iter().map(|a| a.relative_path()).collect::<Vec<_>>()
    );

    // ─── 4) download + extract ───────────────────────────────────────
    let sources = fetch::retrieve_all(
        &client,
        &base,
        &archives,
        &cfg.workspace,
        cfg.download_concurrency,
    )
    .await;
    if sources.is_empty() {
        bail!("none of the {} archives could be retrieved", archives.len());
    }
    if sources.len() < archives.len() {
        error!(
            "only {} of {} archives retrieved; continuing",
            sources.len(),
            archives.len()
        );
    }

    // ─── 5) operator registry ────────────────────────────────────────
    let registry_url =
        Url::parse(&cfg.registry_url).with_context(|| format!("registry url {}", cfg.registry_url))?;
    let registry_name = registry_url
        .path_segments()
        .and_then(|s| s.last())
        .filter(|n| !n.is_empty())
        .unwrap_or("operators.csv")
        .to_string();
    let registry = fetch::download_file(
        &client,
        &registry_url,
        cfg.workspace.root.join(registry_name),
    )
    .await?;
    info!("registry saved to {}", registry.display());

    // ─── 6) consolidate on the blocking pool ─────────────────────────
    let summary = tokio::task::spawn_blocking({
        let cfg = cfg.clone();
        move || report::run(&cfg, &registry, &sources)
    })
    .await??;

    if cfg.clean_intermediate {
        cfg.workspace.clean_intermediate()?;
        info!("removed intermediate folders");
    }

    info!(
        inputs = summary.inputs,
        rows = summary.rows,
        output = %summary.output.display(),
        archive = %summary.archive.display(),
        elapsed = ?start.elapsed(),
        "all done"
    );
    Ok(())
}
