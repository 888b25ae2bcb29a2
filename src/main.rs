use std::io::Write;

use axum_server::Handle;
use camino::Utf8PathBuf;
use clap::Parser;
use tokio::signal;
use tokio::signal::unix::SignalKind;

use hasslink::config;
use hasslink::error::ApiResult;
use hasslink::routes;
use hasslink::server::appstate::AppState;
use hasslink::server::http::HttpServer;

#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: Utf8PathBuf,
}

/*
 * Formatter function to output in syslog format. This makes sense when running
 * as a service (where output might go to a log file, or the system journal)
 */
#[allow(clippy::match_same_arms)]
fn syslog_format(
    buf: &mut pretty_env_logger::env_logger::fmt::Formatter,
    record: &log::Record,
) -> std::io::Result<()> {
    writeln!(
        buf,
        "<{}>{}: {}",
        match record.level() {
            log::Level::Error => 3,
            log::Level::Warn => 4,
            log::Level::Info => 6,
            log::Level::Debug => 7,
            log::Level::Trace => 7,
        },
        record.target(),
        record.args()
    )
}

fn init_logging() -> ApiResult<()> {
    /* Try to provide reasonable default filters, when RUST_LOG is not specified */
    const DEFAULT_LOG_FILTERS: &[&str] = &[
        "debug",
        "hyper_util=info",
        "reqwest=info",
        "tower_http::trace::on_request=info",
        "axum::rejection=trace",
    ];

    let log_filters = std::env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_LOG_FILTERS.join(","));

    /* Detect if we need syslog or human-readable formatting */
    if std::env::var("SYSTEMD_EXEC_PID").is_ok_and(|pid| pid == std::process::id().to_string()) {
        Ok(pretty_env_logger::env_logger::builder()
            .format(syslog_format)
            .parse_filters(&log_filters)
            .try_init()?)
    } else {
        Ok(pretty_env_logger::formatted_timed_builder()
            .parse_filters(&log_filters)
            .try_init()?)
    }
}

fn install_signal_handlers(handle: &Handle) -> ApiResult<()> {
    fn shutdown(msg: &str, handle: &Handle) {
        log::warn!("{msg}");
        let _ = std::io::stderr().flush();
        HttpServer::signal_stop(handle);
    }

    let hdl = handle.clone();
    tokio::spawn(async move {
        if matches!(signal::ctrl_c().await, Ok(())) {
            shutdown("Ctrl-C pressed, exiting..", &hdl);
        }
    });

    let hdl = handle.clone();
    let mut signal = signal::unix::signal(SignalKind::terminate())?;
    tokio::spawn(async move {
        if matches!(signal.recv().await, Some(())) {
            shutdown("SIGTERM received, exiting..", &hdl);
        }
    });

    Ok(())
}

async fn run() -> ApiResult<()> {
    let args = Args::parse();

    init_logging()?;

    let config = config::parse(&args.config)?;
    log::debug!("Configuration loaded successfully from [{}]", args.config);
    if config.has_links() {
        log::debug!("{} link(s) declared in config file", config.links.len());
    }

    let appstate = AppState::from_config(config).await?;

    if appstate.links().lock().await.entries().is_empty() {
        log::warn!("{}", "-".repeat(80));
        log::warn!("No links configured yet!");
        log::warn!("Hasslink will run, but does not mirror any switches.");
        log::warn!("");
        log::warn!(" ** Create a link with POST /api/links, or add one under `links:` **");
        log::warn!("{}", "-".repeat(80));
    }

    let conf = appstate.config();
    let server = HttpServer::http(conf.server.address, conf.server.port);

    install_signal_handlers(&server.handle())?;

    let res = server.serve(routes::router(appstate.clone())).await;

    appstate.links().lock().await.shutdown();

    res
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        log::error!("Hasslink error: {err}");
        log::error!("Fatal error encountered, cannot continue.");
    }
}
