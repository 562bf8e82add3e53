use clap::Parser;
use heatgrid::config::{DEFAULT_MATRIX_URL, DEFAULT_SENSOR_URL};
use heatgrid::core_modules::color_scale::Palette;
use heatgrid::dashboard::{AnySource, SourceKind};
use heatgrid::{Dashboard, DashboardConfig};
use heatgrid_visualizer::{FrameBus, ServerConfig, start_server};
use std::time::Duration;

#[derive(Debug, Parser)]
#[command(name = "standalone", about = "Serve the live heat grid to a browser")]
struct Args {
    /// Address the web view listens on.
    #[arg(long, env = "HEATGRID_BIND", default_value = "127.0.0.1:3001")]
    bind: String,

    #[arg(long, value_enum, default_value_t = SourceKind::Matrix)]
    source: SourceKind,

    #[arg(long, env = "HEATGRID_MATRIX_URL", default_value = DEFAULT_MATRIX_URL)]
    matrix_url: String,

    #[arg(long, env = "HEATGRID_SENSOR_URL", default_value = DEFAULT_SENSOR_URL)]
    sensor_url: String,

    #[arg(long, default_value_t = 1000)]
    interval_ms: u64,

    #[arg(long, value_enum, default_value_t = Palette::Viridis)]
    palette: Palette,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    heatgrid::init_tracing("heatgrid=info,heatgrid_visualizer=info");
    let args = Args::parse();

    let interval = Duration::from_millis(args.interval_ms);
    let config = DashboardConfig {
        poll_interval: interval,
        transition: interval,
        matrix_url: args.matrix_url,
        sensor_url: args.sensor_url,
        palette: args.palette,
        ..DashboardConfig::default()
    };

    let bus = FrameBus::new(4);
    let server = start_server(bus.clone(), ServerConfig { bind_addr: args.bind }).await?;
    tracing::info!(addr = %server.local_addr, "web view ready");

    let source = AnySource::from_config(args.source, &config)?;
    let dashboard = Dashboard::start(config, source, bus);

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");

    dashboard.stop().await?;
    server.abort();
    Ok(())
}
