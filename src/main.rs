use std::error::Error;
use std::path::PathBuf;

use clap::Parser;
use colored::Colorize;
use dotenv::dotenv;
use tracing::{info, span, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use wco_vrp::api::{start_api_server, OrsClient};
use wco_vrp::config::AppConfig;
use wco_vrp::data::ScheduleLoader;
use wco_vrp::output::{create_output_directory, write_schedule_artifacts};
use wco_vrp::pipeline::Cvrp;

#[derive(Parser, Debug)]
#[command(name = "wco-router", about = "CVRP route optimizer for WCO collection")]
struct Args {
    /// Solver to use for route optimization
    #[arg(long, default_value = "schedule")]
    solver: String,

    /// Start the API server instead of running the pipeline directly
    #[arg(long)]
    api: bool,

    /// Port for the API server
    #[arg(long, default_value_t = 8000)]
    port: u16,

    /// Skip the clustering pass before vehicle assignment (not recommended)
    #[arg(long)]
    disable_scheduling: bool,

    /// Schedule config document
    #[arg(long, default_value = "data/schedule_config.json")]
    config: PathBuf,

    /// Directory holding the per-schedule location CSVs
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,

    /// Directory for per-run artifacts
    #[arg(long, default_value = "output")]
    output_dir: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env()) // Reads RUST_LOG
        .with(
            fmt::layer()
                .with_span_events(fmt::format::FmtSpan::NEW | fmt::format::FmtSpan::CLOSE)
                .compact(),
        )
        .init();

    dotenv().ok();
    let args = Args::parse();

    if args.api {
        info!("Starting API server on port {}...", args.port);
        start_api_server(args.port).await?;
        return Ok(());
    }

    let config = AppConfig::load(&args.config)?;
    let mut settings = config.settings.clone();
    settings.solver = args.solver.clone();
    info!("Using {} solver", settings.solver);

    let mut cvrp = Cvrp::from_config(&settings)?;
    cvrp.set_use_geo_cluster(!args.disable_scheduling);

    let mut registry = ScheduleLoader::load_all_schedules(&config.schedules, &args.data_dir)?;
    for location in config.locations.clone() {
        registry.add(location);
    }
    info!(
        "Loaded {} locations across {} schedules",
        registry.len(),
        config.schedules.len()
    );

    let outcome = {
        let span = span!(Level::INFO, "pipeline", solver = %settings.solver);
        let _guard = span.enter();
        cvrp.process(&config.schedules, &mut registry)
    };

    let mut results = outcome.results;
    match OrsClient::from_env() {
        Some(ors) => {
            for result in &mut results {
                ors.attach_road_paths(result).await;
            }
        }
        None => info!("ORS_API_KEY not set; skipping road geometry lookup"),
    }

    let output_dir = create_output_directory(&args.output_dir)?;
    write_schedule_artifacts(&output_dir, &results, &outcome.reports)?;

    cvrp.print_daily_summaries(&outcome.ledger);

    for report in &outcome.reports {
        let line = format!(
            "{}: {}/{} locations routed",
            report.schedule_name, report.processed, report.total_locations
        );
        if report.missing.is_empty() {
            println!("{}", line.green());
        } else {
            println!(
                "{} ({} missing, {:.1}L missed)",
                line.red(),
                report.missing.len(),
                report.total_missed_wco
            );
        }
    }
    println!(
        "Artifacts written to {}",
        output_dir.display().to_string().bold()
    );

    Ok(())
}
