use std::{
    fs::{self, File},
    io::{self, BufReader, Write},
    path::PathBuf,
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use gravewalk::{Settings, load_guide, parse_lon_lat, replay, resolve_destination};
use gravewalk_core::plan;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "gravewalk", version, about = "Walking directions to graves and landmarks")]
struct Cli {
    /// TOML settings file with a `[guidance]` table
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build the path graph and write it as GeoJSON for inspection
    Graph {
        #[arg(long, value_name = "PATH")]
        features: PathBuf,
        /// Defaults to stdout
        #[arg(long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Plan a single route and print it as GeoJSON
    Route {
        #[arg(long, value_name = "PATH")]
        features: PathBuf,
        /// Start position as `lon,lat`
        #[arg(long, value_name = "LON,LAT", allow_hyphen_values = true)]
        from: String,
        /// Destination feature id, name, or a part of its name
        #[arg(long)]
        to: String,
    },
    /// Replay a `timestamp,lon,lat` CSV trace and print each state change as JSON
    Replay {
        #[arg(long, value_name = "PATH")]
        features: PathBuf,
        /// Destination feature id, name, or a part of its name
        #[arg(long)]
        to: String,
        #[arg(long, value_name = "PATH")]
        trace: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref())?;

    match cli.command {
        Command::Graph { features, output } => {
            let guide = load_guide(&features, &settings)?;
            let graph = guide.graph().current()?;
            info!(
                "{} nodes, {} edges, {} degenerate segments dropped",
                graph.node_count(),
                graph.edge_count(),
                graph.dropped_edge_count()
            );
            let rendered = graph.to_geojson().to_string();
            match output {
                Some(path) => fs::write(&path, rendered)
                    .with_context(|| format!("writing {}", path.display()))?,
                None => println!("{rendered}"),
            }
        }
        Command::Route { features, from, to } => {
            let guide = load_guide(&features, &settings)?;
            let start = parse_lon_lat(&from)?;
            let destination = resolve_destination(&guide, &to)?;
            let graph = guide.graph().current()?;
            let route = plan(start, &destination, &graph, guide.config())?;
            info!(
                "{:.0} m to {} in {} steps",
                route.total_distance,
                route.destination_name,
                route.steps.len()
            );
            println!("{}", route.to_geojson());
        }
        Command::Replay { features, to, trace } => {
            let guide = load_guide(&features, &settings)?;
            let destination = resolve_destination(&guide, &to)?;
            let file = File::open(&trace).with_context(|| format!("opening {}", trace.display()))?;
            let rows = replay::read_trace(BufReader::new(file))?;

            let stdout = io::stdout();
            let mut out = stdout.lock();
            for state in replay::replay(&guide, destination.id, &rows) {
                serde_json::to_writer(&mut out, &state)?;
                writeln!(out)?;
            }
        }
    }

    Ok(())
}
