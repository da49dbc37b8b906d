use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use std::path::{Path, PathBuf};
use std::time::Instant;

use rasterer::{RasterConfig, Rasterer};
use roadgraph::RoadGraph;
use tilebuild::{TileBuildConfig, TileBuilder};
use website::{AppState, RasterParams, RouteParams};

#[derive(Parser)]
#[command(author, version, about = "Map rastering, routing and location search over OpenStreetMap roads", long_about = None)]
struct Cli {
    /// Path to the input OSM PBF file
    #[arg(short, long, default_value = "berkeley.osm.pbf")]
    osm: PathBuf,

    /// Levels in the tile tree, root included
    #[arg(long, default_value_t = 8)]
    max_depth: usize,

    /// Tile size in pixels
    #[arg(long, default_value_t = 256)]
    tile_size: u32,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Address to listen on
        #[arg(short, long, default_value = "127.0.0.1:8080")]
        addr: String,

        /// Directory holding the tile images
        #[arg(short, long, default_value = "outputs/img")]
        tiles: PathBuf,
    },

    /// Print the shortest route between two points as JSON
    Route {
        #[arg(long, allow_hyphen_values = true)]
        start_lon: f64,
        #[arg(long, allow_hyphen_values = true)]
        start_lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        end_lon: f64,
        #[arg(long, allow_hyphen_values = true)]
        end_lat: f64,
    },

    /// Print the tile grid for a viewport as JSON
    Raster {
        #[arg(long, allow_hyphen_values = true)]
        ullon: f64,
        #[arg(long, allow_hyphen_values = true)]
        ullat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lrlon: f64,
        #[arg(long, allow_hyphen_values = true)]
        lrlat: f64,

        /// Viewport width in pixels
        #[arg(short, long, default_value_t = 1024.0)]
        width: f64,

        /// Viewport height in pixels
        #[arg(long, default_value_t = 768.0)]
        height: f64,
    },

    /// Look up locations by name
    Search {
        /// Name to look up
        term: String,

        /// List names starting with the term instead
        #[arg(short, long)]
        prefix: bool,
    },

    /// Render every tile image
    Tiles {
        /// Output directory
        #[arg(short, long, default_value = "outputs/img")]
        output_dir: PathBuf,
    },
}

fn load_graph(path: &Path) -> Result<RoadGraph> {
    let start = Instant::now();
    info!("Loading road graph from {}", path.display());
    let graph = roadgraph::load_osm_pbf(path)
        .with_context(|| format!("Failed to load road graph from {}", path.display()))?;
    info!(
        "Loaded {} vertices and {} edges in {:.2?}",
        graph.len(),
        graph.edge_count(),
        start.elapsed()
    );
    Ok(graph)
}

fn build_rasterer(cli: &Cli) -> Result<Rasterer> {
    let config = RasterConfig {
        max_depth: cli.max_depth,
        tile_size: cli.tile_size,
        ..RasterConfig::default()
    };
    Rasterer::new(config).context("Failed to build tile tree")
}

#[actix_web::main]
async fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Serve { addr, tiles } => {
            let graph = load_graph(&cli.osm)?;
            let rasterer = build_rasterer(&cli)?;
            website::serve(AppState { graph, rasterer }, addr, tiles.clone())
                .await
                .context("Server stopped with an error")?;
        }

        Commands::Route { start_lon, start_lat, end_lon, end_lat } => {
            let graph = load_graph(&cli.osm)?;
            let rasterer = build_rasterer(&cli)?;
            let state = AppState { graph, rasterer };
            let params = RouteParams {
                start_lon: *start_lon,
                start_lat: *start_lat,
                end_lon: *end_lon,
                end_lat: *end_lat,
            };
            let response = website::route_response(&state, &params);
            println!("{}", serde_json::to_string_pretty(&response)?);
        }

        Commands::Raster { ullon, ullat, lrlon, lrlat, width, height } => {
            let rasterer = build_rasterer(&cli)?;
            let state = AppState { graph: RoadGraph::new(), rasterer };
            let params = RasterParams {
                ullon: *ullon,
                ullat: *ullat,
                lrlon: *lrlon,
                lrlat: *lrlat,
                w: *width,
                h: *height,
            };
            let response = website::raster_response(&state, &params);
            println!("{}", serde_json::to_string_pretty(&response)?);
        }

        Commands::Search { term, prefix } => {
            let graph = load_graph(&cli.osm)?;
            let output = if *prefix {
                serde_json::to_string_pretty(&graph.keys_with_prefix(term))?
            } else {
                serde_json::to_string_pretty(&graph.locations_by_name(term))?
            };
            println!("{}", output);
        }

        Commands::Tiles { output_dir } => {
            let graph = load_graph(&cli.osm)?;
            let rasterer = build_rasterer(&cli)?;
            let builder = TileBuilder::new(TileBuildConfig {
                output_dir: output_dir.clone(),
                tile_size: cli.tile_size,
                ..TileBuildConfig::default()
            });
            let written = builder
                .build_all_tiles(&graph, rasterer.tree())
                .with_context(|| format!("Failed to build tiles in {}", output_dir.display()))?;
            info!("Done, {} tiles written", written);
        }
    }

    Ok(())
}
