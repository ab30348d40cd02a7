#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that exercises the isoworld spatial engine.

mod cell_arg;
mod commands;
mod config;

use std::{io, path::PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use glam::Vec2;
use isoworld_core::{CellCoord, GridBounds};
use tracing_subscriber::EnvFilter;

use crate::{
    cell_arg::parse_cell,
    commands::{PickRequest, RouteRequest, SimulateRequest},
    config::AppConfig,
};

/// Command-line arguments accepted by the isoworld binary.
#[derive(Debug, Parser)]
#[command(name = "isoworld", about = "Isometric grid pathfinding and movement toolkit")]
struct CliArgs {
    /// Optional TOML file providing world, movement and projection settings.
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log filter applied when `RUST_LOG` is not set.
    #[arg(long, global = true, default_value = "info", value_name = "FILTER")]
    log_level: String,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Debug, Subcommand)]
enum CliCommand {
    /// Plans a route on an ad-hoc grid and prints it with its smoothed waypoints.
    Route {
        /// Number of grid columns.
        #[arg(long, default_value_t = 16)]
        width: u32,
        /// Number of grid rows.
        #[arg(long, default_value_t = 16)]
        height: u32,
        /// Blocked cell as COLUMN,ROW; may be repeated.
        #[arg(long = "block", value_parser = parse_cell, value_name = "X,Y")]
        blocked: Vec<CellCoord>,
        /// Departure cell as COLUMN,ROW.
        #[arg(long, value_parser = parse_cell, value_name = "X,Y")]
        from: CellCoord,
        /// Destination cell as COLUMN,ROW.
        #[arg(long, value_parser = parse_cell, value_name = "X,Y")]
        to: CellCoord,
    },
    /// Spawns one agent, orders it to a target and steps the world.
    Simulate {
        /// Blocked cell as COLUMN,ROW; may be repeated.
        #[arg(long = "block", value_parser = parse_cell, value_name = "X,Y")]
        blocked: Vec<CellCoord>,
        /// Spawn cell as COLUMN,ROW.
        #[arg(long, value_parser = parse_cell, value_name = "X,Y")]
        from: CellCoord,
        /// Destination cell as COLUMN,ROW.
        #[arg(long, value_parser = parse_cell, value_name = "X,Y")]
        to: CellCoord,
        /// Simulated seconds to step through.
        #[arg(long, default_value_t = 5.0)]
        seconds: f32,
        /// Length of a single tick in seconds.
        #[arg(long, default_value_t = 0.1)]
        dt: f32,
        /// Seconds spent away after ticking, applied as a single catch-up.
        #[arg(long)]
        away: Option<f32>,
    },
    /// Converts a screen point into the grid cell beneath it.
    Pick {
        /// Screen x coordinate.
        #[arg(long, allow_negative_numbers = true)]
        x: f32,
        /// Screen y coordinate.
        #[arg(long, allow_negative_numbers = true)]
        y: f32,
        /// Camera offset along x.
        #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
        camera_x: f32,
        /// Camera offset along y.
        #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
        camera_y: f32,
        /// Camera zoom factor.
        #[arg(long, default_value_t = 1.0)]
        zoom: f32,
        /// Viewport width; together with the height, also counts visible cells.
        #[arg(long, requires = "viewport_height")]
        viewport_width: Option<f32>,
        /// Viewport height.
        #[arg(long, requires = "viewport_width")]
        viewport_height: Option<f32>,
    },
}

/// Entry point for the isoworld command-line interface.
fn main() -> Result<()> {
    let args = CliArgs::parse();
    init_tracing(&args.log_level)?;

    let config = AppConfig::load(args.config.as_deref())?;
    let stdout = io::stdout();
    let mut out = stdout.lock();

    match args.command {
        CliCommand::Route {
            width,
            height,
            blocked,
            from,
            to,
        } => commands::route(
            &RouteRequest {
                bounds: GridBounds::new(width, height),
                blocked,
                from,
                to,
            },
            &mut out,
        ),
        CliCommand::Simulate {
            blocked,
            from,
            to,
            seconds,
            dt,
            away,
        } => commands::simulate(
            &config,
            &SimulateRequest {
                blocked,
                from,
                to,
                seconds,
                dt,
                away,
            },
            &mut out,
        ),
        CliCommand::Pick {
            x,
            y,
            camera_x,
            camera_y,
            zoom,
            viewport_width,
            viewport_height,
        } => commands::pick(
            &config,
            &PickRequest {
                screen: Vec2::new(x, y),
                camera_offset: Vec2::new(camera_x, camera_y),
                zoom,
                viewport: viewport_width
                    .zip(viewport_height)
                    .map(|(width, height)| Vec2::new(width, height)),
            },
            &mut out,
        ),
    }
}

fn init_tracing(default_filter: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .with_context(|| format!("invalid log filter `{default_filter}`"))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
    Ok(())
}
