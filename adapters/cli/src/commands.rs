use std::{io::Write, time::Duration};

use anyhow::{bail, ensure, Context, Result};
use glam::Vec2;
use isoworld_core::{CellCoord, Command, Event, Grid, GridBounds};
use isoworld_projection::{
    grid_to_screen, screen_to_grid, screen_to_grid_clamped, visible_cells, CameraFrame, Viewport,
};
use isoworld_system_pathfinding::{nearest_walkable, smooth, Pathfinder, DEFAULT_SEARCH_RADIUS};
use isoworld_world::{self as world, query, World};
use tracing::info;

use crate::config::AppConfig;

/// Inputs of the `route` subcommand.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct RouteRequest {
    pub(crate) bounds: GridBounds,
    pub(crate) blocked: Vec<CellCoord>,
    pub(crate) from: CellCoord,
    pub(crate) to: CellCoord,
}

/// Inputs of the `simulate` subcommand.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct SimulateRequest {
    pub(crate) blocked: Vec<CellCoord>,
    pub(crate) from: CellCoord,
    pub(crate) to: CellCoord,
    pub(crate) seconds: f32,
    pub(crate) dt: f32,
    pub(crate) away: Option<f32>,
}

/// Inputs of the `pick` subcommand.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct PickRequest {
    pub(crate) screen: Vec2,
    pub(crate) camera_offset: Vec2,
    pub(crate) zoom: f32,
    pub(crate) viewport: Option<Vec2>,
}

/// Plans a route and prints the raw cells, their cost, and the smoothed waypoints.
pub(crate) fn route(request: &RouteRequest, out: &mut impl Write) -> Result<()> {
    let grid = Grid::with_blocked(request.bounds, request.blocked.iter().copied());
    let mut pathfinder = Pathfinder::new();

    let route = match pathfinder.find_path(&grid, request.from, request.to) {
        Ok(route) => route,
        Err(error) => {
            if let Some(fallback) = nearest_walkable(&grid, request.to, DEFAULT_SEARCH_RADIUS)
                .filter(|cell| *cell != request.to)
            {
                writeln!(out, "nearest walkable cell to {}: {fallback}", request.to)?;
            }
            return Err(error)
                .with_context(|| format!("no route from {} to {}", request.from, request.to));
        }
    };

    writeln!(out, "route: {}", format_cells(route.cells()))?;
    writeln!(out, "cost: {:.3}", route.length())?;
    writeln!(out, "expanded: {}", pathfinder.last_expanded())?;
    let waypoints = smooth(&route, &grid);
    writeln!(out, "waypoints: {}", format_cells(waypoints.cells()))?;
    Ok(())
}

/// Drives a single agent through the world and prints every emitted event.
pub(crate) fn simulate(
    config: &AppConfig,
    request: &SimulateRequest,
    out: &mut impl Write,
) -> Result<()> {
    let total = seconds(request.seconds, "simulated duration")?;
    let dt = seconds(request.dt, "tick length")?;
    ensure!(
        !dt.is_zero(),
        "tick length must be positive (received {})",
        request.dt
    );

    let mut world = World::with_config(config.world).context("invalid world configuration")?;
    let mut events = Vec::new();
    for &cell in &request.blocked {
        world::apply(&mut world, Command::BlockCell { cell }, &mut events);
    }
    world::apply(
        &mut world,
        Command::SpawnAgent { cell: request.from },
        &mut events,
    );
    let Some(agent) = events.iter().find_map(|event| match event {
        Event::AgentSpawned { agent, .. } => Some(*agent),
        _ => None,
    }) else {
        bail!("cannot spawn an agent on {}", request.from);
    };
    world::apply(
        &mut world,
        Command::MoveAgent {
            agent,
            target: request.to,
        },
        &mut events,
    );

    let mut elapsed = Duration::ZERO;
    while elapsed < total {
        let step = dt.min(total - elapsed);
        world::apply(&mut world, Command::Tick { dt: step }, &mut events);
        elapsed += step;
    }

    if let Some(away) = request.away {
        let away = seconds(away, "away interval")?;
        world::apply(
            &mut world,
            Command::CatchUp {
                agent,
                elapsed: away,
            },
            &mut events,
        );
    }

    info!(
        events = events.len(),
        simulated_secs = elapsed.as_secs_f64(),
        "simulation finished"
    );
    for event in events
        .iter()
        .filter(|event| !matches!(event, Event::TimeAdvanced { .. }))
    {
        writeln!(out, "{event:?}")?;
    }

    let report = query::debug_report(&world);
    writeln!(
        out,
        "agents: {} total, {} moving, {} with paths",
        report.total_agents, report.moving_agents, report.agents_with_paths
    )?;
    for snapshot in query::agents(&world) {
        writeln!(
            out,
            "{}: position ({:.2}, {:.2}) cell {} {:?}",
            snapshot.id,
            snapshot.position.x,
            snapshot.position.y,
            snapshot.cell,
            snapshot.phase
        )?;
    }
    Ok(())
}

/// Prints the cell under a screen point and the screen centre of that cell.
pub(crate) fn pick(config: &AppConfig, request: &PickRequest, out: &mut impl Write) -> Result<()> {
    let projection = config.projection;
    let camera =
        CameraFrame::new(request.camera_offset, request.zoom).context("invalid camera frame")?;
    let bounds = GridBounds::new(config.world.width, config.world.height);

    let cell = screen_to_grid(&projection, &camera, request.screen);
    writeln!(out, "cell: {cell}")?;
    if let Some(clamped) = screen_to_grid_clamped(&projection, &camera, bounds, request.screen) {
        if clamped != cell {
            writeln!(out, "clamped: {clamped}")?;
        }
        let centre = grid_to_screen(&projection, &camera, clamped, 0.0);
        writeln!(out, "centre: ({:.2}, {:.2})", centre.x, centre.y)?;
    }

    if let Some(size) = request.viewport {
        let viewport = Viewport::new(Vec2::ZERO, size);
        let cells = visible_cells(&projection, &camera, bounds, viewport);
        match (cells.first(), cells.last()) {
            (Some(first), Some(last)) => {
                writeln!(out, "visible: {} cells from {first} to {last}", cells.len())?;
            }
            _ => writeln!(out, "visible: none")?,
        }
    }
    Ok(())
}

fn seconds(value: f32, what: &str) -> Result<Duration> {
    Duration::try_from_secs_f32(value)
        .with_context(|| format!("{what} must be a non-negative number of seconds"))
}

fn format_cells(cells: &[CellCoord]) -> String {
    cells
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" -> ")
}
