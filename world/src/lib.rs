#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative world state management for the isoworld spatial engine.

use std::time::Duration;

use isoworld_core::{
    CellCoord, Command, Event, Grid, GridBounds, MoveError, SimulationMode, Walkability,
};
use isoworld_system_movement::{ConfigError, MovementConfig, MovementController};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

const DEFAULT_GRID_WIDTH: u32 = 32;
const DEFAULT_GRID_HEIGHT: u32 = 32;

/// Startup parameters of a world.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Number of cell columns.
    pub width: u32,
    /// Number of cell rows.
    pub height: u32,
    /// Tunables handed to the movement controller.
    pub movement: MovementConfig,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            width: DEFAULT_GRID_WIDTH,
            height: DEFAULT_GRID_HEIGHT,
            movement: MovementConfig::default(),
        }
    }
}

impl WorldConfig {
    /// Checks that the configuration describes a usable world.
    pub fn validate(&self) -> Result<(), WorldConfigError> {
        if self.width == 0 || self.height == 0 {
            return Err(WorldConfigError::EmptyGrid {
                width: self.width,
                height: self.height,
            });
        }
        self.movement.validate()?;
        Ok(())
    }
}

/// Rejected world configuration.
#[derive(Clone, Copy, Debug, Error, PartialEq)]
pub enum WorldConfigError {
    /// The grid must contain at least one cell.
    #[error("grid of {width}x{height} cells contains no cells")]
    EmptyGrid {
        /// Rejected width.
        width: u32,
        /// Rejected height.
        height: u32,
    },
    /// The movement tunables were rejected.
    #[error("invalid movement configuration: {0}")]
    Movement(#[from] ConfigError),
}

/// Authoritative state: the walkable grid, every agent, and the simulation clock.
#[derive(Debug)]
pub struct World {
    grid: Grid,
    movement: MovementController,
    mode: SimulationMode,
    clock: Duration,
}

impl World {
    /// Creates a world with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::from_parts(WorldConfig::default())
    }

    /// Creates a world after validating the provided configuration.
    pub fn with_config(config: WorldConfig) -> Result<Self, WorldConfigError> {
        config.validate()?;
        Ok(Self::from_parts(config))
    }

    fn from_parts(config: WorldConfig) -> Self {
        Self {
            grid: Grid::new(GridBounds::new(config.width, config.height)),
            movement: MovementController::new(config.movement),
            mode: SimulationMode::default(),
            clock: Duration::ZERO,
        }
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

/// Applies the provided command to the world, mutating state deterministically.
pub fn apply(world: &mut World, command: Command, out_events: &mut Vec<Event>) {
    match command {
        Command::ConfigureGrid { width, height } => {
            let bounds = GridBounds::new(width, height);
            world.grid.resize(bounds);
            info!(width, height, "grid configured");
            out_events.push(Event::GridConfigured { bounds });
        }
        Command::BlockCell { cell } => {
            if world.grid.block(cell) {
                out_events.push(Event::CellBlocked { cell });
            }
        }
        Command::UnblockCell { cell } => {
            if world.grid.unblock(cell) {
                out_events.push(Event::CellUnblocked { cell });
            }
        }
        Command::SetTerrainHeight { cell, height } => {
            if world.grid.set_height(cell, height) {
                out_events.push(Event::TerrainHeightChanged { cell, height });
            } else {
                debug!(%cell, ?height, "terrain height unchanged");
            }
        }
        Command::SpawnAgent { cell } => {
            if world.grid.is_walkable(cell) {
                let agent = world.movement.spawn_agent(cell);
                out_events.push(Event::AgentSpawned { agent, cell });
            } else {
                debug!(%cell, "spawn rejected on unwalkable cell");
                out_events.push(Event::AgentSpawnRejected { cell });
            }
        }
        Command::MoveAgent { agent, target } => {
            if let Err(reason) =
                world
                    .movement
                    .command_move(&world.grid, agent, target, world.clock, out_events)
            {
                debug!(%agent, %target, %reason, "movement rejected");
                out_events.push(Event::MovementRejected {
                    agent,
                    target,
                    reason,
                });
            }
        }
        Command::CancelMovement { agent } => {
            if let Err(error) = world.movement.cancel(agent, out_events) {
                debug!(%agent, %error, "cancel ignored");
            }
        }
        Command::ReplanAgent { agent } => {
            match world.movement.replan(&world.grid, agent, out_events) {
                Ok(_) | Err(MoveError::Path(_)) => {}
                Err(error) => debug!(%agent, %error, "replan ignored"),
            }
        }
        Command::RepairAgents => {
            let repaired = world.movement.repair_all(out_events);
            if repaired > 0 {
                info!(repaired, "agents repaired");
            }
        }
        Command::Tick { dt } => {
            world.clock = world.clock.saturating_add(dt);
            out_events.push(Event::TimeAdvanced { dt });

            if world.mode == SimulationMode::Realtime {
                world.movement.step(dt, out_events);
            }
        }
        Command::CatchUp { agent, elapsed } => {
            match world.movement.catch_up(agent, elapsed, world.mode, out_events) {
                Ok(outcome) => out_events.push(Event::CatchUpApplied { agent, outcome }),
                Err(error) => debug!(%agent, %error, "catch-up ignored"),
            }
        }
        Command::SetSimulationMode { mode } => {
            if world.mode != mode {
                world.mode = mode;
                out_events.push(Event::SimulationModeChanged { mode });
            }
        }
    }
}

/// Query functions that provide read-only access to the world state.
pub mod query {
    use std::time::Duration;

    use isoworld_core::{
        AgentId, AgentMovementSnapshot, CellCoord, Grid, GridBounds, MovementDebugReport,
        SimulationMode, Walkability,
    };
    use isoworld_system_movement::MovementConfig;
    use isoworld_system_pathfinding::{nearest_walkable, DEFAULT_SEARCH_RADIUS};

    use super::World;

    /// Provides read-only access to the walkable grid.
    #[must_use]
    pub fn grid(world: &World) -> &Grid {
        &world.grid
    }

    /// Extent of the grid.
    #[must_use]
    pub fn bounds(world: &World) -> GridBounds {
        world.grid.bounds()
    }

    /// Reports whether an agent may stand on the cell.
    #[must_use]
    pub fn is_walkable(world: &World, cell: CellCoord) -> bool {
        world.grid.is_walkable(cell)
    }

    /// Terrain height of a cell, if one was set.
    #[must_use]
    pub fn terrain_height(world: &World, cell: CellCoord) -> Option<f32> {
        world.grid.height(cell)
    }

    /// Closest walkable cell within the default search radius.
    ///
    /// Offered to callers whose chosen target is blocked; never applied
    /// automatically.
    #[must_use]
    pub fn nearest_walkable_cell(world: &World, cell: CellCoord) -> Option<CellCoord> {
        nearest_walkable(&world.grid, cell, DEFAULT_SEARCH_RADIUS)
    }

    /// Currently active simulation mode.
    #[must_use]
    pub fn simulation_mode(world: &World) -> SimulationMode {
        world.mode
    }

    /// Total simulated time recorded by ticks.
    #[must_use]
    pub fn clock(world: &World) -> Duration {
        world.clock
    }

    /// Movement tunables in effect.
    #[must_use]
    pub fn movement_config(world: &World) -> &MovementConfig {
        world.movement.config()
    }

    /// Movement view of a single agent.
    #[must_use]
    pub fn agent(world: &World, agent: AgentId) -> Option<AgentMovementSnapshot> {
        world.movement.snapshot(agent)
    }

    /// Movement views of every agent, ordered by identifier.
    #[must_use]
    pub fn agents(world: &World) -> Vec<AgentMovementSnapshot> {
        world
            .movement
            .agents()
            .map(|record| record.snapshot())
            .collect()
    }

    /// Reports whether a blocked cell now lies across the agent's remaining route.
    ///
    /// Returns `None` for unknown or idle agents.
    #[must_use]
    pub fn route_obstructed(world: &World, agent: AgentId) -> Option<bool> {
        world.movement.is_route_obstructed(&world.grid, agent)
    }

    /// Diagnostic summary of all agents.
    #[must_use]
    pub fn debug_report(world: &World) -> MovementDebugReport {
        world.movement.debug_report()
    }
}
