#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the isoworld spatial engine.
//!
//! This crate defines the message surface that connects adapters, the
//! authoritative world, and the pure spatial systems. Adapters submit
//! [`Command`] values describing desired mutations, the world executes those
//! commands via its `apply` entry point, and then broadcasts [`Event`] values
//! describing what changed. Systems never look up shared state implicitly:
//! the walkable grid is always handed to them through the [`Walkability`]
//! trait.

use std::{
    collections::{HashMap, HashSet},
    fmt,
    time::Duration,
};

use glam::Vec2;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Commands that express all permissible world mutations.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Replaces the grid bounds. Blocked cells outside the new bounds are dropped.
    ConfigureGrid {
        /// Number of cell columns.
        width: u32,
        /// Number of cell rows.
        height: u32,
    },
    /// Marks a single cell as blocked.
    BlockCell {
        /// Cell that becomes impassable.
        cell: CellCoord,
    },
    /// Clears the blocked flag of a single cell.
    UnblockCell {
        /// Cell that becomes passable again.
        cell: CellCoord,
    },
    /// Sets the terrain height of a single cell.
    SetTerrainHeight {
        /// Cell whose height changes.
        cell: CellCoord,
        /// Height in terrain units; `None` returns the cell to flat ground.
        height: Option<f32>,
    },
    /// Creates a new idle agent standing on the provided cell.
    SpawnAgent {
        /// Cell the agent occupies after spawning.
        cell: CellCoord,
    },
    /// Orders an agent to travel to the provided target cell.
    MoveAgent {
        /// Identifier of the agent receiving the order.
        agent: AgentId,
        /// Destination cell.
        target: CellCoord,
    },
    /// Aborts the active mission of an agent without reaching its target.
    CancelMovement {
        /// Identifier of the agent to stop.
        agent: AgentId,
    },
    /// Recomputes the route of a moving agent against the current blocked cells.
    ReplanAgent {
        /// Identifier of the agent whose route should be refreshed.
        agent: AgentId,
    },
    /// Scans every agent for inconsistent movement state and heals it.
    RepairAgents,
    /// Advances the simulation clock by the provided delta time.
    Tick {
        /// Duration of simulated time that elapsed since the previous tick.
        dt: Duration,
    },
    /// Applies movement progress for an interval during which no ticks ran.
    CatchUp {
        /// Identifier of the agent to advance.
        agent: AgentId,
        /// Real time that elapsed without simulation steps.
        elapsed: Duration,
    },
    /// Switches the simulation between paused and realtime progression.
    SetSimulationMode {
        /// Mode the world should activate.
        mode: SimulationMode,
    },
}

/// Events broadcast by the world after processing commands.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// Confirms that the grid bounds were replaced.
    GridConfigured {
        /// Bounds that are now in effect.
        bounds: GridBounds,
    },
    /// Confirms that a cell became blocked.
    CellBlocked {
        /// Cell that was blocked.
        cell: CellCoord,
    },
    /// Confirms that a cell became walkable again.
    CellUnblocked {
        /// Cell that was unblocked.
        cell: CellCoord,
    },
    /// Confirms that the terrain height of a cell changed.
    TerrainHeightChanged {
        /// Cell whose height changed.
        cell: CellCoord,
        /// Height now in effect, if any.
        height: Option<f32>,
    },
    /// Confirms that a new agent entered the world.
    AgentSpawned {
        /// Identifier allocated to the agent.
        agent: AgentId,
        /// Cell the agent occupies.
        cell: CellCoord,
    },
    /// Reports that an agent could not be spawned on the requested cell.
    AgentSpawnRejected {
        /// Cell that was requested.
        cell: CellCoord,
    },
    /// Announces that an agent accepted a movement order.
    MovementStarted {
        /// Identifier of the moving agent.
        agent: AgentId,
        /// Destination cell.
        target: CellCoord,
        /// Smoothed waypoint sequence the agent will follow.
        waypoints: Vec<CellCoord>,
    },
    /// Reports that a movement order could not be honoured.
    MovementRejected {
        /// Identifier of the agent that received the order.
        agent: AgentId,
        /// Destination that was requested.
        target: CellCoord,
        /// Specific reason the order failed.
        reason: MoveError,
    },
    /// Reports that an agent passed one of its intermediate waypoints.
    WaypointReached {
        /// Identifier of the moving agent.
        agent: AgentId,
        /// Cell of the waypoint that was reached.
        cell: CellCoord,
        /// Index of the waypoint within the active sequence.
        index: usize,
    },
    /// Mission-complete signal: the agent arrived at its target and is idle.
    MissionCompleted {
        /// Identifier of the agent that arrived.
        agent: AgentId,
        /// Target cell the agent now occupies.
        cell: CellCoord,
    },
    /// Confirms that an agent's mission was aborted.
    MovementCancelled {
        /// Identifier of the agent that stopped.
        agent: AgentId,
        /// Cell the agent occupies after stopping.
        cell: CellCoord,
    },
    /// Diagnostic emitted when inconsistent movement state was healed.
    AgentRepaired {
        /// Identifier of the repaired agent.
        agent: AgentId,
        /// Inconsistency that was detected.
        corruption: StateCorruption,
    },
    /// Confirms that a moving agent received a fresh route.
    RouteReplanned {
        /// Identifier of the agent.
        agent: AgentId,
        /// Replacement waypoint sequence.
        waypoints: Vec<CellCoord>,
    },
    /// Reports the result of an offline catch-up computation.
    CatchUpApplied {
        /// Identifier of the agent that was considered.
        agent: AgentId,
        /// Result of the computation.
        outcome: CatchUpOutcome,
    },
    /// Indicates that the simulation clock advanced.
    TimeAdvanced {
        /// Duration of simulated time that elapsed in the tick.
        dt: Duration,
    },
    /// Announces that the simulation entered a new mode.
    SimulationModeChanged {
        /// Mode that became active.
        mode: SimulationMode,
    },
}

/// Global progression mode of the simulation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimulationMode {
    /// Agents do not progress, regardless of elapsed time.
    Paused,
    /// Agents progress with real time, including time spent away.
    #[default]
    Realtime,
}

/// Unique identifier assigned to an agent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AgentId(u32);

impl AgentId {
    /// Creates a new agent identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "agent#{}", self.0)
    }
}

/// Location of a single grid cell expressed as column and row coordinates.
///
/// Coordinates are signed so that positions picked outside the grid (for
/// example by converting a screen point left of the map) remain representable
/// and can be rejected as out of bounds instead of wrapping.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellCoord {
    column: i32,
    row: i32,
}

impl CellCoord {
    /// Creates a new grid cell coordinate.
    #[must_use]
    pub const fn new(column: i32, row: i32) -> Self {
        Self { column, row }
    }

    /// Column index of the cell (grid x).
    #[must_use]
    pub const fn column(&self) -> i32 {
        self.column
    }

    /// Row index of the cell (grid y).
    #[must_use]
    pub const fn row(&self) -> i32 {
        self.row
    }

    /// Returns the neighbouring cell displaced by the provided deltas.
    ///
    /// Returns `None` when the displacement overflows the coordinate range.
    #[must_use]
    pub fn offset(self, columns: i32, rows: i32) -> Option<Self> {
        Some(Self::new(
            self.column.checked_add(columns)?,
            self.row.checked_add(rows)?,
        ))
    }

    /// Continuous grid-space position of the cell centre.
    #[must_use]
    pub fn center(self) -> Vec2 {
        Vec2::new(self.column as f32, self.row as f32)
    }

    /// Cell whose centre lies closest to the provided grid-space position.
    #[must_use]
    pub fn containing(position: Vec2) -> Self {
        Self::new(position.x.round() as i32, position.y.round() as i32)
    }

    /// Straight-line distance between the centres of two cells.
    #[must_use]
    pub fn euclidean_distance(self, other: CellCoord) -> f32 {
        let columns = f64::from(self.column) - f64::from(other.column);
        let rows = f64::from(self.row) - f64::from(other.row);
        columns.hypot(rows) as f32
    }

    /// Number of king moves separating two cells.
    #[must_use]
    pub fn chebyshev_distance(self, other: CellCoord) -> u32 {
        self.column
            .abs_diff(other.column)
            .max(self.row.abs_diff(other.row))
    }
}

impl fmt::Display for CellCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.column, self.row)
    }
}

/// Width × height extent of the walkable grid, anchored at cell `(0, 0)`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridBounds {
    width: u32,
    height: u32,
}

impl GridBounds {
    /// Creates a new bounds descriptor.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Number of columns.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Number of rows.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Total number of cells covered by the bounds.
    #[must_use]
    pub fn cell_count(&self) -> usize {
        let count = u64::from(self.width) * u64::from(self.height);
        usize::try_from(count).unwrap_or(usize::MAX)
    }

    /// Reports whether the cell lies inside the bounds.
    #[must_use]
    pub fn contains(&self, cell: CellCoord) -> bool {
        u32::try_from(cell.column()).is_ok_and(|column| column < self.width)
            && u32::try_from(cell.row()).is_ok_and(|row| row < self.height)
    }

    /// Dense row-major index of the cell, if it lies inside the bounds.
    #[must_use]
    pub fn index(&self, cell: CellCoord) -> Option<usize> {
        if !self.contains(cell) {
            return None;
        }

        let column = usize::try_from(cell.column()).ok()?;
        let row = usize::try_from(cell.row()).ok()?;
        let width = usize::try_from(self.width).ok()?;
        row.checked_mul(width)?.checked_add(column)
    }

    /// Cell addressed by a dense row-major index produced by [`GridBounds::index`].
    #[must_use]
    pub fn cell_at(&self, index: usize) -> Option<CellCoord> {
        if index >= self.cell_count() {
            return None;
        }

        let width = usize::try_from(self.width).ok()?;
        let column = i32::try_from(index % width).ok()?;
        let row = i32::try_from(index / width).ok()?;
        Some(CellCoord::new(column, row))
    }

    /// Clamps the cell onto the nearest cell inside the bounds.
    ///
    /// Returns `None` when the bounds cover no cells.
    #[must_use]
    pub fn clamp(&self, cell: CellCoord) -> Option<CellCoord> {
        if self.width == 0 || self.height == 0 {
            return None;
        }

        let max_column = i32::try_from(self.width - 1).unwrap_or(i32::MAX);
        let max_row = i32::try_from(self.height - 1).unwrap_or(i32::MAX);
        Some(CellCoord::new(
            cell.column().clamp(0, max_column),
            cell.row().clamp(0, max_row),
        ))
    }
}

/// Read access to the walkable/blocked state of a bounded grid.
///
/// A cell is walkable iff it lies within [`Walkability::bounds`] and is not
/// blocked. Implementations must not change while a single pathfinding or
/// smoothing call borrows them.
pub trait Walkability {
    /// Extent of the grid.
    fn bounds(&self) -> GridBounds;

    /// Reports whether the cell is occupied by terrain, a structure, or an entity.
    fn is_blocked(&self, cell: CellCoord) -> bool;

    /// Reports whether an agent may stand on the cell.
    fn is_walkable(&self, cell: CellCoord) -> bool {
        self.bounds().contains(cell) && !self.is_blocked(cell)
    }

    /// Terrain height of the cell, when the grid knows one.
    fn height(&self, _cell: CellCoord) -> Option<f32> {
        None
    }
}

impl<T: Walkability + ?Sized> Walkability for &T {
    fn bounds(&self) -> GridBounds {
        (**self).bounds()
    }

    fn is_blocked(&self, cell: CellCoord) -> bool {
        (**self).is_blocked(cell)
    }

    fn height(&self, cell: CellCoord) -> Option<f32> {
        (**self).height(cell)
    }
}

/// Bounded grid with an incrementally maintained set of blocked cells.
///
/// World and building collaborators keep the set current through
/// [`Grid::block`] and [`Grid::unblock`] instead of rescanning the map after
/// every structural change. Cells without an explicit terrain height report
/// none and sit at ground level.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Grid {
    bounds: GridBounds,
    blocked: HashSet<CellCoord>,
    heights: HashMap<CellCoord, f32>,
}

impl Grid {
    /// Creates a fully walkable grid.
    #[must_use]
    pub fn new(bounds: GridBounds) -> Self {
        Self {
            bounds,
            blocked: HashSet::new(),
            heights: HashMap::new(),
        }
    }

    /// Creates a grid with the provided cells pre-marked as blocked.
    ///
    /// Cells outside the bounds are ignored.
    #[must_use]
    pub fn with_blocked<I>(bounds: GridBounds, blocked: I) -> Self
    where
        I: IntoIterator<Item = CellCoord>,
    {
        let mut grid = Self::new(bounds);
        for cell in blocked {
            let _ = grid.block(cell);
        }
        grid
    }

    /// Marks the cell as blocked. Returns `true` when the set changed.
    pub fn block(&mut self, cell: CellCoord) -> bool {
        if !self.bounds.contains(cell) {
            return false;
        }
        self.blocked.insert(cell)
    }

    /// Clears the blocked flag of the cell. Returns `true` when the set changed.
    pub fn unblock(&mut self, cell: CellCoord) -> bool {
        self.blocked.remove(&cell)
    }

    /// Sets or clears the terrain height of a cell.
    ///
    /// Returns `true` when the stored height changed. Cells outside the
    /// bounds and non-finite heights are ignored.
    pub fn set_height(&mut self, cell: CellCoord, height: Option<f32>) -> bool {
        if !self.bounds.contains(cell) {
            return false;
        }
        match height {
            Some(height) if height.is_finite() => {
                self.heights.insert(cell, height) != Some(height)
            }
            Some(_) => false,
            None => self.heights.remove(&cell).is_some(),
        }
    }

    /// Replaces the bounds, discarding blocked cells and heights that fall outside them.
    pub fn resize(&mut self, bounds: GridBounds) {
        self.bounds = bounds;
        self.blocked.retain(|cell| bounds.contains(*cell));
        self.heights.retain(|cell, _| bounds.contains(*cell));
    }

    /// Number of blocked cells.
    #[must_use]
    pub fn blocked_count(&self) -> usize {
        self.blocked.len()
    }

    /// Blocked cells in deterministic (row-major) order.
    #[must_use]
    pub fn blocked_cells(&self) -> Vec<CellCoord> {
        let mut cells: Vec<CellCoord> = self.blocked.iter().copied().collect();
        cells.sort_by_key(|cell| (cell.row(), cell.column()));
        cells
    }
}

impl Walkability for Grid {
    fn bounds(&self) -> GridBounds {
        self.bounds
    }

    fn is_blocked(&self, cell: CellCoord) -> bool {
        self.blocked.contains(&cell)
    }

    fn height(&self, cell: CellCoord) -> Option<f32> {
        self.heights.get(&cell).copied()
    }
}

/// Identifies which end of a route request failed validation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RouteEndpoint {
    /// The cell the route departs from.
    Start,
    /// The cell the route should reach.
    Goal,
}

impl fmt::Display for RouteEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => write!(f, "start"),
            Self::Goal => write!(f, "goal"),
        }
    }
}

/// Reasons a goal cell cannot be reached.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnreachableReason {
    /// The goal cell itself is blocked; no search was performed.
    GoalBlocked,
    /// The search exhausted every reachable cell without finding the goal.
    Exhausted,
}

impl fmt::Display for UnreachableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GoalBlocked => write!(f, "goal cell is blocked"),
            Self::Exhausted => write!(f, "no walkable connection"),
        }
    }
}

/// Typed failures surfaced by the pathfinder.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PathError {
    /// The start or goal cell lies outside the grid bounds.
    #[error("{endpoint} cell {cell} lies outside the grid")]
    OutOfBounds {
        /// Which endpoint failed the bounds check.
        endpoint: RouteEndpoint,
        /// Offending cell.
        cell: CellCoord,
    },
    /// No route connects the start to the goal.
    #[error("goal cell {goal} is unreachable: {reason}")]
    Unreachable {
        /// Requested goal cell.
        goal: CellCoord,
        /// Why the goal could not be reached.
        reason: UnreachableReason,
    },
}

/// Failures surfaced when an agent receives a movement order.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq, Hash)]
pub enum MoveError {
    /// No agent with the provided identifier exists.
    #[error("{0} does not exist")]
    UnknownAgent(AgentId),
    /// The agent is not moving, so there is no route to refresh.
    #[error("{0} has no active mission")]
    NotMoving(AgentId),
    /// The pathfinder rejected the request.
    #[error(transparent)]
    Path(#[from] PathError),
}

/// Inconsistencies detected in an agent flagged as moving.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StateCorruption {
    /// The mission holds no waypoints to walk towards.
    MissingWaypoints,
    /// The next-waypoint index points past the end of the sequence.
    WaypointIndexOutOfRange {
        /// Stored next-waypoint index.
        index: usize,
        /// Number of stored waypoints.
        len: usize,
    },
    /// The final waypoint does not coincide with the mission target.
    TargetMismatch {
        /// Stored mission target.
        target: CellCoord,
        /// Last stored waypoint.
        final_waypoint: CellCoord,
    },
    /// The continuous position is NaN or infinite.
    NonFinitePosition,
}

impl fmt::Display for StateCorruption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingWaypoints => write!(f, "moving without waypoints"),
            Self::WaypointIndexOutOfRange { index, len } => {
                write!(f, "waypoint index {index} out of range for {len} waypoints")
            }
            Self::TargetMismatch {
                target,
                final_waypoint,
            } => write!(f, "final waypoint {final_waypoint} differs from target {target}"),
            Self::NonFinitePosition => write!(f, "position is not finite"),
        }
    }
}

/// Why a catch-up request left an agent untouched.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CatchUpSkip {
    /// The simulation is paused.
    Paused,
    /// The agent has no active mission.
    Idle,
    /// The interval is short enough to have been covered by regular ticks.
    BelowThreshold,
}

/// Result of simulating an interval of missed movement in one calculation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum CatchUpOutcome {
    /// Nothing changed.
    Unaffected(CatchUpSkip),
    /// The agent progressed but has not reached its target yet.
    EnRoute {
        /// Updated grid-space position.
        position: Vec2,
        /// Index of the waypoint the agent now heads towards.
        next_waypoint: usize,
        /// Distance travelled during the interval, in cells.
        distance: f32,
    },
    /// The agent reached its target and is idle.
    Arrived {
        /// Target cell the agent now occupies.
        cell: CellCoord,
        /// Distance travelled during the interval, in cells.
        distance: f32,
    },
}

/// Coarse movement state exposed to read-only consumers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MovementPhase {
    /// The agent stands still.
    Idle,
    /// The agent follows a waypoint sequence.
    Moving,
}

/// Immutable representation of a single agent's movement state.
#[derive(Clone, Debug, PartialEq)]
pub struct AgentMovementSnapshot {
    /// Identifier of the agent.
    pub id: AgentId,
    /// Continuous grid-space position.
    pub position: Vec2,
    /// Discrete cell currently occupied.
    pub cell: CellCoord,
    /// Idle or moving.
    pub phase: MovementPhase,
    /// Destination cell while moving.
    pub target: Option<CellCoord>,
    /// Index of the next pending waypoint while moving.
    pub next_waypoint: Option<usize>,
    /// Number of waypoints in the active sequence.
    pub waypoint_count: usize,
    /// Simulation time of the last accepted movement command.
    pub last_command_at: Option<Duration>,
}

/// Diagnostic summary of every agent's movement state.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MovementDebugReport {
    /// Number of known agents.
    pub total_agents: usize,
    /// Number of agents currently moving.
    pub moving_agents: usize,
    /// Number of agents holding a non-empty waypoint sequence.
    pub agents_with_paths: usize,
    /// Snapshots of the moving agents, ordered by identifier.
    pub moving: Vec<AgentMovementSnapshot>,
}
