//! Agent movement records owned by the controller.

use std::time::Duration;

use glam::Vec2;
use isoworld_core::{AgentId, AgentMovementSnapshot, CellCoord, MovementPhase, StateCorruption};

/// Active journey of a moving agent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Mission {
    pub(crate) target: CellCoord,
    pub(crate) waypoints: Vec<CellCoord>,
    pub(crate) next_waypoint: usize,
}

impl Mission {
    /// Starts a mission for an agent standing in `from`.
    ///
    /// When the first waypoint is the departure cell the agent heads for the
    /// second waypoint directly. Routes leaving a blocked cell omit it, so the
    /// agent heads for their first waypoint instead. Single-waypoint missions
    /// settle onto their only cell.
    pub(crate) fn departing(waypoints: Vec<CellCoord>, target: CellCoord, from: CellCoord) -> Self {
        let next_waypoint = usize::from(waypoints.len() > 1 && waypoints.first() == Some(&from));
        Self {
            target,
            waypoints,
            next_waypoint,
        }
    }

    /// Rebuilds a mission from previously persisted fields.
    ///
    /// The fields are taken as-is; inconsistent combinations are healed by
    /// [`MovementController::repair`] or by the next step.
    ///
    /// [`MovementController::repair`]: crate::MovementController::repair
    #[must_use]
    pub fn restore(target: CellCoord, waypoints: Vec<CellCoord>, next_waypoint: usize) -> Self {
        Self {
            target,
            waypoints,
            next_waypoint,
        }
    }

    /// Destination cell.
    #[must_use]
    pub fn target(&self) -> CellCoord {
        self.target
    }

    /// Smoothed waypoint sequence, ending with the target.
    #[must_use]
    pub fn waypoints(&self) -> &[CellCoord] {
        &self.waypoints
    }

    /// Index of the next pending waypoint.
    #[must_use]
    pub fn next_waypoint(&self) -> usize {
        self.next_waypoint
    }

    fn corruption(&self) -> Option<StateCorruption> {
        let Some(&final_waypoint) = self.waypoints.last() else {
            return Some(StateCorruption::MissingWaypoints);
        };
        if self.next_waypoint >= self.waypoints.len() {
            return Some(StateCorruption::WaypointIndexOutOfRange {
                index: self.next_waypoint,
                len: self.waypoints.len(),
            });
        }
        if final_waypoint != self.target {
            return Some(StateCorruption::TargetMismatch {
                target: self.target,
                final_waypoint,
            });
        }
        None
    }
}

/// Movement state of a single agent.
///
/// Target and waypoints exist only while moving, so "moving without a
/// target" cannot be expressed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum MovementState {
    /// Standing still.
    #[default]
    Idle,
    /// Following a waypoint sequence.
    Moving(Mission),
}

/// Movement record of one agent.
#[derive(Clone, Debug, PartialEq)]
pub struct AgentMovement {
    pub(crate) id: AgentId,
    pub(crate) position: Vec2,
    pub(crate) cell: CellCoord,
    pub(crate) state: MovementState,
    pub(crate) last_command_at: Option<Duration>,
}

impl AgentMovement {
    pub(crate) fn idle(id: AgentId, cell: CellCoord) -> Self {
        Self {
            id,
            position: cell.center(),
            cell,
            state: MovementState::Idle,
            last_command_at: None,
        }
    }

    /// Rebuilds an agent record from previously persisted fields.
    ///
    /// The discrete cell is derived from the position whenever the position
    /// is finite. No other validation is performed.
    #[must_use]
    pub fn restore(
        id: AgentId,
        position: Vec2,
        state: MovementState,
        last_command_at: Option<Duration>,
    ) -> Self {
        let cell = if position.is_finite() {
            CellCoord::containing(position)
        } else {
            CellCoord::new(0, 0)
        };
        Self {
            id,
            position,
            cell,
            state,
            last_command_at,
        }
    }

    /// Identifier of the agent.
    #[must_use]
    pub fn id(&self) -> AgentId {
        self.id
    }

    /// Continuous grid-space position; cell `(c, r)` is centred on `(c, r)`.
    #[must_use]
    pub fn position(&self) -> Vec2 {
        self.position
    }

    /// Discrete cell currently occupied.
    #[must_use]
    pub fn cell(&self) -> CellCoord {
        self.cell
    }

    /// Current movement state.
    #[must_use]
    pub fn state(&self) -> &MovementState {
        &self.state
    }

    /// Active mission, if the agent is moving.
    #[must_use]
    pub fn mission(&self) -> Option<&Mission> {
        match &self.state {
            MovementState::Idle => None,
            MovementState::Moving(mission) => Some(mission),
        }
    }

    /// Reports whether the agent is moving.
    #[must_use]
    pub fn is_moving(&self) -> bool {
        matches!(self.state, MovementState::Moving(_))
    }

    /// Simulation time of the last accepted movement command.
    #[must_use]
    pub fn last_command_at(&self) -> Option<Duration> {
        self.last_command_at
    }

    /// Immutable view handed to read-only consumers.
    #[must_use]
    pub fn snapshot(&self) -> AgentMovementSnapshot {
        let mission = self.mission();
        AgentMovementSnapshot {
            id: self.id,
            position: self.position,
            cell: self.cell,
            phase: if mission.is_some() {
                MovementPhase::Moving
            } else {
                MovementPhase::Idle
            },
            target: mission.map(Mission::target),
            next_waypoint: mission.map(Mission::next_waypoint),
            waypoint_count: mission.map_or(0, |mission| mission.waypoints.len()),
            last_command_at: self.last_command_at,
        }
    }

    pub(crate) fn corruption(&self) -> Option<StateCorruption> {
        if !self.position.is_finite() {
            return Some(StateCorruption::NonFinitePosition);
        }
        self.mission().and_then(Mission::corruption)
    }

    /// Forces the agent back to a consistent idle state.
    pub(crate) fn heal(&mut self) {
        if !self.position.is_finite() {
            self.position = self.cell.center();
        }
        self.state = MovementState::Idle;
    }

    /// Stops the agent where it stands.
    pub(crate) fn stop(&mut self) {
        self.state = MovementState::Idle;
        self.cell = CellCoord::containing(self.position);
    }
}
