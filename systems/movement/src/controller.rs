//! Agent store and the movement state machine.

use std::{collections::BTreeMap, time::Duration};

use isoworld_core::{
    AgentId, AgentMovementSnapshot, CellCoord, Event, MoveError, MovementDebugReport,
    StateCorruption, Walkability,
};
use isoworld_system_pathfinding::{has_line_of_sight, has_line_of_sight_leaving, smooth, Pathfinder};
use tracing::{debug, warn};

use crate::{
    agent::{AgentMovement, Mission, MovementState},
    travel::travel,
    MovementConfig, MovementMode,
};

/// Result of an accepted movement order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MoveOutcome {
    /// The agent started walking along the provided number of waypoints.
    Started {
        /// Number of smoothed waypoints, including the departure cell unless it
        /// was blocked.
        waypoints: usize,
    },
    /// The agent already stood on the target; no journey was needed.
    AlreadyThere,
    /// The agent was placed on its target immediately.
    Teleported,
}

/// Owner of every agent's movement state.
#[derive(Debug, Default)]
pub struct MovementController {
    pub(crate) config: MovementConfig,
    pub(crate) agents: BTreeMap<AgentId, AgentMovement>,
    next_agent: u32,
    pathfinder: Pathfinder,
}

impl MovementController {
    /// Creates a controller without agents.
    #[must_use]
    pub fn new(config: MovementConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Tunables in effect.
    #[must_use]
    pub fn config(&self) -> &MovementConfig {
        &self.config
    }

    /// Creates an idle agent centred on `cell` and returns its identifier.
    pub fn spawn_agent(&mut self, cell: CellCoord) -> AgentId {
        let id = AgentId::new(self.next_agent);
        self.next_agent = self.next_agent.wrapping_add(1);
        let _ = self.agents.insert(id, AgentMovement::idle(id, cell));
        id
    }

    /// Inserts a previously persisted agent record, replacing any record with the same id.
    ///
    /// The record is not validated; inconsistent state is healed on the next
    /// [`MovementController::repair`] or [`MovementController::step`].
    pub fn restore_agent(&mut self, agent: AgentMovement) {
        self.next_agent = self.next_agent.max(agent.id.get().wrapping_add(1));
        let _ = self.agents.insert(agent.id, agent);
    }

    /// Movement record of a single agent.
    #[must_use]
    pub fn agent(&self, agent: AgentId) -> Option<&AgentMovement> {
        self.agents.get(&agent)
    }

    /// Movement records ordered by identifier.
    pub fn agents(&self) -> impl Iterator<Item = &AgentMovement> {
        self.agents.values()
    }

    /// Orders an agent to travel to `target`.
    ///
    /// The route is planned from the agent's current cell against the grid
    /// as it is now and replaces any previous mission. A planning failure
    /// leaves the agent's state untouched. `now` is recorded as the time of
    /// the command.
    pub fn command_move<W>(
        &mut self,
        grid: &W,
        agent: AgentId,
        target: CellCoord,
        now: Duration,
        out: &mut Vec<Event>,
    ) -> Result<MoveOutcome, MoveError>
    where
        W: Walkability + ?Sized,
    {
        let record = self
            .agents
            .get_mut(&agent)
            .ok_or(MoveError::UnknownAgent(agent))?;
        let route = self.pathfinder.find_path(grid, record.cell, target)?;
        record.last_command_at = Some(now);

        if self.config.mode == MovementMode::Teleport {
            record.position = target.center();
            record.cell = target;
            record.state = MovementState::Idle;
            out.push(Event::MovementStarted {
                agent,
                target,
                waypoints: vec![target],
            });
            out.push(Event::MissionCompleted {
                agent,
                cell: target,
            });
            return Ok(MoveOutcome::Teleported);
        }

        let waypoints = smooth(&route, grid).into_cells();
        let count = waypoints.len();
        debug!(%agent, %target, waypoints = count, "movement accepted");
        out.push(Event::MovementStarted {
            agent,
            target,
            waypoints: waypoints.clone(),
        });
        record.state = MovementState::Moving(Mission::departing(waypoints, target, record.cell));

        let settled = travel(record, 0.0, self.config.arrival_epsilon, out);
        if route.is_trivial() && settled.arrived {
            Ok(MoveOutcome::AlreadyThere)
        } else {
            Ok(MoveOutcome::Started { waypoints: count })
        }
    }

    /// Aborts the agent's mission where it stands.
    ///
    /// Returns `true` when a mission was cancelled.
    pub fn cancel(&mut self, agent: AgentId, out: &mut Vec<Event>) -> Result<bool, MoveError> {
        let record = self
            .agents
            .get_mut(&agent)
            .ok_or(MoveError::UnknownAgent(agent))?;
        if !record.is_moving() {
            return Ok(false);
        }

        record.stop();
        out.push(Event::MovementCancelled {
            agent,
            cell: record.cell,
        });
        Ok(true)
    }

    /// Detects and heals inconsistent movement state of one agent.
    ///
    /// Idempotent and infallible: unknown agents and consistent agents are
    /// left alone and yield `None`.
    pub fn repair(&mut self, agent: AgentId, out: &mut Vec<Event>) -> Option<StateCorruption> {
        let record = self.agents.get_mut(&agent)?;
        repair_record(record, out)
    }

    /// Heals every agent and returns how many needed it.
    pub fn repair_all(&mut self, out: &mut Vec<Event>) -> usize {
        self.agents
            .values_mut()
            .filter_map(|record| repair_record(record, out))
            .count()
    }

    /// Recomputes the remaining route of a moving agent against the current grid.
    ///
    /// On failure the agent stops where it stands, a
    /// [`Event::MovementCancelled`] is emitted, and the planning error is
    /// returned.
    pub fn replan<W>(
        &mut self,
        grid: &W,
        agent: AgentId,
        out: &mut Vec<Event>,
    ) -> Result<usize, MoveError>
    where
        W: Walkability + ?Sized,
    {
        let record = self
            .agents
            .get_mut(&agent)
            .ok_or(MoveError::UnknownAgent(agent))?;
        let _ = repair_record(record, out);
        let Some(target) = record.mission().map(Mission::target) else {
            return Err(MoveError::NotMoving(agent));
        };

        match self.pathfinder.find_path(grid, record.cell, target) {
            Ok(route) => {
                let waypoints = smooth(&route, grid).into_cells();
                let count = waypoints.len();
                debug!(%agent, %target, waypoints = count, "route replanned");
                out.push(Event::RouteReplanned {
                    agent,
                    waypoints: waypoints.clone(),
                });
                record.state =
                    MovementState::Moving(Mission::departing(waypoints, target, record.cell));
                Ok(count)
            }
            Err(error) => {
                warn!(%agent, %target, %error, "replanning failed, agent stopped");
                record.stop();
                out.push(Event::MovementCancelled {
                    agent,
                    cell: record.cell,
                });
                Err(error.into())
            }
        }
    }

    /// Reports whether any remaining leg of the agent's route is now obstructed.
    ///
    /// The agent's own cell is not required to be walkable, so an agent
    /// walking off a newly blocked cell is not reported as obstructed.
    ///
    /// Returns `None` for unknown or idle agents.
    #[must_use]
    pub fn is_route_obstructed<W>(&self, grid: &W, agent: AgentId) -> Option<bool>
    where
        W: Walkability + ?Sized,
    {
        let record = self.agents.get(&agent)?;
        let mission = record.mission()?;
        let remaining = mission.waypoints.get(mission.next_waypoint..)?;

        let mut from = record.cell;
        for (leg, &waypoint) in remaining.iter().enumerate() {
            let clear = if leg == 0 {
                has_line_of_sight_leaving(grid, from, waypoint)
            } else {
                has_line_of_sight(grid, from, waypoint)
            };
            if !clear {
                return Some(true);
            }
            from = waypoint;
        }
        Some(false)
    }

    /// Advances every moving agent by `dt` of simulated time.
    ///
    /// Inconsistent agents are healed before they move.
    pub fn step(&mut self, dt: Duration, out: &mut Vec<Event>) {
        let budget = self.config.speed * dt.as_secs_f32();
        let epsilon = self.config.arrival_epsilon;

        for record in self.agents.values_mut() {
            let _ = repair_record(record, out);
            if record.is_moving() {
                let _ = travel(record, budget, epsilon, out);
            }
        }
    }

    /// Read-only movement view of a single agent.
    #[must_use]
    pub fn snapshot(&self, agent: AgentId) -> Option<AgentMovementSnapshot> {
        self.agents.get(&agent).map(AgentMovement::snapshot)
    }

    /// Diagnostic summary of every agent.
    #[must_use]
    pub fn debug_report(&self) -> MovementDebugReport {
        let mut report = MovementDebugReport {
            total_agents: self.agents.len(),
            ..MovementDebugReport::default()
        };

        for record in self.agents.values() {
            let Some(mission) = record.mission() else {
                continue;
            };
            report.moving_agents += 1;
            if !mission.waypoints.is_empty() {
                report.agents_with_paths += 1;
            }
            report.moving.push(record.snapshot());
        }

        report
    }
}

pub(crate) fn repair_record(
    record: &mut AgentMovement,
    out: &mut Vec<Event>,
) -> Option<StateCorruption> {
    let corruption = record.corruption()?;
    warn!(agent = %record.id, %corruption, "repairing inconsistent movement state");
    record.heal();
    out.push(Event::AgentRepaired {
        agent: record.id,
        corruption,
    });
    Some(corruption)
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec2;
    use isoworld_core::{Grid, GridBounds, PathError, UnreachableReason};

    fn open_grid() -> Grid {
        Grid::new(GridBounds::new(8, 8))
    }

    #[test]
    fn identifiers_are_allocated_sequentially() {
        let mut controller = MovementController::default();
        assert_eq!(controller.spawn_agent(CellCoord::new(0, 0)), AgentId::new(0));
        assert_eq!(controller.spawn_agent(CellCoord::new(1, 0)), AgentId::new(1));
    }

    #[test]
    fn restored_agents_do_not_collide_with_new_ones() {
        let mut controller = MovementController::default();
        controller.restore_agent(AgentMovement::restore(
            AgentId::new(9),
            Vec2::ZERO,
            MovementState::Idle,
            None,
        ));
        assert_eq!(controller.spawn_agent(CellCoord::new(1, 1)), AgentId::new(10));
    }

    #[test]
    fn unknown_agents_are_rejected() {
        let mut controller = MovementController::default();
        let mut events = Vec::new();
        let missing = AgentId::new(3);
        assert_eq!(
            controller.command_move(
                &open_grid(),
                missing,
                CellCoord::new(1, 1),
                Duration::ZERO,
                &mut events
            ),
            Err(MoveError::UnknownAgent(missing))
        );
        assert_eq!(
            controller.cancel(missing, &mut events),
            Err(MoveError::UnknownAgent(missing))
        );
        assert_eq!(controller.repair(missing, &mut events), None);
        assert!(events.is_empty());
    }

    #[test]
    fn failed_planning_leaves_the_agent_untouched() {
        let goal = CellCoord::new(5, 5);
        let grid = Grid::with_blocked(GridBounds::new(8, 8), [goal]);
        let mut controller = MovementController::default();
        let agent = controller.spawn_agent(CellCoord::new(0, 0));
        let mut events = Vec::new();

        let result = controller.command_move(&grid, agent, goal, Duration::ZERO, &mut events);

        assert_eq!(
            result,
            Err(MoveError::Path(PathError::Unreachable {
                goal,
                reason: UnreachableReason::GoalBlocked
            }))
        );
        let record = controller.agent(agent).expect("agent exists");
        assert!(!record.is_moving());
        assert_eq!(record.last_command_at(), None);
        assert!(events.is_empty());
    }

    #[test]
    fn command_on_current_cell_is_already_there() {
        let mut controller = MovementController::default();
        let cell = CellCoord::new(2, 2);
        let agent = controller.spawn_agent(cell);
        let mut events = Vec::new();

        let outcome = controller
            .command_move(&open_grid(), agent, cell, Duration::from_secs(4), &mut events)
            .expect("trivial route");

        assert_eq!(outcome, MoveOutcome::AlreadyThere);
        let record = controller.agent(agent).expect("agent exists");
        assert!(!record.is_moving());
        assert_eq!(record.last_command_at(), Some(Duration::from_secs(4)));
        assert_eq!(
            events.last(),
            Some(&Event::MissionCompleted { agent, cell })
        );
    }

    #[test]
    fn teleport_mode_places_the_agent_on_its_target() {
        let mut controller = MovementController::new(MovementConfig {
            mode: MovementMode::Teleport,
            ..MovementConfig::default()
        });
        let agent = controller.spawn_agent(CellCoord::new(0, 0));
        let target = CellCoord::new(6, 3);
        let mut events = Vec::new();

        let outcome = controller
            .command_move(&open_grid(), agent, target, Duration::ZERO, &mut events)
            .expect("reachable target");

        assert_eq!(outcome, MoveOutcome::Teleported);
        let record = controller.agent(agent).expect("agent exists");
        assert_eq!(record.cell(), target);
        assert_eq!(record.position(), Vec2::new(6.0, 3.0));
        assert!(!record.is_moving());
    }

    #[test]
    fn cancel_stops_without_reaching_the_target() {
        let mut controller = MovementController::default();
        let agent = controller.spawn_agent(CellCoord::new(0, 0));
        let mut events = Vec::new();
        let _ = controller
            .command_move(
                &open_grid(),
                agent,
                CellCoord::new(7, 0),
                Duration::ZERO,
                &mut events,
            )
            .expect("reachable target");
        controller.step(Duration::from_secs(1), &mut events);
        events.clear();

        assert_eq!(controller.cancel(agent, &mut events), Ok(true));
        assert_eq!(controller.cancel(agent, &mut events), Ok(false));

        let record = controller.agent(agent).expect("agent exists");
        assert!(!record.is_moving());
        assert_eq!(record.position(), Vec2::new(2.5, 0.0));
        assert_eq!(
            events,
            vec![Event::MovementCancelled {
                agent,
                cell: CellCoord::new(3, 0)
            }]
        );
    }

    #[test]
    fn replan_requires_a_moving_agent() {
        let mut controller = MovementController::default();
        let agent = controller.spawn_agent(CellCoord::new(0, 0));
        let mut events = Vec::new();
        assert_eq!(
            controller.replan(&open_grid(), agent, &mut events),
            Err(MoveError::NotMoving(agent))
        );
    }

    #[test]
    fn replan_routes_around_new_obstacles() {
        let mut grid = open_grid();
        let mut controller = MovementController::default();
        let agent = controller.spawn_agent(CellCoord::new(0, 3));
        let mut events = Vec::new();
        let _ = controller
            .command_move(&grid, agent, CellCoord::new(7, 3), Duration::ZERO, &mut events)
            .expect("reachable target");
        assert_eq!(controller.is_route_obstructed(&grid, agent), Some(false));

        for row in 0..7 {
            let _ = grid.block(CellCoord::new(4, row));
        }
        assert_eq!(controller.is_route_obstructed(&grid, agent), Some(true));

        let waypoints = controller
            .replan(&grid, agent, &mut events)
            .expect("gap at the bottom");
        assert!(waypoints > 2);
        assert_eq!(controller.is_route_obstructed(&grid, agent), Some(false));
    }

    #[test]
    fn agents_walk_off_a_cell_blocked_underneath_them() {
        let mut grid = open_grid();
        let start = CellCoord::new(0, 0);
        let target = CellCoord::new(5, 2);
        let mut controller = MovementController::default();
        let agent = controller.spawn_agent(start);
        let _ = grid.block(start);
        let mut events = Vec::new();

        let outcome = controller
            .command_move(&grid, agent, target, Duration::ZERO, &mut events)
            .expect("route off the blocked cell");

        assert!(matches!(outcome, MoveOutcome::Started { .. }));
        let mission = controller
            .agent(agent)
            .and_then(AgentMovement::mission)
            .expect("agent is moving");
        assert_eq!(mission.next_waypoint(), 0);
        assert!(!mission.waypoints().contains(&start));
        assert!(mission.waypoints().iter().all(|cell| grid.is_walkable(*cell)));
        assert_eq!(controller.is_route_obstructed(&grid, agent), Some(false));

        for _ in 0..10 {
            controller.step(Duration::from_secs(1), &mut events);
        }

        let record = controller.agent(agent).expect("agent exists");
        assert!(!record.is_moving());
        assert_eq!(record.cell(), target);
    }

    #[test]
    fn single_step_off_a_blocked_cell_is_not_already_there() {
        let mut grid = open_grid();
        let start = CellCoord::new(3, 3);
        let mut controller = MovementController::default();
        let agent = controller.spawn_agent(start);
        let _ = grid.block(start);
        let mut events = Vec::new();

        let outcome = controller
            .command_move(&grid, agent, CellCoord::new(4, 3), Duration::ZERO, &mut events)
            .expect("neighbour is reachable");

        assert_eq!(outcome, MoveOutcome::Started { waypoints: 1 });
        assert!(controller.agent(agent).expect("agent exists").is_moving());
    }

    #[test]
    fn replan_failure_stops_the_agent() {
        let mut grid = open_grid();
        let target = CellCoord::new(7, 7);
        let mut controller = MovementController::default();
        let agent = controller.spawn_agent(CellCoord::new(0, 0));
        let mut events = Vec::new();
        let _ = controller
            .command_move(&grid, agent, target, Duration::ZERO, &mut events)
            .expect("reachable target");
        let _ = grid.block(target);
        events.clear();

        let result = controller.replan(&grid, agent, &mut events);

        assert!(matches!(result, Err(MoveError::Path(_))));
        assert!(!controller.agent(agent).expect("agent exists").is_moving());
        assert!(matches!(
            events.as_slice(),
            [Event::MovementCancelled { .. }]
        ));
    }

    #[test]
    fn debug_report_counts_moving_agents() {
        let mut controller = MovementController::default();
        let walker = controller.spawn_agent(CellCoord::new(0, 0));
        let _ = controller.spawn_agent(CellCoord::new(5, 5));
        let mut events = Vec::new();
        let _ = controller
            .command_move(
                &open_grid(),
                walker,
                CellCoord::new(3, 0),
                Duration::ZERO,
                &mut events,
            )
            .expect("reachable target");

        let report = controller.debug_report();

        assert_eq!(report.total_agents, 2);
        assert_eq!(report.moving_agents, 1);
        assert_eq!(report.agents_with_paths, 1);
        assert_eq!(report.moving.len(), 1);
        assert_eq!(report.moving[0].id, walker);
        assert_eq!(report.moving[0].target, Some(CellCoord::new(3, 0)));
    }
}
