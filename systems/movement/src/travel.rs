//! Travel rule shared by per-step advancement and offline catch-up.

use isoworld_core::{CellCoord, Event};
use tracing::info;

use crate::agent::{AgentMovement, MovementState};

/// Progress made by a single call to [`travel`].
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub(crate) struct Travel {
    /// Distance covered, in cells.
    pub(crate) distance: f32,
    /// Whether the mission completed.
    pub(crate) arrived: bool,
}

/// Moves an agent up to `budget` cells along its remaining waypoints.
///
/// A waypoint closer than `epsilon` is snapped onto without consuming budget.
/// Leftover budget carries over to the following waypoint. Exhausting the
/// waypoints snaps the agent onto its target, switches it to idle, and emits
/// [`Event::MissionCompleted`].
pub(crate) fn travel(
    agent: &mut AgentMovement,
    mut budget: f32,
    epsilon: f32,
    out: &mut Vec<Event>,
) -> Travel {
    let mut progress = Travel::default();

    loop {
        let MovementState::Moving(mission) = &mut agent.state else {
            break;
        };
        let Some(&waypoint) = mission.waypoints.get(mission.next_waypoint) else {
            break;
        };

        let offset = waypoint.center() - agent.position;
        let remaining = offset.length();

        if remaining > epsilon && budget < remaining {
            if budget > 0.0 {
                agent.position += offset / remaining * budget;
                progress.distance += budget;
            }
            break;
        }

        if remaining > epsilon {
            budget -= remaining;
        }
        progress.distance += remaining;
        agent.position = waypoint.center();

        let index = mission.next_waypoint;
        mission.next_waypoint += 1;
        if mission.next_waypoint < mission.waypoints.len() {
            out.push(Event::WaypointReached {
                agent: agent.id,
                cell: waypoint,
                index,
            });
            continue;
        }

        let target = mission.target;
        agent.position = target.center();
        agent.state = MovementState::Idle;
        progress.arrived = true;
        info!(agent = %agent.id, cell = %target, "mission completed");
        out.push(Event::MissionCompleted {
            agent: agent.id,
            cell: target,
        });
        break;
    }

    agent.cell = CellCoord::containing(agent.position);
    progress
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::Mission;
    use glam::Vec2;
    use isoworld_core::AgentId;

    fn agent_on(waypoints: &[(i32, i32)]) -> AgentMovement {
        let cells: Vec<_> = waypoints
            .iter()
            .map(|&(column, row)| CellCoord::new(column, row))
            .collect();
        let target = *cells.last().expect("at least one waypoint");
        AgentMovement::restore(
            AgentId::new(7),
            cells[0].center(),
            MovementState::Moving(Mission::departing(cells.clone(), target, cells[0])),
            None,
        )
    }

    #[test]
    fn partial_budget_moves_along_the_segment() {
        let mut agent = agent_on(&[(0, 0), (4, 0)]);
        let mut events = Vec::new();

        let progress = travel(&mut agent, 1.5, 0.05, &mut events);

        assert_eq!(agent.position(), Vec2::new(1.5, 0.0));
        assert_eq!(agent.cell(), CellCoord::new(2, 0));
        assert!(!progress.arrived);
        assert!((progress.distance - 1.5).abs() < 1e-6);
        assert!(events.is_empty());
    }

    #[test]
    fn leftover_budget_carries_across_waypoints() {
        let mut agent = agent_on(&[(0, 0), (2, 0), (2, 3)]);
        let mut events = Vec::new();

        let progress = travel(&mut agent, 3.0, 0.05, &mut events);

        assert_eq!(agent.position(), Vec2::new(2.0, 1.0));
        assert_eq!(agent.mission().map(Mission::next_waypoint), Some(2));
        assert_eq!(
            events,
            vec![Event::WaypointReached {
                agent: AgentId::new(7),
                cell: CellCoord::new(2, 0),
                index: 1
            }]
        );
        assert!((progress.distance - 3.0).abs() < 1e-6);
    }

    #[test]
    fn exhausting_waypoints_completes_the_mission() {
        let mut agent = agent_on(&[(0, 0), (3, 4)]);
        let mut events = Vec::new();

        let progress = travel(&mut agent, 100.0, 0.05, &mut events);

        assert!(progress.arrived);
        assert!((progress.distance - 5.0).abs() < 1e-6);
        assert_eq!(agent.position(), Vec2::new(3.0, 4.0));
        assert_eq!(agent.cell(), CellCoord::new(3, 4));
        assert!(!agent.is_moving());
        assert_eq!(
            events.last(),
            Some(&Event::MissionCompleted {
                agent: AgentId::new(7),
                cell: CellCoord::new(3, 4)
            })
        );
    }

    #[test]
    fn waypoint_within_epsilon_is_snapped_for_free() {
        let mut agent = agent_on(&[(0, 0), (5, 0)]);
        agent.position = Vec2::new(4.97, 0.0);
        if let MovementState::Moving(mission) = &mut agent.state {
            mission.next_waypoint = 1;
        }
        let mut events = Vec::new();

        let progress = travel(&mut agent, 0.0, 0.05, &mut events);

        assert!(progress.arrived);
        assert_eq!(agent.position(), Vec2::new(5.0, 0.0));
    }

    #[test]
    fn idle_agents_do_not_move() {
        let mut agent = AgentMovement::restore(
            AgentId::new(1),
            Vec2::new(2.0, 2.0),
            MovementState::Idle,
            None,
        );
        let mut events = Vec::new();

        let progress = travel(&mut agent, 10.0, 0.05, &mut events);

        assert_eq!(progress, Travel::default());
        assert_eq!(agent.position(), Vec2::new(2.0, 2.0));
        assert!(events.is_empty());
    }
}
