use std::time::Duration;

use glam::Vec2;
use isoworld_core::{
    AgentId, CatchUpOutcome, CatchUpSkip, CellCoord, Event, Grid, GridBounds, SimulationMode,
    StateCorruption, Walkability,
};
use isoworld_system_movement::{
    AgentMovement, Mission, MoveOutcome, MovementConfig, MovementController, MovementState,
};

fn controller_with_speed(speed: f32) -> MovementController {
    MovementController::new(MovementConfig {
        speed,
        ..MovementConfig::default()
    })
}

fn corridor() -> Grid {
    Grid::new(GridBounds::new(21, 3))
}

fn walled_grid() -> Grid {
    let bounds = GridBounds::new(12, 12);
    let wall = (0..10).map(|row| CellCoord::new(5, row));
    Grid::with_blocked(bounds, wall)
}

fn command(
    controller: &mut MovementController,
    grid: &Grid,
    agent: AgentId,
    target: CellCoord,
) -> Vec<Event> {
    let mut events = Vec::new();
    let _ = controller
        .command_move(grid, agent, target, Duration::ZERO, &mut events)
        .expect("target is reachable");
    events
}

#[test]
fn stepping_walks_the_agent_to_its_target() {
    let grid = walled_grid();
    let mut controller = MovementController::default();
    let agent = controller.spawn_agent(CellCoord::new(0, 0));
    let target = CellCoord::new(11, 0);
    let started = command(&mut controller, &grid, agent, target);
    assert!(matches!(
        started.first(),
        Some(Event::MovementStarted { target: t, .. }) if *t == target
    ));

    let mut events = Vec::new();
    for _ in 0..400 {
        controller.step(Duration::from_millis(50), &mut events);
        let record = controller.agent(agent).expect("agent exists");
        assert!(
            grid.bounds().contains(record.cell()),
            "agent left the grid at {}",
            record.cell()
        );
    }

    let record = controller.agent(agent).expect("agent exists");
    assert!(!record.is_moving());
    assert_eq!(record.cell(), target);
    assert_eq!(record.position(), target.center());
    assert_eq!(
        events
            .iter()
            .filter(|event| matches!(event, Event::MissionCompleted { .. }))
            .count(),
        1
    );
}

#[test]
fn catch_up_of_a_long_absence_arrives_exactly_on_the_final_waypoint() {
    let grid = corridor();
    let mut controller = controller_with_speed(5.0);
    let agent = controller.spawn_agent(CellCoord::new(0, 1));
    let target = CellCoord::new(20, 1);
    let _ = command(&mut controller, &grid, agent, target);
    let mut events = Vec::new();

    let outcome = controller
        .catch_up(
            agent,
            Duration::from_secs(100),
            SimulationMode::Realtime,
            &mut events,
        )
        .expect("agent exists");

    assert_eq!(
        outcome,
        CatchUpOutcome::Arrived {
            cell: target,
            distance: 20.0
        }
    );
    let record = controller.agent(agent).expect("agent exists");
    assert!(!record.is_moving());
    assert_eq!(record.position(), Vec2::new(20.0, 1.0));
    assert_eq!(
        events.last(),
        Some(&Event::MissionCompleted {
            agent,
            cell: target
        })
    );
}

#[test]
fn paused_catch_up_never_changes_the_agent() {
    let grid = corridor();
    let mut controller = controller_with_speed(5.0);
    let agent = controller.spawn_agent(CellCoord::new(0, 1));
    let _ = command(&mut controller, &grid, agent, CellCoord::new(20, 1));
    let before = controller.agent(agent).cloned();

    for seconds in [0, 1, 2, 100, 1_000_000] {
        let mut events = Vec::new();
        let outcome = controller
            .catch_up(
                agent,
                Duration::from_secs(seconds),
                SimulationMode::Paused,
                &mut events,
            )
            .expect("agent exists");

        assert_eq!(outcome, CatchUpOutcome::Unaffected(CatchUpSkip::Paused));
        assert!(events.is_empty());
        assert_eq!(controller.agent(agent).cloned(), before);
    }
}

#[test]
fn short_absences_are_left_to_regular_ticking() {
    let grid = corridor();
    let mut controller = MovementController::default();
    let agent = controller.spawn_agent(CellCoord::new(0, 1));
    let _ = command(&mut controller, &grid, agent, CellCoord::new(20, 1));
    let before = controller.agent(agent).cloned();
    let mut events = Vec::new();

    let outcome = controller
        .catch_up(
            agent,
            Duration::from_secs(1),
            SimulationMode::Realtime,
            &mut events,
        )
        .expect("agent exists");

    assert_eq!(
        outcome,
        CatchUpOutcome::Unaffected(CatchUpSkip::BelowThreshold)
    );
    assert_eq!(controller.agent(agent).cloned(), before);
}

#[test]
fn idle_agents_are_unaffected_by_catch_up() {
    let mut controller = MovementController::default();
    let agent = controller.spawn_agent(CellCoord::new(3, 1));
    let mut events = Vec::new();

    let outcome = controller
        .catch_up(
            agent,
            Duration::from_secs(60),
            SimulationMode::Realtime,
            &mut events,
        )
        .expect("agent exists");

    assert_eq!(outcome, CatchUpOutcome::Unaffected(CatchUpSkip::Idle));
}

#[test]
fn catch_up_is_clamped_to_the_configured_limit() {
    let grid = corridor();
    let mut controller = MovementController::new(MovementConfig {
        speed: 1.0,
        catch_up_limit_secs: 10.0,
        ..MovementConfig::default()
    });
    let agent = controller.spawn_agent(CellCoord::new(0, 1));
    let _ = command(&mut controller, &grid, agent, CellCoord::new(20, 1));
    let mut events = Vec::new();

    let outcome = controller
        .catch_up(
            agent,
            Duration::from_secs(100),
            SimulationMode::Realtime,
            &mut events,
        )
        .expect("agent exists");

    let CatchUpOutcome::EnRoute {
        position, distance, ..
    } = outcome
    else {
        panic!("expected the agent to still be en route, got {outcome:?}");
    };
    assert!((distance - 10.0).abs() < 1e-4);
    assert!((position - Vec2::new(10.0, 1.0)).length() < 1e-4);
}

#[test]
fn catch_up_matches_small_step_integration() {
    let grid = walled_grid();
    let start = CellCoord::new(0, 0);
    let target = CellCoord::new(11, 0);

    let mut stepped = MovementController::default();
    let stepped_agent = stepped.spawn_agent(start);
    let _ = command(&mut stepped, &grid, stepped_agent, target);

    let mut caught_up = MovementController::default();
    let caught_up_agent = caught_up.spawn_agent(start);
    let _ = command(&mut caught_up, &grid, caught_up_agent, target);

    let mut events = Vec::new();
    for _ in 0..60 {
        stepped.step(Duration::from_millis(50), &mut events);
    }
    let outcome = caught_up
        .catch_up(
            caught_up_agent,
            Duration::from_secs(3),
            SimulationMode::Realtime,
            &mut events,
        )
        .expect("agent exists");
    assert!(matches!(outcome, CatchUpOutcome::EnRoute { .. }));

    let stepped_record = stepped.agent(stepped_agent).expect("agent exists");
    let caught_up_record = caught_up.agent(caught_up_agent).expect("agent exists");
    let waypoints = stepped_record
        .mission()
        .map_or(0, |mission| mission.waypoints().len());
    let tolerance = stepped.config().arrival_epsilon * waypoints as f32 + 1e-3;
    let gap = (stepped_record.position() - caught_up_record.position()).length();

    assert!(
        gap <= tolerance,
        "positions diverged by {gap} (tolerance {tolerance})"
    );
}

#[test]
fn repair_returns_a_corrupted_agent_to_idle() {
    let mut controller = MovementController::default();
    let agent = AgentId::new(5);
    controller.restore_agent(AgentMovement::restore(
        agent,
        Vec2::new(2.0, 2.0),
        MovementState::Moving(Mission::restore(CellCoord::new(6, 6), Vec::new(), 0)),
        Some(Duration::from_secs(12)),
    ));
    let mut events = Vec::new();

    assert_eq!(
        controller.repair(agent, &mut events),
        Some(StateCorruption::MissingWaypoints)
    );
    assert_eq!(controller.repair(agent, &mut events), None);

    let record = controller.agent(agent).expect("agent exists");
    assert!(!record.is_moving());
    assert!(record.mission().is_none());
    assert_eq!(record.position(), Vec2::new(2.0, 2.0));
    assert_eq!(
        events,
        vec![Event::AgentRepaired {
            agent,
            corruption: StateCorruption::MissingWaypoints
        }]
    );
}

#[test]
fn stepping_heals_corruption_before_moving() {
    let mut controller = MovementController::default();
    let target = CellCoord::new(4, 0);
    controller.restore_agent(AgentMovement::restore(
        AgentId::new(0),
        Vec2::new(1.0, 0.0),
        MovementState::Moving(Mission::restore(target, vec![target], 3)),
        None,
    ));
    let healthy = controller.spawn_agent(CellCoord::new(0, 2));
    let grid = Grid::new(GridBounds::new(6, 6));
    let _ = command(&mut controller, &grid, healthy, CellCoord::new(5, 2));
    let mut events = Vec::new();

    controller.step(Duration::from_millis(100), &mut events);

    assert_eq!(controller.repair_all(&mut events), 0);
    assert!(events.contains(&Event::AgentRepaired {
        agent: AgentId::new(0),
        corruption: StateCorruption::WaypointIndexOutOfRange { index: 3, len: 1 }
    }));
    let corrupted = controller.agent(AgentId::new(0)).expect("agent exists");
    assert!(!corrupted.is_moving());
    assert_eq!(corrupted.position(), Vec2::new(1.0, 0.0));
    assert!(controller.agent(healthy).expect("agent exists").is_moving());
}

#[test]
fn new_command_replaces_the_previous_route() {
    let grid = corridor();
    let mut controller = MovementController::default();
    let agent = controller.spawn_agent(CellCoord::new(10, 1));
    let _ = command(&mut controller, &grid, agent, CellCoord::new(20, 1));
    let mut events = Vec::new();
    controller.step(Duration::from_secs(1), &mut events);

    let outcome = controller
        .command_move(
            &grid,
            agent,
            CellCoord::new(0, 1),
            Duration::from_secs(1),
            &mut events,
        )
        .expect("reachable target");

    assert!(matches!(outcome, MoveOutcome::Started { .. }));
    let record = controller.agent(agent).expect("agent exists");
    let mission = record.mission().expect("agent is moving");
    assert_eq!(mission.target(), CellCoord::new(0, 1));
    assert_eq!(mission.waypoints().last(), Some(&CellCoord::new(0, 1)));
    assert_eq!(record.last_command_at(), Some(Duration::from_secs(1)));
}
