//! Offline catch-up: progress for an interval during which no steps ran.

use std::time::Duration;

use isoworld_core::{AgentId, CatchUpOutcome, CatchUpSkip, Event, MoveError, SimulationMode};
use tracing::{info, warn};

use crate::{
    controller::{repair_record, MovementController},
    travel::travel,
};

impl MovementController {
    /// Advances an agent as if it had been stepped continuously for `elapsed`.
    ///
    /// Nothing changes while `mode` is [`SimulationMode::Paused`], when the
    /// agent is idle, or when `elapsed` does not exceed the configured
    /// threshold (such intervals are covered by regular ticking). Otherwise
    /// the distance `speed * elapsed` is applied in one calculation using the
    /// same travel rule as [`MovementController::step`], consuming waypoints
    /// and clamped to the remaining path. Intervals beyond the configured limit
    /// are clamped to it first.
    pub fn catch_up(
        &mut self,
        agent: AgentId,
        elapsed: Duration,
        mode: SimulationMode,
        out: &mut Vec<Event>,
    ) -> Result<CatchUpOutcome, MoveError> {
        let record = self
            .agents
            .get_mut(&agent)
            .ok_or(MoveError::UnknownAgent(agent))?;

        if mode == SimulationMode::Paused {
            return Ok(CatchUpOutcome::Unaffected(CatchUpSkip::Paused));
        }

        let _ = repair_record(record, out);
        if !record.is_moving() {
            return Ok(CatchUpOutcome::Unaffected(CatchUpSkip::Idle));
        }
        if elapsed <= self.config.catch_up_threshold() {
            return Ok(CatchUpOutcome::Unaffected(CatchUpSkip::BelowThreshold));
        }

        let limit = self.config.catch_up_limit();
        let simulated = if elapsed > limit {
            warn!(
                %agent,
                elapsed_secs = elapsed.as_secs_f64(),
                limit_secs = limit.as_secs_f64(),
                "catch-up interval clamped"
            );
            limit
        } else {
            elapsed
        };

        let budget = self.config.speed * simulated.as_secs_f32();
        let progress = travel(record, budget, self.config.arrival_epsilon, out);
        info!(
            %agent,
            simulated_secs = simulated.as_secs_f64(),
            distance = progress.distance,
            arrived = progress.arrived,
            "catch-up applied"
        );

        if progress.arrived {
            return Ok(CatchUpOutcome::Arrived {
                cell: record.cell,
                distance: progress.distance,
            });
        }

        Ok(CatchUpOutcome::EnRoute {
            position: record.position,
            next_waypoint: record
                .mission()
                .map_or(0, |mission| mission.next_waypoint()),
            distance: progress.distance,
        })
    }
}
