#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Per-agent movement state machine and offline catch-up simulation.
//!
//! [`MovementController`] is the only owner of agent positions, targets and
//! waypoint sequences. Movement orders obtain a route from the pathfinder,
//! smooth it into waypoints and switch the agent to
//! [`MovementState::Moving`]. Regular simulation steps and offline catch-up
//! both advance agents through the same travel rule, so the two paths agree
//! up to the arrival epsilon per waypoint.

mod agent;
mod catch_up;
mod controller;
mod travel;

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use agent::{AgentMovement, Mission, MovementState};
pub use controller::{MoveOutcome, MovementController};

/// How accepted movement orders are executed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovementMode {
    /// Agents walk along their waypoints at the configured speed.
    #[default]
    Interpolated,
    /// Agents appear on their target as soon as a route is known to exist.
    Teleport,
}

/// Tunables of the movement controller, expressed in grid cells and seconds.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MovementConfig {
    /// Travel speed in grid cells per second.
    pub speed: f32,
    /// Distance below which an agent snaps onto its next waypoint.
    pub arrival_epsilon: f32,
    /// Execution mode of movement orders.
    pub mode: MovementMode,
    /// Intervals up to this many seconds are left to regular ticking.
    pub catch_up_threshold_secs: f32,
    /// Intervals longer than this many seconds are clamped before catching up.
    pub catch_up_limit_secs: f32,
}

impl Default for MovementConfig {
    fn default() -> Self {
        Self {
            speed: 2.5,
            arrival_epsilon: 0.05,
            mode: MovementMode::Interpolated,
            catch_up_threshold_secs: 1.0,
            catch_up_limit_secs: 3600.0,
        }
    }
}

impl MovementConfig {
    /// Checks that the tunables describe a usable controller.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.speed.is_finite() || self.speed <= 0.0 {
            return Err(ConfigError::Speed { speed: self.speed });
        }
        if !self.arrival_epsilon.is_finite() || self.arrival_epsilon < 0.0 {
            return Err(ConfigError::ArrivalEpsilon {
                epsilon: self.arrival_epsilon,
            });
        }
        if !self.catch_up_threshold_secs.is_finite()
            || !self.catch_up_limit_secs.is_finite()
            || self.catch_up_threshold_secs < 0.0
            || self.catch_up_limit_secs < self.catch_up_threshold_secs
        {
            return Err(ConfigError::CatchUpWindow {
                threshold: self.catch_up_threshold_secs,
                limit: self.catch_up_limit_secs,
            });
        }
        Ok(())
    }

    /// Minimum interval that qualifies for catch-up, exclusive.
    #[must_use]
    pub fn catch_up_threshold(&self) -> Duration {
        Duration::try_from_secs_f32(self.catch_up_threshold_secs.max(0.0))
            .unwrap_or(Duration::MAX)
    }

    /// Longest interval simulated by a single catch-up.
    #[must_use]
    pub fn catch_up_limit(&self) -> Duration {
        Duration::try_from_secs_f32(self.catch_up_limit_secs.max(0.0))
            .unwrap_or(Duration::MAX)
    }
}

/// Rejected movement tunables.
#[derive(Clone, Copy, Debug, Error, PartialEq)]
pub enum ConfigError {
    /// Speed must be finite and strictly positive.
    #[error("movement speed must be finite and positive (received {speed})")]
    Speed {
        /// Rejected speed.
        speed: f32,
    },
    /// Arrival epsilon must be finite and non-negative.
    #[error("arrival epsilon must be finite and non-negative (received {epsilon})")]
    ArrivalEpsilon {
        /// Rejected epsilon.
        epsilon: f32,
    },
    /// The catch-up threshold must be non-negative and not exceed the limit.
    #[error("catch-up window [{threshold}, {limit}] seconds is invalid")]
    CatchUpWindow {
        /// Rejected threshold.
        threshold: f32,
        /// Rejected limit.
        limit: f32,
    },
}
