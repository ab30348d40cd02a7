use std::{fs, path::Path};

use anyhow::{Context, Result};
use isoworld_projection::IsoProjection;
use isoworld_world::WorldConfig;
use serde::Deserialize;

/// Settings read from the optional TOML configuration file.
#[derive(Clone, Copy, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub(crate) struct AppConfig {
    /// Grid extent and movement tunables.
    pub(crate) world: WorldConfig,
    /// Isometric projection constants used for picking.
    pub(crate) projection: IsoProjection,
}

impl AppConfig {
    /// Loads the configuration file, falling back to defaults when no path is given.
    pub(crate) fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read configuration at {}", path.display()))?;
        Self::parse(&contents)
            .with_context(|| format!("invalid configuration in {}", path.display()))
    }

    fn parse(contents: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(contents).context("failed to parse configuration toml contents")?;
        config.world.validate()?;
        config.projection.validate()?;
        Ok(config)
    }
}
