use std::env;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result, anyhow, ensure};

pub const DEFAULT_DESTINATION: &str = "Ujjain";
pub const DEFAULT_POINT_COUNT: usize = 300;
pub const MAX_POINT_COUNT: usize = 5_000;

/// How a toggle flip reaches the rendering surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefreshPolicy {
    /// Every flip regenerates and reloads the whole document.
    #[default]
    Rebuild,
    /// Flips are posted to a ready runtime as layer-visibility messages.
    Incremental,
}

impl RefreshPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Rebuild => "rebuild",
            Self::Incremental => "incremental",
        }
    }
}

impl Display for RefreshPolicy {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RefreshPolicy {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "rebuild" => Ok(Self::Rebuild),
            "incremental" => Ok(Self::Incremental),
            other => Err(anyhow!(
                "invalid MAP_REFRESH_POLICY `{other}`; expected `rebuild` or `incremental`"
            )),
        }
    }
}

/// Whether in-document layer controls feed back into the host toggle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ControlSync {
    /// In-document controls only change what the runtime shows.
    #[default]
    Detached,
    /// Reports from in-document controls overwrite the host flags.
    Reconciled,
}

impl ControlSync {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Detached => "detached",
            Self::Reconciled => "reconciled",
        }
    }
}

impl Display for ControlSync {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ControlSync {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "detached" => Ok(Self::Detached),
            "reconciled" => Ok(Self::Reconciled),
            other => Err(anyhow!(
                "invalid MAP_CONTROL_SYNC `{other}`; expected `detached` or `reconciled`"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapSettings {
    pub api_key: Option<String>,
    pub default_destination: String,
    pub point_count: usize,
    pub point_seed: Option<u64>,
    pub refresh_policy: RefreshPolicy,
    pub control_sync: ControlSync,
    pub poi_file: Option<PathBuf>,
}

impl Default for MapSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            default_destination: DEFAULT_DESTINATION.to_owned(),
            point_count: DEFAULT_POINT_COUNT,
            point_seed: None,
            refresh_policy: RefreshPolicy::default(),
            control_sync: ControlSync::default(),
            poi_file: None,
        }
    }
}

impl MapSettings {
    pub fn from_env() -> Result<Self> {
        // Load .env if present, but do not fail if file does not exist.
        let _ = dotenvy::dotenv();

        let api_key = read_optional_env("MAPS_API_KEY");

        let default_destination = env::var("MAP_DEFAULT_DESTINATION")
            .unwrap_or_else(|_| DEFAULT_DESTINATION.to_owned());
        ensure!(
            !default_destination.trim().is_empty(),
            "MAP_DEFAULT_DESTINATION cannot be empty"
        );

        let point_count = parse_usize_env("MAP_POINT_COUNT", DEFAULT_POINT_COUNT)?;
        ensure!(
            (1..=MAX_POINT_COUNT).contains(&point_count),
            "MAP_POINT_COUNT must be between 1 and {MAX_POINT_COUNT}, got {point_count}"
        );

        let point_seed = match read_optional_env("MAP_POINT_SEED") {
            Some(raw) => Some(
                raw.parse::<u64>()
                    .context("failed to parse MAP_POINT_SEED as u64")?,
            ),
            None => None,
        };

        let refresh_policy = read_optional_env("MAP_REFRESH_POLICY")
            .map(|raw| raw.parse::<RefreshPolicy>())
            .transpose()
            .context("failed to parse MAP_REFRESH_POLICY")?
            .unwrap_or_default();

        let control_sync = read_optional_env("MAP_CONTROL_SYNC")
            .map(|raw| raw.parse::<ControlSync>())
            .transpose()
            .context("failed to parse MAP_CONTROL_SYNC")?
            .unwrap_or_default();

        let poi_file = read_optional_env("MAP_POI_FILE").map(PathBuf::from);

        Ok(Self {
            api_key,
            default_destination,
            point_count,
            point_seed,
            refresh_policy,
            control_sync,
            poi_file,
        })
    }
}

fn read_optional_env(name: &str) -> Option<String> {
    env::var(name).ok().and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_owned())
        }
    })
}

fn parse_usize_env(name: &str, default: usize) -> Result<usize> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<usize>()
            .with_context(|| format!("failed to parse {name} as usize")),
        Err(_) => Ok(default),
    }
}
