use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::connection::CompatibilityTable;

pub const DEFAULT_SNAP_RADIUS: f32 = 25.0;

/// Tunables the host supplies per workspace. The pairing table and the snap
/// radius come from block-type definitions and UI feel respectively; the
/// defaults here are the ones the stock block set ships with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    /// Maximum distance between two connections for a snap to be offered.
    pub snap_radius: f32,
    /// Spatial-index cell edge. Keep equal to `snap_radius` so a search
    /// touches at most a 3x3 cell neighborhood.
    pub grid_cell_size: f32,
    pub compatibility: CompatibilityTable,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            snap_radius: DEFAULT_SNAP_RADIUS,
            grid_cell_size: DEFAULT_SNAP_RADIUS,
            compatibility: CompatibilityTable::default(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    snap_radius: Option<f32>,
    grid_cell_size: Option<f32>,
    compatibility: Option<CompatibilityTable>,
}

/// Loads a workspace config from a JSON file, falling back to defaults for
/// anything the file leaves out. `None` yields the default config.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<WorkspaceConfig> {
    let mut config = WorkspaceConfig::default();
    let Some(path) = path else {
        return Ok(config);
    };

    let contents = std::fs::read_to_string(path)?;
    let parsed: ConfigFile = serde_json::from_str(&contents)?;

    if let Some(v) = parsed.snap_radius {
        config.snap_radius = v;
    }
    if let Some(v) = parsed.grid_cell_size {
        config.grid_cell_size = v;
    } else if parsed.snap_radius.is_some() {
        config.grid_cell_size = config.snap_radius;
    }
    if let Some(v) = parsed.compatibility {
        config.compatibility = v;
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::ConnectionKind;

    #[test]
    fn no_path_gives_defaults() {
        let config = load_config(None).unwrap();
        assert_eq!(config.snap_radius, DEFAULT_SNAP_RADIUS);
        assert_eq!(config.grid_cell_size, DEFAULT_SNAP_RADIUS);
        assert!(
            config
                .compatibility
                .compatible(ConnectionKind::Previous, ConnectionKind::Next)
        );
    }

    #[test]
    fn partial_file_overrides_only_named_fields() {
        let dir = std::env::temp_dir().join("blockgraph-config-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("snap_only.json");
        std::fs::write(&path, r#"{ "snapRadius": 40.0 }"#).unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.snap_radius, 40.0);
        // Cell size follows the radius unless pinned explicitly.
        assert_eq!(config.grid_cell_size, 40.0);
        assert!(
            config
                .compatibility
                .compatible(ConnectionKind::OutputValue, ConnectionKind::InputValue)
        );
    }

    #[test]
    fn config_round_trips_through_json() {
        let config = WorkspaceConfig::default();
        let text = serde_json::to_string(&config).unwrap();
        let back: WorkspaceConfig = serde_json::from_str(&text).unwrap();
        assert_eq!(back.snap_radius, config.snap_radius);
        assert_eq!(back.compatibility.pairs, config.compatibility.pairs);
    }
}
