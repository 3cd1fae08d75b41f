//! `.blueprint` assets: one generated class per file.

use blueprint_vm::{ClassError, GraphDefinition, World};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("cannot register `{class}`: {source}")]
    Register {
        class: String,
        #[source]
        source: ClassError,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlueprintAsset {
    /// Asset format version. Useful for future migrations.
    #[serde(default = "default_version")]
    pub version: u32,
    pub class: String,
    #[serde(default)]
    pub parent: Option<String>,
    pub graph: GraphDefinition,
}

fn default_version() -> u32 {
    BlueprintAsset::VERSION
}

impl BlueprintAsset {
    pub const EXT: &'static str = "blueprint";
    pub const VERSION: u32 = 1;

    pub fn from_file(path: &Path) -> Result<Self, AssetError> {
        let bytes = std::fs::read(path).map_err(|source| AssetError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_slice(&bytes).map_err(|source| AssetError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Loads every `.blueprint` file directly inside `dir`, sorted by file name.
pub fn load_dir(dir: &Path) -> Result<Vec<BlueprintAsset>, AssetError> {
    let read_err = |source| AssetError::Read {
        path: dir.to_path_buf(),
        source,
    };

    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(read_err)? {
        let path = entry.map_err(read_err)?.path();
        let is_blueprint = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case(BlueprintAsset::EXT));
        if is_blueprint {
            paths.push(path);
        }
    }
    paths.sort();

    paths.iter().map(|path| BlueprintAsset::from_file(path)).collect()
}

/// Registers `assets` as generated classes, parents before children regardless
/// of the order given. Returns how many build diagnostics were reported.
pub fn register_all(world: &mut World, assets: Vec<BlueprintAsset>) -> Result<usize, AssetError> {
    let mut pending = assets;
    let mut diagnostics = 0;

    while !pending.is_empty() {
        let (ready, waiting): (Vec<_>, Vec<_>) = pending.into_iter().partition(|asset| {
            asset
                .parent
                .as_deref()
                .map_or(true, |parent| world.classes().contains(parent))
        });

        // Nothing can make progress: report the first missing parent.
        if ready.is_empty() {
            let Some(asset) = waiting.into_iter().next() else {
                break;
            };
            return Err(AssetError::Register {
                source: ClassError::UnknownParent {
                    class: asset.class.clone(),
                    parent: asset.parent.unwrap_or_default(),
                },
                class: asset.class,
            });
        }

        for asset in ready {
            let reported = world
                .register_blueprint_class(&asset.class, asset.parent.as_deref(), &asset.graph)
                .map_err(|source| AssetError::Register {
                    class: asset.class.clone(),
                    source,
                })?;
            for diagnostic in reported.iter() {
                tracing::warn!("{}: {diagnostic}", asset.class);
            }
            diagnostics += reported.len();
        }

        pending = waiting;
    }

    Ok(diagnostics)
}
