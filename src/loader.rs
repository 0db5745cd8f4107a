use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use log::{debug, info};
use walkdir::WalkDir;

use crate::config::Config;

/// Errors raised while reading config fragments. Any of them is fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// A fragment could not be opened or read.
    #[error("read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A fragment is not a valid YAML config document.
    #[error("read yaml{}: {source}", display_path(.path))]
    Parse {
        path: Option<PathBuf>,
        #[source]
        source: serde_yaml::Error,
    },

    /// The config directory could not be traversed.
    #[error("walk config directory: {0}")]
    Walk(#[from] walkdir::Error),
}

pub type Result<T> = std::result::Result<T, LoadError>;

fn display_path(path: &Option<PathBuf>) -> String {
    match path {
        Some(path) => format!(" {}", path.display()),
        None => String::new(),
    }
}

/// Parses a single YAML fragment.
pub fn load_yaml<R: Read>(reader: R) -> Result<Config> {
    serde_yaml::from_reader(reader).map_err(|source| LoadError::Parse { path: None, source })
}

/// Parses a single YAML fragment held in memory.
pub fn load_yaml_str(yaml: &str) -> Result<Config> {
    serde_yaml::from_str(yaml).map_err(|source| LoadError::Parse { path: None, source })
}

/// Loads and merges every `.yaml`/`.yml` file below `dir`.
///
/// Files are visited recursively in file name order and folded with [Config::append], so rules
/// from earlier files are tested before rules from later ones. Other files are skipped. The first
/// file that fails to load aborts the whole load.
pub fn load_yaml_dir(dir: impl AsRef<Path>) -> Result<Config> {
    let mut config = Config::default();
    for entry in WalkDir::new(dir.as_ref()).sort_by_file_name() {
        let entry = entry?;
        if entry.file_type().is_dir() {
            continue;
        }

        let path = entry.path();
        if !is_yaml(path) {
            debug!("skipping non-yaml file {}", path.display());
            continue;
        }

        config.append(load_yaml_file(path)?);
    }

    info!(
        "loaded {} features from {}",
        config.features.len(),
        dir.as_ref().display()
    );
    Ok(config)
}

fn load_yaml_file(path: &Path) -> Result<Config> {
    debug!("loading {}", path.display());
    let file = File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    load_yaml(file).map_err(|e| match e {
        LoadError::Parse { source, .. } => LoadError::Parse {
            path: Some(path.to_path_buf()),
            source,
        },
        e => e,
    })
}

fn is_yaml(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"))
        .unwrap_or(false)
}
