//! Run configuration resolved from defaults and environment variables.

use crate::database::DatabaseSource;
use std::{
    env,
    path::{Path, PathBuf},
};

/// Environment variable holding the identifier of the compute device.
pub const DEVICE_ENV_VAR: &str = "MOLSPEC_DEVICE";
/// Environment variable holding the name of the line database.
pub const DATABASE_ENV_VAR: &str = "MOLSPEC_DATABASE";
/// Environment variable holding the directory of the persistent line cache.
pub const CACHE_DIR_ENV_VAR: &str = "MOLSPEC_CACHE_DIR";
/// Environment variable holding the root of a local HITRAN `.par` mirror.
pub const LINE_MIRROR_ENV_VAR: &str = "MOLSPEC_LINE_MIRROR";

const DEFAULT_CACHE_DIR_NAME: &str = "molspec-cache";
const DEFAULT_MIRROR_DIR_NAME: &str = "mirror";

/// Settings shared by every simulation of a run.
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    device: Option<String>,
    database_source: DatabaseSource,
    cache_dir: PathBuf,
    line_mirror: Option<PathBuf>,
}

impl Config {
    /// Reads the configuration from the process environment.
    ///
    /// Unset or empty variables leave the defaults in place. An unrecognized
    /// database name is reported as a warning and ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Reads the configuration through the given variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let mut config = Self::default();

        if let Some(device) = lookup(DEVICE_ENV_VAR) {
            config.device = Some(device);
        }
        if let Some(database) = lookup(DATABASE_ENV_VAR) {
            match database.parse() {
                Ok(source) => config.database_source = source,
                Err(err) => eprintln!("Warning: Ignoring {}: {}", DATABASE_ENV_VAR, err),
            }
        }
        if let Some(cache_dir) = lookup(CACHE_DIR_ENV_VAR) {
            config.cache_dir = PathBuf::from(cache_dir);
        }
        if let Some(line_mirror) = lookup(LINE_MIRROR_ENV_VAR) {
            config.line_mirror = Some(PathBuf::from(line_mirror));
        }
        config
    }

    pub fn with_device<S: Into<String>>(mut self, device: S) -> Self {
        self.device = Some(device.into());
        self
    }

    pub fn with_database_source(mut self, database_source: DatabaseSource) -> Self {
        self.database_source = database_source;
        self
    }

    pub fn with_cache_dir<P: Into<PathBuf>>(mut self, cache_dir: P) -> Self {
        self.cache_dir = cache_dir.into();
        self
    }

    pub fn with_line_mirror<P: Into<PathBuf>>(mut self, line_mirror: P) -> Self {
        self.line_mirror = Some(line_mirror.into());
        self
    }

    /// Identifier of the device to sum lines on, if any.
    pub fn device(&self) -> Option<&str> {
        self.device.as_deref()
    }

    pub fn database_source(&self) -> DatabaseSource {
        self.database_source
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Root of the `.par` mirror to fetch lines from. Defaults to a
    /// `mirror` directory inside the cache directory.
    pub fn line_mirror(&self) -> PathBuf {
        self.line_mirror
            .clone()
            .unwrap_or_else(|| self.cache_dir.join(DEFAULT_MIRROR_DIR_NAME))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device: None,
            database_source: DatabaseSource::default(),
            cache_dir: env::temp_dir().join(DEFAULT_CACHE_DIR_NAME),
            line_mirror: None,
        }
    }
}
