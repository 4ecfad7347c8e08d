//! Global constants used throughout the boxcache codebase.
//!
//! File names, directory names and timeouts shared across modules.

use std::time::Duration;

/// Name of the project manifest file.
pub const MANIFEST_FILE_NAME: &str = "boxcache.toml";

/// Name of the global configuration file inside the boxcache home directory.
pub const GLOBAL_CONFIG_FILE_NAME: &str = "config.toml";

/// Directory under the user's home directory holding boxcache state.
pub const HOME_DIR_NAME: &str = ".boxcache";

/// Directory under the boxcache home holding the box catalog.
pub const BOXES_DIR_NAME: &str = "boxes";

/// File name of the box archive inside a catalog entry.
pub const BOX_ARCHIVE_FILE_NAME: &str = "box.box";

/// File name of the box metadata inside a catalog entry.
pub const BOX_METADATA_FILE_NAME: &str = "metadata.json";

/// Replacement for `/` in box names when mapped to a directory name.
pub const BOX_NAME_SLASH_ESCAPE: &str = "-SLASH-";

/// Prefix of staging directories created in the boxes directory during downloads.
pub const STAGING_DIR_PREFIX: &str = ".staging-";

/// Default timeout for a single box download (30 minutes).
///
/// Boxes are multi-gigabyte images, so this is deliberately generous.
pub const DEFAULT_DOWNLOAD_TIMEOUT_SECS: u64 = 1800;

/// Connect timeout for box downloads.
pub const DOWNLOAD_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Environment variable overriding the global config file path.
pub const ENV_CONFIG_PATH: &str = "BOXCACHE_CONFIG";

/// Environment variable overriding the boxes directory.
pub const ENV_BOXES_DIR: &str = "BOXCACHE_BOXES_DIR";

/// Environment variable disabling progress bars.
pub const ENV_NO_PROGRESS: &str = "BOXCACHE_NO_PROGRESS";
