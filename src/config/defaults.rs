//! Default configuration values

/// Manifest file name at the distribution root
pub const MANIFEST_FILE: &str = "packages.toml";

/// Install prefix, relative to the distribution root
pub const DEFAULT_PREFIX: &str = "local";

/// Directory holding upstream tarballs, relative to the distribution root
pub const DEFAULT_UPSTREAM_DIR: &str = "upstream";

/// Freshness marker directory, relative to the install prefix
pub const MARKERS_SUBDIR: &str = "var/lib/sage-build/installed";

/// Build log directory, relative to the install prefix
pub const LOGS_SUBDIR: &str = "var/log/sage-build";

/// Global config file name inside the config directory
pub const GLOBAL_CONFIG_FILE: &str = "config.toml";

/// Environment variable overriding the global config directory
pub const ENV_CONFIG_DIR: &str = "SAGE_BUILD_CONFIG_DIR";

/// Maximum number of download retry attempts
pub const MAX_DOWNLOAD_RETRIES: u32 = 3;

/// Base delay for download retry backoff, in milliseconds
pub const DOWNLOAD_RETRY_BASE_MS: u64 = 1000;

/// Shell used to run install scripts
pub const INSTALL_SHELL: &str = "bash";
