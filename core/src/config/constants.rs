/// Default bootstrap configuration root, used when neither `--conf` nor
/// `LYNX_CONFIG_PATH` is set.
pub const DEFAULT_CONFIG_PATH: &str = "./configs";

/// Environment variable carrying an override path for the bootstrap
/// configuration root.
pub const CONFIG_PATH_ENV_VAR: &str = "LYNX_CONFIG_PATH";

/// Escape hatch that disables CLI flag parsing in integration tests that
/// run the bootstrap as a library call rather than a real process.
pub const TEST_MODE_ENV_VAR: &str = "LYNX_TEST_MODE";

pub const KEY_APPLICATION_NAME: &str = "application.name";
pub const KEY_APPLICATION_VERSION: &str = "application.version";
pub const KEY_APPLICATION_HOST: &str = "application.host";

pub const DEFAULT_APPLICATION_NAME: &str = "lynx";
pub const DEFAULT_APPLICATION_HOST: &str = "localhost";
pub const DEFAULT_APPLICATION_VERSION: &str = "unknown";

pub const ERR_MISSING_NAME: &str = "application.name is required and must be a non-empty string";
pub const ERR_MISSING_VERSION: &str = "application.version is required and must be a non-empty string";
pub const ERR_EMPTY_PATH: &str = "bootstrap configuration path must not be empty";
