// =============================================================================
// Application Identity
// =============================================================================

/// Application name in lowercase (for paths and identifiers)
pub const APP_NAME_LOWER: &str = "datamap";

/// Unix-style dotfile folder name
pub const APP_DOT_FOLDER: &str = ".datamap";

// =============================================================================
// Configuration Files
// =============================================================================

/// Config file name
pub const CONFIG_FILE_NAME: &str = "datamap.json";

/// Environment variable for config file path
pub const ENV_CONFIG: &str = "DATAMAP_CONFIG";

// =============================================================================
// Environment Variables - Logging
// =============================================================================

/// Environment variable for debug mode
pub const ENV_DEBUG: &str = "DATAMAP_DEBUG";

/// Environment variable for log level/filter
pub const ENV_LOG: &str = "DATAMAP_LOG";

// =============================================================================
// Environment Variables - Mapping
// =============================================================================

/// Environment variable for the coercion policy (lenient or strict)
pub const ENV_COERCION: &str = "DATAMAP_COERCION";

/// Environment variable for top-level condition combination (merge or and)
pub const ENV_TOP_LEVEL: &str = "DATAMAP_TOP_LEVEL";

// =============================================================================
// Input Limits
// =============================================================================

/// Maximum size of a row document read by `datamap map` (16MB)
pub const MAX_ROWS_INPUT_SIZE: usize = 16 * 1024 * 1024;
