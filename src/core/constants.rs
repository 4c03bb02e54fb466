//! Process-wide constants, grouped the way configuration knobs are grouped
//! in `core::config`.

// ============================================================================
// Application Identity
// ============================================================================

pub const APP_NAME: &str = "SpanCanon";
pub const CONFIG_FILE_NAME: &str = "spancanon.json";
pub const ENV_CONFIG: &str = "SPANCANON_CONFIG";

// ============================================================================
// Error Message Limits
// ============================================================================

pub const ERROR_MESSAGE_MAX_LEN: usize = 2048;
pub const ERROR_STACKTRACE_MAX_LEN: usize = 16_384;

// ============================================================================
// PII Redaction
// ============================================================================

pub const PII_REDACTION_MAX_ATTRIBUTE_LENGTH: usize = 250_000;

pub const DEFAULT_PII_BEARING_KEYS: &[&str] = &[
    "gen_ai.prompt",
    "gen_ai.completion",
    "gen_ai.input.messages",
    "gen_ai.output.messages",
    "gen_ai.request.input_messages",
    "gen_ai.response.output_messages",
    "langwatch.input",
    "langwatch.output",
    "input.value",
    "output.value",
];

pub const ENV_DISABLE_PII_REDACTION: &str = "DISABLE_PII_REDACTION";
pub const ENV_NODE_ENV: &str = "NODE_ENV";

// ============================================================================
// RAG content hashing
// ============================================================================

pub const RAG_CONTENT_HASH_ALGORITHM: &str = "md5";

// ============================================================================
// Debug / Logging
// ============================================================================

pub const ENV_DEBUG: &str = "SPANCANON_DEBUG";
pub const ENV_LOG_FORMAT: &str = "SPANCANON_LOG_FORMAT";
