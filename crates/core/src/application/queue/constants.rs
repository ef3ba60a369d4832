// Queue constants (no magic values)

/// Default retry budget for new operations
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default base delay between retries (1s)
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 1000;

/// Default cap on a single backoff delay (30s)
pub const DEFAULT_MAX_RETRY_DELAY_MS: u64 = 30_000;

/// Default per-operation timeout (30s)
pub const DEFAULT_OPERATION_TIMEOUT_MS: u64 = 30_000;

/// Budget for a credential refresh round trip (10s)
pub const CREDENTIAL_REFRESH_TIMEOUT_MS: u64 = 10_000;
