//! System-wide constants for the TangleMatch engine.

/// Maximum node-acquisition attempts before giving up on a network.
pub const DEFAULT_NODE_ATTEMPTS: u32 = 5;

/// Lower bound of the randomized backoff between node attempts, milliseconds.
pub const NODE_BACKOFF_MIN_MS: u64 = 500;

/// Upper bound of the randomized backoff between node attempts, milliseconds.
pub const NODE_BACKOFF_MAX_MS: u64 = 1500;

/// Maximum node clients kept in a pool's URL-keyed cache.
pub const DEFAULT_CLIENT_CACHE_CAPACITY: usize = 32;

/// Per-request timeout against a node, milliseconds.
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 15_000;

/// Default base-unit cost per weighted byte of on-chain storage.
pub const DEFAULT_V_BYTE_COST: u64 = 100;

/// Weight of data bytes in the storage-deposit computation.
pub const V_BYTE_FACTOR_DATA: u64 = 1;

/// Weight of key (indexed) bytes in the storage-deposit computation.
pub const V_BYTE_FACTOR_KEY: u64 = 10;

/// Submission attempts per ledger entry before it is terminally failed.
pub const MAX_WALLET_RETRIES: u32 = 5;

/// Compare-and-swap retries for key-record reservation writes.
pub const KEY_RECORD_CAS_RETRIES: u32 = 8;

/// scrypt cost parameter (log2 N) for seed sealing.
pub const SCRYPT_LOG_N: u8 = 15;

/// scrypt block size for seed sealing.
pub const SCRYPT_R: u32 = 8;

/// scrypt parallelism for seed sealing.
pub const SCRYPT_P: u32 = 1;

/// Version tag written into sealed seed records.
pub const SEAL_VERSION: u8 = 1;

/// Minimum stake duration in weeks.
pub const MIN_STAKE_WEEKS: u32 = 1;

/// Maximum stake duration in weeks.
pub const MAX_STAKE_WEEKS: u32 = 52;

/// Seconds in one stake week.
pub const SECONDS_PER_WEEK: u32 = 604_800;

/// Version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Engine name.
pub const ENGINE_NAME: &str = "TangleMatch";
