pub mod network {
    pub const TIMEOUT_OUTBOUND_MS: u64 = 30_000;
    pub const TIMEOUT_TOKEN_FETCH_MS: u64 = 30_000;
}

pub mod auth {
    /// Dynamic tokens are cached for a fixed window from fetch time,
    /// regardless of any TTL the remote endpoint claims.
    pub const TOKEN_TTL_SECS: u64 = 300;
    pub const DEFAULT_API_KEY_HEADER: &str = "X-API-Key";
    pub const DEFAULT_CREDENTIAL_PARAM: &str = "api_key";
}

pub mod audit {
    pub const QUEUE_CAPACITY: usize = 1_024;
    pub const FLUSH_INTERVAL_MS: u64 = 2_000;
    pub const MAX_PAYLOAD_CHARS: usize = 8_000;
}

pub mod crypto {
    pub const KEY_SIZE: usize = 32;
    pub const IV_SIZE: usize = 12;
    pub const TAG_SIZE: usize = 16;
}

pub mod egress {
    pub const BLOCKED_HOSTS: &[&str] = &["169.254.169.254", "metadata.google.internal"];
    pub const ALLOWED_SCHEMES: &[&str] = &["http", "https"];
}

pub mod native {
    /// Tool codes under this prefix are dispatched in-process and never
    /// reach the outbound HTTP pipeline.
    pub const NAMESPACE_PREFIX: &str = "memory_";
}

pub mod tool_types {
    pub const API: &str = "api_tool";
    pub const SYSTEM: &str = "system_tool";
}
