#[derive(Debug, Clone)]
pub struct DotEnvyConfig {
    pub server: Server,
    pub database: Database,
}

#[derive(Debug, Clone)]
pub struct Server {
    pub port: u16,
    pub body_limit: u64,
    pub timeout: u64,
}

#[derive(Debug, Clone)]
pub struct Database {
    pub url: String,
    pub max_pool_size: u32,
    pub connect_attempts: u32,
    /// Seconds between connection attempts at startup.
    pub connect_backoff: u64,
    /// Seconds a single store call may take before it is cancelled.
    pub query_timeout: u64,
}
