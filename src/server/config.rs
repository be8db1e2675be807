use super::RequestsLoggingLevel;

#[derive(Clone)]
pub struct ServerConfig {
    pub requests_logging_level: RequestsLoggingLevel,
    pub port: u16,
    pub frontend_dir_path: Option<String>,
    /// Largest accepted upload, in bytes.
    pub max_upload_size_bytes: u64,
    /// If false, `/v1/auth/register` answers 403.
    pub registration_enabled: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            requests_logging_level: RequestsLoggingLevel::Path,
            port: 3002,
            frontend_dir_path: None,
            max_upload_size_bytes: 50 * 1024 * 1024,
            registration_enabled: true,
        }
    }
}
