use mpc_core::artifact::KeyLayout;

/// Which object-store implementation backs the artifact store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    S3,
    Memory,
}

/// Artifact store configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// Custom S3 endpoint (MinIO and similar). `None` uses the AWS default.
    pub endpoint: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub region: String,
    pub bucket: String,
    pub layout: KeyLayout,
}

impl StoreConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                 | Default        |
    /// |-------------------------|----------------|
    /// | `ARTIFACT_STORE`        | `s3`           |
    /// | `S3_ENDPOINT`           | (AWS default)  |
    /// | `S3_ACCESS_KEY`         | (credential chain) |
    /// | `S3_SECRET_KEY`         | (credential chain) |
    /// | `S3_REGION`             | `eu-central-1` |
    /// | `S3_BUCKET`             | `mpc-artifacts`|
    /// | `STORE_NAMESPACE`       | `mpc`          |
    /// | `STORE_ENTITIES_FOLDER` | `controllers`  |
    pub fn from_env() -> Self {
        let backend = match std::env::var("ARTIFACT_STORE")
            .unwrap_or_else(|_| "s3".into())
            .to_ascii_lowercase()
            .as_str()
        {
            "memory" => StoreBackend::Memory,
            "s3" => StoreBackend::S3,
            other => panic!("ARTIFACT_STORE must be `s3` or `memory`, got `{other}`"),
        };

        let defaults = KeyLayout::default();

        Self {
            backend,
            endpoint: std::env::var("S3_ENDPOINT").ok(),
            access_key: std::env::var("S3_ACCESS_KEY").ok(),
            secret_key: std::env::var("S3_SECRET_KEY").ok(),
            region: std::env::var("S3_REGION").unwrap_or_else(|_| "eu-central-1".into()),
            bucket: std::env::var("S3_BUCKET").unwrap_or_else(|_| "mpc-artifacts".into()),
            layout: KeyLayout {
                namespace: std::env::var("STORE_NAMESPACE").unwrap_or(defaults.namespace),
                entities_folder: std::env::var("STORE_ENTITIES_FOLDER")
                    .unwrap_or(defaults.entities_folder),
            },
        }
    }
}
