use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialize error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("invalid plugin identifier '{0}': {1}")]
    InvalidPluginId(String, String),

    #[error("invalid version '{0}': {1}")]
    InvalidVersion(String, String),

    #[error("invalid constraint '{0}': {1}")]
    InvalidConstraint(String, String),

    #[error("no version of {plugin} satisfies {requirement}")]
    VersionNotFound { plugin: String, requirement: String },

    #[error("circular dependency detected involving {0}")]
    CircularDependency(String),

    #[error("{plugin}: signature metadata missing (shasumsUrl/shasumsSignatureUrl)")]
    SignatureMissing { plugin: String },

    #[error("{plugin}: no usable signing keys in package metadata")]
    SigningKeysMissing { plugin: String },

    #[error("{plugin}: signature verification failed: {reason}")]
    SignatureInvalid { plugin: String, reason: String },

    #[error("{plugin}: checksum mismatch (expected {expected}, got {actual})")]
    ChecksumMismatch {
        plugin: String,
        expected: String,
        actual: String,
    },

    #[error("{plugin}: extraction failed: {reason}")]
    ExtractionFailed { plugin: String, reason: String },

    #[error("registry unavailable: {0}")]
    RegistryUnavailable(String),

    #[error("manifest at {path} is corrupt: {reason}")]
    ManifestCorrupt { path: String, reason: String },

    #[error("operation cancelled")]
    Cancelled,

    #[error("{0}")]
    Other(String),
}
