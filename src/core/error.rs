use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Unknown context: {0}. Run 'skiff help' to list available contexts")]
    UnknownContext(String),

    #[error("Unknown action: {0}")]
    UnknownAction(String),

    #[error("This command can only be run inside a skiff project")]
    NoProjectContext,

    #[error("An action is already registered under '{0}'")]
    DuplicateRegistration(String),

    #[error("Required plugin could not be resolved: {0}")]
    PluginResolution(String),

    #[error("Archive is {size} bytes, above the {limit} byte deployment limit")]
    ArtifactTooLarge { size: u64, limit: u64 },

    #[error("Provider request {service}.{operation} failed: {message}")]
    Provider {
        service: String,
        operation: String,
        message: String,
    },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Archive error: {0}")]
    Archive(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn code(&self) -> &'static str {
        match self {
            Error::UnknownContext(_) => "UNKNOWN_CONTEXT",
            Error::UnknownAction(_) => "UNKNOWN_ACTION",
            Error::NoProjectContext => "NO_PROJECT_CONTEXT",
            Error::DuplicateRegistration(_) => "DUPLICATE_REGISTRATION",
            Error::PluginResolution(_) => "PLUGIN_RESOLUTION",
            Error::ArtifactTooLarge { .. } => "ARTIFACT_TOO_LARGE",
            Error::Provider { .. } => "PROVIDER_REQUEST",
            Error::Validation(_) => "VALIDATION_ERROR",
            Error::Archive(_) => "ARCHIVE_ERROR",
            Error::Io(_) => "IO_ERROR",
            Error::Json(_) => "JSON_ERROR",
        }
    }
}
