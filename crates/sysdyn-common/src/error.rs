use thiserror::Error;

#[derive(Debug, Error)]
pub enum SdError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("XML parse error: {0}")]
    Xml(String),

    #[error("Unsupported model format: {0}")]
    UnsupportedFormat(String),

    #[error("Model parse error: {0}")]
    Parse(String),

    #[error("Unknown variable `{referenced}` in equation of `{referrer}`")]
    UnknownVariable { referenced: String, referrer: String },

    #[error("Algebraic loop among variables: {0}")]
    AlgebraicLoop(String),

    #[error("Invalid simulation specs: {0}")]
    InvalidSpecs(String),

    #[error("Simulation error: {0}")]
    Simulation(String),

    #[error("Render error: {0}")]
    Render(String),

    #[error("Code generation error: {0}")]
    Codegen(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, SdError>;
