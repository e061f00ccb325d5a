pub type LaminaResult<T> = Result<T, LaminaError>;

#[derive(thiserror::Error, Debug)]
pub enum LaminaError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("unknown plugin '{0}'")]
    UnknownPlugin(String),

    #[error("model error: {0}")]
    Model(String),

    #[error("inference error: {0}")]
    Inference(String),

    #[error("serialization error: {0}")]
    Serde(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl LaminaError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn unknown_plugin(id: impl Into<String>) -> Self {
        Self::UnknownPlugin(id.into())
    }

    pub fn model(msg: impl Into<String>) -> Self {
        Self::Model(msg.into())
    }

    pub fn inference(msg: impl Into<String>) -> Self {
        Self::Inference(msg.into())
    }

    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }
}
