pub type ComicResult<T> = Result<T, ComicError>;

#[derive(thiserror::Error, Debug)]
pub enum ComicError {
    #[error("panel not found: {id}")]
    PanelNotFound { id: String },

    #[error("generator returned no image: {reason}")]
    NoImageReturned { reason: String },

    #[error("image generation failed: {0:#}")]
    Generation(#[source] anyhow::Error),

    #[error("invalid character: {0}")]
    InvalidCharacter(String),

    #[error("invalid storyboard: {0}")]
    InvalidStoryboard(String),

    #[error("duplicate panel id: {0}")]
    DuplicatePanelId(String),

    #[error("a retry is already running for panel {0}")]
    RetryInFlight(String),

    #[error("export failed: {0:#}")]
    Export(#[source] anyhow::Error),
}

impl ComicError {
    pub fn no_image(reason: impl Into<String>) -> Self {
        Self::NoImageReturned {
            reason: reason.into(),
        }
    }

    pub fn not_found(id: impl Into<String>) -> Self {
        Self::PanelNotFound { id: id.into() }
    }
}

impl From<reqwest::Error> for ComicError {
    fn from(e: reqwest::Error) -> Self {
        Self::Generation(e.into())
    }
}
