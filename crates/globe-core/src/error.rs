use thiserror::Error;

/// Errors surfaced by the globe engine.
///
/// Construction-time problems (bad coordinates, bad options) are returned to
/// the caller. Per-frame problems are logged by the render loop and never stop
/// it.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GlobeError {
    #[error("invalid coordinates: lat={lat}, lon={lon}")]
    InvalidCoordinates { lat: f64, lon: f64 },

    #[error("invalid focus distance {0}: must be a positive finite number")]
    InvalidFocusDistance(f64),

    #[error("invalid option `{name}`: {reason}")]
    InvalidOption { name: &'static str, reason: String },

    #[error("failed to load asset {url}: {reason}")]
    AssetLoad { url: String, reason: String },

    #[error("render error: {0}")]
    Render(String),
}

impl GlobeError {
    pub fn option(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidOption {
            name,
            reason: reason.into(),
        }
    }
}
