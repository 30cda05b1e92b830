pub type Result<T> = std::result::Result<T, RusterError>;

#[derive(thiserror::Error, Debug)]
pub enum RusterError {
    #[error("Region {0} has no extent after clamping to the raster")]
    InvalidRegion(String),
    #[error("Window {window} lies outside raster of {cols}x{rows} pixels")]
    OutOfBounds {
        window: String,
        cols: usize,
        rows: usize,
    },
    #[error("Band {0} can not be resolved")]
    UnknownBand(String),
    #[error("Reducer {0} is not supported")]
    UnsupportedReducer(String),
    #[error("Source {source_name} is unavailable: {reason}")]
    SourceUnavailable { source_name: String, reason: String },
    #[error("Tile size must be at least one pixel, got {0}x{1}")]
    InvalidTileSize(usize, usize),
    #[error("Raster {0} is already initialized, reset it first")]
    AlreadyInitialized(String),
    #[error("Raster {0} is not initialized")]
    NotInitialized(String),
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),
    #[error("Rasters are not co-registered: {0}")]
    NotCoregistered(String),
    #[error("There is no intersection between geometries")]
    NoIntersection,
    #[error(transparent)]
    NdarrayError(#[from] ndarray::ShapeError),
    #[cfg(feature = "gdal")]
    #[error(transparent)]
    GdalError(#[from] gdal::errors::GdalError),
}

impl RusterError {
    pub(crate) fn unavailable(source_name: impl Into<String>, reason: impl ToString) -> Self {
        RusterError::SourceUnavailable {
            source_name: source_name.into(),
            reason: reason.to_string(),
        }
    }
}
