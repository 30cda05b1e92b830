//! Raster source and sink implementations.

#[cfg(feature = "gdal")]
pub mod gdal_backend;
pub mod memory;
