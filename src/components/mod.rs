pub mod backends;
pub mod band;
pub mod bounds;
pub mod grid;
pub mod raster;
pub mod source;
pub mod transforms;
pub mod view;

pub use band::{BandInfo, DataType};
pub use bounds::{BoundingRegion, PixelWindow};
pub use grid::{TileDescriptor, TileGrid};
pub use raster::{RasterAccess, RasterMetadata};
pub use source::{RasterLayout, RasterSink, RasterSource};
pub use view::{PixelBuffer, TileIter, TileReader};
