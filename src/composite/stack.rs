use geo::{Coord, Rect};
use log::{debug, info};
use ndarray::{Array3, Axis};

use crate::{
    components::{
        backends::memory::MemorySource,
        bounds::PixelWindow,
        raster::RasterAccess,
        transforms::{snap_to_pixel, GeoTransform},
        DataType,
    },
    composite::{CompositeRaster, CompositeReducer},
    config::{CompositeConfig, InitOptions, StackOptions},
    crs_geo::CrsGeometry,
    errors::{Result, RusterError},
    intersection::Intersection,
};

/// Builds one multi band raster out of several rasters, first band of
/// every input becoming one band of the output, in input order.
pub trait LayerStacker<T: DataType> {
    /// `bounds` is the world rectangle covered by the output.
    fn layerstack(
        &self,
        rasters: &[&RasterAccess<T>],
        bounds: Rect<f64>,
        options: &StackOptions,
    ) -> Result<RasterAccess<T>>;
}

/// No-data value of input `index`: its own entry, the single shared
/// entry, or the no-data value the raster declares.
fn source_nodata<T: DataType>(
    options: &StackOptions,
    index: usize,
    raster: &RasterAccess<T>,
) -> Result<Option<f64>> {
    Ok(match options.src_nodata.as_slice() {
        [] => raster.nodata()?,
        [shared] => Some(*shared),
        values => values.get(index).copied(),
    })
}

/// Rasters to stack or composite together.
#[derive(Debug)]
pub struct MultiRaster<T: DataType> {
    rasters: Vec<RasterAccess<T>>,
}

impl<T: DataType> MultiRaster<T> {
    /// Initializes (metadata only) every raster that is not initialized yet.
    pub fn new(rasters: Vec<RasterAccess<T>>) -> Result<Self> {
        let mut rasters = rasters;
        for raster in rasters.iter_mut().filter(|raster| !raster.is_initialized()) {
            raster.initialize(InitOptions::default())?;
        }
        Ok(Self { rasters })
    }

    pub fn len(&self) -> usize {
        self.rasters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rasters.is_empty()
    }

    pub fn rasters(&self) -> &[RasterAccess<T>] {
        &self.rasters
    }

    /// Declared no-data value of every raster.
    pub fn nodata(&self) -> Result<Vec<Option<f64>>> {
        self.rasters.iter().map(|raster| raster.nodata()).collect()
    }

    /// Pixel size of every raster.
    pub fn resolutions(&self) -> Result<Vec<Coord<f64>>> {
        self.rasters
            .iter()
            .map(|raster| Ok(raster.transform()?.pixel_size()))
            .collect()
    }

    /// Rasters picked by `order`, all of them if `None`.
    fn ordered(&self, order: Option<&[usize]>) -> Result<Vec<&RasterAccess<T>>> {
        let picked: Vec<&RasterAccess<T>> = match order {
            Some(order) => order
                .iter()
                .map(|index| {
                    self.rasters
                        .get(*index)
                        .ok_or_else(|| RusterError::UnknownBand(format!("raster {index}")))
                })
                .collect::<Result<_>>()?,
            None => self.rasters.iter().collect(),
        };
        if picked.is_empty() {
            return Err(RusterError::NoIntersection);
        }
        Ok(picked)
    }

    /// World rectangle shared by the footprints of the rasters picked by `order`.
    pub fn intersection(&self, order: Option<&[usize]>) -> Result<CrsGeometry<Rect<f64>>> {
        let mut bounds = self.ordered(order)?.into_iter().map(|raster| {
            raster
                .footprint()?
                .bounding_rect()
                .ok_or_else(|| RusterError::InvalidRegion(raster.name().to_string()))
        });
        let first = bounds.next().ok_or(RusterError::NoIntersection)??;
        let common = bounds.try_fold(first, |common, rect| common.try_intersection(&rect?))?;
        if common.geometry().width() <= 0. || common.geometry().height() <= 0. {
            return Err(RusterError::NoIntersection);
        }
        Ok(common)
    }

    /// Stacks the rasters picked by `order` over `options.bounds`, their
    /// common intersection if not set.
    pub fn layerstack(
        &self,
        stacker: &impl LayerStacker<T>,
        order: Option<&[usize]>,
        options: &StackOptions,
    ) -> Result<RasterAccess<T>> {
        let rasters = self.ordered(order)?;
        let bounds = match options.bounds {
            Some((xmin, ymin, xmax, ymax)) => {
                Rect::new(Coord { x: xmin, y: ymin }, Coord { x: xmax, y: ymax })
            }
            None => self.intersection(order)?.into_geometry(),
        };
        info!("stacking {} rasters over {bounds:?}", rasters.len());
        stacker.layerstack(&rasters, bounds, options)
    }

    /// Layer stack followed by a [CompositeReducer] pass.
    ///
    /// The reducer is checked before anything is stacked.
    pub fn composite(
        &self,
        stacker: &impl LayerStacker<T>,
        order: Option<&[usize]>,
        options: &StackOptions,
        config: &CompositeConfig,
    ) -> Result<CompositeRaster> {
        config.reducer.known()?;
        let stack = self.layerstack(stacker, order, options)?;
        CompositeReducer::reduce(&stack, config)
    }
}

/// Stacks rasters that already share a pixel grid and reference system,
/// at their native resolution.
#[derive(Clone, Copy, Debug, Default)]
pub struct MemoryLayerStacker;

impl MemoryLayerStacker {
    /// Pixel window of `raster` covering `bounds`.
    fn window<T: DataType>(raster: &RasterAccess<T>, bounds: &Rect<f64>) -> Result<PixelWindow> {
        let transform = raster.transform()?;
        let not_aligned = || {
            RusterError::NotCoregistered(format!(
                "{} is not aligned with {bounds:?}",
                raster.name()
            ))
        };
        let pixels = transform.coordinate_transform();
        let corners = [
            pixels.to_pixel_space(Coord {
                x: bounds.min().x,
                y: bounds.max().y,
            }),
            pixels.to_pixel_space(Coord {
                x: bounds.max().x,
                y: bounds.min().y,
            }),
        ];
        let mut snapped = Vec::with_capacity(4);
        for value in corners.iter().flat_map(|corner| [corner.x, corner.y]) {
            let value = snap_to_pixel(value);
            if value.fract() != 0. || value < 0. {
                return Err(not_aligned());
            }
            snapped.push(value as usize);
        }
        let (start, end) = (
            Coord { x: snapped[0], y: snapped[1] },
            Coord { x: snapped[2], y: snapped[3] },
        );
        if end.x <= start.x || end.y <= start.y {
            return Err(not_aligned());
        }
        let window = PixelWindow::new(start.x_y(), (end - start).x_y());
        let metadata = raster.metadata()?;
        if window.clip(metadata.extent()) != Some(window) {
            return Err(RusterError::NotCoregistered(format!(
                "{} does not cover {bounds:?}",
                raster.name()
            )));
        }
        Ok(window)
    }
}

impl<T: DataType> LayerStacker<T> for MemoryLayerStacker {
    fn layerstack(
        &self,
        rasters: &[&RasterAccess<T>],
        bounds: Rect<f64>,
        options: &StackOptions,
    ) -> Result<RasterAccess<T>> {
        let Some(reference) = rasters.first() else {
            return Err(RusterError::NoIntersection);
        };
        let reference_transform = reference.transform()?;
        let pixel_size = reference_transform.pixel_size();
        if options
            .resolution
            .is_some_and(|(x, y)| x != pixel_size.x.abs() || y != pixel_size.y.abs())
        {
            return Err(RusterError::NotCoregistered(
                "in memory stacks keep the native resolution".to_string(),
            ));
        }

        let mut windows = Vec::with_capacity(rasters.len());
        for raster in rasters {
            let transform = raster.transform()?;
            if transform.pixel_size() != pixel_size
                || transform.rotation() != reference_transform.rotation()
            {
                return Err(RusterError::NotCoregistered(format!(
                    "{} has pixel size {:?}, expected {pixel_size:?}",
                    raster.name(),
                    transform.pixel_size()
                )));
            }
            if raster.crs()? != reference.crs()? {
                return Err(RusterError::NotCoregistered(format!(
                    "{} is in {}, expected {}",
                    raster.name(),
                    raster.crs()?,
                    reference.crs()?
                )));
            }
            windows.push(Self::window(raster, &bounds)?);
        }

        let out_nodata = match options.out_nodata {
            Some(value) => Some(value),
            None => source_nodata(options, 0, reference)?,
        };
        let fill: Option<T> = out_nodata.and_then(num::cast);
        let shape = windows[0].shape();
        let mut data = Array3::zeros((rasters.len(), shape.y, shape.x));
        for (index, ((mut layer, raster), window)) in data
            .axis_iter_mut(Axis(0))
            .zip(rasters)
            .zip(&windows)
            .enumerate()
        {
            let mut read = raster.source().read_band(0, window)?;
            if let (Some(nodata), Some(fill)) = (source_nodata(options, index, raster)?, fill) {
                read.mapv_inplace(|value| {
                    let is_nodata = value.to_f64().is_some_and(|value| {
                        value == nodata || (value.is_nan() && nodata.is_nan())
                    });
                    if is_nodata {
                        fill
                    } else {
                        value
                    }
                });
            }
            layer.assign(&read);
            debug!("stacked {} over {window}", raster.name());
        }

        let tie_point = Coord {
            x: bounds.min().x,
            y: if pixel_size.y < 0. { bounds.max().y } else { bounds.min().y },
        };
        let transform: GeoTransform = reference_transform.with_tie_point(tie_point);
        let source = MemorySource::new("layerstack", data, transform, reference.crs()?)
            .with_nodata(out_nodata)
            .with_band_names(rasters.iter().map(|raster| raster.name().to_string()));
        RasterAccess::open("layerstack", source)
    }
}

#[cfg(feature = "gdal")]
pub use self::gdal_stacker::GdalLayerStacker;

#[cfg(feature = "gdal")]
mod gdal_stacker {
    use gdal::{
        programs::raster::{build_vrt, BuildVRTOptions},
        Dataset as GdalDataset,
    };
    use geo::Rect;
    use itertools::Itertools;
    use std::path::PathBuf;

    use super::{source_nodata, LayerStacker};
    use crate::{
        components::{
            backends::gdal_backend::{GdalDataType, GdalSource},
            raster::RasterAccess,
        },
        config::StackOptions,
        errors::{Result, RusterError},
    };

    /// Stacks file backed rasters into a GDAL virtual raster.
    #[derive(Clone, Debug, Default)]
    pub struct GdalLayerStacker {
        /// Where the VRT is written, kept in memory if `None`.
        pub vrt_path: Option<PathBuf>,
    }

    impl GdalLayerStacker {
        fn arguments<T: GdalDataType>(
            rasters: &[&RasterAccess<T>],
            bounds: Rect<f64>,
            options: &StackOptions,
        ) -> Result<Vec<String>> {
            let (xres, yres) = match options.resolution {
                Some(resolution) => resolution,
                None => {
                    let finest = rasters
                        .iter()
                        .map(|raster| Ok(raster.transform()?.pixel_size().x.abs()))
                        .collect::<Result<Vec<f64>>>()?
                        .into_iter()
                        .reduce(f64::min)
                        .ok_or(RusterError::NoIntersection)?;
                    (finest, finest)
                }
            };
            let mut arguments: Vec<String> = vec![
                "-separate".into(),
                "-te".into(),
                bounds.min().x.to_string(),
                bounds.min().y.to_string(),
                bounds.max().x.to_string(),
                bounds.max().y.to_string(),
                "-tr".into(),
                xres.to_string(),
                yres.to_string(),
                "-r".into(),
                options.resampling.gdal_name().into(),
            ];
            let src_nodata: Vec<Option<f64>> = rasters
                .iter()
                .enumerate()
                .map(|(index, raster)| source_nodata(options, index, raster))
                .collect::<Result<_>>()?;
            if src_nodata.iter().all(Option::is_some) {
                arguments.push("-srcnodata".into());
                arguments.push(src_nodata.iter().flatten().join(" "));
            }
            if let Some(nodata) = options
                .out_nodata
                .or_else(|| src_nodata.first().copied().flatten())
            {
                arguments.push("-vrtnodata".into());
                arguments.push(nodata.to_string());
            }
            Ok(arguments)
        }
    }

    impl<T: GdalDataType> LayerStacker<T> for GdalLayerStacker {
        fn layerstack(
            &self,
            rasters: &[&RasterAccess<T>],
            bounds: Rect<f64>,
            options: &StackOptions,
        ) -> Result<RasterAccess<T>> {
            let datasets = rasters
                .iter()
                .map(|raster| {
                    let path = raster.location().ok_or_else(|| {
                        RusterError::unavailable(
                            raster.name(),
                            "only file backed rasters can be stacked into a VRT",
                        )
                    })?;
                    GdalDataset::open(path)
                        .map_err(|error| RusterError::unavailable(raster.name(), error))
                })
                .collect::<Result<Vec<_>>>()?;
            let vrt_options = BuildVRTOptions::new(Self::arguments(rasters, bounds, options)?)?;
            let vrt = build_vrt(self.vrt_path.as_deref(), &datasets, Some(vrt_options))?;
            RasterAccess::open("layerstack", GdalSource::from_dataset(vrt))
        }
    }

}
