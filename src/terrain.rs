//! DEM derivatives computed by a DEM processor.

use log::info;
use std::{fmt::Display, path::Path};

use crate::{
    components::{raster::RasterAccess, DataType},
    errors::{Result, RusterError},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerrainProduct {
    Slope,
    Aspect,
    Hillshade,
    /// Topographic position index
    Tpi,
    /// Terrain ruggedness index
    Tri,
    Roughness,
}

impl TerrainProduct {
    /// Name of the processing mode.
    pub fn mode(&self) -> &'static str {
        match self {
            Self::Slope => "slope",
            Self::Aspect => "aspect",
            Self::Hillshade => "hillshade",
            Self::Tpi => "TPI",
            Self::Tri => "TRI",
            Self::Roughness => "roughness",
        }
    }
}

impl Display for TerrainProduct {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.mode())
    }
}

/// Gradient estimate, 4 or 8 neighbours.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum SlopeAlgorithm {
    #[default]
    ZevenbergenThorne,
    Horn,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlopeFormat {
    #[default]
    Degree,
    Percent,
}

/// Hillshade variant, a single light source if not set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Shading {
    /// Slope combined with oblique shading.
    Combined,
    /// Light from several directions, the azimuth is ignored.
    Multidirectional,
    Igor,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct TerrainOptions {
    /// Zero based elevation band.
    pub band: usize,
    /// Ratio of vertical to horizontal units.
    pub scale: Option<f64>,
    pub algorithm: SlopeAlgorithm,
    pub compute_edges: bool,
    /// Output driver.
    pub format: String,
    pub creation_options: Vec<(String, String)>,
    pub slope_format: SlopeFormat,
    /// Aspect of flat areas is 0 instead of the no-data value.
    pub zero_for_flat: bool,
    /// Aspect as a trigonometric angle (0 east, 90 north) instead of an azimuth.
    pub trigonometric: bool,
    pub z_factor: f64,
    /// Light direction in degrees, 0 from the top of the raster.
    pub azimuth: f64,
    /// Light altitude in degrees, 90 from above.
    pub altitude: f64,
    pub shading: Option<Shading>,
}

impl Default for TerrainOptions {
    fn default() -> Self {
        Self {
            band: 0,
            scale: None,
            algorithm: SlopeAlgorithm::default(),
            compute_edges: true,
            format: "GTiff".to_string(),
            creation_options: vec![],
            slope_format: SlopeFormat::default(),
            zero_for_flat: true,
            trigonometric: false,
            z_factor: 1.,
            azimuth: 315.,
            altitude: 90.,
            shading: None,
        }
    }
}

/// Computes a terrain product of a DEM into `output`.
pub trait DemProcessor {
    fn process<T: DataType>(
        &self,
        dem: &RasterAccess<T>,
        product: TerrainProduct,
        options: &TerrainOptions,
        output: &Path,
    ) -> Result<()>;
}

#[cfg(feature = "gdal")]
pub use self::gdal_dem::GdalDemProcessor;

#[cfg(feature = "gdal")]
mod gdal_dem {
    use gdal::{
        cpl::CslStringList,
        raster::processing::dem::{
            self, AspectOptions, DemSlopeAlg, HillshadeOptions, RoughnessOptions, ShadingMode,
            SlopeOptions, TpiOptions, TriOptions,
        },
        Dataset as GdalDataset,
    };
    use geo::Coord;
    use log::debug;
    use std::{num::NonZeroUsize, path::Path};

    use super::{DemProcessor, Shading, SlopeAlgorithm, SlopeFormat, TerrainOptions, TerrainProduct};
    use crate::{
        components::{
            backends::gdal_backend::GdalSink,
            bounds::PixelWindow,
            raster::RasterAccess,
            source::{RasterLayout, RasterSink},
            DataType,
        },
        errors::{Result, RusterError},
    };

    /// Runs GDAL DEM processing in process.
    ///
    /// Rasters read through GDAL are processed from their dataset, any
    /// other source has its elevation band copied into a `MEM` dataset
    /// first.
    #[derive(Clone, Copy, Debug, Default)]
    pub struct GdalDemProcessor;

    macro_rules! common_options {
        ($options:expr, $band:expr, $settings:expr) => {{
            $options
                .with_input_band($band)
                .with_compute_edges($settings.compute_edges)
                .with_output_format(&$settings.format)
                .with_additional_options(creation_options($settings)?);
        }};
    }

    fn creation_options(settings: &TerrainOptions) -> Result<CslStringList> {
        let mut list = CslStringList::new();
        for (key, value) in &settings.creation_options {
            list.add_string("-co")?;
            list.add_string(&format!("{}={value}", key.to_uppercase()))?;
        }
        Ok(list)
    }

    fn algorithm(settings: &TerrainOptions) -> DemSlopeAlg {
        match settings.algorithm {
            SlopeAlgorithm::ZevenbergenThorne => DemSlopeAlg::ZevenbergenThorne,
            SlopeAlgorithm::Horn => DemSlopeAlg::Horn,
        }
    }

    /// Single band `MEM` copy of `band`.
    fn in_memory<T: DataType>(dem: &RasterAccess<T>, band: usize) -> Result<GdalDataset> {
        let metadata = dem.metadata()?;
        let info = metadata
            .bands
            .get(band)
            .ok_or_else(|| RusterError::UnknownBand(band.to_string()))?;
        let layout = RasterLayout {
            shape: (1, metadata.shape.1, metadata.shape.2),
            transform: metadata.transform,
            crs: metadata.crs.clone(),
            bands: vec![info.clone()],
        };
        let values = dem
            .source()
            .read_band(band, &PixelWindow::full(metadata.extent()))?
            .mapv(|value| value.to_f64().unwrap_or(f64::NAN));
        let mut sink = GdalSink::create::<f64, _>("", "MEM", &layout)?;
        sink.write_band(0, Coord::zero(), values.view())?;
        debug!("copied band {band} of {} into a MEM dataset", dem.name());
        Ok(sink.into_dataset())
    }

    impl DemProcessor for GdalDemProcessor {
        fn process<T: DataType>(
            &self,
            dem: &RasterAccess<T>,
            product: TerrainProduct,
            settings: &TerrainOptions,
            output: &Path,
        ) -> Result<()> {
            let copy;
            let (dataset, band) = match dem.gdal_dataset() {
                Some(dataset) => (dataset, settings.band),
                None => {
                    copy = in_memory(dem, settings.band)?;
                    (&copy, 0)
                }
            };
            let band = NonZeroUsize::MIN.saturating_add(band);

            match product {
                TerrainProduct::Slope => {
                    let mut options = SlopeOptions::new();
                    common_options!(options, band, settings);
                    options
                        .with_algorithm(algorithm(settings))
                        .with_percentage_results(settings.slope_format == SlopeFormat::Percent);
                    if let Some(scale) = settings.scale {
                        options.with_scale(scale);
                    }
                    dem::slope(dataset, output, &options)?;
                }
                TerrainProduct::Aspect => {
                    let mut options = AspectOptions::new();
                    common_options!(options, band, settings);
                    options
                        .with_algorithm(algorithm(settings))
                        .with_zero_for_flat(settings.zero_for_flat)
                        .with_trigonometric_angles(settings.trigonometric);
                    dem::aspect(dataset, output, &options)?;
                }
                TerrainProduct::Hillshade => {
                    let mut options = HillshadeOptions::new();
                    common_options!(options, band, settings);
                    options
                        .with_algorithm(algorithm(settings))
                        .with_z_factor(settings.z_factor)
                        .with_azimuth(settings.azimuth)
                        .with_altitude(settings.altitude);
                    if let Some(scale) = settings.scale {
                        options.with_scale(scale);
                    }
                    if let Some(shading) = settings.shading {
                        options.with_shading_mode(match shading {
                            Shading::Combined => ShadingMode::Combined,
                            Shading::Multidirectional => ShadingMode::Multidirectional,
                            Shading::Igor => ShadingMode::Igor,
                        });
                    }
                    dem::hillshade(dataset, output, &options)?;
                }
                TerrainProduct::Tpi => {
                    let mut options = TpiOptions::new();
                    common_options!(options, band, settings);
                    dem::topographic_position_index(dataset, output, &options)?;
                }
                TerrainProduct::Tri => {
                    let mut options = TriOptions::new();
                    common_options!(options, band, settings);
                    dem::terrain_ruggedness_index(dataset, output, &options)?;
                }
                TerrainProduct::Roughness => {
                    let mut options = RoughnessOptions::new();
                    common_options!(options, band, settings);
                    dem::roughness(dataset, output, &options)?;
                }
            }
            Ok(())
        }
    }
}

fn derive<T: DataType>(
    dem: &RasterAccess<T>,
    processor: &impl DemProcessor,
    product: TerrainProduct,
    output: &Path,
    options: &TerrainOptions,
) -> Result<()> {
    let (bands, _, _) = dem.shape()?;
    if options.band >= bands {
        return Err(RusterError::UnknownBand(options.band.to_string()));
    }
    processor.process(dem, product, options, output)?;
    info!("{product} of {} written to {}", dem.name(), output.display());
    Ok(())
}

pub fn slope<T: DataType>(
    dem: &RasterAccess<T>,
    processor: &impl DemProcessor,
    output: &Path,
    options: &TerrainOptions,
) -> Result<()> {
    derive(dem, processor, TerrainProduct::Slope, output, options)
}

pub fn aspect<T: DataType>(
    dem: &RasterAccess<T>,
    processor: &impl DemProcessor,
    output: &Path,
    options: &TerrainOptions,
) -> Result<()> {
    derive(dem, processor, TerrainProduct::Aspect, output, options)
}

pub fn hillshade<T: DataType>(
    dem: &RasterAccess<T>,
    processor: &impl DemProcessor,
    output: &Path,
    options: &TerrainOptions,
) -> Result<()> {
    derive(dem, processor, TerrainProduct::Hillshade, output, options)
}

pub fn tpi<T: DataType>(
    dem: &RasterAccess<T>,
    processor: &impl DemProcessor,
    output: &Path,
    options: &TerrainOptions,
) -> Result<()> {
    derive(dem, processor, TerrainProduct::Tpi, output, options)
}

pub fn tri<T: DataType>(
    dem: &RasterAccess<T>,
    processor: &impl DemProcessor,
    output: &Path,
    options: &TerrainOptions,
) -> Result<()> {
    derive(dem, processor, TerrainProduct::Tri, output, options)
}

pub fn roughness<T: DataType>(
    dem: &RasterAccess<T>,
    processor: &impl DemProcessor,
    output: &Path,
    options: &TerrainOptions,
) -> Result<()> {
    derive(dem, processor, TerrainProduct::Roughness, output, options)
}
