use geo::Geometry;
use geo_traits::{to_geo::ToGeoGeometry, GeometryTrait};
use std::collections::HashSet;

use crate::errors::{Result, RusterError};

/// Geometry type, extraction rasterizes one kind at a time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum GeometryKind {
    Point,
    MultiPoint,
    Line,
    LineString,
    MultiLineString,
    Polygon,
    MultiPolygon,
    Rect,
    Triangle,
    GeometryCollection,
}

impl From<&Geometry<f64>> for GeometryKind {
    fn from(geometry: &Geometry<f64>) -> Self {
        match geometry {
            Geometry::Point(_) => Self::Point,
            Geometry::MultiPoint(_) => Self::MultiPoint,
            Geometry::Line(_) => Self::Line,
            Geometry::LineString(_) => Self::LineString,
            Geometry::MultiLineString(_) => Self::MultiLineString,
            Geometry::Polygon(_) => Self::Polygon,
            Geometry::MultiPolygon(_) => Self::MultiPolygon,
            Geometry::Rect(_) => Self::Rect,
            Geometry::Triangle(_) => Self::Triangle,
            Geometry::GeometryCollection(_) => Self::GeometryCollection,
        }
    }
}

/// Geometry to sample, in the raster crs.
#[derive(Clone, Debug, PartialEq)]
pub struct GeometryRecord {
    pub id: String,
    pub geometry: Geometry<f64>,
}

impl GeometryRecord {
    pub fn new(id: impl Into<String>, geometry: impl Into<Geometry<f64>>) -> Self {
        Self {
            id: id.into(),
            geometry: geometry.into(),
        }
    }

    /// Record from any [geo_traits] geometry.
    pub fn from_traits(id: impl Into<String>, geometry: &impl GeometryTrait<T = f64>) -> Self {
        Self::new(id, geometry.to_geometry())
    }

    pub fn kind(&self) -> GeometryKind {
        GeometryKind::from(&self.geometry)
    }

    /// Single part geometries of a multi part one, `None` otherwise.
    fn parts(&self) -> Option<Vec<Geometry<f64>>> {
        match &self.geometry {
            Geometry::MultiPoint(multi) => {
                Some(multi.iter().map(|part| Geometry::Point(*part)).collect())
            }
            Geometry::MultiLineString(multi) => Some(
                multi
                    .iter()
                    .map(|part| Geometry::LineString(part.clone()))
                    .collect(),
            ),
            Geometry::MultiPolygon(multi) => Some(
                multi
                    .iter()
                    .map(|part| Geometry::Polygon(part.clone()))
                    .collect(),
            ),
            Geometry::GeometryCollection(collection) => Some(collection.iter().cloned().collect()),
            _ => None,
        }
    }
}

/// Pairs geometries with their ids.
///
/// Ids default to the position of the geometry. With `separate_multi_parts`
/// every part of a multi part geometry becomes its own record with id
/// `<id>_<part>`.
pub fn normalize<G: Into<Geometry<f64>>>(
    geometries: impl IntoIterator<Item = G>,
    ids: Option<&[String]>,
    separate_multi_parts: bool,
) -> Result<Vec<GeometryRecord>> {
    let geometries: Vec<Geometry<f64>> = geometries.into_iter().map(Into::into).collect();
    if let Some(ids) = ids {
        if ids.len() != geometries.len() {
            return Err(RusterError::InvalidGeometry(format!(
                "{} ids given for {} geometries",
                ids.len(),
                geometries.len()
            )));
        }
    }

    let mut records = Vec::with_capacity(geometries.len());
    for (index, geometry) in geometries.into_iter().enumerate() {
        let id = ids.map_or_else(|| index.to_string(), |ids| ids[index].clone());
        let record = GeometryRecord::new(id, geometry);
        match record.parts().filter(|_| separate_multi_parts) {
            Some(parts) => records.extend(
                parts
                    .into_iter()
                    .enumerate()
                    .map(|(part, geometry)| {
                        GeometryRecord::new(format!("{}_{part}", record.id), geometry)
                    }),
            ),
            None => records.push(record),
        }
    }

    ensure_unique_ids(&records)?;
    Ok(records)
}

/// Fails with [RusterError::InvalidGeometry] on the first repeated id.
pub(crate) fn ensure_unique_ids(records: &[GeometryRecord]) -> Result<()> {
    let mut seen = HashSet::new();
    match records.iter().find(|record| !seen.insert(record.id.as_str())) {
        Some(duplicate) => Err(RusterError::InvalidGeometry(format!(
            "duplicate geometry id {}",
            duplicate.id
        ))),
        None => Ok(()),
    }
}

/// Parses WKT strings through GDAL.
#[cfg(feature = "gdal")]
pub fn parse_wkt<S: AsRef<str>>(wkts: &[S]) -> Result<Vec<Geometry<f64>>> {
    wkts.iter()
        .map(|wkt| {
            let invalid = |error: gdal::errors::GdalError| {
                RusterError::InvalidGeometry(format!("{}: {error}", wkt.as_ref()))
            };
            gdal::vector::Geometry::from_wkt(wkt.as_ref())
                .and_then(|geometry| geometry.to_geo())
                .map_err(invalid)
        })
        .collect()
}
