use std::rc::Rc;

use geo::{BoundingRect, Rect};
use shrinkwraprs::Shrinkwrap;

/// Geometry tagged with the coordinate reference it is expressed in.
///
/// The reference is opaque (WKT, PROJ string or authority code) and
/// only compared for equality.
#[derive(Shrinkwrap, Debug, Clone, PartialEq)]
pub struct CrsGeometry<G> {
    crs: Rc<str>,
    #[shrinkwrap(main_field)]
    geometry: G,
}

impl<G> CrsGeometry<G> {
    pub fn new(crs: Rc<str>, geometry: G) -> Self {
        Self { crs, geometry }
    }

    pub fn crs(&self) -> &str {
        self.crs.as_ref()
    }

    pub(crate) fn crs_rc(&self) -> Rc<str> {
        Rc::clone(&self.crs)
    }

    pub fn geometry(&self) -> &G {
        &self.geometry
    }

    pub fn into_geometry(self) -> G {
        self.geometry
    }
}

impl<G: BoundingRect<f64>> CrsGeometry<G> {
    pub fn bounding_rect(&self) -> Option<CrsGeometry<Rect<f64>>> {
        let geometry: Option<Rect<f64>> = self.geometry.bounding_rect().into();
        Some(CrsGeometry {
            crs: Rc::clone(&self.crs),
            geometry: geometry?,
        })
    }
}
