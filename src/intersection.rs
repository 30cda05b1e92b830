use geo::{CoordNum, Rect};

use crate::{
    crs_geo::CrsGeometry,
    errors::{Result, RusterError},
};

pub trait Intersection {
    type Output;
    /// Overlap of both shapes, `None` when they are disjoint.
    ///
    /// Touching shapes intersect in a degenerate (zero area) shape.
    fn intersection(&self, rhs: &Self) -> Option<Self::Output>;

    fn try_intersection(&self, rhs: &Self) -> Result<Self::Output> {
        self.intersection(rhs).ok_or(RusterError::NoIntersection)
    }
}

impl<T: CoordNum> Intersection for Rect<T> {
    type Output = Rect<T>;
    fn intersection(&self, rhs: &Self) -> Option<Rect<T>> {
        let lhs_max = self.max();
        let rhs_min = rhs.min();
        if (lhs_max.x < rhs_min.x) | (lhs_max.y < rhs_min.y) {
            return None;
        }

        let lhs_min = self.min();
        let rhs_max = rhs.max();
        if (lhs_min.x > rhs_max.x) | (lhs_min.y > rhs_max.y) {
            return None;
        }

        let pick = |x: T, y: T, larger: bool| if (x > y) == larger { x } else { y };
        let min = (pick(lhs_min.x, rhs_min.x, true), pick(lhs_min.y, rhs_min.y, true));
        let max = (pick(lhs_max.x, rhs_max.x, false), pick(lhs_max.y, rhs_max.y, false));

        Some(Rect::new(min, max))
    }
}

impl<T: CoordNum> Intersection for CrsGeometry<Rect<T>> {
    type Output = CrsGeometry<Rect<T>>;
    fn intersection(&self, rhs: &Self) -> Option<Self::Output> {
        let geometry = self.geometry().intersection(rhs.geometry())?;
        Some(CrsGeometry::new(self.crs_rc(), geometry))
    }
}
