use num_traits::{Num, NumCast, ToPrimitive};
use std::fmt::Debug;

/// Pixel value types a raster band can hold.
pub trait DataType:
    Num + NumCast + ToPrimitive + Copy + PartialOrd + Send + Sync + Debug + 'static
{
    /// `false` only for NaN and infinities, integers are always finite.
    fn is_finite_value(&self) -> bool;
}

macro_rules! impl_integer_data_type {
    ($($t:ty),*) => {
        $(impl DataType for $t {
            fn is_finite_value(&self) -> bool {
                true
            }
        })*
    };
}

macro_rules! impl_float_data_type {
    ($($t:ty),*) => {
        $(impl DataType for $t {
            fn is_finite_value(&self) -> bool {
                self.is_finite()
            }
        })*
    };
}

impl_integer_data_type!(u8, u16, u32, u64, i8, i16, i32, i64);
impl_float_data_type!(f32, f64);

/// Static description of a band as exposed by a raster source.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BandInfo {
    pub name: String,
    pub description: String,
    pub nodata: Option<f64>,
}

impl BandInfo {
    pub fn new(name: impl Into<String>, nodata: Option<f64>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            nodata,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Whether `value` equals the declared no-data value of the band.
    pub fn is_nodata(&self, value: f64) -> bool {
        self.nodata.is_some_and(|nodata| {
            value == nodata || (nodata.is_nan() && value.is_nan())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(f32::NAN, false)]
    #[case(f32::INFINITY, false)]
    #[case(f32::NEG_INFINITY, false)]
    #[case(-3.5, true)]
    fn float_finiteness(#[case] value: f32, #[case] finite: bool) {
        assert_eq!(value.is_finite_value(), finite);
    }

    #[rstest]
    fn nan_nodata_matches_nan() {
        let band = BandInfo::new("b1", Some(f64::NAN));
        assert!(band.is_nodata(f64::NAN));
        assert!(!band.is_nodata(0.));
        assert!(!BandInfo::new("b2", None).is_nodata(0.));
    }
}
