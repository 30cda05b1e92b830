use std::{collections::HashSet, rc::Rc};

use itertools::Itertools;

use crate::{
    components::band::BandInfo,
    errors::{Result, RusterError},
};

/// Bands to read, by zero based index or by name.
#[derive(Clone, Debug, Default, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BandSelection {
    #[default]
    All,
    Indexes(Rc<[usize]>),
    Names(Rc<[String]>),
    /// Every band except these.
    Drop(Rc<[usize]>),
}

impl<const N: usize> From<([usize; N], bool)> for BandSelection {
    fn from(value: ([usize; N], bool)) -> Self {
        let selection = Rc::from(value.0);
        if value.1 {
            BandSelection::Drop(selection)
        } else {
            BandSelection::Indexes(selection)
        }
    }
}

impl<const N: usize> From<[usize; N]> for BandSelection {
    fn from(value: [usize; N]) -> Self {
        BandSelection::Indexes(Rc::from(value))
    }
}

impl From<std::ops::Range<usize>> for BandSelection {
    fn from(value: std::ops::Range<usize>) -> Self {
        BandSelection::Indexes(value.collect())
    }
}

impl From<Vec<usize>> for BandSelection {
    fn from(value: Vec<usize>) -> Self {
        BandSelection::Indexes(Rc::from(value))
    }
}

impl<const N: usize> From<[&str; N]> for BandSelection {
    fn from(value: [&str; N]) -> Self {
        BandSelection::Names(value.iter().map(|name| name.to_string()).collect())
    }
}

impl From<Vec<String>> for BandSelection {
    fn from(value: Vec<String>) -> Self {
        BandSelection::Names(Rc::from(value))
    }
}

impl<S: Into<BandSelection>> From<Option<S>> for BandSelection {
    fn from(value: Option<S>) -> Self {
        value.map_or(BandSelection::All, Into::into)
    }
}

impl BandSelection {
    pub fn all() -> Self {
        Self::All
    }

    /// Zero based band indexes in read order.
    pub fn resolve(&self, bands: &[BandInfo]) -> Result<Rc<[usize]>> {
        let checked = |idx: &usize| {
            if *idx < bands.len() {
                Ok(*idx)
            } else {
                Err(RusterError::UnknownBand(idx.to_string()))
            }
        };
        match self {
            Self::All => Ok((0..bands.len()).collect()),
            Self::Indexes(idxs) => idxs.iter().map(checked).collect(),
            Self::Names(names) => names
                .iter()
                .map(|name| {
                    bands
                        .iter()
                        .position(|band| band.name.eq(name))
                        .ok_or_else(|| RusterError::UnknownBand(name.clone()))
                })
                .collect(),
            Self::Drop(idxs) => {
                let drop_idxs = idxs.iter().map(checked).collect::<Result<HashSet<usize>>>()?;
                Ok((0..bands.len())
                    .filter(|idx| !drop_idxs.contains(idx))
                    .sorted()
                    .collect())
            }
        }
    }
}
