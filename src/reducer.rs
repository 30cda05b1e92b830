use std::{fmt::Display, str::FromStr};

use crate::errors::{Result, RusterError};

/// Statistic collapsing a stack of samples into one value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Reducer {
    Mean,
    Median,
    Min,
    Max,
    /// Linearly interpolated percentile, 0 to 100.
    Percentile(u8),
}

impl FromStr for Reducer {
    type Err = RusterError;

    /// Accepts `mean`, `median`, `min`, `max`, `percentile_N` and `pctl_N`.
    fn from_str(keyword: &str) -> Result<Self> {
        let unsupported = || RusterError::UnsupportedReducer(keyword.to_string());
        match keyword.trim().to_ascii_lowercase().as_str() {
            "mean" => Ok(Self::Mean),
            "median" => Ok(Self::Median),
            "min" => Ok(Self::Min),
            "max" => Ok(Self::Max),
            other => {
                let (prefix, rank) = other.split_once('_').ok_or_else(unsupported)?;
                if !matches!(prefix, "percentile" | "pctl") {
                    return Err(unsupported());
                }
                match rank.parse::<u8>() {
                    Ok(rank) if rank <= 100 => Ok(Self::Percentile(rank)),
                    _ => Err(unsupported()),
                }
            }
        }
    }
}

impl TryFrom<String> for Reducer {
    type Error = RusterError;
    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Reducer> for String {
    fn from(value: Reducer) -> Self {
        value.to_string()
    }
}

impl Display for Reducer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Mean => write!(f, "mean"),
            Self::Median => write!(f, "median"),
            Self::Min => write!(f, "min"),
            Self::Max => write!(f, "max"),
            Self::Percentile(rank) => write!(f, "percentile_{rank}"),
        }
    }
}

impl Reducer {
    /// Reduces `samples`, NaN samples are ignored.
    ///
    /// `None` when no sample is left.
    pub fn reduce(&self, samples: impl IntoIterator<Item = f64>) -> Option<f64> {
        let mut samples: Vec<f64> = samples.into_iter().filter(|v| !v.is_nan()).collect();
        if samples.is_empty() {
            return None;
        }
        match self {
            Self::Mean => Some(samples.iter().sum::<f64>() / samples.len() as f64),
            Self::Min => samples.into_iter().reduce(f64::min),
            Self::Max => samples.into_iter().reduce(f64::max),
            Self::Median => Some(percentile(&mut samples, 50.)),
            Self::Percentile(rank) => Some(percentile(&mut samples, f64::from(*rank))),
        }
    }

    /// Reduces a list of sample vectors column by column,
    /// e.g. per band over every pixel of a geometry.
    pub fn reduce_columns(&self, rows: &[Vec<f64>]) -> Vec<f64> {
        let width = rows.first().map_or(0, Vec::len);
        (0..width)
            .map(|column| {
                self.reduce(rows.iter().filter_map(|row| row.get(column).copied()))
                    .unwrap_or(f64::NAN)
            })
            .collect()
    }
}

/// `rank` percentile with linear interpolation between closest ranks.
fn percentile(samples: &mut [f64], rank: f64) -> f64 {
    samples.sort_by(f64::total_cmp);
    let position = rank / 100. * (samples.len() - 1) as f64;
    let (lower, upper) = (position.floor() as usize, position.ceil() as usize);
    let fraction = position - lower as f64;
    samples[lower] + (samples[upper] - samples[lower]) * fraction
}

/// Reducer requested by name, kept even when the name is not understood
/// so callers can decide whether that is fatal.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ReducerSelection {
    Known(Reducer),
    Unrecognized(String),
}

impl ReducerSelection {
    pub fn known(&self) -> Result<Reducer> {
        match self {
            Self::Known(reducer) => Ok(*reducer),
            Self::Unrecognized(keyword) => Err(RusterError::UnsupportedReducer(keyword.clone())),
        }
    }
}

impl Default for ReducerSelection {
    fn default() -> Self {
        Self::Known(Reducer::Mean)
    }
}

impl From<Reducer> for ReducerSelection {
    fn from(value: Reducer) -> Self {
        Self::Known(value)
    }
}

impl From<&str> for ReducerSelection {
    fn from(value: &str) -> Self {
        value
            .parse()
            .map_or_else(|_| Self::Unrecognized(value.to_string()), Self::Known)
    }
}

impl From<String> for ReducerSelection {
    fn from(value: String) -> Self {
        Self::from(value.as_str())
    }
}

impl From<ReducerSelection> for String {
    fn from(value: ReducerSelection) -> Self {
        value.to_string()
    }
}

impl Display for ReducerSelection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Known(reducer) => write!(f, "{reducer}"),
            Self::Unrecognized(keyword) => write!(f, "{keyword}"),
        }
    }
}
