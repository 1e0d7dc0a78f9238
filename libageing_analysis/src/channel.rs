use ndarray::Array1;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::Display;

use super::constants::NOT_AVAILABLE;

/// A derived statistic which is either a number or unavailable ("N/A" in results).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Factor {
    Value(f64),
    NotAvailable,
}

impl Default for Factor {
    fn default() -> Self {
        Self::Value(0.0)
    }
}

impl Factor {
    /// Wrap a computed value; non-finite values become NotAvailable
    pub fn from_value(value: f64) -> Self {
        if value.is_finite() {
            Self::Value(value)
        } else {
            Self::NotAvailable
        }
    }

    pub fn value(&self) -> Option<f64> {
        match self {
            Self::Value(v) => Some(*v),
            Self::NotAvailable => None,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Self::Value(_))
    }

    /// Divide by another factor. Any unavailable operand or a zero divisor gives NotAvailable.
    pub fn divide(&self, divisor: &Factor) -> Factor {
        match (self, divisor) {
            (Self::Value(num), Self::Value(den)) if *den != 0.0 => Self::from_value(num / den),
            _ => Self::NotAvailable,
        }
    }
}

impl Display for Factor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Value(v) => write!(f, "{v}"),
            Self::NotAvailable => write!(f, "{NOT_AVAILABLE}"),
        }
    }
}

impl Serialize for Factor {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Value(v) => serializer.serialize_f64(*v),
            Self::NotAvailable => serializer.serialize_str(NOT_AVAILABLE),
        }
    }
}

impl<'de> Deserialize<'de> for Factor {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawFactor {
            Number(f64),
            Text(String),
        }
        match RawFactor::deserialize(deserializer)? {
            RawFactor::Number(v) => Ok(Self::Value(v)),
            RawFactor::Text(_) => Ok(Self::NotAvailable),
        }
    }
}

/// The two location statistics of a channel's distribution
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Means {
    pub gaussian_mean: f64,
    pub weighted_mean: f64,
}

impl Means {
    pub fn new(gaussian_mean: f64, weighted_mean: f64) -> Self {
        Self {
            gaussian_mean,
            weighted_mean,
        }
    }

    pub fn has_nan(&self) -> bool {
        self.gaussian_mean.is_nan() || self.weighted_mean.is_nan()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AgeingFactors {
    pub gaussian_ageing_factor: Factor,
    pub weighted_ageing_factor: Factor,
    pub normalized_gauss_ageing_factor: Factor,
    pub normalized_weighted_ageing_factor: Factor,
}

/// One amplifier-pair trace of a PM module plus the statistics derived from it.
///
/// Channels are never mutated in place by the pipeline; every stage produces a new
/// Channel through one of the `with_*` methods.
#[derive(Debug, Clone, PartialEq)]
pub struct Channel {
    pub name: String,
    pub number: usize,
    pub signal: Array1<f64>,
    pub noise: Option<Array1<f64>>,
    pub label: Option<String>,
    pub is_reference: bool,
    pub means: Means,
    pub factors: AgeingFactors,
}

impl Channel {
    /// Create a channel from its (1-based) number and extracted series.
    ///
    /// Reference channels never carry a noise series.
    pub fn new(number: usize, signal: Array1<f64>, noise: Array1<f64>, is_reference: bool) -> Self {
        Self {
            name: channel_name(number),
            number,
            signal,
            noise: if is_reference { None } else { Some(noise) },
            label: None,
            is_reference,
            means: Means::default(),
            factors: AgeingFactors::default(),
        }
    }

    pub fn with_label(mut self, label: String) -> Self {
        self.label = Some(label);
        self
    }

    pub fn with_means(mut self, means: Means) -> Self {
        self.means = means;
        self
    }

    pub fn with_ageing_factors(mut self, gaussian: Factor, weighted: Factor) -> Self {
        self.factors.gaussian_ageing_factor = gaussian;
        self.factors.weighted_ageing_factor = weighted;
        self
    }

    pub fn with_normalized_factors(mut self, gaussian: Factor, weighted: Factor) -> Self {
        self.factors.normalized_gauss_ageing_factor = gaussian;
        self.factors.normalized_weighted_ageing_factor = weighted;
        self
    }

    /// The (0-based, bin column excluded) data columns this channel was summed from
    pub fn columns(&self) -> (usize, usize) {
        channel_columns(self.number)
    }
}

impl Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (first, second) = self.columns();
        write!(
            f,
            "Channel(name={}, columns=({first}, {second}), is_reference={})",
            self.name, self.is_reference
        )
    }
}

/// Format a channel number as CH01, CH02, ...
pub fn channel_name(number: usize) -> String {
    format!("CH{number:02}")
}

pub fn channel_columns(number: usize) -> (usize, usize) {
    let first = number.saturating_sub(1) * 2;
    (first, first + 1)
}
