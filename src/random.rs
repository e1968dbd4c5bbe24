use crate::error::{ConfigError, SampleError};

use rand_core::SeedableRng;
use rand_distr::{Distribution, Exp, LogNormal, Pareto, Uniform};
use rand_pcg::Pcg32;
use serde::Deserialize;
use std::time::Duration;

/// Degenerate draws are retried this many times before giving up
const MAX_DRAWS: usize = 8;
/// Upper bound of a scheduling delay, far beyond any simulated horizon
pub const MAX_DELAY: Duration = Duration::from_secs(u32::MAX as u64);

/// A configurable random variable, either a constant or a parametric distribution
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RandomVariable {
    Constant { value: f64 },
    Uniform { min: f64, max: f64 },
    Exponential { mean: f64 },
    Pareto { scale: f64, shape: f64 },
    LogNormal { mu: f64, sigma: f64 },
}

impl RandomVariable {
    pub fn constant(value: f64) -> Self {
        RandomVariable::Constant { value }
    }

    pub fn sample(&self, rng: &mut Pcg32) -> Result<f64, SampleError> {
        let name = self.name();
        let err = |e: &dyn std::fmt::Display| SampleError::Distribution {
            name,
            reason: e.to_string(),
        };
        Ok(match *self {
            RandomVariable::Constant { value } => value,
            RandomVariable::Uniform { min, max } => {
                Uniform::new(min, max).map_err(|e| err(&e))?.sample(rng)
            }
            RandomVariable::Exponential { mean } => {
                Exp::new(1. / mean).map_err(|e| err(&e))?.sample(rng)
            }
            RandomVariable::Pareto { scale, shape } => {
                Pareto::new(scale, shape).map_err(|e| err(&e))?.sample(rng)
            }
            RandomVariable::LogNormal { mu, sigma } => {
                LogNormal::new(mu, sigma).map_err(|e| err(&e))?.sample(rng)
            }
        })
    }

    /// Expected value, when it is finite
    pub fn mean(&self) -> Option<f64> {
        match *self {
            RandomVariable::Constant { value } => Some(value),
            RandomVariable::Uniform { min, max } => Some((min + max) / 2.),
            RandomVariable::Exponential { mean } => Some(mean),
            RandomVariable::Pareto { scale, shape } if shape > 1. => {
                Some(shape * scale / (shape - 1.))
            }
            RandomVariable::Pareto { .. } => None,
            RandomVariable::LogNormal { mu, sigma } => Some((mu + sigma * sigma / 2.).exp()),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            RandomVariable::Constant { .. } => "constant",
            RandomVariable::Uniform { .. } => "uniform",
            RandomVariable::Exponential { .. } => "exponential",
            RandomVariable::Pareto { .. } => "pareto",
            RandomVariable::LogNormal { .. } => "lognormal",
        }
    }

    /// Check that every sample of this variable is finite and strictly positive
    pub fn validate_positive(&self, field: &'static str) -> Result<(), ConfigError> {
        let invalid = |reason: &str| {
            Err(ConfigError::InvalidVariable {
                name: field,
                reason: format!("{} {reason}", self.name()),
            })
        };
        match *self {
            RandomVariable::Constant { value } if !(value.is_finite() && value > 0.) => {
                invalid("value must be finite and > 0")
            }
            RandomVariable::Uniform { min, max }
                if !(min.is_finite() && max.is_finite() && min > 0. && min < max) =>
            {
                invalid("bounds must satisfy 0 < min < max")
            }
            RandomVariable::Exponential { mean } if !(mean.is_finite() && mean > 0.) => {
                invalid("mean must be finite and > 0")
            }
            RandomVariable::Pareto { scale, shape }
                if !(scale.is_finite() && shape.is_finite() && scale > 0. && shape > 0.) =>
            {
                invalid("scale and shape must be finite and > 0")
            }
            RandomVariable::LogNormal { mu, sigma }
                if !(mu.is_finite() && sigma.is_finite() && sigma >= 0.) =>
            {
                invalid("mu must be finite and sigma >= 0")
            }
            _ => Ok(()),
        }
    }
}

/// Pareto shape derived from the Hurst parameter: alpha = 3 - 2H
pub fn pareto_shape(hurst: f64) -> f64 {
    3. - 2. * hurst
}

/// Pareto scale such that the mean burst length is `mean_length`
pub fn time_slot(shape: f64, mean_length: f64) -> f64 {
    (shape - 1.) * mean_length / shape
}

fn to_delay(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs)
        .unwrap_or(MAX_DELAY)
        .min(MAX_DELAY)
}

/// Draws burst inter-arrival times and burst durations
#[derive(Debug, Clone)]
pub struct BurstSampler {
    arrivals: RandomVariable,
    burst_length: RandomVariable,
    shape: f64,
    time_slot: f64,
    rng: Pcg32,
}

impl BurstSampler {
    pub fn new(
        arrivals: RandomVariable,
        burst_length: RandomVariable,
        hurst: f64,
        seed: Option<u64>,
    ) -> Self {
        let rng = match seed {
            Some(s) => Pcg32::seed_from_u64(s),
            None => Pcg32::from_os_rng(),
        };
        let shape = pareto_shape(hurst);
        let time_slot = burst_length
            .mean()
            .map(|m| time_slot(shape, m))
            .unwrap_or(0.);
        BurstSampler {
            arrivals,
            burst_length,
            shape,
            time_slot,
            rng,
        }
    }

    pub fn shape(&self) -> f64 {
        self.shape
    }

    /// Pareto scale used by the latest burst duration draw
    pub fn time_slot(&self) -> f64 {
        self.time_slot
    }

    fn positive_draw(
        &mut self,
        name: &'static str,
        mut draw: impl FnMut(&mut Pcg32) -> Result<f64, SampleError>,
    ) -> Result<f64, SampleError> {
        let mut value = 0.;
        for _ in 0..MAX_DRAWS {
            value = draw(&mut self.rng)?;
            if value > 0. && !value.is_nan() {
                return Ok(value);
            }
        }
        Err(SampleError::NonPositive { name, value })
    }

    /// Time until the next burst arrival: exponential with mean 1/lambda, lambda being drawn from the
    /// arrival rate variable
    pub fn draw_inter_arrival(&mut self) -> Result<Duration, SampleError> {
        let arrivals = self.arrivals.clone();
        let lambda = self.positive_draw("burst arrival rate", |rng| arrivals.sample(rng))?;
        let exp = Exp::new(lambda).map_err(|e| SampleError::Distribution {
            name: "exponential",
            reason: e.to_string(),
        })?;
        let secs = self.positive_draw("inter-arrival time", |rng| Ok(exp.sample(rng)))?;
        Ok(to_delay(secs))
    }

    /// Duration of a new burst: Pareto with shape alpha and a scale chosen so that its mean is a
    /// sample of the mean burst length variable
    pub fn draw_burst_duration(&mut self) -> Result<Duration, SampleError> {
        let burst_length = self.burst_length.clone();
        let mean = self.positive_draw("mean burst length", |rng| burst_length.sample(rng))?;
        self.time_slot = time_slot(self.shape, mean);
        let pareto =
            Pareto::new(self.time_slot, self.shape).map_err(|e| SampleError::Distribution {
                name: "pareto",
                reason: e.to_string(),
            })?;
        let secs = self.positive_draw("burst duration", |rng| Ok(pareto.sample(rng)))?;
        Ok(to_delay(secs))
    }
}
