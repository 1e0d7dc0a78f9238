use nalgebra::{Matrix3, Vector3};
use ndarray::ArrayView1;

use super::channel::{Channel, Means};
use super::constants::{FIT_MAX_EVALUATIONS, FIT_PARAMETERS, FIT_TOLERANCE};
use super::dataset::Dataset;
use super::module::Module;

const MIN_DAMPING_SCALE: f64 = 1.0e-12;
const INITIAL_DAMPING: f64 = 1.0e-3;

/// Parameters of the model `amplitude * exp(-(x - mean)^2 / (2 sigma^2))`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GaussianParameters {
    pub amplitude: f64,
    pub mean: f64,
    pub sigma: f64,
}

impl GaussianParameters {
    fn to_vector(self) -> Vector3<f64> {
        Vector3::new(self.amplitude, self.mean, self.sigma)
    }

    fn from_vector(p: &Vector3<f64>) -> Self {
        Self {
            amplitude: p[0],
            mean: p[1],
            sigma: p[2],
        }
    }

    fn is_finite(&self) -> bool {
        self.amplitude.is_finite() && self.mean.is_finite() && self.sigma.is_finite()
    }
}

pub fn gaussian(x: f64, p: &GaussianParameters) -> f64 {
    p.amplitude * (-(x - p.mean).powi(2) / (2.0 * p.sigma.powi(2))).exp()
}

/// Intensity weighted centroid `sum(x * y) / sum(y)` over `x = 0..N-1`. Zero if `sum(y) == 0`.
pub fn weighted_mean(y: ArrayView1<f64>) -> f64 {
    let total = y.sum();
    if total == 0.0 {
        return 0.0;
    }
    let moment: f64 = y.iter().enumerate().map(|(x, v)| x as f64 * v).sum();
    moment / total
}

/// Half the sum of squared residuals
fn cost(y: ArrayView1<f64>, p: &GaussianParameters) -> f64 {
    0.5 * y
        .iter()
        .enumerate()
        .map(|(x, v)| (gaussian(x as f64, p) - v).powi(2))
        .sum::<f64>()
}

/// Normal matrix JᵀJ and gradient Jᵀr of the residuals at `p`
fn normal_equations(y: ArrayView1<f64>, p: &GaussianParameters) -> (Matrix3<f64>, Vector3<f64>) {
    let mut jtj = Matrix3::zeros();
    let mut jtr = Vector3::zeros();
    let sigma2 = p.sigma * p.sigma;
    for (i, v) in y.iter().enumerate() {
        let dx = i as f64 - p.mean;
        let e = (-dx * dx / (2.0 * sigma2)).exp();
        let residual = p.amplitude * e - v;
        let row = Vector3::new(
            e,
            p.amplitude * e * dx / sigma2,
            p.amplitude * e * dx * dx / (sigma2 * p.sigma),
        );
        jtj += row * row.transpose();
        jtr += row * residual;
    }
    (jtj, jtr)
}

/// Initial guess: amplitude = max(y), mean = weighted centroid, sigma = std of `0..N-1`
fn initial_guess(y: ArrayView1<f64>) -> GaussianParameters {
    let n = y.len() as f64;
    GaussianParameters {
        amplitude: y.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
        mean: weighted_mean(y),
        sigma: ((n * n - 1.0) / 12.0).sqrt(),
    }
}

/// Least-squares fit of a Gaussian to `y` over `x = 0..N-1` using Levenberg-Marquardt.
///
/// Returns None when the fit does not converge within the evaluation budget, when the
/// covariance of the solution cannot be estimated (singular normal matrix), or when the
/// result is not finite.
pub fn fit_gaussian(y: ArrayView1<f64>) -> Option<GaussianParameters> {
    if y.len() <= FIT_PARAMETERS || y.sum() == 0.0 {
        return None;
    }
    let mut params = initial_guess(y);
    if !params.is_finite() || params.sigma == 0.0 {
        return None;
    }
    let mut current_cost = cost(y, &params);
    let mut evaluations = 1;
    let mut damping = INITIAL_DAMPING;
    let mut converged = false;

    while evaluations < FIT_MAX_EVALUATIONS {
        if current_cost == 0.0 {
            converged = true;
            break;
        }
        let (jtj, jtr) = normal_equations(y, &params);
        let mut damped = jtj;
        for k in 0..3 {
            damped[(k, k)] += damping * jtj[(k, k)].max(MIN_DAMPING_SCALE);
        }
        let step = match damped.lu().solve(&(-jtr)) {
            Some(step) if step.iter().all(|v| v.is_finite()) => step,
            _ => {
                damping *= 10.0;
                evaluations += 1;
                continue;
            }
        };

        let current = params.to_vector();
        let candidate = GaussianParameters::from_vector(&(current + step));
        let candidate_cost = cost(y, &candidate);
        evaluations += 1;

        let small_step = step.norm() <= FIT_TOLERANCE * (current.norm() + FIT_TOLERANCE);
        if candidate_cost.is_finite() && candidate_cost < current_cost {
            let reduction = (current_cost - candidate_cost) / current_cost;
            params = candidate;
            current_cost = candidate_cost;
            damping = (damping / 10.0).max(f64::MIN_POSITIVE);
            if reduction <= FIT_TOLERANCE || small_step {
                converged = true;
                break;
            }
        } else if small_step {
            converged = true;
            break;
        } else {
            damping *= 10.0;
        }
    }

    if !converged || !params.is_finite() {
        return None;
    }
    // The covariance estimate needs an invertible normal matrix at the solution
    let (jtj, _) = normal_equations(y, &params);
    let covariance = jtj.try_inverse()?;
    if !covariance.iter().all(|v| v.is_finite()) {
        return None;
    }
    Some(params)
}

/// Mean of the fitted Gaussian, or 0 if the fit failed
pub fn gaussian_mean(y: ArrayView1<f64>) -> f64 {
    match fit_gaussian(y) {
        Some(params) => params.mean,
        None => 0.0,
    }
}

/// Compute both statistics of a channel, retrying on the noise series for each statistic
/// that came out exactly zero on the signal series.
///
/// Returns the updated channel and whether it needed the fallback or still ended at zero.
pub fn fit_channel(channel: Channel) -> (Channel, bool) {
    let mut gauss = gaussian_mean(channel.signal.view());
    let mut weighted = weighted_mean(channel.signal.view());
    let mut warned = false;

    if let Some(noise) = channel.noise.as_ref() {
        if gauss == 0.0 {
            log::debug!("{}: Gaussian fit of signal failed, retrying on noise", channel.name);
            gauss = gaussian_mean(noise.view());
            warned = true;
        }
        if weighted == 0.0 {
            log::debug!("{}: weighted mean of signal is zero, retrying on noise", channel.name);
            weighted = weighted_mean(noise.view());
            warned = true;
        }
    }
    if gauss == 0.0 || weighted == 0.0 {
        warned = true;
    }

    log::debug!(
        "{}: gaussian mean {gauss:.3}, weighted mean {weighted:.3}",
        channel.name
    );
    (channel.with_means(Means::new(gauss, weighted)), warned)
}

/// Fit every channel of a module. Returns the module and its warning count.
pub fn fit_module(module: Module) -> (Module, usize) {
    let mut warnings = 0;
    let module = module.map_channels(|channel| {
        let (channel, warned) = fit_channel(channel);
        if warned {
            warnings += 1;
        }
        channel
    });
    if warnings > 0 {
        log::warn!(
            "{}: {warnings} of {} channels needed the noise fallback or have a zero mean",
            module.identifier,
            module.channels.len()
        );
    }
    (module, warnings)
}

/// Fit every channel of a dataset, recording the total warning count on it.
pub fn process_dataset(dataset: Dataset) -> Dataset {
    log::debug!("Fitting distributions for dataset {}...", dataset.date);
    let mut total = 0;
    let dataset = dataset.map_modules(|module| {
        let (module, warnings) = fit_module(module);
        total += warnings;
        module
    });
    log::info!(
        "Fitted {} channels of dataset {} ({total} warnings)",
        dataset.channel_count(),
        dataset.date
    );
    dataset.with_fit_warnings(total)
}
