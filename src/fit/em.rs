use nalgebra::*;
use tracing::{debug, trace, warn};
use crate::prob::*;
use crate::fit::{data_weights, Fit, FitParams};

/// Expectation maximization for finite mixtures (Dempster, Laird & Rubin, 1977),
/// with a Dirichlet-style regularization gamma_i on each mixing proportion:
///
/// E-step: h[i][k] = kappa_i p_i(x_k) / sum_j kappa_j p_j(x_k)
///
/// M-step: kappa_i = (sum_k w_k h[i][k] + gamma_i - 1) / (sum_k w_k + sum_j gamma_j - n),
/// and each component is refit with weights w_k h[i][k].
///
/// w_k are optional per-datum weights (all ones when absent), which lets a
/// mixture be itself a component of an outer mixture. Iteration stops when the
/// largest change in a mixing proportion falls below the tolerance or after
/// max_iterations updates. Components without an estimator keep their
/// parameters; components whose update degenerates (e.g. all responsibility
/// lost) keep their last parameters and only their proportion moves. Returns the
/// final negative log-likelihood, which is non-increasing across iterations for
/// unregularized mixtures.
///
/// # References
/// Ormoneit, D. & Tresp, V. (1996). Improved Gaussian Mixture Density Estimates
/// Using Bayesian Penalty Terms and Network Averaging. NIPS 8.
pub fn expectation_maximization(
    mixture : &mut Mixture,
    data : &[DVector<f64>],
    weights : Option<&[f64]>,
    params : &FitParams
) -> Result<Fit, ProbError> {
    if data.is_empty() {
        return Err(ProbError::InvalidParameter(String::from("Mixture fit without data")));
    }
    let w = data_weights(data.len(), weights)?;
    let mut nll = mixture.neg_log_likelihood(data, &w)?;
    debug!(ncomponents = mixture.ncomponents(), n = data.len(), nll, "Starting EM");

    let mut resp = DMatrix::zeros(mixture.ncomponents(), data.len());
    let mut iterations = 0;
    while iterations < params.max_iterations {
        iterations += 1;
        expectation_step(&mut resp, mixture, data)?;
        let change = maximization_step(mixture, data, &w, &resp, params)?;
        nll = mixture.neg_log_likelihood(data, &w)?;
        trace!(iteration = iterations, nll, change, "EM iteration");
        if change < params.tolerance {
            break;
        }
    }
    debug!(iterations, nll, "Finished EM");
    Ok(Fit::Fitted { neg_log_likelihood : nll, iterations })
}

/// Fills the responsibility matrix (components x data points) from the current
/// state of the mixture. Points with zero density under every component get no
/// responsibility at all.
fn expectation_step(resp : &mut DMatrix<f64>, mixture : &Mixture, data : &[DVector<f64>]) -> Result<(), ProbError> {
    for (i, (c, k)) in mixture.components().iter().zip(mixture.proportions().iter()).enumerate() {
        for (j, x) in data.iter().enumerate() {
            resp[(i, j)] = if *k > 0.0 { k * c.density(x)? } else { 0.0 };
        }
    }
    for mut col in resp.column_iter_mut() {
        let total = col.sum();
        if total > 0.0 {
            col.unscale_mut(total);
        }
    }
    Ok(())
}

/// Updates proportions and components, returning the largest absolute change
/// of a mixing proportion.
fn maximization_step(
    mixture : &mut Mixture,
    data : &[DVector<f64>],
    w : &[f64],
    resp : &DMatrix<f64>,
    params : &FitParams
) -> Result<f64, ProbError> {
    let n = mixture.ncomponents();
    let total_w : f64 = w.iter().sum();
    let sum_gamma : f64 = mixture.gamma().iter().sum();
    let denom = total_w + sum_gamma - n as f64;
    if !(denom > 0.0) {
        return Err(ProbError::Degenerate(format!("mixing proportion normalizer {}", denom)));
    }

    let gamma = mixture.gamma().to_vec();
    let old = mixture.proportions().to_vec();
    let mut next = Vec::with_capacity(n);
    for i in 0..n {
        let wi : Vec<f64> = w.iter().enumerate().map(|(j, wk)| wk * resp[(i, j)]).collect();
        let mass : f64 = wi.iter().sum();
        next.push((mass + gamma[i] - 1.0) / denom);
        if mass > 0.0 {
            match mixture.components_mut()[i].fit(data, Some(&wi), params) {
                Ok(_) => { },
                Err(ProbError::Degenerate(msg)) => {
                    warn!(component = i, reason = %msg, "Mixture component update degenerated; keeping parameters");
                },
                Err(e) => return Err(e)
            }
        }
    }
    normalize(&mut next)?;
    let change = next.iter()
        .zip(old.iter())
        .map(|(a, b)| (a - b).abs())
        .fold(0.0, f64::max);
    mixture.set_proportions(next);
    Ok(change)
}
