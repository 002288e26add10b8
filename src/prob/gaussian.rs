use nalgebra::*;
use rand::{Rng, RngCore};
use rand_distr::StandardNormal;
use std::f64::consts::PI;
use crate::prob::*;
use crate::fit::{self, Fit, FitParams};
use crate::model::TextFormat;
use crate::model::parse::*;

/// Hyperparameters of the penalized maximum-likelihood update (Ormoneit & Tresp,
/// 1996): a prior mean with weight `mean_scale` pulls the location estimate,
/// and a prior diagonal `variance` with scale `variance_scale` keeps the
/// covariance away from singularity. The defaults reduce fit() to plain weighted
/// maximum likelihood.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Regularization {

    pub mean : Option<DVector<f64>>,

    pub mean_scale : f64,

    pub variance : Option<DVector<f64>>,

    /// Defaults to half the dimensionality.
    pub variance_scale : Option<f64>

}

impl Regularization {

    fn is_default(&self) -> bool {
        self == &Self::default()
    }

}

// Factorization of the covariance, computed once per parameter value.
#[derive(Debug, Clone)]
struct Factors {

    inverse : DMatrix<f64>,

    log_det : f64,

    lower : DMatrix<f64>

}

impl Factors {

    fn compute(sigma : &DMatrix<f64>) -> Option<Self> {
        let chol = Cholesky::new(sigma.clone())?;
        let lower = chol.l();
        let log_det = 2.0 * lower.diagonal().iter().map(|v| v.ln()).sum::<f64>();
        if !log_det.is_finite() {
            return None;
        }
        let inverse = chol.inverse();
        Some(Self { inverse, log_det, lower })
    }

}

/// Multivariate normal distribution. The covariance is factored when the
/// distribution is built; a covariance that is singular or not positive-definite
/// leaves the factorization undefined, in which case density evaluation and
/// sampling fail with ProbError::Degenerate instead of returning garbage.
#[derive(Debug, Clone)]
pub struct Gaussian {

    mu : DVector<f64>,

    sigma : DMatrix<f64>,

    factors : Option<Factors>,

    prior : Regularization

}

impl Gaussian {

    /// Univariate normal with the informed mean and standard deviation.
    pub fn new(mean : f64, stddev : f64) -> Result<Self, ProbError> {
        if !(stddev > 0.0) || !stddev.is_finite() || !mean.is_finite() {
            return Err(ProbError::InvalidParameter(format!(
                "Gaussian with mean {} and standard deviation {}", mean, stddev
            )));
        }
        Self::multivariate(DVector::from_element(1, mean), DMatrix::from_element(1, 1, stddev.powi(2)))
    }

    pub fn multivariate(mu : DVector<f64>, sigma : DMatrix<f64>) -> Result<Self, ProbError> {
        let d = mu.nrows();
        if d == 0 {
            return Err(ProbError::InvalidParameter(String::from("Gaussian with zero dimensions")));
        }
        if sigma.nrows() != d || sigma.ncols() != d {
            return Err(ProbError::Dimension { expected : d, found : sigma.nrows() });
        }
        if mu.iter().chain(sigma.iter()).any(|v| !v.is_finite()) {
            return Err(ProbError::InvalidParameter(String::from("Gaussian with non-finite parameters")));
        }
        for i in 0..d {
            for j in 0..i {
                let tol = 1e-9 * (sigma[(i, j)].abs() + sigma[(j, i)].abs()).max(1.0);
                if (sigma[(i, j)] - sigma[(j, i)]).abs() > tol {
                    return Err(ProbError::InvalidParameter(String::from("Covariance is not symmetric")));
                }
            }
        }
        let factors = Factors::compute(&sigma);
        Ok(Self { mu, sigma, factors, prior : Regularization::default() })
    }

    pub fn with_regularization(mut self, prior : Regularization) -> Result<Self, ProbError> {
        let d = self.mu.nrows();
        for v in prior.mean.iter().chain(prior.variance.iter()) {
            if v.nrows() != d {
                return Err(ProbError::Dimension { expected : d, found : v.nrows() });
            }
        }
        if prior.mean_scale < 0.0 {
            return Err(ProbError::InvalidParameter(String::from("Negative prior mean scale")));
        }
        self.prior = prior;
        Ok(self)
    }

    pub fn mean(&self) -> &DVector<f64> {
        &self.mu
    }

    pub fn covariance(&self) -> &DMatrix<f64> {
        &self.sigma
    }

    pub fn regularization(&self) -> &Regularization {
        &self.prior
    }

    pub fn is_degenerate(&self) -> bool {
        self.factors.is_none()
    }

    fn factors(&self) -> Result<&Factors, ProbError> {
        self.factors.as_ref().ok_or_else(|| ProbError::Degenerate(String::from("Gaussian covariance")))
    }

    fn univariate(&self) -> Result<(f64, f64), ProbError> {
        if self.mu.nrows() != 1 {
            return Err(ProbError::Dimension { expected : 1, found : self.mu.nrows() });
        }
        Ok((self.mu[0], self.sigma[(0, 0)].sqrt()))
    }

    /// Product of univariate normal densities given as (mean, standard deviation)
    /// pairs. Returns the normalized product together with the constant the
    /// normalized product must be multiplied by to recover the raw product.
    pub fn densities_product(terms : &[(f64, f64)]) -> Result<(Gaussian, f64), ProbError> {
        if terms.is_empty() {
            return Err(ProbError::InvalidParameter(String::from("Empty product of densities")));
        }
        let (mut a, mut b, mut c, mut log_prod_var) = (0.0, 0.0, 0.0, 0.0);
        for (m, s) in terms.iter() {
            let s2 = s.powi(2);
            if !(s2 > 0.0) || !s2.is_finite() {
                return Err(ProbError::Degenerate(format!("density product term with standard deviation {}", s)));
            }
            a += 1.0 / s2;
            b += m / s2;
            c += m.powi(2) / s2;
            log_prod_var += s2.ln();
        }
        let n = terms.len() as f64;
        let log_const = -0.5 * (n - 1.0) * (2.0 * PI).ln()
            - 0.5 * (log_prod_var + a.ln())
            - 0.5 * (c - b.powi(2) / a);
        let product = Gaussian::new(b / a, (1.0 / a).sqrt())?;
        Ok((product, log_const.exp()))
    }

}

impl Distribution for Gaussian {

    fn ndims(&self) -> usize {
        self.mu.nrows()
    }

    fn density(&self, x : &DVector<f64>) -> Result<f64, ProbError> {
        Ok(self.log_density(x)?.exp())
    }

    fn log_density(&self, x : &DVector<f64>) -> Result<f64, ProbError> {
        check_dims(x, self.mu.nrows())?;
        let f = self.factors()?;
        let xc = x - &self.mu;
        let mahalanobis = xc.dot(&(&f.inverse * &xc));
        Ok(-0.5 * (self.mu.nrows() as f64 * (2.0 * PI).ln() + f.log_det + mahalanobis))
    }

    fn cdf(&self, x : f64) -> Result<f64, ProbError> {
        let (m, s) = self.univariate()?;
        Ok(standard_normal_cdf((x - m) / s))
    }

    fn sample(&self, rng : &mut dyn RngCore) -> Result<DVector<f64>, ProbError> {
        let f = self.factors()?;
        let z = DVector::from_iterator(self.mu.nrows(), (0..self.mu.nrows()).map(|_| {
            let z : f64 = rng.sample(StandardNormal);
            z
        }));
        Ok(&self.mu + &f.lower * z)
    }

    fn expected_value(&self) -> Result<f64, ProbError> {
        Ok(self.univariate()?.0)
    }

    fn sqrt_variance(&self) -> Result<f64, ProbError> {
        Ok(self.univariate()?.1)
    }

    fn fit(
        &mut self,
        data : &[DVector<f64>],
        weights : Option<&[f64]>,
        _params : &FitParams
    ) -> Result<Fit, ProbError> {
        let d = self.mu.nrows();
        if data.is_empty() {
            return Err(ProbError::InvalidParameter(String::from("Gaussian fit without data")));
        }
        for x in data {
            check_dims(x, d)?;
        }
        let w = fit::data_weights(data.len(), weights)?;
        let total : f64 = w.iter().sum();
        if !(total > 0.0) {
            return Err(ProbError::Degenerate(String::from("Gaussian fit with zero total weight")));
        }

        let eta = self.prior.mean_scale;
        let mu_hat = self.prior.mean.clone().unwrap_or_else(|| DVector::zeros(d));
        let mut mu = mu_hat.scale(eta);
        for (x, wk) in data.iter().zip(w.iter()) {
            mu += x.scale(*wk);
        }
        mu.unscale_mut(total + eta);

        let mut scatter = DMatrix::zeros(d, d);
        for (x, wk) in data.iter().zip(w.iter()) {
            let xc = x - &mu;
            scatter += (&xc * xc.transpose()).scale(*wk);
        }
        let dm = &mu - &mu_hat;
        scatter += (&dm * dm.transpose()).scale(eta);
        if let Some(beta) = &self.prior.variance {
            for i in 0..d {
                scatter[(i, i)] += 2.0 * beta[i];
            }
        }
        let alpha = self.prior.variance_scale.unwrap_or(d as f64 / 2.0);
        let denom = total + 1.0 + 2.0 * (alpha - (d as f64 + 1.0) / 2.0);
        if !(denom > 0.0) {
            return Err(ProbError::Degenerate(format!("Gaussian update with normalizer {}", denom)));
        }
        scatter.unscale_mut(denom);

        let updated = Gaussian::multivariate(mu, scatter)?.with_regularization(self.prior.clone())?;
        if updated.is_degenerate() {
            return Err(ProbError::Degenerate(String::from("Gaussian covariance after update")));
        }
        *self = updated;

        let mut nll = 0.0;
        for (x, wk) in data.iter().zip(w.iter()) {
            nll -= wk * self.log_density(x)?;
        }
        Ok(Fit::Fitted { neg_log_likelihood : nll, iterations : 1 })
    }

    fn clone_box(&self) -> Box<dyn Distribution> {
        Box::new(self.clone())
    }

}

crate::unconditional!(Gaussian, Kind::Gaussian);

impl TextFormat for Gaussian {

    fn to_text(&self, indent : &str) -> String {
        let d = self.mu.nrows();
        if d == 1 && self.prior.is_default() {
            return format!("Gaussian {{ mean {} std-deviation {} }}", self.mu[0], self.sigma[(0, 0)].sqrt());
        }
        let mut s = format!("Gaussian\n{}{{\n", indent);
        s += &format!("{}\tndimensions {}\n", indent, d);
        s += &format!("{}\tmean {}\n", indent, format_numbers(self.mu.as_slice()));
        let cov = self.sigma.transpose();
        s += &format!("{}\tcovariance {}\n", indent, format_numbers(cov.as_slice()));
        if let Some(m) = &self.prior.mean {
            s += &format!("{}\tprior-mean {}\n", indent, format_numbers(m.as_slice()));
        }
        if self.prior.mean_scale != 0.0 {
            s += &format!("{}\tprior-mean-scale {}\n", indent, self.prior.mean_scale);
        }
        if let Some(v) = &self.prior.variance {
            s += &format!("{}\tprior-variance {}\n", indent, format_numbers(v.as_slice()));
        }
        if let Some(a) = self.prior.variance_scale {
            s += &format!("{}\tprior-variance-scale {}\n", indent, a);
        }
        s + indent + "}"
    }

    fn from_text(tokens : &mut Tokens) -> Result<Self, ParseError> {
        const CTX : &str = "Gaussian";
        let line = tokens.line();
        tokens.expect_open(CTX)?;
        let mut ndims : Option<usize> = None;
        let mut mean : Option<Vec<f64>> = None;
        let mut cov : Option<Vec<f64>> = None;
        let mut prior = Regularization::default();
        while let Some(key) = tokens.next_key(CTX)? {
            match &key[..] {
                "ndimensions" => ndims = Some(tokens.integer(CTX)?),
                "mean" => {
                    mean = Some(match tokens.peek() {
                        Some(Token::Open) => tokens.numbers(CTX)?,
                        _ => vec![tokens.number(CTX)?]
                    });
                },
                "std-deviation" => cov = Some(vec![tokens.number(CTX)?.powi(2)]),
                "variance" => cov = Some(vec![tokens.number(CTX)?]),
                "covariance" => cov = Some(tokens.numbers(CTX)?),
                "prior-mean" => prior.mean = Some(DVector::from_vec(tokens.numbers(CTX)?)),
                "prior-mean-scale" => prior.mean_scale = tokens.number(CTX)?,
                "prior-variance" => prior.variance = Some(DVector::from_vec(tokens.numbers(CTX)?)),
                "prior-variance-scale" => prior.variance_scale = Some(tokens.number(CTX)?),
                other => {
                    return Err(tokens.unexpected(
                        CTX,
                        "ndimensions, mean, std-deviation, variance, covariance or a prior-* key",
                        &Token::Word(other.to_string())
                    ));
                }
            }
        }
        let invalid = |message : String| ParseError::Invalid { context : CTX.to_string(), message, line };
        let mean = mean.ok_or_else(|| invalid(String::from("missing mean")))?;
        let cov = cov.ok_or_else(|| invalid(String::from("missing std-deviation, variance or covariance")))?;
        let d = ndims.unwrap_or(mean.len());
        if mean.len() != d || cov.len() != d * d {
            return Err(invalid(format!(
                "{} dimensions need {} mean and {} covariance entries, found {} and {}",
                d, d, d * d, mean.len(), cov.len()
            )));
        }
        Gaussian::multivariate(DVector::from_vec(mean), DMatrix::from_row_slice(d, d, &cov))
            .and_then(|g| g.with_regularization(prior))
            .map_err(|e| invalid(e.to_string()))
    }

}
