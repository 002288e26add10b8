use nalgebra::*;
use rand::{Rng, RngCore};
use crate::prob::*;
use crate::fit::{em, Fit, FitParams};
use crate::model::{self, TextFormat};
use crate::model::parse::*;

/// Finite mixture sum_i kappa_i p_i(x). Mixing proportions are non-negative and
/// sum to one; each component carries a regularization gamma_i >= 1 applied to
/// its proportion by the EM update (gamma = 1 means no regularization).
#[derive(Debug, Clone)]
pub struct Mixture {

    components : Vec<Box<dyn Distribution>>,

    proportions : Vec<f64>,

    gamma : Vec<f64>

}

impl Mixture {

    pub fn new(components : Vec<Box<dyn Distribution>>, proportions : Vec<f64>) -> Result<Self, ProbError> {
        let n = components.len();
        Self::regularized(components, proportions, vec![1.0; n])
    }

    /// Mixture with equal proportions.
    pub fn equal(components : Vec<Box<dyn Distribution>>) -> Result<Self, ProbError> {
        let n = components.len();
        Self::new(components, vec![1.0 / n as f64; n])
    }

    pub fn regularized(
        components : Vec<Box<dyn Distribution>>,
        mut proportions : Vec<f64>,
        gamma : Vec<f64>
    ) -> Result<Self, ProbError> {
        let n = components.len();
        if n == 0 {
            return Err(ProbError::InvalidParameter(String::from("Mixture without components")));
        }
        if proportions.len() != n {
            return Err(ProbError::Dimension { expected : n, found : proportions.len() });
        }
        if gamma.len() != n {
            return Err(ProbError::Dimension { expected : n, found : gamma.len() });
        }
        let d = components[0].ndims();
        if let Some(c) = components.iter().find(|c| c.ndims() != d) {
            return Err(ProbError::Dimension { expected : d, found : c.ndims() });
        }
        if proportions.iter().any(|p| !(*p >= 0.0)) {
            return Err(ProbError::InvalidParameter(String::from("Negative mixing proportion")));
        }
        let total : f64 = proportions.iter().sum();
        if (total - 1.0).abs() > 1e-6 {
            return Err(ProbError::InvalidParameter(format!("Mixing proportions sum to {}", total)));
        }
        normalize(&mut proportions)?;
        if gamma.iter().any(|g| !(*g >= 1.0) || !g.is_finite()) {
            return Err(ProbError::InvalidParameter(String::from("Regularization gamma must be finite and at least 1")));
        }
        Ok(Self { components, proportions, gamma })
    }

    /// Single-component mixture holding a Gaussian.
    pub fn from_gaussian(g : Gaussian) -> Self {
        Self { components : vec![Box::new(g)], proportions : vec![1.0], gamma : vec![1.0] }
    }

    pub fn ncomponents(&self) -> usize {
        self.components.len()
    }

    pub fn components(&self) -> &[Box<dyn Distribution>] {
        &self.components
    }

    pub(crate) fn components_mut(&mut self) -> &mut [Box<dyn Distribution>] {
        &mut self.components
    }

    pub fn proportions(&self) -> &[f64] {
        &self.proportions
    }

    pub(crate) fn set_proportions(&mut self, proportions : Vec<f64>) {
        self.proportions = proportions;
    }

    pub fn gamma(&self) -> &[f64] {
        &self.gamma
    }

    /// Negative log-likelihood of weighted data.
    pub fn neg_log_likelihood(&self, data : &[DVector<f64>], weights : &[f64]) -> Result<f64, ProbError> {
        let mut nll = 0.0;
        for (x, w) in data.iter().zip(weights.iter()) {
            if *w > 0.0 {
                nll -= w * self.density(x)?.ln();
            }
        }
        Ok(nll)
    }

    /// Views a Gaussian or a mixture of univariate Gaussians as a list of
    /// weighted (mean, standard deviation) terms.
    pub fn gaussian_terms(d : &dyn Distribution) -> Result<Vec<(f64, f64, f64)>, ProbError> {
        if let Some(g) = d.as_any().downcast_ref::<Gaussian>() {
            return Ok(vec![(1.0, g.expected_value()?, g.sqrt_variance()?)]);
        }
        if let Some(m) = d.as_any().downcast_ref::<Mixture>() {
            let mut terms = Vec::with_capacity(m.ncomponents());
            for (c, k) in m.components.iter().zip(m.proportions.iter()) {
                if c.kind() != Kind::Gaussian {
                    return Err(ProbError::Unsupported { op : "mixture_product", kind : c.kind() });
                }
                terms.push((*k, c.expected_value()?, c.sqrt_variance()?));
            }
            return Ok(terms);
        }
        Err(ProbError::Unsupported { op : "mixture_product", kind : d.kind() })
    }

    /// Normalized product of univariate Gaussian mixtures (plain Gaussians count
    /// as one-component mixtures). Each combination of one component per factor
    /// contributes the product of its components, weighted by the product of the
    /// mixing proportions and of the product's normalizing constant.
    pub fn mixture_product(factors : &[&dyn Distribution]) -> Result<Mixture, ProbError> {
        if factors.is_empty() {
            return Err(ProbError::InvalidParameter(String::from("Empty mixture product")));
        }
        let terms = factors.iter()
            .map(|f| Self::gaussian_terms(*f))
            .collect::<Result<Vec<_>, _>>()?;
        let mut components : Vec<Box<dyn Distribution>> = Vec::new();
        let mut proportions = Vec::new();
        let mut choice = vec![0; terms.len()];
        loop {
            let mut weight = 1.0;
            let mut pairs = Vec::with_capacity(terms.len());
            for (t, c) in terms.iter().zip(choice.iter()) {
                let (k, m, s) = t[*c];
                weight *= k;
                pairs.push((m, s));
            }
            if weight > 0.0 {
                let (g, constant) = Gaussian::densities_product(&pairs)?;
                if weight * constant > 0.0 {
                    components.push(Box::new(g));
                    proportions.push(weight * constant);
                }
            }

            // Advance the mixed-radix counter over component choices.
            let mut pos = 0;
            loop {
                if pos == choice.len() {
                    normalize(&mut proportions)?;
                    let n = components.len();
                    return Mixture::regularized(components, proportions, vec![1.0; n]);
                }
                choice[pos] += 1;
                if choice[pos] < terms[pos].len() {
                    break;
                }
                choice[pos] = 0;
                pos += 1;
            }
        }
    }

}

impl Distribution for Mixture {

    fn ndims(&self) -> usize {
        self.components[0].ndims()
    }

    fn density(&self, x : &DVector<f64>) -> Result<f64, ProbError> {
        let mut p = 0.0;
        for (c, k) in self.components.iter().zip(self.proportions.iter()) {
            if *k > 0.0 {
                p += k * c.density(x)?;
            }
        }
        Ok(p)
    }

    fn cdf(&self, x : f64) -> Result<f64, ProbError> {
        let mut p = 0.0;
        for (c, k) in self.components.iter().zip(self.proportions.iter()) {
            if *k > 0.0 {
                p += k * c.cdf(x)?;
            }
        }
        Ok(p)
    }

    fn sample(&self, rng : &mut dyn RngCore) -> Result<DVector<f64>, ProbError> {
        let u : f64 = rng.gen();
        let mut acc = 0.0;
        for (c, k) in self.components.iter().zip(self.proportions.iter()) {
            acc += k;
            if u < acc {
                return c.sample(rng);
            }
        }
        let last = self.proportions.iter().rposition(|k| *k > 0.0).unwrap_or(0);
        self.components[last].sample(rng)
    }

    fn expected_value(&self) -> Result<f64, ProbError> {
        let mut m = 0.0;
        for (c, k) in self.components.iter().zip(self.proportions.iter()) {
            m += k * c.expected_value()?;
        }
        Ok(m)
    }

    fn sqrt_variance(&self) -> Result<f64, ProbError> {
        let mut second = 0.0;
        for (c, k) in self.components.iter().zip(self.proportions.iter()) {
            let (m, s) = (c.expected_value()?, c.sqrt_variance()?);
            second += k * (s.powi(2) + m.powi(2));
        }
        Ok((second - self.expected_value()?.powi(2)).max(0.0).sqrt())
    }

    fn fit(
        &mut self,
        data : &[DVector<f64>],
        weights : Option<&[f64]>,
        params : &FitParams
    ) -> Result<Fit, ProbError> {
        em::expectation_maximization(self, data, weights, params)
    }

    fn clone_box(&self) -> Box<dyn Distribution> {
        Box::new(self.clone())
    }

}

crate::unconditional!(Mixture, Kind::Mixture);

impl TextFormat for Mixture {

    fn to_text(&self, indent : &str) -> String {
        let inner = format!("{}\t\t", indent);
        let mut s = format!("Mixture\n{}{{\n", indent);
        s += &format!("{}\tndimensions {}\n", indent, self.ndims());
        s += &format!("{}\tncomponents {}\n", indent, self.ncomponents());
        s += &format!("{}\tmixing-proportions {}\n", indent, format_numbers(&self.proportions));
        s += &format!("{}\tregularization-gammas {}\n", indent, format_numbers(&self.gamma));
        s += &format!("{}\tcomponents\n{}\t{{\n", indent, indent);
        for c in self.components.iter() {
            s += &format!("{}{}\n", inner, c.to_text(&inner));
        }
        s += &format!("{}\t}}\n", indent);
        s + indent + "}"
    }

    fn from_text(tokens : &mut Tokens) -> Result<Self, ParseError> {
        const CTX : &str = "Mixture";
        let line = tokens.line();
        tokens.expect_open(CTX)?;
        let (mut ndims, mut ncomponents, mut proportions, mut gamma) = (None, None, None, None);
        let mut components : Option<Vec<Box<dyn Distribution>>> = None;
        while let Some(key) = tokens.next_key(CTX)? {
            match &key[..] {
                "ndimensions" => ndims = Some(tokens.integer(CTX)?),
                "ncomponents" => ncomponents = Some(tokens.integer(CTX)?),
                "mixing-proportions" => proportions = Some(tokens.numbers(CTX)?),
                "regularization-gammas" => gamma = Some(tokens.numbers(CTX)?),
                "components" => {
                    tokens.expect_open(CTX)?;
                    let mut cs = Vec::new();
                    while tokens.peek() != Some(&Token::Close) {
                        cs.push(model::read_distribution(tokens)?);
                    }
                    tokens.expect_close(CTX)?;
                    components = Some(cs);
                },
                other => return Err(tokens.unexpected(
                    CTX,
                    "ndimensions, ncomponents, mixing-proportions, regularization-gammas or components",
                    &Token::Word(other.to_string())
                ))
            }
        }
        let invalid = |message : String| ParseError::Invalid { context : CTX.to_string(), message, line };
        let components = components.ok_or_else(|| invalid(String::from("missing components")))?;
        let n = components.len();
        if let Some(nc) = ncomponents {
            if nc != n {
                return Err(invalid(format!("ncomponents is {} but {} components were given", nc, n)));
            }
        }
        if let (Some(d), Some(c)) = (ndims, components.first()) {
            if c.ndims() != d {
                return Err(invalid(format!("ndimensions is {} but components have {}", d, c.ndims())));
            }
        }
        let proportions = proportions.unwrap_or_else(|| vec![1.0 / n as f64; n]);
        let gamma = gamma.unwrap_or_else(|| vec![1.0; n]);
        Mixture::regularized(components, proportions, gamma).map_err(|e| invalid(e.to_string()))
    }

}
