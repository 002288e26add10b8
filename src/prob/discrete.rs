use nalgebra::*;
use rand::{Rng, RngCore};
use crate::prob::*;
use crate::fit::{self, Fit, FitParams};
use crate::model::TextFormat;
use crate::model::parse::*;

/// Probability table over one or more discrete dimensions. Probabilities are
/// stored row-major: the last dimension varies fastest. A point x is a vector
/// of integer-valued state indices.
#[derive(Debug, Clone, PartialEq)]
pub struct Discrete {

    dimensions : Vec<usize>,

    probabilities : Vec<f64>

}

impl Discrete {

    /// Builds the table, normalizing the probabilities so they sum to one.
    pub fn new(dimensions : Vec<usize>, mut probabilities : Vec<f64>) -> Result<Self, ProbError> {
        if dimensions.is_empty() || dimensions.iter().any(|d| *d == 0) {
            return Err(ProbError::InvalidParameter(format!("Discrete dimensions {:?}", dimensions)));
        }
        let size : usize = dimensions.iter().product();
        if probabilities.len() != size {
            return Err(ProbError::Dimension { expected : size, found : probabilities.len() });
        }
        if probabilities.iter().any(|p| !(*p >= 0.0) || !p.is_finite()) {
            return Err(ProbError::InvalidParameter(String::from("Negative or non-finite probability")));
        }
        normalize(&mut probabilities)?;
        Ok(Self { dimensions, probabilities })
    }

    /// Univariate distribution over probabilities.len() states.
    pub fn univariate(probabilities : Vec<f64>) -> Result<Self, ProbError> {
        Self::new(vec![probabilities.len()], probabilities)
    }

    /// Equal mass on every state.
    pub fn uniform(nstates : usize) -> Result<Self, ProbError> {
        Self::univariate(vec![1.0; nstates])
    }

    pub fn dimensions(&self) -> &[usize] {
        &self.dimensions
    }

    pub fn probabilities(&self) -> &[f64] {
        &self.probabilities
    }

    pub fn probability(&self, state : usize) -> f64 {
        self.probabilities.get(state).cloned().unwrap_or(0.0)
    }

    fn nstates(&self) -> Option<usize> {
        if self.dimensions.len() == 1 {
            Some(self.dimensions[0])
        } else {
            None
        }
    }

    fn require_univariate(&self) -> Result<(), ProbError> {
        if self.dimensions.len() == 1 {
            Ok(())
        } else {
            Err(ProbError::Dimension { expected : 1, found : self.dimensions.len() })
        }
    }

    /// Linear index of x in the table, or None when x is not a valid state.
    pub fn index(&self, x : &DVector<f64>) -> Option<usize> {
        if x.nrows() != self.dimensions.len() {
            return None;
        }
        let mut ix = 0;
        for (v, n) in x.iter().zip(self.dimensions.iter()) {
            if v.fract() != 0.0 || *v < 0.0 || *v >= *n as f64 {
                return None;
            }
            ix = ix * n + *v as usize;
        }
        Some(ix)
    }

    fn state_vector(&self, mut ix : usize) -> DVector<f64> {
        let mut x = DVector::zeros(self.dimensions.len());
        for (i, n) in self.dimensions.iter().enumerate().rev() {
            x[i] = (ix % n) as f64;
            ix /= n;
        }
        x
    }

}

impl Distribution for Discrete {

    fn ndims(&self) -> usize {
        self.dimensions.len()
    }

    fn density(&self, x : &DVector<f64>) -> Result<f64, ProbError> {
        check_dims(x, self.dimensions.len())?;
        Ok(self.index(x).map(|ix| self.probabilities[ix]).unwrap_or(0.0))
    }

    fn cdf(&self, x : f64) -> Result<f64, ProbError> {
        self.require_univariate()?;
        if x < 0.0 {
            return Ok(0.0);
        }
        let last = (x.floor() as usize).min(self.probabilities.len() - 1);
        Ok(self.probabilities[..=last].iter().sum::<f64>().min(1.0))
    }

    fn sample(&self, rng : &mut dyn RngCore) -> Result<DVector<f64>, ProbError> {
        let u : f64 = rng.gen();
        let mut acc = 0.0;
        for (ix, p) in self.probabilities.iter().enumerate() {
            acc += p;
            if u < acc {
                return Ok(self.state_vector(ix));
            }
        }
        let last = self.probabilities.iter().rposition(|p| *p > 0.0).unwrap_or(0);
        Ok(self.state_vector(last))
    }

    fn expected_value(&self) -> Result<f64, ProbError> {
        self.require_univariate()?;
        Ok(self.probabilities.iter().enumerate().map(|(i, p)| i as f64 * p).sum())
    }

    fn sqrt_variance(&self) -> Result<f64, ProbError> {
        let m = self.expected_value()?;
        let var : f64 = self.probabilities.iter()
            .enumerate()
            .map(|(i, p)| p * (i as f64 - m).powi(2))
            .sum();
        Ok(var.sqrt())
    }

    fn effective_support(&self, epsilon : f64) -> Result<(f64, f64), ProbError> {
        self.require_univariate()?;
        if !(epsilon > 0.0 && epsilon < 1.0) {
            return Err(ProbError::InvalidParameter(format!("Support epsilon {} outside (0, 1)", epsilon)));
        }
        let tail = epsilon / 2.0;
        let n = self.probabilities.len();
        let mut acc = 0.0;
        let mut lo = 0;
        for (i, p) in self.probabilities.iter().enumerate() {
            acc += p;
            if acc > tail {
                lo = i;
                break;
            }
        }
        acc = 0.0;
        let mut hi = n - 1;
        for (i, p) in self.probabilities.iter().enumerate().rev() {
            acc += p;
            if acc > tail {
                hi = i;
                break;
            }
        }
        Ok((lo as f64, hi as f64))
    }

    /// Weighted relative frequencies.
    fn fit(
        &mut self,
        data : &[DVector<f64>],
        weights : Option<&[f64]>,
        _params : &FitParams
    ) -> Result<Fit, ProbError> {
        let w = fit::data_weights(data.len(), weights)?;
        let mut counts = vec![0.0; self.probabilities.len()];
        for (x, wk) in data.iter().zip(w.iter()) {
            check_dims(x, self.dimensions.len())?;
            let ix = self.index(x).ok_or_else(|| {
                ProbError::InvalidParameter(format!("{} is not a state of the table", x.transpose()))
            })?;
            counts[ix] += wk;
        }
        normalize(&mut counts)?;
        self.probabilities = counts;
        let mut nll = 0.0;
        for (x, wk) in data.iter().zip(w.iter()) {
            if *wk > 0.0 {
                nll -= wk * self.log_density(x)?;
            }
        }
        Ok(Fit::Fitted { neg_log_likelihood : nll, iterations : 1 })
    }

    fn clone_box(&self) -> Box<dyn Distribution> {
        Box::new(self.clone())
    }

}

crate::unconditional!(Discrete, Kind::Discrete, Discrete::nstates);

impl TextFormat for Discrete {

    fn to_text(&self, indent : &str) -> String {
        if self.dimensions.len() == 1 {
            return format!(
                "Discrete {{ dimensions {} probabilities {} }}",
                format_integers(&self.dimensions),
                format_numbers(&self.probabilities)
            );
        }
        let mut s = format!("Discrete\n{}{{\n", indent);
        s += &format!("{}\tdimensions {}\n", indent, format_integers(&self.dimensions));
        s += &format!("{}\tprobabilities\n{}\t{{\n", indent, indent);
        let row = self.dimensions[self.dimensions.len() - 1];
        for chunk in self.probabilities.chunks(row) {
            let line : Vec<String> = chunk.iter().map(|p| p.to_string()).collect();
            s += &format!("{}\t\t{}\n", indent, line.join(" "));
        }
        s += &format!("{}\t}}\n", indent);
        s + indent + "}"
    }

    fn from_text(tokens : &mut Tokens) -> Result<Self, ParseError> {
        const CTX : &str = "Discrete";
        let line = tokens.line();
        tokens.expect_open(CTX)?;
        let (mut dims, mut probs) = (None, None);
        while let Some(key) = tokens.next_key(CTX)? {
            match &key[..] {
                "dimensions" => dims = Some(tokens.integers(CTX)?),
                "probabilities" => probs = Some(tokens.numbers(CTX)?),
                other => return Err(tokens.unexpected(CTX, "dimensions or probabilities", &Token::Word(other.to_string())))
            }
        }
        let invalid = |message : String| ParseError::Invalid { context : CTX.to_string(), message, line };
        let probs = probs.ok_or_else(|| invalid(String::from("missing probabilities")))?;
        let dims = dims.unwrap_or_else(|| vec![probs.len()]);
        Discrete::new(dims, probs).map_err(|e| invalid(e.to_string()))
    }

}
