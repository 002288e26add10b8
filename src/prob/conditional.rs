use nalgebra::*;
use rand::RngCore;
use std::any::Any;
use crate::prob::*;
use crate::model::TextFormat;
use crate::model::parse::*;

/// Linear-Gaussian conditional x | c ~ N(a'c + b, v) for a univariate child and
/// one multiplier per parent dimension.
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionalGaussian {

    multipliers : DVector<f64>,

    offset : f64,

    variance : f64

}

impl ConditionalGaussian {

    pub fn new(multipliers : DVector<f64>, offset : f64, variance : f64) -> Result<Self, ProbError> {
        if !(variance > 0.0) || !variance.is_finite() {
            return Err(ProbError::InvalidParameter(format!("Conditional variance {}", variance)));
        }
        if !offset.is_finite() || multipliers.iter().any(|a| !a.is_finite()) {
            return Err(ProbError::InvalidParameter(String::from("Non-finite conditional mean parameters")));
        }
        Ok(Self { multipliers, offset, variance })
    }

    /// Child depending on a single parent: x | y ~ N(a y + b, v).
    pub fn single(a : f64, b : f64, variance : f64) -> Result<Self, ProbError> {
        Self::new(DVector::from_element(1, a), b, variance)
    }

    pub fn multipliers(&self) -> &DVector<f64> {
        &self.multipliers
    }

    pub fn offset(&self) -> f64 {
        self.offset
    }

    pub fn variance(&self) -> f64 {
        self.variance
    }

    pub fn conditional_mean(&self, c : &DVector<f64>) -> Result<f64, ProbError> {
        check_dims(c, self.multipliers.nrows())?;
        Ok(self.multipliers.dot(c) + self.offset)
    }

}

impl ConditionalDistribution for ConditionalGaussian {

    fn kind(&self) -> Kind {
        Kind::ConditionalGaussian
    }

    fn ndims_child(&self) -> usize {
        1
    }

    fn ndims_parent(&self) -> usize {
        self.multipliers.nrows()
    }

    fn density_given(&self, c : &DVector<f64>) -> Result<Box<dyn Distribution>, ProbError> {
        Ok(Box::new(Gaussian::new(self.conditional_mean(c)?, self.variance.sqrt())?))
    }

    fn sample_given(&self, c : &DVector<f64>, rng : &mut dyn RngCore) -> Result<DVector<f64>, ProbError> {
        Gaussian::new(self.conditional_mean(c)?, self.variance.sqrt())?.sample(rng)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn clone_conditional(&self) -> Box<dyn ConditionalDistribution> {
        Box::new(self.clone())
    }

    fn into_conditional(self : Box<Self>) -> Box<dyn ConditionalDistribution> {
        self
    }

}

impl TextFormat for ConditionalGaussian {

    fn to_text(&self, indent : &str) -> String {
        let mut s = format!("ConditionalGaussian\n{}{{\n", indent);
        s += &format!("{}\tconditional-mean-multiplier {}\n", indent, format_numbers(self.multipliers.as_slice()));
        s += &format!("{}\tconditional-mean-offset {}\n", indent, format_numbers(&[self.offset]));
        s += &format!("{}\tconditional-variance {}\n", indent, format_numbers(&[self.variance]));
        s + indent + "}"
    }

    fn from_text(tokens : &mut Tokens) -> Result<Self, ParseError> {
        const CTX : &str = "ConditionalGaussian";
        let line = tokens.line();
        tokens.expect_open(CTX)?;
        let (mut a, mut b, mut v) = (None, None, None);
        while let Some(key) = tokens.next_key(CTX)? {
            match &key[..] {
                "conditional-mean-multiplier" => a = Some(tokens.numbers(CTX)?),
                "conditional-mean-offset" => b = Some(tokens.numbers(CTX)?),
                "conditional-variance" => v = Some(tokens.numbers(CTX)?),
                other => return Err(tokens.unexpected(
                    CTX,
                    "conditional-mean-multiplier, conditional-mean-offset or conditional-variance",
                    &Token::Word(other.to_string())
                ))
            }
        }
        let invalid = |message : String| ParseError::Invalid { context : CTX.to_string(), message, line };
        let a = a.ok_or_else(|| invalid(String::from("missing conditional-mean-multiplier")))?;
        let b = match b.as_deref() {
            None => 0.0,
            Some([b]) => *b,
            Some(other) => return Err(invalid(format!("one conditional-mean-offset expected, found {}", other.len())))
        };
        let v = match v.as_deref() {
            Some([v]) => *v,
            _ => return Err(invalid(String::from("a single conditional-variance is required")))
        };
        ConditionalGaussian::new(DVector::from_vec(a), b, v).map_err(|e| invalid(e.to_string()))
    }

}

/// Conditional probability table for a univariate discrete child. There is one
/// row per configuration of the (discrete) parents, ordered row-major with the
/// last parent varying fastest; each row is a distribution over child states.
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionalDiscrete {

    nstates : usize,

    parent_dims : Vec<usize>,

    rows : Vec<Vec<f64>>

}

impl ConditionalDiscrete {

    pub fn new(nstates : usize, parent_dims : Vec<usize>, rows : Vec<Vec<f64>>) -> Result<Self, ProbError> {
        if nstates == 0 || parent_dims.is_empty() || parent_dims.iter().any(|d| *d == 0) {
            return Err(ProbError::InvalidParameter(format!(
                "Conditional table with {} states and parent dimensions {:?}", nstates, parent_dims
            )));
        }
        let nrows : usize = parent_dims.iter().product();
        if rows.len() != nrows {
            return Err(ProbError::Dimension { expected : nrows, found : rows.len() });
        }
        let mut rows = rows;
        for row in rows.iter_mut() {
            if row.len() != nstates {
                return Err(ProbError::Dimension { expected : nstates, found : row.len() });
            }
            if row.iter().any(|p| !(*p >= 0.0) || !p.is_finite()) {
                return Err(ProbError::InvalidParameter(String::from("Negative or non-finite probability")));
            }
            normalize(row)?;
        }
        Ok(Self { nstates, parent_dims, rows })
    }

    pub fn parent_dims(&self) -> &[usize] {
        &self.parent_dims
    }

    pub fn nrows(&self) -> usize {
        self.rows.len()
    }

    /// Probability of child state x given the parent configuration with linear
    /// index row.
    pub fn probability(&self, row : usize, x : usize) -> f64 {
        self.rows.get(row).and_then(|r| r.get(x)).cloned().unwrap_or(0.0)
    }

    /// Parent states for the configuration with linear index row.
    pub fn configuration(&self, mut row : usize) -> Vec<usize> {
        let mut states = vec![0; self.parent_dims.len()];
        for (i, n) in self.parent_dims.iter().enumerate().rev() {
            states[i] = row % n;
            row /= n;
        }
        states
    }

    pub fn row_index(&self, c : &DVector<f64>) -> Result<usize, ProbError> {
        check_dims(c, self.parent_dims.len())?;
        let mut ix = 0;
        for (v, n) in c.iter().zip(self.parent_dims.iter()) {
            if v.fract() != 0.0 || *v < 0.0 || *v >= *n as f64 {
                return Err(ProbError::InvalidParameter(format!("{} is not a parent state", v)));
            }
            ix = ix * n + *v as usize;
        }
        Ok(ix)
    }

}

impl ConditionalDistribution for ConditionalDiscrete {

    fn kind(&self) -> Kind {
        Kind::ConditionalDiscrete
    }

    fn ndims_child(&self) -> usize {
        1
    }

    fn ndims_parent(&self) -> usize {
        self.parent_dims.len()
    }

    fn nstates(&self) -> Option<usize> {
        Some(self.nstates)
    }

    fn density_given(&self, c : &DVector<f64>) -> Result<Box<dyn Distribution>, ProbError> {
        let row = self.row_index(c)?;
        Ok(Box::new(Discrete::univariate(self.rows[row].clone())?))
    }

    fn density_at(&self, x : &DVector<f64>, c : &DVector<f64>) -> Result<f64, ProbError> {
        check_dims(x, 1)?;
        let row = self.row_index(c)?;
        if x[0].fract() != 0.0 || x[0] < 0.0 {
            return Ok(0.0);
        }
        Ok(self.probability(row, x[0] as usize))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn clone_conditional(&self) -> Box<dyn ConditionalDistribution> {
        Box::new(self.clone())
    }

    fn into_conditional(self : Box<Self>) -> Box<dyn ConditionalDistribution> {
        self
    }

}

impl TextFormat for ConditionalDiscrete {

    fn to_text(&self, indent : &str) -> String {
        let mut s = format!("ConditionalDiscrete\n{}{{\n", indent);
        s += &format!("{}\tdimensions-child {}\n", indent, format_integers(&[self.nstates]));
        s += &format!("{}\tdimensions-parents {}\n", indent, format_integers(&self.parent_dims));
        s += &format!("{}\tprobabilities\n{}\t{{\n", indent, indent);
        for row in self.rows.iter() {
            let line : Vec<String> = row.iter().map(|p| p.to_string()).collect();
            s += &format!("{}\t\t{}\n", indent, line.join(" "));
        }
        s += &format!("{}\t}}\n", indent);
        s + indent + "}"
    }

    fn from_text(tokens : &mut Tokens) -> Result<Self, ParseError> {
        const CTX : &str = "ConditionalDiscrete";
        let line = tokens.line();
        tokens.expect_open(CTX)?;
        let (mut child, mut parents, mut probs) = (None, None, None);
        while let Some(key) = tokens.next_key(CTX)? {
            match &key[..] {
                "dimensions-child" => child = Some(tokens.integers(CTX)?),
                "dimensions-parents" => parents = Some(tokens.integers(CTX)?),
                "probabilities" => probs = Some(tokens.numbers(CTX)?),
                other => return Err(tokens.unexpected(
                    CTX,
                    "dimensions-child, dimensions-parents or probabilities",
                    &Token::Word(other.to_string())
                ))
            }
        }
        let invalid = |message : String| ParseError::Invalid { context : CTX.to_string(), message, line };
        let nstates = match child.as_deref() {
            Some([n]) => *n,
            _ => return Err(invalid(String::from("dimensions-child must name a single dimension")))
        };
        let parents = parents.ok_or_else(|| invalid(String::from("missing dimensions-parents")))?;
        let probs = probs.ok_or_else(|| invalid(String::from("missing probabilities")))?;
        let nrows : usize = parents.iter().product();
        if probs.len() != nrows * nstates {
            return Err(invalid(format!("expected {} probabilities, found {}", nrows * nstates, probs.len())));
        }
        let rows = probs.chunks(nstates.max(1)).map(|r| r.to_vec()).collect();
        ConditionalDiscrete::new(nstates, parents, rows).map_err(|e| invalid(e.to_string()))
    }

}

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn conditioning_agrees_with_joint_evaluation() {
        let cg = ConditionalGaussian::new(DVector::from_vec(vec![2.0, -1.0]), 0.5, 4.0).unwrap();
        let c = DVector::from_vec(vec![1.0, 3.0]);
        let x = DVector::from_element(1, 0.2);
        let direct = cg.density_at(&x, &c).unwrap();
        let given = cg.density_given(&c).unwrap().density(&x).unwrap();
        assert!((direct - given).abs() < 1e-12);
        assert!((cg.density_given(&c).unwrap().expected_value().unwrap() + 0.5).abs() < 1e-12);

        let cd = ConditionalDiscrete::new(2, vec![2, 2], vec![
            vec![0.9, 0.1], vec![0.5, 0.5], vec![0.3, 0.7], vec![0.0, 1.0]
        ]).unwrap();
        let c = DVector::from_vec(vec![1.0, 0.0]);
        let x = DVector::from_element(1, 1.0);
        assert!((cd.density_at(&x, &c).unwrap() - 0.7).abs() < 1e-12);
        assert!((cd.density_given(&c).unwrap().density(&x).unwrap() - 0.7).abs() < 1e-12);
        assert_eq!(cd.configuration(2), vec![1, 0]);
    }

}
