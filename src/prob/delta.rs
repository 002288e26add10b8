use nalgebra::*;
use rand::RngCore;
use crate::prob::*;
use crate::model::TextFormat;
use crate::model::parse::*;

/// Point mass at a continuous value, used as the pi, lambda and posterior of an
/// observed continuous variable. density() reports the mass (1 at the support
/// point, 0 elsewhere).
#[derive(Debug, Clone, PartialEq)]
pub struct GaussianDelta {
    point : DVector<f64>
}

impl GaussianDelta {

    pub fn new(x : f64) -> Result<Self, ProbError> {
        Self::at(DVector::from_element(1, x))
    }

    pub fn at(point : DVector<f64>) -> Result<Self, ProbError> {
        if point.nrows() == 0 || point.iter().any(|v| !v.is_finite()) {
            return Err(ProbError::InvalidParameter(String::from("Delta support point must be finite")));
        }
        Ok(Self { point })
    }

    pub fn point(&self) -> &DVector<f64> {
        &self.point
    }

    fn scalar(&self) -> Result<f64, ProbError> {
        if self.point.nrows() == 1 {
            Ok(self.point[0])
        } else {
            Err(ProbError::Dimension { expected : 1, found : self.point.nrows() })
        }
    }

}

impl Distribution for GaussianDelta {

    fn ndims(&self) -> usize {
        self.point.nrows()
    }

    fn density(&self, x : &DVector<f64>) -> Result<f64, ProbError> {
        check_dims(x, self.point.nrows())?;
        Ok(if x == &self.point { 1.0 } else { 0.0 })
    }

    fn cdf(&self, x : f64) -> Result<f64, ProbError> {
        Ok(if x < self.scalar()? { 0.0 } else { 1.0 })
    }

    fn sample(&self, _rng : &mut dyn RngCore) -> Result<DVector<f64>, ProbError> {
        Ok(self.point.clone())
    }

    fn expected_value(&self) -> Result<f64, ProbError> {
        self.scalar()
    }

    fn sqrt_variance(&self) -> Result<f64, ProbError> {
        self.scalar().map(|_| 0.0)
    }

    fn effective_support(&self, _epsilon : f64) -> Result<(f64, f64), ProbError> {
        let x = self.scalar()?;
        Ok((x, x))
    }

    fn clone_box(&self) -> Box<dyn Distribution> {
        Box::new(self.clone())
    }

}

crate::unconditional!(GaussianDelta, Kind::GaussianDelta);

impl TextFormat for GaussianDelta {

    fn to_text(&self, _indent : &str) -> String {
        format!("GaussianDelta {{ support-point {} }}", format_numbers(self.point.as_slice()))
    }

    fn from_text(tokens : &mut Tokens) -> Result<Self, ParseError> {
        const CTX : &str = "GaussianDelta";
        let line = tokens.line();
        tokens.expect_open(CTX)?;
        let mut point = None;
        while let Some(key) = tokens.next_key(CTX)? {
            match &key[..] {
                "support-point" => point = Some(tokens.numbers(CTX)?),
                other => return Err(tokens.unexpected(CTX, "support-point", &Token::Word(other.to_string())))
            }
        }
        let point = point.ok_or_else(|| ParseError::Invalid {
            context : CTX.to_string(), message : String::from("missing support-point"), line
        })?;
        GaussianDelta::at(DVector::from_vec(point))
            .map_err(|e| ParseError::Invalid { context : CTX.to_string(), message : e.to_string(), line })
    }

}

/// Point mass at one state of a discrete variable.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscreteDelta {
    dimensions : Vec<usize>,
    point : Vec<usize>
}

impl DiscreteDelta {

    pub fn new(dimensions : Vec<usize>, point : Vec<usize>) -> Result<Self, ProbError> {
        if dimensions.is_empty() || dimensions.len() != point.len() {
            return Err(ProbError::Dimension { expected : dimensions.len(), found : point.len() });
        }
        if point.iter().zip(dimensions.iter()).any(|(p, n)| p >= n) {
            return Err(ProbError::InvalidParameter(format!(
                "Support point {:?} outside dimensions {:?}", point, dimensions
            )));
        }
        Ok(Self { dimensions, point })
    }

    /// Point mass on one state of a univariate variable with nstates states.
    pub fn state(nstates : usize, state : usize) -> Result<Self, ProbError> {
        Self::new(vec![nstates], vec![state])
    }

    pub fn dimensions(&self) -> &[usize] {
        &self.dimensions
    }

    pub fn point(&self) -> &[usize] {
        &self.point
    }

    fn nstates(&self) -> Option<usize> {
        if self.dimensions.len() == 1 {
            Some(self.dimensions[0])
        } else {
            None
        }
    }

    fn scalar(&self) -> Result<f64, ProbError> {
        if self.point.len() == 1 {
            Ok(self.point[0] as f64)
        } else {
            Err(ProbError::Dimension { expected : 1, found : self.point.len() })
        }
    }

}

impl Distribution for DiscreteDelta {

    fn ndims(&self) -> usize {
        self.dimensions.len()
    }

    fn density(&self, x : &DVector<f64>) -> Result<f64, ProbError> {
        check_dims(x, self.dimensions.len())?;
        let hit = x.iter().zip(self.point.iter()).all(|(a, b)| *a == *b as f64);
        Ok(if hit { 1.0 } else { 0.0 })
    }

    fn cdf(&self, x : f64) -> Result<f64, ProbError> {
        Ok(if x < self.scalar()? { 0.0 } else { 1.0 })
    }

    fn sample(&self, _rng : &mut dyn RngCore) -> Result<DVector<f64>, ProbError> {
        Ok(DVector::from_iterator(self.point.len(), self.point.iter().map(|p| *p as f64)))
    }

    fn expected_value(&self) -> Result<f64, ProbError> {
        self.scalar()
    }

    fn sqrt_variance(&self) -> Result<f64, ProbError> {
        self.scalar().map(|_| 0.0)
    }

    fn effective_support(&self, _epsilon : f64) -> Result<(f64, f64), ProbError> {
        let x = self.scalar()?;
        Ok((x, x))
    }

    fn clone_box(&self) -> Box<dyn Distribution> {
        Box::new(self.clone())
    }

}

crate::unconditional!(DiscreteDelta, Kind::DiscreteDelta, DiscreteDelta::nstates);

impl TextFormat for DiscreteDelta {

    fn to_text(&self, _indent : &str) -> String {
        format!(
            "DiscreteDelta {{ dimensions {} support-point {} }}",
            format_integers(&self.dimensions),
            format_integers(&self.point)
        )
    }

    fn from_text(tokens : &mut Tokens) -> Result<Self, ParseError> {
        const CTX : &str = "DiscreteDelta";
        let line = tokens.line();
        tokens.expect_open(CTX)?;
        let (mut dims, mut point) = (None, None);
        while let Some(key) = tokens.next_key(CTX)? {
            match &key[..] {
                "dimensions" => dims = Some(tokens.integers(CTX)?),
                "support-point" => point = Some(tokens.integers(CTX)?),
                other => return Err(tokens.unexpected(CTX, "dimensions or support-point", &Token::Word(other.to_string())))
            }
        }
        let invalid = |message : String| ParseError::Invalid { context : CTX.to_string(), message, line };
        let dims = dims.ok_or_else(|| invalid(String::from("missing dimensions")))?;
        let point = point.ok_or_else(|| invalid(String::from("missing support-point")))?;
        DiscreteDelta::new(dims, point).map_err(|e| invalid(e.to_string()))
    }

}
