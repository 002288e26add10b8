use nalgebra::*;
use rand::{Rng, RngCore};
use crate::prob::*;
use crate::model::TextFormat;
use crate::model::parse::*;

/// Uniform density over [a, b].
#[derive(Debug, Clone, PartialEq)]
pub struct Uniform {
    a : f64,
    b : f64
}

impl Uniform {

    pub fn new(a : f64, b : f64) -> Result<Self, ProbError> {
        if !(a < b) || !a.is_finite() || !b.is_finite() {
            return Err(ProbError::InvalidParameter(format!("Uniform bounds [{}, {}]", a, b)));
        }
        Ok(Self { a, b })
    }

    pub fn bounds(&self) -> (f64, f64) {
        (self.a, self.b)
    }

}

impl Distribution for Uniform {

    fn ndims(&self) -> usize {
        1
    }

    fn density(&self, x : &DVector<f64>) -> Result<f64, ProbError> {
        check_dims(x, 1)?;
        if x[0] < self.a || x[0] > self.b {
            Ok(0.0)
        } else {
            Ok(1.0 / (self.b - self.a))
        }
    }

    fn cdf(&self, x : f64) -> Result<f64, ProbError> {
        Ok(((x - self.a) / (self.b - self.a)).max(0.0).min(1.0))
    }

    fn sample(&self, rng : &mut dyn RngCore) -> Result<DVector<f64>, ProbError> {
        let u : f64 = rng.gen();
        Ok(DVector::from_element(1, self.a + u * (self.b - self.a)))
    }

    fn expected_value(&self) -> Result<f64, ProbError> {
        Ok(0.5 * (self.a + self.b))
    }

    fn sqrt_variance(&self) -> Result<f64, ProbError> {
        Ok((self.b - self.a) / (2.0 * 3.0f64.sqrt()))
    }

    fn effective_support(&self, _epsilon : f64) -> Result<(f64, f64), ProbError> {
        Ok((self.a, self.b))
    }

    fn clone_box(&self) -> Box<dyn Distribution> {
        Box::new(self.clone())
    }

}

crate::unconditional!(Uniform, Kind::Uniform);

impl TextFormat for Uniform {

    fn to_text(&self, _indent : &str) -> String {
        format!("Uniform {{ a {} b {} }}", self.a, self.b)
    }

    fn from_text(tokens : &mut Tokens) -> Result<Self, ParseError> {
        const CTX : &str = "Uniform";
        let line = tokens.line();
        tokens.expect_open(CTX)?;
        let (mut a, mut b) = (None, None);
        while let Some(key) = tokens.next_key(CTX)? {
            match &key[..] {
                "a" => a = Some(tokens.number(CTX)?),
                "b" => b = Some(tokens.number(CTX)?),
                other => return Err(tokens.unexpected(CTX, "a or b", &Token::Word(other.to_string())))
            }
        }
        let invalid = |message : String| ParseError::Invalid { context : CTX.to_string(), message, line };
        match (a, b) {
            (Some(a), Some(b)) => Uniform::new(a, b).map_err(|e| invalid(e.to_string())),
            _ => Err(invalid(String::from("both bounds a and b are required")))
        }
    }

}
