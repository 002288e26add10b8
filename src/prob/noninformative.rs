use nalgebra::*;
use rand::RngCore;
use crate::prob::*;
use crate::model::TextFormat;
use crate::model::parse::*;

/// Flat, improper density used as the neutral element of lambda products and
/// as the message sent when nothing is known. Its density is 1 everywhere; it
/// has no moments, no cdf, no effective support and cannot be sampled.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Noninformative;

impl Distribution for Noninformative {

    fn ndims(&self) -> usize {
        1
    }

    fn density(&self, _x : &DVector<f64>) -> Result<f64, ProbError> {
        Ok(1.0)
    }

    fn sample(&self, _rng : &mut dyn RngCore) -> Result<DVector<f64>, ProbError> {
        Err(ProbError::Unsupported { op : "sample", kind : Kind::Noninformative })
    }

    fn expected_value(&self) -> Result<f64, ProbError> {
        Err(ProbError::Unsupported { op : "expected_value", kind : Kind::Noninformative })
    }

    fn sqrt_variance(&self) -> Result<f64, ProbError> {
        Err(ProbError::Unsupported { op : "sqrt_variance", kind : Kind::Noninformative })
    }

    fn effective_support(&self, _epsilon : f64) -> Result<(f64, f64), ProbError> {
        Err(ProbError::SupportNotWellDefined(Kind::Noninformative))
    }

    fn clone_box(&self) -> Box<dyn Distribution> {
        Box::new(*self)
    }

}

crate::unconditional!(Noninformative, Kind::Noninformative);

impl TextFormat for Noninformative {

    fn to_text(&self, _indent : &str) -> String {
        String::from("Noninformative { }")
    }

    fn from_text(tokens : &mut Tokens) -> Result<Self, ParseError> {
        tokens.expect_open("Noninformative")?;
        tokens.expect_close("Noninformative")?;
        Ok(Noninformative)
    }

}
