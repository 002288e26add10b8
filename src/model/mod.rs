use std::fs::File;
use std::io::Read;
use std::path::Path;
use crate::prob::*;

/// Tokenizer and helpers for the brace-delimited text format.
pub mod parse;

use parse::*;

/// Text representation shared by every distribution. A block opens with the
/// type name followed by '{', holds whitespace-separated key-value pairs (values
/// are numbers, '{ ... }' lists or nested blocks) and closes with '}'. Reading
/// a block either yields a complete distribution or fails without side effects
/// beyond the consumed tokens.
pub trait TextFormat {

    /// Writes the block, starting with the type name. Lines after the first are
    /// prefixed by indent, so nested blocks line up with their parent.
    fn to_text(&self, indent : &str) -> String;

    /// Reads the block body, starting at the opening brace (the type name has
    /// already been consumed by the caller).
    fn from_text(tokens : &mut Tokens) -> Result<Self, ParseError>
    where
        Self : Sized;

}

/// Reads an unconditional distribution, dispatching on its type name.
pub fn read_distribution(tokens : &mut Tokens) -> Result<Box<dyn Distribution>, ParseError> {
    let line = tokens.line();
    let name = tokens.word("distribution type")?;
    let d : Box<dyn Distribution> = match &name[..] {
        "Gaussian" => Box::new(Gaussian::from_text(tokens)?),
        "GaussianDelta" => Box::new(GaussianDelta::from_text(tokens)?),
        "Discrete" => Box::new(Discrete::from_text(tokens)?),
        "DiscreteDelta" => Box::new(DiscreteDelta::from_text(tokens)?),
        "Uniform" => Box::new(Uniform::from_text(tokens)?),
        "Noninformative" => Box::new(Noninformative::from_text(tokens)?),
        "Mixture" => Box::new(Mixture::from_text(tokens)?),
        "ConditionalGaussian" | "ConditionalDiscrete" => {
            return Err(ParseError::Unexpected {
                context : String::from("distribution"),
                expected : String::from("an unconditional distribution"),
                found : name,
                line
            });
        },
        _ => return Err(ParseError::UnknownDistribution { name, line })
    };
    Ok(d)
}

/// Reads either a conditional or an unconditional distribution.
pub fn read_conditional(tokens : &mut Tokens) -> Result<Box<dyn ConditionalDistribution>, ParseError> {
    let next = match tokens.peek() {
        Some(Token::Word(w)) => w.clone(),
        _ => String::new()
    };
    match &next[..] {
        "ConditionalGaussian" => {
            tokens.word("distribution type")?;
            Ok(Box::new(ConditionalGaussian::from_text(tokens)?))
        },
        "ConditionalDiscrete" => {
            tokens.word("distribution type")?;
            Ok(Box::new(ConditionalDiscrete::from_text(tokens)?))
        },
        _ => Ok(read_distribution(tokens)?.into_conditional())
    }
}

/// Parses text holding exactly one unconditional distribution.
pub fn parse_distribution(text : &str) -> Result<Box<dyn Distribution>, ParseError> {
    let mut tokens = Tokens::new(text);
    let d = read_distribution(&mut tokens)?;
    tokens.expect_end()?;
    Ok(d)
}

pub fn parse_conditional(text : &str) -> Result<Box<dyn ConditionalDistribution>, ParseError> {
    let mut tokens = Tokens::new(text);
    let d = read_conditional(&mut tokens)?;
    tokens.expect_end()?;
    Ok(d)
}

/// One variable of a network description.
#[derive(Debug, Clone)]
pub struct VariableSpec {

    pub name : String,

    pub parents : Vec<String>,

    pub distribution : Box<dyn ConditionalDistribution>

}

/// Declarative description of a belief network, read from text such as:
///
/// ```text
/// belief-network chain
/// {
///     variable x { distribution Gaussian { mean 0 std-deviation 1 } }
///     variable y
///     {
///         parents { x }
///         distribution ConditionalGaussian
///         {
///             conditional-mean-multiplier { 2 }
///             conditional-mean-offset { 0 }
///             conditional-variance { 1 }
///         }
///     }
/// }
/// ```
///
/// Variables may be listed in any order; structure is checked when the
/// description is turned into a BeliefNetwork.
#[derive(Debug, Clone)]
pub struct NetworkSpec {

    pub name : String,

    pub variables : Vec<VariableSpec>

}

impl NetworkSpec {

    pub fn load_from_path<P>(path : P) -> anyhow::Result<Self>
    where
        P : AsRef<Path>
    {
        let f = File::open(path)?;
        Self::load(f)
    }

    pub fn load<R>(mut reader : R) -> anyhow::Result<Self>
    where
        R : Read
    {
        let mut content = String::new();
        reader.read_to_string(&mut content)?;
        Ok(Self::parse(&content)?)
    }

    pub fn parse(text : &str) -> Result<Self, ParseError> {
        const CTX : &str = "belief-network";
        let mut tokens = Tokens::new(text);
        tokens.keyword(CTX, "belief-network")?;
        let name = tokens.word(CTX)?;
        tokens.expect_open(CTX)?;
        let mut variables = Vec::new();
        while let Some(key) = tokens.next_key(CTX)? {
            if key != "variable" {
                return Err(tokens.unexpected(CTX, "variable", &Token::Word(key)));
            }
            variables.push(read_variable(&mut tokens)?);
        }
        tokens.expect_end()?;
        Ok(Self { name, variables })
    }

    pub fn to_text(&self) -> String {
        let mut s = format!("belief-network {}\n{{\n", self.name);
        for v in self.variables.iter() {
            s += &format!("\tvariable {}\n\t{{\n", v.name);
            if !v.parents.is_empty() {
                s += &format!("\t\tparents {{ {} }}\n", v.parents.join(" "));
            }
            s += &format!("\t\tdistribution {}\n\t}}\n", v.distribution.to_text("\t\t"));
        }
        s + "}\n"
    }

}

fn read_variable(tokens : &mut Tokens) -> Result<VariableSpec, ParseError> {
    const CTX : &str = "variable";
    let line = tokens.line();
    let name = tokens.word(CTX)?;
    tokens.expect_open(CTX)?;
    let mut parents = Vec::new();
    let mut distribution = None;
    while let Some(key) = tokens.next_key(CTX)? {
        match &key[..] {
            "parents" => parents = tokens.words(CTX)?,
            "distribution" => distribution = Some(read_conditional(tokens)?),
            other => return Err(tokens.unexpected(CTX, "parents or distribution", &Token::Word(other.to_string())))
        }
    }
    let distribution = distribution.ok_or_else(|| ParseError::Invalid {
        context : format!("variable {}", name),
        message : String::from("missing distribution"),
        line
    })?;
    Ok(VariableSpec { name, parents, distribution })
}
