//! CAPTCHA answering strategies
//!
//! Solvers are best-effort. The faucet rejects wrong answers as a normal
//! business outcome, so a solver only has to produce *some* answer and
//! must never fail.

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

/// Length of a guessed answer when the challenge carries no usable signal
pub const DEFAULT_ANSWER_LEN: usize = 6;

/// Upper bound on answer length derived from the challenge
pub const MAX_ANSWER_LEN: usize = 10;

const ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Turns a challenge payload into a proposed answer
pub trait CaptchaSolver: Send + Sync {
    /// Short identifier used in logs and configuration
    fn name(&self) -> &'static str;

    /// Propose an answer. Must not panic on malformed input.
    fn solve(&self, payload: &str) -> String;
}

/// Selectable solver strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SolverKind {
    #[default]
    Svg,
    Random,
}

impl std::str::FromStr for SolverKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "svg" => Ok(SolverKind::Svg),
            "random" => Ok(SolverKind::Random),
            other => Err(format!("unknown solver '{}'", other)),
        }
    }
}

impl SolverKind {
    pub fn build(self) -> Box<dyn CaptchaSolver> {
        match self {
            SolverKind::Svg => Box::new(SvgPatternSolver),
            SolverKind::Random => Box::new(RandomGuessSolver),
        }
    }
}

/// Random uppercase alphanumeric string of `len` characters.
pub fn random_answer(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

/// Always guesses
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomGuessSolver;

impl CaptchaSolver for RandomGuessSolver {
    fn name(&self) -> &'static str {
        "random"
    }

    fn solve(&self, _payload: &str) -> String {
        random_answer(DEFAULT_ANSWER_LEN)
    }
}

/// Reads structure from SVG text challenges.
///
/// Glyphs in the faucet's SVG challenges are filled `<path>` elements while
/// noise strokes carry `fill="none"`, so the filled-path count gives the
/// answer length. Glyph shapes are not recognised; characters are guessed.
#[derive(Debug, Default, Clone, Copy)]
pub struct SvgPatternSolver;

impl CaptchaSolver for SvgPatternSolver {
    fn name(&self) -> &'static str {
        "svg"
    }

    fn solve(&self, payload: &str) -> String {
        let glyphs = glyph_paths(payload);
        if glyphs.is_empty() {
            debug!("No glyph paths found in challenge, guessing");
            return random_answer(DEFAULT_ANSWER_LEN);
        }

        let colours = glyphs
            .iter()
            .map(|g| g.fill)
            .collect::<std::collections::HashSet<_>>()
            .len();
        trace!("Challenge has {} glyph paths in {} colours", glyphs.len(), colours);

        random_answer(glyphs.len().min(MAX_ANSWER_LEN))
    }
}

/// A filled `<path>` element
#[derive(Debug, Clone, PartialEq)]
pub struct GlyphPath<'a> {
    pub fill: &'a str,
    pub d: &'a str,
}

/// Extract every `<path>` with a non-`none` fill and a path definition.
pub fn glyph_paths(svg: &str) -> Vec<GlyphPath<'_>> {
    let mut glyphs = Vec::new();
    let mut rest = svg;

    while let Some(start) = rest.find("<path") {
        let tag_body = &rest[start + "<path".len()..];
        let end = tag_body.find('>').unwrap_or(tag_body.len());
        let tag = &tag_body[..end];
        rest = &tag_body[end..];

        // `<pathfoo` is some other element
        if !tag.starts_with(|c: char| c.is_ascii_whitespace() || c == '/') {
            continue;
        }

        let attrs = parse_attributes(tag);
        let fill = attrs.iter().find(|(k, _)| *k == "fill").map(|(_, v)| *v);
        let d = attrs.iter().find(|(k, _)| *k == "d").map(|(_, v)| *v);

        if let (Some(fill), Some(d)) = (fill, d) {
            if !fill.is_empty() && fill != "none" && !d.is_empty() {
                glyphs.push(GlyphPath { fill, d });
            }
        }
    }

    glyphs
}

/// Parse `name="value"` / `name='value'` pairs; unquoted or broken
/// attributes are skipped.
fn parse_attributes(tag: &str) -> Vec<(&str, &str)> {
    let mut attrs = Vec::new();
    let mut rest = tag;

    loop {
        rest = rest.trim_start_matches(|c: char| c.is_ascii_whitespace() || c == '/');
        let Some(eq) = rest.find('=') else { break };

        let name = rest[..eq].trim();
        let after = rest[eq + 1..].trim_start();
        let Some(quote) = after.chars().next().filter(|c| *c == '"' || *c == '\'') else {
            break;
        };
        let value_body = &after[1..];
        let Some(close) = value_body.find(quote) else { break };

        // a name containing whitespace means we skipped a valueless attribute
        let name = name.rsplit(|c: char| c.is_ascii_whitespace()).next().unwrap_or(name);
        attrs.push((name, &value_body[..close]));
        rest = &value_body[close + 1..];
    }

    attrs
}
