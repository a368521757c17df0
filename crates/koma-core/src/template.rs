//! Parsers for the CSS-grid notation used by layout definitions.
//!
//! Built on `winnow` 0.7. Two grammars:
//! - track templates, a space separated list of fractional units: `2fr 1fr`
//! - cell spans, a 1-based start line with an optional exclusive end
//!   line: `2` or `1 / 3`

use serde::{Deserialize, Serialize};
use std::fmt;
use winnow::ascii::digit1;
use winnow::combinator::preceded;
use winnow::error::{ContextError, ErrMode};
use winnow::prelude::*;
use winnow::token::take_while;

/// A run of grid lines, 1-based, `end` exclusive. `2` is `2 / 3`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: u16,
    pub end: u16,
}

impl Span {
    /// A span covering the single track starting at `line`.
    pub const fn single(line: u16) -> Self {
        Self {
            start: line,
            end: line + 1,
        }
    }

    /// Number of tracks covered.
    pub fn len(&self) -> u16 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Zero-based index range of the covered tracks.
    pub fn tracks(&self) -> std::ops::Range<usize> {
        (self.start as usize - 1)..(self.end as usize - 1)
    }
}

/// CSS `grid-column` / `grid-row` form, always with both lines.
impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} / {}", self.start, self.end)
    }
}

// ─── Public API ───────────────────────────────────────────────────────────

/// Parse a track template into its fractional weights.
#[must_use = "parsing result should be used"]
pub fn parse_tracks(input: &str) -> Result<Vec<f32>, String> {
    let mut rest = input;
    let mut tracks = Vec::new();

    skip_space(&mut rest);
    while !rest.is_empty() {
        let fr = parse_fraction
            .parse_next(&mut rest)
            .map_err(|e| format!("bad track at `{rest}` in `{input}`: {e:?}"))?;
        if fr <= 0.0 || !fr.is_finite() {
            return Err(format!("track weight must be positive in `{input}`"));
        }
        tracks.push(fr);
        skip_space(&mut rest);
    }

    if tracks.is_empty() {
        return Err(format!("empty track template `{input}`"));
    }
    Ok(tracks)
}

/// Parse a cell span: `n` or `a / b`.
#[must_use = "parsing result should be used"]
pub fn parse_span(input: &str) -> Result<Span, String> {
    let mut rest = input;

    skip_space(&mut rest);
    let start = parse_line
        .parse_next(&mut rest)
        .map_err(|e| format!("bad span `{input}`: {e:?}"))?;
    skip_space(&mut rest);

    let end = if rest.starts_with('/') {
        let end = preceded(('/', skip_space_parser), parse_line)
            .parse_next(&mut rest)
            .map_err(|e| format!("bad span end in `{input}`: {e:?}"))?;
        skip_space(&mut rest);
        end
    } else {
        start.saturating_add(1)
    };

    if !rest.is_empty() {
        return Err(format!("trailing input `{rest}` in span `{input}`"));
    }
    if start == 0 {
        return Err(format!("grid lines are 1-based in `{input}`"));
    }
    if end <= start {
        return Err(format!("span end must follow start in `{input}`"));
    }
    Ok(Span { start, end })
}

/// Render weights back to template form, e.g. `[2.0, 1.0]` → `2fr 1fr`.
pub fn format_tracks(tracks: &[f32]) -> String {
    tracks
        .iter()
        .map(|fr| format!("{}fr", trim_number(*fr)))
        .collect::<Vec<_>>()
        .join(" ")
}

fn trim_number(n: f32) -> String {
    if n.fract() == 0.0 {
        format!("{}", n as i64)
    } else {
        let s = format!("{n:.3}");
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

// ─── Grammar ──────────────────────────────────────────────────────────────

/// Consume optional whitespace (concrete error type avoids inference issues).
fn skip_space(input: &mut &str) {
    use winnow::ascii::space0;
    let _: Result<&str, ErrMode<ContextError>> = space0.parse_next(input);
}

fn skip_space_parser(input: &mut &str) -> ModalResult<()> {
    skip_space(input);
    Ok(())
}

fn parse_number(input: &mut &str) -> ModalResult<f32> {
    let start = *input;
    let _ = take_while(1.., |c: char| c.is_ascii_digit()).parse_next(input)?;
    if input.starts_with('.') {
        *input = &input[1..];
        let _ = take_while::<_, _, ContextError>(0.., |c: char| c.is_ascii_digit())
            .parse_next(input);
    }
    let matched = &start[..start.len() - input.len()];
    matched
        .parse::<f32>()
        .map_err(|_| ErrMode::Backtrack(ContextError::new()))
}

fn parse_fraction(input: &mut &str) -> ModalResult<f32> {
    let fr = parse_number(input)?;
    let _ = "fr".parse_next(input)?;
    Ok(fr)
}

fn parse_line(input: &mut &str) -> ModalResult<u16> {
    let digits: &str = digit1.parse_next(input)?;
    digits
        .parse::<u16>()
        .map_err(|_| ErrMode::Backtrack(ContextError::new()))
}
