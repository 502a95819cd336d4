//! Parsing of the `size` query token.
//!
//! ## Grammar
//!
//! | Token | Result |
//! |---|---|
//! | absent or empty | configured default box |
//! | `full` (any case) | [`SizeSpec::Original`]: serve the source unresized |
//! | `N` | square box `N × N` |
//! | `NxM` (`x` or `X`) | box `N × M` |
//! | anything else | [`SizeSpecError::Invalid`] |
//!
//! Numbers are plain base-10 digits: no sign, no whitespace, no zero, and
//! nothing that overflows `u32`.
//!
//! The default box is a `Copy` value handed in by the caller on every call,
//! so one request can never alter the default another request sees.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroU32;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SizeSpecError {
    #[error("invalid size {0:?}: expected \"full\", \"N\" or \"NxM\" with positive integers")]
    Invalid(String),
}

/// Requested bounding box for a thumbnail, in pixels.
///
/// Both dimensions are strictly positive by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "[u32; 2]", into = "[u32; 2]")]
pub struct TargetBox {
    width: NonZeroU32,
    height: NonZeroU32,
}

impl TargetBox {
    /// 128 × 128, the stock default box.
    pub const DEFAULT: TargetBox = TargetBox::square(NonZeroU32::new(128).unwrap());

    /// Returns `None` when either dimension is zero.
    pub fn new(width: u32, height: u32) -> Option<Self> {
        Some(Self {
            width: NonZeroU32::new(width)?,
            height: NonZeroU32::new(height)?,
        })
    }

    pub const fn square(side: NonZeroU32) -> Self {
        Self {
            width: side,
            height: side,
        }
    }

    pub fn width(self) -> u32 {
        self.width.get()
    }

    pub fn height(self) -> u32 {
        self.height.get()
    }

    /// Longer of the two edges.
    pub fn longest_edge(self) -> u32 {
        self.width().max(self.height())
    }
}

impl fmt::Display for TargetBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl TryFrom<[u32; 2]> for TargetBox {
    type Error = String;

    fn try_from([width, height]: [u32; 2]) -> Result<Self, Self::Error> {
        Self::new(width, height).ok_or_else(|| format!("size [{width}, {height}] must be non-zero"))
    }
}

impl From<TargetBox> for [u32; 2] {
    fn from(b: TargetBox) -> Self {
        [b.width(), b.height()]
    }
}

/// Outcome of parsing a size token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SizeSpec {
    /// Serve the original file, no resize and no cache entry.
    Original,
    /// Fit the source inside this box.
    Fit(TargetBox),
}

impl SizeSpec {
    pub fn target(self) -> Option<TargetBox> {
        match self {
            SizeSpec::Original => None,
            SizeSpec::Fit(b) => Some(b),
        }
    }
}

impl fmt::Display for SizeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SizeSpec::Original => f.write_str("full"),
            SizeSpec::Fit(b) => b.fmt(f),
        }
    }
}

/// Parse a raw `size` token against a default box.
pub fn parse_size(token: Option<&str>, default: TargetBox) -> Result<SizeSpec, SizeSpecError> {
    let token = match token {
        None | Some("") => return Ok(SizeSpec::Fit(default)),
        Some(t) => t,
    };

    if token.eq_ignore_ascii_case("full") {
        return Ok(SizeSpec::Original);
    }

    let invalid = || SizeSpecError::Invalid(token.to_string());

    match token.split_once(['x', 'X']) {
        Some((w, h)) => {
            let width = parse_dimension(w).ok_or_else(invalid)?;
            let height = parse_dimension(h).ok_or_else(invalid)?;
            Ok(SizeSpec::Fit(TargetBox { width, height }))
        }
        None => {
            let side = parse_dimension(token).ok_or_else(invalid)?;
            Ok(SizeSpec::Fit(TargetBox::square(side)))
        }
    }
}

/// Strict base-10 positive integer: ASCII digits only.
fn parse_dimension(s: &str) -> Option<NonZeroU32> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse::<u32>().ok().and_then(NonZeroU32::new)
}
