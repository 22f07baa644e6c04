//! Header/footer pairing.
//!
//! - **Positional**: the i-th header (by offset) with the i-th footer.
//!   Trailing unpaired signatures are dropped.
//! - **Nearest footer**: each header, in offset order, takes the first
//!   footer that starts at or after the header's end and after the footer
//!   the previous header took.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::engine::{Match, Tag};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Pairing {
    #[default]
    Positional,
    NearestFooter,
}

impl fmt::Display for Pairing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pairing::Positional => write!(f, "positional"),
            Pairing::NearestFooter => write!(f, "nearest-footer"),
        }
    }
}

/// A header and the footer chosen to close it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pair {
    pub header: Match,
    pub footer: Match,
}

impl Pair {
    /// First byte of the carve
    pub fn start(&self) -> u64 {
        self.header.offset
    }

    /// One past the last byte of the carve (the footer is included)
    pub fn end(&self) -> u64 {
        self.footer.end()
    }

    /// Byte count, or `None` when the footer ends at or before the header
    pub fn len(&self) -> Option<u64> {
        self.end().checked_sub(self.start()).filter(|&n| n > 0)
    }
}

/// Split matches by tag, each side ordered by offset
pub fn split(matches: &[Match]) -> (Vec<&Match>, Vec<&Match>) {
    let (mut headers, mut footers): (Vec<&Match>, Vec<&Match>) =
        matches.iter().partition(|m| m.tag == Tag::Header);
    headers.sort_by_key(|m| m.offset);
    footers.sort_by_key(|m| m.offset);
    (headers, footers)
}

/// Pair a file type's matches with the given strategy
pub fn pair(matches: &[Match], strategy: Pairing) -> Vec<Pair> {
    let (headers, footers) = split(matches);
    match strategy {
        Pairing::Positional => headers
            .into_iter()
            .zip(footers)
            .map(|(h, f)| Pair {
                header: h.clone(),
                footer: f.clone(),
            })
            .collect(),
        Pairing::NearestFooter => {
            let mut pairs = Vec::new();
            let mut next = 0usize;
            for header in headers {
                let Some(offset) = footers[next..]
                    .iter()
                    .position(|f| f.offset >= header.end())
                else {
                    break;
                };
                let footer = footers[next + offset];
                pairs.push(Pair {
                    header: header.clone(),
                    footer: footer.clone(),
                });
                next += offset + 1;
            }
            pairs
        }
    }
}
