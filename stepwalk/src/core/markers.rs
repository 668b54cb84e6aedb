//! Lexer for inline step annotations.
//!
//! An annotation is the marker prefix the resolver leaves on each step. It is
//! made of bracketed markers (`[@:TOKEN]` or `[@:TOKEN:VALUE]`) and bare `:`
//! delimiters. Every `:` left over once the markers are removed adds one level
//! of nesting. Whitespace is ignored; anything else is rejected.

use std::sync::{Arc, LazyLock};

use regex::Regex;
use thiserror::Error;

use crate::core::types::Flag;
use crate::tree::StepNode;

const TAG_TOKEN: &str = "TAG";
const FLAG_STEP_TOKEN: &str = "FLAG_STEP";
const BOOKMARK_PREFIX: &str = "REF:";
const DEPTH_DELIMITER: char = ':';

static MARKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[@:([A-Z_]+)(?::([^\]]*))?\]").unwrap());

/// One typed token extracted from an annotation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Marker {
    Flag(Flag),
    FlagStep,
    Tag(Arc<str>),
    /// Named reference taken from a `REF:`-prefixed tag (prefix removed).
    Bookmark(Arc<str>),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MarkerError {
    #[error("unknown marker token '{0}'")]
    UnknownToken(String),
    #[error("marker '{0}' requires a value")]
    MissingValue(String),
    #[error("marker '{0}' does not take a value")]
    UnexpectedValue(String),
    #[error("unexpected '{found}' at offset {offset} in annotation")]
    Unexpected { found: char, offset: usize },
}

/// Decoded annotation: raw nesting depth plus markers in source order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Annotation {
    pub depth: usize,
    pub markers: Vec<Marker>,
}

impl Annotation {
    /// Flags in first-seen order, without duplicates.
    pub fn flags(&self) -> Vec<Flag> {
        let mut flags = Vec::new();
        for marker in &self.markers {
            if let Marker::Flag(flag) = marker
                && !flags.contains(flag)
            {
                flags.push(*flag);
            }
        }
        flags
    }

    pub fn tags(&self) -> Vec<Arc<str>> {
        self.markers
            .iter()
            .filter_map(|marker| match marker {
                Marker::Tag(tag) => Some(Arc::clone(tag)),
                _ => None,
            })
            .collect()
    }

    pub fn bookmarks(&self) -> Vec<Arc<str>> {
        self.markers
            .iter()
            .filter_map(|marker| match marker {
                Marker::Bookmark(name) => Some(Arc::clone(name)),
                _ => None,
            })
            .collect()
    }

    pub fn is_flag_step(&self) -> bool {
        self.markers.contains(&Marker::FlagStep)
    }

    /// Copy depth and marker metadata onto `node`.
    pub fn apply(&self, node: &mut StepNode) {
        node.raw_depth = self.depth;
        node.flags = self.flags();
        node.tags = self.tags();
        node.bookmarks = self.bookmarks();
        node.is_flag_step = self.is_flag_step();
    }
}

/// Decode an annotation into its depth and markers.
pub fn lex_annotation(input: &str) -> Result<Annotation, MarkerError> {
    let mut annotation = Annotation::default();
    let mut cursor = 0;

    for captures in MARKER_RE.captures_iter(input) {
        let Some(whole) = captures.get(0) else {
            continue;
        };
        annotation.depth += count_delimiters(&input[cursor..whole.start()], cursor)?;
        cursor = whole.end();

        let token = &captures[1];
        let value = captures.get(2).map(|m| m.as_str());
        push_marker(&mut annotation.markers, token, value)?;
    }
    annotation.depth += count_delimiters(&input[cursor..], cursor)?;

    Ok(annotation)
}

fn push_marker(markers: &mut Vec<Marker>, token: &str, value: Option<&str>) -> Result<(), MarkerError> {
    if token == TAG_TOKEN {
        let value = value
            .filter(|v| !v.is_empty())
            .ok_or_else(|| MarkerError::MissingValue(token.to_string()))?;
        markers.push(Marker::Tag(Arc::from(value)));
        if let Some(name) = value.strip_prefix(BOOKMARK_PREFIX) {
            if name.is_empty() {
                return Err(MarkerError::MissingValue(format!("{TAG_TOKEN}:{BOOKMARK_PREFIX}")));
            }
            markers.push(Marker::Bookmark(Arc::from(name)));
        }
        return Ok(());
    }

    if value.is_some() {
        let known = token == FLAG_STEP_TOKEN || Flag::from_token(token).is_some();
        return Err(if known {
            MarkerError::UnexpectedValue(token.to_string())
        } else {
            MarkerError::UnknownToken(token.to_string())
        });
    }

    if token == FLAG_STEP_TOKEN {
        markers.push(Marker::FlagStep);
        return Ok(());
    }

    let flag = Flag::from_token(token).ok_or_else(|| MarkerError::UnknownToken(token.to_string()))?;
    markers.push(Marker::Flag(flag));
    Ok(())
}

fn count_delimiters(gap: &str, base: usize) -> Result<usize, MarkerError> {
    let mut depth = 0;
    for (offset, ch) in gap.char_indices() {
        if ch == DEPTH_DELIMITER {
            depth += 1;
        } else if !ch.is_whitespace() {
            return Err(MarkerError::Unexpected {
                found: ch,
                offset: base + offset,
            });
        }
    }
    Ok(depth)
}
