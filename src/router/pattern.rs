//! Route template parsing and compilation.
//!
//! A template is scanned left to right into literal runs and placeholders:
//!
//! | Token            | Compiles to                                  |
//! |------------------|----------------------------------------------|
//! | literal text     | itself, regex-escaped                        |
//! | `{name}`         | `(?P<name>[^/]+)`                            |
//! | `{name?}`        | `(?:/(?P<name>[^/]+))?` (absorbs the `/`)    |
//! | `{name:regex}`   | `(?P<name>regex)`                            |
//!
//! The whole expression is anchored with `^...$`. Templates are compiled once
//! when a route is registered and the compiled form is reused for both
//! matching and reverse URL generation.

use std::collections::HashMap;

use regex::Regex;

use crate::error::RouteError;

/// Capture body for placeholders without an explicit constraint.
const DEFAULT_SEGMENT: &str = "[^/]+";

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Segment {
    Literal(String),
    Param {
        name: String,
        constraint: Option<String>,
        optional: bool,
        /// The `/` in front of an optional placeholder belongs to the
        /// placeholder, so `/users/{id?}` also matches `/users`.
        leading_slash: bool,
    },
}

#[derive(Debug, Clone)]
pub(crate) struct CompiledPattern {
    segments: Vec<Segment>,
    regex: Regex,
    param_names: Vec<String>,
}

impl CompiledPattern {
    pub(crate) fn compile(pattern: &str) -> Result<Self, RouteError> {
        let segments = parse(pattern)?;

        let mut expr = String::with_capacity(pattern.len() + 16);
        expr.push('^');
        let mut param_names = Vec::new();
        for segment in &segments {
            match segment {
                Segment::Literal(text) => expr.push_str(&regex::escape(text)),
                Segment::Param {
                    name,
                    constraint,
                    optional,
                    leading_slash,
                } => {
                    let body = constraint.as_deref().unwrap_or(DEFAULT_SEGMENT);
                    let slash = if *leading_slash { "/" } else { "" };
                    if *optional {
                        expr.push_str(&format!("(?:{slash}(?P<{name}>{body}))?"));
                    } else {
                        expr.push_str(&format!("{slash}(?P<{name}>{body})"));
                    }
                    param_names.push(name.clone());
                }
            }
        }
        expr.push('$');

        let regex = Regex::new(&expr).map_err(|e| RouteError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            segments,
            regex,
            param_names,
        })
    }

    pub(crate) fn is_match(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }

    /// Named captures for `path`, or `None` when the path does not match.
    /// Optional placeholders that did not participate are left out.
    pub(crate) fn captures(&self, path: &str) -> Option<HashMap<String, String>> {
        let caps = self.regex.captures(path)?;
        Some(
            self.param_names
                .iter()
                .filter_map(|name| {
                    caps.name(name)
                        .map(|m| (name.clone(), m.as_str().to_string()))
                })
                .collect(),
        )
    }

    pub(crate) fn param_names(&self) -> &[String] {
        &self.param_names
    }

    /// Substitute placeholders from `params`.
    ///
    /// Unresolved optional placeholders are dropped together with their
    /// separator; an unresolved required placeholder is reported back as its
    /// name.
    pub(crate) fn build(&self, params: &HashMap<String, String>) -> Result<String, String> {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Param {
                    name,
                    optional,
                    leading_slash,
                    ..
                } => match params.get(name) {
                    Some(value) => {
                        if *leading_slash {
                            out.push('/');
                        }
                        out.push_str(&urlencoding::encode(value));
                    }
                    None if *optional => {}
                    None => return Err(name.clone()),
                },
            }
        }
        if out.is_empty() {
            out.push('/');
        }
        Ok(out)
    }
}

pub(crate) fn parse(pattern: &str) -> Result<Vec<Segment>, RouteError> {
    let invalid = |reason: &str| RouteError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: reason.to_string(),
    };

    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut chars = pattern.char_indices();

    while let Some((start, c)) = chars.next() {
        match c {
            '{' => {
                // Find the matching close brace; constraints may contain
                // their own braces such as `\d{4}`.
                let mut depth = 1usize;
                let mut end = None;
                for (i, c) in chars.by_ref() {
                    match c {
                        '{' => depth += 1,
                        '}' => {
                            depth -= 1;
                            if depth == 0 {
                                end = Some(i);
                                break;
                            }
                        }
                        _ => {}
                    }
                }
                let end = end.ok_or_else(|| invalid("unclosed `{`"))?;
                let token = &pattern[start + 1..end];

                let (name, constraint, optional) = match token.split_once(':') {
                    Some((name, constraint)) => {
                        if constraint.is_empty() {
                            return Err(invalid("empty constraint"));
                        }
                        (name, Some(constraint.to_string()), false)
                    }
                    None => match token.strip_suffix('?') {
                        Some(name) => (name, None, true),
                        None => (token, None, false),
                    },
                };
                if !is_identifier(name) {
                    return Err(invalid(&format!("invalid parameter name `{name}`")));
                }

                // A bare leading `/` stays literal so `/{page?}` still matches `/`.
                let at_root = segments.is_empty() && literal == "/";
                let leading_slash = optional && literal.ends_with('/') && !at_root;
                if leading_slash {
                    literal.pop();
                }
                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                segments.push(Segment::Param {
                    name: name.to_string(),
                    constraint,
                    optional,
                    leading_slash,
                });
            }
            '}' => return Err(invalid("unmatched `}`")),
            other => literal.push(other),
        }
    }
    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }
    Ok(segments)
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
