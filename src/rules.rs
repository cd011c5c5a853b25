// Copyright (c) 2025 - Cowboy AI, Inc.
//! Invalidation Rule Engine
//!
//! Maps changed repository paths to CDN invalidation values (cache tags or
//! CP codes) through an ordered set of `pattern=template` rules.
//!
//! ```text
//! rule:   /content/site/(..)(/.*)*  =  tag-dev-$1
//! path:   /content/site/ca/en/home.html
//! value:  tag-dev-ca
//! ```
//!
//! # Rule semantics
//!
//! - A rule applies only when its pattern matches the **entire** path.
//! - Every rule is evaluated for every path; one path may yield many values.
//! - Templates use `$n` back-references (and `${name}` for named groups);
//!   `\$` is a literal dollar sign.
//! - Values that are blank after substitution are discarded.
//! - Rules are keyed and ordered by pattern, so derived output is stable for
//!   a given configuration.
//!
//! Patterns and templates are compiled once, when the rule set is built, so
//! a malformed rule surfaces as a configuration error on activation instead
//! of on every job.

use rayon::prelude::*;
use regex::Regex;
use std::collections::BTreeMap;
use std::fmt::{self, Write as _};
use tracing::{debug, error};

use crate::errors::{InvalidatorError, InvalidatorResult};
use crate::paths::PathSet;

/// Separator between pattern and template in a raw rule string
pub const RULE_SEPARATOR: char = '=';

/// A compiled pattern/template pair
#[derive(Clone)]
pub struct InvalidationRule {
    pattern: String,
    template: String,
    regex: Regex,
    expansion: String,
}

impl InvalidationRule {
    /// Compile a rule, validating both the pattern and its back-references
    pub fn new(pattern: &str, template: &str) -> InvalidatorResult<Self> {
        let regex = Regex::new(&format!("^(?:{})$", pattern)).map_err(|source| {
            InvalidatorError::InvalidPattern {
                pattern: pattern.to_string(),
                source,
            }
        })?;
        let expansion = compile_template(template, &regex).map_err(|reason| {
            InvalidatorError::Configuration(format!(
                "invalid template '{}' for pattern '{}': {}",
                template, pattern, reason
            ))
        })?;

        Ok(Self {
            pattern: pattern.to_string(),
            template: template.to_string(),
            regex,
            expansion,
        })
    }

    /// The rule's source pattern
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// The rule's source template
    pub fn template(&self) -> &str {
        &self.template
    }

    /// Apply the rule to a path, returning a non-blank value on a full match
    pub fn apply(&self, path: &str) -> Option<String> {
        let captures = self.regex.captures(path)?;
        let mut value = String::new();
        captures.expand(&self.expansion, &mut value);
        if value.trim().is_empty() {
            None
        } else {
            Some(value)
        }
    }
}

impl fmt::Debug for InvalidationRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvalidationRule")
            .field("pattern", &self.pattern)
            .field("template", &self.template)
            .finish()
    }
}

/// Immutable, pattern-ordered collection of compiled rules
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: BTreeMap<String, InvalidationRule>,
}

impl RuleSet {
    /// Parse raw `pattern=template` strings and compile them
    ///
    /// Malformed entries are dropped silently; a pattern that fails to
    /// compile is a configuration error.
    pub fn from_mappings<I, S>(mappings: I) -> InvalidatorResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::from_map(parse_mappings(mappings))
    }

    /// Compile an already parsed pattern/template map
    pub fn from_map(map: BTreeMap<String, String>) -> InvalidatorResult<Self> {
        let rules = map
            .into_iter()
            .map(|(pattern, template)| {
                let rule = InvalidationRule::new(&pattern, &template)?;
                Ok((pattern, rule))
            })
            .collect::<InvalidatorResult<BTreeMap<_, _>>>()?;

        Ok(Self { rules })
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Rules in pattern order
    pub fn iter(&self) -> impl Iterator<Item = &InvalidationRule> {
        self.rules.values()
    }

    /// Rule patterns in order
    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.rules.keys().map(String::as_str)
    }

    /// All non-blank values every rule yields for one path
    pub fn values_for(&self, path: &str) -> Vec<String> {
        self.iter().filter_map(|rule| rule.apply(path)).collect()
    }
}

/// Split raw rule strings into a pattern-ordered map
///
/// Entries without a separator, or whose trimmed pattern or template is
/// empty, are dropped. Duplicate patterns keep the first template seen.
pub fn parse_mappings<I, S>(mappings: I) -> BTreeMap<String, String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut rules = BTreeMap::new();
    for raw in mappings {
        let raw = raw.as_ref();
        let Some((pattern, template)) = raw.split_once(RULE_SEPARATOR) else {
            debug!("Ignoring rule without separator: {}", raw);
            continue;
        };
        let (pattern, template) = (pattern.trim(), template.trim());
        if pattern.is_empty() || template.is_empty() {
            debug!("Ignoring rule with blank side: {}", raw);
            continue;
        }
        rules
            .entry(pattern.to_string())
            .or_insert_with(|| template.to_string());
    }
    rules
}

/// Derive invalidation values for every path under every rule
///
/// Either input missing is a caller bug: it is logged and yields an empty set.
/// Paths are processed in parallel; the result is the union of all values.
pub fn derive_values(paths: Option<&PathSet>, rules: Option<&RuleSet>) -> PathSet {
    let (paths, rules) = match (paths, rules) {
        (Some(paths), Some(rules)) => (paths, rules),
        (paths, rules) => {
            error!(
                "No valid mandatory inputs: paths: {:?}, invalidation rules: {:?}",
                paths, rules
            );
            return PathSet::new();
        }
    };

    paths
        .par_iter()
        .flat_map_iter(|path| rules.values_for(path))
        .collect()
}

/// Translate a `$n` style template into the `regex` crate's expansion syntax
///
/// A group reference consumes the longest run of digits that still names an
/// existing group, so `$10` means group 1 followed by `0` when only nine
/// groups exist.
fn compile_template(template: &str, regex: &Regex) -> Result<String, String> {
    let group_count = regex.captures_len() - 1;
    let mut expansion = String::with_capacity(template.len() + 8);
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some('$') => expansion.push_str("$$"),
                Some(escaped) => expansion.push(escaped),
                None => return Err("character to be escaped is missing".to_string()),
            },
            '$' => match chars.peek().copied() {
                Some('{') => {
                    chars.next();
                    let mut name = String::new();
                    loop {
                        match chars.next() {
                            Some('}') => break,
                            Some(ch) => name.push(ch),
                            None => return Err("named group reference is missing '}'".to_string()),
                        }
                    }
                    if !regex.capture_names().flatten().any(|n| n == name) {
                        return Err(format!("no group with name {{{}}}", name));
                    }
                    let _ = write!(expansion, "${{{}}}", name);
                }
                Some(digit) if digit.is_ascii_digit() => {
                    chars.next();
                    let mut group = digit.to_digit(10).map_or(0, |d| d as usize);
                    if group > group_count {
                        return Err(format!("no group {}", group));
                    }
                    while let Some(next) = chars.peek().and_then(|n| n.to_digit(10)) {
                        let candidate = group * 10 + next as usize;
                        if candidate > group_count {
                            break;
                        }
                        group = candidate;
                        chars.next();
                    }
                    let _ = write!(expansion, "${{{}}}", group);
                }
                _ => return Err("illegal group reference".to_string()),
            },
            other => expansion.push(other),
        }
    }

    Ok(expansion)
}
