//! Ordered extraction rules.
//!
//! Every field extractor is a list of rules tried in order. A rule produces
//! raw candidate strings (from a CSS selector, or from a regex over the raw
//! markup or the visible text), maps each candidate to a typed value, and the
//! first value that passes the field's validity predicate wins.

use regex::Regex;
use scraper::Selector;
use serde::Serialize;
use tracing::debug;

use super::document::ParsedDocument;
use super::text::collapse_whitespace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Low,
}

/// Outcome of one extractor. A miss is not an error; defaulting happens in
/// the normalizer.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractedField<T> {
    Found {
        value: T,
        rule_index: usize,
        confidence: Confidence,
    },
    NotFound,
}

impl<T> ExtractedField<T> {
    pub fn value(&self) -> Option<&T> {
        match self {
            ExtractedField::Found { value, .. } => Some(value),
            ExtractedField::NotFound => None,
        }
    }

    pub fn into_value(self) -> Option<T> {
        match self {
            ExtractedField::Found { value, .. } => Some(value),
            ExtractedField::NotFound => None,
        }
    }

    pub fn rule_index(&self) -> Option<usize> {
        match self {
            ExtractedField::Found { rule_index, .. } => Some(*rule_index),
            ExtractedField::NotFound => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, ExtractedField::Found { .. })
    }

    pub fn is_low_confidence(&self) -> bool {
        matches!(
            self,
            ExtractedField::Found {
                confidence: Confidence::Low,
                ..
            }
        )
    }
}

pub enum Matcher {
    /// Elements matching a CSS selector; text content, or an attribute.
    Select {
        selector: Selector,
        attr: Option<&'static str>,
    },
    /// Capture group 1 of every match over the raw markup.
    Markup(Regex),
    /// Capture group 1 of every match over the visible text.
    Text(Regex),
}

impl Matcher {
    fn candidates(&self, doc: &ParsedDocument<'_>) -> Vec<String> {
        match self {
            Matcher::Select { selector, attr } => doc
                .html()
                .select(selector)
                .filter_map(|el| match attr {
                    Some(name) => el.value().attr(name).map(str::to_string),
                    None => Some(collapse_whitespace(&el.text().collect::<String>())),
                })
                .collect(),
            Matcher::Markup(re) => capture_all(re, doc.raw()),
            Matcher::Text(re) => capture_all(re, doc.text()),
        }
    }
}

fn capture_all(re: &Regex, haystack: &str) -> Vec<String> {
    re.captures_iter(haystack)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_string()))
        .collect()
}

pub struct Rule<T> {
    matcher: Matcher,
    map: fn(&str) -> Option<T>,
    confidence: Confidence,
}

impl<T> Rule<T> {
    /// Panics on an invalid selector; rules are built from constants.
    pub fn select(css: &str, map: fn(&str) -> Option<T>) -> Self {
        Self::new(
            Matcher::Select {
                selector: Selector::parse(css).unwrap(),
                attr: None,
            },
            map,
        )
    }

    pub fn select_attr(css: &str, attr: &'static str, map: fn(&str) -> Option<T>) -> Self {
        Self::new(
            Matcher::Select {
                selector: Selector::parse(css).unwrap(),
                attr: Some(attr),
            },
            map,
        )
    }

    pub fn markup(pattern: &str, map: fn(&str) -> Option<T>) -> Self {
        Self::new(Matcher::Markup(Regex::new(pattern).unwrap()), map)
    }

    pub fn text(pattern: &str, map: fn(&str) -> Option<T>) -> Self {
        Self::new(Matcher::Text(Regex::new(pattern).unwrap()), map)
    }

    fn new(matcher: Matcher, map: fn(&str) -> Option<T>) -> Self {
        Self {
            matcher,
            map,
            confidence: Confidence::High,
        }
    }

    pub fn low_confidence(mut self) -> Self {
        self.confidence = Confidence::Low;
        self
    }
}

pub struct FieldExtractor<T> {
    field: &'static str,
    rules: Vec<Rule<T>>,
    accept: fn(&T) -> bool,
}

impl<T> FieldExtractor<T> {
    pub fn new(field: &'static str, rules: Vec<Rule<T>>, accept: fn(&T) -> bool) -> Self {
        Self { field, rules, accept }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Lower rule index wins; within a rule, document order wins.
    pub fn extract(&self, doc: &ParsedDocument<'_>) -> ExtractedField<T> {
        for (rule_index, rule) in self.rules.iter().enumerate() {
            let found = rule
                .matcher
                .candidates(doc)
                .iter()
                .filter_map(|raw| (rule.map)(raw.as_str()))
                .find(|value| (self.accept)(value));
            if let Some(value) = found {
                debug!(field = self.field, rule = rule_index, url = doc.url(), "rule matched");
                return ExtractedField::Found {
                    value,
                    rule_index,
                    confidence: rule.confidence,
                };
            }
        }
        debug!(field = self.field, url = doc.url(), "no rule matched");
        ExtractedField::NotFound
    }
}
