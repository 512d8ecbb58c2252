//! Front matter parsing.
//!
//! Front matter is a YAML block delimited by `---` lines at the very start of a
//! file:
//!
//! ```markdown
//! ---
//! layout: post
//! title: Externalized configuration with Spring Cloud Config
//! date: 2019-03-02 10:15:00
//! tags: [spring, cloud]
//! ---
//!
//! # Content starts here
//! ```
//!
//! A file without the opening marker has empty front matter. A file with an
//! opening marker but no closing marker is malformed.

use serde::Serialize;
use serde_yaml::{Mapping, Number, Value as YamlValue};

const MARKER: &str = "---";
const ALT_CLOSING_MARKER: &str = "...";

#[derive(thiserror::Error, Debug)]
pub enum FrontMatterError {
    #[error("opening '---' marker has no matching closing marker")]
    Unterminated,

    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("front matter must be a mapping of keys to values")]
    NotAMapping,

    #[error("front matter keys must be strings")]
    NonStringKey,

    #[error("unsupported value for '{key}': {reason}")]
    UnsupportedValue { key: String, reason: &'static str },

    #[error("field '{key}' must be {expected}")]
    WrongType { key: String, expected: &'static str },

    #[error("invalid date '{0}' (expected YYYY-MM-DD, optionally followed by a time)")]
    InvalidDate(String),
}

/// A front matter value.
///
/// Only flat shapes are accepted; anything nested is rejected while parsing
/// instead of surfacing later as a template error.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Number(Number),
    Text(String),
    List(Vec<String>),
}

impl FieldValue {
    fn from_yaml(key: &str, value: YamlValue) -> Result<Option<Self>, FrontMatterError> {
        let value = match value {
            YamlValue::Null => return Ok(None),
            YamlValue::Bool(b) => FieldValue::Bool(b),
            YamlValue::Number(n) => FieldValue::Number(n),
            YamlValue::String(s) => FieldValue::Text(s),
            YamlValue::Sequence(items) => FieldValue::List(
                items
                    .into_iter()
                    .map(|item| match item {
                        YamlValue::String(s) => Ok(s),
                        YamlValue::Number(n) => Ok(n.to_string()),
                        YamlValue::Bool(b) => Ok(b.to_string()),
                        _ => Err(FrontMatterError::UnsupportedValue {
                            key: key.to_string(),
                            reason: "list items must be scalars",
                        }),
                    })
                    .collect::<Result<_, _>>()?,
            ),
            YamlValue::Mapping(_) => {
                return Err(FrontMatterError::UnsupportedValue {
                    key: key.to_string(),
                    reason: "nested mappings are not supported",
                });
            }
            YamlValue::Tagged(_) => {
                return Err(FrontMatterError::UnsupportedValue {
                    key: key.to_string(),
                    reason: "tagged values are not supported",
                });
            }
        };
        Ok(Some(value))
    }

    fn to_yaml(&self) -> YamlValue {
        match self {
            FieldValue::Bool(b) => YamlValue::Bool(*b),
            FieldValue::Number(n) => YamlValue::Number(n.clone()),
            FieldValue::Text(s) => YamlValue::String(s.clone()),
            FieldValue::List(items) => {
                YamlValue::Sequence(items.iter().cloned().map(YamlValue::String).collect())
            }
        }
    }
}

/// Parsed front matter, in the order the keys were written.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrontMatter {
    entries: Vec<(String, FieldValue)>,
}

impl FrontMatter {
    /// Build front matter from key/value pairs. Later duplicates replace earlier ones.
    pub fn from_entries(entries: impl IntoIterator<Item = (String, FieldValue)>) -> Self {
        let mut front_matter = Self::default();
        for (key, value) in entries {
            front_matter.insert(key, value);
        }
        front_matter
    }

    pub fn insert(&mut self, key: String, value: FieldValue) {
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[cfg(test)]
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// A text field. Missing is fine, any other shape is an error.
    pub fn text(&self, key: &str) -> Result<Option<&str>, FrontMatterError> {
        match self.get(key) {
            None => Ok(None),
            Some(FieldValue::Text(s)) => Ok(Some(s)),
            Some(_) => Err(FrontMatterError::WrongType {
                key: key.to_string(),
                expected: "a string",
            }),
        }
    }

    /// A boolean flag.
    pub fn flag(&self, key: &str) -> Result<Option<bool>, FrontMatterError> {
        match self.get(key) {
            None => Ok(None),
            Some(FieldValue::Bool(b)) => Ok(Some(*b)),
            Some(_) => Err(FrontMatterError::WrongType {
                key: key.to_string(),
                expected: "true or false",
            }),
        }
    }

    /// A list of names, written either as a YAML list or a whitespace-separated string.
    pub fn names(&self, key: &str) -> Result<Vec<String>, FrontMatterError> {
        match self.get(key) {
            None => Ok(Vec::new()),
            Some(FieldValue::List(items)) => Ok(items.clone()),
            Some(FieldValue::Text(s)) => Ok(s.split_whitespace().map(str::to_string).collect()),
            Some(_) => Err(FrontMatterError::WrongType {
                key: key.to_string(),
                expected: "a list or a space-separated string",
            }),
        }
    }

    /// Serialize back to a marker-delimited block, ending with a newline.
    pub fn to_block(&self) -> Result<String, FrontMatterError> {
        let mut block = String::from(MARKER);
        block.push('\n');
        if !self.entries.is_empty() {
            let mapping: Mapping = self
                .entries
                .iter()
                .map(|(k, v)| (YamlValue::String(k.clone()), v.to_yaml()))
                .collect();
            block.push_str(&serde_yaml::to_string(&mapping)?);
        }
        block.push_str(MARKER);
        block.push('\n');
        Ok(block)
    }
}

impl Serialize for FrontMatter {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;

        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// Result of splitting a file into front matter and body.
#[derive(Debug, PartialEq)]
pub struct ParsedContent<'a> {
    /// The parsed front matter (empty if none found)
    pub front_matter: FrontMatter,
    /// Everything after the closing marker
    pub body: &'a str,
    /// 1-based line number of the first body line in the original file
    pub body_line: usize,
}

/// Split raw file text into front matter and body.
pub fn parse_front_matter(input: &str) -> Result<ParsedContent<'_>, FrontMatterError> {
    let input = input.strip_prefix('\u{feff}').unwrap_or(input);

    let mut lines = LineCursor::new(input);
    match lines.next() {
        Some((_, first)) if first.trim_end() == MARKER => {}
        _ => {
            return Ok(ParsedContent {
                front_matter: FrontMatter::default(),
                body: input,
                body_line: 1,
            });
        }
    }

    let yaml_start = lines.offset;
    let (yaml_end, body_start, line_count) = loop {
        let line_start = lines.offset;
        let Some((number, line)) = lines.next() else {
            return Err(FrontMatterError::Unterminated);
        };
        let trimmed = line.trim_end();
        if trimmed == MARKER || trimmed == ALT_CLOSING_MARKER {
            break (line_start, lines.offset, number);
        }
    };

    let front_matter = parse_yaml(&input[yaml_start..yaml_end])?;

    Ok(ParsedContent {
        front_matter,
        body: &input[body_start..],
        body_line: line_count + 1,
    })
}

fn parse_yaml(yaml: &str) -> Result<FrontMatter, FrontMatterError> {
    if yaml.trim().is_empty() {
        return Ok(FrontMatter::default());
    }

    let mapping = match serde_yaml::from_str::<YamlValue>(yaml)? {
        YamlValue::Mapping(mapping) => mapping,
        YamlValue::Null => return Ok(FrontMatter::default()),
        _ => return Err(FrontMatterError::NotAMapping),
    };

    let mut front_matter = FrontMatter::default();
    for (key, value) in mapping {
        let YamlValue::String(key) = key else {
            return Err(FrontMatterError::NonStringKey);
        };
        if let Some(value) = FieldValue::from_yaml(&key, value)? {
            front_matter.insert(key, value);
        } else {
            tracing::debug!(key = %key, "dropping empty front matter value");
        }
    }
    Ok(front_matter)
}

/// Iterates lines (without terminators) while tracking the byte offset
/// just past the current line.
struct LineCursor<'a> {
    input: &'a str,
    offset: usize,
    line: usize,
}

impl<'a> LineCursor<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            offset: 0,
            line: 0,
        }
    }
}

impl<'a> Iterator for LineCursor<'a> {
    type Item = (usize, &'a str);

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset >= self.input.len() {
            return None;
        }
        let rest = &self.input[self.offset..];
        let (line, consumed) = match rest.find('\n') {
            Some(pos) => (&rest[..pos], pos + 1),
            None => (rest, rest.len()),
        };
        self.offset += consumed;
        self.line += 1;
        Some((self.line, line.strip_suffix('\r').unwrap_or(line)))
    }
}
