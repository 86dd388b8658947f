//! String matching for metric names and dimension values
//!
//! Each item of a filter list is one of:
//! - `/regex/`: an unanchored regular expression
//! - a glob, when it contains any of `*?[]{}`: `*`, `?`, `[...]` (`[!...]`
//!   negates the class) and `{a,b}` alternation, anchored at both ends
//! - otherwise a literal compared for equality
//!
//! A leading `!` negates the item. A value matching a negated item is
//! rejected outright; otherwise it is accepted when it matches a positive
//! item, or when the list has no positive items at all.

use regex::Regex;

use super::error::FilterError;

const GLOB_CHARS: &[char] = &['*', '?', '[', ']', '{', '}'];

#[derive(Debug)]
enum Pattern {
    Literal(String),
    Regex(Regex),
}

impl Pattern {
    fn is_match(&self, value: &str) -> bool {
        match self {
            Self::Literal(literal) => literal == value,
            Self::Regex(re) => re.is_match(value),
        }
    }
}

#[derive(Debug)]
struct Item {
    pattern: Pattern,
    negated: bool,
}

/// Compiled list of literal, glob and regex patterns
#[derive(Debug)]
pub struct StringFilter {
    items: Vec<Item>,
    has_positive: bool,
}

impl StringFilter {
    pub fn new<S: AsRef<str>>(items: &[S]) -> Result<Self, FilterError> {
        let items = items
            .iter()
            .map(|item| parse_item(item.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        let has_positive = items.iter().any(|item| !item.negated);
        Ok(Self {
            items,
            has_positive,
        })
    }

    pub fn matches(&self, value: &str) -> bool {
        let mut matched = false;
        for item in &self.items {
            if item.pattern.is_match(value) {
                if item.negated {
                    return false;
                }
                matched = true;
            }
        }
        matched || !self.has_positive
    }
}

fn parse_item(item: &str) -> Result<Item, FilterError> {
    let (negated, body) = match item.strip_prefix('!') {
        Some(rest) => (true, rest),
        None => (false, item),
    };

    let pattern = if let Some(re) = body
        .strip_prefix('/')
        .and_then(|rest| rest.strip_suffix('/'))
    {
        Pattern::Regex(compile(item, re)?)
    } else if body.contains(GLOB_CHARS) {
        Pattern::Regex(compile(item, &glob_to_regex(body))?)
    } else {
        Pattern::Literal(body.to_string())
    };

    Ok(Item { pattern, negated })
}

fn compile(item: &str, re: &str) -> Result<Regex, FilterError> {
    Regex::new(re).map_err(|source| FilterError::InvalidPattern {
        pattern: item.to_string(),
        source,
    })
}

/// Translate a glob into an anchored regex. Unbalanced classes or
/// alternations surface as regex compile errors.
fn glob_to_regex(glob: &str) -> String {
    let mut re = String::with_capacity(glob.len() * 2 + 2);
    re.push('^');

    let mut in_class = false;
    let mut in_alternation = false;
    let mut chars = glob.chars().peekable();
    while let Some(c) = chars.next() {
        if in_class {
            match c {
                ']' => {
                    in_class = false;
                    re.push(']');
                }
                '\\' | '[' | '&' | '~' => {
                    re.push('\\');
                    re.push(c);
                }
                _ => re.push(c),
            }
            continue;
        }

        match c {
            '*' => re.push_str(".*"),
            '?' => re.push('.'),
            '[' => {
                in_class = true;
                re.push('[');
                if chars.next_if_eq(&'!').is_some() {
                    re.push('^');
                }
            }
            '{' if !in_alternation => {
                in_alternation = true;
                re.push_str("(?:");
            }
            ',' if in_alternation => re.push('|'),
            '}' if in_alternation => {
                in_alternation = false;
                re.push(')');
            }
            _ => re.push_str(&regex::escape(c.encode_utf8(&mut [0; 4]))),
        }
    }

    re.push('$');
    re
}
