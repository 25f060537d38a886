use std::fmt;

/// A hashtag or account handle submitted for scraping.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Query {
    Hashtag(String),
    Profile(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    #[error("query is empty")]
    Empty,
    #[error("query {0:?} contains whitespace")]
    Whitespace(String),
}

impl Query {
    /// Parses one trimmed token. Anything not starting with `@` is a hashtag.
    pub fn parse(raw: &str) -> Result<Self, QueryError> {
        let token = raw.trim();
        let (is_profile, name) = if let Some(handle) = token.strip_prefix('@') {
            (true, handle)
        } else {
            (false, token.strip_prefix('#').unwrap_or(token))
        };
        if name.is_empty() {
            return Err(QueryError::Empty);
        }
        if name.chars().any(char::is_whitespace) {
            return Err(QueryError::Whitespace(token.to_string()));
        }
        Ok(if is_profile {
            Query::Profile(name.to_string())
        } else {
            Query::Hashtag(name.to_string())
        })
    }

    /// The bare tag or handle, without prefix.
    pub fn name(&self) -> &str {
        match self {
            Query::Hashtag(name) | Query::Profile(name) => name,
        }
    }

    pub fn is_profile(&self) -> bool {
        matches!(self, Query::Profile(_))
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Query::Hashtag(name) => write!(f, "#{name}"),
            Query::Profile(name) => write!(f, "@{name}"),
        }
    }
}

/// Outcome of splitting free-text query input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedQueries {
    pub queries: Vec<Query>,
    pub rejected: Vec<(String, QueryError)>,
}

/// Splits newline- or comma-separated input into queries, keeping input order.
pub fn parse_queries(text: &str) -> ParsedQueries {
    let mut parsed = ParsedQueries::default();
    for token in text.split([',', '\n']).map(str::trim).filter(|t| !t.is_empty()) {
        match Query::parse(token) {
            Ok(query) => parsed.queries.push(query),
            Err(err) => parsed.rejected.push((token.to_string(), err)),
        }
    }
    parsed
}
