//! Validated query text.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::QueryError;

/// A trimmed, non-empty query.
///
/// Whitespace-only input never becomes a `Query`, so nothing downstream of
/// [`Query::parse`] can issue an empty request.
#[derive(Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Query(String);

impl Query {
    /// Parse user input into a query.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::Empty`] if the input is empty after trimming.
    pub fn parse(input: &str) -> Result<Self, QueryError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(QueryError::Empty);
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Return the query text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Query({:?})", self.0)
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Query {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for Query {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_surrounding_whitespace() {
        let query = Query::parse("  What is a Collection?\n").unwrap();
        assert_eq!(query.as_str(), "What is a Collection?");
    }

    #[test]
    fn rejects_whitespace_only() {
        for input in ["", " ", "\t\n", "\u{3000}  "] {
            assert_eq!(Query::parse(input), Err(QueryError::Empty), "{input:?}");
        }
    }

    #[test]
    fn serializes_as_plain_string() {
        let query: Query = "forms".parse().unwrap();
        assert_eq!(serde_json::to_string(&query).unwrap(), r#""forms""#);
    }
}
