//! Collection queries understood by every [`DataStore`](super::DataStore).
//!
//! A [`Query`] names a collection and carries filters, ordering and a row
//! limit, mirroring the select/filter/order/limit surface of the hosted data
//! API. Backends translate it into their own form.

use serde_json::Value;

/// A filter predicate on one column.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Column equals value.
    Eq(String, Value),
    /// Column does not equal value.
    Neq(String, Value),
    /// Column is greater than or equal to value.
    Gte(String, Value),
    /// Column is less than or equal to value.
    Lte(String, Value),
    /// Case-insensitive `LIKE` pattern (`%` matches any run, `_` one char).
    ILike(String, String),
}

impl Filter {
    /// Column the filter applies to.
    #[must_use]
    pub fn column(&self) -> &str {
        match self {
            Self::Eq(c, _) | Self::Neq(c, _) | Self::Gte(c, _) | Self::Lte(c, _) | Self::ILike(c, _) => c,
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

/// Ordering on one column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ordering {
    pub column: String,
    pub direction: Direction,
}

/// A select against one collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    collection: String,
    columns: Option<Vec<String>>,
    filters: Vec<Filter>,
    order: Vec<Ordering>,
    limit: Option<usize>,
}

impl Query {
    /// Select every column of `collection`.
    #[must_use]
    pub fn table(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            columns: None,
            filters: Vec::new(),
            order: Vec::new(),
            limit: None,
        }
    }

    /// Restrict the returned columns.
    #[must_use]
    pub fn select(mut self, columns: &[&str]) -> Self {
        self.columns = Some(columns.iter().map(|c| (*c).to_owned()).collect());
        self
    }

    #[must_use]
    pub fn eq(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Eq(column.to_owned(), value.into()));
        self
    }

    #[must_use]
    pub fn neq(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Neq(column.to_owned(), value.into()));
        self
    }

    #[must_use]
    pub fn gte(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Gte(column.to_owned(), value.into()));
        self
    }

    #[must_use]
    pub fn lte(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Lte(column.to_owned(), value.into()));
        self
    }

    #[must_use]
    pub fn ilike(mut self, column: &str, pattern: impl Into<String>) -> Self {
        self.filters.push(Filter::ILike(column.to_owned(), pattern.into()));
        self
    }

    /// Append an ordering; earlier orderings take precedence.
    #[must_use]
    pub fn order(mut self, column: &str, direction: Direction) -> Self {
        self.order.push(Ordering {
            column: column.to_owned(),
            direction,
        });
        self
    }

    #[must_use]
    pub const fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub fn collection(&self) -> &str {
        &self.collection
    }

    #[must_use]
    pub fn columns(&self) -> Option<&[String]> {
        self.columns.as_deref()
    }

    #[must_use]
    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    #[must_use]
    pub fn ordering(&self) -> &[Ordering] {
        &self.order
    }

    #[must_use]
    pub const fn row_limit(&self) -> Option<usize> {
        self.limit
    }
}

/// Escape `%`, `_` and `\` so user input matches literally inside an
/// `ILike` pattern.
#[must_use]
pub fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_accumulates_in_order() {
        let query = Query::table("products")
            .eq("category", "shoes")
            .gte("price", 10)
            .order("price", Direction::Descending)
            .order("created_at", Direction::Ascending)
            .limit(5);

        assert_eq!(query.collection(), "products");
        assert_eq!(query.filters().len(), 2);
        assert_eq!(query.filters()[1].column(), "price");
        assert_eq!(query.ordering()[0].column, "price");
        assert_eq!(query.row_limit(), Some(5));
        assert!(query.columns().is_none());
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(escape_like("plain"), "plain");
    }
}
