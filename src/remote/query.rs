//! Read query builder
//!
//! Mirrors the chained `select → eq → order → limit` surface of the hosted
//! data service and renders it as PostgREST query parameters.

use serde::Serialize;

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Asc => "asc",
            Direction::Desc => "desc",
        }
    }
}

/// Embedded relation fetched alongside each row, e.g. `profiles:user_id(username)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Join {
    /// Table the relation points at
    pub table: String,
    /// Key the related row is embedded under; defaults to the table name
    pub alias: String,
    /// Column on the base table holding the foreign key
    pub foreign_key: String,
    /// Columns selected from the joined table
    pub columns: Vec<String>,
}

impl Join {
    pub fn new(table: impl Into<String>, foreign_key: impl Into<String>, columns: &[&str]) -> Self {
        let table = table.into();
        Self {
            alias: table.clone(),
            table,
            foreign_key: foreign_key.into(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
        }
    }

    /// Embed the related row under `alias` instead of the table name
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = alias.into();
        self
    }

    fn render(&self) -> String {
        let columns = self.columns.join(",");
        if self.alias == self.table {
            format!("{}:{}({})", self.alias, self.foreign_key, columns)
        } else {
            format!("{}:{}!{}({})", self.alias, self.table, self.foreign_key, columns)
        }
    }
}

/// Equality filter on a single column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EqFilter {
    pub column: String,
    pub value: String,
}

/// Ordering clause
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub column: String,
    pub direction: Direction,
}

/// A read query against one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Select {
    pub table: String,
    /// Selected columns; empty means `*`
    pub columns: Vec<String>,
    pub join: Option<Join>,
    pub filters: Vec<EqFilter>,
    pub order: Option<Order>,
    pub limit: Option<usize>,
}

impl Select {
    /// Start a `select *` on `table`
    pub fn from(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: Vec::new(),
            join: None,
            filters: Vec::new(),
            order: None,
            limit: None,
        }
    }

    pub fn columns(mut self, columns: &[&str]) -> Self {
        self.columns = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn join(mut self, join: Join) -> Self {
        self.join = Some(join);
        self
    }

    pub fn eq(mut self, column: impl Into<String>, value: impl ToString) -> Self {
        self.filters.push(EqFilter {
            column: column.into(),
            value: value.to_string(),
        });
        self
    }

    pub fn order(mut self, column: impl Into<String>, direction: Direction) -> Self {
        self.order = Some(Order {
            column: column.into(),
            direction,
        });
        self
    }

    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    /// The `select=` parameter, including the embedded join.
    pub fn select_clause(&self) -> String {
        let base = if self.columns.is_empty() {
            "*".to_string()
        } else {
            self.columns.join(",")
        };
        match &self.join {
            Some(join) => format!("{},{}", base, join.render()),
            None => base,
        }
    }

    /// Query parameters in PostgREST syntax.
    pub fn to_query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![("select".to_string(), self.select_clause())];
        for filter in &self.filters {
            pairs.push((filter.column.clone(), format!("eq.{}", filter.value)));
        }
        if let Some(order) = &self.order {
            pairs.push((
                "order".to_string(),
                format!("{}.{}", order.column, order.direction.as_str()),
            ));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit".to_string(), limit.to_string()));
        }
        pairs
    }
}
