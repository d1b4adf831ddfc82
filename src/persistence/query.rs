//! Row filters, ordering and limits shared by all table backends

use serde_json::Value;
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Neq,
    Gte,
    Lte,
}

impl FilterOp {
    /// Operator keyword in the REST query dialect
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOp::Eq => "eq",
            FilterOp::Neq => "neq",
            FilterOp::Gte => "gte",
            FilterOp::Lte => "lte",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub column: String,
    pub op: FilterOp,
    pub value: Value,
}

impl Filter {
    pub fn new(column: &str, op: FilterOp, value: impl Into<Value>) -> Self {
        Self {
            column: column.to_string(),
            op,
            value: value.into(),
        }
    }

    pub fn eq(column: &str, value: impl Into<Value>) -> Self {
        Self::new(column, FilterOp::Eq, value)
    }

    pub fn neq(column: &str, value: impl Into<Value>) -> Self {
        Self::new(column, FilterOp::Neq, value)
    }

    pub fn gte(column: &str, value: impl Into<Value>) -> Self {
        Self::new(column, FilterOp::Gte, value)
    }

    pub fn lte(column: &str, value: impl Into<Value>) -> Self {
        Self::new(column, FilterOp::Lte, value)
    }

    /// Filter operand as it appears in a query string (`eq.CLOSED`, `gte.1000`)
    pub fn operand(&self) -> String {
        let value = match &self.value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        format!("{}.{}", self.op.as_str(), value)
    }

    /// Whether `row` satisfies this filter. A missing column never matches.
    pub fn matches(&self, row: &Value) -> bool {
        let Some(field) = row.get(&self.column) else {
            return false;
        };

        match self.op {
            FilterOp::Eq => compare(field, &self.value) == Some(Ordering::Equal),
            FilterOp::Neq => compare(field, &self.value) != Some(Ordering::Equal),
            FilterOp::Gte => matches!(
                compare(field, &self.value),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            FilterOp::Lte => matches!(
                compare(field, &self.value),
                Some(Ordering::Less | Ordering::Equal)
            ),
        }
    }
}

/// Compare two JSON scalars; numbers numerically, strings lexically
pub fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub column: String,
    pub ascending: bool,
}

impl Order {
    pub fn asc(column: &str) -> Self {
        Self {
            column: column.to_string(),
            ascending: true,
        }
    }

    pub fn desc(column: &str) -> Self {
        Self {
            column: column.to_string(),
            ascending: false,
        }
    }

    pub fn operand(&self) -> String {
        format!(
            "{}.{}",
            self.column,
            if self.ascending { "asc" } else { "desc" }
        )
    }
}

/// Select query: all filters must match
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filters: Vec<Filter>,
    pub order: Option<Order>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn order(mut self, order: Order) -> Self {
        self.order = Some(order);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, row: &Value) -> bool {
        self.filters.iter().all(|f| f.matches(row))
    }

    /// Query-string pairs in the REST dialect, `select=*` first
    pub fn to_params(&self) -> Vec<(String, String)> {
        let mut params = vec![("select".to_string(), "*".to_string())];
        params.extend(filter_params(&self.filters));
        if let Some(order) = &self.order {
            params.push(("order".to_string(), order.operand()));
        }
        if let Some(limit) = self.limit {
            params.push(("limit".to_string(), limit.to_string()));
        }
        params
    }
}

pub fn filter_params(filters: &[Filter]) -> Vec<(String, String)> {
    filters
        .iter()
        .map(|f| (f.column.clone(), f.operand()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_range_filters_are_inclusive() {
        let row = json!({ "timestamp": 1000, "status": "CLOSED" });
        assert!(Filter::gte("timestamp", 1000).matches(&row));
        assert!(Filter::lte("timestamp", 1000).matches(&row));
        assert!(!Filter::gte("timestamp", 1001).matches(&row));
        assert!(!Filter::lte("timestamp", 999).matches(&row));
    }

    #[test]
    fn test_eq_and_neq() {
        let row = json!({ "id": "t-1", "status": "OPEN" });
        assert!(Filter::eq("status", "OPEN").matches(&row));
        assert!(!Filter::eq("status", "CLOSED").matches(&row));
        assert!(Filter::neq("id", "never_match_this").matches(&row));
        assert!(!Filter::eq("missing", "x").matches(&row));
    }

    #[test]
    fn test_mixed_number_representations_compare() {
        let row = json!({ "timestamp": 1500.0 });
        assert!(Filter::gte("timestamp", 1500).matches(&row));
    }

    #[test]
    fn test_query_params() {
        let query = Query::new()
            .filter(Filter::gte("timestamp", 10))
            .filter(Filter::lte("timestamp", 20))
            .filter(Filter::eq("status", "CLOSED"))
            .order(Order::desc("timestamp"))
            .limit(5);

        let params = query.to_params();
        assert_eq!(
            params,
            vec![
                ("select".to_string(), "*".to_string()),
                ("timestamp".to_string(), "gte.10".to_string()),
                ("timestamp".to_string(), "lte.20".to_string()),
                ("status".to_string(), "eq.CLOSED".to_string()),
                ("order".to_string(), "timestamp.desc".to_string()),
                ("limit".to_string(), "5".to_string()),
            ]
        );
    }
}
