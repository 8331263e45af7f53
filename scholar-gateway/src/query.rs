use serde_json::Value;

/// Row filter understood by every gateway.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq(String, Value),
    Neq(String, Value),
    In(String, Vec<Value>),
    IsNull(String),
}

impl Filter {
    pub fn column(&self) -> &str {
        match self {
            Filter::Eq(c, _) | Filter::Neq(c, _) | Filter::In(c, _) | Filter::IsNull(c) => c,
        }
    }

    /// Evaluate against a JSON row; a missing column reads as null.
    pub fn matches(&self, row: &Value) -> bool {
        let cell = row.get(self.column()).unwrap_or(&Value::Null);
        match self {
            Filter::Eq(_, v) => cell == v,
            Filter::Neq(_, v) => cell != v,
            Filter::In(_, vs) => vs.iter().any(|v| v == cell),
            Filter::IsNull(_) => cell.is_null(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub column: String,
    pub ascending: bool,
}

/// A `select` against one relation.
///
/// ```
/// use scholar_gateway::Select;
///
/// let q = Select::from("tenant_users")
///     .eq("user_id", "u1")
///     .eq("is_active", true)
///     .order("updated_at", false)
///     .limit(2);
/// assert_eq!(q.relation, "tenant_users");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Select {
    pub relation: String,
    pub columns: Option<String>,
    pub filters: Vec<Filter>,
    pub order: Vec<Order>,
    pub limit: Option<usize>,
}

impl Select {
    pub fn from(relation: impl Into<String>) -> Self {
        Self {
            relation: relation.into(),
            columns: None,
            filters: Vec::new(),
            order: Vec::new(),
            limit: None,
        }
    }

    pub fn columns(mut self, columns: impl Into<String>) -> Self {
        self.columns = Some(columns.into());
        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn eq(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(Filter::Eq(column.into(), value.into()))
    }

    pub fn neq(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(Filter::Neq(column.into(), value.into()))
    }

    pub fn is_in<I, V>(self, column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.filter(Filter::In(column.into(), values.into_iter().map(Into::into).collect()))
    }

    pub fn is_null(self, column: impl Into<String>) -> Self {
        self.filter(Filter::IsNull(column.into()))
    }

    pub fn order(mut self, column: impl Into<String>, ascending: bool) -> Self {
        self.order.push(Order {
            column: column.into(),
            ascending,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

fn encode_scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

fn encode_list_item(value: &Value) -> String {
    match value {
        Value::String(s) if s.contains([',', '(', ')', '"']) => {
            format!("\"{}\"", s.replace('"', "\\\""))
        }
        other => encode_scalar(other),
    }
}

/// PostgREST-style `(column, operator.value)` pair for a filter.
pub(crate) fn encode_filter(filter: &Filter) -> (String, String) {
    match filter {
        Filter::Eq(c, Value::Null) => (c.clone(), "is.null".to_string()),
        Filter::Eq(c, v) => (c.clone(), format!("eq.{}", encode_scalar(v))),
        Filter::Neq(c, Value::Null) => (c.clone(), "not.is.null".to_string()),
        Filter::Neq(c, v) => (c.clone(), format!("neq.{}", encode_scalar(v))),
        Filter::In(c, vs) => {
            let items: Vec<String> = vs.iter().map(encode_list_item).collect();
            (c.clone(), format!("in.({})", items.join(",")))
        }
        Filter::IsNull(c) => (c.clone(), "is.null".to_string()),
    }
}

pub(crate) fn filter_pairs(filters: &[Filter]) -> Vec<(String, String)> {
    filters.iter().map(encode_filter).collect()
}

/// Full query-string pairs for a select.
pub(crate) fn select_pairs(select: &Select) -> Vec<(String, String)> {
    let mut pairs = vec![(
        "select".to_string(),
        select.columns.clone().unwrap_or_else(|| "*".to_string()),
    )];
    pairs.extend(filter_pairs(&select.filters));
    if !select.order.is_empty() {
        let order: Vec<String> = select
            .order
            .iter()
            .map(|o| format!("{}.{}", o.column, if o.ascending { "asc" } else { "desc" }))
            .collect();
        pairs.push(("order".to_string(), order.join(",")));
    }
    if let Some(limit) = select.limit {
        pairs.push(("limit".to_string(), limit.to_string()));
    }
    pairs
}
