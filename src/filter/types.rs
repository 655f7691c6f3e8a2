use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterOp {
    #[serde(rename = "$eq")] Eq,
    #[serde(rename = "$ne")] Ne,
    #[serde(rename = "$gt")] Gt,
    #[serde(rename = "$gte")] Gte,
    #[serde(rename = "$lt")] Lt,
    #[serde(rename = "$lte")] Lte,

    #[serde(rename = "$like")] Like,
    #[serde(rename = "$ilike")] ILike,

    #[serde(rename = "$in")] In,
    #[serde(rename = "$nin")] NIn,

    #[serde(rename = "$between")] Between,
    #[serde(rename = "$null")] Null,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterData {
    pub select: Option<Vec<String>>,
    #[serde(rename = "where")]
    pub where_clause: Option<Value>,
    pub order: Option<Value>,
    pub limit: Option<i32>,
    pub offset: Option<i32>,
}

impl FilterData {
    /// Filter with only a WHERE clause
    pub fn matching(where_clause: Value) -> Self {
        Self {
            where_clause: Some(where_clause),
            ..Default::default()
        }
    }

    /// AND-combine a mandatory predicate with whatever WHERE clause is already present.
    /// The predicate cannot be widened by the existing clause.
    pub fn and_where(mut self, predicate: Value) -> Self {
        self.where_clause = Some(match self.where_clause.take() {
            None | Some(Value::Null) => predicate,
            Some(existing) => json!({ "$and": [existing, predicate] }),
        });
        self
    }

    pub fn order_by(mut self, order: impl Into<String>) -> Self {
        self.order = Some(Value::String(order.into()));
        self
    }
}

#[derive(Debug, Clone)]
pub struct FilterWhereInfo {
    pub column: String,
    pub operator: FilterOp,
    pub data: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn to_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone)]
pub struct FilterOrderInfo {
    pub column: String,
    pub sort: SortDirection,
}

#[derive(Debug, Clone)]
pub struct SqlResult {
    pub query: String,
    pub params: Vec<Value>,
}
