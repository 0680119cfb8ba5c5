use serde::{Deserialize, Serialize};

/// One analytics query: which aggregates to compute, how to group them, and
/// which predicates to apply before aggregation.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Query {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub measures: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dimensions: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<Filter>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

/// A predicate on a single member.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Filter {
    pub member: String,
    pub operator: FilterOperator,
    pub values: Vec<String>,
}

/// The operator vocabulary of the server's load API, in its wire spelling.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum FilterOperator {
    Equals,
    NotEquals,
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    Set,
    NotSet,
    Gt,
    Gte,
    Lt,
    Lte,
}
