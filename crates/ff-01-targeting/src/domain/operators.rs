//! Operator catalogue

/// Every operator understood by the evaluator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    // Logical
    And,
    Or,
    Nor,
    Not,
    // Comparison
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
    // Sets and arrays
    In,
    Nin,
    All,
    Size,
    ElemMatch,
    // Element
    Exists,
    Type,
    Regex,
    // Semantic versions
    VersionEq,
    VersionNe,
    VersionGt,
    VersionGte,
    VersionLt,
    VersionLte,
    // Saved groups
    InGroup,
    NotInGroup,
}

impl Operator {
    pub fn parse(token: &str) -> Option<Self> {
        let op = match token {
            "$and" => Self::And,
            "$or" => Self::Or,
            "$nor" => Self::Nor,
            "$not" => Self::Not,
            "$eq" => Self::Eq,
            "$ne" => Self::Ne,
            "$lt" => Self::Lt,
            "$lte" => Self::Lte,
            "$gt" => Self::Gt,
            "$gte" => Self::Gte,
            "$in" => Self::In,
            "$nin" => Self::Nin,
            "$all" => Self::All,
            "$size" => Self::Size,
            "$elemMatch" => Self::ElemMatch,
            "$exists" => Self::Exists,
            "$type" => Self::Type,
            "$regex" => Self::Regex,
            "$veq" => Self::VersionEq,
            "$vne" => Self::VersionNe,
            "$vgt" => Self::VersionGt,
            "$vgte" => Self::VersionGte,
            "$vlt" => Self::VersionLt,
            "$vlte" => Self::VersionLte,
            "$inGroup" => Self::InGroup,
            "$notInGroup" => Self::NotInGroup,
            _ => return None,
        };
        Some(op)
    }

    /// Operators that combine whole clauses rather than test a value.
    pub fn is_logical(&self) -> bool {
        matches!(self, Self::And | Self::Or | Self::Nor | Self::Not)
    }

    pub fn is_version(&self) -> bool {
        matches!(
            self,
            Self::VersionEq
                | Self::VersionNe
                | Self::VersionGt
                | Self::VersionGte
                | Self::VersionLt
                | Self::VersionLte
        )
    }
}

/// True for `{ "$op": ..., ... }` objects where every key is an operator token.
pub fn is_operator_object(value: &serde_json::Value) -> bool {
    match value.as_object() {
        Some(map) => !map.is_empty() && map.keys().all(|k| k.starts_with('$')),
        None => false,
    }
}
