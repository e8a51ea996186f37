//! Filter / ORDER BY pushdown encoder (component K).

use mssql_types::SqlValue;

use crate::error::{CatalogError, Result};

/// Maximum AND/OR nesting depth the encoder will recurse through before
/// giving up; the source rule is "no recursive guarantee beyond depth
/// 100".
pub const MAX_PUSHDOWN_DEPTH: usize = 100;

/// Whitelisted scalar function translations: host name -> T-SQL template,
/// `{0}`/`{1}` substituted positionally. Mirrors
/// `tds_protocol::types::TypeId`'s fixed lookup-table style.
const FUNCTION_TEMPLATES: &[(&str, &str)] = &[
    ("lower", "LOWER({0})"),
    ("upper", "UPPER({0})"),
    ("length", "LEN({0})"),
    ("trim", "LTRIM(RTRIM({0}))"),
    ("year", "YEAR({0})"),
    ("date_diff", "DATEDIFF({0}, {1}, {2})"),
    ("date_add", "DATEADD({1}, {2}, {0})"),
];

fn function_template(name: &str) -> Option<&'static str> {
    FUNCTION_TEMPLATES
        .iter()
        .find(|(fname, _)| *fname == name)
        .map(|(_, template)| *template)
}

/// Comparison operators pushable 1:1 to T-SQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// `=`
    Eq,
    /// `<>`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
}

impl CompareOp {
    fn as_sql(self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "<>",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        }
    }
}

/// A host filter tree, mirroring the shapes named in the pushdown rules:
/// comparison, IS NULL, IN, AND/OR, function call, LIKE/ILIKE.
#[derive(Debug, Clone)]
pub enum FilterExpr {
    /// `column op literal`.
    Compare {
        /// Bare column reference.
        column: String,
        /// Comparison operator.
        op: CompareOp,
        /// Typed literal value.
        value: SqlValue,
    },
    /// `column IS NULL`.
    IsNull {
        /// Column reference.
        column: String,
    },
    /// `column IS NOT NULL`.
    IsNotNull {
        /// Column reference.
        column: String,
    },
    /// `column IN (values)`.
    In {
        /// Column reference.
        column: String,
        /// Candidate values.
        values: Vec<SqlValue>,
    },
    /// `column LIKE pattern` (case-sensitive) or, if `case_insensitive`,
    /// `LOWER(column) LIKE LOWER(pattern)`.
    Like {
        /// Column reference.
        column: String,
        /// LIKE pattern.
        pattern: String,
        /// Whether this came from an `ILIKE`.
        case_insensitive: bool,
    },
    /// A whitelisted function call compared against a literal, e.g.
    /// `year(col) = 2026`.
    FunctionCompare {
        /// Function name (host-side name, looked up in
        /// [`FUNCTION_TEMPLATES`]).
        function: String,
        /// Arguments to the function (bare column references).
        args: Vec<String>,
        /// Comparison operator applied to the function's result.
        op: CompareOp,
        /// Literal compared against.
        value: SqlValue,
    },
    /// Conjunction: children that fail to encode are dropped, and
    /// `needs_host_recheck` is set rather than failing the whole clause.
    And(Vec<FilterExpr>),
    /// Disjunction: if any child fails to encode, the whole OR is
    /// dropped (partial OR pushdown is unsound).
    Or(Vec<FilterExpr>),
}

/// An ORDER BY key: a column or whitelisted single-argument function,
/// plus direction.
#[derive(Debug, Clone)]
pub struct OrderKey {
    /// Column reference, or the sole argument to a whitelisted function.
    pub column: String,
    /// Function wrapping the column, if any (e.g. `"year"`).
    pub function: Option<String>,
    /// Descending if true, ascending otherwise.
    pub descending: bool,
    /// Whether nulls sort first. `None` means "use the server default",
    /// which is the only form that can be pushed — an explicit
    /// first/last that doesn't match SQL Server's default for the
    /// column's nullability cannot be pushed.
    pub nulls_first: Option<bool>,
}

/// Output of the pushdown encoder.
#[derive(Debug, Clone, Default)]
pub struct EncodedPredicate {
    /// Generated `WHERE` clause body (no leading `WHERE`), or empty if
    /// nothing was pushable.
    pub where_clause: String,
    /// Generated `ORDER BY` clause body (no leading `ORDER BY`), or empty.
    pub order_by_clause: String,
    /// `TOP N` value, if a limit was supplied alongside an ORDER BY.
    pub top_n: Option<u64>,
    /// Whether the host must re-apply its own filter/order to the
    /// streamed rows because some part could not be pushed.
    pub needs_host_recheck: bool,
}

/// Encodes host filter/order trees into T-SQL fragments.
///
/// Never interpolates a value unescaped: literals go through
/// [`sql_literal`] and identifiers through [`bracket_identifier`].
pub struct PushdownEncoder;

impl PushdownEncoder {
    /// Encode a filter tree into a `WHERE` clause body.
    pub fn encode_filter(expr: &FilterExpr) -> Result<EncodedPredicate> {
        let mut recheck = false;
        let clause = Self::encode_expr(expr, 0, &mut recheck)?;
        Ok(EncodedPredicate {
            where_clause: clause.unwrap_or_default(),
            needs_host_recheck: recheck,
            ..Default::default()
        })
    }

    fn encode_expr(expr: &FilterExpr, depth: usize, recheck: &mut bool) -> Result<Option<String>> {
        if depth > MAX_PUSHDOWN_DEPTH {
            return Err(CatalogError::FilterPushdownDepthExceeded {
                max: MAX_PUSHDOWN_DEPTH,
            });
        }

        let encoded = match expr {
            FilterExpr::Compare { column, op, value } => Some(format!(
                "{} {} {}",
                bracket_identifier(column),
                op.as_sql(),
                sql_literal(value)
            )),
            FilterExpr::IsNull { column } => {
                Some(format!("{} IS NULL", bracket_identifier(column)))
            }
            FilterExpr::IsNotNull { column } => {
                Some(format!("{} IS NOT NULL", bracket_identifier(column)))
            }
            FilterExpr::In { column, values } => {
                let items: Vec<String> = values.iter().map(sql_literal).collect();
                Some(format!(
                    "{} IN ({})",
                    bracket_identifier(column),
                    items.join(", ")
                ))
            }
            FilterExpr::Like {
                column,
                pattern,
                case_insensitive,
            } => {
                let col = bracket_identifier(column);
                let lit = sql_string_literal(pattern);
                if *case_insensitive {
                    Some(format!("LOWER({col}) LIKE LOWER({lit})"))
                } else {
                    Some(format!("{col} LIKE {lit}"))
                }
            }
            FilterExpr::FunctionCompare {
                function,
                args,
                op,
                value,
            } => match function_template(function) {
                Some(template) => {
                    let rendered = render_template(template, args);
                    Some(format!("{} {} {}", rendered, op.as_sql(), sql_literal(value)))
                }
                None => {
                    *recheck = true;
                    None
                }
            },
            FilterExpr::And(children) => {
                let mut parts = Vec::with_capacity(children.len());
                for child in children {
                    match Self::encode_expr(child, depth + 1, recheck)? {
                        Some(part) => parts.push(part),
                        None => *recheck = true,
                    }
                }
                if parts.is_empty() {
                    None
                } else {
                    Some(format!("({})", parts.join(" AND ")))
                }
            }
            FilterExpr::Or(children) => {
                let mut parts = Vec::with_capacity(children.len());
                let mut all_pushable = true;
                for child in children {
                    match Self::encode_expr(child, depth + 1, recheck)? {
                        Some(part) => parts.push(part),
                        None => {
                            all_pushable = false;
                            break;
                        }
                    }
                }
                if all_pushable && !parts.is_empty() {
                    Some(format!("({})", parts.join(" OR ")))
                } else {
                    *recheck = true;
                    None
                }
            }
        };

        Ok(encoded)
    }

    /// Encode an ORDER BY list plus an optional row limit.
    pub fn encode_order_by(keys: &[OrderKey], limit: Option<u64>) -> EncodedPredicate {
        let mut recheck = false;
        let mut parts = Vec::with_capacity(keys.len());

        for key in keys {
            // An explicit NULLS FIRST/LAST that doesn't match the
            // server's default for the column is unpushable; since this
            // encoder has no nullability metadata for the column, only
            // the "use server default" form (`nulls_first: None`) is
            // ever pushed.
            if key.nulls_first.is_some() {
                recheck = true;
                continue;
            }

            let column = match &key.function {
                Some(function) => match function_template(function) {
                    Some(template) => render_template(template, std::slice::from_ref(&key.column)),
                    None => {
                        recheck = true;
                        continue;
                    }
                },
                None => bracket_identifier(&key.column),
            };

            let direction = if key.descending { "DESC" } else { "ASC" };
            parts.push(format!("{column} {direction}"));
        }

        let order_by_clause = parts.join(", ");
        let top_n = if limit.is_some() && !order_by_clause.is_empty() {
            limit
        } else {
            None
        };

        EncodedPredicate {
            order_by_clause,
            top_n,
            needs_host_recheck: recheck,
            ..Default::default()
        }
    }
}

fn render_template(template: &str, args: &[String]) -> String {
    let mut rendered = template.to_string();
    for (i, arg) in args.iter().enumerate() {
        rendered = rendered.replace(&format!("{{{i}}}"), &bracket_identifier(arg));
    }
    rendered
}

/// Bracket a bare identifier for safe interpolation, e.g. `name` ->
/// `[name]`. Any literal `]` in the identifier is doubled, matching
/// T-SQL's own escaping rule for bracketed identifiers.
pub fn bracket_identifier(ident: &str) -> String {
    format!("[{}]", ident.replace(']', "]]"))
}

/// Render a [`SqlValue`] as a T-SQL literal. Strings are always
/// `N'...'` with embedded quotes doubled; no value is ever interpolated
/// unescaped.
pub fn sql_literal(value: &SqlValue) -> String {
    match value {
        SqlValue::Null => "NULL".to_string(),
        SqlValue::Bool(b) => if *b { "1" } else { "0" }.to_string(),
        SqlValue::TinyInt(v) => v.to_string(),
        SqlValue::SmallInt(v) => v.to_string(),
        SqlValue::Int(v) => v.to_string(),
        SqlValue::BigInt(v) => v.to_string(),
        SqlValue::Float(v) => v.to_string(),
        SqlValue::Double(v) => v.to_string(),
        SqlValue::String(s) => sql_string_literal(s),
        other => sql_string_literal(&format!("{other:?}")),
    }
}

fn sql_string_literal(s: &str) -> String {
    format!("N'{}'", s.replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_comparison_pushes() {
        let expr = FilterExpr::Compare {
            column: "a".into(),
            op: CompareOp::Eq,
            value: SqlValue::Int(1),
        };
        let encoded = PushdownEncoder::encode_filter(&expr).unwrap();
        assert_eq!(encoded.where_clause, "[a] = 1");
        assert!(!encoded.needs_host_recheck);
    }

    #[test]
    fn or_with_unsupported_branch_is_dropped_entirely() {
        // Scenario: `a = 1 OR unsupported(b) = 2`.
        let expr = FilterExpr::Or(vec![
            FilterExpr::Compare {
                column: "a".into(),
                op: CompareOp::Eq,
                value: SqlValue::Int(1),
            },
            FilterExpr::FunctionCompare {
                function: "unsupported".into(),
                args: vec!["b".into()],
                op: CompareOp::Eq,
                value: SqlValue::Int(2),
            },
        ]);

        let encoded = PushdownEncoder::encode_filter(&expr).unwrap();
        assert_eq!(encoded.where_clause, "");
        assert!(encoded.needs_host_recheck);
    }

    #[test]
    fn and_drops_only_the_unpushable_child() {
        let expr = FilterExpr::And(vec![
            FilterExpr::Compare {
                column: "a".into(),
                op: CompareOp::Eq,
                value: SqlValue::Int(1),
            },
            FilterExpr::FunctionCompare {
                function: "unsupported".into(),
                args: vec!["b".into()],
                op: CompareOp::Eq,
                value: SqlValue::Int(2),
            },
        ]);

        let encoded = PushdownEncoder::encode_filter(&expr).unwrap();
        assert_eq!(encoded.where_clause, "([a] = 1)");
        assert!(encoded.needs_host_recheck);
    }

    #[test]
    fn ilike_lowercases_both_sides() {
        let expr = FilterExpr::Like {
            column: "name".into(),
            pattern: "%smith%".into(),
            case_insensitive: true,
        };
        let encoded = PushdownEncoder::encode_filter(&expr).unwrap();
        assert_eq!(encoded.where_clause, "LOWER([name]) LIKE LOWER(N'%smith%')");
    }

    #[test]
    fn string_literal_escapes_quotes() {
        assert_eq!(sql_literal(&SqlValue::String("it's".into())), "N'it''s'");
    }

    #[test]
    fn whitelisted_function_renders_template() {
        let expr = FilterExpr::FunctionCompare {
            function: "year".into(),
            args: vec!["created_at".into()],
            op: CompareOp::Eq,
            value: SqlValue::Int(2026),
        };
        let encoded = PushdownEncoder::encode_filter(&expr).unwrap();
        assert_eq!(encoded.where_clause, "YEAR([created_at]) = 2026");
    }

    #[test]
    fn order_by_with_limit_becomes_top_n() {
        let keys = vec![OrderKey {
            column: "id".into(),
            function: None,
            descending: false,
            nulls_first: None,
        }];
        let encoded = PushdownEncoder::encode_order_by(&keys, Some(10));
        assert_eq!(encoded.order_by_clause, "[id] ASC");
        assert_eq!(encoded.top_n, Some(10));
        assert!(!encoded.needs_host_recheck);
    }

    #[test]
    fn explicit_nulls_ordering_is_dropped_and_rechecked() {
        let keys = vec![OrderKey {
            column: "id".into(),
            function: None,
            descending: false,
            nulls_first: Some(true),
        }];
        let encoded = PushdownEncoder::encode_order_by(&keys, None);
        assert_eq!(encoded.order_by_clause, "");
        assert!(encoded.needs_host_recheck);
    }

    #[test]
    fn depth_limit_is_enforced() {
        let mut expr = FilterExpr::Compare {
            column: "a".into(),
            op: CompareOp::Eq,
            value: SqlValue::Int(1),
        };
        for _ in 0..MAX_PUSHDOWN_DEPTH + 2 {
            expr = FilterExpr::And(vec![expr]);
        }
        let result = PushdownEncoder::encode_filter(&expr);
        assert!(matches!(
            result,
            Err(CatalogError::FilterPushdownDepthExceeded { .. })
        ));
    }
}
