//! Type and default-value normalization used by the significance test.

use std::sync::LazyLock;

use regex_lite::Regex;

use crate::model::Column;

/// Broad type families. A type change only matters when it crosses families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeFamily {
    String,
    Integer,
    Decimal,
    Boolean,
    Temporal,
    Json,
    Uuid,
    Binary,
}

static SIZE_SUFFIX_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s*\([^)]*\)").unwrap());

static TRAILING_CAST_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?:::[a-zA-Z_][\w ]*(?:\[\])?(?:\([^)]*\))?)+$"#).unwrap());

/// Strip size/precision suffixes and array brackets, lowercase, collapse whitespace.
///
/// `VARCHAR(255)` becomes `varchar`, `numeric(10, 2)[]` becomes `numeric`.
pub fn base_type(raw: &str) -> String {
    let lowered = raw.trim().to_lowercase();
    let stripped = SIZE_SUFFIX_RE.replace_all(&lowered, "");
    let stripped = stripped.trim_end_matches("[]");
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Map known spellings of the same type to one canonical name.
pub fn canonical_type(raw: &str) -> String {
    let base = base_type(raw);
    let canonical = match base.as_str() {
        "varchar" | "character varying" | "text" | "string" => "text",
        "char" | "character" | "bpchar" => "char",
        "int" | "integer" | "int4" | "serial" | "serial4" => "integer",
        "smallint" | "int2" | "smallserial" | "serial2" => "smallint",
        "bigint" | "int8" | "bigserial" | "serial8" => "bigint",
        "decimal" | "numeric" => "numeric",
        "real" | "float4" => "real",
        "double precision" | "float8" | "float" | "double" => "double precision",
        "bool" | "boolean" => "boolean",
        "timestamp" | "timestamp without time zone" => "timestamp",
        "timestamptz" | "timestamp with time zone" => "timestamptz",
        "time" | "time without time zone" => "time",
        "timetz" | "time with time zone" => "timetz",
        "bytea" | "blob" | "binary" => "bytea",
        other => other,
    };
    canonical.to_string()
}

/// Family of a canonical type, `None` when the type is not recognized.
pub fn type_family(raw: &str) -> Option<TypeFamily> {
    match canonical_type(raw).as_str() {
        "text" | "char" | "citext" | "name" => Some(TypeFamily::String),
        "integer" | "smallint" | "bigint" => Some(TypeFamily::Integer),
        "numeric" | "real" | "double precision" | "money" => Some(TypeFamily::Decimal),
        "boolean" => Some(TypeFamily::Boolean),
        "timestamp" | "timestamptz" | "date" | "time" | "timetz" | "interval" => {
            Some(TypeFamily::Temporal)
        }
        "json" | "jsonb" => Some(TypeFamily::Json),
        "uuid" => Some(TypeFamily::Uuid),
        "bytea" => Some(TypeFamily::Binary),
        _ => None,
    }
}

/// Whether two spellings name the same type.
pub fn types_equivalent(a: &str, b: &str) -> bool {
    canonical_type(a) == canonical_type(b)
}

/// Whether changing `existing` to `desired` is worth a `ModifyColumn`.
///
/// Equivalent spellings and changes inside one family are ignored, as are
/// types with no known family.
pub fn is_significant_type_change(desired: &str, existing: &str) -> bool {
    if types_equivalent(desired, existing) {
        return false;
    }
    match (type_family(desired), type_family(existing)) {
        (Some(a), Some(b)) => a != b,
        _ => false,
    }
}

/// Whether a declared type is an auto-incrementing serial.
pub fn is_serial_type(raw: &str) -> bool {
    matches!(
        base_type(raw).as_str(),
        "serial" | "serial2" | "serial4" | "serial8" | "smallserial" | "bigserial"
    )
}

/// Normalize a default expression for comparison.
///
/// Trims, strips trailing `::type` casts and surrounding quotes, and
/// lowercases function calls. A `NULL` default is the same as none.
pub fn normalize_default(raw: Option<&str>) -> Option<String> {
    let value = raw?.trim();
    if value.is_empty() {
        return None;
    }
    let mut value = TRAILING_CAST_RE.replace(value, "").trim().to_string();
    if value.len() >= 2 && value.starts_with('(') && value.ends_with(')') && !value.contains("::")
    {
        let inner = value[1..value.len() - 1].trim().to_string();
        if !inner.contains('(') && !inner.contains(')') {
            value = inner;
        }
    }
    if value.len() >= 2
        && ((value.starts_with('\'') && value.ends_with('\''))
            || (value.starts_with('"') && value.ends_with('"')))
    {
        value = value[1..value.len() - 1].to_string();
    }
    if value.contains('(') {
        value = value.to_lowercase();
    }
    if value.eq_ignore_ascii_case("null") {
        return None;
    }
    Some(value)
}

fn default_class(value: &str) -> Option<&'static str> {
    match value.to_lowercase().as_str() {
        "now()" | "current_timestamp" | "current_timestamp()" => Some("now"),
        "true" | "1" | "yes" | "t" => Some("true"),
        "false" | "0" | "no" | "f" => Some("false"),
        _ => None,
    }
}

/// Whether two raw defaults are the same after normalization.
///
/// `desired_type` lets a serial column absorb the `nextval(...)` default
/// the server attaches to it.
pub fn defaults_equivalent(desired: Option<&str>, existing: Option<&str>, desired_type: &str) -> bool {
    let desired = normalize_default(desired);
    let existing = normalize_default(existing);

    if desired.is_none() && is_serial_type(desired_type) {
        if let Some(ref e) = existing {
            if e.starts_with("nextval(") {
                return true;
            }
        }
    }

    match (desired, existing) {
        (None, None) => true,
        (Some(a), Some(b)) => {
            if a == b {
                return true;
            }
            match (default_class(&a), default_class(&b)) {
                (Some(x), Some(y)) => x == y,
                _ => false,
            }
        }
        _ => false,
    }
}

/// Attribute-level differences between two column definitions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ColumnDelta {
    pub type_changed: bool,
    pub nullability_changed: bool,
    pub default_changed: bool,
}

impl ColumnDelta {
    pub fn is_empty(&self) -> bool {
        !(self.type_changed || self.nullability_changed || self.default_changed)
    }
}

/// Whether the server will hold `col` NOT NULL: declared so, a primary key,
/// or a serial (which PostgreSQL always creates NOT NULL).
pub fn implies_not_null(col: &Column) -> bool {
    col.not_null || col.primary || is_serial_type(&col.data_type)
}

/// Compare `from` (current) with `to` (wanted).
///
/// Shared by reconciliation and SQL synthesis so that every reported
/// change has something to emit.
pub fn column_delta(from: &Column, to: &Column) -> ColumnDelta {
    ColumnDelta {
        type_changed: is_significant_type_change(&to.data_type, &from.data_type),
        nullability_changed: implies_not_null(to) != implies_not_null(from),
        default_changed: !defaults_equivalent(
            to.default.as_deref(),
            from.default.as_deref(),
            &to.data_type,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_type_strips_suffixes() {
        assert_eq!(base_type("VARCHAR(255)"), "varchar");
        assert_eq!(base_type(" numeric(10, 2) "), "numeric");
        assert_eq!(base_type("text[]"), "text");
        assert_eq!(base_type("timestamp(3)   with time zone"), "timestamp with time zone");
    }

    #[test]
    fn test_equivalent_spellings() {
        assert!(types_equivalent("varchar(255)", "text"));
        assert!(types_equivalent("character varying", "text"));
        assert!(types_equivalent("int", "int4"));
        assert!(types_equivalent("serial", "integer"));
        assert!(types_equivalent("bigserial", "int8"));
        assert!(types_equivalent("timestamp", "timestamp without time zone"));
        assert!(types_equivalent("timestamptz", "timestamp with time zone"));
        assert!(types_equivalent("bool", "boolean"));
        assert!(!types_equivalent("timestamp", "timestamptz"));
    }

    #[test]
    fn test_significant_type_change_crosses_family() {
        assert!(is_significant_type_change("integer", "text"));
        assert!(is_significant_type_change("timestamp", "boolean"));
        assert!(is_significant_type_change("uuid", "character varying"));
        assert!(is_significant_type_change("jsonb", "text"));
    }

    #[test]
    fn test_same_family_change_not_significant() {
        assert!(!is_significant_type_change("bigint", "integer"));
        assert!(!is_significant_type_change("varchar(50)", "text"));
        assert!(!is_significant_type_change("timestamptz", "timestamp without time zone"));
        assert!(!is_significant_type_change("numeric", "double precision"));
        assert!(!is_significant_type_change("json", "jsonb"));
    }

    #[test]
    fn test_unknown_family_not_significant() {
        assert!(!is_significant_type_change("mood", "text"));
        assert!(!is_significant_type_change("integer", "tsvector"));
    }

    #[test]
    fn test_normalize_default() {
        assert_eq!(normalize_default(Some("'x'::text")).as_deref(), Some("x"));
        assert_eq!(
            normalize_default(Some("'draft'::character varying")).as_deref(),
            Some("draft")
        );
        assert_eq!(normalize_default(Some("  NOW()  ")).as_deref(), Some("now()"));
        assert_eq!(normalize_default(Some("NULL")), None);
        assert_eq!(normalize_default(Some("NULL::text")), None);
        assert_eq!(normalize_default(Some("")), None);
        assert_eq!(normalize_default(None), None);
        assert_eq!(normalize_default(Some("0")).as_deref(), Some("0"));
        assert_eq!(normalize_default(Some("'{}'::jsonb")).as_deref(), Some("{}"));
        assert_eq!(
            normalize_default(Some("'2024-01-01 00:00:00'::timestamp without time zone"))
                .as_deref(),
            Some("2024-01-01 00:00:00")
        );
    }

    #[test]
    fn test_defaults_equivalence_table() {
        assert!(defaults_equivalent(Some("now()"), Some("CURRENT_TIMESTAMP"), "timestamp"));
        assert!(defaults_equivalent(Some("current_timestamp()"), Some("now()"), "timestamptz"));
        assert!(defaults_equivalent(Some("true"), Some("1"), "boolean"));
        assert!(defaults_equivalent(Some("yes"), Some("t"), "boolean"));
        assert!(defaults_equivalent(Some("false"), Some("0"), "boolean"));
        assert!(defaults_equivalent(Some("'x'"), Some("'x'::text"), "text"));
        assert!(!defaults_equivalent(Some("true"), Some("false"), "boolean"));
        assert!(!defaults_equivalent(Some("a"), None, "text"));
        assert!(defaults_equivalent(None, Some("NULL"), "text"));
    }

    #[test]
    fn test_serial_absorbs_nextval() {
        assert!(defaults_equivalent(
            None,
            Some("nextval('users_id_seq'::regclass)"),
            "serial"
        ));
        assert!(!defaults_equivalent(
            None,
            Some("nextval('users_id_seq'::regclass)"),
            "integer"
        ));
    }

    fn column(name: &str, ty: &str, not_null: bool, default: Option<&str>) -> Column {
        let mut c = Column::new(name, ty);
        c.not_null = not_null;
        c.default = default.map(str::to_string);
        c
    }

    #[test]
    fn test_column_delta_ignores_same_family_type() {
        let from = column("n", "bigint", false, None);
        let to = column("n", "integer", true, None);
        let delta = column_delta(&from, &to);
        assert!(!delta.type_changed);
        assert!(delta.nullability_changed);
        assert!(!delta.default_changed);
    }

    #[test]
    fn test_column_delta_serial_implies_not_null() {
        let from = column("seq", "integer", true, Some("nextval('items_seq_seq'::regclass)"));
        let to = column("seq", "serial", false, None);
        assert!(column_delta(&from, &to).is_empty());
    }

    #[test]
    fn test_column_delta_sequence_default_on_plain_integer() {
        let from = column("n", "integer", true, Some("nextval('t_n_seq'::regclass)"));
        let to = column("n", "integer", true, None);
        let delta = column_delta(&from, &to);
        assert!(delta.default_changed);
        assert!(!delta.type_changed);
        assert!(!delta.nullability_changed);
    }
}
