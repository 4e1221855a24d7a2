//! Dialect capability descriptors.
//!
//! A [`Dialect`] is a small table of syntax rules passed into the renderer
//! and the relational planner: identifier quoting, placeholder style, JSON
//! aggregation function names, and whether correlated sub-selects may appear
//! in the select list (the "lateral" relational strategy).

use std::borrow::Cow;
use std::fmt::Write;

/// Placeholder syntax for bound parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlaceholderStyle {
    /// `?` for every parameter (SQLite, MySQL).
    Positional,
    /// `$1`, `$2`, ... numbered sequentially across the whole statement
    /// (PostgreSQL).
    Numbered,
}

/// Identifier quoting style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QuoteStyle {
    /// `"ident"` (PostgreSQL, SQLite).
    Double,
    /// `` `ident` `` (MySQL).
    Backtick,
}

/// JSON construction/aggregation function names used by the relational
/// planner's correlated sub-selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JsonSyntax {
    /// `json_build_object` / `json_object`.
    pub object_fn: &'static str,
    /// `json_agg` / `json_group_array` / `json_arrayagg`.
    pub array_agg_fn: &'static str,
    /// Empty-array literal used under `coalesce` when the aggregate sees no
    /// rows, e.g. `'[]'::json` or `json_array()`.
    pub empty_array: &'static str,
    /// Suffix cast applied so the driver reads aggregated JSON as text.
    pub text_cast: &'static str,
    /// Function wrapping a nested sub-select so its JSON text nests as a
    /// JSON subcomponent instead of a quoted string (`json` on SQLite;
    /// empty where aggregates already carry a JSON type).
    pub nested_json_fn: &'static str,
}

/// Syntax rules for one target SQL engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dialect {
    pub name: &'static str,
    pub quote: QuoteStyle,
    pub placeholders: PlaceholderStyle,
    /// Whether correlated sub-selects in the select list are available, i.e.
    /// whether a nested selection compiles to one query instead of per-level
    /// round trips.
    pub supports_lateral: bool,
    /// Whether `ILIKE` exists. Dialects without it use `LIKE`, which is
    /// already case-insensitive for ASCII on SQLite and under MySQL's
    /// default collations.
    pub supports_ilike: bool,
    /// Whether `count(*)` needs an `::int` cast to come back as an integer.
    pub casts_count_to_int: bool,
    /// Whether write statements may carry a `RETURNING` clause.
    pub supports_returning: bool,
    pub json: JsonSyntax,
}

impl Dialect {
    pub const POSTGRES: Dialect = Dialect {
        name: "postgres",
        quote: QuoteStyle::Double,
        placeholders: PlaceholderStyle::Numbered,
        supports_lateral: true,
        supports_ilike: true,
        casts_count_to_int: true,
        supports_returning: true,
        json: JsonSyntax {
            object_fn: "json_build_object",
            array_agg_fn: "json_agg",
            empty_array: "'[]'::json",
            text_cast: "::text",
            nested_json_fn: "",
        },
    };

    pub const SQLITE: Dialect = Dialect {
        name: "sqlite",
        quote: QuoteStyle::Double,
        placeholders: PlaceholderStyle::Positional,
        supports_lateral: true,
        supports_ilike: false,
        casts_count_to_int: false,
        supports_returning: true,
        json: JsonSyntax {
            object_fn: "json_object",
            array_agg_fn: "json_group_array",
            empty_array: "json_array()",
            text_cast: "",
            nested_json_fn: "json",
        },
    };

    pub const MYSQL: Dialect = Dialect {
        name: "mysql",
        quote: QuoteStyle::Backtick,
        placeholders: PlaceholderStyle::Positional,
        supports_lateral: false,
        supports_ilike: false,
        casts_count_to_int: false,
        supports_returning: false,
        json: JsonSyntax {
            object_fn: "json_object",
            array_agg_fn: "json_arrayagg",
            empty_array: "json_array()",
            text_cast: "",
            nested_json_fn: "",
        },
    };

    /// Writes `ident` quoted for this dialect into `buf`. Embedded quote
    /// characters are doubled.
    pub fn write_ident(&self, ident: &str, buf: &mut String) {
        let q = match self.quote {
            QuoteStyle::Double => '"',
            QuoteStyle::Backtick => '`',
        };
        buf.push(q);
        for c in ident.chars() {
            buf.push(c);
            if c == q {
                buf.push(q);
            }
        }
        buf.push(q);
    }

    /// Returns `ident` quoted for this dialect.
    pub fn quote_ident(&self, ident: &str) -> String {
        let mut buf = String::with_capacity(ident.len() + 2);
        self.write_ident(ident, &mut buf);
        buf
    }

    /// Renders the placeholder for the 1-based parameter `index`.
    ///
    /// Zero allocation for positional dialects.
    pub fn placeholder(&self, index: usize) -> Cow<'static, str> {
        match self.placeholders {
            PlaceholderStyle::Positional => Cow::Borrowed("?"),
            PlaceholderStyle::Numbered => {
                let mut s = String::with_capacity(3);
                let _ = write!(s, "${index}");
                Cow::Owned(s)
            }
        }
    }
}
