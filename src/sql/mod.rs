//! SQL `UPDATE` command construction from mapped objects.
//!
//! The downstream consumer of the engine's plan metadata: it requests an
//! extractor mapper for `(S, ParamSink)` - whose plan consists solely of
//! read leaves - derives the `SET` column list from the leaf enumeration
//! (stable, declaration order), renders the command text and binds one
//! named parameter per column from the extracted values.
//!
//! Identifiers cannot be parameterized in SQL; they are validated and
//! quoted before being spliced into command text. Parameter *values* always
//! travel as bound [`SqlParam`]s, never as text.

use std::any::Any;
use std::collections::HashSet;

use crate::exec::MapperHandle;
use crate::manager::MapperManager;
use crate::reflect::{ParamSink, Reflect};
use crate::{Error, MappingConfig, Result};

/// Maximum identifier length (conservative limit across databases).
const MAX_IDENTIFIER_LENGTH: usize = 128;

/// A bound parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    /// Signed integer of any width
    Int(i64),
    /// Floating point of any width
    Float(f64),
    /// Character data
    Text(String),
    /// Boolean
    Bool(bool),
    /// Absent value
    Null,
}

impl SqlParam {
    /// Convert an extracted member value into a bindable parameter.
    ///
    /// # Errors
    /// Returns [`Error::Sql`] for member types with no SQL representation
    /// and for unsigned values exceeding the signed integer range.
    pub fn from_value(value: Option<Box<dyn Any>>) -> Result<SqlParam> {
        let Some(value) = value else {
            return Ok(SqlParam::Null);
        };

        macro_rules! try_int {
            ($($ty:ty),*) => {
                $(
                    if let Some(v) = value.downcast_ref::<$ty>() {
                        return i64::try_from(*v)
                            .map(SqlParam::Int)
                            .map_err(|_| Error::Sql(format!("value {v} exceeds the bindable integer range")));
                    }
                )*
            };
        }

        try_int!(i8, i16, i32, i64, u8, u16, u32, u64, isize, usize);

        if let Some(v) = value.downcast_ref::<f64>() {
            return Ok(SqlParam::Float(*v));
        }
        if let Some(v) = value.downcast_ref::<f32>() {
            return Ok(SqlParam::Float(f64::from(*v)));
        }
        if let Some(v) = value.downcast_ref::<bool>() {
            return Ok(SqlParam::Bool(*v));
        }
        if let Some(v) = value.downcast_ref::<char>() {
            return Ok(SqlParam::Text(v.to_string()));
        }
        if let Some(v) = value.downcast_ref::<String>() {
            return Ok(SqlParam::Text(v.clone()));
        }

        Err(Error::Sql("unsupported parameter value type".to_string()))
    }
}

/// A command the adapter writes text and parameters into.
pub trait DbCommand {
    /// Set the command text.
    fn set_text(&mut self, text: String);

    /// Bind a named parameter.
    fn bind(&mut self, name: String, value: SqlParam);
}

/// Plain value implementation of [`DbCommand`].
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SqlCommand {
    /// The command text, empty until set
    pub text: String,
    /// Bound parameters in bind order
    pub parameters: Vec<(String, SqlParam)>,
}

impl DbCommand for SqlCommand {
    fn set_text(&mut self, text: String) {
        self.text = text;
    }

    fn bind(&mut self, name: String, value: SqlParam) {
        self.parameters.push((name, value));
    }
}

/// Identifier quoting style.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteStyle {
    /// `"name"` with embedded quotes doubled
    DoubleQuote,
    /// `[name]` with embedded closing brackets doubled
    Bracket,
    /// `` `name` `` with embedded backticks doubled
    Backtick,
}

/// Database-specific rendering settings.
#[derive(Debug, Clone, Copy)]
pub struct DbSettings {
    /// How identifiers are quoted
    pub quote: QuoteStyle,
    /// Prefix of named parameters
    pub param_prefix: char,
}

impl DbSettings {
    /// PostgreSQL-style settings: double-quoted identifiers.
    #[must_use]
    pub fn postgres() -> Self {
        DbSettings {
            quote: QuoteStyle::DoubleQuote,
            param_prefix: '@',
        }
    }

    /// SQL Server-style settings: bracketed identifiers.
    #[must_use]
    pub fn mssql() -> Self {
        DbSettings {
            quote: QuoteStyle::Bracket,
            param_prefix: '@',
        }
    }

    /// Quote an identifier after validating it.
    ///
    /// # Errors
    /// Returns [`Error::Sql`] for empty identifiers, identifiers containing
    /// null bytes, or identifiers exceeding the maximum length.
    pub fn escape(&self, ident: &str) -> Result<String> {
        validate_identifier(ident)?;
        Ok(match self.quote {
            QuoteStyle::DoubleQuote => format!("\"{}\"", ident.replace('"', "\"\"")),
            QuoteStyle::Bracket => format!("[{}]", ident.replace(']', "]]")),
            QuoteStyle::Backtick => format!("`{}`", ident.replace('`', "``")),
        })
    }

    /// Render a named parameter reference.
    #[must_use]
    pub fn param(&self, name: &str) -> String {
        format!("{}{}", self.param_prefix, name)
    }
}

impl Default for DbSettings {
    fn default() -> Self {
        DbSettings::postgres()
    }
}

/// Validate an identifier before it is spliced into command text.
fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::Sql("identifier cannot be empty".to_string()));
    }
    if name.contains('\0') {
        return Err(Error::Sql(format!(
            "identifier contains null byte: {name:?}"
        )));
    }
    if name.len() > MAX_IDENTIFIER_LENGTH {
        return Err(Error::Sql(format!(
            "identifier exceeds {MAX_IDENTIFIER_LENGTH} bytes: {name:?}"
        )));
    }
    Ok(())
}

/// Reports which members of an object changed since it was loaded.
pub trait ChangeTracker {
    /// Names of the changed members.
    fn changes(&self, obj: &dyn Any) -> Vec<String>;
}

/// Build an `UPDATE` statement for `obj` into `cmd`.
///
/// The `SET` columns are the object's readable members in plan declaration
/// order, filtered by the include/exclude lists and, when a change tracker
/// is supplied, intersected with its reported changes. Id fields are always
/// part of the effective include set, never of the `SET` list, and form the
/// `WHERE` clause. All field-name comparisons are upper-cased.
///
/// Returns `false` without touching `cmd` when the filtered `SET` list is
/// empty; otherwise sets the command text, binds the `SET` parameters in
/// column order followed by the id parameters, and returns `true`.
///
/// # Errors
/// Returns [`Error::Sql`] when an id field is not a readable member of the
/// object or an identifier fails validation, and propagates mapper
/// construction errors.
#[allow(clippy::too_many_arguments)]
pub fn build_update_command<S: Reflect>(
    cmd: &mut dyn DbCommand,
    obj: &S,
    table: &str,
    id_fields: &[&str],
    include_fields: Option<&[&str]>,
    exclude_fields: Option<&[&str]>,
    change_tracker: Option<&dyn ChangeTracker>,
    settings: &DbSettings,
) -> Result<bool> {
    let ids: Vec<String> = id_fields.iter().map(|f| f.to_uppercase()).collect();
    let exclude: HashSet<String> = exclude_fields
        .unwrap_or_default()
        .iter()
        .map(|f| f.to_uppercase())
        .collect();

    // `None` means "all members"; a change tracker narrows it to its
    // reported changes intersected with the explicit include list.
    let mut include: Option<HashSet<String>> = match (change_tracker, include_fields) {
        (Some(tracker), listed) => {
            let listed: Option<HashSet<String>> =
                listed.map(|l| l.iter().map(|f| f.to_uppercase()).collect());
            Some(
                tracker
                    .changes(obj)
                    .iter()
                    .map(|c| c.to_uppercase())
                    .filter(|c| listed.as_ref().is_none_or(|l| l.contains(c)))
                    .collect(),
            )
        }
        (None, Some(listed)) => Some(listed.iter().map(|f| f.to_uppercase()).collect()),
        (None, None) => None,
    };
    if let Some(set) = &mut include {
        set.extend(ids.iter().cloned());
    }

    let mapper: MapperHandle<S, ParamSink> =
        MapperManager::default_instance().get(&MappingConfig::new())?;

    // (member name, upper-cased column name) in declaration order.
    let columns: Vec<(String, String)> = mapper
        .stored_operations()
        .iter()
        .filter_map(|leaf| leaf.source.as_ref())
        .map(|descriptor| (descriptor.name.to_string(), descriptor.name.to_uppercase()))
        .collect();

    let set_columns: Vec<&(String, String)> = columns
        .iter()
        .filter(|(_, upper)| include.as_ref().is_none_or(|set| set.contains(upper)))
        .filter(|(_, upper)| !ids.contains(upper))
        .filter(|(_, upper)| !exclude.contains(upper))
        .collect();

    if set_columns.is_empty() {
        return Ok(false);
    }

    let id_columns: Vec<&(String, String)> = ids
        .iter()
        .map(|id| {
            columns
                .iter()
                .find(|(_, upper)| upper == id)
                .ok_or_else(|| Error::Sql(format!("unknown id field: {id}")))
        })
        .collect::<Result<_>>()?;

    let set_clause = set_columns
        .iter()
        .map(|(_, upper)| Ok(format!("{}={}", settings.escape(upper)?, settings.param(upper))))
        .collect::<Result<Vec<_>>>()?
        .join(",");
    let where_clause = id_columns
        .iter()
        .map(|(_, upper)| Ok(format!("{}={}", settings.escape(upper)?, settings.param(upper))))
        .collect::<Result<Vec<_>>>()?
        .join(" AND ");

    let mut sink = mapper.map_value(obj)?;
    for (name, upper) in set_columns.iter().chain(id_columns.iter()) {
        let value = sink
            .take(name)
            .ok_or_else(|| Error::Sql(format!("no value extracted for {name}")))?;
        cmd.bind(upper.clone(), SqlParam::from_value(value)?);
    }

    cmd.set_text(format!("UPDATE {table} SET {set_clause} WHERE {where_clause}"));
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_styles() {
        assert_eq!(DbSettings::postgres().escape("users").unwrap(), "\"users\"");
        assert_eq!(
            DbSettings::postgres().escape("ta\"ble").unwrap(),
            "\"ta\"\"ble\""
        );
        assert_eq!(DbSettings::mssql().escape("users").unwrap(), "[users]");
    }

    #[test]
    fn test_escape_rejects_bad_identifiers() {
        let settings = DbSettings::postgres();
        assert!(settings.escape("").is_err());
        assert!(settings.escape("a\0b").is_err());
        assert!(settings.escape(&"x".repeat(200)).is_err());
    }

    #[test]
    fn test_param_rendering() {
        assert_eq!(DbSettings::postgres().param("NAME"), "@NAME");
    }

    #[test]
    fn test_sql_param_conversions() {
        assert_eq!(
            SqlParam::from_value(Some(Box::new(7i32))).unwrap(),
            SqlParam::Int(7)
        );
        assert_eq!(
            SqlParam::from_value(Some(Box::new("a".to_string()))).unwrap(),
            SqlParam::Text("a".to_string())
        );
        assert_eq!(SqlParam::from_value(None).unwrap(), SqlParam::Null);
        assert!(SqlParam::from_value(Some(Box::new(u64::MAX))).is_err());
    }
}
