//! Reader for parameter migration scripts.
//!
//! Scripts are parsed with the SQLite dialect and only the statement shapes
//! produced for the `parameters` table are accepted: `INSERT OR IGNORE`
//! defaults, a single `UPDATE` of the version row, and optional
//! `BEGIN`/`COMMIT` wrappers. Anything else is rejected so that a migration
//! is never half understood.

use sqlparser::ast::{
    AssignmentTarget, BinaryOperator, Expr, Insert, ObjectName, SetExpr, SqliteOnConflict,
    Statement, TableFactor, TableObject, Update, Value,
};
use sqlparser::dialect::SQLiteDialect;
use sqlparser::parser::Parser;
use vinted_common::{Error, Result};

use crate::parameter_store::VERSION_KEY;

const PARAMETERS_TABLE: &str = "parameters";

/// The parsed body of one migration file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Script {
    pub defaults: Vec<(String, String)>,
    pub version: String,
}

pub(crate) fn parse_script(name: &str, sql: &str) -> Result<Script> {
    let statements = Parser::parse_sql(&SQLiteDialect {}, sql)
        .map_err(|e| Error::Config(format!("{name}: {e}")))?;

    let mut defaults: Vec<(String, String)> = Vec::new();
    let mut version = None;

    for statement in &statements {
        match statement {
            Statement::StartTransaction { .. } | Statement::Commit { .. } => {}
            Statement::Insert(insert) => {
                let rows = default_rows(insert).ok_or_else(|| unsupported(name, statement))?;
                for (key, value) in rows {
                    if key == VERSION_KEY {
                        return Err(Error::Config(format!(
                            "{name}: the version row must be changed with UPDATE, not INSERT"
                        )));
                    }
                    if defaults.iter().any(|(existing, _)| *existing == key) {
                        return Err(Error::Config(format!(
                            "{name}: default for {key:?} is declared twice"
                        )));
                    }
                    defaults.push((key, value));
                }
            }
            Statement::Update(update) => {
                let target = version_update(update).ok_or_else(|| unsupported(name, statement))?;
                if version.is_some() {
                    return Err(Error::Config(format!(
                        "{name}: more than one version update"
                    )));
                }
                version = Some(target);
            }
            other => return Err(unsupported(name, other)),
        }
    }

    let version =
        version.ok_or_else(|| Error::Config(format!("{name}: missing version update")))?;

    Ok(Script { defaults, version })
}

fn unsupported(name: &str, statement: &Statement) -> Error {
    Error::Config(format!("{name}: unsupported statement: {statement}"))
}

/// `INSERT OR IGNORE INTO parameters (key, value) VALUES ('k', 'v'), ...`
fn default_rows(insert: &Insert) -> Option<Vec<(String, String)>> {
    if insert.or != Some(SqliteOnConflict::Ignore)
        || insert.on.is_some()
        || insert.returning.is_some()
    {
        return None;
    }

    let TableObject::TableName(table) = &insert.table else {
        return None;
    };
    if !names(table, PARAMETERS_TABLE) {
        return None;
    }

    let [key_column, value_column] = insert.columns.as_slice() else {
        return None;
    };
    if !key_column.value.eq_ignore_ascii_case("key")
        || !value_column.value.eq_ignore_ascii_case("value")
    {
        return None;
    }

    let SetExpr::Values(values) = insert.source.as_ref()?.body.as_ref() else {
        return None;
    };

    values
        .rows
        .iter()
        .map(|row| match row.as_slice() {
            [key, value] => Some((string_literal(key)?, string_literal(value)?)),
            _ => None,
        })
        .collect()
}

/// `UPDATE parameters SET value = '<v>' WHERE key = 'version'`
fn version_update(update: &Update) -> Option<String> {
    if !update.table.joins.is_empty()
        || update.from.is_some()
        || update.or.is_some()
        || update.returning.is_some()
        || update.limit.is_some()
    {
        return None;
    }

    let TableFactor::Table { name, alias, .. } = &update.table.relation else {
        return None;
    };
    if alias.is_some() || !names(name, PARAMETERS_TABLE) {
        return None;
    }

    let [assignment] = update.assignments.as_slice() else {
        return None;
    };
    let AssignmentTarget::ColumnName(column) = &assignment.target else {
        return None;
    };
    if !names(column, "value") {
        return None;
    }
    let target = string_literal(&assignment.value)?;

    match update.selection.as_ref()? {
        Expr::BinaryOp {
            left,
            op: BinaryOperator::Eq,
            right,
        } if is_column(left, "key") && string_literal(right).as_deref() == Some(VERSION_KEY) => {
            Some(target)
        }
        _ => None,
    }
}

/// Whether `name` is the single, possibly quoted, identifier `expected`.
fn names(name: &ObjectName, expected: &str) -> bool {
    match name.0.as_slice() {
        [part] => part
            .as_ident()
            .is_some_and(|ident| ident.value.eq_ignore_ascii_case(expected)),
        _ => false,
    }
}

fn is_column(expr: &Expr, column: &str) -> bool {
    matches!(expr, Expr::Identifier(ident) if ident.value.eq_ignore_ascii_case(column))
}

fn string_literal(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Value(literal) => match &literal.value {
            Value::SingleQuotedString(s) => Some(s.clone()),
            _ => None,
        },
        _ => None,
    }
}
