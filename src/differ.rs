use core::fmt;
use std::fmt::Display;

use serde_json::Value;
use thiserror::Error;

/// Structural comparison of two JSON-shaped values. Sequences compare as
/// multisets (order does not matter), mappings compare key by key, nested
/// mismatches are reported once at their own path.
pub fn compare(expected: &Value, actual: &Value) -> DiffReport {
    let mut report = DiffReport::default();
    diff_at("", expected, actual, &mut report);
    report
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValueChange {
    pub path: String,
    pub expected: Value,
    pub actual: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeChange {
    pub path: String,
    pub expected_type: &'static str,
    pub actual_type: &'static str,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiffReport {
    pub values_changed: Vec<ValueChange>,
    pub type_changes: Vec<TypeChange>,
    pub keys_added: Vec<String>,
    pub keys_removed: Vec<String>,
    pub items_added: Vec<(String, Value)>,
    pub items_removed: Vec<(String, Value)>,
}

impl DiffReport {
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn len(&self) -> usize {
        self.values_changed.len()
            + self.type_changes.len()
            + self.keys_added.len()
            + self.keys_removed.len()
            + self.items_added.len()
            + self.items_removed.len()
    }
}

#[derive(Debug, Error)]
#[error("body mismatch: {} difference(s) found", report.len())]
pub struct DiffMismatch {
    pub report: DiffReport,
}

pub fn assert_equivalent(expected: &Value, actual: &Value) -> Result<(), DiffMismatch> {
    let report = compare(expected, actual);
    if report.is_empty() {
        Ok(())
    } else {
        Err(DiffMismatch { report })
    }
}

/// Runtime type name of a JSON value, using the same vocabulary as the
/// schema tags.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "int",
        Value::String(_) => "str",
        Value::Array(_) => "list",
        Value::Object(_) => "dict",
    }
}

fn key_path(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{path}.{key}")
    }
}

fn item_path(path: &str, index: usize) -> String {
    format!("{path}[{index}]")
}

fn record_path(path: &str) -> String {
    if path.is_empty() {
        "root".to_string()
    } else {
        path.to_string()
    }
}

fn diff_at(path: &str, expected: &Value, actual: &Value, report: &mut DiffReport) {
    match (expected, actual) {
        (Value::Object(exp), Value::Object(act)) => {
            for (key, exp_val) in exp {
                match act.get(key) {
                    Some(act_val) => diff_at(&key_path(path, key), exp_val, act_val, report),
                    None => report.keys_removed.push(key_path(path, key)),
                }
            }
            for key in act.keys() {
                if !exp.contains_key(key) {
                    report.keys_added.push(key_path(path, key));
                }
            }
        }
        (Value::Array(exp), Value::Array(act)) => diff_sequences(path, exp, act, report),
        _ => {
            let expected_type = json_type_name(expected);
            let actual_type = json_type_name(actual);

            if expected_type != actual_type {
                report.type_changes.push(TypeChange {
                    path: record_path(path),
                    expected_type,
                    actual_type,
                });
            } else if expected != actual {
                report.values_changed.push(ValueChange {
                    path: record_path(path),
                    expected: expected.clone(),
                    actual: actual.clone(),
                });
            }
        }
    }
}

/// Order-insensitive multiset matching. Each expected element claims the
/// first unclaimed actual element it is equivalent to; leftovers on either
/// side become removed/added entries.
fn diff_sequences(path: &str, expected: &[Value], actual: &[Value], report: &mut DiffReport) {
    let mut claimed = vec![false; actual.len()];

    for (i, exp_item) in expected.iter().enumerate() {
        let matched = actual
            .iter()
            .enumerate()
            .find(|(j, act_item)| !claimed[*j] && compare(exp_item, act_item).is_empty());

        match matched {
            Some((j, _)) => claimed[j] = true,
            None => report
                .items_removed
                .push((item_path(path, i), exp_item.clone())),
        }
    }

    for (j, act_item) in actual.iter().enumerate() {
        if !claimed[j] {
            report
                .items_added
                .push((item_path(path, j), act_item.clone()));
        }
    }
}

impl Display for DiffReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.values_changed.is_empty() {
            writeln!(f, "  {}", console::style("Values changed:").yellow().bold())?;
            for change in &self.values_changed {
                writeln!(
                    f,
                    "    {}: {} -> {}",
                    change.path,
                    console::style(&change.expected).green(),
                    console::style(&change.actual).red(),
                )?;
            }
        }

        if !self.type_changes.is_empty() {
            writeln!(f, "  {}", console::style("Type changes:").magenta().bold())?;
            for change in &self.type_changes {
                writeln!(
                    f,
                    "    {}: {} -> {}",
                    change.path,
                    console::style(change.expected_type).green(),
                    console::style(change.actual_type).red(),
                )?;
            }
        }

        if !self.keys_added.is_empty() {
            writeln!(f, "  {}", console::style("Keys added:").green().bold())?;
            for key in &self.keys_added {
                writeln!(f, "    {}", console::style(format!("+ {key}")).green())?;
            }
        }

        if !self.keys_removed.is_empty() {
            writeln!(f, "  {}", console::style("Keys removed:").red().bold())?;
            for key in &self.keys_removed {
                writeln!(f, "    {}", console::style(format!("- {key}")).red())?;
            }
        }

        if !self.items_added.is_empty() {
            writeln!(f, "  {}", console::style("List items added:").green().bold())?;
            for (path, value) in &self.items_added {
                writeln!(f, "    {}", console::style(format!("+ {path}: {value}")).green())?;
            }
        }

        if !self.items_removed.is_empty() {
            writeln!(f, "  {}", console::style("List items removed:").red().bold())?;
            for (path, value) in &self.items_removed {
                writeln!(f, "    {}", console::style(format!("- {path}: {value}")).red())?;
            }
        }

        Ok(())
    }
}
