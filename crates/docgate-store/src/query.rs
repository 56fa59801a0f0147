//! Query evaluation for the memory engine
//!
//! Supports equality and the comparison, membership, existence and logical
//! operators, inclusion/exclusion projections, multi-key sorts, and the
//! `$set`, `$unset`, `$inc` and `$push` update operators.

use crate::ops::SortDirection;
use crate::value::{get_path, remove_path, set_path, Document, Value};
use crate::{Result, StoreError};
use std::cmp::Ordering;

/// Whether `doc` satisfies `criteria`
pub fn matches(doc: &Document, criteria: &Document) -> Result<bool> {
    for (key, condition) in criteria {
        let ok = match key.as_str() {
            "$and" => logical_items(key, condition)?
                .iter()
                .map(|c| matches(doc, c))
                .collect::<Result<Vec<_>>>()?
                .into_iter()
                .all(|m| m),
            "$or" => logical_items(key, condition)?
                .iter()
                .map(|c| matches(doc, c))
                .collect::<Result<Vec<_>>>()?
                .into_iter()
                .any(|m| m),
            "$nor" => !logical_items(key, condition)?
                .iter()
                .map(|c| matches(doc, c))
                .collect::<Result<Vec<_>>>()?
                .into_iter()
                .any(|m| m),
            op if op.starts_with('$') => {
                return Err(StoreError::operation(format!("unknown top level operator: {op}")));
            }
            path => field_matches(get_path(doc, path), condition)?,
        };
        if !ok {
            return Ok(false);
        }
    }
    Ok(true)
}

fn logical_items<'a>(op: &str, condition: &'a Value) -> Result<Vec<&'a Document>> {
    match condition {
        Value::Array(items) if !items.is_empty() => items
            .iter()
            .map(|item| {
                item.as_document()
                    .ok_or_else(|| StoreError::operation(format!("{op} entries must be objects")))
            })
            .collect(),
        _ => Err(StoreError::operation(format!("{op} requires a nonempty array"))),
    }
}

fn is_operator_document(value: &Value) -> bool {
    value
        .as_document()
        .and_then(|d| d.keys().next())
        .is_some_and(|k| k.starts_with('$'))
}

fn field_matches(field: Option<&Value>, condition: &Value) -> Result<bool> {
    if !is_operator_document(condition) {
        return Ok(equals(field, condition));
    }

    let Some(operators) = condition.as_document() else {
        return Ok(false);
    };

    for (op, operand) in operators {
        let ok = match op.as_str() {
            "$eq" => equals(field, operand),
            "$ne" => !equals(field, operand),
            "$gt" => compares(field, operand, |o| o == Ordering::Greater),
            "$gte" => compares(field, operand, |o| o != Ordering::Less),
            "$lt" => compares(field, operand, |o| o == Ordering::Less),
            "$lte" => compares(field, operand, |o| o != Ordering::Greater),
            "$in" => in_list(field, op, operand)?,
            "$nin" => !in_list(field, op, operand)?,
            "$exists" => field.is_some() == operand.is_truthy(),
            other => {
                return Err(StoreError::operation(format!("unsupported query operator: {other}")));
            }
        };
        if !ok {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Equality with array fan-out: `{tags: "a"}` matches `tags: ["a", "b"]`
fn equals(field: Option<&Value>, expected: &Value) -> bool {
    match field {
        None => matches!(expected, Value::Null),
        Some(value) if value == expected => true,
        Some(Value::Array(items)) => items.iter().any(|item| item == expected),
        Some(_) => false,
    }
}

fn compares(field: Option<&Value>, operand: &Value, accept: impl Fn(Ordering) -> bool) -> bool {
    let same_kind = |v: &Value| {
        (v.is_number() && operand.is_number())
            || std::mem::discriminant(v) == std::mem::discriminant(operand)
    };
    match field {
        None => false,
        Some(Value::Array(items)) if !matches!(operand, Value::Array(_)) => items
            .iter()
            .any(|item| same_kind(item) && accept(item.compare(operand))),
        Some(value) => same_kind(value) && accept(value.compare(operand)),
    }
}

fn in_list(field: Option<&Value>, op: &str, operand: &Value) -> Result<bool> {
    match operand {
        Value::Array(candidates) => Ok(candidates.iter().any(|c| equals(field, c))),
        _ => Err(StoreError::operation(format!("{op} needs an array"))),
    }
}

/// Apply an inclusion or exclusion projection. `_id` is kept unless
/// explicitly excluded.
pub fn project(doc: &Document, projection: &Document) -> Result<Document> {
    if projection.is_empty() {
        return Ok(doc.clone());
    }

    let include_id = projection.get("_id").map_or(true, Value::is_truthy);
    let mut fields = projection.iter().filter(|(k, _)| k.as_str() != "_id").peekable();
    let inclusive = match fields.peek() {
        Some((_, v)) => v.is_truthy(),
        None => false,
    };

    if fields.clone().any(|(_, v)| v.is_truthy() != inclusive) {
        return Err(StoreError::operation("projection cannot mix inclusion and exclusion"));
    }

    let mut out = Document::new();
    if inclusive {
        if include_id {
            if let Some(id) = doc.get("_id") {
                out.insert("_id".to_string(), id.clone());
            }
        }
        for (path, _) in fields {
            if let Some(value) = get_path(doc, path) {
                set_path(&mut out, path, value.clone());
            }
        }
    } else {
        out = doc.clone();
        for (path, _) in fields {
            remove_path(&mut out, path);
        }
        if !include_id {
            out.shift_remove("_id");
        }
    }
    Ok(out)
}

/// Order two documents by the given sort keys; missing fields sort as null
pub fn compare_by(a: &Document, b: &Document, sort: &[(String, SortDirection)]) -> Ordering {
    for (path, direction) in sort {
        let left = get_path(a, path).unwrap_or(&Value::Null);
        let right = get_path(b, path).unwrap_or(&Value::Null);
        let ord = match direction {
            SortDirection::Ascending => left.compare(right),
            SortDirection::Descending => right.compare(left),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

/// Whether an update document uses operators rather than replacing
pub fn is_operator_update(update: &Document) -> bool {
    update.keys().next().is_some_and(|k| k.starts_with('$'))
}

/// Apply an update document to `doc`, returning the new document. `_id` is
/// never changed.
pub fn apply_update(doc: &Document, update: &Document) -> Result<Document> {
    if !is_operator_update(update) {
        if update.keys().any(|k| k.starts_with('$')) {
            return Err(StoreError::operation("cannot mix operators and fields in an update"));
        }
        let mut replaced = Document::new();
        if let Some(id) = doc.get("_id") {
            replaced.insert("_id".to_string(), id.clone());
        }
        for (k, v) in update {
            if k != "_id" {
                replaced.insert(k.clone(), v.clone());
            }
        }
        return Ok(replaced);
    }

    let mut out = doc.clone();
    for (op, fields) in update {
        let fields = fields
            .as_document()
            .ok_or_else(|| StoreError::operation(format!("{op} requires an object")))?;
        for (path, operand) in fields {
            if path == "_id" {
                return Err(StoreError::operation("Mod on _id not allowed"));
            }
            match op.as_str() {
                "$set" => {
                    if !set_path(&mut out, path, operand.clone()) {
                        return Err(StoreError::operation(format!("cannot set field {path}")));
                    }
                }
                "$unset" => {
                    remove_path(&mut out, path);
                }
                "$inc" => {
                    let current = get_path(&out, path).cloned().unwrap_or(Value::Int32(0));
                    let sum = add(&current, operand).ok_or_else(|| {
                        StoreError::operation(format!("Cannot apply $inc to a non-numeric field {path}"))
                    })?;
                    set_path(&mut out, path, sum);
                }
                "$push" => {
                    let mut items = match get_path(&out, path) {
                        None => Vec::new(),
                        Some(Value::Array(items)) => items.clone(),
                        Some(_) => {
                            return Err(StoreError::operation(format!("Cannot apply $push to a non-array field {path}")));
                        }
                    };
                    items.push(operand.clone());
                    set_path(&mut out, path, Value::Array(items));
                }
                other => {
                    return Err(StoreError::operation(format!("Invalid modifier specified: {other}")));
                }
            }
        }
    }
    Ok(out)
}

fn add(a: &Value, b: &Value) -> Option<Value> {
    match (a, b) {
        (Value::Int32(x), Value::Int32(y)) => Some(
            x.checked_add(*y)
                .map(Value::Int32)
                .unwrap_or(Value::Int64(i64::from(*x) + i64::from(*y))),
        ),
        (Value::Int32(_) | Value::Int64(_), Value::Int32(_) | Value::Int64(_)) => {
            Some(Value::Int64(a.as_i64()?.checked_add(b.as_i64()?)?))
        }
        _ if a.is_number() && b.is_number() => Some(Value::Double(a.as_f64()? + b.as_f64()?)),
        _ => None,
    }
}

/// Seed document for an upsert: the plain equality fields of the criteria
pub fn upsert_seed(criteria: &Document) -> Document {
    let mut seed = Document::new();
    for (k, v) in criteria {
        if !k.starts_with('$') && !is_operator_document(v) {
            set_path(&mut seed, k, v.clone());
        }
    }
    seed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(pairs: &[(&str, Value)]) -> Document {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    fn op(name: &str, operand: Value) -> Value {
        Value::Document(doc(&[(name, operand)]))
    }

    #[test]
    fn test_equality_and_operators() {
        let d = doc(&[("x", 5.into()), ("tags", Value::Array(vec!["a".into(), "b".into()]))]);

        assert!(matches(&d, &Document::new()).unwrap());
        assert!(matches(&d, &doc(&[("x", 5.into())])).unwrap());
        assert!(matches(&d, &doc(&[("tags", "a".into())])).unwrap());
        assert!(matches(&d, &doc(&[("x", op("$gt", 4.into()))])).unwrap());
        assert!(!matches(&d, &doc(&[("x", op("$lt", 5.into()))])).unwrap());
        assert!(matches(&d, &doc(&[("x", op("$in", Value::Array(vec![1.into(), 5.into()])))])).unwrap());
        assert!(matches(&d, &doc(&[("missing", op("$exists", false.into()))])).unwrap());
        assert!(matches(&d, &doc(&[("missing", Value::Null)])).unwrap());
        assert!(!matches(&d, &doc(&[("x", op("$gt", "a".into()))])).unwrap());
    }

    #[test]
    fn test_logical_operators() {
        let d = doc(&[("x", 1.into())]);
        let either = Value::Array(vec![
            Value::Document(doc(&[("x", 2.into())])),
            Value::Document(doc(&[("x", 1.into())])),
        ]);
        assert!(matches(&d, &doc(&[("$or", either.clone())])).unwrap());
        assert!(!matches(&d, &doc(&[("$and", either.clone())])).unwrap());
        assert!(!matches(&d, &doc(&[("$nor", either)])).unwrap());
        assert!(matches(&d, &doc(&[("$bogus", 1.into())])).is_err());
    }

    #[test]
    fn test_projection() {
        let d = doc(&[("_id", 1.into()), ("a", 2.into()), ("b", 3.into())]);

        let inc = project(&d, &doc(&[("a", 1.into())])).unwrap();
        assert_eq!(inc, doc(&[("_id", 1.into()), ("a", 2.into())]));

        let exc = project(&d, &doc(&[("a", 0.into()), ("_id", 0.into())])).unwrap();
        assert_eq!(exc, doc(&[("b", 3.into())]));

        assert!(project(&d, &doc(&[("a", 1.into()), ("b", 0.into())])).is_err());
    }

    #[test]
    fn test_apply_update_operators() {
        let d = doc(&[("_id", 7.into()), ("n", 1.into())]);
        let update = doc(&[
            ("$inc", Value::Document(doc(&[("n", 2.into())]))),
            ("$set", Value::Document(doc(&[("s.t", "v".into())]))),
            ("$push", Value::Document(doc(&[("list", 1.into())]))),
        ]);
        let out = apply_update(&d, &update).unwrap();
        assert_eq!(out.get("n"), Some(&Value::Int32(3)));
        assert_eq!(get_path(&out, "s.t"), Some(&Value::from("v")));
        assert_eq!(out.get("list"), Some(&Value::Array(vec![1.into()])));
    }

    #[test]
    fn test_apply_update_replacement_keeps_id() {
        let d = doc(&[("_id", 7.into()), ("n", 1.into())]);
        let out = apply_update(&d, &doc(&[("m", 2.into())])).unwrap();
        assert_eq!(out, doc(&[("_id", 7.into()), ("m", 2.into())]));
    }

    #[test]
    fn test_sort_descending() {
        let mut docs = vec![doc(&[("x", 1.into())]), doc(&[("x", 3.into())]), doc(&[("x", 2.into())])];
        let sort = vec![("x".to_string(), SortDirection::Descending)];
        docs.sort_by(|a, b| compare_by(a, b, &sort));
        let xs: Vec<_> = docs.iter().map(|d| d["x"].as_i64().unwrap()).collect();
        assert_eq!(xs, vec![3, 2, 1]);
    }

    #[test]
    fn test_upsert_seed_skips_operators() {
        let criteria = doc(&[("x", 1.into()), ("y", op("$gt", 2.into()))]);
        assert_eq!(upsert_seed(&criteria), doc(&[("x", 1.into())]));
    }
}
