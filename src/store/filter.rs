use bson::{Bson, Document};
use std::cmp::Ordering;

const MAX_PATH_DEPTH: usize = 32;

const FIELD_OPS: &[&str] =
    &["$eq", "$ne", "$gt", "$gte", "$lt", "$lte", "$in", "$nin", "$exists", "$not"];

/// Check that every operator in a query filter is one `eval_filter` understands.
///
/// # Errors
/// Returns a message naming the first unsupported or malformed operator.
pub fn validate_filter(filter: &Document) -> Result<(), String> {
    for (key, cond) in filter {
        match key.as_str() {
            "$and" | "$or" => {
                let Bson::Array(items) = cond else {
                    return Err(format!("{key} expects an array"));
                };
                for item in items {
                    let Bson::Document(sub) = item else {
                        return Err(format!("{key} entries must be documents"));
                    };
                    validate_filter(sub)?;
                }
            }
            k if k.starts_with('$') => return Err(format!("unsupported operator {k}")),
            _ => {
                if let Bson::Document(ops) = cond
                    && is_operator_doc(ops)
                {
                    validate_ops(ops)?;
                }
            }
        }
    }
    Ok(())
}

fn validate_ops(ops: &Document) -> Result<(), String> {
    for (op, arg) in ops {
        if !FIELD_OPS.contains(&op.as_str()) {
            return Err(format!("unsupported operator {op}"));
        }
        match (op.as_str(), arg) {
            ("$in" | "$nin", Bson::Array(_)) => {}
            ("$in" | "$nin", _) => return Err(format!("{op} expects an array")),
            ("$not", Bson::Document(inner)) => validate_ops(inner)?,
            ("$not", _) => return Err("$not expects an operator document".into()),
            _ => {}
        }
    }
    Ok(())
}

/// Evaluate a query filter document against `doc`.
///
/// The empty filter matches everything. Unsupported operators never match; call
/// `validate_filter` first to report them.
pub fn eval_filter(doc: &Document, filter: &Document) -> bool {
    filter.iter().all(|(key, cond)| match key.as_str() {
        "$and" => sub_filters(cond).all(|f| eval_filter(doc, f)),
        "$or" => sub_filters(cond).any(|f| eval_filter(doc, f)),
        k if k.starts_with('$') => false,
        path => {
            let value = get_path(doc, path);
            match cond {
                Bson::Document(ops) if is_operator_doc(ops) => eval_ops(value, ops),
                expected => value.is_some_and(|v| matches_eq(v, expected)),
            }
        }
    })
}

/// Keep only the fields named with a truthy value in `projection`. `_id` is kept unless
/// excluded explicitly.
pub fn project(doc: &Document, projection: &Document) -> Document {
    let mut out = Document::new();
    let id_excluded = projection.get("_id").is_some_and(|v| !truthy(v));
    if !id_excluded && let Some(id) = doc.get("_id") {
        out.insert("_id", id.clone());
    }
    for (field, flag) in projection {
        if field == "_id" || !truthy(flag) {
            continue;
        }
        if let Some(v) = doc.get(field) {
            out.insert(field.clone(), v.clone());
        }
    }
    out
}

fn truthy(v: &Bson) -> bool {
    match v {
        Bson::Boolean(b) => *b,
        Bson::Int32(i) => *i != 0,
        Bson::Int64(i) => *i != 0,
        Bson::Double(f) => *f != 0.0,
        _ => true,
    }
}

fn sub_filters(cond: &Bson) -> impl Iterator<Item = &Document> {
    let items: &[Bson] = match cond {
        Bson::Array(a) => a,
        _ => &[],
    };
    items.iter().filter_map(|b| match b {
        Bson::Document(d) => Some(d),
        _ => None,
    })
}

fn is_operator_doc(d: &Document) -> bool {
    !d.is_empty() && d.keys().all(|k| k.starts_with('$'))
}

fn eval_ops(value: Option<&Bson>, ops: &Document) -> bool {
    ops.iter().all(|(op, arg)| match op.as_str() {
        "$eq" => value.is_some_and(|v| matches_eq(v, arg)),
        "$ne" => !value.is_some_and(|v| matches_eq(v, arg)),
        "$gt" => value.is_some_and(|v| compare_bson(v, arg) == Ordering::Greater),
        "$gte" => value.is_some_and(|v| compare_bson(v, arg) != Ordering::Less),
        "$lt" => value.is_some_and(|v| compare_bson(v, arg) == Ordering::Less),
        "$lte" => value.is_some_and(|v| compare_bson(v, arg) != Ordering::Greater),
        "$in" => value.is_some_and(|v| in_set(v, arg)),
        "$nin" => !value.is_some_and(|v| in_set(v, arg)),
        "$exists" => value.is_some() == truthy(arg),
        "$not" => match arg {
            Bson::Document(inner) => !eval_ops(value, inner),
            _ => false,
        },
        _ => false,
    })
}

fn in_set(v: &Bson, set: &Bson) -> bool {
    match set {
        Bson::Array(items) => items.iter().any(|x| matches_eq(v, x)),
        _ => false,
    }
}

/// Equality with array membership: a scalar condition matches an array field containing it.
fn matches_eq(v: &Bson, expected: &Bson) -> bool {
    if values_equal(v, expected) {
        return true;
    }
    match (v, expected) {
        (Bson::Array(items), e) if !matches!(e, Bson::Array(_)) => {
            items.iter().any(|x| values_equal(x, e))
        }
        _ => false,
    }
}

fn values_equal(a: &Bson, b: &Bson) -> bool {
    if is_num(a) && is_num(b) {
        return as_f64(a) == as_f64(b);
    }
    a == b
}

fn get_path<'a>(doc: &'a Document, path: &str) -> Option<&'a Bson> {
    if path.is_empty() {
        return None;
    }
    let mut parts = path.split('.').enumerate().peekable();
    let mut cur = doc;
    while let Some((depth, part)) = parts.next() {
        if depth >= MAX_PATH_DEPTH {
            return None;
        }
        let v = cur.get(part)?;
        if parts.peek().is_none() {
            return Some(v);
        }
        match v {
            Bson::Document(d) => cur = d,
            _ => return None,
        }
    }
    None
}

fn is_num(x: &Bson) -> bool {
    matches!(x, Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_))
}

#[allow(clippy::cast_precision_loss)]
fn as_f64(x: &Bson) -> f64 {
    match x {
        Bson::Int32(i) => f64::from(*i),
        Bson::Int64(i) => *i as f64,
        Bson::Double(f) => *f,
        _ => f64::NAN,
    }
}

pub(crate) fn compare_bson(a: &Bson, b: &Bson) -> Ordering {
    if is_num(a) && is_num(b) {
        return as_f64(a).total_cmp(&as_f64(b));
    }
    match (a, b) {
        (Bson::String(x), Bson::String(y)) => x.cmp(y),
        (Bson::Boolean(x), Bson::Boolean(y)) => x.cmp(y),
        (Bson::ObjectId(x), Bson::ObjectId(y)) => x.bytes().cmp(&y.bytes()),
        (Bson::DateTime(x), Bson::DateTime(y)) => x.cmp(y),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

fn type_rank(v: &Bson) -> u8 {
    match v {
        Bson::MinKey => 0,
        Bson::Null | Bson::Undefined => 1,
        Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) | Bson::Decimal128(_) => 2,
        Bson::String(_) | Bson::Symbol(_) => 3,
        Bson::Document(_) => 4,
        Bson::Array(_) => 5,
        Bson::Binary(_) => 6,
        Bson::ObjectId(_) => 7,
        Bson::Boolean(_) => 8,
        Bson::DateTime(_) => 9,
        Bson::Timestamp(_) => 10,
        Bson::RegularExpression(_) => 11,
        Bson::DbPointer(_) => 12,
        Bson::JavaScriptCode(_) | Bson::JavaScriptCodeWithScope(_) => 13,
        Bson::MaxKey => 255,
    }
}
