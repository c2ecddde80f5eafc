use serde_json::Value;

/// Shallow merge of `payload` over `prior`: top-level payload fields win,
/// nested values are replaced whole. A non-object on either side means the
/// payload replaces the prior value.
pub fn shallow_merge(prior: Option<&Value>, payload: &Value) -> Value {
    match (prior, payload) {
        (Some(Value::Object(prior)), Value::Object(fields)) => {
            let mut merged = prior.clone();
            for (name, value) in fields {
                merged.insert(name.clone(), value.clone());
            }
            Value::Object(merged)
        }
        _ => payload.clone(),
    }
}

/// `id` of a record, when it is a string.
pub fn record_id(record: &Value) -> Option<&str> {
    record.get("id").and_then(Value::as_str)
}

/// Replace the element of `collection` whose `id` equals the payload's with
/// the full payload. Never appends. Returns `None` when nothing matched or
/// when `collection` is not an array.
pub fn replace_by_id(collection: &Value, payload: &Value) -> Option<Value> {
    let id = record_id(payload)?;
    let items = collection.as_array()?;
    let position = items.iter().position(|item| record_id(item) == Some(id))?;

    let mut items = items.clone();
    items[position] = payload.clone();
    Some(Value::Array(items))
}

/// Replace by id, or push to the end when no element matches. Only custom
/// handlers use this; the default merge never appends.
pub fn upsert_by_id(collection: Option<&Value>, payload: &Value) -> Value {
    let existing = collection.and_then(Value::as_array);
    if let Some(replaced) = collection.and_then(|c| replace_by_id(c, payload)) {
        return replaced;
    }
    let mut items = existing.cloned().unwrap_or_default();
    items.push(payload.clone());
    Value::Array(items)
}
