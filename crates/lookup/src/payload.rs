use serde_json::{Number, Value};
use topic_helper_protocol::ChildTopic;

pub const CHILD_LIST_POINTER: &str = "/result/data/childList";

/// Extracts the child list; `None` when the payload has no array there.
///
/// Entries without a usable `title` or `topicId` are dropped.
#[must_use]
pub fn parse_child_list(payload: &Value) -> Option<Vec<ChildTopic>> {
    let entries = payload.pointer(CHILD_LIST_POINTER)?.as_array()?;
    Some(entries.iter().filter_map(parse_entry).collect())
}

fn parse_entry(entry: &Value) -> Option<ChildTopic> {
    let title = entry.get("title")?.as_str().filter(|t| !t.is_empty())?;
    let topic_id = match entry.get("topicId")? {
        Value::String(raw) if !raw.is_empty() => raw.clone(),
        Value::Number(number) if number.as_f64() != Some(0.0) => render_number(number),
        _ => return None,
    };
    Some(ChildTopic::new(title, topic_id))
}

/// Integral values print without a fraction, whatever their JSON encoding.
fn render_number(number: &Number) -> String {
    if let Some(value) = number.as_u64() {
        return value.to_string();
    }
    if let Some(value) = number.as_i64() {
        return value.to_string();
    }
    match number.as_f64() {
        // f64 Display drops the ".0" of integral values
        Some(value) if value.is_finite() => format!("{value}"),
        _ => number.to_string(),
    }
}
