use serde_json::{Map, Value};
use time::format_description::FormatItem;
use time::macros::format_description;
use time::OffsetDateTime;

const DATE_FORMAT: &[FormatItem<'_>] = format_description!("[year]-[month]-[day]");
const TIME_FORMAT: &[FormatItem<'_>] = format_description!("[hour]:[minute]");

/// Runtime context for variable substitution. Templates reference
/// `{{client.field}}` and `{{trigger.field}}`; anything unresolvable becomes
/// the empty string so a partially-populated context still yields a sendable
/// message.
#[derive(Debug, Clone)]
pub struct RunContext {
    ctx: Value,
}

impl RunContext {
    pub fn new(client: Option<Value>, trigger: Value) -> Self {
        let mut client_map = match client {
            Some(Value::Object(map)) => map,
            _ => Map::new(),
        };
        // The builder exposes the client's health status as `health`.
        if let Some(health) = client_map.get("healthStatus").cloned() {
            client_map.entry("health").or_insert(health);
        }

        let mut trigger_map = match trigger {
            Value::Object(map) => map,
            other if !other.is_null() => {
                let mut map = Map::new();
                map.insert("value".to_string(), other);
                map
            }
            _ => Map::new(),
        };
        // Built-in date/time reflect the wall clock at substitution time,
        // not when the trigger fired.
        let now = OffsetDateTime::now_utc();
        if !trigger_map.contains_key("date") {
            if let Ok(date) = now.format(DATE_FORMAT) {
                trigger_map.insert("date".to_string(), Value::String(date));
            }
        }
        if !trigger_map.contains_key("time") {
            if let Ok(time) = now.format(TIME_FORMAT) {
                trigger_map.insert("time".to_string(), Value::String(time));
            }
        }

        let mut ctx = Map::new();
        ctx.insert("client".to_string(), Value::Object(client_map));
        ctx.insert("trigger".to_string(), Value::Object(trigger_map));
        Self {
            ctx: Value::Object(ctx),
        }
    }

    pub fn as_value(&self) -> &Value {
        &self.ctx
    }
}

/// Replaces every `{{namespace.field}}` token left to right. Missing
/// namespaces and fields substitute to "". An unterminated `{{` is copied
/// through verbatim.
pub fn substitute_variables(template: &str, context: &RunContext) -> String {
    let mut out = String::new();
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        let (head, tail) = rest.split_at(start);
        out.push_str(head);
        if let Some(end_rel) = tail.find("}}") {
            let (expr_with, new_rest) = tail.split_at(end_rel + 2);
            let expr = expr_with
                .trim_start_matches("{{")
                .trim_end_matches("}}")
                .trim();
            let val = lookup_ctx(expr, context.as_value()).unwrap_or_default();
            out.push_str(&val);
            rest = new_rest;
        } else {
            out.push_str(tail);
            rest = "";
            break;
        }
    }
    out.push_str(rest);
    out
}

fn lookup_ctx(path: &str, ctx: &Value) -> Option<String> {
    let mut cur = ctx;
    for part in path.split('.') {
        if part.is_empty() {
            continue;
        }
        match cur {
            Value::Object(map) => {
                cur = map.get(part)?;
            }
            _ => return None,
        }
    }
    Some(match cur {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

/// Walks a JSON config and substitutes variables in every string value,
/// including strings nested in arrays and objects.
pub fn substitute_config(config: &Value, context: &RunContext) -> Value {
    match config {
        Value::String(s) => Value::String(substitute_variables(s, context)),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| substitute_config(item, context))
                .collect(),
        ),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), substitute_config(v, context)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Display helper for the builder: whole-minute and whole-hour buckets only.
pub fn format_delay(minutes: i64) -> String {
    if minutes == 0 {
        return "Immediately".to_string();
    }
    if minutes % 60 == 0 {
        let hours = minutes / 60;
        if hours == 1 {
            return "1 hour".to_string();
        }
        return format!("{} hours", hours);
    }
    format!("{} minutes", minutes)
}
