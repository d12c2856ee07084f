use chrono::NaiveDate;
use serde_json::Value;

use crate::models::{ActionOp, CardAction, Payee};

const DATE_FORMAT: &str = "%m/%d/%Y";

/// Format a float as a dollar amount with thousands separators: $1,234.56
pub fn money(val: f64) -> String {
    let negative = val < 0.0;
    let abs = val.abs();
    let cents = format!("{:.2}", abs);
    let parts: Vec<&str> = cents.split('.').collect();
    let int_part = parts[0];
    let dec_part = parts[1];

    let mut with_commas = String::new();
    for (i, c) in int_part.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            with_commas.push(',');
        }
        with_commas.push(c);
    }
    let with_commas: String = with_commas.chars().rev().collect();

    if negative {
        format!("-${with_commas}.{dec_part}")
    } else {
        format!("${with_commas}.{dec_part}")
    }
}

/// Integer cents to a dollar amount.
pub fn cents(val: i64) -> String {
    money(val as f64 / 100.0)
}

/// Dollars to integer cents. `None` for NaN, infinities and amounts that do
/// not fit in an `i64` of cents.
pub fn dollars_to_cents(dollars: f64) -> Option<i64> {
    if !dollars.is_finite() {
        return None;
    }
    let cents = (dollars * 100.0).round();
    // i64::MAX rounds up to 2^63 as f64, so the upper bound is exclusive.
    if cents < i64::MIN as f64 || cents >= i64::MAX as f64 {
        return None;
    }
    Some(cents as i64)
}

fn format_date(raw: &str, pattern: &str) -> String {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map(|d| d.format(pattern).to_string())
        .unwrap_or_else(|_| raw.to_string())
}

fn recurring(value: &Value) -> Option<String> {
    let frequency = value.get("frequency")?.as_str()?;
    let unit = match frequency {
        "daily" => "day",
        "weekly" => "week",
        "monthly" => "month",
        "yearly" => "year",
        other => other,
    };
    let interval = value.get("interval").and_then(Value::as_i64).unwrap_or(1);
    Some(if interval > 1 {
        format!("Every {interval} {unit}s")
    } else {
        format!("Every {unit}")
    })
}

fn format_scalar(field: &str, value: &Value) -> String {
    match value {
        Value::Null => "(nothing)".to_string(),
        Value::String(s) if s.is_empty() => "(nothing)".to_string(),
        Value::Bool(b) => b.to_string(),
        _ => match field {
            "amount" => match value.as_i64() {
                Some(n) => cents(n),
                None => raw(value),
            },
            "date" => recurring(value).unwrap_or_else(|| match value.as_str() {
                Some(s) => format_date(s, DATE_FORMAT),
                None => raw(value),
            }),
            "month" => match value.as_str() {
                Some(s) => format_date(&format!("{s}-01"), "%m/%Y"),
                None => raw(value),
            },
            "year" => match value.as_str() {
                Some(s) => s.chars().take(4).collect(),
                None => raw(value),
            },
            _ => raw(value),
        },
    }
}

fn raw(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Human-readable form of an action value for `field`.
pub fn format_value(field: &str, value: &Value) -> String {
    match value {
        Value::Array(items) => match items.len() {
            0 => "(empty)".to_string(),
            1 => format!("[{}]", format_scalar(field, &items[0])),
            len => {
                let shown = if len > 4 { 3 } else { len };
                let mut parts: Vec<String> =
                    items[..shown].iter().map(|v| format_scalar(field, v)).collect();
                if len > shown {
                    parts.push(format!("{} more items...", len - shown));
                }
                format!("[{}]", parts.join(", "))
            }
        },
        Value::Object(map) if map.contains_key("num1") && map.contains_key("num2") => format!(
            "{} and {}",
            format_scalar(field, &map["num1"]),
            format_scalar(field, &map["num2"])
        ),
        _ => format_scalar(field, value),
    }
}

fn field_label(field: &str) -> String {
    field.replace('_', " ")
}

fn describe_schedule(value: &Value, payees: &[Payee]) -> String {
    let Some(next) = value.get("next_date").and_then(Value::as_str) else {
        return raw(value);
    };
    let payee = value
        .get("payee")
        .and_then(Value::as_str)
        .and_then(|id| payees.iter().find(|p| p.id == id));
    match payee {
        Some(p) => format!("{} ({next})", p.name),
        None => format!("Next: {next}"),
    }
}

/// One-line description of an action, e.g. `set notes to travel`.
pub fn describe_action(action: &CardAction, payees: &[Payee]) -> String {
    match action.op {
        ActionOp::Set => format!(
            "set {} to {}",
            field_label(&action.field),
            format_value(&action.field, &action.value)
        ),
        ActionOp::LinkSchedule => {
            format!("link schedule {}", describe_schedule(&action.value, payees))
        }
    }
}
