//! Rendering of bound SQL for logs and error messages.
//!
//! Statements always run with positional binding; the text produced here is only
//! ever shown to humans.

use recordkit_core::value::{TIMESTAMP_FORMAT, Value};

/// Render `value` as a SQL literal.
pub fn render_literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(b) => if *b { "1" } else { "0" }.to_string(),
        Value::Int(_)
        | Value::BigInt(_)
        | Value::Float(_)
        | Value::Double(_)
        | Value::Decimal(_) => value.to_string(),
        Value::Text(s) => quote(s),
        Value::Bytes(b) => {
            let mut hex = String::with_capacity(b.len() * 2 + 3);
            hex.push_str("X'");
            for byte in b {
                hex.push_str(&format!("{:02X}", byte));
            }
            hex.push('\'');
            hex
        }
        Value::Date(d) => quote(&d.format("%Y-%m-%d").to_string()),
        Value::Timestamp(ts) => quote(&ts.format(TIMESTAMP_FORMAT).to_string()),
        Value::Json(j) => quote(&j.to_string()),
        Value::Array(items) => items
            .iter()
            .map(render_literal)
            .collect::<Vec<_>>()
            .join(", "),
    }
}

fn quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// Substitute `params` for the `?` placeholders of `sql`.
///
/// Question marks inside quoted literals or quoted identifiers are left alone.
/// Placeholders without a matching parameter stay as `?`.
pub fn executable_sql(sql: &str, params: &[Value]) -> String {
    let mut out = String::with_capacity(sql.len() + params.len() * 8);
    let mut params = params.iter();
    let mut quote: Option<char> = None;

    for c in sql.chars() {
        match quote {
            Some(q) => {
                if c == q {
                    quote = None;
                }
                out.push(c);
            }
            None => match c {
                '\'' | '"' | '`' => {
                    quote = Some(c);
                    out.push(c);
                }
                '?' => match params.next() {
                    Some(p) => out.push_str(&render_literal(p)),
                    None => out.push('?'),
                },
                _ => out.push(c),
            },
        }
    }
    out
}

/// Number of `?` placeholders outside quoted text.
pub fn placeholder_count(sql: &str) -> usize {
    let mut count = 0;
    let mut quote: Option<char> = None;
    for c in sql.chars() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None => match c {
                '\'' | '"' | '`' => quote = Some(c),
                '?' => count += 1,
                _ => {}
            },
        }
    }
    count
}
