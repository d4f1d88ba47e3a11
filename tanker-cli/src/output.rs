use crate::csv;
use tanker_core::{ResultSet, Value};

fn display(value: &Value) -> String {
    if value.is_null() {
        String::new()
    } else {
        value.to_string()
    }
}

pub fn csv(result: &ResultSet, hide_headers: bool) -> String {
    let mut out = String::new();
    if !hide_headers {
        csv::write_row(&mut out, result.labels());
    }
    for row in result.iter() {
        let fields: Vec<String> = row.iter().map(display).collect();
        csv::write_row(&mut out, &fields);
    }
    out
}

/// Space-aligned text table, headers underlined.
pub fn ascii_table(result: &ResultSet, hide_headers: bool) -> String {
    let headers: Vec<String> = result.labels().to_vec();
    let rows: Vec<Vec<String>> = result
        .iter()
        .map(|row| row.iter().map(display).collect())
        .collect();
    let mut widths: Vec<usize> = headers.iter().map(String::len).collect();
    for row in &rows {
        for (i, field) in row.iter().enumerate() {
            if i < widths.len() {
                widths[i] = widths[i].max(field.len());
            }
        }
    }
    let format_row = |fields: &[String]| -> String {
        let mut line = String::new();
        for (i, field) in fields.iter().enumerate() {
            if i > 0 {
                line.push(' ');
            }
            line.push_str(field);
            if i + 1 < fields.len() {
                line.push_str(&" ".repeat(widths[i].saturating_sub(field.len())));
            }
        }
        line.push('\n');
        line
    };
    let mut out = String::new();
    if !hide_headers {
        out.push_str(&format_row(&headers));
        let dashes: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
        out.push_str(&format_row(&dashes));
    }
    for row in &rows {
        out.push_str(&format_row(row));
    }
    out
}
