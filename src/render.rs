//! Row-to-content rendering.
//!
//! The rendered form of a row serves two purposes: it is the document body
//! in normal mode, and it is the input to the row checksum in every mode.
//! The renderer must therefore be deterministic for a given row.

use crate::models::Row;

const TITLE_PREFIX: &str = "Database Result";

/// Converts one row into its content representation.
pub trait RowRenderer: Send + Sync {
    fn render(&self, db_name: &str, row: &Row, primary_keys: &[String]) -> String;
}

/// Default renderer: one XML element per non-null column under a root element
/// named after the source database, preceded by a synthesized title line.
#[derive(Debug, Default)]
pub struct XmlRenderer;

impl RowRenderer for XmlRenderer {
    fn render(&self, db_name: &str, row: &Row, primary_keys: &[String]) -> String {
        let root = element_name(db_name);
        let mut out = String::new();
        out.push('<');
        out.push_str(&root);
        out.push_str(">\n");

        out.push_str("  <title>");
        out.push_str(&escape_xml(&row_title(row, primary_keys)));
        out.push_str("</title>\n");

        for (column, value) in row {
            let Some(rendered) = value.render() else {
                continue;
            };
            let name = element_name(column);
            out.push_str("  <");
            out.push_str(&name);
            out.push('>');
            out.push_str(&escape_xml(&rendered));
            out.push_str("</");
            out.push_str(&name);
            out.push_str(">\n");
        }

        out.push_str("</");
        out.push_str(&root);
        out.push_str(">\n");
        out
    }
}

/// Title line built from the primary-key values, e.g.
/// `Database Result id=1 lastName=last_01`.
fn row_title(row: &Row, primary_keys: &[String]) -> String {
    let mut title = String::from(TITLE_PREFIX);
    for key in primary_keys {
        let Some(resolved) = row.keys().find(|k| k.eq_ignore_ascii_case(key)) else {
            continue;
        };
        let value = row[resolved].render().unwrap_or_default();
        title.push(' ');
        title.push_str(resolved);
        title.push('=');
        title.push_str(&value);
    }
    title
}

/// Sanitize a name into a well-formed XML element name.
fn element_name(name: &str) -> String {
    let mut out: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if out.is_empty() || out.starts_with(|c: char| c.is_ascii_digit() || c == '-' || c == '.') {
        out.insert(0, '_');
    }
    out
}

fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ColumnValue;

    fn sample_row() -> Row {
        [
            ("id".to_string(), ColumnValue::Int(1)),
            (
                "lastName".to_string(),
                ColumnValue::Text("last_01".to_string()),
            ),
            ("notes".to_string(), ColumnValue::Null),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_render_contains_columns_and_title() {
        let keys = vec!["id".to_string(), "lastName".to_string()];
        let xml = XmlRenderer.render("payroll", &sample_row(), &keys);
        assert!(xml.starts_with("<payroll>"));
        assert!(xml.contains("<title>Database Result id=1 lastName=last_01</title>"));
        assert!(xml.contains("<id>1</id>"));
        assert!(xml.contains("<lastName>last_01</lastName>"));
    }

    #[test]
    fn test_render_skips_null_columns() {
        let xml = XmlRenderer.render("payroll", &sample_row(), &["id".to_string()]);
        assert!(!xml.contains("<notes>"));
    }

    #[test]
    fn test_render_deterministic() {
        let keys = vec!["id".to_string()];
        let a = XmlRenderer.render("payroll", &sample_row(), &keys);
        let b = XmlRenderer.render("payroll", &sample_row(), &keys);
        assert_eq!(a, b);
    }

    #[test]
    fn test_render_escapes_markup() {
        let row: Row = [(
            "name".to_string(),
            ColumnValue::Text("<b>&\"bold\"</b>".to_string()),
        )]
        .into_iter()
        .collect();
        let xml = XmlRenderer.render("db", &row, &["name".to_string()]);
        assert!(xml.contains("&lt;b&gt;&amp;&quot;bold&quot;&lt;/b&gt;"));
    }

    #[test]
    fn test_element_name_sanitized() {
        assert_eq!(element_name("first name"), "first_name");
        assert_eq!(element_name("2fast"), "_2fast");
    }
}
