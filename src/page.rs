//! Server-side rendering of the single catalog page.
//!
//! The page itself is static HTML; the records travel inside a JSON data
//! island that `static/script.js` turns into editable cards.

use std::{fs, path::Path};

use anyhow::{Context, Result};
use tracing::warn;

use crate::{flash::Flash, records::Record};

const BUILTIN_TEMPLATE: &str = include_str!("../templates/index.html");
const FLASH_SLOT: &str = "{{ flash }}";
const RECORDS_SLOT: &str = "{{ records_json }}";

/// Reads the page template from disk, falling back to the copy compiled
/// into the binary.
pub fn load_template(path: &Path) -> String {
    match fs::read_to_string(path) {
        Ok(template) => template,
        Err(err) => {
            warn!(
                "Template '{}' unavailable ({err}); using built-in page",
                path.display()
            );
            BUILTIN_TEMPLATE.to_string()
        }
    }
}

pub fn render(template: &str, records: &[Record], flash: Option<&Flash>) -> Result<String> {
    let records_json = script_safe_json(records)?;
    let flash_html = flash.map(flash_markup).unwrap_or_default();
    Ok(template
        .replace(FLASH_SLOT, &flash_html)
        .replace(RECORDS_SLOT, &records_json))
}

// `<`, `>` and `&` only ever occur inside JSON strings, where the escaped
// forms decode to the same text; this keeps `</script>` out of the island.
fn script_safe_json(records: &[Record]) -> Result<String> {
    let json = serde_json::to_string(records).context("serializing records for the page")?;
    Ok(json
        .replace('<', "\\u003c")
        .replace('>', "\\u003e")
        .replace('&', "\\u0026"))
}

fn flash_markup(flash: &Flash) -> String {
    format!(
        r#"<div class="flash flash-{}" role="alert">{}</div>"#,
        flash.category.as_str(),
        escape_html(&flash.message)
    )
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}
