//! Final document assembly from the summary sections.
//!
//! The template is a LaTeX file rendered with Handlebars. It sees the
//! `abstract`, `introduction` and `conclusion` variables, and every value is
//! passed through [`escape_latex`]. It is read from disk on every call so
//! edits take effect without a restart.

use crate::error::{Result, SlrError};
use handlebars::Handlebars;
use serde_json::json;
use std::path::Path;
use tracing::info;

/// File name offered to clients downloading the document
pub const DOWNLOAD_NAME: &str = "paper_summary.tex";

/// The three independently generated sections
#[derive(Debug, Clone, Default)]
pub struct SummarySections {
    pub abstract_text: String,
    pub introduction: String,
    pub conclusion: String,
}

/// Escape characters LaTeX would otherwise interpret.
pub fn escape_latex(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\textbackslash{}"),
            '&' | '%' | '$' | '#' | '_' | '{' | '}' => {
                out.push('\\');
                out.push(c);
            }
            '~' => out.push_str("\\textasciitilde{}"),
            '^' => out.push_str("\\textasciicircum{}"),
            _ => out.push(c),
        }
    }
    out
}

/// Render the sections into a template.
pub fn render(template: &str, sections: &SummarySections) -> Result<String> {
    let mut handlebars = Handlebars::new();
    handlebars.set_strict_mode(false);
    handlebars.register_escape_fn(escape_latex);

    let variables = json!({
        "abstract": sections.abstract_text,
        "introduction": sections.introduction,
        "conclusion": sections.conclusion,
    });

    handlebars
        .render_template(template, &variables)
        .map_err(|e| SlrError::Template(format!("Template render error: {}", e)))
}

/// Load the template at `path` and render the sections into it.
pub fn render_file(path: &Path, sections: &SummarySections) -> Result<String> {
    let template = std::fs::read_to_string(path).map_err(|e| {
        SlrError::Template(format!("Cannot read template {}: {}", path.display(), e))
    })?;

    let document = render(&template, sections)?;
    info!(template = %path.display(), bytes = document.len(), "Rendered summary document");
    Ok(document)
}
