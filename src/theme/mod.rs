//! Theme engine
//!
//! This module provides template rendering using Tera.
//! Features:
//! - Built-in templates embedded in the binary
//! - Per-file overrides from the configured theme directory
//! - Standard template variables (site title, session, request path)
//! - A `ko_date` filter for Korean long-form dates

use chrono::{DateTime, Datelike, FixedOffset, Offset, Utc};
use rust_embed::RustEmbed;
use serde::Serialize;
use std::collections::HashMap;
use std::error::Error as StdError;
use std::fs;
use std::path::Path;
use tera::{Context as TeraContext, Tera, Value};

use crate::config::{SiteConfig, ThemeConfig};
use crate::models::SessionState;

mod error;

pub use error::ThemeError;

/// Nav fragment showing sign-in links or profile/sign-out controls
pub const AUTH_BUTTON_TEMPLATE: &str = "partials/auth_button.html";

/// Built-in templates
#[derive(RustEmbed)]
#[folder = "templates/"]
#[include = "*.html"]
struct EmbeddedTemplates;

/// Theme engine for rendering templates
pub struct ThemeEngine {
    /// Tera template engine instance
    tera: Tera,
    site_title: String,
}

impl ThemeEngine {
    /// Create a new theme engine
    ///
    /// Loads the embedded templates, then any `.html` file under
    /// `theme.path` replacing the embedded template of the same name.
    pub fn new(theme: &ThemeConfig, site: &SiteConfig) -> Result<Self, ThemeError> {
        let mut templates: HashMap<String, String> = HashMap::new();

        for name in EmbeddedTemplates::iter() {
            if let Some(file) = EmbeddedTemplates::get(&name) {
                let content = String::from_utf8(file.data.into_owned())
                    .map_err(|e| ThemeError::TemplateError(format!("Template {} is not UTF-8: {}", name, e)))?;
                templates.insert(name.into_owned(), content);
            }
        }

        let mut overrides = Vec::new();
        collect_templates_from_dir(&theme.path, &theme.path, &mut overrides)?;
        for (name, content) in overrides {
            tracing::info!(template = %name, "Using template override");
            templates.insert(name, content);
        }

        let mut tera = Tera::default();
        tera.add_raw_templates(templates)
            .map_err(|e| ThemeError::TemplateError(format!("Failed to load templates: {}", describe(&e))))?;
        tera.register_filter("ko_date", ko_date_filter(site.utc_offset_hours));

        Ok(Self {
            tera,
            site_title: site.title.clone(),
        })
    }

    /// Render a template with context
    pub fn render(&self, template: &str, context: &TeraContext) -> Result<String, ThemeError> {
        self.tera.render(template, context).map_err(|e| {
            ThemeError::TemplateError(format!("Failed to render '{}': {}", template, describe(&e)))
        })
    }

    /// Render a page with the standard variables added
    pub fn render_page(
        &self,
        template: &str,
        context: &TeraContext,
        standard_vars: &StandardTemplateVars,
    ) -> Result<String, ThemeError> {
        let mut full_context = context.clone();

        full_context.insert("site_title", &self.site_title);
        full_context.insert("request_path", &standard_vars.request_path);
        full_context.insert("session", &standard_vars.session);
        full_context.insert("year", &standard_vars.year);

        self.render(template, &full_context)
    }

    /// Render the nav auth button for a session state.
    ///
    /// `Unknown` renders nothing.
    pub fn render_auth_button(&self, session: &SessionState) -> Result<String, ThemeError> {
        let mut context = TeraContext::new();
        context.insert("session", session);
        self.render(AUTH_BUTTON_TEMPLATE, &context)
    }

    pub fn has_template(&self, template: &str) -> bool {
        self.tera.get_template_names().any(|name| name == template)
    }

    /// Generate a simple HTML error page
    ///
    /// Used when a page template itself fails to render.
    pub fn simple_error_page(error: &str) -> String {
        format!(
            r#"<!DOCTYPE html>
<html lang="ko">
<head>
    <meta charset="UTF-8">
    <title>오류</title>
</head>
<body>
    <h1>페이지를 표시할 수 없습니다</h1>
    <p>{}</p>
</body>
</html>"#,
            tera::escape_html(error)
        )
    }
}

/// Collect `.html` files under `current_path`, named relative to `base_path`
fn collect_templates_from_dir(
    base_path: &Path,
    current_path: &Path,
    templates: &mut Vec<(String, String)>,
) -> Result<(), ThemeError> {
    if !current_path.is_dir() {
        return Ok(());
    }

    for entry in fs::read_dir(current_path)? {
        let path = entry?.path();

        if path.is_dir() {
            collect_templates_from_dir(base_path, &path, templates)?;
        } else if path.extension().is_some_and(|ext| ext == "html") {
            let relative_path = path
                .strip_prefix(base_path)
                .map_err(|_| ThemeError::TemplateError("Failed to get relative path".to_string()))?;

            let template_name = relative_path.to_string_lossy().replace('\\', "/");
            templates.push((template_name, fs::read_to_string(&path)?));
        }
    }

    Ok(())
}

/// Error message with its source chain
fn describe(e: &tera::Error) -> String {
    let mut message = e.to_string();
    let mut source = e.source();
    while let Some(s) = source {
        message.push_str(&format!("\n  Caused by: {}", s));
        source = s.source();
    }
    message
}

/// Formats an RFC 3339 timestamp as `2024년 1월 5일` in the given offset.
///
/// Values that do not parse are passed through unchanged.
fn ko_date_filter(
    utc_offset_hours: i32,
) -> impl Fn(&Value, &HashMap<String, Value>) -> tera::Result<Value> + Send + Sync {
    let offset = FixedOffset::east_opt(utc_offset_hours * 3600)
        .unwrap_or_else(|| Utc.fix());

    move |value: &Value, _args: &HashMap<String, Value>| {
        let Some(raw) = value.as_str() else {
            return Ok(value.clone());
        };
        match DateTime::parse_from_rfc3339(raw) {
            Ok(at) => Ok(Value::String(
                at.with_timezone(&offset).format("%Y년 %-m월 %-d일").to_string(),
            )),
            Err(_) => Ok(value.clone()),
        }
    }
}

/// Standard template variables
#[derive(Debug, Clone, Serialize)]
pub struct StandardTemplateVars {
    /// Current request path
    pub request_path: String,
    /// Session state of the requesting client
    pub session: SessionState,
    /// Current year (for copyright)
    pub year: i32,
}

impl StandardTemplateVars {
    pub fn new(request_path: impl Into<String>, session: SessionState) -> Self {
        Self {
            request_path: request_path.into(),
            session,
            year: Utc::now().year(),
        }
    }
}

#[cfg(test)]
mod tests;
