//! Theme engine
//!
//! This module provides template rendering using Tera.
//! Features:
//! - Default templates embedded into the binary
//! - Per-template overrides from the configured theme directory
//! - Standard template variables (site name, current user, path)
//! - Error page fallback when a template fails

use anyhow::{Context, Result};
use chrono::Datelike;
use rust_embed::RustEmbed;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::fs;
use std::path::{Path, PathBuf};
use tera::{Context as TeraContext, Tera};

use crate::models::User;

mod error;

pub use error::ThemeError;

/// Templates shipped with the binary
#[derive(RustEmbed)]
#[folder = "templates/"]
#[include = "*.html"]
struct DefaultTemplates;

/// Theme engine for rendering templates
pub struct ThemeEngine {
    /// Tera template engine instance
    tera: Tera,
    /// Directory whose templates override the embedded ones
    override_path: PathBuf,
}

impl ThemeEngine {
    /// Create a new theme engine
    ///
    /// Embedded templates are loaded first; any `.html` file under
    /// `override_path` with the same relative name replaces its embedded
    /// counterpart, and new names are added. A missing directory simply
    /// means no overrides.
    pub fn new(override_path: &Path) -> Result<Self> {
        let override_path = override_path.to_path_buf();

        let mut templates: BTreeMap<String, String> = BTreeMap::new();
        for name in DefaultTemplates::iter() {
            if let Some(file) = DefaultTemplates::get(&name) {
                let content = String::from_utf8(file.data.into_owned())
                    .with_context(|| format!("Embedded template {} is not UTF-8", name))?;
                templates.insert(name.to_string(), content);
            }
        }

        let mut overrides = Vec::new();
        collect_templates_from_dir(&override_path, &override_path, &mut overrides)?;
        if !overrides.is_empty() {
            tracing::info!(
                "Loaded {} template override(s) from {:?}",
                overrides.len(),
                override_path
            );
        }
        templates.extend(overrides);

        let mut tera = Tera::default();
        tera.add_raw_templates(templates.iter().map(|(name, content)| (name.as_str(), content.as_str())))
            .map_err(|e| ThemeError::TemplateError(describe(&e)))?;

        Ok(Self { tera, override_path })
    }

    /// Directory consulted for overrides
    pub fn override_path(&self) -> &Path {
        &self.override_path
    }

    /// Whether a template with this name is loaded
    pub fn has_template(&self, template: &str) -> bool {
        self.tera.get_template_names().any(|name| name == template)
    }

    /// Render a template with context
    ///
    /// # Arguments
    /// * `template` - Template name (e.g., "blog/index.html")
    /// * `context` - Tera context with template variables
    pub fn render(&self, template: &str, context: &TeraContext) -> Result<String> {
        self.tera.render(template, context).map_err(|e| {
            ThemeError::TemplateError(format!("Failed to render '{}': {}", template, describe(&e))).into()
        })
    }

    /// Render a template with standard variables automatically added
    pub fn render_with_standard_vars(
        &self,
        template: &str,
        context: &TeraContext,
        standard_vars: &StandardTemplateVars,
    ) -> Result<String> {
        let mut full_context = context.clone();
        full_context.insert("site_name", &standard_vars.site_name);
        full_context.insert("request_path", &standard_vars.request_path);
        full_context.insert("year", &standard_vars.year);
        full_context.insert("current_user", &standard_vars.current_user);

        self.render(template, &full_context)
    }

    /// Render a template, falling back to `error.html` and then to a
    /// built-in page. Always produces HTML.
    pub fn render_with_fallback(&self, template: &str, context: &TeraContext) -> String {
        match self.render(template, context) {
            Ok(html) => html,
            Err(e) => {
                tracing::error!("Failed to render template '{}': {:#}", template, e);

                let mut error_context = context.clone();
                error_context.insert("status_code", &500);
                error_context.insert("error_message", "Internal server error");

                match self.render("error.html", &error_context) {
                    Ok(html) => html,
                    Err(error_template_err) => {
                        tracing::error!("Failed to render error template: {:#}", error_template_err);
                        simple_error_page(500, "Internal server error")
                    }
                }
            }
        }
    }
}

/// Tera errors keep the interesting part in their source chain
fn describe(error: &tera::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(s) = source {
        message.push_str(&format!("\n  Caused by: {}", s));
        source = s.source();
    }
    message
}

/// Collect `.html` templates below `current_path`, named relative to `base_path`
fn collect_templates_from_dir(
    base_path: &Path,
    current_path: &Path,
    templates: &mut Vec<(String, String)>,
) -> Result<()> {
    if !current_path.is_dir() {
        return Ok(());
    }

    for entry in fs::read_dir(current_path)
        .with_context(|| format!("Failed to read template directory: {:?}", current_path))?
    {
        let path = entry?.path();

        if path.is_dir() {
            collect_templates_from_dir(base_path, &path, templates)?;
        } else if path.extension().is_some_and(|ext| ext == "html") {
            let relative_path = path
                .strip_prefix(base_path)
                .map_err(|_| ThemeError::TemplateError("Failed to get relative path".to_string()))?;
            let template_name = relative_path.to_string_lossy().replace('\\', "/");

            let content = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read template: {:?}", path))?;

            templates.push((template_name, content));
        }
    }

    Ok(())
}

/// Last-resort page used when even `error.html` cannot be rendered
pub fn simple_error_page(status: u16, message: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head><meta charset="UTF-8"><title>{status}</title></head>
<body>
    <h1>{status}</h1>
    <p>{message}</p>
    <p><a href="/">Home</a></p>
</body>
</html>"#,
        status = status,
        message = tera::escape_html(message)
    )
}

/// Standard template variables available on every page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardTemplateVars {
    /// Blog name
    pub site_name: String,
    /// Current logged-in user (optional)
    pub current_user: Option<CurrentUser>,
    /// Current request path
    pub request_path: String,
    /// Current year (for copyright)
    pub year: i32,
}

/// Current user information for templates
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: i64,
    pub username: String,
    pub display_name: String,
    pub role: String,
}

impl From<&User> for CurrentUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            display_name: user.display_name(),
            role: user.role.to_string(),
        }
    }
}

impl StandardTemplateVars {
    /// Create new standard template variables
    pub fn new(site_name: impl Into<String>, request_path: impl Into<String>) -> Self {
        Self {
            site_name: site_name.into(),
            current_user: None,
            request_path: request_path.into(),
            year: chrono::Utc::now().year(),
        }
    }

    /// Set the current user
    pub fn with_user(mut self, user: Option<&User>) -> Self {
        self.current_user = user.map(CurrentUser::from);
        self
    }
}
