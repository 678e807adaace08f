//! Per-environment settings applied by the dev and QA pipelines.
//!
//! The config file carries [`ProfileOverrides`]; unset fields fall back to
//! the built-in profile for that environment.

use eyre::Result;
use serde::{Deserialize, Serialize};

/// Resolved values a pipeline writes for one environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentProfile {
    /// Banner color written to `css.base.color`.
    pub base_color: String,
    /// Header text written to `glide.product.description`.
    pub product_description: String,
    /// UI theme enabled and forced for every user.
    pub theme: String,
    /// Address all outbound mail is redirected to.
    pub email_redirect: Option<String>,
}

impl EnvironmentProfile {
    pub fn development() -> Self {
        Self {
            base_color: "darkred".to_string(),
            product_description: "DEV".to_string(),
            theme: "dev-theme".to_string(),
            email_redirect: None,
        }
    }

    pub fn qa() -> Self {
        Self {
            base_color: "blue".to_string(),
            product_description: "TEST".to_string(),
            theme: "qa-theme".to_string(),
            email_redirect: None,
        }
    }
}

/// Profile fields as written in the config file.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ProfileOverrides {
    #[serde(rename = "base-color", skip_serializing_if = "Option::is_none")]
    pub base_color: Option<String>,

    #[serde(rename = "product-description", skip_serializing_if = "Option::is_none")]
    pub product_description: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,

    #[serde(rename = "email-redirect", skip_serializing_if = "Option::is_none")]
    pub email_redirect: Option<String>,
}

impl ProfileOverrides {
    /// Apply these overrides on top of a built-in profile.
    pub fn resolve(&self, base: EnvironmentProfile) -> EnvironmentProfile {
        EnvironmentProfile {
            base_color: self.base_color.clone().unwrap_or(base.base_color),
            product_description: self.product_description.clone().unwrap_or(base.product_description),
            theme: self.theme.clone().unwrap_or(base.theme),
            email_redirect: self.email_redirect.clone().or(base.email_redirect),
        }
    }

    pub(crate) fn validate(&self, section: &str) -> Result<()> {
        if self.theme.as_deref().is_some_and(str::is_empty) {
            eyre::bail!("{}.theme must not be empty", section);
        }
        if self.email_redirect.as_deref().is_some_and(str::is_empty) {
            eyre::bail!("{}.email-redirect must not be empty", section);
        }
        Ok(())
    }
}
