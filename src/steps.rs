//! The library of named configuration steps.
//!
//! Each step is idempotent and independent of every other step: none reads
//! state written by an earlier step in the same run.

use crate::error::Result;
use crate::mutation::{BulkMutation, MutationReport};
use crate::properties::PropertyStore;
use crate::storage::{Filter, Storage};

pub const USERS_COLLECTION: &str = "sys_user";
pub const SCHEDULED_JOBS_COLLECTION: &str = "sysauto";
pub const THEMES_COLLECTION: &str = "sys_ui_theme";
pub const USER_PREFERENCES_COLLECTION: &str = "sys_user_preference";

/// Preference row that selects a user's UI theme.
pub const THEME_PREFERENCE: &str = "glide.css.theme.ui16";
/// Device of the themes disable-all-themes turns off.
pub const THEME_DEVICE: &str = "Concourse";
pub const ADMIN_ROLE: &str = "admin";

pub const BASE_COLOR_PROPERTY: &str = "css.base.color";
pub const PRODUCT_DESCRIPTION_PROPERTY: &str = "glide.product.description";
pub const ATF_RUNNER_PROPERTY: &str = "sn_atf.runner.enabled";
pub const ATF_SCHEDULE_PROPERTY: &str = "sn_atf.schedule.enabled";
pub const EMAIL_READ_PROPERTY: &str = "glide.email.read.active";
pub const EMAIL_SMTP_PROPERTY: &str = "glide.email.smtp.active";
pub const EMAIL_TEST_USER_PROPERTY: &str = "glide.email.test.user";

/// A named unit of configuration work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigStep {
    SetProperty { key: String, value: String },
    EnableTestingFramework,
    EnableEmail { redirect: Option<String> },
    DisableScheduledJobs,
    LockOutNonAdminUsers,
    DisableAllThemes,
    EnableTheme(String),
    ForceThemeForAllUsers(String),
}

/// What a step changed.
#[derive(Debug, Clone, PartialEq)]
pub enum StepEffect {
    /// Properties written, by key.
    PropertiesSet(Vec<String>),
    /// Records selected and persisted.
    Records(MutationReport),
    /// Nothing to do; the reason is logged.
    Skipped(String),
}

impl ConfigStep {
    pub fn set_property(key: impl Into<String>, value: impl Into<String>) -> Self {
        ConfigStep::SetProperty {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Stable kebab-case name of the operation.
    pub fn name(&self) -> &'static str {
        match self {
            ConfigStep::SetProperty { .. } => "set-property",
            ConfigStep::EnableTestingFramework => "enable-testing-framework",
            ConfigStep::EnableEmail { .. } => "enable-email",
            ConfigStep::DisableScheduledJobs => "disable-scheduled-jobs",
            ConfigStep::LockOutNonAdminUsers => "lock-out-non-admin-users",
            ConfigStep::DisableAllThemes => "disable-all-themes",
            ConfigStep::EnableTheme(_) => "enable-named-theme",
            ConfigStep::ForceThemeForAllUsers(_) => "force-theme-for-all-users",
        }
    }

    /// Execute the step. Errors are contained by the caller.
    pub fn run(&self, storage: &dyn Storage, properties: &dyn PropertyStore) -> Result<StepEffect> {
        match self {
            ConfigStep::SetProperty { key, value } => {
                properties.set(key, value)?;
                Ok(StepEffect::PropertiesSet(vec![key.clone()]))
            }
            ConfigStep::EnableTestingFramework => {
                set_all(properties, &[(ATF_RUNNER_PROPERTY, "true"), (ATF_SCHEDULE_PROPERTY, "true")])
            }
            ConfigStep::EnableEmail { redirect } => {
                let mut pairs = vec![(EMAIL_READ_PROPERTY, "true"), (EMAIL_SMTP_PROPERTY, "true")];
                if let Some(address) = redirect {
                    pairs.push((EMAIL_TEST_USER_PROPERTY, address.as_str()));
                }
                set_all(properties, &pairs)
            }
            ConfigStep::DisableScheduledJobs => Self::scheduled_jobs_mutation().apply(storage).map(StepEffect::Records),
            ConfigStep::LockOutNonAdminUsers => Self::lockout_mutation().apply(storage).map(StepEffect::Records),
            ConfigStep::DisableAllThemes => Self::themes_mutation().apply(storage).map(StepEffect::Records),
            ConfigStep::EnableTheme(theme) => enable_theme(storage, theme),
            ConfigStep::ForceThemeForAllUsers(theme) => force_theme(storage, theme),
        }
    }

    pub fn lockout_mutation() -> BulkMutation {
        BulkMutation::new(USERS_COLLECTION)
            .filter(Filter::eq("active", true))
            .filter(Filter::eq("locked_out", false))
            .filter(Filter::ne("roles", ADMIN_ROLE))
            .set("locked_out", true)
    }

    pub fn scheduled_jobs_mutation() -> BulkMutation {
        BulkMutation::new(SCHEDULED_JOBS_COLLECTION)
            .filter(Filter::eq("active", true))
            .set("active", false)
    }

    pub fn themes_mutation() -> BulkMutation {
        BulkMutation::new(THEMES_COLLECTION)
            .filter(Filter::eq("device", THEME_DEVICE))
            .filter(Filter::eq("active", true))
            .set("active", false)
    }
}

impl std::fmt::Display for ConfigStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigStep::SetProperty { key, value } => write!(f, "{}({}={})", self.name(), key, value),
            ConfigStep::EnableTheme(theme) | ConfigStep::ForceThemeForAllUsers(theme) => {
                write!(f, "{}({})", self.name(), theme)
            }
            _ => write!(f, "{}", self.name()),
        }
    }
}

fn set_all(properties: &dyn PropertyStore, pairs: &[(&str, &str)]) -> Result<StepEffect> {
    let mut written = Vec::with_capacity(pairs.len());
    for (key, value) in pairs {
        properties.set(key, value)?;
        written.push((*key).to_string());
    }
    Ok(StepEffect::PropertiesSet(written))
}

fn missing_theme(theme: &str) -> StepEffect {
    StepEffect::Skipped(format!("theme '{}' does not exist", theme))
}

fn enable_theme(storage: &dyn Storage, theme: &str) -> Result<StepEffect> {
    let Some(mut record) = storage.find_one(THEMES_COLLECTION, &[Filter::eq("name", theme)])? else {
        return Ok(missing_theme(theme));
    };

    record.set_field("active", true);
    storage.update(THEMES_COLLECTION, &record)?;
    Ok(StepEffect::Records(MutationReport {
        matched: 1,
        updated: 1,
        failures: Vec::new(),
    }))
}

fn force_theme(storage: &dyn Storage, theme: &str) -> Result<StepEffect> {
    let Some(record) = storage.find_one(THEMES_COLLECTION, &[Filter::eq("name", theme)])? else {
        return Ok(missing_theme(theme));
    };

    BulkMutation::new(USER_PREFERENCES_COLLECTION)
        .filter(Filter::eq("name", THEME_PREFERENCE))
        .set("value", record.id())
        .apply(storage)
        .map(StepEffect::Records)
}
