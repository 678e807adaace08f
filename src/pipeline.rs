//! Pipeline table and the dispatcher that runs it.
//!
//! Failures are contained at two levels. Each step's error (or panic) is
//! captured into its [`StepOutcome`] and the next step runs. The step loop
//! as a whole runs inside a second boundary, so a defect in the loop itself
//! is recorded as an abort instead of taking the process down.

use std::panic::{self, AssertUnwindSafe};

use chrono::Utc;

use crate::config::{EnvironmentProfile, OrchestratorConfig};
use crate::environment::{EnvironmentKind, classify_instance};
use crate::properties::PropertyStore;
use crate::report::{Disposition, RunReport, StepOutcome, StepResult};
use crate::steps::{BASE_COLOR_PROPERTY, ConfigStep, PRODUCT_DESCRIPTION_PROPERTY};
use crate::storage::Storage;

/// Ordered steps for one environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipeline {
    kind: EnvironmentKind,
    steps: Vec<ConfigStep>,
}

impl Pipeline {
    /// Look up the pipeline for an environment kind.
    ///
    /// Production and Unknown map to empty pipelines.
    pub fn for_environment(kind: EnvironmentKind, config: &OrchestratorConfig) -> Self {
        let steps = match kind {
            EnvironmentKind::Development => Self::development_steps(&config.dev_profile()),
            EnvironmentKind::Qa => Self::qa_steps(&config.qa_profile()),
            EnvironmentKind::Production | EnvironmentKind::Unknown => Vec::new(),
        };
        Self { kind, steps }
    }

    fn development_steps(profile: &EnvironmentProfile) -> Vec<ConfigStep> {
        vec![
            ConfigStep::set_property(BASE_COLOR_PROPERTY, &profile.base_color),
            ConfigStep::set_property(PRODUCT_DESCRIPTION_PROPERTY, &profile.product_description),
            ConfigStep::EnableTestingFramework,
            ConfigStep::EnableEmail {
                redirect: profile.email_redirect.clone(),
            },
            ConfigStep::DisableScheduledJobs,
            ConfigStep::LockOutNonAdminUsers,
            ConfigStep::DisableAllThemes,
            ConfigStep::EnableTheme(profile.theme.clone()),
            ConfigStep::ForceThemeForAllUsers(profile.theme.clone()),
        ]
    }

    fn qa_steps(profile: &EnvironmentProfile) -> Vec<ConfigStep> {
        vec![
            ConfigStep::set_property(BASE_COLOR_PROPERTY, &profile.base_color),
            ConfigStep::set_property(PRODUCT_DESCRIPTION_PROPERTY, &profile.product_description),
            ConfigStep::EnableEmail {
                redirect: profile.email_redirect.clone(),
            },
            ConfigStep::DisableScheduledJobs,
            ConfigStep::DisableAllThemes,
            ConfigStep::EnableTheme(profile.theme.clone()),
            ConfigStep::ForceThemeForAllUsers(profile.theme.clone()),
        ]
    }

    pub fn kind(&self) -> EnvironmentKind {
        self.kind
    }

    pub fn steps(&self) -> &[ConfigStep] {
        &self.steps
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Result of identifying the current instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub instance: String,
    pub kind: EnvironmentKind,
    pub identity_error: Option<String>,
}

/// Run `f`, turning a panic into an error message.
pub(crate) fn contain<T>(f: impl FnOnce() -> T) -> Result<T, String> {
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(|payload| {
        if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic".to_string()
        }
    })
}

/// Classifies the instance and applies the matching pipeline.
pub struct Orchestrator<'a> {
    config: &'a OrchestratorConfig,
    storage: &'a dyn Storage,
    properties: &'a dyn PropertyStore,
}

impl<'a> Orchestrator<'a> {
    pub fn new(config: &'a OrchestratorConfig, storage: &'a dyn Storage, properties: &'a dyn PropertyStore) -> Self {
        Self {
            config,
            storage,
            properties,
        }
    }

    /// Read the instance name and classify it.
    ///
    /// A failed or missing read yields an empty identity, which is Unknown.
    pub fn classify(&self) -> Classification {
        let (instance, identity_error) = match self.properties.get(&self.config.instance_property) {
            Ok(value) => (value.unwrap_or_default(), None),
            Err(e) => (String::new(), Some(e.to_string())),
        };
        let kind = classify_instance(&instance, &self.config.instances);
        Classification {
            instance,
            kind,
            identity_error,
        }
    }

    /// Classification plus the pipeline that would run, without running it.
    pub fn plan(&self) -> (Classification, Pipeline) {
        let classification = self.classify();
        let pipeline = Pipeline::for_environment(classification.kind, self.config);
        (classification, pipeline)
    }

    /// Classify and dispatch. Never fails; everything lands in the report.
    pub fn run(&self) -> RunReport {
        let started_at = Utc::now();
        let (classification, pipeline) = self.plan();
        let debug = self
            .properties
            .is_true(&self.config.debug_property)
            .unwrap_or(false);

        let mut steps = Vec::new();
        let mut aborted = None;

        let disposition = match classification.kind {
            EnvironmentKind::Production => Disposition::RefusedProduction,
            EnvironmentKind::Unknown => Disposition::Unrecognized,
            EnvironmentKind::Development | EnvironmentKind::Qa => {
                if let Err(reason) = contain(|| self.execute(&pipeline, &mut steps)) {
                    aborted = Some(reason);
                }
                Disposition::Applied
            }
        };

        RunReport {
            instance: classification.instance,
            environment: classification.kind,
            disposition,
            steps,
            identity_error: classification.identity_error,
            aborted,
            debug,
            started_at,
            finished_at: Utc::now(),
        }
    }

    fn execute(&self, pipeline: &Pipeline, outcomes: &mut Vec<StepOutcome>) {
        for step in pipeline.steps() {
            let result = match contain(|| step.run(self.storage, self.properties)) {
                Ok(Ok(effect)) => StepResult::Applied(effect),
                Ok(Err(e)) => StepResult::Failed(e.to_string()),
                Err(panic) => StepResult::Failed(format!("panicked: {}", panic)),
            };
            outcomes.push(StepOutcome {
                step: step.clone(),
                result,
            });
        }
    }
}
