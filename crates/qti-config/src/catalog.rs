//! Validated item catalog

use crate::schema::{RawCatalog, RawItem, RawResponseProcessing};
use crate::validation::declaration_from_raw;
use qti_types::{Duration, SessionControl, TimeConstraint, VariableDeclaration};
use qti_util::{ItemId, default_data_dir};
use std::path::PathBuf;

/// Validated catalog ready for use by the session engine
#[derive(Debug, Clone)]
pub struct Catalog {
    pub session: SessionSettings,
    pub items: Vec<ItemDefinition>,
}

impl Catalog {
    /// Convert from a raw catalog (after validation)
    pub fn from_raw(raw: RawCatalog) -> Self {
        let session = SessionSettings {
            acceptable_latency: raw
                .session
                .acceptable_latency
                .as_deref()
                .and_then(|s| Duration::parse(s).ok())
                .unwrap_or(Duration::ZERO),
            data_dir: raw.session.data_dir.unwrap_or_else(default_data_dir),
        };

        let items = raw.items.into_iter().map(ItemDefinition::from_raw).collect();

        Self { session, items }
    }

    /// Get item by ID
    pub fn get_item(&self, id: &ItemId) -> Option<&ItemDefinition> {
        self.items.iter().find(|i| &i.id == id)
    }
}

/// Settings shared by every session
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Extra time tolerated past an item's max_time
    pub acceptable_latency: Duration,
    pub data_dir: PathBuf,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            acceptable_latency: Duration::ZERO,
            data_dir: default_data_dir(),
        }
    }
}

/// How outcomes are computed when an attempt ends
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ResponseProcessingTemplate {
    /// Outcomes are left untouched
    #[default]
    None,
    /// `outcome` is 1.0 when `response` matches its correct response, else 0.0
    MatchCorrect { response: String, outcome: String },
}

/// Validated item definition
#[derive(Debug, Clone)]
pub struct ItemDefinition {
    pub id: ItemId,
    pub title: Option<String>,
    pub adaptive: bool,
    pub time_limits: TimeConstraint,
    pub control: SessionControl,
    /// Declared response, outcome and template variables (built-ins excluded)
    pub variables: Vec<VariableDeclaration>,
    pub response_processing: ResponseProcessingTemplate,
}

impl ItemDefinition {
    pub fn new(id: impl Into<ItemId>) -> Self {
        Self {
            id: id.into(),
            title: None,
            adaptive: false,
            time_limits: TimeConstraint::default(),
            control: SessionControl::default(),
            variables: Vec::new(),
            response_processing: ResponseProcessingTemplate::None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_adaptive(mut self, adaptive: bool) -> Self {
        self.adaptive = adaptive;
        self
    }

    pub fn with_time_limits(mut self, time_limits: TimeConstraint) -> Self {
        self.time_limits = time_limits;
        self
    }

    pub fn with_control(mut self, control: SessionControl) -> Self {
        self.control = control;
        self
    }

    pub fn with_variable(mut self, declaration: VariableDeclaration) -> Self {
        self.variables.push(declaration);
        self
    }

    pub fn with_response_processing(mut self, template: ResponseProcessingTemplate) -> Self {
        self.response_processing = template;
        self
    }

    pub fn variable(&self, identifier: &str) -> Option<&VariableDeclaration> {
        self.variables.iter().find(|v| v.identifier == identifier)
    }

    fn from_raw(raw: RawItem) -> Self {
        let time_limits = raw
            .time_limits
            .map(|limits| {
                TimeConstraint::new(
                    limits.min_time.as_deref().and_then(|s| Duration::parse(s).ok()),
                    limits.max_time.as_deref().and_then(|s| Duration::parse(s).ok()),
                )
                .with_late_submission(limits.allow_late_submission)
            })
            .unwrap_or_default();

        let control = raw
            .session_control
            .map(|c| {
                let defaults = SessionControl::default();
                defaults
                    .with_max_attempts(c.max_attempts.unwrap_or(defaults.attempts.max_attempts))
                    .with_allow_skipping(c.allow_skipping.unwrap_or(defaults.allow_skipping))
            })
            .unwrap_or_default();

        let variables = raw
            .variables
            .iter()
            .filter_map(|v| declaration_from_raw(v).ok())
            .collect();

        let response_processing = match raw.response_processing {
            Some(RawResponseProcessing::MatchCorrect { response, outcome }) => {
                ResponseProcessingTemplate::MatchCorrect { response, outcome }
            }
            Some(RawResponseProcessing::None) | None => ResponseProcessingTemplate::None,
        };

        Self {
            id: ItemId::new(raw.id),
            title: raw.title,
            adaptive: raw.adaptive,
            time_limits,
            control,
            variables,
            response_processing,
        }
    }
}
