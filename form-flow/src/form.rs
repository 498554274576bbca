//! The embedded form's state machine.
//!
//! A [`FormInstance`] reacts to host messages and user actions, one input at
//! a time, and reports what happened as a [`Step`]: the state transitions it
//! went through and at most one message for the host. It never performs I/O;
//! the runner moves messages between the instance and its channel.

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::brand::BrandCatalog;
use crate::context::FieldStore;
use crate::error::Result;
use crate::protocol::{
    Feature, Flow, InsuranceType, Message, ResultMessage, StartMessage, SubmitMessage,
};
use crate::schema::{Schema, ValidationErrors};

/// Source of "today" for date and year rules.
pub type Clock = Arc<dyn Fn() -> NaiveDate + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FormState {
    Uninitialized,
    Ready,
    Validating,
    Submitting,
    ResultOk,
    ResultError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    Start,
    SubmitRequested,
    ValidationFailed,
    ValidationPassed,
    Loading,
    ResultOk,
    ResultError,
    Settled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub from: FormState,
    pub to: FormState,
    pub trigger: Trigger,
}

/// Input coming from the person filling in the form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum UserAction {
    SetField { path: String, value: Value },
    ClearField { path: String },
    Submit,
}

/// Outcome text shown after a submission settles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum Notice {
    Success {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result_id: Option<String>,
    },
    Error {
        message: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormConfig {
    pub brand: String,
    pub feature: Feature,
    pub flow: Flow,
    pub insurance: InsuranceType,
}

/// What one input did to the form.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Step {
    pub transitions: Vec<Transition>,
    pub outgoing: Option<Message>,
}

impl Step {
    pub fn idle() -> Self {
        Self::default()
    }

    pub fn is_idle(&self) -> bool {
        self.transitions.is_empty() && self.outgoing.is_none()
    }
}

/// Serializable view of a form, published after every step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormSnapshot {
    pub state: FormState,
    pub config: Option<FormConfig>,
    pub display_name: Option<String>,
    pub fields: Value,
    pub errors: ValidationErrors,
    pub visible_sections: Vec<String>,
    pub can_submit: bool,
    pub is_loading: bool,
    pub notice: Option<Notice>,
}

pub struct FormInstance {
    state: FormState,
    config: Option<FormConfig>,
    schema: Option<Schema>,
    fields: FieldStore,
    errors: ValidationErrors,
    is_loading: bool,
    notice: Option<Notice>,
    brands: Arc<BrandCatalog>,
    clock: Clock,
}

impl FormInstance {
    pub fn new(brands: Arc<BrandCatalog>) -> Self {
        Self {
            state: FormState::Uninitialized,
            config: None,
            schema: None,
            fields: FieldStore::new(),
            errors: ValidationErrors::new(),
            is_loading: false,
            notice: None,
            brands,
            clock: Arc::new(|| Utc::now().date_naive()),
        }
    }

    pub fn with_clock<F>(mut self, clock: F) -> Self
    where
        F: Fn() -> NaiveDate + Send + Sync + 'static,
    {
        self.clock = Arc::new(clock);
        self
    }

    pub fn state(&self) -> FormState {
        self.state
    }

    pub fn config(&self) -> Option<&FormConfig> {
        self.config.as_ref()
    }

    pub fn field(&self, path: &str) -> Option<Value> {
        self.fields.get(path)
    }

    pub fn fields(&self) -> Value {
        self.fields.to_document()
    }

    pub fn errors(&self) -> &ValidationErrors {
        &self.errors
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    /// Submit is enabled only when ready, not loading, and the draft passes.
    pub fn can_submit(&self) -> bool {
        let Some(schema) = &self.schema else {
            return false;
        };
        self.state == FormState::Ready
            && !self.is_loading
            && schema.is_submittable_at(&self.fields.to_document(), (self.clock)())
    }

    pub fn visible_sections(&self) -> Vec<String> {
        self.schema
            .as_ref()
            .map(|schema| {
                schema
                    .visible_sections(&self.fields.to_document())
                    .into_iter()
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn snapshot(&self) -> FormSnapshot {
        FormSnapshot {
            state: self.state,
            config: self.config.clone(),
            display_name: self
                .config
                .as_ref()
                .map(|config| self.brands.resolve(&config.brand).display_name.clone()),
            fields: self.fields.to_document(),
            errors: self.errors.clone(),
            visible_sections: self.visible_sections(),
            can_submit: self.can_submit(),
            is_loading: self.is_loading,
            notice: self.notice.clone(),
        }
    }

    /// React to a message from the host.
    pub fn handle_message(&mut self, message: Message) -> Step {
        match message {
            Message::Start(start) => self.on_start(start),
            Message::Submit(SubmitMessage::Loading(is_loading)) => self.on_loading(is_loading),
            Message::Submit(SubmitMessage::Data(_)) => {
                warn!("form received its own submission payload; ignoring");
                Step::idle()
            }
            Message::Result(result) => self.on_result(result),
        }
    }

    /// React to the person filling in the form.
    ///
    /// Edits made while the form is busy are ignored. An edit whose path
    /// cannot be written is an error and leaves the fields as they were.
    pub fn handle_action(&mut self, action: UserAction) -> Result<Step> {
        match action {
            UserAction::Submit => Ok(self.on_submit()),
            UserAction::SetField { path, value } => {
                if self.accepts_edits() {
                    if let Err(e) = self.fields.set(&path, value) {
                        warn!(field = %path, "edit refused");
                        return Err(e);
                    }
                    self.after_edit(&path);
                }
                Ok(Step::idle())
            }
            UserAction::ClearField { path } => {
                if self.accepts_edits() {
                    self.fields.remove(&path);
                    self.after_edit(&path);
                }
                Ok(Step::idle())
            }
        }
    }

    fn on_start(&mut self, start: StartMessage) -> Step {
        let Some(flow) = start.feature.flow() else {
            warn!(brand = %start.brand, feature = %start.feature, "no form for feature; ignoring start");
            return Step::idle();
        };
        let schema = match Schema::for_form(flow, start.insurance) {
            Ok(schema) => schema,
            Err(e) => {
                warn!(brand = %start.brand, error = %e, "ignoring start");
                return Step::idle();
            }
        };
        if self.state == FormState::Submitting {
            warn!(brand = %start.brand, "start received while submitting; ignoring");
            return Step::idle();
        }

        let form_changed = self
            .config
            .as_ref()
            .is_none_or(|config| config.flow != flow || config.insurance != start.insurance);

        if form_changed || start.initial_data.is_some() {
            self.fields.replace(schema.defaults());
            self.errors = ValidationErrors::new();
            self.notice = None;
            if let Some(initial_data) = start.initial_data {
                self.fields.merge(initial_data);
            }
        }

        info!(
            brand = %start.brand,
            feature = %start.feature,
            insurance = %start.insurance,
            reset = form_changed,
            "form started"
        );

        self.config = Some(FormConfig {
            brand: start.brand,
            feature: start.feature,
            flow,
            insurance: start.insurance,
        });
        self.schema = Some(schema);
        self.is_loading = false;
        self.prune_hidden();

        Step {
            transitions: vec![self.move_to(FormState::Ready, Trigger::Start)],
            outgoing: None,
        }
    }

    fn on_submit(&mut self) -> Step {
        if self.state != FormState::Ready || self.is_loading {
            debug!(state = ?self.state, is_loading = self.is_loading, "submit ignored");
            return Step::idle();
        }
        let Some(schema) = self.schema.clone() else {
            return Step::idle();
        };

        let mut transitions = vec![self.move_to(FormState::Validating, Trigger::SubmitRequested)];

        match schema.validate_at(&self.fields.to_document(), (self.clock)()) {
            Err(errors) => {
                debug!(error_count = errors.len(), "validation failed");
                self.errors = errors;
                transitions.push(self.move_to(FormState::Ready, Trigger::ValidationFailed));
                Step {
                    transitions,
                    outgoing: None,
                }
            }
            Ok(record) => {
                self.errors = ValidationErrors::new();
                self.notice = None;
                transitions.push(self.move_to(FormState::Submitting, Trigger::ValidationPassed));
                info!(insurance = %record.insurance_type(), flow = %record.flow(), "submitting form");
                Step {
                    transitions,
                    outgoing: Some(Message::Submit(SubmitMessage::Data(record))),
                }
            }
        }
    }

    fn on_loading(&mut self, is_loading: bool) -> Step {
        self.is_loading = is_loading;
        if is_loading && self.state == FormState::Submitting {
            return Step {
                transitions: vec![self.move_to(FormState::Submitting, Trigger::Loading)],
                outgoing: None,
            };
        }
        Step::idle()
    }

    fn on_result(&mut self, result: ResultMessage) -> Step {
        if self.state != FormState::Submitting {
            warn!(state = ?self.state, ok = result.ok, "result received outside a submission; ignoring");
            return Step::idle();
        }
        self.is_loading = false;

        let mut transitions = Vec::with_capacity(2);
        if result.ok {
            transitions.push(self.move_to(FormState::ResultOk, Trigger::ResultOk));
            let message = result.message.unwrap_or_else(|| self.success_text());
            self.notice = Some(Notice::Success {
                message,
                result_id: result.result_id,
            });
            if let Some(schema) = &self.schema {
                self.fields.replace(schema.defaults());
            }
            self.errors = ValidationErrors::new();
        } else {
            transitions.push(self.move_to(FormState::ResultError, Trigger::ResultError));
            let message = result
                .error
                .or(result.message)
                .unwrap_or_else(|| "Submission failed".to_string());
            warn!(error = %message, "submission rejected");
            self.notice = Some(Notice::Error { message });
        }
        transitions.push(self.move_to(FormState::Ready, Trigger::Settled));

        Step {
            transitions,
            outgoing: None,
        }
    }

    fn accepts_edits(&self) -> bool {
        let accepts = self.state == FormState::Ready && !self.is_loading;
        if !accepts {
            debug!(state = ?self.state, "edit ignored");
        }
        accepts
    }

    /// Hide sections that no longer apply and refresh the edited field's
    /// error once errors are on display.
    fn after_edit(&mut self, path: &str) {
        self.prune_hidden();
        if self.errors.is_empty() {
            return;
        }
        let Some(schema) = &self.schema else {
            return;
        };

        let ancestors: Vec<&str> = path
            .match_indices('.')
            .map(|(position, _)| &path[..position])
            .collect();
        self.errors.clear_under(path);
        for ancestor in &ancestors {
            self.errors.remove(ancestor);
        }

        if let Err(fresh) = schema.validate_at(&self.fields.to_document(), (self.clock)()) {
            let nested = format!("{path}.");
            for (key, message) in fresh.iter() {
                if key == path || key.starts_with(&nested) || ancestors.contains(&key) {
                    self.errors.add(key, message);
                }
            }
        }
    }

    fn prune_hidden(&mut self) {
        let Some(schema) = &self.schema else {
            return;
        };
        for path in schema.hidden_fields(&self.fields.to_document()) {
            if self.fields.remove(path).is_some() {
                debug!(field = path, "hidden field cleared");
            }
            self.errors.clear_under(path);
        }
    }

    fn success_text(&self) -> String {
        match &self.config {
            Some(config) => self
                .brands
                .resolve(&config.brand)
                .success_text(config.flow)
                .to_string(),
            None => "Submitted".to_string(),
        }
    }

    fn move_to(&mut self, to: FormState, trigger: Trigger) -> Transition {
        let transition = Transition {
            from: self.state,
            to,
            trigger,
        };
        debug!(from = ?transition.from, to = ?to, trigger = ?trigger, "form transition");
        self.state = to;
        transition
    }
}
