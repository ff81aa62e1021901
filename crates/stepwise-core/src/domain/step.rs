use crate::retry::RetryPolicy;
use crate::types::ActionKind;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Name given to steps whose document entry has no usable name
pub const UNNAMED_STEP: &str = "Unnamed";

/// One unit of declared work in a process document.
///
/// Steps are built once when the document is loaded and are only ever
/// borrowed by the interpreter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// Step name, used in every log entry about the step
    pub name: String,

    /// Which handler executes this step
    pub action: ActionKind,

    /// Opaque payload handed to the handler
    #[serde(default)]
    pub parameters: Map<String, Value>,

    /// Transform module identifier (`transform`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,

    /// External job identifier (`trigger-job`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_name: Option<String>,

    /// Pause length in seconds (`delay`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seconds: Option<f64>,

    /// Predicate expression (`branch`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,

    /// Sequence walked when the condition holds (`branch`)
    #[serde(default)]
    pub true_flow: StepSequence,

    /// Sequence walked when the condition does not hold (`branch`)
    #[serde(default)]
    pub false_flow: StepSequence,

    /// Per-step override of the handler's retry policy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryPolicy>,

    /// Fields of the source document that could not be read; a step carrying
    /// this fails validation instead of running
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub malformed: Option<String>,
}

impl Step {
    /// Create a step with no kind-specific fields
    pub fn new(name: impl Into<String>, action: impl Into<ActionKind>) -> Self {
        let name = name.into();
        Self {
            name: if name.trim().is_empty() {
                UNNAMED_STEP.to_string()
            } else {
                name
            },
            action: action.into(),
            parameters: Map::new(),
            module: None,
            job_name: None,
            seconds: None,
            condition: None,
            true_flow: StepSequence::default(),
            false_flow: StepSequence::default(),
            retry: None,
            malformed: None,
        }
    }

    /// A `trigger-job` step
    pub fn trigger_job(name: impl Into<String>, job_name: impl Into<String>) -> Self {
        let mut step = Self::new(name, ActionKind::TriggerJob);
        step.job_name = Some(job_name.into());
        step
    }

    /// A `transform` step
    pub fn transform(name: impl Into<String>, module: impl Into<String>) -> Self {
        let mut step = Self::new(name, ActionKind::Transform);
        step.module = Some(module.into());
        step
    }

    /// A `delay` step
    pub fn delay(name: impl Into<String>, seconds: f64) -> Self {
        let mut step = Self::new(name, ActionKind::Delay);
        step.seconds = Some(seconds);
        step
    }

    /// A `branch` step
    pub fn branch(
        name: impl Into<String>,
        condition: impl Into<String>,
        true_flow: StepSequence,
        false_flow: StepSequence,
    ) -> Self {
        let mut step = Self::new(name, ActionKind::Branch);
        step.condition = Some(condition.into());
        step.true_flow = true_flow;
        step.false_flow = false_flow;
        step
    }

    /// Replace the parameters (expects a JSON object; other values are ignored)
    pub fn with_parameters(mut self, parameters: Value) -> Self {
        if let Value::Object(map) = parameters {
            self.parameters = map;
        }
        self
    }

    /// Set a retry override
    pub fn with_retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(policy);
        self
    }
}

/// Ordered list of steps; order is execution order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepSequence(Vec<Step>);

impl StepSequence {
    /// Wrap a list of steps
    pub fn new(steps: Vec<Step>) -> Self {
        Self(steps)
    }

    /// Iterate in execution order
    pub fn iter(&self) -> std::slice::Iter<'_, Step> {
        self.0.iter()
    }

    /// Number of top-level steps
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no steps
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Total number of steps including every nested branch arm
    pub fn total_steps(&self) -> usize {
        self.0
            .iter()
            .map(|step| 1 + step.true_flow.total_steps() + step.false_flow.total_steps())
            .sum()
    }
}

impl From<Vec<Step>> for StepSequence {
    fn from(steps: Vec<Step>) -> Self {
        Self(steps)
    }
}

impl FromIterator<Step> for StepSequence {
    fn from_iter<I: IntoIterator<Item = Step>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a StepSequence {
    type Item = &'a Step;
    type IntoIter = std::slice::Iter<'a, Step>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
