//! Serde model of a process document as written on disk.
//!
//! The model is deliberately lenient: it accepts the field spellings used by
//! older documents (`params`, `bot_name`, legacy action names, arms given as
//! bare arrays) and normalises them when converted into core [`Step`]s.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use stepwise_core::{ActionKind, RetryPolicy, Step, StepSequence, UNNAMED_STEP};

/// Name given to documents without a usable `name`
pub const UNNAMED_PROCESS: &str = "Unnamed process";

/// Top level of a process document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessDocument {
    /// Human readable process name
    #[serde(default)]
    pub name: Option<String>,

    /// Root step sequence; required
    #[serde(default)]
    pub steps: Option<Vec<StepDocument>>,
}

impl ProcessDocument {
    /// Process name, falling back to [`UNNAMED_PROCESS`]
    pub fn process_name(&self) -> String {
        non_blank(self.name.as_deref())
            .unwrap_or(UNNAMED_PROCESS)
            .to_string()
    }
}

/// One step as written in the document.
///
/// Kind-specific fields are kept as raw values so a wrongly typed field only
/// marks its own step as malformed instead of rejecting the whole document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepDocument {
    /// Step name
    #[serde(default)]
    pub name: Option<Value>,

    /// Action identifier, canonical or legacy spelling
    #[serde(default)]
    pub action: Option<Value>,

    /// Handler payload
    #[serde(default)]
    pub parameters: Option<Value>,

    /// Older spelling of `parameters`
    #[serde(default)]
    pub params: Option<Value>,

    /// Transform module
    #[serde(default)]
    pub module: Option<Value>,

    /// Job to trigger
    #[serde(default)]
    pub job_name: Option<Value>,

    /// Older spelling of `job_name`
    #[serde(default)]
    pub bot_name: Option<Value>,

    /// Delay length in seconds
    #[serde(default)]
    pub seconds: Option<Value>,

    /// Branch condition
    #[serde(default)]
    pub condition: Option<Value>,

    /// Arm walked when the condition holds
    #[serde(default)]
    pub true_flow: Option<FlowArm>,

    /// Arm walked otherwise
    #[serde(default)]
    pub false_flow: Option<FlowArm>,

    /// Retry override for job steps
    #[serde(default)]
    pub retry: Option<Value>,
}

/// A branch arm: either `{ "steps": [...] }` or a bare list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FlowArm {
    /// `{ "steps": [...] }`
    Wrapped {
        /// Steps of the arm
        #[serde(default)]
        steps: Vec<StepDocument>,
    },
    /// `[...]`
    Bare(Vec<StepDocument>),
}

impl FlowArm {
    fn into_steps(self) -> Vec<StepDocument> {
        match self {
            FlowArm::Wrapped { steps } => steps,
            FlowArm::Bare(steps) => steps,
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn non_empty(map: Option<Map<String, Value>>) -> Option<Map<String, Value>> {
    map.filter(|m| !m.is_empty())
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "a mapping",
    }
}

/// Collects the fields of one step that have the wrong shape
#[derive(Default)]
struct FieldReader {
    problems: Vec<String>,
}

impl FieldReader {
    fn reject(&mut self, field: &str, expected: &str, value: &Value) {
        self.problems
            .push(format!("field '{}' must be {}, got {}", field, expected, type_name(value)));
    }

    fn text(&mut self, field: &str, value: Option<Value>) -> Option<String> {
        match value? {
            Value::Null => None,
            Value::String(text) => Some(text),
            other => {
                self.reject(field, "a string", &other);
                None
            }
        }
    }

    fn number(&mut self, field: &str, value: Option<Value>) -> Option<f64> {
        match value? {
            Value::Null => None,
            Value::Number(n) => n.as_f64(),
            other => {
                self.reject(field, "a number", &other);
                None
            }
        }
    }

    fn mapping(&mut self, field: &str, value: Option<Value>) -> Option<Map<String, Value>> {
        match value? {
            Value::Null => None,
            Value::Object(map) => Some(map),
            other => {
                self.reject(field, "a mapping", &other);
                None
            }
        }
    }

    fn retry(&mut self, value: Option<Value>) -> Option<RetryPolicy> {
        match value? {
            Value::Null => None,
            other => match serde_json::from_value(other) {
                Ok(policy) => Some(policy),
                Err(err) => {
                    self.problems.push(format!("field 'retry' is invalid: {}", err));
                    None
                }
            },
        }
    }

    fn finish(self) -> Option<String> {
        if self.problems.is_empty() {
            None
        } else {
            Some(self.problems.join("; "))
        }
    }
}

fn arm_sequence(arm: Option<FlowArm>) -> StepSequence {
    arm.map(|arm| arm.into_steps().into_iter().map(StepDocument::into_step).collect())
        .unwrap_or_default()
}

impl StepDocument {
    /// Normalise into a core step.
    ///
    /// Wrongly typed fields are reported on [`Step::malformed`].
    pub fn into_step(self) -> Step {
        let name = match &self.name {
            Some(Value::String(name)) => non_blank(Some(name.as_str())).unwrap_or(UNNAMED_STEP).to_string(),
            _ => UNNAMED_STEP.to_string(),
        };
        let action = match &self.action {
            Some(Value::String(action)) => ActionKind::parse(action),
            _ => ActionKind::parse(""),
        };

        let mut fields = FieldReader::default();
        let parameters = non_empty(fields.mapping("parameters", self.parameters))
            .or_else(|| non_empty(fields.mapping("params", self.params)))
            .unwrap_or_default();
        let seconds = fields
            .number("seconds", self.seconds)
            .or_else(|| parameters.get("seconds").and_then(Value::as_f64));
        let job_name = fields.text("job_name", self.job_name);
        let bot_name = fields.text("bot_name", self.bot_name);

        let mut step = Step::new(name, action);
        step.module = fields.text("module", self.module);
        step.job_name = job_name.or(bot_name);
        step.seconds = seconds;
        step.condition = fields.text("condition", self.condition);
        step.retry = fields.retry(self.retry);
        step.true_flow = arm_sequence(self.true_flow);
        step.false_flow = arm_sequence(self.false_flow);
        step.parameters = parameters;
        step.malformed = fields.finish();
        step
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn step(value: Value) -> Step {
        serde_json::from_value::<StepDocument>(value).unwrap().into_step()
    }

    #[test]
    fn test_legacy_spellings_are_normalised() {
        let s = step(json!({
            "name": "Trigger UiPath CreateService",
            "action": "uipath",
            "bot_name": "CreateServiceJob",
            "params": {"customer_id": 7}
        }));

        assert_eq!(s.action, ActionKind::TriggerJob);
        assert_eq!(s.job_name.as_deref(), Some("CreateServiceJob"));
        assert_eq!(s.parameters["customer_id"], 7);
    }

    #[test]
    fn test_parameters_win_over_params_unless_empty() {
        let both = step(json!({"action": "python", "parameters": {"a": 1}, "params": {"b": 2}}));
        assert_eq!(Value::Object(both.parameters), json!({"a": 1}));

        let empty = step(json!({"action": "python", "parameters": {}, "params": {"b": 2}}));
        assert_eq!(Value::Object(empty.parameters), json!({"b": 2}));
    }

    #[test]
    fn test_seconds_fall_back_to_parameters() {
        let s = step(json!({"name": "Wait", "action": "wait", "parameters": {"seconds": 2.5}}));
        assert_eq!(s.action, ActionKind::Delay);
        assert_eq!(s.seconds, Some(2.5));

        let explicit = step(json!({"action": "delay", "seconds": 1, "parameters": {"seconds": 9}}));
        assert_eq!(explicit.seconds, Some(1.0));
    }

    #[test]
    fn test_missing_name_and_action() {
        let s = step(json!({}));
        assert_eq!(s.name, UNNAMED_STEP);
        assert!(!s.action.is_supported());
    }

    #[test]
    fn test_arms_accept_wrapped_and_bare_lists() {
        let s = step(json!({
            "name": "Route",
            "action": "condition",
            "condition": "params.vip == True",
            "true_flow": {"steps": [{"name": "a", "action": "delay", "seconds": 0}]},
            "false_flow": [{"name": "b", "action": "delay"}, {"name": "c", "action": "delay"}]
        }));

        assert_eq!(s.action, ActionKind::Branch);
        assert_eq!(s.true_flow.len(), 1);
        assert_eq!(s.false_flow.len(), 2);
        assert_eq!(s.false_flow.iter().nth(1).unwrap().name, "c");
    }

    #[test]
    fn test_wrongly_typed_fields_mark_only_the_step() {
        let s = step(json!({"name": "Wait", "action": "delay", "seconds": "five"}));
        assert_eq!(s.action, ActionKind::Delay);
        assert_eq!(s.seconds, None);
        assert_eq!(
            s.malformed.as_deref(),
            Some("field 'seconds' must be a number, got a string")
        );

        let s = step(json!({"action": "python", "module": 7, "params": [1], "retry": {"max_attempts": "x"}}));
        let problems = s.malformed.unwrap();
        assert!(problems.contains("field 'module' must be a string, got a number"), "{}", problems);
        assert!(problems.contains("field 'params' must be a mapping, got a list"), "{}", problems);
        assert!(problems.contains("field 'retry' is invalid"), "{}", problems);
    }

    #[test]
    fn test_well_formed_step_is_not_marked() {
        let s = step(json!({"name": "Wait", "action": "delay", "seconds": null, "parameters": {"seconds": 3}}));
        assert_eq!(s.seconds, Some(3.0));
        assert!(s.malformed.is_none());
    }

    #[test]
    fn test_process_name_fallback() {
        let doc = ProcessDocument {
            name: Some("  ".into()),
            steps: Some(vec![]),
        };
        assert_eq!(doc.process_name(), UNNAMED_PROCESS);
    }
}
