//! Name-addressed transform modules.

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use stepwise_core::{CoreError, Transform};
use tracing::debug;

/// A transform module: takes the step parameters, returns a value
pub trait TransformModule: Send + Sync {
    /// Run the transform
    fn run(&self, parameters: &Map<String, Value>) -> Result<Value, CoreError>;
}

impl<F> TransformModule for F
where
    F: Fn(&Map<String, Value>) -> Result<Value, CoreError> + Send + Sync,
{
    fn run(&self, parameters: &Map<String, Value>) -> Result<Value, CoreError> {
        self(parameters)
    }
}

/// Normalises a customer record: trimmed, title-cased name and a digits-only phone.
///
/// Reads `customer.name` and `customer.phone`; missing fields become empty strings.
#[derive(Debug, Default, Clone, Copy)]
pub struct PreprocessCustomer;

impl PreprocessCustomer {
    /// Registry name of this module
    pub const NAME: &'static str = "preprocess_customer";
}

fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut previous_cased = false;
    for c in text.chars() {
        if c.is_alphabetic() {
            if previous_cased {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            previous_cased = true;
        } else {
            out.push(c);
            previous_cased = false;
        }
    }
    out
}

impl TransformModule for PreprocessCustomer {
    fn run(&self, parameters: &Map<String, Value>) -> Result<Value, CoreError> {
        let customer = parameters.get("customer").and_then(Value::as_object);
        let field = |key: &str| {
            customer
                .and_then(|c| c.get(key))
                .and_then(Value::as_str)
                .unwrap_or_default()
        };

        let name = title_case(field("name").trim());
        let phone: String = field("phone").chars().filter(|c| c.is_ascii_digit()).collect();

        Ok(json!({ "name": name, "phone": phone }))
    }
}

/// Static registry of transform modules, frozen once built
#[derive(Clone, Default)]
pub struct TransformRegistry {
    modules: HashMap<String, Arc<dyn TransformModule>>,
}

impl TransformRegistry {
    /// Start an empty registry
    pub fn builder() -> TransformRegistryBuilder {
        TransformRegistryBuilder::default()
    }

    /// Registry holding only the built-in modules
    pub fn with_builtins() -> Self {
        Self::builder().with_builtins().build()
    }

    /// Whether `name` is registered
    pub fn contains(&self, name: &str) -> bool {
        self.modules.contains_key(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.modules.keys().cloned().collect();
        names.sort();
        names
    }
}

impl fmt::Debug for TransformRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformRegistry")
            .field("modules", &self.names())
            .finish()
    }
}

#[async_trait]
impl Transform for TransformRegistry {
    async fn transform(&self, module: &str, parameters: &Map<String, Value>) -> Result<Value, CoreError> {
        let Some(transform) = self.modules.get(module) else {
            return Err(CoreError::ComponentNotFoundError(format!(
                "transform module '{}' is not registered",
                module
            )));
        };
        debug!(module, "running transform module");
        transform.run(parameters)
    }
}

/// Collects transform modules at start-up
#[derive(Default)]
pub struct TransformRegistryBuilder {
    modules: HashMap<String, Arc<dyn TransformModule>>,
}

impl TransformRegistryBuilder {
    /// Register a module under `name`, replacing any earlier one
    pub fn register(mut self, name: impl Into<String>, module: Arc<dyn TransformModule>) -> Self {
        self.modules.insert(name.into(), module);
        self
    }

    /// Register a plain function or closure
    pub fn register_fn<F>(self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Map<String, Value>) -> Result<Value, CoreError> + Send + Sync + 'static,
    {
        self.register(name, Arc::new(f))
    }

    /// Add the built-in modules
    pub fn with_builtins(self) -> Self {
        self.register(PreprocessCustomer::NAME, Arc::new(PreprocessCustomer))
    }

    /// Freeze the registry
    pub fn build(self) -> TransformRegistry {
        TransformRegistry {
            modules: self.modules,
        }
    }
}
