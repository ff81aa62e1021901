//! mockall doubles for the interpreter's boundary capabilities.

use async_trait::async_trait;
use mockall::mock;
use serde_json::{Map, Value};
use stepwise_core::{AuditStore, CoreError, JobOutcome, JobTrigger, LogEntry, PredicateEvaluator, Transform};

mock! {
    /// Mock job trigger
    pub Trigger {}

    #[async_trait]
    impl JobTrigger for Trigger {
        async fn trigger(&self, job_name: &str, parameters: &Map<String, Value>) -> Result<JobOutcome, CoreError>;
    }
}

mock! {
    /// Mock transform
    pub Transformer {}

    #[async_trait]
    impl Transform for Transformer {
        async fn transform(&self, module: &str, parameters: &Map<String, Value>) -> Result<Value, CoreError>;
    }
}

mock! {
    /// Mock predicate evaluator
    pub Evaluator {}

    #[async_trait]
    impl PredicateEvaluator for Evaluator {
        async fn evaluate(&self, expression: &str, scope: &Value) -> Result<bool, CoreError>;
    }
}

mock! {
    /// Mock audit store
    pub Audit {}

    #[async_trait]
    impl AuditStore for Audit {
        async fn insert(&self, entry: &LogEntry) -> Result<(), CoreError>;
    }
}
