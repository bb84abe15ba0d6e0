//! Workflow engine boundary: activity trait and registry.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::ActivityError;

/// Invocation details supplied by the workflow engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityContext {
    /// Workflow instance the activity runs in.
    pub workflow_instance_id: String,
    /// Delivery attempt, starting at 1.
    #[serde(default = "first_attempt")]
    pub attempt: u32,
}

fn first_attempt() -> u32 {
    1
}

impl ActivityContext {
    /// Creates a context for the first attempt within a workflow instance.
    pub fn new(workflow_instance_id: impl Into<String>) -> Self {
        Self {
            workflow_instance_id: workflow_instance_id.into(),
            attempt: first_attempt(),
        }
    }

    /// Sets the delivery attempt.
    pub fn with_attempt(mut self, attempt: u32) -> Self {
        self.attempt = attempt;
        self
    }
}

/// A unit of work the workflow engine can invoke by name.
#[async_trait]
pub trait Activity: Send + Sync + 'static {
    /// Payload supplied by the workflow.
    type Input: DeserializeOwned + Send;
    /// Result handed back to the workflow.
    type Output: Serialize + Send;

    /// Name the workflow refers to the activity by.
    const NAME: &'static str;

    /// Runs the activity once.
    async fn run(&self, ctx: &ActivityContext, input: Self::Input)
    -> Result<Self::Output, ActivityError>;
}

#[async_trait]
trait ErasedActivity: Send + Sync {
    async fn invoke(
        &self,
        ctx: &ActivityContext,
        input: serde_json::Value,
    ) -> Result<serde_json::Value, ActivityError>;
}

#[async_trait]
impl<A: Activity> ErasedActivity for A {
    async fn invoke(
        &self,
        ctx: &ActivityContext,
        input: serde_json::Value,
    ) -> Result<serde_json::Value, ActivityError> {
        let input: A::Input = serde_json::from_value(input)
            .map_err(|e| ActivityError::terminal(A::NAME, format!("invalid input: {e}")))?;

        let output = self.run(ctx, input).await?;

        serde_json::to_value(output)
            .map_err(|e| ActivityError::terminal(A::NAME, format!("unserializable output: {e}")))
    }
}

/// Activities known to this worker, keyed by name.
#[derive(Clone, Default)]
pub struct ActivityRegistry {
    activities: HashMap<&'static str, Arc<dyn ErasedActivity>>,
}

impl ActivityRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `activity` under its name, replacing any previous one.
    pub fn register<A: Activity>(&mut self, activity: A) -> &mut Self {
        if self.activities.insert(A::NAME, Arc::new(activity)).is_some() {
            tracing::warn!(activity = A::NAME, "activity registered twice, keeping the last");
        }
        self
    }

    /// Returns true if an activity is registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.activities.contains_key(name)
    }

    /// Returns the registered names in alphabetical order.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.activities.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Decodes `input`, runs the activity registered as `name` and encodes
    /// its output.
    #[tracing::instrument(
        skip(self, ctx, input),
        fields(workflow_instance_id = %ctx.workflow_instance_id, attempt = ctx.attempt)
    )]
    pub async fn invoke(
        &self,
        name: &str,
        ctx: &ActivityContext,
        input: serde_json::Value,
    ) -> Result<serde_json::Value, ActivityError> {
        let activity = self
            .activities
            .get(name)
            .ok_or_else(|| ActivityError::NotRegistered(name.to_string()))?;

        let result = activity.invoke(ctx, input).await;
        match &result {
            Ok(_) => tracing::info!("activity completed"),
            Err(e) => tracing::warn!(error = %e, retryable = e.is_retryable(), "activity failed"),
        }
        result
    }
}
