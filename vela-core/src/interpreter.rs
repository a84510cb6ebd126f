//! Interpreter - Execute Effects through an AdapterSet
//!
//! The Interpreter executes the Effects of a Plan in order, collecting
//! the results. This is where side effects actually occur. Each Effect
//! runs to completion (including any embedded completion wait) before the
//! next one starts.

use crate::adapter::AdapterSet;
use crate::effect::Effect;
use crate::error::{LifecycleError, LifecycleResult};
use crate::plan::Plan;
use crate::resource::State;

/// Result of executing each Effect
#[derive(Debug)]
pub enum EffectOutcome {
    Read { state: State },
    Created { state: State },
    Updated { state: State },
    Deleted,
    /// Skipped (e.g., dry-run, or a delete with no recorded handle)
    Skipped { reason: String },
}

/// Result of executing the entire Plan
#[derive(Debug)]
pub struct ApplyResult {
    pub outcomes: Vec<LifecycleResult<EffectOutcome>>,
    pub success_count: usize,
    pub failure_count: usize,
}

impl ApplyResult {
    pub fn is_success(&self) -> bool {
        self.failure_count == 0
    }
}

/// Interpreter configuration
#[derive(Debug, Clone, Default)]
pub struct InterpreterConfig {
    /// If true, skip actual side effects
    pub dry_run: bool,
    /// Continue on error
    pub continue_on_error: bool,
}

/// Interpreter that executes Effects through an AdapterSet
pub struct Interpreter {
    adapters: AdapterSet,
    config: InterpreterConfig,
}

impl Interpreter {
    pub fn new(adapters: AdapterSet) -> Self {
        Self {
            adapters,
            config: InterpreterConfig::default(),
        }
    }

    pub fn with_config(mut self, config: InterpreterConfig) -> Self {
        self.config = config;
        self
    }

    pub fn adapters(&self) -> &AdapterSet {
        &self.adapters
    }

    /// Execute a Plan, interpreting all Effects and causing side effects
    pub async fn apply(&self, plan: &Plan) -> ApplyResult {
        let mut outcomes = Vec::new();
        let mut success_count = 0;
        let mut failure_count = 0;

        for effect in plan.effects() {
            let result = self.execute_effect(effect).await;

            match &result {
                Ok(_) => success_count += 1,
                Err(_) => {
                    failure_count += 1;
                    if !self.config.continue_on_error {
                        outcomes.push(result);
                        break;
                    }
                }
            }

            outcomes.push(result);
        }

        ApplyResult {
            outcomes,
            success_count,
            failure_count,
        }
    }

    async fn execute_effect(&self, effect: &Effect) -> LifecycleResult<EffectOutcome> {
        if self.config.dry_run {
            return Ok(EffectOutcome::Skipped {
                reason: "dry-run mode".to_string(),
            });
        }

        let id = effect.id();
        let adapter = self.adapters.get(&id.kind).ok_or_else(|| {
            LifecycleError::validation(vec![format!("unknown resource kind '{}'", id.kind)])
        })?;

        match effect {
            Effect::Read { id, handle } => {
                let state = adapter.read(id, handle).await?;
                Ok(EffectOutcome::Read { state })
            }
            Effect::Create(resource) => {
                let state = adapter.create(resource).await?;
                Ok(EffectOutcome::Created { state })
            }
            Effect::Update { id, from, to } => {
                let handle = from.handle.as_deref().ok_or_else(|| {
                    LifecycleError::validation(vec![format!(
                        "cannot update {}: no handle recorded",
                        id
                    )])
                })?;
                let state = adapter.update(id, handle, from, to).await?;
                Ok(EffectOutcome::Updated { state })
            }
            Effect::Delete { id, handle } => match handle {
                Some(handle) => {
                    adapter.delete(id, handle).await?;
                    Ok(EffectOutcome::Deleted)
                }
                // Never created remotely; nothing to delete
                None => Ok(EffectOutcome::Skipped {
                    reason: format!("{}: no handle recorded", id),
                }),
            },
        }
    }
}
