//! Step plan loading with schema validation.
//!
//! A plan is a JSON description of one scenario: its annotated steps, the
//! step definitions they resolve against (regex patterns with scripted
//! outcomes) and the hooks wrapped around every step.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use anyhow::{Context, Result, anyhow};
use jsonschema::{Validator, validator_for};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::scenario::RawStep;

const PLAN_SCHEMA: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/../schemas/step_plan/v1.schema.json"
));

static PLAN_VALIDATOR: LazyLock<Result<Validator, String>> = LazyLock::new(|| {
    let schema: Value = serde_json::from_str(PLAN_SCHEMA).map_err(|err| err.to_string())?;
    validator_for(&schema).map_err(|err| err.to_string())
});

/// Scripted result of a definition or hook.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    #[default]
    Passed,
    SoftFail,
    HardFail,
    Abort,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Definition {
    /// Regex matched against the whole step text.
    pub pattern: String,
    pub outcome: Outcome,
    pub message: Option<String>,
    /// Line logged through the step context when the definition runs.
    pub log: Option<String>,
    /// Outcome overrides keyed by the branch the step runs under.
    pub branch_outcomes: BTreeMap<String, Outcome>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HookSpec {
    pub name: String,
    pub outcome: Outcome,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanHooks {
    pub before: Vec<HookSpec>,
    pub after: Vec<HookSpec>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StepPlan {
    pub scenario: String,
    pub file: Option<String>,
    pub definitions: Vec<Definition>,
    pub hooks: PlanHooks,
    pub steps: Vec<RawStep>,
}

/// Load and validate a plan from disk.
pub fn load_plan(path: &Path) -> Result<StepPlan> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("read plan {}", path.display()))?;
    parse_plan(&contents).with_context(|| format!("load plan {}", path.display()))
}

/// Parse and validate plan JSON.
pub fn parse_plan(contents: &str) -> Result<StepPlan> {
    let value: Value = serde_json::from_str(contents).context("parse plan json")?;
    validate_schema(&value)?;
    let plan: StepPlan = serde_json::from_value(value).context("deserialize plan")?;
    Ok(plan)
}

fn validate_schema(plan: &Value) -> Result<()> {
    let compiled = PLAN_VALIDATOR
        .as_ref()
        .map_err(|err| anyhow!("invalid plan schema: {err}"))?;
    if !compiled.is_valid(plan) {
        let messages = compiled
            .iter_errors(plan)
            .map(|err| err.to_string())
            .collect::<Vec<_>>();
        return Err(anyhow!("plan schema validation failed: {}", messages.join("; ")));
    }
    Ok(())
}
