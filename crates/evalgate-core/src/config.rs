//! C2: parses the rule/threshold document and resolves the effective
//! ruleset for a run, given PR labels and changed-file paths.

use crate::errors::ConfigError;
use crate::model::Ruleset;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Raw on-disk configuration document (§6: "top-level `default` block plus
/// optional `overrides` list").
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ConfigDocument {
    /// Default rule block, merged first.
    #[serde(default)]
    pub default: RuleBlock,
    /// Override entries, applied in document order when their `when` matches.
    #[serde(default)]
    pub overrides: Vec<OverrideEntry>,
}

/// One override entry: a condition plus the fields it overlays.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OverrideEntry {
    /// Condition under which this override fires.
    pub when: WhenClause,
    /// Fields to overlay onto the ruleset when `when` matches.
    pub rules: RuleBlock,
}

/// Match condition for an override: PR label membership or changed-path glob.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct WhenClause {
    /// Labels that trigger this override if any is present on the PR.
    #[serde(default)]
    pub labels: Vec<String>,
    /// Glob patterns; trigger this override if any changed file matches.
    #[serde(default)]
    pub paths: Vec<String>,
}

/// A sparse set of ruleset field overrides; `None` means "inherit".
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RuleBlock {
    /// See `Ruleset::s1_min_pass_rate`.
    pub s1_min_pass_rate: Option<f64>,
    /// See `Ruleset::overall_min_pass_rate`.
    pub overall_min_pass_rate: Option<f64>,
    /// See `Ruleset::max_worst_case_delta`.
    pub max_worst_case_delta: Option<f64>,
    /// See `Ruleset::latency_p95_max_ratio`.
    pub latency_p95_max_ratio: Option<f64>,
    /// See `Ruleset::token_delta_max_ratio`.
    pub token_delta_max_ratio: Option<f64>,
    /// See `Ruleset::fail_on_new_regression`.
    pub fail_on_new_regression: Option<bool>,
}

impl RuleBlock {
    fn overlay_onto(&self, base: &mut Ruleset) {
        if let Some(v) = self.s1_min_pass_rate {
            base.s1_min_pass_rate = v;
        }
        if let Some(v) = self.overall_min_pass_rate {
            base.overall_min_pass_rate = v;
        }
        if let Some(v) = self.max_worst_case_delta {
            base.max_worst_case_delta = v;
        }
        if let Some(v) = self.latency_p95_max_ratio {
            base.latency_p95_max_ratio = v;
        }
        if let Some(v) = self.token_delta_max_ratio {
            base.token_delta_max_ratio = v;
        }
        if let Some(v) = self.fail_on_new_regression {
            base.fail_on_new_regression = v;
        }
    }
}

/// Inputs used to decide which override entries fire.
#[derive(Debug, Clone, Default)]
pub struct SelectionContext {
    /// PR labels present on this run.
    pub labels: Vec<String>,
    /// Changed file paths for this run.
    pub changed_files: Vec<String>,
}

/// CLI-provided threshold overrides, applied last and always winning.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    /// `--s1-threshold`.
    pub s1_threshold: Option<f64>,
    /// `--overall-threshold`.
    pub overall_threshold: Option<f64>,
}

/// Loads a configuration document from `path` and parses it as YAML.
pub fn load_config(path: &Path) -> Result<ConfigDocument, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    serde_yaml::from_str(&raw).map_err(ConfigError::Parse)
}

/// Resolves the effective `Ruleset` for a run: `default`, then each matching
/// override in document order, then CLI overrides last.
pub fn resolve_ruleset(
    doc: &ConfigDocument,
    ctx: &SelectionContext,
    cli: &CliOverrides,
) -> Result<Ruleset, ConfigError> {
    let mut ruleset = Ruleset::default();
    doc.default.overlay_onto(&mut ruleset);

    for (idx, entry) in doc.overrides.iter().enumerate() {
        if override_matches(&entry.when, ctx, idx)? {
            entry.rules.overlay_onto(&mut ruleset);
        }
    }

    if let Some(v) = cli.s1_threshold {
        ruleset.s1_min_pass_rate = v;
    }
    if let Some(v) = cli.overall_threshold {
        ruleset.overall_min_pass_rate = v;
    }

    Ok(ruleset)
}

fn override_matches(
    when: &WhenClause,
    ctx: &SelectionContext,
    idx: usize,
) -> Result<bool, ConfigError> {
    if when.labels.iter().any(|l| ctx.labels.contains(l)) {
        return Ok(true);
    }

    if when.paths.is_empty() {
        return Ok(false);
    }

    let mut builder = globset::GlobSetBuilder::new();
    for pattern in &when.paths {
        let glob = globset::Glob::new(pattern).map_err(|source| ConfigError::InvalidGlob {
            label: format!("overrides[{idx}]"),
            glob: pattern.clone(),
            source,
        })?;
        builder.add(glob);
    }
    let set = builder
        .build()
        .map_err(|source| ConfigError::InvalidGlob {
            label: format!("overrides[{idx}]"),
            glob: when.paths.join(","),
            source,
        })?;

    Ok(ctx.changed_files.iter().any(|f| set.is_match(f)))
}
