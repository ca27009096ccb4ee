use std::collections::HashSet;

use crate::config::{AnalysisDepth, Config};
use crate::error::{PipelensError, Result};
use crate::insights::{Category, MetricValue, PipelineType, Severity};

use super::catalog::{builtin_pattern_rules, builtin_threshold_rules};
use super::components;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    GreaterThan,
    GreaterOrEqual,
    LessThan,
    LessOrEqual,
    Equal,
}

impl Comparison {
    /// Whether smaller observations are the worse ones for this comparison.
    pub fn is_descending(self) -> bool {
        matches!(self, Self::LessThan | Self::LessOrEqual)
    }

    fn is_ordering(self) -> bool {
        !matches!(self, Self::Equal)
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Self::GreaterThan => ">",
            Self::GreaterOrEqual => ">=",
            Self::LessThan => "<",
            Self::LessOrEqual => "<=",
            Self::Equal => "==",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Threshold {
    Number(f64),
    Category(&'static str),
}

/// Display unit for evidence values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    /// 0..1 fraction rendered as a percentage
    Ratio,
    /// Already a percentage
    Percent,
    Seconds,
    Millis,
    PerSecond,
    Count,
    Score,
}

impl Unit {
    pub fn format(self, value: f64) -> String {
        match self {
            Self::Ratio => format!("{:.1}%", value * 100.0),
            Self::Percent => format!("{value:.1}%"),
            Self::Seconds => format!("{value:.0}s"),
            Self::Millis => format!("{value:.0}ms"),
            Self::PerSecond => format!("{value:.0} req/s"),
            Self::Count => format!("{value:.0}"),
            Self::Score => format!("{value:.2}"),
        }
    }
}

/// Binds a rule threshold to one of the configured alert thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdKey {
    FailureRate,
    ResourceUsage,
}

/// A single-snapshot rule: `metric * scale <comparison> threshold`.
#[derive(Debug, Clone)]
pub struct ThresholdRule {
    pub id: &'static str,
    pub pipeline: PipelineType,
    pub metric: &'static str,
    pub comparison: Comparison,
    pub threshold: Threshold,
    /// Multiplier applied to the raw reading before comparison and banding.
    pub scale: f64,
    pub category: Category,
    pub weight: Severity,
    pub confidence: f64,
    pub component: &'static str,
    pub title: &'static str,
    /// `{value}` and `{threshold}` are substituted with formatted readings.
    pub description: &'static str,
    pub impact: &'static str,
    pub hint: &'static str,
    /// Extremity boundaries in scaled units, ordered from least to most severe.
    pub bands: Option<[f64; 3]>,
    pub unit: Unit,
    /// Extra metrics copied into the evidence when the rule fires.
    pub context: &'static [&'static str],
    pub config_key: Option<ThresholdKey>,
}

impl Default for ThresholdRule {
    fn default() -> Self {
        Self {
            id: "",
            pipeline: PipelineType::Devops,
            metric: "",
            comparison: Comparison::GreaterThan,
            threshold: Threshold::Number(0.0),
            scale: 1.0,
            category: Category::Reliability,
            weight: Severity::Medium,
            confidence: 0.0,
            component: "",
            title: "",
            description: "",
            impact: "",
            hint: "",
            bands: None,
            unit: Unit::Count,
            context: &[],
            config_key: None,
        }
    }
}

/// Outcome of evaluating a threshold rule against one reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Firing {
    /// Numeric reading past the threshold, in scaled units.
    Numeric(f64),
    Categorical,
}

impl ThresholdRule {
    /// Returns `Some` when `value` satisfies the rule.
    ///
    /// Readings whose kind does not match the threshold never fire.
    pub fn evaluate(&self, value: &MetricValue) -> Option<Firing> {
        match (&self.threshold, value) {
            (Threshold::Number(limit), MetricValue::Number(raw)) => {
                let observed = raw * self.scale;
                let fires = match self.comparison {
                    Comparison::GreaterThan => observed > *limit,
                    Comparison::GreaterOrEqual => observed >= *limit,
                    Comparison::LessThan => observed < *limit,
                    Comparison::LessOrEqual => observed <= *limit,
                    Comparison::Equal => (observed - limit).abs() < f64::EPSILON,
                };
                (fires && observed.is_finite()).then_some(Firing::Numeric(observed))
            }
            (Threshold::Category(expected), MetricValue::Category(observed)) => {
                (observed == expected).then_some(Firing::Categorical)
            }
            _ => None,
        }
    }

    /// Extremity tier of a firing reading, before the weight cap.
    pub fn extremity(&self, firing: Firing) -> Severity {
        match firing {
            Firing::Numeric(observed) => {
                band_tier(self.bands, self.comparison.is_descending(), observed)
            }
            Firing::Categorical => Severity::Critical,
        }
    }

    pub fn threshold_display(&self) -> String {
        match &self.threshold {
            Threshold::Number(limit) => self.unit.format(*limit / self.scale),
            Threshold::Category(expected) => (*expected).to_string(),
        }
    }
}

/// Counts how many band boundaries `measure` reaches.
///
/// Rules without bands are always at their weight, represented as the top tier.
pub fn band_tier(bands: Option<[f64; 3]>, descending: bool, measure: f64) -> Severity {
    let Some(bands) = bands else {
        return Severity::Critical;
    };
    let reached = bands
        .iter()
        .filter(|&&boundary| {
            if descending {
                measure <= boundary
            } else {
                measure >= boundary
            }
        })
        .count();
    Severity::from_tier(reached)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternKind {
    /// Pass/fail transitions of categorical `<prefix><test id>` metrics.
    Flakiness { prefix: &'static str },
    /// Current value against the mean of the preceding window.
    Regression { metric: &'static str },
    /// Strictly rising series across the window.
    RisingTrend { metric: &'static str },
    /// Mean of the recent half against the older half.
    Degradation { metric: &'static str },
}

/// A rule evaluated over the history window rather than a single snapshot.
#[derive(Debug, Clone)]
pub struct PatternRule {
    pub id: &'static str,
    pub pipeline: PipelineType,
    pub kind: PatternKind,
    pub category: Category,
    pub weight: Severity,
    pub confidence: f64,
    pub component: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub impact: &'static str,
    pub hint: &'static str,
    pub bands: Option<[f64; 3]>,
    pub unit: Unit,
    pub min_depth: AnalysisDepth,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PatternParams {
    pub flaky_window: usize,
    pub flaky_transitions: usize,
    pub regression_window: usize,
    pub regression_ratio: f64,
    pub trend_window: usize,
    pub trend_min_rise: f64,
    pub degradation_window: usize,
    pub degradation_min_drop: f64,
}

impl Default for PatternParams {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl PatternParams {
    fn from_config(config: &Config) -> Self {
        let patterns = &config.patterns;
        Self {
            flaky_window: patterns.flaky_window,
            flaky_transitions: patterns.flaky_transitions,
            regression_window: patterns.regression_window,
            regression_ratio: config.monitoring.alert_threshold.duration_increase,
            trend_window: patterns.trend_window,
            trend_min_rise: patterns.trend_min_rise,
            degradation_window: patterns.degradation_window,
            degradation_min_drop: patterns.degradation_min_drop,
        }
    }
}

/// Data-driven table of every detection rule.
#[derive(Debug, Clone)]
pub struct RuleCatalog {
    pub threshold_rules: Vec<ThresholdRule>,
    pub pattern_rules: Vec<PatternRule>,
    pub params: PatternParams,
}

impl RuleCatalog {
    /// Builds the catalog with built-in thresholds and default pattern parameters.
    ///
    /// # Errors
    ///
    /// Returns `PipelensError::Catalog` if the built-in table is inconsistent.
    pub fn builtin() -> Result<Self> {
        let catalog = Self {
            threshold_rules: builtin_threshold_rules(),
            pattern_rules: builtin_pattern_rules(),
            params: PatternParams::default(),
        };
        catalog.validate()?;
        Ok(catalog)
    }

    /// Builds the catalog and applies configured thresholds and overrides.
    ///
    /// # Errors
    ///
    /// Returns `PipelensError::Catalog` for overrides naming unknown or
    /// categorical rules, or when the resulting table fails validation.
    pub fn from_config(config: &Config) -> Result<Self> {
        let alert = &config.monitoring.alert_threshold;
        let mut threshold_rules = builtin_threshold_rules();

        for rule in &mut threshold_rules {
            match rule.config_key {
                Some(ThresholdKey::FailureRate) => {
                    rule.threshold = Threshold::Number(alert.failure_rate);
                }
                Some(ThresholdKey::ResourceUsage) => {
                    rule.threshold = Threshold::Number(alert.resource_usage);
                }
                None => {}
            }
        }

        for (rule_id, value) in &config.rule_overrides {
            let rule = threshold_rules
                .iter_mut()
                .find(|r| r.id == rule_id)
                .ok_or_else(|| {
                    PipelensError::Catalog(format!("override for unknown rule '{rule_id}'"))
                })?;
            if matches!(rule.threshold, Threshold::Category(_)) {
                return Err(PipelensError::Catalog(format!(
                    "rule '{rule_id}' compares a categorical value and cannot take a numeric override"
                )));
            }
            rule.threshold = Threshold::Number(*value);
        }

        let catalog = Self {
            threshold_rules,
            pattern_rules: builtin_pattern_rules(),
            params: PatternParams::from_config(config),
        };
        catalog.validate()?;
        Ok(catalog)
    }

    #[cfg(test)]
    pub fn threshold_rule(&self, id: &str) -> Option<&ThresholdRule> {
        self.threshold_rules.iter().find(|r| r.id == id)
    }

    /// Checks the catalog for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns `PipelensError::Catalog` describing the first broken rule.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();

        for rule in &self.threshold_rules {
            check_common(&mut seen, rule.id, rule.confidence, rule.component)?;

            if rule.metric.is_empty() {
                return Err(catalog_error(rule.id, "has no metric"));
            }
            if !(rule.scale.is_finite() && rule.scale > 0.0) {
                return Err(catalog_error(rule.id, "has a non-positive scale"));
            }
            match &rule.threshold {
                Threshold::Number(limit) if !limit.is_finite() => {
                    return Err(catalog_error(rule.id, "has a non-finite threshold"));
                }
                Threshold::Category(_) if rule.comparison.is_ordering() => {
                    return Err(catalog_error(
                        rule.id,
                        "orders a categorical threshold",
                    ));
                }
                Threshold::Category(_) if rule.bands.is_some() => {
                    return Err(catalog_error(rule.id, "bands a categorical threshold"));
                }
                _ => {}
            }
            check_bands(rule.id, rule.bands, rule.comparison.is_descending())?;
        }

        for rule in &self.pattern_rules {
            check_common(&mut seen, rule.id, rule.confidence, rule.component)?;
            check_bands(rule.id, rule.bands, false)?;
        }

        Ok(())
    }
}

fn catalog_error(rule_id: &str, problem: &str) -> PipelensError {
    PipelensError::Catalog(format!("rule '{rule_id}' {problem}"))
}

fn check_common<'a>(
    seen: &mut HashSet<&'a str>,
    id: &'a str,
    confidence: f64,
    component: &str,
) -> Result<()> {
    if id.is_empty() {
        return Err(PipelensError::Catalog("rule with empty id".to_string()));
    }
    if !seen.insert(id) {
        return Err(catalog_error(id, "is defined twice"));
    }
    if !(0.0..=1.0).contains(&confidence) {
        return Err(catalog_error(id, "has a confidence outside [0, 1]"));
    }
    if components::lookup(component).is_none() {
        return Err(catalog_error(
            id,
            &format!("references unknown component '{component}'"),
        ));
    }
    Ok(())
}

fn check_bands(id: &str, bands: Option<[f64; 3]>, descending: bool) -> Result<()> {
    let Some(bands) = bands else {
        return Ok(());
    };
    let monotonic = bands.windows(2).all(|pair| {
        if descending {
            pair[0] > pair[1]
        } else {
            pair[0] < pair[1]
        }
    });
    if !monotonic || bands.iter().any(|b| !b.is_finite()) {
        return Err(catalog_error(id, "has non-monotonic severity bands"));
    }
    Ok(())
}
