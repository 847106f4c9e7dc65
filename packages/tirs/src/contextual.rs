//! Context-aware risk thresholds.
//!
//! Base thresholds are multiplied by business-context factors: time of day,
//! season, user role, department, and a sensitive-operation flag. Lower
//! multipliers tighten the thresholds (more sensitive); higher loosen them.

use std::collections::HashMap;

use chrono::{Datelike, Local, Timelike};
use serde::{Deserialize, Serialize};

/// Business hours classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BusinessHours {
    #[default]
    Business,
    AfterHours,
    Weekend,
    Holiday,
}

/// Seasonal risk classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RiskSeason {
    #[default]
    Normal,
    QuarterEnd,
    YearEnd,
    AuditPeriod,
    PeakSeason,
}

/// Current business context for threshold adjustment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusinessContext {
    /// Time-of-day classification
    pub time_of_day: BusinessHours,
    /// Seasonal classification
    pub season: RiskSeason,
    /// Department the acting identity belongs to
    pub department: String,
    /// Role of the acting identity
    pub user_role: String,
    /// Sensitive operation flag (tightens thresholds by 0.85)
    pub sensitive_operation: bool,
    /// Extra named multipliers applied verbatim
    pub custom_multipliers: HashMap<String, f64>,
}

impl Default for BusinessContext {
    fn default() -> Self {
        Self {
            time_of_day: BusinessHours::Business,
            season: RiskSeason::Normal,
            department: "general".to_string(),
            user_role: "standard".to_string(),
            sensitive_operation: false,
            custom_multipliers: HashMap::new(),
        }
    }
}

impl BusinessContext {
    /// Classify the current local time into a context.
    ///
    /// Weekdays 09:00-16:59 are business hours; Saturday/Sunday is weekend.
    /// Day >= 20 of a quarter-final month is quarter-end (including late
    /// December); Dec 15-19 is year-end.
    pub fn from_local_time(department: impl Into<String>, role: impl Into<String>) -> Self {
        let now = Local::now();

        let weekday = now.weekday().num_days_from_monday();
        let time_of_day = if weekday >= 5 {
            BusinessHours::Weekend
        } else if (9..17).contains(&now.hour()) {
            BusinessHours::Business
        } else {
            BusinessHours::AfterHours
        };

        // Quarter-end takes precedence over year-end for Dec 20 onward.
        let (month, day) = (now.month(), now.day());
        let season = if matches!(month, 3 | 6 | 9 | 12) && day >= 20 {
            RiskSeason::QuarterEnd
        } else if month == 12 && day >= 15 {
            RiskSeason::YearEnd
        } else {
            RiskSeason::Normal
        };

        Self {
            time_of_day,
            season,
            department: department.into(),
            user_role: role.into(),
            ..Self::default()
        }
    }

    /// Mark the context as covering a sensitive operation.
    pub fn sensitive(mut self) -> Self {
        self.sensitive_operation = true;
        self
    }
}

/// Risk threshold boundaries.
///
/// The level ladder is Nominal < Elevated < Warning < Critical < Terminal;
/// each field is the lower (inclusive-on-crossing) boundary of the matching
/// level. All four scale together under context adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdConfig {
    pub elevated: f64,
    pub warning: f64,
    pub critical: f64,
    pub terminal: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            elevated: 0.3,
            warning: 0.5,
            critical: 0.7,
            terminal: 0.85,
        }
    }
}

/// One factor of a threshold adjustment, for reporting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdFactor {
    pub factor: String,
    pub value: String,
    pub multiplier: f64,
}

/// A custom threshold rule evaluated against the context.
pub struct CustomRule {
    pub name: String,
    pub condition: Box<dyn Fn(&BusinessContext) -> bool + Send + Sync>,
    pub multiplier: f64,
    pub priority: i32,
}

/// Adjusts risk thresholds based on business context.
pub struct ContextualThresholds {
    base: ThresholdConfig,
    custom_rules: Vec<CustomRule>,
}

impl Default for ContextualThresholds {
    fn default() -> Self {
        Self::new(ThresholdConfig::default())
    }
}

impl ContextualThresholds {
    pub fn new(base: ThresholdConfig) -> Self {
        Self {
            base,
            custom_rules: Vec::new(),
        }
    }

    /// Base thresholds before any adjustment.
    pub fn base(&self) -> ThresholdConfig {
        self.base
    }

    /// Register a custom adjustment rule; rules run in priority order.
    pub fn add_custom_rule(
        &mut self,
        name: impl Into<String>,
        condition: impl Fn(&BusinessContext) -> bool + Send + Sync + 'static,
        multiplier: f64,
        priority: i32,
    ) {
        self.custom_rules.push(CustomRule {
            name: name.into(),
            condition: Box::new(condition),
            multiplier,
            priority,
        });
        self.custom_rules.sort_by(|a, b| b.priority.cmp(&a.priority));
    }

    fn time_multiplier(time: BusinessHours) -> f64 {
        match time {
            BusinessHours::Business => 1.0,
            BusinessHours::AfterHours => 0.85,
            BusinessHours::Weekend => 0.75,
            BusinessHours::Holiday => 0.70,
        }
    }

    fn season_multiplier(season: RiskSeason) -> f64 {
        match season {
            RiskSeason::Normal => 1.0,
            RiskSeason::QuarterEnd => 0.90,
            RiskSeason::YearEnd => 0.85,
            RiskSeason::AuditPeriod => 0.80,
            RiskSeason::PeakSeason => 0.95,
        }
    }

    fn role_multiplier(role: &str) -> f64 {
        match role {
            "admin" => 0.90,
            "manager" => 0.95,
            "standard" => 1.0,
            "contractor" => 0.85,
            "external" => 0.75,
            _ => 1.0,
        }
    }

    fn department_multiplier(department: &str) -> f64 {
        match department {
            "finance" => 0.90,
            "legal" => 0.85,
            "hr" => 0.90,
            "security" => 0.80,
            "it" => 0.95,
            "general" => 1.0,
            _ => 1.0,
        }
    }

    /// Composite multiplier for a context (product of all factors).
    pub fn context_multiplier(&self, context: &BusinessContext) -> f64 {
        let mut multiplier = Self::time_multiplier(context.time_of_day)
            * Self::season_multiplier(context.season)
            * Self::role_multiplier(&context.user_role)
            * Self::department_multiplier(&context.department);

        if context.sensitive_operation {
            multiplier *= 0.85;
        }

        for value in context.custom_multipliers.values() {
            multiplier *= value;
        }

        for rule in &self.custom_rules {
            if (rule.condition)(context) {
                multiplier *= rule.multiplier;
            }
        }

        multiplier
    }

    /// Thresholds adjusted for the given context.
    pub fn adjusted(&self, context: &BusinessContext) -> ThresholdConfig {
        let multiplier = self.context_multiplier(context);
        ThresholdConfig {
            elevated: self.base.elevated * multiplier,
            warning: self.base.warning * multiplier,
            critical: self.base.critical * multiplier,
            terminal: self.base.terminal * multiplier,
        }
    }

    /// Named factors that deviate from 1.0, for explanation output.
    pub fn explain(&self, context: &BusinessContext) -> Vec<ThresholdFactor> {
        let mut factors = Vec::new();

        let time = Self::time_multiplier(context.time_of_day);
        if time != 1.0 {
            factors.push(ThresholdFactor {
                factor: "time_of_day".into(),
                value: format!("{:?}", context.time_of_day).to_lowercase(),
                multiplier: time,
            });
        }

        let season = Self::season_multiplier(context.season);
        if season != 1.0 {
            factors.push(ThresholdFactor {
                factor: "season".into(),
                value: format!("{:?}", context.season).to_lowercase(),
                multiplier: season,
            });
        }

        let role = Self::role_multiplier(&context.user_role);
        if role != 1.0 {
            factors.push(ThresholdFactor {
                factor: "user_role".into(),
                value: context.user_role.clone(),
                multiplier: role,
            });
        }

        let department = Self::department_multiplier(&context.department);
        if department != 1.0 {
            factors.push(ThresholdFactor {
                factor: "department".into(),
                value: context.department.clone(),
                multiplier: department,
            });
        }

        if context.sensitive_operation {
            factors.push(ThresholdFactor {
                factor: "sensitive_operation".into(),
                value: "true".into(),
                multiplier: 0.85,
            });
        }

        factors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_context_leaves_base_unchanged() {
        let thresholds = ContextualThresholds::default();
        let adjusted = thresholds.adjusted(&BusinessContext::default());
        assert_eq!(adjusted, ThresholdConfig::default());
    }

    #[test]
    fn test_weekend_contractor_tightens() {
        let thresholds = ContextualThresholds::default();
        let context = BusinessContext {
            time_of_day: BusinessHours::Weekend,
            user_role: "contractor".into(),
            ..BusinessContext::default()
        };
        let adjusted = thresholds.adjusted(&context);
        // 0.75 * 0.85 = 0.6375
        assert!((adjusted.terminal - 0.85 * 0.6375).abs() < 1e-9);
        assert!(adjusted.warning < 0.5);
    }

    #[test]
    fn test_sensitive_operation_flag() {
        let thresholds = ContextualThresholds::default();
        let context = BusinessContext::default().sensitive();
        assert!((thresholds.context_multiplier(&context) - 0.85).abs() < 1e-9);
    }

    #[test]
    fn test_custom_rule_applies_when_condition_holds() {
        let mut thresholds = ContextualThresholds::default();
        thresholds.add_custom_rule(
            "finance-lockdown",
            |ctx: &BusinessContext| ctx.department == "finance",
            0.5,
            10,
        );

        let finance = BusinessContext {
            department: "finance".into(),
            ..BusinessContext::default()
        };
        // 0.9 department * 0.5 rule
        assert!((thresholds.context_multiplier(&finance) - 0.45).abs() < 1e-9);

        let general = BusinessContext::default();
        assert!((thresholds.context_multiplier(&general) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_explain_reports_only_deviating_factors() {
        let thresholds = ContextualThresholds::default();
        let context = BusinessContext {
            time_of_day: BusinessHours::AfterHours,
            department: "legal".into(),
            ..BusinessContext::default()
        };
        let factors = thresholds.explain(&context);
        let names: Vec<_> = factors.iter().map(|f| f.factor.as_str()).collect();
        assert_eq!(names, vec!["time_of_day", "department"]);
    }
}
