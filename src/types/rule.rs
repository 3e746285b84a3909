//! Pattern rules
//!
//! `RuleDefinition` is the loosely-typed wire form consumed from a rule store.
//! `Rule` is the validated form; the only way from one to the other is
//! `Rule::try_from`, so every rule that reaches the matcher has passed
//! validation exactly once.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::RuleError;
use crate::types::{Color, ColorGroup, RuleReason, StepCount};
use crate::{
    DEFAULT_COOLDOWN_ROUNDS, DEFAULT_MISS_THRESHOLD, DEFAULT_TRIGGER_THRESHOLD, DYNAMIC_X_MAX,
    DYNAMIC_X_MIN,
};

/// Identity assigned by the rule store
pub type RuleId = u32;

/// How a step's consumed count is compared with its target count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operator {
    Exact,
    Minimum,
    Maximum,
}

impl Operator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Exact => "exact",
            Operator::Minimum => "minimum",
            Operator::Maximum => "maximum",
        }
    }

    pub fn from_token(token: &str) -> Option<Operator> {
        match token {
            "exact" => Some(Operator::Exact),
            "minimum" => Some(Operator::Minimum),
            "maximum" => Some(Operator::Maximum),
            _ => None,
        }
    }

    /// Compare what a step consumed against its count
    pub fn check(&self, consumed: i64, count: i64) -> bool {
        match self {
            Operator::Exact => consumed == count,
            Operator::Minimum => consumed >= count,
            Operator::Maximum => consumed <= count,
        }
    }
}

/// Atomic matching unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub colors: Vec<ColorGroup>,
    pub operator: Operator,
    pub count: StepCount,
}

impl Step {
    pub fn new(colors: &[ColorGroup], operator: Operator, count: StepCount) -> Self {
        Self {
            colors: colors.to_vec(),
            operator,
            count,
        }
    }

    /// Shorthand for a step with a literal count
    pub fn fixed(colors: &[ColorGroup], operator: Operator, count: i64) -> Self {
        Self::new(colors, operator, StepCount::Fixed(count))
    }

    /// Does the outcome belong to any member of this step's color set?
    pub fn admits(&self, color: Color, treat_yellow_as_green: bool) -> bool {
        self.colors
            .iter()
            .any(|group| group.admits(color, treat_yellow_as_green))
    }

    fn bind(&self, x: i64) -> Step {
        Step {
            colors: self.colors.clone(),
            operator: self.operator,
            count: self.count.bind(x),
        }
    }
}

/// Ordered steps, oldest outcome first
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepList {
    pub steps: Vec<Step>,
}

impl StepList {
    pub fn new(steps: Vec<Step>) -> Self {
        Self { steps }
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Step> {
        self.steps.iter()
    }

    /// Bind X into every count
    pub fn bind(&self, x: i64) -> StepList {
        StepList {
            steps: self.steps.iter().map(|s| s.bind(x)).collect(),
        }
    }

    /// Any count still waiting for X?
    pub fn has_symbolic_counts(&self) -> bool {
        self.steps.iter().any(|s| s.count.is_symbolic())
    }
}

/// Static rules match directly; dynamic rules are templates over X
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleKind {
    Static,
    Dynamic { values: Vec<i64> },
}

impl RuleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleKind::Static => "static",
            RuleKind::Dynamic { .. } => "dynamic",
        }
    }
}

/// Per-rule alert thresholds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    pub trigger_streak_threshold: u32,
    pub miss_threshold: u32,
    pub cooldown_rounds: u32,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            trigger_streak_threshold: DEFAULT_TRIGGER_THRESHOLD,
            miss_threshold: DEFAULT_MISS_THRESHOLD,
            cooldown_rounds: DEFAULT_COOLDOWN_ROUNDS,
        }
    }
}

/// A validated pattern rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RuleDefinition", into = "RuleDefinition")]
pub struct Rule {
    pub name: String,
    pub description: Option<String>,
    pub kind: RuleKind,
    pub treat_yellow_as_green: bool,
    pub trigger: StepList,
    pub miss: StepList,
    pub active: bool,
    pub alerts: AlertConfig,
    /// Bound X, present only on expanded sub-rules
    pub dynamic_x: Option<i64>,
}

impl Rule {
    /// Concrete rule with default flags and alerts
    pub fn new_static(name: impl Into<String>, trigger: StepList, miss: StepList) -> Self {
        Self {
            name: name.into(),
            description: None,
            kind: RuleKind::Static,
            treat_yellow_as_green: true,
            trigger,
            miss,
            active: true,
            alerts: AlertConfig::default(),
            dynamic_x: None,
        }
    }

    /// Dynamic template with default flags and alerts
    pub fn new_dynamic(
        name: impl Into<String>,
        values: Vec<i64>,
        trigger: StepList,
        miss: StepList,
    ) -> Self {
        Self {
            kind: RuleKind::Dynamic { values },
            ..Self::new_static(name, trigger, miss)
        }
    }

    pub fn is_dynamic(&self) -> bool {
        matches!(self.kind, RuleKind::Dynamic { .. })
    }

    /// X values for a dynamic rule, empty for a static one
    pub fn dynamic_values(&self) -> &[i64] {
        match &self.kind {
            RuleKind::Dynamic { values } => values,
            RuleKind::Static => &[],
        }
    }

    /// Validate a JSON value
    pub fn from_value(value: Value) -> Result<Rule, RuleError> {
        let def: RuleDefinition = serde_json::from_value(value)
            .map_err(|e| RuleError::new(RuleReason::R109_MALFORMED_DEFINITION, e.to_string()))?;
        Rule::try_from(def)
    }

    /// Validate a JSON document
    pub fn from_json_str(json: &str) -> Result<Rule, RuleError> {
        let def: RuleDefinition = serde_json::from_str(json)
            .map_err(|e| RuleError::new(RuleReason::R109_MALFORMED_DEFINITION, e.to_string()))?;
        Rule::try_from(def)
    }

    /// Back to the wire form
    pub fn to_definition(&self) -> RuleDefinition {
        RuleDefinition::from(self.clone())
    }
}

// =============================================================================
// WIRE FORM
// =============================================================================

/// One step as it appears in a rule document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepDefinition {
    #[serde(default)]
    pub colors: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<Value>,
}

/// `{"steps": [...]}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepListDefinition {
    #[serde(default)]
    pub steps: Vec<StepDefinition>,
}

/// A rule document as stored externally
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleDefinition {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub treat_yellow_as_green: Option<bool>,
    #[serde(default)]
    pub trigger: StepListDefinition,
    #[serde(default)]
    pub miss: StepListDefinition,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dynamic_values: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dynamic_x: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alerts: Option<AlertConfig>,
}

impl TryFrom<RuleDefinition> for Rule {
    type Error = RuleError;

    fn try_from(def: RuleDefinition) -> Result<Self, Self::Error> {
        let is_dynamic = match def.kind.as_deref() {
            Some("static") => false,
            Some("dynamic") => true,
            Some(other) => {
                return Err(RuleError::new(
                    RuleReason::R101_INVALID_TYPE,
                    format!("type '{}'", other),
                ))
            }
            None => return Err(RuleError::new(RuleReason::R101_INVALID_TYPE, "type missing")),
        };

        let name = def.name.as_deref().map(str::trim).unwrap_or_default();
        if name.is_empty() {
            return Err(RuleError::new(RuleReason::R102_NAME_REQUIRED, "name"));
        }

        let trigger = parse_steps("trigger", &def.trigger)?;
        let miss = parse_steps("miss", &def.miss)?;

        let kind = if is_dynamic {
            RuleKind::Dynamic {
                values: parse_dynamic_values(def.dynamic_values.as_deref())?,
            }
        } else {
            RuleKind::Static
        };

        Ok(Rule {
            name: def.name.unwrap_or_default(),
            description: def.description,
            kind,
            treat_yellow_as_green: def.treat_yellow_as_green.unwrap_or(true),
            trigger,
            miss,
            active: def.active.unwrap_or(true),
            alerts: def.alerts.unwrap_or_default(),
            dynamic_x: def.dynamic_x,
        })
    }
}

fn parse_steps(path: &str, list: &StepListDefinition) -> Result<StepList, RuleError> {
    let mut steps = Vec::with_capacity(list.steps.len());

    for (i, def) in list.steps.iter().enumerate() {
        let at = format!("{}.steps[{}]", path, i);

        if def.colors.is_empty() {
            return Err(RuleError::new(RuleReason::R103_COLORS_REQUIRED, at));
        }
        let mut colors = Vec::with_capacity(def.colors.len());
        for token in &def.colors {
            let group = token.as_str().and_then(ColorGroup::from_token).ok_or_else(|| {
                RuleError::new(RuleReason::R104_INVALID_COLOR, format!("{} color {}", at, token))
            })?;
            colors.push(group);
        }

        let operator = match &def.operator {
            None => Operator::Minimum,
            Some(token) => token.as_str().and_then(Operator::from_token).ok_or_else(|| {
                RuleError::new(
                    RuleReason::R105_INVALID_OPERATOR,
                    format!("{} operator {}", at, token),
                )
            })?,
        };

        let count = match &def.count {
            None => StepCount::default(),
            Some(value) => StepCount::from_wire(value).ok_or_else(|| {
                RuleError::new(RuleReason::R106_INVALID_COUNT, format!("{} count {}", at, value))
            })?,
        };

        steps.push(Step {
            colors,
            operator,
            count,
        });
    }

    Ok(StepList { steps })
}

fn parse_dynamic_values(values: Option<&[Value]>) -> Result<Vec<i64>, RuleError> {
    let values = match values {
        Some(v) if !v.is_empty() => v,
        _ => {
            return Err(RuleError::new(
                RuleReason::R107_DYNAMIC_VALUES_REQUIRED,
                "dynamic_values",
            ))
        }
    };

    values
        .iter()
        .map(|value| {
            value
                .as_i64()
                .filter(|x| (DYNAMIC_X_MIN..=DYNAMIC_X_MAX).contains(x))
                .ok_or_else(|| {
                    RuleError::new(
                        RuleReason::R108_DYNAMIC_VALUE_OUT_OF_RANGE,
                        format!("dynamic_values entry {}", value),
                    )
                })
        })
        .collect()
}

impl From<Rule> for RuleDefinition {
    fn from(rule: Rule) -> Self {
        let dynamic_values = match &rule.kind {
            RuleKind::Dynamic { values } => Some(values.iter().map(|x| Value::from(*x)).collect()),
            RuleKind::Static => None,
        };

        RuleDefinition {
            kind: Some(rule.kind.as_str().to_string()),
            name: Some(rule.name),
            description: rule.description,
            treat_yellow_as_green: Some(rule.treat_yellow_as_green),
            trigger: steps_to_definition(&rule.trigger),
            miss: steps_to_definition(&rule.miss),
            dynamic_values,
            dynamic_x: rule.dynamic_x,
            active: Some(rule.active),
            alerts: Some(rule.alerts),
        }
    }
}

fn steps_to_definition(list: &StepList) -> StepListDefinition {
    StepListDefinition {
        steps: list
            .iter()
            .map(|step| StepDefinition {
                colors: step
                    .colors
                    .iter()
                    .map(|c| Value::from(c.as_str()))
                    .collect(),
                operator: Some(Value::from(step.operator.as_str())),
                count: Some(step.count.to_wire()),
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CountExpr;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn valid_static() -> Value {
        json!({
            "type": "static",
            "name": "Pattern 1",
            "treat_yellow_as_green": true,
            "trigger": {"steps": [
                {"colors": ["green_yellow"], "operator": "minimum", "count": 3},
                {"colors": ["red"], "operator": "exact", "count": 1}
            ]},
            "miss": {"steps": [
                {"colors": ["red"], "operator": "minimum", "count": 2}
            ]}
        })
    }

    fn reason_of(value: Value) -> RuleReason {
        Rule::from_value(value).unwrap_err().reason
    }

    #[test]
    fn test_valid_static_rule() {
        let rule = Rule::from_value(valid_static()).unwrap();
        assert_eq!(rule.name, "Pattern 1");
        assert_eq!(rule.kind, RuleKind::Static);
        assert_eq!(rule.trigger.len(), 2);
        assert_eq!(rule.trigger.steps[0].colors, vec![ColorGroup::GreenYellow]);
        assert_eq!(rule.trigger.steps[1].operator, Operator::Exact);
        assert_eq!(rule.miss.steps[0].count, StepCount::Fixed(2));
        assert!(rule.active);
        assert_eq!(rule.alerts, AlertConfig::default());
    }

    #[test]
    fn test_step_defaults() {
        let rule = Rule::from_value(json!({
            "type": "static", "name": "defaults",
            "trigger": {"steps": [{"colors": ["red"]}]}
        }))
        .unwrap();
        let step = &rule.trigger.steps[0];
        assert_eq!(step.operator, Operator::Minimum);
        assert_eq!(step.count, StepCount::Fixed(1));
        assert!(rule.miss.is_empty());
        assert!(rule.treat_yellow_as_green);
    }

    #[test]
    fn test_rejects_missing_or_bad_type() {
        let mut v = valid_static();
        v.as_object_mut().unwrap().remove("type");
        assert_eq!(reason_of(v), RuleReason::R101_INVALID_TYPE);

        let mut v = valid_static();
        v["type"] = json!("sometimes");
        assert_eq!(reason_of(v), RuleReason::R101_INVALID_TYPE);
    }

    #[test]
    fn test_rejects_blank_name() {
        let mut v = valid_static();
        v["name"] = json!("   ");
        assert_eq!(reason_of(v), RuleReason::R102_NAME_REQUIRED);
    }

    #[test]
    fn test_rejects_bad_steps() {
        let mut v = valid_static();
        v["trigger"]["steps"][0]["colors"] = json!([]);
        assert_eq!(reason_of(v), RuleReason::R103_COLORS_REQUIRED);

        let mut v = valid_static();
        v["trigger"]["steps"][0]["colors"] = json!(["purple"]);
        assert_eq!(reason_of(v), RuleReason::R104_INVALID_COLOR);

        let mut v = valid_static();
        v["miss"]["steps"][0]["operator"] = json!("weird");
        let err = Rule::from_value(v).unwrap_err();
        assert_eq!(err.reason, RuleReason::R105_INVALID_OPERATOR);
        assert!(err.detail.starts_with("miss.steps[0]"));

        let mut v = valid_static();
        v["trigger"]["steps"][1]["count"] = json!("$X*2");
        assert_eq!(reason_of(v), RuleReason::R106_INVALID_COUNT);
    }

    #[test]
    fn test_dynamic_values_validation() {
        let base = json!({
            "type": "dynamic", "name": "dyn",
            "trigger": {"steps": [{"colors": ["red"], "operator": "exact", "count": "$X"}]}
        });
        assert_eq!(reason_of(base.clone()), RuleReason::R107_DYNAMIC_VALUES_REQUIRED);

        let mut v = base.clone();
        v["dynamic_values"] = json!([]);
        assert_eq!(reason_of(v), RuleReason::R107_DYNAMIC_VALUES_REQUIRED);

        let mut v = base.clone();
        v["dynamic_values"] = json!([3, 9]);
        assert_eq!(reason_of(v), RuleReason::R108_DYNAMIC_VALUE_OUT_OF_RANGE);

        let mut v = base.clone();
        v["dynamic_values"] = json!([3, "4"]);
        assert_eq!(reason_of(v), RuleReason::R108_DYNAMIC_VALUE_OUT_OF_RANGE);

        let mut v = base;
        v["dynamic_values"] = json!([5, 3, 5]);
        let rule = Rule::from_value(v).unwrap();
        assert_eq!(rule.dynamic_values(), &[5, 3, 5]);
        assert_eq!(
            rule.trigger.steps[0].count,
            StepCount::Symbolic(CountExpr { offset: 0 })
        );
    }

    #[test]
    fn test_malformed_shape() {
        assert_eq!(reason_of(json!([1, 2])), RuleReason::R109_MALFORMED_DEFINITION);
        assert_eq!(
            reason_of(json!({"type": "static", "name": "x", "trigger": {"steps": "nope"}})),
            RuleReason::R109_MALFORMED_DEFINITION
        );
    }

    #[test]
    fn test_serde_goes_through_validation() {
        let ok: Result<Rule, _> = serde_json::from_value(valid_static());
        assert!(ok.is_ok());

        let mut v = valid_static();
        v["trigger"]["steps"][0]["operator"] = json!("weird");
        let err = serde_json::from_value::<Rule>(v).unwrap_err();
        assert!(err.to_string().contains("R105_INVALID_OPERATOR"));
    }

    #[test]
    fn test_round_trip_preserves_fields() {
        let rule = Rule::from_value(json!({
            "type": "dynamic", "name": "dyn", "description": "exact X reds",
            "treat_yellow_as_green": false,
            "trigger": {"steps": [{"colors": ["red", "yellow"], "operator": "exact", "count": "$X"}]},
            "miss": {"steps": [{"colors": ["red"], "operator": "minimum", "count": "$X+1"}]},
            "dynamic_values": [4, 3],
            "active": false,
            "alerts": {"trigger_streak_threshold": 7, "miss_threshold": 3, "cooldown_rounds": 4}
        }))
        .unwrap();

        let json = serde_json::to_value(&rule).unwrap();
        assert_eq!(json["type"], "dynamic");
        assert_eq!(json["trigger"]["steps"][0]["count"], "$X");
        assert_eq!(json["miss"]["steps"][0]["count"], "$X+1");
        assert_eq!(json["dynamic_values"], json!([4, 3]));
        assert_eq!(json["alerts"]["cooldown_rounds"], 4);
        assert_eq!(json["description"], "exact X reds");

        let back: Rule = serde_json::from_value(json).unwrap();
        assert_eq!(back, rule);
    }
}
