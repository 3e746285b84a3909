//! Step counts: literal integers or `$X` expressions
//!
//! The expression language is tiny: `$X`, `$X+<digits>` or
//! `$X-<digits>`, with optional whitespace after the sign. Nothing else is
//! evaluated.

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;

lazy_static! {
    static ref RE_X_EXPR: Regex = Regex::new(r"^\$X(?:([+-])\s*(\d+))?$").unwrap();
    static ref RE_DIGITS: Regex = Regex::new(r"^\d+$").unwrap();
}

/// `$X` plus a signed offset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CountExpr {
    pub offset: i64,
}

impl CountExpr {
    /// Parse `$X`, `$X+n`, `$X-n`. Surrounding whitespace is ignored.
    pub fn parse(text: &str) -> Option<CountExpr> {
        let caps = RE_X_EXPR.captures(text.trim())?;
        let offset = match (caps.get(1), caps.get(2)) {
            (Some(sign), Some(digits)) => {
                let magnitude: i64 = digits.as_str().parse().ok()?;
                if sign.as_str() == "-" {
                    -magnitude
                } else {
                    magnitude
                }
            }
            _ => 0,
        };
        Some(CountExpr { offset })
    }

    /// Substitute X
    pub fn resolve(&self, x: i64) -> Option<i64> {
        x.checked_add(self.offset)
    }
}

impl std::fmt::Display for CountExpr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.offset {
            0 => write!(f, "$X"),
            n if n > 0 => write!(f, "$X+{}", n),
            n => write!(f, "$X-{}", n.unsigned_abs()),
        }
    }
}

/// A step's count, as written or after X has been bound
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StepCount {
    /// Concrete count. Positive when it comes off the wire; binding X may
    /// produce zero or a negative number, which is kept as-is.
    Fixed(i64),
    /// Unbound `$X` expression. A matcher step with this count fails.
    Symbolic(CountExpr),
}

impl Default for StepCount {
    fn default() -> Self {
        StepCount::Fixed(1)
    }
}

impl StepCount {
    /// Parse the wire value: a positive integer, a digit string, or a `$X` form
    pub fn from_wire(value: &Value) -> Option<StepCount> {
        match value {
            Value::Number(n) => n.as_i64().filter(|v| *v > 0).map(StepCount::Fixed),
            Value::String(s) => {
                let trimmed = s.trim();
                if RE_DIGITS.is_match(trimmed) {
                    trimmed
                        .parse::<i64>()
                        .ok()
                        .filter(|v| *v > 0)
                        .map(StepCount::Fixed)
                } else {
                    CountExpr::parse(trimmed).map(StepCount::Symbolic)
                }
            }
            _ => None,
        }
    }

    /// Back to the wire value
    pub fn to_wire(&self) -> Value {
        match self {
            StepCount::Fixed(n) => Value::from(*n),
            StepCount::Symbolic(expr) => Value::from(expr.to_string()),
        }
    }

    /// The concrete count, if there is one
    pub fn resolved(&self) -> Option<i64> {
        match self {
            StepCount::Fixed(n) => Some(*n),
            StepCount::Symbolic(_) => None,
        }
    }

    /// Bind X. Literals are left untouched; an overflowing expression stays symbolic.
    pub fn bind(&self, x: i64) -> StepCount {
        match self {
            StepCount::Fixed(n) => StepCount::Fixed(*n),
            StepCount::Symbolic(expr) => match expr.resolve(x) {
                Some(n) => StepCount::Fixed(n),
                None => StepCount::Symbolic(*expr),
            },
        }
    }

    pub fn is_symbolic(&self) -> bool {
        matches!(self, StepCount::Symbolic(_))
    }
}

impl std::fmt::Display for StepCount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StepCount::Fixed(n) => write!(f, "{}", n),
            StepCount::Symbolic(expr) => write!(f, "{}", expr),
        }
    }
}
