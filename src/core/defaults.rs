//! Built-in rule set
//!
//! Four green/red alternation rules, one yellow/red rule that keeps yellow
//! distinct, and two dynamic run-length rules over X in 3..=8.

use crate::types::{ColorGroup, CountExpr, Operator, Rule, Step, StepCount, StepList};
use crate::{DYNAMIC_X_MAX, DYNAMIC_X_MIN};

const GY: ColorGroup = ColorGroup::GreenYellow;
const RED: ColorGroup = ColorGroup::Red;
const YELLOW: ColorGroup = ColorGroup::Yellow;

fn steps(list: &[(ColorGroup, Operator, i64)]) -> StepList {
    StepList::new(
        list.iter()
            .map(|&(group, op, count)| Step::fixed(&[group], op, count))
            .collect(),
    )
}

fn described(mut rule: Rule, description: &str) -> Rule {
    rule.description = Some(description.to_string());
    rule
}

/// Run of `group` of exactly X (trigger) or at least X+1 (miss)
fn run_length(name: &str, group: ColorGroup, description: &str) -> Rule {
    let x = |offset| StepCount::Symbolic(CountExpr { offset });
    described(
        Rule::new_dynamic(
            name,
            (DYNAMIC_X_MIN..=DYNAMIC_X_MAX).collect(),
            StepList::new(vec![Step::new(&[group], Operator::Exact, x(0))]),
            StepList::new(vec![Step::new(&[group], Operator::Minimum, x(1))]),
        ),
        description,
    )
}

/// The seven built-in rules, in load order
pub fn default_rules() -> Vec<Rule> {
    use Operator::{Exact, Minimum};

    let mut yellow_red = described(
        Rule::new_static(
            "Pattern 5",
            steps(&[(YELLOW, Exact, 1), (RED, Exact, 1), (GY, Minimum, 1)]),
            steps(&[(YELLOW, Exact, 1), (RED, Minimum, 2)]),
        ),
        "yellow -> red -> green/yellow (trigger)",
    );
    yellow_red.treat_yellow_as_green = false;

    vec![
        described(
            Rule::new_static(
                "Pattern 1",
                steps(&[(GY, Minimum, 3), (RED, Exact, 1), (GY, Minimum, 1)]),
                steps(&[(GY, Minimum, 3), (RED, Minimum, 2)]),
            ),
            "3+ green/yellow -> 1 red -> 1+ green/yellow (trigger); 3+ green/yellow -> 2+ red (miss)",
        ),
        described(
            Rule::new_static(
                "Pattern 2",
                steps(&[(GY, Minimum, 3), (RED, Exact, 2), (GY, Minimum, 1)]),
                steps(&[(GY, Minimum, 3), (RED, Minimum, 3)]),
            ),
            "3+ green/yellow -> exactly 2 red -> 1+ green/yellow (trigger)",
        ),
        described(
            Rule::new_static(
                "Pattern 3",
                steps(&[(RED, Minimum, 3), (GY, Exact, 1), (RED, Minimum, 1)]),
                steps(&[(RED, Minimum, 3), (GY, Minimum, 2)]),
            ),
            "3+ red -> 1 green/yellow -> 1+ red (trigger)",
        ),
        described(
            Rule::new_static(
                "Pattern 4",
                steps(&[(RED, Minimum, 3), (GY, Exact, 2), (RED, Minimum, 1)]),
                steps(&[(RED, Minimum, 3), (GY, Minimum, 3)]),
            ),
            "3+ red -> exactly 2 green/yellow -> 1+ red (trigger)",
        ),
        yellow_red,
        run_length("Pattern 6", GY, "exact X green/yellow where X in [3-8] (dynamic)"),
        run_length("Pattern 7", RED, "exact X red where X in [3-8] (dynamic)"),
    ]
}
