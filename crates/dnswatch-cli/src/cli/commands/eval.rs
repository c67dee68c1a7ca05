//! `dnswatch eval` - Evaluate a rule expression against given target values.

use anyhow::Result;
use colored::Colorize;
use dnswatch::RuleExpr;
use serde::Serialize;
use std::collections::BTreeMap;

use super::Context;
use crate::cli::args::EvalArgs;
use crate::output::{print_structured, state_label};

#[derive(Debug, Serialize)]
struct EvalReport {
    rule: String,
    values: BTreeMap<String, bool>,
    /// Normalized expression when the rule parses
    #[serde(skip_serializing_if = "Option::is_none")]
    parsed: Option<String>,
    alive: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn evaluate(args: &EvalArgs) -> EvalReport {
    let values: BTreeMap<String, bool> = args.values.iter().cloned().collect();
    let (parsed, outcome) = match RuleExpr::parse(&args.rule) {
        Ok(expr) => {
            let outcome = expr.eval(&|name| values.get(name).copied());
            (Some(expr.to_string()), outcome)
        }
        Err(e) => (None, Err(e)),
    };
    EvalReport {
        rule: args.rule.clone(),
        parsed,
        alive: *outcome.as_ref().unwrap_or(&false),
        error: outcome.err().map(|e| e.to_string()),
        values,
    }
}

pub fn execute(ctx: &Context, args: &EvalArgs) -> Result<()> {
    let report = evaluate(args);
    if print_structured(ctx.output_format, &report)? {
        return Ok(());
    }

    println!("{} {}", "Rule:".bold(), report.rule);
    if let Some(parsed) = &report.parsed {
        println!("{} {}", "Parsed:".bold(), parsed);
    }
    for (name, value) in &report.values {
        println!("  %({name}) = {}", state_label(*value));
    }
    if let Some(error) = &report.error {
        println!("{} {}", "Error:".red().bold(), error);
    }
    println!("{} {}", "Verdict:".bold(), state_label(report.alive));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(rule: &str, values: &[(&str, bool)]) -> EvalArgs {
        EvalArgs {
            rule: rule.to_string(),
            values: values.iter().map(|(n, v)| ((*n).to_string(), *v)).collect(),
        }
    }

    #[test]
    fn test_eval_report() {
        let report = evaluate(&args("%(a) && !%(b)", &[("a", true), ("b", false)]));
        assert!(report.alive);
        assert!(report.error.is_none());
        assert!(report.parsed.is_some());

        let report = evaluate(&args("%(a) && !%(b)", &[("a", true), ("b", true)]));
        assert!(!report.alive);
    }

    #[test]
    fn test_eval_errors_are_dead() {
        let report = evaluate(&args("%(a) ||", &[("a", true)]));
        assert!(!report.alive);
        assert!(report.parsed.is_none());
        assert!(report.error.is_some());

        let report = evaluate(&args("%(a) || %(b)", &[("a", true)]));
        assert!(!report.alive);
        assert!(report.error.unwrap().contains('b'));
    }
}
