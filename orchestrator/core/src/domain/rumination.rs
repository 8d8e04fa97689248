// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Rumination Prompts and Parsers
//!
//! Pure building blocks of the multi-phase reasoning pipeline: the prompt
//! text sent at each phase, the parsers that turn free-form model output into
//! steps and insights, and the locally computed summary and report.
//!
//! | Phase | Token budget | Output |
//! |-------|--------------|--------|
//! | Steps | [`STEPS_MAX_TOKENS`] | numbered or bulleted lines |
//! | Reflection | [`REFLECTION_MAX_TOKENS`] | one per original step |
//! | Synthesis | [`SYNTHESIS_MAX_TOKENS`] | findings text |
//! | Insights | [`INSIGHTS_MAX_TOKENS`] | bullet list |

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt::Write as _;

use crate::domain::trace::{truncate_chars, TraceEntry};

pub const STEPS_MAX_TOKENS: u32 = 512;
pub const REFLECTION_MAX_TOKENS: u32 = 256;
pub const SYNTHESIS_MAX_TOKENS: u32 = 512;
pub const INSIGHTS_MAX_TOKENS: u32 = 256;

/// Returned in place of a model call when the agent has no loaded backend.
pub const NOT_INITIALIZED: &str = "Agent not initialized";

pub const REFLECTION_PREFIX: &str = "Reflection: ";

const SUMMARY_FINDINGS_CHARS: usize = 150;
const INSIGHT_FALLBACK_CHARS: usize = 200;
const REPORT_RULE_WIDTH: usize = 70;

static STEP_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^(?:\d+\.|[-*])[ \t]*(.+)$").expect("step regex is valid"));
static INSIGHT_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^(?:[-*•]|\d+\.)[ \t]*(.+)$").expect("insight regex is valid"));

/// Shared prompt prefix: world model, prior context, prior insights and task.
pub fn task_prompt(world_model: &str, context: &str, insights: &[String], task_keyword: &str) -> String {
    let mut prompt = format!("World Model: {world_model}\n\n");

    if !context.is_empty() {
        let _ = write!(prompt, "Previous Context:\n{context}\n\n");
    }

    if !insights.is_empty() {
        prompt.push_str("Key Insights from History:\n");
        for insight in insights {
            let _ = writeln!(prompt, "- {insight}");
        }
        prompt.push('\n');
    }

    let _ = write!(prompt, "Current Task: {task_keyword}\n\n");
    prompt.push_str("Please analyze this task using chain-of-thought reasoning.\n");
    prompt
}

pub fn steps_prompt(world_model: &str, context: &str, insights: &[String], task_keyword: &str) -> String {
    let mut prompt = task_prompt(world_model, context, insights, task_keyword);
    prompt.push_str("Break down the task into reasoning steps. List each step clearly.\n");
    prompt
}

pub fn reflection_prompt(step: &str) -> String {
    format!(
        "Reflect on this reasoning step: {step}\n\
         Consider: Is this step valid? What are the implications? What questions does this raise?\n"
    )
}

pub fn synthesis_prompt(steps: &[String]) -> String {
    let mut prompt = String::from("Based on the following reasoning steps, synthesize the key findings:\n\n");
    for (i, step) in steps.iter().enumerate() {
        let _ = writeln!(prompt, "Step {}: {}", i + 1, step);
    }
    prompt.push_str("\nProvide a comprehensive summary of findings.\n");
    prompt
}

pub fn insights_prompt(findings: &str) -> String {
    format!(
        "Extract the key insights from the following findings. \
         List each insight as a concise bullet point:\n\n{findings}\n"
    )
}

/// Numbered or bulleted lines; else every non-blank line; else a single
/// default step naming the task.
pub fn parse_steps(response: &str, task_keyword: &str) -> Vec<String> {
    let mut steps = capture_items(&STEP_LINE, response);

    if steps.is_empty() {
        steps = response
            .lines()
            .filter(|line| !line.trim_matches([' ', '\t']).is_empty())
            .map(str::to_string)
            .collect();
    }

    if steps.is_empty() {
        steps.push(format!("Initial analysis of task: {task_keyword}"));
    }

    steps
}

/// Bulleted or numbered lines; else the first 200 characters of the response.
pub fn parse_insights(response: &str) -> Vec<String> {
    let insights = capture_items(&INSIGHT_LINE, response);

    if insights.is_empty() && !response.is_empty() {
        return vec![response.chars().take(INSIGHT_FALLBACK_CHARS).collect()];
    }

    insights
}

fn capture_items(pattern: &Regex, response: &str) -> Vec<String> {
    pattern
        .captures_iter(response)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

/// Locally computed summary stored on the trace entry.
pub fn summarize(entry: &TraceEntry) -> String {
    format!(
        "Task: {}\nReasoning steps: {}\nKey findings: {}",
        entry.task_keyword,
        entry.reasoning_steps.len(),
        truncate_chars(&entry.findings, SUMMARY_FINDINGS_CHARS)
    )
}

/// Human-readable report of one rumination cycle.
pub fn render_report(agent_id: &str, entry: &TraceEntry) -> String {
    let heavy = "=".repeat(REPORT_RULE_WIDTH);
    let light = "-".repeat(REPORT_RULE_WIDTH);
    let mut report = String::new();

    let _ = writeln!(report, "{heavy}");
    let _ = writeln!(report, "FINAL REPORT - Agent: {agent_id}");
    let _ = writeln!(report, "{heavy}\n");
    let _ = writeln!(report, "Task: {}\n", entry.task_keyword);

    let _ = writeln!(report, "Reasoning Steps ({} total):", entry.reasoning_steps.len());
    let _ = writeln!(report, "{light}");
    for (i, step) in entry.reasoning_steps.iter().enumerate() {
        let _ = writeln!(report, "{}. {}", i + 1, step);
    }
    let _ = writeln!(report, "{light}\n");

    let _ = writeln!(report, "Findings:");
    let _ = writeln!(report, "{light}");
    let _ = writeln!(report, "{}", entry.findings);
    let _ = writeln!(report, "{light}\n");

    let _ = writeln!(report, "Key Insights ({} total):", entry.key_insights.len());
    let _ = writeln!(report, "{light}");
    for insight in &entry.key_insights {
        let _ = writeln!(report, "• {insight}");
    }
    let _ = writeln!(report, "{light}");
    let _ = writeln!(report, "{heavy}");

    report
}
