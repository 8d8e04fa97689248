// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Input Validation
//!
//! Guards the task and agent-id inputs that reach prompts and the registry.
//!
//! | Input | Rule |
//! |-------|------|
//! | Task keyword | 1..=1000 chars, no SQL / XSS / command-injection markers |
//! | Agent id | 1..=100 chars of `[A-Za-z0-9_-]` |
//!
//! Marker matching is plain substring search (case-insensitive for SQL and
//! XSS), so ordinary words such as "selection" are rejected too.

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

pub const MAX_KEYWORD_CHARS: usize = 1000;
pub const MAX_AGENT_ID_CHARS: usize = 100;
pub const DEFAULT_MAX_RETRIES: usize = 3;

const SQL_PATTERNS: &[&str] = &["';", "--", "/*", "*/", "xp_", "sp_", "exec", "union", "select"];
const XSS_PATTERNS: &[&str] = &["<script", "</script>", "javascript:", "onerror=", "onclick="];
const COMMAND_PATTERNS: &[&str] = &[";", "|", "&", "`", "$(", "${{", ">", "<", "\n"];

static AGENT_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("agent id regex is valid"));

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("input is empty")]
    Empty,

    #[error("input is {actual} characters long (max {max})")]
    TooLong { max: usize, actual: usize },

    #[error("input contains SQL injection marker {0:?}")]
    SqlInjection(&'static str),

    #[error("input contains script injection marker {0:?}")]
    Xss(&'static str),

    #[error("input contains command injection marker {0:?}")]
    CommandInjection(&'static str),

    #[error("agent id may only contain letters, digits, '_' and '-'")]
    InvalidAgentId,

    #[error("input still invalid after {0} sanitization attempts")]
    RetriesExhausted(usize),
}

#[derive(Debug, Clone)]
pub struct InputValidator {
    max_retries: usize,
}

impl InputValidator {
    pub fn new(max_retries: usize) -> Self {
        Self { max_retries }
    }

    pub fn max_retries(&self) -> usize {
        self.max_retries
    }

    pub fn check_task_keyword(&self, keyword: &str) -> Result<(), ValidationError> {
        check_length(keyword, MAX_KEYWORD_CHARS)?;

        let lower = keyword.to_lowercase();
        if let Some(pattern) = find_marker(&lower, SQL_PATTERNS) {
            return Err(ValidationError::SqlInjection(pattern));
        }
        if let Some(pattern) = find_marker(&lower, XSS_PATTERNS) {
            return Err(ValidationError::Xss(pattern));
        }
        if let Some(pattern) = find_marker(keyword, COMMAND_PATTERNS) {
            return Err(ValidationError::CommandInjection(pattern));
        }

        Ok(())
    }

    pub fn check_agent_id(&self, agent_id: &str) -> Result<(), ValidationError> {
        check_length(agent_id, MAX_AGENT_ID_CHARS)?;

        if !AGENT_ID.is_match(agent_id) {
            return Err(ValidationError::InvalidAgentId);
        }
        Ok(())
    }

    pub fn validate_task_keyword(&self, keyword: &str) -> bool {
        self.check_task_keyword(keyword).is_ok()
    }

    pub fn validate_agent_id(&self, agent_id: &str) -> bool {
        self.check_agent_id(agent_id).is_ok()
    }

    /// Drop control characters other than `\n` and `\t`, then trim.
    pub fn sanitize(&self, input: &str) -> String {
        let kept: String = input
            .chars()
            .filter(|&c| !(c < ' ' && c != '\n' && c != '\t'))
            .collect();

        kept.trim_matches([' ', '\t', '\n', '\r']).to_string()
    }

    /// Sanitize then validate, re-sanitizing up to `max_retries` times.
    ///
    /// Returns the first sanitized form accepted by `is_valid`.
    pub fn validate_with_retry<F>(&self, input: &str, is_valid: F) -> Result<String, ValidationError>
    where
        F: Fn(&str) -> bool,
    {
        let mut current = input.to_string();

        for attempt in 0..self.max_retries {
            let sanitized = self.sanitize(&current);
            if is_valid(&sanitized) {
                return Ok(sanitized);
            }

            tracing::debug!(attempt = attempt + 1, "input rejected, sanitizing again");
            current = sanitized;
        }

        Err(ValidationError::RetriesExhausted(self.max_retries))
    }
}

impl Default for InputValidator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RETRIES)
    }
}

fn check_length(input: &str, max: usize) -> Result<(), ValidationError> {
    if input.is_empty() {
        return Err(ValidationError::Empty);
    }

    let actual = input.chars().count();
    if actual > max {
        return Err(ValidationError::TooLong { max, actual });
    }
    Ok(())
}

fn find_marker(haystack: &str, patterns: &[&'static str]) -> Option<&'static str> {
    patterns.iter().copied().find(|p| haystack.contains(p))
}
