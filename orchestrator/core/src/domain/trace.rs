// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Trace Store (Agent Working Memory)
//!
//! Bounded history of rumination outcomes for a single agent. When the
//! history reaches its entry limit, or its estimated byte usage exceeds the
//! memory budget, the oldest entries are evicted into short lossy summaries.
//!
//! ## Eviction
//!
//! | Phase | Loop condition |
//! |-------|----------------|
//! | Count | `len > limit / 2` |
//! | Budget | `usage > budget` and history non-empty |
//!
//! Summaries are retained in their own sequence capped at `limit`; the oldest
//! summary is dropped first.

use crate::domain::compressor::MdlEncoder;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt::Write as _;

/// Number of findings characters kept in an eviction summary.
pub const SUMMARY_FINDINGS_CHARS: usize = 200;

pub const DEFAULT_TRACE_LIMIT: usize = 20;
pub const DEFAULT_MEMORY_BUDGET: usize = 4096;

/// Outcome of one rumination cycle. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEntry {
    pub timestamp: DateTime<Utc>,
    pub task_keyword: String,
    pub reasoning_steps: Vec<String>,
    pub findings: String,
    pub summary: String,
    pub key_insights: Vec<String>,
}

impl TraceEntry {
    pub fn new(task_keyword: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            task_keyword: task_keyword.into(),
            reasoning_steps: Vec::new(),
            findings: String::new(),
            summary: String::new(),
            key_insights: Vec::new(),
        }
    }

    /// Sum of the byte lengths of every string field.
    pub fn byte_size(&self) -> usize {
        self.task_keyword.len()
            + self.findings.len()
            + self.summary.len()
            + self.reasoning_steps.iter().map(String::len).sum::<usize>()
            + self.key_insights.iter().map(String::len).sum::<usize>()
    }

    /// Lossy one-line summary used when this entry is evicted.
    pub fn eviction_summary(&self) -> String {
        let mut summary = format!("Task: {}. ", self.task_keyword);

        if !self.findings.is_empty() {
            summary.push_str("Findings: ");
            summary.push_str(&truncate_chars(&self.findings, SUMMARY_FINDINGS_CHARS));
        }

        if !self.key_insights.is_empty() {
            let _ = write!(summary, " Key insights: {} items.", self.key_insights.len());
        }

        summary
    }
}

/// Keep the first `max_chars` characters, marking a cut with `...`.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

/// Report of a single eviction run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Eviction {
    pub evicted: usize,
    pub remaining: usize,
    pub usage_after: usize,
}

#[derive(Debug, Clone)]
pub struct TraceStore {
    traces: VecDeque<TraceEntry>,
    summaries: VecDeque<String>,
    limit: usize,
    memory_budget: usize,
    encoder: MdlEncoder,
}

impl TraceStore {
    pub fn new(limit: usize, memory_budget: usize) -> Self {
        Self {
            traces: VecDeque::new(),
            summaries: VecDeque::new(),
            limit,
            memory_budget,
            encoder: MdlEncoder::new(),
        }
    }

    /// Append an entry, evicting old entries if the store is over limit or budget.
    ///
    /// Returns the eviction report when eviction ran.
    pub fn add_trace(&mut self, entry: TraceEntry) -> Option<Eviction> {
        self.traces.push_back(entry);
        self.enforce_bounds()
    }

    /// Evict oldest entries into summaries until at most `limit / 2` remain,
    /// then keep going while byte usage exceeds the budget.
    pub fn compress_old_traces(&mut self) -> Eviction {
        let mut evicted = 0;

        while self.traces.len() > self.limit / 2 {
            if !self.evict_oldest() {
                break;
            }
            evicted += 1;
        }

        while self.memory_usage() > self.memory_budget {
            if !self.evict_oldest() {
                break;
            }
            evicted += 1;
        }

        Eviction {
            evicted,
            remaining: self.traces.len(),
            usage_after: self.memory_usage(),
        }
    }

    fn evict_oldest(&mut self) -> bool {
        let Some(oldest) = self.traces.pop_front() else {
            return false;
        };

        self.summaries.push_back(oldest.eviction_summary());
        while self.summaries.len() > self.limit {
            self.summaries.pop_front();
        }
        true
    }

    pub fn memory_usage(&self) -> usize {
        self.traces.iter().map(TraceEntry::byte_size).sum::<usize>()
            + self.summaries.iter().map(String::len).sum::<usize>()
    }

    pub fn is_limit_reached(&self) -> bool {
        self.traces.len() >= self.limit
    }

    pub fn len(&self) -> usize {
        self.traces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.traces.is_empty()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn memory_budget(&self) -> usize {
        self.memory_budget
    }

    /// Change the entry limit. Evicts immediately if the store is now full.
    pub fn set_limit(&mut self, limit: usize) -> Option<Eviction> {
        self.limit = limit;
        self.enforce_bounds()
    }

    /// Change the byte budget. Evicts immediately if usage now exceeds it.
    pub fn set_memory_budget(&mut self, budget: usize) -> Option<Eviction> {
        self.memory_budget = budget;
        self.enforce_bounds()
    }

    fn enforce_bounds(&mut self) -> Option<Eviction> {
        if self.is_limit_reached() || self.memory_usage() > self.memory_budget {
            Some(self.compress_old_traces())
        } else {
            None
        }
    }

    pub fn history(&self) -> Vec<TraceEntry> {
        self.traces.iter().cloned().collect()
    }

    /// Summaries produced by eviction, oldest first.
    pub fn evicted_summaries(&self) -> Vec<String> {
        self.summaries.iter().cloned().collect()
    }

    /// Eviction summaries followed by the summaries of live entries.
    pub fn summaries(&self) -> Vec<String> {
        self.summaries
            .iter()
            .cloned()
            .chain(
                self.traces
                    .iter()
                    .filter(|t| !t.summary.is_empty())
                    .map(|t| t.summary.clone()),
            )
            .collect()
    }

    pub fn key_insights(&self) -> Vec<String> {
        self.traces
            .iter()
            .flat_map(|t| t.key_insights.iter().cloned())
            .collect()
    }

    /// MDL-normalized prompt context over summaries and live entries.
    ///
    /// Every block is encoded on its own and the joined text is encoded once
    /// more, so n-grams repeated across blocks are also substituted inside
    /// summaries. A summary appears verbatim only when it shares no repeated
    /// n-gram with the rest of the context.
    pub fn normalized_context(&mut self) -> String {
        if self.traces.is_empty() && self.summaries.is_empty() {
            return String::new();
        }

        let mut out = String::new();

        for summary in &self.summaries {
            let _ = writeln!(out, "[Summary] {}", self.encoder.encode(summary));
        }

        for trace in &self.traces {
            let _ = writeln!(out, "[Trace: {}]", trace.task_keyword);

            if !trace.summary.is_empty() {
                let _ = writeln!(out, "Summary: {}", self.encoder.encode(&trace.summary));
            }

            if !trace.key_insights.is_empty() {
                out.push_str("Insights: ");
                for insight in &trace.key_insights {
                    let _ = write!(out, "{}; ", self.encoder.encode(insight));
                }
                out.push('\n');
            }

            if !trace.findings.is_empty() {
                let _ = writeln!(out, "Findings: {}", self.encoder.encode(&trace.findings));
            }
        }

        self.encoder.encode(&out)
    }

    pub fn clear(&mut self) {
        self.traces.clear();
        self.summaries.clear();
    }
}

impl Default for TraceStore {
    fn default() -> Self {
        Self::new(DEFAULT_TRACE_LIMIT, DEFAULT_MEMORY_BUDGET)
    }
}
