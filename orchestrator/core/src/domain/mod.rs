// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain
//!
//! Pure types and policies: agent configuration, world model, messages,
//! working memory and its encoder, prompts, events and input validation.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Types shared by the application and infrastructure layers

pub mod agent;
pub mod compressor;
pub mod config;
pub mod events;
pub mod llm;
pub mod message;
pub mod rumination;
pub mod trace;
pub mod validation;
