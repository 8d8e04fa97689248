// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Generator Infrastructure - Anti-Corruption Layer Implementations
//
// Each adapter translates between the domain `Generator` trait and a backend.

pub mod ollama;
pub mod registry;
pub mod stub;

pub use ollama::OllamaGenerator;
pub use registry::GeneratorRegistry;
pub use stub::StubGenerator;
