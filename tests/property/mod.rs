// Copyright (c) 2025 - Cowboy AI, Inc.
//! Property-Based Tests Module
//!
//! Properties of path filtering, rule derivation and job outcomes that must
//! hold for every input.

mod job_outcomes;
mod path_rules;
