// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core types for the Loom flag evaluation engine.
//!
//! This crate holds the definitions the engine consumes (context fields,
//! constraints, segments, strategies, variants, flags), the evaluation context
//! supplied by callers, and the result types returned to them. It is used by
//! `loom-flags-engine`, which implements hashing, rollout, variant selection
//! and orchestration on top of these types.
//!
//! # Overview
//!
//! - Typed context fields (string, number, boolean, date, semver, array)
//! - Constraint operators for sets, strings, numbers, semver and dates
//! - Reusable segments and OR-combined strategies per environment
//! - Weighted variants with typed payloads
//! - A versioned snapshot document validated before activation
//!
//! # Example
//!
//! ```
//! use loom_flags_core::{
//!     Constraint, EvaluationContext, FeatureFlag, FlagEnvironment, FlagSnapshot, Operator,
//!     SnapshotDocument, Strategy, VariantType,
//! };
//!
//! let document = SnapshotDocument::new(1).with_flag(
//!     FeatureFlag::new("feature.new_flow", VariantType::Boolean).with_environment(
//!         "prod",
//!         FlagEnvironment::enabled().with_strategy(
//!             Strategy::new("enterprise")
//!                 .with_constraint(Constraint::new("plan", Operator::In, ["enterprise"])),
//!         ),
//!     ),
//! );
//! let snapshot = FlagSnapshot::from_document(document).unwrap();
//!
//! let ctx = EvaluationContext::new("prod")
//!     .with_user_id("user123")
//!     .with_attribute("plan", "enterprise");
//!
//! let strategy = &snapshot.flag("feature.new_flow").unwrap().environment("prod").unwrap().strategies[0];
//! assert!(strategy.constraints[0].matches(&ctx, snapshot.registry()));
//! ```

pub mod constraint;
pub mod context;
pub mod context_field;
pub mod error;
pub mod evaluation;
pub mod flag;
pub mod segment;
pub mod snapshot;
pub mod strategy;
pub mod warning;

pub use constraint::{Constraint, Operator, OperatorFamily};
pub use context::{
	ContextValue, EvaluationContext, FIELD_CURRENT_TIME, FIELD_ENVIRONMENT, FIELD_SESSION_ID,
	FIELD_USER_ID,
};
pub use context_field::{
	parse_date, parse_number, parse_semver, ContextField, ContextFieldRegistry, FieldType, TypeError,
	TypedValue,
};
pub use error::{FlagsError, Result};
pub use evaluation::{EvaluationResult, EvaluationSource};
pub use flag::{
	FeatureFlag, FlagEnvironment, FlagValue, PayloadType, Variant, VariantPayload, VariantType,
};
pub use segment::Segment;
pub use snapshot::{FlagSnapshot, HashVersion, SnapshotDocument};
pub use strategy::{Stickiness, Strategy};
pub use warning::ConfigurationWarning;
