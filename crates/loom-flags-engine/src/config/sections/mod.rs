// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

mod logging;
mod metrics;
mod refresh;

pub use logging::{LoggingConfig, LoggingConfigLayer};
pub use metrics::{MetricsConfig, MetricsConfigLayer};
pub use refresh::{RefreshConfig, RefreshConfigLayer};
