// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Static pipeline configuration.
//!
//! Settings are enumerated once at startup and never re-read
//! mid-decision. The env constructor mirrors how the orchestrator's
//! other services bootstrap: every option has a working default so the
//! pipeline runs offline (the agent falls back to evidence-only answers
//! when no credential is configured).

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Connection settings for one external LLM provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSettings {
    /// Empty means "not configured": adapters return
    /// `LlmError::MissingCredential` without touching the network.
    #[serde(default)]
    pub api_key: String,
    pub model: String,
    pub base_url: String,
}

/// Resolution applied when a decision needs approval while the pending
/// map is already at capacity. Never a silent overwrite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingOverflow {
    /// Fail the new decision with an explanatory answer.
    Reject,
    /// Reject the oldest pending decision and park the new one.
    Replace,
}

impl FromStr for PendingOverflow {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "reject" => Ok(PendingOverflow::Reject),
            "replace" => Ok(PendingOverflow::Replace),
            other => Err(format!("unknown pending overflow policy: {other}")),
        }
    }
}

/// Static options consumed at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub orchestrator: ProviderSettings,
    pub reviewer: ProviderSettings,

    /// Gate for the WAITING_APPROVAL state. Disabled, a NEEDS_APPROVAL
    /// verdict completes immediately.
    pub enable_human_in_loop: bool,

    /// Bound on each external generation/review call.
    #[serde(with = "timeout_secs")]
    pub external_call_timeout: Duration,

    /// Additional attempts after the first failed external call.
    pub max_retries: u32,

    /// Capacity of the pending-decision map.
    pub max_pending: usize,

    pub pending_overflow: PendingOverflow,

    /// Root for persisted learning state.
    pub data_dir: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            orchestrator: ProviderSettings {
                api_key: String::new(),
                model: "gpt-4o".to_string(),
                base_url: "https://api.openai.com/v1".to_string(),
            },
            reviewer: ProviderSettings {
                api_key: String::new(),
                model: "claude-sonnet-4-20250514".to_string(),
                base_url: "https://api.anthropic.com".to_string(),
            },
            enable_human_in_loop: true,
            external_call_timeout: Duration::from_secs(60),
            max_retries: 3,
            max_pending: 1,
            pending_overflow: PendingOverflow::Reject,
            data_dir: PathBuf::from("./data"),
        }
    }
}

impl Settings {
    /// Build settings from the process environment, falling back to the
    /// defaults above for anything unset or unparsable.
    pub fn from_env() -> Self {
        let defaults = Settings::default();

        Self {
            orchestrator: ProviderSettings {
                api_key: env_or("OPENAI_API_KEY", ""),
                model: env_or("OPENAI_MODEL", &defaults.orchestrator.model),
                base_url: env_or("OPENAI_BASE_URL", &defaults.orchestrator.base_url),
            },
            reviewer: ProviderSettings {
                api_key: env_or("ANTHROPIC_API_KEY", ""),
                model: env_or("ANTHROPIC_MODEL", &defaults.reviewer.model),
                base_url: env_or("ANTHROPIC_BASE_URL", &defaults.reviewer.base_url),
            },
            enable_human_in_loop: env_or("VERDICT_HUMAN_IN_LOOP", "true") == "true",
            external_call_timeout: Duration::from_secs(env_parsed("VERDICT_CALL_TIMEOUT_SECS", 60)),
            max_retries: env_parsed("VERDICT_MAX_RETRIES", defaults.max_retries),
            max_pending: env_parsed("VERDICT_MAX_PENDING", defaults.max_pending),
            pending_overflow: std::env::var("VERDICT_PENDING_OVERFLOW")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.pending_overflow),
            data_dir: PathBuf::from(env_or("VERDICT_DATA_DIR", "./data")),
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parsed<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

mod timeout_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(de)?))
    }
}
