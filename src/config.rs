//! Garbage-collector configuration (§6). Durations are explicit construction
//! parameters per §9 "Config and global state", parsed from the two
//! recognized environment variables via `clap`'s `env` feature — the same
//! `--flag`/`env = "..."` idiom used across the example pack for long-running
//! services (e.g. the mayastor k8s operator's `--interval`/`--request-timeout`
//! duration flags) — with `humantime::Duration` doing the `"168h"`-style parsing
//! the original Go `envconfig` struct relied on.

use std::time::Duration;

fn default_deleted_unregistered_after() -> humantime::Duration {
    "168h".parse().expect("valid default duration")
}

fn default_deregister_inactive_after() -> humantime::Duration {
    "720h".parse().expect("valid default duration")
}

#[derive(clap::Args, Debug, Clone)]
pub struct GcConfig {
    /// How long after permanent-deletion eligibility a de-registered cluster/host
    /// is purged from the backend (I5: must be >= 0).
    #[arg(long, env = "DELETED_UNREGISTERED_AFTER", default_value = "168h")]
    deleted_unregistered_after: humantime::Duration,

    /// How long an inactive cluster may go without contact before it is
    /// deregistered (I5: must be >= 0).
    #[arg(long, env = "DELETED_INACTIVE_AFTER", default_value = "720h")]
    deregister_inactive_after: humantime::Duration,
}

impl GcConfig {
    pub fn deleted_unregistered_after(&self) -> Duration {
        self.deleted_unregistered_after.into()
    }

    pub fn deregister_inactive_after(&self) -> Duration {
        self.deregister_inactive_after.into()
    }
}

impl Default for GcConfig {
    fn default() -> Self {
        Self {
            deleted_unregistered_after: default_deleted_unregistered_after(),
            deregister_inactive_after: default_deregister_inactive_after(),
        }
    }
}
