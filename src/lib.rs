use thiserror::Error;

/// Infrastructure faults that escape `reconcile()` as `Err` (§7
/// "PersistenceError" / framework-contract violations). Business faults
/// (NotFound, InputError, TransientError) are captured in conditions instead
/// and never reach this type — see `backend::BackendError`.
#[derive(Error, Debug)]
pub enum Error {
    #[error("kube error: {0}")]
    Kube(#[source] kube::Error),

    #[error("serialization error: {0}")]
    Serialization(#[source] serde_json::Error),

    #[error("finalizer error: {0}")]
    Finalizer(#[source] Box<kube::runtime::finalizer::Error<Error>>),
}

impl Error {
    pub fn metric_label(&self) -> String {
        format!("{self:?}").to_lowercase()
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

pub mod backend;
pub mod clusterdeployment;
pub mod conditions;
pub mod config;
pub mod differ;
pub mod gc;
pub mod leader;
pub mod metrics;
pub mod reconciler;
pub mod telemetry;
pub mod types;

#[cfg(test)]
pub mod fixtures;
