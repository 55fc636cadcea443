pub use std::{
    collections::{BTreeMap, VecDeque},
    io::{BufWriter, Write},
    fs::{File, OpenOptions},
    path::PathBuf,
    time::Instant,
};
pub use thiserror::Error;

pub use crate::{
    job::{Job, JobKind, HeapBlock},
    freelist::{FreeList, Policy},
    counters::Counters,
    metrics::MetricsSnapshot,
    config::SimConfig,
    workload::Workload,
    emit::ResultEmitter,
    driver::{Simulator, PolicyResult},
};

/// The unit for measuring memory and logical time throughout the
/// simulator. As in the crate this grew out of, sizes and ticks share
/// the same representation -- we don't expect workloads wide enough to
/// care about the distinction.
pub type Units = usize;

#[derive(Error, Debug)]
pub enum SimError {
    #[error("percentages must sum to 100, got small={small} medium={medium} large={large} (sum={sum})")]
    BadPercentages { small: i64, medium: i64, large: i64, sum: i64 },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Rounds a byte request up to whole allocation units.
///
/// `0` if `bytes` is non-positive, else `ceil(bytes / unit_size)`.
#[inline(always)]
pub fn units(bytes: i64, unit_size: Units) -> Units {
    if bytes <= 0 {
        0
    } else {
        let bytes = bytes as Units;
        if bytes % unit_size == 0 {
            bytes / unit_size
        } else {
            bytes / unit_size + 1
        }
    }
}

/// `max(1, v)`, used throughout the workload generator's clamps.
#[inline(always)]
pub fn at_least_one(v: i64) -> Units {
    if v < 1 { 1 } else { v as Units }
}
