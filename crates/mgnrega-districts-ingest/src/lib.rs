// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]

mod backfill;
mod file;
mod upsert;

use mgnrega_districts_store::StoreError;
use std::fmt::{Display, Formatter};

pub const CRATE_NAME: &str = "mgnrega-districts-ingest";

pub use backfill::{backfill_ids, BackfillConflict, BackfillReport};
pub use file::{ingest_file, IngestSummary};
pub use upsert::upsert_record;

#[derive(Debug)]
#[non_exhaustive]
pub enum IngestError {
    Io(String),
    Parse(String),
    Store(StoreError),
}

impl Display for IngestError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(msg) => write!(f, "io_error: {msg}"),
            Self::Parse(msg) => write!(f, "parse_error: {msg}"),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for IngestError {}

impl From<StoreError> for IngestError {
    fn from(err: StoreError) -> Self {
        Self::Store(err)
    }
}
