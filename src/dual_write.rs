//! Drives one row source into a primary store and an optional secondary store.
//!
//! The primary receives every row; its store-level failures abort the batch.
//! The secondary is prepared once up front: if that fails the batch continues
//! primary-only and the reason is reported once. After a successful start, a
//! failing secondary write is recorded against its row and the batch goes on.

use std::borrow::Borrow;

use tracing::{debug, info, warn};

use crate::{
    backend::GraphBackend,
    errors::MovieKgError,
    identity::StableId,
    ingest::{MovieRecord, RawRow, ingest_record},
    schema::{MOVIE_ONTOLOGY, SchemaReport},
};

/// How the secondary store is supplied to a load.
#[derive(Clone, Copy)]
pub enum SecondaryTarget<'a> {
    /// No secondary store configured.
    Absent,
    /// Configured but could not be opened; carries the reason.
    Unreachable(&'a str),
    Store(&'a dyn GraphBackend),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoadOptions {
    pub clear_before_load: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            clear_before_load: true,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncMode {
    PrimaryOnly,
    DualActive,
}

/// `NotStarted -> Running(_) -> Completed(_)`; `DualActive` may only downgrade.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncState {
    NotStarted,
    Running(SyncMode),
    Completed(SyncMode),
}

impl SyncState {
    pub fn mode(self) -> Option<SyncMode> {
        match self {
            SyncState::NotStarted => None,
            SyncState::Running(mode) | SyncState::Completed(mode) => Some(mode),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SkippedRow {
    pub line: u64,
    pub reason: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SecondaryError {
    pub line: u64,
    pub reason: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct LoadSummary {
    pub rows_read: usize,
    pub works_ingested: usize,
    pub secondary_works_ingested: usize,
    pub skipped: Vec<SkippedRow>,
    pub primary_store: &'static str,
    pub secondary_store: Option<&'static str>,
    pub secondary_available: bool,
    /// Set once when the secondary could not be started.
    pub secondary_unavailable: Option<String>,
    pub secondary_errors: Vec<SecondaryError>,
    pub schema_conflicts: Vec<String>,
    pub state: SyncState,
}

impl LoadSummary {
    fn new(primary_store: &'static str) -> Self {
        Self {
            rows_read: 0,
            works_ingested: 0,
            secondary_works_ingested: 0,
            skipped: Vec::new(),
            primary_store,
            secondary_store: None,
            secondary_available: false,
            secondary_unavailable: None,
            secondary_errors: Vec::new(),
            schema_conflicts: Vec::new(),
            state: SyncState::NotStarted,
        }
    }

    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }
}

pub struct DualWriter<'a, P: GraphBackend + ?Sized> {
    primary: &'a P,
    target: SecondaryTarget<'a>,
    secondary: Option<&'a dyn GraphBackend>,
    summary: LoadSummary,
}

impl<'a, P: GraphBackend + ?Sized> DualWriter<'a, P> {
    pub fn new(primary: &'a P, target: SecondaryTarget<'a>) -> Self {
        Self {
            primary,
            target,
            secondary: None,
            summary: LoadSummary::new(primary.name()),
        }
    }

    pub fn state(&self) -> SyncState {
        self.summary.state
    }

    /// Prepares both stores (optional clear, schema registration) and enters `Running`.
    pub fn begin(&mut self, options: &LoadOptions) -> Result<(), MovieKgError> {
        if self.summary.state != SyncState::NotStarted {
            return Err(MovieKgError::invalid_input("load already started"));
        }
        let report = prepare(self.primary, options)?;
        self.record_conflicts(self.primary.name(), &report);

        let mode = match self.target {
            SecondaryTarget::Absent => SyncMode::PrimaryOnly,
            SecondaryTarget::Unreachable(reason) => {
                self.downgrade(None, reason.to_owned());
                SyncMode::PrimaryOnly
            }
            SecondaryTarget::Store(store) => match prepare(store, options) {
                Ok(report) => {
                    self.record_conflicts(store.name(), &report);
                    self.secondary = Some(store);
                    self.summary.secondary_store = Some(store.name());
                    self.summary.secondary_available = true;
                    SyncMode::DualActive
                }
                Err(err) => {
                    self.downgrade(Some(store.name()), err.to_string());
                    SyncMode::PrimaryOnly
                }
            },
        };
        info!(mode = ?mode, primary = self.primary.name(), "load started");
        self.summary.state = SyncState::Running(mode);
        Ok(())
    }

    /// Ingests one row. `Ok(None)` means the row was skipped; `Err` is fatal for the batch.
    pub fn write_row(&mut self, row: &RawRow) -> Result<Option<StableId>, MovieKgError> {
        if !matches!(self.summary.state, SyncState::Running(_)) {
            return Err(MovieKgError::invalid_input(format!(
                "cannot write rows in state {:?}",
                self.summary.state
            )));
        }
        self.summary.rows_read += 1;

        let record = match MovieRecord::from_row(row) {
            Ok(record) => record,
            Err(err) => return self.skip(row.line, err),
        };
        let work = match ingest_record(self.primary, &record) {
            Ok(work) => work,
            Err(err) if err.is_row_level() => return self.skip(row.line, err),
            Err(err) => return Err(err),
        };
        self.summary.works_ingested += 1;

        if let Some(secondary) = self.secondary {
            match ingest_record(secondary, &record) {
                Ok(_) => self.summary.secondary_works_ingested += 1,
                Err(err) => {
                    warn!(
                        store = secondary.name(),
                        line = row.line,
                        error = %err,
                        "secondary write failed"
                    );
                    self.summary.secondary_errors.push(SecondaryError {
                        line: row.line,
                        reason: err.to_string(),
                    });
                }
            }
        }
        Ok(Some(work))
    }

    pub fn finish(mut self) -> LoadSummary {
        let mode = self.summary.state.mode().unwrap_or(SyncMode::PrimaryOnly);
        self.summary.state = SyncState::Completed(mode);
        info!(
            rows = self.summary.rows_read,
            ingested = self.summary.works_ingested,
            skipped = self.summary.skipped.len(),
            secondary_errors = self.summary.secondary_errors.len(),
            "load finished"
        );
        self.summary
    }

    fn skip(&mut self, line: u64, err: MovieKgError) -> Result<Option<StableId>, MovieKgError> {
        if !err.is_row_level() {
            return Err(err);
        }
        warn!(line, error = %err, "skipping row");
        self.summary.skipped.push(SkippedRow {
            line,
            reason: err.to_string(),
        });
        Ok(None)
    }

    fn downgrade(&mut self, store: Option<&'static str>, reason: String) {
        warn!(reason = %reason, "secondary store unavailable, continuing with primary only");
        self.secondary = None;
        self.summary.secondary_store = store;
        self.summary.secondary_available = false;
        self.summary.secondary_unavailable = Some(reason);
    }

    fn record_conflicts(&mut self, store: &str, report: &SchemaReport) {
        debug!(
            store,
            declared = report.declared,
            already_present = report.already_present,
            "schema registered"
        );
        for conflict in &report.conflicts {
            warn!(store, %conflict, "schema conflict, keeping existing declaration");
            self.summary
                .schema_conflicts
                .push(format!("{store}: {conflict}"));
        }
    }
}

fn prepare<B: GraphBackend + ?Sized>(
    store: &B,
    options: &LoadOptions,
) -> Result<SchemaReport, MovieKgError> {
    if options.clear_before_load {
        debug!(store = store.name(), "clearing store");
        store.clear()?;
    }
    store.register_schema(&MOVIE_ONTOLOGY)
}

/// Loads every row into `primary` and, when possible, into the secondary.
pub fn load_all<'a, P, I>(
    rows: I,
    primary: &'a P,
    secondary: SecondaryTarget<'a>,
    options: &LoadOptions,
) -> Result<LoadSummary, MovieKgError>
where
    P: GraphBackend + ?Sized,
    I: IntoIterator,
    I::Item: Borrow<RawRow>,
{
    let mut writer = DualWriter::new(primary, secondary);
    writer.begin(options)?;
    for row in rows {
        writer.write_row(row.borrow())?;
    }
    Ok(writer.finish())
}
