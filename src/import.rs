//! The import run: CSV rows in, one started process instance per row out.
//!
//! Rows are mapped and submitted strictly in order. Dropped cells are logged as
//! warnings and the row is still submitted; a rejected submission ends the run
//! (instances already started stay started).

use std::{
    fs::File,
    io::{self, BufWriter, Write},
    path::Path,
};

use anyhow::{Context, Result};
use log::{debug, info, trace, warn};
use thiserror::Error;

use crate::{
    bonita::{BonitaClient, ProcessDefinition, ProcessSink, SubmitError},
    cli::{CsvArgs, ImportArgs, MapArgs, ProcessesArgs, ServerArgs},
    config::ImportConfig,
    header::{HeaderSchema, MappingError},
    io_utils::{CsvRows, Row, is_dash},
    mapper::{MappedRecord, RecordMapper},
    prompt,
};

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("File is empty, no header row found")]
    MissingHeader,
    #[error(transparent)]
    Mapping(#[from] MappingError),
    #[error("Cannot push record {record} to Bonita: {source}")]
    Submit {
        record: usize,
        #[source]
        source: SubmitError,
    },
    #[error("Cannot read record: {0:#}")]
    Source(anyhow::Error),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub rows_read: usize,
    pub submitted: usize,
    pub skipped: usize,
    pub values_dropped: usize,
}

/// Reads the header and resolves it into a mapper, failing before any row.
pub fn prepare_mapper<I>(rows: &mut CsvRows<I>, config: &ImportConfig) -> Result<RecordMapper, ImportError>
where
    I: io::Read,
{
    let headers = rows
        .read_header()
        .map_err(ImportError::Source)?
        .ok_or(ImportError::MissingHeader)?;
    debug!("Header row: {headers:?}");
    let schema = HeaderSchema::parse(headers.as_slice())?;
    for (idx, column, reason) in schema.unresolved() {
        warn!(
            "Column {idx} ('{}') will be skipped for every record: {reason}",
            column.header
        );
    }
    Ok(RecordMapper::new(schema, config.coercion()))
}

fn report_dropped(row: &Row, record: &MappedRecord) {
    for dropped in &record.dropped {
        warn!(
            "Skipped value for record {} column {} ('{}'), value '{}': {}",
            row.number, dropped.column, dropped.header, dropped.cell, dropped.reason
        );
    }
}

/// Maps every row and hands the document to `on_document`, stopping at the
/// first error it returns.
fn for_each_document<R, F>(
    rows: R,
    mapper: &RecordMapper,
    mut on_document: F,
) -> Result<ImportSummary, ImportError>
where
    R: IntoIterator<Item = Result<Row>>,
    F: FnMut(&Row, &MappedRecord) -> Result<(), ImportError>,
{
    let mut summary = ImportSummary::default();
    for row in rows {
        let row = row.map_err(ImportError::Source)?;
        summary.rows_read += 1;
        info!("Parsing record number: {}", row.number);
        debug!(" with content: {:?}", row.cells);
        let Some(record) = mapper.map(row.cells.as_slice()) else {
            warn!("Record {} is empty, nothing to push", row.number);
            summary.skipped += 1;
            continue;
        };
        report_dropped(&row, &record);
        summary.values_dropped += record.dropped.len();
        on_document(&row, &record)?;
    }
    Ok(summary)
}

/// Submits one document per row to `sink`.
pub fn run_import<R, S>(
    rows: R,
    mapper: &RecordMapper,
    sink: &mut S,
    process: &ProcessDefinition,
) -> Result<ImportSummary, ImportError>
where
    R: IntoIterator<Item = Result<Row>>,
    S: ProcessSink,
{
    let mut submitted = 0usize;
    let mut summary = for_each_document(rows, mapper, |row, record| {
        info!("Pushing record {} to Bonita server", row.number);
        trace!("{:?}", record.document);
        let case_id = sink
            .start_process(process, &record.document)
            .map_err(|source| ImportError::Submit {
                record: row.number,
                source,
            })?;
        debug!("Successfully pushed record {}, case {case_id}", row.number);
        submitted += 1;
        Ok(())
    })?;
    summary.submitted = submitted;
    Ok(summary)
}

/// Writes one JSON document per row to `out`.
pub fn write_documents<R, W>(rows: R, mapper: &RecordMapper, out: &mut W) -> Result<ImportSummary, ImportError>
where
    R: IntoIterator<Item = Result<Row>>,
    W: Write,
{
    let mut written = 0usize;
    let mut summary = for_each_document(rows, mapper, |row, record| {
        serde_json::to_writer(&mut *out, &record.document)
            .map_err(|err| ImportError::Source(anyhow::Error::new(err)))?;
        writeln!(out).map_err(|err| ImportError::Source(anyhow::Error::new(err)))?;
        trace!("Wrote document for record {}", row.number);
        written += 1;
        Ok(())
    })?;
    out.flush()
        .map_err(|err| ImportError::Source(anyhow::Error::new(err)))?;
    summary.submitted = written;
    Ok(summary)
}

fn log_summary(summary: &ImportSummary, verb: &str) {
    info!(
        "Read {} record(s): {} {verb}, {} empty, {} value(s) skipped",
        summary.rows_read, summary.submitted, summary.skipped, summary.values_dropped
    );
}

fn connect(server: &ServerArgs, config: &ImportConfig) -> Result<BonitaClient> {
    let defaults = &config.defaults;
    let server_url = prompt::text_or_prompt(
        server.server_url.as_deref(),
        "Bonita server URL",
        &defaults.server_url,
    )?;
    let application = prompt::text_or_prompt(
        server.application_name.as_deref(),
        "Bonita application name",
        &defaults.application,
    )?;
    let mut client = BonitaClient::new(&server_url, &application)
        .context("Creating the HTTP client")?;
    let username = prompt::text_or_prompt(
        server.username.as_deref(),
        "Bonita user name",
        &defaults.username,
    )?;
    let password = prompt::password_or_prompt(server.password.as_deref(), "Bonita password")?;
    info!("Logging into {}", client.base_url());
    client.login(&username, &password)?;
    info!("Successfully logged into server");
    Ok(client)
}

fn open_rows(csv: &CsvArgs) -> Result<CsvRows<Box<dyn io::Read>>> {
    let path = prompt::path_or_prompt(csv.csv_file.as_deref(), "CSV file", "--csv-file")?;
    let rows = CsvRows::open(&path, csv.delimiter, csv.input_encoding.as_deref())?;
    info!("Successfully opened CSV file {path:?}");
    Ok(rows)
}

/// Everything between login and logout.
fn import_rows<R>(
    rows: R,
    mapper: &RecordMapper,
    client: &mut BonitaClient,
    args: &ImportArgs,
    config: &ImportConfig,
) -> Result<ImportSummary>
where
    R: IntoIterator<Item = Result<Row>>,
{
    let processes = client.list_processes(config.process_list_limit)?;
    let process = prompt::select_process(
        &processes,
        args.process_name.as_deref(),
        args.process_version.as_deref(),
    )?;
    info!("Importing into process {process} (id {})", process.id);
    Ok(run_import(rows, mapper, client, process)?)
}

pub fn execute(args: &ImportArgs) -> Result<()> {
    info!("Starting bonita-importfile. For help information add -h.");
    let config = ImportConfig::load_or_default(args.config.as_deref())?;
    let mut rows = open_rows(&args.csv)?;
    let mapper = prepare_mapper(&mut rows, &config)?;

    let mut client = connect(&args.server, &config)?;
    let outcome = import_rows(rows, &mapper, &mut client, args, &config);
    client.logout();
    let summary = outcome?;
    log_summary(&summary, "pushed");
    info!("Finished bonita-importfile successfully.");
    Ok(())
}

pub fn execute_map(args: &MapArgs) -> Result<()> {
    let config = ImportConfig::load_or_default(args.config.as_deref())?;
    let mut rows = open_rows(&args.csv)?;
    let mapper = prepare_mapper(&mut rows, &config)?;
    let mut out: Box<dyn Write> = match args.output.as_deref() {
        Some(path) if !is_dash(path) => Box::new(BufWriter::new(create_output(path)?)),
        _ => Box::new(io::stdout().lock()),
    };
    let summary = write_documents(rows, &mapper, &mut out)?;
    log_summary(&summary, "mapped");
    Ok(())
}

fn create_output(path: &Path) -> Result<File> {
    File::create(path).with_context(|| format!("Creating output file {path:?}"))
}

pub fn execute_processes(args: &ProcessesArgs) -> Result<()> {
    let config = ImportConfig::load_or_default(args.config.as_deref())?;
    let client = connect(&args.server, &config)?;
    let processes = client.list_processes(config.process_list_limit);
    client.logout();
    let processes = processes?;
    if processes.is_empty() {
        info!("No deployed processes found");
        return Ok(());
    }
    let mut out = io::stdout().lock();
    for (idx, process) in processes.iter().enumerate() {
        writeln!(
            out,
            "{}. {process} {} id={} deployed={}",
            idx + 1,
            process.activation_state,
            process.id,
            process.deployment_date
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;
    use serde_json::json;

    struct RecordingSink {
        documents: Vec<serde_json::Value>,
        reject_at: Option<usize>,
    }

    impl ProcessSink for RecordingSink {
        fn start_process(
            &mut self,
            _process: &ProcessDefinition,
            document: &Document,
        ) -> Result<u64, SubmitError> {
            if self.reject_at == Some(self.documents.len()) {
                return Err(SubmitError::ContractViolated("missing input".into()));
            }
            self.documents.push(document.to_json().unwrap());
            Ok(self.documents.len() as u64)
        }
    }

    fn process() -> ProcessDefinition {
        ProcessDefinition {
            id: "42".into(),
            name: "Claim".into(),
            version: "1.0".into(),
            activation_state: "ENABLED".into(),
            deployment_date: String::new(),
        }
    }

    fn rows(data: &str) -> CsvRows<&[u8]> {
        CsvRows::from_reader(data.as_bytes(), b',')
    }

    #[test]
    fn submits_rows_in_order_and_skips_empty_ones() {
        let mut rows = rows("id(LONG),tags[](STRING)\n1,x\n,\n2,y\n");
        let mapper = prepare_mapper(&mut rows, &ImportConfig::default()).unwrap();
        let mut sink = RecordingSink {
            documents: Vec::new(),
            reject_at: None,
        };
        let summary = run_import(rows, &mapper, &mut sink, &process()).unwrap();
        assert_eq!(
            sink.documents,
            vec![
                json!({"id": 1, "tags": ["x"]}),
                json!({"id": 2, "tags": ["y"]}),
            ]
        );
        assert_eq!(
            summary,
            ImportSummary {
                rows_read: 3,
                submitted: 2,
                skipped: 1,
                values_dropped: 0,
            }
        );
    }

    #[test]
    fn rejection_stops_the_run() {
        let mut rows = rows("id(LONG)\n1\n2\n3\n");
        let mapper = prepare_mapper(&mut rows, &ImportConfig::default()).unwrap();
        let mut sink = RecordingSink {
            documents: Vec::new(),
            reject_at: Some(1),
        };
        let err = run_import(rows, &mapper, &mut sink, &process()).unwrap_err();
        assert!(matches!(err, ImportError::Submit { record: 2, .. }));
        assert_eq!(sink.documents, vec![json!({"id": 1})]);
    }

    #[test]
    fn malformed_header_fails_before_any_row() {
        let mut rows = rows("items[a=b=c](STRING)\nx\n");
        assert!(matches!(
            prepare_mapper(&mut rows, &ImportConfig::default()),
            Err(ImportError::Mapping(_))
        ));
    }

    #[test]
    fn empty_source_is_missing_header() {
        let mut rows = rows("");
        assert!(matches!(
            prepare_mapper(&mut rows, &ImportConfig::default()),
            Err(ImportError::MissingHeader)
        ));
    }

    #[test]
    fn dropped_values_are_counted_but_row_is_sent() {
        let mut rows = rows("id(LONG),amount(DOUBLE)\n1,abc\n");
        let mapper = prepare_mapper(&mut rows, &ImportConfig::default()).unwrap();
        let mut sink = RecordingSink {
            documents: Vec::new(),
            reject_at: None,
        };
        let summary = run_import(rows, &mapper, &mut sink, &process()).unwrap();
        assert_eq!(summary.values_dropped, 1);
        assert_eq!(sink.documents, vec![json!({"id": 1})]);
    }

    #[test]
    fn write_documents_emits_json_lines() {
        let mut rows = rows("a.b(INTEGER),flag(BOOLEAN)\n5,TRUE\n6,FALSE\n");
        let mapper = prepare_mapper(&mut rows, &ImportConfig::default()).unwrap();
        let mut out = Vec::new();
        let summary = write_documents(rows, &mapper, &mut out).unwrap();
        assert_eq!(summary.submitted, 2);
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text.lines().collect::<Vec<_>>(),
            vec![r#"{"a":{"b":5},"flag":true}"#, r#"{"a":{"b":6},"flag":false}"#]
        );
    }
}
