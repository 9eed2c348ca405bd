//! CSV input: delimiter and encoding resolution, reader construction and a
//! row iterator that numbers records.
//!
//! The header row is read like any other record so that an empty source can be
//! told apart from a source with a header and no data. Rows are flexible in
//! length; short rows are reported per cell by the mapper.

use std::{
    fs::File,
    io::{BufReader, Read},
    path::Path,
};

use anyhow::{Context, Result, anyhow};
use encoding_rs::{Encoding, UTF_8};

pub const DEFAULT_CSV_DELIMITER: u8 = b',';
pub const DEFAULT_TSV_DELIMITER: u8 = b'\t';

pub fn is_dash(path: &Path) -> bool {
    path == Path::new("-")
}

pub fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding> {
    if let Some(value) = label {
        Encoding::for_label(value.trim().as_bytes())
            .ok_or_else(|| anyhow!("Unknown encoding '{value}'"))
    } else {
        Ok(UTF_8)
    }
}

pub fn resolve_input_delimiter(path: &Path, provided: Option<u8>) -> u8 {
    provided.unwrap_or_else(|| match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") => DEFAULT_TSV_DELIMITER,
        _ => DEFAULT_CSV_DELIMITER,
    })
}

pub fn open_csv_reader<R>(reader: R, delimiter: u8) -> csv::Reader<R>
where
    R: Read,
{
    let mut builder = csv::ReaderBuilder::new();
    builder
        .has_headers(false)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(true);
    builder.from_reader(reader)
}

pub fn open_csv_reader_from_path(path: &Path, delimiter: u8) -> Result<csv::Reader<Box<dyn Read>>> {
    let reader: Box<dyn Read> = if is_dash(path) {
        Box::new(std::io::stdin().lock())
    } else {
        Box::new(BufReader::new(
            File::open(path).with_context(|| format!("Opening input file {path:?}"))?,
        ))
    };
    Ok(open_csv_reader(reader, delimiter))
}

pub fn decode_bytes(bytes: &[u8], encoding: &'static Encoding) -> Result<String> {
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        Err(anyhow!(
            "Failed to decode text with encoding {}",
            encoding.name()
        ))
    } else {
        Ok(text.into_owned())
    }
}

pub fn decode_record(record: &csv::ByteRecord, encoding: &'static Encoding) -> Result<Vec<String>> {
    record
        .iter()
        .map(|field| decode_bytes(field, encoding))
        .collect()
}

/// One data row. `number` counts the header as record 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub number: usize,
    pub cells: Vec<String>,
}

pub struct CsvRows<R: Read> {
    reader: csv::Reader<R>,
    encoding: &'static Encoding,
    record: csv::ByteRecord,
    next_number: usize,
}

impl CsvRows<Box<dyn Read>> {
    pub fn open(path: &Path, delimiter: Option<u8>, encoding: Option<&str>) -> Result<Self> {
        let delimiter = resolve_input_delimiter(path, delimiter);
        let encoding = resolve_encoding(encoding)?;
        let reader = open_csv_reader_from_path(path, delimiter)?;
        Ok(Self::new(reader, encoding))
    }
}

impl<R: Read> CsvRows<R> {
    pub fn new(reader: csv::Reader<R>, encoding: &'static Encoding) -> Self {
        Self {
            reader,
            encoding,
            record: csv::ByteRecord::new(),
            next_number: 0,
        }
    }

    pub fn from_reader(reader: R, delimiter: u8) -> Self {
        Self::new(open_csv_reader(reader, delimiter), UTF_8)
    }

    /// Reads the header row. `None` when the source has no records at all.
    pub fn read_header(&mut self) -> Result<Option<Vec<String>>> {
        Ok(self.read_next()?.map(|row| row.cells))
    }

    fn read_next(&mut self) -> Result<Option<Row>> {
        let number = self.next_number;
        let more = self
            .reader
            .read_byte_record(&mut self.record)
            .with_context(|| format!("Reading CSV record {number}"))?;
        if !more {
            return Ok(None);
        }
        self.next_number += 1;
        let cells = decode_record(&self.record, self.encoding)
            .with_context(|| format!("Decoding CSV record {number}"))?;
        Ok(Some(Row { number, cells }))
    }
}

impl<R: Read> Iterator for CsvRows<R> {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_next().transpose()
    }
}
