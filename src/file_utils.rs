use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, WriterBuilder};
use encoding_rs::WINDOWS_1252;

use crate::atomic;
use crate::error::TableError;
use crate::models::{normalize_header_name, Header, Table};

/// Delimitadores candidatos, en orden de desempate
const CANDIDATE_DELIMITERS: [u8; 4] = [b',', b';', b'\t', b'|'];

/// Tabla leída de disco y cómo se decodificó
#[derive(Debug, Clone)]
pub struct CsvSource {
    pub table: Table,
    pub encoding: &'static str,
    pub delimiter: u8,
}

/// Lee un CSV con fallback de encoding (utf-8 → cp1252) y detección de delimitador
pub fn read_csv_file(path: &Path) -> Result<CsvSource, TableError> {
    let bytes = fs::read(path).map_err(|source| TableError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let (content, encoding) = decode_text(&bytes);
    let delimiter = detect_delimiter(&content);

    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(content.as_bytes());

    let csv_error = |source| TableError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let schema_error = |source| TableError::Schema {
        path: path.to_path_buf(),
        source,
    };

    let raw_headers = reader.headers().map_err(csv_error)?.clone();
    let header = Header::new(raw_headers.iter().map(normalize_header_name)).map_err(schema_error)?;

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result.map_err(csv_error)?;
        rows.push(record.iter().map(str::to_string).collect());
    }

    let table = Table::new(header, rows).map_err(schema_error)?;
    Ok(CsvSource {
        table,
        encoding,
        delimiter,
    })
}

pub fn read_table(path: &Path) -> Result<Table, TableError> {
    read_csv_file(path).map(|source| source.table)
}

/// Decodifica bytes como UTF-8 (tolerando BOM) y cae a cp1252 si no es válido
pub fn decode_text(bytes: &[u8]) -> (String, &'static str) {
    let without_bom = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    match std::str::from_utf8(without_bom) {
        Ok(text) => (text.to_string(), "utf-8"),
        Err(_) => {
            let (decoded, _) = WINDOWS_1252.decode_without_bom_handling(bytes);
            (decoded.into_owned(), "cp1252")
        }
    }
}

/// Detecta el delimitador contando candidatos en la primera línea; fallback a coma
pub fn detect_delimiter(content: &str) -> u8 {
    let first_line = content.lines().find(|line| !line.trim().is_empty());
    let Some(line) = first_line else {
        return b',';
    };

    let mut best = (b',', 0usize);
    for candidate in CANDIDATE_DELIMITERS {
        let count = line.bytes().filter(|b| *b == candidate).count();
        if count > best.1 {
            best = (candidate, count);
        }
    }
    best.0
}

/// Escribe header + filas separados por coma, citando solo cuando es necesario
pub fn write_table<W: Write>(writer: W, table: &Table) -> io::Result<()> {
    let mut csv_writer = WriterBuilder::new()
        .has_headers(false)
        .quote_style(csv::QuoteStyle::Necessary)
        .from_writer(writer);

    csv_writer.write_record(table.header().iter())?;
    for row in table.rows() {
        csv_writer.write_record(row)?;
    }
    csv_writer.flush()
}

/// Serializa una sola fila CSV en memoria (sin salto de línea previo)
pub fn encode_row<I, S>(cells: I) -> io::Result<Vec<u8>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<[u8]>,
{
    let mut csv_writer = WriterBuilder::new()
        .has_headers(false)
        .quote_style(csv::QuoteStyle::Necessary)
        .from_writer(Vec::new());
    csv_writer.write_record(cells)?;
    csv_writer
        .into_inner()
        .map_err(|err| io::Error::new(io::ErrorKind::Other, err.to_string()))
}

/// Lista los CSV del nivel superior de un directorio (sin subdirectorios ni staging)
pub fn list_csv_files(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let path = entry.path();
        let is_csv = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("csv"))
            .unwrap_or(false);
        if is_csv && !atomic::is_staging_path(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Timestamp compartido por una corrida: `YYYYmmdd_HHMMSS`
pub fn run_timestamp() -> String {
    chrono::Local::now().format("%Y%m%d_%H%M%S").to_string()
}

/// Crea un directorio si no existe
pub fn ensure_directory_exists(path: &Path) -> io::Result<()> {
    fs::create_dir_all(path)
}

/// Valida que un archivo exista
pub fn validate_file_exists(path: &Path) -> io::Result<()> {
    if !path.is_file() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("File not found: {}", path.display()),
        ));
    }
    Ok(())
}

/// Formatea bytes en formato legible (KB, MB, GB)
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}
