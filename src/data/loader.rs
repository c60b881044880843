use std::path::Path;

use crate::data::parser::{self, ParseReport};
use crate::data::table::Table;

/// Extensions accepted by the file dialog and drag-and-drop.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["csv", "tsv", "txt", "dat"];

/// Result of loading a data file.
pub struct LoadedData {
    /// Stable identifier used to key labels for this file.
    pub dataset_id: String,
    pub display_name: String,
    pub table: Table,
    pub report: ParseReport,
}

pub fn is_supported(path: &Path) -> bool {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();
    SUPPORTED_EXTENSIONS.contains(&ext.as_str())
}

/// Read a delimited text file and parse it into a [`Table`].
pub fn load_file(path: &Path) -> Result<LoadedData, String> {
    if !is_supported(path) {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        return Err(format!("Unsupported file format: .{ext}"));
    }

    let content = std::fs::read(path).map_err(|e| format!("Cannot read file: {e}"))?;
    let text = decode_text(content);
    let (table, report) = parser::parse_with_report(&text);

    let display_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("data")
        .to_string();
    let dataset_id = std::fs::canonicalize(path)
        .unwrap_or_else(|_| path.to_path_buf())
        .display()
        .to_string();

    tracing::info!(
        "Loaded {:?}: {} columns, {} rows",
        path,
        table.column_count(),
        table.row_count()
    );

    Ok(LoadedData { dataset_id, display_name, table, report })
}

/// Decode as UTF-8, falling back to Latin-1 (each byte maps to the same code point).
pub fn decode_text(content: Vec<u8>) -> String {
    match String::from_utf8(content) {
        Ok(text) => text,
        Err(e) => e.into_bytes().iter().map(|&b| b as char).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latin1_fallback_keeps_every_byte() {
        let bytes = vec![b'T', 0xE9, b'm', b'p'];
        assert_eq!(decode_text(bytes), "T\u{e9}mp");
    }

    #[test]
    fn rejects_unsupported_extension() {
        let err = load_file(Path::new("sheet.xlsx")).err().unwrap();
        assert!(err.contains(".xlsx"));
    }

    #[test]
    fn loads_csv_from_disk() {
        let dir = std::env::temp_dir().join(format!("oxidelabel-loader-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("series.csv");
        std::fs::write(&path, "time;value\n0;1,5\n1;2,5\n").unwrap();

        let loaded = load_file(&path).unwrap();
        assert_eq!(loaded.display_name, "series.csv");
        assert_eq!(loaded.table.rows, vec![vec![0.0, 1.5], vec![1.0, 2.5]]);
        assert!(loaded.report.header_detected);

        std::fs::remove_dir_all(&dir).ok();
    }
}
