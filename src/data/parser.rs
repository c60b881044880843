use crate::data::datetime;
use crate::data::table::Table;

/// Field separators considered during detection, in preference order.
///
/// Semicolon and colon win ties against comma because comma doubles as
/// the decimal separator in several locales.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delimiter {
    Semicolon,
    Colon,
    Comma,
    Tab,
}

impl Delimiter {
    pub const CANDIDATES: [Delimiter; 4] = [
        Delimiter::Semicolon,
        Delimiter::Colon,
        Delimiter::Comma,
        Delimiter::Tab,
    ];

    pub fn as_char(self) -> char {
        match self {
            Delimiter::Semicolon => ';',
            Delimiter::Colon => ':',
            Delimiter::Comma => ',',
            Delimiter::Tab => '\t',
        }
    }

    pub fn as_byte(self) -> u8 {
        self.as_char() as u8
    }

    pub fn label(self) -> &'static str {
        match self {
            Delimiter::Semicolon => "Semicolon",
            Delimiter::Colon => "Colon",
            Delimiter::Comma => "Comma",
            Delimiter::Tab => "Tab",
        }
    }
}

/// What the parser decided while building a [`Table`].
#[derive(Debug, Clone, PartialEq)]
pub struct ParseReport {
    pub delimiter: Delimiter,
    pub header_detected: bool,
    /// Number of cells that could not be read and were replaced by a fallback.
    pub repaired_cells: usize,
}

impl Default for ParseReport {
    fn default() -> Self {
        Self {
            delimiter: Delimiter::Comma,
            header_detected: false,
            repaired_cells: 0,
        }
    }
}

/// Parse delimited text into a [`Table`].
pub fn parse(text: &str) -> Table {
    parse_with_report(text).0
}

/// Parse delimited text, also returning the detection decisions.
pub fn parse_with_report(text: &str) -> (Table, ParseReport) {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let lines: Vec<&str> = text
        .split(['\r', '\n'])
        .filter(|line| !line.trim().is_empty())
        .collect();

    let Some(first_line) = lines.first() else {
        return (Table::empty(), ParseReport::default());
    };

    let delimiter = detect_delimiter(first_line);
    let first_cells = split_line(first_line, delimiter);
    let header_detected = is_header_row(&first_cells);

    let columns: Vec<String> = if header_detected {
        first_cells
            .iter()
            .enumerate()
            .map(|(i, cell)| {
                let name = cell.trim();
                if name.is_empty() {
                    synthetic_column_name(i)
                } else {
                    name.to_string()
                }
            })
            .collect()
    } else {
        (0..first_cells.len())
            .map(|i| if i == 0 { "time".to_string() } else { synthetic_column_name(i) })
            .collect()
    };

    let data_lines = if header_detected { &lines[1..] } else { &lines[..] };
    let mut rows = Vec::with_capacity(data_lines.len());
    let mut repaired_cells = 0usize;

    for (row_index, line) in data_lines.iter().enumerate() {
        let cells = if row_index == 0 && !header_detected {
            first_cells.clone()
        } else {
            split_line(line, delimiter)
        };
        let (row, repaired) = parse_row(&cells, columns.len(), row_index);
        repaired_cells += repaired;
        rows.push(row);
    }

    tracing::debug!(
        "Parsed table: delimiter={}, header={}, columns={}, rows={}, repaired_cells={}",
        delimiter.label(),
        header_detected,
        columns.len(),
        rows.len(),
        repaired_cells
    );

    (
        Table { columns, rows },
        ParseReport { delimiter, header_detected, repaired_cells },
    )
}

/// Pick the candidate that occurs most often in `line`. Ties keep the
/// earlier candidate; no occurrences at all means comma.
pub fn detect_delimiter(line: &str) -> Delimiter {
    let mut best = Delimiter::Comma;
    let mut best_count = 0usize;
    for candidate in Delimiter::CANDIDATES {
        let count = line.chars().filter(|&c| c == candidate.as_char()).count();
        if count > best_count {
            best = candidate;
            best_count = count;
        }
    }
    best
}

/// A line is a header when any of its cells is neither a number nor a timestamp.
pub fn is_header_row(cells: &[String]) -> bool {
    cells.iter().any(|cell| parse_cell(cell).is_none())
}

/// Read one cell as a number, falling back to a timestamp in Unix milliseconds.
///
/// A comma with no dot is taken as a decimal separator (`"1,5"` is 1.5).
/// Returns `None` when neither reading works.
pub fn parse_cell(raw: &str) -> Option<f64> {
    let s = raw.trim();
    parse_number(s).or_else(|| datetime::parse_timestamp(s))
}

fn parse_number(s: &str) -> Option<f64> {
    if s.is_empty() {
        return None;
    }
    let parsed = if s.contains(',') && !s.contains('.') {
        s.replace(',', ".").parse::<f64>()
    } else {
        s.parse::<f64>()
    };
    parsed.ok().filter(|v| v.is_finite())
}

/// Parse one data row to exactly `width` cells. Missing cells are read as
/// empty strings, surplus cells are ignored, and unreadable cells become the
/// row ordinal (column 0) or zero (any other column).
fn parse_row(cells: &[String], width: usize, row_index: usize) -> (Vec<f64>, usize) {
    let mut repaired = 0usize;
    let row = (0..width)
        .map(|col| {
            let raw = cells.get(col).map(String::as_str).unwrap_or("");
            match parse_cell(raw) {
                Some(v) => v,
                None => {
                    repaired += 1;
                    if col == 0 { row_index as f64 } else { 0.0 }
                }
            }
        })
        .collect();
    (row, repaired)
}

fn synthetic_column_name(index: usize) -> String {
    format!("col{}", index + 1)
}

/// Split a single line into cells. Quoted fields may contain the delimiter.
fn split_line(line: &str, delimiter: Delimiter) -> Vec<String> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter.as_byte())
        .has_headers(false)
        .flexible(true)
        .buffer_capacity(line.len().max(64))
        .from_reader(line.as_bytes());

    let mut record = csv::StringRecord::new();
    match reader.read_record(&mut record) {
        Ok(true) => record.iter().map(|s| s.to_string()).collect(),
        Ok(false) => Vec::new(),
        Err(e) => {
            tracing::debug!("Falling back to plain split for malformed line: {e}");
            line.split(delimiter.as_char()).map(|s| s.to_string()).collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comma_decimal_with_semicolon_delimiter() {
        let (table, report) = parse_with_report("a;b\n1,5;2,5");
        assert_eq!(report.delimiter, Delimiter::Semicolon);
        assert!(report.header_detected);
        assert_eq!(table.columns, vec!["a", "b"]);
        assert_eq!(table.rows, vec![vec![1.5, 2.5]]);
    }

    #[test]
    fn numeric_first_line_is_data() {
        let table = parse("1,2\n3,4");
        assert_eq!(table.columns, vec!["time", "col2"]);
        assert_eq!(table.rows, vec![vec![1.0, 2.0], vec![3.0, 4.0]]);
    }

    #[test]
    fn empty_input_yields_default_columns() {
        assert_eq!(parse(""), Table::empty());
        assert_eq!(parse("\n\r\n   \n"), Table::empty());
        assert_eq!(Table::empty().columns, vec!["time", "value"]);
    }

    #[test]
    fn strips_bom_and_blank_lines() {
        let table = parse("\u{feff}t,v\r\n\r\n0,1\r\n\n1,2\n");
        assert_eq!(table.columns, vec!["t", "v"]);
        assert_eq!(table.rows.len(), 2);
    }

    #[test]
    fn row_count_matches_non_blank_lines() {
        let text = "x,y\n1,2\n\nbad,also bad\n3\n4,5,6\n";
        let table = parse(text);
        // 5 non-blank lines, one of them the header.
        assert_eq!(table.rows.len(), 4);
        assert!(table.rows.iter().all(|r| r.len() == 2));
    }

    #[test]
    fn malformed_cells_are_repaired_in_place() {
        let (table, report) = parse_with_report("x,y\n1,2\nbad,worse\n3,\n");
        assert_eq!(table.rows[1], vec![1.0, 0.0]);
        assert_eq!(table.rows[2], vec![3.0, 0.0]);
        assert_eq!(report.repaired_cells, 3);
    }

    #[test]
    fn short_rows_are_padded() {
        let table = parse("a,b,c\n1\n");
        assert_eq!(table.rows, vec![vec![1.0, 0.0, 0.0]]);
    }

    #[test]
    fn blank_header_cells_get_synthetic_names() {
        let table = parse("time,,value\n1,2,3");
        assert_eq!(table.columns, vec!["time", "col2", "value"]);
    }

    #[test]
    fn iso_timestamps_become_millis() {
        let table = parse("time,value\n2024-01-01T00:00:00Z,1\n2024-01-01T00:00:01Z,2");
        assert_eq!(table.rows[0][0], 1_704_067_200_000.0);
        assert_eq!(table.rows[1][0], 1_704_067_201_000.0);
    }

    #[test]
    fn tab_delimited_input() {
        let (table, report) = parse_with_report("a\tb\n1\t2");
        assert_eq!(report.delimiter, Delimiter::Tab);
        assert_eq!(table.rows, vec![vec![1.0, 2.0]]);
    }

    #[test]
    fn delimiter_tie_prefers_semicolon() {
        assert_eq!(detect_delimiter("a;b,c"), Delimiter::Semicolon);
        assert_eq!(detect_delimiter("abc"), Delimiter::Comma);
        assert_eq!(detect_delimiter("a,b,c;d"), Delimiter::Comma);
    }

    #[test]
    fn quoted_fields_keep_delimiters() {
        let table = parse("\"name, with comma\",v\n1,2");
        assert_eq!(table.columns, vec!["name, with comma", "v"]);
    }

    #[test]
    fn parsing_is_deterministic() {
        let text = "when;temp\n2024-03-01T10:00:00;21,5\nnope;22\n";
        assert_eq!(parse(text), parse(text));
    }

    #[test]
    fn non_finite_literals_are_not_numbers() {
        assert_eq!(parse_cell("NaN"), None);
        assert_eq!(parse_cell("inf"), None);
        assert_eq!(parse_cell(" 2,25 "), Some(2.25));
        assert_eq!(parse_cell("1,234.5"), None);
    }
}
