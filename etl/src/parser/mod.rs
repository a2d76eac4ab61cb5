//! CSV reading with encoding and delimiter auto-detection.
//!
//! [`parse_bytes`] turns raw file content into a [`ParseResult`] of trimmed
//! text cells. [`to_raw_orders`] then maps the order columns by name and
//! produces the [`RawOrder`]s the transformation stages work on.

use serde_json::{Map, Value};
use std::path::Path;

use crate::config::EtlConfig;
use crate::error::{CsvError, CsvResult};
use crate::models::{
    RawOrder, COL_AMOUNT, COL_COUNTRY, COL_CUSTOMER_NAME, COL_EMAIL, COL_ORDER_ID,
};

/// One data row with its source line.
#[derive(Debug, Clone, PartialEq)]
pub struct CsvRow {
    /// 1-based line number in the decoded content
    pub line: usize,
    /// Trimmed cell values, one per header
    pub values: Vec<String>,
}

/// Result of parsing with metadata
#[derive(Debug, Clone)]
pub struct ParseResult {
    /// Data rows
    pub rows: Vec<CsvRow>,
    /// Detected encoding
    pub encoding: String,
    /// Detected or used delimiter
    pub delimiter: char,
    /// Column headers
    pub headers: Vec<String>,
}

impl ParseResult {
    /// First `limit` rows as JSON objects keyed by header.
    pub fn records_as_json(&self, limit: usize) -> Vec<Value> {
        self.rows
            .iter()
            .take(limit)
            .map(|row| {
                let obj: Map<String, Value> = self
                    .headers
                    .iter()
                    .zip(row.values.iter())
                    .map(|(h, v)| (h.clone(), Value::String(v.clone())))
                    .collect();
                Value::Object(obj)
            })
            .collect()
    }
}

/// Detect the encoding of raw bytes.
///
/// Valid UTF-8 is always read as UTF-8. Otherwise chardet picks between
/// ISO-8859-1 and Windows-1252; any other guess falls back to Windows-1252.
pub fn detect_encoding(bytes: &[u8]) -> String {
    if std::str::from_utf8(bytes).is_ok() {
        return "utf-8".to_string();
    }

    let result = chardet::detect(bytes);
    let charset = result.0;

    match charset.to_lowercase().as_str() {
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        _ => "windows-1252".to_string(),
    }
}

/// Decode bytes to string using the specified encoding
///
/// Bytes that are not valid UTF-8 despite detection are read as Windows-1252,
/// which accepts every byte. ISO-8859-1 is read as Windows-1252 too: the two
/// agree on 0xA0-0xFF, while ISO-8859-15 does not (`0xA4` is `¤`, not `€`).
pub fn decode_content(bytes: &[u8], encoding: &str) -> String {
    let decoded = match encoding.to_lowercase().as_str() {
        "utf-8" | "utf8" | "ascii" => match std::str::from_utf8(bytes) {
            Ok(s) => s.to_string(),
            Err(_) => encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned(),
        },
        "iso-8859-1" | "latin-1" | "latin1" | "windows-1252" | "cp1252" => {
            encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned()
        }
        _ => String::from_utf8_lossy(bytes).into_owned(),
    };

    match decoded.strip_prefix('\u{feff}') {
        Some(rest) => rest.to_string(),
        None => decoded,
    }
}

/// Detect the delimiter by counting occurrences in the first line
pub fn detect_delimiter(content: &str) -> char {
    let first_line = content.lines().next().unwrap_or("");

    let separators = [',', ';', '\t', '|'];
    let mut best_sep = ',';
    let mut best_count = 0;

    for &sep in &separators {
        let count = first_line.matches(sep).count();
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }

    best_sep
}

/// Parse decoded CSV content with an explicit delimiter.
///
/// Short rows are padded with empty cells and extra cells are ignored.
/// Rows made only of blank cells are skipped.
pub fn parse_str(content: &str, delimiter: char, encoding: String) -> CsvResult<ParseResult> {
    if content.trim().is_empty() {
        return Err(CsvError::EmptyFile);
    }
    let delimiter_byte = u8::try_from(delimiter).map_err(|_| CsvError::Parse {
        line: 1,
        message: format!("delimiter '{}' is not a single-byte character", delimiter),
    })?;

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter_byte)
        .flexible(true)
        .has_headers(true)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    if headers.iter().all(|h| h.is_empty()) {
        return Err(CsvError::NoHeaders);
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let line = record
            .position()
            .map(|p| p.line() as usize)
            .unwrap_or(rows.len() + 2);

        if record.iter().all(|v| v.trim().is_empty()) {
            continue;
        }

        let values = (0..headers.len())
            .map(|i| record.get(i).map(|v| v.trim().to_string()).unwrap_or_default())
            .collect();

        rows.push(CsvRow { line, values });
    }

    Ok(ParseResult {
        rows,
        encoding,
        delimiter,
        headers,
    })
}

/// Parse CSV bytes, detecting the encoding and, unless given, the delimiter.
pub fn parse_bytes(bytes: &[u8], delimiter: Option<char>) -> CsvResult<ParseResult> {
    if bytes.is_empty() {
        return Err(CsvError::EmptyFile);
    }
    let encoding = detect_encoding(bytes);
    let content = decode_content(bytes, &encoding);
    let delimiter = delimiter.unwrap_or_else(|| detect_delimiter(&content));
    parse_str(&content, delimiter, encoding)
}

/// Parse a CSV file, detecting the encoding and, unless given, the delimiter.
pub fn parse_file(path: &Path, delimiter: Option<char>) -> CsvResult<ParseResult> {
    let bytes = std::fs::read(path)?;
    parse_bytes(&bytes, delimiter)
}

/// Positions of the columns the transformer reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnMap {
    pub order_id: usize,
    pub customer_name: usize,
    pub amount: usize,
    pub email: usize,
    pub country: usize,
}

impl ColumnMap {
    /// Find every required column in `headers`.
    pub fn resolve(headers: &[String]) -> CsvResult<Self> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| CsvError::MissingColumn(name.to_string()))
        };
        Ok(Self {
            order_id: find(COL_ORDER_ID)?,
            customer_name: find(COL_CUSTOMER_NAME)?,
            amount: find(COL_AMOUNT)?,
            email: find(COL_EMAIL)?,
            country: find(COL_COUNTRY)?,
        })
    }

    /// Whether `index` is one of the required columns.
    pub fn is_required(&self, index: usize) -> bool {
        [
            self.order_id,
            self.customer_name,
            self.amount,
            self.email,
            self.country,
        ]
        .contains(&index)
    }
}

/// Map parsed rows to [`RawOrder`]s.
///
/// Cells matching one of the configured null tokens become `None`.
pub fn to_raw_orders(parsed: &ParseResult, config: &EtlConfig) -> CsvResult<Vec<RawOrder>> {
    let columns = ColumnMap::resolve(&parsed.headers)?;

    let cell = |row: &CsvRow, index: usize| -> Option<String> {
        row.values
            .get(index)
            .filter(|v| !config.is_na(v))
            .cloned()
    };

    let orders = parsed
        .rows
        .iter()
        .map(|row| RawOrder {
            line: row.line,
            order_id: cell(row, columns.order_id),
            customer_name: cell(row, columns.customer_name),
            amount: cell(row, columns.amount),
            email: cell(row, columns.email),
            country: cell(row, columns.country),
            extra: row
                .values
                .iter()
                .enumerate()
                .filter(|(i, _)| !columns.is_required(*i))
                .map(|(_, v)| v.clone())
                .collect(),
        })
        .collect();

    Ok(orders)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(csv: &str, delimiter: char) -> ParseResult {
        parse_str(csv, delimiter, "utf-8".to_string()).unwrap()
    }

    #[test]
    fn test_simple_csv() {
        let result = parse("name;age\nAlice;30\nBob;25", ';');

        assert_eq!(result.headers, vec!["name", "age"]);
        assert_eq!(result.rows.len(), 2);
        assert_eq!(result.rows[0].values, vec!["Alice", "30"]);
        assert_eq!(result.rows[1].values, vec!["Bob", "25"]);
    }

    #[test]
    fn test_line_numbers() {
        let result = parse("a,b\n1,2\n3,4\n", ',');
        assert_eq!(result.rows[0].line, 2);
        assert_eq!(result.rows[1].line, 3);
    }

    #[test]
    fn test_empty_lines_skipped() {
        let result = parse("a;b\n1;2\n\n3;4\n ; \n", ';');
        assert_eq!(result.rows.len(), 2);
    }

    #[test]
    fn test_quoted_values_with_delimiter() {
        let csv = "name,note\n\"Doe, Jane\",\"said \"\"hi\"\"\"";
        let result = parse(csv, ',');

        assert_eq!(result.rows[0].values[0], "Doe, Jane");
        assert_eq!(result.rows[0].values[1], "said \"hi\"");
    }

    #[test]
    fn test_missing_values_padded() {
        let result = parse("a;b;c\n1;;3\n4", ';');

        assert_eq!(result.rows[0].values, vec!["1", "", "3"]);
        assert_eq!(result.rows[1].values, vec!["4", "", ""]);
    }

    #[test]
    fn test_extra_columns_ignored() {
        let result = parse("a;b\n1;2;3;4", ';');
        assert_eq!(result.rows[0].values, vec!["1", "2"]);
    }

    #[test]
    fn test_values_trimmed() {
        let result = parse("a , b\n  x , y ", ',');
        assert_eq!(result.headers, vec!["a", "b"]);
        assert_eq!(result.rows[0].values, vec!["x", "y"]);
    }

    #[test]
    fn test_empty_csv_error() {
        assert!(matches!(parse_bytes(b"", None), Err(CsvError::EmptyFile)));
        assert!(matches!(
            parse_str("  \n", ',', "utf-8".into()),
            Err(CsvError::EmptyFile)
        ));
    }

    #[test]
    fn test_detect_delimiter() {
        assert_eq!(detect_delimiter("a;b;c\n1;2;3"), ';');
        assert_eq!(detect_delimiter("a,b,c\n1,2,3"), ',');
        assert_eq!(detect_delimiter("a\tb\tc\n1\t2\t3"), '\t');
        assert_eq!(detect_delimiter("a|b|c\n1|2|3"), '|');
        assert_eq!(detect_delimiter("single"), ',');
    }

    #[test]
    fn test_auto_parse() {
        let result = parse_bytes(b"name;age\nAlice;30\nBob;25", None).unwrap();

        assert_eq!(result.delimiter, ';');
        assert_eq!(result.encoding, "utf-8");
        assert_eq!(result.rows.len(), 2);
        assert_eq!(result.headers, vec!["name", "age"]);
    }

    #[test]
    fn test_bom_stripped() {
        let result = parse_bytes("\u{feff}OrderID,Amount\n1,5".as_bytes(), None).unwrap();
        assert_eq!(result.headers[0], "OrderID");
    }

    #[test]
    fn test_latin1_decoding() {
        // "Société" in ISO-8859-1
        let bytes: &[u8] = &[0x53, 0x6F, 0x63, 0x69, 0xE9, 0x74, 0xE9];
        let decoded = decode_content(bytes, "iso-8859-1");
        assert_eq!(decoded, "Société");
    }

    #[test]
    fn test_latin1_symbols_not_read_as_latin9() {
        let decoded = decode_content(b"\xA4\xBD\xBC\xA6", "iso-8859-1");
        assert_eq!(decoded, "¤½¼¦");
    }

    #[test]
    fn test_detect_encoding() {
        assert_eq!(detect_encoding("Société".as_bytes()), "utf-8");
        let latin: &[u8] = b"Soci\xE9t\xE9 G\xE9n\xE9rale, caf\xE9 cr\xE8me";
        let detected = detect_encoding(latin);
        assert!(detected == "iso-8859-1" || detected == "windows-1252");
    }

    #[test]
    fn test_invalid_utf8_falls_back() {
        let bytes: &[u8] = &[b'M', 0xFC, b'l', b'l', b'e', b'r'];
        assert_eq!(decode_content(bytes, "utf-8"), "Müller");
    }

    #[test]
    fn test_records_as_json() {
        let result = parse("OrderID,Country\n1,de\n2,fr", ',');
        let json = result.records_as_json(1);

        assert_eq!(json.len(), 1);
        assert_eq!(json[0]["OrderID"], "1");
        assert_eq!(json[0]["Country"], "de");
    }

    #[test]
    fn test_to_raw_orders() {
        let csv = "Notes,OrderID,CustomerName,Amount,Email,Country\n\
                   vip,1,Anna,250,,de\n\
                   ,2,NA,50,b@x.eu,FR";
        let result = parse(csv, ',');
        let orders = to_raw_orders(&result, &EtlConfig::default()).unwrap();

        assert_eq!(orders.len(), 2);
        assert_eq!(orders[0].line, 2);
        assert_eq!(orders[0].order_id.as_deref(), Some("1"));
        assert_eq!(orders[0].customer_name.as_deref(), Some("Anna"));
        assert_eq!(orders[0].amount.as_deref(), Some("250"));
        assert_eq!(orders[0].email, None);
        assert_eq!(orders[0].country.as_deref(), Some("de"));
        assert_eq!(orders[0].extra, vec!["vip"]);

        assert_eq!(orders[1].customer_name, None);
        assert_eq!(orders[1].extra, vec![""]);
    }

    #[test]
    fn test_missing_required_column() {
        let result = parse("OrderID,CustomerName,Amount,Email\n1,A,5,a@b.c", ',');
        let err = to_raw_orders(&result, &EtlConfig::default()).unwrap_err();
        assert!(matches!(err, CsvError::MissingColumn(ref c) if c == "Country"));
    }
}
