//! Sample input covering every path through the stages.

use std::path::Path;

/// A small order export: clean rows, a duplicate id, missing fields,
/// lower-case and non-EU countries, and an unparseable amount.
pub const SAMPLE_CSV: &str = "\
OrderID,CustomerName,Amount,Email,Country
1001,Anna Schmidt,250,anna@example.de,de
1002,Jean Dupont,120.50,,FR
1003,,80,ghost@example.com,IT
1004,Marco Rossi,,marco@example.it,IT
1005,Lucia Garcia,310,lucia@example.es,es
1006,John Smith,99,john@example.com,US
1002,Jean Dupont,120.50,jean@example.fr,FR
1007,Eva de Vries,twelve,eva@example.nl,NL
1008,Piet Jansen,205.10,piet@example.nl,nl
";

/// Write [`SAMPLE_CSV`] to `path`, replacing any existing file.
pub fn write_sample(path: &Path) -> std::io::Result<()> {
    std::fs::write(path, SAMPLE_CSV)
}
