use anyhow::{bail, Context, Result};
use std::path::Path;
use tracing::info;

/// Read closing prices from a CSV file with a header row.
///
/// Uses the `close` column (case-insensitive) when present, otherwise the
/// file must have exactly one column. Rows are kept in file order, oldest first.
pub fn read_closing_prices(path: impl AsRef<Path>) -> Result<Vec<f64>> {
    let path = path.as_ref();
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("failed to open {}", path.display()))?;

    let headers = reader.headers()?.clone();
    let column = match headers.iter().position(|h| h.trim().eq_ignore_ascii_case("close")) {
        Some(idx) => idx,
        None if headers.len() == 1 => 0,
        None => bail!(
            "{} has no `close` column (headers: {:?})",
            path.display(),
            headers.iter().collect::<Vec<_>>()
        ),
    };

    let mut prices = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = record?;
        let raw = record
            .get(column)
            .with_context(|| format!("row {} is missing the close column", row + 1))?;
        let price: f64 = raw
            .trim()
            .parse()
            .with_context(|| format!("row {}: invalid price {:?}", row + 1, raw))?;
        prices.push(price);
    }

    info!(path = %path.display(), rows = prices.len(), "Loaded closing prices");
    Ok(prices)
}
