use std::io;

use crate::core::LedgerRow;

/// Writes the ledger as CSV: a camelCase header, then one rounded row per
/// simulated month.
pub fn write_ledger_csv<W: io::Write>(rows: &[LedgerRow], writer: W) -> Result<(), csv::Error> {
    let mut wtr = csv::Writer::from_writer(writer);
    for row in rows {
        wtr.serialize(row.rounded())?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn ledger_csv_string(rows: &[LedgerRow]) -> Result<String, csv::Error> {
    let mut buf = Vec::new();
    write_ledger_csv(rows, &mut buf)?;
    String::from_utf8(buf)
        .map_err(|e| csv::Error::from(io::Error::new(io::ErrorKind::InvalidData, e)))
}
