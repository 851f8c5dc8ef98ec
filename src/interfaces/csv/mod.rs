//! CSV adapters: input readers for contracts, organizations and transactions,
//! and the evaluation report writer.

pub mod contract_reader;
pub mod organization_reader;
pub mod report_writer;
pub mod transaction_reader;

use std::io::Read;

/// Reader shared by every CSV input: trims whitespace and tolerates missing
/// trailing columns.
fn reader<R: Read>(source: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(source)
}
