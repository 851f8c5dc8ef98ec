use crate::domain::organization::Organization;
use crate::error::{PactError, Result};
use std::io::Read;

/// Reads the organization directory seed.
///
/// Header: `id,name,description,category,payout_destination`.
pub struct OrganizationReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> OrganizationReader<R> {
    pub fn new(source: R) -> Self {
        Self {
            reader: super::reader(source),
        }
    }

    pub fn organizations(self) -> impl Iterator<Item = Result<Organization>> {
        self.reader
            .into_deserialize::<Organization>()
            .map(|result| result.map_err(PactError::from))
    }
}
