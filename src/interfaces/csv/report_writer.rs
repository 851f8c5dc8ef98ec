use crate::application::engine::EvaluationReport;
use crate::domain::contract::{
    Category, Contract, ContractId, ContractStatus, DisplayStatus, PaymentStatus, PenaltyState,
    UserId,
};
use crate::error::Result;
use serde::Serialize;
use std::io::Write;

#[derive(Debug, Serialize)]
struct ReportRow<'a> {
    user: UserId,
    contract: ContractId,
    category: Category,
    spent: Option<String>,
    limit: String,
    percentage: Option<String>,
    days_remaining: Option<i64>,
    status: ContractStatus,
    display: Option<DisplayStatus>,
    payment_status: PaymentStatus,
    penalty: PenaltyState,
    charge_reference: Option<&'a str>,
    evaluated: bool,
}

impl<'a> ReportRow<'a> {
    fn unevaluated(contract: &'a Contract) -> Self {
        Self {
            user: contract.user_id,
            contract: contract.id,
            category: contract.category,
            spent: None,
            limit: format!("{:.2}", contract.spending_limit.value()),
            percentage: None,
            days_remaining: None,
            status: contract.status,
            display: None,
            payment_status: contract.payment_status,
            penalty: contract.penalty_state(),
            charge_reference: contract.charge_reference.as_deref(),
            evaluated: false,
        }
    }
}

/// Writes one CSV row per contract of an evaluation.
pub struct ReportWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> ReportWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_report(&mut self, report: &EvaluationReport) -> Result<()> {
        for evaluation in &report.evaluations {
            let contract = &evaluation.contract;
            let progress = &evaluation.progress;
            self.writer.serialize(ReportRow {
                spent: Some(format!("{:.2}", progress.spent)),
                percentage: Some(format!("{:.1}", progress.percentage)),
                days_remaining: Some(progress.days_remaining),
                display: Some(progress.display),
                evaluated: true,
                ..ReportRow::unevaluated(contract)
            })?;
        }
        Ok(())
    }

    /// Rows for contracts whose evaluation could not run.
    pub fn write_unevaluated<'a>(
        &mut self,
        contracts: impl IntoIterator<Item = &'a Contract>,
    ) -> Result<()> {
        for contract in contracts {
            self.writer.serialize(ReportRow::unevaluated(contract))?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}
