mod finding;
mod observation;
mod report;
mod risk;

pub use finding::{Finding, Reason};
pub use observation::Observation;
pub use report::{CategoryCount, Report, ReportResults, ReportSummary};
pub use risk::{MAX_RISK, WeightTable, risk_score};
