pub mod calculator;
pub mod opportunities;
pub mod summary;

pub use calculator::{
    estimated_quarterly_payment, self_employment_tax, SelfEmploymentTax, TaxCalculator, TaxError,
    TaxParameters,
};
pub use opportunities::{find_opportunities, DeductionOpportunity};
pub use summary::{
    quarterly_schedule, schedule_c_line_label, BusinessProfile, BusinessType, QuarterlyPayment,
    ScheduleCLine, TaxSummary, OTHER_EXPENSES_LINE,
};
