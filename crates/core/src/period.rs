use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaxYear(pub i32);

impl fmt::Display for TaxYear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TY{}", self.0)
    }
}

impl TaxYear {
    pub fn new(year: i32) -> Self {
        TaxYear(year)
    }

    pub fn year(self) -> i32 {
        self.0
    }

    pub fn start_date(self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.0, 1, 1)
    }

    /// December 31 of this tax year (inclusive end).
    pub fn end_date(self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.0, 12, 31)
    }

    pub fn contains(self, date: NaiveDate) -> bool {
        match (self.start_date(), self.end_date()) {
            (Some(start), Some(end)) => start <= date && date <= end,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Quarter {
    Q1,
    Q2,
    Q3,
    Q4,
}

impl fmt::Display for Quarter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Quarter::Q1 => write!(f, "Q1"),
            Quarter::Q2 => write!(f, "Q2"),
            Quarter::Q3 => write!(f, "Q3"),
            Quarter::Q4 => write!(f, "Q4"),
        }
    }
}

impl Quarter {
    pub const ALL: [Quarter; 4] = [Quarter::Q1, Quarter::Q2, Quarter::Q3, Quarter::Q4];

    /// Due date of the estimated-tax payment covering this quarter's income.
    /// The payment periods are uneven: Q2 is two months, Q4 is due in January
    /// of the following year.
    pub fn estimated_payment_due(self, year: TaxYear) -> Option<NaiveDate> {
        let y = year.year();
        match self {
            Quarter::Q1 => NaiveDate::from_ymd_opt(y, 4, 15),
            Quarter::Q2 => NaiveDate::from_ymd_opt(y, 6, 15),
            Quarter::Q3 => NaiveDate::from_ymd_opt(y, 9, 15),
            Quarter::Q4 => NaiveDate::from_ymd_opt(y + 1, 1, 15),
        }
    }
}
