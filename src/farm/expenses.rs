use std::path::PathBuf;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::JsonFile;
use crate::error::Result;

const ISO_FORMAT: &str = "%Y-%m-%d";
const DISPLAY_FORMAT: &str = "%d %b %Y";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expense {
    pub title: String,
    pub amount: f64,
    #[serde(rename = "type")]
    pub kind: String,
    pub date: String,
    /// ISO date used for ordering; `None` when `date` could not be parsed.
    #[serde(default)]
    pub ts: Option<String>,
}

impl Expense {
    pub fn is_income(&self) -> bool {
        self.kind == "income"
    }

    fn sort_key(&self) -> String {
        self.ts
            .clone()
            .or_else(|| parse_date(&self.date).map(|d| d.format(ISO_FORMAT).to_string()))
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FinanceSummary {
    pub total_income: f64,
    pub total_expense: f64,
    pub profit: f64,
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, ISO_FORMAT)
        .or_else(|_| NaiveDate::parse_from_str(raw, DISPLAY_FORMAT))
        .ok()
}

pub struct ExpenseLedger {
    file: JsonFile<Vec<Expense>>,
}

impl ExpenseLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            file: JsonFile::new(path),
        }
    }

    /// `date` may be `YYYY-MM-DD` or `DD Mon YYYY`; anything else is kept
    /// verbatim without a sort timestamp.
    pub async fn add(&self, title: &str, amount: f64, kind: &str, date: &str) -> Result<Expense> {
        let _guard = self.file.lock().await;
        let mut expenses = self.file.load().await;

        let parsed = parse_date(date);
        let transaction = Expense {
            title: title.to_string(),
            amount,
            kind: kind.to_string(),
            date: parsed
                .map(|d| d.format(DISPLAY_FORMAT).to_string())
                .unwrap_or_else(|| date.to_string()),
            ts: parsed.map(|d| d.format(ISO_FORMAT).to_string()),
        };
        expenses.push(transaction.clone());
        self.file.save(&expenses).await?;

        info!("Recorded {} of {} ({})", kind, amount, title);
        Ok(transaction)
    }

    /// Latest first.
    pub async fn list(&self) -> Vec<Expense> {
        let mut expenses = self.file.load().await;
        expenses.sort_by_key(|e| std::cmp::Reverse(e.sort_key()));
        expenses
    }

    pub async fn summary(&self) -> FinanceSummary {
        let (total_income, total_expense) = self
            .file
            .load()
            .await
            .iter()
            .fold((0.0, 0.0), |(income, expense), e| {
                if e.is_income() {
                    (income + e.amount, expense)
                } else {
                    (income, expense + e.amount)
                }
            });

        FinanceSummary {
            total_income,
            total_expense,
            profit: total_income - total_expense,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn iso_dates_are_stored_for_display_and_sorting() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = ExpenseLedger::new(dir.path().join("expenses.json"));

        let e = ledger.add("Seeds", 1200.0, "expense", "2025-06-03").await.unwrap();
        assert_eq!(e.date, "03 Jun 2025");
        assert_eq!(e.ts.as_deref(), Some("2025-06-03"));
    }

    #[tokio::test]
    async fn unparseable_date_is_kept_without_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = ExpenseLedger::new(dir.path().join("expenses.json"));

        let e = ledger.add("Labour", 500.0, "expense", "last monday").await.unwrap();
        assert_eq!(e.date, "last monday");
        assert_eq!(e.ts, None);
    }

    #[tokio::test]
    async fn list_is_latest_first() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = ExpenseLedger::new(dir.path().join("expenses.json"));
        ledger.add("Urea", 800.0, "expense", "2025-01-10").await.unwrap();
        ledger.add("Tomato sale", 9000.0, "income", "12 Mar 2025").await.unwrap();
        ledger.add("Diesel", 300.0, "expense", "sometime").await.unwrap();

        let titles: Vec<String> = ledger.list().await.into_iter().map(|e| e.title).collect();
        assert_eq!(titles, vec!["Tomato sale", "Urea", "Diesel"]);
    }

    #[tokio::test]
    async fn summary_treats_non_income_as_expense() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = ExpenseLedger::new(dir.path().join("expenses.json"));
        ledger.add("Harvest", 10000.0, "income", "2025-04-01").await.unwrap();
        ledger.add("Pesticide", 1500.0, "expense", "2025-04-02").await.unwrap();
        ledger.add("Tractor rent", 2500.0, "rent", "2025-04-03").await.unwrap();

        let summary = ledger.summary().await;
        assert_eq!(summary.total_income, 10000.0);
        assert_eq!(summary.total_expense, 4000.0);
        assert_eq!(summary.profit, 6000.0);
    }
}
