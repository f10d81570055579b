//! Splits a dashboard insight paragraph into summary, risk and weather
//! panels by keyword matching.
//!
//! This is a display heuristic: a line lands in every bucket whose keyword
//! it contains, so "low-risk weather window" shows up as both a risk and a
//! weather suggestion.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

const SUMMARY_MARKER: &str = "Summary:";

static SUMMARY_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^Summary:\s*").expect("Failed to compile summary prefix")
});

static RISK_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:\w+\s+)?risks?\s*:\s*").expect("Failed to compile risk prefix")
});

static SUGGESTION_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:\w+\s+)?suggest(?:ion)?s?\s*:\s*").expect("Failed to compile suggestion prefix")
});

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub summary_line: Option<String>,
    pub risk_lines: Vec<String>,
    pub weather_lines: Vec<String>,
}

impl Classification {
    /// True when nothing matched; the raw text must be shown instead.
    pub fn is_empty(&self) -> bool {
        self.summary_line.is_none() && self.risk_lines.is_empty() && self.weather_lines.is_empty()
    }
}

pub fn classify(text: Option<&str>) -> Classification {
    let lines: Vec<&str> = text
        .unwrap_or_default()
        .split('\n')
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();

    let summary_line = lines
        .iter()
        .find(|line| line.contains(SUMMARY_MARKER) || !line.contains(':'))
        .map(|line| strip(&SUMMARY_PREFIX, line));

    let risk_lines = lines
        .iter()
        .filter(|line| line.to_lowercase().contains("risk"))
        .map(|line| strip(&RISK_PREFIX, line))
        .collect();

    let weather_lines = lines
        .iter()
        .filter(|line| {
            let lower = line.to_lowercase();
            lower.contains("weather") || lower.contains("suggest")
        })
        .map(|line| strip(&SUGGESTION_PREFIX, line))
        .collect();

    Classification {
        summary_line,
        risk_lines,
        weather_lines,
    }
}

fn strip(prefix: &Regex, line: &str) -> String {
    let shown = prefix.replace(line, "");
    let shown = shown.trim();
    if shown.is_empty() {
        line.to_string()
    } else {
        shown.to_string()
    }
}

/// What the dashboard should render for an insight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "content", rename_all = "snake_case")]
pub enum InsightView {
    Panels(Classification),
    Raw(String),
}

impl InsightView {
    pub fn from_text(text: Option<&str>) -> Self {
        let classification = classify(text);
        if classification.is_empty() {
            InsightView::Raw(text.unwrap_or_default().to_string())
        } else {
            InsightView::Panels(classification)
        }
    }
}
