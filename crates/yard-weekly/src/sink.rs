//! 結果彙總輸出

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use yard_core::{LoadReport, Period};
use yard_model::{CraneShiftSummary, YardReport};
use yard_optimizer::Diagnosis;

/// 診斷來源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "stage", content = "shift", rename_all = "snake_case")]
pub enum DiagnosticScope {
    Yard,
    CraneShift(Period),
}

/// 結果接收端
pub trait ResultSink {
    fn record_load_report(&mut self, week: NaiveDate, report: &LoadReport);

    fn record_yard(&mut self, report: &YardReport);

    fn record_crane_shift(&mut self, summary: &CraneShiftSummary);

    fn record_diagnosis(&mut self, week: NaiveDate, scope: DiagnosticScope, diagnosis: &Diagnosis);
}

/// 記憶體結果接收端
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemorySink {
    pub load_reports: BTreeMap<NaiveDate, LoadReport>,
    pub yard_reports: BTreeMap<NaiveDate, YardReport>,
    pub crane_shifts: Vec<CraneShiftSummary>,
    pub diagnoses: Vec<(NaiveDate, DiagnosticScope, Diagnosis)>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn yard_report(&self, week: NaiveDate) -> Option<&YardReport> {
        self.yard_reports.get(&week)
    }

    pub fn crane_shifts_of(&self, week: NaiveDate) -> impl Iterator<Item = &CraneShiftSummary> {
        self.crane_shifts.iter().filter(move |s| s.week == week)
    }

    pub fn diagnoses_of(
        &self,
        week: NaiveDate,
    ) -> impl Iterator<Item = (DiagnosticScope, &Diagnosis)> {
        self.diagnoses
            .iter()
            .filter(move |(w, _, _)| *w == week)
            .map(|(_, scope, d)| (*scope, d))
    }
}

impl ResultSink for MemorySink {
    fn record_load_report(&mut self, week: NaiveDate, report: &LoadReport) {
        self.load_reports.insert(week, report.clone());
    }

    fn record_yard(&mut self, report: &YardReport) {
        self.yard_reports.insert(report.summary.week, report.clone());
    }

    fn record_crane_shift(&mut self, summary: &CraneShiftSummary) {
        self.crane_shifts.push(summary.clone());
    }

    fn record_diagnosis(&mut self, week: NaiveDate, scope: DiagnosticScope, diagnosis: &Diagnosis) {
        self.diagnoses.push((week, scope, diagnosis.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_sink_filters_by_week() {
        let w1 = NaiveDate::from_ymd_opt(2022, 1, 3).unwrap();
        let w2 = NaiveDate::from_ymd_opt(2022, 1, 10).unwrap();
        let mut sink = MemorySink::new();

        let diagnosis = Diagnosis {
            constraints: vec!["demand_load[s1,t1]".to_string()],
            families: vec!["demand_load".to_string()],
            minimal: true,
            probes: 3,
        };
        sink.record_diagnosis(w1, DiagnosticScope::Yard, &diagnosis);
        sink.record_diagnosis(w2, DiagnosticScope::CraneShift(Period(2)), &diagnosis);
        sink.record_load_report(w1, &LoadReport::default());

        let scopes: Vec<_> = sink.diagnoses_of(w2).map(|(scope, _)| scope).collect();
        assert_eq!(scopes, vec![DiagnosticScope::CraneShift(Period(2))]);
        assert_eq!(sink.load_reports.len(), 1);
        assert!(sink.yard_report(w1).is_none());
        assert_eq!(sink.crane_shifts_of(w1).count(), 0);
    }
}
