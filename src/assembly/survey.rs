//! Fast date→survey-window lookup over a sorted, non-overlapping sequence
//! of closed intervals.

use chrono::NaiveDate;

use crate::config::SurveysConfig;

#[derive(Debug, Clone)]
pub struct SurveyRecord {
    pub id: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

#[derive(Debug, Clone)]
pub struct SurveyCatalog {
    surveys: Vec<SurveyRecord>,
    starts: Vec<NaiveDate>,
}

impl SurveyCatalog {
    pub fn from_config(config: &SurveysConfig) -> Self {
        let surveys: Vec<SurveyRecord> = config
            .surveys
            .iter()
            .map(|w| SurveyRecord {
                id: w.id.clone(),
                start: w.start,
                end: w.end,
            })
            .collect();
        let starts = surveys.iter().map(|s| s.start).collect();
        SurveyCatalog { surveys, starts }
    }

    /// Finds the rightmost window with `start <= date`; returns its id iff
    /// `date <= end`, else `None`.
    pub fn survey_for_date(&self, date: NaiveDate) -> Option<&str> {
        let idx = self.starts.partition_point(|s| *s <= date);
        if idx == 0 {
            return None;
        }
        let candidate = &self.surveys[idx - 1];
        if date <= candidate.end {
            Some(candidate.id.as_str())
        } else {
            None
        }
    }

    pub fn ordered_surveys(&self) -> impl Iterator<Item = &SurveyRecord> {
        self.surveys.iter()
    }

    pub fn get(&self, id: &str) -> Option<&SurveyRecord> {
        self.surveys.iter().find(|s| s.id == id)
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.surveys.iter().position(|s| s.id == id)
    }

    pub fn len(&self) -> usize {
        self.surveys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.surveys.is_empty()
    }

    pub fn at(&self, idx: usize) -> Option<&SurveyRecord> {
        self.surveys.get(idx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SurveyWindow;

    fn catalog() -> SurveyCatalog {
        let config = SurveysConfig {
            surveys: vec![
                SurveyWindow {
                    id: "2019".into(),
                    start: NaiveDate::from_ymd_opt(2019, 6, 1).unwrap(),
                    end: NaiveDate::from_ymd_opt(2019, 12, 31).unwrap(),
                },
                SurveyWindow {
                    id: "2022".into(),
                    start: NaiveDate::from_ymd_opt(2022, 1, 1).unwrap(),
                    end: NaiveDate::from_ymd_opt(2022, 12, 31).unwrap(),
                },
            ],
        };
        SurveyCatalog::from_config(&config)
    }

    #[test]
    fn finds_window_containing_date() {
        let catalog = catalog();
        assert_eq!(
            catalog.survey_for_date(NaiveDate::from_ymd_opt(2019, 6, 16).unwrap()),
            Some("2019")
        );
    }

    #[test]
    fn returns_none_for_date_outside_any_window() {
        let catalog = catalog();
        assert_eq!(
            catalog.survey_for_date(NaiveDate::from_ymd_opt(2020, 6, 16).unwrap()),
            None
        );
    }
}
