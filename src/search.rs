// 🔎 Search Filter - vehicle number / date range / merged default view
//
// Vehicle and date searches only look at the primary store; the
// no-criteria view merges both stores.

use crate::error::Result;
use crate::owner::{Owner, DATE_FORMAT};
use crate::resolver;
use crate::store::Stores;
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::debug;

/// Search form as submitted (`vecregno`, `from_date`, `to_date`)
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SearchCriteria {
    #[serde(default, rename = "vecregno")]
    pub vehicle_no: Option<String>,

    #[serde(default)]
    pub from_date: Option<String>,

    #[serde(default)]
    pub to_date: Option<String>,
}

/// Which branch a set of criteria selects
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchMode<'a> {
    Vehicle(&'a str),
    DateRange { from: &'a str, to: &'a str },
    All,
}

impl SearchCriteria {
    pub fn vehicle(vehicle_no: &str) -> Self {
        Self {
            vehicle_no: Some(vehicle_no.to_string()),
            ..Default::default()
        }
    }

    pub fn date_range(from: &str, to: &str) -> Self {
        Self {
            vehicle_no: None,
            from_date: Some(from.to_string()),
            to_date: Some(to.to_string()),
        }
    }

    /// Blank strings count as absent
    pub fn mode(&self) -> SearchMode<'_> {
        if let Some(vehicle_no) = present(&self.vehicle_no) {
            return SearchMode::Vehicle(vehicle_no);
        }

        match (present(&self.from_date), present(&self.to_date)) {
            (Some(from), Some(to)) => SearchMode::DateRange { from, to },
            _ => SearchMode::All,
        }
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Run a search. Malformed dates fail with `CertError::Parse`.
pub fn filter(stores: &Stores, criteria: &SearchCriteria) -> Result<Vec<Owner>> {
    match criteria.mode() {
        SearchMode::Vehicle(vehicle_no) => {
            debug!(vehicle_no, "search by vehicle number");
            stores.primary.search_vehicle(vehicle_no)
        }
        SearchMode::DateRange { from, to } => {
            let from = NaiveDate::parse_from_str(from, DATE_FORMAT)?;
            let to = NaiveDate::parse_from_str(to, DATE_FORMAT)?;
            debug!(%from, %to, "search by registration date");
            stores.primary.owners_between(from, to)
        }
        SearchMode::All => resolver::merge_all(stores),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CertError;
    use crate::store::tests::new_owner;

    fn seeded() -> Stores {
        let stores = Stores::in_memory().unwrap();
        stores.primary.insert_owner(&new_owner("P1", "KA01AB1234", "2024-01-01")).unwrap();
        stores.primary.insert_owner(&new_owner("P2", "MH12AB5678", "2024-01-31")).unwrap();
        stores.primary.insert_owner(&new_owner("P3", "TN09CD0001", "2024-02-01")).unwrap();
        stores.secondary.insert_owner_with_id(10, &new_owner("S10", "KA01AB9999", "2024-01-15")).unwrap();
        stores
    }

    #[test]
    fn test_mode_precedence() {
        let both = SearchCriteria {
            vehicle_no: Some("ab12".to_string()),
            from_date: Some("2024-01-01".to_string()),
            to_date: Some("2024-01-31".to_string()),
        };
        assert_eq!(both.mode(), SearchMode::Vehicle("ab12"));

        let blank_vehicle = SearchCriteria {
            vehicle_no: Some("   ".to_string()),
            ..SearchCriteria::date_range("2024-01-01", "2024-01-31")
        };
        assert_eq!(
            blank_vehicle.mode(),
            SearchMode::DateRange { from: "2024-01-01", to: "2024-01-31" }
        );

        let only_from = SearchCriteria {
            from_date: Some("2024-01-01".to_string()),
            ..Default::default()
        };
        assert_eq!(only_from.mode(), SearchMode::All);
        assert_eq!(SearchCriteria::default().mode(), SearchMode::All);
    }

    #[test]
    fn test_vehicle_search_is_primary_only_and_case_insensitive() {
        let stores = seeded();

        let hits = filter(&stores, &SearchCriteria::vehicle("ka01ab")).unwrap();
        let names: Vec<&str> = hits.iter().map(|o| o.owner_name.as_str()).collect();

        // S10 matches but lives in the secondary store
        assert_eq!(names, vec!["P1"]);
        assert!(hits.iter().all(|o| o.vehicle_no.to_lowercase().contains("ka01ab")));
    }

    #[test]
    fn test_vehicle_search_never_returns_non_matches() {
        let stores = seeded();
        let hits = filter(&stores, &SearchCriteria::vehicle("AB12")).unwrap();

        assert_eq!(hits.len(), 1);
        assert!(hits.iter().all(|o| o.vehicle_no.to_lowercase().contains("ab12")));
    }

    #[test]
    fn test_date_range_is_inclusive_and_primary_only() {
        let stores = seeded();

        let hits = filter(&stores, &SearchCriteria::date_range("2024-01-01", "2024-01-31")).unwrap();
        let names: Vec<&str> = hits.iter().map(|o| o.owner_name.as_str()).collect();

        assert_eq!(names, vec!["P1", "P2"]);
    }

    #[test]
    fn test_malformed_date_is_parse_error() {
        let stores = seeded();

        let err = filter(&stores, &SearchCriteria::date_range("01/01/2024", "2024-01-31")).unwrap_err();
        assert!(matches!(err, CertError::Parse(_)));

        let err = filter(&stores, &SearchCriteria::date_range("2024-01-01", "2024-02-30")).unwrap_err();
        assert!(matches!(err, CertError::Parse(_)));
    }

    #[test]
    fn test_no_criteria_returns_merged_view() {
        let stores = seeded();

        let all = filter(&stores, &SearchCriteria::default()).unwrap();
        let ids: Vec<i64> = all.iter().map(|o| o.id).collect();

        assert_eq!(ids, vec![1, 2, 3, 10]);
    }

    #[test]
    fn test_secondary_only_record_hidden_from_vehicle_search() {
        let stores = Stores::in_memory().unwrap();
        stores.secondary.insert_owner_with_id(2, &new_owner("S2", "GJ05ZZ1111", "2024-01-15")).unwrap();

        assert!(filter(&stores, &SearchCriteria::vehicle("nomatch")).unwrap().is_empty());
        assert!(filter(&stores, &SearchCriteria::vehicle("GJ05")).unwrap().is_empty());

        let default_view = filter(&stores, &SearchCriteria::default()).unwrap();
        assert!(default_view.iter().any(|o| o.id == 2));
    }
}
