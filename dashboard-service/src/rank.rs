use std::collections::HashMap;

use nem_client::domain::Generator;
use serde::Serialize;

use crate::aggregate::GeneratorSummary;

pub const REVENUE_LEADERBOARD_SIZE: usize = 10;
pub const PERFORMANCE_LEADERBOARD_SIZE: usize = 15;

/// Leaderboard facet filter. An empty facet set imposes no restriction. The
/// region facet is applied to the interval rows in SQL; fuel and search act
/// on generator metadata after the join.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GeneratorFilter {
    pub regions: Vec<String>,
    pub fuel_types: Vec<String>,
    pub search: Option<String>,
}

impl GeneratorFilter {
    /// Builds a filter from the comma-separated query-string form. Blank
    /// items and a blank search term are ignored.
    pub fn from_csv(regions: Option<&str>, fuel_types: Option<&str>, search: Option<&str>) -> Self {
        Self {
            regions: csv_list(regions),
            fuel_types: csv_list(fuel_types),
            search: search
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
        }
    }

    /// Metadata-side facets: fuel membership and case-insensitive search
    /// over DUID, station name and participant. The region facet never
    /// reaches this predicate; rows arrive already region-filtered.
    pub fn matches_metadata(&self, generator: &Generator) -> bool {
        if !self.fuel_types.is_empty() {
            let Some(fuel) = generator.fuel_source_primary.as_deref() else {
                return false;
            };
            if !self.fuel_types.iter().any(|f| f == fuel) {
                return false;
            }
        }

        if let Some(needle) = self.search.as_deref().filter(|s| !s.is_empty()) {
            let needle = needle.to_lowercase();
            let field_matches =
                |field: Option<&str>| field.is_some_and(|f| f.to_lowercase().contains(&needle));
            if !(generator.duid.to_lowercase().contains(&needle)
                || field_matches(generator.station_name.as_deref())
                || field_matches(generator.participant.as_deref()))
            {
                return false;
            }
        }

        true
    }
}

/// Leaderboard sort keys. All sort descending, ties broken by DUID ascending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    TotalRevenue,
    CapacityFactor,
    RevenuePerMw,
    PerformanceScore,
}

impl SortKey {
    pub fn parse(key: &str) -> Option<Self> {
        match key {
            "total_revenue" => Some(Self::TotalRevenue),
            "capacity_factor" => Some(Self::CapacityFactor),
            "revenue_per_mw" => Some(Self::RevenuePerMw),
            "performance_score" => Some(Self::PerformanceScore),
            _ => None,
        }
    }

    pub fn value(&self, summary: &GeneratorSummary) -> f64 {
        match self {
            Self::TotalRevenue => summary.total_revenue,
            Self::CapacityFactor => summary.capacity_factor_pct,
            Self::RevenuePerMw => summary.revenue_per_mw,
            Self::PerformanceScore => summary.performance_score,
        }
    }
}

/// A sorted, truncated leaderboard plus the market-wide revenue of the full
/// (untruncated) filtered set.
#[derive(Debug, Clone)]
pub struct Ranking {
    pub entries: Vec<GeneratorSummary>,
    pub market_revenue: f64,
}

fn csv_list(raw: Option<&str>) -> Vec<String> {
    raw.map(|s| {
        s.split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

/// Narrows summaries to those whose metadata passes the fuel and search
/// facets. Summaries without metadata never pass; the market query already
/// applied the region facet to the rows.
pub fn filter_summaries(
    summaries: HashMap<String, GeneratorSummary>,
    meta: &HashMap<String, Generator>,
    filter: &GeneratorFilter,
) -> Vec<GeneratorSummary> {
    summaries
        .into_values()
        .filter(|s| meta.get(&s.duid).is_some_and(|g| filter.matches_metadata(g)))
        .collect()
}

pub fn rank(mut summaries: Vec<GeneratorSummary>, sort: SortKey, limit: usize) -> Ranking {
    let market_revenue = summaries.iter().map(|s| s.total_revenue).sum();
    summaries.sort_by(|a, b| {
        sort.value(b)
            .total_cmp(&sort.value(a))
            .then_with(|| a.duid.cmp(&b.duid))
    });
    summaries.truncate(limit);
    Ranking {
        entries: summaries,
        market_revenue,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generator(duid: &str, region: Option<&str>, fuel: Option<&str>) -> Generator {
        Generator {
            duid: duid.to_string(),
            station_name: Some(format!("{duid} Power Station")),
            participant: Some("Acme Energy".to_string()),
            region: region.map(str::to_string),
            fuel_source_primary: fuel.map(str::to_string),
            reg_cap_mw: Some(100.0),
            max_cap_mw: Some(100.0),
        }
    }

    fn summary(duid: &str, revenue: f64, score: f64) -> GeneratorSummary {
        GeneratorSummary {
            duid: duid.to_string(),
            total_revenue: revenue,
            total_energy_mwh: revenue / 60.0,
            avg_power_mw: 50.0,
            capacity_factor_pct: 50.0,
            utilization_pct: 50.0,
            revenue_per_mw: revenue / 100.0,
            performance_score: score,
            sample_count: 12,
        }
    }

    #[test]
    fn empty_filter_matches_everything() {
        let filter = GeneratorFilter::default();
        assert!(filter.matches_metadata(&generator("A1", Some("NSW1"), Some("Coal"))));
        assert!(filter.matches_metadata(&generator("B1", None, None)));
    }

    #[test]
    fn metadata_facets_intersect() {
        let filter = GeneratorFilter {
            fuel_types: vec!["Wind".to_string()],
            search: Some("acme".to_string()),
            ..Default::default()
        };
        assert!(filter.matches_metadata(&generator("W1", Some("VIC1"), Some("Wind"))));
        assert!(!filter.matches_metadata(&generator("C1", Some("NSW1"), Some("Coal"))));
        // A unit missing the faceted field cannot satisfy a non-empty facet.
        assert!(!filter.matches_metadata(&generator("U1", Some("SA1"), None)));

        let filter = GeneratorFilter {
            fuel_types: vec!["Wind".to_string()],
            search: Some("nothing-here".to_string()),
            ..Default::default()
        };
        assert!(!filter.matches_metadata(&generator("W1", Some("VIC1"), Some("Wind"))));
    }

    #[test]
    fn region_facet_does_not_gate_the_metadata_predicate() {
        let filter = GeneratorFilter {
            regions: vec!["NSW1".to_string()],
            ..Default::default()
        };
        // Regions ride the row query; the metadata predicate ignores them
        // even when the unit's own region is absent or different.
        assert!(filter.matches_metadata(&generator("A1", None, Some("Coal"))));
        assert!(filter.matches_metadata(&generator("B1", Some("VIC1"), Some("Coal"))));
    }

    #[test]
    fn search_is_case_insensitive_over_name_participant_and_duid() {
        let filter = GeneratorFilter {
            search: Some("acme".to_string()),
            ..Default::default()
        };
        assert!(filter.matches_metadata(&generator("X1", Some("NSW1"), Some("Coal"))));

        let filter = GeneratorFilter {
            search: Some("x1 power".to_string()),
            ..Default::default()
        };
        assert!(filter.matches_metadata(&generator("X1", Some("NSW1"), Some("Coal"))));

        let filter = GeneratorFilter {
            search: Some("nothing-here".to_string()),
            ..Default::default()
        };
        assert!(!filter.matches_metadata(&generator("X1", Some("NSW1"), Some("Coal"))));
    }

    #[test]
    fn filtering_is_idempotent() {
        let meta: HashMap<_, _> = [
            ("A1".to_string(), generator("A1", Some("NSW1"), Some("Coal"))),
            ("B1".to_string(), generator("B1", Some("VIC1"), Some("Wind"))),
        ]
        .into();
        let filter = GeneratorFilter {
            fuel_types: vec!["Coal".to_string()],
            ..Default::default()
        };

        let summaries: HashMap<_, _> = [
            ("A1".to_string(), summary("A1", 100.0, 1.0)),
            ("B1".to_string(), summary("B1", 200.0, 2.0)),
        ]
        .into();

        let once = filter_summaries(summaries, &meta, &filter);
        assert_eq!(once.len(), 1);
        assert_eq!(once[0].duid, "A1");
        // Everything that survived still matches; re-applying changes nothing.
        assert!(once
            .iter()
            .all(|s| filter.matches_metadata(&meta[&s.duid])));
    }

    #[test]
    fn rank_sorts_descending_with_duid_tie_break() {
        let summaries = vec![
            summary("B1", 500.0, 2.0),
            summary("A1", 500.0, 2.0),
            summary("C1", 900.0, 1.0),
        ];

        let ranking = rank(summaries, SortKey::TotalRevenue, 10);
        let order: Vec<_> = ranking.entries.iter().map(|s| s.duid.as_str()).collect();
        assert_eq!(order, vec!["C1", "A1", "B1"]);
    }

    #[test]
    fn reranking_ranked_output_reproduces_the_order() {
        let summaries = vec![
            summary("B1", 500.0, 2.0),
            summary("A1", 500.0, 2.0),
            summary("D1", 100.0, 1.0),
            summary("C1", 900.0, 1.0),
        ];

        let once = rank(summaries, SortKey::TotalRevenue, 10);
        let order: Vec<String> = once.entries.iter().map(|s| s.duid.clone()).collect();
        assert_eq!(order, vec!["C1", "A1", "B1", "D1"]);

        // The tie-broken order is a fixed point of the sort.
        let market = once.market_revenue;
        let twice = rank(once.entries, SortKey::TotalRevenue, 10);
        let again: Vec<String> = twice.entries.iter().map(|s| s.duid.clone()).collect();
        assert_eq!(again, order);
        assert!((twice.market_revenue - market).abs() < 1e-9);
    }

    #[test]
    fn rank_truncates_but_market_revenue_covers_the_full_set() {
        let summaries: Vec<_> = (0..20)
            .map(|i| summary(&format!("G{i:02}"), 100.0 + i as f64, i as f64))
            .collect();
        let total: f64 = summaries.iter().map(|s| s.total_revenue).sum();

        let ranking = rank(summaries, SortKey::PerformanceScore, REVENUE_LEADERBOARD_SIZE);
        assert_eq!(ranking.entries.len(), REVENUE_LEADERBOARD_SIZE);
        assert!((ranking.market_revenue - total).abs() < 1e-9);
        assert_eq!(ranking.entries[0].duid, "G19");
    }

    #[test]
    fn csv_filter_form_splits_and_trims() {
        let filter = GeneratorFilter::from_csv(Some("NSW1, VIC1 ,,SA1"), Some(""), Some("  "));
        assert_eq!(
            filter.regions,
            vec!["NSW1".to_string(), "VIC1".to_string(), "SA1".to_string()]
        );
        assert!(filter.fuel_types.is_empty());
        assert!(filter.search.is_none());
    }

    #[test]
    fn sort_key_parses_known_names_only() {
        assert_eq!(SortKey::parse("total_revenue"), Some(SortKey::TotalRevenue));
        assert_eq!(
            SortKey::parse("performance_score"),
            Some(SortKey::PerformanceScore)
        );
        assert_eq!(SortKey::parse("capacity_factor"), Some(SortKey::CapacityFactor));
        assert_eq!(SortKey::parse("revenue_per_mw"), Some(SortKey::RevenuePerMw));
        assert_eq!(SortKey::parse("alphabetical"), None);
    }
}
