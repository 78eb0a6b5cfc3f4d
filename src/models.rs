use jiff::Timestamp;
use serde::{Deserialize, Serialize};

/// Cross-provider merged view of one movie, keyed by exact title.
///
/// Built in memory during an aggregation pass and published wholesale into
/// the result cache; there is no persistent store behind it.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovieSummary {
    pub title: String,
    pub year: Option<String>,
    pub rated: Option<String>,
    pub released: Option<String>,
    pub runtime: Option<String>,
    pub genre: Option<String>,
    pub director: Option<String>,
    pub writer: Option<String>,
    pub actors: Option<String>,
    pub plot: Option<String>,
    pub language: Option<String>,
    pub country: Option<String>,
    pub awards: Option<String>,
    pub metascore: Option<String>,
    pub rating: Option<String>,
    pub votes: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub poster: Option<String>,
    pub providers: Vec<MovieProviderDetail>,
    pub updated_at: Timestamp,
}

/// One provider's contribution to a [`MovieSummary`]: its native id, its
/// price, and its poster candidate. Lives and dies with the owning summary.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovieProviderDetail {
    pub provider_id: String,
    pub provider: String,
    pub movie_id: String,
    pub price: Option<f64>,
    pub poster_url: Option<String>,
    pub updated_at: Timestamp,
}

/// Derived view: the cheapest valid offer across a movie's providers.
/// Computed on demand, never stored.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheapestPrice {
    pub provider_id: String,
    pub provider: String,
    pub price: f64,
}

impl MovieSummary {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            year: None,
            rated: None,
            released: None,
            runtime: None,
            genre: None,
            director: None,
            writer: None,
            actors: None,
            plot: None,
            language: None,
            country: None,
            awards: None,
            metascore: None,
            rating: None,
            votes: None,
            kind: None,
            poster: None,
            providers: Vec::new(),
            updated_at: Timestamp::now(),
        }
    }

    /// Merge another summary for the same title into this one.
    ///
    /// Descriptive fields use fill-if-absent semantics: an existing value is
    /// never overwritten by a later provider's. Provider details are upserted
    /// per (provider_id, movie_id). `updated_at` always advances.
    pub fn absorb(&mut self, other: MovieSummary) {
        fill(&mut self.year, other.year);
        fill(&mut self.rated, other.rated);
        fill(&mut self.released, other.released);
        fill(&mut self.runtime, other.runtime);
        fill(&mut self.genre, other.genre);
        fill(&mut self.director, other.director);
        fill(&mut self.writer, other.writer);
        fill(&mut self.actors, other.actors);
        fill(&mut self.plot, other.plot);
        fill(&mut self.language, other.language);
        fill(&mut self.country, other.country);
        fill(&mut self.awards, other.awards);
        fill(&mut self.metascore, other.metascore);
        fill(&mut self.rating, other.rating);
        fill(&mut self.votes, other.votes);
        fill(&mut self.kind, other.kind);
        fill(&mut self.poster, other.poster);

        for detail in other.providers {
            self.upsert_detail(detail);
        }

        self.updated_at = Timestamp::now();
    }

    /// Insert or replace the detail record for (provider_id, movie_id).
    /// A duplicate add replaces the earlier record, never appends.
    pub fn upsert_detail(&mut self, detail: MovieProviderDetail) {
        match self.providers.iter_mut().find(|d| {
            d.provider_id == detail.provider_id && d.movie_id == detail.movie_id
        }) {
            Some(existing) => *existing = detail,
            None => self.providers.push(detail),
        }
        self.updated_at = Timestamp::now();
    }

    /// Cheapest valid offer: price present and > 0, strict minimum, first
    /// encountered wins ties (stable in provider iteration order).
    pub fn cheapest(&self) -> Option<CheapestPrice> {
        let mut best: Option<(&MovieProviderDetail, f64)> = None;
        for detail in &self.providers {
            let Some(price) = detail.price else { continue };
            if price <= 0.0 {
                continue;
            }
            match best {
                Some((_, current)) if price >= current => {}
                _ => best = Some((detail, price)),
            }
        }
        best.map(|(detail, price)| CheapestPrice {
            provider_id: detail.provider_id.clone(),
            provider: detail.provider.clone(),
            price,
        })
    }
}

fn fill(dst: &mut Option<String>, src: Option<String>) {
    if dst.is_none() {
        if let Some(value) = src {
            if !value.trim().is_empty() {
                *dst = Some(value);
            }
        }
    }
}

/// Parse a provider's raw price string. Returns `None` for anything that is
/// not a finite number; callers keep the record and leave the price absent.
pub fn parse_price(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|p| p.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detail(provider_id: &str, movie_id: &str, price: Option<f64>) -> MovieProviderDetail {
        MovieProviderDetail {
            provider_id: provider_id.to_string(),
            provider: provider_id.to_string(),
            movie_id: movie_id.to_string(),
            price,
            poster_url: None,
            updated_at: Timestamp::now(),
        }
    }

    #[test]
    fn absorb_fills_absent_fields_only() {
        let mut base = MovieSummary::new("Star Wars");
        base.year = Some("1977".to_string());

        let mut incoming = MovieSummary::new("Star Wars");
        incoming.year = Some("1997".to_string());
        incoming.director = Some("George Lucas".to_string());

        base.absorb(incoming);

        assert_eq!(base.year.as_deref(), Some("1977"));
        assert_eq!(base.director.as_deref(), Some("George Lucas"));
    }

    #[test]
    fn absorb_ignores_blank_values() {
        let mut base = MovieSummary::new("Star Wars");
        let mut incoming = MovieSummary::new("Star Wars");
        incoming.plot = Some("   ".to_string());

        base.absorb(incoming);

        assert!(base.plot.is_none());
    }

    #[test]
    fn absorb_is_idempotent_modulo_timestamps() {
        let mut contribution = MovieSummary::new("Star Wars");
        contribution.year = Some("1977".to_string());
        contribution.upsert_detail(detail("cinemaworld", "cw001", Some(30.99)));

        let mut once = MovieSummary::new("Star Wars");
        once.absorb(contribution.clone());

        let mut twice = MovieSummary::new("Star Wars");
        twice.absorb(contribution.clone());
        twice.absorb(contribution);

        assert_eq!(once.year, twice.year);
        assert_eq!(once.providers.len(), twice.providers.len());
        assert_eq!(
            once.providers[0].price,
            twice.providers[0].price,
        );
    }

    #[test]
    fn duplicate_detail_replaces() {
        let mut summary = MovieSummary::new("Star Wars");
        summary.upsert_detail(detail("cinemaworld", "cw001", Some(30.99)));
        summary.upsert_detail(detail("cinemaworld", "cw001", Some(28.50)));

        assert_eq!(summary.providers.len(), 1);
        assert_eq!(summary.providers[0].price, Some(28.50));
    }

    #[test]
    fn same_provider_different_movie_ids_both_kept() {
        let mut summary = MovieSummary::new("Star Wars");
        summary.upsert_detail(detail("cinemaworld", "cw001", Some(30.99)));
        summary.upsert_detail(detail("cinemaworld", "cw002", Some(12.00)));

        assert_eq!(summary.providers.len(), 2);
    }

    #[test]
    fn cheapest_skips_missing_and_non_positive_prices() {
        let mut summary = MovieSummary::new("Star Wars");
        summary.upsert_detail(detail("a", "1", Some(15.99)));
        summary.upsert_detail(detail("b", "2", Some(0.0)));
        summary.upsert_detail(detail("c", "3", None));

        let cheapest = summary.cheapest().unwrap();
        assert_eq!(cheapest.provider_id, "a");
        assert_eq!(cheapest.price, 15.99);
    }

    #[test]
    fn cheapest_none_when_no_valid_price() {
        let mut summary = MovieSummary::new("Star Wars");
        summary.upsert_detail(detail("a", "1", Some(-1.0)));
        summary.upsert_detail(detail("b", "2", None));

        assert!(summary.cheapest().is_none());
    }

    #[test]
    fn cheapest_tie_goes_to_first_encountered() {
        let mut summary = MovieSummary::new("Star Wars");
        summary.upsert_detail(detail("first", "1", Some(9.99)));
        summary.upsert_detail(detail("second", "2", Some(9.99)));

        assert_eq!(summary.cheapest().unwrap().provider_id, "first");
    }

    #[test]
    fn parse_price_accepts_plain_decimals() {
        assert_eq!(parse_price("25.99"), Some(25.99));
        assert_eq!(parse_price("  123.5 "), Some(123.5));
    }

    #[test]
    fn parse_price_rejects_garbage() {
        assert_eq!(parse_price("invalid_price"), None);
        assert_eq!(parse_price(""), None);
        assert_eq!(parse_price("NaN"), None);
    }
}
