//! Hotel-search provider adapter.
//!
//! Wraps the hosted search API's hotel engine. Properties are projected to
//! name, address, nightly price, rating, amenities, booking site, and
//! location; the raw upstream payload is never forwarded.

use crate::provider::Provider;
use crate::providers::search_api::{canonical_url_key, rank_score, SearchApi};
use crate::types::{filter_keys, Chunk, Filters, Intent, ProviderFailure, ProviderResult};
use grounder_core::SearchConfig;
use serde::Deserialize;
use std::time::Duration;

/// Hotel payload subset we project from.
#[derive(Debug, Deserialize)]
struct HotelsPayload {
    #[serde(default)]
    properties: Vec<HotelProperty>,
}

#[derive(Debug, Deserialize)]
struct HotelProperty {
    name: Option<String>,
    description: Option<String>,
    address: Option<String>,
    link: Option<String>,
    #[serde(default)]
    rate_per_night: Option<Rate>,
    overall_rating: Option<f64>,
    reviews: Option<u64>,
    hotel_class: Option<String>,
    #[serde(default)]
    amenities: Vec<String>,
    #[serde(default)]
    booking: Option<BookingRef>,
    #[serde(default)]
    location: Option<HotelLocation>,
}

#[derive(Debug, Deserialize)]
struct Rate {
    lowest: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BookingRef {
    link: Option<String>,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HotelLocation {
    city: Option<String>,
    state: Option<String>,
    country: Option<String>,
}

/// Hotel-search provider.
pub struct HotelsProvider {
    api: SearchApi,
}

impl HotelsProvider {
    pub fn new(config: &SearchConfig) -> Self {
        Self {
            api: SearchApi::new(config),
        }
    }

    /// Typed query parameters projected from the filters.
    ///
    /// The hotel engine accepts explicit check-in/check-out dates; the
    /// pipeline encodes them as one `dates` filter ("from/to").
    fn extra_params(filters: &Filters) -> Vec<(&'static str, String)> {
        let mut extra = Vec::new();

        if let Some(dates) = filters.get(filter_keys::DATES) {
            if let Some((check_in, check_out)) = dates.split_once('/') {
                extra.push(("check_in_date", check_in.trim().to_string()));
                extra.push(("check_out_date", check_out.trim().to_string()));
            }
        }

        if let Some(stars) = filters.get(filter_keys::STARS) {
            extra.push(("hotel_class", stars.to_string()));
        }

        extra
    }

    /// Project one property into a chunk. Properties without a name are
    /// skipped; everything else degrades field by field.
    fn project(property: &HotelProperty, index: usize, total: usize) -> Option<Chunk> {
        let name = property.name.as_deref()?.trim();
        if name.is_empty() {
            return None;
        }

        let link = property.link.as_deref().unwrap_or("").to_string();

        let mut lines = vec![format!("Hotel: {}", name)];
        if let Some(address) = &property.address {
            lines.push(format!("Address: {}", address));
        }
        if let Some(rate) = property
            .rate_per_night
            .as_ref()
            .and_then(|r| r.lowest.as_deref())
        {
            lines.push(format!("Price: {}/night", rate));
        }
        if let Some(class) = &property.hotel_class {
            lines.push(format!("Class: {}", class));
        }
        if let Some(rating) = property.overall_rating {
            let reviews = property
                .reviews
                .map(|r| format!(" ({} reviews)", r))
                .unwrap_or_default();
            lines.push(format!("Rating: {:.1}{}", rating, reviews));
        }
        if !property.amenities.is_empty() {
            lines.push(format!("Amenities: {}", property.amenities.join(", ")));
        }
        if let Some(booking) = &property.booking {
            match (&booking.name, &booking.link) {
                (Some(name), Some(link)) => lines.push(format!("Book via {}: {}", name, link)),
                (Some(name), None) => lines.push(format!("Book via {}", name)),
                (None, Some(link)) => lines.push(format!("Booking: {}", link)),
                (None, None) => {}
            }
        }
        if let Some(location) = &property.location {
            let parts: Vec<&str> = [&location.city, &location.state, &location.country]
                .iter()
                .filter_map(|part| part.as_deref())
                .collect();
            if !parts.is_empty() {
                lines.push(format!("Location: {}", parts.join(", ")));
            }
        }
        if let Some(description) = &property.description {
            lines.push(description.clone());
        }

        let dedup_key = if link.is_empty() {
            format!("hotel:{}", name.to_lowercase())
        } else {
            canonical_url_key(&link)
        };

        Some(Chunk {
            source_id: if link.is_empty() {
                format!("hotel:{}", index)
            } else {
                link
            },
            provider_id: "hotels".to_string(),
            title: name.to_string(),
            content: lines.join("\n"),
            score: rank_score(index, total),
            dedup_key,
        })
    }
}

#[async_trait::async_trait]
impl Provider for HotelsProvider {
    fn id(&self) -> &str {
        "hotels"
    }

    fn supports(&self, intent: Intent) -> bool {
        matches!(intent, Intent::Hotel)
    }

    async fn retrieve(
        &self,
        query: &str,
        filters: &Filters,
        deadline: Duration,
    ) -> Result<ProviderResult, ProviderFailure> {
        let extra = Self::extra_params(filters);
        let payload = self
            .api
            .fetch("google_hotels", query, &extra, deadline)
            .await?;

        let payload: HotelsPayload = serde_json::from_value(payload)
            .map_err(|e| ProviderFailure::BadResponse(format!("Hotel payload: {}", e)))?;

        let total = payload.properties.len();
        let chunks: Vec<Chunk> = payload
            .properties
            .iter()
            .enumerate()
            .filter_map(|(i, property)| Self::project(property, i, total))
            .collect();

        tracing::debug!("Hotel provider projected {}/{} properties", chunks.len(), total);

        Ok(ProviderResult {
            provider_id: self.id().to_string(),
            chunks,
        })
    }
}
