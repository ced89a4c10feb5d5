//! Product-search provider adapter.
//!
//! Wraps the hosted search API's shopping engine. Upstream items are
//! projected down to the fields a shopping answer needs (title, prices,
//! seller, promo tag, delivery note, rating) and nothing else; the raw
//! upstream payload is never forwarded.

use crate::provider::Provider;
use crate::providers::search_api::{canonical_url_key, rank_score, SearchApi};
use crate::types::{Chunk, Filters, Intent, ProviderFailure, ProviderResult};
use grounder_core::SearchConfig;
use serde::Deserialize;
use std::time::Duration;

/// Shopping payload subset we project from.
#[derive(Debug, Deserialize)]
struct ShoppingPayload {
    #[serde(default)]
    shopping_results: Vec<ShoppingItem>,
}

#[derive(Debug, Deserialize)]
struct ShoppingItem {
    title: Option<String>,
    price: Option<String>,
    extracted_price: Option<f64>,
    extracted_price_old: Option<f64>,
    link: Option<String>,
    product_link: Option<String>,
    source: Option<String>,
    tag: Option<String>,
    delivery: Option<String>,
    rating: Option<f64>,
    reviews: Option<u64>,
}

/// Product-search provider.
pub struct ShoppingProvider {
    api: SearchApi,
}

impl ShoppingProvider {
    pub fn new(config: &SearchConfig) -> Self {
        Self {
            api: SearchApi::new(config),
        }
    }

    /// Project one upstream item into a chunk. Items without a title are
    /// unusable and skipped; everything else degrades field by field.
    fn project(item: &ShoppingItem, index: usize, total: usize) -> Option<Chunk> {
        let title = item.title.as_deref()?.trim();
        if title.is_empty() {
            return None;
        }

        let link = item
            .link
            .as_deref()
            .or(item.product_link.as_deref())
            .unwrap_or("")
            .to_string();

        let mut lines = vec![format!("Product: {}", title)];
        if let Some(price) = &item.price {
            lines.push(format!("Price: {}", price));
        } else if let Some(price) = item.extracted_price {
            lines.push(format!("Price: ${:.2}", price));
        }
        if let Some(old) = item.extracted_price_old {
            lines.push(format!("Was: ${:.2}", old));
        }
        if let Some(source) = &item.source {
            lines.push(format!("Seller: {}", source));
        }
        if let Some(tag) = &item.tag {
            lines.push(format!("Promotion: {}", tag));
        }
        if let Some(delivery) = &item.delivery {
            lines.push(format!("Delivery: {}", delivery));
        }
        if let Some(rating) = item.rating {
            let reviews = item
                .reviews
                .map(|r| format!(" ({} reviews)", r))
                .unwrap_or_default();
            lines.push(format!("Rating: {:.1}{}", rating, reviews));
        }

        let dedup_key = if link.is_empty() {
            format!("shopping:{}", title.to_lowercase())
        } else {
            canonical_url_key(&link)
        };

        Some(Chunk {
            source_id: if link.is_empty() {
                format!("shopping:{}", index)
            } else {
                link
            },
            provider_id: "shopping".to_string(),
            title: title.to_string(),
            content: lines.join("\n"),
            score: rank_score(index, total),
            dedup_key,
        })
    }
}

#[async_trait::async_trait]
impl Provider for ShoppingProvider {
    fn id(&self) -> &str {
        "shopping"
    }

    fn supports(&self, intent: Intent) -> bool {
        matches!(intent, Intent::Shopping)
    }

    async fn retrieve(
        &self,
        query: &str,
        _filters: &Filters,
        deadline: Duration,
    ) -> Result<ProviderResult, ProviderFailure> {
        let payload = self
            .api
            .fetch("google_shopping", query, &[], deadline)
            .await?;

        let payload: ShoppingPayload = serde_json::from_value(payload)
            .map_err(|e| ProviderFailure::BadResponse(format!("Shopping payload: {}", e)))?;

        let total = payload.shopping_results.len();
        let chunks: Vec<Chunk> = payload
            .shopping_results
            .iter()
            .enumerate()
            .filter_map(|(i, item)| Self::project(item, i, total))
            .collect();

        tracing::debug!(
            "Shopping provider projected {}/{} items",
            chunks.len(),
            total
        );

        Ok(ProviderResult {
            provider_id: self.id().to_string(),
            chunks,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_item() -> ShoppingItem {
        ShoppingItem {
            title: Some("Nike Air Max 270".to_string()),
            price: Some("$89.99".to_string()),
            extracted_price: Some(89.99),
            extracted_price_old: Some(112.99),
            link: Some("https://nike.com/air-max-270?ref=promo".to_string()),
            product_link: None,
            source: Some("Nike".to_string()),
            tag: Some("20% OFF".to_string()),
            delivery: Some("Free delivery by Mon".to_string()),
            rating: Some(4.5),
            reviews: Some(1234),
        }
    }

    #[test]
    fn test_projection_keeps_shopping_fields_only() {
        let chunk = ShoppingProvider::project(&sample_item(), 0, 1).unwrap();

        assert_eq!(chunk.title, "Nike Air Max 270");
        assert_eq!(chunk.provider_id, "shopping");
        assert_eq!(chunk.dedup_key, "nike.com/air-max-270");
        assert!(chunk.content.contains("Price: $89.99"));
        assert!(chunk.content.contains("Was: $112.99"));
        assert!(chunk.content.contains("Promotion: 20% OFF"));
        assert!(chunk.content.contains("Delivery: Free delivery by Mon"));
        assert!(chunk.content.contains("Rating: 4.5 (1234 reviews)"));
        assert_eq!(chunk.score, 1.0);
    }

    #[test]
    fn test_untitled_items_are_skipped() {
        let mut item = sample_item();
        item.title = None;
        assert!(ShoppingProvider::project(&item, 0, 1).is_none());
    }

    #[test]
    fn test_title_fallback_dedup_key() {
        let mut item = sample_item();
        item.link = None;
        let chunk = ShoppingProvider::project(&item, 2, 5).unwrap();
        assert_eq!(chunk.dedup_key, "shopping:nike air max 270");
        assert_eq!(chunk.source_id, "shopping:2");
    }

    #[test]
    fn test_capability_set() {
        let provider = ShoppingProvider::new(&SearchConfig::default());
        assert!(provider.supports(Intent::Shopping));
        assert!(!provider.supports(Intent::Hotel));
        assert!(!provider.supports(Intent::Generic));
    }
}
