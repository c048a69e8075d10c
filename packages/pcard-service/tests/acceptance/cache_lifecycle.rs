use std::sync::atomic::Ordering;

use time::{Duration, OffsetDateTime};

use pcard_domain::normalize::{NORMALIZER_VERSION, normalize};
use pcard_service::{CacheEntry, LookupRequest, LookupResponse, NotFoundReason};

use super::Harness;

#[tokio::test]
async fn second_lookup_is_served_from_cache() {
	let (products, clauses) = super::catalog();
	let harness = Harness::new(&products, clauses);
	let first =
		harness.service.lookup(LookupRequest::new("安心保重疾险")).await.expect("Lookup failed.");
	let key = normalize("安心保重疾险");
	let stored = harness.cache.peek(&key).expect("First lookup should write the cache.");
	let expected_expiry = OffsetDateTime::now_utc() + Duration::hours(24);

	assert!(!first.card().expect("Expected a card.").cached);
	assert_eq!(harness.cache.len(), 1);
	assert_eq!(stored.hit_count, 0);
	assert_eq!(stored.key_version, NORMALIZER_VERSION);
	assert_eq!(stored.product_keys, vec![key.clone()]);
	assert!((stored.expires_at - expected_expiry).abs() < Duration::minutes(1));

	let second = harness
		.service
		.lookup(LookupRequest::new(" 安心保 重疾险 "))
		.await
		.expect("Lookup failed.");
	let card = second.card().expect("Expected a card.");

	assert!(card.cached);
	assert_eq!(card.strategy, first.card().expect("Expected a card.").strategy);
	assert_eq!(harness.cache.peek(&key).map(|entry| entry.hit_count), Some(1));
	assert_eq!(harness.generator.calls.load(Ordering::SeqCst), 1);
	assert_eq!(harness.embedding.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn debug_requests_skip_the_cache_read() {
	let (products, clauses) = super::catalog();
	let harness = Harness::new(&products, clauses);

	harness.service.lookup(LookupRequest::new("安心保重疾险")).await.expect("Lookup failed.");

	let mut request = LookupRequest::new("安心保重疾险");

	request.debug = true;

	let LookupResponse::Card(response) =
		harness.service.lookup(request).await.expect("Lookup failed.")
	else {
		panic!("Expected a card.");
	};
	let debug = response.debug.expect("Debug block requested.");

	assert!(!response.card.cached);
	assert_eq!(debug.cache_key, normalize("安心保重疾险"));
	assert_eq!(debug.priority_product_ids, vec![1]);
	assert_eq!(debug.matches.len(), 4);
	assert_eq!(harness.generator.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn deactivating_a_product_drops_current_and_legacy_entries() {
	let (products, clauses) = super::catalog();
	let harness = Harness::new(&products, clauses);

	harness.service.lookup(LookupRequest::new("安心保重疾险")).await.expect("Lookup failed.");

	let legacy_card = harness
		.cache
		.peek(&normalize("安心保重疾险"))
		.expect("Entry should exist.")
		.card;
	let now = OffsetDateTime::now_utc();

	// Written before entries carried a product key.
	harness.cache.insert(CacheEntry {
		key: "安心保重疾险多少钱".to_string(),
		key_version: NORMALIZER_VERSION,
		product_keys: Vec::new(),
		raw_query: "安心保重疾险 多少钱".to_string(),
		card: legacy_card,
		created_at: now,
		expires_at: now + Duration::hours(24),
		hit_count: 7,
	});

	let report =
		harness.service.set_product_active(1, false).await.expect("State change failed.");

	assert_eq!(report.deleted, 2);
	assert!(!report.active);
	assert!(harness.cache.is_empty());

	let mut request = LookupRequest::new("安心保重疾险");

	request.match_threshold = Some(0.95);

	match harness.service.lookup(request).await.expect("Lookup failed.") {
		LookupResponse::NotFound(not_found) =>
			assert_eq!(not_found.not_found.reason, NotFoundReason::NoSimilarProduct),
		LookupResponse::Card(response) =>
			panic!("Inactive product must not be served: {:?}", response.card.strategy),
	}
}

#[tokio::test]
async fn deactivating_any_product_behind_a_card_drops_it() {
	let (products, clauses) = super::sibling_catalog();
	let harness = Harness::new(&products, clauses);

	harness.service.lookup(LookupRequest::new("安心")).await.expect("Lookup failed.");

	let stored = harness.cache.peek(&normalize("安心")).expect("Entry should exist.");

	assert_eq!(stored.product_keys, vec!["安心保重疾险", "安心保"]);
	assert!(stored.card.clause_map.contains_key(&21));

	let report =
		harness.service.set_product_active(2, false).await.expect("State change failed.");

	assert_eq!(report.deleted, 1);
	assert!(harness.cache.is_empty());

	let response =
		harness.service.lookup(LookupRequest::new("安心")).await.expect("Lookup failed.");
	let card = response.card().expect("Expected a card.");

	assert!(!card.cached);
	assert_eq!(card.clause_map.keys().copied().collect::<Vec<_>>(), vec![11]);
}

#[tokio::test]
async fn explicit_invalidation_leaves_other_products_alone() {
	let (products, clauses) = super::catalog();
	let harness = Harness::new(&products, clauses);

	for query in ["安心保重疾险", "乐享医疗险"] {
		harness.service.lookup(LookupRequest::new(query)).await.expect("Lookup failed.");
	}

	assert_eq!(harness.cache.len(), 2);

	let report =
		harness.service.invalidate_product(" 乐享 医疗险 ").await.expect("Invalidation failed.");

	assert_eq!(report.deleted, 1);
	assert!(harness.cache.peek(&normalize("安心保重疾险")).is_some());
	assert!(harness.cache.peek(&normalize("乐享医疗险")).is_none());
}

#[tokio::test]
async fn unknown_product_state_change_is_not_found() {
	let (products, clauses) = super::catalog();
	let harness = Harness::new(&products, clauses);

	assert!(matches!(
		harness.service.set_product_active(404, false).await,
		Err(pcard_service::Error::NotFound { .. })
	));
}
