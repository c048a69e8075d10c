use std::collections::BTreeSet;

use pcard_domain::card::Strategy;
use pcard_service::{LookupRequest, LookupResponse, NotFoundReason};

use super::Harness;

fn source_products(harness: &Harness, response: &LookupResponse) -> BTreeSet<i64> {
	let card = response.card().expect("Expected a card.");

	card.sources
		.iter()
		.map(|source| {
			harness
				.registry
				.clauses
				.iter()
				.find(|clause| clause.id == source.clause_id)
				.map(|clause| clause.product_id)
				.expect("Source must reference a catalog clause.")
		})
		.collect()
}

#[tokio::test]
async fn exact_product_name_keeps_only_that_product() {
	let (products, clauses) = super::catalog();
	let harness = Harness::new(&products, clauses);
	let response =
		harness.service.lookup(LookupRequest::new("安心保重疾险")).await.expect("Lookup failed.");
	let card = response.card().expect("Expected a card.");

	assert_eq!(card.strategy, Strategy::ProductNameMatch);
	assert_eq!(card.product_name.as_deref(), Some("安心保重疾险"));
	assert_eq!(source_products(&harness, &response), BTreeSet::from([1]));
	assert_eq!(card.clause_map.keys().copied().collect::<Vec<_>>(), vec![11, 12]);
	assert_eq!(card.insurer.source_clause_id, Some(11));
	assert!(!card.cached);
}

#[tokio::test]
async fn every_matched_product_survives_and_unmatched_rows_are_dropped() {
	let (products, clauses) = super::sibling_catalog();
	let harness = Harness::new(&products, clauses);
	let mut request = LookupRequest::new("安心");

	request.debug = true;

	let response = harness.service.lookup(request).await.expect("Lookup failed.");

	assert_eq!(source_products(&harness, &response), BTreeSet::from([1, 2]));

	let LookupResponse::Card(response) = response else {
		panic!("Expected a card.");
	};
	let debug = response.debug.expect("Debug block requested.");

	assert_eq!(response.card.strategy, Strategy::ProductNameMatch);
	assert_eq!(response.card.product_name.as_deref(), Some("安心保重疾险"));
	assert_eq!(response.card.clause_map.keys().copied().collect::<Vec<_>>(), vec![11, 21]);
	assert_eq!(debug.priority_product_ids, vec![1, 2]);
	assert_eq!(debug.matches.len(), 3);
	assert!(!debug.context.contains("[clause 31]"));
}

#[tokio::test]
async fn every_citation_resolves_against_the_card_clause_map() {
	let (products, clauses) = super::catalog();
	let harness = Harness::new(&products, clauses);
	let response =
		harness.service.lookup(LookupRequest::new("乐享医疗险")).await.expect("Lookup failed.");
	let card = response.card().expect("Expected a card.");

	for citation in card.citations() {
		match citation.source_clause_id {
			Some(id) => assert!(card.clause_map.contains_key(&id), "{}", citation.path),
			None => assert_eq!(citation.value, pcard_domain::card::FALLBACK_MARKER),
		}
	}
}

#[tokio::test]
async fn name_match_without_scored_clauses_reranks() {
	let (products, clauses) = super::catalog();
	let harness = Harness::new(&products, clauses);
	let response = harness
		.service
		.lookup(LookupRequest::new("长青终身寿险"))
		.await
		.expect("Lookup failed.");
	let card = response.card().expect("Expected a card.");

	assert_eq!(card.strategy, Strategy::ProductNameRerank);
	assert_eq!(card.product_name.as_deref(), Some("长青终身寿险"));
	assert_eq!(card.sources.first().map(|source| source.clause_id), Some(21));
}

#[tokio::test]
async fn unmatched_query_uses_similarity_alone_and_is_not_cached() {
	let (products, clauses) = super::catalog();
	let harness = Harness::new(&products, clauses);
	let mut request = LookupRequest::new("住院报销免赔额");

	request.match_count = Some(2);

	let response = harness.service.lookup(request).await.expect("Lookup failed.");
	let card = response.card().expect("Expected a card.");

	assert_eq!(card.strategy, Strategy::VectorOnly);
	assert_eq!(card.product_name, None);
	assert_eq!(card.clause_map.keys().copied().collect::<Vec<_>>(), vec![11, 21]);
	assert!(harness.cache.is_empty());
}

#[tokio::test]
async fn substring_fallback_runs_when_similarity_finds_nothing() {
	let (products, clauses) = super::catalog();
	let harness = Harness::new(&products, clauses);
	let mut request = LookupRequest::new("长青终身");

	request.match_threshold = Some(0.95);
	request.debug = true;

	let response = harness.service.lookup(request).await.expect("Lookup failed.");
	let LookupResponse::Card(response) = response else {
		panic!("Expected a card.");
	};
	let debug = response.debug.expect("Debug block requested.");

	assert_eq!(response.card.strategy, Strategy::FallbackIlike);
	assert_eq!(response.card.product_name.as_deref(), Some("长青终身寿险"));
	assert_eq!(response.card.clause_map.keys().copied().collect::<Vec<_>>(), vec![31]);
	assert!(debug.fallback_used);
	assert!(debug.matches.is_empty());
	assert!(debug.context.contains("【长青终身寿险】[clause 31]"));
}

#[tokio::test]
async fn no_name_match_and_no_similar_clause_is_not_found() {
	let (products, clauses) = super::catalog();
	let harness = Harness::new(&products, clauses);
	let mut request = LookupRequest::new("意外伤害险");

	request.match_threshold = Some(0.99);

	let response = harness.service.lookup(request).await.expect("Lookup failed.");

	match response {
		LookupResponse::NotFound(not_found) => {
			assert_eq!(not_found.not_found.reason, NotFoundReason::NoSimilarProduct);
			assert_eq!(not_found.not_found.query, "意外伤害险");
		},
		LookupResponse::Card(_) => panic!("Expected not found."),
	}

	assert_eq!(harness.generator.calls.load(std::sync::atomic::Ordering::SeqCst), 0);
	assert!(harness.cache.is_empty());
}
