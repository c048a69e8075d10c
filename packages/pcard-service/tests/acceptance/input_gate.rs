use pcard_domain::input_gate::RejectCode;
use pcard_service::{LookupRequest, LookupResponse, NotFoundReason};

use super::Harness;

#[tokio::test]
async fn malformed_queries_are_rejected_before_any_upstream_call() {
	let (products, clauses) = super::catalog();
	let harness = Harness::new(&products, clauses);

	for query in ["a", "12345", "!!!!!", "   ", "ab", "哈哈哈哈"] {
		let response = harness
			.service
			.lookup(LookupRequest::new(query))
			.await
			.expect("Lookup should answer rejected input.");

		match response {
			LookupResponse::NotFound(not_found) => {
				assert_eq!(not_found.not_found.reason, NotFoundReason::InvalidInput, "{query:?}");
				assert!(not_found.not_found.message.is_some());
			},
			LookupResponse::Card(_) => panic!("Query {query:?} should have been rejected."),
		}
	}

	assert_eq!(harness.upstream_calls(), 0);
	assert!(harness.cache.is_empty());
}

#[tokio::test]
async fn queries_without_a_searchable_key_never_reach_the_cache() {
	let (products, clauses) = super::catalog();
	let harness = Harness::new(&products, clauses);

	for query in ["？！", "（ ）", "《》…"] {
		let response = harness
			.service
			.lookup(LookupRequest::new(query))
			.await
			.expect("Lookup should answer rejected input.");

		match response {
			LookupResponse::NotFound(not_found) => {
				assert_eq!(not_found.not_found.reason, NotFoundReason::InvalidInput, "{query:?}");
				assert_eq!(
					not_found.not_found.message.as_deref(),
					Some(RejectCode::RejectEmptyKey.message())
				);
			},
			LookupResponse::Card(_) => panic!("Query {query:?} should have been rejected."),
		}
	}

	assert_eq!(harness.upstream_calls(), 0);
	assert!(harness.cache.is_empty());
}

#[tokio::test]
async fn invalid_parameters_are_request_errors() {
	let (products, clauses) = super::catalog();
	let harness = Harness::new(&products, clauses);
	let mut request = LookupRequest::new("安心保重疾险");

	request.match_count = Some(0);

	assert!(matches!(
		harness.service.lookup(request.clone()).await,
		Err(pcard_service::Error::InvalidRequest { .. })
	));

	request.match_count = None;
	request.match_threshold = Some(1.5);

	assert!(matches!(
		harness.service.lookup(request).await,
		Err(pcard_service::Error::InvalidRequest { .. })
	));
	assert_eq!(harness.upstream_calls(), 0);
}
