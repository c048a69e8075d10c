use std::sync::{
	Arc,
	atomic::{AtomicUsize, Ordering},
};

use pcard_service::{
	BoxFuture, CacheEntry, CardCacheStore, ClauseVectorStore, Error, LookupRequest, PcardService,
	Result,
};

use super::{CitingGenerator, FailingVectors, Harness, SlowVectors};

/// Reads as empty and refuses every write.
#[derive(Default)]
struct ReadOnlyCacheStore {
	puts: AtomicUsize,
}

impl CardCacheStore for ReadOnlyCacheStore {
	fn get<'a>(&'a self, _key: &'a str) -> BoxFuture<'a, Result<Option<CacheEntry>>> {
		Box::pin(async move { Ok(None) })
	}

	fn put(&self, _entry: CacheEntry) -> BoxFuture<'_, Result<()>> {
		self.puts.fetch_add(1, Ordering::SeqCst);

		Box::pin(async move {
			Err(Error::Storage {
				message: "cannot execute INSERT in a read-only transaction".to_string(),
			})
		})
	}

	fn record_hit<'a>(&'a self, _key: &'a str) -> BoxFuture<'a, Result<Option<i64>>> {
		Box::pin(async move { Ok(None) })
	}

	fn remove<'a>(&'a self, _key: &'a str) -> BoxFuture<'a, Result<u64>> {
		Box::pin(async move { Ok(0) })
	}

	fn remove_for_product<'a>(
		&'a self,
		_product_key: &'a str,
		_raw_fragments: &'a [String],
	) -> BoxFuture<'a, Result<u64>> {
		Box::pin(async move { Ok(0) })
	}
}

#[tokio::test]
async fn cache_write_failure_still_returns_the_card() {
	let (products, clauses) = super::catalog();
	let harness = Harness::new(&products, clauses);
	let store = Arc::new(ReadOnlyCacheStore::default());
	let service = PcardService::with_backends(
		super::test_config("postgres://unused".to_string(), 3),
		harness.service.backends.clone(),
		store.clone(),
	);

	for _ in 0..2 {
		let response =
			service.lookup(LookupRequest::new("安心保重疾险")).await.expect("Lookup failed.");
		let card = response.card().expect("Expected a card.");

		assert!(!card.cached);
		assert_eq!(card.insurer.source_clause_id, Some(11));
	}

	assert_eq!(store.puts.load(Ordering::SeqCst), 2);
	assert_eq!(harness.generator.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn vector_store_failure_is_an_upstream_error() {
	let (products, clauses) = super::catalog();
	let harness = Harness::with_vectors(
		&products,
		clauses,
		Some(Arc::new(FailingVectors) as Arc<dyn ClauseVectorStore>),
	);

	match harness.service.lookup(LookupRequest::new("安心保重疾险")).await {
		Err(Error::Upstream { service, message }) => {
			assert_eq!(service, "vector_store");
			assert!(message.contains("connection reset"), "{message}");
		},
		other => panic!("Unexpected result: {other:?}"),
	}

	assert!(harness.cache.is_empty());
}

#[tokio::test]
async fn slow_vector_store_times_out() {
	let (products, clauses) = super::catalog();
	let harness = Harness::with_vectors(
		&products,
		clauses,
		Some(Arc::new(SlowVectors) as Arc<dyn ClauseVectorStore>),
	);

	match harness.service.lookup(LookupRequest::new("安心保重疾险")).await {
		Err(Error::Upstream { service, message }) => {
			assert_eq!(service, "vector_store");
			assert!(message.contains("Timed out"), "{message}");
		},
		other => panic!("Unexpected result: {other:?}"),
	}
}

#[tokio::test]
async fn citation_outside_the_context_is_a_schema_violation() {
	let (products, clauses) = super::catalog();
	let harness = Harness::with_generator(
		&products,
		clauses,
		CitingGenerator { forced_clause_id: Some(999), calls: AtomicUsize::new(0) },
	);

	match harness.service.lookup(LookupRequest::new("安心保重疾险")).await {
		Err(Error::SchemaViolation { details, raw }) => {
			assert!(details.contains("999"), "{details}");
			assert!(raw.contains("\"sourceClauseId\":999"), "{raw}");
		},
		other => panic!("Unexpected result: {other:?}"),
	}

	assert!(harness.cache.is_empty());
}
