use std::sync::{Arc, atomic::AtomicUsize};

use pcard_domain::card::Strategy;
use pcard_service::{
	Backends, BoxFuture, EmbeddingProvider, LookupRequest, PcardService, Providers, Result,
	pg::{PgCardCache, PgRegistry, PgVectorStore},
};
use pcard_storage::{db::Db, queries};
use pcard_testkit::TestDatabase;

use super::CitingGenerator;

struct AxisEmbedding;

impl EmbeddingProvider for AxisEmbedding {
	fn embed<'a>(
		&'a self,
		_cfg: &'a pcard_config::EmbeddingProviderConfig,
		_text: &'a str,
	) -> BoxFuture<'a, Result<Vec<f32>>> {
		Box::pin(async move { Ok(vec![1.0, 0.0, 0.0]) })
	}
}

#[tokio::test]
#[ignore = "Requires external Postgres with pgvector. Set PCARD_PG_DSN to run."]
async fn postgres_backed_lookup_caches_and_invalidates() {
	let Some(base_dsn) = pcard_testkit::env_dsn() else {
		eprintln!("Skipping postgres_backed_lookup; set PCARD_PG_DSN to run this test.");

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let cfg = super::test_config(test_db.dsn().to_string(), 3);
	let db = Db::connect(&cfg.storage.postgres).await.expect("Failed to connect to Postgres.");

	db.ensure_schema(cfg.storage.vector_dim).await.expect("Failed to ensure schema.");

	let product =
		queries::insert_product(&db.pool, "安心保重疾险", true).await.expect("Insert failed.");
	let clause_id = queries::insert_clause(
		&db.pool,
		product.product_id,
		"本合同等待期为90天。",
		Some([1.0, 0.0, 0.0].as_slice()),
	)
	.await
	.expect("Insert failed.");
	let db = Arc::new(db);
	let backends = Backends {
		registry: Arc::new(PgRegistry::new(db.clone())),
		vectors: Arc::new(PgVectorStore::new(db.clone())),
		providers: Providers::new(
			Arc::new(AxisEmbedding),
			Arc::new(CitingGenerator { forced_clause_id: None, calls: AtomicUsize::new(0) }),
		),
	};
	let service = PcardService::with_backends(cfg, backends, Arc::new(PgCardCache::new(db)));
	let first =
		service.lookup(LookupRequest::new("安心保重疾险")).await.expect("First lookup failed.");
	let card = first.card().expect("Expected a card.");

	assert_eq!(card.strategy, Strategy::ProductNameMatch);
	assert_eq!(card.insurer.source_clause_id, Some(clause_id));

	let second =
		service.lookup(LookupRequest::new("安心保重疾险")).await.expect("Second lookup failed.");

	assert!(second.card().expect("Expected a card.").cached);

	let report = service
		.set_product_active(product.product_id, false)
		.await
		.expect("State change failed.");

	assert_eq!(report.deleted, 1);

	drop(service);

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}
