use std::sync::Arc;

use pcard_service::PcardService;
use pcard_storage::db::Db;

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<PcardService>,
}
impl AppState {
	pub async fn new(config: pcard_config::Config) -> color_eyre::Result<Self> {
		let db = Db::connect(&config.storage.postgres).await?;

		db.ensure_schema(config.storage.vector_dim).await?;

		Ok(Self::from_service(PcardService::new(config, db)))
	}

	pub fn from_service(service: PcardService) -> Self {
		Self { service: Arc::new(service) }
	}
}
