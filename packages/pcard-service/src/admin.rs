use serde::Serialize;

use crate::{PcardService, Result};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidationReport {
	pub product_name: String,
	pub deleted: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductStateReport {
	pub product_id: i64,
	pub name: String,
	pub active: bool,
	pub deleted: u64,
}

impl PcardService {
	pub async fn invalidate_product(&self, product_name: &str) -> Result<InvalidationReport> {
		let deleted = self.cache.invalidate(product_name).await?;

		Ok(InvalidationReport { product_name: product_name.trim().to_string(), deleted })
	}

	/// Flips a product's active flag, then drops every cached card tied to it. A card for a
	/// product that was just deactivated must never be served again.
	pub async fn set_product_active(
		&self,
		product_id: i64,
		active: bool,
	) -> Result<ProductStateReport> {
		let product = self.backends.registry.set_active(product_id, active).await?;
		let deleted = self.cache.invalidate(&product.name).await?;

		tracing::info!(product_id, active, deleted, "Product state changed.");

		Ok(ProductStateReport { product_id: product.id, name: product.name, active, deleted })
	}
}
