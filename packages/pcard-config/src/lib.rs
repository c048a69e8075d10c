mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Cache, Config, Context, EmbeddingProviderConfig, LlmProviderConfig, Postgres, Providers,
	Retrieval, Security, Service, Storage,
};

use std::{fs, path::Path};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;
	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.http_bind.trim().is_empty() {
		return Err(invalid("service.http_bind", "must be non-empty."));
	}
	if cfg.service.admin_bind.trim().is_empty() {
		return Err(invalid("service.admin_bind", "must be non-empty."));
	}
	if cfg.storage.postgres.pool_max_conns == 0 {
		return Err(invalid("storage.postgres.pool_max_conns", "must be greater than zero."));
	}
	if cfg.providers.embedding.dimensions == 0 {
		return Err(invalid("providers.embedding.dimensions", "must be greater than zero."));
	}
	if cfg.providers.embedding.dimensions != cfg.storage.vector_dim {
		return Err(invalid("providers.embedding.dimensions", "must match storage.vector_dim."));
	}

	for (field, key) in [
		("providers.embedding.api_key", &cfg.providers.embedding.api_key),
		("providers.generation.api_key", &cfg.providers.generation.api_key),
	] {
		if key.trim().is_empty() {
			return Err(invalid(field, "must be non-empty."));
		}
	}

	if !cfg.providers.generation.temperature.is_finite() {
		return Err(invalid("providers.generation.temperature", "must be a finite number."));
	}

	let retrieval = &cfg.retrieval;

	if retrieval.default_match_count == 0 {
		return Err(invalid("retrieval.default_match_count", "must be greater than zero."));
	}
	if retrieval.default_match_count > retrieval.max_match_count {
		return Err(invalid(
			"retrieval.default_match_count",
			"must not exceed retrieval.max_match_count.",
		));
	}
	if !retrieval.default_match_threshold.is_finite()
		|| !(0.0..=1.0).contains(&retrieval.default_match_threshold)
	{
		return Err(invalid("retrieval.default_match_threshold", "must be in the range 0.0-1.0."));
	}
	if retrieval.overfetch_factor == 0 {
		return Err(invalid("retrieval.overfetch_factor", "must be greater than zero."));
	}
	if retrieval.rpc_timeout_ms == 0 {
		return Err(invalid("retrieval.rpc_timeout_ms", "must be greater than zero."));
	}
	if cfg.context.max_chars == 0 {
		return Err(invalid("context.max_chars", "must be greater than zero."));
	}
	if cfg.context.snippet_chars == 0 {
		return Err(invalid("context.snippet_chars", "must be greater than zero."));
	}
	if cfg.context.snippet_chars > cfg.context.max_chars {
		return Err(invalid("context.snippet_chars", "must not exceed context.max_chars."));
	}
	if cfg.cache.ttl_hours <= 0 {
		return Err(invalid("cache.ttl_hours", "must be greater than zero."));
	}

	Ok(())
}

fn invalid(field: &'static str, message: &str) -> Error {
	Error::Validation { field, message: message.to_string() }
}

fn normalize(cfg: &mut Config) {
	if cfg
		.security
		.admin_auth_token
		.as_deref()
		.map(|token| token.trim().is_empty())
		.unwrap_or(false)
	{
		cfg.security.admin_auth_token = None;
	}

	cfg.providers.embedding.api_base =
		cfg.providers.embedding.api_base.trim_end_matches('/').to_string();
	cfg.providers.generation.api_base =
		cfg.providers.generation.api_base.trim_end_matches('/').to_string();
}
