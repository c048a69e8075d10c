pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Not found: {message}")]
	NotFound { message: String },
	#[error("Upstream {service} call failed: {message}")]
	Upstream { service: &'static str, message: String },
	#[error("Generated card violates the schema: {details}")]
	SchemaViolation { details: String, raw: String },
	#[error("Storage error: {message}")]
	Storage { message: String },
}
impl Error {
	pub(crate) fn upstream(service: &'static str, err: impl std::fmt::Display) -> Self {
		Self::Upstream { service, message: err.to_string() }
	}
}

impl From<pcard_storage::Error> for Error {
	fn from(err: pcard_storage::Error) -> Self {
		match err {
			pcard_storage::Error::Sqlx(inner) => Self::Storage { message: inner.to_string() },
			pcard_storage::Error::InvalidArgument(message) => Self::InvalidRequest { message },
			pcard_storage::Error::NotFound(message) => Self::NotFound { message },
		}
	}
}
