mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Account, BacklogPolicy, Catalog, Config, EmbeddingKind, EmbeddingProviderConfig, Mailbox,
	Providers, SeenPolicy, Service, Smtp, Watch,
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
	for (label, value) in [
		("service.log_level", &cfg.service.log_level),
		("mailbox.host", &cfg.mailbox.host),
		("mailbox.folder", &cfg.mailbox.folder),
		("smtp.host", &cfg.smtp.host),
		("account.username", &cfg.account.username),
		("account.credential", &cfg.account.credential),
		("providers.embedding.provider_id", &cfg.providers.embedding.provider_id),
		("providers.embedding.model", &cfg.providers.embedding.model),
	] {
		if value.trim().is_empty() {
			return Err(Error::Validation { message: format!("{label} must be non-empty.") });
		}
	}

	if cfg.mailbox.port == 0 {
		return Err(Error::Validation {
			message: "mailbox.port must be greater than zero.".to_string(),
		});
	}
	if cfg.smtp.port == 0 {
		return Err(Error::Validation {
			message: "smtp.port must be greater than zero.".to_string(),
		});
	}
	if cfg.mailbox.timeout_seconds == 0 {
		return Err(Error::Validation {
			message: "mailbox.timeout_seconds must be greater than zero.".to_string(),
		});
	}
	if cfg.smtp.timeout_seconds == 0 {
		return Err(Error::Validation {
			message: "smtp.timeout_seconds must be greater than zero.".to_string(),
		});
	}
	if cfg.smtp.reply_subject.trim().is_empty() {
		return Err(Error::Validation {
			message: "smtp.reply_subject must be non-empty.".to_string(),
		});
	}
	if !cfg.reply_from().contains('@') {
		return Err(Error::Validation {
			message: "smtp.from_address or account.username must be an email address."
				.to_string(),
		});
	}
	if cfg.catalog.path.as_os_str().is_empty() {
		return Err(Error::Validation { message: "catalog.path must be non-empty.".to_string() });
	}
	if cfg.watch.poll_interval_seconds == 0 {
		return Err(Error::Validation {
			message: "watch.poll_interval_seconds must be greater than zero.".to_string(),
		});
	}

	let embedding = &cfg.providers.embedding;

	if embedding.dimensions == 0 {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must be greater than zero.".to_string(),
		});
	}
	if embedding.batch_size == 0 {
		return Err(Error::Validation {
			message: "providers.embedding.batch_size must be greater than zero.".to_string(),
		});
	}
	if embedding.kind == EmbeddingKind::Http {
		if embedding.api_base.trim().is_empty() {
			return Err(Error::Validation {
				message: "providers.embedding.api_base must be non-empty for the http provider."
					.to_string(),
			});
		}
		if embedding.api_key.trim().is_empty() {
			return Err(Error::Validation {
				message: "providers.embedding.api_key must be non-empty.".to_string(),
			});
		}
		if embedding.timeout_ms == 0 {
			return Err(Error::Validation {
				message: "providers.embedding.timeout_ms must be greater than zero.".to_string(),
			});
		}
	}
	if embedding.kind == EmbeddingKind::LocalModel {
		if embedding.model_dir.as_os_str().is_empty() {
			return Err(Error::Validation {
				message: "providers.embedding.model_dir must be non-empty for the local_model provider."
					.to_string(),
			});
		}
		if embedding.max_tokens == 0 {
			return Err(Error::Validation {
				message: "providers.embedding.max_tokens must be greater than zero.".to_string(),
			});
		}
		if embedding.download && embedding.hub_url.trim().is_empty() {
			return Err(Error::Validation {
				message: "providers.embedding.hub_url must be non-empty when download is enabled."
					.to_string(),
			});
		}
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	if cfg.smtp.from_address.as_deref().map(|addr| addr.trim().is_empty()).unwrap_or(false) {
		cfg.smtp.from_address = None;
	}

	cfg.mailbox.host = cfg.mailbox.host.trim().to_string();
	cfg.smtp.host = cfg.smtp.host.trim().to_string();
	cfg.account.username = cfg.account.username.trim().to_string();

	let api_base = cfg.providers.embedding.api_base.trim().trim_end_matches('/').to_string();

	cfg.providers.embedding.api_base = api_base;

	let hub_url = cfg.providers.embedding.hub_url.trim().trim_end_matches('/').to_string();

	cfg.providers.embedding.hub_url = hub_url;
}
