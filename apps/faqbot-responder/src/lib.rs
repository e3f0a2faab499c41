pub mod error;
pub mod watcher;

pub use error::{PollError, WatchError};
pub use watcher::{PollReport, Poller, WatchPolicy, WatchSession, Watcher};

use std::{path::PathBuf, time::Duration};

use clap::Parser;
use time::OffsetDateTime;
use tracing_subscriber::EnvFilter;

use faqbot_mail::{ImapConnector, SmtpOutbound};
use faqbot_service::{Matcher, QueryEncoder, Responder};

#[derive(Debug, Parser)]
#[command(
	version = faqbot_cli::VERSION,
	rename_all = "kebab",
	styles = faqbot_cli::styles(),
)]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: PathBuf,
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = faqbot_config::load(&args.config)?;

	init_tracing(&config);

	let session = WatchSession::new(OffsetDateTime::now_utc());

	tracing::info!(started_at = %session.started_at(), "Watch session started.");

	let items = faqbot_matching::load_csv(&config.catalog.path)?;

	tracing::info!(
		entries = items.len(),
		path = %config.catalog.path.display(),
		"Catalog loaded."
	);

	let embedding = &config.providers.embedding;
	faqbot_service::prepare_embedding_provider(embedding).await?;

	let provider = faqbot_service::embedding_provider(embedding)?;
	let encoder = QueryEncoder::new(provider, embedding.clone());
	let index = faqbot_service::build_index(&encoder, items).await?;
	let matcher = Matcher::new(encoder, index)?;
	let outbound = SmtpOutbound::new(&config.smtp, &config.account)?;
	let responder = Responder::new(
		matcher,
		Box::new(outbound),
		config.reply_from(),
		config.smtp.reply_subject.clone(),
	);
	let poller = Poller::new(
		responder,
		session,
		WatchPolicy::from(&config.watch),
		config.mailbox.folder.clone(),
	);
	let connector = ImapConnector::new(&config.mailbox, &config.account);
	let mut watcher = Watcher::new(
		Box::new(connector),
		poller,
		Duration::from_secs(config.watch.poll_interval_seconds),
	);

	tracing::info!(
		host = %config.mailbox.host,
		folder = %config.mailbox.folder,
		poll_interval_seconds = config.watch.poll_interval_seconds,
		"Watching mailbox."
	);

	watcher.run().await?;

	Ok(())
}

fn init_tracing(config: &faqbot_config::Config) {
	let filter =
		EnvFilter::try_new(&config.service.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

	tracing_subscriber::fmt().with_env_filter(filter).init();
}
