use clap::Parser;

#[tokio::main(flavor = "current_thread")]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;
	let args = faqbot_responder::Args::parse();
	faqbot_responder::run(args).await
}
