use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = pcard_api::Args::parse();

	pcard_api::run(args).await
}
