mod api;
mod app;
mod cache;
mod commands;
mod config;
mod error;
mod event;
mod filters;
mod grouping;
mod logging;
mod news;
mod observer;
mod profile;
mod query;
mod session;
mod ui;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use color_eyre::Result;
use tracing::info;

use crate::api::types::NewsCategory;
use crate::api::{ApiClient, StaticToken};
use crate::config::Config;
use crate::session::Session;

#[derive(Parser, Debug)]
#[command(name = "newsboard")]
#[command(about = "A terminal Kanban board for your news reading list")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/newsboard/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Backend base URL, overrides api.url
  #[arg(short, long)]
  url: Option<String>,

  /// Category filter to start the board with
  #[arg(long)]
  category: Option<NewsCategory>,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;
  let _log_guard = logging::init()?;

  let args = Args::parse();

  // A bare --url is enough to run without a config file
  let mut config = match (Config::load(args.config.as_deref()), &args.url) {
    (Ok(config), _) => config,
    (Err(_), Some(url)) if args.config.is_none() => Config::for_url(url),
    (Err(e), _) => return Err(e),
  };
  if let Some(url) = args.url {
    config.api.url = url;
  }
  if let Some(category) = args.category {
    config.board.category = Some(category);
  }

  let token = Config::get_api_token()?;
  let client = ApiClient::new(&config.api, Arc::new(StaticToken(token)))?;
  info!(url = %client.base_url(), "starting newsboard");

  let session = Session::start(Arc::new(client), &config.cache);
  let mut app = app::App::new(&config, session);
  app.run().await?;

  Ok(())
}
