// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Tally event pipeline server binary.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tally_server_config::ServerConfig;
use tally_server_db::SettingsRepository;
use tally_server_events::{
	EventsService, EventsServiceConfig, FlushConfig, ReaderConfig, RotateSaltJob, SaltStore,
};
use tally_server_jobs::JobScheduler;
use tokio_util::sync::CancellationToken;

mod logging;

/// Tally server - buffers, persists and aggregates analytics events.
#[derive(Parser, Debug)]
#[command(name = "tally-server", about = "Tally event pipeline server", version)]
struct Args {
	/// Path to the TOML config file
	#[arg(long, env = "TALLY_SERVER_CONFIG")]
	config: Option<PathBuf>,

	#[command(subcommand)]
	command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Show version information
	Version,
}

fn events_service_config(config: &ServerConfig) -> EventsServiceConfig {
	let events = &config.events;
	EventsServiceConfig {
		buffer_capacity: events.buffer_capacity,
		buffer_initial_capacity: events.buffer_initial_capacity,
		write_chunk_size: events.write_chunk_size,
		flush: FlushConfig {
			interval: events.flush_interval(),
			shutdown_interval: events.shutdown_flush_interval(),
			drain_timeout: events.shutdown_drain_timeout(),
		},
		reader: ReaderConfig {
			cache_ttl: events.analytics_cache_ttl(),
			query_concurrency: events.analytics_query_concurrency,
			top_limit: events.analytics_top_limit,
			window_days: events.analytics_window_days,
		},
		deletion_delay: config.jobs.deletion_delay(),
	}
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let args = Args::parse();

	if let Some(Command::Version) = args.command {
		println!("tally-server version: {}", env!("CARGO_PKG_VERSION"));
		return Ok(());
	}

	// Load .env file if present
	dotenvy::dotenv().ok();

	let config = match &args.config {
		Some(path) => tally_server_config::load_config_with_file(path)?,
		None => tally_server_config::load_config()?,
	};

	logging::init(&config.logging);

	tracing::info!(database = %config.database.url, "starting tally-server");

	let pool = tally_server_db::create_pool(&config.database.url).await?;
	tally_server_db::run_migrations(&pool).await?;

	let salt = Arc::new(SaltStore::load(SettingsRepository::new(pool.clone())).await?);

	let mut scheduler = JobScheduler::new();
	scheduler.register_periodic(
		Arc::new(RotateSaltJob::new(Arc::clone(&salt))),
		config.jobs.salt_rotation_interval(),
	);
	let scheduler = Arc::new(scheduler);
	scheduler.start();

	let service = EventsService::new(
		pool.clone(),
		Arc::clone(&salt),
		Arc::clone(&scheduler),
		events_service_config(&config),
	)?;

	let shutdown = CancellationToken::new();
	let flush_handle = service.flush_loop().spawn(shutdown.clone());
	let refresher_handle =
		Arc::clone(&salt).spawn_refresher(config.events.salt_refresh_interval(), shutdown.clone());

	tokio::signal::ctrl_c().await?;
	tracing::info!("Received shutdown signal");

	// Tracking calls still running must reach the buffer before the final drain.
	service.drain_tracking().await;
	shutdown.cancel();

	if let Err(e) = flush_handle.await {
		tracing::error!(error = %e, "Flush loop task failed");
	}
	if let Err(e) = refresher_handle.await {
		tracing::error!(error = %e, "Salt refresher task failed");
	}

	tracing::info!("Shutting down job scheduler...");
	scheduler.shutdown().await;
	pool.close().await;

	tracing::info!(
		unflushed = service.buffered_events(),
		"Server shutdown complete"
	);
	Ok(())
}
