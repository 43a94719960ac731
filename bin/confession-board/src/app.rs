//! Assembles a `Session` from settings: one adapter per port.

use std::sync::Arc;

use anyhow::{Context, Result};
use cb_cache_file::FileCache;
use cb_config::{DeviceSettings, LogFormat, LogSettings, Settings};
use cb_db_sqlite::SqliteStore;
use cb_device_local::{DeviceOverrides, LocalDeviceProbe};
use cb_services::{FeedService, IdentityResolver, RandomIdSource, ReactionCoordinator, Session};
use cb_storage_local::LocalMediaStore;
use secrecy::ExposeSecret;
use tracing_subscriber::EnvFilter;

/// `RUST_LOG` wins over the configured level; `--verbose` forces debug.
pub fn init_tracing(log: &LogSettings, verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log.level))
    };
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match log.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

pub async fn build_session(settings: &Settings) -> Result<Session> {
    let store = Arc::new(
        SqliteStore::connect(settings.database.url.expose_secret())
            .await
            .context("opening the record store")?,
    );
    let cache = Arc::new(FileCache::open(&settings.cache.path));
    let media = Arc::new(LocalMediaStore::new(&settings.media.root, settings.media.url_prefix.as_str()));
    let probe = Arc::new(LocalDeviceProbe::detect(device_overrides(&settings.device)));

    let resolver = IdentityResolver::new(
        store.clone(),
        cache,
        Arc::new(RandomIdSource),
        settings.resolver_config(),
    );
    let feed = FeedService::new(store.clone(), media)
        .with_limits(settings.submission_limits())
        .with_page_size(settings.feed.page_size);

    Ok(Session::new(resolver, probe, ReactionCoordinator::new(store), feed))
}

fn device_overrides(device: &DeviceSettings) -> DeviceOverrides {
    DeviceOverrides {
        user_agent: device.user_agent.clone(),
        language: device.language.clone(),
        platform: device.platform.clone(),
        screen_resolution: device.screen_resolution.clone(),
        timezone: device.timezone.clone(),
        canvas: device.canvas.clone(),
    }
}
