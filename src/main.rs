use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use color_eyre::eyre::{Result, eyre};
use futures_util::future::join_all;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use imgflight::application::{LoadCoordinator, LoadPromise};
use imgflight::domain::{ByteSource, CacheStore, LoadRequest, LoadResult, RequestFlags};
use imgflight::infrastructure::cache::default_store_path;
use imgflight::infrastructure::{
    AppConfig, CliArgs, DiskFileStore, FileSource, HttpSource, MemoryBitmapCache, StandardDecoder,
    StorageManager, http_client,
};

fn init_logging(config: &AppConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.to_string()));

    if let Some(log_path) = config.effective_log_path() {
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)?;

        let file_layer = fmt::layer()
            .with_writer(file)
            .with_ansi(false)
            .with_target(true)
            .with_thread_ids(false);

        tracing_subscriber::registry()
            .with(filter)
            .with(file_layer)
            .init();

        info!(path = %log_path.display(), "Logging initialized");
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    Ok(())
}

fn load_config(args: &CliArgs) -> Result<AppConfig> {
    let mut config = StorageManager::resolve(args.config.as_deref())?.load()?;
    config.merge_with_args(args);
    Ok(config)
}

fn open_source(client: &reqwest::Client, source: &str) -> Arc<dyn ByteSource> {
    if source.starts_with("http://") || source.starts_with("https://") {
        Arc::new(HttpSource::new(client.clone(), source))
    } else {
        Arc::new(FileSource::new(source))
    }
}

fn build_request(args: &CliArgs, source: Arc<dyn ByteSource>) -> LoadRequest {
    let mut flags = RequestFlags::empty();
    flags.set(RequestFlags::ANIMATE, args.animate);
    flags.set(RequestFlags::DEEP_ZOOM, args.region.is_some());

    let mut request = LoadRequest::new(source).with_flags(flags);
    if let Some(sample) = args.sample {
        request = request.with_sample_size(sample.width, sample.height);
    }
    args.transforms
        .iter()
        .fold(request, |request, spec| request.with_transform(spec.build()))
}

fn save(result: &LoadResult, dir: &Path, index: usize) -> Result<()> {
    let Some(image) = &result.image else {
        return Err(eyre!("{} has no pixels", result.key));
    };
    std::fs::create_dir_all(dir)?;
    let path = dir.join(format!("{index:03}-{}.png", &result.key.digest()[..12]));
    image.save_with_format(&path, image::ImageFormat::Png)?;
    info!(key = %result.key, path = %path.display(), "Saved result");
    Ok(())
}

async fn run(args: CliArgs, config: AppConfig) -> Result<()> {
    let cache = Arc::new(MemoryBitmapCache::new(config.cache.memory_capacity));
    let store_dir = config
        .cache
        .store_dir
        .clone()
        .unwrap_or_else(default_store_path);
    let files = Arc::new(DiskFileStore::new(store_dir, config.cache.max_store_size).await?);
    let shared: Arc<dyn CacheStore> = cache.clone();
    let coordinator = LoadCoordinator::new(
        config.coordinator_settings(),
        shared,
        Arc::new(StandardDecoder::new()),
        files,
    );
    let client = http_client(config.network.timeout_secs)?;

    let promises: Vec<LoadPromise> = args
        .sources
        .iter()
        .map(|source| {
            let request = build_request(&args, open_source(&client, source));
            if args.lazy {
                coordinator.request_lazy_load(request)
            } else {
                coordinator.request(request)
            }
        })
        .collect();
    let outcomes = join_all(promises.into_iter().map(LoadPromise::wait)).await;

    let mut failures = 0usize;
    for (index, (source, outcome)) in args.sources.iter().zip(outcomes).enumerate() {
        let result = match (outcome, args.region) {
            (Ok(result), Some(region)) => {
                coordinator
                    .request_region(result, region, args.region_sample)
                    .await
            }
            (outcome, _) => outcome,
        };

        match result {
            Ok(result) => {
                println!(
                    "{source}: {} ({}, from {})",
                    result.key,
                    result
                        .dimensions()
                        .map_or_else(|| "no pixels".to_string(), |size| size.to_string()),
                    result.served_from
                );
                if let Some(dir) = &args.output
                    && let Err(e) = save(&result, dir, index)
                {
                    error!(source = %source, error = %e, "Failed to save result");
                    failures += 1;
                }
            }
            Err(e) => {
                error!(source = %source, error = %e, "Load failed");
                println!("{source}: failed: {e}");
                failures += 1;
            }
        }
    }

    println!("cache: {}", cache.stats());
    println!("coordinator: {}", coordinator.stats().await?);
    coordinator.shutdown().await;

    if failures > 0 {
        return Err(eyre!("{failures} of {} loads failed", args.sources.len()));
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = CliArgs::parse();
    let config = load_config(&args)?;

    init_logging(&config)?;

    info!(version = imgflight::VERSION, "Starting {}", imgflight::NAME);

    run(args, config).await
}
