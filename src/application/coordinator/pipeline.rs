//! Stage computations: decode, deep zoom, transform and region.
//!
//! Each stage is a [`Job`] registered under its own key, so concurrent
//! requests share every stage they have in common.

use std::sync::Arc;

use futures_util::FutureExt;
use tracing::{debug, trace};

use super::Context;
use super::actor::Command;
use crate::application::services::{ChainStart, ChainStep, Job, LoadOutcome};
use crate::domain::entities::{CacheKey, LoadRequest, LoadResult, Rect, ServedFrom};
use crate::domain::errors::{LoadError, LoadFailure};

/// Runs a request through decode and every transform, then publishes the
/// final result.
pub(super) async fn run(ctx: &Arc<Context>, request: Arc<LoadRequest>) -> LoadOutcome {
    let plan = ctx
        .call(|reply| Command::Resolve {
            request: Arc::clone(&request),
            reply,
        })
        .await??;

    let mut current = match plan.start {
        ChainStart::Cached(result) => result,
        ChainStart::Decode(key) => {
            let job = if request.is_deep_zoom() {
                deep_zoom_job(ctx, &request)
            } else {
                decode_job(ctx, &request)
            };
            ctx.acquire(key, job).await?
        }
    };

    for step in plan.steps {
        let job = transform_job(ctx, Arc::clone(&current), &step);
        current = ctx.acquire(step.key, job).await?;
    }

    debug!(key = %plan.final_key, "Load complete");
    ctx.publish(current).await
}

fn decode_job(ctx: &Arc<Context>, request: &Arc<LoadRequest>) -> Job {
    let ctx = Arc::clone(ctx);
    let request = Arc::clone(request);

    async move {
        let key = request.decode_key().clone();
        let fetched = request
            .source()
            .fetch()
            .await
            .map_err(LoadFailure::Transient)?;
        trace!(key = %key, size = fetched.bytes.len(), served_from = %fetched.served_from, "Fetched");

        let decoder = Arc::clone(&ctx.decoder);
        let bytes = fetched.bytes;
        let (target_width, target_height) = (request.sample_width(), request.sample_height());
        let animate = request.animate();
        let (options, decoded) = ctx
            .workers
            .run(move || {
                let options = decoder.probe(&bytes, target_width, target_height)?;
                let decoded = decoder.decode(&bytes, &options, animate)?;
                Ok((options, decoded))
            })
            .await?;

        let mime_type = options.mime_type.or(fetched.content_type);
        let mut result = LoadResult::decoded(key, mime_type, decoded.image, Some(options.size))
            .with_served_from(fetched.served_from);
        if let Some(animation) = decoded.animation {
            result = result.with_animation(animation);
        }
        Ok(Arc::new(result))
    }
    .boxed()
}

fn deep_zoom_job(ctx: &Arc<Context>, request: &Arc<LoadRequest>) -> Job {
    let ctx = Arc::clone(ctx);
    let request = Arc::clone(request);

    async move {
        let key = request.decode_key().clone();
        let path = ctx.files.path_for(&key);

        let served_from = if ctx.files.contains(&key).await {
            ServedFrom::DiskCache
        } else {
            let served_from = request
                .source()
                .fetch_to_file(&path)
                .await
                .map_err(LoadFailure::Transient)?;
            ctx.files
                .commit(&key)
                .await
                .map_err(LoadFailure::Transient)?;
            served_from
        };

        let decoder = Arc::clone(&ctx.decoder);
        let file = path.clone();
        let (target_width, target_height) = (request.sample_width(), request.sample_height());
        let (region_decoder, image) = ctx
            .workers
            .run(move || {
                let region_decoder = decoder.open_region_decoder(&file)?;
                let size = region_decoder.size();
                let sample_size = size.sample_size_for(target_width, target_height);
                let image = region_decoder.decode_region(Rect::full(size), sample_size)?;
                Ok((region_decoder, image))
            })
            .await?;

        let size = region_decoder.size();
        let mime_type = region_decoder.mime_type();
        debug!(key = %key, size = %size, served_from = %served_from, "Opened deep zoom source");
        Ok(Arc::new(
            LoadResult::decoded(key, mime_type, image, Some(size))
                .with_region_decoder(region_decoder, path)
                .with_served_from(served_from),
        ))
    }
    .boxed()
}

fn transform_job(ctx: &Arc<Context>, source: Arc<LoadResult>, step: &ChainStep) -> Job {
    let workers = ctx.workers.clone();
    let transform = Arc::clone(&step.transform);
    let key = step.key.clone();

    async move {
        let Some(image) = source.image.clone() else {
            return Err(LoadFailure::Terminal(LoadError::transform(
                transform.key(),
                "source has no pixels",
            )));
        };
        let output = workers.run(move || transform.apply(&image)).await?;
        trace!(key = %key, "Applied transform");

        Ok(Arc::new(
            LoadResult::decoded(key, source.mime_type.clone(), output, source.original_size)
                .with_served_from(source.served_from),
        ))
    }
    .boxed()
}

/// Decodes one rectangle through the source's open region decoder.
pub(super) fn region_job(
    ctx: &Arc<Context>,
    key: CacheKey,
    source: Arc<LoadResult>,
    region: Rect,
    sample_size: u32,
) -> Job {
    let workers = ctx.workers.clone();

    async move {
        let Some(decoder) = source.region_decoder.clone() else {
            return Err(LoadFailure::Terminal(LoadError::MissingDecoder {
                key: source.key.to_string(),
            }));
        };
        let mime_type = decoder.mime_type();
        let size = decoder.size();
        let image = workers
            .run(move || decoder.decode_region(region, sample_size))
            .await?;
        trace!(key = %key, "Decoded region");

        Ok(Arc::new(
            LoadResult::decoded(key, mime_type, image, Some(size))
                .with_served_from(source.served_from),
        ))
    }
    .boxed()
}
