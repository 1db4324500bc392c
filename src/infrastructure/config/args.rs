use super::app_config::LogLevel;
use clap::Parser;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use crate::domain::entities::{Rect, Size};
use crate::domain::ports::Transform;
use crate::infrastructure::image::{Blur, Grayscale, Resize, Rotate};

/// Command-line arguments.
#[derive(Debug, Parser)]
#[command(
    name = "imgflight",
    version,
    about = "Load images through a single-flight decode and transform cache",
    long_about = None
)]
pub struct CliArgs {
    /// Image URLs or file paths.
    #[arg(required = true, value_name = "SOURCE")]
    pub sources: Vec<String>,

    /// Transform to apply, in order. Repeatable.
    /// One of `resize:WxH`, `grayscale`, `blur:SIGMA`, `rotate:DEGREES`.
    #[arg(short, long = "transform", value_name = "SPEC")]
    pub transforms: Vec<TransformSpec>,

    /// Target size used to pick a decode sample size.
    #[arg(long, value_name = "WxH", value_parser = parse_size)]
    pub sample: Option<Size>,

    /// Queue the loads behind the lazy-load admission budget.
    #[arg(long)]
    pub lazy: bool,

    /// Decode every frame of animated images.
    #[arg(long)]
    pub animate: bool,

    /// Open as deep zoom and decode only this region (`left,top,width,height`).
    #[arg(long, value_name = "RECT", value_parser = parse_rect)]
    pub region: Option<Rect>,

    /// Sample size for region decodes.
    #[arg(long, default_value_t = 1)]
    pub region_sample: u32,

    /// Directory results are written to as PNG.
    #[arg(short, long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Configuration file path.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Log file path.
    #[arg(long, value_name = "PATH")]
    pub log_path: Option<PathBuf>,

    /// Log verbosity level.
    #[arg(long, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Decode and transform worker count.
    #[arg(long)]
    pub workers: Option<usize>,

    /// Lazy loads allowed to run at once.
    #[arg(long)]
    pub max_lazy_loads: Option<usize>,

    /// Soft entries kept in the in-memory cache.
    #[arg(long)]
    pub cache_capacity: Option<usize>,

    /// Directory for deep-zoom source files.
    #[arg(long, value_name = "DIR")]
    pub store_dir: Option<PathBuf>,
}

/// A transform named on the command line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TransformSpec {
    /// `resize:WxH`
    Resize(Size),
    /// `grayscale`
    Grayscale,
    /// `blur:SIGMA`
    Blur(f32),
    /// `rotate:DEGREES`
    Rotate(u32),
}

impl TransformSpec {
    /// Builds the transform.
    #[must_use]
    pub fn build(self) -> Arc<dyn Transform> {
        match self {
            Self::Resize(size) => Arc::new(Resize::new(size.width, size.height)),
            Self::Grayscale => Arc::new(Grayscale),
            Self::Blur(sigma) => Arc::new(Blur::new(sigma)),
            Self::Rotate(degrees) => Arc::new(Rotate::new(degrees)),
        }
    }
}

impl FromStr for TransformSpec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, arg) = s.split_once(':').unwrap_or((s, ""));
        match (name, arg) {
            ("grayscale", "") => Ok(Self::Grayscale),
            ("resize", arg) => parse_size(arg).map(Self::Resize),
            ("blur", arg) => arg
                .parse()
                .map(Self::Blur)
                .map_err(|e| format!("invalid blur sigma `{arg}`: {e}")),
            ("rotate", arg) => arg
                .parse()
                .map(Self::Rotate)
                .map_err(|e| format!("invalid rotation `{arg}`: {e}")),
            _ => Err(format!("unknown transform `{s}`")),
        }
    }
}

/// Parses `WxH`.
fn parse_size(s: &str) -> Result<Size, String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WxH, got `{s}`"))?;
    let width = w.parse().map_err(|e| format!("invalid width `{w}`: {e}"))?;
    let height = h.parse().map_err(|e| format!("invalid height `{h}`: {e}"))?;
    Ok(Size::new(width, height))
}

/// Parses `left,top,width,height`.
fn parse_rect(s: &str) -> Result<Rect, String> {
    let parts = s
        .split(',')
        .map(|p| p.trim().parse::<u32>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| format!("invalid rectangle `{s}`: {e}"))?;
    match parts[..] {
        [left, top, width, height] => Ok(Rect::new(left, top, width, height)),
        _ => Err(format!("expected left,top,width,height, got `{s}`")),
    }
}
