//! Core library for waveviz.
//!
//! waveviz lays an animated waveform of an audio file over a still image and
//! muxes the two into a video. The crate owns everything up to the hand-off
//! to ffmpeg: run configuration, metadata probing, band geometry, and a
//! declarative filter graph. Pixel work happens inside ffmpeg, reached
//! through the [`MediaEngine`] trait.

pub mod config;
pub mod engine;
pub mod error;
pub mod graph;
pub mod layout;
pub mod pipeline;
pub mod probe;

pub use config::{parse_unit_interval, RatioMode, RunConfig};
pub use engine::{FfmpegEngine, MediaEngine};
pub use error::{Result, WaveVizError};
pub use graph::{
    ArgValue, FilterArg, FilterGraph, FilterNode, GraphBuilder, InputSource, OutputSink, PadRef,
    StreamKind,
};
pub use layout::LayoutGeometry;
pub use pipeline::{Outcome, Plan, Visualizer};
pub use probe::{MediaMetadata, ProbeFormat, ProbeReport, ProbeStream};
