use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use serde::Serialize;

use crate::{FilterGraph, LayoutGeometry, MediaEngine, MediaMetadata, Result, RunConfig, WaveVizError};

/// Everything derived for one run before ffmpeg is invoked.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Plan {
    pub metadata: MediaMetadata,
    pub layout: LayoutGeometry,
    pub graph: FilterGraph,
}

/// Result of [`Visualizer::run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// ffmpeg wrote the output file.
    Rendered,
    /// `dry_run` was set; nothing was executed.
    Planned,
}

/// Drives probe → layout → graph → execute against a [`MediaEngine`].
#[derive(Debug)]
pub struct Visualizer<E> {
    engine: E,
    interrupted: Option<Arc<AtomicBool>>,
}

impl<E: MediaEngine> Visualizer<E> {
    pub fn new(engine: E) -> Self {
        Self {
            engine,
            interrupted: None,
        }
    }

    /// Observes a flag set by a signal handler; stages stop with
    /// [`WaveVizError::Interrupted`] once it is raised.
    pub fn with_interrupt_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.interrupted = Some(flag);
        self
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Validates the config, probes both inputs and builds the graph.
    pub fn plan(&self, config: &RunConfig) -> Result<Plan> {
        config.validate()?;

        let metadata = self.stage(|| {
            MediaMetadata::gather(&self.engine, &config.audio, &config.background)
        })?;
        let layout = LayoutGeometry::compute(&metadata, &config.ratios);
        tracing::info!(
            duration = metadata.duration_seconds,
            width = metadata.width,
            height = metadata.height,
            waves_height = layout.waves_height,
            band_height = layout.waves_background_height,
            "computed layout"
        );

        let graph = FilterGraph::visualization(config, &metadata, &layout);
        graph.validate()?;
        self.check_interrupt()?;

        Ok(Plan {
            metadata,
            layout,
            graph,
        })
    }

    /// Plans and, unless `dry_run` is set, executes the graph.
    pub fn run(&self, config: &RunConfig) -> Result<(Plan, Outcome)> {
        let plan = self.plan(config)?;
        if config.dry_run {
            return Ok((plan, Outcome::Planned));
        }

        tracing::info!(output = ?config.output, "rendering");
        self.stage(|| self.engine.execute(&plan.graph))?;
        tracing::info!(output = ?config.output, "done");
        Ok((plan, Outcome::Rendered))
    }

    // A subprocess that dies from the user's Ctrl-C is reported as an
    // interrupt rather than as its own failure.
    fn stage<T>(&self, f: impl FnOnce() -> Result<T>) -> Result<T> {
        self.check_interrupt()?;
        let result = f();
        if result.is_err() && self.is_interrupted() {
            return Err(WaveVizError::Interrupted);
        }
        result
    }

    fn check_interrupt(&self) -> Result<()> {
        if self.is_interrupted() {
            tracing::warn!("interrupt received, stopping");
            return Err(WaveVizError::Interrupted);
        }
        Ok(())
    }

    fn is_interrupted(&self) -> bool {
        self.interrupted
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }
}
