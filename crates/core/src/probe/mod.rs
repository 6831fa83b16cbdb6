use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{MediaEngine, Result, WaveVizError};

/// The parts of `ffprobe -print_format json -show_format -show_streams`
/// output that the visualiser reads. Everything is optional so that audio
/// and image probes share one shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProbeReport {
    #[serde(default)]
    pub streams: Vec<ProbeStream>,
    #[serde(default)]
    pub format: Option<ProbeFormat>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProbeStream {
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProbeFormat {
    /// ffprobe reports durations as decimal strings, e.g. `"5.000000"`.
    #[serde(default)]
    pub duration: Option<String>,
}

impl ProbeReport {
    /// Parses raw ffprobe JSON.
    pub fn from_json(path: &Path, raw: &[u8]) -> Result<Self> {
        serde_json::from_slice(raw)
            .map_err(|err| WaveVizError::probe(path, format!("unreadable ffprobe output: {err}")))
    }

    /// Container duration in seconds.
    pub fn duration_seconds(&self, path: &Path) -> Result<f64> {
        let raw = self
            .format
            .as_ref()
            .and_then(|format| format.duration.as_deref())
            .ok_or_else(|| WaveVizError::probe(path, "missing format.duration"))?;
        let seconds: f64 = raw
            .trim()
            .parse()
            .map_err(|_| WaveVizError::probe(path, format!("unparsable duration `{raw}`")))?;
        if !seconds.is_finite() || seconds < 0.0 {
            return Err(WaveVizError::probe(path, format!("invalid duration `{raw}`")));
        }
        Ok(seconds)
    }

    /// Pixel `(width, height)` of the first stream.
    pub fn resolution(&self, path: &Path) -> Result<(u32, u32)> {
        let stream = self
            .streams
            .first()
            .ok_or_else(|| WaveVizError::probe(path, "no streams reported"))?;
        match (stream.width, stream.height) {
            (Some(width), Some(height)) if width > 0 && height > 0 => Ok((width, height)),
            (Some(_), Some(_)) => Err(WaveVizError::probe(path, "first stream has a zero dimension")),
            _ => Err(WaveVizError::probe(path, "first stream has no width/height")),
        }
    }
}

/// Metadata gathered once per run, immutable afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MediaMetadata {
    pub duration_seconds: f64,
    pub width: u32,
    pub height: u32,
}

impl MediaMetadata {
    /// Probes the audio and then the background image, sequentially.
    pub fn gather<E>(engine: &E, audio: &Path, background: &Path) -> Result<Self>
    where
        E: MediaEngine + ?Sized,
    {
        let duration_seconds = engine.probe(audio)?.duration_seconds(audio)?;
        tracing::debug!(?audio, duration_seconds, "probed audio");

        let (width, height) = engine.probe(background)?.resolution(background)?;
        tracing::debug!(?background, width, height, "probed background");

        Ok(Self {
            duration_seconds,
            width,
            height,
        })
    }
}
