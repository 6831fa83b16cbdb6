//! Declarative ffmpeg filter graphs.
//!
//! A [`FilterGraph`] is an explicit value: numbered inputs, filter nodes that
//! each produce one labelled pad, and a single output sink. It can be
//! validated, logged or serialized before being rendered into the
//! `-filter_complex` argument list that ffmpeg consumes.

use std::{collections::HashSet, ffi::OsString, fmt, path::PathBuf};

use serde::{Deserialize, Serialize};

use crate::{LayoutGeometry, MediaMetadata, Result, RunConfig, WaveVizError};

/// Where an ffmpeg input comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InputSource {
    /// A regular file, passed as `-i <path>`.
    File(PathBuf),
    /// A libavfilter source expression, passed as `-f lavfi -i <expr>`.
    Lavfi(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StreamKind {
    Audio,
}

impl StreamKind {
    fn specifier(self) -> &'static str {
        match self {
            Self::Audio => "a",
        }
    }
}

/// Reference to something a filter or the sink can consume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PadRef {
    /// Input number `index`, optionally narrowed to one kind of stream.
    Input {
        index: usize,
        stream: Option<StreamKind>,
    },
    /// The output of an earlier filter node.
    Label(String),
}

impl PadRef {
    pub fn input(index: usize) -> Self {
        Self::Input {
            index,
            stream: None,
        }
    }

    /// Narrows an input reference to one kind of stream.
    pub fn stream(self, kind: StreamKind) -> Self {
        match self {
            Self::Input { index, .. } => Self::Input {
                index,
                stream: Some(kind),
            },
            label => label,
        }
    }

    /// `[0]`, `[0:a]` or `[s3]`, as written inside `-filter_complex`.
    fn filter_pad(&self) -> String {
        match self {
            Self::Input {
                index,
                stream: None,
            } => format!("[{index}]"),
            Self::Input {
                index,
                stream: Some(kind),
            } => format!("[{index}:{}]", kind.specifier()),
            Self::Label(label) => format!("[{label}]"),
        }
    }

    /// `0`, `0:a` or `[s3]`, as written after `-map`.
    fn map_spec(&self) -> String {
        match self {
            Self::Input {
                index,
                stream: None,
            } => index.to_string(),
            Self::Input {
                index,
                stream: Some(kind),
            } => format!("{index}:{}", kind.specifier()),
            Self::Label(label) => format!("[{label}]"),
        }
    }
}

/// Typed filter parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ArgValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for ArgValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(value) => write!(f, "{value}"),
            Self::Float(value) => write!(f, "{value}"),
            Self::Text(value) => f.write_str(value),
        }
    }
}

impl From<i64> for ArgValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for ArgValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for ArgValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for ArgValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FilterArg {
    Positional(ArgValue),
    Named(String, ArgValue),
}

impl FilterArg {
    pub fn positional(value: impl Into<ArgValue>) -> Self {
        Self::Positional(value.into())
    }

    pub fn named(key: impl Into<String>, value: impl Into<ArgValue>) -> Self {
        Self::Named(key.into(), value.into())
    }

    fn render(&self) -> String {
        match self {
            Self::Positional(value) => escape(&value.to_string(), OPTION_SPECIALS),
            Self::Named(key, value) => format!(
                "{}={}",
                escape(key, OPTION_SPECIALS),
                escape(&value.to_string(), OPTION_SPECIALS)
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterNode {
    pub name: String,
    pub args: Vec<FilterArg>,
    pub inputs: Vec<PadRef>,
    pub output: String,
}

impl FilterNode {
    fn render(&self) -> String {
        let mut out: String = self.inputs.iter().map(PadRef::filter_pad).collect();
        out.push_str(&self.name);
        if !self.args.is_empty() {
            let args: Vec<String> = self.args.iter().map(FilterArg::render).collect();
            out.push('=');
            out.push_str(&escape(&args.join(":"), GRAPH_SPECIALS));
        }
        out.push('[');
        out.push_str(&self.output);
        out.push(']');
        out
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputSink {
    pub maps: Vec<PadRef>,
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterGraph {
    pub inputs: Vec<InputSource>,
    pub nodes: Vec<FilterNode>,
    pub sink: OutputSink,
}

impl FilterGraph {
    /// Builds the waveform-over-image graph:
    ///
    /// ```text
    /// [0] audio ─ showwaves ─ format ─ colorchannelmixer ─┐
    /// [1] color ─ format ─ colorchannelmixer ─────────── overlay ─┐
    /// [2] image ───────────────────────────────────────────────── overlay ─ out
    /// [0:a] ───────────────────────────────────────────────────────────────  out
    /// ```
    pub fn visualization(
        config: &RunConfig,
        metadata: &MediaMetadata,
        layout: &LayoutGeometry,
    ) -> Self {
        let mut builder = GraphBuilder::new();

        let audio = builder.input(InputSource::File(config.audio.clone()));
        let color = builder.input(InputSource::Lavfi(format!(
            "color=c={}:s={}x{}:d={}s",
            config.background_color,
            layout.width,
            layout.waves_background_height,
            metadata.duration_seconds
        )));
        let image = builder.input(InputSource::File(config.background.clone()));

        let waves = builder.filter(
            "showwaves",
            vec![
                FilterArg::named("s", format!("{}x{}", layout.width, layout.waves_height)),
                FilterArg::named("mode", "cline"),
                FilterArg::named("colors", config.waves_color_spec()),
            ],
            vec![audio.clone()],
        );
        let waves = builder.tint(waves, config.waves_opacity);
        let strip = builder.tint(color, config.background_opacity);

        let band = builder.filter(
            "overlay",
            vec![
                FilterArg::positional(0_i64),
                FilterArg::positional(layout.waves_offset),
            ],
            vec![strip, waves],
        );
        let video = builder.filter(
            "overlay",
            vec![
                FilterArg::positional(0_i64),
                FilterArg::positional(layout.waves_background_offset),
            ],
            vec![image, band],
        );

        builder.output(
            vec![audio.stream(StreamKind::Audio), video],
            config.output.clone(),
        )
    }

    /// Checks that every pad is defined before use, labels are unique, every
    /// filter output is consumed exactly once and the sink maps something.
    pub fn validate(&self) -> Result<()> {
        let mut defined: HashSet<&str> = HashSet::new();
        let mut consumed: HashSet<&str> = HashSet::new();

        for node in &self.nodes {
            if node.inputs.is_empty() {
                return Err(WaveVizError::Graph(format!(
                    "filter `{}` has no inputs",
                    node.name
                )));
            }
            for pad in &node.inputs {
                self.check_pad(pad, &defined, &mut consumed)?;
            }
            if !defined.insert(node.output.as_str()) {
                return Err(WaveVizError::Graph(format!(
                    "pad [{}] is defined more than once",
                    node.output
                )));
            }
        }

        if self.sink.maps.is_empty() {
            return Err(WaveVizError::Graph("output maps no streams".into()));
        }
        for pad in &self.sink.maps {
            self.check_pad(pad, &defined, &mut consumed)?;
        }

        if let Some(node) = self
            .nodes
            .iter()
            .find(|node| !consumed.contains(node.output.as_str()))
        {
            return Err(WaveVizError::Graph(format!(
                "pad [{}] from `{}` is never consumed",
                node.output, node.name
            )));
        }
        Ok(())
    }

    fn check_pad<'a>(
        &self,
        pad: &'a PadRef,
        defined: &HashSet<&str>,
        consumed: &mut HashSet<&'a str>,
    ) -> Result<()> {
        match pad {
            PadRef::Input { index, .. } if *index >= self.inputs.len() => Err(
                WaveVizError::Graph(format!("input #{index} does not exist")),
            ),
            PadRef::Input { .. } => Ok(()),
            PadRef::Label(label) => {
                if !defined.contains(label.as_str()) {
                    return Err(WaveVizError::Graph(format!(
                        "pad [{label}] is used before it is defined"
                    )));
                }
                if !consumed.insert(label.as_str()) {
                    return Err(WaveVizError::Graph(format!(
                        "pad [{label}] is consumed more than once"
                    )));
                }
                Ok(())
            }
        }
    }

    /// The `-filter_complex` value.
    pub fn filter_complex(&self) -> String {
        self.nodes
            .iter()
            .map(FilterNode::render)
            .collect::<Vec<_>>()
            .join(";")
    }

    /// Inputs, filter graph, stream maps and output path, in the order ffmpeg
    /// expects them. Global flags such as `-y` are the engine's business.
    pub fn to_ffmpeg_args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = Vec::new();
        for input in &self.inputs {
            match input {
                InputSource::File(path) => {
                    args.push("-i".into());
                    args.push(path.clone().into_os_string());
                }
                InputSource::Lavfi(expr) => {
                    for flag in ["-f", "lavfi", "-i"] {
                        args.push(flag.into());
                    }
                    args.push(expr.into());
                }
            }
        }
        if !self.nodes.is_empty() {
            args.push("-filter_complex".into());
            args.push(self.filter_complex().into());
        }
        for pad in &self.sink.maps {
            args.push("-map".into());
            args.push(pad.map_spec().into());
        }
        args.push(self.sink.path.clone().into_os_string());
        args
    }
}

/// Incrementally assembles a [`FilterGraph`], labelling filter outputs
/// `s0`, `s1`, ... in creation order.
#[derive(Debug, Default)]
pub struct GraphBuilder {
    inputs: Vec<InputSource>,
    nodes: Vec<FilterNode>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn input(&mut self, source: InputSource) -> PadRef {
        self.inputs.push(source);
        PadRef::input(self.inputs.len() - 1)
    }

    pub fn filter(
        &mut self,
        name: impl Into<String>,
        args: Vec<FilterArg>,
        inputs: Vec<PadRef>,
    ) -> PadRef {
        let output = format!("s{}", self.nodes.len());
        self.nodes.push(FilterNode {
            name: name.into(),
            args,
            inputs,
            output: output.clone(),
        });
        PadRef::Label(output)
    }

    /// Converts to RGBA and scales the alpha channel by `opacity`.
    pub fn tint(&mut self, pad: PadRef, opacity: f64) -> PadRef {
        let rgba = self.filter("format", vec![FilterArg::positional("rgba")], vec![pad]);
        self.filter(
            "colorchannelmixer",
            vec![FilterArg::named("aa", opacity)],
            vec![rgba],
        )
    }

    pub fn output(self, maps: Vec<PadRef>, path: impl Into<PathBuf>) -> FilterGraph {
        FilterGraph {
            inputs: self.inputs,
            nodes: self.nodes,
            sink: OutputSink {
                maps,
                path: path.into(),
            },
        }
    }
}

/// Characters with meaning inside a single filter's `key=value:...` list.
const OPTION_SPECIALS: &[char] = &['\\', '\'', '=', ':'];
/// Characters with meaning at the filter graph level.
const GRAPH_SPECIALS: &[char] = &['\\', '\'', '[', ']', ',', ';'];

fn escape(text: &str, specials: &[char]) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        if specials.contains(&ch) {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario() -> FilterGraph {
        let config = RunConfig::new("song.mp3", "cover.png", "out.mp4");
        let metadata = MediaMetadata {
            duration_seconds: 5.0,
            width: 640,
            height: 360,
        };
        let layout = LayoutGeometry::compute(&metadata, &config.ratios);
        FilterGraph::visualization(&config, &metadata, &layout)
    }

    fn strings(args: Vec<OsString>) -> Vec<String> {
        args.into_iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn renders_the_default_visualization() {
        let graph = scenario();
        graph.validate().expect("default graph should be valid");
        let filter_complex = graph.filter_complex();

        assert_eq!(
            filter_complex,
            "[0]showwaves=s=640x54:mode=cline:colors=0xffffff[s0];\
             [s0]format=rgba[s1];\
             [s1]colorchannelmixer=aa=0.9[s2];\
             [1]format=rgba[s3];\
             [s3]colorchannelmixer=aa=0.5[s4];\
             [s4][s2]overlay=0:9[s5];\
             [2][s5]overlay=0:144[s6]"
        );
        assert_eq!(
            strings(graph.to_ffmpeg_args()),
            vec![
                "-i",
                "song.mp3",
                "-f",
                "lavfi",
                "-i",
                "color=c=0x000000:s=640x72:d=5s",
                "-i",
                "cover.png",
                "-filter_complex",
                filter_complex.as_str(),
                "-map",
                "0:a",
                "-map",
                "[s6]",
                "out.mp4",
            ]
        );
    }

    #[test]
    fn multiple_colors_share_one_showwaves_argument() {
        let mut config = RunConfig::new("a.wav", "bg.jpg", "o.mkv");
        config.waves_colors = vec!["red".into(), "0x00ff00".into(), "blue".into()];
        let metadata = MediaMetadata {
            duration_seconds: 12.5,
            width: 100,
            height: 100,
        };
        let layout = LayoutGeometry::compute(&metadata, &config.ratios);
        let graph = FilterGraph::visualization(&config, &metadata, &layout);

        assert!(graph
            .filter_complex()
            .starts_with("[0]showwaves=s=100x15:mode=cline:colors=red|0x00ff00|blue[s0]"));
        assert_eq!(
            graph.inputs[1],
            InputSource::Lavfi("color=c=0x000000:s=100x20:d=12.5s".into())
        );
    }

    #[test]
    fn negative_offsets_pass_through() {
        let mut builder = GraphBuilder::new();
        let a = builder.input(InputSource::File("a.png".into()));
        let b = builder.input(InputSource::File("b.png".into()));
        let out = builder.filter(
            "overlay",
            vec![FilterArg::positional(0_i64), FilterArg::positional(-45_i64)],
            vec![a, b],
        );
        let graph = builder.output(vec![out], "o.png");
        assert_eq!(graph.filter_complex(), "[0][1]overlay=0:-45[s0]");
    }

    #[test]
    fn escapes_special_characters_in_values() {
        let node = FilterNode {
            name: "drawtext".into(),
            args: vec![FilterArg::named("text", "a:b,c")],
            inputs: vec![PadRef::input(0)],
            output: "s0".into(),
        };
        assert_eq!(node.render(), r"[0]drawtext=text=a\\:b\,c[s0]");
    }

    #[test]
    fn rejects_dangling_and_reused_pads() {
        let mut graph = scenario();
        graph.nodes[1].inputs = vec![PadRef::Label("s9".into())];
        let err = graph.validate().unwrap_err();
        assert!(err.to_string().contains("[s9]"));

        let mut graph = scenario();
        graph.sink.maps.push(PadRef::Label("s6".into()));
        assert!(graph
            .validate()
            .unwrap_err()
            .to_string()
            .contains("more than once"));

        let mut graph = scenario();
        graph.sink.maps = vec![PadRef::input(0).stream(StreamKind::Audio)];
        assert!(graph
            .validate()
            .unwrap_err()
            .to_string()
            .contains("never consumed"));

        let mut graph = scenario();
        graph.sink.maps.push(PadRef::input(7));
        assert!(graph.validate().is_err());
    }

    #[test]
    fn serializes_for_inspection() {
        let graph = scenario();
        let json = serde_json::to_string(&graph).unwrap();
        let back: FilterGraph = serde_json::from_str(&json).unwrap();
        assert_eq!(back, graph);
    }
}
