use std::{collections::HashMap, error::Error as _, ffi::OsString, path::PathBuf};

use clap::{
    error::{ContextKind, ContextValue, ErrorKind},
    CommandFactory, Parser,
};
use waveviz_core::{
    config::{
        DEFAULT_BACKGROUND_COLOR, DEFAULT_BACKGROUND_OPACITY, DEFAULT_BACKGROUND_RATIO,
        DEFAULT_SHARED_RATIO, DEFAULT_WAVES_COLOR, DEFAULT_WAVES_OPACITY, DEFAULT_WAVES_RATIO,
    },
    parse_unit_interval, RatioMode, Result, RunConfig, WaveVizError,
};

#[derive(Parser, Debug)]
#[command(
    name = "waveviz",
    author,
    version,
    about = "Overlay an audio waveform on a still image and render it to video",
    long_about = None,
    allow_negative_numbers = true
)]
pub struct Cli {
    /// Input audio filename.
    #[arg(long)]
    audio: PathBuf,
    /// Visualization background image filename.
    #[arg(long)]
    background: PathBuf,
    /// Output video filename.
    #[arg(long)]
    output: PathBuf,
    /// Ratio of visualization background height to input image height (0.0-1.0).
    #[arg(
        long,
        value_parser = parse_unit_interval,
        default_value_t = DEFAULT_BACKGROUND_RATIO,
        conflicts_with = "vis_ratio"
    )]
    vis_background_to_vid_ratio: f64,
    /// Ratio of visualization waves height to input image height (0.0-1.0).
    #[arg(
        long,
        value_parser = parse_unit_interval,
        default_value_t = DEFAULT_WAVES_RATIO,
        conflicts_with = "vis_ratio"
    )]
    vis_waves_to_vid_ratio: f64,
    /// Single ratio used for both the waves and their background (0.0-1.0).
    /// Without a value, 0.2 is used.
    #[arg(long, value_parser = parse_unit_interval)]
    vis_ratio: Option<Option<f64>>,
    /// Colors for visualization waveforms.
    #[arg(long, num_args = 1.., default_value = DEFAULT_WAVES_COLOR)]
    vis_color: Vec<String>,
    /// Opacity of vis colors (0.0-1.0).
    #[arg(long, value_parser = parse_unit_interval, default_value_t = DEFAULT_WAVES_OPACITY)]
    vis_color_opacity: f64,
    /// Background color for visualization waveforms.
    #[arg(long, default_value = DEFAULT_BACKGROUND_COLOR)]
    background_color: String,
    /// Opacity for visualization background color (0.0-1.0).
    #[arg(long, value_parser = parse_unit_interval, default_value_t = DEFAULT_BACKGROUND_OPACITY)]
    background_color_opacity: f64,
    /// Overwrite the output file if it already exists.
    #[arg(long)]
    overwrite: bool,
    /// Probe the inputs and print the ffmpeg command instead of running it.
    #[arg(long)]
    dry_run: bool,
    /// Probe the inputs and print the planned filter graph as JSON.
    #[arg(long)]
    dump_graph: bool,
    /// ffmpeg executable.
    #[arg(long, default_value = "ffmpeg")]
    ffmpeg: PathBuf,
    /// ffprobe executable.
    #[arg(long, default_value = "ffprobe")]
    ffprobe: PathBuf,
}

/// A fully parsed command line.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub config: RunConfig,
    pub dump_graph: bool,
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
}

#[derive(Debug)]
pub enum Parsed {
    Run(Invocation),
    /// `--help` or `--version`; the caller prints it and exits successfully.
    Info(clap::Error),
}

impl From<Cli> for Invocation {
    fn from(cli: Cli) -> Self {
        let ratios = match cli.vis_ratio {
            Some(ratio) => RatioMode::Shared(ratio.unwrap_or(DEFAULT_SHARED_RATIO)),
            None => RatioMode::Dual {
                waves: cli.vis_waves_to_vid_ratio,
                background: cli.vis_background_to_vid_ratio,
            },
        };
        Self {
            config: RunConfig {
                audio: cli.audio,
                background: cli.background,
                output: cli.output,
                ratios,
                waves_colors: cli.vis_color,
                waves_opacity: cli.vis_color_opacity,
                background_color: cli.background_color,
                background_opacity: cli.background_color_opacity,
                overwrite: cli.overwrite,
                dry_run: cli.dry_run || cli.dump_graph,
            },
            dump_graph: cli.dump_graph,
            ffmpeg: cli.ffmpeg,
            ffprobe: cli.ffprobe,
        }
    }
}

/// Parses the process arguments (program name first). Unknown options and
/// stray values are dropped rather than rejected.
pub fn parse_args<I, T>(args: I) -> Result<Parsed>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let args = retain_known_args(args.into_iter().map(Into::into))?;
    match Cli::try_parse_from(args) {
        Ok(cli) => {
            let invocation = Invocation::from(cli);
            invocation.config.validate()?;
            Ok(Parsed::Run(invocation))
        }
        Err(err) if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            Ok(Parsed::Info(err))
        }
        Err(err) => Err(invalid_argument(&err)),
    }
}

fn invalid_argument(err: &clap::Error) -> WaveVizError {
    let options: Vec<&str> = match err.get(ContextKind::InvalidArg) {
        Some(ContextValue::String(arg)) => vec![option_name(arg)],
        Some(ContextValue::Strings(args)) => args.iter().map(|arg| option_name(arg)).collect(),
        _ => Vec::new(),
    };
    let option = if options.is_empty() {
        "arguments".to_string()
    } else {
        options.join(", ")
    };

    let reason = match (err.kind(), err.source()) {
        (ErrorKind::MissingRequiredArgument, _) if options.len() > 1 => {
            "required options not provided".to_string()
        }
        (ErrorKind::MissingRequiredArgument, _) => "required option not provided".to_string(),
        (_, Some(source)) => source.to_string(),
        (_, None) => err
            .render()
            .to_string()
            .lines()
            .next()
            .unwrap_or_default()
            .trim_start_matches("error: ")
            .to_string(),
    };
    WaveVizError::invalid_argument(option, reason)
}

/// `--audio <AUDIO>` -> `--audio`.
fn option_name(arg: &str) -> &str {
    arg.split_whitespace().next().unwrap_or(arg)
}

/// How many values a known option takes, keyed by `--long` / `-s` spelling.
fn option_arities() -> HashMap<String, usize> {
    let mut command = Cli::command();
    command.build();

    let mut arities = HashMap::new();
    for arg in command.get_arguments() {
        let arity = if arg.get_action().takes_values() {
            arg.get_num_args().map_or(1, |range| range.max_values())
        } else {
            0
        };
        if let Some(long) = arg.get_long() {
            arities.insert(format!("--{long}"), arity);
        }
        if let Some(short) = arg.get_short() {
            arities.insert(format!("-{short}"), arity);
        }
    }
    arities
}

/// Looks up an option by its exact spelling or, for long options, by an
/// unambiguous prefix (`--aud` for `--audio`).
fn resolve_option<'a>(
    arities: &'a HashMap<String, usize>,
    name: &str,
) -> Result<Option<(&'a str, usize)>> {
    if let Some((known, &arity)) = arities.get_key_value(name) {
        return Ok(Some((known.as_str(), arity)));
    }
    if !name.starts_with("--") || name.len() <= 2 {
        return Ok(None);
    }

    let mut candidates: Vec<(&'a str, usize)> = arities
        .iter()
        .filter(|(known, _)| known.starts_with("--") && known.starts_with(name))
        .map(|(known, &arity)| (known.as_str(), arity))
        .collect();
    match candidates.len() {
        0 => Ok(None),
        1 => Ok(candidates.pop()),
        _ => {
            let mut names: Vec<&str> = candidates.iter().map(|(known, _)| *known).collect();
            names.sort_unstable();
            Err(WaveVizError::invalid_argument(
                name,
                format!("ambiguous option: could match {}", names.join(", ")),
            ))
        }
    }
}

fn retain_known_args(args: impl Iterator<Item = OsString>) -> Result<Vec<OsString>> {
    let arities = option_arities();
    let mut args = args;
    let mut kept: Vec<OsString> = args.next().into_iter().collect();
    let mut pending = 0_usize;

    for arg in args {
        let text = arg.to_string_lossy().into_owned();
        if text == "--" {
            break;
        }

        let is_value = !text.starts_with('-') || text == "-" || text.parse::<f64>().is_ok();
        if is_value {
            if pending > 0 {
                pending -= 1;
                kept.push(arg);
            } else {
                tracing::debug!(arg = %text, "ignoring stray argument");
            }
            continue;
        }

        let (name, inline_value) = match text.split_once('=') {
            Some((name, value)) => (name, Some(value)),
            None => (text.as_str(), None),
        };
        match resolve_option(&arities, name)? {
            Some((known, arity)) => {
                pending = match inline_value {
                    Some(value) => {
                        kept.push(format!("{known}={value}").into());
                        arity.saturating_sub(1)
                    }
                    None => {
                        kept.push(known.into());
                        arity
                    }
                };
            }
            None => {
                tracing::debug!(arg = %text, "ignoring unknown option");
                pending = 0;
            }
        }
    }
    Ok(kept)
}

#[cfg(test)]
mod tests {
    use super::*;

    const REQUIRED: [&str; 7] = [
        "waveviz",
        "--audio",
        "song.mp3",
        "--background",
        "cover.png",
        "--output",
        "out.mp4",
    ];

    fn parse(extra: &[&str]) -> Result<Parsed> {
        parse_args(REQUIRED.iter().chain(extra).copied())
    }

    fn invocation(extra: &[&str]) -> Invocation {
        match parse(extra).expect("arguments should parse") {
            Parsed::Run(invocation) => invocation,
            Parsed::Info(info) => panic!("unexpected info output: {info}"),
        }
    }

    #[test]
    fn required_paths_with_defaults() {
        let invocation = invocation(&[]);
        assert_eq!(
            invocation.config,
            RunConfig::new("song.mp3", "cover.png", "out.mp4")
        );
        assert!(!invocation.dump_graph);
        assert_eq!(invocation.ffmpeg, PathBuf::from("ffmpeg"));
        assert_eq!(invocation.ffprobe, PathBuf::from("ffprobe"));
    }

    #[test]
    fn missing_required_flag_names_it() {
        let err = parse_args(["waveviz", "--background", "cover.png", "--output", "out.mp4"])
            .unwrap_err();
        match err {
            WaveVizError::InvalidArgument { option, reason } => {
                assert_eq!(option, "--audio");
                assert_eq!(reason, "required option not provided");
            }
            other => panic!("unexpected error: {other}"),
        }

        let err = parse_args(["waveviz", "--background", "cover.png"]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid value for `--audio, --output`: required options not provided"
        );
    }

    #[test]
    fn accepts_unit_interval_bounds() {
        let invocation = invocation(&[
            "--vis-color-opacity",
            "0",
            "--background-color-opacity",
            "1.0",
            "--vis-waves-to-vid-ratio",
            "1",
            "--vis-background-to-vid-ratio",
            "0.0",
        ]);
        assert_eq!(invocation.config.waves_opacity, 0.0);
        assert_eq!(invocation.config.background_opacity, 1.0);
        assert_eq!(
            invocation.config.ratios,
            RatioMode::Dual {
                waves: 1.0,
                background: 0.0
            }
        );
    }

    #[test]
    fn rejects_out_of_range_values() {
        for (flag, value) in [
            ("--vis-color-opacity", "1.5"),
            ("--background-color-opacity", "-0.5"),
            ("--vis-waves-to-vid-ratio", "2"),
            ("--vis-ratio", "-1"),
        ] {
            let err = parse(&[flag, value]).unwrap_err();
            match err {
                WaveVizError::InvalidArgument { option, reason } => {
                    assert!(option.contains(flag), "{option} should name {flag}");
                    assert!(reason.contains("not in range"), "{reason}");
                }
                other => panic!("unexpected error for {flag}: {other}"),
            }
        }

        let err = parse(&["--vis-color-opacity", "lots"]).unwrap_err();
        assert!(err.to_string().contains("not a floating-point literal"));
    }

    #[test]
    fn unknown_options_and_stray_values_are_ignored() {
        let invocation = invocation(&[
            "--frobnicate",
            "7",
            "stray",
            "--verbose",
            "--legacy=1",
            "--vis-color-opacity",
            "0.25",
            "leftover",
        ]);
        assert_eq!(invocation.config.waves_opacity, 0.25);
    }

    #[test]
    fn collects_multiple_colors() {
        let invocation = invocation(&["--vis-color", "red", "0x00ff00", "--background-color", "navy"]);
        assert_eq!(invocation.config.waves_colors, vec!["red", "0x00ff00"]);
        assert_eq!(invocation.config.background_color, "navy");
    }

    #[test]
    fn shared_ratio_preset() {
        let explicit = invocation(&["--vis-ratio", "0.3"]);
        assert_eq!(explicit.config.ratios, RatioMode::Shared(0.3));

        let bare = invocation(&["--vis-ratio"]);
        assert_eq!(bare.config.ratios, RatioMode::Shared(DEFAULT_SHARED_RATIO));

        let err = parse(&["--vis-ratio", "0.3", "--vis-waves-to-vid-ratio", "0.1"]).unwrap_err();
        assert!(matches!(err, WaveVizError::InvalidArgument { .. }));
    }

    #[test]
    fn inline_values_and_run_flags() {
        let invocation = invocation(&[
            "--vis-color-opacity=0.4",
            "--overwrite",
            "--dump-graph",
            "--ffmpeg",
            "/opt/bin/ffmpeg",
        ]);
        assert_eq!(invocation.config.waves_opacity, 0.4);
        assert!(invocation.config.overwrite);
        assert!(invocation.dump_graph);
        assert!(invocation.config.dry_run);
        assert_eq!(invocation.ffmpeg, PathBuf::from("/opt/bin/ffmpeg"));
    }

    #[test]
    fn unambiguous_prefixes_expand_to_long_options() {
        let parsed = parse_args([
            "waveviz",
            "--aud",
            "song.mp3",
            "--background",
            "cover.png",
            "--out",
            "out.mp4",
            "--vis-color-op=0.3",
            "--vis-w",
            "0.1",
        ])
        .unwrap();
        let Parsed::Run(invocation) = parsed else {
            panic!("expected a run invocation");
        };
        assert_eq!(invocation.config.audio, PathBuf::from("song.mp3"));
        assert_eq!(invocation.config.background, PathBuf::from("cover.png"));
        assert_eq!(invocation.config.output, PathBuf::from("out.mp4"));
        assert_eq!(invocation.config.waves_opacity, 0.3);
        assert_eq!(invocation.config.ratios.waves_ratio(), 0.1);
    }

    #[test]
    fn ambiguous_prefixes_are_rejected() {
        let err = parse(&["--background-c", "navy"]).unwrap_err();
        match err {
            WaveVizError::InvalidArgument { option, reason } => {
                assert_eq!(option, "--background-c");
                assert!(reason.contains("--background-color"), "{reason}");
                assert!(reason.contains("--background-color-opacity"), "{reason}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn help_is_informational() {
        let parsed = parse_args(["waveviz", "--help"]).unwrap();
        assert!(matches!(parsed, Parsed::Info(_)));
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }
}
