//! # Run Configuration
//!
//! A run is described by an optional JSON file ([`RunConfig`]) with command
//! line flags ([`Cli`]) layered on top. The config also carries an input
//! script: a list of steps, each holding the pointer and keys for a number of
//! frames, so camera flights can be replayed headlessly.
//!
//! ```json
//! {
//!   "width": 320, "height": 240, "frames": 240,
//!   "render": { "max_tex": 128 },
//!   "script": [
//!     { "frames": 60 },
//!     { "frames": 30, "keys": ["forward"], "pointer": [0.55, 0.5] },
//!     { "frames": 1, "location": "mandelbulb;0;0.2;-1.05" }
//!   ]
//! }
//! ```

use anyhow::{ensure, Context, Result};
use clap::{Parser, ValueEnum};
use render::{InputSample, Key, RenderSettings};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// The Mandelbulb ray marcher.
    #[default]
    Cpu,
    /// An analytic ball, for smoke tests.
    Mock,
}

/// Headless progressive Mandelbulb renderer.
#[derive(Debug, Parser, Default)]
#[command(name = "bulbshell", version, about)]
pub struct Cli {
    /// JSON run configuration.
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Number of frames to run.
    #[arg(long)]
    pub frames: Option<u32>,
    /// Worker threads (defaults to the available parallelism).
    #[arg(long)]
    pub workers: Option<usize>,
    #[arg(long)]
    pub width: Option<u32>,
    #[arg(long)]
    pub height: Option<u32>,
    /// Directory that receives the run folder with exported frames.
    #[arg(long)]
    pub out: Option<PathBuf>,
    /// Starting location fragment, e.g. `mandelbulb;0;0;-1.1`.
    #[arg(long)]
    pub location: Option<String>,
    /// File holding a location fragment; edits move the camera.
    #[arg(long)]
    pub watch: Option<PathBuf>,
    /// Export every N-th composited frame (the last frame is always exported).
    #[arg(long)]
    pub every: Option<u32>,
    #[arg(long, value_enum)]
    pub backend: Option<BackendKind>,
    /// Stop early once the script is done and every visible tile is final.
    #[arg(long)]
    pub settle: bool,
}

/// One scripted stretch of input.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptStep {
    pub frames: u32,
    /// Normalized pointer position; absent means outside the viewport.
    pub pointer: Option<[f64; 2]>,
    pub keys: Vec<Key>,
    /// Jump here at the first frame of the step.
    pub location: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub width: u32,
    pub height: u32,
    pub frames: u32,
    /// Simulated frames per second; also bounds how long a frame waits for
    /// tiles.
    pub fps: f64,
    pub workers: Option<usize>,
    pub backend: BackendKind,
    pub out_dir: PathBuf,
    pub export_every: Option<u32>,
    pub location: Option<String>,
    pub watch: Option<PathBuf>,
    pub settle: bool,
    pub render: RenderSettings,
    pub script: Vec<ScriptStep>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            width: 320,
            height: 240,
            frames: 120,
            fps: 30.0,
            workers: None,
            backend: BackendKind::Cpu,
            out_dir: PathBuf::from("frames"),
            export_every: None,
            location: None,
            watch: None,
            settle: false,
            render: RenderSettings::default(),
            script: Vec::new(),
        }
    }
}

impl RunConfig {
    /// # Errors
    ///
    /// Fails when the file cannot be read or is not a valid config.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("failed to parse config {}", path.display()))
    }

    /// Config file (if any) with the command line applied on top.
    ///
    /// # Errors
    ///
    /// Fails when the config file cannot be loaded or the result is invalid.
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let mut config = match &cli.config {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        config.apply(cli);
        config.validate()?;
        Ok(config)
    }

    pub fn apply(&mut self, cli: &Cli) {
        if let Some(frames) = cli.frames {
            self.frames = frames;
        }
        if let Some(workers) = cli.workers {
            self.workers = Some(workers);
        }
        if let Some(width) = cli.width {
            self.width = width;
        }
        if let Some(height) = cli.height {
            self.height = height;
        }
        if let Some(out) = &cli.out {
            self.out_dir.clone_from(out);
        }
        if let Some(location) = &cli.location {
            self.location = Some(location.clone());
        }
        if let Some(watch) = &cli.watch {
            self.watch = Some(watch.clone());
        }
        if let Some(every) = cli.every {
            self.export_every = Some(every);
        }
        if let Some(backend) = cli.backend {
            self.backend = backend;
        }
        self.settle |= cli.settle;
    }

    /// # Errors
    ///
    /// Describes the first invalid field.
    pub fn validate(&self) -> Result<()> {
        ensure!(self.width > 0 && self.height > 0, "frame size must be non-zero");
        ensure!(self.fps.is_finite() && self.fps > 0.0, "fps must be positive");
        ensure!(self.workers != Some(0), "at least one worker is needed");
        ensure!(self.export_every != Some(0), "export interval must be non-zero");
        self.render.validate()
    }

    /// Worker count: configured, or one per available core.
    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.workers
            .unwrap_or_else(|| std::thread::available_parallelism().map_or(2, std::num::NonZeroUsize::get))
    }

    #[must_use]
    pub fn frame_seconds(&self) -> f64 {
        1.0 / self.fps
    }

    /// Frames covered by the script.
    #[must_use]
    pub fn script_frames(&self) -> u32 {
        self.script.iter().map(|s| s.frames).sum()
    }

    /// Input and location jump for `frame`. Past the end of the script the
    /// pointer is absent and no keys are held.
    #[must_use]
    pub fn input_at(&self, frame: u32) -> (InputSample, Option<&str>) {
        let dt = self.frame_seconds();
        let mut start = 0;
        for step in &self.script {
            if frame < start + step.frames {
                let input = InputSample {
                    pointer: step.pointer.map(|[x, y]| (x, y)),
                    keys: step.keys.clone(),
                    dt,
                };
                let jump = if frame == start { step.location.as_deref() } else { None };
                return (input, jump);
            }
            start += step.frames;
        }
        (InputSample::idle(dt), None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scripted() -> RunConfig {
        serde_json::from_str(
            r#"{
                "frames": 10,
                "script": [
                    { "frames": 2 },
                    { "frames": 3, "keys": ["forward", "left"], "pointer": [0.25, 0.75], "location": "mandelbulb;1;2;3" }
                ]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn script_steps_cover_their_frames() {
        let config = scripted();
        assert_eq!(config.script_frames(), 5);
        let (input, jump) = config.input_at(1);
        assert!(input.keys.is_empty() && input.pointer.is_none() && jump.is_none());
        let (input, jump) = config.input_at(2);
        assert_eq!(input.keys, vec![Key::Forward, Key::Left]);
        assert_eq!(input.pointer, Some((0.25, 0.75)));
        assert_eq!(jump, Some("mandelbulb;1;2;3"));
        assert_eq!(config.input_at(4).1, None);
        assert!(config.input_at(5).0.keys.is_empty());
    }

    #[test]
    fn cli_overrides_file_values() {
        let mut config = scripted();
        let cli = Cli {
            frames: Some(3),
            width: Some(64),
            backend: Some(BackendKind::Mock),
            settle: true,
            ..Cli::default()
        };
        config.apply(&cli);
        assert_eq!(config.frames, 3);
        assert_eq!(config.width, 64);
        assert_eq!(config.height, 240);
        assert_eq!(config.backend, BackendKind::Mock);
        assert!(config.settle);
        config.validate().unwrap();
    }

    #[test]
    fn invalid_values_are_rejected() {
        let config = RunConfig { workers: Some(0), ..RunConfig::default() };
        assert!(config.validate().is_err());
        let config = RunConfig { export_every: Some(0), ..RunConfig::default() };
        assert!(config.validate().is_err());
        let mut config = RunConfig::default();
        config.render.max_tex = 1000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn unknown_keys_fail_to_parse() {
        let err = serde_json::from_str::<RunConfig>(r#"{ "script": [{ "frames": 1, "keys": ["jump"] }] }"#);
        assert!(err.is_err());
    }

    #[test]
    fn cli_parses_flags() {
        let cli = Cli::parse_from(["bulbshell", "--frames", "5", "--backend", "mock", "--settle", "--every", "2"]);
        assert_eq!(cli.frames, Some(5));
        assert_eq!(cli.backend, Some(BackendKind::Mock));
        assert!(cli.settle);
        assert_eq!(cli.every, Some(2));
    }
}
