//! JSON clip scripts.
//!
//! A script declares the engine's thread count and a set of numbered output
//! nodes:
//!
//! ```json
//! {
//!     "threads": 4,
//!     "outputs": {
//!         "0": { "format": "YUV420P8", "width": 640, "height": 360,
//!                "frames": 240, "fps": "24000/1001", "pattern": "gradient" }
//!     }
//! }
//! ```
//!
//! A node without `format`, or with zero `width`/`height`, describes a clip
//! whose format varies per frame; `frames: 0` means unknown length. Both
//! evaluate fine but cannot be streamed.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;

use crate::engine::{Node, Pattern};
use crate::error::{PipeError, Result};
use crate::format::{Format, VideoInfo};

/// Largest script file accepted.
pub const MAX_SCRIPT_SIZE: u64 = 16 * 1024 * 1024;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ScriptDoc {
    #[serde(default)]
    threads: usize,
    outputs: BTreeMap<usize, NodeSpec>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FpsSpec {
    Integer(u64),
    Ratio(String),
}

impl Default for FpsSpec {
    fn default() -> Self {
        FpsSpec::Integer(25)
    }
}

impl FpsSpec {
    fn parse(&self) -> std::result::Result<(u64, u64), String> {
        let (num, den) = match self {
            FpsSpec::Integer(n) => (*n, 1),
            FpsSpec::Ratio(s) => match s.split_once('/') {
                Some((num, den)) => (
                    num.trim().parse().map_err(|_| format!("bad fps: {}", s))?,
                    den.trim().parse().map_err(|_| format!("bad fps: {}", s))?,
                ),
                None => (s.trim().parse().map_err(|_| format!("bad fps: {}", s))?, 1),
            },
        };
        if den == 0 {
            return Err(format!("fps denominator is zero: {}/{}", num, den));
        }
        Ok((num, den))
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct NodeSpec {
    format: Option<String>,
    #[serde(default)]
    width: usize,
    #[serde(default)]
    height: usize,
    #[serde(default)]
    frames: usize,
    #[serde(default)]
    fps: FpsSpec,
    #[serde(default)]
    pattern: Pattern,
    #[serde(default)]
    value: u32,
    #[serde(default)]
    fail_frames: Vec<usize>,
    #[serde(default)]
    jitter_ms: u64,
}

impl NodeSpec {
    fn build(self, index: usize) -> std::result::Result<Node, String> {
        let format = self
            .format
            .as_deref()
            .map(str::parse::<Format>)
            .transpose()
            .map_err(|e| format!("output {}: {}", index, e))?;
        let (fps_num, fps_den) = self
            .fps
            .parse()
            .map_err(|e| format!("output {}: {}", index, e))?;
        let info = VideoInfo {
            format,
            width: self.width,
            height: self.height,
            fps_num,
            fps_den,
            num_frames: self.frames,
        };
        Ok(Node::new(info)
            .with_pattern(self.pattern, self.value)
            .with_failures(self.fail_frames)
            .with_jitter(self.jitter_ms))
    }
}

/// An evaluated script: engine settings plus its output nodes.
#[derive(Debug)]
pub struct Script {
    name: String,
    threads: usize,
    outputs: BTreeMap<usize, Arc<Node>>,
}

impl Script {
    /// Reads and evaluates a script file.
    pub fn load(path: &Path) -> Result<Self> {
        let mut file = File::open(path).map_err(|e| {
            PipeError::Evaluation(format!(
                "Failed to open script file {} for reading: {}",
                path.display(),
                e
            ))
        })?;
        let size = file
            .metadata()
            .map(|m| m.len())
            .map_err(|e| PipeError::Evaluation(format!("Failed to read script file: {}", e)))?;
        if size > MAX_SCRIPT_SIZE {
            return Err(PipeError::Evaluation(
                "Script files bigger than 16MB not allowed".to_string(),
            ));
        }
        let mut text = String::new();
        file.read_to_string(&mut text)
            .map_err(|e| PipeError::Evaluation(format!("Failed to read script file: {}", e)))?;
        if text.trim().is_empty() {
            return Err(PipeError::Evaluation(
                "Failed to read script file or file is empty".to_string(),
            ));
        }
        Self::evaluate(&text, &path.display().to_string())
    }

    pub fn evaluate(text: &str, name: &str) -> Result<Self> {
        let failed = |msg: String| PipeError::Evaluation(format!("Script evaluation failed:\n{}", msg));
        let doc: ScriptDoc = serde_json::from_str(text).map_err(|e| failed(e.to_string()))?;
        let mut outputs = BTreeMap::new();
        for (index, decl) in doc.outputs {
            let node = decl.build(index).map_err(failed)?;
            outputs.insert(index, Arc::new(node));
        }
        log::debug!(
            "evaluated script {}: {} outputs, threads {}",
            name,
            outputs.len(),
            doc.threads
        );
        Ok(Self {
            name: name.to_string(),
            threads: doc.threads,
            outputs,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Requested engine threads; 0 means one per core.
    pub fn threads(&self) -> usize {
        self.threads
    }

    pub fn output_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.outputs.keys().copied()
    }

    pub fn output(&self, index: usize) -> Result<Arc<Node>> {
        self.outputs.get(&index).cloned().ok_or_else(|| {
            PipeError::OutputNode(
                "Failed to retrieve output node. Invalid index specified?".to_string(),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCRIPT: &str = r#"{
        "threads": 3,
        "outputs": {
            "0": { "format": "YUV420P8", "width": 64, "height": 48, "frames": 10,
                   "fps": "24000/1001", "pattern": "gradient" },
            "2": { "format": "gray16", "width": 8, "height": 8, "frames": 2, "fps": 30,
                   "fail_frames": [1], "jitter_ms": 3 },
            "5": { "width": 0, "height": 0, "frames": 4 }
        }
    }"#;

    #[test]
    fn test_evaluate_outputs() {
        let script = Script::evaluate(SCRIPT, "test.json").unwrap();
        assert_eq!(script.threads(), 3);
        assert_eq!(script.name(), "test.json");
        assert_eq!(script.output_indices().collect::<Vec<_>>(), vec![0, 2, 5]);

        let vi = *script.output(0).unwrap().video_info();
        assert_eq!(vi.format, Some(Format::YUV420P8));
        assert_eq!((vi.width, vi.height, vi.num_frames), (64, 48, 10));
        assert_eq!((vi.fps_num, vi.fps_den), (24000, 1001));

        let vi = *script.output(2).unwrap().video_info();
        assert_eq!(vi.format, Some(Format::GRAY16));
        assert_eq!((vi.fps_num, vi.fps_den), (30, 1));
        assert!(script.output(2).unwrap().render(1).is_err());

        let vi = *script.output(5).unwrap().video_info();
        assert!(!vi.is_constant_format());
        assert_eq!((vi.fps_num, vi.fps_den), (25, 1));
    }

    #[test]
    fn test_missing_output_index() {
        let script = Script::evaluate(SCRIPT, "test.json").unwrap();
        let err = script.output(1).unwrap_err();
        assert!(matches!(err, PipeError::OutputNode(_)));
        assert_eq!(
            err.to_string(),
            "Failed to retrieve output node. Invalid index specified?"
        );
    }

    #[test]
    fn test_evaluation_errors() {
        let cases = [
            "not json",
            r#"{ "outputs": { "0": { "format": "NV12", "width": 2, "height": 2, "frames": 1 } } }"#,
            r#"{ "outputs": { "0": { "format": "Gray8", "fps": "30/0", "frames": 1 } } }"#,
            r#"{ "outputs": { "0": { "format": "Gray8", "fps": "fast" } } }"#,
            r#"{ "outputs": { "0": { "colour": "red" } } }"#,
            r#"{ "threads": 2 }"#,
        ];
        for text in cases {
            let err = Script::evaluate(text, "bad.json").unwrap_err();
            assert!(matches!(err, PipeError::Evaluation(_)), "{}", text);
            assert!(err.to_string().starts_with("Script evaluation failed:"));
        }
    }

    #[test]
    fn test_load_rejects_missing_and_empty_files() {
        let dir = std::env::temp_dir().join(format!("frame-bus-script-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        let missing = dir.join("missing.json");
        assert!(matches!(
            Script::load(&missing),
            Err(PipeError::Evaluation(_))
        ));

        let empty = dir.join("empty.json");
        std::fs::write(&empty, "  \n").unwrap();
        let err = Script::load(&empty).unwrap_err();
        assert_eq!(err.to_string(), "Failed to read script file or file is empty");

        let good = dir.join("good.json");
        std::fs::write(&good, SCRIPT).unwrap();
        assert_eq!(Script::load(&good).unwrap().threads(), 3);

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
