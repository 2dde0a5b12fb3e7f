use std::path::PathBuf;

use frame_bus::output::Framing;
use frame_bus::PipeError;

/// Where frame bytes go.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OutputTarget {
    Stdout,
    File(PathBuf),
}

impl OutputTarget {
    pub fn parse(value: &str) -> Self {
        if value == "-" {
            OutputTarget::Stdout
        } else {
            OutputTarget::File(PathBuf::from(value))
        }
    }

    pub fn name(&self) -> String {
        match self {
            OutputTarget::Stdout => "stdout".to_string(),
            OutputTarget::File(path) => path.display().to_string(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct PipeConfig {
    pub script: PathBuf,
    pub output: OutputTarget,
    pub index: usize,
    /// 0 means one request per engine worker.
    pub requests: usize,
    pub framing: Framing,
}

impl PipeConfig {
    pub fn builder() -> PipeConfigBuilder {
        PipeConfigBuilder::default()
    }
}

#[derive(Default)]
pub struct PipeConfigBuilder {
    script: Option<PathBuf>,
    output: Option<OutputTarget>,
    index: i64,
    requests: i64,
    y4m: bool,
}

impl PipeConfigBuilder {
    pub fn script(mut self, path: impl Into<PathBuf>) -> Self {
        self.script = Some(path.into());
        self
    }

    /// `-` selects stdout
    pub fn output(mut self, output: &str) -> Self {
        self.output = Some(OutputTarget::parse(output));
        self
    }

    pub fn index(mut self, index: i64) -> Self {
        self.index = index;
        self
    }

    /// Values below 1 fall back to the engine's worker count.
    pub fn requests(mut self, requests: i64) -> Self {
        self.requests = requests;
        self
    }

    pub fn y4m(mut self, y4m: bool) -> Self {
        self.y4m = y4m;
        self
    }

    pub fn build(self) -> Result<PipeConfig, PipeError> {
        let script = self
            .script
            .ok_or_else(|| PipeError::Argument("No script file specified".to_string()))?;
        let output = self
            .output
            .ok_or_else(|| PipeError::Argument("No output file specified".to_string()))?;
        let index = usize::try_from(self.index)
            .map_err(|_| PipeError::Argument(format!("Invalid output index: {}", self.index)))?;
        let requests = usize::try_from(self.requests).unwrap_or(0);
        Ok(PipeConfig {
            script,
            output,
            index,
            requests,
            framing: if self.y4m { Framing::Y4m } else { Framing::Raw },
        })
    }
}
