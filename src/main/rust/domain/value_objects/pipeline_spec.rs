use std::fmt;

/// Role of an external pipeline within a camera
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineRole {
    /// Always-on relay reading the shared pipe
    Proxy,
    /// Placeholder stream while nothing is captured
    Idle,
    /// Relay of the camera's real feed
    Live,
}

impl PipelineRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Proxy => "proxy",
            Self::Idle => "idle",
            Self::Live => "live",
        }
    }
}

impl fmt::Display for PipelineRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Standard stream redirection of a pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Redirect {
    Null,
    /// Read end of the camera's proxy pipe
    PipeRead,
    /// Write end of the camera's proxy pipe
    PipeWrite,
}

/// Everything needed to (re)launch one pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSpec {
    pub role: PipelineRole,
    pub program: String,
    pub args: Vec<String>,
    pub stdin: Redirect,
    pub stdout: Redirect,
    /// Drain stderr for logging instead of discarding it
    pub capture_stderr: bool,
}

impl PipelineSpec {
    pub fn command_line(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

/// Placeholder in the live relay arguments replaced by the stream URL
pub const STREAM_URL_PLACEHOLDER: &str = "{stream_url}";

/// The three pipelines of one camera
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSet {
    pub proxy: PipelineSpec,
    pub idle: PipelineSpec,
    live_template: PipelineSpec,
}

impl PipelineSet {
    /// `live_template` receives the stream URL wherever an argument is
    /// [`STREAM_URL_PLACEHOLDER`]
    pub fn new(proxy: PipelineSpec, idle: PipelineSpec, live_template: PipelineSpec) -> Self {
        Self {
            proxy,
            idle,
            live_template,
        }
    }

    pub fn live(&self, stream_url: &str) -> PipelineSpec {
        let mut spec = self.live_template.clone();
        for arg in spec.args.iter_mut() {
            if arg == STREAM_URL_PLACEHOLDER {
                *arg = stream_url.to_string();
            }
        }
        spec
    }
}

/// How a supervised pipeline ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineExit {
    /// `None` when the process was ended by a signal
    pub code: Option<i32>,
}

impl PipelineExit {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}
