use crate::domain::value_objects::{
    DeviceName, PipelineRole, PipelineSet, PipelineSpec, Redirect, STREAM_URL_PLACEHOLDER,
};

const FFMPEG: &str = "ffmpeg";

/// Builds the ffmpeg argument sets of a camera's three pipelines
pub struct PipelineBuilder {
    ffmpeg_out: String,
    idle_video: String,
    capture_stderr: bool,
}

impl PipelineBuilder {
    /// `ffmpeg_out` is the proxy relay's output section; `{name}` is replaced
    /// by the camera name before it is split on whitespace.
    pub fn new(ffmpeg_out: impl Into<String>, idle_video: impl Into<String>) -> Self {
        Self {
            ffmpeg_out: ffmpeg_out.into(),
            idle_video: idle_video.into(),
            capture_stderr: false,
        }
    }

    /// Drain pipeline stderr into the log
    pub fn with_stderr_capture(mut self, capture: bool) -> Self {
        self.capture_stderr = capture;
        self
    }

    pub fn build(&self, camera: &DeviceName) -> PipelineSet {
        PipelineSet::new(self.proxy(camera), self.idle(), self.live())
    }

    /// Reads the shared pipe and writes to the configured output
    fn proxy(&self, camera: &DeviceName) -> PipelineSpec {
        let output = self.ffmpeg_out.replace("{name}", camera.as_str());
        let mut args = to_args(&["-i", "pipe:"]);
        args.extend(output.split_whitespace().map(str::to_string));
        self.spec(PipelineRole::Proxy, args, Redirect::PipeRead, Redirect::Null)
    }

    /// Loops the idle video into the shared pipe
    fn idle(&self) -> PipelineSpec {
        let mut args = to_args(&["-re", "-stream_loop", "-1", "-i"]);
        args.push(self.idle_video.clone());
        args.extend(to_args(&[
            "-c:v", "copy", "-c:a", "libmp3lame", "-ar", "44100", "-b:a", "8k", "-bsf",
            "dump_extra", "-f", "mpegts", "pipe:",
        ]));
        self.spec(PipelineRole::Idle, args, Redirect::Null, Redirect::PipeWrite)
    }

    /// Relays the camera feed into the shared pipe
    fn live(&self) -> PipelineSpec {
        let args = to_args(&[
            "-i",
            STREAM_URL_PLACEHOLDER,
            "-c:v",
            "copy",
            "-c:a",
            "libmp3lame",
            "-ar",
            "44100",
            "-bsf",
            "dump_extra",
            "-f",
            "mpegts",
            "pipe:",
        ]);
        self.spec(PipelineRole::Live, args, Redirect::Null, Redirect::PipeWrite)
    }

    fn spec(
        &self,
        role: PipelineRole,
        args: Vec<String>,
        stdin: Redirect,
        stdout: Redirect,
    ) -> PipelineSpec {
        PipelineSpec {
            role,
            program: FFMPEG.to_string(),
            args,
            stdin,
            stdout,
            capture_stderr: self.capture_stderr,
        }
    }
}

fn to_args(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}
