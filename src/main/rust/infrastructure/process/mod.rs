mod ffmpeg_launcher;
mod pipeline_builder;

pub use ffmpeg_launcher::FfmpegLauncher;
pub use pipeline_builder::PipelineBuilder;
