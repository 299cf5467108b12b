pub mod frame_buffer;
pub mod level_meter;
pub mod pcm;
pub mod resampler;
