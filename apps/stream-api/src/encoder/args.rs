//! Encoder command construction.

use std::path::{Path, PathBuf};

use lectern_common::stream::PLAYLIST_FILE;

/// Capture resolution and frame rate are fixed; quality tuning is not exposed.
const CAPTURE_FRAMERATE: u32 = 30;
const CAPTURE_VIDEO_SIZE: &str = "1280x720";

const VIDEO_BITRATE_KBPS: u32 = 2500;
const AUDIO_BITRATE_KBPS: u32 = 128;
const AUDIO_SAMPLE_RATE: u32 = 44_100;

/// Segment file pattern inside a stream directory.
pub const SEGMENT_PATTERN: &str = "segment_%03d.ts";

/// Input devices the encoder reads from.
#[derive(Debug, Clone)]
pub struct CaptureDevice {
    /// Demuxer for the video device (e.g. `v4l2`, `avfoundation`, `dshow`).
    pub video_format: String,
    pub video_device: String,
    pub audio_format: String,
    pub audio_device: String,
}

/// Everything needed to build an encoder invocation for one session.
#[derive(Debug, Clone)]
pub struct EncoderSettings {
    pub program: String,
    /// Root of the per-stream output directories (mounted into the ingest container).
    pub output_root: PathBuf,
    pub capture: CaptureDevice,
    /// Target duration of one HLS segment, in seconds.
    pub segment_seconds: u32,
    /// Number of segments kept in the rolling playlist window.
    pub list_size: u32,
}

/// A fully built command: program plus argument vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl EncoderSettings {
    /// Output directory for a stream key.
    pub fn output_dir(&self, stream_key: &str) -> PathBuf {
        self.output_root.join(stream_key)
    }

    /// Build the encoder command writing HLS into `output_dir`.
    pub fn command_for(&self, output_dir: &Path) -> CommandSpec {
        let framerate = CAPTURE_FRAMERATE.to_string();
        // One keyframe every two seconds.
        let gop = (CAPTURE_FRAMERATE * 2).to_string();
        let video_bitrate = format!("{VIDEO_BITRATE_KBPS}k");
        let bufsize = format!("{}k", VIDEO_BITRATE_KBPS * 2);
        let audio_bitrate = format!("{AUDIO_BITRATE_KBPS}k");

        let mut args: Vec<String> = Vec::with_capacity(64);
        let mut push = |items: &[&str]| args.extend(items.iter().map(|s| s.to_string()));

        push(&["-hide_banner", "-loglevel", "warning", "-y"]);

        // Capture inputs.
        push(&[
            "-f",
            &self.capture.video_format,
            "-framerate",
            &framerate,
            "-video_size",
            CAPTURE_VIDEO_SIZE,
            "-i",
            &self.capture.video_device,
        ]);
        push(&[
            "-f",
            &self.capture.audio_format,
            "-i",
            &self.capture.audio_device,
        ]);
        push(&["-map", "0:v:0", "-map", "1:a:0"]);

        // Low-latency video.
        push(&[
            "-c:v",
            "libx264",
            "-preset",
            "veryfast",
            "-tune",
            "zerolatency",
            "-pix_fmt",
            "yuv420p",
            "-b:v",
            &video_bitrate,
            "-maxrate",
            &video_bitrate,
            "-bufsize",
            &bufsize,
            "-g",
            &gop,
            "-keyint_min",
            &gop,
            "-sc_threshold",
            "0",
        ]);

        // Audio.
        push(&[
            "-c:a",
            "aac",
            "-b:a",
            &audio_bitrate,
            "-ar",
            &AUDIO_SAMPLE_RATE.to_string(),
            "-ac",
            "2",
        ]);

        // Segmented output with a bounded rolling window.
        let segment_path = output_dir.join(SEGMENT_PATTERN);
        let playlist_path = output_dir.join(PLAYLIST_FILE);
        push(&[
            "-f",
            "hls",
            "-hls_time",
            &self.segment_seconds.to_string(),
            "-hls_list_size",
            &self.list_size.to_string(),
            "-hls_flags",
            "delete_segments+independent_segments",
            "-hls_segment_filename",
            &segment_path.to_string_lossy(),
            &playlist_path.to_string_lossy(),
        ]);

        CommandSpec {
            program: self.program.clone(),
            args,
        }
    }
}

#[cfg(test)]
pub(crate) fn test_settings(output_root: &Path) -> EncoderSettings {
    EncoderSettings {
        program: "ffmpeg".to_string(),
        output_root: output_root.to_path_buf(),
        capture: CaptureDevice {
            video_format: "v4l2".to_string(),
            video_device: "/dev/video0".to_string(),
            audio_format: "alsa".to_string(),
            audio_device: "default".to_string(),
        },
        segment_seconds: 2,
        list_size: 6,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value_after<'a>(args: &'a [String], flag: &str) -> &'a str {
        let pos = args.iter().position(|a| a == flag).expect(flag);
        &args[pos + 1]
    }

    #[test]
    fn command_reads_both_capture_devices() {
        let settings = test_settings(Path::new("/srv/hls"));
        let cmd = settings.command_for(&settings.output_dir("live_lvs_1"));

        assert_eq!(cmd.program, "ffmpeg");
        let inputs: Vec<&String> = cmd
            .args
            .iter()
            .enumerate()
            .filter(|(i, _)| *i > 0 && cmd.args[i - 1] == "-i")
            .map(|(_, a)| a)
            .collect();
        assert_eq!(inputs, vec!["/dev/video0", "default"]);
    }

    #[test]
    fn command_uses_low_latency_video_and_aac_audio() {
        let settings = test_settings(Path::new("/srv/hls"));
        let cmd = settings.command_for(Path::new("/srv/hls/live_x"));

        assert_eq!(value_after(&cmd.args, "-c:v"), "libx264");
        assert_eq!(value_after(&cmd.args, "-tune"), "zerolatency");
        assert_eq!(value_after(&cmd.args, "-c:a"), "aac");
        assert_eq!(value_after(&cmd.args, "-g"), "60");
    }

    #[test]
    fn command_writes_bounded_hls_window_with_segment_deletion() {
        let settings = test_settings(Path::new("/srv/hls"));
        let dir = settings.output_dir("live_lvs_1");
        let cmd = settings.command_for(&dir);

        assert_eq!(value_after(&cmd.args, "-hls_time"), "2");
        assert_eq!(value_after(&cmd.args, "-hls_list_size"), "6");
        assert!(value_after(&cmd.args, "-hls_flags").contains("delete_segments"));
        assert_eq!(
            value_after(&cmd.args, "-hls_segment_filename"),
            "/srv/hls/live_lvs_1/segment_%03d.ts"
        );
        assert_eq!(cmd.args.last().unwrap(), "/srv/hls/live_lvs_1/index.m3u8");
    }
}
