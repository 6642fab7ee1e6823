//! Container conversion for provider audio
//!
//! Input is probed and decoded with symphonia, re-encoded to 16-bit WAV with
//! hound, and, for compressed targets, piped through ffmpeg.

use std::{
    io::{Cursor, ErrorKind},
    path::PathBuf,
    process::Stdio,
};

use hound::{SampleFormat, WavSpec, WavWriter};
use sonicforge_config::OutputFormat;
use symphonia::core::{
    audio::SampleBuffer,
    codecs::{CODEC_TYPE_NULL, DecoderOptions},
    errors::Error as SymphoniaError,
    formats::FormatOptions,
    io::{MediaSourceStream, MediaSourceStreamOptions},
    meta::MetadataOptions,
    probe::Hint,
};
use tokio::{io::AsyncWriteExt, process::Command};

use crate::{error::TranscodeError, types::RawAudio};

/// Interleaved decoded samples
#[derive(Debug)]
pub(crate) struct Pcm {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl Pcm {
    pub fn frames(&self) -> usize {
        self.samples.len() / usize::from(self.channels.max(1))
    }
}

pub struct Transcoder {
    ffmpeg: PathBuf,
}

impl Transcoder {
    pub fn new(ffmpeg: impl Into<PathBuf>) -> Self {
        Self { ffmpeg: ffmpeg.into() }
    }

    /// Convert provider audio to a standalone `target` container
    ///
    /// The declared source format is only a probing hint; the container is
    /// always sniffed.
    pub async fn convert(&self, input: RawAudio, target: OutputFormat) -> Result<Vec<u8>, TranscodeError> {
        if input.bytes.is_empty() {
            return Err(TranscodeError::EmptyInput);
        }

        let RawAudio { bytes, source_hint } = input;
        let input_len = bytes.len();

        let wav = tokio::task::spawn_blocking(move || {
            let pcm = decode(bytes, source_hint.as_deref())?;
            tracing::debug!(
                frames = pcm.frames(),
                sample_rate = pcm.sample_rate,
                channels = pcm.channels,
                "decoded provider audio"
            );
            encode_wav(&pcm)
        })
        .await
        .map_err(|e| TranscodeError::Encoder(format!("transcoding task failed: {e}")))??;

        tracing::debug!(input_len, wav_len = wav.len(), %target, "intermediate wav ready");

        match target {
            OutputFormat::Wav => Ok(wav),
            other => self.ffmpeg_encode(wav, other).await,
        }
    }

    async fn ffmpeg_encode(&self, wav: Vec<u8>, target: OutputFormat) -> Result<Vec<u8>, TranscodeError> {
        let mut child = Command::new(&self.ffmpeg)
            .args(["-hide_banner", "-loglevel", "error", "-f", "wav", "-i", "pipe:0", "-vn"])
            .args(codec_args(target))
            .arg("pipe:1")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == ErrorKind::NotFound {
                    TranscodeError::Unsupported {
                        format: target,
                        reason: format!("encoder '{}' is not installed", self.ffmpeg.display()),
                    }
                } else {
                    TranscodeError::Encoder(format!("failed to start encoder: {e}"))
                }
            })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| TranscodeError::Encoder("encoder stdin unavailable".to_owned()))?;

        let feeder = tokio::spawn(async move {
            let written = stdin.write_all(&wav).await;
            drop(stdin);
            written
        });

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| TranscodeError::Encoder(format!("encoder did not finish: {e}")))?;

        let fed = feeder.await;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_owned();

            if stderr.contains("Unknown encoder") || stderr.contains("Encoder not found") {
                return Err(TranscodeError::Unsupported {
                    format: target,
                    reason: stderr,
                });
            }

            return Err(TranscodeError::Encoder(format!("{}: {stderr}", output.status)));
        }

        match fed {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(TranscodeError::Encoder(format!("failed to feed encoder: {e}"))),
            Err(e) => return Err(TranscodeError::Encoder(format!("encoder feed task failed: {e}"))),
        }

        if output.stdout.is_empty() {
            return Err(TranscodeError::Encoder("encoder produced no output".to_owned()));
        }

        Ok(output.stdout)
    }
}

fn codec_args(target: OutputFormat) -> &'static [&'static str] {
    match target {
        OutputFormat::Mp3 => &["-c:a", "libmp3lame", "-f", "mp3"],
        // fragmented so the muxer never needs to seek back on a pipe
        OutputFormat::M4a => &["-c:a", "aac", "-movflags", "frag_keyframe+empty_moov", "-f", "mp4"],
        OutputFormat::Flac => &["-c:a", "flac", "-f", "flac"],
        OutputFormat::Ogg => &["-c:a", "libvorbis", "-f", "ogg"],
        OutputFormat::Wav => &["-c:a", "pcm_s16le", "-f", "wav"],
    }
}

/// Probe and decode every packet of the first audio track
pub(crate) fn decode(bytes: Vec<u8>, source_hint: Option<&str>) -> Result<Pcm, TranscodeError> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), MediaSourceStreamOptions::default());

    let mut hint = Hint::new();
    match source_hint {
        Some(mime) if mime.contains('/') => {
            hint.mime_type(mime);
        }
        Some(extension) => {
            hint.with_extension(extension);
        }
        None => {}
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| TranscodeError::Undecodable(format!("probe: {e}")))?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|track| track.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| TranscodeError::Undecodable("no audio track found".to_owned()))?;

    let track_id = track.id;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| TranscodeError::Undecodable(format!("codec: {e}")))?;

    let mut samples: Vec<f32> = Vec::new();
    let mut layout: Option<(u32, u16)> = None;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(ref e)) if e.kind() == ErrorKind::UnexpectedEof => break,
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(TranscodeError::Undecodable(format!("packet: {e}"))),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(e)) => {
                tracing::warn!(error = %e, "skipping corrupt audio frame");
                continue;
            }
            Err(e) => return Err(TranscodeError::Undecodable(format!("decode: {e}"))),
        };

        if decoded.frames() == 0 {
            continue;
        }

        let spec = *decoded.spec();
        let channels = u16::try_from(spec.channels.count())
            .map_err(|_| TranscodeError::Undecodable("too many channels".to_owned()))?;
        layout.get_or_insert((spec.rate, channels));

        let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        buffer.copy_interleaved_ref(decoded);
        samples.extend_from_slice(buffer.samples());
    }

    let Some((sample_rate, channels)) = layout.filter(|_| !samples.is_empty()) else {
        return Err(TranscodeError::Undecodable("no audio frames decoded".to_owned()));
    };

    Ok(Pcm {
        samples,
        sample_rate,
        channels,
    })
}

/// 16-bit PCM WAV keeping the source rate and channel count
#[allow(clippy::cast_possible_truncation)]
pub(crate) fn encode_wav(pcm: &Pcm) -> Result<Vec<u8>, TranscodeError> {
    let spec = WavSpec {
        channels: pcm.channels,
        sample_rate: pcm.sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());

    {
        let mut writer =
            WavWriter::new(&mut cursor, spec).map_err(|e| TranscodeError::Encoder(format!("wav header: {e}")))?;

        for sample in &pcm.samples {
            let value = (sample.clamp(-1.0, 1.0) * f32::from(i16::MAX)) as i16;
            writer
                .write_sample(value)
                .map_err(|e| TranscodeError::Encoder(format!("wav sample: {e}")))?;
        }

        writer
            .finalize()
            .map_err(|e| TranscodeError::Encoder(format!("wav finalize: {e}")))?;
    }

    Ok(cursor.into_inner())
}
