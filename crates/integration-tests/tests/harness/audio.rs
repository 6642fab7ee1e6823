//! WAV fixtures

use std::f32::consts::PI;
use std::io::Cursor;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

/// 16-bit sine tone
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
pub fn sine_wav(seconds: u32, sample_rate: u32, channels: u16) -> Vec<u8> {
    let spec = WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(&mut cursor, spec).expect("wav writer");
        for n in 0..seconds * sample_rate {
            let value = ((2.0 * PI * 330.0 * n as f32 / sample_rate as f32).sin() * 10_000.0) as i16;
            for _ in 0..channels {
                writer.write_sample(value).expect("wav sample");
            }
        }
        writer.finalize().expect("wav finalize");
    }

    cursor.into_inner()
}

/// Duration in seconds of a WAV buffer
#[allow(clippy::cast_precision_loss)]
pub fn wav_seconds(bytes: &[u8]) -> f32 {
    let reader = WavReader::new(Cursor::new(bytes)).expect("valid wav");
    reader.duration() as f32 / reader.spec().sample_rate as f32
}
