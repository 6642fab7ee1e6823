use serde::Deserialize;
use strum::{AsRefStr, Display, EnumIter, EnumString};

/// Audio container a client can ask for
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, AsRefStr, Display, EnumString, EnumIter)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum OutputFormat {
    #[default]
    Mp3,
    Wav,
    M4a,
    Flac,
    Ogg,
}

impl OutputFormat {
    /// MIME type sent back to the client
    pub fn mime_type(self) -> String {
        match self {
            Self::M4a => "audio/mp4".to_owned(),
            other => format!("audio/{other}"),
        }
    }

    /// File extension, without the leading dot
    pub fn extension(self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
            Self::Wav => "wav",
            Self::M4a => "m4a",
            Self::Flac => "flac",
            Self::Ogg => "ogg",
        }
    }
}
