//! Target audio formats

use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    #[default]
    Mp3,
    M4a,
    Aac,
}

impl AudioFormat {
    /// File extension produced by the audio extraction step.
    /// Also the codec name yt-dlp expects for `--audio-format`.
    pub fn extension(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "mp3",
            AudioFormat::M4a => "m4a",
            AudioFormat::Aac => "aac",
        }
    }

    /// MIME type used when serving a file of this format
    pub fn mime_type(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "audio/mpeg",
            AudioFormat::M4a | AudioFormat::Aac => "audio/mp4",
        }
    }

    /// Parse a user supplied format, falling back to mp3 for anything unknown
    pub fn parse_or_default(s: &str) -> Self {
        s.parse().unwrap_or_default()
    }
}

impl FromStr for AudioFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mp3" => Ok(AudioFormat::Mp3),
            "m4a" => Ok(AudioFormat::M4a),
            "aac" => Ok(AudioFormat::Aac),
            other => Err(format!("unsupported audio format: {other}")),
        }
    }
}

impl std::fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        assert_eq!("MP3".parse::<AudioFormat>(), Ok(AudioFormat::Mp3));
        assert_eq!(" m4a ".parse::<AudioFormat>(), Ok(AudioFormat::M4a));
        assert!("flac".parse::<AudioFormat>().is_err());
    }

    #[test]
    fn test_parse_or_default() {
        assert_eq!(AudioFormat::parse_or_default("aac"), AudioFormat::Aac);
        assert_eq!(AudioFormat::parse_or_default("wav"), AudioFormat::Mp3);
        assert_eq!(AudioFormat::parse_or_default(""), AudioFormat::Mp3);
    }
}
