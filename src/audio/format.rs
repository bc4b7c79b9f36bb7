/// Container formats recognised from their leading bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    Mp3,
    Ogg,
    Flac,
    Wav,
    Mp4,
    Webm,
    Unknown,
}

impl AudioFormat {
    /// Sniffs the container from the first bytes of a buffer.
    pub fn detect(header: &[u8]) -> Self {
        if header.len() < 4 {
            return Self::Unknown;
        }
        if header.starts_with(&[0x1A, 0x45, 0xDF, 0xA3]) {
            return Self::Webm;
        }
        if header.len() >= 8 && &header[4..8] == b"ftyp" {
            return Self::Mp4;
        }
        if header.starts_with(b"OggS") {
            return Self::Ogg;
        }
        if header.starts_with(b"fLaC") {
            return Self::Flac;
        }
        if header.starts_with(b"RIFF") && header.len() >= 12 && &header[8..12] == b"WAVE" {
            return Self::Wav;
        }
        if header.starts_with(b"ID3") || (header[0] == 0xFF && (header[1] & 0xE0) == 0xE0) {
            return Self::Mp3;
        }
        Self::Unknown
    }

    /// File extension handed to the symphonia probe as a hint.
    pub fn extension(self) -> Option<&'static str> {
        match self {
            Self::Mp3 => Some("mp3"),
            Self::Ogg => Some("ogg"),
            Self::Flac => Some("flac"),
            Self::Wav => Some("wav"),
            Self::Mp4 => Some("mp4"),
            Self::Webm => Some("webm"),
            Self::Unknown => None,
        }
    }

    pub fn hint(self) -> symphonia::core::probe::Hint {
        let mut hint = symphonia::core::probe::Hint::new();
        if let Some(ext) = self.extension() {
            hint.with_extension(ext);
        }
        hint
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_common_containers() {
        assert_eq!(AudioFormat::detect(b"ID3\x04\x00\x00"), AudioFormat::Mp3);
        assert_eq!(AudioFormat::detect(&[0xFF, 0xFB, 0x90, 0x00]), AudioFormat::Mp3);
        assert_eq!(AudioFormat::detect(b"OggS\x00"), AudioFormat::Ogg);
        assert_eq!(AudioFormat::detect(b"RIFF\x24\x00\x00\x00WAVE"), AudioFormat::Wav);
        assert_eq!(AudioFormat::detect(b"\x00\x00\x00\x1Cftypisom"), AudioFormat::Mp4);
    }

    #[test]
    fn short_or_unknown_headers() {
        assert_eq!(AudioFormat::detect(b"ab"), AudioFormat::Unknown);
        assert_eq!(AudioFormat::detect(&[0, 0, 0, 0]), AudioFormat::Unknown);
        assert_eq!(AudioFormat::Unknown.extension(), None);
    }
}
