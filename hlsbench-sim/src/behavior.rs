//! What the simulated origin serves and how it misbehaves.

use std::time::Duration;

/// MPEG-TS packet size; segment bodies are whole packets.
const TS_PACKET_SIZE: usize = 188;

/// Origin behavior, applied to every request for the lifetime of the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginBehavior {
    /// Segment file names listed in the playlist, in order
    pub segments: Vec<String>,
    /// Duration advertised per segment
    pub segment_duration: Duration,
    /// Status returned for the playlist (200 serves the body)
    pub playlist_status: u16,
    /// Status returned for listed segments (200 serves the body)
    pub segment_status: u16,
    /// Delay before answering any request
    pub latency: Duration,
    /// Bytes per segment body
    pub segment_size: usize,
}

impl Default for OriginBehavior {
    fn default() -> Self {
        Self {
            segments: vec!["segment-0.ts".to_string(), "segment-1.ts".to_string()],
            segment_duration: Duration::from_secs(2),
            playlist_status: 200,
            segment_status: 200,
            latency: Duration::ZERO,
            segment_size: TS_PACKET_SIZE * 64,
        }
    }
}

impl OriginBehavior {
    pub fn with_segments<I, S>(mut self, segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.segments = segments.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_playlist_status(mut self, status: u16) -> Self {
        self.playlist_status = status;
        self
    }

    pub fn with_segment_status(mut self, status: u16) -> Self {
        self.segment_status = status;
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn with_segment_size(mut self, size: usize) -> Self {
        self.segment_size = size;
        self
    }

    /// Renders the media playlist body.
    pub fn render_playlist(&self) -> String {
        let seconds = self.segment_duration.as_secs_f64();
        let target = self.segment_duration.as_secs_f64().ceil() as u64;

        let mut body = format!(
            "#EXTM3U\n#EXT-X-VERSION:3\n#EXT-X-TARGETDURATION:{target}\n#EXT-X-MEDIA-SEQUENCE:0\n"
        );
        for segment in &self.segments {
            body.push_str(&format!("#EXTINF:{seconds:.3},\n{segment}\n"));
        }
        body
    }

    /// Segment body: TS sync bytes, padded to whole packets.
    pub fn render_segment(&self) -> Vec<u8> {
        let packets = self.segment_size.div_ceil(TS_PACKET_SIZE);
        vec![0x47; packets * TS_PACKET_SIZE]
    }
}
