//! Media playlist parsing.
//!
//! Only segment references are extracted: any line ending with the segment
//! suffix counts, everything else (tags, comments, variant URIs) is ignored.

use rand::Rng;
use rand::seq::IndexedRandom;

/// Opaque reference to a media segment, as written in the playlist.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SegmentRef(String);

impl SegmentRef {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SegmentRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Segments listed by one playlist fetch. Discarded after the iteration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaPlaylist {
    segments: Vec<SegmentRef>,
}

impl MediaPlaylist {
    /// Parses a playlist body, keeping lines that end with `suffix`.
    ///
    /// Order of appearance is preserved and duplicates are kept.
    pub fn parse(body: &str, suffix: &str) -> Self {
        let segments = body
            .lines()
            .filter(|line| line.ends_with(suffix))
            .map(SegmentRef::new)
            .collect();

        Self { segments }
    }

    pub fn segments(&self) -> &[SegmentRef] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Picks one segment uniformly at random.
    pub fn choose_segment<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&SegmentRef> {
        self.segments.choose(rng)
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;

    fn names(playlist: &MediaPlaylist) -> Vec<&str> {
        playlist.segments().iter().map(SegmentRef::as_str).collect()
    }

    #[test]
    fn test_extracts_segments_in_order() {
        let playlist = MediaPlaylist::parse("a.ts\nb.m3u8\nc.ts", ".ts");
        assert_eq!(names(&playlist), vec!["a.ts", "c.ts"]);
    }

    #[test]
    fn test_realistic_media_playlist() {
        let body = "#EXTM3U\n\
                    #EXT-X-VERSION:3\n\
                    #EXT-X-TARGETDURATION:4\n\
                    #EXT-X-MEDIA-SEQUENCE:17\n\
                    #EXTINF:4.000,\n\
                    live-17.ts\n\
                    #EXTINF:4.000,\n\
                    live-18.ts\n";
        let playlist = MediaPlaylist::parse(body, ".ts");
        assert_eq!(names(&playlist), vec!["live-17.ts", "live-18.ts"]);
    }

    #[test]
    fn test_crlf_line_endings() {
        let playlist = MediaPlaylist::parse("#EXTM3U\r\nseg-1.ts\r\nseg-2.ts\r\n", ".ts");
        assert_eq!(names(&playlist), vec!["seg-1.ts", "seg-2.ts"]);
    }

    #[test]
    fn test_duplicates_are_kept() {
        let playlist = MediaPlaylist::parse("x.ts\nx.ts\n", ".ts");
        assert_eq!(names(&playlist), vec!["x.ts", "x.ts"]);
    }

    #[test]
    fn test_empty_body_has_no_segments() {
        let playlist = MediaPlaylist::parse("", ".ts");
        assert!(playlist.is_empty());

        let mut rng = ChaCha8Rng::seed_from_u64(7);
        assert!(playlist.choose_segment(&mut rng).is_none());
    }

    #[test]
    fn test_choose_segment_returns_listed_segment() {
        let playlist = MediaPlaylist::parse("a.ts\nb.ts\nc.ts", ".ts");
        let mut rng = ChaCha8Rng::seed_from_u64(42);

        for _ in 0..32 {
            let segment = playlist.choose_segment(&mut rng).unwrap();
            assert!(playlist.segments().contains(segment));
        }
    }

    #[test]
    fn test_choose_segment_is_deterministic_for_seed() {
        let playlist = MediaPlaylist::parse("a.ts\nb.ts\nc.ts\nd.ts", ".ts");
        let mut first = ChaCha8Rng::seed_from_u64(99);
        let mut second = ChaCha8Rng::seed_from_u64(99);

        let picks_a: Vec<_> = (0..8)
            .map(|_| playlist.choose_segment(&mut first).cloned())
            .collect();
        let picks_b: Vec<_> = (0..8)
            .map(|_| playlist.choose_segment(&mut second).cloned())
            .collect();
        assert_eq!(picks_a, picks_b);
    }

    proptest! {
        #[test]
        fn prop_every_extracted_line_has_suffix(
            lines in prop::collection::vec("[a-z0-9.#:-]{0,12}", 0..40)
        ) {
            let body = lines.join("\n");
            let playlist = MediaPlaylist::parse(&body, ".ts");

            let expected: Vec<&str> = lines
                .iter()
                .map(String::as_str)
                .filter(|l| l.ends_with(".ts"))
                .collect();
            prop_assert_eq!(names(&playlist), expected);
        }
    }
}
