//! Decoding of container log payloads into lines.
//!
//! The host API may answer with a multiplexed stream: a sequence of frames,
//! each an 8 byte header `[stream, 0, 0, 0, len (u32 big endian)]` followed
//! by `len` payload bytes. Payloads that do not parse as a complete sequence
//! of frames are treated as plain text.

const HEADER_LEN: usize = 8;

/// Highest stream id in a frame header (stdin, stdout, stderr).
const MAX_STREAM: u8 = 2;

/// Concatenated frame payloads, or `None` when `payload` is not a complete
/// sequence of frames.
pub fn demultiplex(payload: &[u8]) -> Option<Vec<u8>> {
    if payload.is_empty() {
        return None;
    }

    let mut out = Vec::with_capacity(payload.len());
    let mut rest = payload;
    while !rest.is_empty() {
        if rest.len() < HEADER_LEN {
            return None;
        }
        let (header, body) = rest.split_at(HEADER_LEN);
        if header[0] > MAX_STREAM || header[1..4].iter().any(|b| *b != 0) {
            return None;
        }
        let len = u32::from_be_bytes([header[4], header[5], header[6], header[7]]) as usize;
        if body.len() < len {
            return None;
        }
        out.extend_from_slice(&body[..len]);
        rest = &body[len..];
    }
    Some(out)
}

/// Lines of a host API payload, framed or not.
pub fn decode_lines(payload: &[u8]) -> Vec<String> {
    match demultiplex(payload) {
        Some(text) => split_lines(&String::from_utf8_lossy(&text)),
        None => split_lines(&String::from_utf8_lossy(payload)),
    }
}

/// Splits on `\n`, dropping a trailing `\r` per line and the empty segment
/// after a final newline.
pub fn split_lines(text: &str) -> Vec<String> {
    let text = text.strip_suffix('\n').unwrap_or(text);
    if text.is_empty() {
        return Vec::new();
    }
    text.split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line).to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutils::frames;

    #[test]
    fn test_framed_payload() {
        let payload = frames(&[
            "2024-01-01T00:00:00Z starting",
            "2024-01-01T00:00:01Z listening on :8080",
        ]);
        assert_eq!(
            decode_lines(&payload),
            vec![
                "2024-01-01T00:00:00Z starting",
                "2024-01-01T00:00:01Z listening on :8080",
            ]
        );
    }

    #[test]
    fn test_line_split_across_frames() {
        let mut payload = Vec::new();
        for (stream, chunk) in [(1u8, "hel"), (2u8, "lo\nwor"), (1u8, "ld\n")] {
            payload.extend_from_slice(&[stream, 0, 0, 0]);
            payload.extend_from_slice(&(chunk.len() as u32).to_be_bytes());
            payload.extend_from_slice(chunk.as_bytes());
        }
        assert_eq!(decode_lines(&payload), vec!["hello", "world"]);
    }

    #[test]
    fn test_plain_text_fallback() {
        assert_eq!(decode_lines(b"one\r\ntwo\nthree"), vec!["one", "two", "three"]);

        // Valid header with a length that overruns the payload
        let mut truncated = vec![1, 0, 0, 0, 0, 0, 0, 200];
        truncated.extend_from_slice(b"short\n");
        assert_eq!(demultiplex(&truncated), None);
        assert_eq!(decode_lines(&truncated).len(), 1);
    }

    #[test]
    fn test_empty_payloads() {
        assert!(decode_lines(b"").is_empty());
        assert!(decode_lines(b"\n").is_empty());
        assert!(decode_lines(&frames(&[])).is_empty());
        assert_eq!(split_lines("a\n\nb\n"), vec!["a", "", "b"]);
    }
}
