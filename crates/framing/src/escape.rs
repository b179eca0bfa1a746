use core_types::wire::status::{ESCAPE, OUTPUT_END};

/// Incremental decoder for one exchange's output payload.
///
/// Bytes are fed in as they arrive from the link; the payload may span any
/// number of deliveries. The decoder hands back the accumulated payload
/// when it sees an unescaped `OUTPUT_END`. Bytes after the terminator in
/// the same delivery are not consumed here and not owed to anyone: the
/// device ends framing at `OUTPUT_END`, so the caller discards them.
#[derive(Debug, Default)]
pub struct OutputDecoder {
    buffer: Vec<u8>,
    pending_escape: bool,
}

impl OutputDecoder {
    pub fn new() -> Self {
        Self {
            buffer: Vec::with_capacity(64),
            pending_escape: false,
        }
    }

    /// Ingest a chunk of payload bytes. Returns the decoded payload once
    /// the terminator is reached, `None` while the payload is incomplete.
    pub fn push(&mut self, bytes: &[u8]) -> Option<Vec<u8>> {
        for &b in bytes {
            if self.pending_escape {
                self.buffer.push(b);
                self.pending_escape = false;
            } else if b == ESCAPE {
                self.pending_escape = true;
            } else if b == OUTPUT_END {
                self.pending_escape = false;
                return Some(std::mem::take(&mut self.buffer));
            } else {
                self.buffer.push(b);
            }
        }
        None
    }

    /// Clear any partially accumulated payload.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.pending_escape = false;
    }
}

/// Encode a payload for the wire: insert `ESCAPE` before every byte equal
/// to `ESCAPE` or `OUTPUT_END`. Used by tests and device simulators; the
/// engine only ever decodes.
pub fn escape_encode(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len());
    for &b in payload {
        if b == ESCAPE || b == OUTPUT_END {
            out.push(ESCAPE);
        }
        out.push(b);
    }
    out
}

#[cfg(test)]
#[allow(clippy::panic, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_payload() {
        let mut decoder = OutputDecoder::new();
        // "hi" followed by the terminator
        assert_eq!(decoder.push(&[0x68, 0x69, 0x05]), Some(vec![0x68, 0x69]));
    }

    #[test]
    fn test_escaped_terminator_and_escape() {
        let mut decoder = OutputDecoder::new();
        // [ESC 05 ESC 06 END] decodes to the literal bytes [05, 06]
        assert_eq!(
            decoder.push(&[0x06, 0x05, 0x06, 0x06, 0x05]),
            Some(vec![0x05, 0x06])
        );
    }

    #[test]
    fn test_split_across_deliveries() {
        let mut decoder = OutputDecoder::new();
        assert_eq!(decoder.push(&[0x01, 0x02]), None);
        assert_eq!(decoder.push(&[0x06]), None); // escape pending across the split
        assert_eq!(decoder.push(&[0x05, 0x05]), Some(vec![0x01, 0x02, 0x05]));
    }

    #[test]
    fn test_empty_payload() {
        let mut decoder = OutputDecoder::new();
        assert_eq!(decoder.push(&[0x05]), Some(vec![]));
    }

    #[test]
    fn test_decoder_reusable_after_completion() {
        let mut decoder = OutputDecoder::new();
        assert_eq!(decoder.push(&[0x41, 0x05]), Some(vec![0x41]));
        assert_eq!(decoder.push(&[0x42, 0x05]), Some(vec![0x42]));
    }

    #[test]
    fn test_reset_discards_partial_payload() {
        let mut decoder = OutputDecoder::new();
        assert_eq!(decoder.push(&[0x01, 0x06]), None);
        decoder.reset();
        assert_eq!(decoder.push(&[0x02, 0x05]), Some(vec![0x02]));
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        // Any payload framed as esc_encode(P) ++ [OUTPUT_END] decodes to P.
        let payloads: Vec<Vec<u8>> = vec![
            vec![],
            vec![0x00],
            vec![0x05],
            vec![0x06],
            vec![0x05, 0x06, 0x05, 0x06],
            (0u8..=255).collect(),
            vec![0x06, 0x06, 0x06],
        ];
        for payload in payloads {
            let mut framed = escape_encode(&payload);
            framed.push(OUTPUT_END);
            let mut decoder = OutputDecoder::new();
            assert_eq!(decoder.push(&framed), Some(payload.clone()));
        }
    }

    #[test]
    fn test_roundtrip_byte_at_a_time() {
        let payload: Vec<u8> = vec![0x05, 0x41, 0x06, 0x42];
        let mut framed = escape_encode(&payload);
        framed.push(OUTPUT_END);

        let mut decoder = OutputDecoder::new();
        let mut result = None;
        for &b in &framed {
            result = decoder.push(&[b]);
        }
        assert_eq!(result, Some(payload));
    }
}
