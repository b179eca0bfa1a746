//! Escape-encoded output payload framing.
//!
//! The device frames its output as `OUTPUT_BEGIN data… OUTPUT_END`, where
//! any literal `OUTPUT_END` (0x05) or `ESCAPE` (0x06) byte inside `data…`
//! is prefixed with `ESCAPE`. Decoding is stateless across exchanges but
//! stateful within one exchange's payload, so each exchange carries its
//! own [`OutputDecoder`].

pub mod escape;

pub use escape::{escape_encode, OutputDecoder};
