use std::str;

use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
#[error("Stream is not valid UTF-8")]
pub struct InvalidUtf8;

/// Incremental UTF-8 decoder for byte streams that split anywhere.
///
/// HTTP bodies arrive in arbitrary chunks, and Korean text is three bytes per
/// syllable, so a chunk boundary lands inside a character more often than
/// not. `push` emits the longest valid prefix and carries the partial
/// character until the next chunk completes it. A genuinely invalid sequence
/// (as opposed to an incomplete one) is an error, as is ending the stream
/// with bytes still carried.
#[derive(Debug, Default)]
pub struct Utf8Chunks {
    carry: Vec<u8>,
}

impl Utf8Chunks {
    pub fn new() -> Self {
        Utf8Chunks::default()
    }

    /// Feed the next chunk and take whatever text is decodable so far.
    pub fn push(&mut self, bytes: &[u8]) -> Result<String, InvalidUtf8> {
        self.carry.extend_from_slice(bytes);
        match str::from_utf8(&self.carry) {
            Ok(text) => {
                let text = text.to_owned();
                self.carry.clear();
                Ok(text)
            }
            Err(error) => {
                if error.error_len().is_some() {
                    return Err(InvalidUtf8);
                }
                // Incomplete trailing character: emit the valid prefix and
                // keep the tail for the next chunk.
                let valid = error.valid_up_to();
                let text = String::from_utf8_lossy(&self.carry[..valid]).into_owned();
                self.carry.drain(..valid);
                Ok(text)
            }
        }
    }

    /// Declare the stream over. Errors if a partial character is still
    /// carried, which means the stream was truncated mid-character.
    pub fn finish(&self) -> Result<(), InvalidUtf8> {
        if self.carry.is_empty() {
            Ok(())
        } else {
            Err(InvalidUtf8)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whole_chunks_pass_through() {
        let mut decoder = Utf8Chunks::new();
        assert_eq!(decoder.push("안녕하세요".as_bytes()).unwrap(), "안녕하세요");
        assert_eq!(decoder.push(b" doctor").unwrap(), " doctor");
        assert!(decoder.finish().is_ok());
    }

    #[test]
    fn reassembles_character_split_across_chunks() {
        // "허" is three bytes; split it 1 + 2.
        let bytes = "허리".as_bytes();
        let mut decoder = Utf8Chunks::new();
        assert_eq!(decoder.push(&bytes[..1]).unwrap(), "");
        assert_eq!(decoder.push(&bytes[1..]).unwrap(), "허리");
        assert!(decoder.finish().is_ok());
    }

    #[test]
    fn emits_valid_prefix_while_carrying_tail() {
        let bytes = "아프다".as_bytes();
        let mut decoder = Utf8Chunks::new();
        // First chunk covers "아프" plus one byte of "다".
        assert_eq!(decoder.push(&bytes[..7]).unwrap(), "아프");
        assert_eq!(decoder.push(&bytes[7..]).unwrap(), "다");
    }

    #[test]
    fn invalid_sequence_is_an_error() {
        let mut decoder = Utf8Chunks::new();
        assert_eq!(decoder.push(&[0xFF, 0xFE]), Err(InvalidUtf8));
    }

    #[test]
    fn truncated_stream_fails_on_finish() {
        let bytes = "허".as_bytes();
        let mut decoder = Utf8Chunks::new();
        decoder.push(&bytes[..2]).unwrap();
        assert_eq!(decoder.finish(), Err(InvalidUtf8));
    }
}
