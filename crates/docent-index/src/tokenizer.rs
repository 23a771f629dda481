//! Text ↔ token id conversion used to size chunks.

use std::path::Path;
use std::str::FromStr;

use tokenizers::Tokenizer;

use crate::error::{IndexError, Result};

/// Deterministic text codec.
///
/// `decode(encode(x))` must reproduce `x` up to documented tokenizer
/// lossiness, and the same text must always produce the same ids. Chunk
/// boundaries are only reproducible across runs that use the same codec, so
/// [`TokenCodec::name`] is recorded with every ingestion.
pub trait TokenCodec: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if the underlying tokenizer rejects the input.
    fn encode(&self, text: &str) -> Result<Vec<u32>>;

    /// # Errors
    ///
    /// Returns an error if an id is outside the vocabulary.
    fn decode(&self, ids: &[u32]) -> Result<String>;

    fn name(&self) -> &str;
}

/// [`TokenCodec`] backed by a Hugging Face `tokenizers` pipeline.
pub struct HfTokenizer {
    inner: Tokenizer,
    name: String,
}

impl std::fmt::Debug for HfTokenizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HfTokenizer")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl HfTokenizer {
    /// Load a serialized `tokenizer.json`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing or not a valid tokenizer definition.
    pub fn from_file(path: &Path) -> Result<Self> {
        let inner = Tokenizer::from_file(path).map_err(|e| {
            IndexError::Tokenizer(format!("failed to load {}: {e}", path.display()))
        })?;
        Ok(Self {
            inner,
            name: path.display().to_string(),
        })
    }

    /// Built-in byte-level codec: one token per UTF-8 byte.
    ///
    /// Needs no model files and round-trips any text exactly. Decoding a slice
    /// that splits a multi-byte character replaces the partial bytes with
    /// U+FFFD.
    ///
    /// # Errors
    ///
    /// Returns an error if the generated definition is rejected by `tokenizers`.
    pub fn byte_level() -> Result<Self> {
        let definition = byte_level_definition();
        let inner = Tokenizer::from_str(&definition.to_string())
            .map_err(|e| IndexError::Tokenizer(format!("byte-level tokenizer: {e}")))?;
        Ok(Self {
            inner,
            name: "byte-level".to_owned(),
        })
    }
}

impl TokenCodec for HfTokenizer {
    fn encode(&self, text: &str) -> Result<Vec<u32>> {
        let encoding = self
            .inner
            .encode(text, false)
            .map_err(|e| IndexError::Tokenizer(format!("encode failed: {e}")))?;
        Ok(encoding.get_ids().to_vec())
    }

    fn decode(&self, ids: &[u32]) -> Result<String> {
        self.inner
            .decode(ids, false)
            .map_err(|e| IndexError::Tokenizer(format!("decode failed: {e}")))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// GPT-2 style reversible byte → printable char table.
fn byte_alphabet() -> Vec<char> {
    let printable = |b: u8| matches!(b, b'!'..=b'~' | 0xA1..=0xAC | 0xAE..=0xFF);
    let mut shifted = 0u32;
    (0..=255u8)
        .map(|b| {
            if printable(b) {
                char::from(b)
            } else {
                let c = char::from_u32(256 + shifted).unwrap_or(char::REPLACEMENT_CHARACTER);
                shifted += 1;
                c
            }
        })
        .collect()
}

fn byte_level_definition() -> serde_json::Value {
    let vocab: serde_json::Map<String, serde_json::Value> = byte_alphabet()
        .into_iter()
        .zip(0u32..)
        .map(|(c, id)| (c.to_string(), serde_json::Value::from(id)))
        .collect();
    let byte_level = serde_json::json!({
        "type": "ByteLevel",
        "add_prefix_space": false,
        "trim_offsets": true,
        "use_regex": true
    });
    serde_json::json!({
        "version": "1.0",
        "truncation": null,
        "padding": null,
        "added_tokens": [],
        "normalizer": null,
        "pre_tokenizer": byte_level,
        "post_processor": null,
        "decoder": byte_level,
        "model": {
            "type": "BPE",
            "dropout": null,
            "unk_token": null,
            "continuing_subword_prefix": null,
            "end_of_word_suffix": null,
            "fuse_unk": false,
            "byte_fallback": false,
            "ignore_merges": false,
            "vocab": vocab,
            "merges": []
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alphabet_is_a_bijection_over_bytes() {
        let alphabet = byte_alphabet();
        assert_eq!(alphabet.len(), 256);
        let unique: std::collections::HashSet<char> = alphabet.iter().copied().collect();
        assert_eq!(unique.len(), 256);
        assert_eq!(alphabet[usize::from(b'a')], 'a');
        assert_eq!(alphabet[usize::from(b' ')], 'Ġ');
    }

    #[test]
    fn byte_level_round_trips() {
        let codec = HfTokenizer::byte_level().unwrap();
        for text in [
            "hello world",
            "  leading and trailing  ",
            "line one\nline two\r\n\ttab",
            "naïve café 東京 🚀",
            "",
        ] {
            let ids = codec.encode(text).unwrap();
            assert_eq!(ids.len(), text.len());
            assert_eq!(codec.decode(&ids).unwrap(), text);
        }
    }

    #[test]
    fn byte_level_is_deterministic() {
        let codec = HfTokenizer::byte_level().unwrap();
        let a = codec.encode("repeatable input").unwrap();
        let b = codec.encode("repeatable input").unwrap();
        assert_eq!(a, b);
        assert_eq!(codec.name(), "byte-level");
    }

    #[test]
    fn split_multibyte_char_decodes_lossy() {
        let codec = HfTokenizer::byte_level().unwrap();
        let ids = codec.encode("é").unwrap();
        assert_eq!(ids.len(), 2);
        let partial = codec.decode(&ids[..1]).unwrap();
        assert_eq!(partial, "\u{FFFD}");
    }

    #[test]
    fn missing_tokenizer_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let err = HfTokenizer::from_file(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, IndexError::Tokenizer(_)));
    }

    mod proptest_codec {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn round_trip_any_string(text in "\\PC{0,200}") {
                let codec = HfTokenizer::byte_level().unwrap();
                let ids = codec.encode(&text).unwrap();
                prop_assert_eq!(codec.decode(&ids).unwrap(), text);
            }
        }
    }
}
