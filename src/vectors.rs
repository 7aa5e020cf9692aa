//! Reading vector files back in.

use std::fs::File;
use std::io::{BufRead, BufReader, Read, Write};
use std::mem;
use std::ops::Index;
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};

use crate::real;

/// Longest word kept when reading a binary vector file, in bytes.
pub const MAX_WORD_BYTES: usize = 50;

#[derive(Debug)]
pub struct Vectors {
    /// Embedding vector length (number of dimensions).
    size: usize,

    /// The vocabulary.
    vocab: Vec<String>,

    /// `embeddings[k * size..(k+1) * size]` is the vector embedding for word `k`.
    embeddings: Vec<real>,
}

impl Index<usize> for Vectors {
    type Output = [real];

    fn index(&self, i: usize) -> &[real] {
        &self.embeddings[i * self.size..][..self.size]
    }
}

fn parse_header_field(field: Option<&str>) -> Result<usize> {
    field
        .ok_or_else(|| anyhow!("invalid input file: missing header"))?
        .parse()
        .context("invalid input file: bad header")
}

impl Vectors {
    /// Loads a file in the binary vector format, as written with `--binary`.
    pub fn load_binary(file_name: &Path) -> Result<Self> {
        let f = BufReader::new(
            File::open(file_name)
                .with_context(|| format!("input file {} not found", file_name.display()))?,
        );
        Self::read_binary(f)
    }

    pub fn read_binary<R: BufRead>(mut f: R) -> Result<Self> {
        let mut line = String::new();
        f.read_line(&mut line).context("error reading input file")?;
        let mut fields = line.split_whitespace();
        let num_words = parse_header_field(fields.next())?;
        let size = parse_header_field(fields.next())?;

        let row_bytes = num_words
            .checked_mul(size)
            .and_then(|_| size.checked_mul(mem::size_of::<real>()))
            .ok_or_else(|| anyhow!("invalid input file: bad header"))?;

        // Storage grows with the data actually read, not with the header.
        let mut vocab: Vec<String> = vec![];
        let mut m: Vec<real> = vec![];
        let mut bytes = vec![];
        for b in 0..num_words {
            let mut vocab_word = Vec::<u8>::new();
            let count = f
                .read_until(b' ', &mut vocab_word)
                .context("error reading input file")?;
            if count == 0 {
                break;
            }
            if vocab_word.last() == Some(&b' ') {
                vocab_word.pop();
            }
            vocab_word.retain(|c| *c != b'\n');
            vocab_word.truncate(MAX_WORD_BYTES);
            vocab.push(String::from_utf8_lossy(&vocab_word).into_owned());

            bytes.clear();
            f.by_ref()
                .take(row_bytes as u64)
                .read_to_end(&mut bytes)
                .context("error reading input file")?;
            if bytes.len() < row_bytes {
                bail!("input file ends inside the vector for word {b}");
            }
            m.extend(
                bytes
                    .chunks_exact(mem::size_of::<real>())
                    .map(bytemuck::pod_read_unaligned::<real>),
            );
        }

        Ok(Vectors {
            size,
            vocab,
            embeddings: m,
        })
    }

    pub fn num_words(&self) -> usize {
        self.vocab.len()
    }

    /// Returns the vector size.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Get the word for a word-index. Panics if `word` is out of range.
    pub fn word(&self, word: usize) -> &str {
        &self.vocab[word]
    }

    /// Writes the text vector format: a `"<words> <size>"` header, then each
    /// word followed by its components.
    pub fn write_text<W: Write>(&self, fo: &mut W) -> Result<()> {
        writeln!(fo, "{} {}", self.num_words(), self.size)
            .context("error writing output file")?;
        for k in 0..self.num_words() {
            write!(fo, "{} ", self.word(k))
                .context("error writing output file")?;
            for x in &self[k] {
                write!(fo, "{x:.6} ").context("error writing output file")?;
            }
            writeln!(fo).context("error writing output file")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn binary_file(words: &[(&str, &[f32])]) -> Vec<u8> {
        let size = words[0].1.len();
        let mut bytes = format!("{} {}\n", words.len(), size).into_bytes();
        for (w, v) in words {
            bytes.extend_from_slice(w.as_bytes());
            bytes.push(b' ');
            bytes.extend_from_slice(bytemuck::cast_slice::<f32, u8>(v));
            bytes.push(b'\n');
        }
        bytes
    }

    #[test]
    fn converts_binary_to_text() {
        let bytes = binary_file(&[("a", &[1.0, 2.0]), ("b", &[3.0, 4.0])]);
        let vectors = Vectors::read_binary(Cursor::new(bytes)).unwrap();
        assert_eq!(vectors.num_words(), 2);
        assert_eq!(vectors.size(), 2);
        assert_eq!(vectors.word(1), "b");
        assert_eq!(&vectors[1], &[3.0, 4.0]);

        let mut out = vec![];
        vectors.write_text(&mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "2 2\na 1.000000 2.000000 \nb 3.000000 4.000000 \n"
        );
    }

    #[test]
    fn long_words_are_cut() {
        let long = "w".repeat(80);
        let bytes = binary_file(&[(&long, &[0.5])]);
        let vectors = Vectors::read_binary(Cursor::new(bytes)).unwrap();
        assert_eq!(vectors.word(0).len(), MAX_WORD_BYTES);
        assert_eq!(&vectors[0], &[0.5]);
    }

    #[test]
    fn truncated_file_is_an_error() {
        let mut bytes = binary_file(&[("a", &[1.0, 2.0])]);
        bytes.truncate(bytes.len() - 3);
        assert!(Vectors::read_binary(Cursor::new(bytes)).is_err());
    }

    #[test]
    fn oversized_header_is_an_error() {
        let bytes = format!("2 {}\n", usize::MAX / 2).into_bytes();
        let err = Vectors::read_binary(Cursor::new(bytes)).unwrap_err();
        assert_eq!(err.to_string(), "invalid input file: bad header");

        // Representable, but far larger than the data that follows.
        let mut bytes = b"1000000 1000000\n".to_vec();
        bytes.extend_from_slice(b"a ");
        bytes.extend_from_slice(&[0; 16]);
        let err = Vectors::read_binary(Cursor::new(bytes)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "input file ends inside the vector for word 0"
        );
    }
}
