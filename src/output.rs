//! Writing trained vectors, or word classes derived from them.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};

use crate::real;
use crate::vocab::Vocabulary;

/// Writes the header `"<words> <size>"` and then one line per word.
///
/// `vectors` holds `size` floats per vocabulary entry. In binary mode the
/// floats follow the word as raw native-endian bytes; otherwise each is
/// printed with six decimals and a trailing space.
pub fn write_vectors<W: Write>(
    fo: &mut W,
    vocab: &Vocabulary,
    vectors: &[real],
    size: usize,
    binary: bool,
) -> Result<()> {
    writeln!(fo, "{} {}", vocab.len(), size)
        .context("error writing output file")?;
    for (vw, word_vec) in vocab.words().iter().zip(vectors.chunks_exact(size)) {
        write!(fo, "{} ", vw.word)
            .context("error writing output file")?;
        if binary {
            fo.write_all(bytemuck::cast_slice::<real, u8>(word_vec))
                .context("error writing output file")?;
        } else {
            for f in word_vec {
                write!(fo, "{f:.6} ").context("error writing output file")?;
            }
        }
        writeln!(fo).context("error writing output file")?;
    }
    Ok(())
}

/// Clusters the vectors with 10 rounds of K-means on cosine similarity and
/// returns the class of every word.
pub fn kmeans(vectors: &[real], size: usize, classes: usize) -> Vec<usize> {
    let vocab_size = vectors.len() / size;
    let clcn = classes;
    let mut centcn = vec![0u64; classes];
    let mut cl: Vec<usize> = (0..vocab_size).map(|a| a % clcn).collect();
    let mut cent: Vec<real> = vec![0.0; classes * size];

    let iter = 10;
    for _ in 0..iter {
        cent.fill(0.0);
        centcn.fill(1);

        // Set cent[c] = sum of vectors in class c, centcn[c] = number of vectors in class c + 1
        for (c, v) in vectors.chunks_exact(size).enumerate() {
            for (d, x) in v.iter().enumerate() {
                cent[size * cl[c] + d] += x;
            }
            centcn[cl[c]] += 1;
        }

        // Set cent[c] = center of class c, normalized to length 1
        for (center, &n) in cent.chunks_exact_mut(size).zip(&centcn) {
            for x in center.iter_mut() {
                *x /= n as real;
            }
            crate::normalize(center);
        }

        // Move vectors to nearest class (by dot-product similarity with center of class).
        for (c, v) in vectors.chunks_exact(size).enumerate() {
            let mut closev: real = -10.0;
            let mut closeid = 0;
            for (d, center) in cent.chunks_exact(size).enumerate() {
                let x = crate::dot(center, v);
                if x > closev {
                    closev = x;
                    closeid = d;
                }
            }
            cl[c] = closeid;
        }
    }
    cl
}

/// Writes one `word class` line per vocabulary entry.
pub fn write_classes<W: Write>(fo: &mut W, vocab: &Vocabulary, cl: &[usize]) -> Result<()> {
    for (vw, class) in vocab.words().iter().zip(cl) {
        writeln!(fo, "{} {}", vw.word, class)
            .context("error writing k-means classes to output file")?;
    }
    Ok(())
}

/// Saves either the vectors or, when `classes > 0`, their K-means classes.
pub fn save(
    output_file: &Path,
    vocab: &Vocabulary,
    vectors: &[real],
    size: usize,
    classes: usize,
    binary: bool,
) -> Result<()> {
    let mut fo = BufWriter::new(
        File::create(output_file)
            .with_context(|| format!("error creating output file {}", output_file.display()))?,
    );
    if classes == 0 {
        write_vectors(&mut fo, vocab, vectors, size, binary)?;
    } else {
        let cl = kmeans(vectors, size, classes);
        write_classes(&mut fo, vocab, &cl)?;
    }
    fo.flush().context("error writing output file")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vocab(words: &[&str]) -> Vocabulary {
        let mut vocab = Vocabulary::new(1000);
        for (i, w) in words.iter().enumerate() {
            for _ in 0..(100 - i) {
                vocab.add_occurrence(w.to_string());
            }
        }
        vocab.sort(1);
        vocab
    }

    #[test]
    fn text_format() {
        let vocab = vocab(&["x"]);
        let mut out = vec![];
        write_vectors(&mut out, &vocab, &[0.5, -1.0, 0.25, 2.0], 2, false).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "2 2\n</s> 0.500000 -1.000000 \nx 0.250000 2.000000 \n"
        );
    }

    #[test]
    fn binary_format() {
        let vocab = vocab(&["x"]);
        let mut out = vec![];
        write_vectors(&mut out, &vocab, &[0.5, -1.0, 0.25, 2.0], 2, true).unwrap();

        let mut expected = b"2 2\n</s> ".to_vec();
        expected.extend_from_slice(&0.5f32.to_ne_bytes());
        expected.extend_from_slice(&(-1.0f32).to_ne_bytes());
        expected.extend_from_slice(b"\nx ");
        expected.extend_from_slice(&0.25f32.to_ne_bytes());
        expected.extend_from_slice(&2.0f32.to_ne_bytes());
        expected.push(b'\n');
        assert_eq!(out, expected);
    }

    #[test]
    fn kmeans_separates_directions() {
        let vectors = [
            1.0, 0.1, //
            0.1, 1.0, //
            0.9, 0.0, //
            0.0, 0.8, //
            1.0, 0.2, //
            0.2, 1.0, //
        ];
        let cl = kmeans(&vectors, 2, 2);
        assert_eq!(cl.len(), 6);
        assert_eq!(cl[0], cl[2]);
        assert_eq!(cl[0], cl[4]);
        assert_eq!(cl[1], cl[3]);
        assert_eq!(cl[1], cl[5]);
        assert_ne!(cl[0], cl[1]);

        let vocab = vocab(&["a", "b", "c", "d", "e"]);
        let mut out = vec![];
        write_classes(&mut out, &vocab, &cl).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().count(), 6);
        assert!(text.starts_with(&format!("</s> {}\n", cl[0])));
    }
}
