//! Splitting raw corpus bytes into words.

use std::io::{self, BufRead, ErrorKind};

use crate::{EOS, MAX_STRING};

/// Reads a single word, assuming space + tab + EOL to be word boundaries.
///
/// A newline reads as the word `</s>`. When a newline ends a word it stays
/// in the stream, so the sentence break is the next word returned. Returns
/// `Ok(None)` at end of file.
pub fn read_word<R: BufRead>(fin: &mut R) -> io::Result<Option<String>> {
    let mut word = Vec::<u8>::new();
    loop {
        let ch = match fin.fill_buf() {
            Ok([]) => break,
            Ok(buf) => buf[0],
            Err(ref e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };

        if ch == b' ' || ch == b'\t' || ch == b'\n' {
            if !word.is_empty() {
                if ch != b'\n' {
                    fin.consume(1);
                }
                break;
            }
            fin.consume(1);
            if ch == b'\n' {
                return Ok(Some(EOS.to_string()));
            }
            continue;
        }
        fin.consume(1);
        if ch != b'\r' && word.len() < MAX_STRING - 2 {
            word.push(ch); // Truncate too long words
        }
    }
    Ok(if word.is_empty() {
        None
    } else {
        Some(String::from_utf8_lossy(&word).into_owned())
    })
}

/// Iterates over all the words [`read_word`] finds in `fin`.
pub fn read_words<R: BufRead>(mut fin: R) -> impl Iterator<Item = io::Result<String>> {
    std::iter::from_fn(move || read_word(&mut fin).transpose())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn words(text: &str) -> Vec<String> {
        read_words(Cursor::new(text.as_bytes().to_vec()))
            .collect::<io::Result<Vec<_>>>()
            .unwrap()
    }

    #[test]
    fn whitespace_collapses_and_newlines_end_sentences() {
        assert_eq!(
            words("the  cat\tsat\non the\r\nmat"),
            ["the", "cat", "sat", "</s>", "on", "the", "</s>", "mat"]
        );
    }

    #[test]
    fn bare_newlines_are_sentence_ends() {
        assert_eq!(words("\n\na\n"), ["</s>", "</s>", "a", "</s>"]);
        assert!(words("   \t ").is_empty());
    }

    #[test]
    fn long_words_are_truncated() {
        let long = "x".repeat(300);
        let got = words(&format!("{long} y"));
        assert_eq!(got[0].len(), MAX_STRING - 2);
        assert_eq!(got[1], "y");
    }
}
