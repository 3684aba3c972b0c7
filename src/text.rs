use crate::error::{Error, Result};

/// Splits `text` into chunks of at most `chunk_size` characters.
///
/// Consecutive chunks share `overlap` characters. Splits always land on char
/// boundaries, so multi-byte text is never cut mid-character.
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Result<Vec<String>> {
    if chunk_size == 0 {
        return Err(Error::InvalidArgument("chunk size must be positive".to_string()));
    }
    if overlap >= chunk_size {
        return Err(Error::InvalidArgument(format!(
            "overlap ({overlap}) must be smaller than chunk size ({chunk_size})"
        )));
    }

    let chars: Vec<char> = text.chars().collect();
    let step = chunk_size - overlap;
    let mut chunks = Vec::new();
    let mut start = 0;
    while start < chars.len() {
        let end = (start + chunk_size).min(chars.len());
        chunks.push(chars[start..end].iter().collect());
        if end == chars.len() {
            break;
        }
        start += step;
    }
    Ok(chunks)
}

/// Collapses runs of blank lines and trims trailing whitespace per line.
pub fn normalize_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut blank_run = 0;
    for line in text.lines() {
        let line = line.trim_end();
        if line.is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        out.push_str(line);
        out.push('\n');
    }
    out.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunks_overlap_by_the_requested_amount() {
        let chunks = chunk_text("abcdefghij", 4, 1).unwrap();
        assert_eq!(chunks, vec!["abcd", "defg", "ghij"]);
    }

    #[test]
    fn short_text_is_a_single_chunk() {
        assert_eq!(chunk_text("hi", 10, 2).unwrap(), vec!["hi"]);
        assert!(chunk_text("", 10, 2).unwrap().is_empty());
    }

    #[test]
    fn multibyte_text_splits_on_chars() {
        let chunks = chunk_text("héllo wörld", 5, 0).unwrap();
        assert_eq!(chunks, vec!["héllo", " wörl", "d"]);
    }

    #[test]
    fn overlap_must_be_smaller_than_chunk() {
        assert!(matches!(
            chunk_text("abc", 2, 2),
            Err(Error::InvalidArgument(_))
        ));
        assert!(chunk_text("abc", 0, 0).is_err());
    }

    #[test]
    fn whitespace_normalization() {
        assert_eq!(
            normalize_whitespace(" HELLLO  \n\n\n\n\nworld\n"),
            "HELLLO\n\nworld"
        );
    }
}
