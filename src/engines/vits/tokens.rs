use std::collections::HashMap;
use std::path::Path;

use super::model::VitsError;

/// Padding symbol inserted after every phoneme.
pub const PAD: char = '_';
/// Beginning-of-sentence symbol.
pub const BOS: char = '^';
/// End-of-sentence symbol.
pub const EOS: char = '$';

/// Symbol table loaded from `tokens.txt`.
#[derive(Debug, Clone)]
pub struct TokenTable {
    ids: HashMap<char, i64>,
}

impl TokenTable {
    pub fn load(path: &Path) -> Result<Self, VitsError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse `<symbol> <id>` lines. A line whose symbol part is blank (for
    /// example `"  3"`) defines the space character.
    pub fn parse(content: &str) -> Result<Self, VitsError> {
        let mut ids = HashMap::new();

        for (lineno, line) in content.lines().enumerate() {
            let line = line.trim_end_matches('\r');
            if line.trim().is_empty() {
                continue;
            }
            let (symbol, id) = line
                .rsplit_once(' ')
                .ok_or_else(|| VitsError::Tokens(format!("line {}: {line:?}", lineno + 1)))?;
            let id: i64 = id
                .trim()
                .parse()
                .map_err(|e| VitsError::Tokens(format!("line {}: bad id: {e}", lineno + 1)))?;

            let mut chars = symbol.chars();
            let ch = match (chars.next(), chars.next()) {
                (None, _) => ' ',
                (Some(c), None) => c,
                // Multi-character symbols cannot come out of espeak; skip them.
                (Some(_), Some(_)) => continue,
            };
            ids.insert(ch, id);
        }

        if ids.is_empty() {
            return Err(VitsError::Tokens("no symbols".to_string()));
        }
        Ok(Self { ids })
    }

    pub fn get(&self, ch: char) -> Option<i64> {
        self.ids.get(&ch).copied()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Convert phonemes into model input ids:
    /// `BOS PAD (phoneme PAD)* EOS`. Unknown phonemes are dropped.
    pub fn encode(&self, phonemes: &str) -> Vec<i64> {
        let pad = self.get(PAD);
        let mut ids = Vec::with_capacity(phonemes.len() * 2 + 3);

        if let Some(bos) = self.get(BOS) {
            ids.push(bos);
        }
        ids.extend(pad);
        for ch in phonemes.chars() {
            if let Some(id) = self.get(ch) {
                ids.push(id);
                ids.extend(pad);
            }
        }
        if let Some(eos) = self.get(EOS) {
            ids.push(eos);
        }
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "_ 0\n^ 1\n$ 2\n  3\n! 4\nə 59\nh 20\nl 24\n";

    #[test]
    fn parses_symbols_including_space() {
        let table = TokenTable::parse(SAMPLE).unwrap();
        assert_eq!(table.len(), 8);
        assert_eq!(table.get(' '), Some(3));
        assert_eq!(table.get('ə'), Some(59));
    }

    #[test]
    fn encodes_with_padding_and_markers() {
        let table = TokenTable::parse(SAMPLE).unwrap();
        assert_eq!(table.encode("hə l"), vec![1, 0, 20, 0, 59, 0, 3, 0, 24, 0, 2]);
    }

    #[test]
    fn drops_unknown_phonemes() {
        let table = TokenTable::parse(SAMPLE).unwrap();
        assert_eq!(table.encode("hzh"), vec![1, 0, 20, 0, 20, 0, 2]);
    }

    #[test]
    fn rejects_malformed_lines() {
        assert!(TokenTable::parse("_ zero\n").is_err());
        assert!(TokenTable::parse("nospace\n").is_err());
        assert!(TokenTable::parse("\n\n").is_err());
    }

    #[test]
    fn tolerates_crlf() {
        let table = TokenTable::parse("_ 0\r\n^ 1\r\n").unwrap();
        assert_eq!(table.get('^'), Some(1));
    }
}
