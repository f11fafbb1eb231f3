use std::borrow::Cow;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use super::model::VitsError;

/// Where to find espeak-ng and its language data.
#[derive(Debug, Clone, Default)]
pub struct EspeakConfig {
    /// espeak-ng binary; `None` runs `espeak-ng` from PATH.
    pub bin_path: Option<PathBuf>,
    /// The `espeak-ng-data` directory; `None` uses the system data.
    pub data_path: Option<PathBuf>,
}

/// Convert text to an IPA phoneme string via espeak-ng.
///
/// Sentence punctuation is kept in place (followed by a space) since VITS
/// models use it for prosody; espeak itself drops it.
pub fn phonemize(text: &str, voice: &str, espeak: &EspeakConfig) -> Result<String, VitsError> {
    let parts = split_text_parts(text);
    if parts.is_empty() {
        return Ok(String::new());
    }

    let text_segments: Vec<&str> = parts
        .iter()
        .filter_map(|part| match part {
            TextPart::Text(segment) => Some(segment.as_str()),
            TextPart::Punct(_) => None,
        })
        .collect();

    let segment_phonemes = if text_segments.is_empty() {
        Vec::new()
    } else {
        phonemize_segments_batch(&text_segments, voice, espeak)?
    };

    let mut phonemes = String::new();
    let mut segment_index = 0usize;
    for part in parts {
        match part {
            TextPart::Text(_) => {
                if let Some(chunk) = segment_phonemes.get(segment_index) {
                    phonemes.push_str(chunk);
                }
                segment_index += 1;
            }
            TextPart::Punct(ch) => {
                phonemes.push(ch);
                phonemes.push(' ');
            }
        }
    }

    Ok(phonemes.trim_end().to_string())
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum TextPart {
    Text(String),
    Punct(char),
}

fn split_text_parts(text: &str) -> Vec<TextPart> {
    let mut parts = Vec::new();
    let mut current = String::new();

    for (idx, ch) in text.char_indices() {
        let ch_len = ch.len_utf8();
        if let Some(punct) = map_boundary_punctuation(ch) {
            if !is_numeric_connector_between_digits(text, idx, ch_len, ch) {
                flush_text_part(&mut parts, &mut current);
                parts.push(TextPart::Punct(punct));
                continue;
            }
        }

        if ch.is_whitespace() {
            if !current.is_empty() && !current.ends_with(' ') {
                current.push(' ');
            }
            continue;
        }

        current.push(ch);
    }

    flush_text_part(&mut parts, &mut current);
    parts
}

fn flush_text_part(parts: &mut Vec<TextPart>, current: &mut String) {
    let trimmed = current.trim();
    if !trimmed.is_empty() {
        parts.push(TextPart::Text(trimmed.to_string()));
    }
    current.clear();
}

fn map_boundary_punctuation(ch: char) -> Option<char> {
    match ch {
        '.' | '!' | '?' | ',' | ';' | ':' => Some(ch),
        '\n' | '\r' => Some('.'),
        _ => None,
    }
}

fn is_numeric_connector_between_digits(text: &str, idx: usize, ch_len: usize, ch: char) -> bool {
    if !matches!(ch, '.' | ',') {
        return false;
    }

    let prev = text[..idx].chars().next_back();
    let next = text[idx + ch_len..].chars().next();

    matches!(
        (prev, next),
        (Some(left), Some(right)) if left.is_ascii_digit() && right.is_ascii_digit()
    )
}

fn phonemize_segments_batch(
    segments: &[&str],
    voice: &str,
    espeak: &EspeakConfig,
) -> Result<Vec<String>, VitsError> {
    let batched_input = segments.join("\n");
    let output = run_espeak(&batched_input, voice, espeak)?;
    let lines: Vec<&str> = output.lines().collect();

    // One output line per input line is expected; otherwise go one by one.
    if lines.len() != segments.len() {
        return segments
            .iter()
            .map(|segment| Ok(clean_ipa(&run_espeak(segment, voice, espeak)?)))
            .collect();
    }

    Ok(lines.iter().map(|line| clean_ipa(line)).collect())
}

fn run_espeak(input: &str, voice: &str, espeak: &EspeakConfig) -> Result<String, VitsError> {
    let bin = espeak
        .bin_path
        .as_deref()
        .unwrap_or_else(|| std::path::Path::new("espeak-ng"));
    let mut command = Command::new(bin);
    command
        .args(["--ipa", "--stdin", "-q", "-v", voice])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    // espeak-ng looks for `espeak-ng-data` inside ESPEAK_DATA_PATH.
    if let Some(parent) = espeak.data_path.as_deref().and_then(|p| p.parent()) {
        command.env("ESPEAK_DATA_PATH", parent);
    }

    let mut child = command.spawn().map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            VitsError::EspeakNotFound
        } else {
            VitsError::Io(e)
        }
    })?;

    if let Some(mut stdin) = child.stdin.take() {
        // espeak-ng reads stdin line by line; an unterminated last line can
        // lose its final token.
        let stdin_payload = canonicalize_espeak_stdin_payload(input);
        stdin
            .write_all(stdin_payload.as_bytes())
            .map_err(VitsError::Io)?;
    }

    let output = child.wait_with_output().map_err(VitsError::Io)?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(VitsError::PhonemizerFailed(format!(
            "espeak-ng exited with code {:?}: {stderr}",
            output.status.code()
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

fn canonicalize_espeak_stdin_payload(input: &str) -> Cow<'_, str> {
    if input.ends_with('\n') {
        Cow::Borrowed(input)
    } else {
        Cow::Owned(format!("{input}\n"))
    }
}

/// Join espeak's output lines with spaces and drop its `_` separators, which
/// collide with the model's pad symbol.
fn clean_ipa(ipa: &str) -> String {
    ipa.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| line.chars().filter(|&c| c != '_').collect::<String>())
        .collect::<Vec<_>>()
        .join(" ")
}
