//! Transcript recovery from unstructured tool output
//!
//! The transcription tool has no structured output channel; it interleaves
//! the transcript with model metadata and progress chatter on stdout. This
//! module is the single place that knows how to dig the transcript out, so
//! it can be swapped wholesale if the tool ever grows a JSON mode.

/// Substrings that mark a line as model-metadata chatter rather than
/// transcript
const DIAGNOSTIC_KEYWORDS: &[&str] = &[
    "card",
    "dim",
    "num_heads",
    "model_id",
    "tokenizer",
    "steps",
    "token per sec",
];

/// Extract the transcript from the tool's combined stdout
///
/// Scans lines from the end backward, skipping diagnostic lines; the first
/// surviving non-empty line is the transcript. Returns an empty string when
/// every line is diagnostic (silence transcribes to nothing).
#[must_use]
pub fn extract_transcript(stdout: &str) -> String {
    stdout
        .lines()
        .rev()
        .map(str::trim)
        .find(|line| !line.is_empty() && !is_diagnostic(line))
        .unwrap_or_default()
        .to_string()
}

/// Whether a line looks like tool chatter rather than transcript
fn is_diagnostic(line: &str) -> bool {
    line.starts_with("Info:")
        || line.starts_with('{')
        || line.starts_with('}')
        || DIAGNOSTIC_KEYWORDS.iter().any(|keyword| line.contains(keyword))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_last_non_diagnostic_line() {
        let stdout = "Info: loading model\n{\"model_id\": \"stt\"}\nhello there\n";
        assert_eq!(extract_transcript(stdout), "hello there");
    }

    #[test]
    fn skips_trailing_chatter() {
        let stdout = "hello there\nsteps: 412\n84.3 token per sec\n";
        assert_eq!(extract_transcript(stdout), "hello there");
    }

    #[test]
    fn skips_metadata_keyword_lines() {
        let stdout = concat!(
            "Info: mx.metal.device_info\n",
            "card: stt-2.6b\n",
            "dim: 2048\n",
            "num_heads: 16\n",
            "tokenizer loaded\n",
            "the quick brown fox\n",
        );
        assert_eq!(extract_transcript(stdout), "the quick brown fox");
    }

    #[test]
    fn all_diagnostic_output_yields_empty_transcript() {
        let stdout = "Info: warming up\n{\n}\nsteps: 3\n";
        assert_eq!(extract_transcript(stdout), "");
    }

    #[test]
    fn empty_output_yields_empty_transcript() {
        assert_eq!(extract_transcript(""), "");
        assert_eq!(extract_transcript("\n\n  \n"), "");
    }

    #[test]
    fn whitespace_around_transcript_is_trimmed() {
        assert_eq!(extract_transcript("  hello world  \n"), "hello world");
    }

    #[test]
    fn transcript_containing_keyword_substring_is_skipped() {
        // A real limitation of the heuristic: "cardinal" contains "card".
        // Scanning continues to the next candidate line.
        let stdout = "hello there\nthe cardinal flew away\n";
        assert_eq!(extract_transcript(stdout), "hello there");
    }
}
