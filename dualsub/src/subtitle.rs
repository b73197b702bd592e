//! SRT to WebVTT conversion.
//!
//! SRT blocks are separated by blank lines. A block may start with a numeric
//! sequence line, then has a time range line containing `-->` with
//! comma-decimal timestamps, then its text lines. Blocks without a time range
//! line are dropped.

/// First line of every WebVTT file.
pub const WEBVTT_HEADER: &str = "WEBVTT";

const TIME_SEPARATOR: &str = "-->";

/// One SRT block reduced to what WebVTT needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cue<'a> {
    pub time_line: &'a str,
    pub text: Vec<&'a str>,
}

/// Split SRT text into its blank-line separated blocks.
fn blocks(srt: &str) -> Vec<Vec<&str>> {
    let mut blocks = Vec::new();
    let mut current = Vec::new();

    for line in srt.lines() {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.trim().is_empty() {
            if !current.is_empty() {
                blocks.push(std::mem::take(&mut current));
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        blocks.push(current);
    }

    blocks
}

fn is_sequence_number(line: &str) -> bool {
    let line = line.trim();
    !line.is_empty() && line.chars().all(|c| c.is_ascii_digit())
}

/// Parse the cues of an SRT document, skipping blocks with no time range.
pub fn parse_srt(srt: &str) -> Vec<Cue<'_>> {
    blocks(srt)
        .into_iter()
        .filter_map(|lines| {
            let start = usize::from(is_sequence_number(lines[0]));
            let time_line = *lines.get(start)?;
            if !time_line.contains(TIME_SEPARATOR) {
                return None;
            }
            Some(Cue {
                time_line,
                text: lines[start + 1..].to_vec(),
            })
        })
        .collect()
}

/// Convert a time range line from comma-decimal to period-decimal.
pub fn vtt_time_line(srt_time_line: &str) -> String {
    srt_time_line.trim().replace(',', ".")
}

/// Convert an SRT document to WebVTT.
pub fn srt_to_vtt(srt: &str) -> String {
    let mut out: Vec<String> = vec![WEBVTT_HEADER.to_string(), String::new()];
    for cue in parse_srt(srt) {
        out.push(vtt_time_line(cue.time_line));
        out.extend(cue.text.iter().map(|line| line.to_string()));
        out.push(String::new());
    }
    out.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_block() {
        let vtt = srt_to_vtt("1\n00:00:01,000 --> 00:00:02,500\nHello");
        assert_eq!(vtt, "WEBVTT\n\n00:00:01.000 --> 00:00:02.500\nHello\n");
    }

    #[test]
    fn test_multiple_blocks_one_blank_line_apart() {
        let srt = "1\n00:00:01,000 --> 00:00:02,000\nHello\nthere\n\n\n\n2\n00:00:03,000 --> 00:00:04,000\nWorld\n";
        let vtt = srt_to_vtt(srt);
        assert_eq!(
            vtt,
            "WEBVTT\n\n00:00:01.000 --> 00:00:02.000\nHello\nthere\n\n00:00:03.000 --> 00:00:04.000\nWorld\n"
        );
    }

    #[test]
    fn test_crlf_and_whitespace_only_separators() {
        let srt = "1\r\n00:00:01,000 --> 00:00:02,000\r\nHi\r\n  \r\n2\r\n00:00:03,000 --> 00:00:04,000\r\nYo\r\n";
        assert_eq!(
            srt_to_vtt(srt),
            "WEBVTT\n\n00:00:01.000 --> 00:00:02.000\nHi\n\n00:00:03.000 --> 00:00:04.000\nYo\n"
        );
    }

    #[test]
    fn test_block_without_sequence_number() {
        let vtt = srt_to_vtt("00:00:01,000 --> 00:00:02,000\nNo index");
        assert_eq!(vtt, "WEBVTT\n\n00:00:01.000 --> 00:00:02.000\nNo index\n");
    }

    #[test]
    fn test_blocks_without_time_line_are_dropped() {
        let srt = "1\nnot a time\nText\n\n2\n00:00:05,000 --> 00:00:06,000\nKept\n\n3\n";
        let cues = parse_srt(srt);
        assert_eq!(cues.len(), 1);
        assert_eq!(cues[0].text, vec!["Kept"]);
        assert_eq!(
            srt_to_vtt(srt),
            "WEBVTT\n\n00:00:05.000 --> 00:00:06.000\nKept\n"
        );
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(srt_to_vtt(""), "WEBVTT\n");
        assert_eq!(srt_to_vtt("\n\n  \n"), "WEBVTT\n");
    }

    #[test]
    fn test_text_commas_untouched() {
        let vtt = srt_to_vtt("1\n00:00:01,000 --> 00:00:02,000\nWell, hello");
        assert!(vtt.ends_with("Well, hello\n"));
    }

    #[test]
    fn test_time_transform_is_idempotent() {
        let once = vtt_time_line("00:00:01,000 --> 00:00:02,500");
        assert_eq!(vtt_time_line(&once), once);
    }
}
