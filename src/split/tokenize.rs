//! Deterministic sentence tokenizer.
//!
//! Boundaries occur at the configured CJK/Latin sentence-terminal
//! punctuation and are suppressed across split url schemes, adjacent
//! periods, open bracket spans and recognized timestamp patterns. A
//! boundary is promoted one token forward when the next token begins with a
//! closing quote/bracket glyph. Newlines always force a hard boundary.

use std::sync::LazyLock;

use regex::Regex;

use crate::consts::{
    ABBREVIATIONS, BRACKET_PAIRS, CHINESE_SENTENCE_STOP_SIGN, DATETIME_PATTERNS,
    ENGLISH_SENTENCE_STOP_SIGN, SENTENCE_STOP_EXT,
};
use crate::split::atom::{Interval, find_interval};

/// Byte span of one sentence inside the tokenized text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SentSpan {
    pub start: usize,
    pub end: usize,
}

#[derive(Debug)]
struct Token {
    text: String,
    end: usize,
    sent_break: bool,
    /// Hard breaks (newlines) cannot be suppressed.
    hard: bool,
}

/// Datetime patterns with `:` loosened to tolerate the spaces token joining
/// introduces.
static TOKEN_DATETIME_REGEXES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    DATETIME_PATTERNS
        .iter()
        .map(|p| Regex::new(&p.replace(':', r"\s*:\s*")).unwrap())
        .collect()
});

fn is_stop_char(c: char) -> bool {
    let s = c.to_string();
    CHINESE_SENTENCE_STOP_SIGN.contains(&s.as_str())
        || ENGLISH_SENTENCE_STOP_SIGN.contains(&s.as_str())
}

fn ends_with_stop(text: &str) -> bool {
    let Some(last) = text.chars().last() else {
        return false;
    };
    last == '.' || is_stop_char(last)
}

fn starts_with_closer(text: &str) -> bool {
    SENTENCE_STOP_EXT
        .iter()
        .chain(CHINESE_SENTENCE_STOP_SIGN.iter())
        .any(|glyph| text.starts_with(glyph))
}

fn is_abbreviation(text: &str) -> bool {
    let word = text.trim_end_matches('.').to_lowercase();
    text.ends_with('.') && ABBREVIATIONS.contains(&word.as_str())
}

/// Split text into word tokens at whitespace and directly after stop
/// punctuation, keeping byte offsets into the original text.
fn scan(text: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut word_start = 0usize;

    let mut push = |start: usize, end: usize, hard: bool, tokens: &mut Vec<Token>| {
        if start >= end {
            return;
        }
        let slice = &text[start..end];
        let lead = slice.len() - slice.trim_start().len();
        let trail = slice.len() - slice.trim_end().len();
        let (s, e) = (start + lead, end - trail);
        if s < e {
            tokens.push(Token {
                text: text[s..e].to_string(),
                end: e,
                sent_break: hard,
                hard,
            });
        }
    };

    for (i, c) in text.char_indices() {
        if c == '\n' {
            push(word_start, i, true, &mut tokens);
            word_start = i + 1;
        } else if c.is_whitespace() {
            push(word_start, i, false, &mut tokens);
            word_start = i + c.len_utf8();
        } else if is_stop_char(c) {
            let end = i + c.len_utf8();
            push(word_start, end, false, &mut tokens);
            word_start = end;
        }
    }
    push(word_start, text.len(), false, &mut tokens);
    tokens
}

fn annotate_stops(tokens: &mut [Token]) {
    for token in tokens.iter_mut() {
        if !token.hard && ends_with_stop(&token.text) {
            token.sent_break = true;
        }
    }

    for i in 0..tokens.len().saturating_sub(1) {
        let (a_text, b_text) = (tokens[i].text.clone(), tokens[i + 1].text.clone());
        if tokens[i].hard {
            continue;
        }
        // A url split at its scheme colon is one sentence.
        if (a_text.ends_with("https:") || a_text.ends_with("http:")) && b_text.starts_with("//") {
            tokens[i].sent_break = false;
            continue;
        }
        if a_text.ends_with('.') && b_text == "." {
            tokens[i].sent_break = false;
            continue;
        }
        if is_abbreviation(&a_text) {
            tokens[i].sent_break = false;
            continue;
        }
        // Pull the boundary forward past a closing quote/bracket glyph.
        if tokens[i].sent_break && starts_with_closer(&b_text) {
            tokens[i].sent_break = false;
            tokens[i + 1].sent_break = true;
        }
    }
}

/// Suppress boundaries inside the first recognized timestamp span.
fn annotate_time(tokens: &mut [Token]) {
    if tokens.is_empty() {
        return;
    }
    let mut joined = String::new();
    let mut intervals = Vec::with_capacity(tokens.len());
    for (i, token) in tokens.iter().enumerate() {
        let start = joined.len();
        joined.push_str(&token.text);
        joined.push(' ');
        intervals.push(Interval {
            start,
            end: joined.len() - 1,
            id: i,
        });
    }

    for regex in TOKEN_DATETIME_REGEXES.iter() {
        if let Some(m) = regex.find(&joined) {
            let Some(begin) = find_interval(m.start(), &intervals) else {
                continue;
            };
            let Some(end) = find_interval(m.end().saturating_sub(1), &intervals) else {
                continue;
            };
            for token in tokens[begin..end].iter_mut() {
                if !token.hard {
                    token.sent_break = false;
                }
            }
            break;
        }
    }
}

/// Suppress boundaries while a bracket pair is open.
fn annotate_brackets(tokens: &mut [Token]) {
    let mut stack: Vec<char> = Vec::new();
    for token in tokens.iter_mut() {
        for c in token.text.chars() {
            if BRACKET_PAIRS.iter().any(|(open, _)| *open == c) {
                stack.push(c);
            } else if let Some(&top) = stack.last() {
                let closes = BRACKET_PAIRS
                    .iter()
                    .find(|(open, _)| *open == top)
                    .is_some_and(|(_, closers)| closers.contains(&c));
                if closes {
                    stack.pop();
                }
            }
        }
        if !stack.is_empty() && !token.hard {
            token.sent_break = false;
        }
    }
}

/// Cut text into sentence spans. Spans are contiguous and cover the whole
/// input; callers drop spans whose text trims to nothing.
pub fn cut_sentences(text: &str) -> Vec<SentSpan> {
    if text.is_empty() {
        return Vec::new();
    }
    let mut tokens = scan(text);
    annotate_stops(&mut tokens);
    annotate_time(&mut tokens);
    annotate_brackets(&mut tokens);

    let mut spans = Vec::new();
    let mut cursor = 0usize;
    for token in &tokens {
        if token.sent_break && token.end > cursor {
            spans.push(SentSpan {
                start: cursor,
                end: token.end,
            });
            cursor = token.end;
        }
    }
    if cursor < text.len() {
        spans.push(SentSpan {
            start: cursor,
            end: text.len(),
        });
    }
    spans
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(input: &str) -> Vec<String> {
        cut_sentences(input)
            .into_iter()
            .map(|s| input[s.start..s.end].trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }

    #[test]
    fn test_basic_cjk_split() {
        let got = texts("第一句。第二句！第三句？");
        assert_eq!(got, vec!["第一句。", "第二句！", "第三句？"]);
    }

    #[test]
    fn test_date_and_url_kept_whole() {
        let got = texts("会议于2025年3月6日16:21举行。详情见http://a.com/x。");
        assert_eq!(
            got,
            vec!["会议于2025年3月6日16:21举行。", "详情见http://a.com/x。"]
        );
    }

    #[test]
    fn test_no_boundary_inside_brackets() {
        let got = texts("他说（没错。真的！）然后走了。");
        assert_eq!(got, vec!["他说（没错。真的！）然后走了。"]);
    }

    #[test]
    fn test_closing_quote_pulls_boundary_forward() {
        // The boundary after 。 moves past the closing 」 instead of
        // splitting before it.
        let got = texts("对。」之后。再见。");
        assert_eq!(got, vec!["对。」之后。", "再见。"]);
    }

    #[test]
    fn test_newline_forces_boundary() {
        let got = texts("第一行没有标点\n第二行");
        assert_eq!(got, vec!["第一行没有标点", "第二行"]);
    }

    #[test]
    fn test_english_sentences() {
        let got = texts("First sentence. Second one! Third?");
        assert_eq!(got, vec!["First sentence.", "Second one!", "Third?"]);
    }

    #[test]
    fn test_abbreviation_not_a_boundary() {
        let got = texts("Report no. 5 is ready. Done.");
        assert_eq!(got, vec!["Report no. 5 is ready.", "Done."]);
    }

    #[test]
    fn test_double_period_suppressed() {
        let got = texts("Wait for it. . then go。");
        assert_eq!(got.len(), 2);
    }

    #[test]
    fn test_empty_input() {
        assert!(cut_sentences("").is_empty());
    }

    #[test]
    fn test_spans_cover_input() {
        let input = "abc。def！ghi";
        let spans = cut_sentences(input);
        assert_eq!(spans.first().unwrap().start, 0);
        assert_eq!(spans.last().unwrap().end, input.len());
        for pair in spans.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
    }
}
