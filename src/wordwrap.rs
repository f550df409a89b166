/*
 *  wordwrap.rs
 *
 *  LumaDeck - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Multi-line wrapping with word-break policies and ellipsis truncation
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *  Public License.
 *
 */

use serde::{Deserialize, Serialize};

use crate::constants::ELLIPSIS;

/// Where a line may break.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WordBreak {
    /// Break on whitespace; a word wider than the line breaks per character.
    #[default]
    Normal,
    /// Break at any character once the width is exceeded.
    BreakAll,
}

/// Wrap `text` to `max_width` pixels using `measure` for line widths.
/// Newlines always end a line.
pub fn wrap_text<F>(text: &str, max_width: u32, policy: WordBreak, measure: F) -> Vec<String>
where
    F: Fn(&str) -> u32,
{
    let mut lines = Vec::new();
    for paragraph in text.split('\n') {
        match policy {
            WordBreak::Normal => wrap_words(paragraph, max_width, &measure, &mut lines),
            WordBreak::BreakAll => wrap_chars(paragraph, max_width, &measure, &mut lines),
        }
    }
    lines
}

fn wrap_words<F>(paragraph: &str, max_width: u32, measure: &F, out: &mut Vec<String>)
where
    F: Fn(&str) -> u32,
{
    let mut line = String::new();
    let mut any = false;
    for word in paragraph.split_whitespace() {
        any = true;
        let candidate = if line.is_empty() {
            word.to_string()
        } else {
            format!("{line} {word}")
        };
        if measure(&candidate) <= max_width {
            line = candidate;
            continue;
        }
        if !line.is_empty() {
            out.push(std::mem::take(&mut line));
        }
        if measure(word) <= max_width {
            line = word.to_string();
        } else {
            // oversized word, split per character
            let mut pieces = Vec::new();
            wrap_chars(word, max_width, measure, &mut pieces);
            if let Some(tail) = pieces.pop() {
                out.extend(pieces);
                line = tail;
            }
        }
    }
    if !line.is_empty() || !any {
        out.push(line);
    }
}

fn wrap_chars<F>(paragraph: &str, max_width: u32, measure: &F, out: &mut Vec<String>)
where
    F: Fn(&str) -> u32,
{
    let mut line = String::new();
    for ch in paragraph.chars() {
        line.push(ch);
        if measure(&line) > max_width && line.chars().count() > 1 {
            line.pop();
            out.push(std::mem::take(&mut line));
            line.push(ch);
        }
    }
    out.push(line);
}

/// Keep at most `max_lines`; if anything was cut, the last kept line loses
/// characters until it plus an ellipsis fits `max_width`. A container too
/// narrow for the ellipsis itself gets an empty last line.
pub fn truncate_with_ellipsis<F>(mut lines: Vec<String>, max_lines: usize, max_width: u32, measure: F) -> Vec<String>
where
    F: Fn(&str) -> u32,
{
    if lines.len() <= max_lines {
        return lines;
    }
    lines.truncate(max_lines);
    if let Some(last) = lines.last_mut() {
        loop {
            let candidate = format!("{last}{ELLIPSIS}");
            if measure(&candidate) <= max_width {
                *last = candidate;
                break;
            }
            if last.pop().is_none() {
                break;
            }
        }
    }
    lines
}

/// Hard-wrap by character count, used for short status messages.
pub fn wrap_chars_count(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() {
        return vec![String::new()];
    }
    chars.chunks(width).map(|c| c.iter().collect()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mono(s: &str) -> u32 {
        s.chars().count() as u32 * 6
    }

    #[test]
    fn test_normal_wraps_on_spaces() {
        let lines = wrap_text("the quick brown fox jumps", 60, WordBreak::Normal, mono);
        assert_eq!(lines, vec!["the quick", "brown fox", "jumps"]);
        assert!(lines.iter().all(|l| mono(l) <= 60));
    }

    #[test]
    fn test_normal_breaks_long_word() {
        let lines = wrap_text("a abcdefghijkl b", 30, WordBreak::Normal, mono);
        assert_eq!(lines, vec!["a", "abcde", "fghij", "kl b"]);
    }

    #[test]
    fn test_newline_forces_break() {
        let lines = wrap_text("one\ntwo three", 600, WordBreak::Normal, mono);
        assert_eq!(lines, vec!["one", "two three"]);
        let lines = wrap_text("ab\ncd", 600, WordBreak::BreakAll, mono);
        assert_eq!(lines, vec!["ab", "cd"]);
    }

    #[test]
    fn test_empty_paragraph_kept() {
        let lines = wrap_text("a\n\nb", 60, WordBreak::Normal, mono);
        assert_eq!(lines, vec!["a", "", "b"]);
    }

    #[test]
    fn test_break_all() {
        let lines = wrap_text("hello world", 24, WordBreak::BreakAll, mono);
        assert_eq!(lines, vec!["hell", "o wo", "rld"]);
        assert_eq!(lines.concat(), "hello world");
    }

    #[test]
    fn test_ellipsis_truncation() {
        let lines = vec!["first line".to_string(), "second line".to_string(), "third".to_string()];
        let out = truncate_with_ellipsis(lines, 2, 66, mono);
        assert_eq!(out.len(), 2);
        assert!(out[1].ends_with(ELLIPSIS));
        assert!(mono(&out[1]) <= 66);
        assert_eq!(out[1], "second lin\u{2026}");
    }

    #[test]
    fn test_ellipsis_wider_than_container() {
        let lines = vec!["ab".to_string(), "cd".to_string()];
        let out = truncate_with_ellipsis(lines, 1, 4, mono);
        assert_eq!(out, vec![String::new()]);
    }

    #[test]
    fn test_no_truncation_when_fits() {
        let lines = vec!["a".to_string()];
        assert_eq!(truncate_with_ellipsis(lines.clone(), 3, 10, mono), lines);
    }

    #[test]
    fn test_char_count_wrap() {
        assert_eq!(wrap_chars_count("abcdef", 4), vec!["abcd", "ef"]);
        assert_eq!(wrap_chars_count("", 4), vec![""]);
    }
}
