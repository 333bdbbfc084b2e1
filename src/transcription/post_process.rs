//! Transcript cleanup.
//!
//! Remote speech models hallucinate on near-silent or noisy input, most
//! often closing phrases learned from subtitled video. Short dictations also
//! pick up filler words worth stripping. The cleanup rules here decide what
//! part of a raw transcript survives; an empty result means "nothing was
//! actually said" and the caller skips pasting entirely.

use tracing::{debug, info};

/// Whole-utterance similarity at or above this drops the transcript as a
/// hallucination even when it is not an exact phrase match.
const HALLUCINATION_SIMILARITY: f64 = 0.92;

/// Phrases the model produces out of thin air on silence or noise.
const HALLUCINATED_PHRASES: &[&str] = &[
    "ご視聴ありがとうございました",
    "チャンネル登録お願いします",
    "高評価お願いします",
    "おかげさまで",
    "字幕作成",
    "視聴してくれてありがとう",
    "Thank you for watching",
    "視聴ありがとうございました",
    "最後までご視聴",
    "おやすみなさい",
];

/// Filler words removed from otherwise valid transcripts.
const FILLERS: &[&str] = &["えー", "あー", "うーん", "えっと"];

/// Punctuation and whitespace ignored when judging whether any content
/// remains.
const PUNCTUATION: &[char] = &[
    '。', '.', ',', '、', ' ', '?', '？', '!', '！', '\n', '\t',
];

fn strip_punctuation(text: &str) -> String {
    text.chars().filter(|c| !PUNCTUATION.contains(c)).collect()
}

/// True when the utterance is exactly the phrase, allowing one trailing
/// punctuation mark.
fn is_phrase_only(text: &str, phrase: &str) -> bool {
    let Some(rest) = text.strip_prefix(phrase) else {
        return false;
    };
    rest.is_empty() || (rest.chars().count() == 1 && rest.chars().all(|c| PUNCTUATION.contains(&c)))
}

/// Cleans a raw transcript; returns an empty string when nothing real remains.
#[must_use]
pub fn clean_transcript(text: &str) -> String {
    let trimmed = text.trim();

    // Punctuation-only or single-character utterances carry no content.
    if strip_punctuation(trimmed).chars().count() <= 1 {
        debug!("transcript discarded: no content");
        return String::new();
    }

    let mut cleaned = trimmed.to_owned();
    for phrase in HALLUCINATED_PHRASES {
        if is_phrase_only(trimmed, phrase)
            || strsim::jaro_winkler(trimmed, phrase) >= HALLUCINATION_SIMILARITY
        {
            info!(phrase = %phrase, "transcript discarded as hallucination");
            return String::new();
        }
        if cleaned.contains(phrase) {
            cleaned = cleaned.replace(phrase, "");
        }
    }

    for filler in FILLERS {
        if cleaned.contains(filler) {
            cleaned = cleaned.replace(filler, "");
        }
    }

    let cleaned = cleaned.trim();
    if strip_punctuation(cleaned).is_empty() {
        debug!("transcript discarded: only punctuation left after cleanup");
        return String::new();
    }

    cleaned.to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normal_text_passes_through() {
        assert_eq!(clean_transcript("今日の会議は10時からです"), "今日の会議は10時からです");
        assert_eq!(clean_transcript("hello there, this is a test"), "hello there, this is a test");
    }

    #[test]
    fn trims_whitespace() {
        assert_eq!(clean_transcript("  メモを取ってください  "), "メモを取ってください");
    }

    #[test]
    fn punctuation_only_is_discarded() {
        assert_eq!(clean_transcript("。"), "");
        assert_eq!(clean_transcript("... !?"), "");
        assert_eq!(clean_transcript(""), "");
    }

    #[test]
    fn single_character_is_discarded() {
        assert_eq!(clean_transcript("あ。"), "");
        assert_eq!(clean_transcript("a"), "");
    }

    #[test]
    fn exact_hallucination_is_discarded() {
        assert_eq!(clean_transcript("ご視聴ありがとうございました"), "");
        assert_eq!(clean_transcript("Thank you for watching"), "");
    }

    #[test]
    fn hallucination_with_trailing_punctuation_is_discarded() {
        assert_eq!(clean_transcript("ご視聴ありがとうございました。"), "");
        assert_eq!(clean_transcript("おやすみなさい！"), "");
    }

    #[test]
    fn near_match_hallucination_is_discarded() {
        // One character off from the known phrase.
        assert_eq!(clean_transcript("ご視聴ありがとうございましたあ"), "");
    }

    #[test]
    fn embedded_hallucination_is_removed() {
        let cleaned = clean_transcript("明日は晴れです。ご視聴ありがとうございました");
        assert_eq!(cleaned, "明日は晴れです。");
    }

    #[test]
    fn fillers_are_removed() {
        assert_eq!(clean_transcript("えーと会議はえー明日です"), "と会議は明日です");
        assert_eq!(clean_transcript("うーん、そうですね"), "、そうですね");
    }

    #[test]
    fn cleanup_leaving_only_punctuation_is_discarded() {
        assert_eq!(clean_transcript("えー、あー。"), "");
    }

    #[test]
    fn unrelated_text_is_not_a_near_match() {
        let text = "今日は天気がいいので散歩に行きます";
        assert_eq!(clean_transcript(text), text);
    }
}
