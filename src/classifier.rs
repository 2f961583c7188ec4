//! Message classification: spotting downloadable media links and words the
//! group rules do not tolerate.

use once_cell::sync::Lazy;
use regex::Regex;

static YOUTUBE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"https?://(?:www\.|m\.)?(?:youtube\.com/watch\?\S*v=[\w-]+\S*|youtube\.com/shorts/[\w-]+\S*|youtu\.be/[\w-]+\S*)")
        .unwrap()
});

static INSTAGRAM_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"https?://(?:www\.)?instagram\.com/(?:p|reels|reel)/[\w-]+\S*").unwrap()
});

/// What the moderation pass decided about an incoming message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Contains a word from the banned list. Carries the offending word.
    Banned(String),
    /// Contains a link the download pipeline knows how to handle.
    MediaLink(String),
    /// Nothing of interest.
    Clean,
}

pub struct Classifier {
    banned: Option<Regex>,
}

impl Classifier {
    pub fn new(banned_words: &[String]) -> Self {
        Self {
            banned: banned_word_regex(banned_words),
        }
    }

    /// Scan a message. Banned vocabulary outranks media links: a message
    /// that breaks the rules gets removed, link and all.
    pub fn scan(&self, text: &str) -> Verdict {
        if let Some(re) = &self.banned {
            if let Some(m) = re.find(text) {
                return Verdict::Banned(m.as_str().to_string());
            }
        }
        if let Some(url) = find_media_link(text) {
            return Verdict::MediaLink(url);
        }
        Verdict::Clean
    }
}

/// First supported media URL in the text, if any.
pub fn find_media_link(text: &str) -> Option<String> {
    let youtube = YOUTUBE_RE.find(text);
    let instagram = INSTAGRAM_RE.find(text);
    match (youtube, instagram) {
        (Some(y), Some(i)) => {
            let first = if y.start() <= i.start() { y } else { i };
            Some(first.as_str().to_string())
        }
        (Some(m), None) | (None, Some(m)) => Some(m.as_str().to_string()),
        (None, None) => None,
    }
}

/// Case-insensitive whole-word matcher over the configured list. Words are
/// escaped, so entries like "c.a.b.r.a" match literally.
fn banned_word_regex(words: &[String]) -> Option<Regex> {
    let words: Vec<String> = words
        .iter()
        .map(|w| w.trim())
        .filter(|w| !w.is_empty())
        .map(regex::escape)
        .collect();
    if words.is_empty() {
        return None;
    }
    let pattern = format!(r"(?i)\b(?:{})\b", words.join("|"));
    // The pattern is built from escaped literals; it always parses.
    Regex::new(&pattern).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(list: &[&str]) -> Vec<String> {
        list.iter().map(|w| w.to_string()).collect()
    }

    // --- media links ---

    #[test]
    fn detects_youtube_watch_urls() {
        let url = find_media_link("mirad esto https://www.youtube.com/watch?v=dQw4w9WgXcQ jaja");
        assert_eq!(
            url.as_deref(),
            Some("https://www.youtube.com/watch?v=dQw4w9WgXcQ")
        );
    }

    #[test]
    fn detects_short_youtube_urls() {
        assert_eq!(
            find_media_link("https://youtu.be/dQw4w9WgXcQ").as_deref(),
            Some("https://youtu.be/dQw4w9WgXcQ")
        );
        assert_eq!(
            find_media_link("https://youtube.com/shorts/abc123XYZ_-").as_deref(),
            Some("https://youtube.com/shorts/abc123XYZ_-")
        );
    }

    #[test]
    fn detects_instagram_posts_and_reels() {
        for url in [
            "https://www.instagram.com/p/Cxyz123/",
            "https://instagram.com/reel/Cabc987",
            "https://www.instagram.com/reels/Cdef555/",
        ] {
            assert_eq!(find_media_link(url).as_deref(), Some(url), "{url}");
        }
    }

    #[test]
    fn ignores_other_urls_and_plain_text() {
        assert_eq!(find_media_link("https://example.com/watch?v=abc"), None);
        assert_eq!(find_media_link("instagram.com/p/abc sin esquema"), None);
        assert_eq!(find_media_link("hola manolo"), None);
    }

    #[test]
    fn picks_the_earliest_link() {
        let text = "https://instagram.com/p/AAA y https://youtu.be/BBB";
        assert_eq!(
            find_media_link(text).as_deref(),
            Some("https://instagram.com/p/AAA")
        );
    }

    // --- banned words ---

    #[test]
    fn banned_words_match_whole_words_case_insensitive() {
        let classifier = Classifier::new(&words(&["tonto", "pesado"]));
        assert_eq!(
            classifier.scan("eres un TONTO"),
            Verdict::Banned("TONTO".to_string())
        );
        assert_eq!(classifier.scan("qué pesado eres"), Verdict::Banned("pesado".to_string()));
    }

    #[test]
    fn banned_words_do_not_match_inside_longer_words() {
        let classifier = Classifier::new(&words(&["ton"]));
        assert_eq!(classifier.scan("tontería total"), Verdict::Clean);
    }

    #[test]
    fn banned_word_beats_media_link() {
        let classifier = Classifier::new(&words(&["tonto"]));
        let verdict = classifier.scan("tonto mira https://youtu.be/abc");
        assert_eq!(verdict, Verdict::Banned("tonto".to_string()));
    }

    #[test]
    fn empty_list_disables_word_scan() {
        let classifier = Classifier::new(&[]);
        assert_eq!(classifier.scan("lo que sea"), Verdict::Clean);
        let classifier = Classifier::new(&words(&["  ", ""]));
        assert_eq!(classifier.scan("lo que sea"), Verdict::Clean);
    }

    #[test]
    fn clean_message_with_link_is_a_media_link() {
        let classifier = Classifier::new(&words(&["tonto"]));
        assert_eq!(
            classifier.scan("https://youtu.be/abc"),
            Verdict::MediaLink("https://youtu.be/abc".to_string())
        );
    }
}
