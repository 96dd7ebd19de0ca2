use std::sync::LazyLock;

use regex::Regex;

const GREETING_WORDS: &[&str] = &[
    "hello", "hi", "hey", "good morning", "good afternoon", "good evening",
    "morning", "afternoon", "evening", "greetings", "salutations",
    "howdy", "yo", "sup", "what's up", "wassup", "hiya", "hello there",
    "good day", "good night", "night", "bye", "goodbye", "see you",
    "take care", "farewell", "ciao", "adios", "au revoir",
];

static ADDRESSED_GREETING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:hi|hello|hey)\s+(?:ballu|there)\b").expect("static regex")
});

/// True when the whole message is a greeting, or it opens with one followed by a space.
///
/// "hi ballu", "good morning everyone" and "Hello!" are greetings; "hey, what's the
/// weather" and "I said hi to my friend" are not.
pub fn is_greeting(text: &str) -> bool {
    let lowered = text.trim().to_lowercase();
    // Trailing punctuation is dropped for the exact-match check only.
    let bare = lowered.trim_end_matches(['!', '.', '?', ',']).trim_end();

    if bare.is_empty() {
        return false;
    }

    for word in GREETING_WORDS {
        if bare == *word {
            return true;
        }
        if lowered
            .strip_prefix(word)
            .is_some_and(|rest| rest.starts_with(' '))
        {
            return true;
        }
    }

    ADDRESSED_GREETING.is_match(&lowered)
}
