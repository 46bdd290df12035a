/// Self-harm / suicide phrases (en, es, de, fr, it), lowercase
const CRISIS_KEYWORDS: &[&str] = &[
    // English
    "suicide", "kill myself", "end my life", "want to die", "hurt myself",
    "self harm", "cut myself", "overdose", "jump off", "hang myself",
    // Spanish
    "suicidio", "matarme", "morir", "hacerme daño",
    // German
    "selbstmord", "umbringen", "sterben", "verletzen",
    // French
    "me tuer", "mourir", "me faire mal",
    // Italian
    "uccidermi", "morire", "farmi male",
];

/// Coarse crisis check: case-insensitive substring match against the phrase list.
///
/// Detection only. Callers decide what to do with the flag.
pub fn is_crisis_message(text: &str) -> bool {
    let lowered = text.to_lowercase();
    CRISIS_KEYWORDS.iter().any(|keyword| lowered.contains(keyword))
}
