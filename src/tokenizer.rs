/// Lower-cases `text` and splits it into runs of word characters.
///
/// A word character is any alphanumeric code point or `_`, so Cyrillic and
/// Latin text tokenize the same way.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !is_word_char(c))
        .filter(|word| !word.is_empty())
        .map(str::to_string)
        .collect()
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}
