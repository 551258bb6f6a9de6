//! Line classification for raw sensor logs. Runs before any JSON parsing so
//! banner noise and firmware chatter never show up in the validation
//! statistics.

/// Prefix the sensor uses for its periodic status lines.
pub const STATS_PREFIX: &str = "# STATS: ";

/// Banner and warning prefixes the sensor prints around its JSON output.
const COMMENT_PREFIXES: &[&str] = &["#", "===", "Warning!"];

/// The firmware logs its boot sequence in Portuguese; every setup line
/// carries this word.
const SYSTEM_LOG_PHRASES: &[&str] = &["configurado"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineClass<'a> {
    Blank,
    Comment,
    /// Status line; the JSON payload after the stats prefix.
    Stats(&'a str),
    /// Anything else is a candidate probe record.
    Record(&'a str),
}

pub fn classify(line: &str) -> LineClass<'_> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return LineClass::Blank;
    }
    // Stats lines start with '#' too, so they must be peeled off first
    if let Some(payload) = trimmed.strip_prefix(STATS_PREFIX) {
        return LineClass::Stats(payload);
    }
    if COMMENT_PREFIXES
        .iter()
        .any(|prefix| trimmed.starts_with(prefix))
    {
        return LineClass::Comment;
    }
    let lower = trimmed.to_lowercase();
    if SYSTEM_LOG_PHRASES.iter().any(|phrase| lower.contains(phrase)) {
        return LineClass::Comment;
    }
    LineClass::Record(trimmed)
}
