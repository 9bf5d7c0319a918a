//! Nickname comparison
//!
//! IRC nicknames are case-insensitive under RFC 1459 folding, where `[]\~`
//! are the upper case of `{}|^`.

pub fn irc_lower(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            '[' => '{',
            ']' => '}',
            '\\' => '|',
            '~' => '^',
            other => other.to_ascii_lowercase(),
        })
        .collect()
}

pub fn irc_eq(a: &str, b: &str) -> bool {
    irc_lower(a) == irc_lower(b)
}
