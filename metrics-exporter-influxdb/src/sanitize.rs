use std::borrow::Cow;

/// Punctuation that can appear in an unquoted line protocol token.
///
/// Separators (`,`, `=`, and whitespace) and the quoting characters (`"` and `\`) are deliberately absent.
/// `#` is allowed, but marks a comment at the start of a line, so the encoder never lets a line begin with it.
const ALLOWED_PUNCTUATION: &[char] = &[
    '!', '#', '$', '%', '&', '*', '+', '-', ':', ';', '<', '>', '?', '@', '[', ']', '^', '_', '`', '|', '~',
];

const REPLACEMENT: char = '_';

/// Rewrites strings so they can be written as line protocol tokens.
///
/// Alphanumeric characters and a small set of punctuation pass through unchanged, and everything else is replaced with
/// an underscore. Since the underscore is allowed, sanitizing twice yields the same output as sanitizing once.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Sanitizer {
    allow_dot: bool,
}

impl Sanitizer {
    /// Sanitizer for metric names, which keeps dots so that dotted metric paths survive.
    pub const NAME: Sanitizer = Sanitizer { allow_dot: true };

    /// Sanitizer for dimension keys and values, which replaces dots.
    pub const DIMENSION: Sanitizer = Sanitizer { allow_dot: false };

    fn is_allowed(self, c: char) -> bool {
        c.is_alphanumeric() || ALLOWED_PUNCTUATION.contains(&c) || (self.allow_dot && c == '.')
    }

    /// Sanitizes `input`.
    ///
    /// Borrows the input when every character is already allowed.
    pub fn sanitize<'a>(self, input: &'a str) -> Cow<'a, str> {
        match input.find(|c| !self.is_allowed(c)) {
            None => Cow::Borrowed(input),
            Some(first_invalid) => {
                let mut sanitized = String::with_capacity(input.len());
                sanitized.push_str(&input[..first_invalid]);
                sanitized.extend(
                    input[first_invalid..]
                        .chars()
                        .map(|c| if self.is_allowed(c) { c } else { REPLACEMENT }),
                );
                Cow::Owned(sanitized)
            }
        }
    }
}

/// Sanitizes a dimension key or value.
pub fn sanitize(input: &str) -> Cow<'_, str> {
    Sanitizer::DIMENSION.sanitize(input)
}

/// Sanitizes a metric name.
pub fn sanitize_name(input: &str) -> Cow<'_, str> {
    Sanitizer::NAME.sanitize(input)
}
