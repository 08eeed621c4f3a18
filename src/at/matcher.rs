//! Command/response matcher
//!
//! A [`Match`] pairs a byte prefix with an argument delimiter and an optional
//! bound handler. Sets of matches are scanned in order; the first matching
//! prefix wins, so more specific prefixes must be ordered first.

use super::args::AtArgs;

/// Handler invoked with the owning context and the parsed argument list.
pub type Handler<C> = fn(&mut C, &AtArgs<'_>);

/// One prefix-match entry.
pub struct Match<C: 'static> {
    /// Byte prefix the line must start with. An empty prefix matches any
    /// line and is used for fields whose value occupies the entire line.
    pub prefix: &'static [u8],
    /// Delimiter separating arguments in the remainder of the line.
    pub delimiter: &'static [u8],
    /// Handler invoked on match, if any.
    pub handler: Option<Handler<C>>,
}

impl<C> Match<C> {
    /// Create a match entry.
    #[must_use]
    pub const fn new(
        prefix: &'static [u8],
        delimiter: &'static [u8],
        handler: Option<Handler<C>>,
    ) -> Self {
        Self {
            prefix,
            delimiter,
            handler,
        }
    }

    /// A comma-delimited match with no handler (the line only advances a
    /// script step).
    #[must_use]
    pub const fn response(prefix: &'static [u8]) -> Self {
        Self::new(prefix, b",", None)
    }

    /// A comma-delimited match with a bound handler.
    #[must_use]
    pub const fn bound(prefix: &'static [u8], handler: Handler<C>) -> Self {
        Self::new(prefix, b",", Some(handler))
    }

    /// A match that claims any line, handing the full text to `handler`
    /// unsplit (argument 1 is the whole line).
    #[must_use]
    pub const fn any(handler: Handler<C>) -> Self {
        Self::new(b"", b"", Some(handler))
    }

    /// Check whether `line` starts with this entry's prefix.
    #[must_use]
    pub fn matches(&self, line: &[u8]) -> bool {
        line.starts_with(self.prefix)
    }

    /// Split the arguments out of a line known to match.
    #[must_use]
    pub fn parse<'a>(&self, line: &'a [u8]) -> AtArgs<'a> {
        AtArgs::parse(line, self.prefix.len(), self.delimiter)
    }
}

impl<C> Clone for Match<C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C> Copy for Match<C> {}

impl<C> core::fmt::Debug for Match<C> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Match")
            .field("prefix", &self.prefix)
            .field("handler", &self.handler.is_some())
            .finish()
    }
}

/// Find the first entry whose prefix matches `line`.
#[must_use]
pub fn find_match<'m, C>(matches: &'m [Match<C>], line: &[u8]) -> Option<&'m Match<C>> {
    matches.iter().find(|m| m.matches(line))
}

/// Match `line` against `matches` and invoke the bound handler.
///
/// Returns `true` when the line was claimed by an entry. An unmatched line
/// is simply not claimed; discarding it is the caller's policy.
pub fn dispatch<C>(ctx: &mut C, matches: &[Match<C>], line: &[u8]) -> bool {
    match find_match(matches, line) {
        Some(entry) => {
            if let Some(handler) = entry.handler {
                let args = entry.parse(line);
                handler(ctx, &args);
            }
            true
        }
        None => false,
    }
}
