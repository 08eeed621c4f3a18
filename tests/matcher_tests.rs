//! Command/Response Matcher Tests
//!
//! Prefix matching, argument extraction, and defensive parsing.

use hl78xx_modem::at::args::{find, int_or, parse_int, unquote, AtArgs};
use hl78xx_modem::at::matcher::{dispatch, find_match, Match};

/// Test context recording handler invocations.
#[derive(Default)]
struct Ctx {
    hits: Vec<String>,
    last_int: Option<i32>,
}

fn record(ctx: &mut Ctx, args: &AtArgs<'_>) {
    let full = String::from_utf8_lossy(args.arg(0).unwrap()).into_owned();
    ctx.hits.push(full);
    ctx.last_int = args.int(1);
}

fn needs_three_args(ctx: &mut Ctx, args: &AtArgs<'_>) {
    // A handler requiring more arguments than provided must no-op.
    let (Some(a), Some(b), Some(c)) = (args.int(1), args.int(2), args.int(3)) else {
        return;
    };
    ctx.last_int = Some(a + b + c);
    ctx.hits.push("three".into());
}

// ============================================================================
// Prefix Matching
// ============================================================================

#[test]
fn test_prefix_match() {
    let matches: &[Match<Ctx>] = &[Match::bound(b"+CSQ:", record)];
    let mut ctx = Ctx::default();
    assert!(dispatch(&mut ctx, matches, b"+CSQ: 17,99"));
    assert_eq!(ctx.hits.len(), 1);
    assert_eq!(ctx.last_int, Some(17));
}

#[test]
fn test_no_match_is_not_claimed() {
    let matches: &[Match<Ctx>] = &[Match::bound(b"+CSQ:", record)];
    let mut ctx = Ctx::default();
    assert!(!dispatch(&mut ctx, matches, b"+CESQ: 1,2"));
    assert!(ctx.hits.is_empty());
}

#[test]
fn test_first_matching_prefix_wins() {
    let matches: &[Match<Ctx>] = &[
        Match::bound(b"+CME ERROR:", record),
        Match::bound(b"+CME", needs_three_args),
    ];
    let found = find_match(matches, b"+CME ERROR: 5").unwrap();
    assert_eq!(found.prefix, b"+CME ERROR:");
}

#[test]
fn test_empty_prefix_matches_any_line() {
    let matches: &[Match<Ctx>] = &[Match::any(record)];
    let mut ctx = Ctx::default();
    assert!(dispatch(&mut ctx, matches, b"351234567890123"));
    assert_eq!(ctx.hits[0], "351234567890123");
}

#[test]
fn test_empty_prefix_keeps_line_unsplit() {
    let matches: &[Match<Ctx>] = &[Match::any(record)];
    let entry = find_match(matches, b"Sierra Wireless, Inc.").unwrap();
    let args = entry.parse(b"Sierra Wireless, Inc.");
    assert_eq!(args.arg(1).unwrap(), b"Sierra Wireless, Inc.");
}

#[test]
fn test_match_without_handler_still_claims() {
    let matches: &[Match<Ctx>] = &[Match::response(b"OK")];
    let mut ctx = Ctx::default();
    assert!(dispatch(&mut ctx, matches, b"OK"));
    assert!(ctx.hits.is_empty());
}

// ============================================================================
// Argument Extraction
// ============================================================================

#[test]
fn test_argument_zero_is_full_text() {
    let args = AtArgs::parse(b"+CEREG: 1,4", b"+CEREG:".len(), b",");
    assert_eq!(args.arg(0).unwrap(), b"+CEREG: 1,4");
}

#[test]
fn test_arguments_split_and_trimmed() {
    let args = AtArgs::parse(b"+CEREG: 2, 1", b"+CEREG:".len(), b",");
    assert_eq!(args.count(), 3);
    assert_eq!(args.arg(1).unwrap(), b"2");
    assert_eq!(args.arg(2).unwrap(), b"1");
}

#[test]
fn test_quoted_argument() {
    let args = AtArgs::parse(b"+COPS: 0,0,\"Operator\",7", b"+COPS:".len(), b",");
    assert_eq!(args.quoted(3).unwrap(), b"Operator");
    assert_eq!(args.as_str(3).unwrap(), "Operator");
}

#[test]
fn test_missing_argument_is_none() {
    let args = AtArgs::parse(b"+CSQ: 17", b"+CSQ:".len(), b",");
    assert!(args.arg(5).is_none());
    assert!(args.int(5).is_none());
}

#[test]
fn test_prefix_only_line_has_no_fields() {
    let args = AtArgs::parse(b"OK", b"OK".len(), b",");
    assert_eq!(args.count(), 1);
    assert!(args.arg(1).is_none());
}

#[test]
fn test_handler_short_on_arguments_noops() {
    let matches: &[Match<Ctx>] = &[Match::bound(b"+X:", needs_three_args)];
    let mut ctx = Ctx::default();
    assert!(dispatch(&mut ctx, matches, b"+X: 1,2"));
    assert!(ctx.hits.is_empty());
    assert!(ctx.last_int.is_none());

    assert!(dispatch(&mut ctx, matches, b"+X: 1,2,3"));
    assert_eq!(ctx.last_int, Some(6));
}

// ============================================================================
// Integer Parsing
// ============================================================================

#[test]
fn test_parse_int_basic() {
    assert_eq!(parse_int(b"42"), Some(42));
    assert_eq!(parse_int(b"-7"), Some(-7));
    assert_eq!(parse_int(b"+9"), Some(9));
    assert_eq!(parse_int(b"0"), Some(0));
}

#[test]
fn test_parse_int_empty_fails() {
    assert_eq!(parse_int(b""), None);
}

#[test]
fn test_parse_int_partial_consumption_fails() {
    // Any non-fully-consumed string is a conversion failure.
    assert_eq!(parse_int(b"12x"), None);
    assert_eq!(parse_int(b"x12"), None);
    assert_eq!(parse_int(b"1 2"), None);
    assert_eq!(parse_int(b"-"), None);
}

#[test]
fn test_parse_int_overflow_fails() {
    assert_eq!(parse_int(b"99999999999999"), None);
}

#[test]
fn test_int_or_fallback() {
    assert_eq!(int_or(b"", -1), -1);
    assert_eq!(int_or(b"abc", -1), -1);
    assert_eq!(int_or(b"5", -1), 5);
}

// ============================================================================
// Helpers
// ============================================================================

#[test]
fn test_unquote() {
    assert_eq!(unquote(b"\"abc\""), b"abc");
    assert_eq!(unquote(b"abc"), b"abc");
    assert_eq!(unquote(b"\""), b"\"");
    assert_eq!(unquote(b"\"\""), b"");
}

#[test]
fn test_find_subslice() {
    assert_eq!(find(b"abcdef", b"cd"), Some(2));
    assert_eq!(find(b"abcdef", b"xy"), None);
    assert_eq!(find(b"ab", b"abc"), None);
    assert_eq!(find(b"abc", b""), None);
}
