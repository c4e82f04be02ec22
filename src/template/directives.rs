// ABOUTME: Built-in pipeline directives such as upper, round, date, truncate and replace
// ABOUTME: Exposes a static name-to-function table consulted by the pipeline dispatcher

use chrono::{TimeDelta, Utc};
use regex::{Regex, RegexBuilder};

use super::format::{Formatter, MAX_DECIMALS};
use super::path;
use super::scope::Scope;
use super::value::{parse_numeric, Value};

/// What a built-in may look at besides the running value
pub struct DirectiveContext<'a> {
    pub formatter: &'a dyn Formatter,
    pub scope: &'a Scope,
}

/// Built-ins receive the running value and up to three trimmed arguments
pub type BuiltinFn = fn(&DirectiveContext<'_>, Value, &[String]) -> Result<Value, String>;

pub const MAX_ARGUMENTS: usize = 3;

const SECONDS_PER_DAY: f64 = 86_400.0;

pub const BUILTINS: &[(&str, BuiltinFn)] = &[
    ("now", now),
    ("today", today),
    ("date", date),
    ("time", time),
    ("datetime", datetime),
    ("upper", upper),
    ("lower", lower),
    ("title", title),
    ("round", round),
    ("escape", escape),
    ("e", escape),
    ("nl2br", nl2br),
    ("truncate", truncate),
    ("trim", trim),
    ("concat", concat),
    ("replace", replace),
];

/// Look up a built-in by name, ignoring ASCII case
pub fn builtin(name: &str) -> Option<BuiltinFn> {
    BUILTINS
        .iter()
        .find(|(builtin, _)| builtin.eq_ignore_ascii_case(name))
        .map(|(_, function)| *function)
}

/// The text inside a `"..."` or `'...'` literal. The quote character may not
/// appear inside, so `'a', 'b'` is not one literal.
pub fn unquote(arg: &str) -> Option<&str> {
    let quote = arg.chars().next().filter(|c| *c == '"' || *c == '\'')?;
    if arg.len() < 2 || !arg.ends_with(quote) {
        return None;
    }
    let inner = &arg[1..arg.len() - 1];
    (!inner.contains(quote)).then_some(inner)
}

fn literal_or_raw(arg: &str) -> &str {
    unquote(arg).unwrap_or(arg)
}

fn arg(args: &[String], index: usize) -> Option<&str> {
    args.get(index)
        .map(|arg| arg.as_str())
        .filter(|arg| !arg.is_empty())
}

fn number_arg(args: &[String], index: usize, name: &str) -> Result<Option<f64>, String> {
    match arg(args, index) {
        None => Ok(None),
        Some(raw) => parse_numeric(literal_or_raw(raw))
            .map(Some)
            .ok_or_else(|| format!("{} must be numeric, got '{}'", name, raw)),
    }
}

fn count_arg(args: &[String], index: usize, name: &str, default: usize) -> Result<usize, String> {
    match number_arg(args, index, name)? {
        Some(n) if n >= 0.0 => Ok(n as usize),
        Some(n) => Err(format!("{} must not be negative, got {}", name, n)),
        None => Ok(default),
    }
}

/// Timestamp of a date-like value: a number or a parseable date string
/// containing at least one digit
fn timestamp_of(ctx: &DirectiveContext<'_>, value: &Value) -> Option<i64> {
    let text = value.to_text();
    if !text.bytes().any(|b| b.is_ascii_digit()) {
        return None;
    }
    match parse_numeric(&text) {
        Some(number) => Some(number as i64),
        None => ctx.formatter.parse_timestamp(&text),
    }
}

/// Apply a string transform, leaving null untouched
fn map_text(value: Value, transform: impl FnOnce(&str) -> String) -> Value {
    if value.is_null() {
        return value;
    }
    Value::String(transform(&value.to_text()))
}

/// Current timestamp moved by a number of seconds, if the result is a valid date
fn shifted_now(seconds: f64, name: &str) -> Result<i64, String> {
    let out_of_range = || format!("{} out of range", name);
    if !seconds.is_finite() || seconds.abs() >= i64::MAX as f64 {
        return Err(out_of_range());
    }
    let delta = TimeDelta::try_seconds(seconds.trunc() as i64).ok_or_else(out_of_range)?;
    Utc::now()
        .checked_add_signed(delta)
        .map(|moment| moment.timestamp())
        .ok_or_else(out_of_range)
}

fn now(_: &DirectiveContext<'_>, _: Value, args: &[String]) -> Result<Value, String> {
    let shift = number_arg(args, 0, "time shift")?.unwrap_or(0.0);
    Ok(Value::Number(shifted_now(shift, "time shift")? as f64))
}

fn today(ctx: &DirectiveContext<'_>, _: Value, args: &[String]) -> Result<Value, String> {
    let shift_days = number_arg(args, 0, "day shift")?.unwrap_or(0.0);
    let timestamp = shifted_now(shift_days * SECONDS_PER_DAY, "day shift")?;
    let tier = arg(args, 1).map(literal_or_raw).unwrap_or("medium");
    Ok(Value::String(ctx.formatter.format_date(timestamp, tier)))
}

fn date(ctx: &DirectiveContext<'_>, value: Value, args: &[String]) -> Result<Value, String> {
    let Some(timestamp) = timestamp_of(ctx, &value) else {
        return Ok(value);
    };
    let tier = arg(args, 0).map(literal_or_raw).unwrap_or("medium");
    Ok(Value::String(ctx.formatter.format_date(timestamp, tier)))
}

fn time(ctx: &DirectiveContext<'_>, value: Value, args: &[String]) -> Result<Value, String> {
    let Some(timestamp) = timestamp_of(ctx, &value) else {
        return Ok(value);
    };
    let tier = arg(args, 0).map(literal_or_raw).unwrap_or("short");
    Ok(Value::String(ctx.formatter.format_time(timestamp, tier)))
}

fn datetime(ctx: &DirectiveContext<'_>, value: Value, args: &[String]) -> Result<Value, String> {
    let Some(timestamp) = timestamp_of(ctx, &value) else {
        return Ok(value);
    };
    let date_tier = arg(args, 0).map(literal_or_raw).unwrap_or("medium");
    let time_tier = arg(args, 1).map(literal_or_raw).unwrap_or("short");
    let separator = arg(args, 2).map(literal_or_raw).unwrap_or(" ");
    Ok(Value::String(format!(
        "{}{}{}",
        ctx.formatter.format_date(timestamp, date_tier),
        separator,
        ctx.formatter.format_time(timestamp, time_tier)
    )))
}

fn upper(_: &DirectiveContext<'_>, value: Value, _: &[String]) -> Result<Value, String> {
    Ok(map_text(value, str::to_uppercase))
}

fn lower(_: &DirectiveContext<'_>, value: Value, _: &[String]) -> Result<Value, String> {
    Ok(map_text(value, str::to_lowercase))
}

fn title(_: &DirectiveContext<'_>, value: Value, _: &[String]) -> Result<Value, String> {
    Ok(map_text(value, |text| {
        let mut out = String::with_capacity(text.len());
        let mut word_start = true;
        for c in text.chars() {
            if c.is_alphanumeric() || c == '\'' {
                if word_start {
                    out.extend(c.to_uppercase());
                } else {
                    out.extend(c.to_lowercase());
                }
                word_start = false;
            } else {
                out.push(c);
                word_start = true;
            }
        }
        out
    }))
}

fn round(ctx: &DirectiveContext<'_>, value: Value, args: &[String]) -> Result<Value, String> {
    let decimals = count_arg(args, 0, "decimals", 2)?;
    if decimals > MAX_DECIMALS {
        return Err(format!("decimals must be at most {}, got {}", MAX_DECIMALS, decimals));
    }
    Ok(match value.as_number() {
        Some(number) => Value::String(ctx.formatter.format_decimal(number, decimals)),
        None => value,
    })
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            _ => out.push(c),
        }
    }
    out
}

fn escape(_: &DirectiveContext<'_>, value: Value, _: &[String]) -> Result<Value, String> {
    Ok(map_text(value, escape_html))
}

fn nl2br(_: &DirectiveContext<'_>, value: Value, _: &[String]) -> Result<Value, String> {
    Ok(map_text(value, |text| {
        let mut out = String::with_capacity(text.len());
        let mut chars = text.trim().chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                '\r' => {
                    out.push_str("<br />\r");
                    if chars.peek() == Some(&'\n') {
                        out.push('\n');
                        chars.next();
                    }
                }
                '\n' => out.push_str("<br />\n"),
                _ => out.push(c),
            }
        }
        out
    }))
}

fn truncate(_: &DirectiveContext<'_>, value: Value, args: &[String]) -> Result<Value, String> {
    let length = count_arg(args, 0, "length", 20)?;
    let suffix = arg(args, 1).map(literal_or_raw).unwrap_or("...").to_string();
    Ok(map_text(value, |text| {
        let text = text.trim();
        if text.chars().count() <= length {
            return text.to_string();
        }
        let head: String = text.chars().take(length).collect();
        format!("{}{}", head.trim_end(), suffix)
    }))
}

fn trim(_: &DirectiveContext<'_>, value: Value, args: &[String]) -> Result<Value, String> {
    let characters = arg(args, 0).map(literal_or_raw);
    Ok(map_text(value, |text| match characters {
        Some(set) => text.trim_matches(|c| set.contains(c)).to_string(),
        None => text.trim().to_string(),
    }))
}

/// Append a quoted literal or a resolved path/variable, joined with glue
fn concat(ctx: &DirectiveContext<'_>, value: Value, args: &[String]) -> Result<Value, String> {
    let Some(fragment) = arg(args, 0).and_then(|raw| fragment_text(ctx.scope, raw)) else {
        return Ok(value);
    };
    let glue = arg(args, 1).and_then(unquote).unwrap_or(" ");
    let current = value.to_text();
    Ok(Value::String(if current.is_empty() {
        fragment
    } else {
        format!("{}{}{}", current, glue, fragment)
    }))
}

fn fragment_text(scope: &Scope, raw: &str) -> Option<String> {
    if let Some(literal) = unquote(raw) {
        return Some(literal.to_string());
    }
    let resolved = if path::is_dotted_path(raw) {
        path::resolve(raw, scope)
    } else {
        scope.get(raw).cloned().unwrap_or_default()
    };
    (!resolved.is_null()).then(|| resolved.to_text())
}

fn replace(_: &DirectiveContext<'_>, value: Value, args: &[String]) -> Result<Value, String> {
    let search = arg(args, 0)
        .map(literal_or_raw)
        .filter(|search| !search.is_empty())
        .ok_or_else(|| "replace requires a search argument".to_string())?;
    let replacement = arg(args, 1).map(literal_or_raw).unwrap_or("");

    if value.is_null() {
        return Ok(value);
    }
    let text = value.to_text();
    let replaced = match regex_pattern(search) {
        Some(pattern) => pattern?.replace_all(&text, replacement).into_owned(),
        None => text.replace(search, replacement),
    };
    Ok(Value::String(replaced))
}

/// `/pattern/flags`, `@pattern@flags` or `#pattern#flags` select regex mode
fn regex_pattern(search: &str) -> Option<Result<Regex, String>> {
    let delimiter = search.chars().next().filter(|c| matches!(c, '/' | '@' | '#'))?;
    let closing = search.rfind(delimiter).filter(|index| *index > 0)?;
    let flags = &search[closing + 1..];
    if !flags.chars().all(|flag| "imsxuU".contains(flag)) {
        return None;
    }

    let mut builder = RegexBuilder::new(&search[1..closing]);
    for flag in flags.chars() {
        match flag {
            'i' => builder.case_insensitive(true),
            'm' => builder.multi_line(true),
            's' => builder.dot_matches_new_line(true),
            'x' => builder.ignore_whitespace(true),
            'U' => builder.swap_greed(true),
            _ => &mut builder,
        };
    }
    Some(builder.build().map_err(|e| format!("invalid pattern '{}': {}", search, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::format::DefaultFormatter;
    use serde_json::json;

    fn call(name: &str, value: impl Into<Value>, args: &[&str]) -> Result<Value, String> {
        let formatter = DefaultFormatter::new();
        let scope = Scope::from_json(json!({
            "customer": {"name": "John Doe", "email": "john@doe.com"},
            "greeting": "hello"
        }));
        let ctx = DirectiveContext {
            formatter: &formatter,
            scope: &scope,
        };
        let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
        let function = builtin(name).expect("builtin exists");
        function(&ctx, value.into(), &args)
    }

    fn text(name: &str, value: impl Into<Value>, args: &[&str]) -> String {
        call(name, value, args).unwrap().to_text()
    }

    #[test]
    fn test_builtin_lookup_ignores_case() {
        assert!(builtin("UPPER").is_some());
        assert!(builtin("e").is_some());
        assert!(builtin("coloredText").is_none());
    }

    #[test]
    fn test_case_transforms() {
        assert_eq!(text("upper", "robert", &[]), "ROBERT");
        assert_eq!(text("lower", "ŽLUŤOUČKÝ", &[]), "žluťoučký");
        assert_eq!(text("title", "hello wORLD-wide", &[]), "Hello World-Wide");
        assert_eq!(call("upper", Value::Null, &[]).unwrap(), Value::Null);
    }

    #[test]
    fn test_escape_and_nl2br() {
        assert_eq!(
            text("escape", r#"<img src="x?a=1&b=2" />"#, &[]),
            "&lt;img src=&quot;x?a=1&amp;b=2&quot; /&gt;"
        );
        assert_eq!(text("nl2br", "\nLINE1\nLINE2\r\nLINE3\n", &[]), "LINE1<br />\nLINE2<br />\r\nLINE3");
    }

    #[test]
    fn test_truncate() {
        let name = "A veeery looong cuuustomeeer name";
        assert_eq!(text("truncate", name, &["8"]), "A veeery...");
        assert_eq!(text("truncate", name, &["8", "XYZ"]), "A veeeryXYZ");
        assert_eq!(text("truncate", "short", &[]), "short");
        assert_eq!(text("truncate", "A verylong", &["2"]), "A...");
        assert!(call("truncate", name, &["many"]).is_err());
    }

    #[test]
    fn test_trim() {
        assert_eq!(text("trim", "+-   John Doe   +-", &["+-"]), "   John Doe   ");
        assert_eq!(text("trim", "  padded  ", &[]), "padded");
    }

    #[test]
    fn test_round() {
        assert_eq!(text("round", 40.0, &["2"]), "40.00");
        assert_eq!(text("round", "3.14159", &[]), "3.14");
        assert_eq!(text("round", "n/a", &["2"]), "n/a");
        assert_eq!(text("round", 1.5, &["20"]), "1.50000000000000000000");
        assert!(call("round", 1.5, &["100000"]).is_err());
        assert!(call("round", 1.5, &["1e300"]).is_err());
    }

    #[test]
    fn test_concat() {
        assert_eq!(text("concat", Value::Null, &["customer.name"]), "John Doe");
        assert_eq!(
            text("concat", "John Doe", &["\"our great hero\"", "\" - \""]),
            "John Doe - our great hero"
        );
        assert_eq!(text("concat", "John Doe", &["unescapedChars"]), "John Doe");
        assert_eq!(text("concat", "say", &["greeting"]), "say hello");
        assert_eq!(call("concat", Value::Null, &["'BBB', '+'"]).unwrap(), Value::Null);
    }

    #[test]
    fn test_replace_literal_and_regex() {
        assert_eq!(text("replace", "BADBOY", &["BADBOY", "GOODBOY"]), "GOODBOY");
        assert_eq!(text("replace", "BAD BOY", &["\" BOY\"", "\"GIRL\""]), "BADGIRL");
        assert_eq!(
            text("replace", "BAD BOY - GOOD GIRL", &["\"/boy/i\"", "\"friend1\""]),
            "BAD friend1 - GOOD GIRL"
        );
        assert_eq!(text("replace", "a1b22", &["#\\d+#", "N"]), "aNbN");
        assert_eq!(text("replace", "path/to", &["/", "-"]), "path-to");
        assert!(call("replace", "x", &["/(unclosed/"]).is_err());
        assert!(call("replace", "x", &[]).is_err());
    }

    #[test]
    fn test_date_directives_pass_through_non_dates() {
        assert_eq!(text("date", "......", &[]), "......");
        assert_eq!(text("date", "April", &[]), "April");
        assert_eq!(call("time", Value::Null, &[]).unwrap(), Value::Null);
    }

    #[test]
    fn test_date_directives_format_timestamps() {
        assert_eq!(text("date", 1_692_540_309, &[]), "Aug 20, 2023");
        assert_eq!(text("date", "2023-08-20 14:05:09", &["short"]), "8/20/23");
        assert_eq!(text("time", "1692540309", &[]), "2:05 PM");
        assert_eq!(
            text("datetime", 1_692_540_309, &["long", "short", "' at '"]),
            "August 20, 2023 at 2:05 PM"
        );
    }

    #[test]
    fn test_now_and_today() {
        let before = Utc::now().timestamp();
        let shifted = call("now", Value::Null, &["+7200"]).unwrap().as_number().unwrap() as i64;
        assert!(shifted >= before + 7200 && shifted <= before + 7260);
        assert!(!text("today", Value::Null, &["+14", "short"]).is_empty());
    }

    #[test]
    fn test_time_shifts_out_of_range() {
        assert!(call("today", Value::Null, &["1e18"]).is_err());
        assert!(call("today", Value::Null, &["-1e18"]).is_err());
        assert!(call("now", Value::Null, &["1e300"]).is_err());
        assert!(call("now", Value::Null, &["9e15"]).is_err());
    }

    #[test]
    fn test_unquote() {
        assert_eq!(unquote("\"abc\""), Some("abc"));
        assert_eq!(unquote("'x'"), Some("x"));
        assert_eq!(unquote("'BBB', '+'"), None);
        assert_eq!(unquote("\""), None);
        assert_eq!(unquote("plain"), None);
    }
}
