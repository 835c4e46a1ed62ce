//! Caps literal parser using winnow.
//!
//! Parses the textual caps syntax the restriction loader assembles from
//! profile-definition documents:
//!
//! ```text
//! audio/mpeg, mpegversion = (int) 1, channels = (int) { 1, 2 }
//! video/mpeg, framerate = (fraction) [ 0/1, 30/1 ], interlaced = (boolean) false
//! ```
//!
//! # Syntax
//!
//! - A caps literal is `ANY`, `EMPTY`, or one or more structures
//!   separated by `;`
//! - A structure is a media-type name followed by comma-separated fields
//! - A field is `name = (type) value` where the type tag is optional
//! - A value is a scalar, a set `{ a, b, c }`, or a range `[ min, max ]`
//! - Scalar types: `int`, `fraction` (`num/den`), `boolean`, `string`

use crate::caps::{Caps, Constraint, Fraction, Structure, Value};
use crate::error::{Error, Result};
use winnow::ascii::multispace0;
use winnow::combinator::{alt, delimited, opt, separated};
use winnow::error::ContextError;
use winnow::token::{take_till, take_while};
use winnow::Parser;

type WResult<T> = std::result::Result<T, ContextError>;

/// Parse a caps literal string.
///
/// # Example
///
/// ```rust
/// use medialens::caps_parser::parse_caps;
///
/// let caps = parse_caps("audio/mpeg, channels = (int) { 1, 2 }").unwrap();
/// assert_eq!(caps.structures().len(), 1);
/// assert_eq!(caps.first().unwrap().name(), "audio/mpeg");
/// ```
pub fn parse_caps(input: &str) -> Result<Caps> {
    let trimmed = input.trim();
    match trimmed {
        "ANY" => return Ok(Caps::any()),
        "EMPTY" | "NONE" => return Ok(Caps::none()),
        _ => {}
    }
    caps.parse(trimmed).map_err(|e| Error::CapsParse {
        literal: input.to_string(),
        reason: e.to_string(),
    })
}

/// Parse a complete caps literal (one or more structures).
fn caps(input: &mut &str) -> WResult<Caps> {
    let structures: Vec<Structure> =
        separated(1.., structure, (multispace0, ';', multispace0)).parse_next(input)?;

    // Ensure we consumed all input
    multispace0.parse_next(input)?;
    if !input.is_empty() {
        return Err(ContextError::new());
    }

    Ok(Caps::from_structures(structures))
}

/// Parse a structure: media-type name plus comma-separated fields.
fn structure(input: &mut &str) -> WResult<Structure> {
    let _ = multispace0.parse_next(input)?;
    let name: &str = media_type.parse_next(input)?;
    let mut st = Structure::new(name);

    loop {
        let checkpoint = *input;
        let _ = multispace0.parse_next(input)?;
        if !input.starts_with(',') {
            *input = checkpoint;
            break;
        }
        let _ = ','.parse_next(input)?;
        let (fname, constraint) = field.parse_next(input)?;
        st.set(fname, constraint);
    }

    Ok(st)
}

/// Parse a media-type name (e.g. `audio/mpeg`, `video/x-matroska`).
fn media_type<'a>(input: &mut &'a str) -> WResult<&'a str> {
    take_while(1.., |c: char| {
        c.is_alphanumeric() || matches!(c, '/' | '-' | '+' | '.' | '_')
    })
    .parse_next(input)
}

/// Parse a field: `name = (type) value`.
fn field(input: &mut &str) -> WResult<(String, Constraint)> {
    let _ = multispace0.parse_next(input)?;
    let name: &str = identifier.parse_next(input)?;
    let _ = multispace0.parse_next(input)?;
    let _ = '='.parse_next(input)?;
    let _ = multispace0.parse_next(input)?;

    let tag: Option<&str> = opt(delimited('(', identifier, ')')).parse_next(input)?;
    let _ = multispace0.parse_next(input)?;

    let constraint = field_value(input, tag)?;
    Ok((name.to_string(), constraint))
}

/// Parse an identifier (field name or type tag).
fn identifier<'a>(input: &mut &'a str) -> WResult<&'a str> {
    take_while(1.., |c: char| c.is_alphanumeric() || c == '_' || c == '-')
        .parse_next(input)
}

/// Parse a field value: range, set, or scalar, coerced by the type tag.
fn field_value(input: &mut &str, tag: Option<&str>) -> WResult<Constraint> {
    if input.starts_with('[') {
        return range(input, tag);
    }
    if input.starts_with('{') {
        return set(input, tag);
    }
    scalar(input, tag).map(Constraint::Fixed)
}

/// Parse a closed range `[ min, max ]`.
fn range(input: &mut &str, tag: Option<&str>) -> WResult<Constraint> {
    let _ = '['.parse_next(input)?;
    let _ = multispace0.parse_next(input)?;
    let min = scalar(input, tag)?;
    let _ = (multispace0, ',', multispace0).parse_next(input)?;
    let max = scalar(input, tag)?;
    let _ = (multispace0, ']').parse_next(input)?;

    match (min, max) {
        (Value::Int(min), Value::Int(max)) => Ok(Constraint::IntRange { min, max }),
        (Value::Fraction(min), Value::Fraction(max)) => {
            Ok(Constraint::FractionRange { min, max })
        }
        // Ranges over booleans or strings are not a thing.
        _ => Err(ContextError::new()),
    }
}

/// Parse a value set `{ a, b, c }`.
fn set(input: &mut &str, tag: Option<&str>) -> WResult<Constraint> {
    let _ = '{'.parse_next(input)?;
    let _ = multispace0.parse_next(input)?;
    let mut values = vec![scalar(input, tag)?];
    loop {
        let checkpoint = *input;
        let _ = multispace0.parse_next(input)?;
        if !input.starts_with(',') {
            *input = checkpoint;
            break;
        }
        let _ = ','.parse_next(input)?;
        let _ = multispace0.parse_next(input)?;
        values.push(scalar(input, tag)?);
    }
    let _ = (multispace0, '}').parse_next(input)?;
    Ok(Constraint::List(values))
}

/// Parse one scalar token and coerce it according to the type tag.
fn scalar(input: &mut &str, tag: Option<&str>) -> WResult<Value> {
    let token: String = alt((quoted_string, bare_token)).parse_next(input)?;
    coerce(&token, tag).ok_or_else(ContextError::new)
}

/// Coerce a raw token into a typed value.
///
/// With a type tag the token must parse as that type; without one the
/// type is inferred (boolean, fraction, integer, then string).
fn coerce(token: &str, tag: Option<&str>) -> Option<Value> {
    match tag {
        Some("int" | "i" | "uint") => token.parse::<i64>().ok().map(Value::Int),
        Some("boolean" | "bool" | "b") => parse_bool(token).map(Value::Bool),
        Some("fraction") => parse_fraction(token).map(Value::Fraction),
        Some("string" | "s" | "str") => Some(Value::Str(token.to_string())),
        // Unknown tags carry the token as a string rather than failing;
        // the schema owns tag validity.
        Some(_) => Some(Value::Str(token.to_string())),
        None => {
            if let Some(b) = parse_bool(token) {
                return Some(Value::Bool(b));
            }
            if token.contains('/') {
                if let Some(fr) = parse_fraction(token) {
                    return Some(Value::Fraction(fr));
                }
            }
            if let Ok(i) = token.parse::<i64>() {
                return Some(Value::Int(i));
            }
            Some(Value::Str(token.to_string()))
        }
    }
}

fn parse_bool(token: &str) -> Option<bool> {
    match token {
        "true" | "TRUE" | "yes" => Some(true),
        "false" | "FALSE" | "no" => Some(false),
        _ => None,
    }
}

fn parse_fraction(token: &str) -> Option<Fraction> {
    match token.split_once('/') {
        Some((num, den)) => {
            let num = num.trim().parse::<i32>().ok()?;
            let den = den.trim().parse::<i32>().ok()?;
            if den <= 0 {
                return None;
            }
            Some(Fraction::new(num, den))
        }
        None => {
            // A bare integer is a whole fraction.
            let num = token.parse::<i32>().ok()?;
            Some(Fraction::new(num, 1))
        }
    }
}

/// Parse a quoted string value.
fn quoted_string(input: &mut &str) -> WResult<String> {
    delimited('"', take_till(0.., '"'), '"')
        .map(|s: &str| s.to_string())
        .parse_next(input)
}

/// Parse a bare (unquoted) scalar token.
/// Stops at whitespace and at any structural delimiter.
fn bare_token(input: &mut &str) -> WResult<String> {
    take_while(1.., |c: char| {
        !c.is_whitespace() && !matches!(c, ',' | ';' | '{' | '}' | '[' | ']' | '(' | ')')
    })
    .map(|s: &str| s.to_string())
    .parse_next(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bare_name() {
        let caps = parse_caps("audio/mpeg").unwrap();
        assert_eq!(caps.structures().len(), 1);
        let st = caps.first().unwrap();
        assert_eq!(st.name(), "audio/mpeg");
        assert!(st.fields().is_empty());
    }

    #[test]
    fn test_parse_single_value_field() {
        let caps = parse_caps("audio/mpeg, mpegversion = (int) 1").unwrap();
        let st = caps.first().unwrap();
        assert_eq!(
            st.get("mpegversion"),
            Some(&Constraint::Fixed(Value::Int(1)))
        );
    }

    #[test]
    fn test_parse_value_set() {
        let caps = parse_caps("audio/mpeg, layer = (int) { 2, 3 }").unwrap();
        let st = caps.first().unwrap();
        assert_eq!(
            st.get("layer"),
            Some(&Constraint::List(vec![Value::Int(2), Value::Int(3)]))
        );
    }

    #[test]
    fn test_parse_int_range() {
        let caps = parse_caps("image/jpeg, width = (int) [ 0, 4096 ]").unwrap();
        let st = caps.first().unwrap();
        assert_eq!(
            st.get("width"),
            Some(&Constraint::IntRange { min: 0, max: 4096 })
        );
    }

    #[test]
    fn test_parse_fraction_range() {
        let caps =
            parse_caps("video/mpeg, framerate = (fraction) [ 0/1, 30/1 ]").unwrap();
        let st = caps.first().unwrap();
        assert_eq!(
            st.get("framerate"),
            Some(&Constraint::FractionRange {
                min: Fraction::new(0, 1),
                max: Fraction::new(30, 1),
            })
        );
    }

    #[test]
    fn test_parse_boolean_and_string() {
        let caps = parse_caps(
            "video/mpeg, interlaced = (boolean) false, profile = (string) simple",
        )
        .unwrap();
        let st = caps.first().unwrap();
        assert_eq!(
            st.get("interlaced"),
            Some(&Constraint::Fixed(Value::Bool(false)))
        );
        assert_eq!(
            st.get("profile"),
            Some(&Constraint::Fixed(Value::Str("simple".into())))
        );
    }

    #[test]
    fn test_parse_untyped_values_inferred() {
        let caps = parse_caps("audio/mpeg, rate = 44100, vbr = true").unwrap();
        let st = caps.first().unwrap();
        assert_eq!(st.get("rate"), Some(&Constraint::Fixed(Value::Int(44100))));
        assert_eq!(st.get("vbr"), Some(&Constraint::Fixed(Value::Bool(true))));
    }

    #[test]
    fn test_parse_multiple_structures() {
        let caps = parse_caps("audio/mpeg, mpegversion = (int) 1; audio/x-ac3").unwrap();
        assert_eq!(caps.structures().len(), 2);
        assert_eq!(caps.structures()[1].name(), "audio/x-ac3");
    }

    #[test]
    fn test_parse_any_and_empty() {
        assert!(parse_caps("ANY").unwrap().is_any());
        assert!(parse_caps("EMPTY").unwrap().is_empty());
    }

    #[test]
    fn test_parse_quoted_string_value() {
        let caps = parse_caps(r#"audio/mpeg, note = (string) "two words""#).unwrap();
        assert_eq!(
            caps.first().unwrap().get("note"),
            Some(&Constraint::Fixed(Value::Str("two words".into())))
        );
    }

    #[test]
    fn test_parse_no_spaces() {
        let caps = parse_caps("audio/mpeg,channels=(int){1,2},rate=(int)[8000,48000]")
            .unwrap();
        let st = caps.first().unwrap();
        assert!(st.has_field("channels"));
        assert!(st.has_field("rate"));
    }

    #[test]
    fn test_parse_type_mismatch_fails() {
        assert!(parse_caps("audio/mpeg, rate = (int) fast").is_err());
    }

    #[test]
    fn test_parse_string_range_fails() {
        assert!(parse_caps("audio/mpeg, name = (string) [ a, b ]").is_err());
    }

    #[test]
    fn test_parse_trailing_garbage_fails() {
        assert!(parse_caps("audio/mpeg, rate = (int) 44100 ???").is_err());
    }

    #[test]
    fn test_parse_empty_fails() {
        assert!(parse_caps("").is_err());
    }

    #[test]
    fn test_display_round_trip() {
        let literals = [
            "audio/mpeg, mpegversion = (int) 1, channels = (int) { 1, 2 }",
            "image/jpeg, width = (int) [ 0, 4096 ], height = (int) [ 0, 4096 ]",
            "video/mpeg, framerate = (fraction) [ 0/1, 30/1 ]",
        ];
        for literal in literals {
            let caps = parse_caps(literal).unwrap();
            assert_eq!(parse_caps(&caps.to_string()).unwrap(), caps);
        }
    }
}
