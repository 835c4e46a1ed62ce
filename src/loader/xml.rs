//! Recursive-descent handlers for the profile-definition XML dialect.
//!
//! Element grammar:
//!
//! ```text
//! <restrictions>
//!   <restriction id? type="container|audio|video|image">
//!     <field name type> <value>..</value>* <range min max/>? </field>*
//!     <parent name=id/>*
//!   </restriction>*
//! </restrictions>
//! <dlna-profile name mime id? base-profile?>
//!   <restriction .../>* <parent name=id/>*
//! </dlna-profile>
//! <include ref=path/>
//! ```
//!
//! Each `<restriction>` is flattened into a caps literal (structure name
//! from the special `name` field, one fragment per `<field>`) and parsed
//! by [`crate::caps_parser`]; `<parent>` caps are then merged underneath
//! so the child's own fields win. Schema validation is an upstream
//! concern; anything unexpected here is skipped with a warning.

use super::LoadSession;
use crate::caps::{Caps, PLACEHOLDER_NAME};
use crate::error::{Error, Result};
use crate::profile::{Profile, Restriction, StreamKind, StreamProfile};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

/// Parse one document, appending its profiles to `out`.
///
/// Only well-formedness errors from the XML reader abort the document
/// (profiles collected so far are kept by the caller); everything else is
/// recovered inline.
pub(super) fn parse_document(
    document: &str,
    session: &mut LoadSession,
    out: &mut Vec<Profile>,
) -> Result<()> {
    let mut reader = Reader::from_str(document);
    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.name().as_ref() {
                b"include" => {
                    out.extend(process_include(attr(&e, b"ref"), session));
                    skip_element(&mut reader, b"include")?;
                }
                b"restrictions" => process_restrictions(&mut reader, session)?,
                b"dlna-profile" => {
                    out.push(process_dlna_profile(&mut reader, &e, session)?);
                }
                // Wrapper elements are transparent.
                _ => {}
            },
            Event::Empty(e) if e.name().as_ref() == b"include" => {
                out.extend(process_include(attr(&e, b"ref"), session));
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(())
}

/// `<restrictions>`: resolve each child restriction so ones carrying an
/// `id` land in the session symbol table for later `<parent>` lookups.
fn process_restrictions(reader: &mut Reader<&[u8]>, session: &mut LoadSession) -> Result<()> {
    loop {
        match reader.read_event()? {
            Event::Start(e) if e.name().as_ref() == b"restriction" => {
                let _ = process_restriction(reader, &e, session)?;
            }
            Event::End(e) if e.name().as_ref() == b"restrictions" => break,
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(())
}

/// `<restriction>`: build a caps literal from the `<field>` children,
/// parse it, then merge each `<parent>`'s caps underneath.
///
/// Returns `None` (after a warning) for unsupported restriction types and
/// malformed caps; the rest of the document still loads.
fn process_restriction(
    reader: &mut Reader<&[u8]>,
    start: &BytesStart,
    session: &mut LoadSession,
) -> Result<Option<Restriction>> {
    let id = attr(start, b"id");
    let restriction_type = attr(start, b"type").unwrap_or_default();

    let mut caps_str = String::new();
    let mut name: Option<String> = None;
    let mut parents: Vec<Restriction> = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.name().as_ref() {
                b"field" => {
                    // The "name" field is special: it becomes the structure
                    // name rather than a regular field.
                    if attr(&e, b"name").as_deref() == Some("name") {
                        name = read_name_field(reader)?;
                    } else {
                        process_field(reader, &e, &mut caps_str)?;
                    }
                }
                b"parent" => {
                    resolve_parent(attr(&e, b"name"), session, &mut parents);
                    skip_element(reader, b"parent")?;
                }
                other => {
                    let other = other.to_vec();
                    skip_element(reader, &other)?;
                }
            },
            Event::Empty(e) if e.name().as_ref() == b"parent" => {
                resolve_parent(attr(&e, b"name"), session, &mut parents);
            }
            Event::End(e) if e.name().as_ref() == b"restriction" => break,
            Event::Eof => break,
            _ => {}
        }
    }

    let Some(kind) = StreamKind::from_restriction_type(&restriction_type) else {
        tracing::warn!(
            r#type = %restriction_type,
            "support for this restriction type is not implemented"
        );
        return Ok(None);
    };

    let structure_name = name.unwrap_or_else(|| PLACEHOLDER_NAME.to_string());
    let literal = format!("{structure_name}{caps_str}");
    let mut caps = match Caps::parse(&literal) {
        Ok(caps) => caps,
        Err(err) => {
            tracing::warn!(error = %err, "skipping restriction with malformed caps");
            return Ok(None);
        }
    };

    // Child overrides parent attributes.
    for parent in &parents {
        caps.merge_fields_from(&parent.caps);
    }

    let restriction = Restriction {
        id: id.clone(),
        kind,
        caps,
    };
    if let Some(id) = id {
        session.store_restriction(id, restriction.clone());
    }
    Ok(Some(restriction))
}

/// `<field>`: append one `name = (type) value` fragment to the caps
/// literal under construction.
fn process_field(
    reader: &mut Reader<&[u8]>,
    start: &BytesStart,
    caps_str: &mut String,
) -> Result<()> {
    let name = attr(start, b"name").unwrap_or_default();
    let field_type = attr(start, b"type").unwrap_or_default();

    // Fields are comma-separated; the leading comma is fine because the
    // structure name gets prepended to the finished string.
    caps_str.push_str(&format!(", {name} = ({field_type}) "));

    let mut values: Vec<String> = Vec::new();
    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.name().as_ref() {
                b"range" => {
                    append_range(&e, caps_str);
                    skip_element(reader, b"range")?;
                }
                b"value" => match read_text(reader, b"value")? {
                    Some(value) => values.push(value),
                    None => tracing::warn!("empty <value>s are illegal"),
                },
                other => {
                    let other = other.to_vec();
                    skip_element(reader, &other)?;
                }
            },
            Event::Empty(e) => match e.name().as_ref() {
                b"range" => append_range(&e, caps_str),
                b"value" => tracing::warn!("empty <value>s are illegal"),
                _ => {}
            },
            Event::End(e) if e.name().as_ref() == b"field" => break,
            Event::Eof => break,
            _ => {}
        }
    }

    match values.len() {
        0 => {}
        1 => caps_str.push_str(&values[0]),
        _ => {
            caps_str.push_str("{ ");
            caps_str.push_str(&values.join(", "));
            caps_str.push_str(" }");
        }
    }
    Ok(())
}

fn append_range(e: &BytesStart, caps_str: &mut String) {
    let min = attr(e, b"min").unwrap_or_default();
    let max = attr(e, b"max").unwrap_or_default();
    caps_str.push_str(&format!("[ {min}, {max} ]"));
}

/// `<parent name=id>`: look the referenced restriction up in the session
/// table; an unknown id contributes nothing.
fn resolve_parent(
    name: Option<String>,
    session: &LoadSession,
    parents: &mut Vec<Restriction>,
) {
    let Some(name) = name else {
        tracing::warn!("<parent> without a name attribute");
        return;
    };
    match session.restriction(&name) {
        Some(restriction) => parents.push(restriction.clone()),
        None => {
            let err = Error::UnknownReference {
                kind: "restriction",
                id: name,
            };
            tracing::warn!(error = %err, "could not find parent restriction");
        }
    }
}

/// `<dlna-profile>`: collect its restrictions, sorting container caps out
/// from per-stream restrictions, then assemble the profile (fresh or by
/// overlaying a `base-profile`).
fn process_dlna_profile(
    reader: &mut Reader<&[u8]>,
    start: &BytesStart,
    session: &mut LoadSession,
) -> Result<Profile> {
    let id = attr(start, b"id");
    let base_ref = attr(start, b"base-profile");
    // Profiles without names are used only for inheritance, not for
    // actual matching.
    let (name, mime) = match attr(start, b"name") {
        Some(name) => (name, attr(start, b"mime").unwrap_or_default()),
        None => (String::new(), String::new()),
    };

    let mut container: Option<Caps> = None;
    let mut streams: Vec<Restriction> = Vec::new();
    let mut classify = |restriction: Restriction| {
        if restriction.kind == StreamKind::Container {
            container = Some(restriction.caps);
        } else {
            streams.push(restriction);
        }
    };

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.name().as_ref() {
                b"restriction" => {
                    if let Some(restriction) = process_restriction(reader, &e, session)? {
                        classify(restriction);
                    }
                }
                b"parent" => {
                    let mut parents = Vec::new();
                    resolve_parent(attr(&e, b"name"), session, &mut parents);
                    parents.into_iter().for_each(&mut classify);
                    skip_element(reader, b"parent")?;
                }
                other => {
                    let other = other.to_vec();
                    skip_element(reader, &other)?;
                }
            },
            Event::Empty(e) if e.name().as_ref() == b"parent" => {
                let mut parents = Vec::new();
                resolve_parent(attr(&e, b"name"), session, &mut parents);
                parents.into_iter().for_each(&mut classify);
            }
            Event::End(e) if e.name().as_ref() == b"dlna-profile" => break,
            Event::Eof => break,
            _ => {}
        }
    }

    let base = base_ref.and_then(|base_id| match session.profile(&base_id) {
        Some(profile) => Some(profile.clone()),
        None => {
            let err = Error::UnknownReference {
                kind: "profile",
                id: base_id,
            };
            tracing::warn!(error = %err, "invalid base-profile reference");
            None
        }
    });

    let mut profile = match &base {
        Some(base) => Profile::inherit(&name, &mime, base, container),
        None => Profile::new(&name, &mime, container.unwrap_or_else(Caps::none)),
    };

    for restriction in streams {
        if let Err(err) = profile.add_stream(StreamProfile::new(restriction.kind, restriction.caps))
        {
            tracing::warn!(error = %err, "skipping stream restriction");
        }
    }

    if let Some(id) = id {
        session.store_profile(id, profile.clone());
    }
    Ok(profile)
}

/// `<include ref=path>`: load the referenced document through the session
/// so symbol tables are shared and cycles terminate.
fn process_include(reference: Option<String>, session: &mut LoadSession) -> Vec<Profile> {
    let Some(reference) = reference else {
        tracing::warn!("<include> without a ref attribute");
        return Vec::new();
    };
    let mut path = std::path::PathBuf::from(&reference);
    if path.is_relative() {
        path = session.root_dir().join(path);
    }
    session.load_file(&path)
}

/// The text content of the special `name` field's `<value>`.
fn read_name_field(reader: &mut Reader<&[u8]>) -> Result<Option<String>> {
    let mut name = None;
    loop {
        match reader.read_event()? {
            Event::Start(e) if e.name().as_ref() == b"value" => {
                name = read_text(reader, b"value")?;
            }
            Event::End(e) if e.name().as_ref() == b"field" => break,
            Event::Eof => break,
            _ => {}
        }
    }
    if name.is_none() {
        tracing::warn!("empty <value>s are illegal");
    }
    Ok(name)
}

/// Accumulate text until the named closing tag; `None` for all-whitespace.
fn read_text(reader: &mut Reader<&[u8]>, closing: &[u8]) -> Result<Option<String>> {
    let mut text = String::new();
    loop {
        match reader.read_event()? {
            Event::Text(t) => text.push_str(&t.unescape()?),
            Event::End(e) if e.name().as_ref() == closing => break,
            Event::Eof => break,
            _ => {}
        }
    }
    let text = text.trim();
    if text.is_empty() {
        Ok(None)
    } else {
        Ok(Some(text.to_string()))
    }
}

/// Skip the rest of the current element, honoring nesting.
fn skip_element(reader: &mut Reader<&[u8]>, name: &[u8]) -> Result<()> {
    let mut depth = 0usize;
    loop {
        match reader.read_event()? {
            Event::Start(e) if e.name().as_ref() == name => depth += 1,
            Event::End(e) if e.name().as_ref() == name => {
                if depth == 0 {
                    return Ok(());
                }
                depth -= 1;
            }
            Event::Eof => return Ok(()),
            _ => {}
        }
    }
}

/// Fetch an attribute value as an owned string.
fn attr(e: &BytesStart, name: &[u8]) -> Option<String> {
    e.attributes()
        .filter_map(|attr| attr.ok())
        .find(|attr| attr.key.as_ref() == name)
        .map(|attr| String::from_utf8_lossy(&attr.value).into_owned())
}
