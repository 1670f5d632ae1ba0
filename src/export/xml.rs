//! Copyright © 2025-2026 Wenze Wei. All Rights Reserved.
//!
//! This file is part of Errzip.
//! The Errzip project belongs to the Dunimd Team.
//!
//! Licensed under the Apache License, Version 2.0 (the "License");
//! You may not use this file except in compliance with the License.
//! You may obtain a copy of the License at
//!
//!     http://www.apache.org/licenses/LICENSE-2.0
//!
//! Unless required by applicable law or agreed to in writing, software
//! distributed under the License is distributed on an "AS IS" BASIS,
//! WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//! See the License for the specific language governing permissions and
//! limitations under the License.

//! # Error Document Serializer
//!
//! Encodes one [`EzErrorPayload`] as a standalone XML document:
//!
//! ```xml
//! <?xml version="1.0" encoding="utf-8"?>
//! <error host="web-01" type="System.TimeoutException" message="..." time="2025-03-01T10:00:00Z" statusCode="504">
//!   <serverVariables>
//!     <item name="REMOTE_ADDR">
//!       <value string="10.0.0.7"/>
//!     </item>
//!   </serverVariables>
//! </error>
//! ```
//!
//! Scalar fields are attributes and are omitted when absent. Collections are
//! written only when non-empty. Tab, CR and LF inside attribute values are
//! written as character references so conforming parsers do not normalize
//! them to spaces, which keeps [`EzXmlSerializer::decode`] lossless. Other
//! characters outside the XML 1.0 `Char` production (NUL, the remaining C0
//! controls, U+FFFE and U+FFFF) cannot appear in a well-formed document in any
//! form, so encoding a payload that carries one fails with `Validation`.
//!
//! `time` is RFC 3339 in UTC (`Z`) for years 0000 to 9999. Years outside that
//! range keep the same layout with a signed, wider year (`+10000-01-01T...Z`).

use std::borrow::Cow;

use chrono::{DateTime, NaiveDateTime, Utc};
use quick_xml::events::attributes::Attribute;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::name::QName;
use quick_xml::{Reader, Writer};
use serde::{Deserialize, Serialize};

use crate::errors::{EzError, Result};
use crate::record::{EzErrorPayload, EzNameValues, EzRecordDetail};

/// Text encodings an entry can be written in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EzTextEncoding {
    /// UTF-8 without a byte order mark.
    #[default]
    Utf8,
    /// UTF-16 little endian with a byte order mark.
    Utf16Le,
}

impl EzTextEncoding {
    /// Name written into the XML declaration.
    pub fn label(&self) -> &'static str {
        match self {
            EzTextEncoding::Utf8 => "utf-8",
            EzTextEncoding::Utf16Le => "utf-16",
        }
    }

    fn encode_str(&self, text: &str) -> Vec<u8> {
        match self {
            EzTextEncoding::Utf8 => text.as_bytes().to_vec(),
            EzTextEncoding::Utf16Le => {
                let mut out = Vec::with_capacity(2 + text.len() * 2);
                out.extend_from_slice(&[0xFF, 0xFE]);
                for unit in text.encode_utf16() {
                    out.extend_from_slice(&unit.to_le_bytes());
                }
                out
            }
        }
    }

    fn decode_bytes<'a>(&self, bytes: &'a [u8]) -> Result<Cow<'a, str>> {
        match self {
            EzTextEncoding::Utf8 => std::str::from_utf8(bytes)
                .map(Cow::Borrowed)
                .map_err(|e| EzError::Serde(format!("invalid utf-8 document: {}", e))),
            EzTextEncoding::Utf16Le => {
                let body = bytes.strip_prefix(&[0xFF, 0xFE]).unwrap_or(bytes);
                if body.len() % 2 != 0 {
                    return Err(EzError::Serde("truncated utf-16 document".into()));
                }
                let units: Vec<u16> = body
                    .chunks_exact(2)
                    .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
                    .collect();
                String::from_utf16(&units)
                    .map(Cow::Owned)
                    .map_err(|e| EzError::Serde(format!("invalid utf-16 document: {}", e)))
            }
        }
    }
}

/// Turns a fetched detail into the bytes of one archive entry.
pub trait EzRecordSerializer: Send + Sync {
    /// Encodes `detail`. Pure and deterministic.
    fn encode(&self, detail: &EzRecordDetail, encoding: EzTextEncoding) -> Result<Vec<u8>>;
}

/// XML error document serializer.
#[derive(Clone, Copy, Debug, Default)]
pub struct EzXmlSerializer;

const ROOT: &str = "error";
const ITEM: &str = "item";
const VALUE: &str = "value";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Collection {
    ServerVariables,
    QueryString,
    Form,
    Cookies,
}

impl Collection {
    const ALL: [Collection; 4] = [
        Collection::ServerVariables,
        Collection::QueryString,
        Collection::Form,
        Collection::Cookies,
    ];

    fn tag(&self) -> &'static str {
        match self {
            Collection::ServerVariables => "serverVariables",
            Collection::QueryString => "queryString",
            Collection::Form => "form",
            Collection::Cookies => "cookies",
        }
    }

    fn from_tag(tag: &[u8]) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.tag().as_bytes() == tag)
    }

    fn of<'p>(&self, payload: &'p EzErrorPayload) -> &'p EzNameValues {
        match self {
            Collection::ServerVariables => &payload.server_variables,
            Collection::QueryString => &payload.query_string,
            Collection::Form => &payload.form,
            Collection::Cookies => &payload.cookies,
        }
    }

    fn of_mut<'p>(&self, payload: &'p mut EzErrorPayload) -> &'p mut EzNameValues {
        match self {
            Collection::ServerVariables => &mut payload.server_variables,
            Collection::QueryString => &mut payload.query_string,
            Collection::Form => &mut payload.form,
            Collection::Cookies => &mut payload.cookies,
        }
    }
}

impl EzXmlSerializer {
    pub fn new() -> Self {
        EzXmlSerializer
    }

    /// Encodes a bare payload.
    pub fn encode_payload(
        &self,
        payload: &EzErrorPayload,
        encoding: EzTextEncoding,
    ) -> Result<Vec<u8>> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        writer.write_event(Event::Decl(BytesDecl::new(
            "1.0",
            Some(encoding.label()),
            None,
        )))?;

        let mut root = BytesStart::new(ROOT);
        push_optional(&mut root, "application", payload.application.as_deref())?;
        push_optional(&mut root, "host", payload.host.as_deref())?;
        push_attr(&mut root, "type", &payload.type_name)?;
        push_optional(&mut root, "message", payload.message.as_deref())?;
        push_optional(&mut root, "source", payload.source.as_deref())?;
        push_optional(&mut root, "detail", payload.detail.as_deref())?;
        push_optional(&mut root, "user", payload.user.as_deref())?;
        push_attr(
            &mut root,
            "time",
            &format_time(&payload.time),
        )?;
        if let Some(code) = payload.status_code {
            push_attr(&mut root, "statusCode", &code.to_string())?;
        }
        push_optional(
            &mut root,
            "webHostHtmlMessage",
            payload.web_host_html_message.as_deref(),
        )?;

        let has_children = Collection::ALL.iter().any(|c| !c.of(payload).is_empty());
        if !has_children {
            writer.write_event(Event::Empty(root))?;
        } else {
            writer.write_event(Event::Start(root))?;
            for collection in Collection::ALL {
                write_collection(&mut writer, collection.tag(), collection.of(payload))?;
            }
            writer.write_event(Event::End(BytesEnd::new(ROOT)))?;
        }

        let xml = String::from_utf8(writer.into_inner())
            .map_err(|e| EzError::internal(format!("xml writer produced invalid utf-8: {}", e)))?;
        Ok(encoding.encode_str(&xml))
    }

    /// Decodes a document produced by [`EzXmlSerializer::encode_payload`].
    pub fn decode(&self, bytes: &[u8], encoding: EzTextEncoding) -> Result<EzErrorPayload> {
        let text = encoding.decode_bytes(bytes)?;
        let mut reader = Reader::from_str(&text);
        reader.trim_text(true);

        let mut payload: Option<EzErrorPayload> = None;
        let mut collection: Option<Collection> = None;
        let mut item_name: Option<String> = None;

        loop {
            let (element, is_empty) = match reader.read_event()? {
                Event::Start(e) => (e, false),
                Event::Empty(e) => (e, true),
                Event::End(e) => {
                    let name = e.name();
                    if Collection::from_tag(name.as_ref()).is_some() {
                        collection = None;
                    } else if name.as_ref() == ITEM.as_bytes() {
                        item_name = None;
                    }
                    continue;
                }
                Event::Eof => break,
                _ => continue,
            };

            let name = element.name();
            match name.as_ref() {
                b"error" => {
                    if payload.is_some() {
                        return Err(EzError::Serde("nested <error> element".into()));
                    }
                    payload = Some(read_root(&element)?);
                }
                b"item" => {
                    let name = read_attr(&element, "name")?
                        .ok_or_else(|| EzError::Serde("<item> without a name".into()))?;
                    if is_empty {
                        // An item with no value element still records the name.
                        push_item(&mut payload, collection, name, String::new())?;
                    } else {
                        item_name = Some(name);
                    }
                }
                b"value" => {
                    let name = item_name
                        .clone()
                        .ok_or_else(|| EzError::Serde("<value> outside <item>".into()))?;
                    let value = read_attr(&element, "string")?.unwrap_or_default();
                    push_item(&mut payload, collection, name, value)?;
                }
                other => {
                    if let Some(found) = Collection::from_tag(other) {
                        if !is_empty {
                            collection = Some(found);
                        }
                    }
                }
            }
        }

        payload.ok_or_else(|| EzError::Serde("document has no <error> element".into()))
    }
}

impl EzRecordSerializer for EzXmlSerializer {
    fn encode(&self, detail: &EzRecordDetail, encoding: EzTextEncoding) -> Result<Vec<u8>> {
        self.encode_payload(&detail.payload, encoding)
    }
}

fn write_collection(
    writer: &mut Writer<Vec<u8>>,
    tag: &str,
    values: &EzNameValues,
) -> Result<()> {
    if values.is_empty() {
        return Ok(());
    }

    writer.write_event(Event::Start(BytesStart::new(tag)))?;
    for (name, value) in values.iter() {
        let mut item = BytesStart::new(ITEM);
        push_attr(&mut item, "name", name)?;
        writer.write_event(Event::Start(item))?;

        let mut value_elem = BytesStart::new(VALUE);
        push_attr(&mut value_elem, "string", value)?;
        writer.write_event(Event::Empty(value_elem))?;

        writer.write_event(Event::End(BytesEnd::new(ITEM)))?;
    }
    writer.write_event(Event::End(BytesEnd::new(tag)))?;
    Ok(())
}

fn push_optional(elem: &mut BytesStart<'_>, key: &'static str, value: Option<&str>) -> Result<()> {
    match value {
        Some(v) => push_attr(elem, key, v),
        None => Ok(()),
    }
}

fn push_attr(elem: &mut BytesStart<'_>, key: &'static str, value: &str) -> Result<()> {
    let escaped = escape_attr(value)?;
    elem.push_attribute(Attribute {
        key: QName(key.as_bytes()),
        value: Cow::Owned(escaped.into_bytes()),
    });
    Ok(())
}

/// Escapes markup and whitespace controls; rejects characters XML cannot carry.
fn escape_attr(value: &str) -> Result<String> {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            '\t' | '\n' | '\r' => out.push_str(&format!("&#x{:X};", ch as u32)),
            c if (c as u32) < 0x20 || c == '\u{FFFE}' || c == '\u{FFFF}' => {
                return Err(EzError::validation(format!(
                    "character U+{:04X} cannot be encoded in an error document",
                    c as u32
                )))
            }
            c => out.push(c),
        }
    }
    Ok(out)
}

const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.fZ";

/// `%Y` signs and widens years past 9999, which RFC 3339 parsers reject.
fn format_time(time: &DateTime<Utc>) -> String {
    time.format(TIME_FORMAT).to_string()
}

fn parse_time(text: &str) -> Result<DateTime<Utc>> {
    if let Ok(naive) = NaiveDateTime::parse_from_str(text, TIME_FORMAT) {
        return Ok(naive.and_utc());
    }
    DateTime::parse_from_rfc3339(text)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| EzError::Serde(format!("invalid time '{}': {}", text, e)))
}

fn read_attr(elem: &BytesStart<'_>, key: &str) -> Result<Option<String>> {
    for attr in elem.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        if attr.key.as_ref() == key.as_bytes() {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

fn read_root(elem: &BytesStart<'_>) -> Result<EzErrorPayload> {
    let type_name = read_attr(elem, "type")?
        .ok_or_else(|| EzError::Serde("<error> without a type attribute".into()))?;
    let time_text = read_attr(elem, "time")?
        .ok_or_else(|| EzError::Serde("<error> without a time attribute".into()))?;
    let time = parse_time(&time_text)?;

    let mut payload = EzErrorPayload::new(type_name, time);
    payload.application = read_attr(elem, "application")?;
    payload.host = read_attr(elem, "host")?;
    payload.message = read_attr(elem, "message")?;
    payload.source = read_attr(elem, "source")?;
    payload.detail = read_attr(elem, "detail")?;
    payload.user = read_attr(elem, "user")?;
    payload.web_host_html_message = read_attr(elem, "webHostHtmlMessage")?;
    payload.status_code = match read_attr(elem, "statusCode")? {
        Some(code) => Some(
            code.parse()
                .map_err(|_| EzError::Serde(format!("invalid status code '{}'", code)))?,
        ),
        None => None,
    };
    Ok(payload)
}

fn push_item(
    payload: &mut Option<EzErrorPayload>,
    collection: Option<Collection>,
    name: String,
    value: String,
) -> Result<()> {
    let payload = payload
        .as_mut()
        .ok_or_else(|| EzError::Serde("<item> outside <error>".into()))?;
    let collection =
        collection.ok_or_else(|| EzError::Serde("<item> outside a collection".into()))?;
    collection.of_mut(payload).push(name, value);
    Ok(())
}
