//! Reader and writer for the versioned `nvcx` collection document.
//! 版本化 `nvcx` 收藏文件的讀取與寫入。
//!
//! The document nests `<BOOK>` and `<SERIES>` elements in tree order
//! under a `<COLLECTION version="MAJOR.MINOR">` root. The writer emits
//! the structural XML only; the fixed declaration/DOCTYPE/stylesheet
//! header is prepended afterwards, together with a pass that removes
//! characters XML 1.0 forbids.

use std::io::Cursor;
use std::io::Write;
use std::path::{Path, PathBuf};

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::collection::CollectionError;
use crate::ids::NodeId;

/// File extension of collection files, without the dot.
pub const EXTENSION: &str = "nvcx";

/// Major format version this build reads and writes.
pub const MAJOR_VERSION: u32 = 1;

/// Minor format version this build reads and writes.
pub const MINOR_VERSION: u32 = 0;

/// Fixed header above the root element: XML declaration, DTD reference,
/// and stylesheet hint. The structural writer emits none of these.
pub const XML_HEADER: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<!DOCTYPE COLLECTION SYSTEM "nvcx_1_0.dtd">
<?xml-stylesheet href="collection.css" type="text/css"?>
"#;

/// Flat parse result, merged into the engine state by the caller.
#[derive(Debug, Default)]
pub(crate) struct ParsedCollection {
    pub items: Vec<ParsedItem>,
    /// True when the root carried no version attribute at all. Legacy
    /// files are accepted and rewritten in the current format.
    pub legacy: bool,
}

#[derive(Debug)]
pub(crate) enum ParsedItem {
    Book(ParsedBook),
    Series(ParsedSeries),
}

#[derive(Debug)]
pub(crate) struct ParsedBook {
    pub id: NodeId,
    pub title: Option<String>,
    pub desc: String,
    pub path: Option<PathBuf>,
}

#[derive(Debug)]
pub(crate) struct ParsedSeries {
    pub id: NodeId,
    pub title: Option<String>,
    pub desc: String,
    pub books: Vec<ParsedBook>,
}

/// Remove the control characters that XML 1.0 does not allow in text.
/// 移除 XML 1.0 不允許出現在文字中的控制字元。
pub fn strip_illegal_characters(text: &str) -> String {
    text.chars().filter(|ch| !is_illegal(*ch)).collect()
}

fn is_illegal(ch: char) -> bool {
    matches!(ch, '\u{0}'..='\u{8}' | '\u{b}' | '\u{c}' | '\u{e}'..='\u{1f}')
}

/// Parse a collection document. `path` is only used in error messages.
pub(crate) fn parse_collection(text: &str, path: &Path) -> Result<ParsedCollection, CollectionError> {
    let mut reader = Reader::from_str(text);
    let root = loop {
        match next_event(&mut reader, path)? {
            Event::Start(element) => break element,
            Event::Empty(element) => {
                // A childless root still carries the tag and version.
                check_root(&element, path)?;
                let legacy = read_version(&element, &reader, path)?.is_none();
                return Ok(ParsedCollection {
                    items: Vec::new(),
                    legacy,
                });
            }
            Event::Eof => {
                return Err(CollectionError::ParseXml {
                    path: path.to_path_buf(),
                    source: quick_xml::Error::UnexpectedEof("COLLECTION".to_string()),
                })
            }
            _ => {}
        }
    };
    check_root(&root, path)?;
    let legacy = read_version(&root, &reader, path)?.is_none();

    let mut items = Vec::new();
    loop {
        match next_event(&mut reader, path)? {
            Event::Start(element) => match element.name().as_ref() {
                b"BOOK" => items.push(ParsedItem::Book(parse_book(&mut reader, &element, path)?)),
                b"SERIES" => {
                    items.push(ParsedItem::Series(parse_series(&mut reader, &element, path)?))
                }
                _ => skip_element(&mut reader, &element, path)?,
            },
            Event::Empty(element) => match element.name().as_ref() {
                b"BOOK" => items.push(ParsedItem::Book(ParsedBook {
                    id: element_id(&element, &reader, path)?,
                    title: None,
                    desc: String::new(),
                    path: None,
                })),
                b"SERIES" => items.push(ParsedItem::Series(ParsedSeries {
                    id: element_id(&element, &reader, path)?,
                    title: None,
                    desc: String::new(),
                    books: Vec::new(),
                })),
                _ => {}
            },
            Event::End(element) if element.name().as_ref() == b"COLLECTION" => break,
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(ParsedCollection { items, legacy })
}

fn check_root(root: &BytesStart<'_>, path: &Path) -> Result<(), CollectionError> {
    if root.name().as_ref() != b"COLLECTION" {
        return Err(CollectionError::NoCollection {
            path: path.to_path_buf(),
        });
    }
    Ok(())
}

/// Read and gate the `version` attribute. `Ok(None)` marks a legacy
/// file without any version attribute.
fn read_version(
    root: &BytesStart<'_>,
    reader: &Reader<&[u8]>,
    path: &Path,
) -> Result<Option<(u32, u32)>, CollectionError> {
    let no_version = || CollectionError::NoVersion {
        path: path.to_path_buf(),
    };
    let attribute = match root.try_get_attribute("version") {
        Ok(Some(attribute)) => attribute,
        Ok(None) => return Ok(None),
        Err(_) => return Err(no_version()),
    };
    let raw = attribute
        .decode_and_unescape_value(reader)
        .map_err(|_| no_version())?;
    let (major, minor) = raw.split_once('.').ok_or_else(no_version)?;
    let major: u32 = major.parse().map_err(|_| no_version())?;
    let minor: u32 = minor.parse().map_err(|_| no_version())?;
    if major > MAJOR_VERSION {
        return Err(CollectionError::NewerFormat);
    }
    if major < MAJOR_VERSION {
        return Err(CollectionError::OutdatedFormat);
    }
    if minor > MINOR_VERSION {
        return Err(CollectionError::NewerMinorFormat);
    }
    Ok(Some((major, minor)))
}

fn parse_book(
    reader: &mut Reader<&[u8]>,
    start: &BytesStart<'_>,
    path: &Path,
) -> Result<ParsedBook, CollectionError> {
    let mut book = ParsedBook {
        id: element_id(start, reader, path)?,
        title: None,
        desc: String::new(),
        path: None,
    };
    loop {
        match next_event(reader, path)? {
            Event::Start(element) => match element.name().as_ref() {
                b"Title" => book.title = read_text(reader, b"Title", path)?,
                b"Desc" => book.desc = read_paragraphs(reader, path)?.join("\n"),
                b"Path" => book.path = read_text(reader, b"Path", path)?.map(PathBuf::from),
                _ => skip_element(reader, &element, path)?,
            },
            Event::End(element) if element.name().as_ref() == b"BOOK" => break,
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(book)
}

/// Parse a top-level series. Book elements at any depth below it count
/// as members; other nested containers contribute nothing themselves.
fn parse_series(
    reader: &mut Reader<&[u8]>,
    start: &BytesStart<'_>,
    path: &Path,
) -> Result<ParsedSeries, CollectionError> {
    let mut series = ParsedSeries {
        id: element_id(start, reader, path)?,
        title: None,
        desc: String::new(),
        books: Vec::new(),
    };
    let mut depth = 0usize;
    loop {
        match next_event(reader, path)? {
            Event::Start(element) => match element.name().as_ref() {
                b"Title" if depth == 0 => series.title = read_text(reader, b"Title", path)?,
                b"Desc" if depth == 0 => {
                    series.desc = read_paragraphs(reader, path)?.join("\n")
                }
                b"BOOK" => series.books.push(parse_book(reader, &element, path)?),
                _ => depth += 1,
            },
            Event::Empty(element) if element.name().as_ref() == b"BOOK" => {
                series.books.push(ParsedBook {
                    id: element_id(&element, reader, path)?,
                    title: None,
                    desc: String::new(),
                    path: None,
                });
            }
            Event::End(element) => {
                if depth == 0 {
                    if element.name().as_ref() == b"SERIES" {
                        break;
                    }
                } else {
                    depth -= 1;
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(series)
}

/// Concatenated text content of the current element, `None` when there
/// is none at all.
fn read_text(
    reader: &mut Reader<&[u8]>,
    tag: &[u8],
    path: &Path,
) -> Result<Option<String>, CollectionError> {
    let mut value: Option<String> = None;
    loop {
        match next_event(reader, path)? {
            Event::Text(text) => {
                let unescaped = text.unescape().map_err(|source| CollectionError::ParseXml {
                    path: path.to_path_buf(),
                    source,
                })?;
                match &mut value {
                    Some(existing) => existing.push_str(&unescaped),
                    None => value = Some(unescaped.into_owned()),
                }
            }
            Event::Start(element) => skip_element(reader, &element, path)?,
            Event::End(element) if element.name().as_ref() == tag => break,
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(value)
}

/// Non-empty `<p>` children of a `<Desc>` element, in order.
fn read_paragraphs(reader: &mut Reader<&[u8]>, path: &Path) -> Result<Vec<String>, CollectionError> {
    let mut paragraphs = Vec::new();
    loop {
        match next_event(reader, path)? {
            Event::Start(element) if element.name().as_ref() == b"p" => {
                if let Some(text) = read_text(reader, b"p", path)? {
                    if !text.is_empty() {
                        paragraphs.push(text);
                    }
                }
            }
            Event::Start(element) => skip_element(reader, &element, path)?,
            Event::End(element) if element.name().as_ref() == b"Desc" => break,
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(paragraphs)
}

fn skip_element(
    reader: &mut Reader<&[u8]>,
    element: &BytesStart<'_>,
    path: &Path,
) -> Result<(), CollectionError> {
    reader
        .read_to_end(element.name())
        .map(|_| ())
        .map_err(|source| CollectionError::ParseXml {
            path: path.to_path_buf(),
            source,
        })
}

fn element_id(
    element: &BytesStart<'_>,
    reader: &Reader<&[u8]>,
    path: &Path,
) -> Result<NodeId, CollectionError> {
    let attribute = element
        .try_get_attribute("id")
        .map_err(|source| CollectionError::ParseXml {
            path: path.to_path_buf(),
            source,
        })?
        .ok_or_else(|| CollectionError::MissingNodeId {
            path: path.to_path_buf(),
        })?;
    let raw = attribute
        .decode_and_unescape_value(reader)
        .map_err(|source| CollectionError::ParseXml {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(NodeId::new(raw.into_owned()))
}

fn next_event<'a>(
    reader: &mut Reader<&'a [u8]>,
    path: &Path,
) -> Result<Event<'a>, CollectionError> {
    reader.read_event().map_err(|source| CollectionError::ParseXml {
        path: path.to_path_buf(),
        source,
    })
}

/// Render the full document text: structural XML in tree order, illegal
/// characters removed, fixed header on top, one trailing newline.
pub(crate) fn render_collection(items: &[ParsedItem]) -> Result<String, quick_xml::Error> {
    let body = serialize_items(items)?;
    let mut text = String::with_capacity(XML_HEADER.len() + body.len() + 1);
    text.push_str(XML_HEADER);
    text.push_str(&strip_illegal_characters(&body));
    text.push('\n');
    Ok(text)
}

fn serialize_items(items: &[ParsedItem]) -> Result<String, quick_xml::Error> {
    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);
    let mut root = BytesStart::new("COLLECTION");
    let version = format!("{MAJOR_VERSION}.{MINOR_VERSION}");
    root.push_attribute(("version", version.as_str()));
    if items.is_empty() {
        writer.write_event(Event::Empty(root))?;
    } else {
        writer.write_event(Event::Start(root))?;
        for item in items {
            match item {
                ParsedItem::Book(book) => write_book(&mut writer, book)?,
                ParsedItem::Series(series) => write_series(&mut writer, series)?,
            }
        }
        writer.write_event(Event::End(BytesEnd::new("COLLECTION")))?;
    }
    let bytes = writer.into_inner().into_inner();
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn write_book<W: Write>(writer: &mut Writer<W>, book: &ParsedBook) -> Result<(), quick_xml::Error> {
    let mut start = BytesStart::new("BOOK");
    start.push_attribute(("id", book.id.as_str()));
    writer.write_event(Event::Start(start))?;
    write_title(writer, book.title.as_deref())?;
    write_desc(writer, &book.desc)?;
    if let Some(path) = &book.path {
        write_text_element(writer, "Path", &path.to_string_lossy())?;
    }
    writer.write_event(Event::End(BytesEnd::new("BOOK")))
}

fn write_series<W: Write>(
    writer: &mut Writer<W>,
    series: &ParsedSeries,
) -> Result<(), quick_xml::Error> {
    let mut start = BytesStart::new("SERIES");
    start.push_attribute(("id", series.id.as_str()));
    writer.write_event(Event::Start(start))?;
    write_title(writer, series.title.as_deref())?;
    write_desc(writer, &series.desc)?;
    for book in &series.books {
        write_book(writer, book)?;
    }
    writer.write_event(Event::End(BytesEnd::new("SERIES")))
}

/// The title element is always present; an empty title renders as
/// `<Title/>`.
fn write_title<W: Write>(writer: &mut Writer<W>, title: Option<&str>) -> Result<(), quick_xml::Error> {
    match title {
        Some(text) if !text.is_empty() => write_text_element(writer, "Title", text),
        _ => writer.write_event(Event::Empty(BytesStart::new("Title"))),
    }
}

/// One `<p>` per paragraph, split on newline and trimmed. Descriptions
/// without content are left out entirely.
fn write_desc<W: Write>(writer: &mut Writer<W>, desc: &str) -> Result<(), quick_xml::Error> {
    if desc.is_empty() {
        return Ok(());
    }
    writer.write_event(Event::Start(BytesStart::new("Desc")))?;
    for paragraph in desc.split('\n') {
        let trimmed = paragraph.trim();
        if trimmed.is_empty() {
            writer.write_event(Event::Empty(BytesStart::new("p")))?;
        } else {
            write_text_element(writer, "p", trimmed)?;
        }
    }
    writer.write_event(Event::End(BytesEnd::new("Desc")))
}

fn write_text_element<W: Write>(
    writer: &mut Writer<W>,
    tag: &str,
    text: &str,
) -> Result<(), quick_xml::Error> {
    writer.write_event(Event::Start(BytesStart::new(tag)))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(tag)))
}
