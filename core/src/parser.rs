//! Decodes the service's XML replies into positional fields.
//!
//! # Design
//! Every reply is a small document whose root element names its shape:
//!
//! | root      | fields                                     |
//! |-----------|--------------------------------------------|
//! | `error`   | `["-1", text, status attribute]`           |
//! | `job`     | `[id attribute, <challenge> or <response>]`|
//! | `success` | `[text]`                                   |
//! | `user`    | `["0", <credits>]`                         |
//! | `queue`   | `[<position>, <length>, <eta>]`            |
//!
//! Field meaning is positional and operation-specific, so the result is a
//! fixed-width vector sized to the issuing operation (the `error` shape is
//! always three wide). Documents that do not fit a shape are rejected with a
//! `ParseError`; a partially filled result never escapes this module.

use roxmltree::{Document, Node};

/// Root element names understood by the parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootElement {
    Error,
    Job,
    Success,
    User,
    Queue,
}

impl RootElement {
    fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "error" => Some(RootElement::Error),
            "job" => Some(RootElement::Job),
            "success" => Some(RootElement::Success),
            "user" => Some(RootElement::User),
            "queue" => Some(RootElement::Queue),
            _ => None,
        }
    }

    pub fn tag(self) -> &'static str {
        match self {
            RootElement::Error => "error",
            RootElement::Job => "job",
            RootElement::Success => "success",
            RootElement::User => "user",
            RootElement::Queue => "queue",
        }
    }
}

/// Why a reply could not be turned into fields.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("malformed XML response: {0}")]
    Malformed(String),

    #[error("unexpected root element <{0}>")]
    UnexpectedRoot(String),

    #[error("<{root}> is missing the `{name}` attribute")]
    MissingAttribute { root: &'static str, name: &'static str },

    #[error("<{root}> has no <{child}> element")]
    MissingElement { root: &'static str, child: &'static str },

    #[error("response field {0} is not set")]
    MissingField(usize),

    #[error("response field {index} is not an integer: {value:?}")]
    NotAnInteger { index: usize, value: String },
}

/// Positional fields decoded from one reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedResponse {
    root: RootElement,
    fields: Vec<Option<String>>,
}

impl ParsedResponse {
    pub fn root(&self) -> RootElement {
        self.root
    }

    pub fn fields(&self) -> &[Option<String>] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// The raw slot, `None` when unset or out of range.
    pub fn get(&self, index: usize) -> Option<&str> {
        self.fields.get(index).and_then(|f| f.as_deref())
    }

    pub fn field(&self, index: usize) -> Result<&str, ParseError> {
        self.get(index).ok_or(ParseError::MissingField(index))
    }

    pub fn int_field(&self, index: usize) -> Result<i64, ParseError> {
        let value = self.field(index)?;
        value.parse().map_err(|_| ParseError::NotAnInteger {
            index,
            value: value.to_string(),
        })
    }

    /// The service signals failure with `-1` in the first slot.
    pub fn is_failure(&self) -> bool {
        self.get(0) == Some("-1")
    }
}

/// Parse a reply body for an operation expecting `field_count` fields.
pub fn parse_response(body: &[u8], field_count: usize) -> Result<ParsedResponse, ParseError> {
    let text = std::str::from_utf8(body).map_err(|e| ParseError::Malformed(e.to_string()))?;
    let doc = Document::parse(text).map_err(|e| ParseError::Malformed(e.to_string()))?;
    let elem = doc.root_element();
    let tag = elem.tag_name().name();
    let root = RootElement::from_tag(tag).ok_or_else(|| ParseError::UnexpectedRoot(tag.to_string()))?;

    let mut fields = match root {
        RootElement::Error => {
            return Ok(ParsedResponse {
                root,
                fields: vec![
                    Some("-1".to_string()),
                    Some(text_content(elem)),
                    elem.attribute("status").map(str::to_string),
                ],
            });
        }
        RootElement::Job => {
            let id = elem.attribute("id").ok_or(ParseError::MissingAttribute {
                root: "job",
                name: "id",
            })?;
            // <response> is read after <challenge> and wins when both exist.
            let payload = find(elem, "response")
                .or_else(|| find(elem, "challenge"))
                .map(text_content);
            vec![Some(id.to_string()), payload]
        }
        RootElement::Success => vec![Some(text_content(elem))],
        RootElement::User => vec![Some("0".to_string()), Some(required(elem, root, "credits")?)],
        RootElement::Queue => vec![
            Some(required(elem, root, "position")?),
            Some(required(elem, root, "length")?),
            Some(required(elem, root, "eta")?),
        ],
    };
    if fields.len() < field_count {
        fields.resize(field_count, None);
    }
    Ok(ParsedResponse { root, fields })
}

fn find<'a, 'input>(elem: Node<'a, 'input>, tag: &str) -> Option<Node<'a, 'input>> {
    elem.descendants().skip(1).find(|n| n.has_tag_name(tag))
}

fn required(elem: Node<'_, '_>, root: RootElement, child: &'static str) -> Result<String, ParseError> {
    find(elem, child)
        .map(text_content)
        .ok_or(ParseError::MissingElement {
            root: root.tag(),
            child,
        })
}

/// Concatenated text of every descendant text node, trimmed.
fn text_content(node: Node<'_, '_>) -> String {
    let text: String = node
        .descendants()
        .filter(|n| n.is_text())
        .filter_map(|n| n.text())
        .collect();
    text.trim().to_string()
}
