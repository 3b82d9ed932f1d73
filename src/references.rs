use std::fmt::Display;

use serde::Serialize;

use crate::ast::{Child, NodeKind, SyntaxNode};
use crate::error::{Error, Result};
use crate::parser::{DremioSqlParser, SqlParser};
use crate::scanner::keyword;

/// A referenced table or view, as its path of identifiers (e.g. space, folder, table).
///
/// Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct TableReference(Vec<String>);

impl TableReference {
    pub fn new(segments: Vec<String>) -> Option<Self> {
        if segments.is_empty() {
            None
        } else {
            Some(Self(segments))
        }
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn into_segments(self) -> Vec<String> {
        self.0
    }
}

impl Display for TableReference {
    /// Renders the qualified name, quoting the segments that are not plain identifiers
    /// or that are reserved keywords.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = self
            .0
            .iter()
            .map(|segment| {
                let plain = segment
                    .chars()
                    .next()
                    .is_some_and(|c| c.is_alphabetic() || c == '_')
                    && segment
                        .chars()
                        .all(|c| c.is_alphanumeric() || c == '_' || c == '$')
                    && keyword(segment).is_none();
                if plain {
                    segment.clone()
                } else {
                    format!("\"{}\"", segment.replace('"', "\"\""))
                }
            })
            .collect::<Vec<String>>()
            .join(".");
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LexState {
    SegmentStart,
    InSegment,
    InQuotedSegment,
    AfterQuotedSegment,
}

/// Splits a table-factor payload such as `"my space".folder."v1.2"` into its segments.
///
/// Dots inside double quotes are literal, `""` inside quotes is a literal quote.
/// Empty segments, unterminated quotes and stray characters after a closing quote
/// are reported as [`Error::Extraction`].
pub fn split_qualified_name(payload: &str) -> Result<TableReference> {
    let defect =
        |reason: &str| Error::Extraction(format!("{} in table name `{}`", reason, payload));

    let mut segments = vec![];
    let mut segment = String::new();
    let mut state = LexState::SegmentStart;
    let mut chars = payload.chars().peekable();

    while let Some(c) = chars.next() {
        state = match (state, c) {
            (LexState::SegmentStart, '"') => LexState::InQuotedSegment,
            (LexState::SegmentStart, '.') => return Err(defect("empty segment")),
            (LexState::SegmentStart, c) => {
                segment.push(c);
                LexState::InSegment
            }
            (LexState::InSegment, '.') => {
                segments.push(std::mem::take(&mut segment));
                LexState::SegmentStart
            }
            (LexState::InSegment, c) => {
                segment.push(c);
                LexState::InSegment
            }
            (LexState::InQuotedSegment, '"') => {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    segment.push('"');
                    LexState::InQuotedSegment
                } else if segment.is_empty() {
                    return Err(defect("empty quoted segment"));
                } else {
                    segments.push(std::mem::take(&mut segment));
                    LexState::AfterQuotedSegment
                }
            }
            (LexState::InQuotedSegment, c) => {
                segment.push(c);
                LexState::InQuotedSegment
            }
            (LexState::AfterQuotedSegment, '.') => LexState::SegmentStart,
            (LexState::AfterQuotedSegment, c) => {
                return Err(defect(&format!("unexpected `{}` after quoted segment", c)));
            }
        };
    }

    match state {
        LexState::InSegment => segments.push(segment),
        LexState::AfterQuotedSegment => {}
        LexState::InQuotedSegment => return Err(defect("unterminated quoted segment")),
        LexState::SegmentStart if payload.is_empty() => return Err(defect("empty name")),
        LexState::SegmentStart => return Err(defect("trailing `.`")),
    }

    TableReference::new(segments).ok_or_else(|| defect("no segments"))
}

/// Finds every table referenced by a SQL statement, without executing it.
#[derive(Debug, Clone, Default)]
pub struct TableReferenceExtractor<P = DremioSqlParser> {
    parser: P,
}

impl<P: SqlParser> TableReferenceExtractor<P> {
    pub fn new(parser: P) -> Self {
        Self { parser }
    }

    pub fn extract(&self, sql: &str) -> Result<Vec<TableReference>> {
        let tree = self.parser.parse(sql)?;
        table_references(&tree)
    }
}

pub fn extract_table_references(sql: &str) -> Result<Vec<TableReference>> {
    TableReferenceExtractor::new(DremioSqlParser).extract(sql)
}

/// References found in an already parsed tree, in depth-first order.
pub fn table_references(root: &SyntaxNode) -> Result<Vec<TableReference>> {
    let mut references = vec![];
    collect_references(root, &mut references)?;
    Ok(references)
}

fn collect_references(node: &SyntaxNode, references: &mut Vec<TableReference>) -> Result<()> {
    if node.kind == NodeKind::TableFactor {
        let payload = node
            .text()
            .ok_or_else(|| Error::Extraction(format!("table factor without a name: {:?}", node)))?;
        let reference = split_qualified_name(payload)?;
        log::debug!("Found table reference {}", reference);
        references.push(reference);
        return Ok(());
    }

    for child in node.children.values() {
        match child {
            Child::Node(child) => collect_references(child, references)?,
            Child::Nodes(children) => {
                for child in children {
                    collect_references(child, references)?;
                }
            }
            Child::Scalar(_) => {}
        }
    }
    Ok(())
}
