//! Directive protocol spoken by the assistant.
//!
//! The model answers in free text. File mutations are embedded as marker
//! lines followed by a body:
//!
//! ```text
//! @@edit:src/main.py@@
//! <full new content>
//! @@create:notes.md@@
//! <content>
//! @@log@@
//! <message for the activity log>
//! ```
//!
//! A body runs from the newline after its marker to the next valid marker or
//! end of input, and is trimmed. Anything that is not a valid marker is prose.
//! Prose before the first marker belongs to nothing; prose inside a body is
//! part of that body. Parsing never fails: text without markers is an empty
//! [`DirectiveSet`], which means "nothing to do".

use std::fmt;

use serde::{Deserialize, Serialize};

const DELIM: &str = "@@";
const EDIT_HEAD: &str = "edit:";
const CREATE_HEAD: &str = "create:";
const LOG_HEAD: &str = "log@@";

/// A typed instruction extracted from assistant text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Directive {
    /// Replace the content of an existing or new file.
    Edit { path: String, content: String },
    /// Introduce a file. Same effect as `Edit`, kept apart for the log.
    Create { path: String, content: String },
    /// Free text for the activity log.
    Log { message: String },
}

impl Directive {
    pub fn edit(path: impl Into<String>, content: impl Into<String>) -> Self {
        Directive::Edit {
            path: path.into(),
            content: content.into(),
        }
    }

    pub fn create(path: impl Into<String>, content: impl Into<String>) -> Self {
        Directive::Create {
            path: path.into(),
            content: content.into(),
        }
    }

    pub fn log(message: impl Into<String>) -> Self {
        Directive::Log {
            message: message.into(),
        }
    }

    /// Target path for file-writing directives.
    pub fn path(&self) -> Option<&str> {
        match self {
            Directive::Edit { path, .. } | Directive::Create { path, .. } => Some(path),
            Directive::Log { .. } => None,
        }
    }

    /// `(path, content)` for file-writing directives.
    pub fn as_write(&self) -> Option<(&str, &str)> {
        match self {
            Directive::Edit { path, content } | Directive::Create { path, content } => {
                Some((path, content))
            }
            Directive::Log { .. } => None,
        }
    }

    pub fn verb(&self) -> &'static str {
        match self {
            Directive::Edit { .. } => "edit",
            Directive::Create { .. } => "create",
            Directive::Log { .. } => "log",
        }
    }
}

/// Parser output: every directive in appearance order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectiveSet {
    directives: Vec<Directive>,
}

impl DirectiveSet {
    pub fn new(directives: Vec<Directive>) -> Self {
        Self { directives }
    }

    pub fn is_empty(&self) -> bool {
        self.directives.is_empty()
    }

    pub fn len(&self) -> usize {
        self.directives.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Directive> {
        self.directives.iter()
    }

    /// Edit directives as `(path, content)`, in appearance order.
    pub fn edits(&self) -> impl Iterator<Item = (&str, &str)> {
        self.directives.iter().filter_map(|d| match d {
            Directive::Edit { path, content } => Some((path.as_str(), content.as_str())),
            _ => None,
        })
    }

    /// Create directives as `(path, content)`, in appearance order.
    pub fn creates(&self) -> impl Iterator<Item = (&str, &str)> {
        self.directives.iter().filter_map(|d| match d {
            Directive::Create { path, content } => Some((path.as_str(), content.as_str())),
            _ => None,
        })
    }

    /// Edit and Create directives interleaved in appearance order. This is the
    /// order they are applied in, so the last mention of a path wins.
    pub fn mutations(&self) -> impl Iterator<Item = &Directive> {
        self.directives.iter().filter(|d| d.path().is_some())
    }

    /// Body of the first log block, if any.
    pub fn log(&self) -> Option<&str> {
        self.directives.iter().find_map(|d| match d {
            Directive::Log { message } => Some(message.as_str()),
            _ => None,
        })
    }

    /// Serialize back into marker text that [`parse`] reads.
    ///
    /// Round-trips exactly when paths are valid marker paths and contents are
    /// already trimmed and free of marker sequences.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (i, directive) in self.directives.iter().enumerate() {
            if i > 0 {
                out.push_str("\n\n");
            }
            match directive {
                Directive::Edit { path, content } | Directive::Create { path, content } => {
                    out.push_str(DELIM);
                    out.push_str(directive.verb());
                    out.push(':');
                    out.push_str(path);
                    out.push_str(DELIM);
                    out.push('\n');
                    out.push_str(content);
                }
                Directive::Log { message } => {
                    out.push_str(DELIM);
                    out.push_str(LOG_HEAD);
                    out.push('\n');
                    out.push_str(message);
                }
            }
        }
        out
    }
}

impl fmt::Display for DirectiveSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

impl FromIterator<Directive> for DirectiveSet {
    fn from_iter<I: IntoIterator<Item = Directive>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a DirectiveSet {
    type Item = &'a Directive;
    type IntoIter = std::slice::Iter<'a, Directive>;

    fn into_iter(self) -> Self::IntoIter {
        self.directives.iter()
    }
}

/// What a marker opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Head<'a> {
    Edit(&'a str),
    Create(&'a str),
    Log,
}

impl<'a> Head<'a> {
    fn finish(self, body: &str) -> Directive {
        let body = body.trim();
        match self {
            Head::Edit(path) => Directive::edit(path, body),
            Head::Create(path) => Directive::create(path, body),
            Head::Log => Directive::log(body),
        }
    }
}

/// A recognized marker: what it opens and where its body starts.
struct Marker<'a> {
    head: Head<'a>,
    body_start: usize,
}

enum ScanState<'a> {
    SeekingMarker,
    ConsumingBody { head: Head<'a>, body_start: usize },
}

/// Scan assistant text for directive blocks.
pub fn parse(text: &str) -> DirectiveSet {
    let mut directives = Vec::new();
    let mut state = ScanState::SeekingMarker;
    let mut cursor = 0;

    while let Some(offset) = text[cursor..].find(DELIM) {
        let at = cursor + offset;
        let Some(marker) = marker_at(text, at) else {
            // '@' is ASCII, so at + 1 is a char boundary.
            cursor = at + 1;
            continue;
        };

        if let ScanState::ConsumingBody { head, body_start } = state {
            directives.push(head.finish(&text[body_start..at]));
        }
        state = ScanState::ConsumingBody {
            head: marker.head,
            body_start: marker.body_start,
        };
        cursor = marker.body_start;
    }

    if let ScanState::ConsumingBody { head, body_start } = state {
        directives.push(head.finish(&text[body_start..]));
    }

    DirectiveSet::new(directives)
}

/// Try to read a marker whose opening `@@` sits at byte offset `at`.
fn marker_at(text: &str, at: usize) -> Option<Marker<'_>> {
    let head_start = at + DELIM.len();
    let rest = &text[head_start..];

    let (head, marker_end) = if rest.starts_with(LOG_HEAD) {
        (Head::Log, head_start + LOG_HEAD.len())
    } else if let Some(after) = rest.strip_prefix(EDIT_HEAD) {
        let (path, len) = marker_path(after)?;
        (Head::Edit(path), head_start + EDIT_HEAD.len() + len)
    } else if let Some(after) = rest.strip_prefix(CREATE_HEAD) {
        let (path, len) = marker_path(after)?;
        (Head::Create(path), head_start + CREATE_HEAD.len() + len)
    } else {
        return None;
    };

    let after = &text[marker_end..];
    let newline = if after.starts_with('\n') {
        1
    } else if after.starts_with("\r\n") {
        2
    } else {
        return None;
    };

    Some(Marker {
        head,
        body_start: marker_end + newline,
    })
}

/// Path text up to the closing `@@`, plus the byte length consumed including
/// the delimiter. Empty paths and paths spanning lines are not markers.
fn marker_path(after_colon: &str) -> Option<(&str, usize)> {
    let close = after_colon.find(DELIM)?;
    let path = &after_colon[..close];
    if path.is_empty() || path.contains(['\n', '\r']) {
        return None;
    }
    Some((path, close + DELIM.len()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn writes<'a>(it: impl Iterator<Item = (&'a str, &'a str)>) -> Vec<(String, String)> {
        it.map(|(p, c)| (p.to_string(), c.to_string())).collect()
    }

    #[test]
    fn text_without_markers_is_empty() {
        for text in [
            "",
            "Sure! Here is what I would do.",
            "email me at a@@b.com",
            "@@ @@ @@@@",
        ] {
            let set = parse(text);
            assert!(set.is_empty(), "expected empty for {:?}", text);
            assert_eq!(set.edits().count(), 0);
            assert_eq!(set.creates().count(), 0);
            assert_eq!(set.log(), None);
        }
    }

    #[test]
    fn parses_all_three_kinds_in_order() {
        let text = "@@edit:main.py@@\nprint('hi')\n\n@@create:lib/util.py@@\ndef f():\n    pass\n@@log@@\nAdded util.\n";
        let set = parse(text);

        assert_eq!(
            set.iter().cloned().collect::<Vec<_>>(),
            vec![
                Directive::edit("main.py", "print('hi')"),
                Directive::create("lib/util.py", "def f():\n    pass"),
                Directive::log("Added util."),
            ]
        );
        assert_eq!(set.log(), Some("Added util."));
    }

    #[test]
    fn body_runs_to_end_of_input() {
        let set = parse("@@create:new.py@@\nhello");
        assert_eq!(
            writes(set.creates()),
            vec![("new.py".to_string(), "hello".to_string())]
        );
    }

    #[test]
    fn bodies_are_trimmed_but_inner_whitespace_kept() {
        let set = parse("@@edit:a.py@@\n\n   def f():\n       return 1   \n\n");
        assert_eq!(
            writes(set.edits()),
            vec![("a.py".to_string(), "def f():\n       return 1".to_string())]
        );
    }

    #[test]
    fn prose_before_first_marker_is_ignored() {
        let set = parse("Here you go:\n\n@@edit:a.py@@\nX");
        assert_eq!(set.len(), 1);
        assert_eq!(writes(set.edits()), vec![("a.py".to_string(), "X".to_string())]);
    }

    #[test]
    fn repeated_paths_keep_appearance_order() {
        let set = parse("@@edit:a.py@@\nX\n@@edit:a.py@@\nY");
        assert_eq!(
            writes(set.edits()),
            vec![
                ("a.py".to_string(), "X".to_string()),
                ("a.py".to_string(), "Y".to_string())
            ]
        );
    }

    #[test]
    fn mutations_interleave_edits_and_creates() {
        let set = parse("@@create:a@@\n1\n@@log@@\nm\n@@edit:a@@\n2\n@@create:b@@\n3");
        let order: Vec<(&str, &str)> = set.mutations().map(|d| (d.verb(), d.path().unwrap())).collect();
        assert_eq!(order, vec![("create", "a"), ("edit", "a"), ("create", "b")]);
    }

    #[test]
    fn only_first_log_is_reported() {
        let set = parse("@@log@@\nfirst\n@@log@@\nsecond");
        assert_eq!(set.log(), Some("first"));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn marker_without_path_is_prose() {
        let set = parse("@@edit@@\nignored\n@@edit:@@\nalso ignored");
        assert!(set.is_empty());
    }

    #[test]
    fn malformed_marker_inside_body_stays_in_body() {
        let set = parse("@@edit:a.py@@\nx = '@@edit@@'\ny = 1");
        assert_eq!(
            writes(set.edits()),
            vec![("a.py".to_string(), "x = '@@edit@@'\ny = 1".to_string())]
        );
    }

    #[test]
    fn marker_must_be_followed_by_newline() {
        let set = parse("@@edit:a.py@@ inline\n@@log@@done");
        assert!(set.is_empty());

        let set = parse("@@edit:a@@b@@\ncontent");
        assert!(set.is_empty(), "path text ends at the first @@");
    }

    #[test]
    fn markers_are_case_sensitive() {
        assert!(parse("@@EDIT:a.py@@\nX\n@@Log@@\nY").is_empty());
    }

    #[test]
    fn path_cannot_span_lines() {
        let set = parse("@@edit:a\nb@@\nX");
        assert!(set.is_empty());
    }

    #[test]
    fn crlf_after_marker_is_accepted() {
        let set = parse("@@edit:win.txt@@\r\nline one\r\n@@log@@\r\nok\r\n");
        assert_eq!(
            writes(set.edits()),
            vec![("win.txt".to_string(), "line one".to_string())]
        );
        assert_eq!(set.log(), Some("ok"));
    }

    #[test]
    fn paths_are_taken_verbatim() {
        let set = parse("@@create: spaced name.txt @@\nx\n@@edit:../up/ü.rs@@\ny");
        let paths: Vec<&str> = set.mutations().filter_map(Directive::path).collect();
        assert_eq!(paths, vec![" spaced name.txt ", "../up/ü.rs"]);
    }

    #[test]
    fn adjacent_delimiters_before_marker_are_skipped() {
        let set = parse("@@@edit:a@@\nX");
        assert_eq!(writes(set.edits()), vec![("a".to_string(), "X".to_string())]);
    }

    #[test]
    fn empty_body_is_empty_content() {
        let set = parse("@@create:empty.py@@\n@@log@@\n");
        assert_eq!(
            writes(set.creates()),
            vec![("empty.py".to_string(), String::new())]
        );
        assert_eq!(set.log(), Some(""));
    }

    #[test]
    fn rendered_set_parses_back_identically() {
        let sets = vec![
            DirectiveSet::default(),
            DirectiveSet::new(vec![Directive::log("only a log")]),
            DirectiveSet::new(vec![
                Directive::create("app.js", "const x = 1;\nconsole.log(x);"),
                Directive::edit("main.py", "print(1)"),
                Directive::log("two files"),
                Directive::edit("main.py", "print(2)"),
                Directive::create("empty.txt", ""),
                Directive::log("second log"),
            ]),
        ];

        for set in sets {
            let text = set.render();
            assert_eq!(parse(&text), set, "round trip failed for:\n{}", text);
            assert_eq!(set.to_string(), text);
        }
    }

    #[test]
    fn directive_serializes_with_kind_tag() {
        let json = serde_json::to_value(Directive::edit("a.py", "x")).unwrap();
        assert_eq!(json, serde_json::json!({ "kind": "edit", "path": "a.py", "content": "x" }));
    }
}
