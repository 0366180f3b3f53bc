//! Source scanner: walks a C translation unit and pairs each export
//! annotation with the declaration that follows it.
//!
//! The walk is a single byte pass that understands line comments, block
//! comments, string/char literals, and preprocessor lines. Only ASCII
//! bytes participate in any structural test, so UTF-8 continuation bytes
//! (0x80–0xBF) can never be mistaken for a delimiter.

use crate::ctx;
use daemon_toolchain_diagnostics::{Diagnostic, Span, codes};

/// The marker that turns a comment into an export annotation.
const EXPORT_MARKER: &str = "@daemon:export";

/// One immutable source file handed to the pipeline.
#[derive(Debug, Clone)]
pub struct SourceUnit {
    /// Path the unit was read from (used in diagnostics and nothing else).
    pub path: String,
    /// Full file contents.
    pub text: String,
}

/// An export annotation paired with the declaration that follows it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotationBlock {
    /// Logical annotation content: comment markers stripped, body lines
    /// joined by single spaces. Always begins with `@daemon:export`.
    pub annotation: String,
    /// Byte span of the annotation comment within the unit.
    pub annotation_span: Span,
    /// The captured declaration text, up to and including the `)` that
    /// closes the parameter list (or a `;` for a non-function declaration).
    pub decl: String,
    /// Byte span of the captured declaration.
    pub decl_span: Span,
}

/// Scan one unit, producing its annotation blocks in source order.
///
/// `DANGLING_ANNOTATION` and `DOUBLE_ANNOTATION` are appended to `diags`;
/// both skip the affected annotation and resume scanning.
pub fn scan(unit: &SourceUnit, diags: &mut Vec<Diagnostic>) -> Vec<AnnotationBlock> {
    Scanner::new(unit).run(diags)
}

// ── Comment representation ──────────────────────────────────────────────

/// A single comment encountered during the code walk.
struct Comment {
    /// Logical content with markers stripped and lines joined.
    content: String,
    /// Byte span of the whole comment.
    span: Span,
    /// `true` for a `//` comment (joinable with following `//` lines).
    line_style: bool,
}

impl Comment {
    fn is_export(&self) -> bool {
        self.content == EXPORT_MARKER
            || self
                .content
                .strip_prefix(EXPORT_MARKER)
                .is_some_and(|rest| rest.starts_with(char::is_whitespace))
    }
}

// ── Scanner ─────────────────────────────────────────────────────────────

struct Scanner<'a> {
    unit: &'a SourceUnit,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn new(unit: &'a SourceUnit) -> Self {
        Self {
            unit,
            bytes: unit.text.as_bytes(),
            pos: 0,
        }
    }

    fn run(mut self, diags: &mut Vec<Diagnostic>) -> Vec<AnnotationBlock> {
        let mut blocks = Vec::new();
        while let Some(comment) = self.next_comment() {
            if !comment.is_export() {
                continue;
            }
            let (annotation, annotation_span) = self.join_continuation_lines(comment);
            if let Some(block) = self.capture_declaration(annotation, annotation_span, diags) {
                blocks.push(block);
            }
        }
        blocks
    }

    // ── Code walk ───────────────────────────────────────────────────────

    /// Advance through ordinary source until the next comment (or EOF).
    fn next_comment(&mut self) -> Option<Comment> {
        let mut at_bol = self.pos == 0 || self.bytes.get(self.pos.wrapping_sub(1)) == Some(&b'\n');
        while self.pos < self.bytes.len() {
            if at_bol && self.peek_preprocessor() {
                self.skip_preprocessor_line();
                continue;
            }
            let b = self.bytes[self.pos];
            match b {
                b'"' => {
                    self.skip_literal(b'"');
                    at_bol = false;
                }
                b'\'' => {
                    self.skip_literal(b'\'');
                    at_bol = false;
                }
                b'/' if self.bytes.get(self.pos + 1) == Some(&b'/') => {
                    return Some(self.read_line_comment());
                }
                b'/' if self.bytes.get(self.pos + 1) == Some(&b'*') => {
                    return Some(self.read_block_comment());
                }
                b'\n' => {
                    self.pos += 1;
                    at_bol = true;
                }
                _ => {
                    if !b.is_ascii_whitespace() {
                        at_bol = false;
                    }
                    self.pos += 1;
                }
            }
        }
        None
    }

    /// Whether the rest of the current line (from `pos`) starts a
    /// preprocessor directive. Only called at beginning-of-line.
    fn peek_preprocessor(&self) -> bool {
        let mut i = self.pos;
        while i < self.bytes.len() && (self.bytes[i] == b' ' || self.bytes[i] == b'\t') {
            i += 1;
        }
        self.bytes.get(i) == Some(&b'#')
    }

    /// Skip a preprocessor line, honoring `\` continuations. Annotations on
    /// such lines are treated as ordinary source and never recognized.
    fn skip_preprocessor_line(&mut self) {
        while self.pos < self.bytes.len() {
            let b = self.bytes[self.pos];
            self.pos += 1;
            if b == b'\n' {
                // A backslash directly before the newline continues the line.
                if self.pos >= 2 && self.bytes[self.pos - 2] == b'\\' {
                    continue;
                }
                return;
            }
        }
    }

    /// Skip a string or char literal delimited by `quote`.
    fn skip_literal(&mut self, quote: u8) {
        self.pos += 1;
        while self.pos < self.bytes.len() {
            match self.bytes[self.pos] {
                b'\\' => self.pos += 2,
                b if b == quote => {
                    self.pos += 1;
                    return;
                }
                b'\n' => return, // unterminated literal; resync at the newline
                _ => self.pos += 1,
            }
        }
    }

    // ── Comment reading ─────────────────────────────────────────────────

    /// Read a single `//` comment up to (not including) the newline.
    fn read_line_comment(&mut self) -> Comment {
        let start = self.pos;
        self.pos += 2;
        let body_start = self.pos;
        while self.pos < self.bytes.len() && self.bytes[self.pos] != b'\n' {
            self.pos += 1;
        }
        Comment {
            content: self.unit.text[body_start..self.pos].trim().to_string(),
            span: Span::new(start, self.pos),
            line_style: true,
        }
    }

    /// Read a `/* ... */` comment, joining its body lines with single
    /// spaces (a leading `*` per line is decorative and stripped).
    fn read_block_comment(&mut self) -> Comment {
        let start = self.pos;
        self.pos += 2;
        let body_start = self.pos;
        let body_end = loop {
            if self.pos + 1 >= self.bytes.len() {
                self.pos = self.bytes.len();
                break self.pos;
            }
            if self.bytes[self.pos] == b'*' && self.bytes[self.pos + 1] == b'/' {
                let end = self.pos;
                self.pos += 2;
                break end;
            }
            self.pos += 1;
        };
        let content = self.unit.text[body_start..body_end]
            .lines()
            .map(|line| line.trim().trim_start_matches('*').trim())
            .filter(|piece| !piece.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        Comment {
            content,
            span: Span::new(start, self.pos),
            line_style: false,
        }
    }

    /// Join the consecutive `//` lines that continue a line-style export
    /// annotation. Block-style annotations are already complete.
    fn join_continuation_lines(&mut self, comment: Comment) -> (String, Span) {
        let mut content = comment.content;
        let mut span = comment.span;
        if !comment.line_style {
            return (content, span);
        }
        loop {
            // The cursor sits on the newline terminating the previous line.
            let mut i = self.pos;
            if self.bytes.get(i) != Some(&b'\n') {
                break;
            }
            i += 1;
            while i < self.bytes.len() && (self.bytes[i] == b' ' || self.bytes[i] == b'\t') {
                i += 1;
            }
            if !(self.bytes.get(i) == Some(&b'/') && self.bytes.get(i + 1) == Some(&b'/')) {
                break;
            }
            self.pos = i;
            let next = self.read_line_comment();
            if !next.content.is_empty() {
                content.push(' ');
                content.push_str(&next.content);
            }
            span = Span::new(span.start, next.span.end);
        }
        (content, span)
    }

    // ── Declaration capture ─────────────────────────────────────────────

    /// Skip whitespace, preprocessor lines, and ordinary comments after an
    /// annotation, then capture the next declaration. A second export
    /// annotation found before the declaration is a `DOUBLE_ANNOTATION`.
    fn capture_declaration(
        &mut self,
        annotation: String,
        annotation_span: Span,
        diags: &mut Vec<Diagnostic>,
    ) -> Option<AnnotationBlock> {
        loop {
            // Whitespace and blank lines.
            while self.pos < self.bytes.len() && self.bytes[self.pos].is_ascii_whitespace() {
                self.pos += 1;
            }
            if self.pos >= self.bytes.len() {
                self.dangling(annotation_span, diags);
                return None;
            }
            // Anything starting with '#' here is a (possibly indented)
            // preprocessor line: the whitespace skip above already consumed
            // the newline in front of it.
            if self.bytes[self.pos] == b'#' {
                self.skip_preprocessor_line();
                continue;
            }
            let b = self.bytes[self.pos];
            if b == b'/' && self.bytes.get(self.pos + 1) == Some(&b'/') {
                let c = self.read_line_comment();
                if c.is_export() {
                    let (_, second_span) = self.join_continuation_lines(c);
                    diags.push(
                        Diagnostic::error(
                            codes::DOUBLE_ANNOTATION,
                            "declaration already carries an export annotation",
                            Some(second_span),
                        )
                        .with_path(self.unit.path.clone()),
                    );
                }
                continue;
            }
            if b == b'/' && self.bytes.get(self.pos + 1) == Some(&b'*') {
                let c = self.read_block_comment();
                if c.is_export() {
                    diags.push(
                        Diagnostic::error(
                            codes::DOUBLE_ANNOTATION,
                            "declaration already carries an export annotation",
                            Some(c.span),
                        )
                        .with_path(self.unit.path.clone()),
                    );
                }
                continue;
            }
            break;
        }

        let decl_start = self.pos;
        let mut depth = 0usize;
        let mut saw_paren = false;
        while self.pos < self.bytes.len() {
            match self.bytes[self.pos] {
                b'(' => {
                    saw_paren = true;
                    depth += 1;
                    self.pos += 1;
                }
                b')' => {
                    depth = depth.saturating_sub(1);
                    self.pos += 1;
                    if saw_paren && depth == 0 {
                        return Some(self.block(annotation, annotation_span, decl_start, self.pos));
                    }
                }
                b';' if !saw_paren => {
                    self.pos += 1;
                    return Some(self.block(annotation, annotation_span, decl_start, self.pos));
                }
                b'{' if depth == 0 => {
                    // Body reached before the signature ended; hand what we
                    // have to the resolver.
                    return Some(self.block(annotation, annotation_span, decl_start, self.pos));
                }
                _ => self.pos += 1,
            }
        }
        self.dangling(annotation_span, diags);
        None
    }

    fn block(
        &self,
        annotation: String,
        annotation_span: Span,
        decl_start: usize,
        decl_end: usize,
    ) -> AnnotationBlock {
        AnnotationBlock {
            annotation,
            annotation_span,
            decl: self.unit.text[decl_start..decl_end].trim().to_string(),
            decl_span: Span::new(decl_start, decl_end),
        }
    }

    fn dangling(&self, annotation_span: Span, diags: &mut Vec<Diagnostic>) {
        diags.push(
            Diagnostic::error(
                codes::DANGLING_ANNOTATION,
                "export annotation is not followed by a declaration",
                Some(annotation_span),
            )
            .with_path(self.unit.path.clone())
            .with_context(ctx!("marker" => EXPORT_MARKER)),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(text: &str) -> SourceUnit {
        SourceUnit {
            path: "main.c".into(),
            text: text.into(),
        }
    }

    fn scan_ok(text: &str) -> Vec<AnnotationBlock> {
        let mut diags = Vec::new();
        let blocks = scan(&unit(text), &mut diags);
        assert!(diags.is_empty(), "unexpected diagnostics: {diags:?}");
        blocks
    }

    #[test]
    fn single_annotation_and_declaration() {
        let src = "// @daemon:export token=FWD desc=\"Move\" args=\"\" safety=\"rate_hz=10,watchdog_ms=500,clamp=true\"\nvoid move_forward(int speed) {\n}\n";
        let blocks = scan_ok(src);
        assert_eq!(blocks.len(), 1);
        assert!(blocks[0].annotation.starts_with("@daemon:export token=FWD"));
        assert_eq!(blocks[0].decl, "void move_forward(int speed)");
    }

    #[test]
    fn ordinary_comments_ignored() {
        let src = "// Telemetry keys (future): grip_state\n// @daemon:export token=G desc=\"d\" args=\"\" safety=\"s\"\nvoid set_grip(const char *state);\n";
        let blocks = scan_ok(src);
        assert_eq!(blocks.len(), 1);
        assert!(blocks[0].annotation.starts_with("@daemon:export token=G"));
        assert_eq!(blocks[0].decl, "void set_grip(const char *state)");
    }

    #[test]
    fn multiple_annotations_in_source_order() {
        let src = "\
// @daemon:export token=L desc=\"Left\" args=\"\" safety=\"x\"
void move_left(int i) {}

// @daemon:export token=R desc=\"Right\" args=\"\" safety=\"x\"
void move_right(int i) {}
";
        let blocks = scan_ok(src);
        let tokens: Vec<&str> = blocks
            .iter()
            .map(|b| {
                b.annotation
                    .split_whitespace()
                    .nth(1)
                    .unwrap()
                    .strip_prefix("token=")
                    .unwrap()
            })
            .collect();
        assert_eq!(tokens, ["L", "R"]);
    }

    #[test]
    fn continuation_lines_joined_with_single_spaces() {
        let src = "\
// @daemon:export token=FWD
//   desc=\"Move forward\"
//   args=\"speed:float[0..1]\"
void fwd(float speed);
";
        let blocks = scan_ok(src);
        assert_eq!(
            blocks[0].annotation,
            "@daemon:export token=FWD desc=\"Move forward\" args=\"speed:float[0..1]\""
        );
    }

    #[test]
    fn blank_line_ends_continuation_run() {
        let src = "\
// @daemon:export token=A desc=\"d\" args=\"\" safety=\"s\"

// just a note, not part of the annotation
void a(void);
";
        let blocks = scan_ok(src);
        assert_eq!(
            blocks[0].annotation,
            "@daemon:export token=A desc=\"d\" args=\"\" safety=\"s\""
        );
        assert_eq!(blocks[0].decl, "void a(void)");
    }

    #[test]
    fn block_comment_annotation() {
        let src = "/* @daemon:export token=A desc=\"d\" args=\"\" safety=\"s\" */\nvoid a(void);\n";
        let blocks = scan_ok(src);
        assert_eq!(
            blocks[0].annotation,
            "@daemon:export token=A desc=\"d\" args=\"\" safety=\"s\""
        );
    }

    #[test]
    fn multiline_block_comment_annotation() {
        let src = "\
/*
 * @daemon:export token=A
 * desc=\"d\" args=\"\" safety=\"s\"
 */
void a(void);
";
        let blocks = scan_ok(src);
        assert_eq!(
            blocks[0].annotation,
            "@daemon:export token=A desc=\"d\" args=\"\" safety=\"s\""
        );
    }

    #[test]
    fn marker_in_string_literal_is_ordinary_source() {
        let src = "const char *s = \"// @daemon:export token=X\";\nint main(void) { return 0; }\n";
        assert!(scan_ok(src).is_empty());
    }

    #[test]
    fn marker_on_preprocessor_line_ignored() {
        let src = "#define NOTE // @daemon:export token=X desc=\"d\" args=\"\" safety=\"s\"\nint main(void) { return 0; }\n";
        assert!(scan_ok(src).is_empty());
    }

    #[test]
    fn preprocessor_between_annotation_and_decl_skipped() {
        let src = "\
// @daemon:export token=A desc=\"d\" args=\"\" safety=\"s\"
#ifdef FEATURE_A
void a(int x);
";
        let blocks = scan_ok(src);
        assert_eq!(blocks[0].decl, "void a(int x)");
    }

    #[test]
    fn dangling_annotation_at_eof() {
        let src = "// @daemon:export token=A desc=\"d\" args=\"\" safety=\"s\"\n";
        let mut diags = Vec::new();
        let blocks = scan(&unit(src), &mut diags);
        assert!(blocks.is_empty());
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].id, codes::DANGLING_ANNOTATION);
        assert_eq!(diags[0].path.as_deref(), Some("main.c"));
    }

    #[test]
    fn double_annotation_reported_at_second_site() {
        let src = "\
// @daemon:export token=A desc=\"d\" args=\"\" safety=\"s\"

// @daemon:export token=B desc=\"d\" args=\"\" safety=\"s\"
void a(void);
";
        let mut diags = Vec::new();
        let blocks = scan(&unit(src), &mut diags);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].id, codes::DOUBLE_ANNOTATION);
        // The first annotation stays attached to the declaration.
        assert_eq!(blocks.len(), 1);
        assert!(blocks[0].annotation.contains("token=A"));
        let second_span = diags[0].span.unwrap();
        assert!(second_span.start > blocks[0].annotation_span.end);
    }

    #[test]
    fn forward_declaration_captured_to_closing_paren() {
        let src = "// @daemon:export token=A desc=\"d\" args=\"\" safety=\"s\"\nvoid mc_set_drive(int16_t throttle, int16_t steering);\n";
        let blocks = scan_ok(src);
        assert_eq!(
            blocks[0].decl,
            "void mc_set_drive(int16_t throttle, int16_t steering)"
        );
    }

    #[test]
    fn non_function_declaration_captured_to_semicolon() {
        let src = "// @daemon:export token=A desc=\"d\" args=\"\" safety=\"s\"\nint g_state;\n";
        let blocks = scan_ok(src);
        assert_eq!(blocks[0].decl, "int g_state;");
    }

    #[test]
    fn spans_cover_annotation_and_declaration() {
        let src = "// @daemon:export token=A desc=\"d\" args=\"\" safety=\"s\"\nvoid a(void);\n";
        let blocks = scan_ok(src);
        let b = &blocks[0];
        assert_eq!(b.annotation_span.start, 0);
        assert_eq!(&src[b.decl_span.start..b.decl_span.end], "void a(void)");
    }
}
