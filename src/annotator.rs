//! Step Annotator
//!
//! Source-level pass that finds suspend statements (`yield <expr>` on a line
//! of its own) and rewrites each one so the program also reports which line
//! it paused on. Matching and numbering happen in the same traversal, so a
//! line number can never be paired with the wrong statement.
//!
//! ```
//! use robosim::annotator::{StepAnnotator, SuspendSyntax};
//!
//! let annotator = StepAnnotator::new(SuspendSyntax::lua()).unwrap();
//! let out = annotator.annotate("function main()\n  yield 0.5 -- wait\nend\n");
//! assert_eq!(out.source, "function main()\n  coroutine.yield(2, 0.5) -- wait\nend\n");
//! ```

use regex::{Captures, Regex};

use crate::error::Result;

/// How suspend statements look in a control language and what they become
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuspendSyntax {
    /// Statement keyword, e.g. `yield`
    pub keyword: String,
    /// Line comment introducer, e.g. `--`
    pub line_comment: String,
    /// Callable the rewritten statement invokes with `(line, expr)`
    pub suspend_call: String,
}

impl SuspendSyntax {
    /// Lua control programs: `yield <expr>` becomes `coroutine.yield(<line>, <expr>)`
    pub fn lua() -> Self {
        Self {
            keyword: "yield".to_string(),
            line_comment: "--".to_string(),
            suspend_call: "coroutine.yield".to_string(),
        }
    }

    /// Same syntax with a different statement keyword
    pub fn with_keyword(mut self, keyword: &str) -> Self {
        self.keyword = keyword.to_string();
        self
    }

    fn pattern(&self) -> String {
        // indent, keyword, expression, optional trailing comment; CRLF-aware.
        // Quoted strings are consumed whole so a comment marker inside one
        // never ends the expression.
        format!(
            r#"(?mR)^([ \t]*){kw}[ \t]+((?:{q}|[^ \t"'\r\n])(?:{q}|[^"'\r\n])*?)[ \t]*({cm}[^\r\n]*)?$"#,
            q = r#""[^"\r\n]*"|'[^'\r\n]*'"#,
            kw = regex::escape(&self.keyword),
            cm = regex::escape(&self.line_comment),
        )
    }
}

/// A suspend statement found in the original text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuspendPoint {
    /// 1-based line number in the original text
    pub line_number: usize,
    /// Pause duration expression, unevaluated
    pub raw_duration_expression: String,
}

/// Result of annotating a program
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
    /// Rewritten program text
    pub source: String,
    /// Rewritten suspend statements in source order
    pub suspend_points: Vec<SuspendPoint>,
}

/// Rewrites suspend statements to report their line numbers
#[derive(Debug, Clone)]
pub struct StepAnnotator {
    syntax: SuspendSyntax,
    matcher: Regex,
}

impl StepAnnotator {
    pub fn new(syntax: SuspendSyntax) -> Result<Self> {
        let matcher = Regex::new(&syntax.pattern())?;
        Ok(Self { syntax, matcher })
    }

    pub fn syntax(&self) -> &SuspendSyntax {
        &self.syntax
    }

    /// Rewrite every well-formed suspend statement in `text`.
    ///
    /// Statements without an expression (or whose "expression" is only a
    /// comment) are left byte-identical, as is every other line.
    pub fn annotate(&self, text: &str) -> Annotation {
        let mut source = String::with_capacity(text.len() + 32);
        let mut suspend_points = Vec::new();
        let mut copied_to = 0;
        let mut line_number = 1;

        for caps in self.matcher.captures_iter(text) {
            let Some(whole) = caps.get(0) else {
                continue;
            };
            let expression = &caps[2];
            if expression.starts_with(&self.syntax.line_comment) {
                continue;
            }

            // matches never span lines
            line_number += count_newlines(&text[copied_to..whole.start()]);
            source.push_str(&text[copied_to..whole.start()]);
            source.push_str(&self.rewrite(&caps, line_number));
            copied_to = whole.end();

            suspend_points.push(SuspendPoint {
                line_number,
                raw_duration_expression: expression.to_string(),
            });
        }
        source.push_str(&text[copied_to..]);

        Annotation {
            source,
            suspend_points,
        }
    }

    fn rewrite(&self, caps: &Captures<'_>, line_number: usize) -> String {
        let mut out = format!(
            "{}{}({}, {})",
            &caps[1], self.syntax.suspend_call, line_number, &caps[2]
        );
        if let Some(comment) = caps.get(3) {
            out.push(' ');
            out.push_str(comment.as_str());
        }
        out
    }
}

fn count_newlines(s: &str) -> usize {
    s.bytes().filter(|b| *b == b'\n').count()
}
