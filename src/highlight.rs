//! Producing pre-rendered highlighted HTML for diff inputs.
//!
//! Output is a continuous classed-HTML fragment (spans may cross newlines),
//! the shape [`crate::html::process_rendered_lines`] knows how to break into
//! per-line fragments.

use syntect::html::{ClassStyle, ClassedHTMLGenerator};
use syntect::parsing::{SyntaxReference, SyntaxSet};
use syntect::util::LinesWithEndings;

use crate::error::DiffError;

pub struct Highlighter {
    syntax_set: SyntaxSet,
}

impl Default for Highlighter {
    fn default() -> Self {
        Self::new()
    }
}

impl Highlighter {
    pub fn new() -> Self {
        Self {
            syntax_set: SyntaxSet::load_defaults_newlines(),
        }
    }

    /// Resolve a syntax definition from a file name, with explicit handling
    /// for extensions the default syntax set maps poorly.
    pub fn syntax_for_file(&self, filename: &str) -> Option<&SyntaxReference> {
        if let Some(ext) = std::path::Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
        {
            match ext {
                "ts" | "tsx" => {
                    // TypeScript isn't in the default set, use JavaScript
                    return self
                        .syntax_set
                        .find_syntax_by_extension("js")
                        .or_else(|| self.syntax_set.find_syntax_by_name("JavaScript"));
                }
                "js" | "jsx" => return self.syntax_set.find_syntax_by_extension("js"),
                "rs" => return self.syntax_set.find_syntax_by_extension("rs"),
                "py" => return self.syntax_set.find_syntax_by_extension("py"),
                "go" => return self.syntax_set.find_syntax_by_extension("go"),
                "java" => return self.syntax_set.find_syntax_by_extension("java"),
                "cpp" | "cc" | "cxx" => return self.syntax_set.find_syntax_by_extension("cpp"),
                "c" => return self.syntax_set.find_syntax_by_extension("c"),
                "h" | "hpp" => return self.syntax_set.find_syntax_by_extension("h"),
                other => {
                    if let Some(syntax) = self.syntax_set.find_syntax_by_extension(other) {
                        return Some(syntax);
                    }
                }
            }
        }
        // Extension lists in the default set include bare filenames such as
        // "Makefile", so the whole name doubles as a lookup token.
        self.syntax_set.find_syntax_by_extension(filename)
    }

    /// Render `text` as one continuous classed-HTML fragment using the
    /// syntax resolved from `filename`. Returns `None` when no syntax
    /// matches, so callers fall back to plain text rather than a wrongly
    /// highlighted fragment.
    pub fn rendered_html(&self, text: &str, filename: &str) -> Result<Option<String>, DiffError> {
        let Some(syntax) = self.syntax_for_file(filename) else {
            return Ok(None);
        };
        let mut generator = ClassedHTMLGenerator::new_with_class_style(
            syntax,
            &self.syntax_set,
            ClassStyle::Spaced,
        );
        for line in LinesWithEndings::from(text) {
            generator.parse_html_for_line_which_includes_newline(line)?;
        }
        Ok(Some(generator.finalize()))
    }
}
