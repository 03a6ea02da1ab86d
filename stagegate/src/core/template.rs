//! Instruction rendering.
//!
//! Instructions take exactly one parameter, the absolute path of the input
//! document. Substitution is literal: no escaping, no other placeholders.

/// Token replaced by the absolute input document path.
pub const INPUT_DOCUMENT_TOKEN: &str = "INPUT_DOCUMENT_PATH";

/// Text used when a stage's instruction template cannot be read.
pub const MISSING_INSTRUCTION: &str = "Prompt not found";

/// Render an instruction template for `input_document_path`.
pub fn render_instruction(template: &str, input_document_path: &str) -> String {
    template.replace(INPUT_DOCUMENT_TOKEN, input_document_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaces_every_occurrence() {
        let template = "Read INPUT_DOCUMENT_PATH.\nThen reread INPUT_DOCUMENT_PATH.";
        let rendered = render_instruction(template, "/work/prd.md");
        assert_eq!(rendered, "Read /work/prd.md.\nThen reread /work/prd.md.");
    }

    #[test]
    fn leaves_other_braces_alone() {
        let template = "Use {{ braces }} and $VARS literally.";
        assert_eq!(render_instruction(template, "/x"), template);
    }
}
