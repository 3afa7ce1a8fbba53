//! Prompt Assembler.
//!
//! Pure string concatenation: the base instructions are immutable
//! configuration fixed at construction, and a non-empty context block is
//! appended under an "Additional Context" heading.

pub struct PromptAssembler {
    base_instructions: String,
}

impl PromptAssembler {
    pub fn new(base_instructions: impl Into<String>) -> Self {
        Self {
            base_instructions: base_instructions.into(),
        }
    }

    pub fn assemble(&self, context_block: &str) -> String {
        if context_block.is_empty() {
            return self.base_instructions.clone();
        }
        format!(
            "{}\n\nAdditional Context:\n{}",
            self.base_instructions, context_block
        )
    }
}
