//! Prompt construction for document translation

/// Delimits the document block inside the prompt
pub const SEPARATOR: &str = "--------------------------------";

/// Build the translation prompt for one document.
///
/// `language_label` is the display name from `Translator::label_for`,
/// e.g. "Spanish Version" for `es`.
pub fn translation_prompt(content: &str, language_label: &str) -> String {
    format!(
        "Translate the following markdown content to [{label}], \
preserving all formatting, code blocks, and line breaks. \
Only output the translated markdown content without additional commentary:\n\
{sep}\n\
{content}\n\
{sep}\n",
        label = language_label,
        sep = SEPARATOR,
        content = content,
    )
}
