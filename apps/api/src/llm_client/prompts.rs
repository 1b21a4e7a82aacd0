// Output-format fragments shared by every model call. The question and
// library prompts themselves live in `generation::prompts`.

/// Library batches are parsed as a JSON array of strings.
pub const JSON_ONLY_SYSTEM: &str = "You write interview questions for a recruiting tool. \
    Reply with a single JSON array of question strings and nothing else: \
    no surrounding object, no code fences, no commentary.";

/// A generated question is inserted into the draft verbatim.
pub const PLAIN_TEXT_SYSTEM: &str = "You write interview questions for a recruiting tool. \
    Reply with exactly one question as plain text. \
    No numbering, quotes, labels, preamble or follow-up remarks.";

/// Appended to every prompt that lists the questions already in the draft.
pub const NO_REPEAT_INSTRUCTION: &str = "\
    Never return a question that repeats or rephrases one from EXISTING QUESTIONS. \
    If an idea overlaps, choose a different skill or scenario.";
