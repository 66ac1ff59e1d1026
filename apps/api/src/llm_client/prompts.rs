// Cross-cutting prompt fragments shared by every rewrite prompt.
// Section-specific templates live in tailoring/prompts.rs.

/// Output contract for rewrites: plain lines, nothing else.
pub const PLAIN_TEXT_INSTRUCTION: &str = "\
    Respond with the rewritten section text only. \
    Put each bullet or entry on its own line. \
    Do NOT include the section heading. \
    Do NOT use markdown, code fences, or commentary.";

/// Grounding rule: tailor emphasis, never invent facts.
pub const GROUNDING_INSTRUCTION: &str = "\
    CRITICAL: Only rephrase and reorder what the original content states. \
    Do NOT invent employers, dates, degrees, numbers, or skills. \
    Keep every metric from the original exactly as written.";
