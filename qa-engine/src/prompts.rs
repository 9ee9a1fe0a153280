//! Prompt constants and builders for classification and answering.

use crate::retrievers::ContextBlock;

/// Deterministic mode classifier. Temperature is pinned to 0 at the call
/// site.
pub const CLASSIFIER_SYSTEM: &str = r#"You classify questions about a codebase into exactly one mode.

Rules:
- DIAGNOSTIC: the question contains an error symbol, an exception type, a stack-trace fragment, or asks why something is failing.
- EXPLORATORY: the question asks to trace, follow, or walk through a flow.
- ANALYTICAL: the question asks about architecture, flaws, structure, or coupling.
- CONCEPTUAL: everything else.

Respond with a single JSON object: {"mode": "<DIAGNOSTIC|EXPLORATORY|ANALYTICAL|CONCEPTUAL>", "reasoning": "<one sentence>", "scope": "<optional path or subsystem>"}"#;

/// System message for CGRAG and quick-mode answering.
pub const ANSWER_SYSTEM: &str = "You are a precise code assistant answering questions about a \
repository from provided context. Cite files and symbols. Use the context as ground truth.";

/// Build the CGRAG user prompt for one pass.
pub fn build_cgrag_prompt(question: &str, context: &str, final_pass: bool) -> String {
    let missing_instruction = if final_pass {
        "This is the final pass: answer as completely as the context allows and do NOT emit a \
<missing> block."
    } else {
        "If essential information is missing from the context, list each specific gap on its own \
line inside a <missing> block. Reference files and functions precisely (e.g. `get_db in \
api/deps.py`). Leave the block out when nothing essential is missing."
    };
    format!(
        "Context:\n{context}\n\nQuestion: {question}\n\nEmit your current best answer inside \
<answer>...</answer>. List the sources you actually used inside <citations> as a JSON array of \
{{\"path\", \"line_start\", \"line_end\"}} objects. {missing_instruction}"
    )
}

/// Render context blocks under a total token budget, preserving order.
pub fn render_context(blocks: &[ContextBlock], total_budget: usize, per_block: usize) -> String {
    let mut out = String::new();
    let mut used = 0usize;
    for (i, b) in blocks.iter().enumerate() {
        let header = match (&b.source_path, b.line_start, b.line_end) {
            (Some(p), Some(s), Some(e)) => format!("==[{}]== {p}:{s}-{e} ({})\n", i + 1, b.origin),
            (Some(p), _, _) => format!("==[{}]== {p} ({})\n", i + 1, b.origin),
            _ => format!("==[{}]== ({})\n", i + 1, b.origin),
        };
        let body = clamp_tokens(&b.text, per_block);
        let cost = wiki_rag::estimate_tokens(&header) + wiki_rag::estimate_tokens(&body);
        if used + cost > total_budget && used > 0 {
            break;
        }
        out.push_str(&header);
        out.push_str(&body);
        if !body.ends_with('\n') {
            out.push('\n');
        }
        out.push('\n');
        used += cost;
    }
    out
}

/// Cut text to roughly `budget` tokens at a word boundary.
fn clamp_tokens(text: &str, budget: usize) -> String {
    if wiki_rag::estimate_tokens(text) <= budget {
        return text.to_string();
    }
    let max_words = budget * 3 / 4;
    let clipped: Vec<&str> = text.split_whitespace().take(max_words.max(1)).collect();
    format!("{} ...", clipped.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(text: &str) -> ContextBlock {
        ContextBlock {
            origin: "test".into(),
            source_path: Some("a.py".into()),
            line_start: Some(1),
            line_end: Some(2),
            text: text.into(),
        }
    }

    #[test]
    fn context_respects_total_budget() {
        let blocks: Vec<ContextBlock> = (0..20).map(|_| block(&"word ".repeat(200))).collect();
        let rendered = render_context(&blocks, 500, 1500);
        assert!(wiki_rag::estimate_tokens(&rendered) <= 600);
        assert!(rendered.contains("==[1]=="));
        assert!(!rendered.contains("==[20]=="));
    }

    #[test]
    fn final_pass_prompt_forbids_missing() {
        let p = build_cgrag_prompt("q", "ctx", true);
        assert!(p.contains("do NOT emit"));
        let p2 = build_cgrag_prompt("q", "ctx", false);
        assert!(p2.contains("<missing>"));
    }
}
