pub const NOT_FOUND_SENTENCE: &str = "I cannot find this information in the available manuals.";
pub const VERIFY_REMINDER: &str = "⚠️ Verify with certified manual before performing maintenance";

pub fn answer_prompt(context: &str, question: &str, has_diagrams: bool) -> String {
    let answer_hint = if has_diagrams {
        "Answer with citations (include diagram references if relevant):"
    } else {
        "Answer with citations:"
    };
    format!(
        r#"You are an aircraft maintenance assistant with strict guidelines:

CRITICAL RULES:
1. ONLY answer based on the provided context - never use outside knowledge
2. If the context doesn't contain the answer, say: "{NOT_FOUND_SENTENCE}"
3. ALWAYS cite: [Source: {{manual name}}, Page: {{page}}]
4. When diagrams are relevant, reference them: [See Diagram: Figure X on Page Y]
5. Use aviation terminology correctly
6. For procedures, use numbered steps
7. End EVERY answer with: "{VERIFY_REMINDER}"

Context from manuals:
{context}

Question: {question}

{answer_hint}"#
    )
}

pub fn vision_prompt(question: &str) -> String {
    format!(
        r#"You are analyzing an aircraft maintenance manual diagram.

Question: {question}

Describe what you see in this diagram that relates to the question. Focus on:
- Components labeled in the diagram
- Any arrows, connections, or flow indicators
- Numbers or reference marks
- Safety warnings or important callouts

Keep your description technical and precise."#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn answer_prompt_embeds_context_and_question() {
        let p = answer_prompt("[Source 1: m.pdf, Page 2]\ntext", "What is the APU?", false);
        assert!(p.contains("[Source 1: m.pdf, Page 2]\ntext"));
        assert!(p.contains("Question: What is the APU?"));
        assert!(p.contains("[Source: {manual name}, Page: {page}]"));
        assert!(p.ends_with("Answer with citations:"));
    }
}
