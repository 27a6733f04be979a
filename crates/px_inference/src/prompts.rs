//! Prompt templates for each pipeline stage. The exact wording is free to
//! change; the parameters are not.

use px_core::{Bias, ResponseShape};
use serde_json::json;

/// Marks the start of the article body inside the classification prompt.
pub const ARTICLE_MARKER: &str = "Article Text:\n";

pub fn classification_shape() -> ResponseShape {
    ResponseShape {
        name: "ArticleAnalysis",
        schema: json!({
            "type": "object",
            "properties": {
                "bias": {
                    "type": "string",
                    "enum": ["Left", "Center", "Right"],
                    "description": "Political bias of the article"
                },
                "summary": {
                    "type": "string",
                    "description": "One-sentence summary of the article's core argument"
                }
            },
            "required": ["bias", "summary"]
        }),
    }
}

pub fn classification_prompt(text: &str) -> String {
    format!(
        "Read the article below and judge its political lean as Left, Center or Right, \
         then write one analytical sentence stating its central claim.\n\n\
         - Weigh framing, word choice and what the piece leaves out.\n\
         - The publishing outlet is a useful hint, but the content decides.\n\n\
         {}{}",
        ARTICLE_MARKER, text
    )
}

pub fn synthesis_prompt(bias: Bias, topic: &str, summaries: &[String]) -> String {
    format!(
        "You are a political analyst. Describe the {bias} perspective on '{topic}'.\n\n\
         Source summaries:\n- {joined}\n\n\
         Write one focused paragraph of 60 to 100 words with the concrete arguments, \
         concerns and positions this side holds, including policy, economic or social \
         angles on '{topic}' where the summaries raise them. If the summaries have nothing \
         to do with '{topic}', reply exactly: 'No significant reporting found from this \
         perspective on this specific topic.' Output only the paragraph.",
        bias = bias,
        topic = topic,
        joined = summaries.join("\n- "),
    )
}

pub fn omission_prompt(topic: &str, left: &str, right: &str) -> String {
    format!(
        "You are writing a balanced briefing on '{topic}'.\n\n\
         Left-wing perspective:\n{left}\n\n\
         Right-wing perspective:\n{right}\n\n\
         Write a 600 to 900 word analysis that opens with a concrete fact or event, answers \
         '{topic}' directly if it is phrased as a question, contrasts what each side \
         emphasizes and why, names what each side minimizes or ignores, and closes with \
         the most balanced conclusion the evidence supports. When a perspective reports no \
         coverage, say the search found little from that side and describe the usual shape \
         of the debate instead of claiming to know nothing.",
        topic = topic,
        left = left,
        right = right,
    )
}

pub fn chat_prompt(context: &str, query: &str) -> String {
    format!(
        "You are a research assistant. Answer the question clearly and briefly. Use the \
         context, which holds news analysis, when the question concerns the analyzed topic. \
         For general or unrelated questions answer from general knowledge and say the \
         context did not help. Do not include internal reasoning.\n\n\
         Context:\n{}\n\nUser Question: {}",
        context, query
    )
}
