use px_core::{Bias, InferenceModel, Result, EMPTY_NARRATIVE};
use px_inference::prompts::{omission_prompt, synthesis_prompt};
use tracing::info;

/// Writes the narrative for one bias group. An empty group gets the fixed
/// placeholder and no inference call.
pub async fn synthesize(
    model: &dyn InferenceModel,
    bias: Bias,
    topic: &str,
    summaries: &[String],
) -> Result<String> {
    if summaries.is_empty() {
        info!("No {} coverage for '{}', using placeholder narrative", bias, topic);
        return Ok(EMPTY_NARRATIVE.to_string());
    }

    info!("✍️ Synthesizing {} narrative from {} summaries", bias, summaries.len());
    let text = model.infer(&synthesis_prompt(bias, topic, summaries)).await?;
    Ok(text.trim().to_string())
}

/// Compares both narratives in a single call. Always runs, placeholder
/// narratives included.
pub async fn detect_omissions(
    model: &dyn InferenceModel,
    topic: &str,
    left: &str,
    right: &str,
) -> Result<String> {
    info!("🔎 Comparing narratives for '{}'", topic);
    let text = model.infer(&omission_prompt(topic, left, right)).await?;
    Ok(text.trim().to_string())
}
