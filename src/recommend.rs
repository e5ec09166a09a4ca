//! Profile-grounded benefit recommendation.
//!
//! The single inbound boundary the web-app layer calls: retrieve the
//! passages closest to a user profile, fold them into a fixed prompt, and
//! hand that to the completion model. The completion text comes back
//! verbatim.

use anyhow::Result;

use crate::completion::{OpenAiGenerator, TextGenerator};
use crate::config::Config;
use crate::embedding;
use crate::index;
use crate::models::Passage;
use crate::retrieve::Retriever;

const PROMPT_HEADER: &str = "You are a benefits assistant. Using only the government program \
information below, recommend the benefits this person is most likely eligible for and explain \
each recommendation in one sentence.";

fn build_prompt(profile_text: &str, passages: &[Passage]) -> String {
    let mut prompt = String::from(PROMPT_HEADER);
    prompt.push_str("\n\nProgram information:\n");
    for passage in passages {
        prompt.push_str("- ");
        prompt.push_str(&passage.text);
        prompt.push('\n');
    }
    prompt.push_str("\nUser profile: ");
    prompt.push_str(profile_text);
    prompt
}

/// Retrieve grounding passages for `profile_text` and generate an answer.
pub async fn recommend_with(
    retriever: &Retriever<'_>,
    generator: &dyn TextGenerator,
    profile_text: &str,
) -> Result<String> {
    let passages = retriever.retrieve(profile_text).await?;
    let prompt = build_prompt(profile_text, &passages);
    generator.complete(&prompt).await
}

/// Inbound boundary for the web-app layer: profile text in, completion out.
pub async fn get_recommendation(config: &Config, profile_text: &str) -> Result<String> {
    if !config.embedding.is_enabled() {
        anyhow::bail!("Recommendations require embeddings. Set [embedding] provider in config.");
    }

    let embedder = embedding::create_embedder(&config.embedding)?;
    let index = index::create_index(&config.index).await?;
    let retriever = Retriever::new(
        embedder.as_ref(),
        index.as_ref(),
        &config.index.namespace,
        config.retrieval.top_k,
    );
    let generator = OpenAiGenerator::new(&config.completion)?;

    recommend_with(&retriever, &generator, profile_text).await
}

/// `bscout recommend`: print a grounded recommendation for a profile.
pub async fn run_recommend(config: &Config, profile_text: &str) -> Result<()> {
    let completion = get_recommendation(config, profile_text).await?;
    println!("{}", completion);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_contains_passages_and_profile() {
        let passages = vec![
            Passage {
                text: "VA housing assistance covers home loans.".to_string(),
                score: 0.9,
            },
            Passage {
                text: "Childcare subsidies for working parents.".to_string(),
                score: 0.4,
            },
        ];
        let prompt = build_prompt("veteran with two children", &passages);

        assert!(prompt.contains("VA housing assistance covers home loans."));
        assert!(prompt.contains("Childcare subsidies for working parents."));
        assert!(prompt.contains("User profile: veteran with two children"));
        // Passages stay in retrieval order.
        let va = prompt.find("VA housing").unwrap();
        let cc = prompt.find("Childcare subsidies").unwrap();
        assert!(va < cc);
    }
}
