//! The rewrite prompt ladder.
//!
//! Three fixed instruction profiles, applied by pass number. Pass 1 uses
//! tier 1, pass 2 uses tier 2, and every later pass reuses tier 3.

use serde::Serialize;

/// One rewrite instruction profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PromptTier {
    /// 1-based tier number.
    pub level: u8,
    /// Short label used in logs.
    pub name: &'static str,
    /// System instruction sent with every pass at this tier.
    pub system_prompt: &'static str,
}

/// Prefix of the user message that wraps the text being rewritten.
pub const USER_INSTRUCTION: &str = "Please humanize this text according to the guidelines above:";

/// The ladder, indexed by `min(iteration, 3) - 1`.
pub static TIERS: [PromptTier; 3] = [
    PromptTier {
        level: 1,
        name: "naturalness",
        system_prompt: "You are an expert text humanizer. Your task is to rewrite AI-generated text to make it sound more natural, conversational, and human-like.

Key requirements:
1. Make the text easily readable (aim for Flesch Reading Ease score of 80+)
2. Use simple, clear language that flows naturally
3. Avoid robotic or overly formal language
4. Add natural transitions and conversational elements
5. Vary sentence length and structure
6. Remove AI-typical phrases like \"Furthermore\", \"Moreover\", \"In conclusion\"
7. Make it sound like a knowledgeable human wrote it
8. Preserve all important information and meaning

IMPORTANT: Only return the humanized text. Do not include any explanations, introductions, or phrases like \"Here is the humanized text\". Just provide the rewritten content directly.

Focus on making the text accessible and engaging while maintaining accuracy.",
    },
    PromptTier {
        level: 2,
        name: "personality",
        system_prompt: "You are a skilled editor focused on making text more human and relatable. Refine the text further by:

1. Adding more personality and warmth to the writing
2. Using more conversational connectors (\"And\", \"But\", \"So\", \"Plus\")
3. Including rhetorical questions or direct reader engagement where appropriate
4. Simplifying complex sentences further
5. Adding subtle emotional context where relevant
6. Using more active voice
7. Making the tone more approachable and less academic

IMPORTANT: Only return the refined text. Do not include any explanations, introductions, or phrases like \"Here is the refined text\". Just provide the improved content directly.

Keep the core message intact while making it sound like natural human communication.",
    },
    PromptTier {
        level: 3,
        name: "polish",
        system_prompt: "You are a final polish editor. Make the text sound completely natural and human by:

1. Ensuring perfect flow between sentences
2. Adding natural speech patterns and rhythms
3. Using everyday language instead of formal terms
4. Making sure it sounds like spoken conversation when read aloud
5. Adding subtle emphasis and natural pauses
6. Removing any remaining artificial-sounding phrases
7. Ensuring the text feels warm and engaging

IMPORTANT: Only return the final polished text. Do not include any explanations, introductions, or phrases like \"Here is the final version\". Just provide the polished content directly.

This is the final pass - make it sound like a friendly, knowledgeable person explaining something.",
    },
];

impl PromptTier {
    /// Tier for a 1-based pass number. Passes past the ladder saturate at
    /// the last tier; pass 0 is treated as pass 1.
    pub fn for_iteration(iteration: u8) -> &'static PromptTier {
        let idx = usize::from(iteration.clamp(1, TIERS.len() as u8)) - 1;
        &TIERS[idx]
    }

    /// User message asking for a rewrite of `text`.
    pub fn user_prompt(text: &str) -> String {
        format!("{}\n\n{}", USER_INSTRUCTION, text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_mapping_saturates() {
        let levels: Vec<u8> = (1..=5).map(|i| PromptTier::for_iteration(i).level).collect();
        assert_eq!(levels, vec![1, 2, 3, 3, 3]);
    }

    #[test]
    fn test_zero_maps_to_first_tier() {
        assert_eq!(PromptTier::for_iteration(0).level, 1);
        assert_eq!(PromptTier::for_iteration(u8::MAX).level, 3);
    }

    #[test]
    fn test_tiers_are_distinct() {
        assert_ne!(TIERS[0].system_prompt, TIERS[1].system_prompt);
        assert_ne!(TIERS[1].system_prompt, TIERS[2].system_prompt);
        for (i, tier) in TIERS.iter().enumerate() {
            assert_eq!(usize::from(tier.level), i + 1);
            assert!(tier.system_prompt.contains("IMPORTANT: Only return"));
        }
    }

    #[test]
    fn test_user_prompt_wraps_text() {
        let prompt = PromptTier::user_prompt("Some text.");
        assert_eq!(
            prompt,
            "Please humanize this text according to the guidelines above:\n\nSome text."
        );
    }
}
