// Prompt templates for interview question generation and library search.

use crate::llm_client::prompts::{JSON_ONLY_SYSTEM, NO_REPEAT_INSTRUCTION, PLAIN_TEXT_SYSTEM};
use crate::models::question_set::Round;

use super::channel::{GenerationContext, GenerationRequest};

pub const QUESTION_SYSTEM: &str = PLAIN_TEXT_SYSTEM;
pub const LIBRARY_SYSTEM: &str = JSON_ONLY_SYSTEM;

/// Renders the role description shared by both prompts.
fn role_block(context: &GenerationContext) -> String {
    let mut block = format!("ROLE: {}\n", context.job_title);
    if let Some(domain) = context.domain.as_deref().filter(|d| !d.trim().is_empty()) {
        block.push_str(&format!("DOMAIN: {domain}\n"));
    }
    match (context.min_experience, context.max_experience) {
        (Some(min), Some(max)) => block.push_str(&format!("EXPERIENCE: {min}-{max} years\n")),
        (Some(min), None) => block.push_str(&format!("EXPERIENCE: {min}+ years\n")),
        (None, Some(max)) => block.push_str(&format!("EXPERIENCE: up to {max} years\n")),
        (None, None) => {}
    }
    if !context.mandatory_skills.is_empty() {
        block.push_str(&format!(
            "MANDATORY SKILLS: {}\n",
            context.mandatory_skills.join(", ")
        ));
    }
    if !context.optional_skills.is_empty() {
        block.push_str(&format!(
            "OPTIONAL SKILLS: {}\n",
            context.optional_skills.join(", ")
        ));
    }
    block
}

fn existing_block(existing: &[String]) -> String {
    if existing.is_empty() {
        return "EXISTING QUESTIONS: none\n".to_string();
    }
    let mut block = String::from("EXISTING QUESTIONS:\n");
    for (i, q) in existing.iter().enumerate() {
        block.push_str(&format!("{}. {}\n", i + 1, q));
    }
    block
}

fn round_focus(round: Round) -> &'static str {
    match round {
        Round::General => {
            "a general, behavioural interview question about motivation, teamwork or past experience"
        }
        Round::Position => "a technical interview question specific to this role and its skills",
        Round::Coding => "a short coding problem statement",
        Round::Aptitude => "an aptitude question",
    }
}

pub fn question_prompt(request: &GenerationRequest) -> String {
    format!(
        "Write {focus} for a video interview.\n\n{role}\n{existing}\n{rule}\n\n\
         Return exactly one question as a single sentence.",
        focus = round_focus(request.round),
        role = role_block(&request.context),
        existing = existing_block(&request.existing_questions),
        rule = NO_REPEAT_INSTRUCTION,
    )
}

pub fn library_prompt(request: &GenerationRequest) -> String {
    let source = request.source.as_deref().unwrap_or("public interview collections");
    let category = request.category.as_deref().unwrap_or("technical");
    format!(
        "List {count} {category} interview questions that {source} is known to ask \
         candidates for this role.\n\n{role}\n{existing}\n{rule}\n\n\
         Return a JSON array of {count} strings, one question per string.",
        count = request.count,
        role = role_block(&request.context),
        existing = existing_block(&request.existing_questions),
        rule = NO_REPEAT_INSTRUCTION,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> GenerationContext {
        GenerationContext {
            job_title: "Backend Engineer".to_string(),
            domain: Some("Payments".to_string()),
            min_experience: Some(3),
            max_experience: Some(6),
            mandatory_skills: vec!["Rust".to_string(), "Postgres".to_string()],
            optional_skills: vec![],
        }
    }

    #[test]
    fn test_question_prompt_lists_existing_questions() {
        let request = GenerationRequest::question(
            Round::Position,
            context(),
            vec!["What is a borrow checker?".to_string()],
        );
        let prompt = question_prompt(&request);
        assert!(prompt.contains("ROLE: Backend Engineer"));
        assert!(prompt.contains("EXPERIENCE: 3-6 years"));
        assert!(prompt.contains("MANDATORY SKILLS: Rust, Postgres"));
        assert!(prompt.contains("1. What is a borrow checker?"));
        assert!(!prompt.contains("OPTIONAL SKILLS"));
    }

    #[test]
    fn test_library_prompt_names_source_and_count() {
        let request = GenerationRequest::library(
            Round::Position,
            context(),
            vec![],
            "Acme Corp".to_string(),
            "technical".to_string(),
            10,
        );
        let prompt = library_prompt(&request);
        assert!(prompt.contains("List 10 technical interview questions that Acme Corp"));
        assert!(prompt.contains("EXISTING QUESTIONS: none"));
    }
}
