//! Prompt construction for every generator call in the pipeline.

/// A system/user message pair for one generator call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptPair {
    pub system: String,
    pub user: String,
}

/// Inputs for writing a single chapter.
#[derive(Debug, Clone, Copy)]
pub struct ChapterPromptInput<'a> {
    pub main_title: &'a str,
    pub chapter_title: &'a str,
    pub chapter_prompt: &'a str,
    pub research_context: &'a str,
    pub word_limit: u32,
    pub keep_links: bool,
}

fn link_policy(keep_links: bool) -> &'static str {
    if keep_links {
        "Keep every Markdown link in the form [Source Name](URL) exactly as written; do not drop or alter URLs."
    } else {
        "Remove all hyperlinks. Keep the anchor text as plain prose and do not output any URLs."
    }
}

/// Query builder: ask for `query_count` focused search queries.
pub fn build_query_prompt(topic: &str, query_count: usize) -> PromptPair {
    let system = format!(
        "Role: Search Query Refiner Agent
You refine a user's topic into highly targeted search queries for deep research.

Goal: Provide {query_count} well-crafted, distinct search queries based on the user's stated topic. These queries must be geared towards doing deep research on the subject.

Instructions:
1. Analyze User Input: Identify the exact concepts or keywords in the user's topic. Do NOT introduce tangential themes.
2. Generate Queries: Create exactly {query_count} unique search queries. Each query should include the main keywords and minor variations to preserve a narrow focus.
3. Output Format: Return a strict JSON object of the form {{\"queries\": [\"...\", \"...\"]}} and nothing else."
    );
    let user = format!("User Topic: \"{topic}\"");
    PromptPair { system, user }
}

/// Structure planner: table of contents with exactly `chapter_count` chapters.
pub fn build_structure_prompt(research_context: &str, chapter_count: u32) -> PromptPair {
    let system = format!(
        "Role: Research Leader and Project Planner
Your task is to create a comprehensive, research-backed table of contents for a Lead Magnet based on the provided research context.

Instructions:
1. Read the research context carefully.
2. Create a logical structure consisting of exactly {chapter_count} chapters.
3. Generate a JSON object with the following schema:
   - \"title\": Title of the Lead Magnet
   - \"subtitle\": Subtitle
   - \"introduction\": A short introduction (approx 100 words)
   - \"conclusions\": A short conclusion (approx 100 words)
   - \"chapters\": An array of objects, where each object has:
     - \"title\": Chapter title
     - \"prompt\": Exhaustive, step-by-step instructions for the writer on what to cover in this chapter based on the research. Include data points to mention.
Return only the JSON object."
    );
    let user = format!("Research Context:\n{research_context}");
    PromptPair { system, user }
}

/// Chapter writer: one chapter of roughly `word_limit` words.
pub fn build_chapter_writer_prompt(input: &ChapterPromptInput<'_>) -> PromptPair {
    let citation_rule = if input.keep_links {
        "Use the provided research context to back up your claims. Include inline citations in Markdown format like [Source Name](URL) when referencing facts from the research."
    } else {
        "Use the provided research context to back up your claims. Mention sources by name only; do not include URLs or Markdown links."
    };

    let system = format!(
        "Role: Research Assistant Writer
Your task is to write a single chapter for a Lead Magnet.

Guidelines:
- Write strictly in Markdown format.
- Length: Approximately {} words.
- Tone: Educational, informative, and actionable. Provide step-by-step guidance where applicable.
- Do NOT include the main article introduction or conclusion. Just write the chapter content.
- {citation_rule}",
        input.word_limit
    );
    let user = format!(
        "Lead Magnet Title: \"{}\"
Current Chapter Title: \"{}\"
Chapter Instructions: \"{}\"

Research Context available to you:
{}",
        input.main_title, input.chapter_title, input.chapter_prompt, input.research_context
    );
    PromptPair { system, user }
}

/// Section editor: rewrite one section within a word band.
pub fn build_section_editor_prompt(
    section_name: &str,
    section_text: &str,
    min_words: usize,
    max_words: usize,
    keep_links: bool,
) -> PromptPair {
    let system = format!(
        "Role: Section Editor
You polish one section of a longer document without changing its meaning.

Rules:
- The result MUST contain between {min_words} and {max_words} words. Do not summarize and do not pad.
- Fix grammar, spelling and punctuation; improve flow and clarity.
- Keep the Markdown structure (lists, bold text, sub-headings) of the original.
- {}
- Return only the edited section text, without commentary or code fences.",
        link_policy(keep_links)
    );
    let user = format!("Section: {section_name}\n\n{section_text}");
    PromptPair { system, user }
}

/// Final editor: one holistic polish over the assembled draft.
pub fn build_final_editor_prompt(assembled_draft: &str, keep_links: bool) -> PromptPair {
    let system = format!(
        "Role: Expert Editor
You are refining and polishing content to ensure it meets the highest quality standards.

Instructions:
- Carefully read the entire assembled Lead Magnet.
- Check for grammar, spelling, and punctuation.
- Ensure consistency in tone, style, and voice throughout the piece. Make it sound authentic, formal but casual (avoid robotic AI phrasing).
- Improve sentence structure and flow.
- Ensure proper Markdown formatting (Headers, Lists, Bold text).
- Add placeholders like [Add image here of X] where visual context would be helpful.
- {}
- Return the final polished text in pure Markdown.",
        link_policy(keep_links)
    );
    let user = format!("Draft Content:\n{assembled_draft}");
    PromptPair { system, user }
}

/// JSON repair: fix syntax only, never the data.
pub fn build_json_repair_prompt(broken_json: &str) -> PromptPair {
    let system = "Role: JSON Repair Specialist
Fix the following broken JSON and return ONLY valid JSON.

Instructions:
1. Analyze the structure of the broken JSON.
2. Fix syntax errors (missing quotes, trailing commas, unbalanced brackets, etc.).
3. Return ONLY the fixed JSON, without explanations or Markdown fences.
4. Do NOT alter the data, only fix the syntax."
        .to_string();
    let user = format!("Broken JSON:\n{broken_json}\n\nReturn the fixed JSON now.");
    PromptPair { system, user }
}
