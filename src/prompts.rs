//! Prompts for every AI-assisted pass.
//!
//! Centralising every prompt here serves two purposes:
//!
//! 1. **Single source of truth** — changing a pass's behaviour (e.g. adding a
//!    keyword category or tightening the fix rules) requires editing exactly
//!    one place.
//!
//! 2. **Testability** — unit tests can inspect prompts directly without
//!    spinning up a real inference service, making prompt regressions easy to
//!    catch.

/// System prompt for the text-fix pass.
pub const TEXT_FIX_SYSTEM: &str = "You are a text processing expert. Fix spacing, formatting, and \
readability issues in academic text extracted from PDFs.";

/// Build the text-fix prompt for one page.
pub fn text_fix_prompt(text: &str) -> String {
    format!(
        r#"Fix spacing and formatting issues in this academic text:

RULES:
1. Add spaces between words incorrectly joined together
2. Fix broken words across lines (remove hyphens, join parts)
3. Preserve chemical formulas (NOx, NH3, H2O, etc.) exactly
4. Preserve citations and references exactly
5. Fix punctuation spacing
6. Maintain paragraph structure
7. Do NOT change technical terms or add new content

Text to fix:
{text}

Return only the corrected text with no explanations."#
    )
}

/// System prompt for the classification pass.
pub const CLASSIFY_SYSTEM: &str = "You are an expert at analyzing academic paper structure. \
Classify the content type of each page.";

/// Build the classification prompt.
///
/// Page position is part of the prompt because it carries real signal: first
/// pages tend to be abstract/introduction, last pages references.
pub fn classify_prompt(text: &str, page_number: usize, total_pages: usize) -> String {
    format!(
        r#"Classify this text from page {page_number} of {total_pages} pages.

Text:
{text}

Classify as ONE of these types:
- abstract: Abstract or summary section
- introduction: Introduction or background
- methods: Methodology, experimental procedures, materials
- results: Results, data, findings, analysis
- discussion: Discussion, interpretation, comparison
- conclusion: Conclusions, summary, future work
- references: Reference list, bibliography
- other: Anything that does not fit the above

Return only the classification word, nothing else."#
    )
}

/// System prompt for the keyword-extraction pass.
pub const KEYWORD_SYSTEM: &str = "You are an expert academic researcher specializing in analyzing \
scientific papers. Extract keywords and key concepts from academic text with high precision.";

/// Build the keyword-extraction prompt.
///
/// The service is asked for strict JSON (the request also sets the
/// structured-output flag); the category names here must match the fields of
/// [`crate::ai::KeywordResult`].
pub fn keyword_prompt(text: &str) -> String {
    format!(
        r#"Analyze this academic text and extract:

1. TECHNICAL KEYWORDS: Specific technical terms, methods, materials, equipment
2. RESEARCH CONCEPTS: Broader research concepts and themes
3. CHEMICAL COMPOUNDS: All chemical formulas and compound names
4. METHODOLOGIES: Research methods and analytical techniques
5. EQUIPMENT: Instruments and analytical equipment mentioned

Text to analyze:
{text}

Return your analysis in this exact JSON format:
{{
    "technical_keywords": ["keyword1", "keyword2"],
    "research_concepts": ["concept1", "concept2"],
    "chemical_compounds": ["compound1", "compound2"],
    "methodologies": ["method1", "method2"],
    "equipment": ["instrument1", "instrument2"]
}}

Be precise and extract only the most important terms."#
    )
}

/// System prompt for the document summary pass.
pub const SUMMARY_SYSTEM: &str = "You are an expert academic researcher. Create comprehensive \
summaries of scientific papers.";

/// Build the summary prompt from document metadata and a content sample.
pub fn summary_prompt(title: &str, authors: &str, keywords: &str, sample: &str) -> String {
    format!(
        r#"Create a comprehensive summary of this research paper:

PAPER METADATA:
- Title: {title}
- Authors: {authors}
- Keywords: {keywords}

CONTENT SAMPLE:
{sample}

Create a structured summary with:

## Research Overview
[Brief overview of the research topic and objectives]

## Methodology
[Key methods and approaches used]

## Main Findings
[Primary results and discoveries]

## Significance
[Research significance and implications]

Keep the summary concise but comprehensive (300-500 words)."#
    )
}
