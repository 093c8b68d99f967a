//! Content-preservation guard for the text-fix pass.
//!
//! AI cleanup of PDF text has two characteristic failure modes:
//!
//! - **Token corruption** — "H2O" becomes "H 2 O", "[12]" becomes "(12)",
//!   which breaks formula and citation matching downstream.
//! - **Truncation** — the model stops early and silently drops the bottom
//!   half of the page.
//!
//! Both are detected here with cheap deterministic checks, and either one
//! rejects the model's output in favour of the raw text. The guard never
//! raises: a rejected fix is a silent fallback, logged at debug level by the
//! caller.

use once_cell::sync::Lazy;
use regex::Regex;

/// Chemical-formula-like tokens: an element-style prefix followed by digits
/// ("H2O", "NH3", "CO2", "Fe2O3"), or the `NOx`-style family with a trailing
/// lowercase x.
static RE_FORMULA: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b[A-Z][A-Za-z]?\d+(?:[A-Za-z]\d*)*\b|\b[A-Z]{1,2}[a-z]?x\b").unwrap()
});

/// Citation markers: numeric brackets ("[12]", "[3,4]", "[7-9]") and
/// author-year parentheticals ("(Smith et al., 2019)").
static RE_CITATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[\d+(?:\s*[,\-–]\s*\d+)*\]|\([A-Z][A-Za-z]+(?:\s+et\s+al\.?)?,?\s*\d{4}\)")
        .unwrap()
});

/// Collect the tokens in `text` that a fix pass must carry over verbatim.
pub fn protected_tokens(text: &str) -> Vec<String> {
    let mut tokens: Vec<String> = Vec::new();
    for m in RE_FORMULA.find_iter(text) {
        tokens.push(m.as_str().to_string());
    }
    for m in RE_CITATION.find_iter(text) {
        tokens.push(m.as_str().to_string());
    }
    tokens.sort();
    tokens.dedup();
    tokens
}

/// Count alphanumeric characters — the currency of the truncation check.
pub fn alnum_count(text: &str) -> usize {
    text.chars().filter(|c| c.is_alphanumeric()).count()
}

/// Decide whether a fixed page may replace the raw page.
///
/// Accepts only if every protected token from `raw` appears verbatim in
/// `fixed` AND the alphanumeric character count did not shrink by more than
/// `tolerance` (a fraction of the raw count). Whitespace changes are free —
/// that is the whole point of the fix pass.
pub fn fix_is_acceptable(raw: &str, fixed: &str, tolerance: f64) -> bool {
    let raw_count = alnum_count(raw);
    let fixed_count = alnum_count(fixed);
    if (fixed_count as f64) < (raw_count as f64) * (1.0 - tolerance) {
        return false;
    }

    protected_tokens(raw)
        .iter()
        .all(|token| fixed.contains(token.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formulas_are_protected() {
        let tokens = protected_tokens("Reduction of NOx over NH3 yields H2O and N2.");
        assert!(tokens.contains(&"NOx".to_string()));
        assert!(tokens.contains(&"NH3".to_string()));
        assert!(tokens.contains(&"H2O".to_string()));
        assert!(tokens.contains(&"N2".to_string()));
    }

    #[test]
    fn citations_are_protected() {
        let tokens = protected_tokens("as shown previously [12] and by (Smith et al., 2019).");
        assert!(tokens.contains(&"[12]".to_string()));
        assert!(tokens.contains(&"(Smith et al., 2019)".to_string()));
    }

    #[test]
    fn spacing_changes_are_accepted() {
        let raw = "TheNOx conversionwas measured[3].";
        let fixed = "The NOx conversion was measured [3].";
        assert!(fix_is_acceptable(raw, fixed, 0.10));
    }

    #[test]
    fn dropped_tokens_are_rejected() {
        let raw = "NOx conversion reached 95% [3].";
        let fixed = "NO x conversion reached 95% [3]."; // formula corrupted
        assert!(!fix_is_acceptable(raw, fixed, 0.10));
    }

    #[test]
    fn truncation_is_rejected() {
        let raw = "A long paragraph about selective catalytic reduction over zeolite \
                   catalysts at low temperature with ammonia as the reducing agent.";
        let fixed = "A long paragraph about selective";
        assert!(!fix_is_acceptable(raw, fixed, 0.10));
    }

    #[test]
    fn modest_shrink_within_tolerance_is_accepted() {
        // Removing a duplicated word loses a few characters; that is fine.
        let raw = "the the catalyst was calcined at 550";
        let fixed = "the catalyst was calcined at 550";
        assert!(fix_is_acceptable(raw, fixed, 0.15));
    }

    #[test]
    fn ordinary_capitalised_words_are_not_formulas() {
        let tokens = protected_tokens("The Experimental Section describes the setup.");
        assert!(tokens.is_empty(), "got: {tokens:?}");
    }
}
