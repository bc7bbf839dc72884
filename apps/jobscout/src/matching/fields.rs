/// Domain keywords for the fields the profile layer offers.
const FIELD_KEYWORDS: &[(&str, &[&str])] = &[
    ("data science & ai", &["data", "analytics", "ai", "machine learning"]),
    ("software development", &["software", "developer", "programming", "backend", "frontend"]),
    ("it & technology", &["it", "infrastructure", "devops", "cloud", "support"]),
    ("finance & accounting", &["finance", "accounting", "controller", "economics", "audit"]),
    ("marketing & communication", &["marketing", "communication", "brand", "seo", "content"]),
    ("engineering", &["engineer", "mechanical", "electrical", "technical", "production"]),
    ("healthcare", &["health", "clinical", "medical", "nurse", "pharma"]),
    ("sales", &["sales", "account", "business development"]),
    ("design & creative", &["design", "ux", "graphic", "creative"]),
    ("human resources", &["hr", "recruit", "talent", "people"]),
];

/// Lower-cased terms that count as a hit for `field`: the field's own words
/// plus its domain keywords when the field is known.
pub fn field_terms(field: &str) -> Vec<String> {
    let normalized = field.trim().to_lowercase();
    if normalized.is_empty() {
        return Vec::new();
    }

    let mut terms: Vec<String> = normalized
        .split(['&', ',', '/'])
        .map(str::trim)
        .filter(|t| t.len() > 2)
        .map(String::from)
        .collect();

    if let Some((_, keywords)) = FIELD_KEYWORDS.iter().find(|(name, _)| *name == normalized) {
        for keyword in *keywords {
            if !terms.iter().any(|t| t == keyword) {
                terms.push(keyword.to_string());
            }
        }
    }
    terms
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_field_expands_to_domain_keywords() {
        let terms = field_terms("Data Science & AI");
        for expected in ["data", "analytics", "ai", "machine learning"] {
            assert!(terms.contains(&expected.to_string()), "missing {expected}: {terms:?}");
        }
        assert!(terms.contains(&"data science".to_string()));
    }

    #[test]
    fn test_unknown_field_uses_its_own_words() {
        assert_eq!(field_terms("Logistics"), vec!["logistics"]);
        assert!(field_terms("   ").is_empty());
    }
}
