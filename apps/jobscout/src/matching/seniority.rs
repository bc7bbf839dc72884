use serde::Serialize;

use crate::models::ExperienceLevel;

/// Seniority band read off a job title or a profile's experience level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Band {
    Junior,
    Mid,
    Senior,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Alignment {
    Unknown,
    Match,
    Adjacent,
    Mismatch,
}

const JUNIOR_TOKENS: &[&str] = &[
    "junior", "jr", "graduate", "trainee", "intern", "internship", "student", "entry",
    "apprentice", "praktikant", "elev", "nyuddannet",
];

const SENIOR_TOKENS: &[&str] = &[
    "senior", "sr", "lead", "principal", "head", "chief", "director", "staff", "manager",
    "architect",
];

/// Word-level match so "intern" does not fire on "international".
pub fn title_band(title: &str) -> Band {
    let lower = title.to_lowercase();
    let words: Vec<&str> = lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();

    if words.iter().any(|w| SENIOR_TOKENS.contains(w)) {
        Band::Senior
    } else if words.iter().any(|w| JUNIOR_TOKENS.contains(w)) {
        Band::Junior
    } else {
        Band::Mid
    }
}

pub fn profile_band(level: ExperienceLevel) -> Option<Band> {
    match level {
        ExperienceLevel::Unspecified => None,
        ExperienceLevel::Student | ExperienceLevel::Entry => Some(Band::Junior),
        ExperienceLevel::Mid => Some(Band::Mid),
        ExperienceLevel::Senior | ExperienceLevel::Lead => Some(Band::Senior),
    }
}

pub fn alignment(title: &str, level: ExperienceLevel) -> Alignment {
    let Some(wanted) = profile_band(level) else {
        return Alignment::Unknown;
    };
    let offered = title_band(title);
    match (wanted as i8 - offered as i8).abs() {
        0 => Alignment::Match,
        1 => Alignment::Adjacent,
        _ => Alignment::Mismatch,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_bands() {
        assert_eq!(title_band("Senior Data Analyst"), Band::Senior);
        assert_eq!(title_band("Graduate Engineer"), Band::Junior);
        assert_eq!(title_band("Data Analyst"), Band::Mid);
        assert_eq!(title_band("International Sales Coordinator"), Band::Mid);
    }

    #[test]
    fn test_alignment_against_profile() {
        assert_eq!(alignment("Senior Data Analyst", ExperienceLevel::Mid), Alignment::Adjacent);
        assert_eq!(alignment("Senior Data Analyst", ExperienceLevel::Lead), Alignment::Match);
        assert_eq!(alignment("Senior Data Analyst", ExperienceLevel::Student), Alignment::Mismatch);
        assert_eq!(alignment("Junior Developer", ExperienceLevel::Entry), Alignment::Match);
        assert_eq!(alignment("Developer", ExperienceLevel::Unspecified), Alignment::Unknown);
    }
}
