use crate::models::ProfileSearchRequest;
use crate::scrape::ScrapeQuery;

const MAX_KEYWORD_SETS: usize = 3;
const MAX_LOCATIONS: usize = 2;
const DEFAULT_JOB_TYPE: &str = "fulltime";

/// Listing-site job type for a profile job-type label.
pub fn job_type_code(label: &str) -> Option<&'static str> {
    match label.trim().to_lowercase().as_str() {
        "full-time" | "permanent" | "new graduate" => Some("fulltime"),
        "part-time" | "student job" | "volunteer work" => Some("parttime"),
        "internship" | "apprentice" => Some("internship"),
        "temporary" => Some("contract"),
        _ => None,
    }
}

/// Extra search word implied by a job-type label.
pub fn search_modifier(label: &str) -> Option<&'static str> {
    match label.trim().to_lowercase().as_str() {
        "student job" => Some("student"),
        "new graduate" => Some("graduate"),
        "volunteer work" => Some("volunteer"),
        "apprentice" => Some("trainee"),
        _ => None,
    }
}

/// Maps Danish regions and municipalities onto a searchable city.
pub fn search_location(raw: &str, default_location: &str) -> String {
    let loc = raw.trim().to_lowercase();
    if loc.is_empty() {
        return default_location.to_string();
    }
    let city = if loc.contains("hovedstaden") || loc.contains("københavn") || loc.contains("copenhagen") {
        "copenhagen"
    } else if loc.contains("midtjylland") || loc.starts_with("aarhus") {
        "aarhus"
    } else if loc.contains("nordjylland") || loc.starts_with("aalborg") {
        "aalborg"
    } else if loc.contains("syddanmark") || loc.starts_with("odense") {
        "odense"
    } else if loc.starts_with("esbjerg") {
        "esbjerg"
    } else if let Some(town) = loc.strip_suffix(" kommune") {
        return format!("{}, denmark", town.trim());
    } else {
        return loc;
    };
    format!("{city}, denmark")
}

/// Expands a request into at most 3 keyword sets × 2 locations.
pub fn derive_queries(request: &ProfileSearchRequest, default_location: &str) -> Vec<ScrapeQuery> {
    let profile = request.profile();

    let modifier = profile.job_types.iter().find_map(|t| search_modifier(t));
    let keywords: Vec<String> = profile
        .keywords
        .iter()
        .take(MAX_KEYWORD_SETS)
        .map(|k| match modifier {
            Some(m) if !k.to_lowercase().contains(m) => format!("{k} {m}"),
            _ => k.clone(),
        })
        .collect();

    let mut locations: Vec<String> = Vec::new();
    for raw in profile.locations.iter().take(MAX_LOCATIONS) {
        let loc = search_location(raw, default_location);
        if !locations.contains(&loc) {
            locations.push(loc);
        }
    }
    if locations.is_empty() {
        locations.push(default_location.to_string());
    }

    let job_type = profile
        .job_types
        .iter()
        .find_map(|t| job_type_code(t))
        .unwrap_or(DEFAULT_JOB_TYPE)
        .to_string();
    let remote = request.remote_preference.as_filter();
    let per_tuple = (request.max_results_per_query as usize / keywords.len().max(1)).max(1);

    keywords
        .iter()
        .flat_map(|k| {
            locations.iter().map(|l| ScrapeQuery {
                keywords: k.clone(),
                location: l.clone(),
                job_type: job_type.clone(),
                remote,
                max_results: per_tuple,
            })
        })
        .collect()
}
