// src/discovery/filters.rs
//! Search-filter construction: SOC → industry keywords, location broadening,
//! and the seed-driven secondary parameters.

use serde::{Deserialize, Serialize};

use crate::config::DiscoveryConfig;
use crate::domain::CourseDomain;
use crate::occupations::CoordinatedOccupation;

/// Provider-neutral organization search filter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchFilter {
    pub locations: Vec<String>,
    pub industry_keywords: Vec<String>,
    pub excluded_titles: Vec<String>,
    /// "min,max" employee-count buckets.
    pub employee_ranges: Vec<String>,
    /// Contact titles to look for during enrichment.
    pub contact_titles: Vec<String>,
    pub page_size: usize,
}

/// Specific SOC prefixes checked before the major-group table.
const SOC_SPECIFIC: &[(&str, &[&str])] = &[
    ("17-2141", &["mechanical engineering", "hvac", "industrial machinery"]),
    ("17-2071", &["electrical engineering", "electronics", "semiconductors"]),
    ("17-2072", &["electronics", "semiconductors"]),
    ("17-2051", &["civil engineering", "construction"]),
    ("17-2112", &["industrial automation", "manufacturing"]),
    ("17-2011", &["aerospace", "aviation"]),
    ("17-2081", &["environmental services", "renewable energy"]),
    ("15-1252", &["computer software", "saas"]),
    ("15-2051", &["data analytics", "artificial intelligence"]),
    ("15-1212", &["computer & network security"]),
    ("13-2051", &["financial services", "investment management"]),
    ("13-1161", &["market research", "marketing & advertising"]),
    ("13-1081", &["logistics & supply chain"]),
    ("11-2021", &["marketing & advertising"]),
    ("19-1042", &["biotechnology", "pharmaceuticals"]),
    ("29-1141", &["hospital & health care"]),
];

const SOC_MAJOR: &[(&str, &[&str])] = &[
    ("11", &["management consulting", "business services"]),
    ("13", &["financial services", "accounting", "management consulting"]),
    ("15", &["information technology", "computer software", "internet"]),
    ("17", &["engineering", "manufacturing", "industrial automation"]),
    ("19", &["research", "biotechnology", "environmental services"]),
    ("29", &["hospital & health care", "medical devices"]),
    ("31", &["health, wellness & fitness", "medical practice"]),
    ("41", &["retail", "wholesale"]),
    ("43", &["business services"]),
    ("47", &["construction"]),
    ("49", &["mechanical or industrial engineering"]),
    ("51", &["manufacturing", "industrial automation"]),
];

const DOMAIN_DEFAULT: &[(CourseDomain, &[&str])] = &[
    (CourseDomain::BusinessManagement, &["management consulting", "financial services"]),
    (CourseDomain::EngineeringTechnical, &["engineering", "manufacturing"]),
    (CourseDomain::ComputerTech, &["information technology", "computer software"]),
    (CourseDomain::HealthcareScience, &["hospital & health care", "biotechnology"]),
];

/// Ordered, deduplicated industry keywords inferred from the top occupations,
/// falling back to the domain's defaults when the occupations yield none.
pub fn industry_keywords(
    occupations: &[CoordinatedOccupation],
    domain: CourseDomain,
    max: usize,
) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();

    for o in occupations {
        let code = o.occupation.code.as_str();
        if let Some((_, kws)) = SOC_SPECIFIC.iter().find(|(p, _)| code.starts_with(p)) {
            kws.iter().for_each(|k| push_unique(&mut out, k));
        }
    }
    for o in occupations {
        if let Some(major) = o.occupation.soc_major() {
            if let Some((_, kws)) = SOC_MAJOR.iter().find(|(m, _)| *m == major) {
                kws.iter().for_each(|k| push_unique(&mut out, k));
            }
        }
    }
    if out.is_empty() {
        let fallback: Vec<CourseDomain> = match domain {
            CourseDomain::Hybrid | CourseDomain::Unknown => vec![
                CourseDomain::EngineeringTechnical,
                CourseDomain::ComputerTech,
                CourseDomain::BusinessManagement,
            ],
            d => vec![d],
        };
        for d in fallback {
            if let Some((_, kws)) = DOMAIN_DEFAULT.iter().find(|(x, _)| *x == d) {
                kws.iter().for_each(|k| push_unique(&mut out, k));
            }
        }
    }
    out.truncate(max.max(1));
    out
}

fn push_unique(out: &mut Vec<String>, k: &str) {
    if !out.iter().any(|x| x.eq_ignore_ascii_case(k)) {
        out.push(k.to_string());
    }
}

/// First ⌈n/2⌉ keywords: the most specific half.
pub fn reduce_keywords(keywords: &[String]) -> Vec<String> {
    let keep = keywords.len().div_ceil(2);
    keywords.iter().take(keep).cloned().collect()
}

/* ----------------------------
Location broadening
---------------------------- */

const US_STATES: &[(&str, &str)] = &[
    ("AL", "Alabama"), ("AK", "Alaska"), ("AZ", "Arizona"), ("AR", "Arkansas"),
    ("CA", "California"), ("CO", "Colorado"), ("CT", "Connecticut"), ("DE", "Delaware"),
    ("FL", "Florida"), ("GA", "Georgia"), ("HI", "Hawaii"), ("ID", "Idaho"),
    ("IL", "Illinois"), ("IN", "Indiana"), ("IA", "Iowa"), ("KS", "Kansas"),
    ("KY", "Kentucky"), ("LA", "Louisiana"), ("ME", "Maine"), ("MD", "Maryland"),
    ("MA", "Massachusetts"), ("MI", "Michigan"), ("MN", "Minnesota"), ("MS", "Mississippi"),
    ("MO", "Missouri"), ("MT", "Montana"), ("NE", "Nebraska"), ("NV", "Nevada"),
    ("NH", "New Hampshire"), ("NJ", "New Jersey"), ("NM", "New Mexico"), ("NY", "New York"),
    ("NC", "North Carolina"), ("ND", "North Dakota"), ("OH", "Ohio"), ("OK", "Oklahoma"),
    ("OR", "Oregon"), ("PA", "Pennsylvania"), ("RI", "Rhode Island"), ("SC", "South Carolina"),
    ("SD", "South Dakota"), ("TN", "Tennessee"), ("TX", "Texas"), ("UT", "Utah"),
    ("VT", "Vermont"), ("VA", "Virginia"), ("WA", "Washington"), ("WV", "West Virginia"),
    ("WI", "Wisconsin"), ("WY", "Wyoming"), ("DC", "District of Columbia"),
];

/// Region for a "City, ST" / "City, State[, Country]" location. The last
/// non-country component is taken as the region; state codes are expanded.
pub fn region_of(location: &str, country: &str) -> Option<String> {
    let parts: Vec<&str> = location
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .filter(|p| !p.eq_ignore_ascii_case(country) && !is_country_alias(p))
        .collect();
    if parts.len() < 2 {
        return None;
    }
    let region = parts[parts.len() - 1];
    let expanded = US_STATES
        .iter()
        .find(|(code, name)| code.eq_ignore_ascii_case(region) || name.eq_ignore_ascii_case(region))
        .map(|(_, name)| name.to_string())
        .unwrap_or_else(|| region.to_string());
    Some(expanded)
}

/// "Texas" → "TX"; codes pass through uppercased.
pub(crate) fn state_code(s: &str) -> Option<&'static str> {
    US_STATES
        .iter()
        .find(|(code, name)| code.eq_ignore_ascii_case(s) || name.eq_ignore_ascii_case(s))
        .map(|(code, _)| *code)
}

fn is_country_alias(s: &str) -> bool {
    ["usa", "us", "u.s.", "u.s.a.", "united states", "united states of america"]
        .iter()
        .any(|a| a.eq_ignore_ascii_case(s))
}

/* ----------------------------
Seed-driven secondary parameters
---------------------------- */

const CONTACT_TITLE_SETS: &[&[&str]] = &[
    &["engineering manager", "director of engineering", "cto"],
    &["university relations", "campus recruiting manager", "talent development"],
    &["operations manager", "project manager", "program manager"],
    &["founder", "ceo", "president"],
    &["r&d manager", "innovation manager", "head of research"],
];

const EMPLOYEE_RANGES: &[&str] = &[
    "1,10", "11,50", "51,200", "201,500", "501,1000", "1001,5000", "5001,10000",
];

/// Two distinct contact-title categories chosen by the seed.
pub fn contact_titles(seed: u64) -> Vec<String> {
    let n = CONTACT_TITLE_SETS.len() as u64;
    let first = (seed % n) as usize;
    let offset = 1 + ((seed >> 16) % (n - 1)) as usize;
    let second = (first + offset) % CONTACT_TITLE_SETS.len();
    CONTACT_TITLE_SETS[first]
        .iter()
        .chain(CONTACT_TITLE_SETS[second].iter())
        .map(|s| s.to_string())
        .collect()
}

/// Three adjacent employee-size buckets chosen by the seed.
pub fn employee_ranges(seed: u64) -> Vec<String> {
    let windows = EMPLOYEE_RANGES.len() - 2;
    let start = ((seed >> 32) % windows as u64) as usize;
    EMPLOYEE_RANGES[start..start + 3]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Everything the cascade needs to build per-level filters.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterPlan {
    pub location: Option<String>,
    pub region: Option<String>,
    pub country: String,
    pub industry_keywords: Vec<String>,
    pub template: SearchFilter,
}

impl FilterPlan {
    pub fn build(
        location: Option<&str>,
        occupations: &[CoordinatedOccupation],
        domain: CourseDomain,
        seed: u64,
        cfg: &DiscoveryConfig,
    ) -> Self {
        let location = location.map(str::trim).filter(|l| !l.is_empty()).map(str::to_string);
        let country = cfg.default_country.clone();
        let region = location.as_deref().and_then(|l| region_of(l, &country));
        Self {
            industry_keywords: industry_keywords(occupations, domain, cfg.max_keywords),
            template: SearchFilter {
                locations: Vec::new(),
                industry_keywords: Vec::new(),
                excluded_titles: cfg.excluded_titles.clone(),
                employee_ranges: employee_ranges(seed),
                contact_titles: contact_titles(seed),
                page_size: cfg.page_size.max(1),
            },
            location,
            region,
            country,
        }
    }

    pub fn filter(&self, location: &str, keywords: &[String]) -> SearchFilter {
        SearchFilter {
            locations: vec![location.to_string()],
            industry_keywords: keywords.to_vec(),
            ..self.template.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_expands_state_codes() {
        assert_eq!(region_of("Austin, TX", "United States").as_deref(), Some("Texas"));
        assert_eq!(region_of("Austin, Texas, USA", "United States").as_deref(), Some("Texas"));
        assert_eq!(region_of("Austin", "United States"), None);
        assert_eq!(region_of("Lyon, Auvergne-Rhone-Alpes", "France").as_deref(), Some("Auvergne-Rhone-Alpes"));
    }

    #[test]
    fn reduced_keywords_keep_the_first_half_rounded_up() {
        let k: Vec<String> = ["a", "b", "c", "d", "e"].iter().map(|s| s.to_string()).collect();
        assert_eq!(reduce_keywords(&k), vec!["a", "b", "c"]);
        assert!(reduce_keywords(&[]).is_empty());
    }

    #[test]
    fn seed_choices_are_stable_and_bounded() {
        for seed in [0u64, 1, 42, u64::MAX, 0xdead_beef_cafe_f00d] {
            let t = contact_titles(seed);
            assert_eq!(t.len(), 6);
            assert_eq!(t, contact_titles(seed));
            let r = employee_ranges(seed);
            assert_eq!(r.len(), 3);
            let i = EMPLOYEE_RANGES.iter().position(|x| *x == r[0]).unwrap();
            assert_eq!(EMPLOYEE_RANGES[i + 1], r[1]);
        }
    }

    #[test]
    fn no_occupations_fall_back_to_domain_keywords() {
        let k = industry_keywords(&[], CourseDomain::ComputerTech, 10);
        assert_eq!(k, vec!["information technology", "computer software"]);
        let k = industry_keywords(&[], CourseDomain::Unknown, 3);
        assert_eq!(k.len(), 3);
    }
}
