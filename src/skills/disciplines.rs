// src/skills/disciplines.rs
//! Title-based fallback: curated discipline → skill lists, plus the level
//! multiplier applied to inferred confidences.

use once_cell::sync::Lazy;
use regex::Regex;

/// (title substrings, inferred skills). Order matters: earlier rows win ties.
pub(crate) const DISCIPLINES: &[(&[&str], &[&str])] = &[
    (
        &["mechanical", "thermal", "thermodynamic"],
        &[
            "Thermodynamics",
            "Heat Transfer",
            "Fluid Mechanics",
            "CAD",
            "Finite Element Analysis",
            "Manufacturing Processes",
        ],
    ),
    (
        &["electrical", "electronics"],
        &[
            "Circuit Design",
            "Signal Processing",
            "Embedded Systems",
            "Control Systems",
            "Power Systems",
        ],
    ),
    (
        &["civil", "structural"],
        &[
            "Structural Analysis",
            "Geotechnical Engineering",
            "Construction Management",
            "AutoCAD",
        ],
    ),
    (
        &["chemical"],
        &[
            "Process Design",
            "Reaction Engineering",
            "Mass Transfer",
            "Process Control",
        ],
    ),
    (
        &["industrial"],
        &[
            "Operations Research",
            "Lean Manufacturing",
            "Quality Control",
            "Supply Chain Management",
        ],
    ),
    (
        &["data science", "analytics", "machine learning"],
        &[
            "Machine Learning",
            "Statistical Analysis",
            "Python",
            "Data Visualization",
            "SQL",
        ],
    ),
    (
        &["cyber", "security"],
        &[
            "Cybersecurity",
            "Network Security",
            "Risk Assessment",
            "Incident Response",
        ],
    ),
    (
        &["computer science", "software", "programming", "computing"],
        &[
            "Software Engineering",
            "Algorithms",
            "Data Structures",
            "Databases",
            "Web Development",
        ],
    ),
    (
        &["marketing"],
        &[
            "Market Research",
            "Marketing Strategy",
            "Consumer Behavior",
            "Digital Marketing",
            "Brand Management",
        ],
    ),
    (
        &["accounting"],
        &["Accounting", "Auditing", "Tax Preparation", "Excel"],
    ),
    (
        &["finance", "financial"],
        &[
            "Financial Analysis",
            "Financial Modeling",
            "Investment Analysis",
            "Risk Management",
        ],
    ),
    (
        &["supply chain", "logistics"],
        &[
            "Supply Chain Management",
            "Logistics",
            "Inventory Management",
            "Procurement",
        ],
    ),
    (
        &["business", "management", "entrepreneur"],
        &[
            "Project Management",
            "Strategic Planning",
            "Business Analytics",
            "Operations Management",
        ],
    ),
    (
        &["nursing", "health", "clinical"],
        &[
            "Patient Care",
            "Clinical Research",
            "Health Informatics",
            "Public Health",
        ],
    ),
    (
        &["biology", "biotech", "biomedical"],
        &[
            "Molecular Biology",
            "Laboratory Techniques",
            "Biostatistics",
            "Bioinformatics",
        ],
    ),
    (
        &["environmental", "sustainability"],
        &[
            "Environmental Impact Assessment",
            "Sustainability",
            "GIS",
            "Water Resources",
        ],
    ),
];

/// Emitted when the title matches no discipline.
pub(crate) const GENERIC_ANALYTICAL: &[&str] = &[
    "Critical Thinking",
    "Problem Solving",
    "Data Analysis",
    "Research Methods",
    "Technical Communication",
];

/// At most this many disciplines contribute to one title.
pub(crate) const MAX_DISCIPLINES: usize = 2;

/// Introductory wording or a 100-level course number as a whole token
/// ("ME 101" yes, "ME 1000" no).
static INTRO_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:intro\w*|beginner|freshman|foundations?|first[- ]year|1\d\d)\b")
        .expect("intro regex")
});

static GRADUATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:graduate|master\w*|doctoral|phd|postgrad\w*)\b").expect("graduate regex")
});

static ADVANCED_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:advanced|senior|capstone|4\d\d)\b").expect("advanced regex")
});

/// Skills inferred for `title`, from up to `MAX_DISCIPLINES` matching rows.
pub(crate) fn skills_for_title(title: &str) -> Vec<&'static str> {
    let t = title.to_ascii_lowercase();
    let mut out: Vec<&'static str> = Vec::new();
    for (_, skills) in DISCIPLINES
        .iter()
        .filter(|(needles, _)| needles.iter().any(|n| t.contains(n)))
        .take(MAX_DISCIPLINES)
    {
        for s in skills.iter() {
            if !out.contains(s) {
                out.push(s);
            }
        }
    }
    out
}

pub(crate) fn is_introductory(level: Option<&str>, title: Option<&str>) -> bool {
    let hay = format!(
        "{} {}",
        level.unwrap_or_default(),
        title.unwrap_or_default()
    )
    .to_ascii_lowercase();
    INTRO_RE.is_match(&hay)
}

/// Level-dependent multiplier for title-inferred confidences.
pub(crate) fn level_multiplier(level: Option<&str>) -> f32 {
    let Some(level) = level else {
        return 0.9;
    };
    let l = level.to_ascii_lowercase();
    if GRADUATE_RE.is_match(&l) {
        1.0
    } else if ADVANCED_RE.is_match(&l) {
        0.95
    } else if INTRO_RE.is_match(&l) {
        0.85
    } else {
        0.9
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_lookup_is_substring_based() {
        let s = skills_for_title("Thermal Systems Engineering");
        assert!(s.contains(&"Heat Transfer"));
        assert!(skills_for_title("Underwater Basket Weaving").is_empty());
    }

    #[test]
    fn at_most_two_disciplines_contribute() {
        // matches mechanical, electrical, industrial, business...
        let s = skills_for_title("Mechanical Electrical Industrial Business");
        assert!(s.contains(&"Thermodynamics"));
        assert!(s.contains(&"Circuit Design"));
        assert!(!s.contains(&"Operations Research"));
    }

    #[test]
    fn levels_scale_monotonically() {
        assert!(level_multiplier(Some("Graduate")) > level_multiplier(Some("Senior capstone")));
        assert!(level_multiplier(Some("Senior capstone")) > level_multiplier(Some("Intermediate")));
        assert!(level_multiplier(Some("Intermediate")) > level_multiplier(Some("Introductory")));
        assert!(is_introductory(Some("Intro"), None));
        assert!(!is_introductory(Some("Graduate"), Some("Heat Transfer")));
    }

    #[test]
    fn course_numbers_match_as_whole_tokens() {
        assert!(is_introductory(None, Some("ME 101: Statics")));
        assert!(is_introductory(None, Some("Foundations of Computing")));
        assert!(!is_introductory(None, Some("ME 1000 Thermal Design")));
        assert!(!is_introductory(None, Some("CS 2100 Data Structures")));
        assert!((level_multiplier(Some("ENGR 450")) - 0.95).abs() < 1e-6);
        assert!((level_multiplier(Some("Level 4000")) - 0.9).abs() < 1e-6);
        assert!((level_multiplier(Some("Undergraduate")) - 0.9).abs() < 1e-6);
    }
}
