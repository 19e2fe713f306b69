// src/domain.rs
//! Course-domain classification by confidence-weighted voting over the SOC
//! major groups of the coordinated occupations.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::occupations::{soc_major, CoordinatedOccupation};

pub const HYBRID_SHARE: f32 = 0.6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CourseDomain {
    BusinessManagement,
    EngineeringTechnical,
    ComputerTech,
    HealthcareScience,
    Hybrid,
    Unknown,
}

impl CourseDomain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BusinessManagement => "business_management",
            Self::EngineeringTechnical => "engineering_technical",
            Self::ComputerTech => "computer_tech",
            Self::HealthcareScience => "healthcare_science",
            Self::Hybrid => "hybrid",
            Self::Unknown => "unknown",
        }
    }

    /// Voting buckets, in tie-break order.
    const BUCKETS: [CourseDomain; 4] = [
        Self::BusinessManagement,
        Self::EngineeringTechnical,
        Self::ComputerTech,
        Self::HealthcareScience,
    ];
}

impl fmt::Display for CourseDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// SOC major group → voting bucket. Majors outside the table cast no vote.
pub fn bucket_for_major(major: &str) -> Option<CourseDomain> {
    match major {
        "11" | "13" | "41" | "43" => Some(CourseDomain::BusinessManagement),
        "17" | "47" | "49" | "51" => Some(CourseDomain::EngineeringTechnical),
        "15" => Some(CourseDomain::ComputerTech),
        "29" | "31" | "19" => Some(CourseDomain::HealthcareScience),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseDomainClassification {
    pub domain: CourseDomain,
    pub confidence: f32,
    /// Leading bucket even when the label is hybrid.
    pub primary: Option<CourseDomain>,
    pub votes: Vec<(CourseDomain, f32)>,
    pub reasoning: String,
}

impl CourseDomainClassification {
    pub fn unknown(reasoning: impl Into<String>) -> Self {
        Self {
            domain: CourseDomain::Unknown,
            confidence: 0.0,
            primary: None,
            votes: Vec::new(),
            reasoning: reasoning.into(),
        }
    }
}

/// Classify from raw (code, confidence) pairs.
pub fn classify_codes(codes: &[(&str, f32)]) -> CourseDomainClassification {
    let mut tally = [0.0f32; 4];
    let mut voters = 0usize;
    for (code, conf) in codes {
        let Some(bucket) = soc_major(code).and_then(bucket_for_major) else {
            continue;
        };
        let w = conf.max(0.0);
        if w == 0.0 {
            continue;
        }
        if let Some(i) = CourseDomain::BUCKETS.iter().position(|b| *b == bucket) {
            tally[i] += w;
            voters += 1;
        }
    }

    let total: f32 = tally.iter().sum();
    if total <= 0.0 {
        return CourseDomainClassification::unknown(format!(
            "none of {} occupation codes fell into a known domain",
            codes.len()
        ));
    }

    let mut votes: Vec<(CourseDomain, f32)> = CourseDomain::BUCKETS
        .iter()
        .copied()
        .zip(tally)
        .filter(|(_, v)| *v > 0.0)
        .collect();
    // stable: ties keep bucket order
    votes.sort_by(|a, b| b.1.total_cmp(&a.1));

    let (leader, top) = votes[0];
    let share = top / total;
    let runner_up = votes.get(1).map(|(d, v)| (*d, *v));

    let (domain, confidence) = match runner_up {
        Some((_, v)) if share < HYBRID_SHARE && v > 0.0 => (CourseDomain::Hybrid, 1.0 - share),
        _ => (leader, share),
    };

    let reasoning = match (domain, runner_up) {
        (CourseDomain::Hybrid, Some((second, _))) => format!(
            "{leader} leads with {:.0}% of weighted votes from {voters} occupations, below the {:.0}% needed; {second} also voted",
            share * 100.0,
            HYBRID_SHARE * 100.0
        ),
        _ => format!(
            "{leader} holds {:.0}% of weighted votes from {voters} occupations",
            share * 100.0
        ),
    };

    CourseDomainClassification {
        domain,
        confidence: confidence.clamp(0.0, 1.0),
        primary: Some(leader),
        votes,
        reasoning,
    }
}

/// Classify the coordinator's output; each occupation votes with its
/// average provider confidence.
pub fn classify(occupations: &[CoordinatedOccupation]) -> CourseDomainClassification {
    let codes: Vec<(&str, f32)> = occupations
        .iter()
        .map(|o| (o.occupation.code.as_str(), o.avg_confidence))
        .collect();
    classify_codes(&codes)
}

/// Major group of the occupation with the highest consensus score, used by
/// the hybrid exclusion heuristic. Ties keep the earlier occupation.
pub fn dominant_soc_major(occupations: &[CoordinatedOccupation]) -> Option<String> {
    occupations
        .iter()
        .filter(|o| o.occupation.soc_major().is_some())
        .fold(None, |best: Option<&CoordinatedOccupation>, cur| match best {
            Some(b) if b.consensus_score >= cur.consensus_score => Some(b),
            _ => Some(cur),
        })
        .and_then(|o| o.occupation.soc_major())
        .map(str::to_string)
}
