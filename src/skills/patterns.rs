// src/skills/patterns.rs
//! Pattern tables for skill extraction: action verbs, stop/filler words, the
//! technical-term allow/deny lists, the tool dictionary and the per-domain
//! keyword banks. Regexes are compiled once.

use once_cell::sync::Lazy;
use regex::Regex;

use super::SkillCategory;

/// Verbs that introduce a skill phrase ("apply X", "analyze Y").
pub(crate) static ACTION_VERB_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:apply|applying|analy[sz]e|analy[sz]ing|design|designing|develop|developing|implement|implementing|evaluate|evaluating|model|modeling|modelling|simulate|simulating|optimi[sz]e|optimi[sz]ing|calculate|compute|build|building|program|programming|test|testing|construct|manage|managing|assess|create|creating|use|using|utili[sz]e|perform|conduct|interpret|formulate|solve|integrate|employ|master)\b",
    )
    .expect("action verb regex")
});

/// Capitalized multi-word terms such as "Computational Fluid Dynamics".
pub(crate) static CAPITALIZED_TERM_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b[A-Z][A-Za-z0-9+#]*(?:[ \-][A-Z][A-Za-z0-9+#]*)+").expect("capitalized term regex")
});

/// Words that end a noun phrase.
pub(crate) const PHRASE_STOP_WORDS: &[&str] = &[
    "to", "in", "of", "for", "and", "or", "with", "using", "on", "by", "from", "into", "through",
    "that", "which", "as", "at", "within", "across", "while", "when", "their", "its", "such",
    "based", "including", "via", "under", "between", "so", "is", "are", "be", "will", "can",
];

/// Leading words dropped from a phrase ("the", "appropriate", ...).
pub(crate) const LEADING_FILLER: &[&str] = &[
    "the", "a", "an", "their", "these", "this", "those", "various", "appropriate", "relevant",
    "different", "effective", "basic", "advanced", "fundamental", "key", "core", "common",
    "modern", "new", "simple", "complex", "real", "world", "real-world",
];

/// Trailing generic nouns stripped from a phrase ("fluid dynamics principles").
pub(crate) const GENERIC_TAIL: &[&str] = &[
    "principles", "principle", "concepts", "concept", "techniques", "technique", "methods",
    "method", "methodologies", "skills", "approaches", "fundamentals", "basics", "theories",
];

/// Known-bad action-phrase results.
pub(crate) const PHRASE_BLACKLIST: &[&str] = &[
    "students", "student", "knowledge", "understanding", "information", "results", "problems",
    "problem", "solutions", "solution", "ideas", "work", "data", "it", "them", "tools", "tool",
    "processes", "process", "systems", "system", "model", "models", "project", "projects",
    "design", "designs", "team", "teams", "course", "report", "reports", "findings", "evidence",
    "strategies", "practices", "ethics", "others", "one", "skills", "concepts", "principles",
    "methods", "techniques",
];

/// Technical-sounding substrings; a match overrides the instructional denylist.
pub(crate) const TECH_WHITELIST: &[&str] = &[
    "analysis", "analytics", "engineering", "design", "system", "data", "learning", "dynamics",
    "modeling", "modelling", "control", "network", "software", "programming", "mechanics",
    "transfer", "management", "accounting", "marketing", "finance", "statistic", "simulation",
    "computing", "algorithm", "database", "security", "intelligence", "manufacturing",
    "thermodynamic", "circuit", "robotic", "processing", "energy", "chain", "element", "cad",
];

/// Instructional prefixes that mark outcome boilerplate rather than a skill.
pub(crate) const INSTRUCTIONAL_PREFIXES: &[&str] = &[
    "explain", "describe", "identify", "discuss", "understand", "demonstrate", "students",
    "student", "learners", "define", "list", "compare", "summarize", "summarise", "recognize",
    "recognise", "upon", "by the end", "the", "this", "in", "by", "at", "after", "before",
    "course", "learning outcome", "outcome",
];

pub(crate) const ANALYTICAL_HINTS: &[&str] = &[
    "analysis", "analytics", "statistic", "forecast", "research", "quantitative", "evaluation",
    "assessment", "optimization", "optimisation", "critical thinking", "problem solving",
];

pub(crate) const FRAMEWORK_HINTS: &[&str] = &[
    "framework", "methodology", "agile", "scrum", "six sigma", "lean", "kanban", "itil",
];

pub(crate) struct ToolPattern {
    pub re: Regex,
    pub name: &'static str,
    pub category: SkillCategory,
}

fn tool(pattern: &str, name: &'static str, category: SkillCategory) -> ToolPattern {
    ToolPattern {
        re: Regex::new(pattern).expect("tool regex"),
        name,
        category,
    }
}

/// Fixed dictionary of software, languages and frameworks.
pub(crate) static TOOL_DICTIONARY: Lazy<Vec<ToolPattern>> = Lazy::new(|| {
    use SkillCategory::{Framework, Tool};
    vec![
        tool(r"(?i)\bmatlab\b", "MATLAB", Tool),
        tool(r"(?i)\bsimulink\b", "Simulink", Tool),
        tool(r"(?i)\bpython\b", "Python", Tool),
        tool(r"(?i)\bjava\b", "Java", Tool),
        tool(r"(?i)\bjavascript\b", "JavaScript", Tool),
        tool(r"(?i)\btypescript\b", "TypeScript", Tool),
        tool(r"(?i)(?:^|[\s,(/])c\+\+", "C++", Tool),
        tool(r"(?i)(?:^|[\s,(/])c#", "C#", Tool),
        tool(r"(?i)\bsql\b", "SQL", Tool),
        tool(r"\bR (?:programming|language)\b|\bin R\b|\bRStudio\b", "R", Tool),
        tool(r"(?i)\b(?:ms |microsoft )?excel\b", "Excel", Tool),
        tool(r"(?i)\bsolidworks\b", "SolidWorks", Tool),
        tool(r"(?i)\bautocad\b", "AutoCAD", Tool),
        tool(r"(?i)\bansys\b", "ANSYS", Tool),
        tool(r"(?i)\blabview\b", "LabVIEW", Tool),
        tool(r"(?i)\brevit\b", "Revit", Tool),
        tool(r"(?i)\bfusion 360\b", "Fusion 360", Tool),
        tool(r"(?i)\barduino\b", "Arduino", Tool),
        tool(r"(?i)\braspberry pi\b", "Raspberry Pi", Tool),
        tool(r"(?i)\btableau\b", "Tableau", Tool),
        tool(r"(?i)\bpower ?bi\b", "Power BI", Tool),
        tool(r"(?i)\bspss\b", "SPSS", Tool),
        tool(r"\bSAS\b", "SAS", Tool),
        tool(r"(?i)\bstata\b", "Stata", Tool),
        tool(r"(?i)\bminitab\b", "Minitab", Tool),
        tool(r"\bSAP\b", "SAP", Tool),
        tool(r"(?i)\bsalesforce\b", "Salesforce", Tool),
        tool(r"(?i)\bquickbooks\b", "QuickBooks", Tool),
        tool(r"(?i)\bgit(?:hub)?\b", "Git", Tool),
        tool(r"(?i)\bdocker\b", "Docker", Tool),
        tool(r"(?i)\bkubernetes\b", "Kubernetes", Tool),
        tool(r"(?i)\baws\b|\bamazon web services\b", "AWS", Tool),
        tool(r"(?i)\bazure\b", "Azure", Tool),
        tool(r"(?i)\blinux\b", "Linux", Tool),
        tool(r"(?i)\bjupyter\b", "Jupyter", Tool),
        tool(r"(?i)\bfigma\b", "Figma", Tool),
        tool(r"(?i)\breact(?:\.js)?\b", "React", Framework),
        tool(r"(?i)\bangular\b", "Angular", Framework),
        tool(r"(?i)\bdjango\b", "Django", Framework),
        tool(r"(?i)\bflask\b", "Flask", Framework),
        tool(r"(?i)\bspring boot\b", "Spring Boot", Framework),
        tool(r"(?i)\btensorflow\b", "TensorFlow", Framework),
        tool(r"(?i)\bpytorch\b", "PyTorch", Framework),
        tool(r"(?i)\bscikit-learn\b|\bsklearn\b", "Scikit-learn", Framework),
        tool(r"(?i)\bnode\.?js\b", "Node.js", Framework),
        tool(r"(?i)\.net\b", ".NET", Framework),
        tool(r"(?i)\bpandas\b", "Pandas", Framework),
        tool(r"(?i)\bnumpy\b", "NumPy", Framework),
        tool(r"(?i)\bhadoop\b", "Hadoop", Framework),
        tool(r"(?i)\bapache spark\b", "Apache Spark", Framework),
    ]
});

pub(crate) struct DomainBank {
    pub markers: &'static [&'static str],
    pub keywords: Vec<(Regex, &'static str)>,
}

fn bank(markers: &'static [&'static str], keywords: &[(&str, &'static str)]) -> DomainBank {
    DomainBank {
        markers,
        keywords: keywords
            .iter()
            .map(|(pat, name)| {
                (
                    Regex::new(&format!(r"(?i)\b(?:{pat})\b")).expect("domain keyword regex"),
                    *name,
                )
            })
            .collect(),
    }
}

/// Domain keyword banks, each gated by markers found in the course context.
pub(crate) static DOMAIN_BANKS: Lazy<Vec<DomainBank>> = Lazy::new(|| {
    vec![
        bank(
            &[
                "engineering",
                "mechanical",
                "thermal",
                "civil",
                "electrical",
                "aerospace",
                "industrial",
                "manufacturing",
            ],
            &[
                ("thermodynamics", "Thermodynamics"),
                ("fluid dynamics", "Fluid Dynamics"),
                ("fluid mechanics", "Fluid Mechanics"),
                ("heat transfer", "Heat Transfer"),
                ("heat exchangers?", "Heat Exchangers"),
                ("structural analysis", "Structural Analysis"),
                ("circuit design", "Circuit Design"),
                ("control systems?", "Control Systems"),
                ("finite element(?: analysis)?|fea", "Finite Element Analysis"),
                ("computer[- ]aided design|cad", "CAD"),
                ("hvac", "HVAC"),
                ("materials science", "Materials Science"),
                ("manufacturing processes", "Manufacturing Processes"),
                ("signal processing", "Signal Processing"),
                ("robotics", "Robotics"),
                ("mechatronics", "Mechatronics"),
                ("energy systems", "Energy Systems"),
                ("renewable energy", "Renewable Energy"),
                ("combustion", "Combustion"),
                ("plc programming|plcs?", "PLC Programming"),
                ("quality control", "Quality Control"),
                ("lean manufacturing", "Lean Manufacturing"),
            ],
        ),
        bank(
            &[
                "computer",
                "software",
                "computing",
                "programming",
                "data science",
                "information technology",
                "cyber",
            ],
            &[
                ("algorithms?", "Algorithms"),
                ("data structures", "Data Structures"),
                ("machine learning", "Machine Learning"),
                ("databases?", "Databases"),
                ("web development", "Web Development"),
                ("cloud computing", "Cloud Computing"),
                ("cybersecurity|cyber security", "Cybersecurity"),
                ("software engineering", "Software Engineering"),
                ("operating systems", "Operating Systems"),
                ("computer networks|networking", "Computer Networking"),
                ("artificial intelligence", "Artificial Intelligence"),
                ("object[- ]oriented programming", "Object-Oriented Programming"),
                ("version control", "Version Control"),
                ("distributed systems", "Distributed Systems"),
                ("data visualization", "Data Visualization"),
            ],
        ),
        bank(
            &[
                "business",
                "management",
                "marketing",
                "finance",
                "accounting",
                "economics",
                "entrepreneur",
            ],
            &[
                ("market research", "Market Research"),
                ("financial analysis", "Financial Analysis"),
                ("project management", "Project Management"),
                ("supply chain(?: management)?", "Supply Chain Management"),
                ("strategic planning", "Strategic Planning"),
                ("financial accounting|accounting", "Accounting"),
                ("marketing strateg(?:y|ies)", "Marketing Strategy"),
                ("business analytics", "Business Analytics"),
                ("operations management", "Operations Management"),
                ("consumer behaviou?r", "Consumer Behavior"),
                ("financial model(?:l)?ing", "Financial Modeling"),
                ("budgeting", "Budgeting"),
                ("risk management", "Risk Management"),
                ("entrepreneurship", "Entrepreneurship"),
            ],
        ),
        bank(
            &[
                "health",
                "nursing",
                "biology",
                "medical",
                "clinical",
                "biomedical",
                "pharmacy",
            ],
            &[
                ("clinical research", "Clinical Research"),
                ("epidemiology", "Epidemiology"),
                ("patient care", "Patient Care"),
                ("biostatistics", "Biostatistics"),
                ("public health", "Public Health"),
                ("laboratory techniques", "Laboratory Techniques"),
                ("pharmacology", "Pharmacology"),
                ("anatomy", "Anatomy"),
                ("physiology", "Physiology"),
                ("health informatics", "Health Informatics"),
                ("molecular biology", "Molecular Biology"),
                ("medical imaging", "Medical Imaging"),
            ],
        ),
    ]
});

/// Is `word` one of `list` (case-insensitive)?
pub(crate) fn in_list(list: &[&str], word: &str) -> bool {
    list.iter().any(|w| w.eq_ignore_ascii_case(word))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_static_tables_compile() {
        assert!(!TOOL_DICTIONARY.is_empty());
        assert_eq!(DOMAIN_BANKS.len(), 4);
        assert!(ACTION_VERB_RE.is_match("Apply"));
        assert!(CAPITALIZED_TERM_RE.is_match("Finite Element Analysis"));
    }

    #[test]
    fn java_does_not_match_javascript() {
        let java = TOOL_DICTIONARY.iter().find(|t| t.name == "Java").unwrap();
        assert!(!java.re.is_match("Build a JavaScript front end"));
        assert!(java.re.is_match("Write Java services"));
    }

    #[test]
    fn cpp_needs_a_boundary() {
        let cpp = TOOL_DICTIONARY.iter().find(|t| t.name == "C++").unwrap();
        assert!(cpp.re.is_match("Program embedded firmware in C++"));
        assert!(cpp.re.is_match("c++ basics"));
    }
}
