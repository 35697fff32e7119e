use serde_json::json;

/// Static two-level category tree used to tag wrong questions. Seeded once,
/// never mutated at runtime. Tags are validated against the category level;
/// subcategories are descriptive labels shown in breakdowns.
pub struct CategoryTaxonomy;

const CATEGORIES: &[(&str, &[&str])] = &[
    (
        "Arithmetic",
        &[
            "Addition",
            "Subtraction",
            "Multiplication",
            "Division",
            "Fractions",
            "Decimals",
        ],
    ),
    (
        "Algebra",
        &[
            "Linear Equations",
            "Quadratic Equations",
            "Systems of Equations",
            "Inequalities",
            "Functions",
        ],
    ),
    (
        "Geometry",
        &[
            "Angles",
            "Triangles",
            "Circles",
            "Area",
            "Volume",
            "Coordinate Geometry",
        ],
    ),
    (
        "Statistics",
        &[
            "Mean/Median/Mode",
            "Probability",
            "Data Analysis",
            "Standard Deviation",
        ],
    ),
    (
        "Number Theory",
        &[
            "Prime Numbers",
            "Factors",
            "Multiples",
            "GCD/LCM",
            "Modular Arithmetic",
        ],
    ),
    (
        "Calculus",
        &["Limits", "Derivatives", "Integrals", "Differential Equations"],
    ),
    (
        "Logic",
        &[
            "Word Problems",
            "Pattern Recognition",
            "Logical Reasoning",
            "Proof Techniques",
        ],
    ),
];

impl CategoryTaxonomy {
    pub fn contains_category(category: &str) -> bool {
        CATEGORIES.iter().any(|(name, _)| *name == category)
    }

    pub fn as_json() -> serde_json::Value {
        let mut map = serde_json::Map::new();
        for (name, subs) in CATEGORIES {
            map.insert((*name).to_string(), json!(subs));
        }
        serde_json::Value::Object(map)
    }
}
