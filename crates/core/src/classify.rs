use serde::{Deserialize, Serialize};

/// Industry tag used to select a benchmark profile. `General` is a fully
/// valid tag with its own profile, not an error state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndustryTag {
    Automotive,
    Legal,
    Healthcare,
    RealEstate,
    Restaurant,
    Ecommerce,
    Saas,
    Education,
    Fitness,
    Beauty,
    General,
}

impl IndustryTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            IndustryTag::Automotive => "automotive",
            IndustryTag::Legal => "legal",
            IndustryTag::Healthcare => "healthcare",
            IndustryTag::RealEstate => "real_estate",
            IndustryTag::Restaurant => "restaurant",
            IndustryTag::Ecommerce => "ecommerce",
            IndustryTag::Saas => "saas",
            IndustryTag::Education => "education",
            IndustryTag::Fitness => "fitness",
            IndustryTag::Beauty => "beauty",
            IndustryTag::General => "general",
        }
    }
}

/// Classification output. `location` is best-effort; `None` means no
/// gazetteer entry matched, never a default city.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub industry: IndustryTag,
    pub location: Option<String>,
}

// Ordered rule list, evaluated top to bottom; the first rule with a matching
// keyword wins. More specific industries precede generic ones, so "The Car
// Shop" is automotive before its "shop" token can read as ecommerce.
const INDUSTRY_RULES: &[(IndustryTag, &[&str])] = &[
    (
        IndustryTag::Automotive,
        &[
            "tyre", "tyres", "tire", "tires", "auto", "car", "vehicle", "mechanic",
            "automotive", "motor", "garage", "wheel", "brake",
        ],
    ),
    (
        IndustryTag::Legal,
        &[
            "lawyer", "lawyers", "attorney", "legal", "law", "solicitor", "solicitors",
            "barrister", "counsel", "advocate", "litigation",
        ],
    ),
    (
        IndustryTag::Healthcare,
        &[
            "dental", "dentist", "doctor", "clinic", "medical", "health", "hospital",
            "physician", "surgery", "physio",
        ],
    ),
    (
        IndustryTag::RealEstate,
        &[
            "property", "realty", "realtor", "homes", "estate", "letting", "lettings",
            "apartment", "apartments",
        ],
    ),
    (
        IndustryTag::Restaurant,
        &[
            "restaurant", "cafe", "dining", "bistro", "grill", "eatery", "cuisine",
            "diner", "pizzeria",
        ],
    ),
    (
        IndustryTag::Ecommerce,
        &[
            "shop", "store", "boutique", "retail", "outlet", "warehouse", "emporium",
        ],
    ),
    (
        IndustryTag::Saas,
        &[
            "software", "app", "platform", "cloud", "tech", "digital", "analytics",
            "crm", "erp",
        ],
    ),
    (
        IndustryTag::Education,
        &[
            "school", "university", "college", "academy", "tutor", "tutoring",
            "education", "institute",
        ],
    ),
    (
        IndustryTag::Fitness,
        &[
            "gym", "fitness", "yoga", "pilates", "workout", "crossfit",
        ],
    ),
    (
        IndustryTag::Beauty,
        &[
            "salon", "beauty", "hair", "spa", "nails", "cosmetic", "barber", "stylist",
        ],
    ),
];

// City names before state codes so "Sydney Tyres NSW" reports the city.
const GAZETTEER_CITIES: &[&str] = &[
    "sydney",
    "melbourne",
    "brisbane",
    "perth",
    "adelaide",
    "canberra",
];

const GAZETTEER_STATES: &[&str] = &["nsw", "vic", "qld", "wa", "sa", "act", "nt", "tas"];

/// Classify a client from its display name, with optional sample search
/// queries as a secondary signal when the name alone is inconclusive.
///
/// Always yields an industry (`General` as the fallback); the caller can feed
/// the tag straight into a benchmark profile lookup.
pub fn classify(client_name: &str, sample_queries: &[String]) -> Classification {
    let industry = industry_from_text(client_name)
        .or_else(|| {
            sample_queries
                .iter()
                .find_map(|q| industry_from_text(q))
        })
        .unwrap_or(IndustryTag::General);

    Classification {
        industry,
        location: location_from_name(client_name),
    }
}

fn industry_from_text(text: &str) -> Option<IndustryTag> {
    let tokens = tokenize(text);
    if tokens.is_empty() {
        return None;
    }

    for (tag, keywords) in INDUSTRY_RULES {
        for keyword in *keywords {
            if tokens.iter().any(|t| t == keyword) {
                return Some(*tag);
            }
        }
    }
    None
}

/// Best-effort location extraction against the fixed gazetteer.
pub fn location_from_name(client_name: &str) -> Option<String> {
    let tokens = tokenize(client_name);

    for city in GAZETTEER_CITIES {
        if tokens.iter().any(|t| t == city) {
            return Some(title_case(city));
        }
    }
    for state in GAZETTEER_STATES {
        if tokens.iter().any(|t| t == state) {
            return Some(state.to_uppercase());
        }
    }
    None
}

fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_string())
        .collect()
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_industry_from_name_tokens() {
        let c = classify("Apex Tyres & Auto", &[]);
        assert_eq!(c.industry, IndustryTag::Automotive);
    }

    #[test]
    fn declaration_order_breaks_ties() {
        // "car" (automotive) and "shop" (ecommerce) both match; automotive is
        // declared first and wins.
        let c = classify("The Car Shop", &[]);
        assert_eq!(c.industry, IndustryTag::Automotive);
    }

    #[test]
    fn token_matching_avoids_substring_false_positives() {
        // "scarves" contains "car" as a substring but not as a token.
        let c = classify("Silk Scarves Boutique", &[]);
        assert_eq!(c.industry, IndustryTag::Ecommerce);
    }

    #[test]
    fn falls_back_to_general() {
        let c = classify("Smith & Partners", &[]);
        assert_eq!(c.industry, IndustryTag::General);
        assert_eq!(c.location, None);
    }

    #[test]
    fn sample_queries_resolve_an_inconclusive_name() {
        let queries = vec![
            "emergency dentist near me".to_string(),
            "teeth whitening cost".to_string(),
        ];
        let c = classify("Bright Smile Group", &queries);
        assert_eq!(c.industry, IndustryTag::Healthcare);
    }

    #[test]
    fn name_signal_outranks_query_hints() {
        let queries = vec!["best pizza near me".to_string()];
        let c = classify("Harbour Legal", &queries);
        assert_eq!(c.industry, IndustryTag::Legal);
    }

    #[test]
    fn extracts_city_before_state() {
        let c = classify("Sydney Tyres NSW", &[]);
        assert_eq!(c.location.as_deref(), Some("Sydney"));
    }

    #[test]
    fn extracts_state_code() {
        let c = classify("Tyre Kings QLD", &[]);
        assert_eq!(c.location.as_deref(), Some("QLD"));
    }

    #[test]
    fn no_gazetteer_match_yields_none() {
        let c = classify("Lakeside Dental", &[]);
        assert_eq!(c.location, None);
    }
}
