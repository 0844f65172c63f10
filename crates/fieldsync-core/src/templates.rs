//! # Damage Templates
//!
//! Fixed tag sets an inspector can apply to a draft in one tap. Applying a
//! template is a set union into the draft's tags.

use serde::Serialize;

/// A named group of common damage tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DamageTemplate {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub common_tags: &'static [&'static str],
}

pub const DAMAGE_TEMPLATES: [DamageTemplate; 5] = [
    DamageTemplate {
        id: "roof-damage",
        name: "Roof Damage",
        description: "Missing shingles, holes, structural damage",
        common_tags: &["Roof Damage", "Missing Shingles", "Structural Damage"],
    },
    DamageTemplate {
        id: "water-damage",
        name: "Water Damage",
        description: "Flooding, water intrusion, mold",
        common_tags: &["Water Intrusion", "Flooding", "Mold", "Water Damage"],
    },
    DamageTemplate {
        id: "structural",
        name: "Structural Issues",
        description: "Foundation cracks, wall damage, support issues",
        common_tags: &["Structural Damage", "Foundation Issues", "Wall Damage"],
    },
    DamageTemplate {
        id: "electrical",
        name: "Electrical Hazards",
        description: "Exposed wiring, electrical damage",
        common_tags: &["Electrical Hazard", "Exposed Wiring", "Power Issues"],
    },
    DamageTemplate {
        id: "exterior",
        name: "Exterior Damage",
        description: "Siding, windows, doors, gutters",
        common_tags: &["Siding Issue", "Broken Windows", "Gutter Damage"],
    },
];

/// Looks up a template by id.
pub fn find_template(id: &str) -> Option<&'static DamageTemplate> {
    DAMAGE_TEMPLATES.iter().find(|t| t.id == id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_template() {
        let t = find_template("water-damage").unwrap();
        assert_eq!(t.common_tags.len(), 4);
        assert!(find_template("hail").is_none());
    }

    #[test]
    fn test_template_ids_are_unique() {
        for (i, a) in DAMAGE_TEMPLATES.iter().enumerate() {
            for b in &DAMAGE_TEMPLATES[i + 1..] {
                assert_ne!(a.id, b.id);
            }
        }
    }
}
