pub mod engine;
pub mod profiles;

use serde::Serialize;

use self::engine::Extraction;
use self::profiles::{bruksareal, resolve_field};

/// Structured facts pulled straight from the rendered listing page. Filled
/// independently of prospectus discovery, so a baseline record exists even
/// when no document is ever found.
#[derive(Debug, Default, Clone, Serialize)]
pub struct ListingFacts {
    pub adresse: Option<Extraction>,
    pub prisantydning: Option<Extraction>,
    pub bruksareal: Option<Extraction>,
    pub rom: Option<Extraction>,
    pub soverom: Option<Extraction>,
    pub byggeaar: Option<Extraction>,
    pub eierform: Option<Extraction>,
    pub energimerking: Option<Extraction>,
    pub parkering: Option<Extraction>,
    pub balkong_terrasse: Option<Extraction>,
    pub kommunale_avgifter: Option<Extraction>,
    pub fellesgjeld: Option<Extraction>,
    pub felleskostnader: Option<Extraction>,
    pub kvadratmeterpris: Option<Extraction>,
}

impl ListingFacts {
    /// (field, winner) pairs for the fields that resolved.
    pub fn present(&self) -> Vec<(&'static str, &Extraction)> {
        [
            ("adresse", &self.adresse),
            ("prisantydning", &self.prisantydning),
            ("bruksareal", &self.bruksareal),
            ("rom", &self.rom),
            ("soverom", &self.soverom),
            ("byggeaar", &self.byggeaar),
            ("eierform", &self.eierform),
            ("energimerking", &self.energimerking),
            ("parkering", &self.parkering),
            ("balkong_terrasse", &self.balkong_terrasse),
            ("kommunale_avgifter", &self.kommunale_avgifter),
            ("fellesgjeld", &self.fellesgjeld),
            ("felleskostnader", &self.felleskostnader),
            ("kvadratmeterpris", &self.kvadratmeterpris),
        ]
        .into_iter()
        .filter_map(|(name, slot)| slot.as_ref().map(|e| (name, e)))
        .collect()
    }

    pub fn field_count(&self) -> usize {
        self.present().len()
    }
}

/// Run every field profile over free text.
pub fn extract_listing_fields(text: &str) -> ListingFacts {
    ListingFacts {
        adresse: resolve_field("adresse", text),
        prisantydning: resolve_field("prisantydning", text),
        bruksareal: bruksareal(text),
        rom: resolve_field("rom", text),
        soverom: resolve_field("soverom", text),
        byggeaar: resolve_field("byggeaar", text),
        eierform: resolve_field("eierform", text),
        energimerking: resolve_field("energimerking", text),
        parkering: resolve_field("parkering", text),
        balkong_terrasse: resolve_field("balkong_terrasse", text),
        kommunale_avgifter: resolve_field("kommunale_avgifter", text),
        fellesgjeld: resolve_field("fellesgjeld", text),
        felleskostnader: resolve_field("felleskostnader", text),
        kvadratmeterpris: resolve_field("kvadratmeterpris", text),
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture(name: &str) -> String {
        std::fs::read_to_string(format!("tests/fixtures/{}.txt", name)).unwrap()
    }

    #[test]
    fn full_listing() {
        let facts = extract_listing_fields(&fixture("listing_full"));
        assert_eq!(facts.bruksareal.as_ref().unwrap().value, "84 m²");
        assert_eq!(facts.bruksareal.as_ref().unwrap().confidence, 100);
        assert_eq!(facts.prisantydning.as_ref().unwrap().value, "4 250 000 kr");
        assert_eq!(facts.soverom.as_ref().unwrap().value, "2");
        assert_eq!(facts.byggeaar.as_ref().unwrap().value, "1962");
        assert_eq!(facts.energimerking.as_ref().unwrap().value, "D");
        assert!(facts.adresse.as_ref().unwrap().value.contains("0560 Oslo"));
        assert!(facts.field_count() >= 9);
    }

    #[test]
    fn partial_areas_only_leave_bruksareal_empty() {
        let facts = extract_listing_fields(&fixture("listing_partial"));
        assert!(facts.bruksareal.is_none());
        // baseline facts still come through
        assert!(facts.prisantydning.is_some());
        assert!(facts.adresse.is_some());
    }

    #[test]
    fn empty_text_gives_empty_record() {
        let facts = extract_listing_fields("");
        assert_eq!(facts.field_count(), 0);
    }
}
