use std::sync::LazyLock;

use regex::Regex;

use super::engine::{resolve, Extraction, FieldProfile, Tier, ValueFormat};

/// Value group: digits with Norwegian grouping (spaces, NBSP, dots) and a
/// decimal comma. Deliberately excludes newlines so a value never spans lines.
const NUM: &str = r"([\d][\d .,\x{A0}\x{202F}]*)";
const AREA: &str = r"(?:m²|m2|kvm)";

fn re(pattern: &str) -> Regex {
    Regex::new(pattern).expect("static field pattern")
}

fn tier(source: &'static str, confidence: u8, patterns: Vec<Regex>) -> Tier {
    Tier {
        source,
        confidence,
        patterns,
    }
}

/// The ranked profile table. The flagship is `bruksareal`; every other field
/// is the same machinery with a different label table and window.
pub static PROFILES: LazyLock<Vec<FieldProfile>> = LazyLock::new(build_profiles);

pub fn profile(field: &str) -> &'static FieldProfile {
    PROFILES
        .iter()
        .find(|p| p.field == field)
        .expect("unknown field profile")
}

pub fn resolve_field(field: &str, text: &str) -> Option<Extraction> {
    resolve(profile(field), text)
}

/// Usable floor area, the authoritative Norwegian listing figure.
pub fn bruksareal(text: &str) -> Option<Extraction> {
    resolve_field("bruksareal", text)
}

fn build_profiles() -> Vec<FieldProfile> {
    vec![
        FieldProfile {
            field: "bruksareal",
            tiers: vec![
                tier(
                    "bruksareal",
                    100,
                    vec![
                        re(&format!(
                            r"(?i)\bbruksareal(?:\s*\(\s*BRA\s*\))?\s*[:\s]\s*{NUM}\s*{AREA}"
                        )),
                        re(&format!(r"(?i)\bBRA\b\s*[:.]?\s*{NUM}\s*{AREA}")),
                    ],
                ),
                tier(
                    "primaerareal",
                    90,
                    vec![
                        re(&format!(
                            r"(?i)\bprimær(?:areal|rom)(?:\s*\(\s*P-?ROM\s*\))?\s*[:\s]\s*{NUM}\s*{AREA}"
                        )),
                        re(&format!(r"(?i)\bP-?rom\b\s*[:.]?\s*{NUM}\s*{AREA}")),
                    ],
                ),
                tier(
                    "storrelse",
                    75,
                    vec![
                        re(&format!(r"(?i)\bstørrelse\s*[:\s]\s*{NUM}\s*{AREA}")),
                        re(&format!(r"(?i)\bareal\s+bolig(?:en)?\s*[:\s]\s*{NUM}\s*{AREA}")),
                    ],
                ),
                tier(
                    "areal",
                    60,
                    vec![re(&format!(r"(?i)\bareal\b\s*[:\s]\s*{NUM}\s*{AREA}"))],
                ),
            ],
            // Partial and derived areas never qualify, at any tier.
            exclusions: vec![
                re(r"(?i)\bintern[te]?\b"),
                re(r"(?i)\bekstern[te]?\b"),
                re(r"(?i)\bBRA[-‐][IES]\b"),
                re(r"(?i)garasje"),
                re(r"(?i)kjeller"),
                re(r"(?i)\bloft\b"),
                re(r"(?i)balkong"),
                re(r"(?i)terrasse"),
                re(r"(?i)\btomt(?:eareal)?\b"),
                re(r"(?i)\btotal"),
                re(r"(?i)\binkl"),
                re(r"(?i)\bbod\b"),
                re(r"(?i)uteplass"),
            ],
            window: Some((10.0, 2000.0)),
            anchor: Some(85.0),
            format: ValueFormat::SquareMeters,
        },
        FieldProfile {
            field: "rom",
            tiers: vec![
                tier(
                    "antall_rom",
                    100,
                    vec![
                        re(r"(?i)\bantall\s+rom\s*[:\s]\s*(\d{1,2})\b"),
                        re(r"(?i)\brom\s*:\s*(\d{1,2})\b"),
                    ],
                ),
                tier("roms_type", 75, vec![re(r"(?i)\b(\d{1,2})\s*-\s*roms?\b")]),
            ],
            exclusions: vec![re(r"(?i)soverom"), re(r"(?i)\bbad\b")],
            window: Some((1.0, 20.0)),
            anchor: Some(4.0),
            format: ValueFormat::Count,
        },
        FieldProfile {
            field: "soverom",
            tiers: vec![tier(
                "soverom",
                100,
                vec![
                    re(r"(?i)\bsoverom\s*[:\s]\s*(\d{1,2})\b"),
                    re(r"(?i)\b(\d{1,2})\s+soverom\b"),
                ],
            )],
            exclusions: vec![],
            window: Some((1.0, 10.0)),
            anchor: Some(3.0),
            format: ValueFormat::Count,
        },
        FieldProfile {
            field: "byggeaar",
            tiers: vec![
                tier("byggeaar", 100, vec![re(r"(?i)\bbyggeår\s*[:\s]\s*(\d{4})\b")]),
                tier(
                    "oppfoert",
                    85,
                    vec![re(r"(?i)\boppført(?:\s+i)?\s*:?\s*(\d{4})\b")],
                ),
            ],
            exclusions: vec![re(r"(?i)renovert"), re(r"(?i)modernisert")],
            window: Some((1600.0, 2030.0)),
            anchor: None,
            format: ValueFormat::Year,
        },
        FieldProfile {
            field: "eierform",
            tiers: vec![
                tier(
                    "eierform",
                    100,
                    vec![re(
                        r"(?i)\beierform\s*[:\s]\s*(selveier(?:seksjon)?|eierseksjon|andel|aksje|obligasjon|borettslag)",
                    )],
                ),
                tier(
                    "boligtype",
                    70,
                    vec![re(
                        r"(?i)\b(selveierleilighet|andelsleilighet|aksjeleilighet|borettslag)\b",
                    )],
                ),
            ],
            exclusions: vec![],
            window: None,
            anchor: None,
            format: ValueFormat::Verbatim,
        },
        FieldProfile {
            field: "energimerking",
            tiers: vec![
                tier(
                    "energimerking",
                    100,
                    vec![re(r"(?i:\benergimerk(?:e|ing))\s*[:\s]\s*([A-G])\b")],
                ),
                tier(
                    "energiklasse",
                    80,
                    vec![re(r"(?i:\benergi(?:klasse|attest))\s*[:\s]\s*([A-G])\b")],
                ),
            ],
            exclusions: vec![],
            window: None,
            anchor: None,
            format: ValueFormat::Verbatim,
        },
        FieldProfile {
            field: "parkering",
            tiers: vec![
                tier(
                    "parkering",
                    100,
                    vec![re(r"(?i)\bparkering\s*:\s*([^\n.;]{3,80})")],
                ),
                tier(
                    "garasje",
                    70,
                    vec![re(
                        r"(?i)\b(garasje(?:plass)?|carport|biloppstillingsplass)\b",
                    )],
                ),
            ],
            exclusions: vec![],
            window: None,
            anchor: None,
            format: ValueFormat::Verbatim,
        },
        FieldProfile {
            field: "balkong_terrasse",
            tiers: vec![tier(
                "balkong_terrasse",
                100,
                vec![re(&format!(
                    r"(?i)\b(?:balkong|terrasse|uteplass)(?:\s*/\s*(?:balkong|terrasse))?\s*[:\s]\s*{NUM}\s*{AREA}"
                ))],
            )],
            exclusions: vec![],
            window: Some((1.0, 200.0)),
            anchor: None,
            format: ValueFormat::SquareMeters,
        },
        FieldProfile {
            field: "kommunale_avgifter",
            tiers: vec![
                tier(
                    "kommunale_avgifter",
                    100,
                    vec![re(&format!(
                        r"(?i)\bkommunale\s+avg(?:ifter)?\.?\s*(?:per\s+år|pr\.?\s*år)?\s*[:\s]\s*(?:kr\.?\s*)?{NUM}"
                    ))],
                ),
                tier(
                    "komm_avg",
                    80,
                    vec![re(&format!(
                        r"(?i)\bkomm\.?\s*avg\.?\s*[:\s]\s*(?:kr\.?\s*)?{NUM}"
                    ))],
                ),
            ],
            exclusions: vec![],
            window: Some((1000.0, 200_000.0)),
            anchor: None,
            format: ValueFormat::Kroner,
        },
        FieldProfile {
            field: "fellesgjeld",
            tiers: vec![tier(
                "fellesgjeld",
                100,
                vec![re(&format!(
                    r"(?i)\b(?:andel\s+)?fellesgjeld\s*[:\s]\s*(?:kr\.?\s*)?{NUM}"
                ))],
            )],
            exclusions: vec![],
            window: Some((1.0, 10_000_000.0)),
            anchor: None,
            format: ValueFormat::Kroner,
        },
        FieldProfile {
            field: "felleskostnader",
            tiers: vec![
                tier(
                    "felleskostnader",
                    100,
                    vec![re(&format!(
                        r"(?i)\bfelleskost(?:nader)?\.?\s*(?:per\s+måned|/\s*mnd\.?|pr\.?\s*mnd\.?)?\s*[:\s]\s*(?:kr\.?\s*)?{NUM}"
                    ))],
                ),
                tier(
                    "fellesutgifter",
                    80,
                    vec![re(&format!(
                        r"(?i)\bfellesutg(?:ifter)?\.?\s*[:\s]\s*(?:kr\.?\s*)?{NUM}"
                    ))],
                ),
            ],
            exclusions: vec![],
            window: Some((100.0, 100_000.0)),
            anchor: None,
            format: ValueFormat::Kroner,
        },
        FieldProfile {
            field: "kvadratmeterpris",
            tiers: vec![tier(
                "kvadratmeterpris",
                100,
                vec![
                    re(&format!(
                        r"(?i)\bkvadratmeterpris\s*[:\s]\s*(?:kr\.?\s*)?{NUM}"
                    )),
                    re(&format!(
                        r"(?i)\bpris\s*(?:per|pr\.?)\s*{AREA}\s*[:\s]\s*(?:kr\.?\s*)?{NUM}"
                    )),
                ],
            )],
            exclusions: vec![],
            window: Some((1000.0, 500_000.0)),
            anchor: None,
            format: ValueFormat::Kroner,
        },
        FieldProfile {
            field: "prisantydning",
            tiers: vec![
                tier(
                    "prisantydning",
                    100,
                    vec![re(&format!(
                        r"(?i)\bprisantydning\s*[:\s]\s*(?:kr\.?\s*)?{NUM}"
                    ))],
                ),
                tier(
                    "totalpris",
                    85,
                    vec![re(&format!(r"(?i)\btotalpris\s*[:\s]\s*(?:kr\.?\s*)?{NUM}"))],
                ),
                tier(
                    "pris",
                    70,
                    vec![re(&format!(r"(?i)\bpris\s*:\s*(?:kr\.?\s*)?{NUM}"))],
                ),
            ],
            exclusions: vec![re(r"(?i)kvadratmeter"), re(r"(?i)\bpr\.?\s*m")],
            window: Some((100_000.0, 100_000_000.0)),
            anchor: None,
            format: ValueFormat::Kroner,
        },
        FieldProfile {
            field: "adresse",
            tiers: vec![
                tier(
                    "adresse",
                    100,
                    vec![re(r"(?i)\badresse\s*[:\s]\s*([^\n]{5,80})")],
                ),
                tier(
                    "gateadresse",
                    70,
                    vec![re(
                        r"([A-ZÆØÅ][\p{L}.\- ]+?\d+\s?[A-Z]?,\s*\d{4}\s+[A-ZÆØÅ][\p{L}]+)",
                    )],
                ),
            ],
            exclusions: vec![],
            window: None,
            anchor: None,
            format: ValueFormat::Verbatim,
        },
    ]
}
