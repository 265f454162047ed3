// schoolcanon-core/src/domain/adapter/derived.rs
//
// Same-row derivations. Each one overwrites its target fields when its
// inputs are present and is a no-op otherwise.

use regex::Regex;
use std::sync::LazyLock;

use crate::domain::schema::{CanonicalRecord, CanonicalValue};
use crate::domain::vintage::{DerivedField, PopulationScope};

pub const CHARTER_DISTRICT: i64 = 84;

const BOROUGHS: [&str; 5] = ["bronx", "brooklyn", "manhattan", "queens", "staten island"];

#[allow(clippy::expect_used)]
static SCHOOL_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[mpi]s [0-9]+").expect("static school prefix regex"));

pub fn boro_name(code: char) -> Option<&'static str> {
    match code.to_ascii_uppercase() {
        'K' => Some("Brooklyn"),
        'X' => Some("Bronx"),
        'M' => Some("Manhattan"),
        'Q' => Some("Queens"),
        'R' => Some("Staten Island"),
        _ => None,
    }
}

pub fn school_type(district: i64) -> Option<&'static str> {
    match district {
        1..=32 => Some("community"),
        CHARTER_DISTRICT => Some("charter"),
        75 => Some("d75"),
        79 => Some("alternative"),
        _ => None,
    }
}

/// Lower-cased searchable name: `"P.S. 015 Roberto Clemente"` becomes
/// `"roberto clemente"`. A name reduced to its borough keeps the prefix.
pub fn clean_name(name: &str) -> String {
    let lowered = name.trim().to_lowercase().replace('.', "");
    let words: Vec<String> = lowered
        .split_whitespace()
        .map(|w| match w.parse::<u64>() {
            Ok(n) => n.to_string(),
            Err(_) => w.to_string(),
        })
        .collect();
    let joined = words.join(" ");

    let Some(prefix) = SCHOOL_PREFIX.find(&joined) else {
        return joined;
    };
    let stripped = joined.replacen(prefix.as_str(), "", 1);
    let stripped = stripped.split_whitespace().collect::<Vec<_>>().join(" ");
    if BOROUGHS.contains(&stripped.as_str()) {
        format!("{} {}", prefix.as_str(), stripped)
    } else {
        stripped
    }
}

/// Common short form of a school name, e.g. `PS 15`.
pub fn short_name(name: &str, school_num: i64, grade_level: &str) -> String {
    let upper = name.to_uppercase();
    let prefix = if upper.contains("P.S.") || upper.contains("P. S.") {
        "PS"
    } else if upper.contains("M.S.") || upper.contains("M. S.") {
        "MS"
    } else if upper.contains("I.S.") || upper.contains("I. S.") {
        "IS"
    } else {
        grade_level
    };
    format!("{} {}", prefix, school_num)
}

fn dbn(record: &CanonicalRecord) -> Option<&str> {
    record.text("dbn").filter(|d| d.is_ascii() && d.len() >= 4)
}

fn grade_served(record: &CanonicalRecord, grade: &str) -> Option<bool> {
    record.count(grade).map(|n| n > 0)
}

pub fn apply(field: DerivedField, record: &mut CanonicalRecord, scope: PopulationScope) {
    use CanonicalValue as V;

    match field {
        DerivedField::YearLabel => {
            if let Some(ay) = record.int("ay") {
                let label = format!("{}-{:02}", ay, (ay + 1).rem_euclid(100));
                record.set("year", V::Text(label));
            }
        }
        DerivedField::District => {
            if let Some(d) = dbn(record).and_then(|d| d[..2].parse::<i64>().ok()) {
                record.set("district", V::Int(d));
            }
        }
        DerivedField::Boro => {
            if let Some(name) = dbn(record)
                .and_then(|d| d.chars().nth(2))
                .and_then(boro_name)
            {
                record.set("boro", V::Text(name.to_string()));
            }
        }
        DerivedField::SchoolNum => {
            if let Some(n) = dbn(record).and_then(|d| d[3..].parse::<i64>().ok()) {
                record.set("school_num", V::Int(n));
            }
        }
        DerivedField::CharterFromDistrict => {
            if let Some(d) = record.int("district") {
                record.set("charter", V::Flag(d == CHARTER_DISTRICT));
            }
        }
        DerivedField::CharterFromDbn => {
            if let Some(d) = record.text("dbn") {
                let charter = d.starts_with("84");
                record.set("charter", V::Flag(charter));
            }
        }
        DerivedField::CharterConstant => match scope {
            PopulationScope::Charter => record.set("charter", V::Flag(true)),
            PopulationScope::District => record.set("charter", V::Flag(false)),
            PopulationScope::All | PopulationScope::State => {}
        },
        DerivedField::SchoolType => {
            if let Some(t) = record.int("district").and_then(school_type) {
                record.set("school_type", V::Text(t.to_string()));
            }
        }
        DerivedField::GradeBands => {
            for (target, grade) in [
                ("serves_pk", "grade_pk"),
                ("serves_elementary", "grade_2"),
                ("serves_middle", "grade_7"),
                ("serves_hs", "grade_10"),
            ] {
                if let Some(served) = grade_served(record, grade) {
                    record.set(target, V::Flag(served));
                }
            }
        }
        DerivedField::GradeLevel => {
            let flag = |name: &str| record.flag(name).unwrap_or(false);
            let level = if flag("serves_middle") {
                "MS"
            } else if flag("serves_elementary") {
                "PS"
            } else if flag("serves_hs") {
                "HS"
            } else {
                "NA"
            };
            record.set("grade_level", V::Text(level.to_string()));
        }
        DerivedField::CleanName => {
            if let Some(name) = record.text("school_name") {
                let clean = clean_name(name);
                record.set("clean_name", V::Text(clean));
            }
        }
        DerivedField::ShortName => {
            if let (Some(name), Some(num)) = (record.text("school_name"), record.int("school_num"))
            {
                let level = record.text("grade_level").unwrap_or("NA");
                let short = short_name(name, num, level);
                record.set("short_name", V::Text(short));
            }
        }
        DerivedField::PovertyFromLunch => {
            let (Some(fl), Some(frl)) = (record.pct("fl_pct"), record.pct("frl_pct")) else {
                return;
            };
            let pct = fl.max(frl);
            record.set("poverty_pct", V::Pct(pct));
            if let Some(enrollment) = record.count("total_enrollment") {
                let n = (pct * enrollment as f64).floor() as u64;
                record.set("poverty_n", V::Count(n));
            }
        }
        DerivedField::Level34Count => {
            if let (Some(l3), Some(l4)) = (record.count("level_3_n"), record.count("level_4_n")) {
                record.set("level_3_4_n", V::Count(l3 + l4));
            }
        }
    }
}
