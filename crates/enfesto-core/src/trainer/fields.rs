use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One spreadsheet row as key/value pairs, headers untouched.
pub type RawRecord = serde_json::Map<String, Value>;

/// A historical row after header resolution and numeric validation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingRecord {
    pub referencia: String,
    pub cor: String,
    pub tamanho: String,
    pub qtd: u32,
    pub qtd_otimizada: u32,
}

/// Why a raw row was dropped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    MissingField(&'static str),
    InvalidNumber(&'static str),
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rejection::MissingField(field) => write!(f, "missing field '{}'", field),
            Rejection::InvalidNumber(field) => write!(f, "invalid number in '{}'", field),
        }
    }
}

/// Header names accepted for one logical field, in priority order.
/// `exact` entries must equal the normalized header, `fragments` only need
/// to appear inside it and are tried after every exact name.
struct FieldAliases {
    field: &'static str,
    exact: &'static [&'static str],
    fragments: &'static [&'static str],
}

const REFERENCIA: FieldAliases = FieldAliases {
    field: "referencia",
    exact: &["referencia", "ref", "reference", "produto"],
    fragments: &["ref"],
};

const COR: FieldAliases = FieldAliases {
    field: "cor",
    exact: &["cor", "color", "colour"],
    fragments: &[],
};

const TAMANHO: FieldAliases = FieldAliases {
    field: "tamanho",
    exact: &["tamanho", "tam", "size"],
    fragments: &[],
};

const QTD: FieldAliases = FieldAliases {
    field: "qtd",
    exact: &["qtd", "quantidade", "qty", "quantity", "qtdoriginal"],
    fragments: &[],
};

const QTD_OTIMIZADA: FieldAliases = FieldAliases {
    field: "qtd_otimizada",
    exact: &[
        "qtdotimizada",
        "quantidadeotimizada",
        "otimizada",
        "qtdotim",
        "optimizedqty",
        "optimized",
    ],
    fragments: &["otim", "optimiz"],
};

/// Lowercases, folds Portuguese accents and drops everything but letters and digits,
/// so "Qtd_Otimizada", "QTD OTIMIZADA" and "qtd-otimizada" compare equal.
pub fn normalize_header(header: &str) -> String {
    header
        .trim()
        .chars()
        .flat_map(char::to_lowercase)
        .map(fold_accent)
        .filter(|c| c.is_ascii_alphanumeric())
        .collect()
}

fn fold_accent(c: char) -> char {
    match c {
        'á' | 'à' | 'â' | 'ã' | 'ä' => 'a',
        'é' | 'è' | 'ê' | 'ë' => 'e',
        'í' | 'ì' | 'î' | 'ï' => 'i',
        'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
        'ú' | 'ù' | 'û' | 'ü' => 'u',
        'ç' => 'c',
        other => other,
    }
}

/// Headers of one record, normalized once.
struct Headers<'a> {
    entries: Vec<(String, &'a Value)>,
}

impl<'a> Headers<'a> {
    fn new(record: &'a RawRecord) -> Self {
        Self {
            entries: record
                .iter()
                .map(|(key, value)| (normalize_header(key), value))
                .collect(),
        }
    }

    fn resolve(&self, aliases: &FieldAliases) -> Option<&'a Value> {
        let exact = aliases.exact.iter().find_map(|name| {
            self.entries
                .iter()
                .find(|(header, _)| header == name)
                .map(|(_, value)| *value)
        });

        exact.or_else(|| {
            aliases.fragments.iter().find_map(|fragment| {
                self.entries
                    .iter()
                    .find(|(header, _)| header.contains(fragment))
                    .map(|(_, value)| *value)
            })
        })
    }

    fn text(&self, aliases: &FieldAliases) -> Result<String, Rejection> {
        let text = match self.resolve(aliases) {
            Some(Value::String(s)) => s.trim().to_string(),
            Some(Value::Number(n)) => n.to_string(),
            _ => String::new(),
        };
        if text.is_empty() {
            return Err(Rejection::MissingField(aliases.field));
        }
        Ok(text)
    }

    fn quantity(&self, aliases: &FieldAliases) -> Result<u32, Rejection> {
        let parsed = match self.resolve(aliases) {
            None | Some(Value::Null) => return Err(Rejection::MissingField(aliases.field)),
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::String(s)) if s.trim().is_empty() => {
                return Err(Rejection::MissingField(aliases.field))
            }
            Some(Value::String(s)) => s.trim().replace(',', ".").parse::<f64>().ok(),
            Some(_) => None,
        };

        match parsed {
            Some(value) if value.is_finite() && value >= 0.0 && value <= f64::from(u32::MAX) => {
                Ok(value.round() as u32)
            }
            _ => Err(Rejection::InvalidNumber(aliases.field)),
        }
    }
}

/// Resolves a raw row into a training record.
pub fn resolve_record(record: &RawRecord) -> Result<TrainingRecord, Rejection> {
    let headers = Headers::new(record);

    Ok(TrainingRecord {
        referencia: headers.text(&REFERENCIA)?,
        cor: headers.text(&COR)?,
        tamanho: headers.text(&TAMANHO)?,
        qtd: headers.quantity(&QTD)?,
        qtd_otimizada: headers.quantity(&QTD_OTIMIZADA)?,
    })
}
