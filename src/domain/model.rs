use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Symbology {
    Ean13,
    Ean8,
    Upca,
    Upce,
    Code39,
    Code128,
    Itf,
    Qr,
    Datamatrix,
    Pdf417,
    MsiPlessey,
}

impl Symbology {
    pub const ALL: [Symbology; 11] = [
        Symbology::Ean13,
        Symbology::Ean8,
        Symbology::Upca,
        Symbology::Upce,
        Symbology::Code39,
        Symbology::Code128,
        Symbology::Itf,
        Symbology::Qr,
        Symbology::Datamatrix,
        Symbology::Pdf417,
        Symbology::MsiPlessey,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Symbology::Ean13 => "ean13",
            Symbology::Ean8 => "ean8",
            Symbology::Upca => "upca",
            Symbology::Upce => "upce",
            Symbology::Code39 => "code39",
            Symbology::Code128 => "code128",
            Symbology::Itf => "itf",
            Symbology::Qr => "qr",
            Symbology::Datamatrix => "datamatrix",
            Symbology::Pdf417 => "pdf417",
            Symbology::MsiPlessey => "msi_plessey",
        }
    }

    /// 依條碼內容的形狀推測編碼（鍵盤式掃描器不會回報編碼類型）
    pub fn infer(code: &str) -> Symbology {
        let all_digits = !code.is_empty() && code.bytes().all(|b| b.is_ascii_digit());
        match (all_digits, code.len()) {
            (true, 13) => Symbology::Ean13,
            (true, 12) => Symbology::Upca,
            (true, 8) => Symbology::Ean8,
            (true, 6) => Symbology::Upce,
            _ => Symbology::Code128,
        }
    }
}

impl fmt::Display for Symbology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Symbology {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        Symbology::ALL
            .iter()
            .copied()
            .find(|sym| sym.as_str() == normalized || sym.as_str().replace('_', "") == normalized)
            .ok_or_else(|| format!("Unknown symbology: {}", s))
    }
}

/// 啟用中的條碼編碼集合，保證非空
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Symbology>", into = "Vec<Symbology>")]
pub struct SymbologySet(BTreeSet<Symbology>);

impl SymbologySet {
    pub fn new<I: IntoIterator<Item = Symbology>>(symbologies: I) -> Option<Self> {
        let set: BTreeSet<Symbology> = symbologies.into_iter().collect();
        if set.is_empty() {
            None
        } else {
            Some(Self(set))
        }
    }

    /// All 1D symbologies except MSI Plessey, plus every 2D symbology.
    pub fn vendor_default() -> Self {
        Self(
            Symbology::ALL
                .iter()
                .copied()
                .filter(|sym| *sym != Symbology::MsiPlessey)
                .collect(),
        )
    }

    pub fn contains(&self, symbology: Symbology) -> bool {
        self.0.contains(&symbology)
    }

    pub fn iter(&self) -> impl Iterator<Item = Symbology> + '_ {
        self.0.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for SymbologySet {
    fn default() -> Self {
        Self::vendor_default()
    }
}

impl TryFrom<Vec<Symbology>> for SymbologySet {
    type Error = String;

    fn try_from(value: Vec<Symbology>) -> Result<Self, Self::Error> {
        SymbologySet::new(value).ok_or_else(|| "symbology set cannot be empty".to_string())
    }
}

impl From<SymbologySet> for Vec<Symbology> {
    fn from(set: SymbologySet) -> Self {
        set.0.into_iter().collect()
    }
}

impl FromStr for SymbologySet {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parsed = s
            .split(',')
            .filter(|part| !part.trim().is_empty())
            .map(Symbology::from_str)
            .collect::<Result<Vec<_>, _>>()?;
        SymbologySet::try_from(parsed)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CameraFacing {
    #[default]
    Back,
    Front,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MsiPlesseyChecksum {
    None,
    #[default]
    Mod10,
    Mod1010,
    Mod11,
    Mod1110,
}

/// 交給掃描器的設定，於 `start_scanning` 之前套用
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScannerSettings {
    pub symbologies: SymbologySet,
    pub camera_facing: CameraFacing,
    pub msi_plessey_checksum: MsiPlesseyChecksum,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanResult {
    pub symbology: Symbology,
    pub code: String,
}

impl ScanResult {
    pub fn new(symbology: Symbology, code: impl Into<String>) -> Self {
        Self {
            symbology,
            code: code.into(),
        }
    }

    /// GS1 mod-10 check digit for EAN13/EAN8/UPCA; other symbologies
    /// carry their own checks inside the decoder and always pass here.
    pub fn has_valid_check_digit(&self) -> bool {
        let expected_len = match self.symbology {
            Symbology::Ean13 => 13,
            Symbology::Ean8 => 8,
            Symbology::Upca => 12,
            _ => return true,
        };
        if self.code.len() != expected_len || !self.code.bytes().all(|b| b.is_ascii_digit()) {
            return false;
        }

        let digits: Vec<u32> = self.code.bytes().map(|b| u32::from(b - b'0')).collect();
        let (body, check) = digits.split_at(digits.len() - 1);
        // 從最右邊（不含檢查碼）開始，奇數位乘 3
        let sum: u32 = body
            .iter()
            .rev()
            .enumerate()
            .map(|(i, d)| if i % 2 == 0 { d * 3 } else { *d })
            .sum();
        (10 - sum % 10) % 10 == check[0]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NutritionValue {
    Text(String),
    Number(serde_json::Number),
}

impl NutritionValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            NutritionValue::Text(s) => Some(s),
            NutritionValue::Number(_) => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            NutritionValue::Number(n) => n.as_f64(),
            NutritionValue::Text(_) => None,
        }
    }
}

impl fmt::Display for NutritionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NutritionValue::Text(s) => f.write_str(s),
            NutritionValue::Number(n) => write!(f, "{}", n),
        }
    }
}

/// One item's nutrition facts. Fields the service did not report are
/// absent, never zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NutritionRecord {
    fields: BTreeMap<String, NutritionValue>,
}

impl NutritionRecord {
    /// Keeps string and number fields; `null`, booleans and nested values are dropped.
    pub fn from_json_object(object: &serde_json::Map<String, serde_json::Value>) -> Self {
        let fields = object
            .iter()
            .filter_map(|(key, value)| {
                let value = match value {
                    serde_json::Value::String(s) => NutritionValue::Text(s.clone()),
                    serde_json::Value::Number(n) => NutritionValue::Number(n.clone()),
                    _ => return None,
                };
                Some((key.clone(), value))
            })
            .collect();
        Self { fields }
    }

    pub fn get(&self, field: &str) -> Option<&NutritionValue> {
        self.fields.get(field)
    }

    pub fn fields(&self) -> &BTreeMap<String, NutritionValue> {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Fields shown first, in this order, when the service reports them.
const PRIORITY_FIELDS: [&str; 10] = [
    "item_name",
    "name",
    "brand_name",
    "brand",
    "nf_calories",
    "calories",
    "nf_serving_size_qty",
    "nf_serving_size_unit",
    "serving_size",
    "nf_serving_weight_grams",
];

#[derive(Debug, Clone, PartialEq)]
pub struct NutritionView {
    pub code: String,
    pub rows: Vec<(String, NutritionValue)>,
    pub retrieved_at: DateTime<Utc>,
}

impl NutritionView {
    pub fn new(code: &str, record: NutritionRecord) -> Self {
        let mut rows: Vec<(String, NutritionValue)> = PRIORITY_FIELDS
            .iter()
            .filter_map(|field| {
                record
                    .get(field)
                    .map(|value| (field.to_string(), value.clone()))
            })
            .collect();

        // 其餘欄位依字母順序（BTreeMap 已排序）
        rows.extend(
            record
                .fields()
                .iter()
                .filter(|(key, _)| !PRIORITY_FIELDS.contains(&key.as_str()))
                .map(|(key, value)| (key.clone(), value.clone())),
        );

        Self {
            code: code.to_string(),
            rows,
            retrieved_at: Utc::now(),
        }
    }

    pub fn value(&self, field: &str) -> Option<&NutritionValue> {
        self.rows
            .iter()
            .find(|(key, _)| key == field)
            .map(|(_, value)| value)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LookupOutcome {
    Success(NutritionRecord),
    NotFound,
    NetworkError(String),
    InvalidResponse(String),
}

impl LookupOutcome {
    pub fn kind(&self) -> &'static str {
        match self {
            LookupOutcome::Success(_) => "success",
            LookupOutcome::NotFound => "not_found",
            LookupOutcome::NetworkError(_) => "network_error",
            LookupOutcome::InvalidResponse(_) => "invalid_response",
        }
    }
}
