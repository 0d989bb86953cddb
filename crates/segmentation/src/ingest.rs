//! Ingestion and feature building: parses the uploaded customer sheet,
//! drops exact duplicate rows, normalizes email and derives engagement
//! features.

use campaign_core::types::{CustomerRecord, Platform};
use campaign_core::{CampaignError, CampaignResult};
use std::collections::{HashMap, HashSet};
use std::io::Read;
use tracing::debug;

/// Columns every upload must carry. `location` is optional.
pub const REQUIRED_COLUMNS: [&str; 14] = [
    "name",
    "age",
    "email",
    "phone_number",
    "income_lpa",
    "life_event",
    "insurance_type",
    "whatsapp_usage_minutes_per_week",
    "facebook_usage_minutes_per_week",
    "instagram_usage_minutes_per_week",
    "telegram_usage_minutes_per_week",
    "gmail_usage_minutes_per_week",
    "sms_usage_minutes_per_week",
    "purchased",
];

/// A CSV row before type coercion, tagged with its source line.
#[derive(Debug, Clone)]
pub struct RawRow {
    pub line: u64,
    pub fields: Vec<String>,
}

/// Deduplicated, normalized customers in source row order.
#[derive(Debug, Clone, Default)]
pub struct CustomerTable {
    pub records: Vec<CustomerRecord>,
    pub duplicates_removed: usize,
}

/// Header positions of the columns the pipeline reads.
struct ColumnIndex {
    name: usize,
    age: usize,
    email: usize,
    phone_number: usize,
    location: Option<usize>,
    income_lpa: usize,
    life_event: usize,
    insurance_type: usize,
    usage: [usize; 6],
    purchased: usize,
}

impl ColumnIndex {
    fn resolve(headers: &csv::StringRecord) -> CampaignResult<Self> {
        let mut positions: HashMap<&str, usize> = HashMap::new();
        for (idx, header) in headers.iter().enumerate() {
            positions.entry(header).or_insert(idx);
        }

        let missing: Vec<String> = REQUIRED_COLUMNS
            .iter()
            .filter(|column| !positions.contains_key(*column))
            .map(|column| column.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(CampaignError::Schema { missing });
        }

        let at = |column: &str| positions.get(column).copied().unwrap_or_default();
        let mut usage = [0usize; 6];
        for (slot, platform) in usage.iter_mut().zip(Platform::ALL) {
            *slot = at(platform.column());
        }

        Ok(Self {
            name: at("name"),
            age: at("age"),
            email: at("email"),
            phone_number: at("phone_number"),
            location: positions.get("location").copied(),
            income_lpa: at("income_lpa"),
            life_event: at("life_event"),
            insurance_type: at("insurance_type"),
            usage,
            purchased: at("purchased"),
        })
    }

    fn parse(&self, row: &RawRow) -> CampaignResult<CustomerRecord> {
        let field = |idx: usize| row.fields.get(idx).map(String::as_str).unwrap_or("");

        let mut usage_minutes = [0.0; 6];
        for (value, (&idx, platform)) in usage_minutes
            .iter_mut()
            .zip(self.usage.iter().zip(Platform::ALL))
        {
            *value = parse_number(row.line, platform.column(), field(idx))?;
        }
        let (total_engagement, most_active_platform) = derive_engagement(&usage_minutes);

        Ok(CustomerRecord {
            name: field(self.name).to_string(),
            age: parse_age(row.line, field(self.age))?,
            email: normalize_email(field(self.email)),
            phone_number: field(self.phone_number).to_string(),
            location: self
                .location
                .map(|idx| field(idx).to_string())
                .filter(|value| !value.is_empty()),
            income_lpa: parse_number(row.line, "income_lpa", field(self.income_lpa))?,
            life_event: field(self.life_event).to_string(),
            insurance_type: field(self.insurance_type).to_string(),
            usage_minutes,
            purchased: parse_label(row.line, field(self.purchased))?,
            total_engagement,
            most_active_platform,
        })
    }
}

/// Parse a customer sheet, drop duplicate rows and build derived features.
pub fn load_customers<R: Read>(reader: R) -> CampaignResult<CustomerTable> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::Headers)
        .from_reader(reader);

    let headers = csv_reader.headers()?.clone();
    let columns = ColumnIndex::resolve(&headers)?;

    let mut rows = Vec::new();
    for result in csv_reader.records() {
        let record = result?;
        rows.push(RawRow {
            line: record.position().map(|p| p.line()).unwrap_or_default(),
            fields: record.iter().map(str::to_string).collect(),
        });
    }

    let total_rows = rows.len();
    let rows = drop_duplicate_rows(rows);
    let duplicates_removed = total_rows - rows.len();

    let records = rows
        .iter()
        .map(|row| columns.parse(row))
        .collect::<CampaignResult<Vec<_>>>()?;

    debug!(
        rows = total_rows,
        duplicates_removed,
        customers = records.len(),
        "Customer sheet ingested"
    );

    Ok(CustomerTable {
        records,
        duplicates_removed,
    })
}

/// Remove rows whose every field equals an earlier row's, keeping order.
///
/// Fields are compared as raw text before any parsing, so `30` and `30.0`
/// are different values.
pub fn drop_duplicate_rows(rows: Vec<RawRow>) -> Vec<RawRow> {
    let mut seen: HashSet<Vec<String>> = HashSet::with_capacity(rows.len());
    rows.into_iter()
        .filter(|row| seen.insert(row.fields.clone()))
        .collect()
}

pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Sum of weekly usage and the platform with the highest usage. Ties go to
/// the platform listed first in [`Platform::ALL`].
pub fn derive_engagement(usage_minutes: &[f64; 6]) -> (f64, Platform) {
    let total = usage_minutes.iter().sum();
    let mut best = 0;
    for (idx, value) in usage_minutes.iter().enumerate().skip(1) {
        if *value > usage_minutes[best] {
            best = idx;
        }
    }
    (total, Platform::ALL[best])
}

fn invalid(line: u64, column: &str, value: &str) -> CampaignError {
    CampaignError::InvalidValue {
        row: line as usize,
        column: column.to_string(),
        value: value.to_string(),
    }
}

fn parse_number(line: u64, column: &str, raw: &str) -> CampaignResult<f64> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .ok_or_else(|| invalid(line, column, raw))
}

fn parse_age(line: u64, raw: &str) -> CampaignResult<u32> {
    let value = parse_number(line, "age", raw)?;
    if value < 0.0 || value.fract() != 0.0 || value > f64::from(u32::MAX) {
        return Err(invalid(line, "age", raw));
    }
    Ok(value as u32)
}

fn parse_label(line: u64, raw: &str) -> CampaignResult<bool> {
    match parse_number(line, "purchased", raw)? {
        v if v == 0.0 => Ok(false),
        v if v == 1.0 => Ok(true),
        _ => Err(invalid(line, "purchased", raw)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "name,age,email,phone_number,location,income_lpa,life_event,insurance_type,whatsapp_usage_minutes_per_week,facebook_usage_minutes_per_week,instagram_usage_minutes_per_week,telegram_usage_minutes_per_week,gmail_usage_minutes_per_week,sms_usage_minutes_per_week,purchased";

    fn sheet(rows: &[&str]) -> String {
        let mut csv = String::from(HEADER);
        for row in rows {
            csv.push('\n');
            csv.push_str(row);
        }
        csv
    }

    fn raw(line: u64, fields: &[&str]) -> RawRow {
        RawRow {
            line,
            fields: fields.iter().map(|f| f.to_string()).collect(),
        }
    }

    #[test]
    fn test_load_normalizes_and_derives() {
        let csv = sheet(&[
            "Chetan Khachane,22,  Chetan@Gmail.COM ,+918329391715,Mumbai,12,Marriage,Health,500,300,200,100,150,80,1",
        ]);
        let table = load_customers(csv.as_bytes()).unwrap();

        assert_eq!(table.records.len(), 1);
        let record = &table.records[0];
        assert_eq!(record.email, "chetan@gmail.com");
        assert_eq!(record.age, 22);
        assert_eq!(record.location.as_deref(), Some("Mumbai"));
        assert_eq!(record.total_engagement, 1330.0);
        assert_eq!(record.most_active_platform, Platform::Whatsapp);
        assert!(record.purchased);
    }

    #[test]
    fn test_missing_columns_fail_with_schema_error() {
        let csv = "name,age,email\nA,30,a@x.com";
        match load_customers(csv.as_bytes()) {
            Err(CampaignError::Schema { missing }) => {
                assert!(missing.contains(&"phone_number".to_string()));
                assert!(missing.contains(&"purchased".to_string()));
                assert!(!missing.contains(&"age".to_string()));
                assert_eq!(missing.len(), REQUIRED_COLUMNS.len() - 3);
            }
            other => panic!("expected schema error, got {other:?}"),
        }
    }

    #[test]
    fn test_location_column_is_optional() {
        let header = HEADER.replace("location,", "");
        let csv = format!("{header}\nRahul Sharma,30,r@gmail.com,9867542729,10,None,Car,10,20,30,40,50,60,0");
        let table = load_customers(csv.as_bytes()).unwrap();
        assert_eq!(table.records[0].location, None);
        assert_eq!(table.records[0].most_active_platform, Platform::Sms);
    }

    #[test]
    fn test_exact_duplicates_are_removed() {
        let row = "Neha Iyer,40,neha@gmail.com,+919152274885,Pune,20,New Job,Life,10,10,10,10,10,10,0";
        let moved = row.replace("Pune", "Delhi");
        let csv = sheet(&[row, row, moved.as_str()]);
        let table = load_customers(csv.as_bytes()).unwrap();

        assert_eq!(table.records.len(), 2);
        assert_eq!(table.duplicates_removed, 1);
        assert_eq!(table.records[1].location.as_deref(), Some("Delhi"));
    }

    #[test]
    fn test_dedup_is_idempotent() {
        let rows = vec![
            raw(2, &["a", "1"]),
            raw(3, &["b", "2"]),
            raw(4, &["a", "1"]),
            raw(5, &["c", "3"]),
            raw(6, &["b", "2"]),
        ];
        let once = drop_duplicate_rows(rows);
        let lines: Vec<u64> = once.iter().map(|r| r.line).collect();
        assert_eq!(lines, vec![2, 3, 5]);

        let twice = drop_duplicate_rows(once.clone());
        let again: Vec<u64> = twice.iter().map(|r| r.line).collect();
        assert_eq!(again, lines);
    }

    #[test]
    fn test_dedup_compares_raw_text() {
        let rows = vec![raw(2, &["Neha", "30"]), raw(3, &["Neha", "30.0"]), raw(4, &["Neha", "30"])];
        let lines: Vec<u64> = drop_duplicate_rows(rows).iter().map(|r| r.line).collect();
        assert_eq!(lines, vec![2, 3]);
    }

    #[test]
    fn test_engagement_ties_prefer_first_platform() {
        let (total, platform) = derive_engagement(&[5.0, 9.0, 9.0, 1.0, 9.0, 0.0]);
        assert_eq!(total, 33.0);
        assert_eq!(platform, Platform::Facebook);

        let (_, platform) = derive_engagement(&[0.0; 6]);
        assert_eq!(platform, Platform::Whatsapp);
    }

    #[test]
    fn test_non_numeric_age_is_rejected() {
        let csv = sheet(&[
            "Amit Patel,thirty,amit@gmail.com,+91123,Delhi,10,None,Car,1,2,3,4,5,6,0",
        ]);
        match load_customers(csv.as_bytes()) {
            Err(CampaignError::InvalidValue { row, column, value }) => {
                assert_eq!(row, 2);
                assert_eq!(column, "age");
                assert_eq!(value, "thirty");
            }
            other => panic!("expected invalid value, got {other:?}"),
        }
    }

    #[test]
    fn test_purchased_accepts_integral_floats_only() {
        let csv = sheet(&["A,30,a@x.com,1,X,10,None,Car,1,2,3,4,5,6,1.0"]);
        assert!(load_customers(csv.as_bytes()).unwrap().records[0].purchased);

        let csv = sheet(&["A,30,a@x.com,1,X,10,None,Car,1,2,3,4,5,6,2"]);
        assert!(matches!(
            load_customers(csv.as_bytes()),
            Err(CampaignError::InvalidValue { .. })
        ));
    }
}
