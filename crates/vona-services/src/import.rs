//! CSV wholesale price import
//!
//! Parses supplier rate sheets and applies them through the pricing
//! service. Supplier files vary wildly: header names differ, country codes
//! may be missing, names may carry a `(XX)` parenthetical, and the same
//! country can appear on several rows. Unresolvable rows are counted and
//! skipped, never fatal.

use rust_decimal::Decimal;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use vona_core::traits::PricingRepository;
use vona_core::{AppError, AppResult};

use crate::constants::PRICE_SOURCE_CSV;
use crate::pricing::PricingService;

/// Header aliases for the country name column
const NAME_HEADERS: &[&str] = &["country", "country_name", "destination", "name"];

/// Header aliases for the ISO code column
const CODE_HEADERS: &[&str] = &["code", "iso", "iso_code", "country_code"];

/// Header aliases for the price column
const PRICE_HEADERS: &[&str] = &[
    "price",
    "rate",
    "base_price",
    "cost",
    "price_per_minute",
    "rate_per_min",
];

/// Counts reported back to the import caller
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportSummary {
    /// Countries added
    pub imported: u32,
    /// Countries whose price changed
    pub updated: u32,
    /// Rows dropped (no resolvable country or unusable price)
    pub skipped: u32,
    /// Row-level error messages, one per skipped row
    pub errors: Vec<String>,
}

/// CSV rate sheet importer
pub struct ImportService<P: PricingRepository> {
    pricing: Arc<PricingService<P>>,
}

impl<P: PricingRepository> ImportService<P> {
    /// Create a new import service
    pub fn new(pricing: Arc<PricingService<P>>) -> Self {
        Self { pricing }
    }

    /// Import a CSV rate sheet
    ///
    /// Duplicate countries within one file keep the lowest price. Every
    /// applied change goes through the pricing service, which writes the
    /// audit row and invalidates the cache.
    ///
    /// # Errors
    ///
    /// Only structural failures error out: an empty file or a header row
    /// without usable columns. Bad data rows are counted, not fatal.
    #[instrument(skip(self, csv), fields(bytes = csv.len()))]
    pub async fn import_csv(&self, csv: &str) -> AppResult<ImportSummary> {
        let mut lines = csv.lines().filter(|l| !l.trim().is_empty());

        let header_line = lines
            .next()
            .ok_or_else(|| AppError::InvalidInput("CSV file is empty".to_string()))?;
        let columns = Columns::detect(header_line)?;

        let mut summary = ImportSummary::default();

        // Lowest price wins across duplicate rows for one country.
        let mut best: HashMap<String, (String, Decimal)> = HashMap::new();

        for (line_no, line) in lines.enumerate() {
            let row = split_csv_line(line);
            match columns.parse_row(&row) {
                Ok((code, name, price)) => {
                    best.entry(code)
                        .and_modify(|entry| {
                            if price < entry.1 {
                                *entry = (name.clone(), price);
                            }
                        })
                        .or_insert((name, price));
                }
                Err(reason) => {
                    summary.skipped += 1;
                    summary.errors.push(format!("row {}: {}", line_no + 2, reason));
                }
            }
        }

        for (code, (name, price)) in best {
            match self
                .pricing
                .apply_price(&code, &name, price, PRICE_SOURCE_CSV)
                .await
            {
                Ok(None) => summary.imported += 1,
                Ok(Some(_)) => summary.updated += 1,
                Err(e) => {
                    warn!(country = %code, error = %e, "Price apply failed");
                    summary.skipped += 1;
                    summary.errors.push(format!("{}: {}", code, e));
                }
            }
        }

        info!(
            imported = summary.imported,
            updated = summary.updated,
            skipped = summary.skipped,
            "CSV import complete"
        );

        Ok(summary)
    }
}

/// Resolved column positions for one file
struct Columns {
    name: Option<usize>,
    code: Option<usize>,
    price: usize,
}

impl Columns {
    fn detect(header_line: &str) -> AppResult<Self> {
        let headers: Vec<String> = split_csv_line(header_line)
            .iter()
            .map(|h| h.trim().to_lowercase())
            .collect();

        let find = |aliases: &[&str]| headers.iter().position(|h| aliases.contains(&h.as_str()));

        let name = find(NAME_HEADERS);
        let code = find(CODE_HEADERS);
        let price = find(PRICE_HEADERS).ok_or_else(|| {
            AppError::InvalidInput("CSV has no recognizable price column".to_string())
        })?;

        if name.is_none() && code.is_none() {
            return Err(AppError::InvalidInput(
                "CSV has no recognizable country column".to_string(),
            ));
        }

        Ok(Self { name, code, price })
    }

    /// Resolve one data row to `(iso_code, name, price)`
    fn parse_row(&self, row: &[String]) -> Result<(String, String, Decimal), String> {
        let raw_price = row
            .get(self.price)
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .ok_or("missing price")?;

        let price = Decimal::from_str(raw_price.trim_start_matches('$'))
            .map_err(|_| format!("unparseable price '{}'", raw_price))?;
        if price < Decimal::ZERO {
            return Err(format!("negative price '{}'", raw_price));
        }

        let name = self
            .name
            .and_then(|i| row.get(i))
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let code = self
            .code
            .and_then(|i| row.get(i))
            .map(|s| s.trim().to_uppercase())
            .filter(|s| is_iso_code(s))
            .or_else(|| name.as_deref().and_then(resolve_country_code));

        let code = code.ok_or_else(|| {
            format!(
                "cannot resolve country for '{}'",
                name.as_deref().unwrap_or("")
            )
        })?;

        let name = name.unwrap_or_else(|| code.clone());
        Ok((code, name, price))
    }
}

fn is_iso_code(s: &str) -> bool {
    s.len() == 2 && s.chars().all(|c| c.is_ascii_uppercase())
}

/// Resolve an ISO code from a country name: the static table first, then a
/// `(XX)` parenthetical in the name
fn resolve_country_code(name: &str) -> Option<String> {
    let normalized = name.trim().to_lowercase();

    if let Some(code) = COUNTRY_NAMES
        .iter()
        .find(|(n, _)| *n == normalized)
        .map(|(_, c)| c.to_string())
    {
        return Some(code);
    }

    // "Peru (PE)" style
    let open = name.find('(')?;
    let close = name[open..].find(')')? + open;
    let inner = name[open + 1..close].trim().to_uppercase();
    is_iso_code(&inner).then_some(inner)
}

/// Split one CSV line, honoring double-quoted fields
fn split_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                fields.push(current.clone());
                current.clear();
            }
            _ => current.push(c),
        }
    }
    fields.push(current);
    fields
}

/// English country names to ISO 3166-1 alpha-2, lowercase keys
const COUNTRY_NAMES: &[(&str, &str)] = &[
    ("afghanistan", "AF"),
    ("albania", "AL"),
    ("algeria", "DZ"),
    ("argentina", "AR"),
    ("australia", "AU"),
    ("austria", "AT"),
    ("bangladesh", "BD"),
    ("belgium", "BE"),
    ("bolivia", "BO"),
    ("brazil", "BR"),
    ("bulgaria", "BG"),
    ("canada", "CA"),
    ("chile", "CL"),
    ("china", "CN"),
    ("colombia", "CO"),
    ("costa rica", "CR"),
    ("croatia", "HR"),
    ("cuba", "CU"),
    ("czech republic", "CZ"),
    ("denmark", "DK"),
    ("dominican republic", "DO"),
    ("ecuador", "EC"),
    ("egypt", "EG"),
    ("el salvador", "SV"),
    ("finland", "FI"),
    ("france", "FR"),
    ("germany", "DE"),
    ("ghana", "GH"),
    ("greece", "GR"),
    ("guatemala", "GT"),
    ("haiti", "HT"),
    ("honduras", "HN"),
    ("hong kong", "HK"),
    ("hungary", "HU"),
    ("india", "IN"),
    ("indonesia", "ID"),
    ("iran", "IR"),
    ("iraq", "IQ"),
    ("ireland", "IE"),
    ("israel", "IL"),
    ("italy", "IT"),
    ("jamaica", "JM"),
    ("japan", "JP"),
    ("jordan", "JO"),
    ("kenya", "KE"),
    ("south korea", "KR"),
    ("korea, south", "KR"),
    ("north korea", "KP"),
    ("lebanon", "LB"),
    ("malaysia", "MY"),
    ("mexico", "MX"),
    ("morocco", "MA"),
    ("nepal", "NP"),
    ("netherlands", "NL"),
    ("new zealand", "NZ"),
    ("nicaragua", "NI"),
    ("nigeria", "NG"),
    ("norway", "NO"),
    ("pakistan", "PK"),
    ("panama", "PA"),
    ("paraguay", "PY"),
    ("peru", "PE"),
    ("philippines", "PH"),
    ("poland", "PL"),
    ("portugal", "PT"),
    ("romania", "RO"),
    ("russia", "RU"),
    ("saudi arabia", "SA"),
    ("singapore", "SG"),
    ("south africa", "ZA"),
    ("spain", "ES"),
    ("sri lanka", "LK"),
    ("sweden", "SE"),
    ("switzerland", "CH"),
    ("taiwan", "TW"),
    ("thailand", "TH"),
    ("turkey", "TR"),
    ("ukraine", "UA"),
    ("united arab emirates", "AE"),
    ("united kingdom", "GB"),
    ("united states", "US"),
    ("uruguay", "UY"),
    ("venezuela", "VE"),
    ("vietnam", "VN"),
];

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use std::sync::Mutex;
    use vona_core::models::{CountryPrice, MarkupConfig, PriceUpdate};

    #[test]
    fn test_split_csv_line_handles_quotes() {
        assert_eq!(split_csv_line("a,b,c"), vec!["a", "b", "c"]);
        assert_eq!(
            split_csv_line(r#""Korea, South",0.05"#),
            vec!["Korea, South", "0.05"]
        );
        assert_eq!(split_csv_line(r#""say ""hi""",1"#), vec![r#"say "hi""#, "1"]);
        assert_eq!(split_csv_line("a,,c"), vec!["a", "", "c"]);
    }

    #[test]
    fn test_resolve_country_code_from_table() {
        assert_eq!(resolve_country_code("Peru"), Some("PE".to_string()));
        assert_eq!(resolve_country_code("UNITED STATES"), Some("US".to_string()));
        assert_eq!(resolve_country_code("Korea, South"), Some("KR".to_string()));
    }

    #[test]
    fn test_resolve_country_code_from_parenthetical() {
        assert_eq!(
            resolve_country_code("Kosovo (XK)"),
            Some("XK".to_string())
        );
        assert_eq!(resolve_country_code("Atlantis"), None);
        assert_eq!(resolve_country_code("Atlantis (ATL)"), None);
    }

    #[test]
    fn test_column_detection_aliases() {
        let cols = Columns::detect("Destination,Rate").unwrap();
        assert_eq!(cols.name, Some(0));
        assert_eq!(cols.price, 1);

        let cols = Columns::detect("ISO,country_name,PRICE").unwrap();
        assert_eq!(cols.code, Some(0));
        assert_eq!(cols.name, Some(1));
        assert_eq!(cols.price, 2);

        assert!(Columns::detect("foo,bar").is_err());
        assert!(Columns::detect("country,volume").is_err());
    }

    struct RecordingRepo {
        existing: HashMap<String, Decimal>,
        applied: Mutex<Vec<(String, String, Decimal)>>,
    }

    #[async_trait]
    impl PricingRepository for RecordingRepo {
        async fn find_price(&self, _country_code: &str) -> AppResult<Option<CountryPrice>> {
            Ok(None)
        }

        async fn find_prices(&self, _country_codes: &[String]) -> AppResult<Vec<CountryPrice>> {
            Ok(vec![])
        }

        async fn upsert_price(
            &self,
            country_code: &str,
            country_name: &str,
            base_price: Decimal,
        ) -> AppResult<Option<Decimal>> {
            self.applied.lock().unwrap().push((
                country_code.to_string(),
                country_name.to_string(),
                base_price,
            ));
            Ok(self.existing.get(country_code).copied())
        }

        async fn markup_config(&self) -> AppResult<MarkupConfig> {
            Ok(MarkupConfig::default())
        }

        async fn update_markup_config(&self, _config: &MarkupConfig) -> AppResult<()> {
            Ok(())
        }

        async fn record_price_update(
            &self,
            _country_code: &str,
            _old_price: Option<Decimal>,
            _new_price: Decimal,
            _source: &str,
            _significant: bool,
        ) -> AppResult<()> {
            Ok(())
        }

        async fn list_price_updates(
            &self,
            _country_code: &str,
            _limit: i64,
        ) -> AppResult<Vec<PriceUpdate>> {
            Ok(vec![])
        }
    }

    fn importer(
        existing: HashMap<String, Decimal>,
    ) -> (Arc<RecordingRepo>, ImportService<RecordingRepo>) {
        let repo = Arc::new(RecordingRepo {
            existing,
            applied: Mutex::new(Vec::new()),
        });
        let pricing = Arc::new(PricingService::new(repo.clone(), None));
        (repo, ImportService::new(pricing))
    }

    #[tokio::test]
    async fn test_import_counts_new_and_updated() {
        let mut existing = HashMap::new();
        existing.insert("PE".to_string(), dec!(0.18));
        let (_, service) = importer(existing);

        let csv = "Country,Price\nPeru,0.20\nMexico,0.10\n";
        let summary = service.import_csv(csv).await.unwrap();

        assert_eq!(summary.updated, 1);
        assert_eq!(summary.imported, 1);
        assert_eq!(summary.skipped, 0);
    }

    #[tokio::test]
    async fn test_import_lowest_price_wins() {
        let (repo, service) = importer(HashMap::new());

        let csv = "Country,Price\nPeru,0.20\nPeru,0.15\nPeru,0.30\n";
        let summary = service.import_csv(csv).await.unwrap();
        assert_eq!(summary.imported, 1);

        let applied = repo.applied.lock().unwrap();
        assert_eq!(applied.len(), 1);
        assert_eq!(applied[0].2, dec!(0.15));
    }

    #[tokio::test]
    async fn test_import_skips_bad_rows() {
        let (_, service) = importer(HashMap::new());

        let csv = "Country,Price\nPeru,0.20\nAtlantis,0.10\nMexico,not-a-price\n,0.05\n";
        let summary = service.import_csv(csv).await.unwrap();

        assert_eq!(summary.imported, 1);
        assert_eq!(summary.skipped, 3);
        assert_eq!(summary.errors.len(), 3);
    }

    #[tokio::test]
    async fn test_import_prefers_iso_column() {
        let (repo, service) = importer(HashMap::new());

        let csv = "code,country,price\nPE,Whatever Name,$0.20\n";
        let summary = service.import_csv(csv).await.unwrap();
        assert_eq!(summary.imported, 1);

        let applied = repo.applied.lock().unwrap();
        assert_eq!(applied[0].0, "PE");
        assert_eq!(applied[0].1, "Whatever Name");
        assert_eq!(applied[0].2, dec!(0.20));
    }

    #[tokio::test]
    async fn test_import_empty_file_is_an_error() {
        let (_, service) = importer(HashMap::new());

        assert!(matches!(
            service.import_csv("").await,
            Err(AppError::InvalidInput(_))
        ));
        assert!(matches!(
            service.import_csv("volume,share\n1,2\n").await,
            Err(AppError::InvalidInput(_))
        ));
    }
}
