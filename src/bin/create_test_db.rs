use std::{
    collections::BTreeMap,
    error::Error,
    f64::consts::PI,
    fs,
    path::{Path, PathBuf},
};

use clap::Parser;
use rusqlite::Connection;
use time::{Date, Month};

use spendscope::{
    fraud_stats::{
        CategoryFraudRate, ErrorFraudRate, FRAUD_AMOUNTS_FILE, FRAUD_BY_CATEGORY_FILE,
        FRAUD_BY_ERROR_FILE, FraudAmounts, write_rows,
    },
    initialize_db,
    ledger::{LedgerEntry, insert_fraud_label, insert_ledger_entry, insert_mcc_code},
};

/// A utility for creating a synthetic ledger database for testing the dashboard.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to save the SQLite database to.
    #[arg(long, short)]
    output_path: PathBuf,

    /// Directory to write the fraud statistics CSV files to.
    #[arg(long, short)]
    data_dir: Option<PathBuf>,
}

const FIRST_YEAR: i32 = 2010;
const LAST_YEAR: i32 = 2019;
const CLIENT_COUNT: i64 = 40;
const TRANSACTIONS_PER_MONTH: u32 = 6;

/// (MCC, description, base monthly amount per transaction, yearly growth)
const CATEGORIES: [(i64, &str, f64, f64); 8] = [
    (5411, "Grocery Stores, Supermarkets", 62.0, 1.5),
    (5812, "Eating Places and Restaurants", 38.0, 1.0),
    (5541, "Service Stations", 45.0, 0.5),
    (4121, "Taxicabs and Limousines", 21.0, 0.8),
    (5311, "Department Stores", 95.0, 2.0),
    (5912, "Drug Stores and Pharmacies", 27.0, 0.4),
    (4829, "Money Transfer", 180.0, 3.0),
    (7011, "Hotels and Motels", 240.0, 4.0),
];

const ERROR_TYPES: [&str; 4] = [
    "Insufficient Balance",
    "Bad PIN",
    "Technical Glitch",
    "Bad CVV",
];

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let output_path = Path::new(&args.output_path);

    match output_path.extension() {
        Some(extension) if extension == "db" => {}
        _ => {
            eprintln!(
                "Output path {} must end with the file extension '.db'.",
                output_path.display()
            );
            return Ok(());
        }
    }

    if output_path.exists() {
        eprintln!(
            "Output path {} already exists. Delete it or choose a different path.",
            output_path.display()
        );
        return Ok(());
    }

    println!("Creating ledger database at {}", output_path.display());
    let conn = Connection::open(output_path)?;
    initialize_db(&conn)?;

    let stats = populate_ledger(&conn)?;
    println!("Inserted {} transactions", stats.transaction_count);

    if let Some(data_dir) = args.data_dir {
        fs::create_dir_all(&data_dir)?;
        stats.write(&data_dir)?;
        println!("Wrote fraud statistics to {}", data_dir.display());
    }

    println!("Success!");

    Ok(())
}

#[derive(Debug, Default)]
struct Tally {
    total: i64,
    fraud: i64,
}

impl Tally {
    fn add(&mut self, is_fraud: bool) {
        self.total += 1;
        self.fraud += i64::from(is_fraud);
    }

    fn rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            100.0 * self.fraud as f64 / self.total as f64
        }
    }
}

#[derive(Debug, Default)]
struct AmountSummary {
    sum: f64,
    count: usize,
    min: f64,
    max: f64,
}

impl AmountSummary {
    fn add(&mut self, amount: f64) {
        if self.count == 0 {
            self.min = amount;
            self.max = amount;
        } else {
            self.min = self.min.min(amount);
            self.max = self.max.max(amount);
        }

        self.sum += amount;
        self.count += 1;
    }

    fn into_row(self, is_fraud: &str) -> FraudAmounts {
        let average = if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        };

        FraudAmounts {
            is_fraud: is_fraud.to_owned(),
            avg_amount: (average * 100.0).round() / 100.0,
            min_amount: self.min,
            max_amount: self.max,
        }
    }
}

/// Running fraud statistics for the generated ledger.
#[derive(Debug, Default)]
struct FraudStatistics {
    transaction_count: usize,
    by_error: BTreeMap<String, Tally>,
    by_category: BTreeMap<String, Tally>,
    legitimate_amounts: AmountSummary,
    fraudulent_amounts: AmountSummary,
}

impl FraudStatistics {
    fn record(&mut self, category: &str, errors: Option<&str>, amount: f64, is_fraud: bool) {
        self.transaction_count += 1;
        self.by_error
            .entry(errors.unwrap_or_default().to_owned())
            .or_default()
            .add(is_fraud);
        self.by_category
            .entry(category.to_owned())
            .or_default()
            .add(is_fraud);

        if is_fraud {
            self.fraudulent_amounts.add(amount);
        } else {
            self.legitimate_amounts.add(amount);
        }
    }

    fn write(self, data_dir: &Path) -> Result<(), Box<dyn Error>> {
        let by_error: Vec<ErrorFraudRate> = self
            .by_error
            .into_iter()
            .map(|(errors, tally)| ErrorFraudRate {
                errors,
                total_transactions: tally.total,
                fraud_count: tally.fraud,
                fraud_rate: tally.rate(),
            })
            .collect();
        write_rows(&data_dir.join(FRAUD_BY_ERROR_FILE), &by_error)?;

        let by_category: Vec<CategoryFraudRate> = self
            .by_category
            .into_iter()
            .map(|(description, tally)| CategoryFraudRate {
                description,
                total_transactions: tally.total,
                fraud_count: tally.fraud,
                fraud_rate: tally.rate(),
            })
            .collect();
        write_rows(&data_dir.join(FRAUD_BY_CATEGORY_FILE), &by_category)?;

        let amounts = [
            self.legitimate_amounts.into_row("No"),
            self.fraudulent_amounts.into_row("Yes"),
        ];
        write_rows(&data_dir.join(FRAUD_AMOUNTS_FILE), &amounts)?;

        Ok(())
    }
}

/// Fill the ledger with a few transactions per category per month.
///
/// Amounts follow a yearly cycle that peaks in December on top of a slow
/// upward trend, so the forecasting page has seasonality to find. The data is
/// deterministic so repeated runs produce identical databases.
fn populate_ledger(conn: &Connection) -> Result<FraudStatistics, Box<dyn Error>> {
    let mut stats = FraudStatistics::default();
    let mut counter: u64 = 0;

    for (mcc, description, _, _) in CATEGORIES {
        insert_mcc_code(mcc, description, conn)?;
    }

    conn.execute_batch("BEGIN")?;

    for year in FIRST_YEAR..=LAST_YEAR {
        let years_elapsed = f64::from(year - FIRST_YEAR);

        for month_number in 1..=12u8 {
            let month = Month::try_from(month_number)?;
            let angle = 2.0 * PI * f64::from(month_number) / 12.0 + PI / 2.0;
            let seasonal = 1.0 + 0.25 * angle.sin();

            for (mcc, description, base, growth) in CATEGORIES {
                for i in 0..TRANSACTIONS_PER_MONTH {
                    counter += 1;

                    let day = 1 + ((counter * 7) % 28) as u8;
                    let date = Date::from_calendar_date(year, month, day)?;

                    let jitter = ((counter * 37) % 17) as f64 - 8.0;
                    let mut amount = (base + growth * years_elapsed) * seasonal + jitter;
                    let errors = (counter % 53 == 0)
                        .then(|| ERROR_TYPES[(counter / 53) as usize % ERROR_TYPES.len()]);
                    let is_fraud =
                        counter % 211 == 0 || (errors == Some("Bad CVV") && i % 2 == 0);

                    if is_fraud {
                        amount *= 1.8;
                    }
                    // Refunds show up as negative amounts.
                    if counter % 97 == 0 {
                        amount = -amount;
                    }
                    let amount = (amount * 100.0).round() / 100.0;

                    let mut entry = LedgerEntry::build(&format!("${amount:.2}"), date)
                        .client_id((counter as i64 * 13) % CLIENT_COUNT)
                        .mcc(mcc);
                    if let Some(errors) = errors {
                        entry = entry.errors(errors);
                    }

                    let transaction_id = insert_ledger_entry(&entry, conn)?;
                    insert_fraud_label(transaction_id, is_fraud, conn)?;

                    stats.record(description, errors, amount, is_fraud);
                }
            }
        }

        println!("Generated transactions for {year}");
    }

    conn.execute_batch("COMMIT")?;

    Ok(stats)
}
