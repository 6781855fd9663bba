//! Writes a synthetic e-commerce orders CSV for trying out the auditor.
//!
//! Usage: `generate_dataset [rows] [output]` (defaults: 100000, `ecommerce_orders.csv`).
//! The output is deterministic for a given row count.

use std::fs::File;

use anyhow::{Context, Result};
use chrono::{Duration, NaiveDate};
use polars::prelude::*;

const SEED: u64 = 42;
const DEFAULT_ROWS: usize = 100_000;
const DEFAULT_OUTPUT: &str = "ecommerce_orders.csv";

const FIRST_NAMES: [&str; 12] = [
    "James", "Maria", "Wei", "Aisha", "Lucas", "Sofia", "Kenji", "Amara", "Noah", "Elena",
    "Ravi", "Chloe",
];
const LAST_NAMES: [&str; 10] = [
    "Smith", "Garcia", "Chen", "Okafor", "Müller", "Rossi", "Tanaka", "Silva", "Novak", "Patel",
];
const COUNTRIES: [&str; 10] = [
    "United States", "India", "Brazil", "Germany", "Nigeria", "Japan", "France", "Mexico",
    "Canada", "Australia",
];
const CATEGORIES: [&str; 6] = ["Electronics", "Clothing", "Books", "Home", "Beauty", "Sports"];
const PAYMENT_METHODS: [&str; 4] = ["Card", "UPI", "Cash", "Wallet"];
const GENDERS: [&str; 3] = ["Male", "Female", "Other"];

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5)).rotate_left(7).wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Inclusive on both ends.
    fn range(&mut self, lo: i64, hi: i64) -> i64 {
        lo + (self.next_u64() % (hi - lo + 1) as u64) as i64
    }

    fn pick<'a>(&mut self, items: &[&'a str]) -> &'a str {
        items[(self.next_u64() % items.len() as u64) as usize]
    }
}

#[derive(Default)]
struct Orders {
    order_id: Vec<String>,
    user_id: Vec<String>,
    user_name: Vec<String>,
    email: Vec<String>,
    phone: Vec<Option<String>>,
    gender: Vec<&'static str>,
    age: Vec<i64>,
    country: Vec<&'static str>,
    product_id: Vec<String>,
    category: Vec<&'static str>,
    price: Vec<f64>,
    quantity: Vec<i64>,
    payment_method: Vec<&'static str>,
    order_date: Vec<String>,
    total_amount: Vec<f64>,
    delivery_date: Vec<String>,
    is_returned: Vec<i64>,
}

impl Orders {
    fn generate(rows: usize, rng: &mut SimpleRng) -> Result<Self> {
        let today = NaiveDate::from_ymd_opt(2025, 6, 30).context("invalid anchor date")?;
        let mut orders = Orders::default();

        for i in 0..rows {
            let first = rng.pick(&FIRST_NAMES);
            let last = rng.pick(&LAST_NAMES);
            let price = (rng.next_f64() * 495.0 + 5.0) * 100.0;
            let price = price.round() / 100.0;
            let quantity = rng.range(1, 5);
            let order_date = today - Duration::days(rng.range(0, 364));
            let delivery_date = order_date + Duration::days(rng.range(2, 9));

            orders.order_id.push(format!("O{}", i));
            orders.user_id.push(format!("U{}", i));
            orders.user_name.push(format!("{} {}", first, last));
            orders.email.push(format!(
                "{}.{}{}@example.com",
                first.to_lowercase(),
                last.to_lowercase(),
                rng.range(1, 999)
            ));
            orders.phone.push(if rng.next_f64() > 0.15 {
                Some(format!(
                    "+1-{:03}-{:03}-{:04}",
                    rng.range(200, 999),
                    rng.range(200, 999),
                    rng.range(0, 9999)
                ))
            } else {
                None
            });
            orders.gender.push(rng.pick(&GENDERS));
            orders.age.push(rng.range(18, 70));
            orders.country.push(rng.pick(&COUNTRIES));
            orders.product_id.push(format!("P{}", rng.range(100, 999)));
            orders.category.push(rng.pick(&CATEGORIES));
            orders.price.push(price);
            orders.quantity.push(quantity);
            orders.payment_method.push(rng.pick(&PAYMENT_METHODS));
            orders.order_date.push(order_date.format("%Y-%m-%d").to_string());
            orders.total_amount.push(price * quantity as f64);
            orders.delivery_date.push(delivery_date.format("%Y-%m-%d").to_string());
            orders.is_returned.push(i64::from(rng.next_f64() < 0.3));
        }

        Ok(orders)
    }

    fn into_frame(self) -> PolarsResult<DataFrame> {
        DataFrame::new(vec![
            Series::new("OrderID", self.order_id),
            Series::new("UserID", self.user_id),
            Series::new("UserName", self.user_name),
            Series::new("Email", self.email),
            Series::new("PhoneNumber", self.phone),
            Series::new("Gender", self.gender),
            Series::new("Age", self.age),
            Series::new("Country", self.country),
            Series::new("ProductID", self.product_id),
            Series::new("Category", self.category),
            Series::new("Price", self.price),
            Series::new("Quantity", self.quantity),
            Series::new("PaymentMethod", self.payment_method),
            Series::new("OrderDate", self.order_date),
            Series::new("TotalAmount", self.total_amount),
            Series::new("DeliveryDate", self.delivery_date),
            Series::new("IsReturned", self.is_returned),
        ])
    }
}

fn main() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let rows = match args.next() {
        Some(raw) => raw
            .replace('_', "")
            .parse()
            .with_context(|| format!("row count must be a number, got {:?}", raw))?,
        None => DEFAULT_ROWS,
    };
    let output = args.next().unwrap_or_else(|| DEFAULT_OUTPUT.to_string());

    println!("Generating {} rows...", rows);
    let mut rng = SimpleRng::new(SEED);
    let mut df = Orders::generate(rows, &mut rng)?.into_frame()?;

    let mut file = File::create(&output).with_context(|| format!("creating {}", output))?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .finish(&mut df)
        .with_context(|| format!("writing {}", output))?;

    println!("Wrote {} orders ({} columns) to {}", df.height(), df.width(), output);
    Ok(())
}
