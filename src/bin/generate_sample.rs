use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use chrono::{Duration, NaiveDate};
use log::info;
use parquet::arrow::ArrowWriter;

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
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
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

    fn below(&mut self, n: usize) -> usize {
        (self.next_f64() * n as f64) as usize % n
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}

const ROWS: usize = 200;
const MISSING_RATE: f64 = 0.05;

fn main() -> Result<()> {
    env_logger::init();
    let output_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "sample_data.parquet".to_string());

    let mut rng = SimpleRng::new(42);

    let cities = ["New York", "Los Angeles", "Chicago", "Houston", "Phoenix"];
    let departments = ["Sales", "Engineering", "Support"];
    let start = NaiveDate::from_ymd_opt(2023, 1, 1).context("invalid start date")?;

    let mut city = Vec::with_capacity(ROWS);
    let mut department = Vec::with_capacity(ROWS);
    let mut age = Vec::with_capacity(ROWS);
    let mut income = Vec::with_capacity(ROWS);
    let mut score = Vec::with_capacity(ROWS);
    let mut signup = Vec::with_capacity(ROWS);

    for _ in 0..ROWS {
        let a = rng.gauss(38.0, 9.0).clamp(18.0, 70.0).round() as i64;
        // Income grows with age so the heatmap has something to show.
        let inc = 22_000.0 + a as f64 * 900.0 + rng.gauss(0.0, 6_000.0);
        let day = start + Duration::days(rng.below(730) as i64);

        city.push(Some(cities[rng.below(cities.len())].to_string()));
        department.push(departments[rng.below(departments.len())].to_string());
        age.push(Some(a));
        income.push(Some((inc / 10.0).round() * 10.0));
        score.push(Some(rng.gauss(70.0, 12.0).clamp(0.0, 100.0)));
        // Text, not a date type: readable as a time axis only once designated.
        signup.push(Some(day.format("%Y-%m-%d").to_string()));
    }

    // Sprinkle absent values into the nullable columns.
    for i in 0..ROWS {
        if rng.next_f64() < MISSING_RATE {
            age[i] = None;
        }
        if rng.next_f64() < MISSING_RATE {
            income[i] = None;
        }
        if rng.next_f64() < MISSING_RATE {
            city[i] = None;
        }
        if rng.next_f64() < MISSING_RATE {
            score[i] = None;
        }
        if rng.next_f64() < MISSING_RATE {
            signup[i] = None;
        }
    }

    let schema = Arc::new(Schema::new(vec![
        Field::new("city", DataType::Utf8, true),
        Field::new("department", DataType::Utf8, false),
        Field::new("age", DataType::Int64, true),
        Field::new("income", DataType::Float64, true),
        Field::new("score", DataType::Float64, true),
        Field::new("signup_date", DataType::Utf8, true),
    ]));

    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(StringArray::from(city)),
            Arc::new(StringArray::from(department)),
            Arc::new(Int64Array::from(age)),
            Arc::new(Float64Array::from(income)),
            Arc::new(Float64Array::from(score)),
            Arc::new(StringArray::from(signup)),
        ],
    )
    .context("building record batch")?;

    // Write Parquet
    let file = std::fs::File::create(&output_path)
        .with_context(|| format!("creating {output_path}"))?;
    let mut writer = ArrowWriter::try_new(file, schema, None).context("creating writer")?;
    writer.write(&batch).context("writing batch")?;
    writer.close().context("closing writer")?;

    info!("wrote {ROWS} rows to {output_path}");
    println!("Wrote {ROWS} rows to {output_path}");
    Ok(())
}
